//! The authoritative game state.
//!
//! One `Game` owns everything: the card and mechanic arenas, the board, the
//! event bus, both players' zones, the phase machine, and the notification
//! log. All mutation flows through methods here (or the action gate in
//! `actions.rs`); nothing outside the crate touches the arenas directly.
//!
//! Cross-references are ids resolved through the arenas, so effect chains
//! can re-enter freely: a death that triggers a draw that triggers another
//! death walks the same methods without aliasing anything.

use im::Vector;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::board::{Board, DEFAULT_CAPACITY};
use crate::cards::{
    Card, CardKind, GameZone, ProtoRegistry, ResourceKind, ResourcePool,
};
use crate::combat::{self, Blocker};
use crate::core::{CardId, GameRng, MechanicId, PlayerId, PlayerMap, ProtoId};
use crate::events::{EventBus, EventKind, EventParams, EventScope, SourceToken, Subscription};
use crate::mechanics::{
    EvalContext, EvalMemo, EvalScore, Mechanic, MechanicKind, MechanicTemplate,
};

use crate::targeting::{TargetWho, Targeter};

use super::choice::{ChoicePurpose, PendingChoice};
use super::phases::Phase;

/// One player's private zones and totals.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerState {
    pub life: i64,
    /// Draw order; the top of the deck is the end of the vector.
    pub deck: Vec<CardId>,
    pub hand: Vec<CardId>,
    pub crypt: Vec<CardId>,
    pub resources: ResourcePool,
    /// Set once the player has grown their pool this turn.
    pub resource_played: bool,
}

impl PlayerState {
    fn new(life: i64) -> Self {
        Self {
            life,
            deck: Vec::new(),
            hand: Vec::new(),
            crypt: Vec::new(),
            resources: ResourcePool::new(),
            resource_played: false,
        }
    }
}

/// One entry in the ordered replay stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Notification {
    TurnStarted { player: PlayerId, turn: u32 },
    PhaseChanged { phase: Phase },
    CardPlayed { player: PlayerId, card: CardId },
    CardDrawn { player: PlayerId, card: CardId },
    ResourcePlayed { player: PlayerId, kind: ResourceKind },
    AttackerToggled { unit: CardId, attacking: bool },
    BlockDeclared { blocker: CardId, attacker: Option<CardId> },
    ChoiceMade { player: PlayerId, picks: Vec<CardId> },
    EnchantmentModified { card: CardId, power: i64 },
    DamageDistributed { attacker: CardId, order: Vec<CardId> },
    UnitDied { unit: CardId },
    GameEnded { winner: PlayerId },
}

/// The single authoritative game instance.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Game {
    cards: FxHashMap<CardId, Card>,
    mechanics: FxHashMap<MechanicId, Mechanic>,
    next_card: u32,
    next_mechanic: u32,
    protos: ProtoRegistry,
    board: Board,
    bus: EventBus,
    players: PlayerMap<PlayerState>,
    turn: u32,
    active: PlayerId,
    phase: Phase,
    pending_choice: Option<PendingChoice>,
    /// Players still owed a mulligan offer during setup.
    mulligan_queue: Vec<PlayerId>,
    /// Explicit blocker orders submitted during damage distribution.
    combat_orders: FxHashMap<CardId, Vec<CardId>>,
    /// End-of-turn close deferred behind a turn-end effect's choice.
    end_phase_parked: bool,
    /// Cards currently mid-death, so re-entrant chains cannot kill twice.
    dying: FxHashSet<CardId>,
    hand_limit: usize,
    winner: Option<PlayerId>,
    log: Vector<Notification>,
    rng: GameRng,
}

// Read access.
impl Game {
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn turn(&self) -> u32 {
        self.turn
    }

    #[must_use]
    pub fn active_player(&self) -> PlayerId {
        self.active
    }

    /// Who may act right now.
    #[must_use]
    pub fn priority_player(&self) -> PlayerId {
        match &self.pending_choice {
            Some(choice) => choice.player,
            None => self.phase.priority(self.active),
        }
    }

    #[must_use]
    pub fn winner(&self) -> Option<PlayerId> {
        self.winner
    }

    #[must_use]
    pub fn player(&self, player: PlayerId) -> &PlayerState {
        &self.players[player]
    }

    #[must_use]
    pub fn board(&self) -> &Board {
        &self.board
    }

    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    #[must_use]
    pub fn protos(&self) -> &ProtoRegistry {
        &self.protos
    }

    #[must_use]
    pub fn card(&self, id: CardId) -> Option<&Card> {
        self.cards.get(&id)
    }

    /// Arena lookup that treats a miss as a bug.
    #[must_use]
    pub fn expect_card(&self, id: CardId) -> &Card {
        self.cards.get(&id).expect("card id not in arena")
    }

    #[must_use]
    pub fn mechanic(&self, id: MechanicId) -> Option<&Mechanic> {
        self.mechanics.get(&id)
    }

    #[must_use]
    pub fn pending_choice(&self) -> Option<&PendingChoice> {
        self.pending_choice.as_ref()
    }

    /// False while a card choice is outstanding; every action except the
    /// owed answer is rejected then.
    #[must_use]
    pub fn can_take_action(&self) -> bool {
        self.pending_choice.is_none()
    }

    #[must_use]
    pub fn log(&self) -> &Vector<Notification> {
        &self.log
    }

    /// Units currently on the board, player one's row first.
    pub fn units_in_play(&self) -> impl Iterator<Item = &Card> {
        self.board
            .all()
            .filter_map(|id| self.cards.get(&id))
            .filter(|card| card.is_unit())
    }

    /// Whole-state snapshot for replay comparison.
    #[must_use]
    pub fn snapshot(&self) -> Vec<u8> {
        bincode::serialize(self).expect("game state serializes")
    }
}

// Evaluation.
impl Game {
    /// Heuristic worth of a card for the given purpose. Pure: no state is
    /// touched, only the memo passed by the caller.
    #[must_use]
    pub fn evaluate(&self, id: CardId, ctx: EvalContext, memo: &mut EvalMemo) -> f64 {
        if let Some(value) = memo.get(id, ctx) {
            return value;
        }
        let Some(card) = self.cards.get(&id) else {
            return 0.0;
        };
        let base = Self::raw_value(card);
        if !memo.begin(id) {
            // Mid-evaluation elsewhere on the stack: report raw stats.
            return base;
        }
        let mut scores: Vec<EvalScore> = Vec::new();
        for mech_id in &card.mechanics {
            let Some(mech) = self.mechanics.get(mech_id) else {
                continue;
            };
            let mut score = mech.score(ctx);
            if mech.kind.wants_targets() {
                if let Some(targeter) = &mech.targeter {
                    // The per-target worth sums over everything the effect
                    // would actually reach.
                    score.addend *= self.target_reach(targeter, card) as f64;
                }
            }
            if let MechanicKind::RaiseFromCrypt = mech.kind {
                // Worth what the best raisable unit is worth, discounted.
                let best = self
                    .players[card.owner]
                    .crypt
                    .iter()
                    .map(|&c| self.evaluate(c, ctx, memo))
                    .fold(0.0, f64::max);
                score.addend += best * 0.5;
            }
            scores.push(score);
        }
        let value = EvalScore::resolve(base, scores);
        memo.finish(id, ctx, value);
        value
    }

    /// How many units a targeted effect would touch right now: the stored
    /// selection once one exists, otherwise the eligible pool capped at the
    /// pick count.
    fn target_reach(&self, targeter: &Targeter, source: &Card) -> usize {
        match targeter.who {
            TargetWho::AllUnits => targeter.valid_targets(source, self).len(),
            _ if !targeter.chosen.is_empty() => targeter.chosen.len(),
            _ => targeter
                .valid_targets(source, self)
                .len()
                .min(targeter.count),
        }
    }

    fn raw_value(card: &Card) -> f64 {
        match &card.kind {
            CardKind::Unit(unit) => (unit.attack + unit.life.max(0)) as f64,
            CardKind::Enchantment(ench) => ench.power as f64,
            CardKind::Item(_) => 0.0,
        }
    }
}

// Event publication and dispatch.
impl Game {
    /// Publish an event to every interested handler, in order: handlers
    /// scoped to the target entity, then to the source entity, then global.
    /// Returns the payload as the chain left it.
    pub fn publish(&mut self, mut params: EventParams) -> EventParams {
        let kind = params.kind;
        let mut scopes: SmallVec<[EventScope; 3]> = SmallVec::new();
        if let Some(target) = params.target {
            scopes.push(EventScope::Entity(target));
        }
        if let Some(source) = params.source {
            let scope = EventScope::Entity(source);
            if !scopes.contains(&scope) {
                scopes.push(scope);
            }
        }
        scopes.push(EventScope::Global);

        for scope in scopes {
            let mut cursor = self.bus.cursor(scope, kind);
            while let Some(sub) = self.bus.advance(&mut cursor) {
                self.dispatch(sub, &mut params);
            }
        }
        params
    }

    fn dispatch(&mut self, sub: Subscription, params: &mut EventParams) {
        // The handler may have been removed earlier in this same publish.
        let Some(mech) = self.mechanics.get(&sub.handler).cloned() else {
            return;
        };
        let Some(owner) = self.cards.get(&mech.parent).map(|c| c.owner) else {
            return;
        };

        // Intrinsic behaviors that listen without an authored trigger.
        match &mech.kind {
            MechanicKind::PreventDamage { .. }
                if params.kind == EventKind::DamageTaken
                    && params.target == Some(mech.parent) =>
            {
                if let Some(live) = self.mechanics.get_mut(&sub.handler) {
                    params.amount = live.absorb(params.amount);
                }
                return;
            }
            MechanicKind::Poison { per_turn }
                if params.kind == EventKind::TurnEnd && params.player == Some(owner) =>
            {
                let tick = *per_turn * mech.level;
                self.deal_damage(None, mech.parent, tick);
                return;
            }
            _ => {}
        }

        let Some(trigger) = mech.trigger else {
            return;
        };
        let listens = trigger
            .subscriptions(mech.parent)
            .iter()
            .any(|(_, kind)| *kind == params.kind);
        if listens && trigger.matches(params, mech.parent, owner) {
            self.fire_effect(&mech);
        }
    }

    /// Resolve a mechanic's effect right now. `mech` is a detached copy;
    /// the arena instance may already have changed or vanished.
    fn fire_effect(&mut self, mech: &Mechanic) {
        let mut targets: Vec<CardId> = match (&mech.targeter, self.cards.get(&mech.parent)) {
            (Some(targeter), Some(parent)) => targeter.resolve(parent, self),
            _ => Vec::new(),
        };
        // A chosen target may have left play since selection.
        targets.retain(|id| self.board.contains(*id));
        let owner = match self.cards.get(&mech.parent) {
            Some(card) => card.owner,
            None => return,
        };

        match &mech.kind {
            // Fired magnitudes scale with the stack level, which doubles as
            // an enchantment's power.
            MechanicKind::DealDamage { amount } => {
                for target in targets {
                    self.deal_damage(Some(mech.parent), target, *amount * mech.level);
                }
            }
            MechanicKind::HealTargets { amount } => {
                for target in targets {
                    if let Some(unit) = self.cards.get_mut(&target).and_then(Card::as_unit_mut) {
                        unit.heal(*amount * mech.level);
                    }
                }
            }
            MechanicKind::DrawCards { count } => {
                for _ in 0..*count * mech.level {
                    self.draw_card(owner);
                }
            }
            MechanicKind::Annihilate => {
                for target in targets {
                    self.annihilate(target);
                }
            }
            MechanicKind::StatBonus { attack, life } => {
                // Fired (not static) stat bonuses are permanent gains.
                if let Some(unit) = self.cards.get_mut(&mech.parent).and_then(Card::as_unit_mut)
                {
                    unit.attack += *attack * mech.level;
                    unit.max_life += *life * mech.level;
                    unit.life += *life * mech.level;
                }
            }
            MechanicKind::RaiseFromCrypt => self.resolve_raise(owner),
            // Static and play-time kinds have no fired effect.
            MechanicKind::PreventDamage { .. }
            | MechanicKind::Poison { .. }
            | MechanicKind::GrantOnHost { .. }
            | MechanicKind::DisableAttack
            | MechanicKind::DisableBlock => {}
        }
    }

    fn resolve_raise(&mut self, owner: PlayerId) {
        let candidates: Vec<CardId> = self.players[owner]
            .crypt
            .iter()
            .copied()
            .filter(|id| self.cards.get(id).is_some_and(Card::is_unit))
            .collect();
        match candidates.len() {
            0 => {}
            1 => self.raise_from_crypt(candidates[0]),
            _ if self.pending_choice.is_none() => {
                self.pending_choice = Some(PendingChoice {
                    player: owner,
                    candidates,
                    min: 1,
                    max: 1,
                    purpose: ChoicePurpose::Search,
                    message: String::from("choose a unit to raise from your crypt"),
                });
            }
            _ => {
                // A choice is already outstanding; fall back to the best pick.
                let mut memo = EvalMemo::new();
                let best = candidates
                    .into_iter()
                    .max_by(|&a, &b| {
                        self.evaluate(a, EvalContext::Play, &mut memo)
                            .total_cmp(&self.evaluate(b, EvalContext::Play, &mut memo))
                    })
                    .expect("candidates nonempty");
                self.raise_from_crypt(best);
            }
        }
    }
}

// Card and mechanic lifecycle.
impl Game {
    pub(crate) fn create_card(&mut self, proto_id: ProtoId, owner: PlayerId) -> CardId {
        let id = CardId::new(self.next_card);
        self.next_card += 1;
        let proto = self.protos.expect(proto_id).clone();
        let card = proto.instantiate(id, owner);
        self.cards.insert(id, card);
        for template in &proto.mechanics {
            self.attach_mechanic(id, template);
        }
        id
    }

    /// Attach a mechanic to a card. Duplicate keys stack onto the existing
    /// instance; immune units refuse the key outright. Returns the live
    /// instance id, or `None` when immunity blocked it.
    pub fn attach_mechanic(
        &mut self,
        card_id: CardId,
        template: &MechanicTemplate,
    ) -> Option<MechanicId> {
        let card = self.cards.get(&card_id).expect("attach to unknown card");
        if let Some(unit) = card.as_unit() {
            if unit.immune.contains(&template.key) {
                return None;
            }
        }
        let on_board = card.zone == GameZone::Board;
        if let Some(&existing) = card
            .mechanics
            .iter()
            .find(|&&m| self.mechanics.get(&m).map(|m| m.key) == Some(template.key))
        {
            let mech = self
                .mechanics
                .get_mut(&existing)
                .expect("stacked mechanic in arena");
            mech.stack(template);
            if on_board {
                // The existing static was applied at the old level; grant
                // the one new level's worth so removal at the final level
                // unwinds exactly what was applied.
                let mut delta = mech.clone();
                delta.level = 1;
                self.apply_static(&delta, 1);
            }
            return Some(existing);
        }

        let id = MechanicId::new(self.next_mechanic);
        self.next_mechanic += 1;
        let mut mech = template.instantiate(id, card_id);
        if mech.targeter.is_none() && mech.kind.wants_targets() {
            mech.targeter = card.targeter.clone();
        }
        self.mechanics.insert(id, mech);
        self.cards
            .get_mut(&card_id)
            .expect("attach to unknown card")
            .mechanics
            .push(id);
        if on_board {
            self.activate_mechanic(id);
        }
        Some(id)
    }

    /// Register a board-resident mechanic's subscriptions and apply its
    /// static effect.
    fn activate_mechanic(&mut self, id: MechanicId) {
        let mech = self.mechanics.get(&id).expect("activate unknown mechanic").clone();
        self.apply_static(&mech, 1);

        let mut subs: SmallVec<[(EventScope, EventKind); 2]> = SmallVec::new();
        if let Some(trigger) = mech.trigger {
            subs.extend(trigger.subscriptions(mech.parent));
        }
        match mech.kind {
            MechanicKind::PreventDamage { .. } => {
                subs.push((EventScope::Entity(mech.parent), EventKind::DamageTaken));
            }
            MechanicKind::Poison { .. } => {
                subs.push((EventScope::Global, EventKind::TurnEnd));
            }
            _ => {}
        }
        for (scope, kind) in subs {
            self.bus
                .subscribe(scope, kind, SourceToken::Mechanic(id), mech.priority, id);
        }
    }

    /// Strip a mechanic from its card: static effect unwound, subscriptions
    /// released in bulk, arena entry dropped.
    pub fn remove_mechanic(&mut self, id: MechanicId) {
        let Some(mech) = self.mechanics.get(&id).cloned() else {
            return;
        };
        let on_board = self
            .cards
            .get(&mech.parent)
            .is_some_and(|c| c.zone == GameZone::Board);
        if on_board {
            self.apply_static(&mech, -1);
        }
        self.bus.unsubscribe_source(SourceToken::Mechanic(id));
        if let Some(card) = self.cards.get_mut(&mech.parent) {
            card.mechanics.retain(|&m| m != id);
        }
        self.mechanics.remove(&id);
    }

    /// Apply (`sign = 1`) or unwind (`sign = -1`) a static kind on the
    /// parent unit.
    fn apply_static(&mut self, mech: &Mechanic, sign: i64) {
        if mech.trigger.is_some() {
            return;
        }
        let Some(unit) = self.cards.get_mut(&mech.parent).and_then(Card::as_unit_mut) else {
            return;
        };
        match mech.kind {
            MechanicKind::StatBonus { attack, life } => {
                unit.attack += sign * attack * mech.level;
                unit.max_life += sign * life * mech.level;
                if sign > 0 {
                    unit.life += life * mech.level;
                } else {
                    unit.life = unit.life.min(unit.max_life);
                }
            }
            MechanicKind::DisableAttack => {
                let stacks = mech.level.max(0) as u32;
                if sign > 0 {
                    unit.attack_disabled += stacks;
                } else {
                    unit.attack_disabled = unit.attack_disabled.saturating_sub(stacks);
                }
            }
            MechanicKind::DisableBlock => {
                let stacks = mech.level.max(0) as u32;
                if sign > 0 {
                    unit.block_disabled += stacks;
                } else {
                    unit.block_disabled = unit.block_disabled.saturating_sub(stacks);
                }
            }
            _ => {}
        }
    }

    /// Put a hand/deck/crypt card onto the board: place, activate mechanics,
    /// announce, then enforce capacity by killing the newcomer if its row
    /// was already full.
    pub(crate) fn enter_play(&mut self, id: CardId) {
        let owner = self.expect_card(id).owner;
        let had_room = self.board.has_room(owner);
        self.cards
            .get_mut(&id)
            .expect("enter_play unknown card")
            .zone = GameZone::Board;
        self.board.place(owner, id);
        let mech_ids: Vec<MechanicId> = self.expect_card(id).mechanics.clone();
        for mech_id in mech_ids {
            self.activate_mechanic(mech_id);
        }
        self.publish(EventParams::new(EventKind::EntersPlay).with_target(id));
        if !had_room {
            // Over capacity: the arrival stands, then the newcomer dies with
            // death effects firing.
            self.die(id);
        }
    }

    /// Remove a permanent from the board. Fires `LeavesPlay` (and `UnitDied`
    /// when `died`) while its mechanics are still subscribed, then tears
    /// everything down.
    fn leave_board(&mut self, id: CardId, died: bool) {
        let owner = self.expect_card(id).owner;
        self.publish(EventParams::new(EventKind::LeavesPlay).with_target(id));
        if died {
            self.publish(
                EventParams::new(EventKind::UnitDied)
                    .with_target(id)
                    .with_player(owner),
            );
            self.log.push_back(Notification::UnitDied { unit: id });
        }

        let mech_ids: Vec<MechanicId> = self.expect_card(id).mechanics.clone();
        for mech_id in mech_ids {
            self.remove_mechanic(mech_id);
        }
        self.bus.remove_entity(id);
        self.board.remove(owner, id);
        self.combat_orders.remove(&id);

        if let Some(unit) = self.cards.get_mut(&id).and_then(Card::as_unit_mut) {
            unit.clear_combat();
        }
        // Blockers pointed at a vanished attacker release their declaration.
        let blockers: Vec<CardId> = self
            .units_in_play()
            .filter(|c| c.unit().blocking == Some(id))
            .map(|c| c.id)
            .collect();
        for blocker in blockers {
            if let Some(unit) = self.cards.get_mut(&blocker).and_then(Card::as_unit_mut) {
                unit.blocking = None;
            }
        }
        // Items riding a removed unit are lost with it.
        let hosted: Vec<CardId> = self
            .cards
            .values()
            .filter(|c| c.as_item().is_some_and(|i| i.host == Some(id)))
            .map(|c| c.id)
            .collect();
        for item in hosted {
            self.discard_item(item);
        }
    }

    /// Kill a permanent. Idempotent: off-board cards and cards already
    /// mid-death are left alone, so re-entrant death chains settle cleanly.
    pub fn die(&mut self, id: CardId) {
        if !self.board.contains(id) || self.dying.contains(&id) {
            return;
        }
        self.dying.insert(id);
        let is_unit = self.expect_card(id).is_unit();
        self.leave_board(id, is_unit);
        let owner = {
            let card = self.cards.get_mut(&id).expect("dying card in arena");
            card.zone = GameZone::Crypt;
            card.owner
        };
        self.players[owner].crypt.push(id);
        self.dying.remove(&id);
    }

    /// Destroy a permanent without death triggers.
    pub fn annihilate(&mut self, id: CardId) {
        if !self.board.contains(id) || self.dying.contains(&id) {
            return;
        }
        self.dying.insert(id);
        self.leave_board(id, false);
        let owner = {
            let card = self.cards.get_mut(&id).expect("annihilated card in arena");
            card.zone = GameZone::Crypt;
            card.owner
        };
        self.players[owner].crypt.push(id);
        self.dying.remove(&id);
    }

    /// Attach a played item to its host: the item sits in the Board zone
    /// without a row slot, and each of its grant templates is stamped onto
    /// the host as a fresh mechanic.
    pub(crate) fn attach_item(&mut self, item_id: CardId, host: CardId) {
        let templates: Vec<MechanicTemplate> = self
            .expect_card(item_id)
            .mechanics
            .iter()
            .filter_map(|id| self.mechanics.get(id))
            .filter_map(|m| match &m.kind {
                MechanicKind::GrantOnHost { template } => Some((**template).clone()),
                _ => None,
            })
            .collect();
        {
            let card = self.cards.get_mut(&item_id).expect("item in arena");
            card.zone = GameZone::Board;
            if let Some(item) = card.as_item_mut() {
                item.host = Some(host);
            }
        }
        let mut granted = Vec::new();
        for template in &templates {
            if let Some(id) = self.attach_mechanic(host, template) {
                granted.push(id);
            }
        }
        if let Some(item) = self.cards.get_mut(&item_id).and_then(Card::as_item_mut) {
            item.granted = granted;
        }
    }

    /// Raise an enchantment's power by one and rescale its mechanics to the
    /// new level. Cost payment happens at the action gate.
    pub(crate) fn raise_enchant_power(&mut self, id: CardId) {
        let power = {
            let ench = self
                .cards
                .get_mut(&id)
                .and_then(Card::as_enchant_mut)
                .expect("enchantment in arena");
            ench.power += 1;
            ench.power
        };
        let mech_ids: Vec<MechanicId> = self.expect_card(id).mechanics.clone();
        for mech_id in mech_ids {
            if let Some(mech) = self.mechanics.get_mut(&mech_id) {
                mech.level = power;
            }
        }
        self.publish(
            EventParams::new(EventKind::EnchantmentModified)
                .with_target(id)
                .with_amount(power),
        );
        self.log
            .push_back(Notification::EnchantmentModified { card: id, power });
    }

    pub(crate) fn set_mechanic_targets(&mut self, id: MechanicId, targets: &[CardId]) {
        if let Some(targeter) = self
            .mechanics
            .get_mut(&id)
            .and_then(|m| m.targeter.as_mut())
        {
            if targeter.needs_input() {
                targeter.chosen = targets.to_vec();
            }
        }
    }

    /// Resolve a mechanic's effect now; used by the action gate for
    /// untriggered play effects.
    pub(crate) fn fire_mechanic(&mut self, mech: &Mechanic) {
        self.fire_effect(mech);
    }

    /// Mark a one-shot mechanic spent so evaluation stops counting it.
    pub(crate) fn deplete_mechanic(&mut self, id: MechanicId) {
        if let Some(mech) = self.mechanics.get_mut(&id) {
            mech.depleted = true;
        }
    }

    /// An item leaving play outside combat death: straight to the crypt,
    /// granted mechanics revoked.
    fn discard_item(&mut self, id: CardId) {
        let granted = match self.cards.get_mut(&id).and_then(Card::as_item_mut) {
            Some(item) => {
                item.host = None;
                std::mem::take(&mut item.granted)
            }
            None => return,
        };
        for mech_id in granted {
            self.remove_mechanic(mech_id);
        }
        let owner = {
            let card = self.cards.get_mut(&id).expect("item in arena");
            card.zone = GameZone::Crypt;
            card.owner
        };
        self.players[owner].crypt.push(id);
    }

    /// Return a dead unit to the board as a fresh tenure: stats and
    /// mechanics reset from its proto, arrival events firing again.
    pub fn raise_from_crypt(&mut self, id: CardId) {
        let (owner, proto_id) = {
            let card = self.expect_card(id);
            assert_eq!(card.zone, GameZone::Crypt, "raise target not in crypt");
            (card.owner, card.proto)
        };
        let crypt = &mut self.players[owner].crypt;
        let pos = crypt
            .iter()
            .position(|&c| c == id)
            .expect("crypt card missing from crypt list");
        crypt.remove(pos);

        // Fresh tenure: rebuild the instance from its proto.
        let proto = self.protos.expect(proto_id).clone();
        let old_ids: Vec<MechanicId> = self.expect_card(id).mechanics.clone();
        for mech_id in old_ids {
            self.mechanics.remove(&mech_id);
        }
        let rebuilt = proto.instantiate(id, owner);
        self.cards.insert(id, rebuilt);
        for template in &proto.mechanics {
            self.attach_mechanic(id, template);
        }
        self.enter_play(id);
    }
}

// Damage, drawing, and the win condition.
impl Game {
    /// Route damage through the event pipeline and apply what survives.
    /// Shields rewrite `amount` in flight; death is checked afterwards.
    pub fn deal_damage(&mut self, source: Option<CardId>, target: CardId, amount: i64) {
        if !self.board.contains(target) {
            return;
        }
        let mut params = EventParams::damage(source, target, amount);
        params = self.publish(params);
        let dealt = params.amount.max(0);
        if let Some(unit) = self.cards.get_mut(&target).and_then(Card::as_unit_mut) {
            unit.take_damage(dealt);
        }
        if dealt > 0 {
            let mut done = EventParams::new(EventKind::DamageDealt)
                .with_target(target)
                .with_amount(dealt);
            if let Some(source) = source {
                done = done.with_source(source);
            }
            self.publish(done);
        }
        self.check_death(target);
    }

    fn check_death(&mut self, id: CardId) {
        let dead = self
            .cards
            .get(&id)
            .and_then(Card::as_unit)
            .is_some_and(|u| u.is_dead());
        if dead {
            self.die(id);
        }
    }

    pub(crate) fn damage_player(&mut self, player: PlayerId, amount: i64) {
        self.players[player].life -= amount.max(0);
        if self.players[player].life <= 0 && self.winner.is_none() {
            let winner = player.opponent();
            self.winner = Some(winner);
            self.publish(EventParams::new(EventKind::GameEnded).with_player(winner));
            self.log.push_back(Notification::GameEnded { winner });
        }
    }

    pub(crate) fn draw_card(&mut self, player: PlayerId) {
        let Some(id) = self.players[player].deck.pop() else {
            return;
        };
        self.players[player].hand.push(id);
        self.cards
            .get_mut(&id)
            .expect("drawn card in arena")
            .zone = GameZone::Hand;
        self.log.push_back(Notification::CardDrawn { player, card: id });
        self.publish(
            EventParams::new(EventKind::CardDrawn)
                .with_target(id)
                .with_player(player),
        );
    }
}

// Turn flow.
impl Game {
    pub(crate) fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
        self.log.push_back(Notification::PhaseChanged { phase });
    }

    pub(crate) fn start_turn(&mut self, player: PlayerId) {
        self.turn += 1;
        self.active = player;
        self.set_phase(Phase::Play1);
        self.log.push_back(Notification::TurnStarted {
            player,
            turn: self.turn,
        });

        let state = &mut self.players[player];
        state.resources.refill();
        state.resource_played = false;

        let row: Vec<CardId> = self.board.row(player).to_vec();
        for id in row {
            if let Some(unit) = self.cards.get_mut(&id).and_then(Card::as_unit_mut) {
                unit.ready = true;
                unit.exhausted = false;
            }
        }
        self.draw_card(player);
        self.publish(EventParams::for_player(EventKind::TurnStart, player));
    }

    /// End-of-turn processing: fire turn-end effects, then either pause on a
    /// hand-size discard or hand the next turn over. A choice posed by a
    /// turn-end effect parks the close until its answer arrives.
    pub(crate) fn run_end_phase(&mut self) {
        self.set_phase(Phase::End);
        let active = self.active;
        self.publish(EventParams::for_player(EventKind::TurnEnd, active));
        if self.winner.is_some() {
            return;
        }
        if self.pending_choice.is_some() {
            self.end_phase_parked = true;
            return;
        }
        self.close_end_phase();
    }

    /// The half of end-of-turn that runs with the choice gate free: hand
    /// limit, then handover.
    fn close_end_phase(&mut self) {
        let active = self.active;
        let hand = &self.players[active].hand;
        let excess = hand.len().saturating_sub(self.hand_limit);
        if excess > 0 {
            self.pending_choice = Some(PendingChoice {
                player: active,
                candidates: hand.clone(),
                min: excess,
                max: excess,
                purpose: ChoicePurpose::Discard,
                message: format!("discard {excess} to the hand limit"),
            });
            return;
        }
        self.finish_turn();
    }

    /// Finish a parked end phase once the blocking choice has resolved.
    pub(crate) fn resume_end_phase(&mut self) {
        if self.end_phase_parked && self.pending_choice.is_none() && self.winner.is_none() {
            self.end_phase_parked = false;
            self.close_end_phase();
        }
    }

    pub(crate) fn finish_turn(&mut self) {
        let next = self.active.opponent();
        self.start_turn(next);
    }

    /// Resolve combat for every declared attacker, in row order.
    pub(crate) fn resolve_combat(&mut self) {
        let active = self.active;
        let defender = active.opponent();
        let attackers: Vec<CardId> = self
            .board
            .row(active)
            .iter()
            .copied()
            .filter(|id| {
                self.cards
                    .get(id)
                    .and_then(Card::as_unit)
                    .is_some_and(|u| u.attacking)
            })
            .collect();

        for attacker in attackers {
            // An earlier exchange (or its triggers) may have removed it.
            if !self.board.contains(attacker) {
                continue;
            }
            let damage = self.expect_card(attacker).unit().attack;
            let blocker_ids: Vec<CardId> = self
                .board
                .row(defender)
                .iter()
                .copied()
                .filter(|id| {
                    self.cards
                        .get(id)
                        .and_then(Card::as_unit)
                        .is_some_and(|u| u.blocking == Some(attacker))
                })
                .collect();

            if blocker_ids.is_empty() {
                self.publish(
                    EventParams::new(EventKind::AttackResolved)
                        .with_source(attacker)
                        .with_player(defender)
                        .with_amount(damage),
                );
                self.damage_player(defender, damage);
                if let Some(unit) = self.cards.get_mut(&attacker).and_then(Card::as_unit_mut) {
                    unit.exhausted = true;
                }
                continue;
            }

            let mut memo = EvalMemo::new();
            let rows: Vec<Blocker> = blocker_ids
                .iter()
                .map(|&id| Blocker {
                    id,
                    life: self.expect_card(id).unit().life,
                    value: self.evaluate(id, EvalContext::LethalRemoval, &mut memo),
                })
                .collect();

            let order_ids = match self.combat_orders.remove(&attacker) {
                Some(order) if combat::is_valid_order(&order, &rows) => order,
                _ => combat::default_order(damage, &rows),
            };
            let ordered: Vec<Blocker> = order_ids
                .iter()
                .map(|id| {
                    *rows
                        .iter()
                        .find(|b| b.id == *id)
                        .expect("ordered blocker missing from grouping")
                })
                .collect();
            let hits = combat::distribute(damage, &ordered);
            self.log.push_back(Notification::DamageDistributed {
                attacker,
                order: order_ids.clone(),
            });

            // Snapshot return damage first: the exchange is simultaneous, so
            // a blocker that dies still lands its full attack.
            let returns: Vec<(CardId, i64)> = order_ids
                .iter()
                .map(|&id| (id, self.expect_card(id).unit().attack))
                .collect();
            for hit in hits {
                // Announce the exchange before any damage lands, so hooked
                // effects see both units still standing.
                self.publish(
                    EventParams::new(EventKind::AttackResolved)
                        .with_source(attacker)
                        .with_target(hit.blocker)
                        .with_amount(hit.damage),
                );
                self.publish(
                    EventParams::new(EventKind::BlockResolved)
                        .with_source(hit.blocker)
                        .with_target(attacker)
                        .with_amount(hit.damage),
                );
                self.deal_damage(Some(attacker), hit.blocker, hit.damage);
            }
            for (blocker, attack) in returns {
                self.deal_damage(Some(blocker), attacker, attack);
            }
            for blocker in order_ids {
                if let Some(unit) = self.cards.get_mut(&blocker).and_then(Card::as_unit_mut) {
                    unit.blocking = None;
                }
            }
        }

        // Every surviving attacker leaves the attacking state.
        let row: Vec<CardId> = self.board.row(active).to_vec();
        for id in row {
            if let Some(unit) = self.cards.get_mut(&id).and_then(Card::as_unit_mut) {
                unit.attacking = false;
            }
        }
        self.combat_orders.clear();
    }
}

// Shared with actions.rs.
impl Game {
    pub(crate) fn rng_mut(&mut self) -> &mut GameRng {
        &mut self.rng
    }

    pub(crate) fn player_mut(&mut self, player: PlayerId) -> &mut PlayerState {
        &mut self.players[player]
    }

    pub(crate) fn card_mut(&mut self, id: CardId) -> Option<&mut Card> {
        self.cards.get_mut(&id)
    }

    pub(crate) fn take_pending_choice(&mut self) -> Option<PendingChoice> {
        self.pending_choice.take()
    }

    pub(crate) fn set_pending_choice(&mut self, choice: PendingChoice) {
        debug_assert!(self.pending_choice.is_none());
        self.pending_choice = Some(choice);
    }

    pub(crate) fn pop_mulligan_queue(&mut self) -> Option<PlayerId> {
        self.mulligan_queue.pop()
    }

    pub(crate) fn set_combat_order(&mut self, attacker: CardId, order: Vec<CardId>) {
        self.combat_orders.insert(attacker, order);
    }

    pub(crate) fn push_notification(&mut self, notification: Notification) {
        self.log.push_back(notification);
    }
}

/// Assembles a game: protos, decks, starting totals, and the opening flow.
#[derive(Debug)]
pub struct GameBuilder {
    seed: u64,
    capacity: usize,
    starting_life: i64,
    opening_hand: usize,
    hand_limit: usize,
    mulligan: bool,
    protos: ProtoRegistry,
    decks: PlayerMap<Vec<ProtoId>>,
}

impl Default for GameBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GameBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            seed: 0,
            capacity: DEFAULT_CAPACITY,
            starting_life: 20,
            opening_hand: 4,
            hand_limit: 7,
            mulligan: false,
            protos: ProtoRegistry::new(),
            decks: PlayerMap::with_default(),
        }
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_starting_life(mut self, life: i64) -> Self {
        self.starting_life = life;
        self
    }

    #[must_use]
    pub fn with_opening_hand(mut self, cards: usize) -> Self {
        self.opening_hand = cards;
        self
    }

    #[must_use]
    pub fn with_hand_limit(mut self, limit: usize) -> Self {
        self.hand_limit = limit;
        self
    }

    /// Offer each player one optional opening-hand replacement.
    #[must_use]
    pub fn with_mulligan(mut self) -> Self {
        self.mulligan = true;
        self
    }

    /// Register a proto through the builder's registry.
    pub fn register_proto(
        &mut self,
        build: impl FnOnce(ProtoId) -> crate::cards::CardProto,
    ) -> ProtoId {
        self.protos.register(build)
    }

    #[must_use]
    pub fn with_deck(mut self, player: PlayerId, protos: Vec<ProtoId>) -> Self {
        self.decks[player] = protos;
        self
    }

    /// Build the game: instantiate decks, shuffle, draw opening hands, and
    /// either pose the first mulligan or start player one's turn.
    #[must_use]
    pub fn build(self) -> Game {
        let mut game = Game {
            cards: FxHashMap::default(),
            mechanics: FxHashMap::default(),
            next_card: 0,
            next_mechanic: 0,
            protos: self.protos,
            board: Board::new(self.capacity),
            bus: EventBus::new(),
            players: PlayerMap::new(|_| PlayerState::new(self.starting_life)),
            turn: 0,
            active: PlayerId::ONE,
            phase: Phase::Play1,
            pending_choice: None,
            mulligan_queue: Vec::new(),
            combat_orders: FxHashMap::default(),
            end_phase_parked: false,
            dying: FxHashSet::default(),
            hand_limit: self.hand_limit,
            winner: None,
            log: Vector::new(),
            rng: GameRng::new(self.seed),
        };

        for player in PlayerId::both() {
            for proto in &self.decks[player] {
                let id = game.create_card(*proto, player);
                game.players[player].deck.push(id);
            }
            let mut deck = std::mem::take(&mut game.players[player].deck);
            game.rng.shuffle(&mut deck);
            game.players[player].deck = deck;
            for _ in 0..self.opening_hand {
                game.draw_card(player);
            }
        }

        if self.mulligan {
            game.mulligan_queue.push(PlayerId::TWO);
            let hand = game.players[PlayerId::ONE].hand.clone();
            game.pending_choice = Some(PendingChoice {
                player: PlayerId::ONE,
                candidates: hand,
                min: 0,
                max: self.opening_hand,
                purpose: ChoicePurpose::Mulligan,
                message: String::from("return any number of cards to redraw"),
            });
        } else {
            game.start_turn(PlayerId::ONE);
        }
        game
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::{CardProto, Cost, ProtoKind};
    use crate::game::Action;
    use crate::mechanics::{MechanicKey, TriggerKind};

    /// One free 2/2 in player one's hand, already played onto the board.
    fn game_with_unit() -> (Game, CardId) {
        let mut builder = GameBuilder::new().with_seed(1).with_opening_hand(1);
        let proto = builder.register_proto(|id| {
            CardProto::new(id, "Husk", Cost::free(), ProtoKind::Unit { attack: 2, life: 2 })
        });
        let mut game = builder.with_deck(PlayerId::ONE, vec![proto]).build();
        let card = game.players[PlayerId::ONE].hand[0];
        game.submit(
            PlayerId::ONE,
            Action::PlayCard {
                card,
                targets: vec![],
                host: None,
            },
        )
        .unwrap();
        (game, card)
    }

    fn poison() -> MechanicTemplate {
        MechanicTemplate::new(MechanicKey::POISON, MechanicKind::Poison { per_turn: 1 })
    }

    #[test]
    fn test_stacking_does_not_duplicate_subscriptions() {
        let (mut game, unit) = game_with_unit();

        let first = game.attach_mechanic(unit, &poison()).unwrap();
        let second = game.attach_mechanic(unit, &poison()).unwrap();

        assert_eq!(first, second);
        assert_eq!(game.mechanics[&first].level, 2);
        assert_eq!(
            game.bus
                .handler_count(EventScope::Global, EventKind::TurnEnd),
            1
        );
        assert_eq!(game.expect_card(unit).mechanics.len(), 1);
    }

    #[test]
    fn test_immune_key_refuses_attachment() {
        let (mut game, unit) = game_with_unit();
        game.cards
            .get_mut(&unit)
            .unwrap()
            .unit_mut()
            .immune
            .insert(MechanicKey::POISON);

        assert_eq!(game.attach_mechanic(unit, &poison()), None);
        assert!(game.expect_card(unit).mechanics.is_empty());
    }

    #[test]
    fn test_death_releases_every_subscription() {
        let (mut game, unit) = game_with_unit();
        let shield = MechanicTemplate::new(
            MechanicKey::SHIELD,
            MechanicKind::PreventDamage { amount: 1 },
        );
        let on_death = MechanicTemplate::new(MechanicKey(40), MechanicKind::DrawCards { count: 1 })
            .with_trigger(TriggerKind::OnDeath);
        game.attach_mechanic(unit, &shield);
        game.attach_mechanic(unit, &on_death);
        game.attach_mechanic(unit, &poison());
        assert!(game.bus.len() > 0);

        game.die(unit);

        assert!(game.bus.is_empty());
        assert_eq!(game.expect_card(unit).zone, GameZone::Crypt);
        assert!(game.expect_card(unit).mechanics.is_empty());
    }

    #[test]
    fn test_die_is_idempotent() {
        let (mut game, unit) = game_with_unit();
        game.die(unit);
        let crypt_len = game.players[PlayerId::ONE].crypt.len();
        game.die(unit);
        assert_eq!(game.players[PlayerId::ONE].crypt.len(), crypt_len);
    }

    #[test]
    fn test_raise_resets_to_proto_state() {
        let (mut game, unit) = game_with_unit();
        game.deal_damage(None, unit, 1);
        assert_eq!(game.expect_card(unit).unit().life, 1);

        game.die(unit);
        game.raise_from_crypt(unit);

        let card = game.expect_card(unit);
        assert_eq!(card.zone, GameZone::Board);
        assert_eq!(card.unit().life, 2);
        assert!(!card.unit().ready);
        assert!(game.board.contains(unit));
        assert!(game.players[PlayerId::ONE].crypt.is_empty());
    }

    #[test]
    fn test_stacked_static_grants_and_unwinds_cleanly() {
        let (mut game, unit) = game_with_unit();
        let banner = MechanicTemplate::new(
            MechanicKey(21),
            MechanicKind::StatBonus { attack: 2, life: 2 },
        );

        let id = game.attach_mechanic(unit, &banner).unwrap();
        assert_eq!(game.expect_card(unit).unit().attack, 4);

        let same = game.attach_mechanic(unit, &banner).unwrap();
        assert_eq!(id, same);
        assert_eq!(game.expect_card(unit).unit().attack, 6);
        assert_eq!(game.expect_card(unit).unit().life, 6);

        game.remove_mechanic(id);
        let state = game.expect_card(unit).unit();
        assert_eq!(state.attack, 2);
        assert_eq!(state.max_life, 2);
        assert_eq!(state.life, 2);
    }

    #[test]
    fn test_stacked_static_preserves_damage_taken() {
        let (mut game, unit) = game_with_unit();
        let banner = MechanicTemplate::new(
            MechanicKey(21),
            MechanicKind::StatBonus { attack: 0, life: 2 },
        );
        game.attach_mechanic(unit, &banner).unwrap();
        game.deal_damage(None, unit, 3);
        assert_eq!(game.expect_card(unit).unit().life, 1);

        // The new stack raises the ceiling without erasing the wound.
        game.attach_mechanic(unit, &banner).unwrap();
        let state = game.expect_card(unit).unit();
        assert_eq!(state.max_life, 6);
        assert_eq!(state.life, 3);
    }

    #[test]
    fn test_targeted_value_scales_with_reach() {
        let mut builder = GameBuilder::new().with_seed(3).with_opening_hand(0);
        let grunt = builder.register_proto(|id| {
            CardProto::new(id, "Grunt", Cost::free(), ProtoKind::Unit { attack: 2, life: 2 })
        });
        let bolt = builder.register_proto(|id| {
            CardProto::new(id, "Bolt", Cost::free(), ProtoKind::Unit { attack: 1, life: 1 })
                .with_mechanic(MechanicTemplate::new(
                    MechanicKey(30),
                    MechanicKind::DealDamage { amount: 2 },
                ))
                .with_targeter(Targeter::new(TargetWho::AnyUnit, 1))
        });
        let storm = builder.register_proto(|id| {
            CardProto::new(id, "Storm", Cost::free(), ProtoKind::Unit { attack: 1, life: 1 })
                .with_mechanic(
                    MechanicTemplate::new(MechanicKey(31), MechanicKind::DealDamage { amount: 2 })
                        .with_targeter(Targeter::new(TargetWho::AllUnits, 0)),
                )
        });
        let mut game = builder.with_deck(PlayerId::ONE, vec![bolt, storm]).build();
        let deck = game.players[PlayerId::ONE].deck.clone();
        let hand = game.players[PlayerId::ONE].hand.clone();
        let find = |g: &Game, p: ProtoId| {
            deck.iter()
                .chain(hand.iter())
                .copied()
                .find(|&c| g.expect_card(c).proto == p)
                .expect("proto in arena")
        };
        let bolt_card = find(&game, bolt);
        let storm_card = find(&game, storm);

        // Empty board: neither effect reaches anything.
        let mut memo = EvalMemo::new();
        let idle = game.evaluate(bolt_card, EvalContext::Play, &mut memo);

        for _ in 0..3 {
            let id = game.create_card(grunt, PlayerId::TWO);
            game.enter_play(id);
        }
        let mut memo = EvalMemo::new();
        let single = game.evaluate(bolt_card, EvalContext::Play, &mut memo);
        let sweep = game.evaluate(storm_card, EvalContext::Play, &mut memo);

        assert!(idle < single);
        assert!(single < sweep);
        // One extra hit per extra unit reached.
        assert_eq!(sweep - single, 4.0);
    }

    #[test]
    fn test_shield_rewrites_damage_in_flight() {
        let (mut game, unit) = game_with_unit();
        let shield = MechanicTemplate::new(
            MechanicKey::SHIELD,
            MechanicKind::PreventDamage { amount: 3 },
        );
        game.attach_mechanic(unit, &shield);

        game.deal_damage(None, unit, 2);
        assert_eq!(game.expect_card(unit).unit().life, 2);

        // Charge is down to 1; the next hit gets 1 absorbed.
        game.deal_damage(None, unit, 2);
        assert_eq!(game.expect_card(unit).unit().life, 1);
    }

    #[test]
    fn test_builder_same_seed_same_hands() {
        let build = || {
            let mut builder = GameBuilder::new().with_seed(11).with_opening_hand(3);
            let proto = builder.register_proto(|id| {
                CardProto::new(id, "Husk", Cost::free(), ProtoKind::Unit { attack: 1, life: 1 })
            });
            builder
                .with_deck(PlayerId::ONE, vec![proto; 8])
                .with_deck(PlayerId::TWO, vec![proto; 8])
                .build()
        };
        let a = build();
        let b = build();
        assert_eq!(a.players[PlayerId::ONE].hand, b.players[PlayerId::ONE].hand);
        assert_eq!(a.players[PlayerId::TWO].deck, b.players[PlayerId::TWO].deck);
    }

    #[test]
    fn test_evaluate_is_side_effect_free() {
        let (game, unit) = game_with_unit();
        let before = game.snapshot();
        let mut memo = EvalMemo::new();
        let value = game.evaluate(unit, EvalContext::Play, &mut memo);
        assert!(value > 0.0);
        assert_eq!(game.snapshot(), before);
    }
}

