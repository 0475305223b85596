//! The action gate.
//!
//! Every externally-driven state change enters through `Game::submit`. The
//! full precondition set is checked before anything mutates, so a rejected
//! action leaves the game exactly as it was.

use serde::{Deserialize, Serialize};

use crate::cards::{Card, CardKind, GameZone, ResourceKind};
use crate::combat::{self, Blocker};
use crate::core::{CardId, IllegalAction, PlayerId};
use crate::events::{EventKind, EventParams};
use crate::mechanics::MechanicKind;

use super::choice::ChoicePurpose;
use super::phases::Phase;
use super::state::{Game, Notification};

/// A discrete player request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Play a card from hand, with chosen targets and (for items) a host.
    PlayCard {
        card: CardId,
        targets: Vec<CardId>,
        host: Option<CardId>,
    },
    /// Grow the resource pool; once per turn.
    PlayResource { kind: ResourceKind },
    /// Declare a unit as an attacker, or retract the declaration.
    ToggleAttacker { unit: CardId },
    /// Declare a block against an attacker, or clear it with `None`.
    DeclareBlocker {
        unit: CardId,
        attacker: Option<CardId>,
    },
    /// Override the default blocker order for one attacker.
    DistributeDamage {
        attacker: CardId,
        order: Vec<CardId>,
    },
    /// Pay an enchantment's cost again to raise its power.
    ModifyEnchantment { card: CardId },
    /// Answer the outstanding card choice.
    AnswerChoice { picks: Vec<CardId> },
    /// Yield: advance the phase machine.
    Pass,
}

impl Game {
    /// Validate and apply one action. On `Err` nothing has changed.
    pub fn submit(&mut self, player: PlayerId, action: Action) -> Result<(), IllegalAction> {
        if self.winner().is_some() {
            return Err(IllegalAction::GameOver);
        }
        if self.pending_choice().is_some() {
            return match action {
                Action::AnswerChoice { picks } => self.answer_choice(player, picks),
                _ => Err(IllegalAction::ChoicePending),
            };
        }
        if matches!(action, Action::AnswerChoice { .. }) {
            return Err(IllegalAction::InvalidAnswer);
        }
        if self.priority_player() != player {
            return Err(IllegalAction::NotYourTurn { player });
        }

        match action {
            Action::PlayCard {
                card,
                targets,
                host,
            } => self.play_card(player, card, targets, host),
            Action::PlayResource { kind } => self.play_resource(player, kind),
            Action::ToggleAttacker { unit } => self.toggle_attacker(player, unit),
            Action::DeclareBlocker { unit, attacker } => {
                self.declare_blocker(player, unit, attacker)
            }
            Action::DistributeDamage { attacker, order } => {
                self.distribute_damage(attacker, order)
            }
            Action::ModifyEnchantment { card } => self.modify_enchantment(player, card),
            Action::AnswerChoice { .. } => unreachable!("handled above"),
            Action::Pass => {
                self.advance_phase();
                Ok(())
            }
        }
    }

    /// Playability is the conjunction of owner-turn, main phase, payable
    /// cost, and satisfiable targets; callers use it to filter options
    /// instead of submitting and failing.
    #[must_use]
    pub fn is_playable(&self, player: PlayerId, card: CardId) -> bool {
        let Some(card) = self.card(card) else {
            return false;
        };
        if card.zone != GameZone::Hand || self.winner().is_some() || !self.can_take_action() {
            return false;
        }
        let owner_turn = card.owner == player && self.priority_player() == player;
        let phase_ok = self.phase().is_main();
        let cost_ok = self.player(player).resources.meets(&card.cost);
        let targets_ok = card
            .targeter
            .as_ref()
            .map_or(true, |t| t.satisfiable(card, self));
        owner_turn && phase_ok && cost_ok && targets_ok
    }

    fn play_card(
        &mut self,
        player: PlayerId,
        card_id: CardId,
        targets: Vec<CardId>,
        host: Option<CardId>,
    ) -> Result<(), IllegalAction> {
        if !self.phase().is_main() {
            return Err(IllegalAction::WrongPhase {
                phase: self.phase(),
            });
        }
        let card = self.card(card_id).ok_or(IllegalAction::UnknownCard)?;
        if card.owner != player {
            return Err(IllegalAction::NotYourTurn { player });
        }
        if card.zone != GameZone::Hand {
            return Err(IllegalAction::WrongZone);
        }
        if !self.player(player).resources.meets(&card.cost) {
            return Err(IllegalAction::CostNotMet);
        }
        match &card.targeter {
            Some(targeter) => {
                if !targeter.accepts(&targets, card, self) {
                    return Err(IllegalAction::InvalidTarget);
                }
            }
            None => {
                if !targets.is_empty() {
                    return Err(IllegalAction::InvalidTarget);
                }
            }
        }
        let is_item = matches!(card.kind, CardKind::Item(_));
        if is_item {
            let host_id = host.ok_or(IllegalAction::InvalidTarget)?;
            let valid_host = self
                .card(host_id)
                .is_some_and(|h| h.is_unit() && h.owner == player && h.zone == GameZone::Board);
            if !valid_host {
                return Err(IllegalAction::InvalidTarget);
            }
        } else if host.is_some() {
            return Err(IllegalAction::InvalidTarget);
        }

        // All preconditions hold; mutate.
        let cost = card.cost.clone();
        self.player_mut(player).resources.spend(&cost);
        self.player_mut(player).hand.retain(|&c| c != card_id);
        self.set_chosen_targets(card_id, &targets);
        self.push_notification(Notification::CardPlayed {
            player,
            card: card_id,
        });

        if is_item {
            self.attach_item(card_id, host.expect("validated above"));
        } else {
            self.enter_play(card_id);
        }
        self.publish(
            EventParams::new(EventKind::CardPlayed)
                .with_source(card_id)
                .with_player(player),
        );
        self.resolve_immediate_effects(card_id);
        Ok(())
    }

    fn play_resource(
        &mut self,
        player: PlayerId,
        kind: ResourceKind,
    ) -> Result<(), IllegalAction> {
        if !self.phase().is_main() {
            return Err(IllegalAction::WrongPhase {
                phase: self.phase(),
            });
        }
        if self.player(player).resource_played {
            return Err(IllegalAction::CostNotMet);
        }
        let state = self.player_mut(player);
        state.resources.grow(kind);
        state.resource_played = true;
        self.push_notification(Notification::ResourcePlayed { player, kind });
        Ok(())
    }

    fn toggle_attacker(&mut self, player: PlayerId, unit_id: CardId) -> Result<(), IllegalAction> {
        if self.phase() != Phase::Play1 {
            return Err(IllegalAction::WrongPhase {
                phase: self.phase(),
            });
        }
        let card = self.card(unit_id).ok_or(IllegalAction::UnknownCard)?;
        if card.owner != player {
            return Err(IllegalAction::NotYourTurn { player });
        }
        if card.zone != GameZone::Board {
            return Err(IllegalAction::WrongZone);
        }
        let unit = card.as_unit().ok_or(IllegalAction::CannotAttack)?;

        if unit.attacking {
            self.card_mut(unit_id)
                .expect("attacker in arena")
                .unit_mut()
                .attacking = false;
            self.push_notification(Notification::AttackerToggled {
                unit: unit_id,
                attacking: false,
            });
        } else {
            if !unit.can_attack() {
                return Err(IllegalAction::CannotAttack);
            }
            self.card_mut(unit_id)
                .expect("attacker in arena")
                .unit_mut()
                .attacking = true;
            self.push_notification(Notification::AttackerToggled {
                unit: unit_id,
                attacking: true,
            });
            self.publish(
                EventParams::new(EventKind::AttackDeclared)
                    .with_target(unit_id)
                    .with_player(player),
            );
        }
        Ok(())
    }

    fn declare_blocker(
        &mut self,
        player: PlayerId,
        unit_id: CardId,
        attacker: Option<CardId>,
    ) -> Result<(), IllegalAction> {
        if self.phase() != Phase::Block {
            return Err(IllegalAction::WrongPhase {
                phase: self.phase(),
            });
        }
        let card = self.card(unit_id).ok_or(IllegalAction::UnknownCard)?;
        if card.owner != player {
            return Err(IllegalAction::NotYourTurn { player });
        }
        if card.zone != GameZone::Board {
            return Err(IllegalAction::WrongZone);
        }
        let unit = card.as_unit().ok_or(IllegalAction::CannotBlock)?;

        let Some(attacker_id) = attacker else {
            self.card_mut(unit_id)
                .expect("blocker in arena")
                .unit_mut()
                .blocking = None;
            self.push_notification(Notification::BlockDeclared {
                blocker: unit_id,
                attacker: None,
            });
            return Ok(());
        };

        if !unit.can_block() {
            return Err(IllegalAction::CannotBlock);
        }
        let attacking = self
            .card(attacker_id)
            .and_then(Card::as_unit)
            .is_some_and(|u| u.attacking);
        if !attacking {
            return Err(IllegalAction::CannotBlock);
        }
        if !self.block_allowed(unit_id, attacker_id) {
            return Err(IllegalAction::CannotBlock);
        }

        self.card_mut(unit_id)
            .expect("blocker in arena")
            .unit_mut()
            .blocking = Some(attacker_id);
        self.push_notification(Notification::BlockDeclared {
            blocker: unit_id,
            attacker: Some(attacker_id),
        });
        self.publish(
            EventParams::new(EventKind::BlockDeclared)
                .with_source(unit_id)
                .with_target(attacker_id),
        );
        Ok(())
    }

    /// Run the permission-check event chain for one blocker/attacker pair.
    /// Handlers veto by clearing `approved`.
    fn block_allowed(&mut self, blocker: CardId, attacker: CardId) -> bool {
        let blockable = self.publish(EventParams::check(
            EventKind::CheckBlockable,
            None,
            attacker,
        ));
        if !blockable.approved {
            return false;
        }
        let can_block = self.publish(EventParams::check(
            EventKind::CheckCanBlock,
            Some(blocker),
            attacker,
        ));
        can_block.approved
    }

    fn distribute_damage(
        &mut self,
        attacker: CardId,
        order: Vec<CardId>,
    ) -> Result<(), IllegalAction> {
        if self.phase() != Phase::DamageDistribution {
            return Err(IllegalAction::WrongPhase {
                phase: self.phase(),
            });
        }
        let attacking = self
            .card(attacker)
            .and_then(Card::as_unit)
            .is_some_and(|u| u.attacking);
        if !attacking {
            return Err(IllegalAction::InvalidOrder);
        }
        let rows = self.blocker_rows(attacker);
        if rows.is_empty() || !combat::is_valid_order(&order, &rows) {
            return Err(IllegalAction::InvalidOrder);
        }
        self.set_combat_order(attacker, order);
        Ok(())
    }

    fn modify_enchantment(
        &mut self,
        player: PlayerId,
        card_id: CardId,
    ) -> Result<(), IllegalAction> {
        if !self.phase().is_main() {
            return Err(IllegalAction::WrongPhase {
                phase: self.phase(),
            });
        }
        let card = self.card(card_id).ok_or(IllegalAction::UnknownCard)?;
        if card.owner != player {
            return Err(IllegalAction::NotYourTurn { player });
        }
        if card.zone != GameZone::Board {
            return Err(IllegalAction::WrongZone);
        }
        if card.as_enchant().is_none() {
            return Err(IllegalAction::WrongZone);
        }
        if !self.player(player).resources.meets(&card.cost) {
            return Err(IllegalAction::CostNotMet);
        }
        let cost = card.cost.clone();
        self.player_mut(player).resources.spend(&cost);
        self.raise_enchant_power(card_id);
        Ok(())
    }

    fn answer_choice(
        &mut self,
        player: PlayerId,
        picks: Vec<CardId>,
    ) -> Result<(), IllegalAction> {
        let choice = self
            .take_pending_choice()
            .expect("answer_choice requires a pending choice");
        if choice.player != player {
            self.set_pending_choice(choice);
            return Err(IllegalAction::NotYourTurn { player });
        }
        if !choice.accepts(&picks) {
            self.set_pending_choice(choice);
            return Err(IllegalAction::InvalidAnswer);
        }
        self.push_notification(Notification::ChoiceMade {
            player,
            picks: picks.clone(),
        });

        match choice.purpose {
            ChoicePurpose::Mulligan => {
                let count = picks.len();
                for &id in &picks {
                    self.player_mut(player).hand.retain(|&c| c != id);
                    self.card_mut(id).expect("mulligan card in arena").zone = GameZone::Deck;
                    self.player_mut(player).deck.push(id);
                }
                if count > 0 {
                    let mut deck = std::mem::take(&mut self.player_mut(player).deck);
                    self.rng_mut().shuffle(&mut deck);
                    self.player_mut(player).deck = deck;
                    for _ in 0..count {
                        self.draw_card(player);
                    }
                }
                match self.pop_mulligan_queue() {
                    Some(next) => {
                        let hand = self.player(next).hand.clone();
                        let max = hand.len();
                        self.set_pending_choice(super::choice::PendingChoice {
                            player: next,
                            candidates: hand,
                            min: 0,
                            max,
                            purpose: ChoicePurpose::Mulligan,
                            message: String::from("return any number of cards to redraw"),
                        });
                    }
                    None => self.start_turn(PlayerId::ONE),
                }
            }
            ChoicePurpose::Discard => {
                for &id in &picks {
                    self.player_mut(player).hand.retain(|&c| c != id);
                    self.card_mut(id).expect("discarded card in arena").zone = GameZone::Crypt;
                    self.player_mut(player).crypt.push(id);
                }
                self.finish_turn();
            }
            ChoicePurpose::Search => {
                let pick = picks[0];
                self.raise_from_crypt(pick);
                // This search may have interrupted end-of-turn processing.
                self.resume_end_phase();
            }
        }
        Ok(())
    }

    /// The phase machine. Pass drives it; transitions that need no player
    /// input run to completion immediately, firing the same notifications a
    /// manual path would.
    fn advance_phase(&mut self) {
        match self.phase() {
            Phase::Play1 => {
                let attackers = self.declared_attackers();
                if attackers.is_empty() {
                    self.run_end_phase();
                } else if !self.any_legal_block(&attackers) {
                    self.resolve_combat();
                    self.set_phase(Phase::Play2);
                } else {
                    self.set_phase(Phase::Block);
                }
            }
            Phase::Block => {
                if self.any_reorderable_attacker() {
                    self.set_phase(Phase::DamageDistribution);
                } else {
                    self.resolve_combat();
                    self.set_phase(Phase::Play2);
                }
            }
            Phase::DamageDistribution => {
                self.resolve_combat();
                self.set_phase(Phase::Play2);
            }
            Phase::Play2 => {
                self.run_end_phase();
            }
            // End is processed, never waited in; Response is reserved.
            Phase::End | Phase::Response => {}
        }
    }

    fn declared_attackers(&self) -> Vec<CardId> {
        self.board()
            .row(self.active_player())
            .iter()
            .copied()
            .filter(|id| {
                self.card(*id)
                    .and_then(Card::as_unit)
                    .is_some_and(|u| u.attacking)
            })
            .collect()
    }

    fn blockers_of(&self, attacker: CardId) -> Vec<CardId> {
        self.board()
            .row(self.active_player().opponent())
            .iter()
            .copied()
            .filter(|id| {
                self.card(*id)
                    .and_then(Card::as_unit)
                    .is_some_and(|u| u.blocking == Some(attacker))
            })
            .collect()
    }

    fn blocker_rows(&self, attacker: CardId) -> Vec<Blocker> {
        let mut memo = crate::mechanics::EvalMemo::new();
        self.blockers_of(attacker)
            .into_iter()
            .map(|id| Blocker {
                id,
                life: self.expect_card(id).unit().life,
                value: self.evaluate(id, crate::mechanics::EvalContext::LethalRemoval, &mut memo),
            })
            .collect()
    }

    /// Could the defender legally block at least one attacker?
    fn any_legal_block(&mut self, attackers: &[CardId]) -> bool {
        let defender = self.active_player().opponent();
        let candidates: Vec<CardId> = self
            .board()
            .row(defender)
            .iter()
            .copied()
            .filter(|id| {
                self.card(*id)
                    .and_then(Card::as_unit)
                    .is_some_and(|u| u.can_block())
            })
            .collect();
        for &blocker in &candidates {
            for &attacker in attackers {
                if self.block_allowed(blocker, attacker) {
                    return true;
                }
            }
        }
        false
    }

    /// Does any attacker have a multi-block whose order matters?
    fn any_reorderable_attacker(&self) -> bool {
        self.declared_attackers().into_iter().any(|attacker| {
            let rows = self.blocker_rows(attacker);
            let damage = self.expect_card(attacker).unit().attack;
            combat::is_reorderable(damage, &rows)
        })
    }

    fn set_chosen_targets(&mut self, card_id: CardId, targets: &[CardId]) {
        let mech_ids: Vec<_> = {
            let card = self.card_mut(card_id).expect("played card in arena");
            if let Some(targeter) = card.targeter.as_mut() {
                targeter.chosen = targets.to_vec();
            }
            card.mechanics.clone()
        };
        for mech_id in mech_ids {
            self.set_mechanic_targets(mech_id, targets);
        }
    }

    fn resolve_immediate_effects(&mut self, card_id: CardId) {
        let mechs: Vec<_> = self
            .expect_card(card_id)
            .mechanics
            .iter()
            .filter_map(|id| self.mechanic(*id).cloned())
            .filter(|m| {
                m.trigger.is_none()
                    && matches!(
                        m.kind,
                        MechanicKind::DealDamage { .. }
                            | MechanicKind::HealTargets { .. }
                            | MechanicKind::DrawCards { .. }
                            | MechanicKind::Annihilate
                            | MechanicKind::RaiseFromCrypt
                    )
            })
            .collect();
        for mech in mechs {
            self.fire_mechanic(&mech);
            self.deplete_mechanic(mech.id);
        }
    }
}
