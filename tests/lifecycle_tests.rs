//! Permanent lifecycle tests.
//!
//! Covers entry and exit from the board through the public action surface:
//! - Board capacity overflow kills the newcomer with death effects live
//! - Play-time targeted effects, death triggers, and annihilation
//! - Items granting mechanics to a host and dying with it
//! - Enchantment power raises and the per-level rescale
//! - Poison ticks on the owner's turn end; shields absorb in flight

use duelcore::{
    Action, Cost, Game, GameBuilder, GameZone, MechanicKey, MechanicKind, MechanicTemplate,
    PlayerId, ProtoKind, TargetWho, Targeter, TriggerKind,
};
use duelcore::{CardId, CardProto, ProtoId};

fn find_in_hand(game: &Game, player: PlayerId, proto: ProtoId) -> CardId {
    game.player(player)
        .hand
        .iter()
        .copied()
        .find(|&c| game.expect_card(c).proto == proto)
        .expect("proto not in hand")
}

fn play(game: &mut Game, player: PlayerId, card: CardId) {
    play_at(game, player, card, vec![], None);
}

fn play_at(
    game: &mut Game,
    player: PlayerId,
    card: CardId,
    targets: Vec<CardId>,
    host: Option<CardId>,
) {
    game.submit(player, Action::PlayCard { card, targets, host })
        .expect("play should succeed");
}

#[test]
fn test_capacity_overflow_kills_the_newcomer() {
    let mut builder = GameBuilder::new()
        .with_seed(1)
        .with_capacity(1)
        .with_opening_hand(2);
    let grunt = builder.register_proto(|id| {
        CardProto::new(id, "Grunt", Cost::free(), ProtoKind::Unit { attack: 1, life: 1 })
    });
    let mut game = builder
        .with_deck(PlayerId::ONE, vec![grunt, grunt])
        .build();

    let first = game.player(PlayerId::ONE).hand[0];
    let second = game.player(PlayerId::ONE).hand[1];
    play(&mut game, PlayerId::ONE, first);
    play(&mut game, PlayerId::ONE, second);

    assert_eq!(game.board().row(PlayerId::ONE), &[first]);
    assert_eq!(game.expect_card(second).zone, GameZone::Crypt);
    assert_eq!(game.player(PlayerId::ONE).crypt, vec![second]);
}

#[test]
fn test_targeted_damage_on_play() {
    let mut builder = GameBuilder::new().with_seed(4).with_opening_hand(2);
    let grunt = builder.register_proto(|id| {
        CardProto::new(id, "Grunt", Cost::free(), ProtoKind::Unit { attack: 1, life: 3 })
    });
    let thrower = builder.register_proto(|id| {
        CardProto::new(
            id,
            "Bolt Thrower",
            Cost::free(),
            ProtoKind::Unit { attack: 1, life: 1 },
        )
        .with_targeter(Targeter::new(TargetWho::AnyUnit, 1))
        .with_mechanic(MechanicTemplate::new(
            MechanicKey(10),
            MechanicKind::DealDamage { amount: 2 },
        ))
    });
    let mut game = builder
        .with_deck(PlayerId::ONE, vec![grunt, thrower])
        .build();

    let grunt = find_in_hand(&game, PlayerId::ONE, grunt);
    let thrower = find_in_hand(&game, PlayerId::ONE, thrower);
    play(&mut game, PlayerId::ONE, grunt);
    play_at(&mut game, PlayerId::ONE, thrower, vec![grunt], None);

    assert_eq!(game.expect_card(grunt).unit().life, 1);
    // The play effect is one-shot; its mechanic is spent.
    let mech_id = game.expect_card(thrower).mechanics[0];
    assert!(game.mechanic(mech_id).unwrap().depleted);
}

fn martyr_proto(builder: &mut GameBuilder) -> ProtoId {
    builder.register_proto(|id| {
        CardProto::new(id, "Martyr", Cost::free(), ProtoKind::Unit { attack: 0, life: 1 })
            .with_mechanic(
                MechanicTemplate::new(MechanicKey(11), MechanicKind::DrawCards { count: 1 })
                    .with_trigger(TriggerKind::OnDeath),
            )
    })
}

#[test]
fn test_death_trigger_draws_on_kill() {
    let mut builder = GameBuilder::new().with_seed(9).with_opening_hand(6);
    let martyr = martyr_proto(&mut builder);
    let thrower = builder.register_proto(|id| {
        CardProto::new(
            id,
            "Bolt Thrower",
            Cost::free(),
            ProtoKind::Unit { attack: 1, life: 1 },
        )
        .with_targeter(Targeter::new(TargetWho::AnyUnit, 1))
        .with_mechanic(MechanicTemplate::new(
            MechanicKey(10),
            MechanicKind::DealDamage { amount: 2 },
        ))
    });
    // Seven of eight cards are drawn, so the hand always holds both protos
    // and one card remains in the deck for the death trigger.
    let mut game = builder
        .with_deck(PlayerId::ONE, vec![martyr, martyr, martyr, martyr, thrower, thrower, thrower, thrower])
        .build();
    assert_eq!(game.player(PlayerId::ONE).deck.len(), 1);

    let victim = find_in_hand(&game, PlayerId::ONE, martyr);
    play(&mut game, PlayerId::ONE, victim);
    let bolt = find_in_hand(&game, PlayerId::ONE, thrower);
    let hand_before = game.player(PlayerId::ONE).hand.len();
    play_at(&mut game, PlayerId::ONE, bolt, vec![victim], None);

    // Playing spent one hand card; the death trigger drew one back.
    assert_eq!(game.player(PlayerId::ONE).hand.len(), hand_before);
    assert!(game.player(PlayerId::ONE).deck.is_empty());
    assert_eq!(game.expect_card(victim).zone, GameZone::Crypt);
}

#[test]
fn test_annihilate_skips_the_death_trigger() {
    let mut builder = GameBuilder::new().with_seed(9).with_opening_hand(6);
    let martyr = martyr_proto(&mut builder);
    let void = builder.register_proto(|id| {
        CardProto::new(id, "Void", Cost::free(), ProtoKind::Unit { attack: 1, life: 1 })
            .with_targeter(Targeter::new(TargetWho::AnyUnit, 1))
            .with_mechanic(MechanicTemplate::new(
                MechanicKey(12),
                MechanicKind::Annihilate,
            ))
    });
    let mut game = builder
        .with_deck(PlayerId::ONE, vec![martyr, martyr, martyr, martyr, void, void, void, void])
        .build();
    assert_eq!(game.player(PlayerId::ONE).deck.len(), 1);

    let victim = find_in_hand(&game, PlayerId::ONE, martyr);
    play(&mut game, PlayerId::ONE, victim);
    let void = find_in_hand(&game, PlayerId::ONE, void);
    let hand_before = game.player(PlayerId::ONE).hand.len();
    play_at(&mut game, PlayerId::ONE, void, vec![victim], None);

    // No draw: annihilation bypasses the trigger, and the deck stays put.
    assert_eq!(game.player(PlayerId::ONE).hand.len(), hand_before - 1);
    assert_eq!(game.player(PlayerId::ONE).deck.len(), 1);
    assert_eq!(game.expect_card(victim).zone, GameZone::Crypt);
}

#[test]
fn test_item_grants_and_dies_with_host() {
    let mut builder = GameBuilder::new().with_seed(6).with_opening_hand(2);
    let grunt = builder.register_proto(|id| {
        CardProto::new(id, "Grunt", Cost::free(), ProtoKind::Unit { attack: 2, life: 2 })
    });
    let blade = builder.register_proto(|id| {
        CardProto::new(id, "Blade", Cost::free(), ProtoKind::Item).with_mechanic(
            MechanicTemplate::new(
                MechanicKey(13),
                MechanicKind::GrantOnHost {
                    template: Box::new(MechanicTemplate::new(
                        MechanicKey(14),
                        MechanicKind::StatBonus { attack: 2, life: 2 },
                    )),
                },
            ),
        )
    });
    let mut game = builder
        .with_deck(PlayerId::ONE, vec![grunt, blade])
        .build();

    let host = find_in_hand(&game, PlayerId::ONE, grunt);
    let blade = find_in_hand(&game, PlayerId::ONE, blade);
    play(&mut game, PlayerId::ONE, host);
    play_at(&mut game, PlayerId::ONE, blade, vec![], Some(host));

    // The grant lands on the host as a live static bonus.
    let unit = game.expect_card(host).unit();
    assert_eq!(unit.attack, 4);
    assert_eq!(unit.life, 4);
    // The item occupies the Board zone but no row slot.
    assert_eq!(game.expect_card(blade).zone, GameZone::Board);
    assert_eq!(game.board().row(PlayerId::ONE), &[host]);

    game.deal_damage(None, host, 4);

    assert_eq!(game.expect_card(host).zone, GameZone::Crypt);
    assert_eq!(game.expect_card(blade).zone, GameZone::Crypt);
    assert!(game.expect_card(blade).as_item().unwrap().granted.is_empty());
}

#[test]
fn test_item_requires_a_friendly_board_host() {
    let mut builder = GameBuilder::new().with_seed(6).with_opening_hand(2);
    let grunt = builder.register_proto(|id| {
        CardProto::new(id, "Grunt", Cost::free(), ProtoKind::Unit { attack: 2, life: 2 })
    });
    let blade = builder.register_proto(|id| {
        CardProto::new(id, "Blade", Cost::free(), ProtoKind::Item)
    });
    let mut game = builder
        .with_deck(PlayerId::ONE, vec![grunt, blade])
        .build();

    let grunt = find_in_hand(&game, PlayerId::ONE, grunt);
    let blade = find_in_hand(&game, PlayerId::ONE, blade);

    // No host at all.
    assert!(game
        .submit(
            PlayerId::ONE,
            Action::PlayCard {
                card: blade,
                targets: vec![],
                host: None,
            },
        )
        .is_err());
    // A hand card is not a legal host.
    assert!(game
        .submit(
            PlayerId::ONE,
            Action::PlayCard {
                card: blade,
                targets: vec![],
                host: Some(grunt),
            },
        )
        .is_err());
    assert_eq!(game.expect_card(blade).zone, GameZone::Hand);
}

#[test]
fn test_enchantment_power_raises_rescale_mechanics() {
    let mut builder = GameBuilder::new().with_seed(8).with_opening_hand(1);
    let banner = builder.register_proto(|id| {
        CardProto::new(
            id,
            "War Banner",
            Cost::generic(1),
            ProtoKind::Enchantment { power: 1 },
        )
        .with_mechanic(
            MechanicTemplate::new(MechanicKey(15), MechanicKind::DrawCards { count: 1 })
                .with_trigger(TriggerKind::OnTurnStart),
        )
    });
    let mut game = builder.with_deck(PlayerId::ONE, vec![banner]).build();

    game.submit(
        PlayerId::ONE,
        Action::PlayResource {
            kind: duelcore::ResourceKind::Order,
        },
    )
    .unwrap();
    let banner = game.player(PlayerId::ONE).hand[0];
    play(&mut game, PlayerId::ONE, banner);
    assert_eq!(game.expect_card(banner).as_enchant().unwrap().power, 1);

    // The pool was spent on the card; another raise needs the next refill.
    assert!(game
        .submit(PlayerId::ONE, Action::ModifyEnchantment { card: banner })
        .is_err());
    game.submit(PlayerId::ONE, Action::Pass).unwrap();
    game.submit(PlayerId::TWO, Action::Pass).unwrap();
    game.submit(PlayerId::ONE, Action::ModifyEnchantment { card: banner })
        .unwrap();

    assert_eq!(game.expect_card(banner).as_enchant().unwrap().power, 2);
    let mech_id = game.expect_card(banner).mechanics[0];
    assert_eq!(game.mechanic(mech_id).unwrap().level, 2);
}

#[test]
fn test_poison_ticks_only_on_owners_turn_end() {
    let mut builder = GameBuilder::new().with_seed(12).with_opening_hand(1);
    let blighted = builder.register_proto(|id| {
        CardProto::new(id, "Blighted", Cost::free(), ProtoKind::Unit { attack: 1, life: 3 })
            .with_mechanic(MechanicTemplate::new(
                MechanicKey::POISON,
                MechanicKind::Poison { per_turn: 1 },
            ))
    });
    let mut game = builder.with_deck(PlayerId::ONE, vec![blighted]).build();

    let unit = game.player(PlayerId::ONE).hand[0];
    play(&mut game, PlayerId::ONE, unit);
    assert_eq!(game.expect_card(unit).unit().life, 3);

    // Owner's turn end ticks once.
    game.submit(PlayerId::ONE, Action::Pass).unwrap();
    assert_eq!(game.expect_card(unit).unit().life, 2);
    // The opponent's turn end does not.
    game.submit(PlayerId::TWO, Action::Pass).unwrap();
    assert_eq!(game.expect_card(unit).unit().life, 2);
    game.submit(PlayerId::ONE, Action::Pass).unwrap();
    assert_eq!(game.expect_card(unit).unit().life, 1);
}

#[test]
fn test_shield_absorbs_then_depletes() {
    let mut builder = GameBuilder::new().with_seed(13).with_opening_hand(1);
    let warded = builder.register_proto(|id| {
        CardProto::new(id, "Warded", Cost::free(), ProtoKind::Unit { attack: 1, life: 3 })
            .with_mechanic(MechanicTemplate::new(
                MechanicKey::SHIELD,
                MechanicKind::PreventDamage { amount: 2 },
            ))
    });
    let mut game = builder.with_deck(PlayerId::ONE, vec![warded]).build();

    let unit = game.player(PlayerId::ONE).hand[0];
    play(&mut game, PlayerId::ONE, unit);

    game.deal_damage(None, unit, 3);
    assert_eq!(game.expect_card(unit).unit().life, 2);
    // Charge exhausted; further damage lands in full.
    game.deal_damage(None, unit, 1);
    assert_eq!(game.expect_card(unit).unit().life, 1);
}

#[test]
fn test_disable_attack_gates_declaration() {
    let mut builder = GameBuilder::new().with_seed(14).with_opening_hand(1);
    let pacified = builder.register_proto(|id| {
        CardProto::new(id, "Pacified", Cost::free(), ProtoKind::Unit { attack: 3, life: 3 })
            .with_mechanic(MechanicTemplate::new(
                MechanicKey::PACIFY,
                MechanicKind::DisableAttack,
            ))
    });
    let mut game = builder.with_deck(PlayerId::ONE, vec![pacified]).build();

    let unit = game.player(PlayerId::ONE).hand[0];
    play(&mut game, PlayerId::ONE, unit);
    game.submit(PlayerId::ONE, Action::Pass).unwrap();
    game.submit(PlayerId::TWO, Action::Pass).unwrap();

    // Ready, but the disable counter holds.
    assert!(game
        .submit(PlayerId::ONE, Action::ToggleAttacker { unit })
        .is_err());
}

#[test]
fn test_raise_from_crypt_returns_a_fresh_unit() {
    let mut builder = GameBuilder::new().with_seed(16).with_opening_hand(3);
    let grunt = builder.register_proto(|id| {
        CardProto::new(id, "Grunt", Cost::free(), ProtoKind::Unit { attack: 1, life: 3 })
    });
    let thrower = builder.register_proto(|id| {
        CardProto::new(
            id,
            "Bolt Thrower",
            Cost::free(),
            ProtoKind::Unit { attack: 1, life: 1 },
        )
        .with_targeter(Targeter::new(TargetWho::AnyUnit, 1))
        .with_mechanic(MechanicTemplate::new(
            MechanicKey(10),
            MechanicKind::DealDamage { amount: 3 },
        ))
    });
    let necro = builder.register_proto(|id| {
        CardProto::new(id, "Necromancer", Cost::free(), ProtoKind::Unit { attack: 1, life: 2 })
            .with_mechanic(MechanicTemplate::new(
                MechanicKey(17),
                MechanicKind::RaiseFromCrypt,
            ))
    });
    let mut game = builder
        .with_deck(PlayerId::ONE, vec![grunt, thrower, necro])
        .build();

    let grunt = find_in_hand(&game, PlayerId::ONE, grunt);
    let bolt = find_in_hand(&game, PlayerId::ONE, thrower);
    let necro = find_in_hand(&game, PlayerId::ONE, necro);

    play(&mut game, PlayerId::ONE, grunt);
    play_at(&mut game, PlayerId::ONE, bolt, vec![grunt], None);
    assert_eq!(game.expect_card(grunt).zone, GameZone::Crypt);

    // One unit in the crypt: the raise resolves without a choice.
    play(&mut game, PlayerId::ONE, necro);
    assert!(game.pending_choice().is_none());
    let raised = game.expect_card(grunt);
    assert_eq!(raised.zone, GameZone::Board);
    assert_eq!(raised.unit().life, 3);
    assert!(game.player(PlayerId::ONE).crypt.is_empty());
}
