use std::collections::BTreeMap;

use super::*;
use crate::sim::{Command, RecordingActuator};
use crate::test_support::{at_ms, snapshot_at};

fn abilities() -> Vec<AbilityDescriptor> {
    vec![
        AbilityDescriptor::offensive("strike", "F1", 1000, 3.0).with_priority(2),
        AbilityDescriptor::offensive("bolt", "F2", 3000, 15.0).with_priority(1),
        AbilityDescriptor::defensive("mend", "F3", 10_000).with_priority(5),
        AbilityDescriptor::mobility("dash", "F4", 5000),
    ]
}

fn engine(config: CombatConfig) -> CombatEngine {
    CombatEngine::new(&config, abilities())
}

fn with_health(snapshot: WorldSnapshot, health: f32) -> WorldSnapshot {
    let mut snapshot = snapshot;
    snapshot.player.health = health;
    snapshot
}

fn ability(binding: &str, target: Option<WorldPos>) -> Command {
    Command::Ability { binding: binding.to_string(), target }
}

#[test]
fn low_health_retreats_on_the_same_tick() {
    let mut combat = engine(CombatConfig::default());
    let mut actuator = RecordingActuator::new();
    let t0 = Instant::now();
    combat.start(t0);

    let snapshot =
        with_health(snapshot_at(0.0, 0.0).with_entity(Entity::monster(1, WorldPos::flat(2.0, 0.0))), 25.0);
    let state = combat.tick(&snapshot, &mut actuator, t0).expect("linked");

    assert_eq!(state, CombatState::Retreating);
    let away = WorldPos::flat(-10.0, 0.0);
    assert_eq!(
        actuator.commands(),
        &[ability("F3", None), ability("F4", Some(away)), Command::Move(away)]
    );
}

#[test]
fn retreat_holds_until_health_recovers_past_the_heal_threshold() {
    let mut combat = engine(CombatConfig::default());
    let mut actuator = RecordingActuator::new();
    let t0 = Instant::now();
    combat.start(t0);
    let base = snapshot_at(0.0, 0.0).with_entity(Entity::monster(1, WorldPos::flat(2.0, 0.0)));

    combat.tick(&with_health(base.clone(), 25.0), &mut actuator, t0).expect("linked");
    let state = combat.tick(&with_health(base.clone(), 40.0), &mut actuator, at_ms(t0, 50)).expect("linked");
    assert_eq!(state, CombatState::Retreating, "0.4 is still below the heal threshold");

    let state = combat.tick(&with_health(base, 60.0), &mut actuator, at_ms(t0, 100)).expect("linked");
    assert_eq!(state, CombatState::Fighting);
}

#[test]
fn abilities_are_never_reissued_inside_their_cooldown() {
    let mut combat = engine(CombatConfig::default());
    let mut actuator = RecordingActuator::new();
    let t0 = Instant::now();
    combat.start(t0);
    let snapshot = snapshot_at(0.0, 0.0).with_entity(Entity::monster(1, WorldPos::flat(2.0, 0.0)));

    let mut uses: BTreeMap<String, Vec<u64>> = BTreeMap::new();
    for step in 0..100u64 {
        let ms = step * 100;
        actuator.clear();
        combat.tick(&snapshot, &mut actuator, at_ms(t0, ms)).expect("linked");
        for binding in actuator.abilities_used() {
            uses.entry(binding.to_string()).or_default().push(ms);
        }
    }

    assert_eq!(uses["F1"][..3], [0, 1000, 2000]);
    assert_eq!(uses["F2"][..2], [100, 3100]);
    for (binding, cooldown) in [("F1", 1000), ("F2", 3000)] {
        for pair in uses[binding].windows(2) {
            assert!(pair[1] - pair[0] >= cooldown, "{binding} reused after {}ms", pair[1] - pair[0]);
        }
    }
}

#[test]
fn refused_ability_falls_through_to_the_next_candidate() {
    let mut combat = engine(CombatConfig::default());
    let mut actuator = RecordingActuator::new();
    actuator.fail_binding("F1");
    let t0 = Instant::now();
    combat.start(t0);
    let snapshot = snapshot_at(0.0, 0.0).with_entity(Entity::monster(1, WorldPos::flat(2.0, 0.0)));

    let state = combat.tick(&snapshot, &mut actuator, t0).expect("linked");
    assert_eq!(state, CombatState::Fighting);
    assert_eq!(actuator.abilities_used(), vec!["F2"]);

    let strike = combat.abilities().find("strike").expect("registered");
    assert!(combat.abilities().last_used(strike).is_none(), "refused use starts no cooldown");

    // Everything left is cooling down; in reach, so hold position.
    let state = combat.tick(&snapshot, &mut actuator, at_ms(t0, 100)).expect("linked");
    assert_eq!(state, CombatState::Fighting);
    assert_eq!(actuator.commands().len(), 1);
}

#[test]
fn dead_target_counts_a_kill_and_ends_combat() {
    let mut combat = engine(CombatConfig::default());
    let mut actuator = RecordingActuator::new();
    let t0 = Instant::now();
    combat.start(t0);
    let alive = snapshot_at(0.0, 0.0).with_entity(Entity::monster(1, WorldPos::flat(2.0, 0.0)));
    combat.tick(&alive, &mut actuator, t0).expect("linked");
    assert_eq!(combat.target(), Some(EntityId(1)));

    let dead = snapshot_at(0.0, 0.0).with_entity(Entity::monster(1, WorldPos::flat(2.0, 0.0)).dead());
    let state = combat.tick(&dead, &mut actuator, at_ms(t0, 500)).expect("linked");

    assert_eq!(state, CombatState::Idle);
    let stats = combat.stats();
    assert_eq!(stats.monsters_killed, 1);
    assert_eq!(stats.bosses_killed, 0);
    assert_eq!(stats.total_combat_time, Duration::from_millis(500));
    assert_eq!(stats.average_kill_time(), Some(Duration::from_millis(500)));
}

#[test]
fn vanished_target_is_not_a_kill() {
    let mut combat = engine(CombatConfig::default());
    let mut actuator = RecordingActuator::new();
    let t0 = Instant::now();
    combat.start(t0);
    let alive = snapshot_at(0.0, 0.0).with_entity(Entity::monster(1, WorldPos::flat(2.0, 0.0)));
    combat.tick(&alive, &mut actuator, t0).expect("linked");
    combat.tick(&snapshot_at(0.0, 0.0), &mut actuator, at_ms(t0, 50)).expect("linked");
    assert_eq!(combat.stats().monsters_killed, 0);
    assert!(combat.is_idle());
}

#[test]
fn boss_kill_is_counted_separately() {
    let mut combat = engine(CombatConfig::default());
    let mut actuator = RecordingActuator::new();
    let t0 = Instant::now();
    combat.start_boss_fight(t0);
    let boss = Entity::boss(9, WorldPos::flat(3.0, 0.0));
    let state = combat
        .tick(&snapshot_at(0.0, 0.0).with_entity(boss.clone()), &mut actuator, t0)
        .expect("linked");
    assert_eq!(state, CombatState::BossFight);
    assert!(combat.is_boss_engaged());

    combat
        .tick(&snapshot_at(0.0, 0.0).with_entity(boss.dead()), &mut actuator, at_ms(t0, 50))
        .expect("linked");
    assert_eq!(combat.stats().bosses_killed, 1);
    assert_eq!(combat.stats().monsters_killed, 1);
    assert!(!combat.is_boss_engaged());
}

#[test]
fn current_target_survives_a_slightly_better_candidate() {
    let mut combat = engine(CombatConfig::default());
    let mut actuator = RecordingActuator::new();
    let t0 = Instant::now();
    combat.start(t0);
    let scene = |b_x: f32| {
        snapshot_at(0.0, 0.0)
            .with_entity(Entity::monster(1, WorldPos::flat(9.0, 0.0)))
            .with_entity(Entity::monster(2, WorldPos::flat(b_x, 0.0)))
    };

    combat.tick(&scene(12.0), &mut actuator, t0).expect("linked");
    assert_eq!(combat.target(), Some(EntityId(1)));

    // 100/6 does not beat 100/10 + 25.
    combat.tick(&scene(5.0), &mut actuator, at_ms(t0, 1600)).expect("linked");
    assert_eq!(combat.target(), Some(EntityId(1)));

    // 100/2 does.
    combat.tick(&scene(1.0), &mut actuator, at_ms(t0, 3200)).expect("linked");
    assert_eq!(combat.target(), Some(EntityId(2)));
}

#[test]
fn kiting_fires_then_backs_away_inside_the_kite_distance() {
    let mut combat = engine(CombatConfig { tactics: TacticsMode::Kiting, ..CombatConfig::default() });
    let mut actuator = RecordingActuator::new();
    let t0 = Instant::now();
    combat.start(t0);
    let monster = WorldPos::flat(5.0, 0.0);
    let snapshot = snapshot_at(0.0, 0.0).with_entity(Entity::monster(1, monster));

    let state = combat.tick(&snapshot, &mut actuator, t0).expect("linked");
    assert_eq!(state, CombatState::Kiting);
    assert_eq!(
        actuator.commands(),
        &[ability("F2", Some(monster)), Command::Move(WorldPos::flat(-10.0, 0.0))]
    );
}

#[test]
fn moderate_damage_heals_without_disengaging() {
    let mut combat = engine(CombatConfig::default());
    let mut actuator = RecordingActuator::new();
    let t0 = Instant::now();
    combat.start(t0);
    let monster = WorldPos::flat(2.0, 0.0);
    let snapshot = with_health(snapshot_at(0.0, 0.0).with_entity(Entity::monster(1, monster)), 45.0);

    let state = combat.tick(&snapshot, &mut actuator, t0).expect("linked");
    assert_eq!(state, CombatState::Healing);
    assert_eq!(actuator.commands(), &[ability("F3", None), ability("F1", Some(monster))]);
}

#[test]
fn target_out_of_every_range_is_approached() {
    let mut combat = engine(CombatConfig::default());
    let mut actuator = RecordingActuator::new();
    let t0 = Instant::now();
    combat.start(t0);
    let monster = WorldPos::flat(20.0, 0.0);
    let snapshot = snapshot_at(0.0, 0.0).with_entity(Entity::monster(1, monster));

    let state = combat.tick(&snapshot, &mut actuator, t0).expect("linked");
    assert_eq!(state, CombatState::Engaging);
    assert_eq!(actuator.commands(), &[Command::Move(monster)]);
}

#[test]
fn tactics_and_boss_mode_shift_thresholds() {
    let mut balanced = engine(CombatConfig::default());
    let (retreat, heal) = balanced.effective_thresholds();
    assert!((retreat - 0.3).abs() < 1e-6 && (heal - 0.5).abs() < 1e-6);

    balanced.start_boss_fight(Instant::now());
    let (retreat, heal) = balanced.effective_thresholds();
    assert!((retreat - 0.4).abs() < 1e-6 && (heal - 0.6).abs() < 1e-6);

    let aggressive = engine(CombatConfig { tactics: TacticsMode::Aggressive, ..CombatConfig::default() });
    let (retreat, _) = aggressive.effective_thresholds();
    assert!((retreat - 0.15).abs() < 1e-6);

    let mut cautious = engine(CombatConfig {
        tactics: TacticsMode::Defensive,
        heal_health: 0.9,
        ..CombatConfig::default()
    });
    cautious.start_boss_fight(Instant::now());
    let (_, heal) = cautious.effective_thresholds();
    assert!((heal - 0.95).abs() < 1e-6, "capped, got {heal}");
}

#[test]
fn long_engagement_ignores_the_target_and_moves_on() {
    let config =
        CombatConfig { max_engagement_ms: 1000, retarget_interval_ms: 200, ..CombatConfig::default() };
    let mut combat = engine(config);
    let mut actuator = RecordingActuator::new();
    let t0 = Instant::now();
    combat.start(t0);
    let snapshot = snapshot_at(0.0, 0.0)
        .with_entity(Entity::monster(1, WorldPos::flat(2.0, 0.0)))
        .with_entity(Entity::monster(2, WorldPos::flat(6.0, 0.0)));

    combat.tick(&snapshot, &mut actuator, t0).expect("linked");
    assert_eq!(combat.target(), Some(EntityId(1)));
    combat.tick(&snapshot, &mut actuator, at_ms(t0, 1100)).expect("linked");
    assert_eq!(combat.target(), Some(EntityId(2)));
    combat.tick(&snapshot, &mut actuator, at_ms(t0, 1400)).expect("linked");
    assert_eq!(combat.target(), Some(EntityId(2)), "ignored target stays ignored");
}

#[test]
fn stopping_clears_the_target_but_keeps_cooldowns() {
    let mut combat = engine(CombatConfig::default());
    let mut actuator = RecordingActuator::new();
    let t0 = Instant::now();
    combat.start(t0);
    let snapshot = snapshot_at(0.0, 0.0).with_entity(Entity::monster(1, WorldPos::flat(2.0, 0.0)));
    combat.tick(&snapshot, &mut actuator, t0).expect("linked");
    combat.stop(at_ms(t0, 10));
    assert!(combat.target().is_none());

    let strike = combat.abilities().find("strike").expect("registered");
    assert!(!combat.abilities().is_ready(strike, at_ms(t0, 20)));
}

#[test]
fn link_loss_is_propagated() {
    let mut combat = engine(CombatConfig::default());
    let mut actuator = RecordingActuator::new();
    actuator.set_linked(false);
    let t0 = Instant::now();
    combat.start(t0);
    let snapshot = snapshot_at(0.0, 0.0).with_entity(Entity::monster(1, WorldPos::flat(2.0, 0.0)));
    let result = combat.tick(&snapshot, &mut actuator, t0);
    assert!(matches!(result, Err(ActuatorError::LinkLost(_))));
}

#[test]
fn retreat_is_released_once_no_hostile_remains() {
    let mut combat = engine(CombatConfig::default());
    let mut actuator = RecordingActuator::new();
    let t0 = Instant::now();
    combat.start(t0);
    let threatened = snapshot_at(0.0, 0.0).with_entity(Entity::monster(1, WorldPos::flat(2.0, 0.0)));
    let state = combat.tick(&with_health(threatened, 25.0), &mut actuator, t0).expect("linked");
    assert_eq!(state, CombatState::Retreating);

    actuator.clear();
    let state =
        combat.tick(&with_health(snapshot_at(-10.0, 0.0), 40.0), &mut actuator, at_ms(t0, 50)).expect("linked");
    assert_eq!(state, CombatState::Idle, "0.4 is below the heal threshold but nothing is left to flee");
    assert!(actuator.moves().is_empty());
}

#[test]
fn low_health_without_any_hostile_does_not_retreat() {
    let mut combat = engine(CombatConfig::default());
    let mut actuator = RecordingActuator::new();
    let t0 = Instant::now();
    combat.start(t0);

    let state = combat.tick(&with_health(snapshot_at(0.0, 0.0), 20.0), &mut actuator, t0).expect("linked");
    assert_eq!(state, CombatState::Healing);
    assert_eq!(actuator.commands(), &[ability("F3", None)]);
}

#[test]
fn ready_short_range_ability_closes_in_while_the_long_range_one_cools_down() {
    let mut combat = engine(CombatConfig::default());
    let mut actuator = RecordingActuator::new();
    let t0 = Instant::now();
    combat.start(t0);
    let monster = WorldPos::flat(10.0, 0.0);
    let snapshot = snapshot_at(0.0, 0.0).with_entity(Entity::monster(1, monster));

    let state = combat.tick(&snapshot, &mut actuator, t0).expect("linked");
    assert_eq!(state, CombatState::Fighting);
    assert_eq!(actuator.commands(), &[ability("F2", Some(monster))]);

    actuator.clear();
    let state = combat.tick(&snapshot, &mut actuator, at_ms(t0, 100)).expect("linked");
    assert_eq!(state, CombatState::Engaging);
    assert_eq!(actuator.commands(), &[Command::Move(monster)]);
}

#[test]
fn boss_death_ends_boss_mode_while_adds_remain() {
    let mut combat = engine(CombatConfig::default());
    let mut actuator = RecordingActuator::new();
    let t0 = Instant::now();
    combat.start_boss_fight(t0);
    let add = Entity::monster(2, WorldPos::flat(2.0, 0.0));
    let boss = Entity::boss(9, WorldPos::flat(3.0, 0.0));

    let scene = snapshot_at(0.0, 0.0).with_entity(boss.clone()).with_entity(add.clone());
    combat.tick(&scene, &mut actuator, t0).expect("linked");
    assert_eq!(combat.target(), Some(EntityId(9)));

    let after = snapshot_at(0.0, 0.0).with_entity(boss.dead()).with_entity(add);
    let state = combat.tick(&after, &mut actuator, at_ms(t0, 50)).expect("linked");
    assert_eq!(combat.stats().bosses_killed, 1);
    assert_eq!(state, CombatState::Fighting);
    assert_eq!(combat.target(), Some(EntityId(2)));
    assert!(!combat.is_boss_engaged());

    let (retreat, heal) = combat.effective_thresholds();
    assert!((retreat - 0.3).abs() < 1e-6 && (heal - 0.5).abs() < 1e-6, "boss bonus dropped");
}

#[test]
fn timed_out_target_stays_ignored_after_combat_ends() {
    let config = CombatConfig { max_engagement_ms: 1000, ..CombatConfig::default() };
    let mut combat = engine(config);
    let mut actuator = RecordingActuator::new();
    let t0 = Instant::now();
    let snapshot = snapshot_at(0.0, 0.0).with_entity(Entity::monster(1, WorldPos::flat(2.0, 0.0)));

    combat.start(t0);
    combat.tick(&snapshot, &mut actuator, t0).expect("linked");
    let state = combat.tick(&snapshot, &mut actuator, at_ms(t0, 1100)).expect("linked");
    assert_eq!(state, CombatState::Idle, "the only hostile timed out");
    assert!(combat.is_ignored(EntityId(1)));

    combat.start(at_ms(t0, 1150));
    let state = combat.tick(&snapshot, &mut actuator, at_ms(t0, 1150)).expect("linked");
    assert_eq!(state, CombatState::Idle);
    assert!(combat.target().is_none());

    combat.clear_ignored();
    assert!(!combat.is_ignored(EntityId(1)));
}
