//! Hostile scoring and primary-target selection.
//! Ordering is total: score descending, then entity id ascending.

use std::cmp::Ordering;

use super::*;

const SCORE_BASE: f32 = 100.0;
const LEVEL_STEP: f32 = 0.05;
const LEVEL_CLAMP: f32 = 10.0;
const BOSS_MULTIPLIER: f32 = 3.0;
const ELITE_MULTIPLIER: f32 = 1.75;
const CURRENT_TARGET_BONUS: f32 = 25.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TargetScore {
    pub id: EntityId,
    pub score: f32,
}

#[derive(Clone, Copy, Debug)]
pub(super) struct TargetingParams {
    pub(super) engagement_range: f32,
    pub(super) leash_range: f32,
    pub(super) tactics: TacticsMode,
    pub(super) boss_mode: bool,
}

/// Ranks every eligible hostile, best first.
pub(super) fn rank_targets(
    snapshot: &WorldSnapshot,
    current: Option<EntityId>,
    ignored: &BTreeSet<EntityId>,
    params: TargetingParams,
) -> Vec<TargetScore> {
    let boss_present = params.boss_mode
        && snapshot
            .hostiles_within(params.leash_range)
            .any(|entity| entity.is_boss() && !ignored.contains(&entity.id));

    let mut ranked: Vec<TargetScore> = snapshot
        .entities
        .iter()
        .filter(|entity| entity.is_valid_target() && !ignored.contains(&entity.id))
        .filter(|entity| {
            let dist = snapshot.distance_to(entity);
            let is_current = current == Some(entity.id);
            dist <= params.engagement_range || (is_current && dist <= params.leash_range)
        })
        .filter(|entity| {
            params.tactics != TacticsMode::BossOnly || entity.is_boss() || entity.is_elite()
        })
        .filter(|entity| !boss_present || entity.is_boss())
        .map(|entity| TargetScore {
            id: entity.id,
            score: score_entity(snapshot, entity, current == Some(entity.id)),
        })
        .collect();

    ranked.sort_by(|a, b| match b.score.total_cmp(&a.score) {
        Ordering::Equal => a.id.cmp(&b.id),
        other => other,
    });
    ranked
}

pub(super) fn score_entity(snapshot: &WorldSnapshot, entity: &Entity, is_current: bool) -> f32 {
    let distance = snapshot.distance_to(entity);
    let delta = entity.level as f32 - snapshot.player.level as f32;
    let level_factor = 1.0 + LEVEL_STEP * delta.clamp(-LEVEL_CLAMP, LEVEL_CLAMP);
    let kind_multiplier = if entity.is_boss() {
        BOSS_MULTIPLIER
    } else if entity.is_elite() {
        ELITE_MULTIPLIER
    } else {
        1.0
    };
    let bonus = if is_current { CURRENT_TARGET_BONUS } else { 0.0 };
    SCORE_BASE / (1.0 + distance) * level_factor * kind_multiplier + bonus
}
