//! Reference loot selector: a rarity floor with deterministic ordering.

use std::cmp::Ordering;

use crate::config::LootConfig;
use crate::ports::LootSelector;
use crate::snapshot::{Entity, ItemCategory, ItemRarity, PlayerState};
use crate::types::EntityId;

#[derive(Clone, Debug)]
pub struct RarityLootFilter {
    min_rarity: ItemRarity,
    seasonal_loot: bool,
}

impl RarityLootFilter {
    pub fn new(config: &LootConfig) -> Self {
        Self { min_rarity: config.min_rarity, seasonal_loot: config.seasonal_loot }
    }

    pub fn accepts(&self, entity: &Entity) -> bool {
        let Some(rarity) = entity.rarity() else {
            return false;
        };
        if entity.category() == Some(ItemCategory::Seasonal) && self.seasonal_loot {
            return true;
        }
        rarity >= self.min_rarity
    }
}

impl LootSelector for RarityLootFilter {
    fn select(&mut self, player: &PlayerState, candidates: &[&Entity]) -> Vec<EntityId> {
        let mut kept: Vec<&Entity> =
            candidates.iter().copied().filter(|entity| self.accepts(entity)).collect();
        kept.sort_by(|a, b| {
            let rarity_cmp = b.rarity().cmp(&a.rarity());
            if rarity_cmp != Ordering::Equal {
                return rarity_cmp;
            }
            let dist_cmp = player
                .position
                .distance_2d(a.position)
                .total_cmp(&player.position.distance_2d(b.position));
            if dist_cmp != Ordering::Equal {
                return dist_cmp;
            }
            a.id.cmp(&b.id)
        });
        kept.into_iter().map(|entity| entity.id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WorldPos;

    #[test]
    fn filter_orders_by_rarity_then_distance_then_id() {
        let player = PlayerState::new(WorldPos::default());
        let junk = Entity::item(1, WorldPos::flat(1.0, 0.0), ItemRarity::Normal);
        let far_rare = Entity::item(2, WorldPos::flat(8.0, 0.0), ItemRarity::Rare);
        let near_rare = Entity::item(3, WorldPos::flat(2.0, 0.0), ItemRarity::Rare);
        let unique = Entity::item(4, WorldPos::flat(9.0, 0.0), ItemRarity::Unique);
        let twin = Entity::item(5, WorldPos::flat(-2.0, 0.0), ItemRarity::Rare);

        let mut filter = RarityLootFilter::new(&LootConfig::default());
        let picked = filter.select(&player, &[&junk, &far_rare, &near_rare, &unique, &twin]);
        assert_eq!(picked, vec![EntityId(4), EntityId(3), EntityId(5), EntityId(2)]);
    }

    #[test]
    fn seasonal_items_bypass_the_floor_only_when_enabled() {
        let player = PlayerState::new(WorldPos::default());
        let token = Entity::item(1, WorldPos::flat(1.0, 1.0), ItemRarity::Normal)
            .with_category(ItemCategory::Seasonal);

        let mut strict = RarityLootFilter::new(&LootConfig::default());
        assert!(strict.select(&player, &[&token]).is_empty());

        let mut seasonal = RarityLootFilter::new(&LootConfig { seasonal_loot: true, ..LootConfig::default() });
        assert_eq!(seasonal.select(&player, &[&token]), vec![EntityId(1)]);
    }
}
