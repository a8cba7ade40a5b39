use rand::Rng;

use outbreak_core::actions::ItemStack;

/// Slots in a single storage container.
pub const CONTAINER_SLOTS: u8 = 27;

/// Item ids by loot category.
const WEAPONS_AND_TOOLS: &[u32] = &[
    256, 257, 258, 267, 268, 269, 270, 271, 272, 273, 274, 275, 276, 277, 278, 279,
];
const ARMOUR: &[u32] = &[
    298, 299, 300, 301, 302, 303, 304, 305, 306, 307, 308, 309, 310, 311, 312, 313, 314, 315, 316,
    317,
];
const FOOD: &[u32] = &[319, 320, 297, 391, 392, 393, 396, 400, 411, 412, 423, 424];
const BLOCKS: &[u32] = &[1, 2, 3, 4, 5, 12, 13, 14, 15, 16, 17, 18, 82, 35, 45];
const MATERIALS: &[u32] = &[263, 264, 265, 266, 280, 297, 322];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LootCategory {
    WeaponsAndTools,
    Armour,
    Food,
    Blocks,
    Materials,
}

impl LootCategory {
    const ALL: [LootCategory; 5] = [
        Self::WeaponsAndTools,
        Self::Armour,
        Self::Food,
        Self::Blocks,
        Self::Materials,
    ];

    fn items(self) -> &'static [u32] {
        match self {
            Self::WeaponsAndTools => WEAPONS_AND_TOOLS,
            Self::Armour => ARMOUR,
            Self::Food => FOOD,
            Self::Blocks => BLOCKS,
            Self::Materials => MATERIALS,
        }
    }

    fn roll_count<R: Rng + ?Sized>(self, rng: &mut R) -> u8 {
        match self {
            Self::WeaponsAndTools | Self::Armour => 1,
            Self::Food | Self::Blocks => rng.random_range(5..=64),
            Self::Materials => rng.random_range(1..=5),
        }
    }
}

/// Roll a fresh inventory for one container: each slot is filled with
/// probability 1/3 from a uniformly chosen category.
pub fn roll_container<R: Rng + ?Sized>(rng: &mut R) -> Vec<ItemStack> {
    let mut items = Vec::new();
    for slot in 0..CONTAINER_SLOTS {
        if rng.random_range(0..3) != 0 {
            continue;
        }
        let category = LootCategory::ALL[rng.random_range(0..LootCategory::ALL.len())];
        let pool = category.items();
        let item = pool[rng.random_range(0..pool.len())];
        items.push(ItemStack {
            slot,
            item,
            count: category.roll_count(rng),
        });
    }
    items
}
