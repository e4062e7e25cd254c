//! Spell catalog and slot tables.
//!
//! Spell definitions live in a static registry keyed by id. Casting
//! mechanics (the check, slot spending, effect resolution) live in
//! [`crate::rules`]; this module only describes what each spell is.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use crate::dice::DiceExpression;
use crate::world::{Ability, CharacterClass, Condition};

/// Highest castable spell level.
pub const MAX_SPELL_LEVEL: u8 = 6;

/// Traditions of magic. Each maps to a casting ability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpellSchool {
    Arcane,
    Divine,
}

impl SpellSchool {
    pub fn name(&self) -> &'static str {
        match self {
            SpellSchool::Arcane => "Arcane",
            SpellSchool::Divine => "Divine",
        }
    }

    /// The ability a casting check for this school rolls under.
    pub fn casting_ability(&self) -> Ability {
        match self {
            SpellSchool::Arcane => Ability::Intelligence,
            SpellSchool::Divine => Ability::Wisdom,
        }
    }
}

/// What a spell may be aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    /// Any single entity.
    Single,
    /// A single friendly character.
    Ally,
    /// A point on the map; everyone within the area is hit.
    Area,
    /// Every living character at once, no aiming needed.
    AllAllies,
}

/// Range bands, in distance units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpellRange {
    /// Caster or adjacent, one cell.
    Immediate,
    Close,
    Far,
    Distant,
}

impl SpellRange {
    pub fn meters(&self) -> f32 {
        match self {
            SpellRange::Immediate => 1.5,
            SpellRange::Close => 18.0,
            SpellRange::Far => 36.0,
            SpellRange::Distant => 72.0,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SpellRange::Immediate => "Immediate",
            SpellRange::Close => "Close",
            SpellRange::Far => "Far",
            SpellRange::Distant => "Distant",
        }
    }
}

/// What happens when the spell lands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpellEffect {
    Damage {
        dice: DiceExpression,
        /// Extra flat damage per caster level.
        per_level_bonus: bool,
        /// Targets may check this ability to halve the damage.
        save: Option<Ability>,
        /// Nonzero radius in distance units makes this an area burst.
        area_radius: f32,
    },
    Healing {
        dice: DiceExpression,
        per_level_bonus: bool,
    },
    Buff {
        ability: Ability,
        value: i32,
        turns: u32,
    },
    Control {
        condition: Condition,
        /// Held by concentration rather than a fixed duration.
        concentration: bool,
    },
}

/// One spell in the catalog. Catalog entries are static data, so they
/// serialize for display but are never read back.
#[derive(Debug, Clone, Serialize)]
pub struct SpellData {
    pub id: &'static str,
    pub name: &'static str,
    pub level: u8,
    pub school: SpellSchool,
    pub target: TargetType,
    pub range: SpellRange,
    pub effect: SpellEffect,
    pub description: &'static str,
}

static SPELL_CATALOG: LazyLock<HashMap<&'static str, SpellData>> =
    LazyLock::new(build_spell_catalog);

/// Look up a spell by registry id.
pub fn get_spell(id: &str) -> Option<&'static SpellData> {
    SPELL_CATALOG.get(id)
}

/// All spells, in no particular order.
pub fn all_spells() -> impl Iterator<Item = &'static SpellData> {
    SPELL_CATALOG.values()
}

fn dice(count: u32, sides: u32, modifier: i32) -> DiceExpression {
    DiceExpression {
        count,
        sides,
        modifier,
    }
}

fn build_spell_catalog() -> HashMap<&'static str, SpellData> {
    let mut db = HashMap::new();

    db.insert(
        "magic_missile",
        SpellData {
            id: "magic_missile",
            name: "Magic Missile",
            level: 1,
            school: SpellSchool::Arcane,
            target: TargetType::Single,
            range: SpellRange::Far,
            effect: SpellEffect::Damage {
                dice: dice(1, 4, 0),
                per_level_bonus: true,
                save: None,
                area_radius: 0.0,
            },
            description: "A dart of force that unerringly strikes its target.",
        },
    );

    db.insert(
        "cure_wounds",
        SpellData {
            id: "cure_wounds",
            name: "Cure Wounds",
            level: 1,
            school: SpellSchool::Divine,
            target: TargetType::Ally,
            range: SpellRange::Immediate,
            effect: SpellEffect::Healing {
                dice: dice(1, 8, 0),
                per_level_bonus: true,
            },
            description: "A touch that knits flesh and restores vigor.",
        },
    );

    db.insert(
        "bless",
        SpellData {
            id: "bless",
            name: "Bless",
            level: 2,
            school: SpellSchool::Divine,
            target: TargetType::AllAllies,
            range: SpellRange::Close,
            effect: SpellEffect::Buff {
                ability: Ability::Wisdom,
                value: 2,
                turns: 3,
            },
            description: "A benediction that steels the whole party's resolve.",
        },
    );

    db.insert(
        "hold_person",
        SpellData {
            id: "hold_person",
            name: "Hold Person",
            level: 2,
            school: SpellSchool::Arcane,
            target: TargetType::Single,
            range: SpellRange::Close,
            effect: SpellEffect::Control {
                condition: Condition::Paralyzed,
                concentration: true,
            },
            description: "Seizes a creature's body, holding it rigid while the caster concentrates.",
        },
    );

    db.insert(
        "fireball",
        SpellData {
            id: "fireball",
            name: "Fireball",
            level: 3,
            school: SpellSchool::Arcane,
            target: TargetType::Area,
            range: SpellRange::Far,
            effect: SpellEffect::Damage {
                dice: dice(6, 6, 0),
                per_level_bonus: false,
                save: Some(Ability::Dexterity),
                area_radius: 6.0,
            },
            description: "A burst of flame that engulfs everything near the point of impact.",
        },
    );

    db
}

// ============================================================================
// Spell Slots
// ============================================================================

// Rows are character level 1..=10; columns are spell levels 1..=6.
const CLERIC_SLOTS: [[u32; MAX_SPELL_LEVEL as usize]; 10] = [
    [1, 0, 0, 0, 0, 0],
    [2, 0, 0, 0, 0, 0],
    [2, 1, 0, 0, 0, 0],
    [2, 2, 0, 0, 0, 0],
    [3, 2, 1, 0, 0, 0],
    [3, 2, 2, 0, 0, 0],
    [3, 3, 2, 1, 0, 0],
    [3, 3, 2, 2, 0, 0],
    [4, 3, 3, 2, 1, 0],
    [4, 3, 3, 2, 2, 0],
];

const SORCERER_SLOTS: [[u32; MAX_SPELL_LEVEL as usize]; 10] = [
    [2, 0, 0, 0, 0, 0],
    [3, 0, 0, 0, 0, 0],
    [3, 1, 0, 0, 0, 0],
    [3, 2, 0, 0, 0, 0],
    [4, 2, 1, 0, 0, 0],
    [4, 2, 2, 0, 0, 0],
    [4, 3, 2, 1, 0, 0],
    [4, 3, 2, 2, 0, 0],
    [5, 3, 3, 2, 1, 0],
    [5, 3, 3, 2, 2, 0],
];

/// Daily spell slots for a class at a given level. Non-casters get an
/// empty table; levels past the chart use its last row.
pub fn max_slots(class: CharacterClass, level: u8) -> BTreeMap<u8, u32> {
    let table = match class {
        CharacterClass::Cleric => &CLERIC_SLOTS,
        CharacterClass::Sorcerer => &SORCERER_SLOTS,
        CharacterClass::Warrior | CharacterClass::Thief => return BTreeMap::new(),
    };
    let row = table[(level.clamp(1, 10) - 1) as usize];
    row.iter()
        .enumerate()
        .filter(|(_, &slots)| slots > 0)
        .map(|(i, &slots)| (i as u8 + 1, slots))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_lookup() {
        let spell = get_spell("magic_missile").unwrap();
        assert_eq!(spell.name, "Magic Missile");
        assert_eq!(spell.level, 1);
        assert_eq!(spell.school, SpellSchool::Arcane);
        assert!(get_spell("wish").is_none());
    }

    #[test]
    fn test_catalog_ids_match_keys() {
        for spell in all_spells() {
            assert_eq!(get_spell(spell.id).unwrap().name, spell.name);
        }
    }

    #[test]
    fn test_fireball_is_an_area_save_spell() {
        let spell = get_spell("fireball").unwrap();
        assert_eq!(spell.target, TargetType::Area);
        match &spell.effect {
            SpellEffect::Damage {
                save, area_radius, ..
            } => {
                assert_eq!(*save, Some(Ability::Dexterity));
                assert!(*area_radius > 0.0);
            }
            other => panic!("unexpected effect: {other:?}"),
        }
    }

    #[test]
    fn test_school_casting_abilities() {
        assert_eq!(SpellSchool::Arcane.casting_ability(), Ability::Intelligence);
        assert_eq!(SpellSchool::Divine.casting_ability(), Ability::Wisdom);
    }

    #[test]
    fn test_range_bands() {
        assert_eq!(SpellRange::Immediate.meters(), 1.5);
        assert_eq!(SpellRange::Close.meters(), 18.0);
        assert_eq!(SpellRange::Far.meters(), 36.0);
        assert_eq!(SpellRange::Distant.meters(), 72.0);
    }

    #[test]
    fn test_catalog_levels_within_bounds() {
        for spell in all_spells() {
            assert!((1..=MAX_SPELL_LEVEL).contains(&spell.level));
        }
    }

    #[test]
    fn test_slot_tables() {
        assert!(max_slots(CharacterClass::Warrior, 5).is_empty());
        assert!(max_slots(CharacterClass::Thief, 10).is_empty());

        let slots = max_slots(CharacterClass::Sorcerer, 1);
        assert_eq!(slots.get(&1), Some(&2));
        assert_eq!(slots.get(&2), None);

        let slots = max_slots(CharacterClass::Cleric, 10);
        assert_eq!(slots.get(&1), Some(&4));
        assert_eq!(slots.get(&5), Some(&2));

        // Levels beyond the chart reuse the last row.
        assert_eq!(max_slots(CharacterClass::Cleric, 20), max_slots(CharacterClass::Cleric, 10));
    }
}
