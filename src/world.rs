//! Game world types.
//!
//! Characters, monsters, the shared entity core they wrap, the session
//! log, and the top-level [`GameState`] that ties the table together.

use chrono::Local;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::combat::CombatSession;
use crate::dice::DiceExpression;
use crate::effects::ActiveEffect;
use crate::grid::{MapElement, Position, DEFAULT_CHARACTER_SPEED, DEFAULT_MONSTER_SPEED};

/// Entries older than this fall off the end of the session log.
pub const LOG_CAPACITY: usize = 50;

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for any entity on the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which roster an entity lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Character,
    Monster,
}

impl EntityKind {
    pub fn name(&self) -> &'static str {
        match self {
            EntityKind::Character => "character",
            EntityKind::Monster => "monster",
        }
    }
}

// ============================================================================
// Ability Scores
// ============================================================================

/// The six ability scores. Checks roll a d20 under the raw score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ability {
    Strength,
    Dexterity,
    Constitution,
    Intelligence,
    Wisdom,
    Charisma,
}

impl Ability {
    pub fn abbreviation(&self) -> &'static str {
        match self {
            Ability::Strength => "STR",
            Ability::Dexterity => "DEX",
            Ability::Constitution => "CON",
            Ability::Intelligence => "INT",
            Ability::Wisdom => "WIS",
            Ability::Charisma => "CHA",
        }
    }

    pub fn all() -> [Ability; 6] {
        [
            Ability::Strength,
            Ability::Dexterity,
            Ability::Constitution,
            Ability::Intelligence,
            Ability::Wisdom,
            Ability::Charisma,
        ]
    }
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.abbreviation())
    }
}

/// Ability scores container. Scores are signed so timed effects can push
/// them below their base values without wrapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbilityScores {
    pub strength: i32,
    pub dexterity: i32,
    pub constitution: i32,
    pub intelligence: i32,
    pub wisdom: i32,
    pub charisma: i32,
}

impl AbilityScores {
    pub fn new(str: i32, dex: i32, con: i32, int: i32, wis: i32, cha: i32) -> Self {
        Self {
            strength: str,
            dexterity: dex,
            constitution: con,
            intelligence: int,
            wisdom: wis,
            charisma: cha,
        }
    }

    pub fn get(&self, ability: Ability) -> i32 {
        match ability {
            Ability::Strength => self.strength,
            Ability::Dexterity => self.dexterity,
            Ability::Constitution => self.constitution,
            Ability::Intelligence => self.intelligence,
            Ability::Wisdom => self.wisdom,
            Ability::Charisma => self.charisma,
        }
    }

    pub fn get_mut(&mut self, ability: Ability) -> &mut i32 {
        match ability {
            Ability::Strength => &mut self.strength,
            Ability::Dexterity => &mut self.dexterity,
            Ability::Constitution => &mut self.constitution,
            Ability::Intelligence => &mut self.intelligence,
            Ability::Wisdom => &mut self.wisdom,
            Ability::Charisma => &mut self.charisma,
        }
    }

    /// Conventional half-score modifier, used only for initiative order.
    pub fn modifier(&self, ability: Ability) -> i32 {
        (self.get(ability) - 10).div_euclid(2)
    }
}

impl Default for AbilityScores {
    fn default() -> Self {
        Self::new(10, 10, 10, 10, 10, 10)
    }
}

// ============================================================================
// Hit Points
// ============================================================================

/// Hit point tracking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HitPoints {
    pub current: i32,
    pub maximum: i32,
}

impl HitPoints {
    pub fn new(maximum: i32) -> Self {
        Self {
            current: maximum,
            maximum,
        }
    }

    pub fn take_damage(&mut self, amount: i32) -> DamageResult {
        self.current = (self.current - amount).max(0);
        DamageResult {
            damage_taken: amount,
            dropped_to_zero: self.current == 0,
        }
    }

    /// Heal up to maximum; returns the amount actually restored.
    pub fn heal(&mut self, amount: i32) -> i32 {
        let old = self.current;
        self.current = (self.current + amount).min(self.maximum);
        self.current - old
    }

    pub fn is_downed(&self) -> bool {
        self.current <= 0
    }
}

/// Result of taking damage.
#[derive(Debug, Clone)]
pub struct DamageResult {
    pub damage_taken: i32,
    pub dropped_to_zero: bool,
}

/// Armor point tracking. Points wear down as blows land and are
/// restored by downtime, clamping to `[0, maximum]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArmorPoints {
    pub current: i32,
    pub maximum: i32,
}

impl ArmorPoints {
    pub fn new(maximum: i32) -> Self {
        Self {
            current: maximum,
            maximum,
        }
    }

    pub fn lose(&mut self, amount: i32) {
        self.current = (self.current - amount).max(0);
    }

    pub fn restore(&mut self) {
        self.current = self.maximum;
    }
}

// ============================================================================
// Items
// ============================================================================

/// A carried item. Weapons bring a damage die, armor a bonus to
/// maximum armor points.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    pub damage: Option<DiceExpression>,
    pub armor_bonus: Option<i32>,
}

impl Item {
    pub fn weapon(name: impl Into<String>, damage: DiceExpression) -> Self {
        Self {
            name: name.into(),
            damage: Some(damage),
            armor_bonus: None,
        }
    }

    pub fn armor(name: impl Into<String>, bonus: i32) -> Self {
        Self {
            name: name.into(),
            damage: None,
            armor_bonus: Some(bonus),
        }
    }

    pub fn mundane(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            damage: None,
            armor_bonus: None,
        }
    }
}

// ============================================================================
// Conditions
// ============================================================================

/// Conditions a control effect can pin on an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Paralyzed,
    Stunned,
    Blinded,
    Frightened,
    Charmed,
    Poisoned,
    Restrained,
    Prone,
}

impl Condition {
    pub fn name(&self) -> &'static str {
        match self {
            Condition::Paralyzed => "Paralyzed",
            Condition::Stunned => "Stunned",
            Condition::Blinded => "Blinded",
            Condition::Frightened => "Frightened",
            Condition::Charmed => "Charmed",
            Condition::Poisoned => "Poisoned",
            Condition::Restrained => "Restrained",
            Condition::Prone => "Prone",
        }
    }

    /// Whether the condition forbids taking actions entirely.
    pub fn incapacitates(&self) -> bool {
        matches!(self, Condition::Paralyzed | Condition::Stunned)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Classes
// ============================================================================

/// Player classes. Each carries its own damage die; casters pair with
/// the ability their casting checks roll under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacterClass {
    Warrior,
    Cleric,
    Thief,
    Sorcerer,
}

impl CharacterClass {
    pub fn name(&self) -> &'static str {
        match self {
            CharacterClass::Warrior => "Warrior",
            CharacterClass::Cleric => "Cleric",
            CharacterClass::Thief => "Thief",
            CharacterClass::Sorcerer => "Sorcerer",
        }
    }

    /// Sides of the class damage die.
    pub fn damage_die(&self) -> u32 {
        match self {
            CharacterClass::Warrior => 8,
            CharacterClass::Cleric | CharacterClass::Thief => 6,
            CharacterClass::Sorcerer => 4,
        }
    }

    /// The ability casting checks roll under, if the class casts at all.
    pub fn casting_ability(&self) -> Option<Ability> {
        match self {
            CharacterClass::Sorcerer => Some(Ability::Intelligence),
            CharacterClass::Cleric => Some(Ability::Wisdom),
            CharacterClass::Warrior | CharacterClass::Thief => None,
        }
    }

    pub fn is_caster(&self) -> bool {
        self.casting_ability().is_some()
    }
}

impl fmt::Display for CharacterClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Entity Core
// ============================================================================

/// State every entity carries regardless of roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityCore {
    pub id: EntityId,
    pub name: String,
    pub position: Position,
    pub hit_points: HitPoints,
    pub armor_points: ArmorPoints,
    pub ability_scores: AbilityScores,
    /// Movement budget override in distance units.
    pub speed: Option<u32>,
    pub inventory: Vec<Item>,
    pub conditions: Vec<Condition>,
    pub active_effects: Vec<ActiveEffect>,
}

impl EntityCore {
    pub fn new(name: impl Into<String>, position: Position, max_hp: i32) -> Self {
        Self {
            id: EntityId::new(),
            name: name.into(),
            position,
            hit_points: HitPoints::new(max_hp),
            armor_points: ArmorPoints::new(0),
            ability_scores: AbilityScores::default(),
            speed: None,
            inventory: Vec::new(),
            conditions: Vec::new(),
            active_effects: Vec::new(),
        }
    }

    pub fn has_condition(&self, condition: Condition) -> bool {
        self.conditions.contains(&condition)
    }

    pub fn is_incapacitated(&self) -> bool {
        self.conditions.iter().any(|c| c.incapacitates())
    }
}

/// A player character.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Character {
    pub core: EntityCore,
    pub class: CharacterClass,
    pub level: u8,
    /// Every spell the character has learned, by registry id.
    pub spellbook: Vec<String>,
    /// The subset of the spellbook prepared for the day.
    pub memorized_spells: Vec<String>,
    /// Remaining slots per spell level.
    pub spell_slots: BTreeMap<u8, u32>,
}

impl Character {
    pub fn new(
        name: impl Into<String>,
        class: CharacterClass,
        level: u8,
        position: Position,
        max_hp: i32,
    ) -> Self {
        Self {
            core: EntityCore::new(name, position, max_hp),
            class,
            level,
            spellbook: Vec::new(),
            memorized_spells: Vec::new(),
            spell_slots: BTreeMap::new(),
        }
    }

    pub fn with_abilities(mut self, scores: AbilityScores) -> Self {
        self.core.ability_scores = scores;
        self
    }

    pub fn speed(&self) -> u32 {
        self.core.speed.unwrap_or(DEFAULT_CHARACTER_SPEED)
    }

    pub fn knows_spell(&self, spell_id: &str) -> bool {
        self.spellbook.iter().any(|s| s == spell_id)
    }

    pub fn has_memorized(&self, spell_id: &str) -> bool {
        self.memorized_spells.iter().any(|s| s == spell_id)
    }

    pub fn slots_remaining(&self, spell_level: u8) -> u32 {
        self.spell_slots.get(&spell_level).copied().unwrap_or(0)
    }
}

/// A monster attack line, e.g. "bite 1d6".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonsterAttack {
    pub name: String,
    pub damage: DiceExpression,
}

/// A limited-use monster special.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonsterAbility {
    pub name: String,
    pub uses_remaining: u32,
    pub description: String,
}

/// A dungeon-master-controlled creature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Monster {
    pub core: EntityCore,
    pub attacks: Vec<MonsterAttack>,
    pub abilities: Vec<MonsterAbility>,
    /// Condition applied on a successful hit, if any.
    pub inflicts: Option<Condition>,
}

impl Monster {
    pub fn new(name: impl Into<String>, position: Position, max_hp: i32) -> Self {
        Self {
            core: EntityCore::new(name, position, max_hp),
            attacks: Vec::new(),
            abilities: Vec::new(),
            inflicts: None,
        }
    }

    pub fn with_attack(mut self, name: impl Into<String>, damage: DiceExpression) -> Self {
        self.attacks.push(MonsterAttack {
            name: name.into(),
            damage,
        });
        self
    }

    pub fn with_inflicts(mut self, condition: Condition) -> Self {
        self.inflicts = Some(condition);
        self
    }

    pub fn speed(&self) -> u32 {
        self.core.speed.unwrap_or(DEFAULT_MONSTER_SPEED)
    }

    /// The attack used when none is named. Unarmed monsters fall back
    /// to a plain 1d6.
    pub fn attack(&self, name: Option<&str>) -> MonsterAttack {
        match name {
            Some(n) => self
                .attacks
                .iter()
                .find(|a| a.name == n)
                .cloned()
                .unwrap_or_else(|| self.default_attack()),
            None => self
                .attacks
                .first()
                .cloned()
                .unwrap_or_else(|| self.default_attack()),
        }
    }

    fn default_attack(&self) -> MonsterAttack {
        MonsterAttack {
            name: "strike".to_string(),
            damage: DiceExpression {
                count: 1,
                sides: 6,
                modifier: 0,
            },
        }
    }
}

// ============================================================================
// Entity Views
// ============================================================================

/// Borrowed view over either roster.
#[derive(Debug, Clone, Copy)]
pub enum EntityRef<'a> {
    Character(&'a Character),
    Monster(&'a Monster),
}

impl<'a> EntityRef<'a> {
    pub fn core(&self) -> &'a EntityCore {
        match self {
            EntityRef::Character(c) => &c.core,
            EntityRef::Monster(m) => &m.core,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            EntityRef::Character(_) => EntityKind::Character,
            EntityRef::Monster(_) => EntityKind::Monster,
        }
    }

    pub fn speed(&self) -> u32 {
        match self {
            EntityRef::Character(c) => c.speed(),
            EntityRef::Monster(m) => m.speed(),
        }
    }

    pub fn name(&self) -> &'a str {
        &self.core().name
    }

    pub fn is_downed(&self) -> bool {
        self.core().hit_points.is_downed()
    }
}

/// Mutable view over either roster.
pub enum EntityMut<'a> {
    Character(&'a mut Character),
    Monster(&'a mut Monster),
}

impl<'a> EntityMut<'a> {
    pub fn core_mut(&mut self) -> &mut EntityCore {
        match self {
            EntityMut::Character(c) => &mut c.core,
            EntityMut::Monster(m) => &mut m.core,
        }
    }
}

// ============================================================================
// Session Log
// ============================================================================

/// Sorting bucket for a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogCategory {
    Combat,
    Movement,
    Magic,
    Turn,
    Initiative,
    Error,
    Selection,
}

impl LogCategory {
    pub fn name(&self) -> &'static str {
        match self {
            LogCategory::Combat => "combat",
            LogCategory::Movement => "movement",
            LogCategory::Magic => "magic",
            LogCategory::Turn => "turn",
            LogCategory::Initiative => "initiative",
            LogCategory::Error => "error",
            LogCategory::Selection => "selection",
        }
    }
}

/// One line of the session log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Wall-clock time the entry was written, formatted HH:MM:SS.
    pub timestamp: String,
    pub message: String,
    pub category: LogCategory,
}

impl LogEntry {
    pub fn new(message: impl Into<String>, category: LogCategory) -> Self {
        Self {
            timestamp: Local::now().format("%H:%M:%S").to_string(),
            message: message.into(),
            category,
        }
    }
}

// ============================================================================
// Game State
// ============================================================================

/// Everything on the table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    /// The map is a square of `grid_size` by `grid_size` cells.
    pub grid_size: i32,
    pub characters: Vec<Character>,
    pub monsters: Vec<Monster>,
    pub map_elements: Vec<MapElement>,
    pub combat: Option<CombatSession>,
    /// In-game clock, advanced by resting and downtime.
    pub clock_minutes: u64,
    /// Newest entries first, capped at [`LOG_CAPACITY`].
    pub game_log: Vec<LogEntry>,
    /// The token currently highlighted at the table, if any.
    pub selected: Option<(EntityId, EntityKind)>,
}

impl GameState {
    pub fn new(grid_size: i32) -> Self {
        Self {
            grid_size,
            characters: Vec::new(),
            monsters: Vec::new(),
            map_elements: Vec::new(),
            combat: None,
            clock_minutes: 0,
            game_log: Vec::new(),
            selected: None,
        }
    }

    pub fn entity(&self, id: EntityId, kind: EntityKind) -> Option<EntityRef<'_>> {
        match kind {
            EntityKind::Character => self
                .characters
                .iter()
                .find(|c| c.core.id == id)
                .map(EntityRef::Character),
            EntityKind::Monster => self
                .monsters
                .iter()
                .find(|m| m.core.id == id)
                .map(EntityRef::Monster),
        }
    }

    pub fn entity_mut(&mut self, id: EntityId, kind: EntityKind) -> Option<EntityMut<'_>> {
        match kind {
            EntityKind::Character => self
                .characters
                .iter_mut()
                .find(|c| c.core.id == id)
                .map(EntityMut::Character),
            EntityKind::Monster => self
                .monsters
                .iter_mut()
                .find(|m| m.core.id == id)
                .map(EntityMut::Monster),
        }
    }

    pub fn character(&self, id: EntityId) -> Option<&Character> {
        self.characters.iter().find(|c| c.core.id == id)
    }

    pub fn character_mut(&mut self, id: EntityId) -> Option<&mut Character> {
        self.characters.iter_mut().find(|c| c.core.id == id)
    }

    pub fn monster(&self, id: EntityId) -> Option<&Monster> {
        self.monsters.iter().find(|m| m.core.id == id)
    }

    /// Whether a living entity other than `mover` stands at `position`.
    pub fn occupied_by_other(&self, position: Position, mover: EntityId) -> bool {
        let standing = |core: &EntityCore| {
            core.id != mover && core.position == position && !core.hit_points.is_downed()
        };
        self.characters.iter().any(|c| standing(&c.core))
            || self.monsters.iter().any(|m| standing(&m.core))
    }

    /// All living entities, characters first.
    pub fn living(&self) -> Vec<(EntityId, EntityKind)> {
        let chars = self
            .characters
            .iter()
            .filter(|c| !c.core.hit_points.is_downed())
            .map(|c| (c.core.id, EntityKind::Character));
        let mons = self
            .monsters
            .iter()
            .filter(|m| !m.core.hit_points.is_downed())
            .map(|m| (m.core.id, EntityKind::Monster));
        chars.chain(mons).collect()
    }

    /// Push a log line, newest first, trimming past capacity.
    pub fn log(&mut self, message: impl Into<String>, category: LogCategory) {
        self.game_log.insert(0, LogEntry::new(message, category));
        self.game_log.truncate(LOG_CAPACITY);
    }
}

/// A small ready-made encounter used by demos and tests.
pub fn sample_state() -> GameState {
    let mut state = GameState::new(20);

    let mut thorgrim =
        Character::new("Thorgrim", CharacterClass::Warrior, 3, Position::new(2, 3), 22)
            .with_abilities(AbilityScores::new(16, 12, 14, 9, 11, 10));
    thorgrim.core.armor_points = ArmorPoints::new(4);
    thorgrim.core.inventory = vec![
        Item::weapon(
            "battleaxe",
            DiceExpression {
                count: 1,
                sides: 8,
                modifier: 0,
            },
        ),
        Item::armor("chain mail", 4),
        Item::mundane("torch"),
    ];
    state.characters.push(thorgrim);

    let mut elara = Character::new("Elara", CharacterClass::Sorcerer, 3, Position::new(3, 5), 12)
        .with_abilities(AbilityScores::new(8, 14, 10, 16, 12, 13));
    elara.spellbook = vec![
        "magic_missile".to_string(),
        "fireball".to_string(),
        "hold_person".to_string(),
    ];
    elara.memorized_spells = vec!["magic_missile".to_string()];
    elara.spell_slots = BTreeMap::from([(1, 2), (2, 1)]);
    state.characters.push(elara);

    let ghoul = Monster::new("Ghoul", Position::new(10, 8), 11)
        .with_attack(
            "claws",
            DiceExpression {
                count: 1,
                sides: 6,
                modifier: 0,
            },
        )
        .with_inflicts(Condition::Paralyzed);
    state.monsters.push(ghoul);

    state.map_elements.push(MapElement::wall(Position::new(6, 6)));
    state
        .map_elements
        .push(MapElement::door(Position::new(6, 7), false));
    state
        .map_elements
        .push(MapElement::difficult(Position::new(4, 4), "rubble"));
    state
        .map_elements
        .push(MapElement::hazard(Position::new(12, 2), "spiked pit"));

    state
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_points_floor_at_zero() {
        let mut hp = HitPoints::new(10);
        let result = hp.take_damage(14);
        assert_eq!(hp.current, 0);
        assert!(result.dropped_to_zero);
        assert!(hp.is_downed());
    }

    #[test]
    fn test_heal_caps_at_maximum() {
        let mut hp = HitPoints::new(10);
        hp.take_damage(6);
        assert_eq!(hp.heal(20), 6);
        assert_eq!(hp.current, 10);
    }

    #[test]
    fn test_class_damage_dice() {
        assert_eq!(CharacterClass::Warrior.damage_die(), 8);
        assert_eq!(CharacterClass::Cleric.damage_die(), 6);
        assert_eq!(CharacterClass::Thief.damage_die(), 6);
        assert_eq!(CharacterClass::Sorcerer.damage_die(), 4);
    }

    #[test]
    fn test_casting_abilities() {
        assert_eq!(
            CharacterClass::Sorcerer.casting_ability(),
            Some(Ability::Intelligence)
        );
        assert_eq!(
            CharacterClass::Cleric.casting_ability(),
            Some(Ability::Wisdom)
        );
        assert_eq!(CharacterClass::Warrior.casting_ability(), None);
        assert!(!CharacterClass::Thief.is_caster());
    }

    #[test]
    fn test_initiative_modifier_rounds_down() {
        let scores = AbilityScores::new(10, 15, 10, 10, 10, 10);
        assert_eq!(scores.modifier(Ability::Dexterity), 2);
        let scores = AbilityScores::new(10, 9, 10, 10, 10, 10);
        assert_eq!(scores.modifier(Ability::Dexterity), -1);
    }

    #[test]
    fn test_monster_attack_fallback() {
        let ghoul = Monster::new("Ghoul", Position::new(0, 0), 11);
        let attack = ghoul.attack(None);
        assert_eq!(attack.damage.sides, 6);
        assert_eq!(attack.damage.count, 1);
    }

    #[test]
    fn test_log_is_newest_first_and_capped() {
        let mut state = GameState::new(10);
        for i in 0..60 {
            state.log(format!("entry {i}"), LogCategory::Turn);
        }
        assert_eq!(state.game_log.len(), LOG_CAPACITY);
        assert_eq!(state.game_log[0].message, "entry 59");
    }

    #[test]
    fn test_sample_state_shape() {
        let state = sample_state();
        assert_eq!(state.characters.len(), 2);
        assert_eq!(state.monsters.len(), 1);
        assert_eq!(state.map_elements.len(), 4);
        assert!(state.combat.is_none());

        let elara = &state.characters[1];
        assert!(elara.has_memorized("magic_missile"));
        assert!(elara.knows_spell("fireball"));
        assert_eq!(elara.slots_remaining(1), 2);
    }
}
