//! Rules resolution.
//!
//! The [`RulesEngine`] turns a player [`Intent`] into a [`Resolution`]:
//! a narrative line plus a list of [`Effect`]s describing every state
//! change the intent causes. Resolution is pure with respect to the
//! game state; [`apply_effects`] performs the mutations afterwards.
//! All validation happens before any effect is produced, so a rejected
//! intent never leaves the world half-changed.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::combat::{Combatant, CombatSession};
use crate::dice::{roll_check, roll_dice, roll_disadvantage, DiceRoller};
use crate::effects::{
    break_concentration_on, tick_effects, ActiveEffect, Duration, EffectKind, Tick,
};
use crate::grid::{distance, terrain_at, validate_move, MoveViolation, Position, Terrain};
use crate::spells::{get_spell, max_slots, SpellData, SpellEffect, TargetType};
use crate::world::{Ability, EntityId, EntityKind, EntityRef, GameState, LogCategory};

/// How many of the bearer's turns an inflicted condition lasts when
/// nothing holds it by concentration.
const INFLICTED_CONDITION_TURNS: u32 = 2;

// ============================================================================
// Intents
// ============================================================================

/// How an attack is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackMode {
    Melee,
    Ranged,
}

impl AttackMode {
    /// The attribute the to-hit check rolls under.
    pub fn attribute(&self) -> Ability {
        match self {
            AttackMode::Melee => Ability::Strength,
            AttackMode::Ranged => Ability::Dexterity,
        }
    }

    /// Maximum reach in distance units.
    pub fn range(&self) -> f32 {
        match self {
            AttackMode::Melee => 1.5,
            AttackMode::Ranged => 18.0,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AttackMode::Melee => "melee",
            AttackMode::Ranged => "ranged",
        }
    }
}

/// What a spell is aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CastTarget {
    Entity { id: EntityId, kind: EntityKind },
    Point(Position),
    /// For spells that need no aiming.
    None,
}

/// A player or dungeon-master intent, the engine's only input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Intent {
    MoveEntity {
        id: EntityId,
        kind: EntityKind,
        to: Position,
        /// Dungeon-master moves ignore walls and terrain.
        dungeon_master: bool,
    },
    Attack {
        attacker: (EntityId, EntityKind),
        target: (EntityId, EntityKind),
        mode: AttackMode,
        /// Which monster attack line to use; characters ignore this.
        attack_name: Option<String>,
    },
    CastSpell {
        caster: EntityId,
        spell_id: String,
        target: CastTarget,
    },
    StartCombat,
    NextTurn,
    EndCombat,
    MemorizeSpell {
        character: EntityId,
        spell_id: String,
    },
    ForgetSpell {
        character: EntityId,
        spell_id: String,
    },
    RestoreSpellSlots {
        character: EntityId,
    },
    /// Roll the skill check demanded by difficult or hazardous ground.
    CheckTerrain {
        character: EntityId,
        terrain: Terrain,
    },
    SelectEntity {
        target: Option<(EntityId, EntityKind)>,
    },
    BreakConcentration {
        caster: EntityId,
    },
    AdvanceTime {
        minutes: u64,
    },
}

impl Intent {
    /// Which log bucket this intent's narrative belongs in.
    pub fn log_category(&self) -> LogCategory {
        match self {
            Intent::MoveEntity { .. } | Intent::CheckTerrain { .. } => LogCategory::Movement,
            Intent::Attack { .. } | Intent::StartCombat | Intent::EndCombat => LogCategory::Combat,
            Intent::CastSpell { .. }
            | Intent::MemorizeSpell { .. }
            | Intent::ForgetSpell { .. }
            | Intent::RestoreSpellSlots { .. }
            | Intent::BreakConcentration { .. } => LogCategory::Magic,
            Intent::NextTurn | Intent::AdvanceTime { .. } => LogCategory::Turn,
            Intent::SelectEntity { .. } => LogCategory::Selection,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Why an intent was rejected. None of these are fatal; the state is
/// untouched when one is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RulesError {
    #[error("no such entity")]
    UnknownEntity,
    #[error("unknown spell '{0}'")]
    UnknownSpell(String),
    #[error("no combat is active")]
    NoCombat,
    #[error("combat is already underway")]
    CombatAlreadyActive,
    #[error("it is not {name}'s turn")]
    NotYourTurn { name: String },
    #[error("{name} has already acted this round")]
    ActionAlreadyUsed { name: String },
    #[error("{name} has already moved this round")]
    AlreadyMoved { name: String },
    #[error("invalid move: {0}")]
    InvalidMove(MoveViolation),
    #[error("target is {actual:.1} units away, beyond the {max:.1} unit range")]
    OutOfRange { actual: f32, max: f32 },
    #[error("invalid target: {0}")]
    InvalidTarget(String),
    #[error("{name} is incapacitated")]
    Incapacitated { name: String },
    #[error("{0}")]
    InsufficientResources(String),
}

// ============================================================================
// Effects and Resolution
// ============================================================================

/// A concrete state change produced by resolving an intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Effect {
    /// A die was rolled; informational only.
    DiceRolled { purpose: String, value: i32 },

    Moved {
        id: EntityId,
        kind: EntityKind,
        to: Position,
    },
    MoveSpent {
        id: EntityId,
        kind: EntityKind,
    },
    ActionSpent {
        id: EntityId,
        kind: EntityKind,
    },

    /// Damage (negative amount) or healing (positive amount) landed.
    HpChanged {
        id: EntityId,
        kind: EntityKind,
        amount: i32,
        new_current: i32,
        dropped_to_zero: bool,
    },

    /// A timed effect attached to an entity.
    EffectApplied {
        id: EntityId,
        kind: EntityKind,
        effect: ActiveEffect,
    },

    /// Every concentration effect this caster maintains ends.
    ConcentrationBroken { caster: EntityId },

    SpellSlotUsed { caster: EntityId, level: u8 },
    SpellMemorized {
        character: EntityId,
        spell_id: String,
    },
    SpellForgotten {
        character: EntityId,
        spell_id: String,
    },
    SpellSlotsRestored { character: EntityId },

    CombatStarted { session: CombatSession },
    /// Advance the turn pointer, ticking turn and round effects.
    TurnAdvanced,
    CombatEnded,

    TimeAdvanced { minutes: u64 },
    Selected {
        target: Option<(EntityId, EntityKind)>,
    },
}

/// The outcome of resolving one intent.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub effects: Vec<Effect>,
    pub narrative: String,
}

impl Resolution {
    pub fn new(narrative: impl Into<String>) -> Self {
        Self {
            effects: Vec::new(),
            narrative: narrative.into(),
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

// ============================================================================
// Rules Engine
// ============================================================================

/// Stateless resolver. All game state lives in [`GameState`]; all
/// randomness comes through the supplied roller.
#[derive(Debug, Default)]
pub struct RulesEngine;

impl RulesEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve(
        &self,
        state: &GameState,
        intent: Intent,
        roller: &mut dyn DiceRoller,
    ) -> Result<Resolution, RulesError> {
        match intent {
            Intent::MoveEntity {
                id,
                kind,
                to,
                dungeon_master,
            } => self.resolve_move(state, id, kind, to, dungeon_master),
            Intent::Attack {
                attacker,
                target,
                mode,
                attack_name,
            } => self.resolve_attack(state, attacker, target, mode, attack_name.as_deref(), roller),
            Intent::CastSpell {
                caster,
                spell_id,
                target,
            } => self.resolve_cast(state, caster, &spell_id, target, roller),
            Intent::StartCombat => self.resolve_start_combat(state, roller),
            Intent::NextTurn => self.resolve_next_turn(state),
            Intent::EndCombat => self.resolve_end_combat(state),
            Intent::MemorizeSpell {
                character,
                spell_id,
            } => self.resolve_memorize(state, character, &spell_id),
            Intent::ForgetSpell {
                character,
                spell_id,
            } => self.resolve_forget(state, character, &spell_id),
            Intent::RestoreSpellSlots { character } => self.resolve_restore(state, character),
            Intent::CheckTerrain { character, terrain } => {
                self.resolve_terrain_check(state, character, terrain, roller)
            }
            Intent::SelectEntity { target } => self.resolve_select(state, target),
            Intent::BreakConcentration { caster } => self.resolve_break(state, caster),
            Intent::AdvanceTime { minutes } => Ok(Resolution::new(format!(
                "{minutes} minutes pass."
            ))
            .with_effect(Effect::TimeAdvanced { minutes })),
        }
    }

    // ------------------------------------------------------------------
    // Movement
    // ------------------------------------------------------------------

    fn resolve_move(
        &self,
        state: &GameState,
        id: EntityId,
        kind: EntityKind,
        to: Position,
        dungeon_master: bool,
    ) -> Result<Resolution, RulesError> {
        let entity = state.entity(id, kind).ok_or(RulesError::UnknownEntity)?;
        let name = entity.name().to_string();

        if entity.is_downed() || entity.core().is_incapacitated() {
            return Err(RulesError::Incapacitated { name });
        }

        if let Some(combat) = &state.combat {
            if !combat.is_current(id, kind) {
                return Err(RulesError::NotYourTurn { name });
            }
            if !combat.can_move(id, kind) {
                return Err(RulesError::AlreadyMoved { name });
            }
        }

        validate_move(state, id, kind, to, dungeon_master).map_err(RulesError::InvalidMove)?;

        let terrain = terrain_at(&state.map_elements, to, kind, dungeon_master);
        let narrative = if terrain.requires_check() {
            format!("{name} moves to {to}, onto {terrain} ground.")
        } else {
            format!("{name} moves to {to}.")
        };

        let mut resolution = Resolution::new(narrative).with_effect(Effect::Moved { id, kind, to });
        if state.combat.is_some() {
            resolution = resolution.with_effect(Effect::MoveSpent { id, kind });
        }
        Ok(resolution)
    }

    fn resolve_terrain_check(
        &self,
        state: &GameState,
        character: EntityId,
        terrain: Terrain,
        roller: &mut dyn DiceRoller,
    ) -> Result<Resolution, RulesError> {
        let ch = state.character(character).ok_or(RulesError::UnknownEntity)?;
        let name = ch.core.name.clone();
        if !terrain.requires_check() {
            return Ok(Resolution::new(format!(
                "{name} crosses normal ground without trouble."
            )));
        }

        // Difficult ground tests agility, hazards test hardiness, and
        // both are stiffer than a plain attribute check.
        let (ability, target) = match terrain {
            Terrain::Difficult => (
                Ability::Dexterity,
                ch.core.ability_scores.dexterity - 5,
            ),
            Terrain::Hazard => (
                Ability::Constitution,
                ch.core.ability_scores.constitution - 7,
            ),
            Terrain::Normal => unreachable!("normal ground returned above"),
        };
        let check = roll_check(roller, target);
        let mut resolution = Resolution::new(String::new()).with_effect(Effect::DiceRolled {
            purpose: format!("{terrain} terrain check"),
            value: check.roll as i32,
        });

        if check.success {
            resolution.narrative = format!(
                "{name} picks their way across the {terrain} ground (rolled {} vs {ability} {target}).",
                check.roll
            );
            return Ok(resolution);
        }

        if terrain == Terrain::Hazard {
            let damage = roll_dice(roller, 1, 6) as i32;
            let hp = &ch.core.hit_points;
            let new_current = (hp.current - damage).max(0);
            resolution.narrative = format!(
                "{name} stumbles into the hazard (rolled {} vs {ability} {target}) and takes {damage} damage!",
                check.roll
            );
            resolution = resolution
                .with_effect(Effect::DiceRolled {
                    purpose: "hazard damage".to_string(),
                    value: damage,
                })
                .with_effect(Effect::HpChanged {
                    id: character,
                    kind: EntityKind::Character,
                    amount: -damage,
                    new_current,
                    dropped_to_zero: new_current == 0,
                });
        } else {
            resolution.narrative = format!(
                "{name} flounders in the {terrain} ground (rolled {} vs {ability} {target}).",
                check.roll
            );
        }
        Ok(resolution)
    }

    // ------------------------------------------------------------------
    // Attacks
    // ------------------------------------------------------------------

    fn resolve_attack(
        &self,
        state: &GameState,
        attacker: (EntityId, EntityKind),
        target: (EntityId, EntityKind),
        mode: AttackMode,
        attack_name: Option<&str>,
        roller: &mut dyn DiceRoller,
    ) -> Result<Resolution, RulesError> {
        let atk = state
            .entity(attacker.0, attacker.1)
            .ok_or(RulesError::UnknownEntity)?;
        let tgt = state
            .entity(target.0, target.1)
            .ok_or(RulesError::UnknownEntity)?;
        let atk_name = atk.name().to_string();
        let tgt_name = tgt.name().to_string();

        if attacker == target {
            return Err(RulesError::InvalidTarget(
                "an entity cannot attack itself".to_string(),
            ));
        }
        if atk.is_downed() || atk.core().is_incapacitated() {
            return Err(RulesError::Incapacitated { name: atk_name });
        }
        if tgt.is_downed() {
            return Err(RulesError::InvalidTarget(format!(
                "{tgt_name} is already down"
            )));
        }

        if let Some(combat) = &state.combat {
            if !combat.is_current(attacker.0, attacker.1) {
                return Err(RulesError::NotYourTurn { name: atk_name });
            }
            if !combat.can_act(attacker.0, attacker.1) {
                return Err(RulesError::ActionAlreadyUsed { name: atk_name });
            }
        }

        let gap = distance(atk.core().position, tgt.core().position);
        if gap > mode.range() {
            return Err(RulesError::OutOfRange {
                actual: gap,
                max: mode.range(),
            });
        }

        // Shooting at point-blank range is awkward: roll twice, keep
        // the higher die, which is worse in a roll-under system.
        let point_blank = mode == AttackMode::Ranged && gap <= AttackMode::Melee.range();
        let roll = if point_blank {
            roll_disadvantage(roller)
        } else {
            roller.roll_die(20)
        };

        let attribute = mode.attribute();
        let attribute_value = atk.core().ability_scores.get(attribute);
        let critical = roll == 1;
        let hit = (roll as i32) <= attribute_value;

        let mut resolution = Resolution::new(String::new()).with_effect(Effect::DiceRolled {
            purpose: format!("{} attack", mode.name()),
            value: roll as i32,
        });

        if !hit {
            resolution.narrative = format!(
                "{atk_name} attacks {tgt_name} and misses (rolled {roll} vs {attribute} {attribute_value})."
            );
            return Ok(resolution);
        }

        let mut damage = match &atk {
            EntityRef::Character(c) => roll_dice(roller, 1, c.class.damage_die()) as i32,
            EntityRef::Monster(m) => m.attack(attack_name).damage.roll(roller),
        };
        resolution = resolution.with_effect(Effect::DiceRolled {
            purpose: "damage".to_string(),
            value: damage,
        });
        if critical {
            damage *= 2;
        }

        let new_current = (tgt.core().hit_points.current - damage).max(0);
        resolution.narrative = if critical {
            format!(
                "{atk_name} attacks {tgt_name}: a natural 1! Critical hit for {damage} damage."
            )
        } else {
            format!(
                "{atk_name} hits {tgt_name} (rolled {roll} vs {attribute} {attribute_value}) for {damage} damage."
            )
        };
        resolution = resolution.with_effect(Effect::HpChanged {
            id: target.0,
            kind: target.1,
            amount: -damage,
            new_current,
            dropped_to_zero: new_current == 0,
        });

        // Monsters with a rider condition pin it on a landed hit.
        if let EntityRef::Monster(m) = &atk {
            if let Some(condition) = m.inflicts {
                if new_current > 0 {
                    resolution = resolution.with_effect(Effect::EffectApplied {
                        id: target.0,
                        kind: target.1,
                        effect: ActiveEffect::new(
                            m.attack(attack_name).name,
                            Some(attacker.0),
                            EffectKind::Control { condition },
                            Duration::Turns(INFLICTED_CONDITION_TURNS),
                        ),
                    });
                    resolution
                        .narrative
                        .push_str(&format!(" {tgt_name} is {}!", condition.name()));
                }
            }
        }

        if state.combat.is_some() {
            resolution = resolution.with_effect(Effect::ActionSpent {
                id: attacker.0,
                kind: attacker.1,
            });
        }
        Ok(resolution)
    }

    // ------------------------------------------------------------------
    // Spellcasting
    // ------------------------------------------------------------------

    fn resolve_cast(
        &self,
        state: &GameState,
        caster: EntityId,
        spell_id: &str,
        target: CastTarget,
        roller: &mut dyn DiceRoller,
    ) -> Result<Resolution, RulesError> {
        let ch = state.character(caster).ok_or(RulesError::UnknownEntity)?;
        let name = ch.core.name.clone();

        if ch.core.hit_points.is_downed() || ch.core.is_incapacitated() {
            return Err(RulesError::Incapacitated { name });
        }

        let spell = get_spell(spell_id)
            .ok_or_else(|| RulesError::UnknownSpell(spell_id.to_string()))?;

        if !ch.class.is_caster() {
            return Err(RulesError::InsufficientResources(format!(
                "{name} cannot cast spells"
            )));
        }
        if spell.level > ch.level {
            return Err(RulesError::InsufficientResources(format!(
                "{} is beyond {name}'s reach at level {}",
                spell.name, ch.level
            )));
        }
        if !ch.has_memorized(spell_id) {
            return Err(RulesError::InsufficientResources(format!(
                "{name} has not memorized {}",
                spell.name
            )));
        }
        if ch.slots_remaining(spell.level) == 0 {
            return Err(RulesError::InsufficientResources(format!(
                "{name} has no level {} slots left",
                spell.level
            )));
        }

        if let Some(combat) = &state.combat {
            if !combat.is_current(caster, EntityKind::Character) {
                return Err(RulesError::NotYourTurn { name });
            }
            if !combat.can_act(caster, EntityKind::Character) {
                return Err(RulesError::ActionAlreadyUsed { name });
            }
        }

        // Targeting and range are checked before the slot is spent.
        let aim = self.validate_cast_target(state, ch.core.position, spell, target)?;

        let mut resolution = Resolution::new(String::new())
            .with_effect(Effect::SpellSlotUsed {
                caster,
                level: spell.level,
            });
        if state.combat.is_some() {
            resolution = resolution.with_effect(Effect::ActionSpent {
                id: caster,
                kind: EntityKind::Character,
            });
        }

        // Casting check: d20 plus spell level, rolled under the
        // school's casting attribute. The slot is gone either way.
        let casting_ability = spell.school.casting_ability();
        let ability_value = ch.core.ability_scores.get(casting_ability);
        let roll = roller.roll_die(20) as i32;
        let total = roll + spell.level as i32;
        resolution = resolution.with_effect(Effect::DiceRolled {
            purpose: format!("casting check for {}", spell.name),
            value: roll,
        });

        if total > ability_value {
            resolution.narrative = format!(
                "{name} fumbles the casting of {} (rolled {roll}+{} vs {casting_ability} {ability_value}). The slot is wasted.",
                spell.name, spell.level
            );
            return Ok(resolution);
        }

        // A new concentration spell displaces whatever the caster was
        // already concentrating on.
        if matches!(
            spell.effect,
            SpellEffect::Control {
                concentration: true,
                ..
            }
        ) && self.is_concentrating(state, caster)
        {
            resolution = resolution.with_effect(Effect::ConcentrationBroken { caster });
        }

        self.resolve_spell_effect(state, ch.level, caster, &name, spell, aim, resolution, roller)
    }

    fn is_concentrating(&self, state: &GameState, caster: EntityId) -> bool {
        let holds = |effects: &[ActiveEffect]| {
            effects
                .iter()
                .any(|e| e.duration == Duration::Concentration && e.caster == Some(caster))
        };
        state.characters.iter().any(|c| holds(&c.core.active_effects))
            || state.monsters.iter().any(|m| holds(&m.core.active_effects))
    }

    /// The validated aim point of a cast.
    fn validate_cast_target(
        &self,
        state: &GameState,
        caster_pos: Position,
        spell: &SpellData,
        target: CastTarget,
    ) -> Result<CastAim, RulesError> {
        let check_range = |pos: Position| -> Result<(), RulesError> {
            let gap = distance(caster_pos, pos);
            if gap > spell.range.meters() {
                Err(RulesError::OutOfRange {
                    actual: gap,
                    max: spell.range.meters(),
                })
            } else {
                Ok(())
            }
        };

        match spell.target {
            TargetType::Single => match target {
                CastTarget::Entity { id, kind } => {
                    let e = state.entity(id, kind).ok_or(RulesError::UnknownEntity)?;
                    if e.is_downed() {
                        return Err(RulesError::InvalidTarget(format!(
                            "{} is already down",
                            e.name()
                        )));
                    }
                    check_range(e.core().position)?;
                    Ok(CastAim::Entity { id, kind })
                }
                _ => Err(RulesError::InvalidTarget(format!(
                    "{} needs a single target",
                    spell.name
                ))),
            },
            TargetType::Ally => match target {
                CastTarget::Entity {
                    id,
                    kind: EntityKind::Character,
                } => {
                    let e = state
                        .entity(id, EntityKind::Character)
                        .ok_or(RulesError::UnknownEntity)?;
                    check_range(e.core().position)?;
                    Ok(CastAim::Entity {
                        id,
                        kind: EntityKind::Character,
                    })
                }
                CastTarget::Entity { .. } => Err(RulesError::InvalidTarget(format!(
                    "{} only works on allies",
                    spell.name
                ))),
                _ => Err(RulesError::InvalidTarget(format!(
                    "{} needs an ally as target",
                    spell.name
                ))),
            },
            TargetType::Area => match target {
                CastTarget::Point(point) => {
                    check_range(point)?;
                    Ok(CastAim::Point(point))
                }
                _ => Err(RulesError::InvalidTarget(format!(
                    "{} is aimed at a point on the map",
                    spell.name
                ))),
            },
            TargetType::AllAllies => Ok(CastAim::Everyone),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn resolve_spell_effect(
        &self,
        state: &GameState,
        caster_level: u8,
        caster: EntityId,
        caster_name: &str,
        spell: &SpellData,
        aim: CastAim,
        mut resolution: Resolution,
        roller: &mut dyn DiceRoller,
    ) -> Result<Resolution, RulesError> {
        match &spell.effect {
            SpellEffect::Damage {
                dice,
                per_level_bonus,
                save,
                area_radius,
            } => {
                let mut damage = dice.roll(roller);
                if *per_level_bonus {
                    damage += caster_level as i32;
                }
                resolution = resolution.with_effect(Effect::DiceRolled {
                    purpose: format!("{} damage", spell.name),
                    value: damage,
                });

                match aim {
                    CastAim::Entity { id, kind } => {
                        let tgt = state.entity(id, kind).ok_or(RulesError::UnknownEntity)?;
                        let new_current = (tgt.core().hit_points.current - damage).max(0);
                        resolution.narrative = format!(
                            "{caster_name} casts {} at {}: {damage} damage!",
                            spell.name,
                            tgt.name()
                        );
                        resolution = resolution.with_effect(Effect::HpChanged {
                            id,
                            kind,
                            amount: -damage,
                            new_current,
                            dropped_to_zero: new_current == 0,
                        });
                    }
                    CastAim::Point(point) => {
                        let mut struck = 0;
                        let mut effects = Vec::new();
                        for (id, kind) in state.living() {
                            let e = state.entity(id, kind).ok_or(RulesError::UnknownEntity)?;
                            if distance(e.core().position, point) > *area_radius {
                                continue;
                            }
                            struck += 1;
                            let taken = match save {
                                Some(ability) => {
                                    let value = e.core().ability_scores.get(*ability);
                                    let check = roll_check(roller, value);
                                    effects.push(Effect::DiceRolled {
                                        purpose: format!("{} save for {}", ability, e.name()),
                                        value: check.roll as i32,
                                    });
                                    if check.success {
                                        damage / 2
                                    } else {
                                        damage
                                    }
                                }
                                None => damage,
                            };
                            let new_current = (e.core().hit_points.current - taken).max(0);
                            effects.push(Effect::HpChanged {
                                id,
                                kind,
                                amount: -taken,
                                new_current,
                                dropped_to_zero: new_current == 0,
                            });
                        }
                        resolution.narrative = format!(
                            "{caster_name} casts {} at {point}: {damage} damage across {struck} targets!",
                            spell.name
                        );
                        resolution = resolution.with_effects(effects);
                    }
                    CastAim::Everyone => {
                        return Err(RulesError::InvalidTarget(format!(
                            "{} cannot target everyone",
                            spell.name
                        )))
                    }
                }
            }
            SpellEffect::Healing {
                dice,
                per_level_bonus,
            } => {
                let CastAim::Entity { id, kind } = aim else {
                    return Err(RulesError::InvalidTarget(format!(
                        "{} needs an ally as target",
                        spell.name
                    )));
                };
                let mut healing = dice.roll(roller);
                if *per_level_bonus {
                    healing += caster_level as i32;
                }
                let tgt = state.entity(id, kind).ok_or(RulesError::UnknownEntity)?;
                let hp = &tgt.core().hit_points;
                let new_current = (hp.current + healing).min(hp.maximum);
                let restored = new_current - hp.current;
                resolution.narrative = format!(
                    "{caster_name} casts {} on {}: {restored} hit points restored.",
                    spell.name,
                    tgt.name()
                );
                resolution = resolution
                    .with_effect(Effect::DiceRolled {
                        purpose: format!("{} healing", spell.name),
                        value: healing,
                    })
                    .with_effect(Effect::HpChanged {
                        id,
                        kind,
                        amount: restored,
                        new_current,
                        dropped_to_zero: false,
                    });
            }
            SpellEffect::Buff {
                ability,
                value,
                turns,
            } => {
                let recipients: Vec<(EntityId, EntityKind)> = match aim {
                    // Party-wide blessings still stop at the spell's range.
                    CastAim::Everyone => {
                        let origin = state
                            .character(caster)
                            .map(|c| c.core.position)
                            .ok_or(RulesError::UnknownEntity)?;
                        state
                            .characters
                            .iter()
                            .filter(|c| !c.core.hit_points.is_downed())
                            .filter(|c| distance(origin, c.core.position) <= spell.range.meters())
                            .map(|c| (c.core.id, EntityKind::Character))
                            .collect()
                    }
                    CastAim::Entity { id, kind } => vec![(id, kind)],
                    CastAim::Point(_) => {
                        return Err(RulesError::InvalidTarget(format!(
                            "{} cannot target a point",
                            spell.name
                        )))
                    }
                };
                let count = recipients.len();
                for (id, kind) in recipients {
                    resolution = resolution.with_effect(Effect::EffectApplied {
                        id,
                        kind,
                        effect: ActiveEffect::new(
                            spell.id,
                            Some(caster),
                            EffectKind::AbilityModifier {
                                ability: *ability,
                                delta: *value,
                            },
                            Duration::Turns(*turns),
                        ),
                    });
                }
                resolution.narrative = format!(
                    "{caster_name} casts {}: {count} allies gain +{value} {ability} for {turns} turns.",
                    spell.name
                );
            }
            SpellEffect::Control {
                condition,
                concentration,
            } => {
                let CastAim::Entity { id, kind } = aim else {
                    return Err(RulesError::InvalidTarget(format!(
                        "{} needs a single target",
                        spell.name
                    )));
                };
                let tgt = state.entity(id, kind).ok_or(RulesError::UnknownEntity)?;
                let duration = if *concentration {
                    Duration::Concentration
                } else {
                    Duration::Turns(INFLICTED_CONDITION_TURNS)
                };
                resolution.narrative = format!(
                    "{caster_name} casts {} on {}: they are {}!",
                    spell.name,
                    tgt.name(),
                    condition.name()
                );
                resolution = resolution.with_effect(Effect::EffectApplied {
                    id,
                    kind,
                    effect: ActiveEffect::new(
                        spell.id,
                        Some(caster),
                        EffectKind::Control {
                            condition: *condition,
                        },
                        duration,
                    ),
                });
            }
        }
        Ok(resolution)
    }

    // ------------------------------------------------------------------
    // Combat flow
    // ------------------------------------------------------------------

    fn resolve_start_combat(
        &self,
        state: &GameState,
        roller: &mut dyn DiceRoller,
    ) -> Result<Resolution, RulesError> {
        if state.combat.is_some() {
            return Err(RulesError::CombatAlreadyActive);
        }
        let living = state.living();
        if living.is_empty() {
            return Err(RulesError::InvalidTarget(
                "there is no one to fight".to_string(),
            ));
        }

        let mut resolution = Resolution::new("Combat begins!");
        let mut combatants = Vec::new();
        for (id, kind) in living {
            let e = state.entity(id, kind).ok_or(RulesError::UnknownEntity)?;
            let dexterity = e.core().ability_scores.dexterity;
            let roll = roller.roll_die(20) as i32;
            let initiative = roll + e.core().ability_scores.modifier(Ability::Dexterity);
            resolution = resolution.with_effect(Effect::DiceRolled {
                purpose: format!("initiative for {}", e.name()),
                value: roll,
            });
            combatants.push(Combatant {
                id,
                kind,
                name: e.name().to_string(),
                initiative,
                dexterity,
            });
        }

        let session = CombatSession::new(combatants);
        Ok(resolution.with_effect(Effect::CombatStarted { session }))
    }

    fn resolve_next_turn(&self, state: &GameState) -> Result<Resolution, RulesError> {
        if state.combat.is_none() {
            return Err(RulesError::NoCombat);
        }
        // Narrative left empty; turn bookkeeping is logged in detail
        // while the effect is applied.
        Ok(Resolution::new("").with_effect(Effect::TurnAdvanced))
    }

    fn resolve_end_combat(&self, state: &GameState) -> Result<Resolution, RulesError> {
        if state.combat.is_none() {
            return Err(RulesError::NoCombat);
        }
        Ok(Resolution::new("Combat ends.").with_effect(Effect::CombatEnded))
    }

    // ------------------------------------------------------------------
    // Spell bookkeeping
    // ------------------------------------------------------------------

    fn resolve_memorize(
        &self,
        state: &GameState,
        character: EntityId,
        spell_id: &str,
    ) -> Result<Resolution, RulesError> {
        let ch = state.character(character).ok_or(RulesError::UnknownEntity)?;
        let spell = get_spell(spell_id)
            .ok_or_else(|| RulesError::UnknownSpell(spell_id.to_string()))?;
        if !ch.knows_spell(spell_id) {
            return Err(RulesError::InsufficientResources(format!(
                "{} is not in {}'s spellbook",
                spell.name, ch.core.name
            )));
        }
        if ch.has_memorized(spell_id) {
            return Err(RulesError::InvalidTarget(format!(
                "{} is already memorized",
                spell.name
            )));
        }
        // Memorized spells are capped at the character's level.
        if ch.memorized_spells.len() >= ch.level as usize {
            return Err(RulesError::InsufficientResources(format!(
                "{} cannot hold more than {} spells in mind",
                ch.core.name, ch.level
            )));
        }
        Ok(
            Resolution::new(format!("{} memorizes {}.", ch.core.name, spell.name)).with_effect(
                Effect::SpellMemorized {
                    character,
                    spell_id: spell_id.to_string(),
                },
            ),
        )
    }

    fn resolve_forget(
        &self,
        state: &GameState,
        character: EntityId,
        spell_id: &str,
    ) -> Result<Resolution, RulesError> {
        let ch = state.character(character).ok_or(RulesError::UnknownEntity)?;
        let spell = get_spell(spell_id)
            .ok_or_else(|| RulesError::UnknownSpell(spell_id.to_string()))?;
        if !ch.has_memorized(spell_id) {
            return Err(RulesError::InvalidTarget(format!(
                "{} is not memorized",
                spell.name
            )));
        }
        Ok(
            Resolution::new(format!("{} forgets {}.", ch.core.name, spell.name)).with_effect(
                Effect::SpellForgotten {
                    character,
                    spell_id: spell_id.to_string(),
                },
            ),
        )
    }

    fn resolve_restore(
        &self,
        state: &GameState,
        character: EntityId,
    ) -> Result<Resolution, RulesError> {
        let ch = state.character(character).ok_or(RulesError::UnknownEntity)?;
        if !ch.class.is_caster() {
            return Err(RulesError::InsufficientResources(format!(
                "{} has no spell slots to restore",
                ch.core.name
            )));
        }
        Ok(
            Resolution::new(format!("{}'s spell slots are restored.", ch.core.name))
                .with_effect(Effect::SpellSlotsRestored { character }),
        )
    }

    // ------------------------------------------------------------------
    // Misc
    // ------------------------------------------------------------------

    fn resolve_select(
        &self,
        state: &GameState,
        target: Option<(EntityId, EntityKind)>,
    ) -> Result<Resolution, RulesError> {
        let narrative = match target {
            Some((id, kind)) => {
                let e = state.entity(id, kind).ok_or(RulesError::UnknownEntity)?;
                format!("{} selected.", e.name())
            }
            None => "Selection cleared.".to_string(),
        };
        Ok(Resolution::new(narrative).with_effect(Effect::Selected { target }))
    }

    fn resolve_break(
        &self,
        state: &GameState,
        caster: EntityId,
    ) -> Result<Resolution, RulesError> {
        let ch = state.character(caster).ok_or(RulesError::UnknownEntity)?;
        if !self.is_concentrating(state, caster) {
            return Ok(Resolution::new(format!(
                "{} was not concentrating on anything.",
                ch.core.name
            )));
        }
        Ok(
            Resolution::new(format!("{}'s concentration is broken.", ch.core.name))
                .with_effect(Effect::ConcentrationBroken { caster }),
        )
    }
}

/// Where a validated cast lands.
enum CastAim {
    Entity { id: EntityId, kind: EntityKind },
    Point(Position),
    Everyone,
}

// ============================================================================
// Effect Application
// ============================================================================

/// Apply resolved effects to the state, in order.
pub fn apply_effects(state: &mut GameState, effects: &[Effect]) {
    for effect in effects {
        apply_effect(state, effect);
    }
}

pub fn apply_effect(state: &mut GameState, effect: &Effect) {
    match effect {
        Effect::DiceRolled { .. } => {}

        Effect::Moved { id, kind, to } => {
            if let Some(mut e) = state.entity_mut(*id, *kind) {
                e.core_mut().position = *to;
            }
        }
        Effect::MoveSpent { id, kind } => {
            if let Some(combat) = state.combat.as_mut() {
                combat.mark_moved(*id, *kind);
            }
        }
        Effect::ActionSpent { id, kind } => {
            if let Some(combat) = state.combat.as_mut() {
                combat.mark_acted(*id, *kind);
            }
        }

        Effect::HpChanged {
            id,
            kind,
            new_current,
            dropped_to_zero,
            ..
        } => {
            let name = match state.entity(*id, *kind) {
                Some(e) => e.name().to_string(),
                None => return,
            };
            let was_up = state
                .entity(*id, *kind)
                .is_some_and(|e| !e.is_downed());
            if let Some(mut e) = state.entity_mut(*id, *kind) {
                e.core_mut().hit_points.current = *new_current;
            }
            if *dropped_to_zero && was_up {
                state.log(format!("{name} has fallen!"), LogCategory::Combat);
            }
        }

        Effect::EffectApplied { id, kind, effect } => {
            if let Some(mut e) = state.entity_mut(*id, *kind) {
                crate::effects::apply_active_effect(e.core_mut(), effect.clone());
            }
        }

        Effect::ConcentrationBroken { caster } => {
            let everyone: Vec<(EntityId, EntityKind, String)> = state
                .characters
                .iter()
                .map(|c| (c.core.id, EntityKind::Character, c.core.name.clone()))
                .chain(
                    state
                        .monsters
                        .iter()
                        .map(|m| (m.core.id, EntityKind::Monster, m.core.name.clone())),
                )
                .collect();
            for (id, kind, name) in everyone {
                let broken = match state.entity_mut(id, kind) {
                    Some(mut e) => break_concentration_on(e.core_mut(), *caster),
                    None => Vec::new(),
                };
                for b in broken {
                    state.log(
                        format!("The {} effect on {name} ends.", b.source),
                        LogCategory::Magic,
                    );
                }
            }
        }

        Effect::SpellSlotUsed { caster, level } => {
            if let Some(ch) = state.character_mut(*caster) {
                if let Some(slots) = ch.spell_slots.get_mut(level) {
                    *slots = slots.saturating_sub(1);
                }
            }
        }
        Effect::SpellMemorized {
            character,
            spell_id,
        } => {
            if let Some(ch) = state.character_mut(*character) {
                if !ch.has_memorized(spell_id) {
                    ch.memorized_spells.push(spell_id.clone());
                }
            }
        }
        Effect::SpellForgotten {
            character,
            spell_id,
        } => {
            if let Some(ch) = state.character_mut(*character) {
                ch.memorized_spells.retain(|s| s != spell_id);
            }
        }
        Effect::SpellSlotsRestored { character } => {
            if let Some(ch) = state.character_mut(*character) {
                ch.spell_slots = max_slots(ch.class, ch.level);
            }
        }

        Effect::CombatStarted { session } => {
            for c in &session.order {
                state.log(
                    format!("{} rolls initiative: {}", c.name, c.initiative),
                    LogCategory::Initiative,
                );
            }
            let first = session.current().map(|c| c.name.clone());
            state.combat = Some(session.clone());
            if let Some(first) = first {
                state.log(format!("Round 1: {first}'s turn."), LogCategory::Turn);
            }
        }
        Effect::TurnAdvanced => advance_turn(state),
        Effect::CombatEnded => {
            state.combat = None;
        }

        Effect::TimeAdvanced { minutes } => {
            state.clock_minutes += minutes;
            let everyone: Vec<(EntityId, EntityKind)> = state
                .characters
                .iter()
                .map(|c| (c.core.id, EntityKind::Character))
                .chain(
                    state
                        .monsters
                        .iter()
                        .map(|m| (m.core.id, EntityKind::Monster)),
                )
                .collect();
            for (id, kind) in everyone {
                tick_entity(state, id, kind, Tick::TimePassed { minutes: *minutes });
            }
        }
        Effect::Selected { target } => {
            state.selected = *target;
        }
    }
}

/// End the current combatant's turn and hand the spotlight on,
/// ticking effects and skipping anyone who is down.
fn advance_turn(state: &mut GameState) {
    let finished = state.combat.as_ref().and_then(|c| c.current().cloned());
    if let Some(prev) = finished {
        tick_entity(state, prev.id, prev.kind, Tick::TurnEnd);
    }

    advance_session(state);

    // Downed combatants keep their slot but never take a turn.
    let order_len = state.combat.as_ref().map(|c| c.order.len()).unwrap_or(0);
    for _ in 0..order_len {
        let current = state.combat.as_ref().and_then(|c| c.current().cloned());
        let Some(current) = current else { break };
        let downed = state
            .entity(current.id, current.kind)
            .map(|e| e.is_downed())
            .unwrap_or(true);
        if !downed {
            break;
        }
        state.log(
            format!("{} is down and skips their turn.", current.name),
            LogCategory::Turn,
        );
        advance_session(state);
    }

    if let Some(current) = state.combat.as_ref().and_then(|c| c.current().cloned()) {
        state.log(format!("{}'s turn.", current.name), LogCategory::Turn);
    }
}

/// Advance the initiative pointer; on round rollover, log the new
/// round and run round-based effect ticks for everyone in the order.
fn advance_session(state: &mut GameState) {
    let rolled_over = match state.combat.as_mut() {
        Some(c) => c.advance(),
        None => return,
    };
    if !rolled_over {
        return;
    }
    let round = state.combat.as_ref().map(|c| c.round).unwrap_or(0);
    state.log(format!("Round {round} begins."), LogCategory::Turn);
    let order: Vec<(EntityId, EntityKind)> = state
        .combat
        .as_ref()
        .map(|c| c.order.iter().map(|x| (x.id, x.kind)).collect())
        .unwrap_or_default();
    for (id, kind) in order {
        tick_entity(state, id, kind, Tick::RoundEnd);
    }
}

/// Run one effect tick for an entity and log whatever it did.
fn tick_entity(state: &mut GameState, id: EntityId, kind: EntityKind, tick: Tick) {
    let name = match state.entity(id, kind) {
        Some(e) => e.name().to_string(),
        None => return,
    };
    let report = match state.entity_mut(id, kind) {
        Some(mut e) => tick_effects(e.core_mut(), tick),
        None => return,
    };
    if report.damage_taken > 0 {
        state.log(
            format!(
                "{name} takes {} damage from lingering effects.",
                report.damage_taken
            ),
            LogCategory::Combat,
        );
    }
    if report.dropped_to_zero {
        state.log(format!("{name} has fallen!"), LogCategory::Combat);
    }
    if report.healing_received > 0 {
        state.log(
            format!(
                "{name} regains {} hit points from lingering effects.",
                report.healing_received
            ),
            LogCategory::Magic,
        );
    }
    for expired in &report.expired {
        state.log(
            format!("The {} effect on {name} wears off.", expired.source),
            LogCategory::Magic,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dice::FixedRoller;
    use crate::world::{sample_state, Condition};

    fn ids(state: &GameState) -> (EntityId, EntityId, EntityId) {
        (
            state.characters[0].core.id, // Thorgrim, Warrior STR 16
            state.characters[1].core.id, // Elara, Sorcerer INT 16
            state.monsters[0].core.id,   // Ghoul
        )
    }

    fn place_adjacent(state: &mut GameState) {
        state.characters[0].core.position = Position::new(9, 8);
        state.monsters[0].core.position = Position::new(10, 8);
    }

    #[test]
    fn test_melee_hit_applies_damage() {
        let mut state = sample_state();
        place_adjacent(&mut state);
        let (thorgrim, _, ghoul) = ids(&state);
        // To-hit 5 (vs STR 16, success), damage die 6.
        let mut roller = FixedRoller::new([5, 6]);

        let resolution = RulesEngine::new()
            .resolve(
                &state,
                Intent::Attack {
                    attacker: (thorgrim, EntityKind::Character),
                    target: (ghoul, EntityKind::Monster),
                    mode: AttackMode::Melee,
                    attack_name: None,
                },
                &mut roller,
            )
            .unwrap();
        apply_effects(&mut state, &resolution.effects);

        assert_eq!(state.monsters[0].core.hit_points.current, 11 - 6);
        assert!(resolution.narrative.contains("6 damage"));
    }

    #[test]
    fn test_natural_one_doubles_damage() {
        let mut state = sample_state();
        place_adjacent(&mut state);
        let (thorgrim, _, ghoul) = ids(&state);
        let mut roller = FixedRoller::new([1, 4]);

        let resolution = RulesEngine::new()
            .resolve(
                &state,
                Intent::Attack {
                    attacker: (thorgrim, EntityKind::Character),
                    target: (ghoul, EntityKind::Monster),
                    mode: AttackMode::Melee,
                    attack_name: None,
                },
                &mut roller,
            )
            .unwrap();
        apply_effects(&mut state, &resolution.effects);

        assert_eq!(state.monsters[0].core.hit_points.current, 11 - 8);
        assert!(resolution.narrative.contains("Critical"));
    }

    #[test]
    fn test_miss_changes_nothing() {
        let mut state = sample_state();
        place_adjacent(&mut state);
        let (thorgrim, _, ghoul) = ids(&state);
        // 19 > STR 16: miss, and the scripted damage die must go unused.
        let mut roller = FixedRoller::new([19, 6]);

        let resolution = RulesEngine::new()
            .resolve(
                &state,
                Intent::Attack {
                    attacker: (thorgrim, EntityKind::Character),
                    target: (ghoul, EntityKind::Monster),
                    mode: AttackMode::Melee,
                    attack_name: None,
                },
                &mut roller,
            )
            .unwrap();
        apply_effects(&mut state, &resolution.effects);

        assert_eq!(state.monsters[0].core.hit_points.current, 11);
        assert!(resolution.narrative.contains("misses"));
        assert_eq!(roller.remaining(), 1);
    }

    #[test]
    fn test_ranged_point_blank_takes_worse_die() {
        let mut state = sample_state();
        place_adjacent(&mut state);
        let (thorgrim, _, ghoul) = ids(&state);
        // Two d20s rolled: 3 and 15; the higher (worse) one counts.
        // 15 > DEX 12: miss.
        let mut roller = FixedRoller::new([3, 15]);

        let resolution = RulesEngine::new()
            .resolve(
                &state,
                Intent::Attack {
                    attacker: (thorgrim, EntityKind::Character),
                    target: (ghoul, EntityKind::Monster),
                    mode: AttackMode::Ranged,
                    attack_name: None,
                },
                &mut roller,
            )
            .unwrap();
        assert!(resolution.narrative.contains("rolled 15"));
        assert!(resolution.narrative.contains("misses"));
    }

    #[test]
    fn test_melee_out_of_range_rejected() {
        let state = sample_state();
        let (thorgrim, _, ghoul) = ids(&state);
        let mut roller = FixedRoller::new([]);

        let err = RulesEngine::new()
            .resolve(
                &state,
                Intent::Attack {
                    attacker: (thorgrim, EntityKind::Character),
                    target: (ghoul, EntityKind::Monster),
                    mode: AttackMode::Melee,
                    attack_name: None,
                },
                &mut roller,
            )
            .unwrap_err();
        assert!(matches!(err, RulesError::OutOfRange { .. }));
    }

    #[test]
    fn test_ghoul_hit_paralyzes() {
        let mut state = sample_state();
        place_adjacent(&mut state);
        let (thorgrim, _, ghoul) = ids(&state);
        let mut roller = FixedRoller::new([4, 3]);

        let resolution = RulesEngine::new()
            .resolve(
                &state,
                Intent::Attack {
                    attacker: (ghoul, EntityKind::Monster),
                    target: (thorgrim, EntityKind::Character),
                    mode: AttackMode::Melee,
                    attack_name: None,
                },
                &mut roller,
            )
            .unwrap();
        apply_effects(&mut state, &resolution.effects);

        assert!(state.characters[0].core.has_condition(Condition::Paralyzed));
        assert!(state.characters[0].core.is_incapacitated());
    }

    #[test]
    fn test_failed_cast_still_spends_slot() {
        let mut state = sample_state();
        let (_, elara, ghoul) = ids(&state);
        state.characters[1].core.position = Position::new(9, 8);
        // Check roll 18 + level 1 = 19 > INT 16: fizzle.
        let mut roller = FixedRoller::new([18]);

        let resolution = RulesEngine::new()
            .resolve(
                &state,
                Intent::CastSpell {
                    caster: elara,
                    spell_id: "magic_missile".to_string(),
                    target: CastTarget::Entity {
                        id: ghoul,
                        kind: EntityKind::Monster,
                    },
                },
                &mut roller,
            )
            .unwrap();
        apply_effects(&mut state, &resolution.effects);

        assert_eq!(state.characters[1].slots_remaining(1), 1);
        assert_eq!(state.monsters[0].core.hit_points.current, 11);
        assert!(resolution.narrative.contains("fumbles"));
    }

    #[test]
    fn test_cast_out_of_range_rejected_before_slot_spend() {
        let mut state = sample_state();
        let (_, elara, ghoul) = ids(&state);
        // Far range is 36 units = 24 cells; corner to corner is about 40.
        state.characters[1].core.position = Position::new(0, 0);
        state.monsters[0].core.position = Position::new(19, 19);
        let mut roller = FixedRoller::new([]);

        let err = RulesEngine::new()
            .resolve(
                &state,
                Intent::CastSpell {
                    caster: elara,
                    spell_id: "magic_missile".to_string(),
                    target: CastTarget::Entity {
                        id: ghoul,
                        kind: EntityKind::Monster,
                    },
                },
                &mut roller,
            )
            .unwrap_err();
        assert!(matches!(err, RulesError::OutOfRange { .. }));
        assert_eq!(state.characters[1].slots_remaining(1), 2);
    }

    #[test]
    fn test_far_spells_reach_fourteen_cells() {
        let mut state = sample_state();
        let (_, elara, ghoul) = ids(&state);
        // 14 cells = 21 units, well inside the 36 unit Far band.
        state.characters[1].core.position = Position::new(0, 0);
        state.monsters[0].core.position = Position::new(14, 0);
        // Check 10 + 1 <= 16. Damage d4 rolls 3, +3 levels = 6.
        let mut roller = FixedRoller::new([10, 3]);

        let resolution = RulesEngine::new()
            .resolve(
                &state,
                Intent::CastSpell {
                    caster: elara,
                    spell_id: "magic_missile".to_string(),
                    target: CastTarget::Entity {
                        id: ghoul,
                        kind: EntityKind::Monster,
                    },
                },
                &mut roller,
            )
            .unwrap();
        apply_effects(&mut state, &resolution.effects);

        assert_eq!(state.monsters[0].core.hit_points.current, 11 - 6);
    }

    #[test]
    fn test_magic_missile_adds_level_to_damage() {
        let mut state = sample_state();
        let (_, elara, ghoul) = ids(&state);
        state.characters[1].core.position = Position::new(9, 8);
        state.monsters[0].core.position = Position::new(10, 8);
        // Check 10 + 1 <= 16: success. Damage d4 rolls 3, +3 levels = 6.
        let mut roller = FixedRoller::new([10, 3]);

        let resolution = RulesEngine::new()
            .resolve(
                &state,
                Intent::CastSpell {
                    caster: elara,
                    spell_id: "magic_missile".to_string(),
                    target: CastTarget::Entity {
                        id: ghoul,
                        kind: EntityKind::Monster,
                    },
                },
                &mut roller,
            )
            .unwrap();
        apply_effects(&mut state, &resolution.effects);

        assert_eq!(state.monsters[0].core.hit_points.current, 11 - 6);
        assert_eq!(state.characters[1].slots_remaining(1), 1);
    }

    #[test]
    fn test_unmemorized_spell_rejected() {
        let state = sample_state();
        let (_, elara, ghoul) = ids(&state);
        let mut roller = FixedRoller::new([]);

        let err = RulesEngine::new()
            .resolve(
                &state,
                Intent::CastSpell {
                    caster: elara,
                    spell_id: "fireball".to_string(),
                    target: CastTarget::Entity {
                        id: ghoul,
                        kind: EntityKind::Monster,
                    },
                },
                &mut roller,
            )
            .unwrap_err();
        assert!(matches!(err, RulesError::InsufficientResources(_)));
    }

    #[test]
    fn test_fireball_area_saves_halve_damage() {
        let mut state = sample_state();
        let (_, elara, _) = ids(&state);
        let elara_ch = &mut state.characters[1];
        elara_ch.memorized_spells.push("fireball".to_string());
        elara_ch.spell_slots.insert(3, 1);
        elara_ch.core.position = Position::new(0, 0);
        // Cluster everyone else near the blast point, caster far away.
        state.characters[0].core.position = Position::new(10, 0);
        state.monsters[0].core.position = Position::new(10, 1);
        let point = Position::new(10, 0);

        // Check 5+3 <= 16. Damage 6d6 = 2+2+2+2+2+2 = 12.
        // Saves in living() order (Thorgrim DEX 12, Ghoul DEX 10):
        // Thorgrim rolls 4 (succeeds, takes 6), Ghoul rolls 20 (fails,
        // takes 12). Elara is out of the radius entirely.
        let mut roller = FixedRoller::new([5, 2, 2, 2, 2, 2, 2, 4, 20]);

        let resolution = RulesEngine::new()
            .resolve(
                &state,
                Intent::CastSpell {
                    caster: elara,
                    spell_id: "fireball".to_string(),
                    target: CastTarget::Point(point),
                },
                &mut roller,
            )
            .unwrap();
        apply_effects(&mut state, &resolution.effects);

        assert_eq!(state.characters[0].core.hit_points.current, 22 - 6);
        assert_eq!(state.monsters[0].core.hit_points.current, 0);
        assert_eq!(state.characters[1].core.hit_points.current, 12);
    }

    #[test]
    fn test_bless_buffs_every_living_character() {
        let mut state = sample_state();
        let (_, elara, _) = ids(&state);
        let ch = &mut state.characters[1];
        ch.memorized_spells.push("bless".to_string());
        // Bless is divine; Elara's casting school check still uses the
        // spell's school attribute, Wisdom 12. Roll 8 + 2 <= 12.
        let mut roller = FixedRoller::new([8]);

        let resolution = RulesEngine::new()
            .resolve(
                &state,
                Intent::CastSpell {
                    caster: elara,
                    spell_id: "bless".to_string(),
                    target: CastTarget::None,
                },
                &mut roller,
            )
            .unwrap();
        apply_effects(&mut state, &resolution.effects);

        for c in &state.characters {
            assert_eq!(c.core.active_effects.len(), 1);
        }
        assert_eq!(state.characters[0].core.ability_scores.wisdom, 11 + 2);
        assert!(state.monsters[0].core.active_effects.is_empty());
    }

    #[test]
    fn test_bless_skips_allies_beyond_its_range() {
        let mut state = sample_state();
        let (_, elara, _) = ids(&state);
        let ch = &mut state.characters[1];
        ch.memorized_spells.push("bless".to_string());
        ch.core.position = Position::new(0, 0);
        // Corner to corner is about 40 units, past the 18 unit Close band.
        state.characters[0].core.position = Position::new(19, 19);
        let mut roller = FixedRoller::new([8]);

        let resolution = RulesEngine::new()
            .resolve(
                &state,
                Intent::CastSpell {
                    caster: elara,
                    spell_id: "bless".to_string(),
                    target: CastTarget::None,
                },
                &mut roller,
            )
            .unwrap();
        apply_effects(&mut state, &resolution.effects);

        assert_eq!(state.characters[1].core.active_effects.len(), 1);
        assert!(state.characters[0].core.active_effects.is_empty());
        assert_eq!(state.characters[0].core.ability_scores.wisdom, 11);
    }

    #[test]
    fn test_new_concentration_displaces_old() {
        let mut state = sample_state();
        let (thorgrim, elara, ghoul) = ids(&state);
        let ch = &mut state.characters[1];
        ch.memorized_spells.push("hold_person".to_string());
        ch.spell_slots.insert(2, 2);
        ch.core.position = Position::new(9, 8);
        state.characters[0].core.position = Position::new(9, 9);
        state.monsters[0].core.position = Position::new(10, 8);
        let engine = RulesEngine::new();

        let mut roller = FixedRoller::new([5]);
        let resolution = engine
            .resolve(
                &state,
                Intent::CastSpell {
                    caster: elara,
                    spell_id: "hold_person".to_string(),
                    target: CastTarget::Entity {
                        id: ghoul,
                        kind: EntityKind::Monster,
                    },
                },
                &mut roller,
            )
            .unwrap();
        apply_effects(&mut state, &resolution.effects);
        assert!(state.monsters[0].core.has_condition(Condition::Paralyzed));

        // Holding a second target releases the first.
        let mut roller = FixedRoller::new([5]);
        let resolution = engine
            .resolve(
                &state,
                Intent::CastSpell {
                    caster: elara,
                    spell_id: "hold_person".to_string(),
                    target: CastTarget::Entity {
                        id: thorgrim,
                        kind: EntityKind::Character,
                    },
                },
                &mut roller,
            )
            .unwrap();
        apply_effects(&mut state, &resolution.effects);

        assert!(!state.monsters[0].core.has_condition(Condition::Paralyzed));
        assert!(state.characters[0].core.has_condition(Condition::Paralyzed));
    }

    #[test]
    fn test_initiative_tie_broken_by_dexterity() {
        let mut state = sample_state();
        // Remove the ghoul; two characters with DEX 12 and 14.
        state.monsters.clear();
        // Thorgrim DEX 12 rolls 13 (13+1=14); Elara DEX 14 rolls 12 (12+2=14).
        let mut roller = FixedRoller::new([13, 12]);

        let resolution = RulesEngine::new()
            .resolve(&state, Intent::StartCombat, &mut roller)
            .unwrap();
        apply_effects(&mut state, &resolution.effects);

        let combat = state.combat.as_ref().unwrap();
        assert_eq!(combat.order[0].name, "Elara");
        assert_eq!(combat.order[1].name, "Thorgrim");
    }

    #[test]
    fn test_move_out_of_turn_rejected() {
        let mut state = sample_state();
        let mut roller = FixedRoller::new([20, 10, 1]);
        let resolution = RulesEngine::new()
            .resolve(&state, Intent::StartCombat, &mut roller)
            .unwrap();
        apply_effects(&mut state, &resolution.effects);

        let combat = state.combat.as_ref().unwrap();
        let second = (combat.order[1].id, combat.order[1].kind);
        let pos = state.entity(second.0, second.1).unwrap().core().position;

        let err = RulesEngine::new()
            .resolve(
                &state,
                Intent::MoveEntity {
                    id: second.0,
                    kind: second.1,
                    to: Position::new(pos.x + 1, pos.y),
                    dungeon_master: false,
                },
                &mut roller,
            )
            .unwrap_err();
        assert!(matches!(err, RulesError::NotYourTurn { .. }));
    }

    #[test]
    fn test_downed_combatant_is_skipped() {
        let mut state = sample_state();
        let mut roller = FixedRoller::new([20, 15, 1]);
        let resolution = RulesEngine::new()
            .resolve(&state, Intent::StartCombat, &mut roller)
            .unwrap();
        apply_effects(&mut state, &resolution.effects);

        // Down the second combatant in the order.
        let second = state.combat.as_ref().unwrap().order[1].clone();
        if let Some(mut e) = state.entity_mut(second.id, second.kind) {
            e.core_mut().hit_points.current = 0;
        }

        let resolution = RulesEngine::new()
            .resolve(&state, Intent::NextTurn, &mut FixedRoller::new([]))
            .unwrap();
        apply_effects(&mut state, &resolution.effects);

        let combat = state.combat.as_ref().unwrap();
        assert_eq!(combat.turn_index, 2);
        assert!(state
            .game_log
            .iter()
            .any(|l| l.message.contains("skips their turn")));
    }

    #[test]
    fn test_turn_end_ticks_bearer_effects() {
        let mut state = sample_state();
        let mut roller = FixedRoller::new([20, 15, 1]);
        let resolution = RulesEngine::new()
            .resolve(&state, Intent::StartCombat, &mut roller)
            .unwrap();
        apply_effects(&mut state, &resolution.effects);

        let first = state.combat.as_ref().unwrap().order[0].clone();
        if let Some(mut e) = state.entity_mut(first.id, first.kind) {
            crate::effects::apply_active_effect(
                e.core_mut(),
                ActiveEffect::new(
                    "burning",
                    None,
                    EffectKind::DamageOverTime { amount: 2 },
                    Duration::Turns(3),
                ),
            );
        }
        let hp_before = state
            .entity(first.id, first.kind)
            .unwrap()
            .core()
            .hit_points
            .current;

        let resolution = RulesEngine::new()
            .resolve(&state, Intent::NextTurn, &mut FixedRoller::new([]))
            .unwrap();
        apply_effects(&mut state, &resolution.effects);

        let hp_after = state
            .entity(first.id, first.kind)
            .unwrap()
            .core()
            .hit_points
            .current;
        assert_eq!(hp_after, hp_before - 2);
    }

    #[test]
    fn test_memorize_forget_round_trip() {
        let mut state = sample_state();
        let (_, elara, _) = ids(&state);
        let before = state.characters[1].memorized_spells.clone();
        let engine = RulesEngine::new();
        let mut roller = FixedRoller::new([]);

        let resolution = engine
            .resolve(
                &state,
                Intent::MemorizeSpell {
                    character: elara,
                    spell_id: "fireball".to_string(),
                },
                &mut roller,
            )
            .unwrap();
        apply_effects(&mut state, &resolution.effects);
        assert!(state.characters[1].has_memorized("fireball"));

        let resolution = engine
            .resolve(
                &state,
                Intent::ForgetSpell {
                    character: elara,
                    spell_id: "fireball".to_string(),
                },
                &mut roller,
            )
            .unwrap();
        apply_effects(&mut state, &resolution.effects);
        assert_eq!(state.characters[1].memorized_spells, before);
    }

    #[test]
    fn test_memorization_caps_at_character_level() {
        let mut state = sample_state();
        let (_, elara, _) = ids(&state);
        let ch = &mut state.characters[1];
        ch.spellbook.push("cure_wounds".to_string());
        // Three spells already in mind at level 3: the cap is reached.
        ch.memorized_spells = vec![
            "magic_missile".to_string(),
            "fireball".to_string(),
            "hold_person".to_string(),
        ];

        let err = RulesEngine::new()
            .resolve(
                &state,
                Intent::MemorizeSpell {
                    character: elara,
                    spell_id: "cure_wounds".to_string(),
                },
                &mut FixedRoller::new([]),
            )
            .unwrap_err();
        assert!(matches!(err, RulesError::InsufficientResources(_)));
        assert_eq!(state.characters[1].memorized_spells.len(), 3);
    }

    #[test]
    fn test_memorize_requires_spellbook_entry() {
        let state = sample_state();
        let (_, elara, _) = ids(&state);
        let err = RulesEngine::new()
            .resolve(
                &state,
                Intent::MemorizeSpell {
                    character: elara,
                    spell_id: "cure_wounds".to_string(),
                },
                &mut FixedRoller::new([]),
            )
            .unwrap_err();
        assert!(matches!(err, RulesError::InsufficientResources(_)));
    }

    #[test]
    fn test_restore_spell_slots() {
        let mut state = sample_state();
        let (_, elara, _) = ids(&state);
        state.characters[1].spell_slots.insert(1, 0);

        let resolution = RulesEngine::new()
            .resolve(
                &state,
                Intent::RestoreSpellSlots { character: elara },
                &mut FixedRoller::new([]),
            )
            .unwrap();
        apply_effects(&mut state, &resolution.effects);

        // Sorcerer level 3: table row gives 3 level-1 and 1 level-2.
        assert_eq!(state.characters[1].slots_remaining(1), 3);
        assert_eq!(state.characters[1].slots_remaining(2), 1);
    }

    #[test]
    fn test_hazard_check_failure_deals_damage() {
        let mut state = sample_state();
        let (thorgrim, _, _) = ids(&state);
        // CON 14 - 7 = 7: roll 18 fails, hazard d6 rolls 4.
        let mut roller = FixedRoller::new([18, 4]);

        let resolution = RulesEngine::new()
            .resolve(
                &state,
                Intent::CheckTerrain {
                    character: thorgrim,
                    terrain: Terrain::Hazard,
                },
                &mut roller,
            )
            .unwrap();
        apply_effects(&mut state, &resolution.effects);

        assert_eq!(state.characters[0].core.hit_points.current, 22 - 4);
    }

    #[test]
    fn test_select_entity() {
        let mut state = sample_state();
        let (_, _, ghoul) = ids(&state);
        let resolution = RulesEngine::new()
            .resolve(
                &state,
                Intent::SelectEntity {
                    target: Some((ghoul, EntityKind::Monster)),
                },
                &mut FixedRoller::new([]),
            )
            .unwrap();
        apply_effects(&mut state, &resolution.effects);
        assert_eq!(state.selected, Some((ghoul, EntityKind::Monster)));
        assert!(resolution.narrative.contains("Ghoul"));
    }
}
