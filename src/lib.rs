//! Roll-under tabletop rules engine.
//!
//! This crate provides:
//! - Grid movement with terrain, bounds, and occupancy rules
//! - Turn-based combat with initiative and per-turn action budgets
//! - Roll-under d20 attack and spellcasting resolution
//! - Timed effects with ticking, expiry, and concentration
//!
//! # Quick Start
//!
//! ```
//! use vtt_core::{sample_state, Engine};
//!
//! let state = sample_state();
//! let mut engine = Engine::new();
//!
//! let state = engine.start_combat(&state);
//! let combat = state.combat.as_ref().unwrap();
//! println!("Round {}, {} acts first", combat.round, combat.order[0].name);
//! ```

pub mod combat;
pub mod dice;
pub mod effects;
pub mod engine;
pub mod grid;
pub mod rules;
pub mod spells;
pub mod world;

// Primary public API
pub use combat::{Combatant, CombatSession};
pub use dice::{DiceExpression, DiceRoller, FixedRoller, ThreadRoller};
pub use effects::{ActiveEffect, Duration, EffectKind};
pub use engine::Engine;
pub use grid::{MapElement, Position, Terrain, TerrainKind};
pub use rules::{
    apply_effects, AttackMode, CastTarget, Effect, Intent, Resolution, RulesEngine, RulesError,
};
pub use spells::{get_spell, SpellData, SpellSchool, TargetType};
pub use world::{
    sample_state, Ability, Character, CharacterClass, Condition, EntityId, EntityKind, GameState,
    LogCategory, LogEntry, Monster,
};
