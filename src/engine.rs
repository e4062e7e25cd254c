//! Engine facade for the UI layer.
//!
//! The [`Engine`] owns the dice roller and the rules, but never the
//! game state: every call takes the caller's current snapshot and
//! returns a new one, so a rendering layer can keep displaying the old
//! state while the next one is computed. Rejected intents come back as
//! an error-category log entry on an otherwise unchanged snapshot.

use crate::dice::{DiceRoller, ThreadRoller};
use crate::grid::{Position, Terrain};
use crate::rules::{apply_effects, AttackMode, CastTarget, Intent, RulesEngine};
use crate::world::{EntityId, EntityKind, GameState, LogCategory};

pub struct Engine {
    rules: RulesEngine,
    dice: Box<dyn DiceRoller>,
}

impl Engine {
    pub fn new() -> Self {
        Self::with_roller(Box::new(ThreadRoller::new()))
    }

    /// Build an engine around a specific roller, e.g. a scripted one.
    pub fn with_roller(dice: Box<dyn DiceRoller>) -> Self {
        Self {
            rules: RulesEngine::new(),
            dice,
        }
    }

    /// Resolve one intent against a snapshot and return the next one.
    pub fn dispatch(&mut self, state: &GameState, intent: Intent) -> GameState {
        let mut next = state.clone();
        let category = intent.log_category();
        match self.rules.resolve(&next, intent, self.dice.as_mut()) {
            Ok(resolution) => {
                if !resolution.narrative.is_empty() {
                    next.log(resolution.narrative.clone(), category);
                }
                apply_effects(&mut next, &resolution.effects);
            }
            Err(err) => next.log(err.to_string(), LogCategory::Error),
        }
        next
    }

    pub fn start_combat(&mut self, state: &GameState) -> GameState {
        self.dispatch(state, Intent::StartCombat)
    }

    pub fn next_turn(&mut self, state: &GameState) -> GameState {
        self.dispatch(state, Intent::NextTurn)
    }

    pub fn end_combat(&mut self, state: &GameState) -> GameState {
        self.dispatch(state, Intent::EndCombat)
    }

    pub fn move_entity(
        &mut self,
        state: &GameState,
        id: EntityId,
        kind: EntityKind,
        to: Position,
        dungeon_master: bool,
    ) -> GameState {
        self.dispatch(
            state,
            Intent::MoveEntity {
                id,
                kind,
                to,
                dungeon_master,
            },
        )
    }

    pub fn attack(
        &mut self,
        state: &GameState,
        attacker: (EntityId, EntityKind),
        target: (EntityId, EntityKind),
        mode: AttackMode,
        attack_name: Option<&str>,
    ) -> GameState {
        self.dispatch(
            state,
            Intent::Attack {
                attacker,
                target,
                mode,
                attack_name: attack_name.map(str::to_string),
            },
        )
    }

    pub fn cast_spell(
        &mut self,
        state: &GameState,
        caster: EntityId,
        spell_id: &str,
        target: CastTarget,
    ) -> GameState {
        self.dispatch(
            state,
            Intent::CastSpell {
                caster,
                spell_id: spell_id.to_string(),
                target,
            },
        )
    }

    pub fn memorize_spell(
        &mut self,
        state: &GameState,
        character: EntityId,
        spell_id: &str,
    ) -> GameState {
        self.dispatch(
            state,
            Intent::MemorizeSpell {
                character,
                spell_id: spell_id.to_string(),
            },
        )
    }

    pub fn forget_spell(
        &mut self,
        state: &GameState,
        character: EntityId,
        spell_id: &str,
    ) -> GameState {
        self.dispatch(
            state,
            Intent::ForgetSpell {
                character,
                spell_id: spell_id.to_string(),
            },
        )
    }

    pub fn restore_spell_slots(&mut self, state: &GameState, character: EntityId) -> GameState {
        self.dispatch(state, Intent::RestoreSpellSlots { character })
    }

    pub fn check_terrain(
        &mut self,
        state: &GameState,
        character: EntityId,
        terrain: Terrain,
    ) -> GameState {
        self.dispatch(state, Intent::CheckTerrain { character, terrain })
    }

    pub fn select_entity(
        &mut self,
        state: &GameState,
        target: Option<(EntityId, EntityKind)>,
    ) -> GameState {
        self.dispatch(state, Intent::SelectEntity { target })
    }

    pub fn break_concentration(&mut self, state: &GameState, caster: EntityId) -> GameState {
        self.dispatch(state, Intent::BreakConcentration { caster })
    }

    pub fn advance_time(&mut self, state: &GameState, minutes: u64) -> GameState {
        self.dispatch(state, Intent::AdvanceTime { minutes })
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
