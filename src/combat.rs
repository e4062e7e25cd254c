//! Initiative order and turn tracking.
//!
//! A [`CombatSession`] freezes the table into an initiative order and
//! tracks whose turn it is, which round we are on, and who has already
//! moved or acted this round.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::world::{EntityId, EntityKind};

/// One slot in the initiative order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Combatant {
    pub id: EntityId,
    pub kind: EntityKind,
    pub name: String,
    /// d20 plus dexterity modifier, rolled once at combat start.
    pub initiative: i32,
    /// Raw dexterity, kept for tie-breaking.
    pub dexterity: i32,
}

/// An active combat encounter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatSession {
    /// Sorted highest initiative first; ties go to higher dexterity.
    pub order: Vec<Combatant>,
    pub turn_index: usize,
    /// Rounds count from 1.
    pub round: u32,
    moved: HashSet<(EntityId, EntityKind)>,
    acted: HashSet<(EntityId, EntityKind)>,
}

impl CombatSession {
    /// Build a session from rolled combatants. Slots are fixed for the
    /// whole encounter; entities dropping to zero keep theirs.
    pub fn new(mut combatants: Vec<Combatant>) -> Self {
        combatants.sort_by(|a, b| {
            b.initiative
                .cmp(&a.initiative)
                .then(b.dexterity.cmp(&a.dexterity))
        });
        Self {
            order: combatants,
            turn_index: 0,
            round: 1,
            moved: HashSet::new(),
            acted: HashSet::new(),
        }
    }

    pub fn current(&self) -> Option<&Combatant> {
        self.order.get(self.turn_index)
    }

    pub fn is_current(&self, id: EntityId, kind: EntityKind) -> bool {
        self.current().is_some_and(|c| c.id == id && c.kind == kind)
    }

    pub fn contains(&self, id: EntityId, kind: EntityKind) -> bool {
        self.order.iter().any(|c| c.id == id && c.kind == kind)
    }

    pub fn can_move(&self, id: EntityId, kind: EntityKind) -> bool {
        !self.moved.contains(&(id, kind))
    }

    pub fn can_act(&self, id: EntityId, kind: EntityKind) -> bool {
        !self.acted.contains(&(id, kind))
    }

    pub fn mark_moved(&mut self, id: EntityId, kind: EntityKind) {
        self.moved.insert((id, kind));
    }

    pub fn mark_acted(&mut self, id: EntityId, kind: EntityKind) {
        self.acted.insert((id, kind));
    }

    /// Advance to the next slot. Returns true when the order wrapped
    /// around and a new round began, which also clears the per-round
    /// move and action flags.
    pub fn advance(&mut self) -> bool {
        if self.order.is_empty() {
            return false;
        }
        self.turn_index += 1;
        if self.turn_index >= self.order.len() {
            self.turn_index = 0;
            self.round += 1;
            self.moved.clear();
            self.acted.clear();
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn combatant(name: &str, initiative: i32, dexterity: i32) -> Combatant {
        Combatant {
            id: EntityId::new(),
            kind: EntityKind::Character,
            name: name.to_string(),
            initiative,
            dexterity,
        }
    }

    #[test]
    fn test_order_sorts_by_initiative_then_dexterity() {
        let session = CombatSession::new(vec![
            combatant("Slow", 5, 10),
            combatant("Fast", 18, 12),
            combatant("Tied Low Dex", 12, 9),
            combatant("Tied High Dex", 12, 15),
        ]);
        let names: Vec<_> = session.order.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Fast", "Tied High Dex", "Tied Low Dex", "Slow"]);
        assert_eq!(session.round, 1);
        assert_eq!(session.current().unwrap().name, "Fast");
    }

    #[test]
    fn test_advance_wraps_and_starts_new_round() {
        let mut session = CombatSession::new(vec![
            combatant("A", 15, 10),
            combatant("B", 10, 10),
        ]);
        assert!(!session.advance());
        assert_eq!(session.current().unwrap().name, "B");
        assert!(session.advance());
        assert_eq!(session.round, 2);
        assert_eq!(session.current().unwrap().name, "A");
    }

    #[test]
    fn test_round_rollover_clears_flags() {
        let mut session = CombatSession::new(vec![
            combatant("A", 15, 10),
            combatant("B", 10, 10),
        ]);
        let a = (session.order[0].id, session.order[0].kind);
        session.mark_moved(a.0, a.1);
        session.mark_acted(a.0, a.1);
        assert!(!session.can_move(a.0, a.1));
        assert!(!session.can_act(a.0, a.1));

        session.advance();
        assert!(!session.can_move(a.0, a.1));

        session.advance();
        assert!(session.can_move(a.0, a.1));
        assert!(session.can_act(a.0, a.1));
    }

    #[test]
    fn test_advance_on_empty_order_is_inert() {
        let mut session = CombatSession::new(Vec::new());
        assert!(!session.advance());
        assert!(session.current().is_none());
    }
}
