//! Timed effects on entities.
//!
//! Buffs, debuffs, control conditions, and damage or healing over time.
//! Applying an effect changes the entity immediately where the effect
//! calls for it; expiry reverses that change exactly once. Ticking is
//! two-phase: first every live effect acts and its duration advances,
//! then everything that ran out is removed and reversed.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::world::{Ability, Condition, EntityCore, EntityId};

/// How long an effect lasts and what clock it runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Duration {
    /// Expires after this many of the bearer's turns end.
    Turns(u32),
    /// Expires after this many full combat rounds.
    Rounds(u32),
    /// Expires after this much in-game time.
    Minutes(u64),
    Hours(u64),
    /// Lasts until the caster stops concentrating.
    Concentration,
    Permanent,
}

/// What the effect does while active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    /// Shifts an ability score by `delta` for the duration.
    AbilityModifier { ability: Ability, delta: i32 },
    /// Pins a condition on the bearer for the duration.
    Control { condition: Condition },
    /// Deals `amount` at the end of each of the bearer's turns.
    DamageOverTime { amount: i32 },
    /// Heals `amount` at the end of each of the bearer's turns.
    HealingOverTime { amount: i32 },
}

/// One effect instance attached to an entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveEffect {
    pub id: Uuid,
    /// What created the effect, e.g. a spell registry id.
    pub source: String,
    pub caster: Option<EntityId>,
    pub kind: EffectKind,
    pub duration: Duration,
}

impl ActiveEffect {
    pub fn new(
        source: impl Into<String>,
        caster: Option<EntityId>,
        kind: EffectKind,
        duration: Duration,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: source.into(),
            caster,
            kind,
            duration,
        }
    }
}

/// Which clock just advanced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// The bearer's turn ended.
    TurnEnd,
    /// A full combat round completed.
    RoundEnd,
    /// In-game time passed.
    TimePassed { minutes: u64 },
}

/// What a tick did to one entity.
#[derive(Debug, Default)]
pub struct TickReport {
    pub expired: Vec<ActiveEffect>,
    pub damage_taken: i32,
    pub healing_received: i32,
    pub dropped_to_zero: bool,
}

/// Attach an effect, applying its immediate change.
///
/// Re-applying an effect with the same source and caster refreshes the
/// existing instance's duration instead of stacking a second copy.
pub fn apply_active_effect(core: &mut EntityCore, effect: ActiveEffect) {
    if let Some(existing) = core
        .active_effects
        .iter_mut()
        .find(|e| e.source == effect.source && e.caster == effect.caster && e.kind == effect.kind)
    {
        existing.duration = effect.duration;
        return;
    }

    match effect.kind {
        EffectKind::AbilityModifier { ability, delta } => {
            *core.ability_scores.get_mut(ability) += delta;
        }
        EffectKind::Control { condition } => {
            if !core.conditions.contains(&condition) {
                core.conditions.push(condition);
            }
        }
        EffectKind::DamageOverTime { .. } | EffectKind::HealingOverTime { .. } => {}
    }
    core.active_effects.push(effect);
}

/// Undo the immediate change an effect made when applied.
fn reverse_effect(core: &mut EntityCore, effect: &ActiveEffect) {
    match effect.kind {
        EffectKind::AbilityModifier { ability, delta } => {
            *core.ability_scores.get_mut(ability) -= delta;
        }
        EffectKind::Control { condition } => {
            core.conditions.retain(|c| *c != condition);
        }
        // Damage and healing already dealt stays dealt.
        EffectKind::DamageOverTime { .. } | EffectKind::HealingOverTime { .. } => {}
    }
}

/// Advance every effect on `core` by one tick.
pub fn tick_effects(core: &mut EntityCore, tick: Tick) -> TickReport {
    let mut report = TickReport::default();

    // Phase 1: periodic effects act, durations advance.
    if tick == Tick::TurnEnd {
        for effect in &core.active_effects {
            match effect.kind {
                EffectKind::DamageOverTime { amount } => report.damage_taken += amount,
                EffectKind::HealingOverTime { amount } => report.healing_received += amount,
                _ => {}
            }
        }
    }
    if report.damage_taken > 0 {
        let result = core.hit_points.take_damage(report.damage_taken);
        report.dropped_to_zero = result.dropped_to_zero;
    }
    if report.healing_received > 0 {
        report.healing_received = core.hit_points.heal(report.healing_received);
    }

    for effect in &mut core.active_effects {
        effect.duration = match (effect.duration, tick) {
            (Duration::Turns(n), Tick::TurnEnd) => Duration::Turns(n.saturating_sub(1)),
            (Duration::Rounds(n), Tick::RoundEnd) => Duration::Rounds(n.saturating_sub(1)),
            (Duration::Minutes(n), Tick::TimePassed { minutes }) => {
                Duration::Minutes(n.saturating_sub(minutes))
            }
            (Duration::Hours(n), Tick::TimePassed { minutes }) => {
                let remaining = n * 60;
                Duration::Minutes(remaining.saturating_sub(minutes))
            }
            (other, _) => other,
        };
    }

    // Phase 2: remove and reverse everything that ran out.
    let (expired, live): (Vec<_>, Vec<_>) = core
        .active_effects
        .drain(..)
        .partition(|e| is_expired(e.duration));
    core.active_effects = live;
    for effect in &expired {
        reverse_effect(core, effect);
    }
    report.expired = expired;
    report
}

fn is_expired(duration: Duration) -> bool {
    matches!(
        duration,
        Duration::Turns(0) | Duration::Rounds(0) | Duration::Minutes(0) | Duration::Hours(0)
    )
}

/// Drop and reverse every concentration effect `caster` maintains on
/// `core`. Returns what was removed.
pub fn break_concentration_on(core: &mut EntityCore, caster: EntityId) -> Vec<ActiveEffect> {
    let (broken, live): (Vec<_>, Vec<_>) = core.active_effects.drain(..).partition(|e| {
        e.duration == Duration::Concentration && e.caster == Some(caster)
    });
    core.active_effects = live;
    for effect in &broken {
        reverse_effect(core, effect);
    }
    broken
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Position;

    fn core() -> EntityCore {
        EntityCore::new("Test", Position::new(0, 0), 10)
    }

    #[test]
    fn test_buff_applies_and_reverses() {
        let mut c = core();
        let base = c.ability_scores.wisdom;
        apply_active_effect(
            &mut c,
            ActiveEffect::new(
                "bless",
                None,
                EffectKind::AbilityModifier {
                    ability: Ability::Wisdom,
                    delta: 2,
                },
                Duration::Turns(2),
            ),
        );
        assert_eq!(c.ability_scores.wisdom, base + 2);

        let report = tick_effects(&mut c, Tick::TurnEnd);
        assert!(report.expired.is_empty());
        assert_eq!(c.ability_scores.wisdom, base + 2);

        let report = tick_effects(&mut c, Tick::TurnEnd);
        assert_eq!(report.expired.len(), 1);
        assert_eq!(c.ability_scores.wisdom, base);
        assert!(c.active_effects.is_empty());
    }

    #[test]
    fn test_control_adds_and_removes_condition() {
        let mut c = core();
        apply_active_effect(
            &mut c,
            ActiveEffect::new(
                "ghoul_claws",
                None,
                EffectKind::Control {
                    condition: Condition::Paralyzed,
                },
                Duration::Turns(1),
            ),
        );
        assert!(c.has_condition(Condition::Paralyzed));
        assert!(c.is_incapacitated());

        tick_effects(&mut c, Tick::TurnEnd);
        assert!(!c.has_condition(Condition::Paralyzed));
    }

    #[test]
    fn test_reapply_refreshes_instead_of_stacking() {
        let mut c = core();
        let caster = EntityId::new();
        let base = c.ability_scores.wisdom;
        let buff = |turns| {
            ActiveEffect::new(
                "bless",
                Some(caster),
                EffectKind::AbilityModifier {
                    ability: Ability::Wisdom,
                    delta: 2,
                },
                Duration::Turns(turns),
            )
        };
        apply_active_effect(&mut c, buff(1));
        apply_active_effect(&mut c, buff(3));

        assert_eq!(c.ability_scores.wisdom, base + 2);
        assert_eq!(c.active_effects.len(), 1);
        assert_eq!(c.active_effects[0].duration, Duration::Turns(3));
    }

    #[test]
    fn test_damage_over_time_ticks_on_turn_end() {
        let mut c = core();
        apply_active_effect(
            &mut c,
            ActiveEffect::new(
                "burning",
                None,
                EffectKind::DamageOverTime { amount: 3 },
                Duration::Turns(2),
            ),
        );
        assert_eq!(c.hit_points.current, 10);

        let report = tick_effects(&mut c, Tick::TurnEnd);
        assert_eq!(report.damage_taken, 3);
        assert_eq!(c.hit_points.current, 7);

        // Round ticks do not trigger the periodic damage.
        let report = tick_effects(&mut c, Tick::RoundEnd);
        assert_eq!(report.damage_taken, 0);
        assert_eq!(c.hit_points.current, 7);
    }

    #[test]
    fn test_dot_can_drop_to_zero() {
        let mut c = core();
        c.hit_points.current = 2;
        apply_active_effect(
            &mut c,
            ActiveEffect::new(
                "venom",
                None,
                EffectKind::DamageOverTime { amount: 5 },
                Duration::Permanent,
            ),
        );
        let report = tick_effects(&mut c, Tick::TurnEnd);
        assert!(report.dropped_to_zero);
        assert_eq!(c.hit_points.current, 0);
    }

    #[test]
    fn test_round_duration_ticks_on_round_end() {
        let mut c = core();
        apply_active_effect(
            &mut c,
            ActiveEffect::new(
                "shield_of_faith",
                None,
                EffectKind::AbilityModifier {
                    ability: Ability::Constitution,
                    delta: 1,
                },
                Duration::Rounds(1),
            ),
        );
        tick_effects(&mut c, Tick::TurnEnd);
        assert_eq!(c.active_effects.len(), 1);
        let report = tick_effects(&mut c, Tick::RoundEnd);
        assert_eq!(report.expired.len(), 1);
    }

    #[test]
    fn test_time_passage_expires_minute_effects() {
        let mut c = core();
        apply_active_effect(
            &mut c,
            ActiveEffect::new(
                "mage_armor",
                None,
                EffectKind::AbilityModifier {
                    ability: Ability::Dexterity,
                    delta: 2,
                },
                Duration::Minutes(10),
            ),
        );
        tick_effects(&mut c, Tick::TimePassed { minutes: 5 });
        assert_eq!(c.active_effects[0].duration, Duration::Minutes(5));
        let report = tick_effects(&mut c, Tick::TimePassed { minutes: 60 });
        assert_eq!(report.expired.len(), 1);
    }

    #[test]
    fn test_break_concentration() {
        let mut c = core();
        let caster = EntityId::new();
        let other = EntityId::new();
        apply_active_effect(
            &mut c,
            ActiveEffect::new(
                "hold_person",
                Some(caster),
                EffectKind::Control {
                    condition: Condition::Paralyzed,
                },
                Duration::Concentration,
            ),
        );
        apply_active_effect(
            &mut c,
            ActiveEffect::new(
                "bless",
                Some(other),
                EffectKind::AbilityModifier {
                    ability: Ability::Wisdom,
                    delta: 2,
                },
                Duration::Concentration,
            ),
        );

        let broken = break_concentration_on(&mut c, caster);
        assert_eq!(broken.len(), 1);
        assert!(!c.has_condition(Condition::Paralyzed));
        // The other caster's concentration survives.
        assert_eq!(c.active_effects.len(), 1);
    }

    #[test]
    fn test_permanent_and_concentration_never_tick_out() {
        let mut c = core();
        apply_active_effect(
            &mut c,
            ActiveEffect::new(
                "curse",
                None,
                EffectKind::AbilityModifier {
                    ability: Ability::Strength,
                    delta: -2,
                },
                Duration::Permanent,
            ),
        );
        for _ in 0..10 {
            tick_effects(&mut c, Tick::TurnEnd);
            tick_effects(&mut c, Tick::RoundEnd);
            tick_effects(&mut c, Tick::TimePassed { minutes: 600 });
        }
        assert_eq!(c.active_effects.len(), 1);
    }
}
