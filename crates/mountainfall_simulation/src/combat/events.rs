//! Combat events (ECS ↔ input / presentation)
//!
//! Входящие: CombatIntent, AirborneChanged.
//! Исходящие: всё остальное; пишутся системами после мутации компонентов.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::combat::controller::CombatState;

/// Действие, запрошенное input-слоем (игрок, AI, сеть)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Reflect, Serialize, Deserialize)]
pub enum CombatAction {
    LightAttack,
    HeavyAttack,
    StartGuard,
    StopGuard,
    AttemptParry,
    Riposte,
    Dodge,
    DropAttack,
    ResetCombo,
    ForceIdle,
    ToggleStow,
}

#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct CombatIntent {
    pub entity: Entity,
    pub action: CombatAction,
}

/// Movement: entity оторвался от земли / приземлился (высота из Transform)
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct AirborneChanged {
    pub entity: Entity,
    pub airborne: bool,
}

/// Кандидат попадания от MeleeTracer (до защиты цели)
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct PendingMeleeHit {
    pub attacker: Entity,
    pub target: Entity,
    pub location: Vec3,
    pub damage: f32,
    pub poise_damage: f32,
}

/// Итог попадания после block/parry/i-frames и урона
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct MeleeHit {
    pub attacker: Entity,
    pub target: Entity,
    pub location: Vec3,
    pub applied: f32,
    pub was_blocked: bool,
    pub was_parried: bool,
    pub caused_guard_break: bool,
    pub was_evaded: bool,
}

/// Fallback: цель без ResourcePool
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct GenericDamage {
    pub target: Entity,
    pub amount: f32,
    pub causer: Option<Entity>,
}

#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct DamageReceived {
    pub entity: Entity,
    pub amount: f32,
    pub causer: Option<Entity>,
    pub instigator: Option<Entity>,
}

#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct HealthChanged {
    pub entity: Entity,
    pub current: f32,
    pub max: f32,
    pub delta: f32,
    pub causer: Option<Entity>,
}

/// Событие: entity умер (health <= 0)
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct EntityDied {
    pub entity: Entity,
    pub killer: Option<Entity>,
    pub instigator: Option<Entity>,
}

#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct Revived {
    pub entity: Entity,
    pub health: f32,
}

#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct StaminaChanged {
    pub entity: Entity,
    pub current: f32,
    pub max: f32,
    pub delta: f32,
}

#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct CombatStateChanged {
    pub entity: Entity,
    pub old: CombatState,
    pub new: CombatState,
}

#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct ParrySuccess {
    pub defender: Entity,
    pub attacker: Entity,
}

#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct GuardBroken {
    pub defender: Entity,
    pub attacker: Entity,
}

#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct RiposteAvailable {
    pub entity: Entity,
    pub available: bool,
}

#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct TraceStarted {
    pub entity: Entity,
}

#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct TraceEnded {
    pub entity: Entity,
    pub hits: usize,
}

/// Презентационный слой: включить ragdoll и толкнуть тело
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct RagdollRequested {
    pub entity: Entity,
    pub impulse: Vec3,
}
