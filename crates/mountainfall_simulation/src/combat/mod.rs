//! Combat core (souls-like melee)
//!
//! ECS ответственность:
//! - ResourcePool: health + stamina, смерть/воскрешение
//! - MeleeTracer: sweep сокетов оружия между кадрами → попадания
//! - CombatController: state machine атак, блока, парирования, рипоста, dodge
//!
//! Презентационный слой (вне крейта):
//! - пишет SocketPose / Transform, читает MontageCommand и RagdollRequested
//! - шлёт CombatIntent и AirborneChanged

use bevy::prelude::*;

pub mod animation;
pub mod config;
pub mod controller;
pub mod events;
pub mod melee_trace;
pub mod systems;
pub mod timers;
pub mod weapon_stats;

// Tests (separate files with _tests suffix)
#[cfg(test)]
mod controller_tests;

// Re-export основных типов
pub use animation::{AnimationDriver, MontageCommand, MontageCommandKind, MontageLibrary, MontageRecorder};
pub use config::{CombatConfig, ConfigError};
pub use controller::{
    AttackKind, BufferedInput, BufferedInputKind, CombatController, CombatCtx, CombatModifier,
    CombatState, DamageModifierResult,
};
pub use events::*;
pub use melee_trace::{
    HurtboxWorld, MeleeTracer, MeshSource, OverlapWorld, SocketLocator, TraceConfig, TraceMode,
    TraceOverride,
};
pub use systems::{Dead, DespawnAfter, MeleeHitOutcome, StashedHurtbox};
pub use timers::Timers;
pub use weapon_stats::{AttackAnimation, Loadout, TraceSockets, WeaponStats, WeaponType};

/// Все combat системы (одна цепочка в FixedUpdate)
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct CombatSystems;

/// Combat Plugin
///
/// Регистрирует ресурсы, события и системы в FixedUpdate (60Hz).
///
/// Порядок выполнения:
/// 1. tick_resource_pools — stamina regen
/// 2. sync_tracer_loadout — сокеты трейса из экипировки
/// 3. track_airborne — высота падения / приземление
/// 4. process_combat_intents — CombatIntent → операции контроллера
/// 5. tick_combat_controllers — таймеры (recovery, окна, i-frames)
/// 6. sample_melee_traces — sweep → PendingMeleeHit
/// 7. resolve_melee_hits — защита цели → урон → MeleeHit
/// 8. flush_controller_events — outbox контроллеров (+ рипост)
/// 9. stagger_parried_attackers
/// 10. flush_trace_events
/// 11. flush_pool_events — outbox пулов (смерть пишется здесь)
/// 12. handle_deaths + sync_controller_life
/// 13. despawn_after_timeout
pub struct CombatPlugin;

impl Plugin for CombatPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<CombatConfig>();
        if !app.world().contains_resource::<MontageLibrary>() {
            app.insert_resource(MontageLibrary::standard());
        }

        // Регистрация событий
        app.add_event::<CombatIntent>()
            .add_event::<AirborneChanged>()
            .add_event::<PendingMeleeHit>()
            .add_event::<MeleeHit>()
            .add_event::<GenericDamage>()
            .add_event::<DamageReceived>()
            .add_event::<HealthChanged>()
            .add_event::<EntityDied>()
            .add_event::<Revived>()
            .add_event::<StaminaChanged>()
            .add_event::<CombatStateChanged>()
            .add_event::<ParrySuccess>()
            .add_event::<GuardBroken>()
            .add_event::<RiposteAvailable>()
            .add_event::<TraceStarted>()
            .add_event::<TraceEnded>()
            .add_event::<RagdollRequested>()
            .add_event::<MontageCommand>();

        app.add_systems(
            FixedUpdate,
            (
                // Фаза 1: ресурсы и экипировка
                systems::tick_resource_pools,
                systems::sync_tracer_loadout,

                // Фаза 2: ввод и таймеры контроллеров
                systems::track_airborne,
                systems::process_combat_intents,
                systems::tick_combat_controllers,

                // Фаза 3: попадания
                systems::sample_melee_traces,
                systems::resolve_melee_hits,
                systems::flush_controller_events,
                systems::stagger_parried_attackers,
                systems::flush_trace_events,

                // Фаза 4: смерть
                systems::flush_pool_events,
                (systems::handle_deaths, systems::sync_controller_life),
                systems::despawn_after_timeout,
            )
                .chain() // Последовательное выполнение
                .in_set(CombatSystems),
        );
    }
}
