//! MeleeTracer systems: loadout sync, sampling, session events.

use bevy::prelude::*;

use crate::combat::config::CombatConfig;
use crate::combat::events::{PendingMeleeHit, TraceEnded, TraceStarted};
use crate::combat::melee_trace::{HurtboxWorld, MeleeTracer, TraceEvent};
use crate::combat::weapon_stats::Loadout;
use crate::components::{Hurtbox, SocketPose};
use crate::logger;

/// System: трейс берёт сокеты экипированного оружия.
///
/// Срабатывает при изменении Loadout (в т.ч. stow) и на новых трейсерах без
/// Loadout (unarmed). Во время активной сессии смена откладывается трейсером.
pub fn sync_tracer_loadout(
    config: Res<CombatConfig>,
    mut armed: Query<(Entity, &mut MeleeTracer, Ref<Loadout>)>,
    mut unarmed: Query<&mut MeleeTracer, (Added<MeleeTracer>, Without<Loadout>)>,
) {
    for (entity, mut tracer, loadout) in armed.iter_mut() {
        if !loadout.is_changed() {
            continue;
        }

        let weapon = loadout.active_primary();
        tracer.adopt_weapon(weapon, &config.unarmed);
        logger::log(&format!(
            "🗡️ MeleeTrace: {:?} adopted sockets of {}",
            entity,
            weapon.map_or(config.unarmed.name.as_str(), |w| w.name.as_str())
        ));
    }

    for mut tracer in unarmed.iter_mut() {
        tracer.adopt_weapon(None, &config.unarmed);
    }
}

/// System: один тик всех активных трейсов.
///
/// Hurtbox-мир собирается один раз на тик. Трейсеры обходятся по Entity
/// index, попадания — в хронологическом порядке шагов интерполяции.
pub fn sample_melee_traces(
    config: Res<CombatConfig>,
    mut tracers: Query<(Entity, &mut MeleeTracer, &SocketPose, Option<&Loadout>)>,
    hurtboxes: Query<(Entity, &Transform, &Hurtbox)>,
    mut pending: EventWriter<PendingMeleeHit>,
) {
    let mut active: Vec<_> = tracers
        .iter_mut()
        .filter(|(_, tracer, _, _)| tracer.is_active())
        .collect();
    if active.is_empty() {
        return;
    }
    active.sort_by_key(|(entity, ..)| entity.index());

    let world = HurtboxWorld::new(
        hurtboxes
            .iter()
            .map(|(entity, transform, hurtbox)| (entity, transform.translation, *hurtbox)),
    );

    for (entity, mut tracer, sockets, loadout) in active {
        let weapon = loadout
            .and_then(Loadout::active_primary)
            .unwrap_or(&config.unarmed);

        for hit in tracer.sample(entity, sockets, &world, Some(weapon.physical_damage)) {
            logger::log(&format!(
                "💥 MeleeTrace: {:?} → {:?} at {:.2?} ({:.1} dmg)",
                entity, hit.target, hit.location, hit.damage
            ));
            pending.write(PendingMeleeHit {
                attacker: entity,
                target: hit.target,
                location: hit.location,
                damage: hit.damage,
                poise_damage: weapon.poise_damage,
            });
        }
    }
}

/// System: TraceStarted / TraceEnded из outbox трейсеров
pub fn flush_trace_events(
    mut tracers: Query<(Entity, &mut MeleeTracer)>,
    mut started: EventWriter<TraceStarted>,
    mut ended: EventWriter<TraceEnded>,
) {
    let mut pending: Vec<_> = tracers
        .iter_mut()
        .filter(|(_, tracer)| !tracer.pending_events().is_empty())
        .collect();
    pending.sort_by_key(|(entity, _)| entity.index());

    for (entity, mut tracer) in pending {
        for event in tracer.drain_events() {
            match event {
                TraceEvent::Started => {
                    started.write(TraceStarted { entity });
                }
                TraceEvent::Ended { hits } => {
                    ended.write(TraceEnded { entity, hits });
                }
            }
        }
    }
}
