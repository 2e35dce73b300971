//! Hit resolution, pool notifications and death systems.

use bevy::prelude::*;

use crate::combat::animation::{MontageCommand, MontageLibrary, MontageRecorder};
use crate::combat::config::CombatConfig;
use crate::combat::controller::{CombatController, CombatCtx, CombatModifier, DamageModifierResult};
use crate::combat::events::{
    DamageReceived, EntityDied, GenericDamage, HealthChanged, MeleeHit, PendingMeleeHit,
    RagdollRequested, Revived, StaminaChanged,
};
use crate::combat::melee_trace::{MeleeTracer, SocketLocator};
use crate::combat::weapon_stats::Loadout;
use crate::components::{Damageable, Hurtbox, PoolEvent, ResourcePool, SocketPose, Targetable};
use crate::logger;
use crate::sparring::SparringPartner;

/// Компонент-маркер: entity мертв (Health <= 0)
///
/// Снимается при revive.
#[derive(Component, Debug)]
pub struct Dead;

/// Компонент-маркер: деспавн entity после указанного времени
///
/// Вешается при смерти, если `DeathConfig::destroy_after_death_delay > 0`.
#[derive(Component, Debug)]
pub struct DespawnAfter {
    /// Время деспавна (в секундах fixed-времени)
    pub despawn_time: f32,
}

/// Hurtbox, снятый при смерти (вернётся при revive)
#[derive(Component, Debug, Clone, Copy)]
pub struct StashedHurtbox(pub Hurtbox);

/// Итог одного PendingMeleeHit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeleeHitOutcome {
    pub result: DamageModifierResult,
    pub applied: f32,
    /// Цель без Damageable: урон уходит в GenericDamage
    pub fallback_damage: Option<f32>,
    pub staggered: bool,
}

/// Защита цели → урон → реакция на попадание
///
/// `ctx` принадлежит цели (её пул, её лоадаут). Parry и i-frames
/// останавливают попадание до урона.
pub fn resolve_melee_hit(
    hit: &PendingMeleeHit,
    mut modifier: Option<&mut dyn CombatModifier>,
    ctx: &mut CombatCtx,
) -> MeleeHitOutcome {
    let result = match modifier.as_deref_mut() {
        Some(modifier) => modifier.modify_incoming_damage(hit.damage, hit.attacker, ctx),
        None => DamageModifierResult::unchanged(hit.damage),
    };

    let mut outcome = MeleeHitOutcome {
        result,
        applied: 0.0,
        fallback_damage: None,
        staggered: false,
    };
    if result.was_parried || result.was_evaded {
        return outcome;
    }

    match ctx.pool.as_deref_mut() {
        Some(pool) => {
            outcome.applied =
                pool.take_damage(result.modified_damage, Some(hit.attacker), Some(hit.attacker));
        }
        None => {
            outcome.applied = result.modified_damage;
            outcome.fallback_damage = Some(result.modified_damage);
        }
    }

    if let Some(modifier) = modifier {
        outcome.staggered = modifier.on_hit_landed(outcome.applied, hit.poise_damage, &result, ctx);
    }
    outcome
}

/// System: PendingMeleeHit → MeleeHit (+ GenericDamage fallback)
#[allow(clippy::too_many_arguments)]
pub fn resolve_melee_hits(
    mut pending: EventReader<PendingMeleeHit>,
    mut targets: Query<(
        Option<&mut CombatController>,
        Option<&mut ResourcePool>,
        Option<&mut MeleeTracer>,
        Option<&Loadout>,
        Option<&SocketPose>,
    )>,
    config: Res<CombatConfig>,
    library: Res<MontageLibrary>,
    mut montages: EventWriter<MontageCommand>,
    mut hits: EventWriter<MeleeHit>,
    mut generic: EventWriter<GenericDamage>,
) {
    for hit in pending.read() {
        let Ok((mut controller, mut pool, mut tracer, loadout, sockets)) = targets.get_mut(hit.target)
        else {
            logger::log(&format!("⚠️ Combat: hit on despawned {:?} dropped", hit.target));
            continue;
        };

        let mut recorder = MontageRecorder::new(&library);
        let outcome = {
            let mut ctx = CombatCtx {
                config: &config,
                loadout,
                pool: pool.as_deref_mut(),
                tracer: tracer.as_deref_mut(),
                animator: &mut recorder,
                sockets: sockets.map(|pose| pose as &dyn SocketLocator),
            };
            let modifier = controller
                .as_deref_mut()
                .map(|controller| controller as &mut dyn CombatModifier);
            resolve_melee_hit(hit, modifier, &mut ctx)
        };
        recorder.flush(hit.target, &mut montages);

        if let Some(amount) = outcome.fallback_damage.filter(|amount| *amount > 0.0) {
            generic.write(GenericDamage {
                target: hit.target,
                amount,
                causer: Some(hit.attacker),
            });
        }

        let result = outcome.result;
        logger::log(&format!(
            "⚔️ Combat: {:?} hit {:?}: {:.1} → {:.1} (blocked: {}, parried: {}, guard break: {}, evaded: {}, stagger: {})",
            hit.attacker,
            hit.target,
            hit.damage,
            outcome.applied,
            result.was_blocked,
            result.was_parried,
            result.caused_guard_break,
            result.was_evaded,
            outcome.staggered
        ));

        hits.write(MeleeHit {
            attacker: hit.attacker,
            target: hit.target,
            location: hit.location,
            applied: outcome.applied,
            was_blocked: result.was_blocked,
            was_parried: result.was_parried,
            caused_guard_break: result.caused_guard_break,
            was_evaded: result.was_evaded,
        });
    }
}

/// System: outbox пулов → Bevy events (порядок внутри пула сохраняется)
pub fn flush_pool_events(
    mut pools: Query<(Entity, &mut ResourcePool)>,
    mut damage_received: EventWriter<DamageReceived>,
    mut health_changed: EventWriter<HealthChanged>,
    mut died: EventWriter<EntityDied>,
    mut revived: EventWriter<Revived>,
    mut stamina_changed: EventWriter<StaminaChanged>,
) {
    let mut pending: Vec<_> = pools
        .iter_mut()
        .filter(|(_, pool)| !pool.pending_events().is_empty())
        .collect();
    pending.sort_by_key(|(entity, _)| entity.index());

    for (entity, mut pool) in pending {
        for event in pool.drain_events() {
            match event {
                PoolEvent::DamageReceived {
                    amount,
                    causer,
                    instigator,
                } => {
                    damage_received.write(DamageReceived {
                        entity,
                        amount,
                        causer,
                        instigator,
                    });
                }
                PoolEvent::HealthChanged {
                    current,
                    max,
                    delta,
                    causer,
                } => {
                    health_changed.write(HealthChanged {
                        entity,
                        current,
                        max,
                        delta,
                        causer,
                    });
                }
                PoolEvent::Died { killer, instigator } => {
                    died.write(EntityDied {
                        entity,
                        killer,
                        instigator,
                    });
                }
                PoolEvent::Revived { health } => {
                    revived.write(Revived { entity, health });
                }
                PoolEvent::StaminaChanged { current, max, delta } => {
                    stamina_changed.write(StaminaChanged {
                        entity,
                        current,
                        max,
                        delta,
                    });
                }
            }
        }
    }
}

/// Импульс смерти: от убийцы к жертве, слегка вверх
pub fn death_impulse(victim: Vec3, killer: Vec3, strength: f32) -> Vec3 {
    let mut direction = victim - killer;
    direction.y = 0.3;
    direction.normalize_or_zero() * strength
}

/// System: побочные эффекты смерти (DeathConfig) и их откат при revive
///
/// Смерть: Dead, Targetable(false), стоп AI, ragdoll + импульс, hurtbox
/// снимается, отложенный деспавн.
pub fn handle_deaths(
    mut commands: Commands,
    mut deaths: EventReader<EntityDied>,
    mut revivals: EventReader<Revived>,
    mut actors: Query<(&ResourcePool, Option<&mut Targetable>, Option<&Hurtbox>, Option<&StashedHurtbox>)>,
    transforms: Query<&Transform>,
    mut ragdolls: EventWriter<RagdollRequested>,
    time: Res<Time>,
) {
    for death in deaths.read() {
        let Ok((pool, targetable, hurtbox, _)) = actors.get_mut(death.entity) else {
            continue;
        };
        let config = pool.death.clone();

        if let Some(mut targetable) = targetable {
            targetable.0 = false;
        }

        if config.ragdoll_on_death {
            let impulse = match (
                config.apply_death_impulse,
                death.killer.and_then(|killer| transforms.get(killer).ok()),
                transforms.get(death.entity).ok(),
            ) {
                (true, Some(killer), Some(victim)) => {
                    death_impulse(victim.translation, killer.translation, config.death_impulse_strength)
                }
                _ => Vec3::ZERO,
            };
            ragdolls.write(RagdollRequested {
                entity: death.entity,
                impulse,
            });
        }

        let hurtbox = hurtbox.copied();
        let Ok(mut entity_commands) = commands.get_entity(death.entity) else {
            continue;
        };
        entity_commands.insert(Dead);

        if config.stop_ai_on_death {
            entity_commands.remove::<SparringPartner>();
        }
        if config.disable_collision_on_death {
            if let Some(hurtbox) = hurtbox {
                entity_commands.remove::<Hurtbox>().insert(StashedHurtbox(hurtbox));
            }
        }
        if config.destroy_after_death_delay > 0.0 {
            entity_commands.insert(DespawnAfter {
                despawn_time: time.elapsed_secs() + config.destroy_after_death_delay,
            });
        }

        logger::log(&format!(
            "💀 Combat: {:?} died (killer: {:?})",
            death.entity, death.killer
        ));
    }

    for revived in revivals.read() {
        let Ok((_, targetable, _, stashed)) = actors.get_mut(revived.entity) else {
            continue;
        };
        if let Some(mut targetable) = targetable {
            targetable.0 = true;
        }

        let stashed = stashed.copied();
        let Ok(mut entity_commands) = commands.get_entity(revived.entity) else {
            continue;
        };
        entity_commands.remove::<(Dead, DespawnAfter)>();
        if let Some(StashedHurtbox(hurtbox)) = stashed {
            entity_commands.remove::<StashedHurtbox>().insert(hurtbox);
        }

        logger::log(&format!(
            "✨ Combat: {:?} revived with {:.1} health",
            revived.entity, revived.health
        ));
    }
}

/// Система: деспавн entities с истёкшим DespawnAfter timeout
///
/// Удаляет entity если текущее время >= despawn_time.
pub fn despawn_after_timeout(
    mut commands: Commands,
    query: Query<(Entity, &DespawnAfter)>,
    time: Res<Time>,
) {
    let current_time = time.elapsed_secs();

    for (entity, despawn_after) in query.iter() {
        if current_time >= despawn_after.despawn_time {
            logger::log(&format!("⚰️ Despawning entity {:?} (timeout)", entity));
            commands.entity(entity).despawn();
        }
    }
}
