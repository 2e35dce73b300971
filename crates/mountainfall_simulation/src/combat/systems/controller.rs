//! CombatController systems: input, movement, timers, outbox.

use bevy::prelude::*;

use crate::combat::animation::{MontageCommand, MontageLibrary, MontageRecorder};
use crate::combat::config::CombatConfig;
use crate::combat::controller::{CombatController, CombatCtx, CombatEvent, CombatState};
use crate::combat::events::{
    AirborneChanged, CombatAction, CombatIntent, CombatStateChanged, EntityDied, GenericDamage,
    GuardBroken, MeleeHit, ParrySuccess, Revived, RiposteAvailable,
};
use crate::combat::melee_trace::{MeleeTracer, SocketLocator};
use crate::combat::weapon_stats::Loadout;
use crate::components::{Damageable, ResourcePool, SocketPose};
use crate::logger;

/// Компоненты комбатанта, которые нужны контроллеру
pub type Combatants<'w, 's> = Query<
    'w,
    's,
    (
        Entity,
        &'static mut CombatController,
        Option<&'static mut ResourcePool>,
        Option<&'static mut MeleeTracer>,
        Option<&'static Loadout>,
        Option<&'static SocketPose>,
    ),
>;

/// Коллабораторы одного entity, собранные из его компонентов
#[derive(Default)]
pub struct CombatantParts<'a> {
    pub pool: Option<&'a mut ResourcePool>,
    pub tracer: Option<&'a mut MeleeTracer>,
    pub loadout: Option<&'a Loadout>,
    pub sockets: Option<&'a SocketPose>,
}

/// Вызов контроллера с CombatCtx; команды монтажей уходят в EventWriter
pub fn drive<R>(
    entity: Entity,
    controller: &mut CombatController,
    parts: CombatantParts,
    config: &CombatConfig,
    library: &MontageLibrary,
    montages: &mut EventWriter<MontageCommand>,
    f: impl FnOnce(&mut CombatController, &mut CombatCtx) -> R,
) -> R {
    let mut recorder = MontageRecorder::new(library);
    let result = {
        let mut ctx = CombatCtx {
            config,
            loadout: parts.loadout,
            pool: parts.pool,
            tracer: parts.tracer,
            animator: &mut recorder,
            sockets: parts.sockets.map(|pose| pose as &dyn SocketLocator),
        };
        f(controller, &mut ctx)
    };
    recorder.flush(entity, montages);
    result
}

/// System: CombatIntent → операции контроллера
pub fn process_combat_intents(
    mut intents: EventReader<CombatIntent>,
    mut combatants: Query<(
        &mut CombatController,
        Option<&mut ResourcePool>,
        Option<&mut MeleeTracer>,
        Option<&mut Loadout>,
        Option<&SocketPose>,
    )>,
    config: Res<CombatConfig>,
    library: Res<MontageLibrary>,
    mut montages: EventWriter<MontageCommand>,
) {
    for intent in intents.read() {
        let Ok((mut controller, mut pool, mut tracer, mut loadout, sockets)) =
            combatants.get_mut(intent.entity)
        else {
            logger::log(&format!(
                "⚠️ Combat: {:?} for {:?} ignored (no CombatController)",
                intent.action, intent.entity
            ));
            continue;
        };

        if intent.action == CombatAction::ToggleStow {
            // Оружие меняется только вне действия; сокеты трейса подхватит sync_tracer_loadout
            // Отказ не должен трогать Loadout: DerefMut пометит его changed
            match loadout.as_mut() {
                Some(loadout) if controller.state() == CombatState::Idle => {
                    let stowed = loadout.toggle_stow();
                    logger::log(&format!(
                        "🗡️ Combat: {:?} {} weapon",
                        intent.entity,
                        if stowed { "stowed" } else { "drew" }
                    ));
                }
                _ => logger::log(&format!(
                    "⚔️ Combat: ToggleStow rejected for {:?} (state {:?})",
                    intent.entity,
                    controller.state()
                )),
            }
            continue;
        }

        let parts = CombatantParts {
            pool: pool.as_deref_mut(),
            tracer: tracer.as_deref_mut(),
            loadout: loadout.as_deref(),
            sockets,
        };

        let executed = drive(
            intent.entity,
            &mut controller,
            parts,
            &config,
            &library,
            &mut montages,
            |controller, ctx| match intent.action {
                CombatAction::LightAttack => controller.light_attack(ctx),
                CombatAction::HeavyAttack => controller.heavy_attack(ctx),
                CombatAction::StartGuard => controller.start_guard(ctx),
                CombatAction::StopGuard => {
                    controller.stop_guard(ctx);
                    true
                }
                CombatAction::AttemptParry => controller.attempt_parry(ctx),
                CombatAction::Riposte => controller.perform_riposte(ctx),
                CombatAction::Dodge => controller.dodge(ctx),
                CombatAction::DropAttack => controller.drop_attack(ctx),
                CombatAction::ResetCombo => {
                    controller.reset_combo();
                    true
                }
                CombatAction::ForceIdle => {
                    controller.force_idle(ctx);
                    true
                }
                CombatAction::ToggleStow => false,
            },
        );

        if !executed {
            logger::log(&format!(
                "⚔️ Combat: {:?} not executed for {:?} (state {:?}, buffered {:?})",
                intent.action,
                intent.entity,
                controller.state(),
                controller.buffered_input().map(|input| input.kind)
            ));
        }
    }
}

/// System: высота падения и приземление (drop attack)
///
/// Высота берётся из Transform.translation.y; AirborneChanged пишет movement.
pub fn track_airborne(
    mut changes: EventReader<AirborneChanged>,
    mut combatants: Query<(
        &mut CombatController,
        &Transform,
        Option<&mut ResourcePool>,
        Option<&mut MeleeTracer>,
        Option<&Loadout>,
        Option<&SocketPose>,
    )>,
    config: Res<CombatConfig>,
    library: Res<MontageLibrary>,
    mut montages: EventWriter<MontageCommand>,
) {
    for (mut controller, transform, ..) in combatants.iter_mut() {
        if controller.is_airborne() {
            controller.set_height(transform.translation.y);
        }
    }

    for change in changes.read() {
        let Ok((mut controller, transform, mut pool, mut tracer, loadout, sockets)) =
            combatants.get_mut(change.entity)
        else {
            continue;
        };
        let height = transform.translation.y;

        if change.airborne {
            controller.start_drop_attack_tracking(height);
            continue;
        }

        let parts = CombatantParts {
            pool: pool.as_deref_mut(),
            tracer: tracer.as_deref_mut(),
            loadout,
            sockets,
        };
        drive(
            change.entity,
            &mut controller,
            parts,
            &config,
            &library,
            &mut montages,
            |controller, ctx| controller.stop_drop_attack_tracking(height, ctx),
        );
    }
}

/// System: таймеры контроллеров (recovery, windows, stagger, i-frames)
pub fn tick_combat_controllers(
    mut combatants: Combatants,
    time: Res<Time<Fixed>>,
    config: Res<CombatConfig>,
    library: Res<MontageLibrary>,
    mut montages: EventWriter<MontageCommand>,
) {
    let delta = time.delta_secs();

    for (entity, mut controller, mut pool, mut tracer, loadout, sockets) in combatants.iter_mut() {
        let parts = CombatantParts {
            pool: pool.as_deref_mut(),
            tracer: tracer.as_deref_mut(),
            loadout,
            sockets,
        };
        drive(
            entity,
            &mut controller,
            parts,
            &config,
            &library,
            &mut montages,
            |controller, ctx| controller.tick(delta, ctx),
        );
    }
}

/// System: outbox контроллеров → Bevy events; рипост бьёт в обход защиты цели
#[allow(clippy::too_many_arguments)]
pub fn flush_controller_events(
    mut controllers: Query<(Entity, &mut CombatController)>,
    mut pools: Query<&mut ResourcePool>,
    transforms: Query<&Transform>,
    mut state_changes: EventWriter<CombatStateChanged>,
    mut parries: EventWriter<ParrySuccess>,
    mut guard_breaks: EventWriter<GuardBroken>,
    mut ripostes: EventWriter<RiposteAvailable>,
    mut melee_hits: EventWriter<MeleeHit>,
    mut generic: EventWriter<GenericDamage>,
) {
    let mut pending: Vec<(Entity, Vec<CombatEvent>)> = controllers
        .iter_mut()
        .filter(|(_, controller)| !controller.pending_events().is_empty())
        .map(|(entity, mut controller)| (entity, controller.drain_events()))
        .collect();
    pending.sort_by_key(|(entity, _)| entity.index());

    for (entity, events) in pending {
        for event in events {
            match event {
                CombatEvent::StateChanged { old, new } => {
                    logger::log(&format!("⚔️ Combat: {:?} {:?} → {:?}", entity, old, new));
                    state_changes.write(CombatStateChanged { entity, old, new });
                }
                CombatEvent::ParrySucceeded { attacker } => {
                    logger::log(&format!("🛡️ Combat: {:?} parried {:?}", entity, attacker));
                    parries.write(ParrySuccess {
                        defender: entity,
                        attacker,
                    });
                }
                CombatEvent::GuardBroken { attacker } => {
                    logger::log(&format!("💢 Combat: {:?} guard broken by {:?}", entity, attacker));
                    guard_breaks.write(GuardBroken {
                        defender: entity,
                        attacker,
                    });
                }
                CombatEvent::RiposteAvailable(available) => {
                    ripostes.write(RiposteAvailable { entity, available });
                }
                CombatEvent::Strike { target, damage } => {
                    let applied = match pools.get_mut(target) {
                        Ok(mut pool) => pool.take_damage(damage, Some(entity), Some(entity)),
                        Err(_) => {
                            generic.write(GenericDamage {
                                target,
                                amount: damage,
                                causer: Some(entity),
                            });
                            damage
                        }
                    };
                    let location = transforms
                        .get(target)
                        .map(|transform| transform.translation)
                        .unwrap_or_default();

                    logger::log(&format!(
                        "🗡️ Combat: {:?} riposted {:?} for {:.1}",
                        entity, target, applied
                    ));
                    melee_hits.write(MeleeHit {
                        attacker: entity,
                        target,
                        location,
                        applied,
                        was_blocked: false,
                        was_parried: false,
                        caused_guard_break: false,
                        was_evaded: false,
                    });
                }
            }
        }
    }
}

/// System: спарированный атакующий уходит в стаггер
pub fn stagger_parried_attackers(
    mut parries: EventReader<ParrySuccess>,
    mut combatants: Combatants,
    config: Res<CombatConfig>,
    library: Res<MontageLibrary>,
    mut montages: EventWriter<MontageCommand>,
) {
    if !config.stagger_attacker_on_parry {
        parries.clear();
        return;
    }

    for parry in parries.read() {
        let Ok((entity, mut controller, mut pool, mut tracer, loadout, sockets)) =
            combatants.get_mut(parry.attacker)
        else {
            continue;
        };

        let parts = CombatantParts {
            pool: pool.as_deref_mut(),
            tracer: tracer.as_deref_mut(),
            loadout,
            sockets,
        };
        if drive(
            entity,
            &mut controller,
            parts,
            &config,
            &library,
            &mut montages,
            |controller, ctx| controller.apply_stagger(ctx),
        ) {
            logger::log(&format!("😵 Combat: {:?} staggered by parry", entity));
        }
    }
}

/// System: смерть/воскрешение владельца → контроллер
pub fn sync_controller_life(
    mut deaths: EventReader<EntityDied>,
    mut revivals: EventReader<Revived>,
    mut combatants: Combatants,
    config: Res<CombatConfig>,
    library: Res<MontageLibrary>,
    mut montages: EventWriter<MontageCommand>,
) {
    for death in deaths.read() {
        let Ok((entity, mut controller, mut pool, mut tracer, loadout, sockets)) =
            combatants.get_mut(death.entity)
        else {
            continue;
        };

        let parts = CombatantParts {
            pool: pool.as_deref_mut(),
            tracer: tracer.as_deref_mut(),
            loadout,
            sockets,
        };
        drive(
            entity,
            &mut controller,
            parts,
            &config,
            &library,
            &mut montages,
            |controller, ctx| controller.on_owner_died(ctx),
        );
    }

    for revived in revivals.read() {
        if let Ok((_, mut controller, ..)) = combatants.get_mut(revived.entity) {
            controller.on_owner_revived();
        }
    }
}
