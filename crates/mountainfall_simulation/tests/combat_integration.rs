//! Combat integration tests
//!
//! Полный FixedUpdate pipeline (CombatPlugin) в headless App:
//! intent → controller → trace → защита цели → урон → события.
//!
//! Атакующий держит клинок статично внутри hurtbox цели: попадание
//! происходит в первый тик активного окна трейса.

use bevy::prelude::*;
use mountainfall_simulation::combat::*;
use mountainfall_simulation::*;

/// Все интересующие события за прогон
#[derive(Resource, Default)]
struct CombatLog {
    hits: Vec<MeleeHit>,
    guard_breaks: Vec<GuardBroken>,
    parries: Vec<ParrySuccess>,
    deaths: Vec<EntityDied>,
    ragdolls: Vec<RagdollRequested>,
}

fn record_combat_events(
    mut log: ResMut<CombatLog>,
    mut hits: EventReader<MeleeHit>,
    mut guard_breaks: EventReader<GuardBroken>,
    mut parries: EventReader<ParrySuccess>,
    mut deaths: EventReader<EntityDied>,
    mut ragdolls: EventReader<RagdollRequested>,
) {
    log.hits.extend(hits.read().copied());
    log.guard_breaks.extend(guard_breaks.read().copied());
    log.parries.extend(parries.read().copied());
    log.deaths.extend(deaths.read().copied());
    log.ragdolls.extend(ragdolls.read().copied());
}

/// Helper: headless App + запись событий после CombatSystems
fn create_combat_app() -> App {
    let mut app = create_headless_app(42);
    app.init_resource::<CombatLog>();
    app.add_systems(FixedUpdate, record_combat_events.after(CombatSystems));

    // Первый update — нулевой delta (старт часов)
    app.update();
    app
}

fn spawn_fighter(app: &mut App, position: Vec3, loadout: Loadout, pool: ResourcePool) -> Entity {
    app.world_mut()
        .spawn((
            Actor::default(),
            pool,
            Transform::from_translation(position),
            Hurtbox::humanoid(),
            CombatController::new(),
            MeleeTracer::default(),
            loadout,
            SocketPose::default(),
        ))
        .id()
}

/// Атакующий в начале координат, клинок насквозь через цель на z = -1.5
fn spawn_attacker(app: &mut App, weapon: WeaponStats) -> Entity {
    let attacker = spawn_fighter(
        app,
        Vec3::ZERO,
        Loadout::with_primary(weapon),
        ResourcePool::new(100.0, 150.0),
    );

    let mut pose = SocketPose::default();
    pose.set_weapon("Base", Vec3::new(0.0, 1.2, -1.0));
    pose.set_weapon("Tip", Vec3::new(0.0, 1.2, -2.0));
    app.world_mut().entity_mut(attacker).insert(pose);
    attacker
}

fn spawn_defender(app: &mut App, weapon: WeaponStats, pool: ResourcePool) -> Entity {
    spawn_fighter(app, Vec3::new(0.0, 0.0, -1.5), Loadout::with_primary(weapon), pool)
}

fn sword_with_damage(damage: f32) -> WeaponStats {
    WeaponStats {
        physical_damage: damage,
        ..WeaponStats::sword()
    }
}

fn send(app: &mut App, entity: Entity, action: CombatAction) {
    app.world_mut().send_event(CombatIntent { entity, action });
}

fn controller(app: &App, entity: Entity) -> &CombatController {
    app.world()
        .get::<CombatController>(entity)
        .expect("entity has CombatController")
}

fn pool(app: &App, entity: Entity) -> &ResourcePool {
    app.world()
        .get::<ResourcePool>(entity)
        .expect("entity has ResourcePool")
}

fn hit_count(app: &App) -> usize {
    app.world().resource::<CombatLog>().hits.len()
}

/// Крутит update пока `done` не true; паникует после `max_ticks`
fn run_until(app: &mut App, max_ticks: usize, done: impl Fn(&App) -> bool) {
    for _ in 0..max_ticks {
        app.update();
        if done(app) {
            return;
        }
    }
    panic!("condition not reached in {} ticks", max_ticks);
}

/// Test: блок снимает 80% урона за stamina, второй удар ломает guard
#[test]
fn test_block_then_guard_break() {
    let mut app = create_combat_app();
    let attacker = spawn_attacker(&mut app, sword_with_damage(50.0));
    let defender = spawn_defender(&mut app, WeaponStats::greatsword(), ResourcePool::new(100.0, 100.0));

    send(&mut app, defender, CombatAction::StartGuard);
    app.update();
    assert_eq!(controller(&app, defender).state(), CombatState::Blocking);

    send(&mut app, attacker, CombatAction::LightAttack);
    run_until(&mut app, 60, |app| hit_count(app) >= 1);

    let first = app.world().resource::<CombatLog>().hits[0];
    assert_eq!(first.target, defender);
    assert!(first.was_blocked);
    assert!((first.applied - 10.0).abs() < 1e-3);
    assert!((pool(&app, defender).health() - 90.0).abs() < 1e-3);
    assert!((pool(&app, defender).stamina() - 25.0).abs() < 1e-3);
    assert_eq!(controller(&app, defender).state(), CombatState::Blocking);

    // Вторая атака цепочки (буфер или окно комбо)
    send(&mut app, attacker, CombatAction::LightAttack);
    run_until(&mut app, 90, |app| hit_count(app) >= 2);

    let log = app.world().resource::<CombatLog>();
    let second = log.hits[1];
    assert!(second.caused_guard_break);
    assert!(!second.was_blocked);
    assert_eq!(second.applied, 50.0);
    assert_eq!(log.guard_breaks.len(), 1);
    assert_eq!(log.guard_breaks[0].defender, defender);
    assert_eq!(log.guard_breaks[0].attacker, attacker);

    assert!((pool(&app, defender).health() - 40.0).abs() < 1e-3);
    assert_eq!(controller(&app, defender).state(), CombatState::GuardBroken);
}

/// Test: парирование → 0 урона, стаггер атакующего, рипост в обход защиты
#[test]
fn test_parry_then_riposte() {
    let mut app = create_combat_app();
    let attacker = spawn_attacker(&mut app, WeaponStats::sword());
    let defender = spawn_defender(&mut app, WeaponStats::sword(), ResourcePool::new(100.0, 150.0));

    // Окно парирования (0.2s) накрывает активное окно трейса (0.09..0.225s)
    send(&mut app, attacker, CombatAction::LightAttack);
    send(&mut app, defender, CombatAction::StartGuard);
    run_until(&mut app, 60, |app| hit_count(app) >= 1);

    let parried = app.world().resource::<CombatLog>().hits[0];
    assert!(parried.was_parried);
    assert_eq!(parried.applied, 0.0);
    assert_eq!(pool(&app, defender).health(), 100.0);
    assert_eq!(app.world().resource::<CombatLog>().parries.len(), 1);

    assert_eq!(controller(&app, attacker).state(), CombatState::Staggered);
    assert!(controller(&app, defender).can_riposte());
    assert_eq!(controller(&app, defender).parried_target(), Some(attacker));

    send(&mut app, defender, CombatAction::Riposte);
    run_until(&mut app, 10, |app| hit_count(app) >= 2);

    // 2.5 × 25 урона меча
    let riposte = app.world().resource::<CombatLog>().hits[1];
    assert_eq!(riposte.attacker, defender);
    assert_eq!(riposte.target, attacker);
    assert!((riposte.applied - 62.5).abs() < 1e-3);
    assert!((pool(&app, attacker).health() - 37.5).abs() < 1e-3);
    assert_eq!(controller(&app, defender).state(), CombatState::Riposting);
    assert!(!controller(&app, defender).can_riposte());
}

/// Test: атака в окне комбо продвигает индекс ровно на 1
#[test]
fn test_combo_chain_advances() {
    let mut app = create_combat_app();
    let attacker = spawn_attacker(&mut app, WeaponStats::sword());

    send(&mut app, attacker, CombatAction::LightAttack);
    run_until(&mut app, 60, |app| {
        controller(app, attacker).state() == CombatState::Recovering
    });
    assert_eq!(controller(&app, attacker).light_combo_index(), 1);
    assert!(controller(&app, attacker).is_combo_window_open());

    send(&mut app, attacker, CombatAction::LightAttack);
    app.update();
    assert_eq!(controller(&app, attacker).state(), CombatState::Attacking);
    assert_eq!(controller(&app, attacker).light_combo_index(), 1);

    run_until(&mut app, 60, |app| {
        controller(app, attacker).state() == CombatState::Recovering
    });
    assert_eq!(controller(&app, attacker).light_combo_index(), 2);
}

/// Test: ввод до recovery буферизуется и исполняется в точке recovery
#[test]
fn test_buffered_attack_executes_at_recovery() {
    let mut app = create_combat_app();
    let attacker = spawn_attacker(&mut app, WeaponStats::sword());

    send(&mut app, attacker, CombatAction::LightAttack);
    app.update();
    for _ in 0..6 {
        app.update();
    }
    assert_eq!(controller(&app, attacker).state(), CombatState::Attacking);

    send(&mut app, attacker, CombatAction::LightAttack);
    app.update();
    assert!(controller(&app, attacker).buffered_input().is_some());

    // Recovery sword_light_1: 0.25 × 0.9s
    run_until(&mut app, 20, |app| controller(app, attacker).buffered_input().is_none());
    assert_eq!(controller(&app, attacker).state(), CombatState::Attacking);
    assert_eq!(controller(&app, attacker).light_combo_index(), 1);
}

/// Test: смерть → Dead, Targetable(false), ragdoll с импульсом от убийцы
#[test]
fn test_lethal_hit_kills_and_ragdolls() {
    let mut app = create_combat_app();
    let attacker = spawn_attacker(&mut app, sword_with_damage(200.0));
    let defender = spawn_defender(&mut app, WeaponStats::sword(), ResourcePool::new(100.0, 150.0));

    send(&mut app, attacker, CombatAction::LightAttack);
    run_until(&mut app, 60, |app| !app.world().resource::<CombatLog>().deaths.is_empty());

    let log = app.world().resource::<CombatLog>();
    assert_eq!(log.deaths[0].entity, defender);
    assert_eq!(log.deaths[0].killer, Some(attacker));
    assert_eq!(log.ragdolls.len(), 1);
    // Цель стоит на -Z от убийцы
    assert!(log.ragdolls[0].impulse.z < 0.0);

    // Commands (Dead, снятие hurtbox) применяются в конце schedule
    app.update();
    let world = app.world();
    assert!(pool(&app, defender).is_dead());
    assert_eq!(pool(&app, defender).health(), 0.0);
    assert!(world.get::<Dead>(defender).is_some());
    assert_eq!(world.get::<Targetable>(defender), Some(&Targetable(false)));
    assert!(world.get::<Hurtbox>(defender).is_none());
    assert!(controller(&app, defender).is_owner_dead());
    assert_eq!(controller(&app, defender).state(), CombatState::Idle);

    send(&mut app, defender, CombatAction::LightAttack);
    app.update();
    assert_eq!(controller(&app, defender).state(), CombatState::Idle);
}

/// Test: 2 спарринг-партнёра дерутся 1000 тиков, инварианты пулов держатся
#[test]
fn test_sparring_duel_keeps_invariants() {
    let mut app = create_combat_app();

    let first = spawn_fighter(
        &mut app,
        Vec3::ZERO,
        Loadout::with_primary(WeaponStats::sword()),
        ResourcePool::new(100.0, 150.0),
    );
    let second = spawn_fighter(
        &mut app,
        Vec3::new(0.0, 0.0, -1.5),
        Loadout::with_primary(WeaponStats::greatsword()),
        ResourcePool::new(100.0, 150.0),
    );
    app.world_mut()
        .entity_mut(first)
        .insert(SparringPartner::against(second));
    app.world_mut()
        .entity_mut(second)
        .insert(SparringPartner::against(first));

    for tick in 0..1000 {
        app.update();

        if tick % 100 == 0 {
            for entity in [first, second] {
                let Some(pool) = app.world().get::<ResourcePool>(entity) else {
                    continue;
                };
                assert!(pool.health() >= 0.0 && pool.health() <= pool.max_health());
                assert!(pool.stamina() >= 0.0 && pool.stamina() <= pool.max_stamina());
                assert_eq!(pool.is_dead(), pool.health() <= 0.0);
            }
        }
    }
}
