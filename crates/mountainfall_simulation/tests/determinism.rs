//! Тесты детерминизма
//!
//! Спарринг-дуэль с одинаковым seed даёт идентичные пулы и контроллеры

use bevy::prelude::*;
use mountainfall_simulation::*;

const TICK_COUNT: usize = 600;

/// Запускает дуэль и возвращает snapshot мира
fn run_duel(seed: u64, tick_count: usize) -> (Vec<u8>, Vec<u8>) {
    let mut app = create_headless_app(seed);

    let first = app
        .world_mut()
        .spawn((
            Actor::default(),
            Transform::from_xyz(0.0, 0.0, 0.0),
            Hurtbox::humanoid(),
            CombatController::new(),
            MeleeTracer::default(),
            Loadout::with_primary(WeaponStats::sword()),
            SocketPose::default(),
        ))
        .id();
    let second = app
        .world_mut()
        .spawn((
            Actor::default(),
            Transform::from_xyz(0.0, 0.0, -1.5),
            Hurtbox::humanoid(),
            CombatController::new(),
            MeleeTracer::default(),
            Loadout::with_primary(WeaponStats::sword()).with_off_hand(WeaponStats::shield()),
            SocketPose::default(),
            SparringPartner::against(first),
        ))
        .id();
    app.world_mut()
        .entity_mut(first)
        .insert(SparringPartner::against(second));

    for _ in 0..tick_count {
        app.update();
    }

    let world = app.world_mut();
    (
        world_snapshot::<ResourcePool>(world),
        world_snapshot::<CombatController>(world),
    )
}

#[test]
fn test_duel_same_seed_is_identical() {
    const SEED: u64 = 12345;

    let first = run_duel(SEED, TICK_COUNT);
    let second = run_duel(SEED, TICK_COUNT);

    assert!(!first.0.is_empty());
    assert_eq!(
        first, second,
        "Дуэль с одинаковым seed ({}) дала разные результаты!",
        SEED
    );
}

#[test]
fn test_duel_multiple_runs() {
    const SEED: u64 = 42;

    // Запускаем 3 раза — все должны быть идентичны
    let snapshots: Vec<_> = (0..3).map(|_| run_duel(SEED, TICK_COUNT)).collect();

    for (i, snapshot) in snapshots.iter().enumerate().skip(1) {
        assert_eq!(
            snapshots[0], *snapshot,
            "Прогон {} дал результат отличный от прогона 0",
            i
        );
    }
}
