//! Headless дуэль MOUNTAINFALL
//!
//! Два спарринг-партнёра дерутся без рендера; тюнинг из assets/combat.ron

use bevy::prelude::*;
use mountainfall_simulation::combat::CombatConfig;
use mountainfall_simulation::{
    create_headless_app, logger, Actor, CombatController, Damageable, Hurtbox, Loadout, MeleeTracer,
    ResourcePool, SocketPose, SparringPartner, WeaponStats,
};

const CONFIG_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/assets/combat.ron");
const MAX_TICKS: usize = 3600;

fn spawn_duelist(app: &mut App, name: &str, position: Vec3, loadout: Loadout) -> Entity {
    app.world_mut()
        .spawn((
            Name::new(name.to_string()),
            Actor::default(),
            Transform::from_translation(position),
            Hurtbox::humanoid(),
            CombatController::new(),
            MeleeTracer::default(),
            loadout,
            SocketPose::default(),
        ))
        .id()
}

fn main() {
    let seed = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(42);
    println!("Starting MOUNTAINFALL headless duel (seed: {})", seed);

    let mut app = create_headless_app(seed);

    match CombatConfig::load(CONFIG_PATH) {
        Ok(config) => {
            app.insert_resource(config);
        }
        Err(error) => logger::log_warning(&format!("⚠️ {error}, using default combat tuning")),
    }

    let knight = spawn_duelist(
        &mut app,
        "Knight",
        Vec3::ZERO,
        Loadout::with_primary(WeaponStats::sword()).with_off_hand(WeaponStats::shield()),
    );
    let brute = spawn_duelist(
        &mut app,
        "Brute",
        Vec3::new(0.0, 0.0, -1.5),
        Loadout::with_primary(WeaponStats::greatsword()),
    );
    app.world_mut()
        .entity_mut(knight)
        .insert(SparringPartner::against(brute));
    app.world_mut()
        .entity_mut(brute)
        .insert(SparringPartner::against(knight));

    for tick in 0..MAX_TICKS {
        app.update();

        let pools: Vec<_> = [knight, brute]
            .into_iter()
            .filter_map(|entity| app.world().get::<ResourcePool>(entity).map(|pool| (entity, pool)))
            .collect();

        if tick % 300 == 0 {
            for (entity, pool) in &pools {
                let state = app
                    .world()
                    .get::<CombatController>(*entity)
                    .map(CombatController::state);
                println!(
                    "Tick {}: {:?} health {:.1}/{:.1}, stamina {:.1}/{:.1}, state {:?}",
                    tick,
                    entity,
                    pool.health(),
                    pool.max_health(),
                    pool.stamina(),
                    pool.max_stamina(),
                    state
                );
            }
        }

        if let Some((loser, _)) = pools.iter().find(|(_, pool)| pool.is_dead()) {
            println!("Tick {}: {:?} is down, duel over", tick, loser);
            break;
        }
    }

    println!("Simulation complete!");
}
