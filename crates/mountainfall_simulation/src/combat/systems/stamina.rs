//! ResourcePool tick (regen delay + stamina regeneration).

use bevy::prelude::*;

use crate::components::ResourcePool;

/// Система: timers + regen всех пулов
///
/// Работает в FixedUpdate для детерминизма.
pub fn tick_resource_pools(mut query: Query<&mut ResourcePool>, time: Res<Time<Fixed>>) {
    let delta = time.delta_secs();

    for mut pool in query.iter_mut() {
        pool.tick(delta);
    }
}
