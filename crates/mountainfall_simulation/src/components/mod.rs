//! ECS Components для игровых entity
//!
//! Организация по доменам:
//! - actor: маркеры актора, Targetable, Hurtbox
//! - resource_pool: health + stamina (ResourcePool, Damageable)
//! - sockets: мировые позиции сокетов (SocketPose)

pub mod actor;
pub mod resource_pool;
pub mod sockets;

// Re-exports для удобного импорта
pub use actor::*;
pub use resource_pool::*;
pub use sockets::*;
