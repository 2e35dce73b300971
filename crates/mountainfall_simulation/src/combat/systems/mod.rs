//! Combat systems (FixedUpdate, порядок задаёт CombatPlugin)

pub mod controller;
pub mod damage;
pub mod melee;
pub mod stamina;


// Re-export all systems
pub use controller::*;
pub use damage::*;
pub use melee::*;
pub use stamina::*;
