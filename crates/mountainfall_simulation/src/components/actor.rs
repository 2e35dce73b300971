//! Базовые компоненты акторов: Actor, Targetable, Hurtbox

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::components::ResourcePool;

/// Актор (игрок, враг, манекен) — базовый компонент для живых существ
///
/// Автоматически добавляет ResourcePool и Targetable через Required Components.
#[derive(Component, Debug, Clone, Default, Reflect)]
#[reflect(Component)]
#[require(ResourcePool, Targetable)]
pub struct Actor {
    /// Stable ID фракции
    pub faction_id: u64,
}

/// Можно ли выбрать актора целью (lock-on, AI perception)
///
/// Смерть выключает флаг.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Reflect)]
#[reflect(Component)]
pub struct Targetable(pub bool);

impl Default for Targetable {
    fn default() -> Self {
        Self(true)
    }
}

/// Категория объекта для фильтра overlap-запросов
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Reflect, Serialize, Deserialize)]
pub enum ObjectType {
    Pawn,
    PhysicsBody,
    WorldDynamic,
    WorldStatic,
}

/// Форма hurtbox (локальная, относительно Transform)
#[derive(Debug, Clone, Copy, PartialEq, Reflect)]
pub enum HurtShape {
    Sphere { radius: f32 },
    /// Вертикальная капсула: отрезок ±half_height по Y + radius
    Capsule { half_height: f32, radius: f32 },
}

/// Поражаемый объем актора
///
/// Overlap считается simple distance check против Transform: физический
/// движок в симуляции не участвует.
#[derive(Component, Debug, Clone, Copy, PartialEq, Reflect)]
#[reflect(Component)]
pub struct Hurtbox {
    pub shape: HurtShape,
    pub object_type: ObjectType,
    /// Смещение центра от Transform.translation
    pub offset: Vec3,
}

impl Default for Hurtbox {
    fn default() -> Self {
        Self::humanoid()
    }
}

impl Hurtbox {
    /// Капсула ~1.8м ростом, центр на высоте пояса
    pub fn humanoid() -> Self {
        Self {
            shape: HurtShape::Capsule {
                half_height: 0.6,
                radius: 0.35,
            },
            object_type: ObjectType::Pawn,
            offset: Vec3::new(0.0, 0.9, 0.0),
        }
    }

    pub fn sphere(radius: f32, object_type: ObjectType) -> Self {
        Self {
            shape: HurtShape::Sphere { radius },
            object_type,
            offset: Vec3::ZERO,
        }
    }

    /// Пересекается ли сфера (center, radius) с hurtbox, стоящим в `origin`
    pub fn overlaps_sphere(&self, origin: Vec3, center: Vec3, radius: f32) -> bool {
        let base = origin + self.offset;
        match self.shape {
            HurtShape::Sphere { radius: own } => base.distance(center) <= own + radius,
            HurtShape::Capsule { half_height, radius: own } => {
                // Ближайшая точка оси капсулы к центру сферы
                let y = (center.y - base.y).clamp(-half_height, half_height);
                let closest = Vec3::new(base.x, base.y + y, base.z);
                closest.distance(center) <= own + radius
            }
        }
    }
}
