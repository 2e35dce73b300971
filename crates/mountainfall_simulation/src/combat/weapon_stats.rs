//! Боевые характеристики оружия + Loadout
//!
//! Architecture Decision:
//! - Один `WeaponStats` на предмет: урон, блок/парри, цепочки атак, сокеты трейса
//! - Оружие напрямую ссылается на свой набор trace-сокетов (`TraceSockets`),
//!   MeleeTracer берёт их при смене Loadout — никакого поиска меша по имени сокета
//! - Без оружия (или убрано в ножны) используется `CombatConfig::unarmed`

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::combat::melee_trace::TraceMode;

/// Тип оружия
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Reflect, Serialize, Deserialize)]
pub enum WeaponType {
    #[default]
    None,
    Sword,
    Greatsword,
    Axe,
    Spear,
    Shield,
    Dagger,
    Staff,
}

/// Одна анимация атаки в цепочке
///
/// `active_start`/`active_end` — доли длительности монтажа, в которые
/// включён melee trace. Окно заканчивается до точки recovery: следующий
/// удар цепочки обрывает монтаж.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttackAnimation {
    pub montage: String,
    pub active_start: f32,
    pub active_end: f32,
    pub damage_multiplier: f32,
}

impl Default for AttackAnimation {
    fn default() -> Self {
        Self {
            montage: String::new(),
            active_start: 0.1,
            active_end: 0.25,
            damage_multiplier: 1.0,
        }
    }
}

impl AttackAnimation {
    pub fn new(montage: impl Into<String>) -> Self {
        Self {
            montage: montage.into(),
            ..Default::default()
        }
    }

    pub fn with_window(mut self, start: f32, end: f32) -> Self {
        self.active_start = start;
        self.active_end = end;
        self
    }

    pub fn with_damage_multiplier(mut self, multiplier: f32) -> Self {
        self.damage_multiplier = multiplier;
        self
    }
}

/// Сокеты трейса, принадлежащие оружию
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceSockets {
    pub mode: TraceMode,
    pub start_socket: String,
    pub end_socket: String,
    pub radius: f32,
}

impl Default for TraceSockets {
    fn default() -> Self {
        Self {
            mode: TraceMode::Linear,
            start_socket: "Base".into(),
            end_socket: "Tip".into(),
            radius: 0.15,
        }
    }
}

/// Боевые характеристики предмета экипировки
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaponStats {
    pub name: String,
    pub weapon_type: WeaponType,

    /// Урон за попадание (0 = использовать base_damage трейса)
    pub physical_damage: f32,
    /// Урон по устойчивости (сравнивается с порогом стаггера)
    pub poise_damage: f32,
    /// 0..100, снижает расход stamina при блоке
    pub block_stability: f32,

    pub can_block: bool,
    pub can_parry: bool,

    pub light_attacks: Vec<AttackAnimation>,
    pub heavy_attacks: Vec<AttackAnimation>,
    pub drop_attack: Option<AttackAnimation>,

    pub riposte_montage: Option<String>,
    pub parry_montage: Option<String>,
    pub parry_success_montage: Option<String>,
    pub block_montage: Option<String>,
    pub guard_break_montage: Option<String>,

    pub trace: TraceSockets,
}

impl Default for WeaponStats {
    fn default() -> Self {
        Self::unarmed()
    }
}

impl WeaponStats {
    /// Кулаки: тело как источник сокетов, парировать можно, блокировать нельзя
    pub fn unarmed() -> Self {
        Self {
            name: "Unarmed".into(),
            weapon_type: WeaponType::None,
            physical_damage: 0.0,
            poise_damage: 5.0,
            block_stability: 0.0,
            can_block: false,
            can_parry: true,
            light_attacks: vec![
                AttackAnimation::new("unarmed_jab"),
                AttackAnimation::new("unarmed_cross"),
            ],
            heavy_attacks: vec![AttackAnimation::new("unarmed_kick").with_window(0.12, 0.25)],
            drop_attack: Some(AttackAnimation::new("unarmed_drop_attack").with_window(0.0, 0.25)),
            riposte_montage: Some("unarmed_riposte".into()),
            parry_montage: Some("unarmed_parry".into()),
            parry_success_montage: Some("unarmed_parry_success".into()),
            block_montage: None,
            guard_break_montage: Some("guard_break".into()),
            trace: TraceSockets {
                mode: TraceMode::Spherical,
                start_socket: "hand_r".into(),
                end_socket: "hand_r".into(),
                radius: 0.12,
            },
        }
    }

    pub fn sword() -> Self {
        Self {
            name: "Longsword".into(),
            weapon_type: WeaponType::Sword,
            physical_damage: 25.0,
            poise_damage: 15.0,
            block_stability: 0.0,
            can_block: true,
            can_parry: true,
            light_attacks: vec![
                AttackAnimation::new("sword_light_1"),
                AttackAnimation::new("sword_light_2"),
                AttackAnimation::new("sword_light_3").with_damage_multiplier(1.2),
            ],
            heavy_attacks: vec![
                AttackAnimation::new("sword_heavy_1")
                    .with_window(0.12, 0.25)
                    .with_damage_multiplier(1.5),
                AttackAnimation::new("sword_heavy_2")
                    .with_window(0.12, 0.25)
                    .with_damage_multiplier(1.7),
            ],
            drop_attack: Some(AttackAnimation::new("sword_plunge").with_window(0.0, 0.25)),
            riposte_montage: Some("sword_riposte".into()),
            parry_montage: Some("sword_parry".into()),
            parry_success_montage: Some("sword_parry_success".into()),
            block_montage: Some("sword_block".into()),
            guard_break_montage: Some("guard_break".into()),
            trace: TraceSockets::default(),
        }
    }

    pub fn greatsword() -> Self {
        Self {
            name: "Greatsword".into(),
            weapon_type: WeaponType::Greatsword,
            physical_damage: 45.0,
            poise_damage: 35.0,
            can_parry: false,
            light_attacks: vec![
                AttackAnimation::new("greatsword_light_1").with_window(0.12, 0.25),
                AttackAnimation::new("greatsword_light_2").with_window(0.12, 0.25),
            ],
            heavy_attacks: vec![AttackAnimation::new("greatsword_heavy_1")
                .with_window(0.15, 0.25)
                .with_damage_multiplier(1.6)],
            drop_attack: Some(AttackAnimation::new("greatsword_plunge").with_window(0.0, 0.25)),
            riposte_montage: Some("greatsword_riposte".into()),
            parry_montage: None,
            parry_success_montage: None,
            block_montage: Some("greatsword_block".into()),
            trace: TraceSockets {
                radius: 0.2,
                ..Default::default()
            },
            ..Self::sword()
        }
    }

    /// Щит (off-hand): блок и парирование, не атакует
    pub fn shield() -> Self {
        Self {
            name: "Kite Shield".into(),
            weapon_type: WeaponType::Shield,
            physical_damage: 0.0,
            poise_damage: 0.0,
            block_stability: 60.0,
            can_block: true,
            can_parry: true,
            light_attacks: Vec::new(),
            heavy_attacks: Vec::new(),
            drop_attack: None,
            riposte_montage: None,
            parry_montage: Some("shield_parry".into()),
            parry_success_montage: Some("shield_parry_success".into()),
            block_montage: Some("shield_block".into()),
            guard_break_montage: Some("guard_break".into()),
            trace: TraceSockets::default(),
        }
    }

    pub fn is_melee(&self) -> bool {
        !self.light_attacks.is_empty() || !self.heavy_attacks.is_empty()
    }

    /// Множитель расхода stamina при блоке от стабильности
    pub fn block_drain_factor(&self) -> f32 {
        1.0 - self.block_stability.clamp(0.0, 100.0) / 100.0
    }
}

/// Экипированные предметы, влияющие на бой
///
/// Инвентарь и меши — вне симуляции; здесь только боевые характеристики.
#[derive(Component, Debug, Clone, Default, PartialEq)]
pub struct Loadout {
    pub primary: Option<WeaponStats>,
    pub off_hand: Option<WeaponStats>,
    /// Оружие убрано в ножны (бой кулаками)
    pub stowed: bool,
}

impl Loadout {
    pub fn with_primary(weapon: WeaponStats) -> Self {
        Self {
            primary: Some(weapon),
            ..Default::default()
        }
    }

    pub fn with_off_hand(mut self, item: WeaponStats) -> Self {
        self.off_hand = Some(item);
        self
    }

    /// Атакующее оружие (None = unarmed)
    pub fn active_primary(&self) -> Option<&WeaponStats> {
        if self.stowed {
            return None;
        }
        self.primary.as_ref()
    }

    /// Предмет для блока/парирования: off-hand приоритетнее основного
    pub fn defensive_item(&self) -> Option<&WeaponStats> {
        if self.stowed {
            return None;
        }
        self.off_hand.as_ref().or(self.primary.as_ref())
    }

    pub fn toggle_stow(&mut self) -> bool {
        self.stowed = !self.stowed;
        self.stowed
    }
}
