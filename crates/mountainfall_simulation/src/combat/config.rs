//! CombatConfig — глобальные тайминги и стоимости боя
//!
//! Plain data: загружается из RON (`assets/combat.ron`) или берётся Default.
//! Единственное место в combat core, где есть настоящие ошибки (IO/парсинг/
//! невалидные значения) — игровые операции только возвращают bool.

use std::path::Path;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::combat::weapon_stats::WeaponStats;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read combat config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse combat config: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("invalid combat config field `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    // === Parry / riposte ===
    pub parry_window_duration: f32,
    pub parry_stamina_cost: f32,
    pub riposte_window_duration: f32,
    pub riposte_damage_multiplier: f32,
    /// Атакующий, которого спарировали, уходит в стаггер
    pub stagger_attacker_on_parry: bool,

    // === Block ===
    /// 0.8 = блок снимает 80% урона
    pub block_damage_reduction: f32,
    pub block_stamina_drain_multiplier: f32,
    pub guard_break_recovery_time: f32,

    // === Attacks ===
    pub light_attack_stamina_cost: f32,
    pub heavy_attack_stamina_cost: f32,
    /// Доля анимации, после которой принимается следующий ввод
    pub attack_recovery_percent: f32,
    pub input_buffer_window: f32,
    /// Прогресс атаки, после которого dodge может её прервать
    pub dodge_cancel_window: f32,
    /// Сколько комбо живёт после конца анимации
    pub combo_window_time: f32,

    // === Drop attack ===
    pub drop_attack_stamina_cost: f32,
    pub drop_attack_damage_multiplier: f32,
    pub min_drop_attack_height: f32,
    pub max_drop_attack_height: f32,
    pub max_drop_attack_damage_multiplier: f32,

    // === Stagger ===
    pub stagger_duration: f32,
    pub stagger_montage: Option<String>,
    pub min_poise_damage_to_stagger: f32,

    // === Dodge ===
    pub dodge_stamina_cost: f32,
    pub dodge_duration: f32,
    pub iframe_start: f32,
    pub iframe_end: f32,
    pub dodge_montage: Option<String>,

    /// Fallback moveset без оружия
    pub unarmed: WeaponStats,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            parry_window_duration: 0.2,
            parry_stamina_cost: 10.0,
            riposte_window_duration: 1.5,
            riposte_damage_multiplier: 2.5,
            stagger_attacker_on_parry: true,

            block_damage_reduction: 0.8,
            block_stamina_drain_multiplier: 1.5,
            guard_break_recovery_time: 1.2,

            light_attack_stamina_cost: 15.0,
            heavy_attack_stamina_cost: 30.0,
            attack_recovery_percent: 0.25,
            input_buffer_window: 0.35,
            dodge_cancel_window: 0.5,
            combo_window_time: 1.0,

            drop_attack_stamina_cost: 20.0,
            drop_attack_damage_multiplier: 2.0,
            min_drop_attack_height: 0.0,
            max_drop_attack_height: 8.0,
            max_drop_attack_damage_multiplier: 4.0,

            stagger_duration: 0.6,
            stagger_montage: Some("hit_react".into()),
            min_poise_damage_to_stagger: 0.0,

            dodge_stamina_cost: 20.0,
            dodge_duration: 0.6,
            iframe_start: 0.05,
            iframe_end: 0.35,
            dodge_montage: Some("dodge_roll".into()),

            unarmed: WeaponStats::unarmed(),
        }
    }
}

impl CombatConfig {
    pub fn from_ron_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_ron_str(&source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_negative = [
            ("parry_window_duration", self.parry_window_duration),
            ("parry_stamina_cost", self.parry_stamina_cost),
            ("riposte_window_duration", self.riposte_window_duration),
            ("riposte_damage_multiplier", self.riposte_damage_multiplier),
            ("block_stamina_drain_multiplier", self.block_stamina_drain_multiplier),
            ("guard_break_recovery_time", self.guard_break_recovery_time),
            ("light_attack_stamina_cost", self.light_attack_stamina_cost),
            ("heavy_attack_stamina_cost", self.heavy_attack_stamina_cost),
            ("input_buffer_window", self.input_buffer_window),
            ("combo_window_time", self.combo_window_time),
            ("drop_attack_stamina_cost", self.drop_attack_stamina_cost),
            ("drop_attack_damage_multiplier", self.drop_attack_damage_multiplier),
            ("min_drop_attack_height", self.min_drop_attack_height),
            ("max_drop_attack_damage_multiplier", self.max_drop_attack_damage_multiplier),
            ("stagger_duration", self.stagger_duration),
            ("dodge_stamina_cost", self.dodge_stamina_cost),
            ("dodge_duration", self.dodge_duration),
        ];
        for (field, value) in non_negative {
            if value < 0.0 {
                return Err(invalid(field, format!("must be >= 0, got {value}")));
            }
        }

        let fractions = [
            ("block_damage_reduction", self.block_damage_reduction),
            ("attack_recovery_percent", self.attack_recovery_percent),
            ("dodge_cancel_window", self.dodge_cancel_window),
        ];
        for (field, value) in fractions {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(field, format!("must be within [0, 1], got {value}")));
            }
        }

        if self.max_drop_attack_height <= self.min_drop_attack_height {
            return Err(invalid(
                "max_drop_attack_height",
                format!(
                    "must exceed min_drop_attack_height ({} <= {})",
                    self.max_drop_attack_height, self.min_drop_attack_height
                ),
            ));
        }

        if self.iframe_start > self.iframe_end || self.iframe_end > self.dodge_duration {
            return Err(invalid(
                "iframe_end",
                format!(
                    "i-frames [{}, {}] must fit inside dodge_duration {}",
                    self.iframe_start, self.iframe_end, self.dodge_duration
                ),
            ));
        }

        Ok(())
    }

    /// Множитель урона drop attack по высоте падения
    ///
    /// Линейно от `drop_attack_damage_multiplier` (min высота) до
    /// `max_drop_attack_damage_multiplier` (max высота), дальше не растёт.
    pub fn drop_attack_damage_multiplier_for(&self, fall_distance: f32) -> f32 {
        let range = self.max_drop_attack_height - self.min_drop_attack_height;
        let alpha = if range > 0.0 {
            ((fall_distance - self.min_drop_attack_height) / range).clamp(0.0, 1.0)
        } else {
            1.0
        };
        self.drop_attack_damage_multiplier
            + (self.max_drop_attack_damage_multiplier - self.drop_attack_damage_multiplier) * alpha
    }
}

fn invalid(field: &'static str, reason: String) -> ConfigError {
    ConfigError::Invalid { field, reason }
}
