//! ResourcePool — health + stamina одного актора
//!
//! Единственный источник истины для жизни/смерти. Все мутаторы — no-op на
//! невалидных входах (мёртв, amount <= 0), ошибок нет: результат только через
//! return value и события.
//!
//! # Порядок событий
//!
//! Мутация сначала полностью меняет состояние (включая `is_dead`), затем
//! кладёт события в outbox. Outbox сливается системой
//! `flush_pool_events` уже после того как мутирующий вызов вернулся:
//!
//! ```text
//! take_damage → DamageReceived → HealthChanged → Died (если только что умер)
//! ```

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::combat::timers::Timers;

/// Capability "на этого актора можно нанести урон"
pub trait Damageable {
    /// Returns фактически нанесённый урон (0 если no-op)
    fn take_damage(&mut self, amount: f32, causer: Option<Entity>, instigator: Option<Entity>) -> f32;

    fn is_dead(&self) -> bool;
}

/// Стартовые параметры пула (RON / код спавна)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourcePoolConfig {
    pub max_health: f32,
    /// 0 = стартовать с max_health
    pub starting_health: f32,
    pub can_be_damaged: bool,
    /// Здоровье не опускается ниже 1 (тренировочные манекены, скрипты)
    pub invincible: bool,
    /// Плоское снижение урона
    pub defense: f32,
    pub damage_multiplier: f32,

    pub max_stamina: f32,
    /// 0 = стартовать с max_stamina
    pub starting_stamina: f32,
    /// Stamina в секунду
    pub stamina_regen_rate: f32,
    /// Пауза после траты перед восстановлением (секунды)
    pub stamina_regen_delay: f32,
    pub stamina_regen_enabled: bool,

    pub death: DeathConfig,
}

impl Default for ResourcePoolConfig {
    fn default() -> Self {
        Self {
            max_health: 100.0,
            starting_health: 0.0,
            can_be_damaged: true,
            invincible: false,
            defense: 0.0,
            damage_multiplier: 1.0,
            max_stamina: 150.0,
            starting_stamina: 0.0,
            stamina_regen_rate: 20.0,
            stamina_regen_delay: 1.0,
            stamina_regen_enabled: true,
            death: DeathConfig::default(),
        }
    }
}

/// Побочные эффекты смерти (исполняет `handle_deaths`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeathConfig {
    pub ragdoll_on_death: bool,
    pub apply_death_impulse: bool,
    pub death_impulse_strength: f32,
    pub stop_ai_on_death: bool,
    pub disable_collision_on_death: bool,
    /// 0 = не удалять entity
    pub destroy_after_death_delay: f32,
}

impl Default for DeathConfig {
    fn default() -> Self {
        Self {
            ragdoll_on_death: true,
            apply_death_impulse: true,
            death_impulse_strength: 5000.0,
            stop_ai_on_death: true,
            disable_collision_on_death: true,
            destroy_after_death_delay: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolTimer {
    StaminaRegenResume,
}

/// События пула в порядке возникновения
#[derive(Debug, Clone, PartialEq)]
pub enum PoolEvent {
    DamageReceived {
        amount: f32,
        causer: Option<Entity>,
        instigator: Option<Entity>,
    },
    HealthChanged {
        current: f32,
        max: f32,
        delta: f32,
        causer: Option<Entity>,
    },
    Died {
        killer: Option<Entity>,
        instigator: Option<Entity>,
    },
    Revived {
        health: f32,
    },
    StaminaChanged {
        current: f32,
        max: f32,
        delta: f32,
    },
}

/// Health + stamina компонент
#[derive(Component, Debug, Clone)]
pub struct ResourcePool {
    max_health: f32,
    current_health: f32,
    can_be_damaged: bool,
    invincible: bool,
    defense: f32,
    damage_multiplier: f32,
    is_dead: bool,

    max_stamina: f32,
    current_stamina: f32,
    stamina_regen_rate: f32,
    stamina_regen_delay: f32,
    stamina_regen_enabled: bool,
    is_regenerating: bool,

    pub death: DeathConfig,

    timers: Timers<PoolTimer>,
    outbox: Vec<PoolEvent>,
}

impl Default for ResourcePool {
    fn default() -> Self {
        Self::from_config(&ResourcePoolConfig::default())
    }
}

impl ResourcePool {
    pub fn from_config(config: &ResourcePoolConfig) -> Self {
        let max_health = config.max_health.max(1.0);
        let max_stamina = config.max_stamina.max(0.0);

        let current_health = if config.starting_health > 0.0 {
            config.starting_health.min(max_health)
        } else {
            max_health
        };
        let current_stamina = if config.starting_stamina > 0.0 {
            config.starting_stamina.min(max_stamina)
        } else {
            max_stamina
        };

        Self {
            max_health,
            current_health,
            can_be_damaged: config.can_be_damaged,
            invincible: config.invincible,
            defense: config.defense,
            damage_multiplier: config.damage_multiplier,
            is_dead: false,
            max_stamina,
            current_stamina,
            stamina_regen_rate: config.stamina_regen_rate,
            stamina_regen_delay: config.stamina_regen_delay,
            stamina_regen_enabled: config.stamina_regen_enabled,
            is_regenerating: config.stamina_regen_enabled && current_stamina < max_stamina,
            death: config.death.clone(),
            timers: Timers::new(),
            outbox: Vec::new(),
        }
    }

    /// Пул с одинаковым max для health/stamina (тесты, манекены)
    pub fn new(max_health: f32, max_stamina: f32) -> Self {
        Self::from_config(&ResourcePoolConfig {
            max_health,
            max_stamina,
            ..Default::default()
        })
    }

    // === Health ===

    pub fn health(&self) -> f32 {
        self.current_health
    }

    pub fn max_health(&self) -> f32 {
        self.max_health
    }

    pub fn health_percent(&self) -> f32 {
        if self.max_health > 0.0 {
            self.current_health / self.max_health
        } else {
            0.0
        }
    }

    pub fn is_alive(&self) -> bool {
        !self.is_dead
    }

    pub fn defense(&self) -> f32 {
        self.defense
    }

    pub fn set_defense(&mut self, defense: f32) {
        self.defense = defense.max(0.0);
    }

    pub fn damage_multiplier(&self) -> f32 {
        self.damage_multiplier
    }

    pub fn set_damage_multiplier(&mut self, multiplier: f32) {
        self.damage_multiplier = multiplier.max(0.0);
    }

    pub fn can_be_damaged(&self) -> bool {
        self.can_be_damaged
    }

    pub fn set_can_be_damaged(&mut self, value: bool) {
        self.can_be_damaged = value;
    }

    pub fn is_invincible(&self) -> bool {
        self.invincible
    }

    pub fn set_invincible(&mut self, value: bool) {
        self.invincible = value;
    }

    /// Returns применённое лечение
    pub fn heal(&mut self, amount: f32) -> f32 {
        if self.is_dead || amount <= 0.0 {
            return 0.0;
        }

        let previous = self.current_health;
        self.current_health = (previous + amount).min(self.max_health);
        let applied = self.current_health - previous;

        if applied > 0.0 {
            self.push_health_changed(applied, None);
        }
        applied
    }

    pub fn heal_to_full(&mut self) -> f32 {
        let missing = self.max_health - self.current_health;
        self.heal(missing)
    }

    /// Мгновенная смерть в обход defense/multiplier
    pub fn kill(&mut self, killer: Option<Entity>, instigator: Option<Entity>) {
        if self.is_dead {
            return;
        }

        let previous = self.current_health;
        self.current_health = 0.0;
        self.mark_dead();
        self.push_health_changed(-previous, killer);
        self.outbox.push(PoolEvent::Died { killer, instigator });
    }

    /// `health_amount <= 0` = полное здоровье
    pub fn revive(&mut self, health_amount: f32) {
        if !self.is_dead {
            return;
        }

        self.is_dead = false;
        self.current_health = if health_amount > 0.0 {
            health_amount.min(self.max_health)
        } else {
            self.max_health
        };

        if self.current_stamina < self.max_stamina && self.stamina_regen_enabled {
            self.is_regenerating = true;
        }

        self.outbox.push(PoolEvent::Revived {
            health: self.current_health,
        });
        self.push_health_changed(self.current_health, None);
    }

    /// Прямая установка здоровья. Значение <= 0 убивает (killer неизвестен).
    pub fn set_health(&mut self, value: f32) {
        if self.is_dead {
            return;
        }

        let previous = self.current_health;
        self.current_health = value.clamp(0.0, self.max_health);
        let delta = self.current_health - previous;

        if self.current_health <= 0.0 {
            self.mark_dead();
            self.push_health_changed(delta, None);
            self.outbox.push(PoolEvent::Died {
                killer: None,
                instigator: None,
            });
        } else if delta != 0.0 {
            self.push_health_changed(delta, None);
        }
    }

    /// `scale_current` сохраняет процент здоровья
    pub fn set_max_health(&mut self, new_max: f32, scale_current: bool) {
        if new_max <= 0.0 {
            return;
        }

        let previous = self.current_health;
        if scale_current {
            let percent = self.health_percent();
            self.max_health = new_max;
            self.current_health = (new_max * percent).min(new_max);
        } else {
            self.max_health = new_max;
            self.current_health = self.current_health.min(new_max);
        }

        self.push_health_changed(self.current_health - previous, None);
    }

    // === Stamina ===

    pub fn stamina(&self) -> f32 {
        self.current_stamina
    }

    pub fn max_stamina(&self) -> f32 {
        self.max_stamina
    }

    pub fn stamina_percent(&self) -> f32 {
        if self.max_stamina > 0.0 {
            self.current_stamina / self.max_stamina
        } else {
            0.0
        }
    }

    pub fn has_stamina(&self, amount: f32) -> bool {
        self.current_stamina >= amount
    }

    pub fn is_regenerating(&self) -> bool {
        self.is_regenerating
    }

    pub fn is_stamina_regen_enabled(&self) -> bool {
        self.stamina_regen_enabled
    }

    /// Всё или ничего: при нехватке stamina не тратится вовсе.
    ///
    /// Каждая трата отодвигает возобновление regen на `stamina_regen_delay`.
    pub fn use_stamina(&mut self, amount: f32) -> bool {
        if amount <= 0.0 {
            return true;
        }
        if self.current_stamina < amount {
            return false;
        }

        self.current_stamina -= amount;
        self.is_regenerating = false;
        self.timers.cancel(PoolTimer::StaminaRegenResume);

        if self.stamina_regen_enabled {
            if self.stamina_regen_delay > 0.0 {
                self.timers
                    .schedule(PoolTimer::StaminaRegenResume, self.stamina_regen_delay);
            } else {
                self.is_regenerating = true;
            }
        }

        self.push_stamina_changed(-amount);
        true
    }

    /// Returns фактически восстановленное количество
    pub fn restore_stamina(&mut self, amount: f32) -> f32 {
        if amount <= 0.0 {
            return 0.0;
        }

        let applied = amount.min(self.max_stamina - self.current_stamina);
        if applied > 0.0 {
            self.current_stamina += applied;
            self.push_stamina_changed(applied);
        }
        applied
    }

    pub fn restore_stamina_to_full(&mut self) -> f32 {
        let missing = self.max_stamina - self.current_stamina;
        self.restore_stamina(missing)
    }

    pub fn set_stamina(&mut self, value: f32) {
        let previous = self.current_stamina;
        self.current_stamina = value.clamp(0.0, self.max_stamina);

        if self.current_stamina < self.max_stamina
            && !self.timers.is_scheduled(PoolTimer::StaminaRegenResume)
        {
            self.is_regenerating = self.stamina_regen_enabled;
        }

        let delta = self.current_stamina - previous;
        if delta != 0.0 {
            self.push_stamina_changed(delta);
        }
    }

    pub fn set_stamina_regen_enabled(&mut self, enabled: bool) {
        self.stamina_regen_enabled = enabled;

        if !enabled {
            self.is_regenerating = false;
            self.timers.cancel(PoolTimer::StaminaRegenResume);
        } else if self.current_stamina < self.max_stamina
            && !self.timers.is_scheduled(PoolTimer::StaminaRegenResume)
        {
            self.is_regenerating = true;
        }
    }

    /// Оставшаяся пауза до возобновления regen (None если не запланировано)
    pub fn regen_resume_in(&self) -> Option<f32> {
        self.timers.remaining(PoolTimer::StaminaRegenResume)
    }

    // === Tick ===

    /// Таймеры + regen за `dt` секунд
    pub fn tick(&mut self, dt: f32) {
        self.timers.advance(dt);
        while let Some(timer) = self.timers.pop_due() {
            match timer {
                PoolTimer::StaminaRegenResume => {
                    self.is_regenerating = self.stamina_regen_enabled;
                }
            }
        }
        self.timers.settle();

        if !self.is_regenerating || self.is_dead || !self.stamina_regen_enabled {
            return;
        }

        if self.current_stamina >= self.max_stamina {
            self.is_regenerating = false;
            return;
        }

        let previous = self.current_stamina;
        self.current_stamina = (previous + self.stamina_regen_rate * dt).min(self.max_stamina);
        let delta = self.current_stamina - previous;
        if delta > 0.0 {
            self.push_stamina_changed(delta);
        }

        if self.current_stamina >= self.max_stamina {
            self.is_regenerating = false;
        }
    }

    // === Outbox ===

    /// Забрать накопленные события (в порядке возникновения)
    pub fn drain_events(&mut self) -> Vec<PoolEvent> {
        std::mem::take(&mut self.outbox)
    }

    pub fn pending_events(&self) -> &[PoolEvent] {
        &self.outbox
    }

    fn mark_dead(&mut self) {
        self.is_dead = true;
        self.is_regenerating = false;
        self.timers.cancel(PoolTimer::StaminaRegenResume);
    }

    fn push_health_changed(&mut self, delta: f32, causer: Option<Entity>) {
        self.outbox.push(PoolEvent::HealthChanged {
            current: self.current_health,
            max: self.max_health,
            delta,
            causer,
        });
    }

    fn push_stamina_changed(&mut self, delta: f32) {
        self.outbox.push(PoolEvent::StaminaChanged {
            current: self.current_stamina,
            max: self.max_stamina,
            delta,
        });
    }
}

impl Damageable for ResourcePool {
    /// `applied = max(0, amount - defense) * damage_multiplier`
    ///
    /// `is_dead` выставляется ДО событий: обработчик Died видит мёртвого.
    fn take_damage(&mut self, amount: f32, causer: Option<Entity>, instigator: Option<Entity>) -> f32 {
        if self.is_dead || !self.can_be_damaged || amount <= 0.0 {
            return 0.0;
        }

        let applied = (amount - self.defense).max(0.0) * self.damage_multiplier;
        if applied <= 0.0 {
            return 0.0;
        }

        let previous = self.current_health;
        // Invincible: урон "наносится" (feedback), но здоровье не падает до 0
        let floor = if self.invincible { previous.min(1.0) } else { 0.0 };
        self.current_health = (previous - applied).max(floor);

        let just_died = self.current_health <= 0.0;
        if just_died {
            self.mark_dead();
        }

        self.outbox.push(PoolEvent::DamageReceived {
            amount: applied,
            causer,
            instigator,
        });
        self.push_health_changed(self.current_health - previous, causer);
        if just_died {
            self.outbox.push(PoolEvent::Died {
                killer: causer,
                instigator,
            });
        }

        applied
    }

    fn is_dead(&self) -> bool {
        self.is_dead
    }
}
