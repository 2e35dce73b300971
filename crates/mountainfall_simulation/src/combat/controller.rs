//! CombatController — боевая state machine комбатанта
//!
//! # Architecture
//!
//! ```text
//!            light/heavy                 recovery%            anim end
//! Idle ─────────────────► Attacking ───────────────► Recovering ─────► Idle
//!  ▲ │                        │  (combo window open, buffered input)   │
//!  │ │ start_guard            │ dodge (progress ≥ cancel window)      combo close
//!  │ ▼                        ▼                                        ▼
//!  │ Parrying ──hit──► ParrySuccess ──riposte──► Riposting ──end──► Idle
//!  │   │ window close
//!  │   ▼
//!  │ Blocking ──drain fails──► GuardBroken ──recovery──► Idle
//!  │
//!  └── Staggered / Dodging / DropAttacking ──timer──► Idle
//! ```
//!
//! Всё ожидание — через `Timers<CombatTimer>`; forced exit (стаггер, смерть,
//! dodge) очищает таймеры, гасит трейс и сбрасывает флаги одним вызовом.
//!
//! Контроллер не знает свой Entity: внешние эффекты (parry, strike, смена
//! состояния) копятся в outbox и сливаются системой после мутации.

use bevy::prelude::*;

use crate::combat::animation::AnimationDriver;
use crate::combat::config::CombatConfig;
use crate::combat::melee_trace::{MeleeTracer, SocketLocator, TraceOverride};
use crate::combat::timers::Timers;
use crate::combat::weapon_stats::{AttackAnimation, Loadout, WeaponStats};
use crate::components::{Damageable, ResourcePool};
use crate::logger;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Reflect)]
pub enum CombatState {
    #[default]
    Idle,
    Attacking,
    Blocking,
    Parrying,
    ParrySuccess,
    Riposting,
    DropAttacking,
    Staggered,
    GuardBroken,
    Dodging,
    Recovering,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Reflect)]
pub enum BufferedInputKind {
    LightAttack,
    HeavyAttack,
    Dodge,
    Parry,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferedInput {
    pub kind: BufferedInputKind,
    pub timestamp: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackKind {
    Light,
    Heavy,
    Drop,
    Riposte,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombatTimer {
    AttackRecovery,
    AttackEnd,
    ComboWindowClose,
    TraceArm,
    TraceDisarm,
    ParryWindowClose,
    RiposteWindowClose,
    RiposteEnd,
    GuardBreakRecovery,
    StaggerEnd,
    IFramesStart,
    IFramesEnd,
    DodgeEnd,
}

/// Внешние эффекты контроллера (сливаются после мутации)
#[derive(Debug, Clone, PartialEq)]
pub enum CombatEvent {
    StateChanged { old: CombatState, new: CombatState },
    ParrySucceeded { attacker: Entity },
    RiposteAvailable(bool),
    GuardBroken { attacker: Entity },
    /// Удар в обход ModifyIncomingDamage цели (рипост)
    Strike { target: Entity, damage: f32 },
}

/// Результат обработки входящего урона защитой цели
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DamageModifierResult {
    pub modified_damage: f32,
    pub was_blocked: bool,
    pub was_parried: bool,
    pub stamina_drain: f32,
    pub caused_guard_break: bool,
    /// Попадание пришлось на i-frames
    pub was_evaded: bool,
}

impl DamageModifierResult {
    pub fn unchanged(incoming: f32) -> Self {
        Self {
            modified_damage: incoming,
            ..Default::default()
        }
    }
}

/// Capability "у цели есть активная защита"
pub trait CombatModifier {
    fn modify_incoming_damage(
        &mut self,
        incoming: f32,
        causer: Entity,
        ctx: &mut CombatCtx,
    ) -> DamageModifierResult;

    /// Реакция на попадание, которое уже применено к здоровью.
    /// Returns true если цель ушла в стаггер.
    fn on_hit_landed(
        &mut self,
        applied: f32,
        poise_damage: f32,
        result: &DamageModifierResult,
        ctx: &mut CombatCtx,
    ) -> bool;
}

/// Коллабораторы одного вызова контроллера (всё принадлежит тому же entity)
pub struct CombatCtx<'a> {
    pub config: &'a CombatConfig,
    pub loadout: Option<&'a Loadout>,
    pub pool: Option<&'a mut ResourcePool>,
    pub tracer: Option<&'a mut MeleeTracer>,
    pub animator: &'a mut dyn AnimationDriver,
    pub sockets: Option<&'a dyn SocketLocator>,
}

impl<'a> CombatCtx<'a> {
    pub fn new(config: &'a CombatConfig, animator: &'a mut dyn AnimationDriver) -> Self {
        Self {
            config,
            loadout: None,
            pool: None,
            tracer: None,
            animator,
            sockets: None,
        }
    }

    /// Атакующий moveset (unarmed если оружия нет)
    pub fn moveset(&self) -> &'a WeaponStats {
        let config: &'a CombatConfig = self.config;
        self.loadout
            .and_then(Loadout::active_primary)
            .unwrap_or(&config.unarmed)
    }

    /// Предмет для блока/парирования
    pub fn defensive_item(&self) -> &'a WeaponStats {
        let config: &'a CombatConfig = self.config;
        self.loadout
            .and_then(Loadout::defensive_item)
            .unwrap_or(&config.unarmed)
    }

    /// Урон текущего оружия с учётом base damage трейса
    pub fn weapon_damage(&self) -> f32 {
        let physical = self.moveset().physical_damage;
        match self.tracer.as_deref() {
            Some(tracer) => tracer.config().damage_for(Some(physical)),
            None => physical,
        }
    }

    /// Без пула stamina не ограничивает
    pub fn has_stamina(&self, amount: f32) -> bool {
        self.pool.as_deref().is_none_or(|pool| pool.has_stamina(amount))
    }

    pub fn use_stamina(&mut self, amount: f32) -> bool {
        self.pool.as_deref_mut().is_none_or(|pool| pool.use_stamina(amount))
    }

    pub fn owner_is_dead(&self) -> bool {
        self.pool.as_deref().is_some_and(|pool| pool.is_dead())
    }
}

#[derive(Debug, Clone, PartialEq)]
struct ActiveAttack {
    kind: AttackKind,
    started_at: f64,
    duration: f32,
    chain_len: usize,
    damage_multiplier: f32,
}

#[derive(Component, Debug, Clone)]
pub struct CombatController {
    state: CombatState,
    light_combo_index: usize,
    heavy_combo_index: usize,
    combo_window_open: bool,
    buffered: Option<BufferedInput>,

    parry_window_open: bool,
    can_riposte: bool,
    parried_target: Option<Entity>,
    guard_held: bool,
    invulnerable: bool,

    attack: Option<ActiveAttack>,
    attack_progress: f32,
    trace_armed: bool,
    current_montage: Option<String>,

    airborne: bool,
    peak_height: f32,
    current_height: f32,
    drop_falling: bool,
    drop_multiplier: f32,

    owner_dead: bool,

    timers: Timers<CombatTimer>,
    outbox: Vec<CombatEvent>,
}

impl Default for CombatController {
    fn default() -> Self {
        Self {
            state: CombatState::Idle,
            light_combo_index: 0,
            heavy_combo_index: 0,
            combo_window_open: false,
            buffered: None,
            parry_window_open: false,
            can_riposte: false,
            parried_target: None,
            guard_held: false,
            invulnerable: false,
            attack: None,
            attack_progress: 0.0,
            trace_armed: false,
            current_montage: None,
            airborne: false,
            peak_height: 0.0,
            current_height: 0.0,
            drop_falling: false,
            drop_multiplier: 1.0,
            owner_dead: false,
            timers: Timers::new(),
            outbox: Vec::new(),
        }
    }
}

impl CombatController {
    pub fn new() -> Self {
        Self::default()
    }

    // === Queries ===

    pub fn state(&self) -> CombatState {
        self.state
    }

    pub fn now(&self) -> f64 {
        self.timers.now()
    }

    pub fn light_combo_index(&self) -> usize {
        self.light_combo_index
    }

    pub fn heavy_combo_index(&self) -> usize {
        self.heavy_combo_index
    }

    pub fn is_combo_window_open(&self) -> bool {
        self.combo_window_open
    }

    pub fn buffered_input(&self) -> Option<BufferedInput> {
        self.buffered
    }

    pub fn is_parry_window_open(&self) -> bool {
        self.parry_window_open
    }

    pub fn can_riposte(&self) -> bool {
        self.can_riposte
    }

    pub fn parried_target(&self) -> Option<Entity> {
        self.parried_target
    }

    pub fn attack_progress(&self) -> f32 {
        self.attack_progress
    }

    pub fn is_attacking(&self) -> bool {
        matches!(
            self.state,
            CombatState::Attacking | CombatState::Riposting | CombatState::DropAttacking
        )
    }

    pub fn is_guarding(&self) -> bool {
        matches!(self.state, CombatState::Blocking | CombatState::Parrying)
    }

    pub fn is_guard_held(&self) -> bool {
        self.guard_held
    }

    pub fn is_invulnerable(&self) -> bool {
        self.invulnerable
    }

    pub fn is_airborne(&self) -> bool {
        self.airborne
    }

    pub fn is_drop_falling(&self) -> bool {
        self.drop_falling
    }

    /// Множитель последнего приземления drop attack
    pub fn drop_attack_damage_multiplier(&self) -> f32 {
        self.drop_multiplier
    }

    pub fn fall_distance(&self) -> f32 {
        (self.peak_height - self.current_height).max(0.0)
    }

    pub fn is_owner_dead(&self) -> bool {
        self.owner_dead
    }

    pub fn is_timer_scheduled(&self, timer: CombatTimer) -> bool {
        self.timers.is_scheduled(timer)
    }

    /// Dodge может прервать атаку: не атакуем или атака прошла cancel window
    pub fn can_dodge_cancel(&self, config: &CombatConfig) -> bool {
        self.state != CombatState::Attacking || self.attack_progress >= config.dodge_cancel_window
    }

    pub fn can_accept_buffered_input(&self) -> bool {
        self.combo_window_open || matches!(self.state, CombatState::Idle | CombatState::Blocking)
    }

    pub fn drain_events(&mut self) -> Vec<CombatEvent> {
        std::mem::take(&mut self.outbox)
    }

    pub fn pending_events(&self) -> &[CombatEvent] {
        &self.outbox
    }

    // === Tick ===

    pub fn tick(&mut self, dt: f32, ctx: &mut CombatCtx) {
        self.timers.advance(dt);
        while let Some(timer) = self.timers.pop_due() {
            self.on_timer(timer, ctx);
        }
        self.timers.settle();
        self.update_attack_progress();
    }

    fn update_attack_progress(&mut self) {
        if let Some(attack) = &self.attack {
            if attack.duration > 0.0 {
                self.attack_progress =
                    (self.timers.elapsed_since(attack.started_at) / attack.duration).clamp(0.0, 1.0);
            }
        }
    }

    // === Attacks ===

    pub fn light_attack(&mut self, ctx: &mut CombatCtx) -> bool {
        self.request_attack(AttackKind::Light, ctx)
    }

    pub fn heavy_attack(&mut self, ctx: &mut CombatCtx) -> bool {
        self.request_attack(AttackKind::Heavy, ctx)
    }

    fn request_attack(&mut self, kind: AttackKind, ctx: &mut CombatCtx) -> bool {
        if self.owner_dead {
            return false;
        }
        if matches!(
            self.state,
            CombatState::Staggered
                | CombatState::GuardBroken
                | CombatState::Blocking
                | CombatState::Parrying
                | CombatState::ParrySuccess
        ) {
            return false;
        }

        // В воздухе лёгкая атака = удар в падении
        if kind == AttackKind::Light && self.airborne && self.can_drop_attack(ctx) {
            return self.drop_attack(ctx);
        }

        let can_start = self.state == CombatState::Idle
            || (matches!(self.state, CombatState::Attacking | CombatState::Recovering)
                && self.combo_window_open);

        if !can_start {
            if self.is_buffering_state() {
                let buffered = match kind {
                    AttackKind::Heavy => BufferedInputKind::HeavyAttack,
                    _ => BufferedInputKind::LightAttack,
                };
                self.buffer_input(buffered);
            }
            return false;
        }

        self.start_attack(kind, ctx)
    }

    fn start_attack(&mut self, kind: AttackKind, ctx: &mut CombatCtx) -> bool {
        let moveset = ctx.moveset();
        let (chain, cost, index) = match kind {
            AttackKind::Light => (
                &moveset.light_attacks,
                ctx.config.light_attack_stamina_cost,
                self.light_combo_index,
            ),
            AttackKind::Heavy => (
                &moveset.heavy_attacks,
                ctx.config.heavy_attack_stamina_cost,
                self.heavy_combo_index,
            ),
            AttackKind::Drop | AttackKind::Riposte => return false,
        };

        if chain.is_empty() || !ctx.has_stamina(cost) {
            return false;
        }

        let animation = &chain[index % chain.len()];
        let duration = ctx.animator.play_montage(&animation.montage);
        if duration <= 0.0 {
            logger::log_warning(&format!(
                "⚔️ Combat: montage '{}' has no duration, attack skipped",
                animation.montage
            ));
            return false;
        }
        ctx.use_stamina(cost);

        // Предыдущий замах (если цепочка) закрывается; новый получает свою сессию
        // ComboWindowClose прошлой атаки не должен сбросить цепочку посреди новой
        self.cancel_attack_timers(ctx);
        self.timers.cancel(CombatTimer::ComboWindowClose);
        self.combo_window_open = false;
        match kind {
            AttackKind::Light => self.heavy_combo_index = 0,
            _ => self.light_combo_index = 0,
        }

        self.current_montage = Some(animation.montage.clone());
        self.begin_attack(kind, animation, duration, 1.0, chain.len(), ctx);
        true
    }

    fn begin_attack(
        &mut self,
        kind: AttackKind,
        animation: &AttackAnimation,
        duration: f32,
        extra_multiplier: f32,
        chain_len: usize,
        ctx: &mut CombatCtx,
    ) {
        self.attack = Some(ActiveAttack {
            kind,
            started_at: self.timers.now(),
            duration,
            chain_len,
            damage_multiplier: animation.damage_multiplier * extra_multiplier,
        });
        self.attack_progress = 0.0;

        let state = match kind {
            AttackKind::Drop => CombatState::DropAttacking,
            _ => CombatState::Attacking,
        };
        self.set_state(state);

        let start = animation.active_start.clamp(0.0, 1.0);
        let end = animation.active_end.clamp(start, 1.0);
        self.timers.schedule(CombatTimer::TraceArm, duration * start);
        self.timers.schedule(CombatTimer::TraceDisarm, duration * end);
        self.timers.schedule(
            CombatTimer::AttackRecovery,
            duration * ctx.config.attack_recovery_percent,
        );
        if kind != AttackKind::Drop {
            self.timers.schedule(CombatTimer::AttackEnd, duration);
        }
    }

    pub fn reset_combo(&mut self) {
        self.light_combo_index = 0;
        self.heavy_combo_index = 0;
        self.combo_window_open = false;
        self.timers.cancel(CombatTimer::ComboWindowClose);
    }

    // === Input buffer ===

    /// Состояния, которые сами закончатся и подхватят буфер
    fn is_buffering_state(&self) -> bool {
        matches!(
            self.state,
            CombatState::Attacking
                | CombatState::Riposting
                | CombatState::DropAttacking
                | CombatState::Dodging
        )
    }

    fn buffer_input(&mut self, kind: BufferedInputKind) {
        self.buffered = Some(BufferedInput {
            kind,
            timestamp: self.timers.now(),
        });
    }

    pub fn clear_buffered_input(&mut self) {
        self.buffered = None;
    }

    /// Выполнить буфер, если он свежий и текущее действие принимает ввод
    pub fn process_buffered_input(&mut self, ctx: &mut CombatCtx) -> bool {
        let Some(buffered) = self.buffered else {
            return false;
        };

        if self.timers.elapsed_since(buffered.timestamp) > ctx.config.input_buffer_window {
            logger::log(&format!(
                "⚔️ Combat: buffered {:?} expired ({:.2}s old)",
                buffered.kind,
                self.timers.elapsed_since(buffered.timestamp)
            ));
            self.buffered = None;
            return false;
        }

        if !self.can_accept_buffered_input() {
            return false;
        }

        self.buffered = None;
        match buffered.kind {
            BufferedInputKind::LightAttack => self.request_attack(AttackKind::Light, ctx),
            BufferedInputKind::HeavyAttack => self.request_attack(AttackKind::Heavy, ctx),
            BufferedInputKind::Dodge => self.dodge(ctx),
            BufferedInputKind::Parry => self.attempt_parry(ctx),
        }
    }

    // === Guard / parry ===

    /// Нажатие guard: парирование (tap window), при удержании — блок
    pub fn start_guard(&mut self, ctx: &mut CombatCtx) -> bool {
        if self.owner_dead {
            return false;
        }
        if !matches!(self.state, CombatState::Idle | CombatState::Recovering) {
            return false;
        }

        let item = ctx.defensive_item();
        self.guard_held = true;

        if item.can_parry && self.attempt_parry(ctx) {
            return true;
        }
        if item.can_block {
            self.leave_attack(ctx);
            self.enter_blocking(ctx);
            return true;
        }

        self.guard_held = false;
        false
    }

    pub fn stop_guard(&mut self, ctx: &mut CombatCtx) {
        self.guard_held = false;

        // Parrying доигрывает окно и уйдёт в Idle по таймеру
        if self.state == CombatState::Blocking {
            self.stop_current_montage(ctx, 0.2);
            self.set_state(CombatState::Idle);
            self.process_buffered_input(ctx);
        }
    }

    pub fn attempt_parry(&mut self, ctx: &mut CombatCtx) -> bool {
        if self.owner_dead {
            return false;
        }
        if !matches!(
            self.state,
            CombatState::Idle | CombatState::Recovering | CombatState::Blocking
        ) {
            return false;
        }

        let item = ctx.defensive_item();
        if !item.can_parry {
            return false;
        }

        let cost = ctx.config.parry_stamina_cost;
        if !ctx.has_stamina(cost) {
            return false;
        }
        ctx.use_stamina(cost);

        self.leave_attack(ctx);
        if self.state == CombatState::Blocking {
            self.stop_current_montage(ctx, 0.1);
        }
        if let Some(montage) = &item.parry_montage {
            self.play(ctx, montage);
        }

        self.set_state(CombatState::Parrying);
        self.parry_window_open = true;
        self.timers
            .schedule(CombatTimer::ParryWindowClose, ctx.config.parry_window_duration);
        true
    }

    fn enter_blocking(&mut self, ctx: &mut CombatCtx) {
        let item = ctx.defensive_item();
        if let Some(montage) = &item.block_montage {
            self.play(ctx, montage);
        }
        self.set_state(CombatState::Blocking);
    }

    fn on_parry_successful(&mut self, attacker: Entity, ctx: &mut CombatCtx) {
        self.timers.cancel(CombatTimer::ParryWindowClose);
        self.parry_window_open = false;

        let item = ctx.defensive_item();
        if let Some(montage) = &item.parry_success_montage {
            self.play(ctx, montage);
        }

        self.set_state(CombatState::ParrySuccess);
        self.parried_target = Some(attacker);
        self.can_riposte = true;
        self.outbox.push(CombatEvent::ParrySucceeded { attacker });
        self.outbox.push(CombatEvent::RiposteAvailable(true));
        self.timers
            .schedule(CombatTimer::RiposteWindowClose, ctx.config.riposte_window_duration);
    }

    fn break_guard(&mut self, attacker: Entity, ctx: &mut CombatCtx) {
        self.guard_held = false;
        self.stop_current_montage(ctx, 0.1);

        let item = ctx.defensive_item();
        if let Some(montage) = &item.guard_break_montage {
            self.play(ctx, montage);
        }

        self.set_state(CombatState::GuardBroken);
        self.outbox.push(CombatEvent::GuardBroken { attacker });
        self.timers.schedule(
            CombatTimer::GuardBreakRecovery,
            ctx.config.guard_break_recovery_time,
        );
    }

    // === Riposte ===

    /// Добивание после парирования: урон в обход защиты цели
    pub fn perform_riposte(&mut self, ctx: &mut CombatCtx) -> bool {
        if self.owner_dead || self.state != CombatState::ParrySuccess || !self.can_riposte {
            return false;
        }
        let Some(target) = self.parried_target.take() else {
            return false;
        };

        self.timers.cancel(CombatTimer::RiposteWindowClose);
        self.can_riposte = false;

        let damage = ctx.config.riposte_damage_multiplier * ctx.weapon_damage();
        let duration = match &ctx.moveset().riposte_montage {
            Some(montage) => self.play(ctx, montage),
            None => 0.0,
        };

        self.attack = Some(ActiveAttack {
            kind: AttackKind::Riposte,
            started_at: self.timers.now(),
            duration,
            chain_len: 1,
            damage_multiplier: ctx.config.riposte_damage_multiplier,
        });
        self.set_state(CombatState::Riposting);
        self.outbox.push(CombatEvent::RiposteAvailable(false));
        self.outbox.push(CombatEvent::Strike { target, damage });
        self.timers.schedule(CombatTimer::RiposteEnd, duration);
        true
    }

    // === Dodge ===

    pub fn dodge(&mut self, ctx: &mut CombatCtx) -> bool {
        if self.owner_dead {
            return false;
        }
        match self.state {
            CombatState::Staggered
            | CombatState::GuardBroken
            | CombatState::Dodging
            | CombatState::DropAttacking => return false,
            CombatState::Riposting => {
                self.buffer_input(BufferedInputKind::Dodge);
                return false;
            }
            CombatState::Attacking if !self.can_dodge_cancel(ctx.config) => {
                self.buffer_input(BufferedInputKind::Dodge);
                return false;
            }
            _ => {}
        }

        let cost = ctx.config.dodge_stamina_cost;
        if !ctx.has_stamina(cost) {
            return false;
        }
        ctx.use_stamina(cost);

        self.clear_transient(ctx);
        let config = ctx.config;
        if let Some(montage) = &config.dodge_montage {
            self.play(ctx, montage);
        }

        self.set_state(CombatState::Dodging);
        self.timers.schedule(CombatTimer::IFramesStart, ctx.config.iframe_start);
        self.timers.schedule(CombatTimer::IFramesEnd, ctx.config.iframe_end);
        self.timers.schedule(CombatTimer::DodgeEnd, ctx.config.dodge_duration);
        true
    }

    // === Drop attack ===

    /// Движение: оторвались от земли
    pub fn start_drop_attack_tracking(&mut self, height: f32) {
        self.airborne = true;
        self.peak_height = height;
        self.current_height = height;
    }

    /// Движение: высота на этом тике (пик запоминается)
    pub fn set_height(&mut self, height: f32) {
        self.current_height = height;
        if self.airborne {
            self.peak_height = self.peak_height.max(height);
        }
    }

    /// Движение: приземлились. Падающий drop attack срабатывает здесь.
    pub fn stop_drop_attack_tracking(&mut self, height: f32, ctx: &mut CombatCtx) {
        self.set_height(height);
        if self.drop_falling {
            self.on_drop_attack_land(ctx);
        }
        self.airborne = false;
        self.peak_height = height;
    }

    pub fn can_drop_attack(&self, ctx: &CombatCtx) -> bool {
        !self.owner_dead
            && self.airborne
            && !self.drop_falling
            && matches!(self.state, CombatState::Idle | CombatState::Recovering)
            && self.fall_distance() >= ctx.config.min_drop_attack_height
            && ctx.moveset().drop_attack.is_some()
            && ctx.has_stamina(ctx.config.drop_attack_stamina_cost)
    }

    pub fn drop_attack(&mut self, ctx: &mut CombatCtx) -> bool {
        if !self.can_drop_attack(ctx) {
            return false;
        }
        ctx.use_stamina(ctx.config.drop_attack_stamina_cost);

        self.leave_attack(ctx);
        self.drop_falling = true;
        self.set_state(CombatState::DropAttacking);
        true
    }

    fn on_drop_attack_land(&mut self, ctx: &mut CombatCtx) {
        self.drop_falling = false;
        self.drop_multiplier = ctx.config.drop_attack_damage_multiplier_for(self.fall_distance());

        let Some(animation) = ctx.moveset().drop_attack.as_ref() else {
            self.set_state(CombatState::Idle);
            return;
        };

        let duration = self.play(ctx, &animation.montage);
        if duration <= 0.0 {
            self.set_state(CombatState::Idle);
            return;
        }

        logger::log(&format!(
            "⚔️ Combat: drop attack landed (fall {:.2}m, x{:.2})",
            self.fall_distance(),
            self.drop_multiplier
        ));
        self.begin_attack(AttackKind::Drop, animation, duration, self.drop_multiplier, 1, ctx);
    }

    // === Stagger / forced exit ===

    /// Прерывает всё (атаку, блок, буфер) и уходит в Staggered
    pub fn apply_stagger(&mut self, ctx: &mut CombatCtx) -> bool {
        if self.owner_dead || matches!(self.state, CombatState::Staggered | CombatState::ParrySuccess) {
            return false;
        }

        self.clear_transient(ctx);
        let config = ctx.config;
        if let Some(montage) = &config.stagger_montage {
            self.play(ctx, montage);
        }
        self.set_state(CombatState::Staggered);
        self.timers
            .schedule(CombatTimer::StaggerEnd, ctx.config.stagger_duration);
        true
    }

    /// ForceEndCurrentState: таймеры, трейс и флаги в безопасные значения
    pub fn force_idle(&mut self, ctx: &mut CombatCtx) {
        self.clear_transient(ctx);
        self.set_state(CombatState::Idle);
    }

    pub fn on_owner_died(&mut self, ctx: &mut CombatCtx) {
        self.force_idle(ctx);
        self.owner_dead = true;
    }

    pub fn on_owner_revived(&mut self) {
        self.owner_dead = false;
    }

    fn clear_transient(&mut self, ctx: &mut CombatCtx) {
        self.timers.clear();
        self.disarm_trace(ctx);
        self.stop_current_montage(ctx, 0.1);

        self.attack = None;
        self.attack_progress = 0.0;
        self.light_combo_index = 0;
        self.heavy_combo_index = 0;
        self.combo_window_open = false;
        self.buffered = None;

        self.parry_window_open = false;
        if self.can_riposte {
            self.outbox.push(CombatEvent::RiposteAvailable(false));
        }
        self.can_riposte = false;
        self.parried_target = None;
        self.guard_held = false;
        self.invulnerable = false;
        self.drop_falling = false;
    }

    /// Выход из атакующей ветки в защиту / падение
    fn leave_attack(&mut self, ctx: &mut CombatCtx) {
        self.cancel_attack_timers(ctx);
        self.timers.cancel(CombatTimer::ComboWindowClose);
        self.attack = None;
        self.attack_progress = 0.0;
        self.light_combo_index = 0;
        self.heavy_combo_index = 0;
        self.combo_window_open = false;
    }

    fn cancel_attack_timers(&mut self, ctx: &mut CombatCtx) {
        for timer in [
            CombatTimer::AttackRecovery,
            CombatTimer::AttackEnd,
            CombatTimer::TraceArm,
            CombatTimer::TraceDisarm,
        ] {
            self.timers.cancel(timer);
        }
        self.disarm_trace(ctx);
    }

    // === Trace window ===

    fn arm_trace(&mut self, ctx: &mut CombatCtx) {
        let Some(attack) = &self.attack else {
            return;
        };
        let Some(tracer) = ctx.tracer.as_deref_mut() else {
            return;
        };
        if self.trace_armed {
            return;
        }

        tracer.push_override(&TraceOverride::multiplier(attack.damage_multiplier));
        tracer.start_trace(ctx.sockets);
        self.trace_armed = true;
    }

    fn disarm_trace(&mut self, ctx: &mut CombatCtx) {
        if !self.trace_armed {
            return;
        }
        if let Some(tracer) = ctx.tracer.as_deref_mut() {
            tracer.stop_trace();
            tracer.pop_override();
        }
        self.trace_armed = false;
    }

    // === Timers ===

    fn on_timer(&mut self, timer: CombatTimer, ctx: &mut CombatCtx) {
        match timer {
            CombatTimer::TraceArm => self.arm_trace(ctx),
            CombatTimer::TraceDisarm => self.disarm_trace(ctx),
            CombatTimer::AttackRecovery => self.on_attack_recovery(ctx),
            CombatTimer::AttackEnd => self.on_attack_end(ctx),
            CombatTimer::ComboWindowClose => {
                self.reset_combo();
                if self.state == CombatState::Recovering {
                    self.set_state(CombatState::Idle);
                }
            }
            CombatTimer::ParryWindowClose => {
                self.parry_window_open = false;
                if self.state == CombatState::Parrying {
                    if self.guard_held && ctx.defensive_item().can_block {
                        self.enter_blocking(ctx);
                    } else {
                        self.set_state(CombatState::Idle);
                    }
                }
                self.process_buffered_input(ctx);
            }
            CombatTimer::RiposteWindowClose => {
                if self.can_riposte {
                    self.outbox.push(CombatEvent::RiposteAvailable(false));
                }
                self.can_riposte = false;
                self.parried_target = None;
                if self.state == CombatState::ParrySuccess {
                    self.set_state(CombatState::Idle);
                }
            }
            CombatTimer::RiposteEnd => {
                if self.state == CombatState::Riposting {
                    self.attack = None;
                    self.set_state(CombatState::Idle);
                    self.process_buffered_input(ctx);
                }
            }
            CombatTimer::GuardBreakRecovery => {
                if self.state == CombatState::GuardBroken {
                    self.set_state(CombatState::Idle);
                }
            }
            CombatTimer::StaggerEnd => {
                if self.state == CombatState::Staggered {
                    self.set_state(CombatState::Idle);
                }
            }
            CombatTimer::IFramesStart => {
                self.invulnerable = self.state == CombatState::Dodging;
            }
            CombatTimer::IFramesEnd => self.invulnerable = false,
            CombatTimer::DodgeEnd => {
                self.invulnerable = false;
                if self.state == CombatState::Dodging {
                    self.set_state(CombatState::Idle);
                    self.process_buffered_input(ctx);
                }
            }
        }
    }

    fn on_attack_recovery(&mut self, ctx: &mut CombatCtx) {
        let Some((kind, chain_len)) = self.attack.as_ref().map(|a| (a.kind, a.chain_len.max(1)))
        else {
            return;
        };

        match kind {
            AttackKind::Light | AttackKind::Heavy if self.state == CombatState::Attacking => {
                if kind == AttackKind::Light {
                    self.light_combo_index = (self.light_combo_index + 1) % chain_len;
                } else {
                    self.heavy_combo_index = (self.heavy_combo_index + 1) % chain_len;
                }
                self.combo_window_open = true;
                self.set_state(CombatState::Recovering);
                self.process_buffered_input(ctx);
            }
            AttackKind::Drop if self.state == CombatState::DropAttacking => {
                // Трейс может ещё доигрывать окно — его таймеры не трогаем
                self.attack = None;
                self.set_state(CombatState::Idle);
                self.process_buffered_input(ctx);
            }
            _ => {}
        }
    }

    fn on_attack_end(&mut self, ctx: &mut CombatCtx) {
        self.attack = None;
        self.attack_progress = 1.0;

        self.process_buffered_input(ctx);

        // Буфер мог запустить следующую атаку — тогда комбо продолжается
        if self.state == CombatState::Recovering {
            self.set_state(CombatState::Idle);
            self.timers
                .schedule(CombatTimer::ComboWindowClose, ctx.config.combo_window_time);
        }
    }

    // === Helpers ===

    fn play(&mut self, ctx: &mut CombatCtx, montage: &str) -> f32 {
        let duration = ctx.animator.play_montage(montage);
        if duration > 0.0 {
            self.current_montage = Some(montage.to_string());
        }
        duration
    }

    fn stop_current_montage(&mut self, ctx: &mut CombatCtx, blend_out: f32) {
        if let Some(montage) = self.current_montage.take() {
            ctx.animator.stop_montage(Some(&montage), blend_out);
        }
    }

    fn set_state(&mut self, new: CombatState) {
        if new == self.state {
            return;
        }
        let old = self.state;
        self.state = new;
        self.outbox.push(CombatEvent::StateChanged { old, new });
    }
}

impl CombatModifier for CombatController {
    /// Parry → 0 урона и ParrySuccess; Block → reduction + stamina drain,
    /// нехватка stamina = guard break с полным уроном.
    fn modify_incoming_damage(
        &mut self,
        incoming: f32,
        causer: Entity,
        ctx: &mut CombatCtx,
    ) -> DamageModifierResult {
        if self.owner_dead {
            return DamageModifierResult::unchanged(incoming);
        }

        match self.state {
            CombatState::Parrying if self.parry_window_open => {
                self.on_parry_successful(causer, ctx);
                DamageModifierResult {
                    modified_damage: 0.0,
                    was_parried: true,
                    ..Default::default()
                }
            }
            CombatState::Dodging if self.invulnerable => DamageModifierResult {
                modified_damage: 0.0,
                was_evaded: true,
                ..Default::default()
            },
            CombatState::Blocking => {
                let item = ctx.defensive_item();
                let reduced = incoming * (1.0 - ctx.config.block_damage_reduction);
                let drain = incoming * ctx.config.block_stamina_drain_multiplier * item.block_drain_factor();

                if ctx.use_stamina(drain) {
                    return DamageModifierResult {
                        modified_damage: reduced,
                        was_blocked: true,
                        stamina_drain: drain,
                        ..Default::default()
                    };
                }

                self.break_guard(causer, ctx);
                DamageModifierResult {
                    modified_damage: incoming,
                    stamina_drain: drain,
                    caused_guard_break: true,
                    ..Default::default()
                }
            }
            _ => DamageModifierResult::unchanged(incoming),
        }
    }

    fn on_hit_landed(
        &mut self,
        applied: f32,
        poise_damage: f32,
        result: &DamageModifierResult,
        ctx: &mut CombatCtx,
    ) -> bool {
        if applied <= 0.0
            || result.was_blocked
            || result.was_parried
            || result.caused_guard_break
            || result.was_evaded
        {
            return false;
        }
        if poise_damage < ctx.config.min_poise_damage_to_stagger || ctx.owner_is_dead() {
            return false;
        }
        self.apply_stagger(ctx)
    }
}
