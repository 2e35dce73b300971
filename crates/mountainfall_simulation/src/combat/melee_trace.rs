//! MeleeTracer — socket-interpolated hit detection
//!
//! # Architecture
//!
//! ```text
//! Idle ──start_trace()──► Active ──stop_trace()──► Idle
//!                           │
//!                           └─ sample() каждый тик:
//!                              previous pose ─lerp(N шагов)─► current pose
//!                              на каждом шаге M+1 точек вдоль отрезка Base→Tip
//!                              overlap_sphere(point, radius) → PendingMeleeHit
//! ```
//!
//! Интерполяция между позами прошлого и текущего тика не даёт быстрому
//! замаху "проскочить" цель: за кадр клинок может сместиться дальше своей
//! длины. Стоимость ограничена `(N + 1) × (M + 1)` запросами за тик.
//!
//! Шаги обходятся от старой позы к новой, поэтому засчитывается первое
//! пересечение; повторно цель в этой сессии не бьётся (если не включён
//! multi-hit).

use std::collections::HashSet;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::combat::weapon_stats::WeaponStats;
use crate::components::{Hurtbox, ObjectType};
use crate::logger;

/// Linear: отрезок между двумя сокетами. Spherical: одна точка + радиус.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Reflect, Serialize, Deserialize)]
pub enum TraceMode {
    #[default]
    Linear,
    Spherical,
}

/// Откуда брать сокеты: меш оружия или тело (удары без оружия)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Reflect, Serialize, Deserialize)]
pub enum MeshSource {
    #[default]
    WeaponMesh,
    CharacterMesh,
}

/// World-позиции сокетов (пишет презентационный слой)
pub trait SocketLocator {
    fn socket_location(&self, source: MeshSource, socket: &str) -> Option<Vec3>;
}

/// Shape-запросы к миру
pub trait OverlapWorld {
    /// Entities, чьи объёмы пересекают сферу, в детерминированном порядке
    fn overlap_sphere(&self, center: Vec3, radius: f32, object_types: &[ObjectType]) -> Vec<Entity>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    pub mode: TraceMode,
    pub mesh_source: MeshSource,
    pub start_socket: String,
    pub end_socket: String,
    pub radius: f32,
    pub base_damage: f32,
    pub damage_multiplier: f32,
    /// Урон оружия (если > 0) вместо base_damage
    pub use_weapon_damage: bool,
    /// Шаги интерполяции между тиками (1..=10)
    pub interpolation_steps: u32,
    /// Точек вдоль отрезка в Linear режиме (+1 на конце)
    pub samples_per_segment: u32,
    pub allow_multiple_hits_per_actor: bool,
    pub object_types: Vec<ObjectType>,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            mode: TraceMode::Linear,
            mesh_source: MeshSource::WeaponMesh,
            start_socket: "Base".into(),
            end_socket: "Tip".into(),
            radius: 0.15,
            base_damage: 20.0,
            damage_multiplier: 1.0,
            use_weapon_damage: true,
            interpolation_steps: 3,
            samples_per_segment: 4,
            allow_multiple_hits_per_actor: false,
            object_types: vec![ObjectType::Pawn, ObjectType::PhysicsBody, ObjectType::WorldDynamic],
        }
    }
}

impl TraceConfig {
    /// `(weapon damage если включено и > 0, иначе base) × multiplier`
    pub fn damage_for(&self, weapon_damage: Option<f32>) -> f32 {
        let base = match weapon_damage {
            Some(damage) if self.use_weapon_damage && damage > 0.0 => damage,
            _ => self.base_damage,
        };
        base * self.damage_multiplier
    }

    fn step_count(&self) -> u32 {
        self.interpolation_steps.clamp(1, 10)
    }

    fn resolve(&self, sockets: &dyn SocketLocator) -> Option<(Vec3, Vec3)> {
        let start = sockets.socket_location(self.mesh_source, &self.start_socket)?;
        let end = match self.mode {
            TraceMode::Linear => sockets.socket_location(self.mesh_source, &self.end_socket)?,
            TraceMode::Spherical => start,
        };
        Some((start, end))
    }

    fn sample_points(&self, start: Vec3, end: Vec3) -> Vec<Vec3> {
        match self.mode {
            TraceMode::Spherical => vec![start],
            TraceMode::Linear => {
                let segments = self.samples_per_segment.max(1);
                (0..=segments)
                    .map(|i| start.lerp(end, i as f32 / segments as f32))
                    .collect()
            }
        }
    }
}

/// Временная замена конфигурации на окно атаки
///
/// `base_damage` выключает урон оружия; `damage_multiplier` умножается на
/// текущий (стек оверрайдов перемножается).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraceOverride {
    pub mode: Option<TraceMode>,
    pub mesh_source: Option<MeshSource>,
    pub sockets: Option<(String, String)>,
    pub radius: Option<f32>,
    pub base_damage: Option<f32>,
    pub damage_multiplier: Option<f32>,
}

impl TraceOverride {
    pub fn multiplier(multiplier: f32) -> Self {
        Self {
            damage_multiplier: Some(multiplier),
            ..Default::default()
        }
    }

    fn apply(&self, config: &mut TraceConfig) {
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(source) = self.mesh_source {
            config.mesh_source = source;
        }
        if let Some((start, end)) = &self.sockets {
            config.start_socket = start.clone();
            config.end_socket = end.clone();
        }
        if let Some(radius) = self.radius {
            config.radius = radius;
        }
        if let Some(base_damage) = self.base_damage {
            config.base_damage = base_damage;
            config.use_weapon_damage = false;
        }
        if let Some(multiplier) = self.damage_multiplier {
            config.damage_multiplier *= multiplier;
        }
    }
}

/// Состояние одной активации StartTrace..StopTrace
#[derive(Debug, Clone, Default)]
pub struct TraceSession {
    pub previous: Option<(Vec3, Vec3)>,
    pub hit_actors: HashSet<Entity>,
}

/// Кандидат на попадание (до block/parry цели)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceHit {
    pub target: Entity,
    pub location: Vec3,
    pub damage: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceEvent {
    Started,
    Ended { hits: usize },
}

#[derive(Component, Debug, Clone, Default)]
pub struct MeleeTracer {
    config: TraceConfig,
    saved: Vec<TraceConfig>,
    deferred_base: Option<TraceConfig>,
    session: Option<TraceSession>,
    ignored: Vec<Entity>,
    outbox: Vec<TraceEvent>,
}

impl MeleeTracer {
    pub fn new(config: TraceConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &TraceConfig {
        &self.config
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&TraceSession> {
        self.session.as_ref()
    }

    pub fn hit_count(&self) -> usize {
        self.session.as_ref().map_or(0, |session| session.hit_actors.len())
    }

    pub fn has_hit(&self, target: Entity) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.hit_actors.contains(&target))
    }

    // === Session ===

    /// No-op (false) если сессия уже активна.
    ///
    /// Сразу снимает позу сокетов, чтобы первый тик окна уже имел геометрию.
    pub fn start_trace(&mut self, sockets: Option<&dyn SocketLocator>) -> bool {
        if self.session.is_some() {
            return false;
        }

        let mut session = TraceSession::default();
        if let Some(sockets) = sockets {
            session.previous = self.config.resolve(sockets);
        }
        self.session = Some(session);
        self.outbox.push(TraceEvent::Started);
        true
    }

    /// No-op (false) если сессии нет
    pub fn stop_trace(&mut self) -> bool {
        let Some(session) = self.session.take() else {
            return false;
        };

        self.outbox.push(TraceEvent::Ended {
            hits: session.hit_actors.len(),
        });
        self.apply_deferred();
        true
    }

    pub fn clear_hit_actors(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.hit_actors.clear();
        }
    }

    pub fn ignore_actor(&mut self, entity: Entity) {
        if !self.ignored.contains(&entity) {
            self.ignored.push(entity);
        }
    }

    pub fn clear_ignored_actors(&mut self) {
        self.ignored.clear();
    }

    // === Configuration ===

    pub fn set_sockets(&mut self, start: impl Into<String>, end: impl Into<String>) {
        self.config.start_socket = start.into();
        self.config.end_socket = end.into();
    }

    pub fn set_mesh_source(&mut self, source: MeshSource) {
        self.config.mesh_source = source;
    }

    pub fn set_trace_mode(&mut self, mode: TraceMode) {
        self.config.mode = mode;
    }

    pub fn set_damage_multiplier(&mut self, multiplier: f32) {
        self.config.damage_multiplier = multiplier;
    }

    pub fn set_allow_multiple_hits(&mut self, allow: bool) {
        self.config.allow_multiple_hits_per_actor = allow;
    }

    /// Применить override поверх текущей конфигурации (с сохранением)
    pub fn push_override(&mut self, window: &TraceOverride) {
        self.saved.push(self.config.clone());
        window.apply(&mut self.config);
    }

    /// Вернуть конфигурацию, сохранённую последним `push_override`
    pub fn pop_override(&mut self) -> bool {
        let Some(previous) = self.saved.pop() else {
            return false;
        };
        self.config = previous;
        self.apply_deferred();
        true
    }

    pub fn override_depth(&self) -> usize {
        self.saved.len()
    }

    /// Сокеты экипированного оружия (None = тело + unarmed сокеты).
    ///
    /// Во время сессии или оверрайда смена откладывается до их окончания.
    pub fn adopt_weapon(&mut self, weapon: Option<&WeaponStats>, unarmed: &WeaponStats) {
        let (source, stats) = match weapon {
            Some(stats) => (MeshSource::WeaponMesh, stats),
            None => (MeshSource::CharacterMesh, unarmed),
        };

        let mut base = self
            .deferred_base
            .take()
            .or_else(|| self.saved.first().cloned())
            .unwrap_or_else(|| self.config.clone());
        base.mesh_source = source;
        base.mode = stats.trace.mode;
        base.start_socket = stats.trace.start_socket.clone();
        base.end_socket = stats.trace.end_socket.clone();
        base.radius = stats.trace.radius;

        self.deferred_base = Some(base);
        self.apply_deferred();
    }

    fn apply_deferred(&mut self) {
        if self.session.is_some() || !self.saved.is_empty() {
            return;
        }
        if let Some(base) = self.deferred_base.take() {
            self.config = base;
        }
    }

    // === Sampling ===

    /// Один тик активной сессии. Returns новые попадания в хронологическом порядке.
    pub fn sample(
        &mut self,
        owner: Entity,
        sockets: &dyn SocketLocator,
        world: &dyn OverlapWorld,
        weapon_damage: Option<f32>,
    ) -> Vec<TraceHit> {
        let config = &self.config;
        let ignored = &self.ignored;
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };

        let Some(current) = config.resolve(sockets) else {
            logger::log(&format!(
                "⚠️ MeleeTrace: sockets '{}'/'{}' not found on {:?} of {:?}, skipping tick",
                config.start_socket, config.end_socket, config.mesh_source, owner
            ));
            return Vec::new();
        };

        let steps: Vec<(Vec3, Vec3)> = match session.previous {
            Some((previous_start, previous_end)) => {
                let count = config.step_count();
                (0..=count)
                    .map(|i| {
                        let alpha = i as f32 / count as f32;
                        (
                            previous_start.lerp(current.0, alpha),
                            previous_end.lerp(current.1, alpha),
                        )
                    })
                    .collect()
            }
            None => vec![current],
        };

        let damage = config.damage_for(weapon_damage);
        let mut hits = Vec::new();

        for (start, end) in steps {
            let mut hit_this_step: Vec<Entity> = Vec::new();

            for point in config.sample_points(start, end) {
                for target in world.overlap_sphere(point, config.radius, &config.object_types) {
                    if target == owner || ignored.contains(&target) || hit_this_step.contains(&target) {
                        continue;
                    }
                    if !config.allow_multiple_hits_per_actor && session.hit_actors.contains(&target) {
                        continue;
                    }

                    session.hit_actors.insert(target);
                    hit_this_step.push(target);
                    hits.push(TraceHit {
                        target,
                        location: point,
                        damage,
                    });
                }
            }
        }

        session.previous = Some(current);
        hits
    }

    pub fn drain_events(&mut self) -> Vec<TraceEvent> {
        std::mem::take(&mut self.outbox)
    }

    pub fn pending_events(&self) -> &[TraceEvent] {
        &self.outbox
    }
}

/// OverlapWorld поверх Hurtbox + Transform (снимок на тик)
#[derive(Debug, Clone, Default)]
pub struct HurtboxWorld {
    entries: Vec<(Entity, Vec3, Hurtbox)>,
}

impl HurtboxWorld {
    pub fn new(entries: impl IntoIterator<Item = (Entity, Vec3, Hurtbox)>) -> Self {
        let mut entries: Vec<_> = entries.into_iter().collect();
        entries.sort_by_key(|(entity, _, _)| entity.index());
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl OverlapWorld for HurtboxWorld {
    fn overlap_sphere(&self, center: Vec3, radius: f32, object_types: &[ObjectType]) -> Vec<Entity> {
        self.entries
            .iter()
            .filter(|(_, _, hurtbox)| object_types.contains(&hurtbox.object_type))
            .filter(|(_, origin, hurtbox)| hurtbox.overlaps_sphere(*origin, center, radius))
            .map(|(entity, _, _)| *entity)
            .collect()
    }
}
