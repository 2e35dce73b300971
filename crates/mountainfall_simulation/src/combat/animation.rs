//! Анимационный коллаборатор
//!
//! Симуляция не проигрывает анимации. Она только:
//! - спрашивает длительность монтажа (`MontageLibrary`)
//! - пишет команды play/stop (`MontageCommand` → презентационный слой)

use std::collections::HashMap;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Команды проигрывания монтажей
pub trait AnimationDriver {
    /// Returns длительность монтажа (0 = монтаж неизвестен, ничего не играет)
    fn play_montage(&mut self, id: &str) -> f32;

    /// `None` = остановить текущий монтаж
    fn stop_montage(&mut self, id: Option<&str>, blend_out: f32);
}

/// Длительности монтажей (секунды), id → duration
#[derive(Resource, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MontageLibrary {
    pub durations: HashMap<String, f32>,
}

impl MontageLibrary {
    pub fn with(mut self, id: impl Into<String>, duration: f32) -> Self {
        self.durations.insert(id.into(), duration);
        self
    }

    pub fn insert(&mut self, id: impl Into<String>, duration: f32) {
        self.durations.insert(id.into(), duration);
    }

    pub fn duration(&self, id: &str) -> Option<f32> {
        self.durations.get(id).copied()
    }

    /// Длительности для встроенных пресетов оружия (headless duel, тесты)
    pub fn standard() -> Self {
        [
            ("unarmed_jab", 0.6),
            ("unarmed_cross", 0.7),
            ("unarmed_kick", 1.1),
            ("unarmed_riposte", 1.2),
            ("unarmed_parry", 0.5),
            ("unarmed_parry_success", 0.6),
            ("unarmed_drop_attack", 0.9),
            ("sword_light_1", 0.9),
            ("sword_light_2", 0.9),
            ("sword_light_3", 1.1),
            ("sword_heavy_1", 1.6),
            ("sword_heavy_2", 1.8),
            ("sword_plunge", 0.8),
            ("sword_riposte", 1.4),
            ("sword_parry", 0.5),
            ("sword_parry_success", 0.6),
            ("sword_block", 0.4),
            ("greatsword_light_1", 1.4),
            ("greatsword_light_2", 1.5),
            ("greatsword_heavy_1", 2.2),
            ("greatsword_plunge", 1.0),
            ("greatsword_riposte", 1.8),
            ("greatsword_block", 0.4),
            ("shield_parry", 0.5),
            ("shield_parry_success", 0.6),
            ("shield_block", 0.4),
            ("guard_break", 1.2),
            ("hit_react", 0.6),
            ("dodge_roll", 0.6),
        ]
        .into_iter()
        .fold(Self::default(), |library, (id, duration)| library.with(id, duration))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MontageCommandKind {
    Play { id: String, duration: f32 },
    Stop { id: Option<String>, blend_out: f32 },
}

/// Команда презентационному слою
#[derive(Event, Debug, Clone, PartialEq)]
pub struct MontageCommand {
    pub entity: Entity,
    pub command: MontageCommandKind,
}

/// AnimationDriver поверх `MontageLibrary`, копит команды до flush
pub struct MontageRecorder<'a> {
    library: &'a MontageLibrary,
    commands: Vec<MontageCommandKind>,
}

impl<'a> MontageRecorder<'a> {
    pub fn new(library: &'a MontageLibrary) -> Self {
        Self {
            library,
            commands: Vec::new(),
        }
    }

    pub fn commands(&self) -> &[MontageCommandKind] {
        &self.commands
    }

    /// Id всех запущенных монтажей по порядку
    pub fn played(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                MontageCommandKind::Play { id, .. } => Some(id.as_str()),
                MontageCommandKind::Stop { .. } => None,
            })
            .collect()
    }

    pub fn flush(&mut self, entity: Entity, writer: &mut EventWriter<MontageCommand>) {
        for command in self.commands.drain(..) {
            writer.write(MontageCommand { entity, command });
        }
    }
}

impl AnimationDriver for MontageRecorder<'_> {
    fn play_montage(&mut self, id: &str) -> f32 {
        let duration = self.library.duration(id).unwrap_or(0.0);
        if duration > 0.0 {
            self.commands.push(MontageCommandKind::Play {
                id: id.to_string(),
                duration,
            });
        }
        duration
    }

    fn stop_montage(&mut self, id: Option<&str>, blend_out: f32) {
        self.commands.push(MontageCommandKind::Stop {
            id: id.map(str::to_string),
            blend_out,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_montage_plays_nothing() {
        let library = MontageLibrary::default().with("slash", 1.0);
        let mut recorder = MontageRecorder::new(&library);

        assert_eq!(recorder.play_montage("missing"), 0.0);
        assert!(recorder.commands().is_empty());

        assert_eq!(recorder.play_montage("slash"), 1.0);
        recorder.stop_montage(None, 0.2);
        assert_eq!(recorder.played(), vec!["slash"]);
        assert_eq!(recorder.commands().len(), 2);
    }

    #[test]
    fn test_standard_library_covers_presets() {
        let library = MontageLibrary::standard();
        assert_eq!(library.duration("sword_light_1"), Some(0.9));
        assert_eq!(library.duration("dodge_roll"), Some(0.6));
    }
}
