//! SocketPose — world-позиции сокетов, выставленные анимационным слоем

use std::collections::HashMap;

use bevy::prelude::*;

use crate::combat::melee_trace::{MeshSource, SocketLocator};

/// Снимок позы сокетов на текущий тик
///
/// `weapon = None` — меша оружия нет (unarmed или не заспавнен): запросы к
/// WeaponMesh падают на сокеты тела.
#[derive(Component, Debug, Clone, Default, PartialEq)]
pub struct SocketPose {
    pub body: HashMap<String, Vec3>,
    pub weapon: Option<HashMap<String, Vec3>>,
}

impl SocketPose {
    pub fn set_body(&mut self, socket: impl Into<String>, position: Vec3) {
        self.body.insert(socket.into(), position);
    }

    pub fn set_weapon(&mut self, socket: impl Into<String>, position: Vec3) {
        self.weapon
            .get_or_insert_with(HashMap::new)
            .insert(socket.into(), position);
    }

    pub fn clear_weapon(&mut self) {
        self.weapon = None;
    }
}

impl SocketLocator for SocketPose {
    fn socket_location(&self, source: MeshSource, socket: &str) -> Option<Vec3> {
        match (source, &self.weapon) {
            (MeshSource::WeaponMesh, Some(weapon)) => weapon.get(socket).copied(),
            _ => self.body.get(socket).copied(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weapon_source_falls_back_to_body() {
        let mut pose = SocketPose::default();
        pose.set_body("hand_r", Vec3::X);

        assert_eq!(pose.socket_location(MeshSource::WeaponMesh, "hand_r"), Some(Vec3::X));

        pose.set_weapon("Tip", Vec3::Y);
        assert_eq!(pose.socket_location(MeshSource::WeaponMesh, "Tip"), Some(Vec3::Y));
        assert_eq!(pose.socket_location(MeshSource::WeaponMesh, "hand_r"), None);
        assert_eq!(pose.socket_location(MeshSource::CharacterMesh, "hand_r"), Some(Vec3::X));
    }
}
