//! Sparring partner — простой драйвер для headless дуэлей
//!
//! Не AI, а генератор ввода: раз в `think_interval` бросает кубик
//! (DeterministicRng) и шлёт CombatIntent. Параллельно выставляет SocketPose
//! вокруг Transform, чтобы MeleeTracer было что трейсить без анимаций.
//!
//! Смерть снимает SparringPartner (DeathConfig::stop_ai_on_death).

use bevy::prelude::*;
use rand::Rng;

use crate::combat::controller::CombatController;
use crate::combat::events::{CombatAction, CombatIntent};
use crate::combat::weapon_stats::{Loadout, WeaponType};
use crate::combat::{CombatConfig, CombatSystems};
use crate::components::SocketPose;
use crate::DeterministicRng;

/// Высота руки над Transform (метры)
const HAND_HEIGHT: f32 = 1.2;
/// Вынос руки вперёд
const HAND_REACH: f32 = 0.4;
/// Полуугол дуги замаха (радианы)
const SWING_HALF_ARC: f32 = 1.4;
/// Доля анимации, за которую клинок проходит дугу
const SWING_PORTION: f32 = 0.3;

#[derive(Component, Debug, Clone, Reflect)]
#[reflect(Component)]
pub struct SparringPartner {
    pub opponent: Option<Entity>,
    /// Среднее время между решениями (секунды)
    pub think_interval: f32,
    /// Сколько держать guard
    pub guard_duration: f32,
    /// 0..1, доля атак среди решений
    pub aggression: f32,
    cooldown: f32,
    guard_timer: f32,
}

impl Default for SparringPartner {
    fn default() -> Self {
        Self {
            opponent: None,
            think_interval: 0.5,
            guard_duration: 0.6,
            aggression: 0.6,
            cooldown: 0.0,
            guard_timer: 0.0,
        }
    }
}

impl SparringPartner {
    pub fn against(opponent: Entity) -> Self {
        Self {
            opponent: Some(opponent),
            ..Default::default()
        }
    }

    /// Действие по броску `roll` (0..1)
    pub fn pick_action(&self, roll: f32) -> CombatAction {
        let attack_share = self.aggression.clamp(0.0, 1.0);
        if roll < attack_share * 0.7 {
            CombatAction::LightAttack
        } else if roll < attack_share {
            CombatAction::HeavyAttack
        } else if roll < attack_share + (1.0 - attack_share) * 0.6 {
            CombatAction::StartGuard
        } else {
            CombatAction::Dodge
        }
    }
}

/// Sparring plugin (драйвер + позы сокетов перед CombatSystems)
pub struct SparringPlugin;

impl Plugin for SparringPlugin {
    fn build(&self, app: &mut App) {
        app.register_type::<SparringPartner>().add_systems(
            FixedUpdate,
            (drive_sparring_partners, pose_sparring_sockets)
                .chain()
                .before(CombatSystems),
        );
    }
}

/// System: решения спарринг-партнёров → CombatIntent
///
/// Обход по Entity index (детерминизм RNG).
pub fn drive_sparring_partners(
    mut partners: Query<(Entity, &mut SparringPartner, &CombatController)>,
    mut rng: ResMut<DeterministicRng>,
    time: Res<Time<Fixed>>,
    mut intents: EventWriter<CombatIntent>,
) {
    let delta = time.delta_secs();

    let mut ordered: Vec<_> = partners.iter_mut().collect();
    ordered.sort_by_key(|(entity, ..)| entity.index());

    for (entity, mut partner, controller) in ordered {
        if controller.can_riposte() {
            intents.write(CombatIntent {
                entity,
                action: CombatAction::Riposte,
            });
            continue;
        }

        if controller.is_guard_held() {
            partner.guard_timer -= delta;
            if partner.guard_timer <= 0.0 {
                intents.write(CombatIntent {
                    entity,
                    action: CombatAction::StopGuard,
                });
            }
            continue;
        }

        partner.cooldown -= delta;
        if partner.cooldown > 0.0 {
            continue;
        }
        partner.cooldown = partner.think_interval * rng.rng.gen_range(0.5..1.5);

        let action = partner.pick_action(rng.rng.gen::<f32>());
        if action == CombatAction::StartGuard {
            partner.guard_timer = partner.guard_duration;
        }
        intents.write(CombatIntent { entity, action });
    }
}

/// Мировые позиции сокетов для замаха
///
/// Клинок проходит дугу перед грудью за первые `SWING_PORTION` атаки,
/// вне атаки висит в левой крайней точке.
pub fn swing_pose(origin: Vec3, facing: Vec3, progress: f32, blade_length: f32) -> (Vec3, Vec3) {
    let facing = Vec3::new(facing.x, 0.0, facing.z).normalize_or(Vec3::NEG_Z);
    let hand = origin + Vec3::Y * HAND_HEIGHT + facing * HAND_REACH;

    let sweep = (progress / SWING_PORTION).clamp(0.0, 1.0);
    let angle = SWING_HALF_ARC - 2.0 * SWING_HALF_ARC * sweep;
    let direction = Quat::from_rotation_y(angle) * facing;

    (hand, hand + direction * blade_length)
}

fn blade_length(weapon_type: WeaponType) -> f32 {
    match weapon_type {
        WeaponType::None => 0.6,
        WeaponType::Dagger => 0.5,
        WeaponType::Sword | WeaponType::Axe => 1.0,
        WeaponType::Greatsword | WeaponType::Spear | WeaponType::Staff => 1.5,
        WeaponType::Shield => 0.4,
    }
}

/// System: SocketPose спарринг-партнёров из Transform + прогресса атаки
pub fn pose_sparring_sockets(
    config: Res<CombatConfig>,
    mut partners: Query<(
        &SparringPartner,
        &Transform,
        &CombatController,
        Option<&Loadout>,
        &mut SocketPose,
    )>,
    transforms: Query<&Transform>,
) {
    for (partner, transform, controller, loadout, mut pose) in partners.iter_mut() {
        let facing = partner
            .opponent
            .and_then(|opponent| transforms.get(opponent).ok())
            .map(|opponent| opponent.translation - transform.translation)
            .unwrap_or_else(|| transform.forward().as_vec3());

        let progress = if controller.is_attacking() {
            controller.attack_progress()
        } else {
            0.0
        };

        match loadout.and_then(Loadout::active_primary) {
            Some(weapon) => {
                let (base, tip) =
                    swing_pose(transform.translation, facing, progress, blade_length(weapon.weapon_type));
                pose.set_body("hand_r", base);
                pose.set_weapon(weapon.trace.start_socket.clone(), base);
                pose.set_weapon(weapon.trace.end_socket.clone(), tip);
            }
            None => {
                // Кулак: конец дуги и есть сокет
                let (_, fist) =
                    swing_pose(transform.translation, facing, progress, blade_length(WeaponType::None));
                pose.clear_weapon();
                pose.set_body(config.unarmed.trace.start_socket.clone(), fist);
                pose.set_body(config.unarmed.trace.end_socket.clone(), fist);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swing_crosses_facing_direction() {
        let (hand, start) = swing_pose(Vec3::ZERO, Vec3::NEG_Z, 0.0, 1.0);
        let (_, middle) = swing_pose(Vec3::ZERO, Vec3::NEG_Z, SWING_PORTION * 0.5, 1.0);
        let (_, end) = swing_pose(Vec3::ZERO, Vec3::NEG_Z, 1.0, 1.0);

        assert!((hand.y - HAND_HEIGHT).abs() < 1e-5);
        // Дуга проходит с одной стороны на другую через центр
        assert!(start.x * end.x < 0.0);
        assert!(middle.x.abs() < 1e-4);
        assert!(middle.z < hand.z);
    }

    #[test]
    fn test_pick_action_respects_aggression() {
        let passive = SparringPartner {
            aggression: 0.0,
            ..Default::default()
        };
        assert_eq!(passive.pick_action(0.1), CombatAction::StartGuard);
        assert_eq!(passive.pick_action(0.9), CombatAction::Dodge);

        let aggressive = SparringPartner {
            aggression: 1.0,
            ..Default::default()
        };
        assert_eq!(aggressive.pick_action(0.5), CombatAction::LightAttack);
        assert_eq!(aggressive.pick_action(0.95), CombatAction::HeavyAttack);
    }
}
