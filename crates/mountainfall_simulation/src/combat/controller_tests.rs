//! Tests for CombatController state machine.

#[cfg(test)]
mod tests {
    use bevy::prelude::*;

    use crate::combat::animation::{MontageLibrary, MontageRecorder};
    use crate::combat::config::CombatConfig;
    use crate::combat::controller::*;
    use crate::combat::melee_trace::MeleeTracer;
    use crate::combat::weapon_stats::{Loadout, WeaponStats};
    use crate::components::ResourcePool;

    /// 1/64 — точное двоичное значение, суммы не накапливают ошибку
    const STEP: f32 = 1.0 / 64.0;

    struct Harness {
        config: CombatConfig,
        library: MontageLibrary,
        loadout: Loadout,
        pool: ResourcePool,
        tracer: MeleeTracer,
        controller: CombatController,
        played: Vec<String>,
    }

    impl Harness {
        fn new(loadout: Loadout) -> Self {
            let library = MontageLibrary::standard()
                .with("sword_light_1", 1.0)
                .with("sword_light_2", 1.0)
                .with("sword_light_3", 1.0)
                .with("sword_heavy_1", 2.0)
                .with("sword_plunge", 0.8);

            Self {
                config: CombatConfig::default(),
                library,
                loadout,
                pool: ResourcePool::new(100.0, 150.0),
                tracer: MeleeTracer::default(),
                controller: CombatController::new(),
                played: Vec::new(),
            }
        }

        fn sword() -> Self {
            Self::new(Loadout::with_primary(WeaponStats::sword()))
        }

        fn with<R>(&mut self, f: impl FnOnce(&mut CombatController, &mut CombatCtx) -> R) -> R {
            let mut recorder = MontageRecorder::new(&self.library);
            let mut ctx = CombatCtx {
                config: &self.config,
                loadout: Some(&self.loadout),
                pool: Some(&mut self.pool),
                tracer: Some(&mut self.tracer),
                animator: &mut recorder,
                sockets: None,
            };
            let result = f(&mut self.controller, &mut ctx);
            self.played.extend(recorder.played().into_iter().map(str::to_string));
            result
        }

        fn advance(&mut self, seconds: f32) {
            let steps = (seconds / STEP).round() as usize;
            for _ in 0..steps {
                self.with(|controller, ctx| controller.tick(STEP, ctx));
            }
        }

        fn state(&self) -> CombatState {
            self.controller.state()
        }
    }

    fn attacker() -> Entity {
        Entity::from_raw(42)
    }

    #[test]
    fn test_light_attack_from_idle() {
        let mut h = Harness::sword();

        assert!(h.with(|c, ctx| c.light_attack(ctx)));
        assert_eq!(h.state(), CombatState::Attacking);
        assert_eq!(h.pool.stamina(), 135.0);
        assert_eq!(h.played, vec!["sword_light_1"]);
    }

    #[test]
    fn test_combo_index_advances_exactly_one_per_attack() {
        let mut h = Harness::sword();

        h.with(|c, ctx| c.light_attack(ctx));
        assert_eq!(h.controller.light_combo_index(), 0);

        // recovery = 25% от 1.0s
        h.advance(0.265625);
        assert_eq!(h.state(), CombatState::Recovering);
        assert!(h.controller.is_combo_window_open());
        assert_eq!(h.controller.light_combo_index(), 1);

        assert!(h.with(|c, ctx| c.light_attack(ctx)));
        assert_eq!(h.played.last().map(String::as_str), Some("sword_light_2"));
        assert_eq!(h.controller.light_combo_index(), 1);

        h.advance(0.265625);
        assert_eq!(h.controller.light_combo_index(), 2);
    }

    #[test]
    fn test_combo_wraps_after_last_attack() {
        let mut h = Harness::sword();

        for _ in 0..3 {
            assert!(h.with(|c, ctx| c.light_attack(ctx)));
            h.advance(0.265625);
        }
        assert_eq!(h.played, vec!["sword_light_1", "sword_light_2", "sword_light_3"]);
        assert_eq!(h.controller.light_combo_index(), 0);
    }

    #[test]
    fn test_combo_continues_from_idle_inside_combo_window() {
        let mut h = Harness::sword();

        for expected_index in 1..3 {
            assert!(h.with(|c, ctx| c.light_attack(ctx)));

            // Анимация 1.0s: до AttackEnd состояние не должно падать в Idle
            for _ in 0..63 {
                h.advance(STEP);
                assert_ne!(h.state(), CombatState::Idle);
            }
            h.advance(STEP);
            assert_eq!(h.state(), CombatState::Idle);

            // Пауза внутри combo window (1.0s)
            h.advance(0.5);
            assert_eq!(h.state(), CombatState::Idle);
            assert!(h.controller.is_combo_window_open());
            assert_eq!(h.controller.light_combo_index(), expected_index);
        }

        assert!(h.with(|c, ctx| c.light_attack(ctx)));
        assert_eq!(h.played, vec!["sword_light_1", "sword_light_2", "sword_light_3"]);
    }

    #[test]
    fn test_buffered_attack_executes_at_recovery() {
        let mut h = Harness::sword();

        h.with(|c, ctx| c.light_attack(ctx));
        h.advance(0.15625);

        // Слишком рано — ввод уходит в буфер
        assert!(!h.with(|c, ctx| c.light_attack(ctx)));
        let buffered = h.controller.buffered_input().expect("input should be buffered");
        assert_eq!(buffered.kind, BufferedInputKind::LightAttack);

        h.advance(0.109375);
        assert!(h.controller.buffered_input().is_none());
        assert_eq!(h.state(), CombatState::Attacking);
        assert_eq!(h.played, vec!["sword_light_1", "sword_light_2"]);
    }

    #[test]
    fn test_stale_buffered_input_is_dropped() {
        let mut h = Harness::sword();

        // Heavy 2.0s → recovery на 0.5s
        h.with(|c, ctx| c.heavy_attack(ctx));
        h.advance(0.0625);
        h.with(|c, ctx| c.light_attack(ctx));
        assert!(h.controller.buffered_input().is_some());

        h.advance(0.5);
        assert!(h.controller.buffered_input().is_none());
        assert_eq!(h.state(), CombatState::Recovering);
        assert_eq!(h.played, vec!["sword_heavy_1"]);
    }

    #[test]
    fn test_heavy_attack_resets_light_chain() {
        let mut h = Harness::sword();

        h.with(|c, ctx| c.light_attack(ctx));
        h.advance(0.265625);
        assert_eq!(h.controller.light_combo_index(), 1);

        assert!(h.with(|c, ctx| c.heavy_attack(ctx)));
        assert_eq!(h.controller.light_combo_index(), 0);
    }

    #[test]
    fn test_combo_window_closes_after_attack_end() {
        let mut h = Harness::sword();

        h.with(|c, ctx| c.light_attack(ctx));
        h.advance(1.0);
        assert_eq!(h.state(), CombatState::Idle);
        assert!(h.controller.is_combo_window_open());
        assert_eq!(h.controller.light_combo_index(), 1);

        h.advance(1.015625);
        assert!(!h.controller.is_combo_window_open());
        assert_eq!(h.controller.light_combo_index(), 0);
    }

    #[test]
    fn test_attack_requires_stamina() {
        let mut h = Harness::sword();
        h.pool.set_stamina(10.0);

        assert!(!h.with(|c, ctx| c.light_attack(ctx)));
        assert_eq!(h.state(), CombatState::Idle);
        assert_eq!(h.pool.stamina(), 10.0);
        assert!(h.played.is_empty());
    }

    #[test]
    fn test_unknown_montage_fails_without_cost() {
        let mut h = Harness::sword();
        h.library = MontageLibrary::default();

        assert!(!h.with(|c, ctx| c.light_attack(ctx)));
        assert_eq!(h.state(), CombatState::Idle);
        assert_eq!(h.pool.stamina(), 150.0);
    }

    #[test]
    fn test_trace_window_arms_and_disarms() {
        let mut h = Harness::sword();

        h.with(|c, ctx| c.light_attack(ctx));
        h.advance(0.125);
        assert!(h.tracer.is_active());
        assert_eq!(h.tracer.override_depth(), 1);

        h.advance(0.140625);
        assert!(!h.tracer.is_active());
        assert_eq!(h.tracer.override_depth(), 0);
    }

    #[test]
    fn test_guard_parries_then_blocks_while_held() {
        let mut h = Harness::sword();

        assert!(h.with(|c, ctx| c.start_guard(ctx)));
        assert_eq!(h.state(), CombatState::Parrying);
        assert_eq!(h.pool.stamina(), 140.0);

        h.advance(0.25);
        assert_eq!(h.state(), CombatState::Blocking);

        h.with(|c, ctx| c.stop_guard(ctx));
        assert_eq!(h.state(), CombatState::Idle);
    }

    #[test]
    fn test_block_reduces_damage_and_drains_stamina() {
        let mut h = Harness::sword();
        h.with(|c, ctx| c.start_guard(ctx));
        h.advance(0.25);

        let result = h.with(|c, ctx| c.modify_incoming_damage(20.0, attacker(), ctx));

        assert!(result.was_blocked);
        assert!((result.modified_damage - 4.0).abs() < 1e-4);
        assert!((result.stamina_drain - 30.0).abs() < 1e-4);
        assert!((h.pool.stamina() - 110.0).abs() < 1e-4);
        assert_eq!(h.state(), CombatState::Blocking);
    }

    #[test]
    fn test_shield_stability_reduces_block_drain() {
        let mut h = Harness::new(Loadout::with_primary(WeaponStats::sword()).with_off_hand(WeaponStats::shield()));
        h.with(|c, ctx| c.start_guard(ctx));
        h.advance(0.25);

        let result = h.with(|c, ctx| c.modify_incoming_damage(20.0, attacker(), ctx));

        assert!(result.was_blocked);
        assert!((result.stamina_drain - 12.0).abs() < 1e-4);
    }

    #[test]
    fn test_guard_break_applies_full_damage() {
        let mut h = Harness::sword();
        h.with(|c, ctx| c.start_guard(ctx));
        h.advance(0.25);
        h.pool.set_stamina(10.0);

        let result = h.with(|c, ctx| c.modify_incoming_damage(20.0, attacker(), ctx));

        assert!(result.caused_guard_break);
        assert!(!result.was_blocked);
        assert_eq!(result.modified_damage, 20.0);
        assert_eq!(h.state(), CombatState::GuardBroken);
        assert!(!h.controller.is_guard_held());
        assert!(h
            .controller
            .pending_events()
            .contains(&CombatEvent::GuardBroken { attacker: attacker() }));

        h.advance(1.25);
        assert_eq!(h.state(), CombatState::Idle);
    }

    #[test]
    fn test_parry_negates_damage_and_opens_riposte() {
        let mut h = Harness::sword();
        h.with(|c, ctx| c.start_guard(ctx));

        let result = h.with(|c, ctx| c.modify_incoming_damage(30.0, attacker(), ctx));

        assert!(result.was_parried);
        assert_eq!(result.modified_damage, 0.0);
        assert_eq!(h.state(), CombatState::ParrySuccess);
        assert!(h.controller.can_riposte());
        assert_eq!(h.controller.parried_target(), Some(attacker()));

        let events = h.controller.drain_events();
        assert!(events.contains(&CombatEvent::ParrySucceeded { attacker: attacker() }));
        assert!(events.contains(&CombatEvent::RiposteAvailable(true)));
    }

    #[test]
    fn test_riposte_strikes_parried_target() {
        let mut h = Harness::sword();
        h.with(|c, ctx| c.start_guard(ctx));
        h.with(|c, ctx| c.modify_incoming_damage(30.0, attacker(), ctx));
        h.controller.drain_events();

        assert!(h.with(|c, ctx| c.perform_riposte(ctx)));
        assert_eq!(h.state(), CombatState::Riposting);
        assert!(!h.controller.can_riposte());

        let events = h.controller.drain_events();
        assert!(events.contains(&CombatEvent::Strike {
            target: attacker(),
            damage: 62.5,
        }));

        // sword_riposte 1.4s
        h.advance(1.421875);
        assert_eq!(h.state(), CombatState::Idle);
    }

    #[test]
    fn test_riposte_window_expires() {
        let mut h = Harness::sword();
        h.with(|c, ctx| c.start_guard(ctx));
        h.with(|c, ctx| c.modify_incoming_damage(30.0, attacker(), ctx));

        h.advance(1.515625);
        assert_eq!(h.state(), CombatState::Idle);
        assert!(!h.controller.can_riposte());
        assert!(h.controller.parried_target().is_none());
        assert!(!h.with(|c, ctx| c.perform_riposte(ctx)));
    }

    #[test]
    fn test_unarmed_guard_parries_but_cannot_block() {
        let mut h = Harness::new(Loadout::default());

        assert!(h.with(|c, ctx| c.start_guard(ctx)));
        assert_eq!(h.state(), CombatState::Parrying);

        h.advance(0.25);
        assert_eq!(h.state(), CombatState::Idle);
    }

    #[test]
    fn test_greatsword_guard_blocks_directly() {
        let mut h = Harness::new(Loadout::with_primary(WeaponStats::greatsword()));

        assert!(h.with(|c, ctx| c.start_guard(ctx)));
        assert_eq!(h.state(), CombatState::Blocking);
        assert_eq!(h.pool.stamina(), 150.0);
    }

    #[test]
    fn test_stagger_interrupts_attack_and_trace() {
        let mut h = Harness::sword();
        h.with(|c, ctx| c.light_attack(ctx));
        h.advance(0.125);
        assert!(h.tracer.is_active());

        assert!(h.with(|c, ctx| c.apply_stagger(ctx)));
        assert_eq!(h.state(), CombatState::Staggered);
        assert!(!h.tracer.is_active());
        assert_eq!(h.tracer.override_depth(), 0);
        assert_eq!(h.controller.light_combo_index(), 0);

        h.advance(0.625);
        assert_eq!(h.state(), CombatState::Idle);
    }

    #[test]
    fn test_hit_landed_staggers_only_unguarded_hits() {
        let mut h = Harness::sword();

        let blocked = DamageModifierResult {
            modified_damage: 4.0,
            was_blocked: true,
            ..Default::default()
        };
        assert!(!h.with(|c, ctx| c.on_hit_landed(4.0, 15.0, &blocked, ctx)));
        assert_eq!(h.state(), CombatState::Idle);

        let clean = DamageModifierResult::unchanged(20.0);
        assert!(!h.with(|c, ctx| c.on_hit_landed(0.0, 15.0, &clean, ctx)));
        assert!(h.with(|c, ctx| c.on_hit_landed(20.0, 15.0, &clean, ctx)));
        assert_eq!(h.state(), CombatState::Staggered);
    }

    #[test]
    fn test_poise_threshold_gates_stagger() {
        let mut h = Harness::sword();
        h.config.min_poise_damage_to_stagger = 20.0;

        let clean = DamageModifierResult::unchanged(20.0);
        assert!(!h.with(|c, ctx| c.on_hit_landed(20.0, 15.0, &clean, ctx)));
        assert!(h.with(|c, ctx| c.on_hit_landed(20.0, 25.0, &clean, ctx)));
    }

    #[test]
    fn test_dodge_iframes_evade_damage() {
        let mut h = Harness::sword();

        assert!(h.with(|c, ctx| c.dodge(ctx)));
        assert_eq!(h.state(), CombatState::Dodging);
        assert_eq!(h.pool.stamina(), 130.0);
        assert!(!h.controller.is_invulnerable());

        h.advance(0.0625);
        assert!(h.controller.is_invulnerable());
        let result = h.with(|c, ctx| c.modify_incoming_damage(20.0, attacker(), ctx));
        assert!(result.was_evaded);
        assert_eq!(result.modified_damage, 0.0);

        h.advance(0.3125);
        assert!(!h.controller.is_invulnerable());
        let result = h.with(|c, ctx| c.modify_incoming_damage(20.0, attacker(), ctx));
        assert_eq!(result, DamageModifierResult::unchanged(20.0));

        h.advance(0.25);
        assert_eq!(h.state(), CombatState::Idle);
    }

    #[test]
    fn test_early_dodge_is_buffered_until_recovery() {
        let mut h = Harness::sword();
        h.with(|c, ctx| c.light_attack(ctx));
        h.advance(0.125);

        assert!(!h.with(|c, ctx| c.dodge(ctx)));
        assert_eq!(
            h.controller.buffered_input().map(|b| b.kind),
            Some(BufferedInputKind::Dodge)
        );

        h.advance(0.140625);
        assert_eq!(h.state(), CombatState::Dodging);
        assert_eq!(h.controller.light_combo_index(), 0);
    }

    #[test]
    fn test_drop_attack_scales_with_fall_height() {
        let mut h = Harness::sword();

        h.controller.start_drop_attack_tracking(10.0);
        h.controller.set_height(4.0);
        assert!(h.with(|c, ctx| c.light_attack(ctx)));
        assert_eq!(h.state(), CombatState::DropAttacking);
        assert!(h.controller.is_drop_falling());
        assert_eq!(h.pool.stamina(), 130.0);

        h.with(|c, ctx| c.stop_drop_attack_tracking(2.0, ctx));
        assert!(!h.controller.is_drop_falling());
        assert_eq!(h.controller.drop_attack_damage_multiplier(), 4.0);
        assert_eq!(h.played.last().map(String::as_str), Some("sword_plunge"));

        // recovery = 25% от 0.8s
        h.advance(0.203125);
        assert_eq!(h.state(), CombatState::Idle);
    }

    #[test]
    fn test_unarmed_drop_attack_uses_fallback_moveset() {
        let mut h = Harness::new(Loadout::default());

        h.controller.start_drop_attack_tracking(3.0);
        h.controller.set_height(0.0);
        assert!(h.with(|c, ctx| c.can_drop_attack(ctx)));
        assert!(h.with(|c, ctx| c.drop_attack(ctx)));
        assert_eq!(h.state(), CombatState::DropAttacking);

        h.with(|c, ctx| c.stop_drop_attack_tracking(0.0, ctx));
        assert_eq!(h.played.last().map(String::as_str), Some("unarmed_drop_attack"));

        // recovery = 25% от 0.9s
        h.advance(0.25);
        assert_eq!(h.state(), CombatState::Idle);
    }

    #[test]
    fn test_owner_death_blocks_actions_until_revive() {
        let mut h = Harness::sword();
        h.with(|c, ctx| c.light_attack(ctx));

        h.with(|c, ctx| c.on_owner_died(ctx));
        assert_eq!(h.state(), CombatState::Idle);
        assert!(!h.with(|c, ctx| c.light_attack(ctx)));
        assert!(!h.with(|c, ctx| c.start_guard(ctx)));
        assert!(!h.with(|c, ctx| c.dodge(ctx)));

        h.controller.on_owner_revived();
        assert!(h.with(|c, ctx| c.light_attack(ctx)));
    }

    #[test]
    fn test_force_idle_clears_everything() {
        let mut h = Harness::sword();
        h.with(|c, ctx| c.start_guard(ctx));
        h.with(|c, ctx| c.modify_incoming_damage(30.0, attacker(), ctx));
        h.controller.drain_events();

        h.with(|c, ctx| c.force_idle(ctx));

        assert_eq!(h.state(), CombatState::Idle);
        assert!(!h.controller.can_riposte());
        assert!(!h.controller.is_timer_scheduled(CombatTimer::RiposteWindowClose));
        assert!(h
            .controller
            .drain_events()
            .contains(&CombatEvent::RiposteAvailable(false)));
    }

    #[test]
    fn test_state_changes_are_reported() {
        let mut h = Harness::sword();
        h.with(|c, ctx| c.light_attack(ctx));

        assert_eq!(
            h.controller.drain_events(),
            vec![CombatEvent::StateChanged {
                old: CombatState::Idle,
                new: CombatState::Attacking,
            }]
        );
    }
}
