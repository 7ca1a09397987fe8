//! # ユニットAI
//!
//! 艦を自律操作する差し替え可能な戦略オブジェクトを定義します。
//!
//! 各艦は `Box<dyn UnitAi>` を1つ所有し、シミュレーションは毎ティック
//! [`UnitAi::run`] を呼び出します。AIに渡されるのは [`AiShipReference`] のみで、
//! これを通じて希望速度・照準方向・射撃意図を設定します。耐久値や弾薬の管理、
//! 撃沈処理は艦側の責務で、AIからは変更できません。
//!
//! ## 実装済みの戦略
//!
//! - [`StopInPlaceAi`]: その場で停止する（射撃しない）
//! - [`HoldCourseAi`]: 初期速度を維持する
//! - [`ChaseAi`]: 最も近い敵を追尾し、交戦距離内で射撃する

use std::fmt;

use tracing::trace;

use crate::models::{
    common::Vector3D,
    ship::{ShipControls, ShipSnapshot},
    traits::{ShipAiInterface, WorldInterface},
};
use crate::scenario::AiConfig;

/// ユニットAIの基底インターフェース
pub trait UnitAi: fmt::Debug {
    /// 戦略名（ログ出力用）
    fn name(&self) -> &'static str;

    /// 1ティック分の意思決定
    fn run(&mut self, ship: &mut dyn ShipAiInterface, world: &dyn WorldInterface);
}

/// AIが操作対象の艦を参照するためのハンドル
///
/// ティック開始時点の艦の状態と、書き込み可能な制御出力のみを保持します。
/// `fire_ready` は艦側が計算した、このティックの射撃フェーズで撃てるかどうかです。
pub struct AiShipReference<'a> {
    state: &'a ShipSnapshot,
    controls: &'a mut ShipControls,
    fire_ready: bool,
}

impl<'a> AiShipReference<'a> {
    pub fn new(state: &'a ShipSnapshot, controls: &'a mut ShipControls, fire_ready: bool) -> Self {
        Self { state, controls, fire_ready }
    }
}

impl ShipAiInterface for AiShipReference<'_> {
    fn get_id(&self) -> &str {
        &self.state.id
    }

    fn get_faction(&self) -> &str {
        &self.state.faction
    }

    fn get_position(&self) -> Vector3D {
        self.state.position
    }

    fn get_velocity(&self) -> Vector3D {
        self.state.velocity
    }

    fn get_max_speed(&self) -> f64 {
        self.state.max_speed
    }

    fn can_fire(&self) -> bool {
        self.fire_ready
    }

    fn set_desired_velocity(&mut self, velocity: Vector3D) {
        self.controls.desired_velocity = velocity.clamp_magnitude(self.state.max_speed);
    }

    fn set_aim_direction(&mut self, direction: Vector3D) {
        if !direction.is_zero() {
            self.controls.aim_direction = Some(direction.normalize());
        }
    }

    fn mark_fire_desired(&mut self) {
        self.controls.fire_desired = true;
    }
}

/// その場で停止するAI
#[derive(Debug, Default, Clone, Copy)]
pub struct StopInPlaceAi;

impl UnitAi for StopInPlaceAi {
    fn name(&self) -> &'static str {
        "stop_in_place"
    }

    fn run(&mut self, ship: &mut dyn ShipAiInterface, _world: &dyn WorldInterface) {
        ship.set_desired_velocity(Vector3D::zero());
    }
}

/// 最初に観測した速度を維持し続けるAI
#[derive(Debug, Default, Clone, Copy)]
pub struct HoldCourseAi {
    course: Option<Vector3D>,
}

impl UnitAi for HoldCourseAi {
    fn name(&self) -> &'static str {
        "hold_course"
    }

    fn run(&mut self, ship: &mut dyn ShipAiInterface, _world: &dyn WorldInterface) {
        let course = *self.course.get_or_insert(ship.get_velocity());
        ship.set_desired_velocity(course);
    }
}

/// 最寄りの敵艦を追尾するAI
///
/// 敵との距離が `standoff_range` より遠ければ最大速度で接近し、内側では敵の速度に合わせます。
/// `engage_range` 以内で射撃可能なら射撃します。敵がいなければその場で停止します。
#[derive(Debug, Clone, Copy)]
pub struct ChaseAi {
    pub engage_range: f64,
    pub standoff_range: f64,
}

impl ChaseAi {
    pub fn new(engage_range: f64, standoff_range: f64) -> Self {
        Self { engage_range, standoff_range }
    }
}

impl UnitAi for ChaseAi {
    fn name(&self) -> &'static str {
        "chase"
    }

    fn run(&mut self, ship: &mut dyn ShipAiInterface, world: &dyn WorldInterface) {
        let position = ship.get_position();
        let Some(enemy) = world.nearest_enemy(&position, ship.get_faction()) else {
            ship.set_desired_velocity(Vector3D::zero());
            return;
        };

        let offset = enemy.position - position;
        let distance = offset.magnitude();
        let direction = offset.normalize();

        if distance > self.standoff_range {
            ship.set_desired_velocity(direction * ship.get_max_speed());
        } else {
            ship.set_desired_velocity(enemy.velocity);
        }
        ship.set_aim_direction(direction);

        if distance <= self.engage_range && ship.can_fire() {
            ship.mark_fire_desired();
            trace!("[{:.2}s] {} → {} 射撃 (距離 {:.0}m)",
                   world.current_time(), ship.get_id(), enemy.id, distance);
        }
    }
}

/// シナリオ設定からユニットAIを生成
pub fn create_unit_ai(config: &AiConfig) -> Box<dyn UnitAi> {
    match config {
        AiConfig::StopInPlace => Box::new(StopInPlaceAi),
        AiConfig::HoldCourse => Box::new(HoldCourseAi::default()),
        AiConfig::Chase { engage_range_m, standoff_range_m } => {
            Box::new(ChaseAi::new(*engage_range_m, *standoff_range_m))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestWorld {
        ships: Vec<ShipSnapshot>,
    }

    impl WorldInterface for TestWorld {
        fn current_time(&self) -> f64 {
            0.0
        }

        fn ships(&self) -> &[ShipSnapshot] {
            &self.ships
        }
    }

    fn snapshot(id: &str, faction: &str, position: Vector3D) -> ShipSnapshot {
        ShipSnapshot {
            id: id.to_string(),
            faction: faction.to_string(),
            position,
            velocity: Vector3D::new(5.0, 0.0, 0.0),
            max_speed: 100.0,
        }
    }

    #[test]
    fn test_stop_in_place_sets_zero_velocity_and_never_fires() {
        let me = snapshot("A", "blue", Vector3D::zero());
        let world = TestWorld {
            ships: vec![snapshot("B", "red", Vector3D::new(10.0, 0.0, 0.0))],
        };
        let mut controls = ShipControls {
            desired_velocity: Vector3D::new(30.0, 0.0, 0.0),
            aim_direction: None,
            fire_desired: false,
        };

        let mut ai = StopInPlaceAi;
        ai.run(&mut AiShipReference::new(&me, &mut controls, true), &world);
        assert!(controls.desired_velocity.is_zero());
        assert!(!controls.fire_desired);
    }

    #[test]
    fn test_reference_clamps_desired_velocity() {
        let me = snapshot("A", "blue", Vector3D::zero());
        let mut controls = ShipControls::default();
        let mut reference = AiShipReference::new(&me, &mut controls, true);
        reference.set_desired_velocity(Vector3D::new(0.0, 0.0, 1000.0));
        reference.set_aim_direction(Vector3D::zero());
        assert!((controls.desired_velocity.z - 100.0).abs() < 1e-9);
        assert_eq!(controls.aim_direction, None);
    }

    #[test]
    fn test_hold_course_keeps_first_velocity() {
        let mut me = snapshot("A", "blue", Vector3D::zero());
        let world = TestWorld { ships: Vec::new() };
        let mut controls = ShipControls::default();
        let mut ai = HoldCourseAi::default();

        ai.run(&mut AiShipReference::new(&me, &mut controls, true), &world);
        me.velocity = Vector3D::new(-1.0, 0.0, 0.0);
        ai.run(&mut AiShipReference::new(&me, &mut controls, true), &world);
        assert_eq!(controls.desired_velocity, Vector3D::new(5.0, 0.0, 0.0));
    }

    #[test]
    fn test_chase_targets_nearest_enemy() {
        let me = snapshot("A", "blue", Vector3D::zero());
        let world = TestWorld {
            ships: vec![
                snapshot("F", "blue", Vector3D::new(1.0, 0.0, 0.0)),
                snapshot("FAR", "red", Vector3D::new(0.0, 5000.0, 0.0)),
                snapshot("NEAR", "red", Vector3D::new(0.0, 0.0, 400.0)),
            ],
        };
        let mut controls = ShipControls::default();
        let mut ai = ChaseAi::new(500.0, 200.0);

        ai.run(&mut AiShipReference::new(&me, &mut controls, true), &world);
        assert_eq!(controls.desired_velocity, Vector3D::new(0.0, 0.0, 100.0));
        assert_eq!(controls.aim_direction, Some(Vector3D::new(0.0, 0.0, 1.0)));
        assert!(controls.fire_desired);
    }

    #[test]
    fn test_chase_holds_fire_while_reloading_and_stops_without_enemy() {
        let me = snapshot("A", "blue", Vector3D::zero());
        let world = TestWorld {
            ships: vec![snapshot("E", "red", Vector3D::new(100.0, 0.0, 0.0))],
        };
        let mut controls = ShipControls::default();
        let mut ai = ChaseAi::new(500.0, 200.0);

        // リロード中
        ai.run(&mut AiShipReference::new(&me, &mut controls, false), &world);
        // standoff内側では敵の速度に合わせる
        assert_eq!(controls.desired_velocity, Vector3D::new(5.0, 0.0, 0.0));
        assert!(!controls.fire_desired);

        let empty = TestWorld { ships: Vec::new() };
        ai.run(&mut AiShipReference::new(&me, &mut controls, false), &empty);
        assert!(controls.desired_velocity.is_zero());
    }

    #[test]
    fn test_create_unit_ai_from_config() {
        assert_eq!(create_unit_ai(&AiConfig::StopInPlace).name(), "stop_in_place");
        assert_eq!(create_unit_ai(&AiConfig::HoldCourse).name(), "hold_course");
        let chase = create_unit_ai(&AiConfig::Chase {
            engage_range_m: 800.0,
            standoff_range_m: 200.0,
        });
        assert_eq!(chase.name(), "chase");
    }
}
