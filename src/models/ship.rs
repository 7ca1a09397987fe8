use tracing::{debug, info};

use crate::models::{
    bullet::{Bullet, WeaponParameters},
    common::{ShipEndReason, ShipStatus, Vector3D, WorldBounds},
    explosion::Explosion,
    traits::{IAgent, IMovable, WorldInterface},
    unit_ai::{AiShipReference, UnitAi},
};

/// リロード残り時間がこれ未満なら完了とみなす
const RELOAD_EPSILON: f64 = 1e-9;

/// 艦の操縦者
#[derive(Debug)]
pub enum Pilot {
    /// プレイヤー操作（入力スクリプトからコマンドを受け取る）
    Player,
    /// ユニットAIによる自律操作
    Ai(Box<dyn UnitAi>),
}

impl Pilot {
    /// 操縦者の表示名
    pub fn label(&self) -> &'static str {
        match self {
            Pilot::Player => "player",
            Pilot::Ai(ai) => ai.name(),
        }
    }
}

/// プレイヤーからの操作コマンド
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerCommand {
    pub desired_velocity: Vector3D,
    pub aim_direction: Option<Vector3D>,
    pub fire: bool,
}

/// 操縦者が設定する制御出力
///
/// ユニットAIはこの構造体だけを書き換えられます。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ShipControls {
    /// 希望速度（m/s）
    pub desired_velocity: Vector3D,
    /// 照準方向（未設定なら進行方向）
    pub aim_direction: Option<Vector3D>,
    /// 射撃意図フラグ
    pub fire_desired: bool,
}

/// ティック開始時点の艦の状態（AIとワールドビュー用の読み取り専用コピー）
#[derive(Debug, Clone, PartialEq)]
pub struct ShipSnapshot {
    pub id: String,
    pub faction: String,
    pub position: Vector3D,
    pub velocity: Vector3D,
    pub max_speed: f64,
}

/// 艦の性能パラメータ
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShipParameters {
    /// 耐久値
    pub health: u32,
    /// 搭載弾数
    pub ammo: u32,
    /// 射撃後のリロード時間（秒）
    pub reload_time: f64,
    /// 最大速度（m/s）
    pub max_speed: f64,
    /// 最大加速度（m/s²）
    pub max_accel: f64,
    /// 当たり判定半径（m）
    pub radius: f64,
    /// 撃沈時の爆発継続時間（秒）
    pub explosion_duration: f64,
    /// 爆発半径（m）
    pub explosion_radius: f64,
}

impl Default for ShipParameters {
    fn default() -> Self {
        Self {
            health: 3,
            ammo: 20,
            reload_time: 0.5,
            max_speed: 100.0,
            max_accel: 20.0,
            radius: 10.0,
            explosion_duration: 1.0,
            explosion_radius: 30.0,
        }
    }
}

/// 艦エージェント
///
/// 耐久値・弾薬・リロードタイマ・機動制限を持ち、毎ティック操縦者（プレイヤーまたはユニットAI）の
/// 希望速度に向けて加速度制限つきで速度を積分します。耐久値が0になると爆発中状態に入り、
/// 爆発継続時間の経過後に撃沈状態となってシミュレーションから除去されます。
#[derive(Debug)]
pub struct Ship {
    pub id: String,
    pub faction: String,
    pub position: Vector3D,
    pub velocity: Vector3D,
    /// 機首方向（単位ベクトル）
    pub heading: Vector3D,
    pub radius: f64,

    pub health: u32,
    pub max_health: u32,
    pub ammo: u32,
    pub reload_time: f64,
    pub reload_remaining: f64,
    pub max_speed: f64,
    pub max_accel: f64,

    pub controls: ShipControls,
    pub pilot: Pilot,

    pub status: ShipStatus,
    pub end_reason: Option<ShipEndReason>,
    pub explosion_duration: f64,
    pub explosion_radius: f64,
    pub explosion_remaining: f64,
    /// 未発行の爆発があるか（撃沈時に1回だけtrueになる）
    pub explosion_pending: bool,

    /// 発射した弾数
    pub shots_fired: u32,
    /// 最後に被弾した弾の発射元
    pub last_hit_by: Option<String>,
}

impl Ship {
    /// 新しい艦を作成（性能値は set_parameters で設定）
    pub fn new(id: String, faction: String, position: Vector3D, pilot: Pilot) -> Self {
        Self {
            id,
            faction,
            position,
            velocity: Vector3D::zero(),
            heading: Vector3D::new(1.0, 0.0, 0.0),
            radius: 0.0,                        // set_parametersで設定
            health: 0,                          // set_parametersで設定
            max_health: 0,                      // set_parametersで設定
            ammo: 0,                            // set_parametersで設定
            reload_time: 0.0,                   // set_parametersで設定
            reload_remaining: 0.0,
            max_speed: 0.0,                     // set_parametersで設定
            max_accel: 0.0,                     // set_parametersで設定
            controls: ShipControls::default(),
            pilot,
            status: ShipStatus::Alive,
            end_reason: None,
            explosion_duration: 0.0,            // set_parametersで設定
            explosion_radius: 0.0,              // set_parametersで設定
            explosion_remaining: 0.0,
            explosion_pending: false,
            shots_fired: 0,
            last_hit_by: None,
        }
    }

    /// 性能パラメータを設定
    ///
    /// 希望速度は現在の速度で初期化されるため、操縦者が何もしなければ等速で進み続けます。
    pub fn set_parameters(&mut self, params: ShipParameters) {
        self.health = params.health;
        self.max_health = params.health;
        self.ammo = params.ammo;
        self.reload_time = params.reload_time.max(0.0);
        self.reload_remaining = 0.0;
        self.max_speed = params.max_speed;
        self.max_accel = params.max_accel.max(0.0);
        self.radius = params.radius;
        self.explosion_duration = params.explosion_duration.max(0.0);
        self.explosion_radius = params.explosion_radius;

        self.velocity = self.velocity.clamp_magnitude(self.max_speed);
        self.controls.desired_velocity = self.velocity;
        if !self.velocity.is_zero() {
            self.heading = self.velocity.normalize();
        }
    }

    pub fn is_alive(&self) -> bool {
        self.status == ShipStatus::Alive
    }

    pub fn is_player(&self) -> bool {
        matches!(self.pilot, Pilot::Player)
    }

    /// リロードが完了し残弾がある
    pub fn can_fire(&self) -> bool {
        self.is_alive() && self.ammo > 0 && self.reload_remaining <= 0.0
    }

    pub fn snapshot(&self) -> ShipSnapshot {
        ShipSnapshot {
            id: self.id.clone(),
            faction: self.faction.clone(),
            position: self.position,
            velocity: self.velocity,
            max_speed: self.max_speed,
        }
    }

    /// 次の dt 秒の間にリロードが終わり、射撃フェーズで撃てるか
    fn ready_to_fire_within(&self, dt: f64) -> bool {
        self.is_alive() && self.ammo > 0 && self.reload_remaining - dt < RELOAD_EPSILON
    }

    /// ユニットAIの実行
    ///
    /// AI操縦かつ生存中の場合のみ実行します。射撃意図は毎ティックAIが改めて立てる必要があります。
    /// AIから見た射撃可否は、このティックの tick(dt) でリロードが進んだ後の状態です。
    pub fn think(&mut self, world: &dyn WorldInterface, dt: f64) {
        if !self.is_alive() {
            return;
        }

        let snapshot = self.snapshot();
        let fire_ready = self.ready_to_fire_within(dt);
        if let Pilot::Ai(ai) = &mut self.pilot {
            self.controls.fire_desired = false;
            let mut reference = AiShipReference::new(&snapshot, &mut self.controls, fire_ready);
            ai.run(&mut reference, world);
        }
    }

    /// プレイヤーコマンドの適用
    ///
    /// 射撃指示は次のコマンドが来るまで保持されます（トリガーを引き続けている状態）。
    pub fn apply_player_command(&mut self, command: &PlayerCommand) {
        if !self.is_alive() || !self.is_player() {
            return;
        }

        self.controls.desired_velocity = command.desired_velocity.clamp_magnitude(self.max_speed);
        if let Some(aim) = command.aim_direction {
            if !aim.is_zero() {
                self.controls.aim_direction = Some(aim.normalize());
            }
        }
        self.controls.fire_desired = command.fire;
    }

    /// 射撃処理
    ///
    /// 生存中・射撃意図あり・リロード完了・残弾ありの場合のみ弾を生成します。
    /// 弾は機首方向へ、艦の速度に弾速を加えた速度で発射されます。
    pub fn try_fire(&mut self, weapon: &WeaponParameters) -> Option<Bullet> {
        if !self.controls.fire_desired || !self.can_fire() {
            return None;
        }

        self.ammo -= 1;
        self.reload_remaining = self.reload_time;
        self.shots_fired += 1;

        let bullet_id = format!("{}_B{:03}", self.id, self.shots_fired);
        let muzzle = self.position + self.heading * self.radius;
        let bullet = Bullet::new(
            bullet_id,
            self.id.clone(),
            muzzle,
            self.velocity + self.heading * weapon.bullet_speed,
            weapon.damage,
            weapon.lifetime,
        );

        debug!("{} 射撃: {} (残弾 {})", self.id, bullet.id, self.ammo);
        Some(bullet)
    }

    /// 被弾処理
    ///
    /// 耐久値は0未満にならず、0になった時点で爆発シーケンスを開始します。
    pub fn take_damage(&mut self, damage: u32, attacker_id: &str) {
        if !self.is_alive() {
            return;
        }

        self.health = self.health.saturating_sub(damage);
        self.last_hit_by = Some(attacker_id.to_string());

        if self.health == 0 {
            self.begin_explosion();
        }
    }

    fn begin_explosion(&mut self) {
        self.status = ShipStatus::Exploding;
        self.end_reason = Some(ShipEndReason::Destroyed);
        self.explosion_remaining = self.explosion_duration;
        self.explosion_pending = true;
        self.controls = ShipControls::default();
        // 継続時間0なら爆発中を経ずに撃沈（爆発自体は1回発行される）
        if self.explosion_duration <= 0.0 {
            self.status = ShipStatus::Dead;
        }

        info!("{} 撃沈 (攻撃元: {})", self.id, self.last_hit_by.as_deref().unwrap_or("不明"));
    }

    /// 撃沈時の爆発を取り出す（撃沈ごとに1回のみ Some を返す）
    pub fn take_explosion(&mut self) -> Option<Explosion> {
        if !self.explosion_pending {
            return None;
        }
        self.explosion_pending = false;

        Some(Explosion::new(
            format!("{}_X", self.id),
            self.position,
            self.explosion_radius,
            self.explosion_duration,
        ))
    }

    /// 領域外判定
    ///
    /// 生存中に境界を出た艦は爆発せずに除去されます。爆発中の残骸は継続時間が過ぎるまで残ります。
    pub fn check_out_of_bounds(&mut self, bounds: &WorldBounds) {
        if !self.is_alive() || bounds.contains(&self.position) {
            return;
        }

        self.status = ShipStatus::Dead;
        self.end_reason = Some(ShipEndReason::OutOfBounds);
        info!("{} 領域外へ離脱", self.id);
    }

    /// 希望速度に向けた操舵
    fn steer(&mut self, dt: f64) {
        let desired = self.controls.desired_velocity.clamp_magnitude(self.max_speed);
        let delta_v = (desired - self.velocity).clamp_magnitude(self.max_accel * dt);
        self.velocity = (self.velocity + delta_v).clamp_magnitude(self.max_speed);

        if let Some(aim) = self.controls.aim_direction {
            self.heading = aim;
        } else if !self.velocity.is_zero() {
            self.heading = self.velocity.normalize();
        }
    }
}

impl IAgent for Ship {
    fn tick(&mut self, dt: f64) {
        match self.status {
            ShipStatus::Alive => {
                self.reload_remaining = (self.reload_remaining - dt).max(0.0);
                if self.reload_remaining < RELOAD_EPSILON {
                    self.reload_remaining = 0.0;
                }
                self.steer(dt);
                self.move_agent(dt);
            }
            ShipStatus::Exploding => {
                // 残骸は慣性で漂流
                self.move_agent(dt);
                self.explosion_remaining = (self.explosion_remaining - dt).max(0.0);
                if self.explosion_remaining <= 0.0 {
                    self.status = ShipStatus::Dead;
                }
            }
            ShipStatus::Dead => {}
        }
    }

    fn is_active(&self) -> bool {
        self.status != ShipStatus::Dead
    }
}

impl IMovable for Ship {
    fn move_agent(&mut self, dt: f64) {
        self.position = self.position + self.velocity * dt;
    }
}
