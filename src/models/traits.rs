use crate::models::common::*;
use crate::models::ship::ShipSnapshot;

/// 全てのシミュレーションオブジェクトが実装する基本インターフェース
pub trait IAgent {
    /// 1ティックの処理実行
    fn tick(&mut self, dt: f64);

    /// シミュレーション上で有効かどうか
    fn is_active(&self) -> bool;
}

/// 移動可能なオブジェクトのインターフェース
pub trait IMovable {
    /// 移動処理
    fn move_agent(&mut self, dt: f64);
}

/// 艦がユニットAIに公開するインターフェース
///
/// AIは状態の参照と、希望速度・照準方向・射撃意図の設定のみ行えます。
/// 耐久値や弾薬の増減、撃沈処理には触れられません。
pub trait ShipAiInterface {
    fn get_id(&self) -> &str;

    fn get_faction(&self) -> &str;

    fn get_position(&self) -> Vector3D;

    fn get_velocity(&self) -> Vector3D;

    /// 最大速度（m/s）
    fn get_max_speed(&self) -> f64;

    /// このティックの射撃フェーズで撃てるか（残弾あり・リロードがこのティック中に完了）
    fn can_fire(&self) -> bool;

    /// 希望速度の設定（最大速度で制限される）
    fn set_desired_velocity(&mut self, velocity: Vector3D);

    /// 照準方向の設定（ゼロベクトルは無視される）
    fn set_aim_direction(&mut self, direction: Vector3D);

    /// このティックで射撃したいことを通知
    fn mark_fire_desired(&mut self);
}

/// ユニットAIから見たワールド（読み取り専用）
pub trait WorldInterface {
    /// 現在のシミュレーション時刻（秒）
    fn current_time(&self) -> f64;

    /// ティック開始時点での生存艦のスナップショット
    fn ships(&self) -> &[ShipSnapshot];

    /// 指定勢力以外で最も近い生存艦
    fn nearest_enemy(&self, position: &Vector3D, faction: &str) -> Option<&ShipSnapshot> {
        self.ships()
            .iter()
            .filter(|s| s.faction != faction)
            .min_by(|a, b| {
                a.position.distance(position)
                    .partial_cmp(&b.position.distance(position))
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.id.cmp(&b.id))
            })
    }
}
