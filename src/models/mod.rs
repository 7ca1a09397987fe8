// 基本的なデータ型と数学ユーティリティ
pub mod common;

// 基本インターフェース（trait）定義
pub mod traits;

// 各シミュレーションオブジェクトの実装
pub mod ship;
pub mod unit_ai;
pub mod player;
pub mod bullet;
pub mod explosion;

// 便利な re-export
pub use common::*;
pub use traits::*;
pub use ship::{Pilot, PlayerCommand, Ship, ShipParameters, ShipSnapshot};
pub use unit_ai::create_unit_ai;
pub use player::PlayerScript;
pub use bullet::{Bullet, WeaponParameters};
pub use explosion::Explosion;
