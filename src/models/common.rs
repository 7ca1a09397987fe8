use std::ops::{Add, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

/// 3次元ベクトル（位置・速度・加速度で共用）
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3D {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3D {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// ベクトルの大きさ
    pub fn magnitude(&self) -> f64 {
        (self.x.powi(2) + self.y.powi(2) + self.z.powi(2)).sqrt()
    }

    /// 2点間の距離
    pub fn distance(&self, other: &Vector3D) -> f64 {
        (*self - *other).magnitude()
    }

    pub fn dot(&self, other: &Vector3D) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// 正規化（ゼロベクトルはそのまま返す）
    pub fn normalize(&self) -> Self {
        let mag = self.magnitude();
        if mag > 0.0 {
            Self::new(self.x / mag, self.y / mag, self.z / mag)
        } else {
            *self
        }
    }

    /// 大きさ制限（上限を超える場合は方向を保ったまま縮める）
    pub fn clamp_magnitude(&self, max: f64) -> Self {
        let mag = self.magnitude();
        if mag > max && mag > 0.0 {
            *self * (max / mag)
        } else {
            *self
        }
    }

    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }
}

impl Add for Vector3D {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl Sub for Vector3D {
    type Output = Self;

    fn sub(self, other: Self) -> Self::Output {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl Mul<f64> for Vector3D {
    type Output = Self;

    fn mul(self, scalar: f64) -> Self::Output {
        Self::new(self.x * scalar, self.y * scalar, self.z * scalar)
    }
}

impl Neg for Vector3D {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self::new(-self.x, -self.y, -self.z)
    }
}

/// 艦の状態
///
/// 生存 → 爆発中 → 撃沈 の一方向にのみ遷移します。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ShipStatus {
    /// 生存（AI・射撃・移動が有効）
    Alive,
    /// 爆発中（慣性で漂流するのみ）
    Exploding,
    /// 撃沈済み（シミュレーションから除去される）
    Dead,
}

/// 艦が退場した理由
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ShipEndReason {
    /// 被弾によって耐久値が0になった
    Destroyed,
    /// ワールド境界の外に出た
    OutOfBounds,
}

/// ワールド境界（軸平行の直方体）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldBounds {
    pub min: Vector3D,
    pub max: Vector3D,
}

impl WorldBounds {
    pub fn new(min: Vector3D, max: Vector3D) -> Self {
        Self { min, max }
    }

    /// 指定位置が境界内かどうか
    pub fn contains(&self, position: &Vector3D) -> bool {
        position.x >= self.min.x && position.x <= self.max.x &&
        position.y >= self.min.y && position.y <= self.max.y &&
        position.z >= self.min.z && position.z <= self.max.z
    }
}
