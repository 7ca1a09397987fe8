use crate::models::{common::Vector3D, traits::IAgent};

/// 撃沈時に発生する爆発エフェクト
///
/// 当たり判定は持たず、継続時間が過ぎると除去されます。
#[derive(Debug, Clone)]
pub struct Explosion {
    pub id: String,
    pub position: Vector3D,
    pub radius: f64,
    pub duration: f64,
    pub elapsed: f64,
}

impl Explosion {
    pub fn new(id: String, position: Vector3D, radius: f64, duration: f64) -> Self {
        Self {
            id,
            position,
            radius,
            duration,
            elapsed: 0.0,
        }
    }
}

impl IAgent for Explosion {
    fn tick(&mut self, dt: f64) {
        self.elapsed += dt;
    }

    fn is_active(&self) -> bool {
        self.elapsed < self.duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explosion_lifecycle() {
        let mut explosion = Explosion::new("X".to_string(), Vector3D::zero(), 30.0, 1.0);
        assert!(explosion.is_active());
        explosion.tick(0.5);
        assert!(explosion.is_active());
        explosion.tick(0.5);
        assert!(!explosion.is_active());
    }
}
