use crate::models::{
    common::Vector3D,
    ship::Ship,
    traits::{IAgent, IMovable},
};

/// 艦砲の性能（全艦共通）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeaponParameters {
    /// 弾速（発射艦の速度に加算される、m/s）
    pub bullet_speed: f64,
    /// 1発あたりのダメージ
    pub damage: u32,
    /// 弾の寿命（秒）
    pub lifetime: f64,
}

/// 弾丸
///
/// 発射元の艦IDを保持し、発射元には命中しません。
#[derive(Debug, Clone)]
pub struct Bullet {
    pub id: String,
    pub owner_id: String,
    pub position: Vector3D,
    /// 直前ティックの位置（すり抜け防止の線分判定に使用）
    pub previous_position: Vector3D,
    pub velocity: Vector3D,
    pub damage: u32,
    pub lifetime_remaining: f64,
    pub active: bool,
}

impl Bullet {
    pub fn new(
        id: String,
        owner_id: String,
        position: Vector3D,
        velocity: Vector3D,
        damage: u32,
        lifetime: f64,
    ) -> Self {
        Self {
            id,
            owner_id,
            position,
            previous_position: position,
            velocity,
            damage,
            lifetime_remaining: lifetime,
            active: lifetime > 0.0,
        }
    }

    /// 命中判定
    ///
    /// 直前ティックから現在位置までの線分と艦の当たり判定球との交差を調べます。
    pub fn hits(&self, ship: &Ship) -> bool {
        if !self.active || !ship.is_alive() || ship.id == self.owner_id {
            return false;
        }

        let segment = self.position - self.previous_position;
        let length_sq = segment.dot(&segment);
        let t = if length_sq > 0.0 {
            ((ship.position - self.previous_position).dot(&segment) / length_sq).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let closest = self.previous_position + segment * t;

        closest.distance(&ship.position) <= ship.radius
    }

    /// 命中などで消滅させる
    pub fn expire(&mut self) {
        self.active = false;
    }
}

impl IAgent for Bullet {
    fn tick(&mut self, dt: f64) {
        if !self.active {
            return;
        }

        self.move_agent(dt);
        self.lifetime_remaining = (self.lifetime_remaining - dt).max(0.0);
        if self.lifetime_remaining <= 0.0 {
            self.active = false;
        }
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

impl IMovable for Bullet {
    fn move_agent(&mut self, dt: f64) {
        self.previous_position = self.position;
        self.position = self.position + self.velocity * dt;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ship::{Pilot, ShipParameters};

    fn ship_at(id: &str, position: Vector3D) -> Ship {
        let mut ship = Ship::new(id.to_string(), "red".to_string(), position, Pilot::Player);
        ship.set_parameters(ShipParameters::default());
        ship
    }

    #[test]
    fn test_fast_bullet_does_not_tunnel_through() {
        let target = ship_at("T", Vector3D::new(50.0, 0.0, 0.0));
        let mut bullet = Bullet::new(
            "B".to_string(),
            "O".to_string(),
            Vector3D::zero(),
            Vector3D::new(1000.0, 0.0, 0.0),
            1,
            1.0,
        );
        bullet.tick(0.1);
        assert_eq!(bullet.position, Vector3D::new(100.0, 0.0, 0.0));
        assert!(bullet.hits(&target));
    }

    #[test]
    fn test_bullet_ignores_owner() {
        let owner = ship_at("O", Vector3D::zero());
        let bullet = Bullet::new(
            "B".to_string(),
            "O".to_string(),
            Vector3D::zero(),
            Vector3D::new(1.0, 0.0, 0.0),
            1,
            1.0,
        );
        assert!(!bullet.hits(&owner));
    }

    #[test]
    fn test_bullet_passes_through_owner_and_hits_next_ship() {
        // 発射元の中心から飛び出す弾の線分は発射元と前方の艦の両方に重なる
        let owner = ship_at("O", Vector3D::zero());
        let ahead = ship_at("T", Vector3D::new(40.0, 0.0, 0.0));
        let mut bullet = Bullet::new(
            "O_B001".to_string(),
            "O".to_string(),
            Vector3D::new(-5.0, 0.0, 0.0),
            Vector3D::new(1000.0, 0.0, 0.0),
            1,
            1.0,
        );
        bullet.tick(0.05);

        assert!(!bullet.hits(&owner));
        assert!(bullet.hits(&ahead));
    }

    #[test]
    fn test_bullet_expires_after_lifetime() {
        let mut bullet = Bullet::new(
            "B".to_string(),
            "O".to_string(),
            Vector3D::zero(),
            Vector3D::new(1.0, 0.0, 0.0),
            1,
            0.25,
        );
        bullet.tick(0.2);
        assert!(bullet.is_active());
        bullet.tick(0.2);
        assert!(!bullet.is_active());
    }
}
