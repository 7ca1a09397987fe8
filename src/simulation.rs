//! # Simulation モジュール
//!
//! 宇宙戦闘シミュレーションの中核となるシミュレーションエンジンを提供します。
//!
//! 固定時間刻み（Δt）で全ての艦・弾丸・爆発を更新し、被弾判定と撃沈処理、
//! 領域外判定を行います。ユニットAIにはティック開始時点のワールドの
//! スナップショットを渡すため、処理順による先読みは発生しません。
//!
//! ## シミュレーション処理順序
//!
//! 1. **プレイヤー入力**: 時刻に達した入力スクリプトのコマンドを適用
//! 2. **ユニットAI**: 各AI艦の希望速度・射撃意図を決定
//! 3. **艦の更新**: リロードタイマ、速度・位置の積分、爆発カウントダウン
//! 4. **射撃**: 射撃意図のある艦から弾丸を生成
//! 5. **弾丸の更新**: 移動、寿命、命中判定
//! 6. **爆発の更新**: 既存の爆発の進行と撃沈艦からの爆発生成
//! 7. **後片付け**: 領域外判定と撃沈艦の除去
//!
//! ## 使用例
//!
//! ```rust,ignore
//! let config = ScenarioConfig::from_file("scenarios/fleet_battle.yaml")?;
//! let mut engine = SimulationEngine::new(config, 1);
//! engine.initialize()?;
//! engine.run()?;
//! let report = engine.report();
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;
use tracing::{debug, info, trace};

use crate::models::*;
use crate::scenario::*;

/// ユニットAIに渡すティック開始時点のワールド
pub struct WorldSnapshot {
    time: f64,
    ships: Vec<ShipSnapshot>,
}

impl WorldInterface for WorldSnapshot {
    fn current_time(&self) -> f64 {
        self.time
    }

    fn ships(&self) -> &[ShipSnapshot] {
        &self.ships
    }
}

/// 艦ごとの最終結果
#[derive(Debug, Clone, Serialize)]
pub struct ShipRecord {
    pub id: String,
    pub faction: String,
    pub pilot: String,
    pub status: ShipStatus,
    pub end_reason: Option<ShipEndReason>,
    pub health: u32,
    pub max_health: u32,
    pub ammo: u32,
    pub shots_fired: u32,
    pub killed_by: Option<String>,
    pub removed_at_s: Option<f64>,
}

impl ShipRecord {
    fn from_ship(ship: &Ship, removed_at_s: Option<f64>) -> Self {
        let killed_by = match ship.end_reason {
            Some(ShipEndReason::Destroyed) => ship.last_hit_by.clone(),
            _ => None,
        };

        Self {
            id: ship.id.clone(),
            faction: ship.faction.clone(),
            pilot: ship.pilot.label().to_string(),
            status: ship.status,
            end_reason: ship.end_reason,
            health: ship.health,
            max_health: ship.max_health,
            ammo: ship.ammo,
            shots_fired: ship.shots_fired,
            killed_by,
            removed_at_s,
        }
    }
}

/// シミュレーション結果レポート
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub scenario: String,
    pub elapsed_s: f64,
    pub steps: u64,
    pub shots_fired: u32,
    pub hits: u32,
    pub explosions: u32,
    /// 勢力ごとの撃沈数
    pub kills: BTreeMap<String, u32>,
    /// 勢力ごとの生存艦数
    pub survivors: BTreeMap<String, u32>,
    pub winner: Option<String>,
    pub ships: Vec<ShipRecord>,
}

impl SimulationReport {
    /// 結果の概要を表示
    pub fn print_summary(&self) {
        println!("=== シミュレーション結果 ===");
        println!("シナリオ: {}", self.scenario);
        println!("経過時間: {:.1}秒 ({}ステップ)", self.elapsed_s, self.steps);
        println!("発射弾数: {}  命中: {}  爆発: {}", self.shots_fired, self.hits, self.explosions);
        for (faction, count) in &self.survivors {
            let kills = self.kills.get(faction).copied().unwrap_or(0);
            println!("  {}: 生存 {}隻 / 撃沈 {}隻", faction, count, kills);
        }
        match &self.winner {
            Some(winner) => println!("勝者: {}", winner),
            None => println!("勝者: なし"),
        }
    }
}

pub struct SimulationEngine {
    pub current_time: f64,
    pub dt: f64,
    pub max_time: f64,
    pub step_count: u64,
    pub bounds: WorldBounds,
    pub weapon: WeaponParameters,

    pub ships: Vec<Ship>,
    pub bullets: Vec<Bullet>,
    pub explosions: Vec<Explosion>,
    pub player_scripts: HashMap<String, PlayerScript>,

    /// 艦ID → 勢力（除去後の撃沈集計にも使う）
    pub ship_factions: HashMap<String, String>,
    pub removed_ships: Vec<ShipRecord>,
    pub total_hits: u32,
    pub total_explosions: u32,
    pub kills: BTreeMap<String, u32>,

    pub scenario_config: ScenarioConfig,
    pub verbose_level: u8,
}

impl SimulationEngine {
    pub fn new(scenario: ScenarioConfig, verbose_level: u8) -> Self {
        let bounds = WorldBounds::new(scenario.world.bounds_min, scenario.world.bounds_max);
        let weapon = WeaponParameters {
            bullet_speed: scenario.weapons.bullet_speed_mps,
            damage: scenario.weapons.damage,
            lifetime: scenario.weapons.lifetime_s,
        };

        Self {
            current_time: 0.0,
            dt: scenario.sim.dt_s,
            max_time: scenario.sim.t_max_s,
            step_count: 0,
            bounds,
            weapon,
            ships: Vec::new(),
            bullets: Vec::new(),
            explosions: Vec::new(),
            player_scripts: HashMap::new(),
            ship_factions: HashMap::new(),
            removed_ships: Vec::new(),
            total_hits: 0,
            total_explosions: 0,
            kills: BTreeMap::new(),
            scenario_config: scenario,
            verbose_level,
        }
    }

    pub fn initialize(&mut self) -> Result<(), ScenarioError> {
        self.scenario_config.validate()?;

        if self.verbose_level > 0 {
            info!("シミュレーションエンジンを初期化中...");
        }

        for ship_config in &self.scenario_config.ships {
            let ship = build_ship(ship_config, &self.scenario_config.explosion);

            if let PilotConfig::Player { script } = &ship_config.pilot {
                self.player_scripts.insert(ship.id.clone(), build_player_script(script));
            }

            if self.verbose_level > 1 {
                debug!("艦初期化: {} ({}, 操縦: {}, 耐久: {}, 弾数: {})",
                       ship.id, ship.faction, ship.pilot.label(), ship.health, ship.ammo);
            }

            self.ship_factions.insert(ship.id.clone(), ship.faction.clone());
            self.ships.push(ship);
        }

        for faction in self.scenario_config.factions() {
            self.kills.insert(faction.to_string(), 0);
        }

        if self.verbose_level > 0 {
            info!("初期化完了: 艦 {}隻 / 勢力 {}", self.ships.len(), self.kills.len());
        }

        Ok(())
    }

    pub fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("=== シミュレーション実行開始 ===");

        while self.current_time + 1e-9 < self.max_time {
            self.step();

            if self.verbose_level > 2 {
                trace!("時刻: {:.2}秒 (ステップ: {})", self.current_time, self.step_count);
            }

            if self.step_count % 100 == 0 && self.verbose_level > 0 {
                let progress = (self.current_time / self.max_time) * 100.0;
                info!("進行状況: {:.1}% ({:.1}/{:.1}秒) 艦: {} 弾: {}",
                      progress, self.current_time, self.max_time, self.ships.len(), self.bullets.len());
            }

            if self.is_finished() {
                info!("決着: 残存勢力 {:?}", self.alive_factions());
                break;
            }
        }

        info!("=== シミュレーション完了 ===");
        info!("実行時間: {:.1}秒", self.current_time);
        info!("総ステップ数: {}", self.step_count);

        Ok(())
    }

    pub fn step(&mut self) {
        self.apply_player_commands();
        self.process_ship_ai();
        self.process_ships();
        self.process_weapons();
        self.process_bullets();
        self.process_explosions();
        self.process_cleanup();

        self.current_time += self.dt;
        self.step_count += 1;
    }

    fn apply_player_commands(&mut self) {
        for ship in &mut self.ships {
            let Some(script) = self.player_scripts.get_mut(&ship.id) else {
                continue;
            };
            if let Some(command) = script.poll(self.current_time) {
                trace!("{} プレイヤー入力: {:?}", ship.id, command);
                ship.apply_player_command(&command);
            }
        }
    }

    fn process_ship_ai(&mut self) {
        let world = WorldSnapshot {
            time: self.current_time,
            ships: self.ships.iter().filter(|s| s.is_alive()).map(Ship::snapshot).collect(),
        };

        for ship in &mut self.ships {
            ship.think(&world, self.dt);
        }
    }

    fn process_ships(&mut self) {
        for ship in &mut self.ships {
            ship.tick(self.dt);
        }
    }

    fn process_weapons(&mut self) {
        for ship in &mut self.ships {
            if let Some(bullet) = ship.try_fire(&self.weapon) {
                self.bullets.push(bullet);
            }
        }
    }

    fn process_bullets(&mut self) {
        for bullet in &mut self.bullets {
            bullet.tick(self.dt);
            if !bullet.is_active() {
                continue;
            }

            let origin = bullet.previous_position;
            let target = self.ships
                .iter_mut()
                .filter(|s| bullet.hits(s))
                .min_by(|a, b| {
                    a.position.distance(&origin)
                        .partial_cmp(&b.position.distance(&origin))
                        .unwrap_or(std::cmp::Ordering::Equal)
                });

            if let Some(ship) = target {
                ship.take_damage(bullet.damage, &bullet.owner_id);
                bullet.expire();
                self.total_hits += 1;
                debug!("{} 命中: {} (残り耐久 {})", bullet.id, ship.id, ship.health);

                // 味方撃ちによる撃沈は撃沈数に数えない
                if !ship.is_alive() {
                    match self.ship_factions.get(&bullet.owner_id) {
                        Some(faction) if *faction != ship.faction => {
                            *self.kills.entry(faction.clone()).or_insert(0) += 1;
                        }
                        Some(_) => debug!("{} 味方撃ち: {}", bullet.owner_id, ship.id),
                        None => {}
                    }
                }
            }
        }

        let bounds = self.bounds;
        self.bullets.retain(|b| b.is_active() && bounds.contains(&b.position));
    }

    fn process_explosions(&mut self) {
        for explosion in &mut self.explosions {
            explosion.tick(self.dt);
        }
        self.explosions.retain(|e| e.is_active());

        for ship in &mut self.ships {
            if let Some(explosion) = ship.take_explosion() {
                debug!("爆発発生: {} 位置 ({:.0}, {:.0}, {:.0}) 半径 {:.0}m, {:.1}秒",
                       explosion.id, explosion.position.x, explosion.position.y, explosion.position.z,
                       explosion.radius, explosion.duration);
                self.total_explosions += 1;
                self.explosions.push(explosion);
            }
        }
    }

    fn process_cleanup(&mut self) {
        for ship in &mut self.ships {
            ship.check_out_of_bounds(&self.bounds);
        }

        let (removed, remaining): (Vec<Ship>, Vec<Ship>) =
            std::mem::take(&mut self.ships).into_iter().partition(|s| !s.is_active());
        self.ships = remaining;

        for ship in removed {
            debug!("{} 除去 ({:?})", ship.id, ship.end_reason);
            self.player_scripts.remove(&ship.id);
            self.removed_ships.push(ShipRecord::from_ship(&ship, Some(self.current_time)));
        }
    }

    /// 生存艦の勢力
    pub fn alive_factions(&self) -> BTreeSet<&str> {
        self.ships
            .iter()
            .filter(|s| s.is_alive())
            .map(|s| s.faction.as_str())
            .collect()
    }

    /// 終了判定
    ///
    /// 複数勢力で始まったシナリオで生存勢力が1つ以下になり、爆発中の艦も残っていなければ終了します。
    pub fn is_finished(&self) -> bool {
        if !self.scenario_config.sim.stop_when_one_faction_left || self.kills.len() < 2 {
            return false;
        }

        let exploding = self.ships.iter().any(|s| s.status == ShipStatus::Exploding);
        self.alive_factions().len() <= 1 && !exploding
    }

    /// 結果レポートを作成
    pub fn report(&self) -> SimulationReport {
        let mut ships: Vec<ShipRecord> = self.removed_ships.clone();
        ships.extend(self.ships.iter().map(|s| ShipRecord::from_ship(s, None)));
        ships.sort_by(|a, b| a.id.cmp(&b.id));

        let mut survivors: BTreeMap<String, u32> =
            self.kills.keys().map(|f| (f.clone(), 0)).collect();
        for ship in self.ships.iter().filter(|s| s.is_alive()) {
            *survivors.entry(ship.faction.clone()).or_insert(0) += 1;
        }

        let alive = self.alive_factions();
        let winner = if alive.len() == 1 && self.kills.len() > 1 {
            alive.iter().next().map(|f| f.to_string())
        } else {
            None
        };

        SimulationReport {
            scenario: self.scenario_config.meta.name.clone(),
            elapsed_s: self.current_time,
            steps: self.step_count,
            shots_fired: ships.iter().map(|s| s.shots_fired).sum(),
            hits: self.total_hits,
            explosions: self.total_explosions,
            kills: self.kills.clone(),
            survivors,
            winner,
            ships,
        }
    }
}

/// シナリオの艦設定から艦を生成
fn build_ship(config: &ShipConfig, explosion: &ExplosionConfig) -> Ship {
    let pilot = match &config.pilot {
        PilotConfig::Player { .. } => Pilot::Player,
        PilotConfig::Ai { ai } => Pilot::Ai(create_unit_ai(ai)),
    };

    let mut ship = Ship::new(config.id.clone(), config.faction.clone(), config.position, pilot);
    ship.velocity = config.velocity;
    ship.set_parameters(ShipParameters {
        health: config.health,
        ammo: config.ammo,
        reload_time: config.reload_time_s,
        max_speed: config.max_speed_mps,
        max_accel: config.max_accel_mps2,
        radius: config.radius_m,
        explosion_duration: explosion.duration_s,
        explosion_radius: config.radius_m * explosion.radius_scale,
    });
    ship
}

fn build_player_script(script: &[PlayerCommandConfig]) -> PlayerScript {
    PlayerScript::new(
        script
            .iter()
            .map(|c| {
                (
                    c.time_s,
                    PlayerCommand {
                        desired_velocity: c.velocity,
                        aim_direction: c.aim,
                        fire: c.fire,
                    },
                )
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario(bounds: f64, t_max: f64, ships: &str) -> ScenarioConfig {
        let yaml = format!(
            r#"
meta:
  version: "1.0"
  name: test
sim:
  dt_s: 0.1
  t_max_s: {t_max}
world:
  bounds_min: {{ x: -{bounds}, y: -{bounds}, z: -{bounds} }}
  bounds_max: {{ x: {bounds}, y: {bounds}, z: {bounds} }}
weapons:
  bullet_speed_mps: 1000.0
  damage: 1
  lifetime_s: 2.0
explosion:
  duration_s: 0.5
  radius_scale: 3.0
ships:
{ships}
"#
        );
        ScenarioConfig::from_yaml_str(&yaml).expect("valid test scenario")
    }

    fn ship_yaml(id: &str, faction: &str, x: f64, vx: f64, health: u32, pilot: &str) -> String {
        format!(
            r#"  - id: {id}
    faction: {faction}
    position: {{ x: {x}, y: 0.0, z: 0.0 }}
    velocity: {{ x: {vx}, y: 0.0, z: 0.0 }}
    health: {health}
    ammo: 10
    reload_time_s: 0.2
    max_speed_mps: 100.0
    max_accel_mps2: 10.0
    radius_m: 10.0
    pilot:
{pilot}
"#
        )
    }

    const STOP: &str = "      type: ai\n      ai:\n        type: stop_in_place";
    const HOLD: &str = "      type: ai\n      ai:\n        type: hold_course";
    const CHASE: &str = "      type: ai\n      ai:\n        type: chase\n        engage_range_m: 800.0\n        standoff_range_m: 200.0";
    const GUNNER: &str = "      type: player\n      script:\n        - time_s: 0.0\n          velocity: { x: 0.0, y: 0.0, z: 0.0 }\n          aim: { x: 1.0, y: 0.0, z: 0.0 }\n          fire: true";

    fn run(config: ScenarioConfig) -> SimulationEngine {
        let mut engine = SimulationEngine::new(config, 0);
        engine.initialize().expect("initialize");
        engine.run().expect("run");
        engine
    }

    #[test]
    fn test_stop_in_place_fleet_comes_to_rest() {
        let ships = [
            ship_yaml("B1", "blue", -100.0, -20.0, 3, STOP),
            ship_yaml("R1", "red", 100.0, 20.0, 3, STOP),
        ]
        .concat();
        let engine = run(scenario(10000.0, 5.0, &ships));

        assert_eq!(engine.ships.len(), 2);
        for ship in &engine.ships {
            assert!(ship.velocity.is_zero());
            assert_eq!(ship.shots_fired, 0);
        }
        assert!(engine.bullets.is_empty());

        let report = engine.report();
        assert_eq!(report.winner, None);
        assert_eq!(report.survivors.get("blue"), Some(&1));
        assert_eq!(report.steps, 50);
    }

    #[test]
    fn test_player_destroys_stationary_target() {
        let ships = [
            ship_yaml("P1", "blue", 0.0, 0.0, 3, GUNNER),
            ship_yaml("T1", "red", 500.0, 0.0, 2, STOP),
        ]
        .concat();
        let engine = run(scenario(10000.0, 20.0, &ships));

        let report = engine.report();
        assert_eq!(report.winner.as_deref(), Some("blue"));
        assert!(report.elapsed_s < 20.0);
        assert_eq!(report.hits, 2);
        assert_eq!(report.explosions, 1);
        assert_eq!(report.kills.get("blue"), Some(&1));
        assert_eq!(report.kills.get("red"), Some(&0));

        let target = report.ships.iter().find(|s| s.id == "T1").expect("T1 record");
        assert_eq!(target.status, ShipStatus::Dead);
        assert_eq!(target.end_reason, Some(ShipEndReason::Destroyed));
        assert_eq!(target.killed_by.as_deref(), Some("P1"));
        assert_eq!(target.health, 0);

        let player = report.ships.iter().find(|s| s.id == "P1").expect("P1 record");
        assert_eq!(player.status, ShipStatus::Alive);
        // 弾は発射元の当たり判定球の表面から出るが、発射元には命中しない
        assert_eq!(player.health, player.max_health);
        assert_eq!(player.pilot, "player");
        assert!(player.shots_fired >= 2);
    }

    #[test]
    fn test_ship_leaving_bounds_is_removed() {
        let ships = [
            ship_yaml("B1", "blue", 0.0, 0.0, 3, STOP),
            ship_yaml("R1", "red", 90.0, 50.0, 3, HOLD),
        ]
        .concat();
        let engine = run(scenario(100.0, 10.0, &ships));

        let report = engine.report();
        let runaway = report.ships.iter().find(|s| s.id == "R1").expect("R1 record");
        assert_eq!(runaway.end_reason, Some(ShipEndReason::OutOfBounds));
        assert_eq!(runaway.killed_by, None);
        assert_eq!(report.explosions, 0);
        assert_eq!(report.winner.as_deref(), Some("blue"));
    }

    #[test]
    fn test_chase_ai_fires_once_per_reload_interval() {
        let chaser = ship_yaml("C1", "blue", 0.0, 0.0, 3, CHASE).replace("reload_time_s: 0.2", "reload_time_s: 0.5");
        let target = ship_yaml("T1", "red", 300.0, 0.0, 1000, STOP);
        let engine = run(scenario(10000.0, 3.0, &[chaser, target].concat()));

        let report = engine.report();
        assert_eq!(report.steps, 30);
        let chaser = report.ships.iter().find(|s| s.id == "C1").expect("C1 record");
        // t_max 3.0秒 / reload 0.5秒
        assert_eq!(chaser.shots_fired, 6);
        assert_eq!(chaser.ammo, 4);

        let target = report.ships.iter().find(|s| s.id == "T1").expect("T1 record");
        assert_eq!(target.status, ShipStatus::Alive);
        assert_eq!(report.hits, 6);
        assert_eq!(target.health, 1000 - report.hits);
    }

    #[test]
    fn test_friendly_kill_not_credited() {
        let ships = [
            ship_yaml("P1", "blue", 0.0, 0.0, 3, GUNNER),
            ship_yaml("T1", "blue", 500.0, 0.0, 2, STOP),
            ship_yaml("R1", "red", -3000.0, 0.0, 3, STOP),
        ]
        .concat();
        let engine = run(scenario(10000.0, 5.0, &ships));

        let report = engine.report();
        let victim = report.ships.iter().find(|s| s.id == "T1").expect("T1 record");
        assert_eq!(victim.end_reason, Some(ShipEndReason::Destroyed));
        assert_eq!(victim.killed_by.as_deref(), Some("P1"));
        assert_eq!(report.explosions, 1);
        assert_eq!(report.kills.get("blue"), Some(&0));
        assert_eq!(report.kills.get("red"), Some(&0));
        assert_eq!(report.winner, None);
    }

    #[test]
    fn test_bundled_fleet_battle_runs() {
        let config = ScenarioConfig::from_yaml_str(include_str!("../scenarios/fleet_battle.yaml"))
            .expect("fleet_battle.yaml");
        let engine = run(config);
        let report = engine.report();

        assert!(report.steps > 0);
        assert_eq!(report.ships.len(), 5);
        assert!(report.hits <= report.shots_fired);

        let destroyed: Vec<&ShipRecord> = report
            .ships
            .iter()
            .filter(|s| s.end_reason == Some(ShipEndReason::Destroyed))
            .collect();
        assert_eq!(report.explosions as usize, destroyed.len());
        for record in &destroyed {
            assert_eq!(record.health, 0);
            assert!(record.killed_by.is_some());
        }

        let credited: u32 = report.kills.values().sum();
        assert!(credited as usize <= destroyed.len());
        for record in report.ships.iter().filter(|s| s.status == ShipStatus::Alive) {
            assert!(record.health > 0);
        }
    }

    #[test]
    fn test_single_step_advances_clock() {
        let ships = [
            ship_yaml("B1", "blue", 0.0, 0.0, 3, STOP),
            ship_yaml("R1", "red", 300.0, 0.0, 3, STOP),
        ]
        .concat();
        let mut engine = SimulationEngine::new(scenario(10000.0, 1.0, &ships), 0);
        engine.initialize().expect("initialize");
        engine.step();

        assert_eq!(engine.step_count, 1);
        assert!((engine.current_time - 0.1).abs() < 1e-9);
        assert!(!engine.is_finished());
        assert_eq!(engine.alive_factions().len(), 2);
    }
}
