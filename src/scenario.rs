use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::models::Vector3D;

/// シナリオメタデータ
#[derive(Debug, Deserialize, Serialize)]
pub struct ScenarioMeta {
    pub version: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// シミュレーション設定
#[derive(Debug, Deserialize, Serialize)]
pub struct SimulationConfig {
    pub dt_s: f64,
    pub t_max_s: f64,
    /// 生存艦の勢力が1つ以下になったら終了する
    #[serde(default = "default_true")]
    pub stop_when_one_faction_left: bool,
}

fn default_true() -> bool {
    true
}

/// 世界設定
#[derive(Debug, Deserialize, Serialize)]
pub struct WorldConfig {
    pub bounds_min: Vector3D,
    pub bounds_max: Vector3D,
}

/// 艦砲設定（全艦共通）
#[derive(Debug, Deserialize, Serialize)]
pub struct WeaponConfig {
    pub bullet_speed_mps: f64,
    pub damage: u32,
    pub lifetime_s: f64,
}

/// 爆発設定
#[derive(Debug, Deserialize, Serialize)]
pub struct ExplosionConfig {
    pub duration_s: f64,
    /// 艦の当たり判定半径に対する爆発半径の倍率
    pub radius_scale: f64,
}

/// ユニットAIの種類
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AiConfig {
    StopInPlace,
    HoldCourse,
    Chase {
        engage_range_m: f64,
        standoff_range_m: f64,
    },
}

/// プレイヤー入力スクリプトの1コマンド
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PlayerCommandConfig {
    pub time_s: f64,
    pub velocity: Vector3D,
    #[serde(default)]
    pub aim: Option<Vector3D>,
    #[serde(default)]
    pub fire: bool,
}

/// 操縦者設定
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PilotConfig {
    Player {
        #[serde(default)]
        script: Vec<PlayerCommandConfig>,
    },
    Ai {
        ai: AiConfig,
    },
}

/// 艦設定
#[derive(Debug, Deserialize, Serialize)]
pub struct ShipConfig {
    pub id: String,
    pub faction: String,
    pub position: Vector3D,
    #[serde(default)]
    pub velocity: Vector3D,
    pub health: u32,
    pub ammo: u32,
    pub reload_time_s: f64,
    pub max_speed_mps: f64,
    pub max_accel_mps2: f64,
    pub radius_m: f64,
    pub pilot: PilotConfig,
}

/// 完全なシナリオ設定
#[derive(Debug, Deserialize, Serialize)]
pub struct ScenarioConfig {
    pub meta: ScenarioMeta,
    pub sim: SimulationConfig,
    pub world: WorldConfig,
    pub weapons: WeaponConfig,
    pub explosion: ExplosionConfig,
    pub ships: Vec<ShipConfig>,
}

impl ScenarioConfig {
    /// YAMLファイルからシナリオ設定を読み込み
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.to_path_buf()));
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| ScenarioError::IoError(path.to_path_buf(), e))?;

        let config: ScenarioConfig = serde_yaml::from_str(&contents)
            .map_err(|e| ScenarioError::ParseError(path.to_path_buf(), e))?;

        config.validate()?;

        Ok(config)
    }

    /// YAML文字列からシナリオ設定を読み込み（組み込みシナリオ用）
    pub fn from_yaml_str(contents: &str) -> Result<Self, ScenarioError> {
        let config: ScenarioConfig = serde_yaml::from_str(contents)
            .map_err(|e| ScenarioError::ParseError("<inline>".into(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// 設定の検証
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.sim.dt_s <= 0.0 {
            return Err(ScenarioError::ValidationError("dt_s must be positive".to_string()));
        }
        if self.sim.t_max_s <= 0.0 {
            return Err(ScenarioError::ValidationError("t_max_s must be positive".to_string()));
        }

        let (min, max) = (&self.world.bounds_min, &self.world.bounds_max);
        if min.x >= max.x || min.y >= max.y || min.z >= max.z {
            return Err(ScenarioError::ValidationError("Invalid world bounds".to_string()));
        }

        if self.weapons.bullet_speed_mps <= 0.0 || self.weapons.lifetime_s <= 0.0 {
            return Err(ScenarioError::ValidationError(
                "bullet_speed_mps and lifetime_s must be positive".to_string(),
            ));
        }
        if self.explosion.duration_s < 0.0 || self.explosion.radius_scale < 0.0 {
            return Err(ScenarioError::ValidationError(
                "explosion duration_s and radius_scale must be non-negative".to_string(),
            ));
        }

        if self.ships.is_empty() {
            return Err(ScenarioError::ValidationError("No ships defined".to_string()));
        }

        let mut ids = HashSet::new();
        for ship in &self.ships {
            if !ids.insert(ship.id.as_str()) {
                return Err(ScenarioError::ValidationError(format!("Duplicate ship id {}", ship.id)));
            }
            self.validate_ship(ship)?;
        }

        Ok(())
    }

    fn validate_ship(&self, ship: &ShipConfig) -> Result<(), ScenarioError> {
        let invalid = |msg: &str| ScenarioError::ValidationError(format!("Ship {}: {}", ship.id, msg));

        if !self.is_position_in_bounds(&ship.position) {
            return Err(invalid("position outside world bounds"));
        }
        if ship.health == 0 {
            return Err(invalid("health must be positive"));
        }
        if ship.max_speed_mps <= 0.0 {
            return Err(invalid("max_speed_mps must be positive"));
        }
        if ship.max_accel_mps2 < 0.0 || ship.reload_time_s < 0.0 {
            return Err(invalid("max_accel_mps2 and reload_time_s must be non-negative"));
        }
        if ship.radius_m <= 0.0 {
            return Err(invalid("radius_m must be positive"));
        }

        match &ship.pilot {
            PilotConfig::Ai { ai: AiConfig::Chase { engage_range_m, standoff_range_m } } => {
                if *engage_range_m < 0.0 || *standoff_range_m < 0.0 {
                    return Err(invalid("chase ranges must be non-negative"));
                }
            }
            PilotConfig::Player { script } => {
                if script.iter().any(|c| c.time_s < 0.0) {
                    return Err(invalid("player command time_s must be non-negative"));
                }
            }
            PilotConfig::Ai { .. } => {}
        }

        Ok(())
    }

    fn is_position_in_bounds(&self, position: &Vector3D) -> bool {
        let (min, max) = (&self.world.bounds_min, &self.world.bounds_max);
        position.x >= min.x && position.x <= max.x &&
        position.y >= min.y && position.y <= max.y &&
        position.z >= min.z && position.z <= max.z
    }

    /// 勢力名の一覧（出現順）
    pub fn factions(&self) -> Vec<&str> {
        let mut factions: Vec<&str> = Vec::new();
        for ship in &self.ships {
            if !factions.contains(&ship.faction.as_str()) {
                factions.push(&ship.faction);
            }
        }
        factions
    }

    /// シナリオの概要を表示
    pub fn print_summary(&self) {
        println!("=== シナリオ情報 ===");
        println!("名前: {}", self.meta.name);
        println!("説明: {}", self.meta.description);
        println!("バージョン: {}", self.meta.version);
        println!();

        println!("=== シミュレーション設定 ===");
        println!("時間刻み: {:.3}秒", self.sim.dt_s);
        println!("最大時間: {:.1}秒", self.sim.t_max_s);
        println!("弾速: {:.0}m/s  ダメージ: {}  寿命: {:.1}秒",
                 self.weapons.bullet_speed_mps, self.weapons.damage, self.weapons.lifetime_s);
        println!();

        println!("=== 艦隊 ===");
        for faction in self.factions() {
            let ships: Vec<&ShipConfig> = self.ships.iter().filter(|s| s.faction == faction).collect();
            println!("{}: {}隻", faction, ships.len());
            for ship in ships {
                let pilot = match &ship.pilot {
                    PilotConfig::Player { .. } => "player".to_string(),
                    PilotConfig::Ai { ai } => format!("ai/{}", ai_label(ai)),
                };
                println!("  {} (耐久: {}, 弾数: {}, 操縦: {})", ship.id, ship.health, ship.ammo, pilot);
            }
        }
    }
}

fn ai_label(ai: &AiConfig) -> &'static str {
    match ai {
        AiConfig::StopInPlace => "stop_in_place",
        AiConfig::HoldCourse => "hold_course",
        AiConfig::Chase { .. } => "chase",
    }
}

/// シナリオ読み込みエラー
#[derive(Debug)]
pub enum ScenarioError {
    FileNotFound(std::path::PathBuf),
    IoError(std::path::PathBuf, std::io::Error),
    ParseError(std::path::PathBuf, serde_yaml::Error),
    ValidationError(String),
}

impl std::fmt::Display for ScenarioError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScenarioError::FileNotFound(path) => {
                write!(f, "シナリオファイルが見つかりません: {}", path.display())
            }
            ScenarioError::IoError(path, err) => {
                write!(f, "ファイル読み込みエラー {}: {}", path.display(), err)
            }
            ScenarioError::ParseError(path, err) => {
                write!(f, "YAML解析エラー {}: {}", path.display(), err)
            }
            ScenarioError::ValidationError(msg) => {
                write!(f, "設定検証エラー: {}", msg)
            }
        }
    }
}

impl std::error::Error for ScenarioError {}
