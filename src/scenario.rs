use crate::models::{
    Bounds, HeadingComposition, InfluenceParams, Point2D, PushAccumulation, PushingParams,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// シナリオメタデータ
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScenarioMeta {
    pub version: String,
    pub name: String,
    pub description: String,
}

impl Default for ScenarioMeta {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            name: "default".to_string(),
            description: "標準の星空シミュレーション".to_string(),
        }
    }
}

/// シミュレーション設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationConfig {
    /// ティック間の待機時間（ミリ秒）
    pub tick_interval_ms: u64,
    /// 乱数シード。未指定の場合は実行ごとに変わる
    #[serde(default)]
    pub seed: Option<u64>,
    /// 実行するティック数の上限。未指定の場合は停止要求まで続ける
    #[serde(default)]
    pub max_ticks: Option<u64>,
}

/// 世界（平面）設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorldConfig {
    pub width: f64,
    pub height: f64,
}

/// 星の初期配置
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct StarPlacement {
    pub x: f64,
    pub y: f64,
    /// 初期進行方向（ラジアン）。未指定の場合はランダム
    #[serde(default)]
    pub heading: Option<f64>,
}

/// 星の設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StarsConfig {
    pub count: usize,
    pub speed: f64,
    /// 先頭から順に適用される固定配置。残りはランダムに配置される
    #[serde(default)]
    pub placements: Vec<StarPlacement>,
}

/// 影響（引き寄せ・押し出し）設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InfluenceConfig {
    pub max_distance: f64,
    #[serde(default)]
    pub min_distance: Option<f64>,
    pub pulling_factor: f64,
    #[serde(default)]
    pub pushing_factor: Option<f64>,
    #[serde(default)]
    pub push_accumulation: PushAccumulation,
    #[serde(default)]
    pub composition: HeadingComposition,
}

/// 完全なシナリオ設定
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScenarioConfig {
    #[serde(default)]
    pub meta: ScenarioMeta,
    pub sim: SimulationConfig,
    pub world: WorldConfig,
    pub stars: StarsConfig,
    pub influence: InfluenceConfig,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            meta: ScenarioMeta::default(),
            sim: SimulationConfig {
                tick_interval_ms: 5,
                seed: None,
                max_ticks: None,
            },
            world: WorldConfig {
                width: 1180.0,
                height: 820.0,
            },
            stars: StarsConfig {
                count: 10,
                speed: 0.5,
                placements: Vec::new(),
            },
            influence: InfluenceConfig {
                max_distance: 400.0,
                min_distance: Some(20.0),
                pulling_factor: 0.003,
                pushing_factor: Some(1.0),
                push_accumulation: PushAccumulation::Last,
                composition: HeadingComposition::Sequential,
            },
        }
    }
}

impl ScenarioConfig {
    /// YAMLファイルからシナリオ設定を読み込み
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();

        // ファイル存在チェック
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.to_path_buf()));
        }

        let contents = fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config: ScenarioConfig =
            serde_yaml::from_str(&contents).map_err(|source| ScenarioError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        config.validate()?;

        Ok(config)
    }

    /// 設定の基本的な検証
    pub fn validate(&self) -> Result<(), ScenarioError> {
        let invalid = |msg: String| Err(ScenarioError::Validation(msg));

        if self.sim.tick_interval_ms == 0 {
            return invalid("tick_interval_ms must be positive".to_string());
        }

        // 平面と速度の検証
        let speed = self.stars.speed;
        if !(speed.is_finite() && speed > 0.0) {
            return invalid(format!("speed must be positive, got {}", speed));
        }
        let world = &self.world;
        if !(world.width.is_finite() && world.height.is_finite()) {
            return invalid("world bounds must be finite".to_string());
        }
        // 反射後の一歩が反対側の壁を越えない大きさが必要
        if world.width <= 2.0 * speed || world.height <= 2.0 * speed {
            return invalid(format!(
                "world {}x{} is too small for speed {}",
                world.width, world.height, speed
            ));
        }

        // 星の数と配置の検証
        if self.stars.count == 0 {
            return invalid("star count must be at least 1".to_string());
        }
        if self.stars.placements.len() > self.stars.count {
            return invalid(format!(
                "{} placements given for {} stars",
                self.stars.placements.len(),
                self.stars.count
            ));
        }
        let bounds = self.bounds();
        for (index, placement) in self.stars.placements.iter().enumerate() {
            if !bounds.contains_strictly(&Point2D::new(placement.x, placement.y)) {
                return invalid(format!(
                    "placement {} ({}, {}) is outside the world",
                    index, placement.x, placement.y
                ));
            }
            if placement.heading.is_some_and(|h| !h.is_finite()) {
                return invalid(format!("placement {} heading must be finite", index));
            }
        }

        // 閾値と係数の検証
        let influence = &self.influence;
        if !(influence.max_distance.is_finite() && influence.max_distance > 0.0) {
            return invalid("max_distance must be positive".to_string());
        }
        if let Some(min) = influence.min_distance {
            if !(min.is_finite() && min >= 0.0 && min < influence.max_distance) {
                return invalid(format!(
                    "min_distance {} must be in [0, max_distance {})",
                    min, influence.max_distance
                ));
            }
        }
        for (name, factor) in [
            ("pulling_factor", Some(influence.pulling_factor)),
            ("pushing_factor", influence.pushing_factor),
        ] {
            if let Some(value) = factor {
                if !(value.is_finite() && value >= 0.0) {
                    return invalid(format!("{} must be a non-negative number, got {}", name, value));
                }
            }
        }

        Ok(())
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::new(self.world.width, self.world.height)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.sim.tick_interval_ms)
    }

    /// 影響パラメータを組み立てる
    ///
    /// 押し出しは最小距離と押し出し係数の両方が設定されている場合のみ有効になります。
    pub fn influence_params(&self) -> InfluenceParams {
        let influence = &self.influence;
        let pushing = match (influence.min_distance, influence.pushing_factor) {
            (Some(_), Some(factor)) => Some(PushingParams {
                factor,
                accumulation: influence.push_accumulation,
            }),
            _ => None,
        };

        InfluenceParams {
            max_distance: influence.max_distance,
            min_distance: influence.min_distance.unwrap_or(0.0),
            pulling_factor: influence.pulling_factor,
            pushing,
            composition: influence.composition,
        }
    }

    /// シナリオの概要を表示
    pub fn print_summary(&self) {
        println!("=== シナリオ情報 ===");
        println!("名前: {}", self.meta.name);
        println!("説明: {}", self.meta.description);
        println!("バージョン: {}", self.meta.version);
        println!();

        println!("=== シミュレーション設定 ===");
        println!("ティック間隔: {}ミリ秒", self.sim.tick_interval_ms);
        match self.sim.seed {
            Some(seed) => println!("シード値: {}", seed),
            None => println!("シード値: ランダム"),
        }
        match self.sim.max_ticks {
            Some(ticks) => println!("最大ティック数: {}", ticks),
            None => println!("最大ティック数: 無制限（停止要求まで）"),
        }
        println!();

        println!("=== 平面と星 ===");
        println!("平面: {:.0} x {:.0}", self.world.width, self.world.height);
        println!("星の数: {}個 (固定配置: {}個)", self.stars.count, self.stars.placements.len());
        println!("速度: {}", self.stars.speed);
        let n = self.stars.count;
        println!("リンク数: {}本", n * n.saturating_sub(1) / 2);
        println!();

        println!("=== 影響設定 ===");
        let params = self.influence_params();
        println!("最大距離: {:.1}", params.max_distance);
        println!("最小距離: {:.1}", params.min_distance);
        println!("引き寄せ係数: {}", params.pulling_factor);
        match params.pushing {
            Some(pushing) => {
                println!("押し出し係数: {}", pushing.factor);
                println!("押し出し集計: {:?}", pushing.accumulation);
                println!("合成方法: {:?}", params.composition);
            }
            None => println!("押し出し: 無効"),
        }
    }
}

/// シナリオ読み込みエラー
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("シナリオファイルが見つかりません: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("ファイル読み込みエラー {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("YAML解析エラー {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("設定検証エラー: {0}")]
    Validation(String),
}
