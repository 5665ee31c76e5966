use anyhow::Result;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub anchor: AnchorConfig,
    #[serde(default)]
    pub compositor: CompositorConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub debug: DebugConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CameraConfig {
    /// カメラデバイス番号
    #[serde(default)]
    pub index: i32,
    #[serde(default = "default_camera_width")]
    pub width: u32,
    #[serde(default = "default_camera_height")]
    pub height: u32,
    #[serde(default = "default_camera_fps")]
    pub fps: u32,
    /// 左右反転（セルフィー表示）。反転すると左肩が画像左側に来る
    #[serde(default = "default_mirror")]
    pub mirror: bool,
}

fn default_camera_width() -> u32 { 640 }
fn default_camera_height() -> u32 { 480 }
fn default_camera_fps() -> u32 { 30 }
fn default_mirror() -> bool { true }

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            width: default_camera_width(),
            height: default_camera_height(),
            fps: default_camera_fps(),
            mirror: default_mirror(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DetectorConfig {
    /// ONNXモデルのパス
    #[serde(default = "default_model")]
    pub model: String,
    /// 平均信頼度がこれ未満なら人物なしとする
    #[serde(default = "default_min_pose_score")]
    pub min_pose_score: f32,
}

fn default_model() -> String { "models/movenet_lightning.onnx".to_string() }
fn default_min_pose_score() -> f32 { 0.2 }

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            min_pose_score: default_min_pose_score(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnchorConfig {
    /// 肩・腰の信頼度閾値
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
    /// 肩幅に対する衣服幅の倍率
    #[serde(default = "default_width_factor")]
    pub width_factor: f32,
    /// 正規化胴長 × 画像高さ に対する衣服高さの倍率
    #[serde(default = "default_height_factor")]
    pub height_factor: f32,
    /// 肩ラインより上にはみ出す割合（衣服高さに対して）
    #[serde(default = "default_vertical_offset")]
    pub vertical_offset: f32,
}

fn default_confidence_threshold() -> f32 { 0.5 }
fn default_width_factor() -> f32 { 1.2 }
fn default_height_factor() -> f32 { 2.5 }
fn default_vertical_offset() -> f32 { 0.1 }

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            width_factor: default_width_factor(),
            height_factor: default_height_factor(),
            vertical_offset: default_vertical_offset(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompositorConfig {
    /// 衣服画像 (PNG, アルファ付き推奨)
    #[serde(default = "default_garment")]
    pub garment: String,
    /// 背景置換色 (RGB)
    #[serde(default = "default_background")]
    pub background: [u8; 3],
    /// デバッグ骨格を描画するか
    #[serde(default = "default_skeleton")]
    pub skeleton: bool,
    /// 骨格線を引く信頼度閾値
    #[serde(default = "default_skeleton_threshold")]
    pub skeleton_threshold: f32,
    /// ランドマーク点の半径 (px)
    #[serde(default = "default_keypoint_radius")]
    pub keypoint_radius: i32,
}

fn default_garment() -> String { "assets/garment.png".to_string() }
fn default_background() -> [u8; 3] { [0, 255, 0] }
fn default_skeleton() -> bool { true }
fn default_skeleton_threshold() -> f32 { 0.5 }
fn default_keypoint_radius() -> i32 { 4 }

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            garment: default_garment(),
            background: default_background(),
            skeleton: default_skeleton(),
            skeleton_threshold: default_skeleton_threshold(),
            keypoint_radius: default_keypoint_radius(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// 1行1JSONで標準出力へ
    #[default]
    Stdout,
    /// 長さプレフィックス付きTCP
    Tcp,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BridgeConfig {
    #[serde(default)]
    pub transport: Transport,
    /// TCP待ち受けアドレス
    #[serde(default = "default_bridge_addr")]
    pub addr: String,
}

fn default_bridge_addr() -> String { "127.0.0.1:9100".to_string() }

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            transport: Transport::default(),
            addr: default_bridge_addr(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DebugConfig {
    /// プレビューウィンドウを表示するか
    #[serde(default)]
    pub view: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    #[serde(default = "default_log_dir")]
    pub dir: String,
    /// trace / debug / info / warn / error / off
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_dir() -> String { "logs".to_string() }
fn default_log_level() -> String { "info".to_string() }

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// 読み込めなければデフォルト設定と読み込みエラー
    ///
    /// ログ出力先も設定で決まるので、警告は呼び出し側がログ初期化後に出す。
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> (Self, Option<anyhow::Error>) {
        match Self::load(path) {
            Ok(config) => (config, None),
            Err(e) => (Self::default(), Some(e)),
        }
    }
}
