//! # Logging モジュール
//!
//! 星空シミュレーションのログ管理機能を提供します。
//!
//! tracing-appenderを使用した非同期ログ出力で、コンソールとファイルへの同時出力と
//! ログレベル制御を行います。ティックごとのトレースログを出してもティック間隔を
//! 乱さないよう、ファイルへの書き込みは別スレッドで行われます。
//!
//! ## 設定可能な出力先
//!
//! - `Console`: コンソールのみ
//! - `File`: ファイルのみ（logs/starfield.log.YYYY-MM-DD、JSON形式）
//! - `Both`: コンソールとファイルの両方

use std::str::FromStr;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
    Registry,
};

/// ログ出力先の設定
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogOutput {
    /// コンソールのみ
    Console,
    /// ファイルのみ
    File,
    /// コンソールとファイルの両方
    Both,
}

impl LogOutput {
    fn writes_file(&self) -> bool {
        matches!(self, LogOutput::File | LogOutput::Both)
    }
}

impl FromStr for LogOutput {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "console" | "stdout" => Ok(LogOutput::Console),
            "file" => Ok(LogOutput::File),
            "both" | "all" => Ok(LogOutput::Both),
            _ => Err(format!("無効な出力先: {}. 利用可能: console, file, both", s)),
        }
    }
}

/// ログ設定構造体
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// ログレベル
    pub level: Level,
    /// 出力先
    pub output: LogOutput,
    /// ログファイルのディレクトリ（Fileまたは Bothの場合）
    pub log_dir: String,
    /// ログファイル名のプレフィックス
    pub file_prefix: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            output: LogOutput::Console,
            log_dir: "logs".to_string(),
            file_prefix: "starfield.log".to_string(),
        }
    }
}

/// ログ初期化エラー
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("ログディレクトリを作成できません {dir}: {source}")]
    Directory {
        dir: String,
        source: std::io::Error,
    },
    #[error("ログシステムの初期化に失敗しました: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// ログシステムを初期化
///
/// 環境変数 `RUST_LOG` が設定されている場合はそちらを優先します。
/// ファイル出力を行う場合は非同期書き込みのガードを返すので、
/// プロセス終了まで保持してください（破棄すると未書き込みのログが失われます）。
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>, LoggingError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.level.to_string()))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let console_layer = (config.output != LogOutput::File).then(|| {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact()
    });

    let (file_layer, guard) = if config.output.writes_file() {
        ensure_log_directory(&config.log_dir).map_err(|source| LoggingError::Directory {
            dir: config.log_dir.clone(),
            source,
        })?;
        let file_appender = rolling::daily(&config.log_dir, &config.file_prefix);
        let (non_blocking_appender, guard) = non_blocking(file_appender);
        let layer = fmt::layer()
            .with_writer(non_blocking_appender)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .json();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    Registry::default()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}

/// ログレベルを文字列から解析
///
/// 無効な文字列の場合はINFOを返します。
pub fn parse_log_level(level_str: &str) -> Level {
    match level_str.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => {
            eprintln!("警告: 無効なログレベル '{}'. INFOを使用します", level_str);
            Level::INFO
        }
    }
}

/// 詳細出力レベル（-v の個数）からログレベルを決定
pub fn level_for_verbosity(base: Level, verbose: u8) -> Level {
    match verbose {
        0 => base,
        1 if base == Level::TRACE => base,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// ログディレクトリを作成
pub fn ensure_log_directory(log_dir: &str) -> Result<(), std::io::Error> {
    std::fs::create_dir_all(log_dir)?;
    Ok(())
}
