use clap::{Arg, Command};
use starfield::logging::{self, LogConfig, LogOutput};
use starfield::presenter::ConsoleReporter;
use starfield::scenario::ScenarioConfig;
use starfield::simulation::{forward_stop_request, StarField};
use tokio::sync::{mpsc, watch};
use tracing::{error, info};

fn main() {
    // コマンドライン引数の解析
    let matches = Command::new("starfield")
        .version("0.1.0")
        .about("星空シミュレーション (Star field simulation)")
        .long_about("有界な平面を移動する星の集団シミュレーション\n\
                     近くの星に引き寄せられ、近すぎる星から離れ、壁で反射します。")
        .arg(
            Arg::new("scenario")
                .short('s')
                .long("scenario")
                .value_name("FILE")
                .help("シナリオファイル(.yaml)のパスを指定")
                .long_help("実行するシナリオファイル(.yaml)のパスを指定します。\n\
                           指定しない場合、標準設定（10個の星、1180x820）で実行されます。")
        )
        .arg(
            Arg::new("info")
                .short('i')
                .long("info")
                .action(clap::ArgAction::SetTrue)
                .help("シナリオの情報のみ表示して終了")
        )
        .arg(
            Arg::new("ticks")
                .long("ticks")
                .value_name("N")
                .value_parser(clap::value_parser!(u64))
                .help("指定したティック数で終了（シナリオの設定を上書き）")
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .value_name("SEED")
                .value_parser(clap::value_parser!(u64))
                .help("乱数シード（シナリオの設定を上書き）")
        )
        .arg(
            Arg::new("report-every")
                .long("report-every")
                .value_name("N")
                .value_parser(clap::value_parser!(u64))
                .default_value("200")
                .help("何回の通知ごとに状態の概要を出力するか")
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .default_value("info")
                .help("ログレベル (trace, debug, info, warn, error)")
        )
        .arg(
            Arg::new("log-output")
                .long("log-output")
                .value_name("OUTPUT")
                .default_value("console")
                .value_parser(|s: &str| s.parse::<LogOutput>())
                .help("ログ出力先 (console, file, both)")
        )
        .arg(
            Arg::new("log-dir")
                .long("log-dir")
                .value_name("DIR")
                .default_value("logs")
                .help("ログファイルの出力ディレクトリ")
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(clap::ArgAction::Count)
                .help("詳細出力レベル (-v: debug, -vv: trace)")
        )
        .get_matches();

    // シナリオの読み込み
    let mut scenario = match matches.get_one::<String>("scenario") {
        Some(path) => match ScenarioConfig::from_file(path) {
            Ok(scenario) => scenario,
            Err(e) => {
                eprintln!("エラー: {}", e);
                std::process::exit(1);
            }
        },
        None => ScenarioConfig::default(),
    };
    if let Some(ticks) = matches.get_one::<u64>("ticks") {
        scenario.sim.max_ticks = Some(*ticks);
    }
    if let Some(seed) = matches.get_one::<u64>("seed") {
        scenario.sim.seed = Some(*seed);
    }

    if matches.get_flag("info") {
        scenario.print_summary();
        return;
    }

    // ログの初期化
    let base_level = matches
        .get_one::<String>("log-level")
        .map(|s| logging::parse_log_level(s))
        .unwrap_or(tracing::Level::INFO);
    let log_config = LogConfig {
        level: logging::level_for_verbosity(base_level, matches.get_count("verbose")),
        output: matches
            .get_one::<LogOutput>("log-output")
            .copied()
            .unwrap_or(LogOutput::Console),
        log_dir: matches
            .get_one::<String>("log-dir")
            .cloned()
            .unwrap_or_else(|| "logs".to_string()),
        ..LogConfig::default()
    };
    let _guard = match logging::init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("エラー: {}", e);
            std::process::exit(1);
        }
    };

    let report_every = matches.get_one::<u64>("report-every").copied().unwrap_or(200);
    if let Err(e) = run_scenario(scenario, report_every) {
        error!("シミュレーションを実行できませんでした: {}", e);
        std::process::exit(1);
    }
}

/// シナリオを単一スレッドのランタイムで実行
///
/// Ctrl-Cで停止シグナルを送り、ループと描画側の終了を待ちます。
fn run_scenario(scenario: ScenarioConfig, report_every: u64) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        info!(scenario = %scenario.meta.name, "シナリオを開始します");

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let mut field = StarField::with_events(&scenario, event_tx)?;
        let snapshots = field.subscribe_snapshots();
        let reporter = ConsoleReporter::new(
            event_rx,
            snapshots,
            scenario.influence.max_distance,
            report_every,
        );
        let reporter_handle = tokio::spawn(reporter.run());

        let (stop_tx, stop_rx) = watch::channel(false);
        tokio::spawn(forward_stop_request(tokio::signal::ctrl_c(), stop_tx));

        let summary = field.run(stop_rx).await;
        // 通知の送信側を閉じて描画側を終了させる
        drop(field);
        let notifications = reporter_handle.await?;

        info!(
            ticks = summary.ticks,
            reason = ?summary.reason,
            notifications,
            "シナリオ実行が完了しました"
        );
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}
