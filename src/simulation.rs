//! # Simulation モジュール
//!
//! 星空シミュレーションの中核となる `StarField` を提供します。
//!
//! `StarField` は全ての星とリンク、影響パラメータを所有し、固定間隔のティックループを
//! 駆動します。各ティックでは挿入順に全ての星を更新し、スイープ完了後に
//! スナップショットを公開してから状態変更通知を1回だけ送ります。
//!
//! ## 主要機能
//!
//! - **星の生成**: 構築時に星を1つずつ追加し、既存の全ての星へのリンクを作成
//! - **ティック処理**: 挿入順のスイープ（同一ティック内で先に更新された星が見える）
//! - **停止制御**: 待機中に停止シグナルを監視し、決定的に終了
//! - **通知**: ペイロードのない `StateChanged` イベントと、確定済みスナップショット
//!
//! ## 使用例
//!
//! ```no_run
//! use starfield::scenario::ScenarioConfig;
//! use starfield::simulation::StarField;
//! use tokio::sync::watch;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ScenarioConfig::from_file("scenarios/default.yaml")?;
//! let mut field = StarField::new(&config)?;
//!
//! let (_stop_tx, stop_rx) = watch::channel(false);
//! let summary = field.run(stop_rx).await;
//! println!("{} ticks", summary.ticks);
//! # Ok(())
//! # }
//! ```

use crate::models::*;
use crate::scenario::{ScenarioConfig, ScenarioError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::TAU;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

/// ペイロードのない状態変更通知
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChanged;

/// 描画側に渡す確定済みの状態
#[derive(Debug, Clone)]
pub struct FieldSnapshot {
    /// 直近に完了したティック番号（生成中は0）
    pub tick: u64,
    /// 星の位置（ID順）
    pub positions: Vec<Point2D>,
    /// 全てのリンク（構築後は変化しない）
    pub links: Arc<[Link]>,
}

impl Default for FieldSnapshot {
    fn default() -> Self {
        Self {
            tick: 0,
            positions: Vec::new(),
            links: Arc::from(Vec::new()),
        }
    }
}

/// ループの終了理由
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// 停止シグナルを受信した
    Requested,
    /// 停止シグナルの送信側が破棄された
    SignalClosed,
    /// 最大ティック数に達した
    TickLimit,
}

/// `run` の実行結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// このループで実行したティック数
    pub ticks: u64,
    pub reason: StopReason,
}

pub struct StarField {
    stars: Vec<Star>,
    links: LinkSet,
    bounds: Bounds,
    params: InfluenceParams,
    tick_interval: Duration,
    max_ticks: Option<u64>,
    tick_count: u64,

    events: Option<mpsc::UnboundedSender<StateChanged>>,
    snapshots: Option<watch::Sender<FieldSnapshot>>,
    shared_links: Arc<[Link]>,
    receiver_dropped: bool,
}

impl StarField {
    /// シナリオ設定から星空を構築
    ///
    /// 固定配置の星を先に、残りを平面内のランダムな位置に生成します。
    /// 乱数シードが指定されていない場合は実行ごとに異なる配置になります。
    pub fn new(config: &ScenarioConfig) -> Result<Self, ScenarioError> {
        let seed = config.sim.seed.unwrap_or_else(rand::random);
        let rng = StdRng::seed_from_u64(seed);
        Self::with_rng(config, rng, None)
    }

    /// 通知チャネル付きで構築
    ///
    /// 生成時の星1つごとに `StateChanged` が送られるため、
    /// 受信側は構築前に用意しておく必要があります。
    pub fn with_events(
        config: &ScenarioConfig,
        events: mpsc::UnboundedSender<StateChanged>,
    ) -> Result<Self, ScenarioError> {
        let seed = config.sim.seed.unwrap_or_else(rand::random);
        Self::with_rng(config, StdRng::seed_from_u64(seed), Some(events))
    }

    fn with_rng(
        config: &ScenarioConfig,
        mut rng: StdRng,
        events: Option<mpsc::UnboundedSender<StateChanged>>,
    ) -> Result<Self, ScenarioError> {
        config.validate()?;

        let bounds = config.bounds();
        let speed = config.stars.speed;
        let mut field = Self::empty(config, events);

        for id in 0..config.stars.count {
            let star = match config.stars.placements.get(id) {
                Some(placement) => Star::new(
                    id,
                    Point2D::new(placement.x, placement.y),
                    placement.heading.unwrap_or_else(|| rng.gen_range(0.0..TAU)),
                    speed,
                ),
                None => Star::new(
                    id,
                    Point2D::new(
                        random_inside(&mut rng, bounds.width),
                        random_inside(&mut rng, bounds.height),
                    ),
                    rng.gen_range(0.0..TAU),
                    speed,
                ),
            };
            field.add_star(star);
        }
        field.finish_population();

        info!(
            stars = field.stars.len(),
            links = field.links.len(),
            "星空を初期化しました"
        );

        Ok(field)
    }

    /// 指定した星の並びから構築
    ///
    /// 位置の検証は行わないため、境界上の星から始めるシナリオの再現に使えます。
    /// 星のIDは並び順に振り直されます。
    pub fn from_stars(config: &ScenarioConfig, stars: Vec<Star>) -> Result<Self, ScenarioError> {
        config.validate()?;

        let mut field = Self::empty(config, None);
        for (id, mut star) in stars.into_iter().enumerate() {
            star.id = id;
            field.add_star(star);
        }
        field.finish_population();

        Ok(field)
    }

    fn empty(config: &ScenarioConfig, events: Option<mpsc::UnboundedSender<StateChanged>>) -> Self {
        Self {
            stars: Vec::with_capacity(config.stars.count),
            links: LinkSet::new(),
            bounds: config.bounds(),
            params: config.influence_params(),
            tick_interval: config.tick_interval(),
            max_ticks: config.sim.max_ticks,
            tick_count: 0,
            events,
            snapshots: None,
            shared_links: Arc::from(Vec::new()),
            receiver_dropped: false,
        }
    }

    /// 星を1つ追加
    ///
    /// 既存の全ての星へのリンクを作ってから星を登録し、通知を1回送ります。
    fn add_star(&mut self, star: Star) {
        let id = self.stars.len();
        self.links.connect_new_star(id);
        self.stars.push(star);

        debug!(
            star = id,
            x = self.stars[id].position.x,
            y = self.stars[id].position.y,
            links = self.links.incident(id).len(),
            "星を追加しました"
        );
        self.notify();
    }

    fn finish_population(&mut self) {
        self.shared_links = Arc::from(self.links.links());
    }

    /// スナップショットの公開先を登録し、受信側を返す
    pub fn subscribe_snapshots(&mut self) -> watch::Receiver<FieldSnapshot> {
        let (tx, rx) = watch::channel(self.snapshot());
        self.snapshots = Some(tx);
        rx
    }

    /// 1ティック分のシミュレーションを実行
    ///
    /// 挿入順に全ての星を更新し、スナップショットを公開してから通知を1回送ります。
    pub fn step(&mut self) {
        for index in 0..self.stars.len() {
            Star::advance(&mut self.stars, index, &self.params, &self.bounds);
        }
        self.tick_count += 1;

        trace!(tick = self.tick_count, "ティック完了");

        self.publish_snapshot();
        self.notify();
    }

    /// ティックループを実行
    ///
    /// `step` の後にティック間隔だけ待機し、待機中に停止シグナルを監視します。
    /// 停止要求・送信側の破棄・最大ティック数のいずれかで終了します。
    pub async fn run(&mut self, mut stop: watch::Receiver<bool>) -> RunSummary {
        info!(
            stars = self.stars.len(),
            interval_ms = self.tick_interval.as_millis() as u64,
            "=== シミュレーション実行開始 ==="
        );

        let started_at = self.tick_count;
        let reason = loop {
            if *stop.borrow_and_update() {
                break StopReason::Requested;
            }
            if self
                .max_ticks
                .is_some_and(|limit| self.tick_count - started_at >= limit)
            {
                break StopReason::TickLimit;
            }

            self.step();

            tokio::select! {
                _ = tokio::time::sleep(self.tick_interval) => {}
                changed = stop.changed() => {
                    if changed.is_err() {
                        break StopReason::SignalClosed;
                    }
                    if *stop.borrow_and_update() {
                        break StopReason::Requested;
                    }
                }
            }
        };

        let summary = RunSummary {
            ticks: self.tick_count - started_at,
            reason,
        };
        info!(
            ticks = summary.ticks,
            reason = ?summary.reason,
            "=== シミュレーション終了 ==="
        );
        summary
    }

    fn publish_snapshot(&mut self) {
        if self.snapshots.is_none() {
            return;
        }
        let snapshot = self.snapshot();
        if let Some(tx) = &self.snapshots {
            // 受信側がいなくても公開値は保持される
            tx.send_replace(snapshot);
        }
    }

    fn notify(&mut self) {
        let Some(events) = &self.events else {
            return;
        };
        if events.send(StateChanged).is_err() && !self.receiver_dropped {
            warn!("通知の受信側が閉じられました。以降の通知は破棄されます");
            self.receiver_dropped = true;
        }
    }

    /// 現在の状態のスナップショット
    pub fn snapshot(&self) -> FieldSnapshot {
        FieldSnapshot {
            tick: self.tick_count,
            positions: self.stars.iter().map(|star| star.get_position()).collect(),
            links: Arc::clone(&self.shared_links),
        }
    }

    pub fn stars(&self) -> &[Star] {
        &self.stars
    }

    pub fn links(&self) -> &[Link] {
        self.links.links()
    }

    pub fn link_set(&self) -> &LinkSet {
        &self.links
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn params(&self) -> &InfluenceParams {
        &self.params
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }
}

/// 外部の停止要求（Ctrl-Cなど）を停止シグナルへ転送
///
/// `signal` が成功すると `true` を送ります。失敗した場合は警告を出し、
/// 送信側を保持したまま待ち続けます（ループはティック上限でのみ終了します）。
pub async fn forward_stop_request<F>(signal: F, stop: watch::Sender<bool>)
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => {
            info!("停止要求を受信しました");
            let _ = stop.send(true);
        }
        Err(e) => {
            warn!("停止要求を監視できません。ティック上限でのみ停止します: {}", e);
            std::future::pending::<()>().await;
            drop(stop);
        }
    }
}

/// (0, upper) の開区間から一様に値を取る
fn random_inside(rng: &mut StdRng, upper: f64) -> f64 {
    loop {
        let value = rng.gen_range(0.0..upper);
        if value > 0.0 {
            return value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::StarPlacement;
    use std::f64::consts::FRAC_PI_2;

    fn seeded(count: usize, seed: u64) -> ScenarioConfig {
        let mut config = ScenarioConfig::default();
        config.stars.count = count;
        config.sim.seed = Some(seed);
        config
    }

    fn pulling_only() -> ScenarioConfig {
        let mut config = ScenarioConfig::default();
        config.influence.pushing_factor = None;
        config
    }

    #[test]
    fn test_population_links() {
        for n in [1usize, 2, 10, 20] {
            let field = StarField::new(&seeded(n, 1)).expect("valid config");
            assert_eq!(field.stars().len(), n);
            assert_eq!(field.links().len(), n * (n - 1) / 2);
            for id in 0..n {
                assert_eq!(field.link_set().incident(id).len(), n - 1);
                assert_eq!(field.stars()[id].id, id);
            }
            assert_eq!(field.snapshot().links.len(), n * (n - 1) / 2);
        }
    }

    #[test]
    fn test_population_is_inside_and_seeded() {
        let a = StarField::new(&seeded(20, 42)).expect("valid config");
        let b = StarField::new(&seeded(20, 42)).expect("valid config");
        assert_eq!(a.stars(), b.stars());
        for star in a.stars() {
            assert!(a.bounds().contains_strictly(&star.position));
            assert!((0.0..TAU).contains(&star.heading));
        }
    }

    #[test]
    fn test_placements_come_first() {
        let mut config = seeded(3, 5);
        config.stars.placements = vec![StarPlacement {
            x: 100.0,
            y: 200.0,
            heading: Some(FRAC_PI_2),
        }];
        let field = StarField::new(&config).expect("valid config");
        assert_eq!(field.stars()[0].position, Point2D::new(100.0, 200.0));
        assert_eq!(field.stars()[0].heading, FRAC_PI_2);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = ScenarioConfig::default();
        config.stars.count = 0;
        assert!(StarField::new(&config).is_err());
    }

    #[test]
    fn test_positions_stay_inside_bounds() {
        assert_stays_inside(narrow_field(seeded(20, 9)), 2000);
    }

    #[test]
    fn test_positions_stay_inside_bounds_summed_independent() {
        let mut config = seeded(20, 9);
        config.influence.push_accumulation = PushAccumulation::Sum;
        config.influence.composition = HeadingComposition::Independent;
        assert_stays_inside(narrow_field(config), 2000);
    }

    /// 壁に当たりやすいよう狭い平面で速く動かす
    fn narrow_field(mut config: ScenarioConfig) -> StarField {
        config.world.width = 60.0;
        config.world.height = 40.0;
        config.stars.speed = 3.0;
        StarField::new(&config).expect("valid config")
    }

    fn assert_stays_inside(mut field: StarField, ticks: u64) {
        for _ in 0..ticks {
            field.step();
            for star in field.stars() {
                assert!(
                    field.bounds().contains_strictly(&star.position),
                    "star {} escaped to {:?} at tick {}",
                    star.id,
                    star.position,
                    field.tick_count()
                );
            }
        }
    }

    #[test]
    fn test_far_apart_headings_unchanged() {
        let stars = vec![
            Star::new(0, Point2D::new(0.0, 400.0), 0.0, 0.5),
            Star::new(1, Point2D::new(800.0, 400.0), 0.0, 0.5),
        ];
        let mut field = StarField::from_stars(&pulling_only(), stars).expect("valid config");
        field.step();

        for star in field.stars() {
            assert!(star.heading.abs() < 1e-12, "heading {}", star.heading);
        }
        assert!((field.stars()[0].position.x - 0.5).abs() < 1e-12);
        assert!((field.stars()[1].position.x - 800.5).abs() < 1e-12);
    }

    #[test]
    fn test_stars_in_band_turn_toward_each_other() {
        let stars = vec![
            Star::new(0, Point2D::new(100.0, 400.0), FRAC_PI_2, 0.5),
            Star::new(1, Point2D::new(400.0, 400.0), FRAC_PI_2, 0.5),
        ];
        let mut field = StarField::from_stars(&pulling_only(), stars).expect("valid config");
        field.step();

        let left = field.stars()[0].heading;
        let right = field.stars()[1].heading;
        assert!(left < FRAC_PI_2 && FRAC_PI_2 - left <= 0.003 + 1e-9);
        assert!(right > FRAC_PI_2 && right - FRAC_PI_2 <= 0.003 + 1e-9);
        // 右へ曲がった分だけx方向にも動く
        assert!(field.stars()[0].position.x > 100.0);
        assert!(field.stars()[1].position.x < 400.0);
    }

    #[test]
    fn test_sweep_sees_earlier_updates() {
        let stars = vec![
            Star::new(0, Point2D::new(100.0, 400.0), 0.0, 0.5),
            Star::new(1, Point2D::new(400.0, 400.0), FRAC_PI_2, 0.5),
        ];
        let mut field = StarField::from_stars(&pulling_only(), stars.clone()).expect("valid config");
        field.step();

        // 星0が先に動いた後の位置で星1を計算したものと一致する
        let mut expected = stars;
        let params = *field.params();
        let bounds = field.bounds();
        Star::advance(&mut expected, 0, &params, &bounds);
        Star::advance(&mut expected, 1, &params, &bounds);
        assert_eq!(field.stars(), expected.as_slice());
    }

    #[test]
    fn test_notifications_per_star_and_tick() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut field = StarField::with_events(&seeded(4, 3), tx).expect("valid config");

        let mut received = 0;
        while rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, 4);

        field.step();
        field.step();
        let mut received = 0;
        while rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, 2);
    }

    #[test]
    fn test_dropped_receiver_does_not_stop_steps() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut field = StarField::with_events(&seeded(2, 3), tx).expect("valid config");
        drop(rx);
        field.step();
        field.step();
        assert_eq!(field.tick_count(), 2);
    }

    #[test]
    fn test_snapshot_published_after_step() {
        let mut field = StarField::new(&seeded(3, 11)).expect("valid config");
        let rx = field.subscribe_snapshots();
        assert_eq!(rx.borrow().tick, 0);

        field.step();
        let snapshot = rx.borrow().clone();
        assert_eq!(snapshot.tick, 1);
        assert_eq!(snapshot.positions.len(), 3);
        assert_eq!(snapshot.links.len(), 3);
        for (position, star) in snapshot.positions.iter().zip(field.stars()) {
            assert_eq!(*position, star.position);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_at_tick_limit() {
        let mut config = seeded(5, 2);
        config.sim.max_ticks = Some(25);
        let mut field = StarField::new(&config).expect("valid config");

        let (_stop_tx, stop_rx) = watch::channel(false);
        let summary = field.run(stop_rx).await;
        assert_eq!(summary, RunSummary { ticks: 25, reason: StopReason::TickLimit });
        assert_eq!(field.tick_count(), 25);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_signal() {
        let mut field = StarField::new(&seeded(5, 2)).expect("valid config");
        let (stop_tx, stop_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let summary = field.run(stop_rx).await;
            (summary, field.tick_count())
        });
        tokio::time::sleep(Duration::from_millis(52)).await;
        stop_tx.send(true).expect("runner alive");

        let (summary, ticks) = handle.await.expect("runner finished");
        assert_eq!(summary.reason, StopReason::Requested);
        assert!(summary.ticks >= 1);
        assert_eq!(summary.ticks, ticks);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_when_signal_dropped() {
        let mut field = StarField::new(&seeded(2, 2)).expect("valid config");
        let (stop_tx, stop_rx) = watch::channel(false);
        drop(stop_tx);

        let summary = field.run(stop_rx).await;
        assert_eq!(summary, RunSummary { ticks: 1, reason: StopReason::SignalClosed });
    }

    #[tokio::test(start_paused = true)]
    async fn test_forwarded_stop_request_stops_run() {
        let mut field = StarField::new(&seeded(3, 2)).expect("valid config");
        let (stop_tx, stop_rx) = watch::channel(false);
        tokio::spawn(forward_stop_request(
            async {
                tokio::time::sleep(Duration::from_millis(30)).await;
                Ok(())
            },
            stop_tx,
        ));

        let summary = field.run(stop_rx).await;
        assert_eq!(summary.reason, StopReason::Requested);
        assert!(summary.ticks >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_stop_listener_keeps_run_alive() {
        let mut config = seeded(3, 2);
        config.sim.max_ticks = Some(10);
        let mut field = StarField::new(&config).expect("valid config");
        let (stop_tx, stop_rx) = watch::channel(false);
        tokio::spawn(forward_stop_request(
            async { Err(std::io::Error::other("signal handler unavailable")) },
            stop_tx,
        ));

        let summary = field.run(stop_rx).await;
        assert_eq!(summary, RunSummary { ticks: 10, reason: StopReason::TickLimit });
    }

    #[tokio::test]
    async fn test_run_with_stop_already_set() {
        let mut field = StarField::new(&seeded(2, 2)).expect("valid config");
        let (_stop_tx, stop_rx) = watch::channel(true);
        let summary = field.run(stop_rx).await;
        assert_eq!(summary, RunSummary { ticks: 0, reason: StopReason::Requested });
    }
}
