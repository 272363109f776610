//! 画面の代わりに状態変更通知を受け取り、確定済みスナップショットの概要をログに出す。
//!
//! 描画側と同じく、リンクの明るさは最大距離だけを閾値にした近接度で決まります。

use crate::models::{DistanceBand, Point2D};
use crate::simulation::{FieldSnapshot, StateChanged};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

/// 1フレーム分の概要
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSummary {
    pub tick: u64,
    pub stars: usize,
    /// 明るさが0より大きいリンクの数
    pub visible_links: usize,
    /// 表示されるリンクの平均の明るさ（[0, 1)）
    pub mean_brightness: f64,
    /// 星の重心
    pub centroid: Point2D,
}

/// スナップショットから概要を計算
pub fn summarize(snapshot: &FieldSnapshot, max_distance: f64) -> FrameSummary {
    let band = DistanceBand::new(max_distance, 0.0);

    let mut visible_links = 0;
    let mut brightness_sum = 0.0;
    for link in snapshot.links.iter() {
        let brightness = link.closeness(&snapshot.positions, band);
        if brightness > 0.0 {
            visible_links += 1;
            brightness_sum += brightness;
        }
    }

    let count = snapshot.positions.len();
    let centroid = if count == 0 {
        Point2D::new(0.0, 0.0)
    } else {
        let (sx, sy) = snapshot
            .positions
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        Point2D::new(sx / count as f64, sy / count as f64)
    };

    FrameSummary {
        tick: snapshot.tick,
        stars: count,
        visible_links,
        mean_brightness: if visible_links == 0 {
            0.0
        } else {
            brightness_sum / visible_links as f64
        },
        centroid,
    }
}

/// ログ出力による簡易描画
pub struct ConsoleReporter {
    events: mpsc::UnboundedReceiver<StateChanged>,
    snapshots: watch::Receiver<FieldSnapshot>,
    max_distance: f64,
    /// 何回の通知ごとに概要を出すか
    report_every: u64,
}

impl ConsoleReporter {
    pub fn new(
        events: mpsc::UnboundedReceiver<StateChanged>,
        snapshots: watch::Receiver<FieldSnapshot>,
        max_distance: f64,
        report_every: u64,
    ) -> Self {
        Self {
            events,
            snapshots,
            max_distance,
            report_every: report_every.max(1),
        }
    }

    /// 通知チャネルが閉じるまで受信を続け、受け取った通知の数を返す
    pub async fn run(mut self) -> u64 {
        let mut received = 0u64;
        let mut last = None;

        while self.events.recv().await.is_some() {
            received += 1;
            if received % self.report_every != 0 {
                continue;
            }
            let summary = summarize(&self.snapshots.borrow(), self.max_distance);
            debug!(
                tick = summary.tick,
                visible_links = summary.visible_links,
                brightness = summary.mean_brightness,
                cx = summary.centroid.x,
                cy = summary.centroid.y,
                "フレーム"
            );
            last = Some(summary);
        }

        if let Some(summary) = last {
            info!(
                notifications = received,
                tick = summary.tick,
                visible_links = summary.visible_links,
                "描画側を終了します"
            );
        }
        received
    }
}
