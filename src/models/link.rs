use crate::models::{
    common::{math_utils, DistanceBand, Point2D},
    traits::StarId,
};

/// リンクの識別子
pub type LinkId = usize;

/// 2つの星を結ぶリンク
///
/// 2つ目の星が追加された時点で一度だけ作られ、以後メンバーは変わりません。
/// 描画側が近接度に応じた明るさで線を引くためだけに使われ、
/// 進行方向の計算では参照されません。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub id: LinkId,
    /// 先に存在していた星
    pub first: StarId,
    /// 後から追加された星
    pub second: StarId,
}

impl Link {
    /// 描画用の近接度（明るさの重み）
    ///
    /// 両端の星の位置を `positions`（ID順）から引き、`band` での近接度を返します。
    /// 範囲外のIDを含む場合は0とします。
    pub fn closeness(&self, positions: &[Point2D], band: DistanceBand) -> f64 {
        match (positions.get(self.first), positions.get(self.second)) {
            (Some(a), Some(b)) => math_utils::closeness_between(a, b, band),
            _ => 0.0,
        }
    }
}

/// 全ての星の間のリンクと、星ごとの接続リンク一覧
#[derive(Debug, Clone, Default)]
pub struct LinkSet {
    links: Vec<Link>,
    incident: Vec<Vec<LinkId>>,
}

impl LinkSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 新しい星を登録し、既存の全ての星へのリンクを作成
    ///
    /// `new_star` は既存の星の数と等しいIDでなければなりません。
    pub fn connect_new_star(&mut self, new_star: StarId) {
        debug_assert_eq!(new_star, self.incident.len());
        self.incident.push(Vec::with_capacity(new_star));

        for existing in 0..new_star {
            let id = self.links.len();
            self.links.push(Link {
                id,
                first: existing,
                second: new_star,
            });
            self.incident[existing].push(id);
            self.incident[new_star].push(id);
        }
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// 星に接続しているリンクID一覧
    pub fn incident(&self, star: StarId) -> &[LinkId] {
        self.incident.get(star).map(Vec::as_slice).unwrap_or(&[])
    }
}
