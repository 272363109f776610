use crate::models::{
    common::{math_utils, Bounds, DistanceBand, Point2D, Vector2D},
    traits::{IAgent, IMovable, StarId},
};
use serde::{Deserialize, Serialize};

/// 押し出し影響の集計方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PushAccumulation {
    /// ループ内の単純代入で、最後に該当した星の寄与だけが残る（従来動作）
    #[default]
    Last,
    /// 該当する全ての星の寄与を合計する
    Sum,
}

/// 引き寄せと押し出しの合成方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HeadingComposition {
    /// 引き寄せ後の方向に対して押し出しを加える（従来動作）
    #[default]
    Sequential,
    /// 両方を元の方向に対して同時に加える
    Independent,
}

/// 押し出し影響のパラメータ
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PushingParams {
    pub factor: f64,
    pub accumulation: PushAccumulation,
}

/// 進行方向の更新に使うパラメータ一式
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InfluenceParams {
    /// 引き寄せの最大距離
    pub max_distance: f64,
    /// 引き寄せの最小距離（押し出しの境界）。未設定の場合は0
    pub min_distance: f64,
    pub pulling_factor: f64,
    /// 最小距離と押し出し係数が両方設定された場合のみ有効
    pub pushing: Option<PushingParams>,
    pub composition: HeadingComposition,
}

impl InfluenceParams {
    /// 引き寄せに使う距離帯 [min_distance, max_distance)
    pub fn pulling_band(&self) -> DistanceBand {
        DistanceBand::new(self.max_distance, self.min_distance)
    }

    /// 押し出しに使う距離帯 [0, min_distance)
    pub fn pushing_band(&self) -> DistanceBand {
        DistanceBand::new(self.min_distance, 0.0)
    }
}

/// 星エージェント
///
/// 平面上を一定速度で移動する点で、他の星との近さに応じて進行方向が少しずつ変わります。
/// 所属する集合への参照は持たず、更新時に集合全体とインデックスを受け取ります。
#[derive(Debug, Clone, PartialEq)]
pub struct Star {
    pub id: StarId,
    pub position: Point2D,
    /// 進行方向（ラジアン、[0, 2π)）
    pub heading: f64,
    /// 1ティックあたりの移動距離
    pub speed: f64,
}

impl Star {
    pub fn new(id: StarId, position: Point2D, heading: f64, speed: f64) -> Self {
        Self {
            id,
            position,
            heading: math_utils::normalize_heading(heading),
            speed,
        }
    }

    /// 1ティック分、`stars[index]` の進行方向と位置を更新
    ///
    /// 他の星は読み取るだけで変更しません。同じスイープ内で先に更新された星は
    /// 更新後の状態が見えます。
    ///
    /// # 引数
    ///
    /// * `stars` - 全ての星（挿入順）
    /// * `index` - 更新する星のインデックス
    /// * `params` - 影響パラメータ
    /// * `bounds` - 平面の大きさ
    pub fn advance(stars: &mut [Star], index: usize, params: &InfluenceParams, bounds: &Bounds) {
        let Some(me) = stars.get(index) else {
            return;
        };
        let heading = me.next_heading(stars, params);

        let me = &mut stars[index];
        me.heading = heading;
        me.update_x_position(bounds);
        me.update_y_position(bounds);
    }

    /// 周囲の星から次の進行方向を計算
    pub fn next_heading(&self, stars: &[Star], params: &InfluenceParams) -> f64 {
        let pull = self.pulling_influence(stars, params.pulling_band()) * params.pulling_factor;
        let current = self.heading_vector();

        let Some(pushing) = params.pushing else {
            return (current + pull).heading();
        };
        let push = self.pushing_influence(stars, params.pushing_band(), pushing.accumulation)
            * pushing.factor;

        match params.composition {
            HeadingComposition::Sequential => {
                let pulled = (current + pull).heading();
                (Vector2D::from_angle(pulled) + push).heading()
            }
            HeadingComposition::Independent => (current + pull + push).heading(),
        }
    }

    /// 引き寄せ方向の単位ベクトル
    ///
    /// 自分自身を含む全ての星について、近接度で重み付けした差分ベクトルを合計し、
    /// 星の数で平均してから正規化します。
    pub fn pulling_influence(&self, stars: &[Star], band: DistanceBand) -> Vector2D {
        if stars.is_empty() {
            return Vector2D::ZERO;
        }

        let sum = stars.iter().fold(Vector2D::ZERO, |acc, star| {
            let closeness = math_utils::closeness_between(&self.position, &star.position, band);
            acc + (star.position - self.position) * closeness
        });

        (sum * (1.0 / stars.len() as f64)).normalize_or_epsilon()
    }

    /// 押し出し方向の単位ベクトル
    ///
    /// `band.max`（最小距離）より近い星から離れる方向を計算します。
    pub fn pushing_influence(
        &self,
        stars: &[Star],
        band: DistanceBand,
        accumulation: PushAccumulation,
    ) -> Vector2D {
        let mut influence = Vector2D::ZERO;

        for star in stars {
            if star.id == self.id {
                continue;
            }
            let closeness = math_utils::closeness_between(&self.position, &star.position, band);
            if closeness == 0.0 {
                continue;
            }
            let term = (self.position - star.position) * closeness;
            influence = match accumulation {
                PushAccumulation::Last => term,
                PushAccumulation::Sum => influence + term,
            };
        }

        influence.normalize_or_epsilon()
    }

    /// X座標の更新（左右の壁で反射）
    fn update_x_position(&mut self, bounds: &Bounds) {
        let mut new_value = self.position.x + self.speed * self.heading.cos();
        if bounds.x_outside(new_value) {
            self.heading = math_utils::reflect_vertical_wall(self.heading);
            new_value = self.position.x + self.speed * self.heading.cos();
            // 壁と平行な向きは反射で変わらない
            if bounds.x_outside(new_value) {
                self.heading = math_utils::nudge_into_x(self.heading, new_value <= 0.0);
                new_value = self.position.x + self.speed * self.heading.cos();
            }
        }
        self.position.x = new_value;
    }

    /// Y座標の更新（上下の壁で反射）
    fn update_y_position(&mut self, bounds: &Bounds) {
        let mut new_value = self.position.y + self.speed * self.heading.sin();
        if bounds.y_outside(new_value) {
            self.heading = math_utils::reflect_horizontal_wall(self.heading);
            new_value = self.position.y + self.speed * self.heading.sin();
            if bounds.y_outside(new_value) {
                self.heading = math_utils::nudge_into_y(self.heading, new_value <= 0.0);
                new_value = self.position.y + self.speed * self.heading.sin();
            }
        }
        self.position.y = new_value;
    }
}

impl IAgent for Star {
    fn get_position(&self) -> Point2D {
        self.position
    }
}

impl IMovable for Star {
    fn get_heading(&self) -> f64 {
        self.heading
    }

    fn get_speed(&self) -> f64 {
        self.speed
    }
}
