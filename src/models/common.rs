use std::f64::consts::{FRAC_PI_2, PI, TAU};
use std::ops::{Add, Mul, Sub};

/// ゼロ割りを避けるための微小値
pub const EPSILON: f64 = 0.00001;

/// 2次元平面上の位置を表す構造体
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// ユークリッド距離を計算
    pub fn distance(&self, other: &Point2D) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

impl Add<Vector2D> for Point2D {
    type Output = Self;

    fn add(self, step: Vector2D) -> Self::Output {
        Self::new(self.x + step.x, self.y + step.y)
    }
}

impl Sub for Point2D {
    type Output = Vector2D;

    fn sub(self, other: Self) -> Self::Output {
        Vector2D::new(self.x - other.x, self.y - other.y)
    }
}

/// 2次元の方向ベクトル
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector2D {
    pub x: f64,
    pub y: f64,
}

impl Vector2D {
    pub const ZERO: Vector2D = Vector2D { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// 角度（ラジアン）から単位ベクトルを作成
    pub fn from_angle(angle: f64) -> Self {
        Self::new(angle.cos(), angle.sin())
    }

    /// ベクトルの長さ
    pub fn magnitude(&self) -> f64 {
        (self.x.powi(2) + self.y.powi(2)).sqrt()
    }

    /// 単位ベクトル化
    ///
    /// 長さが0の場合はEPSILONで割るため、結果はゼロベクトルのままになります。
    pub fn normalize_or_epsilon(&self) -> Self {
        let mut magnitude = self.magnitude();
        if magnitude == 0.0 {
            magnitude += EPSILON;
        }
        Self::new(self.x / magnitude, self.y / magnitude)
    }

    /// ベクトルの向きを [0, 2π) の角度として復元
    pub fn heading(&self) -> f64 {
        heading_from_vector(*self)
    }
}

impl Add for Vector2D {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        Self::new(self.x + other.x, self.y + other.y)
    }
}

impl Mul<f64> for Vector2D {
    type Output = Self;

    fn mul(self, scalar: f64) -> Self::Output {
        Self::new(self.x * scalar, self.y * scalar)
    }
}

/// シミュレーション平面の大きさ
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// 位置が平面の内側（境界を含まない）にあるか
    pub fn contains_strictly(&self, point: &Point2D) -> bool {
        point.x > 0.0 && point.x < self.width && point.y > 0.0 && point.y < self.height
    }

    pub fn x_outside(&self, x: f64) -> bool {
        x <= 0.0 || x >= self.width
    }

    pub fn y_outside(&self, y: f64) -> bool {
        y <= 0.0 || y >= self.height
    }
}

/// 近接度の距離帯 [min, max)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceBand {
    pub max: f64,
    pub min: f64,
}

impl DistanceBand {
    pub fn new(max: f64, min: f64) -> Self {
        Self { max, min }
    }
}

/// 数学ユーティリティ関数
pub mod math_utils {
    use super::*;

    /// 距離から近接度を計算
    ///
    /// 距離が `band.max` 以上、または `band.min` 未満の場合は0、
    /// それ以外は `1 - distance / band.max` を返します。結果は [0, 1) に収まります。
    pub fn closeness(distance: f64, band: DistanceBand) -> f64 {
        if distance >= band.max || distance < band.min {
            0.0
        } else {
            1.0 - distance / band.max
        }
    }

    /// 2点間の近接度
    pub fn closeness_between(a: &Point2D, b: &Point2D, band: DistanceBand) -> f64 {
        closeness(a.distance(b), band)
    }

    /// ベクトルから角度を復元（[0, 2π)）
    ///
    /// x成分が0の場合はEPSILONだけずらしてから計算します。
    pub fn heading_from_vector(vector: Vector2D) -> f64 {
        let x = if vector.x == 0.0 { vector.x + EPSILON } else { vector.x };
        let angle = vector.y.atan2(x);
        normalize_heading(angle)
    }

    /// 角度を [0, 2π) に正規化
    pub fn normalize_heading(angle: f64) -> f64 {
        let normalized = angle.rem_euclid(TAU);
        // rem_euclidは丸めでTAUそのものを返すことがある
        if normalized >= TAU { 0.0 } else { normalized }
    }

    /// 左右の壁に当たった時の方向転換
    pub fn reflect_vertical_wall(heading: f64) -> f64 {
        if (0.0..=PI).contains(&heading) {
            PI - heading
        } else {
            normalize_heading(3.0 * PI - heading)
        }
    }

    /// 上下の壁に当たった時の方向転換
    pub fn reflect_horizontal_wall(heading: f64) -> f64 {
        normalize_heading(TAU - heading)
    }

    /// 壁と平行な進行方向を、X方向へわずかに傾ける
    ///
    /// 真上・真下向きの星が左右の壁上にいると反射しても方向が変わらないため、
    /// 上下の向きは保ったまま `toward_positive` の側へ `EPSILON` だけ回します。
    pub fn nudge_into_x(heading: f64, toward_positive: bool) -> f64 {
        let upward = heading.sin() >= 0.0;
        match (toward_positive, upward) {
            (true, true) => FRAC_PI_2 - EPSILON,
            (true, false) => 3.0 * FRAC_PI_2 + EPSILON,
            (false, true) => FRAC_PI_2 + EPSILON,
            (false, false) => 3.0 * FRAC_PI_2 - EPSILON,
        }
    }

    /// 壁と平行な進行方向を、Y方向へわずかに傾ける
    pub fn nudge_into_y(heading: f64, toward_positive: bool) -> f64 {
        let rightward = heading.cos() >= 0.0;
        match (toward_positive, rightward) {
            (true, true) => EPSILON,
            (true, false) => PI - EPSILON,
            (false, true) => TAU - EPSILON,
            (false, false) => PI + EPSILON,
        }
    }
}

pub use math_utils::heading_from_vector;
