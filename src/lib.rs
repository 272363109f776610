//! # starfield
//!
//! 有界な2次元平面を移動する点（星）の集団シミュレーション。
//!
//! 各星は一定速度で進み、一定の距離帯にいる他の星に引き寄せられ、
//! 近すぎる星からは押し出されるように進行方向を少しずつ変えます。
//! 平面の壁に当たると反射します。

pub mod logging;
pub mod models;
pub mod presenter;
pub mod scenario;
pub mod simulation;
