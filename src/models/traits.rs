use crate::models::common::*;

/// 星の識別子（挿入順のインデックス）
pub type StarId = usize;

/// 平面上に位置を持つ全てのエージェントが実装する基本インターフェース
pub trait IAgent {
    /// 現在位置の取得
    fn get_position(&self) -> Point2D;
}

/// 移動可能なエージェントのインターフェース
pub trait IMovable: IAgent {
    /// 現在の進行方向（ラジアン、[0, 2π)）
    fn get_heading(&self) -> f64;

    /// 1ティックあたりの移動量
    fn get_speed(&self) -> f64;

    /// 進行方向の単位ベクトル
    fn heading_vector(&self) -> Vector2D {
        Vector2D::from_angle(self.get_heading())
    }
}
