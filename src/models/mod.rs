// 基本的なデータ型と数学ユーティリティ
pub mod common;

// エージェントの基本インターフェース（trait）定義
pub mod traits;

// 星エージェントと星同士のリンク
pub mod star;
pub mod link;

// 便利な re-export
pub use common::*;
pub use traits::*;
pub use star::{HeadingComposition, InfluenceParams, PushAccumulation, PushingParams, Star};
pub use link::{Link, LinkId, LinkSet};
