//! App - アプリケーション層
//!
//! ports と pipeline を組み合わせて、実行可能なアプリケーションにする。
//!
//! # 主要コンポーネント
//! - **AppBuilder / App**: 設定からの構築とライフサイクル
//! - **PluginRegistry**: plugin kind → factory
//! - **WorkerLoop**: キューからタスクを取り出して 1 件ずつ処理
//! - **SweepLoop**: 期限切れ結果の定期削除

pub mod builder;
pub mod registry;
pub mod sweep_loop;
pub mod worker_loop;

pub use self::builder::{App, AppBuilder, BuildError};
pub use self::registry::{PluginRegistry, RegistryError, SegmenterFactory, StageFactory};
pub use self::sweep_loop::{Sweep, SweepLoop};
pub use self::worker_loop::WorkerLoop;
