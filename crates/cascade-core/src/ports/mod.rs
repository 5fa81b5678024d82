//! Ports - 抽象化レイヤー
//!
//! 各 trait は外部システム（Redis, HTTP, プラグイン）へのインターフェースを
//! 提供し、実装の詳細を隠蔽します。
//!
//! - TaskQueue / ResultStore: memory or Redis backends
//! - Stage / Segmenter: pluggable classification strategies
//! - CallbackNotifier: completion callbacks
//! - TaskHandler: what the worker loop runs
//! - Clock: time source for expiry

pub mod callback;
pub mod clock;
pub mod handler;
pub mod result_store;
pub mod segmenter;
pub mod stage;
pub mod task_queue;

pub use self::callback::CallbackNotifier;
pub use self::clock::{Clock, ManualClock, SystemClock};
pub use self::handler::TaskHandler;
pub use self::result_store::ResultStore;
pub use self::segmenter::Segmenter;
pub use self::stage::Stage;
pub use self::task_queue::TaskQueue;
