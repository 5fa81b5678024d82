//! Pipeline - セグメント分割 → ステージチェーン → 結果保存
//!
//! - **segmentation**: pick the first acceptable segmentation
//! - **stage_chain**: cost- and confidence-gated escalation per segment
//! - **orchestrator**: one task end to end (store once, then callback)

pub mod descriptor;
pub mod orchestrator;
pub mod segmentation;
pub mod stage_chain;

pub use self::descriptor::{SegmenterDescriptor, StageDescriptor};
pub use self::orchestrator::{Orchestrator, Pipeline};
pub use self::segmentation::segment_content;
pub use self::stage_chain::{DEFAULT_CONFIDENCE_THRESHOLD, StageChain};
