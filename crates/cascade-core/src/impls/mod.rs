//! Impls - ports の実装
//!
//! - **InMemoryTaskQueue / RedisTaskQueue**: TaskQueue backends
//! - **InMemoryResultStore / RedisResultStore**: ResultStore backends
//! - **HttpCallbackNotifier**: CallbackNotifier over HTTP POST
//! - **KeywordStage / SentenceSegmenter**: built-in plugins

pub mod http_callback;
pub mod inmem_queue;
pub mod inmem_results;
pub mod keyword_stage;
pub mod redis_queue;
pub mod redis_results;
pub mod sentence_segmenter;

pub use self::http_callback::HttpCallbackNotifier;
pub use self::inmem_queue::InMemoryTaskQueue;
pub use self::inmem_results::InMemoryResultStore;
pub use self::keyword_stage::KeywordStage;
pub use self::redis_queue::RedisTaskQueue;
pub use self::redis_results::RedisResultStore;
pub use self::sentence_segmenter::SentenceSegmenter;
