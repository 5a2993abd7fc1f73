pub mod answer_cache;

pub use answer_cache::{AnswerCache, CacheEntry};
