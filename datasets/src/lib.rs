//! Shared data types for the recommendation pipeline: supervision samples,
//! labelled feature rows and the cancellation token threaded through every run.

pub mod cancel;
pub mod jsonl;
pub mod labelled;
pub mod sample;

pub use cancel::{CancelToken, Cancelled};
pub use jsonl::MmapSamples;
pub use labelled::{Example, Examples};
pub use sample::Sample;
