//! Whole-waveform inference over chunked, aligned segments

mod merge;
mod routine;

pub use merge::{compute_offset, merge_chunks};
pub use routine::{ChunkedInference, InferenceRoutine};
