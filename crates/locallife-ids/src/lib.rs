//! Globally unique, time-ordered id generation
//!
//! Ids are 64-bit integers composed of a seconds-since-epoch timestamp in
//! the high 32 bits and a date-scoped atomic sequence in the low 32 bits.
//! The sequence counter key embeds the calendar date, so it resets
//! implicitly each day without any cleanup job; the shared store's atomic
//! increment is the only synchronization, which keeps generation safe for
//! unbounded concurrent callers.

mod error;
mod generator;
mod sequence;

pub use error::IdError;
pub use generator::IdGenerator;
pub use sequence::{MemorySequenceBackend, RedisSequenceBackend, SequenceBackend};

/// Result type for id generation
pub type IdResult<T> = Result<T, IdError>;
