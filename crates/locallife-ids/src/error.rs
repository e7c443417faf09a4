//! Error types for id generation.

use thiserror::Error;

/// Errors that can occur while generating an id.
#[derive(Debug, Error)]
pub enum IdError {
	/// The shared store could not be reached or rejected the command.
	#[error("sequence store error: {0}")]
	Store(String),

	/// The daily sequence for one purpose tag exceeded the 32-bit range.
	///
	/// Wrapping would corrupt the timestamp bits, so generation fails
	/// instead.
	#[error("daily sequence overflow for tag '{0}'")]
	SequenceOverflow(String),

	/// The wall clock reads earlier than the generator epoch.
	#[error("system clock is before the generator epoch")]
	ClockBeforeEpoch,
}
