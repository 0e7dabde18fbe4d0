//! Chat dispatch.
//!
//! One dispatch moves through `Submitting`, `Compiling` and `Streaming`
//! before settling in a terminal state. Presenters follow along through
//! [`DispatchEvent`]s on an unbounded channel; the caller receives the
//! [`DispatchOutcome`] or the error that ended the run.

pub mod dispatcher;
pub mod state;

pub use dispatcher::{CHAT_EVENT, ChatDispatcher, is_out_of_context};
pub use state::{DispatchEvent, DispatchOutcome, DispatchState};
