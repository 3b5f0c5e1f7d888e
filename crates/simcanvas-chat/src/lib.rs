//! Chat state for simulation sessions and the reducer that feeds it from stream frames.

pub mod reducer;
pub mod store;

pub use reducer::{StreamEvent, apply_frame, apply_stream_event, reduce_frame};
pub use store::{ChatState, ChatStore, ChatUpdate};
