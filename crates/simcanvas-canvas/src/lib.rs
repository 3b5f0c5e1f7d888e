//! Canvas entity store and the view adapter that keeps a graph view in sync with it.

pub mod protocol;
pub mod snapshot;
pub mod store;
pub mod view;

pub use protocol::{EdgeChange, NodeChange, StoreMutation};
pub use snapshot::SnapshotFile;
pub use store::{CanvasSnapshot, CanvasState, CanvasStore, LoadOutcome};
pub use view::{CanvasView, LocalChange, ViewState, reconcile};
