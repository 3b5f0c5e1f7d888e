//! Simulation backend client.
//!
//! [`api::SimulationApi`] covers the REST endpoints, [`stream::SimulationStream`]
//! the per-simulation WebSocket, and [`session::ChatSession`] ties both to a
//! [`simcanvas_chat::ChatStore`].

pub mod api;
pub mod session;
pub mod stream;

pub use api::SimulationApi;
pub use session::ChatSession;
pub use stream::SimulationStream;
