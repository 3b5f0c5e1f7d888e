//! Chat session controller: one simulation, one connection, one chat store.

use tokio::sync::mpsc;
use tracing::{info, warn};

use simcanvas_chat::reducer::{CONNECTION_ERROR, StreamEvent, apply_stream_event};
use simcanvas_chat::store::ChatStore;
use simcanvas_core::error::Result;
use simcanvas_core::simulation::{SimulationParams, SimulationResponse};
use simcanvas_core::types::Message;

use crate::api::SimulationApi;
use crate::stream::SimulationStream;

pub struct ChatSession {
    api: SimulationApi,
    stream: Option<SimulationStream>,
    events: Option<mpsc::UnboundedReceiver<StreamEvent>>,
}

impl ChatSession {
    pub fn new(api: SimulationApi) -> Self {
        Self {
            api,
            stream: None,
            events: None,
        }
    }

    pub fn api(&self) -> &SimulationApi {
        &self.api
    }

    pub fn is_connected(&self) -> bool {
        self.stream.as_ref().is_some_and(SimulationStream::is_open)
    }

    /// Validate, reset the chat, create the simulation, then stream it.
    ///
    /// Validation failures return before any state is touched.
    pub async fn submit(
        &mut self,
        store: &mut ChatStore,
        params: &SimulationParams,
    ) -> Result<SimulationResponse> {
        params.validate()?;
        store.reset();

        let response = self.api.create_simulation(params).await.inspect_err(|e| {
            warn!(%e, "Failed to create simulation");
            store.set_error(Some(e.to_string()));
            store.set_loading(false);
        })?;
        info!(id = %response.id, "Simulation created");

        store.set_simulation_id(Some(response.id.clone()));
        self.connect(store, Some(&response.id)).await;
        Ok(response)
    }

    /// Replace the current connection. `None` only tears the old one down.
    pub async fn connect(&mut self, store: &mut ChatStore, simulation_id: Option<&str>) {
        self.disconnect();
        let Some(id) = simulation_id else {
            return;
        };

        store.set_loading(true);
        let url = self.api.stream_url(id);
        match SimulationStream::connect(&url).await {
            Ok((stream, events)) => {
                self.stream = Some(stream);
                self.events = Some(events);
            }
            Err(e) => {
                warn!(%e, %id, "Could not open simulation stream");
                apply_stream_event(store, StreamEvent::Error(CONNECTION_ERROR.into()));
            }
        }
    }

    /// Wait for the next connection event. `None` once the stream is finished.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        self.events.as_mut()?.recv().await
    }

    /// Apply the next event to the store. Returns `false` when nothing is left.
    pub async fn pump(&mut self, store: &mut ChatStore) -> bool {
        match self.next_event().await {
            Some(event) => {
                apply_stream_event(store, event);
                true
            }
            None => false,
        }
    }

    /// Append a user message and send its raw text. Blank input is ignored.
    pub fn send_user_message(&mut self, store: &mut ChatStore, text: &str) -> bool {
        if text.trim().is_empty() {
            return false;
        }
        store.add_message(Message::user(text));
        match &self.stream {
            Some(stream) => stream.send(text),
            None => {
                warn!("WebSocket is not connected");
                false
            }
        }
    }

    pub fn disconnect(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.close();
        }
        self.events = None;
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.disconnect();
    }
}
