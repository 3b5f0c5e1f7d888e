//! WebSocket connection to a running simulation.
//!
//! A reader task forwards every inbound frame as a [`StreamEvent`]; a writer
//! task drains outbound text. There are no retries: once the socket drops
//! the stream is finished.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

use simcanvas_chat::reducer::{CONNECTION_ERROR, StreamEvent};
use simcanvas_core::error::{Result, SimCanvasError};

pub struct SimulationStream {
    url: String,
    open: Arc<AtomicBool>,
    outbound: Option<mpsc::UnboundedSender<WsMessage>>,
    reader: JoinHandle<()>,
}

impl SimulationStream {
    /// Open the socket. The returned receiver yields `Opened` first and `Closed` last.
    pub async fn connect(url: &str) -> Result<(Self, mpsc::UnboundedReceiver<StreamEvent>)> {
        let (ws, _) = connect_async(url).await.map_err(|e| {
            warn!(%url, %e, "WebSocket connect failed");
            SimCanvasError::Transport(e.to_string())
        })?;
        info!(%url, "WebSocket connected");

        let (mut sink, mut source) = ws.split();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<WsMessage>();
        let open = Arc::new(AtomicBool::new(true));

        let _ = event_tx.send(StreamEvent::Opened);

        tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                let closing = matches!(msg, WsMessage::Close(_));
                if let Err(e) = sink.send(msg).await {
                    debug!(%e, "WebSocket write failed");
                    break;
                }
                if closing {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let reader_open = open.clone();
        let reader = tokio::spawn(async move {
            while let Some(frame) = source.next().await {
                match frame {
                    Ok(WsMessage::Text(text)) => {
                        if event_tx.send(StreamEvent::Frame(text.as_str().to_owned())).is_err() {
                            break;
                        }
                    }
                    Ok(WsMessage::Close(_)) => break,
                    Ok(other) => debug!(kind = ?other, "Ignoring non-text frame"),
                    Err(e) => {
                        warn!(%e, "WebSocket error");
                        let _ = event_tx.send(StreamEvent::Error(CONNECTION_ERROR.into()));
                        break;
                    }
                }
            }
            reader_open.store(false, Ordering::SeqCst);
            info!("WebSocket disconnected");
            let _ = event_tx.send(StreamEvent::Closed);
        });

        Ok((
            Self {
                url: url.to_string(),
                open,
                outbound: Some(out_tx),
                reader,
            },
            event_rx,
        ))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst) && self.outbound.is_some()
    }

    /// Send raw text. Returns `false` (and logs) when the socket is not open.
    pub fn send(&self, text: &str) -> bool {
        if self.open.load(Ordering::SeqCst) {
            if let Some(tx) = &self.outbound {
                if tx.send(WsMessage::Text(text.to_string().into())).is_ok() {
                    return true;
                }
            }
        }
        warn!(url = %self.url, "WebSocket is not connected");
        false
    }

    /// Send a close frame and stop accepting outbound text.
    pub fn close(&mut self) {
        self.open.store(false, Ordering::SeqCst);
        if let Some(tx) = self.outbound.take() {
            let _ = tx.send(WsMessage::Close(None));
            debug!(url = %self.url, "WebSocket close requested");
        }
    }
}

impl Drop for SimulationStream {
    fn drop(&mut self) {
        self.close();
        self.reader.abort();
    }
}
