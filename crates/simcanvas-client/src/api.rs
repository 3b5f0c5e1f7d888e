//! REST client for the simulation backend.
//!
//! `POST /api/simulations` creates a run, `GET /api/simulations/{id}` fetches it.
//! Progress then streams over `/ws/simulations/{id}` (see [`crate::stream`]).

use tracing::{debug, warn};

use simcanvas_core::config::Config;
use simcanvas_core::error::{Result, SimCanvasError};
use simcanvas_core::simulation::{SimulationParams, SimulationResponse};

pub struct SimulationApi {
    pub base_url: String,
    pub ws_base_url: String,
    client: reqwest::Client,
}

impl SimulationApi {
    pub fn new(base_url: &str, ws_base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            ws_base_url: ws_base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.api_base_url(), &config.ws_base_url())
    }

    pub async fn create_simulation(&self, params: &SimulationParams) -> Result<SimulationResponse> {
        let url = format!("{}/api/simulations", self.base_url);
        debug!(%url, rounds = params.rounds, "Creating simulation");

        let response = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(params)
            .send()
            .await
            .map_err(transport)?;

        decode(response).await
    }

    pub async fn get_simulation(&self, id: &str) -> Result<SimulationResponse> {
        let url = format!("{}/api/simulations/{id}", self.base_url);
        debug!(%url, "Fetching simulation");

        let response = self.client.get(&url).send().await.map_err(transport)?;

        decode(response).await
    }

    /// WebSocket endpoint streaming updates for one simulation.
    pub fn stream_url(&self, id: &str) -> String {
        format!("{}/ws/simulations/{id}", self.ws_base_url)
    }
}

async fn decode(response: reqwest::Response) -> Result<SimulationResponse> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        warn!(%status, %body, "Simulation API error");
        return Err(SimCanvasError::Http {
            status: status.as_u16(),
        });
    }

    let body = response.text().await.map_err(transport)?;
    serde_json::from_str(&body).map_err(|e| SimCanvasError::Parse(e.to_string()))
}

fn transport(e: reqwest::Error) -> SimCanvasError {
    SimCanvasError::Transport(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_trimmed() {
        let api = SimulationApi::new("http://localhost:8000/", "ws://localhost:8000/");
        assert_eq!(api.base_url, "http://localhost:8000");
        assert_eq!(api.stream_url("abc"), "ws://localhost:8000/ws/simulations/abc");
    }

    #[test]
    fn test_from_default_config() {
        let api = SimulationApi::from_config(&Config::default());
        assert_eq!(api.base_url, "http://localhost:8000");
        assert_eq!(api.stream_url("s1"), "ws://localhost:8000/ws/simulations/s1");
    }
}
