//! Configuration loading and validation.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_SPLIT_RATIO: f64 = 60.0;

/// Top-level simcanvas configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api: Option<ApiConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub canvas: Option<CanvasConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout: Option<LayoutConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

/// Simulation backend endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiConfig {
    /// REST base URL (default: http://localhost:8000).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// WebSocket base URL. Derived from `base_url` when omitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ws_base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanvasConfig {
    /// Synthesize an empty canvas when loading an unknown id (default: true).
    #[serde(default = "default_true")]
    pub placeholder_on_miss: bool,

    /// Where the CLI keeps its canvas snapshot (default: `~/.simcanvas/canvases.json`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_path: Option<String>,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            placeholder_on_miss: true,
            snapshot_path: None,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayoutConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_split_ratio: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "plain" (default) or "json".
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Log level override (trace/debug/info/warn/error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Per-crate log level overrides (e.g. "simcanvas_client=debug").
    #[serde(default)]
    pub filters: Vec<String>,

    /// Output target: "stderr" (default) or "stdout".
    #[serde(default = "default_log_output")]
    pub output: String,
}

fn default_log_format() -> String {
    "plain".into()
}

fn default_log_output() -> String {
    "stderr".into()
}

/// Substitute `${ENV_VAR}` patterns in a string with their environment variable values.
fn substitute_env_vars(input: &str) -> String {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").expect("static regex");
    re.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_default()
    })
    .into_owned()
}

impl Config {
    /// Load config from a JSON5 file, substituting `${ENV_VAR}` references.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(crate::error::SimCanvasError::Io)?;

        // Substitute ${ENV_VAR} references before parsing
        let substituted = substitute_env_vars(&raw);

        let config: Config = json5::from_str(&substituted)
            .map_err(|e| crate::error::SimCanvasError::Config(e.to_string()))?;

        Ok(config)
    }

    /// Default config file location.
    pub fn config_path() -> PathBuf {
        data_dir().join("config.json")
    }

    /// REST base URL without a trailing slash.
    pub fn api_base_url(&self) -> String {
        self.api
            .as_ref()
            .and_then(|a| a.base_url.as_deref())
            .unwrap_or(DEFAULT_API_BASE_URL)
            .trim_end_matches('/')
            .to_string()
    }

    /// WebSocket base URL; falls back to the REST URL with its scheme swapped.
    pub fn ws_base_url(&self) -> String {
        if let Some(ws) = self.api.as_ref().and_then(|a| a.ws_base_url.as_deref()) {
            return ws.trim_end_matches('/').to_string();
        }
        let base = self.api_base_url();
        if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            base
        }
    }

    pub fn placeholder_on_miss(&self) -> bool {
        self.canvas
            .as_ref()
            .map(|c| c.placeholder_on_miss)
            .unwrap_or(true)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.canvas
            .as_ref()
            .and_then(|c| c.snapshot_path.as_ref())
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir().join("canvases.json"))
    }

    pub fn layout_path(&self) -> PathBuf {
        self.layout
            .as_ref()
            .and_then(|l| l.path.as_ref())
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir().join("layout-storage.json"))
    }

    pub fn default_split_ratio(&self) -> f64 {
        self.layout
            .as_ref()
            .and_then(|l| l.default_split_ratio)
            .unwrap_or(DEFAULT_SPLIT_RATIO)
    }

    /// Get a config value by dotted path (e.g. "api.base_url").
    pub fn get_path(&self, path: &str) -> Option<serde_json::Value> {
        let json = serde_json::to_value(self).ok()?;
        let mut current = &json;
        for segment in path.split('.') {
            current = current.get(segment)?;
        }
        Some(current.clone())
    }

    /// Validate config, returning (warnings, errors).
    pub fn validate(&self) -> (Vec<String>, Vec<String>) {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        if let Some(api) = &self.api {
            if let Some(base) = &api.base_url {
                if !(base.starts_with("http://") || base.starts_with("https://")) {
                    errors.push(format!("api.base_url must be an http(s) URL: {base}"));
                }
            }
            if let Some(ws) = &api.ws_base_url {
                if !(ws.starts_with("ws://") || ws.starts_with("wss://")) {
                    errors.push(format!("api.ws_base_url must be a ws(s) URL: {ws}"));
                }
            }
        }

        if let Some(ratio) = self.layout.as_ref().and_then(|l| l.default_split_ratio) {
            if !(0.0..=100.0).contains(&ratio) {
                errors.push(format!(
                    "layout.default_split_ratio must be within 0..=100, got {ratio}"
                ));
            }
        }

        if !self.placeholder_on_miss() {
            warnings.push(
                "canvas.placeholder_on_miss is off: loading an unknown canvas id fails".to_string(),
            );
        }

        (warnings, errors)
    }
}

/// Base directory for simcanvas data: `~/.simcanvas/`
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".simcanvas")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_substitution() {
        // SAFETY: test-local variable name, no concurrent readers.
        unsafe { std::env::set_var("SIMCANVAS_TEST_HOST", "example.test") };
        let result = substitute_env_vars("http://${SIMCANVAS_TEST_HOST}:8000");
        assert_eq!(result, "http://example.test:8000");
    }

    #[test]
    fn test_env_var_missing() {
        let result = substitute_env_vars("${SIMCANVAS_SURELY_UNSET_VAR}");
        assert_eq!(result, "");
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api_base_url(), "http://localhost:8000");
        assert_eq!(config.ws_base_url(), "ws://localhost:8000");
        assert!(config.placeholder_on_miss());
        assert_eq!(config.default_split_ratio(), 60.0);
    }

    #[test]
    fn test_ws_url_derivation() {
        let config: Config =
            json5::from_str(r#"{ api: { base_url: "https://sim.example.com/" } }"#).unwrap();
        assert_eq!(config.api_base_url(), "https://sim.example.com");
        assert_eq!(config.ws_base_url(), "wss://sim.example.com");

        let config: Config = json5::from_str(
            r#"{ api: { base_url: "http://a:1", ws_base_url: "ws://b:2/" } }"#,
        )
        .unwrap();
        assert_eq!(config.ws_base_url(), "ws://b:2");
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("nope.json")).unwrap();
        assert!(config.api.is_none());
    }

    #[test]
    fn test_load_json5_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            "{\n  // strict loading\n  canvas: { placeholder_on_miss: false },\n}\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert!(!config.placeholder_on_miss());
    }

    #[test]
    fn test_load_invalid_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            Config::load(&path),
            Err(crate::error::SimCanvasError::Config(_))
        ));
    }

    #[test]
    fn test_logging_config_defaults() {
        let cfg: LoggingConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.format, "plain");
        assert_eq!(cfg.output, "stderr");
        assert!(cfg.level.is_none());
        assert!(cfg.filters.is_empty());
    }

    #[test]
    fn test_get_path() {
        let config: Config = json5::from_str(r#"{ api: { base_url: "http://x:1" } }"#).unwrap();
        assert_eq!(
            config.get_path("api.base_url"),
            Some(serde_json::json!("http://x:1"))
        );
        assert_eq!(config.get_path("api.missing"), None);
    }

    #[test]
    fn test_validate_bad_urls_and_ratio() {
        let config: Config = json5::from_str(
            r#"{ api: { base_url: "ftp://x", ws_base_url: "http://y" },
                 layout: { default_split_ratio: 140 } }"#,
        )
        .unwrap();
        let (_warnings, errors) = config.validate();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_validate_strict_loading_warns() {
        let config: Config = json5::from_str(r#"{ canvas: { placeholder_on_miss: false } }"#).unwrap();
        let (warnings, errors) = config.validate();
        assert_eq!(warnings.len(), 1);
        assert!(errors.is_empty());
    }
}
