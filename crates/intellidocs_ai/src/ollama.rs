use std::time::Duration;

use intellidocs_core::config::BackendConfig;
use intellidocs_core::error::AppError;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
}

impl OllamaClient {
    /// Create a client for Ollama. This is strictly limited to `127.0.0.1`.
    pub fn new(base_url: &str) -> Result<Self, AppError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        if !is_loopback_http(&base_url) {
            return Err(AppError::new(
                "AI_REMOTE_NOT_ALLOWED",
                "Ollama base URL must be localhost (127.0.0.1)",
            )
            .with_details(format!("base_url={base_url}")));
        }
        Ok(Self { base_url })
    }

    pub fn from_config(cfg: &BackendConfig) -> Result<Self, AppError> {
        Self::new(&cfg.base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn health_check(&self) -> Result<(), AppError> {
        let url = format!("{}/api/tags", self.base_url);
        debug!(%url, "ollama health check");
        let resp = ureq::get(&url).timeout(Duration::from_millis(800)).call();

        match resp {
            Ok(r) if r.status() == 200 => Ok(()),
            Ok(r) => Err(
                AppError::new("AI_OLLAMA_UNHEALTHY", "Ollama health check failed")
                    .with_details(format!("status={}", r.status())),
            ),
            Err(e) => Err(AppError::new(
                "AI_OLLAMA_UNREACHABLE",
                "Failed to reach Ollama on 127.0.0.1",
            )
            .with_details(e.to_string())
            .with_retryable(true)),
        }
    }
}

/// `http://127.0.0.1` with an optional non-zero port and no path, userinfo or suffix.
fn is_loopback_http(url: &str) -> bool {
    let Some(authority) = url.strip_prefix("http://") else {
        return false;
    };
    if authority.contains(['/', '@', '?', '#']) {
        return false;
    }
    match authority.split_once(':') {
        None => authority == "127.0.0.1",
        Some((host, port)) => {
            host == "127.0.0.1" && matches!(port.parse::<u16>(), Ok(p) if p > 0)
        }
    }
}
