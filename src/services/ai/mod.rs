//! Clients for the hosted AI services behind the generation pipeline.
//!
//! Three adapters: an OpenAI-compatible LLM for scripts, a Gradio Space for
//! voice-cloned TTS and another for talking-head video. Each exposes a typed
//! generate method plus `health_check()`; the aggregate caches health results
//! so the dashboard polling does not hammer the remote services.

pub mod gradio;
pub mod llm;
pub mod tts;
pub mod video;

pub use llm::{LlmClient, ScriptGeneration};
pub use tts::{SpeechGeneration, TtsClient};
pub use video::VideoClient;

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use utoipa::ToSchema;

use crate::config::AiSettings;
use crate::error::AppResult;
use crate::models::ServiceModelInfo;

/// How long one aggregated health probe stays valid.
const HEALTH_CACHE_TTL: Duration = Duration::from_secs(300);

/// Health of a single remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    /// Required credentials are missing; the service was not probed.
    Unconfigured,
}

/// Overall health across all services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OverallHealth {
    Healthy,
    Degraded,
    Unhealthy,
}

/// One service's probe result.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ServiceHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ServiceHealth {
    pub fn new(status: HealthStatus, detail: Option<String>) -> Self {
        Self { status, detail }
    }
}

/// Aggregated probe results for the health endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ServicesHealth {
    pub status: OverallHealth,
    pub services: ServiceHealthMap,
    /// True when served from the cache instead of a fresh probe.
    pub cached: bool,
    pub checked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ServiceHealthMap {
    pub llm: ServiceHealth,
    pub tts: ServiceHealth,
    pub video: ServiceHealth,
}

struct CachedHealth {
    at: Instant,
    result: ServicesHealth,
}

/// All three service clients plus the shared health cache.
#[derive(Clone)]
pub struct AiClients {
    pub llm: LlmClient,
    pub tts: TtsClient,
    pub video: VideoClient,
    health_cache: Arc<RwLock<Option<CachedHealth>>>,
}

impl AiClients {
    pub fn from_settings(settings: &AiSettings) -> AppResult<Self> {
        let token = settings.hf_api_token.as_deref();
        Ok(Self {
            llm: LlmClient::new(
                settings.llm_base_url.clone(),
                settings.llm_model.clone(),
                settings.hf_api_token.clone(),
                settings.llm_timeout_secs,
            )?,
            tts: TtsClient::new(settings.tts_space.clone(), token, settings.tts_timeout_secs)?,
            video: VideoClient::new(
                settings.video_space.clone(),
                token,
                settings.video_timeout_secs,
            )?,
            health_cache: Arc::new(RwLock::new(None)),
        })
    }

    /// Probe all services, reusing a cached result when it is recent enough.
    pub async fn health(&self) -> ServicesHealth {
        {
            let cache = self.health_cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.at.elapsed() < HEALTH_CACHE_TTL {
                    let mut result = cached.result.clone();
                    result.cached = true;
                    return result;
                }
            }
        }

        let (llm, tts, video) = tokio::join!(
            self.llm.health_check(),
            self.tts.health_check(),
            self.video.health_check()
        );

        let result = ServicesHealth {
            status: aggregate_status(&[&llm, &tts, &video]),
            services: ServiceHealthMap { llm, tts, video },
            cached: false,
            checked_at: Utc::now(),
        };

        let mut cache = self.health_cache.write().await;
        *cache = Some(CachedHealth {
            at: Instant::now(),
            result: result.clone(),
        });
        result
    }

    /// Metadata recorded on jobs that used the LLM.
    pub fn llm_info(&self) -> ServiceModelInfo {
        ServiceModelInfo {
            model_name: self.llm.model().to_string(),
            model_type: "llm".to_string(),
            space: None,
            provider: None,
        }
    }

    /// Metadata recorded on jobs that used the TTS Space.
    pub fn tts_info(&self) -> ServiceModelInfo {
        ServiceModelInfo {
            model_name: tts::TTS_MODEL.to_string(),
            model_type: "tts".to_string(),
            space: Some(self.tts.space().to_string()),
            provider: None,
        }
    }

    /// Metadata recorded on jobs that used the video Space.
    pub fn video_info(&self) -> ServiceModelInfo {
        let model_name = self
            .video
            .space()
            .rsplit('/')
            .next()
            .unwrap_or("unknown")
            .to_string();
        ServiceModelInfo {
            model_name,
            model_type: "video".to_string(),
            space: Some(self.video.space().to_string()),
            provider: None,
        }
    }
}

fn aggregate_status(services: &[&ServiceHealth]) -> OverallHealth {
    let healthy = services
        .iter()
        .filter(|s| s.status == HealthStatus::Healthy)
        .count();
    if healthy == services.len() {
        OverallHealth::Healthy
    } else if healthy == 0 {
        OverallHealth::Unhealthy
    } else {
        OverallHealth::Degraded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn healthy() -> ServiceHealth {
        ServiceHealth::new(HealthStatus::Healthy, None)
    }

    fn unhealthy() -> ServiceHealth {
        ServiceHealth::new(HealthStatus::Unhealthy, Some("down".to_string()))
    }

    #[test]
    fn test_aggregate_status() {
        assert_eq!(
            aggregate_status(&[&healthy(), &healthy(), &healthy()]),
            OverallHealth::Healthy
        );
        assert_eq!(
            aggregate_status(&[&healthy(), &unhealthy(), &healthy()]),
            OverallHealth::Degraded
        );
        assert_eq!(
            aggregate_status(&[&unhealthy(), &unhealthy(), &unhealthy()]),
            OverallHealth::Unhealthy
        );
        let unconfigured = ServiceHealth::new(HealthStatus::Unconfigured, None);
        assert_eq!(
            aggregate_status(&[&healthy(), &unconfigured, &healthy()]),
            OverallHealth::Degraded
        );
    }

    fn local_clients() -> AiClients {
        // Port 1 refuses connections immediately, so probes stay local.
        AiClients {
            llm: LlmClient::new("http://127.0.0.1:1".to_string(), "m".to_string(), None, 300)
                .unwrap(),
            tts: TtsClient::with_root(
                "http://127.0.0.1:1".to_string(),
                "owner/tts".to_string(),
                None,
                30,
            )
            .unwrap(),
            video: VideoClient::with_root(
                "http://127.0.0.1:1".to_string(),
                "owner/video".to_string(),
                None,
                30,
            )
            .unwrap(),
            health_cache: Arc::new(RwLock::new(None)),
        }
    }

    #[tokio::test]
    async fn test_health_caches_results() {
        let clients = local_clients();

        let first = clients.health().await;
        assert!(!first.cached);
        assert_eq!(first.status, OverallHealth::Unhealthy);
        assert_eq!(first.services.llm.status, HealthStatus::Unconfigured);

        let second = clients.health().await;
        assert!(second.cached);
        assert_eq!(second.checked_at, first.checked_at);
    }

    #[test]
    fn test_model_info_shapes() {
        let clients = local_clients();

        let llm = clients.llm_info();
        assert_eq!(llm.model_name, "m");
        assert_eq!(llm.model_type, "llm");

        let tts = clients.tts_info();
        assert_eq!(tts.model_name, tts::TTS_MODEL);
        assert_eq!(tts.space.as_deref(), Some("owner/tts"));

        let video = clients.video_info();
        assert_eq!(video.model_name, "video");
        assert_eq!(video.space.as_deref(), Some("owner/video"));
    }
}
