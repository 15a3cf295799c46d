//! Talking-head video generation through the KDTalker Gradio Space.

use serde_json::{json, Value as JsonValue};
use tracing::info;

use super::gradio::GradioClient;
use super::{HealthStatus, ServiceHealth};
use crate::error::{AppError, AppResult};

/// Gradio api_name for video generation.
const GENERATE_API: &str = "generate";
/// Motion smoothing applied to pitch, yaw, roll and translation.
const SMOOTHING: f64 = 0.8;

/// Client for the talking-head video Space.
#[derive(Clone)]
pub struct VideoClient {
    gradio: GradioClient,
    space: String,
}

impl VideoClient {
    pub fn new(space: String, hf_token: Option<&str>, timeout_secs: u64) -> AppResult<Self> {
        let root = super::gradio::space_root_url(&space);
        Self::with_root(root, space, hf_token, timeout_secs)
    }

    /// Like [`VideoClient::new`] but against an explicit root URL instead of
    /// the hosted Space location.
    pub(crate) fn with_root(
        root_url: String,
        space: String,
        hf_token: Option<&str>,
        timeout_secs: u64,
    ) -> AppResult<Self> {
        let gradio = GradioClient::new(root_url, hf_token, timeout_secs)?;
        Ok(Self { gradio, space })
    }

    /// Space id, e.g. `hants/KDTalker`.
    pub fn space(&self) -> &str {
        &self.space
    }

    /// Animate a portrait with driving audio and return the MP4 bytes.
    pub async fn generate_video(
        &self,
        portrait_filename: &str,
        portrait: Vec<u8>,
        audio_filename: &str,
        audio: Vec<u8>,
    ) -> AppResult<Vec<u8>> {
        info!(
            portrait_bytes = portrait.len(),
            audio_bytes = audio.len(),
            space = %self.space,
            "Generating talking-head video"
        );

        let audio_path = self.gradio.upload_file(audio_filename, audio).await?;
        let portrait_path = self.gradio.upload_file(portrait_filename, portrait).await?;

        let args = build_generate_args(&audio_path, &portrait_path);
        let result = self.gradio.call_and_wait(GENERATE_API, args).await?;

        let location = video_location(&result).ok_or_else(|| {
            AppError::ExternalService("Video Space returned no video output".to_string())
        })?;

        let video = self.gradio.fetch_file(&location).await?;
        info!(video_bytes = video.len(), "Video generated");
        Ok(video)
    }

    /// Probe whether the Space is reachable.
    pub async fn health_check(&self) -> ServiceHealth {
        if self.gradio.is_reachable().await {
            ServiceHealth::new(HealthStatus::Healthy, None)
        } else {
            ServiceHealth::new(
                HealthStatus::Unhealthy,
                Some(format!("Space {} is unreachable", self.space)),
            )
        }
    }
}

/// Positional argument list for `/generate`.
fn build_generate_args(audio_path: &str, portrait_path: &str) -> Vec<JsonValue> {
    vec![
        GradioClient::file_ref(audio_path),    // upload_driven_audio
        JsonValue::Null,                       // tts_driven_audio
        json!("upload"),                       // driven_audio_type
        GradioClient::file_ref(portrait_path), // source_image
        json!(SMOOTHING),                      // smoothed_pitch
        json!(SMOOTHING),                      // smoothed_yaw
        json!(SMOOTHING),                      // smoothed_roll
        json!(SMOOTHING),                      // smoothed_t
    ]
}

/// The Space has returned its video output as a `{"video": file}` object, a
/// bare file reference or a plain path depending on version.
fn video_location(result: &[JsonValue]) -> Option<String> {
    let first = result.first()?;
    if let Some(video) = first.get("video") {
        if !video.is_null() {
            return GradioClient::file_location(video);
        }
    }
    GradioClient::file_location(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_args_shape() {
        let args = build_generate_args("/tmp/a.wav", "/tmp/p.png");
        assert_eq!(args.len(), 8);
        assert_eq!(args[0]["path"].as_str(), Some("/tmp/a.wav"));
        assert!(args[1].is_null());
        assert_eq!(args[2].as_str(), Some("upload"));
        assert_eq!(args[3]["path"].as_str(), Some("/tmp/p.png"));
        assert_eq!(args[4].as_f64(), Some(0.8));
    }

    #[test]
    fn test_video_location_variants() {
        let wrapped = vec![json!({ "video": { "path": "/tmp/out.mp4" } })];
        assert_eq!(video_location(&wrapped).as_deref(), Some("/tmp/out.mp4"));

        let bare_ref = vec![json!({ "url": "https://x/file=/tmp/out.mp4" })];
        assert_eq!(
            video_location(&bare_ref).as_deref(),
            Some("https://x/file=/tmp/out.mp4")
        );

        let plain = vec![json!("/tmp/out.mp4")];
        assert_eq!(video_location(&plain).as_deref(), Some("/tmp/out.mp4"));

        let null_video = vec![json!({ "video": null, "path": "/tmp/alt.mp4" })];
        assert_eq!(video_location(&null_video).as_deref(), Some("/tmp/alt.mp4"));

        assert_eq!(video_location(&[]), None);
    }

    #[tokio::test]
    async fn test_generate_video_round_trip() {
        let mut server = mockito::Server::new_async().await;

        let _uploads = server
            .mock("POST", "/gradio_api/upload")
            .with_status(200)
            .with_body(r#"["/tmp/gradio/up/file.bin"]"#)
            .expect(2)
            .create_async()
            .await;

        let _call = server
            .mock("POST", "/gradio_api/call/generate")
            .with_status(200)
            .with_body(r#"{"event_id": "ev-vid"}"#)
            .create_async()
            .await;

        let video_url = format!("{}/file/lecture.mp4", server.url());
        let _result = server
            .mock("GET", "/gradio_api/call/generate/ev-vid")
            .with_status(200)
            .with_body(format!(
                "event: complete\ndata: [{{\"video\": {{\"url\": \"{}\"}}}}]\n\n",
                video_url
            ))
            .create_async()
            .await;

        let _file = server
            .mock("GET", "/file/lecture.mp4")
            .with_status(200)
            .with_body(vec![0, 0, 0, 24])
            .create_async()
            .await;

        let client =
            VideoClient::with_root(server.url(), "hants/KDTalker".to_string(), None, 30).unwrap();

        let video = client
            .generate_video("portrait.png", vec![1], "speech.wav", vec![2])
            .await
            .unwrap();

        assert_eq!(video, vec![0, 0, 0, 24]);
    }
}
