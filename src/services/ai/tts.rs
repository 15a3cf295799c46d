//! Voice-cloned text-to-speech through the Zonos Gradio Space.

use serde_json::{json, Value as JsonValue};
use tracing::info;

use super::gradio::GradioClient;
use super::{HealthStatus, ServiceHealth};
use crate::error::{AppError, AppResult};

/// Model served by the Space.
pub const TTS_MODEL: &str = "Zyphra/Zonos-v0.1-transformer";
/// Gradio api_name for synthesis.
const GENERATE_API: &str = "generate_audio";
/// Conditioning prefix the Space expects before the cloned speech.
const PREFIX_AUDIO_URL: &str =
    "https://github.com/gradio-app/gradio/raw/main/test/test_files/audio_sample.wav";
/// Words-per-unit pacing knob exposed by Zonos.
const SPEAKING_RATE: f64 = 15.0;

/// Synthesized speech plus the seed the Space actually used.
#[derive(Debug, Clone)]
pub struct SpeechGeneration {
    pub audio: Vec<u8>,
    pub seed: Option<i64>,
}

/// Client for the voice-cloning TTS Space.
#[derive(Clone)]
pub struct TtsClient {
    gradio: GradioClient,
    space: String,
}

impl TtsClient {
    pub fn new(space: String, hf_token: Option<&str>, timeout_secs: u64) -> AppResult<Self> {
        let root = super::gradio::space_root_url(&space);
        Self::with_root(root, space, hf_token, timeout_secs)
    }

    /// Like [`TtsClient::new`] but against an explicit root URL instead of the
    /// hosted Space location.
    pub(crate) fn with_root(
        root_url: String,
        space: String,
        hf_token: Option<&str>,
        timeout_secs: u64,
    ) -> AppResult<Self> {
        let gradio = GradioClient::new(root_url, hf_token, timeout_secs)?;
        Ok(Self { gradio, space })
    }

    /// Space id, e.g. `ginigen/VoiceClone-TTS`.
    pub fn space(&self) -> &str {
        &self.space
    }

    /// Synthesize `text` in the voice of the given reference sample.
    pub async fn generate_speech(
        &self,
        text: &str,
        voice_filename: &str,
        voice_sample: Vec<u8>,
    ) -> AppResult<SpeechGeneration> {
        info!(
            text_chars = text.len(),
            sample_bytes = voice_sample.len(),
            space = %self.space,
            "Generating speech"
        );

        let speaker_path = self.gradio.upload_file(voice_filename, voice_sample).await?;
        let args = build_generate_args(text, &speaker_path);
        let result = self.gradio.call_and_wait(GENERATE_API, args).await?;

        let audio_ref = result.first().ok_or_else(|| {
            AppError::ExternalService("TTS Space returned no audio output".to_string())
        })?;
        let location = GradioClient::file_location(audio_ref).ok_or_else(|| {
            AppError::ExternalService("TTS Space returned an unreadable audio reference".to_string())
        })?;

        let audio = self.gradio.fetch_file(&location).await?;
        let seed = result
            .get(1)
            .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)));

        info!(audio_bytes = audio.len(), ?seed, "Speech generated");
        Ok(SpeechGeneration { audio, seed })
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

/// Positional argument list for `/generate_audio`.
///
/// The Space takes 24 inputs; the emotion weights (happiness high, the rest
/// low) and the sampling constants come from the Space's recommended
/// voice-cloning settings and are not user-tunable here.
fn build_generate_args(text: &str, speaker_path: &str) -> Vec<JsonValue> {
    vec![
        json!(TTS_MODEL),                     // model_choice
        json!(text),                          // text
        json!("en-us"),                       // language
        GradioClient::file_ref(speaker_path), // speaker_audio
        GradioClient::url_ref(PREFIX_AUDIO_URL), // prefix_audio
        json!(1),                             // e1 happiness
        json!(0.05),                          // e2 sadness
        json!(0.05),                          // e3 disgust
        json!(0.05),                          // e4 fear
        json!(0.05),                          // e5 surprise
        json!(0.05),                          // e6 anger
        json!(0.1),                           // e7 other
        json!(0.2),                           // e8 neutral
        json!(0.78),                          // vq_single
        json!(24000),                         // fmax
        json!(45),                            // pitch_std
        json!(SPEAKING_RATE),                 // speaking_rate
        json!(4),                             // dnsmos_ovrl
        json!(false),                         // speaker_noised
        json!(2),                             // cfg_scale
        json!(0.15),                          // min_p
        json!(420),                           // seed
        json!(true),                          // randomize_seed
        json!(["emotion"]),                   // unconditional_keys
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_args_shape() {
        let args = build_generate_args("hello", "/tmp/gradio/voice.wav");
        assert_eq!(args.len(), 24);
        assert_eq!(args[0].as_str(), Some(TTS_MODEL));
        assert_eq!(args[1].as_str(), Some("hello"));
        assert_eq!(args[2].as_str(), Some("en-us"));
        assert_eq!(args[3]["path"].as_str(), Some("/tmp/gradio/voice.wav"));
        assert_eq!(args[4]["url"].as_str(), Some(PREFIX_AUDIO_URL));
        assert_eq!(args[21].as_i64(), Some(420));
        assert_eq!(args[23][0].as_str(), Some("emotion"));
    }

    #[tokio::test]
    async fn test_generate_speech_round_trip() {
        let mut server = mockito::Server::new_async().await;

        let _upload = server
            .mock("POST", "/gradio_api/upload")
            .with_status(200)
            .with_body(r#"["/tmp/gradio/abc/voice.wav"]"#)
            .create_async()
            .await;

        let _call = server
            .mock("POST", "/gradio_api/call/generate_audio")
            .with_status(200)
            .with_body(r#"{"event_id": "ev-tts"}"#)
            .create_async()
            .await;

        let audio_url = format!("{}/file/speech.wav", server.url());
        let _result = server
            .mock("GET", "/gradio_api/call/generate_audio/ev-tts")
            .with_status(200)
            .with_body(format!(
                "event: complete\ndata: [{{\"url\": \"{}\"}}, 31337]\n\n",
                audio_url
            ))
            .create_async()
            .await;

        let _file = server
            .mock("GET", "/file/speech.wav")
            .with_status(200)
            .with_body(vec![82, 73, 70, 70])
            .create_async()
            .await;

        let client = TtsClient::with_root(
            server.url(),
            "ginigen/VoiceClone-TTS".to_string(),
            None,
            30,
        )
        .unwrap();

        let speech = client
            .generate_speech("hello world", "voice.wav", vec![1, 2, 3])
            .await
            .unwrap();

        assert_eq!(speech.audio, vec![82, 73, 70, 70]);
        assert_eq!(speech.seed, Some(31337));
    }

    #[tokio::test]
    async fn test_generate_speech_space_error_propagates() {
        let mut server = mockito::Server::new_async().await;

        let _upload = server
            .mock("POST", "/gradio_api/upload")
            .with_status(200)
            .with_body(r#"["/tmp/gradio/abc/voice.wav"]"#)
            .create_async()
            .await;

        let _call = server
            .mock("POST", "/gradio_api/call/generate_audio")
            .with_status(200)
            .with_body(r#"{"event_id": "ev-err"}"#)
            .create_async()
            .await;

        let _result = server
            .mock("GET", "/gradio_api/call/generate_audio/ev-err")
            .with_status(200)
            .with_body("event: error\ndata: \"ZeroGPU quota exceeded\"\n\n")
            .create_async()
            .await;

        let client = TtsClient::with_root(
            server.url(),
            "ginigen/VoiceClone-TTS".to_string(),
            None,
            30,
        )
        .unwrap();

        let err = client
            .generate_speech("hello", "voice.wav", vec![1])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("ZeroGPU quota exceeded"));
    }
}
