//! Spoken announcements through a VOICEVOX synthesis endpoint.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::announcement::announcement_text;
use super::{EffectCategory, SideEffect};
use crate::config::EffectSettings;
use crate::error::{ErrorContext, MonitorError, MonitorResult};
use crate::models::QuakeReport;

/// File the most recent announcement is written to.
pub const ANNOUNCEMENT_FILE_NAME: &str = "announcement.wav";

/// Text-to-speech backend.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` and return the audio bytes.
    async fn synthesize(&self, text: &str) -> MonitorResult<Vec<u8>>;
}

/// Client of the tts.quest VOICEVOX synthesis API.
#[derive(Debug, Clone)]
pub struct VoicevoxClient {
    client: reqwest::Client,
    url: String,
    speaker: u32,
}

impl VoicevoxClient {
    pub fn new(url: impl Into<String>, speaker: u32, timeout: Duration) -> MonitorResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MonitorError::configuration(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
            speaker,
        })
    }

    pub fn from_settings(settings: &EffectSettings) -> MonitorResult<Self> {
        Self::new(
            settings.tts_url.clone(),
            settings.speaker,
            Duration::from_secs(settings.timeout_secs),
        )
    }
}

#[async_trait]
impl SpeechSynthesizer for VoicevoxClient {
    async fn synthesize(&self, text: &str) -> MonitorResult<Vec<u8>> {
        let speaker = self.speaker.to_string();
        let response = self
            .client
            .get(&self.url)
            .query(&[("text", text), ("speaker", speaker.as_str())])
            .send()
            .await?
            .error_for_status()
            .map_err(|e| MonitorError::from(e).with_operation("synthesize_speech"))?;
        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }
}

/// Speaks the announcement for a report after a short pause.
pub struct SpeechAnnouncer {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    output_dir: PathBuf,
    player_command: Option<String>,
    delay: Duration,
}

impl SpeechAnnouncer {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        output_dir: impl Into<PathBuf>,
        player_command: Option<String>,
        delay: Duration,
    ) -> Self {
        Self {
            synthesizer,
            output_dir: output_dir.into(),
            player_command,
            delay,
        }
    }

    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(ANNOUNCEMENT_FILE_NAME)
    }

    async fn play(&self, command: &str, path: &Path) -> MonitorResult<()> {
        let status = tokio::process::Command::new(command)
            .arg(path)
            .status()
            .await
            .map_err(|e| {
                MonitorError::side_effect_with_context(
                    e.to_string(),
                    ErrorContext::new("play_announcement").with_entity_id(command),
                )
            })?;
        if !status.success() {
            return Err(MonitorError::side_effect_with_context(
                format!("player exited with {}", status),
                ErrorContext::new("play_announcement").with_entity_id(command),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl SideEffect for SpeechAnnouncer {
    fn category(&self) -> EffectCategory {
        EffectCategory::Announcement
    }

    async fn fire(&self, report: &QuakeReport) -> MonitorResult<()> {
        tokio::time::sleep(self.delay).await;

        let text = announcement_text(report);
        log::info!("Announcing {}: {}", report.identity(), text);

        let audio = self.synthesizer.synthesize(&text).await?;
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self.output_path();
        tokio::fs::write(&path, &audio).await?;
        log::debug!("Wrote {} bytes of speech to {}", audio.len(), path.display());

        if let Some(command) = &self.player_command {
            self.play(command, &path).await?;
        }
        Ok(())
    }
}
