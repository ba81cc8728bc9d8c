//! Application state for the HTTP server.

use std::sync::Arc;

use crate::effects::SpeechSynthesizer;
use crate::services::MonitorHandle;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Handle to the running monitor
    pub monitor: MonitorHandle,
    /// Speech backend behind the TTS proxy endpoint
    pub tts: Arc<dyn SpeechSynthesizer>,
}

impl AppState {
    /// Create application state using the monitor's own synthesizer.
    pub fn new(monitor: MonitorHandle) -> Self {
        let tts = monitor.synthesizer();
        Self { monitor, tts }
    }

    pub fn with_tts(mut self, tts: Arc<dyn SpeechSynthesizer>) -> Self {
        self.tts = tts;
        self
    }
}
