//! # Transcription Service
//!
//! High-level adapter between audio uploads and the Whisper model.
//!
//! ## Lifecycle:
//! Constructed once at startup, and only when transcription is enabled: the
//! disabled state is the absence of the service in `AppState`, so handlers
//! can fail fast with 503 before touching any payload. Keeping the model
//! optional at this level is what lets the service run inside the memory
//! limits of free hosting tiers.
//!
//! ## Upload handling:
//! Uploads are buffered to a uniquely-named temp file which is removed when
//! the guard drops, success or failure. No temp artifacts survive a request.

use crate::transcription::audio;
use crate::transcription::model::{ModelSize, WhisperModel};
use candle_core::Device;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Failures of the transcription pipeline, in pipeline order.
#[derive(Debug)]
pub enum TranscriptionError {
    /// The upload could not be buffered to temporary storage.
    Buffer(String),

    /// The buffered bytes are not decodable audio.
    Decode(String),

    /// The model failed during inference.
    Engine(String),
}

impl fmt::Display for TranscriptionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranscriptionError::Buffer(msg) => write!(f, "Error al guardar el archivo: {}", msg),
            TranscriptionError::Decode(msg) => write!(f, "Audio no decodificable: {}", msg),
            TranscriptionError::Engine(msg) => {
                write!(f, "Error durante la transcripción de Whisper: {}", msg)
            }
        }
    }
}

impl std::error::Error for TranscriptionError {}

/// An upload buffered to temporary storage, deleted on drop.
pub struct TempAudioFile {
    path: PathBuf,
}

impl TempAudioFile {
    /// Buffer `bytes` under a unique name in the system temp directory.
    ///
    /// Only the final component of the client-supplied filename is used, so
    /// a hostile name cannot escape the temp directory.
    pub fn create(original_name: &str, bytes: &[u8]) -> std::io::Result<Self> {
        let base = Path::new(original_name)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio");
        let path = std::env::temp_dir().join(format!("{}_{}", Uuid::new_v4(), base));
        fs::write(&path, bytes)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempAudioFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Whisper-backed transcription adapter.
pub struct TranscriptionService {
    // The candle decoder needs exclusive access; concurrent uploads
    // serialize here.
    model: Mutex<WhisperModel>,
    size: ModelSize,
    language: Option<String>,
}

impl TranscriptionService {
    /// Load the configured checkpoint. Called once at startup; a failure
    /// here degrades the service to the disabled state instead of aborting
    /// the process.
    pub async fn initialize(size: ModelSize, language: Option<String>) -> anyhow::Result<Self> {
        let model = WhisperModel::load(size, Device::Cpu).await?;
        Ok(Self {
            model: Mutex::new(model),
            size,
            language,
        })
    }

    pub fn model_name(&self) -> String {
        self.size.to_string()
    }

    /// Transcribe an uploaded audio file.
    ///
    /// Buffers to temp storage, decodes, runs the model, and returns the
    /// trimmed text. The temp file is deleted in every path.
    pub async fn transcribe_upload(
        &self,
        filename: &str,
        bytes: &[u8],
    ) -> Result<String, TranscriptionError> {
        let temp = TempAudioFile::create(filename, bytes)
            .map_err(|e| TranscriptionError::Buffer(e.to_string()))?;

        let samples = audio::decode_audio_file(temp.path())
            .map_err(|e| TranscriptionError::Decode(e.to_string()))?;

        tracing::debug!(
            filename = %filename,
            samples = samples.len(),
            "Audio buffered and decoded, running Whisper"
        );

        let text = {
            let mut model = self.model.lock().await;
            model
                .transcribe(&samples, self.language.as_deref())
                .map_err(|e| TranscriptionError::Engine(e.to_string()))?
        };

        Ok(text.trim().to_string())
    }
}
