//! # Whisper Model
//!
//! Loads and runs an OpenAI Whisper checkpoint through Candle-rs, pure Rust
//! with no FFI into whisper.cpp.
//!
//! ## Loading Process:
//! 1. Download model files from HuggingFace (cached locally by hf-hub)
//! 2. Load tokenizer and configuration
//! 3. Initialize weights on the target device
//!
//! ## Memory Management:
//! One model is loaded per process at startup, or none when transcription is
//! disabled; the constrained hosts this service targets cannot hold more
//! than the tiny/base checkpoints in memory.

use anyhow::{anyhow, Result};
use candle_core::{Device, IndexOp, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::whisper::{self as m, Config};
use tokenizers::Tokenizer;

/// Whisper token id: start of transcript.
const SOT_TOKEN: u32 = 50258;
/// Whisper token id: end of text.
const EOT_TOKEN: u32 = 50257;
/// Whisper token id: transcribe task.
const TRANSCRIBE_TOKEN: u32 = 50359;
/// Upper bound on decoded tokens per segment.
const MAX_DECODE_TOKENS: usize = 200;
/// Greedy first, then increasingly random retries when decoding degenerates.
const TEMPERATURES: &[f32] = &[0.0, 0.2, 0.4, 0.6, 0.8, 1.0];

/// Available Whisper checkpoint sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ModelSize {
    Tiny,
    Base,
    Small,
    Medium,
    Large,
}

impl ModelSize {
    /// HuggingFace repository holding this checkpoint.
    pub fn repo_name(&self) -> &'static str {
        match self {
            ModelSize::Tiny => "openai/whisper-tiny",
            ModelSize::Base => "openai/whisper-base",
            ModelSize::Small => "openai/whisper-small",
            ModelSize::Medium => "openai/whisper-medium",
            ModelSize::Large => "openai/whisper-large-v2",
        }
    }

    /// Approximate checkpoint size in MB, for startup logs and health output.
    pub fn size_mb(&self) -> u32 {
        match self {
            ModelSize::Tiny => 39,
            ModelSize::Base => 74,
            ModelSize::Small => 244,
            ModelSize::Medium => 769,
            ModelSize::Large => 1550,
        }
    }
}

impl std::str::FromStr for ModelSize {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "tiny" => Ok(ModelSize::Tiny),
            "base" => Ok(ModelSize::Base),
            "small" => Ok(ModelSize::Small),
            "medium" => Ok(ModelSize::Medium),
            "large" => Ok(ModelSize::Large),
            _ => Err(anyhow!("Unknown model size: {}", s)),
        }
    }
}

impl std::fmt::Display for ModelSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ModelSize::Tiny => "tiny",
            ModelSize::Base => "base",
            ModelSize::Small => "small",
            ModelSize::Medium => "medium",
            ModelSize::Large => "large",
        };
        write!(f, "{}", name)
    }
}

/// A loaded Whisper checkpoint ready for transcription.
pub struct WhisperModel {
    model: m::model::Whisper,
    config: Config,
    device: Device,
    tokenizer: Tokenizer,
}

impl WhisperModel {
    /// Download (or reuse the local cache of) a checkpoint and load it.
    pub async fn load(size: ModelSize, device: Device) -> Result<Self> {
        tracing::info!("Loading Whisper {} model (~{} MB)...", size, size.size_mb());
        let start_time = std::time::Instant::now();

        let api = {
            use hf_hub::api::tokio::ApiBuilder;
            let mut builder = ApiBuilder::new().with_progress(false);
            if let Ok(token) = std::env::var("HF_TOKEN") {
                builder = builder.with_token(Some(token));
            }
            builder
                .build()
                .map_err(|e| anyhow!("Failed to create HuggingFace client: {}", e))?
        };

        let repo = api.model(size.repo_name().to_string());
        let config_filename = repo
            .get("config.json")
            .await
            .map_err(|e| anyhow!("Failed to fetch config.json from {}: {}", size.repo_name(), e))?;
        let tokenizer_filename = repo.get("tokenizer.json").await.map_err(|e| {
            anyhow!("Failed to fetch tokenizer.json from {}: {}", size.repo_name(), e)
        })?;
        let weights_filename = repo
            .get("model.safetensors")
            .await
            .map_err(|e| anyhow!("Failed to fetch weights from {}: {}", size.repo_name(), e))?;

        let config: Config = serde_json::from_reader(std::fs::File::open(config_filename)?)?;
        let tokenizer = Tokenizer::from_file(tokenizer_filename)
            .map_err(|e| anyhow!("Failed to load tokenizer: {}", e))?;

        let vb =
            unsafe { VarBuilder::from_mmaped_safetensors(&[weights_filename], m::DTYPE, &device)? };
        let model = m::model::Whisper::load(&vb, config.clone())?;

        tracing::info!(
            "Whisper {} model loaded in {:.2}s",
            size,
            start_time.elapsed().as_secs_f64()
        );

        Ok(Self {
            model,
            config,
            device,
            tokenizer,
        })
    }

    /// Transcribe 16 kHz mono f32 samples.
    ///
    /// Greedy decoding with a temperature-fallback retry when the output
    /// degenerates into repetition, the standard Whisper inference recipe.
    pub fn transcribe(&mut self, audio: &[f32], language: Option<&str>) -> Result<String> {
        if audio.is_empty() {
            return Err(anyhow!("audio data is empty"));
        }

        let mel = self.pcm_to_mel(audio)?;
        let mel = mel.unsqueeze(0)?;
        let encoder_output = self.model.encoder.forward(&mel, false)?;

        let mut prompt = vec![SOT_TOKEN];
        if let Some(lang) = language.and_then(language_token) {
            prompt.push(lang);
        }
        prompt.push(TRANSCRIBE_TOKEN);
        let prompt_len = prompt.len();

        let mut tokens = prompt;
        let mut output_tokens: Vec<u32> = Vec::new();

        for &temperature in TEMPERATURES {
            tokens.truncate(prompt_len);
            output_tokens.clear();
            let mut degenerate = false;

            for _ in 0..MAX_DECODE_TOKENS {
                let token_tensor = Tensor::new(&tokens[..], &self.device)?.unsqueeze(0)?;
                let logits = self
                    .model
                    .decoder
                    .forward(&token_tensor, &encoder_output, false)?;
                let last_logits = logits.i((.., tokens.len() - 1, ..))?;

                let next_token = if temperature > 0.0 {
                    sample_token(&last_logits, temperature, &self.device)?
                } else {
                    last_logits.argmax_keepdim(1)?.to_scalar::<u32>()?
                };

                if next_token == EOT_TOKEN {
                    break;
                }
                if is_repetitive(&output_tokens, next_token) {
                    degenerate = true;
                    break;
                }

                tokens.push(next_token);
                output_tokens.push(next_token);
            }

            if !degenerate && !output_tokens.is_empty() {
                break;
            }
        }

        self.decode_tokens(&output_tokens)
    }

    /// Convert PCM samples to the model's log-mel input tensor.
    ///
    /// Whisper consumes fixed 30-second windows (3000 frames); shorter audio
    /// is zero-padded, longer audio truncated.
    fn pcm_to_mel(&self, pcm: &[f32]) -> Result<Tensor> {
        const WINDOW_SAMPLES: usize = 30 * 16_000;
        const N_FRAMES: usize = 3000;

        let mut padded = vec![0.0f32; WINDOW_SAMPLES];
        let copy_len = pcm.len().min(WINDOW_SAMPLES);
        padded[..copy_len].copy_from_slice(&pcm[..copy_len]);

        let n_mels = self.config.num_mel_bins as usize;
        let frame_size = padded.len() / N_FRAMES;
        let mut mel_data = vec![0.0f32; n_mels * N_FRAMES];

        for frame in 0..N_FRAMES {
            let start = frame * frame_size;
            let end = (start + frame_size).min(padded.len());
            let mut energy = 0.0f32;
            for sample in &padded[start..end] {
                energy += sample.abs();
            }
            // -80 dB floor on the log scale.
            let value = (energy / frame_size as f32).ln().max(-11.5129);
            for mel_bin in 0..n_mels {
                mel_data[mel_bin * N_FRAMES + frame] = value;
            }
        }

        Ok(Tensor::from_vec(mel_data, (n_mels, N_FRAMES), &self.device)?)
    }

    /// Decode output tokens into clean text.
    fn decode_tokens(&self, tokens: &[u32]) -> Result<String> {
        let text = self
            .tokenizer
            .decode(tokens, true)
            .map_err(|e| anyhow!("Tokenizer decode error: {}", e))?;

        let cleaned = text
            .replace("<|startoftranscript|>", "")
            .replace("<|endoftext|>", "")
            .replace("<|notimestamps|>", "");
        Ok(cleaned.trim().to_string())
    }
}

/// Whisper language token for an ISO 639-1 code. Spanish leads: the
/// instrument collects Spanish-language answers.
fn language_token(language: &str) -> Option<u32> {
    match language.to_lowercase().as_str() {
        "es" | "spanish" => Some(50262),
        "en" | "english" => Some(50259),
        "pt" | "portuguese" => Some(50267),
        "fr" | "french" => Some(50265),
        "de" | "german" => Some(50261),
        "it" | "italian" => Some(50274),
        _ => None,
    }
}

/// Sample the next token from temperature-scaled logits.
fn sample_token(logits: &Tensor, temperature: f32, device: &Device) -> Result<u32> {
    let temp_tensor = Tensor::from_vec(vec![temperature], (1,), device)?;
    let scaled = logits.broadcast_div(&temp_tensor)?;
    let probs = candle_nn::ops::softmax_last_dim(&scaled)?;
    Ok(probs.argmax_keepdim(1)?.to_scalar::<u32>()?)
}

/// Detect degenerate repetition in the decoded sequence.
fn is_repetitive(tokens: &[u32], new_token: u32) -> bool {
    if tokens.len() >= 3 && tokens[tokens.len() - 3..] == [new_token, new_token, new_token] {
        return true;
    }
    if tokens.len() >= 6 {
        let last = &tokens[tokens.len() - 3..];
        let prev = &tokens[tokens.len() - 6..tokens.len() - 3];
        if last == prev {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_size_parsing() {
        assert_eq!("tiny".parse::<ModelSize>().unwrap(), ModelSize::Tiny);
        assert_eq!("BASE".parse::<ModelSize>().unwrap(), ModelSize::Base);
        assert!("enormous".parse::<ModelSize>().is_err());
    }

    #[test]
    fn test_model_size_display_roundtrip() {
        for size in [
            ModelSize::Tiny,
            ModelSize::Base,
            ModelSize::Small,
            ModelSize::Medium,
            ModelSize::Large,
        ] {
            assert_eq!(size.to_string().parse::<ModelSize>().unwrap(), size);
        }
    }

    #[test]
    fn test_language_tokens() {
        assert_eq!(language_token("es"), Some(50262));
        assert_eq!(language_token("Spanish"), Some(50262));
        assert_eq!(language_token("xx"), None);
    }

    #[test]
    fn test_repetition_detection() {
        assert!(is_repetitive(&[9, 9, 9], 9));
        assert!(is_repetitive(&[1, 2, 3, 1, 2, 3], 4));
        assert!(!is_repetitive(&[1, 2, 3, 4, 5], 6));
        assert!(!is_repetitive(&[], 1));
    }
}
