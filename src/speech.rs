//! Text-to-speech proxy client
//!
//! Bot replies are sent to the synthesize endpoint and the returned audio
//! stream is handed to an [`AudioSink`]. Nothing here reports back to the
//! session: failures are logged and dropped.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::{Client, Url};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;

use crate::config::SpeechConfig;

/// Audio chunks as they arrive from the speech proxy
pub type AudioStream = BoxStream<'static, Result<Vec<u8>>>;

/// Destination of synthesized audio
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Consume the whole stream. Returns where the audio went, for the log.
    async fn receive(&self, audio: AudioStream) -> Result<String>;
}

/// Keeps only the most recent reply as `reply.ogg` under a directory
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn latest_path(&self) -> PathBuf {
        self.dir.join("reply.ogg")
    }

    async fn write_part(&self, part: &Path, mut audio: AudioStream) -> Result<()> {
        let mut file = tokio::fs::File::create(part)
            .await
            .context("Failed to create audio file")?;
        while let Some(chunk) = audio.next().await {
            file.write_all(&chunk?)
                .await
                .context("Failed to write audio file")?;
        }
        file.flush().await.context("Failed to flush audio file")?;
        Ok(())
    }
}

#[async_trait]
impl AudioSink for FileSink {
    async fn receive(&self, audio: AudioStream) -> Result<String> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .context("Failed to create audio directory")?;

        // overlapping replies each stream into their own part file; the last
        // rename wins
        let part = self.dir.join(format!(".{}.part", uuid::Uuid::new_v4()));
        if let Err(e) = self.write_part(&part, audio).await {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(e);
        }

        let latest = self.latest_path();
        tokio::fs::rename(&part, &latest)
            .await
            .context("Failed to move audio into place")?;
        Ok(latest.display().to_string())
    }
}

#[derive(Clone)]
pub struct SpeechSynthesizer {
    client: Client,
    base_url: String,
    voice: String,
    sink: Arc<dyn AudioSink>,
}

impl SpeechSynthesizer {
    pub fn new(config: &SpeechConfig, timeout: Duration) -> Result<Self> {
        let sink = Arc::new(FileSink::new(config.audio_dir.clone()));
        Self::with_sink(config, timeout, sink)
    }

    pub fn with_sink(config: &SpeechConfig, timeout: Duration, sink: Arc<dyn AudioSink>) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create speech HTTP client")?;

        Ok(Self {
            client,
            base_url: config.proxy_url.trim_end_matches('/').to_string(),
            voice: config.voice.clone(),
            sink,
        })
    }

    /// `GET {base}/v1/synthesize?voice=..&text=..`
    pub fn synthesize_url(&self, text: &str) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/v1/synthesize", self.base_url))
            .with_context(|| format!("Invalid speech proxy url: {}", self.base_url))?;
        url.query_pairs_mut()
            .append_pair("voice", &self.voice)
            .append_pair("text", text);
        Ok(url)
    }

    /// Fire-and-forget synthesis of `text`
    pub fn speak(&self, text: &str) -> JoinHandle<()> {
        let synthesizer = self.clone();
        let text = text.to_string();
        tokio::spawn(async move {
            match synthesizer.fetch_audio(&text).await {
                Ok(target) => tracing::info!(%target, "speech audio ready"),
                Err(e) => tracing::warn!(error = %e, "speech synthesis failed"),
            }
        })
    }

    async fn fetch_audio(&self, text: &str) -> Result<String> {
        let url = self.synthesize_url(text)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Speech proxy unreachable")?;

        if !response.status().is_success() {
            bail!("Speech proxy returned {}", response.status());
        }

        let audio = response
            .bytes_stream()
            .map(|chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .context("Audio stream interrupted")
            })
            .boxed();
        self.sink.receive(audio).await
    }
}
