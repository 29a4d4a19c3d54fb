//! Playback sinks
//!
//! The core never opens an audio device. Feature modules hand a finished
//! [`PcmBuffer`] to an [`AudioSink`], which resolves once playback is
//! complete. A whole sequence is always one buffer and one `play` call so the
//! transmitter's VOX stays keyed from the first sample to the last.

use super::pcm::{write_wav_file, PcmBuffer, SynthesisError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Errors raised while playing a buffer
#[derive(Error, Debug)]
pub enum SinkError {
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    #[error("Playback failed: {0}")]
    Playback(String),
}

/// Destination for rendered audio
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Play `pcm` and resolve when playback has completed
    ///
    /// Ownership of the buffer moves into the sink.
    async fn play(&self, pcm: PcmBuffer) -> Result<(), SinkError>;
}

/// Sink that discards audio but holds for its exact duration
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

#[async_trait]
impl AudioSink for NullSink {
    async fn play(&self, pcm: PcmBuffer) -> Result<(), SinkError> {
        tracing::debug!(duration_ms = pcm.duration_ms(), "null_sink_play");
        tokio::time::sleep(pcm.duration()).await;
        Ok(())
    }
}

/// Sink for file-based playback backends
///
/// Each buffer is materialized as a temporary WAV inside `dir`, held for its
/// duration and removed afterwards.
#[derive(Debug)]
pub struct WavFileSink {
    dir: PathBuf,
    sequence: AtomicU64,
}

impl WavFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            sequence: AtomicU64::new(0),
        }
    }

    /// Directory holding the temporary files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn next_path(&self) -> PathBuf {
        let n = self.sequence.fetch_add(1, Ordering::Relaxed);
        self.dir.join(format!("tx_{}_{:06}.wav", std::process::id(), n))
    }
}

#[async_trait]
impl AudioSink for WavFileSink {
    async fn play(&self, pcm: PcmBuffer) -> Result<(), SinkError> {
        let path = self.next_path();
        if let Err(e) = write_wav_file(&path, &pcm) {
            tracing::error!(path = %path.display(), error = %e, "wav_materialize_failed");
            return Err(e.into());
        }

        tracing::debug!(path = %path.display(), duration_ms = pcm.duration_ms(), "wav_sink_play");
        tokio::time::sleep(pcm.duration()).await;

        if let Err(e) = std::fs::remove_file(&path) {
            tracing::warn!(path = %path.display(), error = %e, "wav_cleanup_failed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_null_sink_holds_for_duration() {
        let pcm = PcmBuffer::from_samples(8000, &[0i16; 4000]);
        let start = Instant::now();
        NullSink.play(pcm).await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wav_sink_removes_file_after_playback() {
        let dir = tempfile::tempdir().unwrap();
        let sink = WavFileSink::new(dir.path());

        let pcm = PcmBuffer::from_samples(8000, &[100i16; 800]);
        sink.play(pcm).await.unwrap();

        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wav_sink_file_exists_while_playing() {
        let dir = tempfile::tempdir().unwrap();
        let sink = std::sync::Arc::new(WavFileSink::new(dir.path()));

        let playing = {
            let sink = sink.clone();
            tokio::spawn(async move {
                sink.play(PcmBuffer::from_samples(8000, &[0i16; 8000])).await
            })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;

        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
        let path = files[0].as_ref().unwrap().path();
        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.len(), 8000);
        drop(reader);

        playing.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_wav_sink_missing_dir_is_synthesis_error() {
        let dir = tempfile::tempdir().unwrap();
        let sink = WavFileSink::new(dir.path().join("missing"));
        let err = sink
            .play(PcmBuffer::from_samples(8000, &[0i16; 10]))
            .await
            .unwrap_err();
        assert!(matches!(err, SinkError::Synthesis(SynthesisError::Io { .. })));
    }
}
