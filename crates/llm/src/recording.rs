use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tracing::warn;

/// Recording session that contains the original request and all chunks
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RecordingSession {
    /// The request that was sent
    pub request: serde_json::Value,
    /// Timestamp of when the recording was started
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Payloads as received from the service
    pub chunks: Vec<RecordedChunk>,
}

/// Single recorded chunk with timing info
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RecordedChunk {
    /// Raw content of the data part of the SSE line
    pub data: String,
    /// Milliseconds since recording start
    pub timestamp_ms: u64,
}

/// Appends streamed sessions to a JSON array on disk
#[derive(Clone)]
pub struct APIRecorder {
    file_path: PathBuf,
    /// Held while a finished session is appended to the file
    file_lock: Arc<Mutex<()>>,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex.lock().map_err(|_| anyhow!("recording state poisoned"))
}

impl APIRecorder {
    /// Create a new recorder that writes to the specified file
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            file_path: path.as_ref().to_path_buf(),
            file_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Begin recording one request. The returned handle owns the session,
    /// so requests that overlap never write into each other's recording.
    pub fn start_recording(&self, request: serde_json::Value) -> ActiveRecording {
        ActiveRecording {
            recorder: self.clone(),
            session: Some(RecordingSession {
                request,
                timestamp: chrono::Utc::now(),
                chunks: Vec::new(),
            }),
            start_time: Instant::now(),
        }
    }

    fn append_session(&self, session: &RecordingSession) -> Result<()> {
        let _guard = lock(&self.file_lock)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)
            .context("Failed to open recording file")?;

        let file_size = file.metadata()?.len();
        if file_size == 0 {
            writeln!(file, "[")?;
        } else {
            // Drop the trailing "\n]\n" so the array can be extended
            file.set_len(file_size.saturating_sub(3))?;
            file.seek(std::io::SeekFrom::End(0))?;
            writeln!(file, ",")?;
        }

        let json = serde_json::to_string_pretty(session)?;
        writeln!(file, "{json}")?;
        writeln!(file, "]")?;
        Ok(())
    }
}

/// Recording of a single request, saved when finished or dropped
pub struct ActiveRecording {
    recorder: APIRecorder,
    session: Option<RecordingSession>,
    start_time: Instant,
}

impl ActiveRecording {
    /// Record the data part of one SSE line
    pub fn record_chunk(&mut self, data: &str) {
        if let Some(session) = self.session.as_mut() {
            session.chunks.push(RecordedChunk {
                data: data.to_string(),
                timestamp_ms: self.start_time.elapsed().as_millis() as u64,
            });
        }
    }

    /// Append the session to the recording file; later calls do nothing
    pub fn finish(&mut self) -> Result<()> {
        match self.session.take() {
            Some(session) => self.recorder.append_session(&session),
            None => Ok(()),
        }
    }
}

impl Drop for ActiveRecording {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            warn!("Failed to save recording: {:#}", e);
        }
    }
}

/// Hands out recorded sessions in order
#[derive(Clone)]
pub struct PlaybackState {
    sessions: Arc<Vec<RecordingSession>>,
    index: Arc<Mutex<usize>>,
    pub fast: bool,
}

impl PlaybackState {
    pub fn from_file<P: AsRef<Path>>(path: P, fast: bool) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).context("Failed to read recording file")?;
        let sessions: Vec<RecordingSession> =
            serde_json::from_str(&contents).context("Failed to parse recording file")?;
        Ok(Self {
            sessions: Arc::new(sessions),
            index: Arc::new(Mutex::new(0)),
            fast,
        })
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Take the next session, or None if exhausted
    pub fn next_session(&self) -> Result<Option<RecordingSession>> {
        let mut idx = lock(&self.index)?;
        let session = self.sessions.get(*idx).cloned();
        if session.is_some() {
            *idx += 1;
        }
        Ok(session)
    }
}
