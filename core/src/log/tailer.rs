//! Follows a single growing log file.
//!
//! The tailer owns the only file handle in the process. It reads appended
//! bytes, reassembles lines split across reads, and resynchronizes when the
//! game truncates or replaces its log on restart.

use std::fs::Metadata;
use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use memchr::memchr_iter;
use sclm_types::TailSettings;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::line::{LogLine, decode_line};
use crate::error::TailError;

/// Bytes at the start of the file remembered to detect an in-place rewrite.
const HEAD_FINGERPRINT_LEN: usize = 64;

/// Size of a single read from the log file.
const READ_CHUNK: usize = 64 * 1024;

/// Upper bound on bytes consumed by one poll. The rest waits for the next.
const MAX_READ_PER_POLL: u64 = 4 * 1024 * 1024;

// ─────────────────────────────────────────────────────────────────────────────
// File identity
// ─────────────────────────────────────────────────────────────────────────────

/// Identifies the file behind a path so a recreated file can be told apart
/// from the one previously opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileIdentity {
    device: u64,
    index: u64,
}

impl FileIdentity {
    #[cfg(unix)]
    pub fn of(meta: &Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        Some(Self {
            device: meta.dev(),
            index: meta.ino(),
        })
    }

    #[cfg(not(unix))]
    pub fn of(meta: &Metadata) -> Option<Self> {
        // No stable file index here; creation time changes when the game
        // recreates the log.
        let created = meta.created().ok()?;
        let since_epoch = created.duration_since(std::time::UNIX_EPOCH).ok()?;
        Some(Self {
            device: 0,
            index: since_epoch.as_nanos() as u64,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tail state
// ─────────────────────────────────────────────────────────────────────────────

/// Everything the tailer must remember between polls.
#[derive(Debug, Clone, Default)]
pub struct TailState {
    pub identity: Option<FileIdentity>,
    pub byte_offset: u64,
    /// Bytes of a line whose terminating newline has not been read yet.
    pub partial_line: Vec<u8>,
    partial_offset: u64,
    head: Vec<u8>,
    last_len: u64,
}

impl TailState {
    fn starting_at(offset: u64) -> Self {
        Self {
            byte_offset: offset,
            ..Self::default()
        }
    }

    fn reset(&mut self) {
        self.byte_offset = 0;
        self.partial_line.clear();
        self.partial_offset = 0;
        self.head.clear();
        self.last_len = 0;
    }

    /// Split freshly read bytes into complete lines, carrying any trailing
    /// fragment over to the next call.
    fn consume(&mut self, chunk: &[u8], chunk_start: u64) -> Vec<(u64, Vec<u8>)> {
        if chunk_start < HEAD_FINGERPRINT_LEN as u64 && self.head.len() as u64 == chunk_start {
            let take = (HEAD_FINGERPRINT_LEN - self.head.len()).min(chunk.len());
            self.head.extend_from_slice(&chunk[..take]);
        }

        let mut lines = Vec::new();
        let mut start = 0usize;

        for end in memchr_iter(b'\n', chunk) {
            let (offset, mut bytes) = if self.partial_line.is_empty() {
                (chunk_start + start as u64, chunk[start..end].to_vec())
            } else {
                let mut joined = std::mem::take(&mut self.partial_line);
                joined.extend_from_slice(&chunk[start..end]);
                (self.partial_offset, joined)
            };
            if bytes.last() == Some(&b'\r') {
                bytes.pop();
            }
            lines.push((offset, bytes));
            start = end + 1;
        }

        if start < chunk.len() {
            if self.partial_line.is_empty() {
                self.partial_offset = chunk_start + start as u64;
            }
            self.partial_line.extend_from_slice(&chunk[start..]);
        }

        self.byte_offset = chunk_start + chunk.len() as u64;
        lines
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Status
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetReason {
    /// The file shrank below the consumed offset.
    Truncated,
    /// The path now points at a different file.
    Replaced,
    /// Same size or larger, but the first bytes changed.
    Rewritten,
}

/// State transitions worth telling the user about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TailStatus {
    WaitingForFile(PathBuf),
    Opened(PathBuf),
    Restarted(ResetReason),
}

// ─────────────────────────────────────────────────────────────────────────────
// Tailer
// ─────────────────────────────────────────────────────────────────────────────

pub struct Tailer {
    path: PathBuf,
    settings: TailSettings,
    file: Option<File>,
    state: TailState,
    status: Vec<TailStatus>,
    ever_opened: bool,
    open_failures: u32,
    waiting_reported: bool,
}

impl Tailer {
    /// Create a tailer that opens the file lazily on the first poll.
    pub fn new(path: impl Into<PathBuf>, settings: TailSettings) -> Self {
        Self {
            path: path.into(),
            settings,
            file: None,
            state: TailState::default(),
            status: Vec::new(),
            ever_opened: false,
            open_failures: 0,
            waiting_reported: false,
        }
    }

    /// Open `path`, waiting for it to appear if the game has not created it yet.
    ///
    /// Only fails once an existing but unreadable path has exhausted the
    /// configured startup retries.
    pub async fn open(path: impl Into<PathBuf>, settings: TailSettings) -> Result<Self, TailError> {
        let mut tailer = Self::new(path, settings);
        while !tailer.try_open().await? {}
        Ok(tailer)
    }

    /// Resume from a previously stored offset instead of the start of the file.
    pub fn starting_at(mut self, offset: u64) -> Self {
        self.state = TailState::starting_at(offset);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> &TailState {
        &self.state
    }

    /// Drain the status transitions recorded since the last call.
    pub fn take_status(&mut self) -> Vec<TailStatus> {
        std::mem::take(&mut self.status)
    }

    /// Return the complete lines appended since the last poll.
    ///
    /// Waits up to one poll interval when nothing new is available, so the
    /// result may be empty.
    pub async fn poll(&mut self) -> Result<Vec<LogLine>, TailError> {
        let lines = self.read_available().await?;
        if !lines.is_empty() || !self.status.is_empty() {
            return Ok(lines);
        }
        sleep(self.poll_interval()).await;
        self.read_available().await
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.settings.poll_interval_ms)
    }

    fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.settings.open_retry_ms)
    }

    async fn read_available(&mut self) -> Result<Vec<LogLine>, TailError> {
        if self.file.is_none() && !self.try_open().await? {
            return Ok(Vec::new());
        }

        match self.read_appended().await {
            Ok(lines) => Ok(lines),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Log file disappeared, waiting for it to return");
                self.file = None;
                Ok(Vec::new())
            }
            Err(e) => {
                warn!(error = %e, path = %self.path.display(), "Failed to read log file, reopening");
                self.file = None;
                sleep(self.retry_interval()).await;
                Ok(Vec::new())
            }
        }
    }

    /// Try to open the file once. `Ok(false)` means "not yet, try again".
    async fn try_open(&mut self) -> Result<bool, TailError> {
        let opened = async {
            let file = File::open(&self.path).await?;
            let meta = file.metadata().await?;
            Ok::<_, std::io::Error>((file, meta))
        }
        .await;

        match opened {
            Ok((file, meta)) => {
                let identity = FileIdentity::of(&meta);
                if self.ever_opened && identity.is_some() && identity != self.state.identity {
                    self.restart(ResetReason::Replaced);
                }
                self.state.identity = identity;
                self.file = Some(file);
                self.ever_opened = true;
                self.open_failures = 0;
                self.waiting_reported = false;
                info!(path = %self.path.display(), size = meta.len(), "Opened log file");
                self.status.push(TailStatus::Opened(self.path.clone()));
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                if !self.waiting_reported {
                    info!(path = %self.path.display(), "Waiting for log file to appear");
                    self.status.push(TailStatus::WaitingForFile(self.path.clone()));
                    self.waiting_reported = true;
                }
                sleep(self.retry_interval()).await;
                Ok(false)
            }
            Err(e) => {
                if !self.ever_opened {
                    self.open_failures += 1;
                    if self.open_failures >= self.settings.startup_retries {
                        return Err(TailError::Inaccessible {
                            path: self.path.clone(),
                            attempts: self.open_failures,
                            source: e,
                        });
                    }
                }
                warn!(
                    error = %e,
                    path = %self.path.display(),
                    attempt = self.open_failures,
                    "Failed to open log file, retrying"
                );
                sleep(self.retry_interval()).await;
                Ok(false)
            }
        }
    }

    fn restart(&mut self, reason: ResetReason) {
        info!(?reason, path = %self.path.display(), offset = self.state.byte_offset, "Log file restarted");
        self.state.reset();
        self.status.push(TailStatus::Restarted(reason));
    }

    async fn read_appended(&mut self) -> std::io::Result<Vec<LogLine>> {
        let meta = tokio::fs::metadata(&self.path).await?;
        let identity = FileIdentity::of(&meta);

        if identity.is_some() && identity != self.state.identity {
            // Recreated under the same path: reopen and start over.
            self.file = Some(File::open(&self.path).await?);
            self.restart(ResetReason::Replaced);
            self.state.identity = identity;
        } else if meta.len() < self.state.byte_offset {
            self.restart(ResetReason::Truncated);
        } else if meta.len() != self.state.last_len && !self.head_matches().await? {
            self.restart(ResetReason::Rewritten);
        }

        let len = meta.len();
        self.state.last_len = len;
        if len <= self.state.byte_offset {
            return Ok(Vec::new());
        }

        let Some(file) = self.file.as_mut() else {
            return Ok(Vec::new());
        };
        let start = self.state.byte_offset;
        let end = len.min(start + MAX_READ_PER_POLL);
        file.seek(SeekFrom::Start(start)).await?;

        let read_at = Utc::now();
        let mut buf = vec![0u8; READ_CHUNK.min((end - start) as usize)];
        let mut position = start;
        let mut lines = Vec::new();
        while position < end {
            let want = buf.len().min((end - position) as usize);
            let n = file.read(&mut buf[..want]).await?;
            if n == 0 {
                break;
            }
            lines.extend(
                self.state
                    .consume(&buf[..n], position)
                    .into_iter()
                    .map(|(offset, bytes)| LogLine {
                        text: decode_line(&bytes),
                        offset,
                        read_at,
                    }),
            );
            position += n as u64;
        }

        debug!(bytes = position - start, lines = lines.len(), "Read appended log data");
        Ok(lines)
    }

    /// Compare the remembered first bytes with what is on disk now.
    async fn head_matches(&mut self) -> std::io::Result<bool> {
        if self.state.head.is_empty() {
            return Ok(true);
        }
        let Some(file) = self.file.as_mut() else {
            return Ok(true);
        };
        let mut current = vec![0u8; self.state.head.len()];
        file.seek(SeekFrom::Start(0)).await?;
        let mut filled = 0;
        while filled < current.len() {
            let n = file.read(&mut current[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled == current.len() && current == self.state.head)
    }
}
