//! Crash-safe checkpoints for long parses
//!
//! A checkpoint is a JSON snapshot of every permit aggregate, the parse stats,
//! the validation issues and the current-permit key at a line watermark. Files are written to a
//! temporary name and renamed into place, so a crash mid-write never leaves a
//! half-written checkpoint under a real name. On load, the newest readable
//! checkpoint must match the input file's path and SHA-256 or resumption is
//! refused and the parse starts clean.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

use crate::constants::checkpoint::{
    DEFAULT_BASE_NAME, DEFAULT_DIR, DEFAULT_INTERVAL, DEFAULT_MAX_CHECKPOINTS, FILE_EXTENSION,
    FORMAT_VERSION, HASH_BUFFER_SIZE,
};
use crate::error::{PermitError, Result};
use crate::models::{ParseStats, Permit, PermitStore};
use crate::validation::{ValidationIssue, ValidationReport};

/// Where and how often checkpoints are written
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointOptions {
    pub enabled: bool,
    pub dir: PathBuf,
    pub base_name: String,
    /// Save once this many lines have passed since the last save
    pub interval: u64,
    pub max_checkpoints: usize,
    /// Record and compare the input SHA-256
    pub verify_hash: bool,
}

impl Default for CheckpointOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from(DEFAULT_DIR),
            base_name: DEFAULT_BASE_NAME.to_string(),
            interval: DEFAULT_INTERVAL,
            max_checkpoints: DEFAULT_MAX_CHECKPOINTS,
            verify_hash: true,
        }
    }
}

impl CheckpointOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = dir.into();
        self
    }

    pub fn with_base_name(mut self, base_name: impl Into<String>) -> Self {
        self.base_name = base_name.into();
        self
    }

    pub fn with_interval(mut self, interval: u64) -> Self {
        self.interval = interval.max(1);
        self
    }

    pub fn with_max_checkpoints(mut self, max_checkpoints: usize) -> Self {
        self.max_checkpoints = max_checkpoints.max(1);
        self
    }

    pub fn with_verify_hash(mut self, verify_hash: bool) -> Self {
        self.verify_hash = verify_hash;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Everything needed to continue a parse after `last_processed_line`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointState {
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub last_processed_line: u64,
    /// Permit whose children were being collected at the watermark
    pub current_permit: Option<String>,
    pub permits: Vec<Permit>,
    pub stats: ParseStats,
    /// Issues raised up to the watermark, so a resumed report stays complete
    #[serde(default)]
    pub validation_issues: Vec<ValidationIssue>,
    pub input_file_hash: Option<String>,
    pub input_file_path: Option<PathBuf>,
}

/// Checkpoint files currently on disk
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckpointStatus {
    pub count: usize,
    pub newest_timestamp: Option<DateTime<Utc>>,
    pub newest_line: Option<u64>,
    pub total_bytes: u64,
}

#[derive(Debug, Clone, PartialEq)]
struct CheckpointFile {
    path: PathBuf,
    millis: i64,
    line: u64,
}

/// Saves, loads, verifies and prunes checkpoint files
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    options: CheckpointOptions,
    last_saved_line: u64,
    saves_completed: u64,
    hash_cache: Option<HashedInput>,
}

/// Input hash remembered between saves of one parse
#[derive(Debug, Clone, PartialEq)]
struct HashedInput {
    path: PathBuf,
    len: u64,
    modified: Option<SystemTime>,
    hash: String,
}

impl CheckpointManager {
    pub fn new(options: CheckpointOptions) -> Self {
        Self {
            options,
            last_saved_line: 0,
            saves_completed: 0,
            hash_cache: None,
        }
    }

    pub fn options(&self) -> &CheckpointOptions {
        &self.options
    }

    pub fn last_saved_line(&self) -> u64 {
        self.last_saved_line
    }

    /// Successful saves since construction or the last reset
    pub fn saves_completed(&self) -> u64 {
        self.saves_completed
    }

    /// Forget save history and the cached input hash; files on disk are untouched
    pub fn reset(&mut self) {
        self.last_saved_line = 0;
        self.saves_completed = 0;
        self.hash_cache = None;
    }

    pub fn should_save(&self, line: u64) -> bool {
        self.options.enabled
            && line > self.last_saved_line
            && line - self.last_saved_line >= self.options.interval
    }

    /// Write a checkpoint at `line` and prune old files.
    ///
    /// Returns `Ok(None)` when checkpointing is disabled.
    pub async fn save(
        &mut self,
        line: u64,
        current_permit: Option<&str>,
        store: &PermitStore,
        stats: &ParseStats,
        report: &ValidationReport,
        input: Option<&Path>,
    ) -> Result<Option<PathBuf>> {
        if !self.options.enabled {
            return Ok(None);
        }

        fs::create_dir_all(&self.options.dir).await.map_err(|e| {
            PermitError::io(
                format!(
                    "Failed to create checkpoint directory: {}",
                    self.options.dir.display()
                ),
                e,
            )
        })?;

        let (input_file_path, input_file_hash) = match input {
            Some(path) => {
                let canonical = canonical_path(path).await?;
                let hash = if self.options.verify_hash {
                    Some(self.input_hash(&canonical).await?)
                } else {
                    None
                };
                (Some(canonical), hash)
            }
            None => (None, None),
        };

        let timestamp = Utc::now();
        let state = CheckpointState {
            version: FORMAT_VERSION.to_string(),
            timestamp,
            last_processed_line: line,
            current_permit: current_permit.map(str::to_string),
            permits: store.snapshot(),
            stats: stats.clone(),
            validation_issues: report.all().to_vec(),
            input_file_hash,
            input_file_path,
        };

        let path = self.file_path(timestamp.timestamp_millis(), line);
        let temp_path = path.with_extension(format!("{}.tmp", FILE_EXTENSION));
        let data = serde_json::to_vec_pretty(&state)?;

        fs::write(&temp_path, &data).await.map_err(|e| {
            PermitError::io(
                format!("Failed to write checkpoint: {}", temp_path.display()),
                e,
            )
        })?;
        fs::rename(&temp_path, &path).await.map_err(|e| {
            PermitError::io(
                format!("Failed to move checkpoint into place: {}", path.display()),
                e,
            )
        })?;

        self.last_saved_line = line;
        self.saves_completed += 1;
        info!(
            "Checkpoint saved at line {} ({} permits)",
            line,
            state.permits.len()
        );

        self.prune().await;
        Ok(Some(path))
    }

    /// Newest valid checkpoint for `input`, if it still matches the file.
    ///
    /// Unreadable, unparsable and wrong-version files are skipped. A newest
    /// valid checkpoint for a different or changed input is refused.
    pub async fn load(&mut self, input: &Path) -> Result<Option<CheckpointState>> {
        for file in self.list().await? {
            let state = match read_state(&file.path).await {
                Ok(state) => state,
                Err(e) => {
                    warn!("Skipping checkpoint {}: {}", file.path.display(), e);
                    continue;
                }
            };

            if let Err(e) = self.verify(&state, input).await {
                warn!("{}; starting from the beginning", e);
                return Ok(None);
            }

            info!(
                "Loaded checkpoint from line {} (created {}, {} permits)",
                state.last_processed_line,
                state.timestamp.to_rfc3339(),
                state.permits.len()
            );
            self.last_saved_line = state.last_processed_line;
            return Ok(Some(state));
        }

        Ok(None)
    }

    /// Check that a checkpoint was taken from this exact input
    pub async fn verify(&mut self, state: &CheckpointState, input: &Path) -> Result<()> {
        let canonical = canonical_path(input).await?;

        match &state.input_file_path {
            Some(recorded) if *recorded == canonical => {}
            Some(recorded) => {
                return Err(PermitError::resume_mismatch(format!(
                    "checkpoint was taken from {}, not {}",
                    recorded.display(),
                    canonical.display()
                )));
            }
            None => {
                return Err(PermitError::resume_mismatch(
                    "checkpoint does not record an input path",
                ));
            }
        }

        if self.options.verify_hash {
            let Some(recorded) = &state.input_file_hash else {
                return Err(PermitError::resume_mismatch(
                    "checkpoint does not record an input hash",
                ));
            };
            // Always re-read the file here; a cached hash could predate an edit
            let current = hash_file(&canonical).await?;
            self.remember_hash(&canonical, current.clone()).await;
            if *recorded != current {
                return Err(PermitError::resume_mismatch(
                    "input file has changed since the checkpoint was created",
                ));
            }
        }

        Ok(())
    }

    /// Delete every checkpoint file; returns how many were removed
    pub async fn clear(&mut self) -> Result<usize> {
        let files = self.list().await?;
        let mut removed = 0;
        for file in &files {
            match fs::remove_file(&file.path).await {
                Ok(()) => removed += 1,
                Err(e) => warn!("Failed to delete checkpoint {}: {}", file.path.display(), e),
            }
        }
        self.reset();
        info!("Cleared {} checkpoints", removed);
        Ok(removed)
    }

    pub async fn has_checkpoint(&self) -> bool {
        self.list().await.is_ok_and(|files| !files.is_empty())
    }

    pub async fn info(&self) -> Result<CheckpointStatus> {
        let files = self.list().await?;
        let mut status = CheckpointStatus {
            count: files.len(),
            ..CheckpointStatus::default()
        };

        if let Some(newest) = files.first() {
            status.newest_timestamp = DateTime::from_timestamp_millis(newest.millis);
            status.newest_line = Some(newest.line);
        }
        for file in &files {
            if let Ok(meta) = fs::metadata(&file.path).await {
                status.total_bytes += meta.len();
            }
        }
        Ok(status)
    }

    fn file_path(&self, millis: i64, line: u64) -> PathBuf {
        self.options.dir.join(format!(
            "{}-{}-{}.{}",
            self.options.base_name, millis, line, FILE_EXTENSION
        ))
    }

    /// Parse `<base>-<millis>-<line>.json`
    fn parse_file_name(&self, name: &str) -> Option<(i64, u64)> {
        let stem = name
            .strip_prefix(self.options.base_name.as_str())?
            .strip_prefix('-')?
            .strip_suffix(FILE_EXTENSION)?
            .strip_suffix('.')?;
        let (millis, line) = stem.split_once('-')?;
        Some((millis.parse().ok()?, line.parse().ok()?))
    }

    /// Checkpoint files, newest first
    async fn list(&self) -> Result<Vec<CheckpointFile>> {
        let mut entries = match fs::read_dir(&self.options.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(PermitError::io(
                    format!(
                        "Failed to read checkpoint directory: {}",
                        self.options.dir.display()
                    ),
                    e,
                ));
            }
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some((millis, line)) = name.to_str().and_then(|n| self.parse_file_name(n)) else {
                continue;
            };
            files.push(CheckpointFile {
                path: entry.path(),
                millis,
                line,
            });
        }

        files.sort_by(|a, b| (b.millis, b.line).cmp(&(a.millis, a.line)));
        Ok(files)
    }

    /// Keep the newest `max_checkpoints` files
    async fn prune(&self) {
        let files = match self.list().await {
            Ok(files) => files,
            Err(e) => {
                warn!("Failed to list checkpoints for pruning: {}", e);
                return;
            }
        };

        for file in files.iter().skip(self.options.max_checkpoints) {
            match fs::remove_file(&file.path).await {
                Ok(()) => debug!("Pruned checkpoint {}", file.path.display()),
                Err(e) => warn!("Failed to delete old checkpoint {}: {}", file.path.display(), e),
            }
        }
    }

    /// SHA-256 of the input, reused while its path, size and mtime are unchanged
    async fn input_hash(&mut self, path: &Path) -> Result<String> {
        let (len, modified) = file_identity(path).await?;
        if let Some(cached) = &self.hash_cache {
            if cached.path == path && cached.len == len && cached.modified == modified {
                return Ok(cached.hash.clone());
            }
        }

        let hash = hash_file(path).await?;
        self.remember_hash(path, hash.clone()).await;
        Ok(hash)
    }

    async fn remember_hash(&mut self, path: &Path, hash: String) {
        self.hash_cache = match file_identity(path).await {
            Ok((len, modified)) => Some(HashedInput {
                path: path.to_path_buf(),
                len,
                modified,
                hash,
            }),
            Err(_) => None,
        };
    }
}

async fn file_identity(path: &Path) -> Result<(u64, Option<SystemTime>)> {
    let meta = fs::metadata(path)
        .await
        .map_err(|e| PermitError::io(format!("Failed to stat {}", path.display()), e))?;
    Ok((meta.len(), meta.modified().ok()))
}

async fn canonical_path(path: &Path) -> Result<PathBuf> {
    fs::canonicalize(path)
        .await
        .map_err(|e| PermitError::io(format!("Failed to resolve {}", path.display()), e))
}

async fn read_state(path: &Path) -> Result<CheckpointState> {
    let data = fs::read(path)
        .await
        .map_err(|e| PermitError::io(format!("Failed to read {}", path.display()), e))?;
    let state: CheckpointState = serde_json::from_slice(&data)?;
    if state.version != FORMAT_VERSION {
        return Err(PermitError::checkpoint(format!(
            "unsupported checkpoint version {} (expected {})",
            state.version, FORMAT_VERSION
        )));
    }
    Ok(state)
}

/// Hex SHA-256 of a file, streamed in fixed-size chunks
pub async fn hash_file(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path)
        .await
        .map_err(|e| PermitError::io(format!("Failed to open {} for hashing", path.display()), e))?;

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_BUFFER_SIZE];
    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
