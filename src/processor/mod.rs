//! Streaming DAF420 permit parser.
//!
//! Reads the input one line at a time, routes each line by its two-digit
//! record type and rebuilds permit aggregates with a single "current permit"
//! pointer into a [`PermitStore`]. Checkpoints are written periodically so a
//! long run can resume after a crash.

pub mod checkpoint;
pub mod field_parsers;
pub mod performance;
pub mod record_parser;

#[cfg(test)]
pub mod tests;

pub use checkpoint::{CheckpointManager, CheckpointOptions, CheckpointState, CheckpointStatus};
pub use performance::{PerformanceMonitor, PerformanceReport, TimingStats};

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::constants::DEFAULT_PROGRESS_INTERVAL;
use crate::error::{PermitError, Result};
use crate::models::{ParseStats, Permit, PermitStore};
use crate::validation::{ValidationReport, Validator};

use self::record_parser::{LineOutcome, decode_line};

/// Called every `progress_interval` lines with the line number and current stats
pub type ProgressCallback = Box<dyn FnMut(u64, &ParseStats) -> anyhow::Result<()> + Send>;

/// Per-run parser options
#[derive(Debug, Clone, PartialEq)]
pub struct ParserOptions {
    /// Overrides `settings.strict_mode` when set
    pub strict_mode: Option<bool>,
    pub performance_monitoring: bool,
    /// `None` disables checkpointing
    pub checkpoints: Option<CheckpointOptions>,
    pub resume: bool,
    /// Delete checkpoint files after a resumed parse completes
    pub clear_checkpoints_on_success: bool,
    pub progress_interval: u64,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            strict_mode: None,
            performance_monitoring: false,
            checkpoints: None,
            resume: false,
            clear_checkpoints_on_success: false,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl ParserOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strict_mode(mut self, strict: bool) -> Self {
        self.strict_mode = Some(strict);
        self
    }

    pub fn with_performance_monitoring(mut self, enabled: bool) -> Self {
        self.performance_monitoring = enabled;
        self
    }

    pub fn with_checkpoints(mut self, options: CheckpointOptions) -> Self {
        self.checkpoints = Some(options);
        self
    }

    pub fn with_resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    pub fn with_clear_checkpoints_on_success(mut self, clear: bool) -> Self {
        self.clear_checkpoints_on_success = clear;
        self
    }

    pub fn with_progress_interval(mut self, interval: u64) -> Self {
        self.progress_interval = interval;
        self
    }
}

/// Checkpoint activity during one parse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointInfo {
    pub last_saved_line: u64,
    pub checkpoints_created: u64,
}

/// Everything a finished parse produces
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    pub permits: BTreeMap<String, Permit>,
    pub stats: ParseStats,
    pub validation_report: ValidationReport,
    pub performance: Option<PerformanceReport>,
    pub resumed_from_checkpoint: bool,
    pub checkpoint_info: Option<CheckpointInfo>,
}

/// Stateful single-file parser; call [`PermitParser::reset`] before reuse
pub struct PermitParser {
    config: Arc<Config>,
    options: ParserOptions,
    strict: bool,
    validator: Validator,
    report: ValidationReport,
    stats: ParseStats,
    perf: PerformanceMonitor,
    checkpoints: Option<CheckpointManager>,
    progress: Option<ProgressCallback>,
    store: PermitStore,
    /// Index into `store` of the permit collecting children
    current: Option<usize>,
    used: bool,
}

impl fmt::Debug for PermitParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermitParser")
            .field("options", &self.options)
            .field("strict", &self.strict)
            .field("permits", &self.store.len())
            .field("current", &self.current)
            .field("used", &self.used)
            .finish_non_exhaustive()
    }
}

impl PermitParser {
    pub fn new(config: Arc<Config>, options: ParserOptions) -> Self {
        let strict = options
            .strict_mode
            .unwrap_or(config.settings().strict_mode);
        let checkpoints = options.checkpoints.clone().map(CheckpointManager::new);

        Self {
            validator: Validator::new(Arc::clone(&config)),
            report: ValidationReport::new(),
            stats: ParseStats::new(),
            perf: PerformanceMonitor::new(options.performance_monitoring),
            checkpoints,
            progress: None,
            store: PermitStore::new(),
            current: None,
            used: false,
            strict,
            options,
            config,
        }
    }

    pub fn with_progress_callback(
        mut self,
        callback: impl FnMut(u64, &ParseStats) -> anyhow::Result<()> + Send + 'static,
    ) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Parse one file from start (or from a matching checkpoint) to end
    pub async fn parse_file(&mut self, path: impl AsRef<Path>) -> Result<ParseOutcome> {
        let path = path.as_ref();
        if self.used {
            return Err(PermitError::ParserNotReset);
        }
        if !path.exists() {
            return Err(PermitError::InputNotFound {
                path: path.to_path_buf(),
            });
        }

        let file = File::open(path)
            .await
            .map_err(|e| PermitError::io(format!("Failed to open {}", path.display()), e))?;
        self.used = true;

        let started = Instant::now();
        let (watermark, resumed) = self.try_resume(path).await;
        if resumed {
            info!("Resuming {} after line {}", path.display(), watermark);
        } else {
            info!("Parsing {}", path.display());
        }

        let encoding = self.config.settings().encoding;
        let mut reader = BufReader::new(file);
        let mut buffer = Vec::new();
        let mut line_number = 0u64;

        loop {
            buffer.clear();
            let read = reader.read_until(b'\n', &mut buffer).await.map_err(|e| {
                PermitError::io(
                    format!("Failed to read line {} of {}", line_number + 1, path.display()),
                    e,
                )
            })?;
            if read == 0 {
                break;
            }
            line_number += 1;

            if line_number <= watermark {
                continue;
            }

            let line_started = Instant::now();
            let line = decode_line(&buffer, encoding);
            let outcome = self.process_line(line_number, &line);
            self.perf.record("process_line", line_started.elapsed());

            if let LineOutcome::Malformed(reason) = outcome {
                if self.strict {
                    return Err(self.abort(line_number, reason, path).await);
                }
            }

            if self
                .checkpoints
                .as_ref()
                .is_some_and(|m| m.should_save(line_number))
            {
                self.save_checkpoint(line_number, path).await;
            }

            if self.options.progress_interval > 0
                && line_number % self.options.progress_interval == 0
            {
                self.report_progress(line_number);
            }
        }

        let outcome = self.finalize(line_number, path, resumed).await;
        self.perf.record("parse_file", started.elapsed());
        Ok(ParseOutcome {
            performance: self
                .perf
                .is_enabled()
                .then(|| self.perf.report()),
            ..outcome
        })
    }

    /// Restore state from the newest matching checkpoint, if asked to
    async fn try_resume(&mut self, path: &Path) -> (u64, bool) {
        if !self.options.resume {
            return (0, false);
        }
        let Some(manager) = self.checkpoints.as_mut() else {
            warn!("Resume requested but checkpointing is disabled");
            return (0, false);
        };

        let started = Instant::now();
        let loaded = manager.load(path).await;
        self.perf.record("checkpoint_load", started.elapsed());

        match loaded {
            Ok(Some(state)) => {
                self.store = PermitStore::from_permits(state.permits);
                self.current = state
                    .current_permit
                    .as_deref()
                    .and_then(|key| self.store.position(key));
                self.stats = state.stats;
                self.report = ValidationReport::from_issues(state.validation_issues);
                info!(
                    "Recovered {} permits from checkpoint",
                    self.store.len()
                );
                (state.last_processed_line, true)
            }
            Ok(None) => (0, false),
            Err(e) => {
                warn!("Could not load checkpoint, starting clean: {}", e);
                (0, false)
            }
        }
    }

    /// Save a checkpoint; failures only cost resumability
    async fn save_checkpoint(&mut self, line: u64, path: &Path) {
        let Some(manager) = self.checkpoints.as_mut() else {
            return;
        };

        let current = self
            .current
            .and_then(|idx| self.store.get(idx))
            .map(|p| p.permit_number.as_str());

        let started = Instant::now();
        let saved = manager
            .save(
                line,
                current,
                &self.store,
                &self.stats,
                &self.report,
                Some(path),
            )
            .await;
        self.perf.record("checkpoint_save", started.elapsed());

        if let Err(e) = saved {
            warn!("Checkpoint save failed at line {}: {}", line, e);
        }
    }

    fn report_progress(&mut self, line_number: u64) {
        let Some(callback) = self.progress.as_mut() else {
            return;
        };
        if let Err(e) = callback(line_number, &self.stats) {
            warn!("Progress callback failed at line {}: {}", line_number, e);
        }
    }

    /// Flush a checkpoint covering the rejected line, then build the error
    async fn abort(&mut self, line: u64, reason: String, path: &Path) -> PermitError {
        error!("Strict mode: aborting at line {}: {}", line, reason);
        self.save_checkpoint(line, path).await;
        PermitError::strict_abort(line, reason, self.stats.clone())
    }

    async fn finalize(&mut self, last_line: u64, path: &Path, resumed: bool) -> ParseOutcome {
        if let Some(permit) = self.current.and_then(|idx| self.store.get(idx)) {
            debug!("Committing final permit {}", permit.permit_number);
        }

        let needs_final_save = self
            .checkpoints
            .as_ref()
            .is_some_and(|m| last_line > m.last_saved_line());
        if needs_final_save {
            self.save_checkpoint(last_line, path).await;
        }
        self.current = None;

        if resumed && self.options.clear_checkpoints_on_success {
            if let Some(manager) = self.checkpoints.as_mut() {
                if let Err(e) = manager.clear().await {
                    warn!("Failed to clear checkpoints: {}", e);
                }
            }
        }

        self.stats.successful_permits = self.store.len() as u64;
        info!(
            "Parsed {} lines into {} permits ({} malformed, {} orphaned)",
            self.stats.lines_processed,
            self.store.len(),
            self.stats.malformed_records,
            self.stats.orphaned_records
        );

        ParseOutcome {
            permits: self.store.to_map(),
            stats: self.stats.clone(),
            validation_report: self.report.clone(),
            performance: None,
            resumed_from_checkpoint: resumed,
            checkpoint_info: self.checkpoints.as_ref().map(|m| CheckpointInfo {
                last_saved_line: m.last_saved_line(),
                checkpoints_created: m.saves_completed(),
            }),
        }
    }

    pub fn stats(&self) -> &ParseStats {
        &self.stats
    }

    pub fn validation_report(&self) -> &ValidationReport {
        &self.report
    }

    pub fn performance_report(&self) -> PerformanceReport {
        self.perf.report()
    }

    pub fn permits(&self) -> &PermitStore {
        &self.store
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    /// Drop all parse state so the parser can take another file
    pub fn reset(&mut self) {
        self.store.clear();
        self.current = None;
        self.stats = ParseStats::new();
        self.validator.reset();
        self.report.clear();
        self.perf.reset();
        if let Some(manager) = self.checkpoints.as_mut() {
            manager.reset();
        }
        self.used = false;
    }
}
