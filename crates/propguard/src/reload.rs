//! Hot reload of property protection rules.
//!
//! A compiled [`PropertyRules`] never changes. To pick up a new protection
//! file, [`ReloadablePropertyRules`] compiles a brand-new ruleset and swaps
//! it in atomically. Readers take a snapshot with
//! [`ReloadablePropertyRules::rules`] and keep using it for the whole
//! request; a reload never blocks them.
//!
//! # Example
//!
//! ```ignore
//! use propguard::{ProtectionConfig, ReloadablePropertyRules, WatcherConfig};
//!
//! let rules = ReloadablePropertyRules::new(ProtectionConfig::new("protections.toml"), None)?;
//! let _watcher = rules.watch(WatcherConfig::default())?;
//!
//! let allowed = rules.rules().check("x_owner_id", "update", &ctx)?;
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use arc_swap::ArcSwap;
use notify::{Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::config::ProtectionConfig;
use crate::enforcer::PolicyEnforcer;
use crate::error::RuleConfigError;
use crate::rules::PropertyRules;

/// Default debounce duration in milliseconds
const DEFAULT_DEBOUNCE_MS: u64 = 500;

// =============================================================================
// Reloadable Rules
// =============================================================================

/// Counters describing reload activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReloadStats {
    /// Successful reloads since creation.
    pub reloads: u64,
    /// Failed reloads since creation.
    pub failures: u64,
}

/// Holds the current ruleset behind an `ArcSwap`.
#[derive(Clone)]
pub struct ReloadablePropertyRules {
    inner: Arc<ArcSwap<PropertyRules>>,
    config: ProtectionConfig,
    enforcer: Option<Arc<dyn PolicyEnforcer>>,
    /// Compilation is not reentrant
    reload_lock: Arc<Mutex<()>>,
    reloads: Arc<AtomicU64>,
    failures: Arc<AtomicU64>,
}

impl ReloadablePropertyRules {
    /// Compile the configured protection file.
    pub fn new(
        config: ProtectionConfig,
        enforcer: Option<Arc<dyn PolicyEnforcer>>,
    ) -> Result<Self, RuleConfigError> {
        let rules = PropertyRules::from_config(&config, enforcer.clone())?;
        Ok(Self {
            inner: Arc::new(ArcSwap::from_pointee(rules)),
            config,
            enforcer,
            reload_lock: Arc::new(Mutex::new(())),
            reloads: Arc::new(AtomicU64::new(0)),
            failures: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Snapshot of the current ruleset.
    #[must_use]
    pub fn rules(&self) -> Arc<PropertyRules> {
        self.inner.load_full()
    }

    /// The configuration rules are loaded from.
    #[must_use]
    pub fn config(&self) -> &ProtectionConfig {
        &self.config
    }

    /// Rebuild the ruleset from the protection file and swap it in.
    ///
    /// On failure the current ruleset stays in place and the error is
    /// returned.
    pub fn reload(&self) -> Result<(), RuleConfigError> {
        let _guard = self
            .reload_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        match PropertyRules::from_config(&self.config, self.enforcer.clone()) {
            Ok(rules) => {
                let count = rules.len();
                self.inner.store(Arc::new(rules));
                self.reloads.fetch_add(1, Ordering::Relaxed);
                info!(rules = count, "Property protection rules reloaded");
                Ok(())
            }
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                error!(error = %e, "Property protection reload failed; keeping previous rules");
                Err(e)
            }
        }
    }

    /// Reload counters.
    #[must_use]
    pub fn stats(&self) -> ReloadStats {
        ReloadStats {
            reloads: self.reloads.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }

    /// Reload whenever the protection file changes.
    ///
    /// Must be called within a Tokio runtime. Watching stops when the
    /// returned handle is stopped or dropped.
    pub fn watch(&self, config: WatcherConfig) -> Result<WatcherHandle, WatchError> {
        let path = self.config.file.clone().ok_or(WatchError::NotEnabled)?;
        let file_name = path
            .file_name()
            .map(|name| name.to_os_string())
            .ok_or_else(|| WatchError::WatchFailed {
                path: path.clone(),
                reason: "not a file path".to_string(),
            })?;
        let watch_dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (tx, mut rx) = mpsc::channel::<PathBuf>(16);
        let reload_on_create = config.reload_on_create;
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let relevant =
                        event.kind.is_modify() || (reload_on_create && event.kind.is_create());
                    if !relevant {
                        return;
                    }
                    for changed in event.paths {
                        if changed.file_name() == Some(file_name.as_os_str()) {
                            // A full channel already has a reload pending
                            let _ = tx.try_send(changed);
                        }
                    }
                }
                Err(e) => error!(error = %e, "Property protection watcher error"),
            },
            NotifyConfig::default(),
        )
        .map_err(|e| WatchError::InitFailed(e.to_string()))?;

        watcher
            .watch(&watch_dir, RecursiveMode::NonRecursive)
            .map_err(|e| WatchError::WatchFailed {
                path: watch_dir.clone(),
                reason: e.to_string(),
            })?;

        info!(path = %path.display(), "Watching property protection file");

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let rules = self.clone();
        let debounce = config.debounce;
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    changed = rx.recv() => {
                        let Some(changed) = changed else { break };
                        tokio::time::sleep(debounce).await;
                        while rx.try_recv().is_ok() {}

                        info!(path = %changed.display(), "Property protection file changed, reloading");
                        let rules = rules.clone();
                        match tokio::task::spawn_blocking(move || rules.reload()).await {
                            Ok(Ok(())) => {}
                            Ok(Err(e)) => warn!(error = %e, "Ignoring invalid property protection file"),
                            Err(e) => error!(error = %e, "Property protection reload task failed"),
                        }
                    }
                }
            }
            debug!("Property protection watcher stopped");
        });

        Ok(WatcherHandle {
            _watcher: watcher,
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
            path,
        })
    }

    /// Start watching when the configuration asks for it.
    ///
    /// Returns `None` when `watch` is off.
    pub fn watch_if_enabled(&self) -> Result<Option<WatcherHandle>, WatchError> {
        if !self.config.watch {
            debug!("Property protection file watching is disabled");
            return Ok(None);
        }
        self.watch(WatcherConfig::from(&self.config)).map(Some)
    }
}

impl fmt::Debug for ReloadablePropertyRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReloadablePropertyRules")
            .field("config", &self.config)
            .field("rules", &self.inner.load().len())
            .field("stats", &self.stats())
            .finish()
    }
}

// =============================================================================
// Watcher
// =============================================================================

/// Errors that can occur when starting a watcher.
#[derive(Debug, Error)]
pub enum WatchError {
    /// No protection file is configured.
    #[error("Property protection is not enabled")]
    NotEnabled,

    /// The platform watcher could not be created.
    #[error("Failed to initialize file watcher: {0}")]
    InitFailed(String),

    /// The path could not be watched.
    #[error("Failed to watch path {}: {reason}", .path.display())]
    WatchFailed {
        /// The path that could not be watched.
        path: PathBuf,
        /// Watcher message.
        reason: String,
    },
}

/// Configuration for the protection file watcher.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Quiet period after a change before reloading
    pub debounce: Duration,
    /// Whether to reload on file creation (not just modification)
    pub reload_on_create: bool,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            reload_on_create: true,
        }
    }
}

impl WatcherConfig {
    /// Set the debounce duration.
    #[must_use]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }
}

impl From<&ProtectionConfig> for WatcherConfig {
    fn from(config: &ProtectionConfig) -> Self {
        Self::default().with_debounce(config.watch_debounce())
    }
}

/// Handle for a running watcher.
pub struct WatcherHandle {
    _watcher: RecommendedWatcher,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
    path: PathBuf,
}

impl WatcherHandle {
    /// The watched protection file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stop the watcher and wait for it to finish.
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}
