// src/rules/loader.rs - Rule directory loading, snapshot swaps, hot reload

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;
use tokio::time::{timeout, Duration};

use crate::rules::{BlacklistFile, KeywordFile, PatternRow, RuleStore};
use crate::types::CheckError;

pub const BLACKLIST_FILE: &str = "blacklist.yaml";
pub const KEYWORD_FILE: &str = "keywords.yaml";

const RELOAD_DEBOUNCE: Duration = Duration::from_millis(500);

/// Owns the current rule snapshot and the only mutability in the system.
///
/// Checks read an `Arc<RuleStore>` snapshot; a reload builds a new store
/// and swaps the pointer. Any failure during a reload keeps the
/// last-known-good snapshot in place.
pub struct RuleStoreManager {
    rules_dir: PathBuf,
    current: Arc<RwLock<Option<Arc<RuleStore>>>>,
    version: Arc<AtomicU64>,
    /// Held to keep the file watcher alive.
    watchers: Arc<RwLock<Vec<RecommendedWatcher>>>,
    last_reload: Arc<RwLock<std::time::Instant>>,
    load_timeout: Duration,
}

impl RuleStoreManager {
    pub fn new<P: AsRef<Path>>(rules_dir: P) -> Self {
        Self::with_load_timeout(rules_dir, Duration::from_secs(5))
    }

    pub fn with_load_timeout<P: AsRef<Path>>(rules_dir: P, load_timeout: Duration) -> Self {
        Self {
            rules_dir: rules_dir.as_ref().to_path_buf(),
            current: Arc::new(RwLock::new(None)),
            version: Arc::new(AtomicU64::new(0)),
            watchers: Arc::new(RwLock::new(Vec::new())),
            last_reload: Arc::new(RwLock::new(std::time::Instant::now())),
            load_timeout,
        }
    }

    /// Create the rules directory and starter files if missing, then load
    /// the initial snapshot.
    pub async fn initialize(&self) -> Result<()> {
        if !self.rules_dir.exists() {
            fs::create_dir_all(&self.rules_dir).await?;
            info!("created rules directory: {}", self.rules_dir.display());
        }
        self.write_default_files().await?;
        self.reload().await?;
        info!("rule store manager initialized");
        Ok(())
    }

    /// Reload both rule files and swap in a new snapshot. On any failure
    /// the previous snapshot stays current.
    pub async fn reload(&self) -> Result<()> {
        Self::load_and_swap(
            &self.rules_dir,
            &self.current,
            &self.version,
            self.load_timeout,
        )
        .await
    }

    /// The current snapshot, if one has ever loaded.
    pub async fn snapshot(&self) -> Option<Arc<RuleStore>> {
        self.current.read().await.clone()
    }

    /// The current snapshot, or a typed error for callers that cannot
    /// degrade.
    pub async fn require_snapshot(&self) -> Result<Arc<RuleStore>, CheckError> {
        self.snapshot().await.ok_or_else(|| {
            CheckError::RuleStoreUnavailable(format!(
                "no rule snapshot loaded from {}",
                self.rules_dir.display()
            ))
        })
    }

    /// Watch the rules directory and reload on file changes, debounced.
    pub async fn start_watcher(&self) -> Result<()> {
        let rules_dir = self.rules_dir.clone();
        let current = self.current.clone();
        let version = self.version.clone();
        let last_reload = self.last_reload.clone();
        let load_timeout = self.load_timeout;

        let (tx, mut rx) = tokio::sync::mpsc::channel(100);

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            if let Ok(event) = res {
                if let Err(e) = tx.blocking_send(event) {
                    error!("failed to forward rule file event: {}", e);
                }
            }
        })?;
        watcher.watch(&rules_dir, RecursiveMode::NonRecursive)?;
        self.watchers.write().await.push(watcher);

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                // Debounce rapid consecutive writes from editors
                {
                    let now = std::time::Instant::now();
                    let last = *last_reload.read().await;
                    if now.duration_since(last) < RELOAD_DEBOUNCE {
                        continue;
                    }
                    *last_reload.write().await = now;
                }

                if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                    continue;
                }

                let changed = event.paths.iter().any(|path| {
                    matches!(
                        path.file_name().and_then(|n| n.to_str()),
                        Some(
                            "blacklist.yaml" | "blacklist.yml" | "keywords.yaml" | "keywords.yml"
                        )
                    )
                });
                if !changed {
                    debug!("ignoring change to non-rule file: {:?}", event.paths);
                    continue;
                }

                info!("rule file changed, reloading...");
                if let Err(e) =
                    Self::load_and_swap(&rules_dir, &current, &version, load_timeout).await
                {
                    error!("rule reload failed, keeping previous snapshot: {}", e);
                }
            }
        });

        info!("rule file watcher started for {}", self.rules_dir.display());
        Ok(())
    }

    async fn load_and_swap(
        rules_dir: &Path,
        current: &Arc<RwLock<Option<Arc<RuleStore>>>>,
        version: &Arc<AtomicU64>,
        load_timeout: Duration,
    ) -> Result<()> {
        let next_version = version.load(Ordering::SeqCst) + 1;
        let store = timeout(load_timeout, Self::load_from_disk(rules_dir, next_version))
            .await
            .context("rule store load timed out")??;

        *current.write().await = Some(Arc::new(store));
        version.store(next_version, Ordering::SeqCst);
        Ok(())
    }

    async fn load_from_disk(rules_dir: &Path, version: u64) -> Result<RuleStore> {
        let blacklist_path = rules_dir.join(BLACKLIST_FILE);
        let content = fs::read_to_string(&blacklist_path)
            .await
            .with_context(|| format!("reading {}", blacklist_path.display()))?;
        let blacklist: BlacklistFile = serde_yaml::from_str(&content)
            .with_context(|| format!("parsing {}", blacklist_path.display()))?;

        let keyword_path = rules_dir.join(KEYWORD_FILE);
        let content = fs::read_to_string(&keyword_path)
            .await
            .with_context(|| format!("reading {}", keyword_path.display()))?;
        let keywords: KeywordFile = serde_yaml::from_str(&content)
            .with_context(|| format!("parsing {}", keyword_path.display()))?;

        debug!("rule files parsed from {}", rules_dir.display());
        Ok(RuleStore::from_files(&blacklist, &keywords, version))
    }

    /// Write starter rule files so a fresh install has something to edit.
    async fn write_default_files(&self) -> Result<()> {
        let blacklist_path = self.rules_dir.join(BLACKLIST_FILE);
        if !blacklist_path.exists() {
            let content = serde_yaml::to_string(&BlacklistFile::default())?;
            fs::write(&blacklist_path, content).await?;
            warn!("created empty blacklist file: {}", blacklist_path.display());
        }

        let keyword_path = self.rules_dir.join(KEYWORD_FILE);
        if !keyword_path.exists() {
            let defaults = KeywordFile {
                global_whitelist: vec!["cfx.re".to_string()],
                ip_violation: vec!["leak".to_string(), "leaked".to_string()],
                coc_violation: vec![
                    "cheat menu".to_string(),
                    "aimbot".to_string(),
                    "child:".to_string(),
                ],
                ip_bypass: vec!["anti-leak".to_string()],
                coc_bypass: vec!["anti-cheat".to_string()],
                contextual_patterns: vec![PatternRow {
                    a: "child".to_string(),
                    b: "nsfw".to_string(),
                }],
            };
            let content = serde_yaml::to_string(&defaults)?;
            fs::write(&keyword_path, content).await?;
            warn!("created starter keyword file: {}", keyword_path.display());
        }
        Ok(())
    }
}
