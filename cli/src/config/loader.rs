//! Simple CLI configuration loader for narrow
//!
//! Implements single-source priority loading with env and flag overrides:
//! 1. --config file/dir (highest priority)
//! 2. Current working directory: ./narrow.json or ./.narrow/config.json
//! 3. Git repository root: <repo_root>/.narrow/config.json
//! 4. User config: $XDG_CONFIG_HOME/narrow/config.json
//! 5. Built-in defaults (no files)

use anyhow::{anyhow, Context, Result};
use narrow_core::cache::find_git_root;
use narrow_core::config::FinderConfig;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming the worker executable
pub const WORKER_ENV: &str = "NARROW_WORKER";
/// Environment variable overriding the typing debounce window
pub const DEBOUNCE_ENV: &str = "NARROW_DEBOUNCE_MS";

/// CLI configuration loader
#[derive(Debug, Default)]
pub struct CliConfigLoader {
    /// Override config file/directory path
    config_override: Option<PathBuf>,
    /// Flag overrides
    worker_override: Option<String>,
    debounce_override: Option<u64>,
    par_run_override: bool,
}

impl CliConfigLoader {
    /// Create a new loader
    pub fn new() -> Self {
        Self::default()
    }

    /// Set config file/directory override
    pub fn with_config_override(mut self, path: PathBuf) -> Self {
        self.config_override = Some(path);
        self
    }

    /// Set worker executable override
    pub fn with_worker_override(mut self, worker: String) -> Self {
        self.worker_override = Some(worker);
        self
    }

    /// Set typing debounce override, in milliseconds
    pub fn with_debounce_override(mut self, debounce_ms: u64) -> Self {
        self.debounce_override = Some(debounce_ms);
        self
    }

    /// Ask the worker to run in parallel
    pub fn with_par_run(mut self, par_run: bool) -> Self {
        self.par_run_override = par_run;
        self
    }

    /// Load and resolve configuration
    pub async fn load(&self) -> Result<FinderConfig> {
        // Step 1: Find and load base configuration
        let config = if let Some(override_path) = &self.config_override {
            let path = expand_path(override_path);
            self.load_from_path(&path).await.with_context(|| {
                format!(
                    "Failed to load config from override path: {}",
                    path.display()
                )
            })?
        } else {
            self.search_and_load().await?
        };

        // Step 2: Apply environment and flag overrides
        let config = self.apply_overrides(config, |name| std::env::var(name).ok())?;

        // Step 3: Validate
        config
            .validate()
            .map_err(|e| anyhow!("Configuration validation failed: {}", e))?;

        Ok(config)
    }

    /// Search for config in priority order
    async fn search_and_load(&self) -> Result<FinderConfig> {
        let cwd = std::env::current_dir()?;
        let mut candidates = vec![
            cwd.join("narrow.json"),
            cwd.join(".narrow").join("config.json"),
        ];
        if let Some(git_root) = find_git_root(&cwd) {
            candidates.push(git_root.join(".narrow").join("config.json"));
        }
        if let Some(config_dir) = dirs::config_dir() {
            candidates.push(config_dir.join("narrow").join("config.json"));
        }

        for candidate in candidates {
            if candidate.is_file() {
                debug!(path = %candidate.display(), "loading config");
                return self.load_file(&candidate).await;
            }
        }

        debug!("no config file found, using defaults");
        Ok(FinderConfig::default())
    }

    /// Apply environment variables, then flags
    fn apply_overrides(
        &self,
        mut config: FinderConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<FinderConfig> {
        if let Some(worker) = env(WORKER_ENV).filter(|w| !w.trim().is_empty()) {
            config.worker_program = worker;
        }
        if let Some(debounce) = env(DEBOUNCE_ENV) {
            config.debounce.on_typed_ms = debounce
                .trim()
                .parse()
                .with_context(|| format!("Invalid {DEBOUNCE_ENV}: {debounce}"))?;
        }

        if let Some(worker) = &self.worker_override {
            config.worker_program = worker.clone();
        }
        if let Some(debounce_ms) = self.debounce_override {
            config.debounce.on_typed_ms = debounce_ms;
        }
        if self.par_run_override {
            config.par_run = true;
        }

        config.worker_program = shellexpand::tilde(&config.worker_program).into_owned();
        Ok(config)
    }

    /// Load configuration from a specific path (file or directory)
    async fn load_from_path(&self, path: &Path) -> Result<FinderConfig> {
        if path.is_file() {
            self.load_file(path).await
        } else if path.is_dir() {
            // Try config.json in the directory
            let config_file = path.join("config.json");
            if config_file.exists() {
                self.load_file(&config_file).await
            } else {
                Err(anyhow!(
                    "No config.json found in directory: {}",
                    path.display()
                ))
            }
        } else {
            Err(anyhow!("Config path does not exist: {}", path.display()))
        }
    }

    /// Load a single config file
    async fn load_file(&self, path: &Path) -> Result<FinderConfig> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }
}

/// Expand a leading `~` in a user-supplied path
pub fn expand_path(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(raw) => PathBuf::from(shellexpand::tilde(raw).into_owned()),
        None => path.to_path_buf(),
    }
}
