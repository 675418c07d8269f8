//! The configuration provider.
//!
//! [`Provider`] owns the live snapshot, serves typed reads from it, and runs
//! one reload coordinator per watched config file.
//!
//! # Example
//!
//! ```no_run
//! use hotconf::{FlagSet, NotifyWatcher, Provider};
//!
//! # async fn run() -> Result<(), hotconf::ConfigError> {
//! let schema = br#"{"properties": {"log": {"properties": {"level": {"type": "string", "default": "info"}}}}}"#;
//! let provider = Provider::builder(schema.to_vec())
//!     .with_config_files(["app.yaml"])
//!     .with_flags(FlagSet::new().with_changed("log.level", "debug"))
//!     .with_immutables(["db.url"])
//!     .build()?;
//!
//! provider.watch(&NotifyWatcher)?;
//! assert_eq!(provider.string("log.level"), "debug");
//! # Ok(())
//! # }
//! ```

mod accessors;
mod derived;

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

pub use derived::{CorsPolicy, JaegerConfig, TracingConfig, ZipkinConfig};

use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::defaults::NOTIFICATION_CAPACITY;
use crate::error::{ConfigError, ImmutableViolation, ReloadError, ValidationError, WatchError};
use crate::guard::ImmutableKeySet;
use crate::layer::{EnvSource, FileFormat, FlagSet, ProcessEnv, expand_home};
use crate::reload::{
    ConfigWatcher, DebouncePolicy, Notifier, OnChange, OnValidationError, ReloadContext,
    ReloadCoordinator, ReloadEvent, ReloadNotification,
};
use crate::render::render_validation_errors;
use crate::schema::Validator;
use crate::snapshot::{LiveSnapshot, Pipeline, Snapshot};
use crate::time::{Clock, SystemClock};
use crate::value::Value;

/// Builder for [`Provider`].
pub struct ProviderBuilder {
    schema: Vec<u8>,
    files: Vec<PathBuf>,
    flags: FlagSet,
    env: Arc<dyn EnvSource>,
    env_prefix: String,
    immutables: Vec<String>,
    on_change: Option<OnChange>,
    on_validation_error: Option<OnValidationError>,
    capacity: usize,
    debounce: DebouncePolicy,
    clock: Arc<dyn Clock>,
}

impl ProviderBuilder {
    fn new(schema: Vec<u8>) -> Self {
        Self {
            schema,
            files: Vec::new(),
            flags: FlagSet::new(),
            env: Arc::new(ProcessEnv),
            env_prefix: String::new(),
            immutables: Vec::new(),
            on_change: None,
            on_validation_error: None,
            capacity: NOTIFICATION_CAPACITY,
            debounce: DebouncePolicy::default(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Sets the command-line flags.
    ///
    /// Files listed by the `config` flag are loaded after any files given
    /// to [`ProviderBuilder::with_config_files`].
    #[must_use]
    pub fn with_flags(mut self, flags: FlagSet) -> Self {
        self.flags = flags;
        self
    }

    /// Appends config files, lowest precedence first.
    #[must_use]
    pub fn with_config_files<I, P>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.files.extend(files.into_iter().map(Into::into));
        self
    }

    /// Sets the environment source (defaults to the process environment).
    #[must_use]
    pub fn with_env(mut self, env: impl EnvSource + 'static) -> Self {
        self.env = Arc::new(env);
        self
    }

    /// Sets the prefix prepended to environment variable names.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Declares key paths that must not change across reloads.
    #[must_use]
    pub fn with_immutables<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.immutables.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Sets a callback invoked once per reload attempt.
    #[must_use]
    pub fn with_on_change(
        mut self,
        on_change: impl Fn(&ReloadEvent, Option<&ReloadError>) + Send + Sync + 'static,
    ) -> Self {
        self.on_change = Some(Arc::new(on_change));
        self
    }

    /// Sets a callback invoked whenever a candidate fails validation,
    /// including at startup.
    #[must_use]
    pub fn with_on_validation_error(
        mut self,
        hook: impl Fn(&Snapshot, &ValidationError) + Send + Sync + 'static,
    ) -> Self {
        self.on_validation_error = Some(Arc::new(hook));
        self
    }

    /// Sets how many notifications each subscriber may lag behind.
    #[must_use]
    pub const fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the debounce policy applied to watched files.
    #[must_use]
    pub fn with_debounce(mut self, debounce: DebouncePolicy) -> Self {
        self.debounce = debounce;
        self
    }

    /// Sets the clock used to stamp notifications.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Compiles the schema and loads the first snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the schema does not compile, a config file
    /// cannot be loaded, or the merged configuration is invalid.
    pub fn build(self) -> Result<Provider, ConfigError> {
        let validator = Validator::compile(&self.schema)?;

        // Resolve `~/` once so loading and watching agree on the path.
        let files: Vec<PathBuf> = self
            .files
            .into_iter()
            .chain(self.flags.config_files().into_iter().map(PathBuf::from))
            .map(|file| expand_home(&file))
            .collect();
        for file in &files {
            FileFormat::from_path(file)?;
        }

        let pipeline = Pipeline::new(
            validator.defaults(),
            validator.paths(),
            files,
            self.flags,
            self.env_prefix,
            self.env,
        );
        let initial = pipeline.build()?;

        let context = ReloadContext {
            pipeline,
            validator,
            immutables: ImmutableKeySet::new(self.immutables),
            live: LiveSnapshot::new(initial),
            notifier: Notifier::new(self.capacity, self.on_change),
            on_validation_error: self.on_validation_error,
            clock: self.clock,
        };
        let initial = context.live.load();
        context.validate(&initial)?;

        tracing::debug!(
            files = context.pipeline.files().len(),
            keys = initial.keys().len(),
            "Configuration loaded"
        );

        Ok(Provider {
            context: Arc::new(context),
            debounce: self.debounce,
            tasks: Mutex::new(HashMap::new()),
        })
    }
}

impl std::fmt::Debug for ProviderBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderBuilder")
            .field("files", &self.files)
            .field("flags", &self.flags)
            .field("env_prefix", &self.env_prefix)
            .field("immutables", &self.immutables)
            .field("capacity", &self.capacity)
            .field("debounce", &self.debounce)
            .finish_non_exhaustive()
    }
}

struct WatchTask {
    cancel: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Validated, layered, hot-reloadable configuration.
///
/// Reads never block on reloads and always observe a complete snapshot.
pub struct Provider {
    context: Arc<ReloadContext>,
    debounce: DebouncePolicy,
    tasks: Mutex<HashMap<PathBuf, WatchTask>>,
}

impl Provider {
    /// Starts building a provider for the given JSON schema.
    #[must_use]
    pub fn builder(schema: impl Into<Vec<u8>>) -> ProviderBuilder {
        ProviderBuilder::new(schema.into())
    }

    /// Returns the live snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.context.live.load()
    }

    /// Subscribes to reload notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ReloadNotification> {
        self.context.notifier.subscribe()
    }

    /// Layers `value` at `key` on top of the live snapshot.
    ///
    /// The override is not validated or persisted: the next reload rebuilds
    /// from the sources and drops it. Immutable keys are still enforced.
    ///
    /// # Errors
    ///
    /// Returns [`ImmutableViolation`] if the override would change an
    /// immutable key; the live snapshot is left untouched.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<(), ImmutableViolation> {
        let value = value.into();
        self.context
            .live
            .try_update(|live| {
                let next = live.with_override(key, value);
                self.context.immutables.check(live, &next)?;
                Ok(next)
            })
            .inspect_err(|violation: &ImmutableViolation| {
                tracing::warn!(
                    key = %violation.key,
                    old_value = ?violation.old,
                    new_value = ?violation.new,
                    "Refusing override of immutable configuration key"
                );
            })
    }

    /// Watches every config file with `watcher`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Watch`] for the first file that cannot be
    /// watched; files watched before it keep being watched.
    pub fn watch<W: ConfigWatcher>(&self, watcher: &W) -> Result<(), ConfigError> {
        for path in self.context.pipeline.files() {
            self.watch_path(watcher, path)?;
        }
        Ok(())
    }

    /// Starts a reload coordinator for one path.
    ///
    /// Watching a path that is already watched replaces its coordinator.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Setup`] if no tokio runtime is running or the
    /// watcher cannot watch the path.
    pub fn watch_path<W: ConfigWatcher>(&self, watcher: &W, path: &Path) -> Result<(), WatchError> {
        let runtime = Handle::try_current().map_err(|e| WatchError::Setup {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let events = self.debounce.apply(watcher.watch(path)?);

        let mut tasks = self.lock_tasks();
        // The old coordinator must be cancelled before the new one can commit.
        if let Some(previous) = tasks.remove(path) {
            let _ = previous.cancel.send(true);
        }
        let (cancel, cancelled) = watch::channel(false);
        let coordinator = ReloadCoordinator::new(path, Arc::clone(&self.context), cancelled);
        let handle = runtime.spawn(coordinator.run(events));
        tasks.insert(path.to_path_buf(), WatchTask { cancel, handle });
        drop(tasks);

        tracing::info!(file = %path.display(), "Watching config file for changes");
        Ok(())
    }

    /// Stops watching `path`. Returns false if it was not watched.
    ///
    /// No commit for `path` happens after this returns.
    pub fn stop_watching(&self, path: &Path) -> bool {
        let Some(task) = self.lock_tasks().remove(path) else {
            return false;
        };
        let _ = task.cancel.send(true);
        tracing::debug!(file = %path.display(), "Stopped watching config file");
        true
    }

    /// Returns the watched paths, sorted.
    #[must_use]
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.lock_tasks().keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Stops every coordinator and waits for them to finish.
    pub async fn shutdown(&self) {
        let tasks: Vec<WatchTask> = self.lock_tasks().drain().map(|(_, task)| task).collect();
        for task in &tasks {
            let _ = task.cancel.send(true);
        }
        for task in tasks {
            if let Err(e) = task.handle.await {
                tracing::warn!("Reload coordinator ended abnormally: {e}");
            }
        }
    }

    /// Renders `error` for a terminal, citing values from the live snapshot.
    ///
    /// # Errors
    ///
    /// Returns any I/O error raised by `w`.
    pub fn print_human_readable_validation_errors(
        &self,
        w: &mut impl Write,
        error: &ValidationError,
    ) -> io::Result<()> {
        render_validation_errors(w, &self.snapshot().to_json_bytes(), error)
    }

    fn lock_tasks(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, WatchTask>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Provider {
    fn drop(&mut self) {
        let tasks = self.tasks.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, task) in tasks.drain() {
            let _ = task.cancel.send(true);
        }
    }
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("context", &self.context)
            .field("watched", &self.watched_paths())
            .finish_non_exhaustive()
    }
}
