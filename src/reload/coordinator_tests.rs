//! Tests for the reload coordinator.

use super::*;
use crate::error::{ReloadError, ValidationError, WatchError};
use crate::guard::ImmutableKeySet;
use crate::layer::FlagSet;
use crate::schema::Validator;
use crate::snapshot::{LiveSnapshot, Pipeline, Snapshot};
use crate::time::Clock;
use crate::value::Value;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use serde_json::json;
use tempfile::TempDir;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Clock pinned to a fixed instant.
struct FixedClock(SystemTime);

impl Clock for FixedClock {
    fn now(&self) -> SystemTime {
        self.0
    }
}

fn at() -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)
}

fn schema() -> Validator {
    Validator::from_json(json!({
        "type": "object",
        "properties": {
            "db": {
                "type": "object",
                "properties": { "url": { "type": "string" } }
            },
            "log": {
                "type": "object",
                "properties": {
                    "level": { "type": "string", "enum": ["info", "debug", "warn"], "default": "info" }
                }
            }
        }
    }))
    .unwrap()
}

struct Fixture {
    _dir: TempDir,
    file: PathBuf,
    context: Arc<ReloadContext>,
    validation_failures: Arc<AtomicUsize>,
}

impl Fixture {
    fn new(initial: &str, immutables: &[&str]) -> Self {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("app.yaml");
        std::fs::write(&file, initial).unwrap();

        let validator = schema();
        let pipeline = Pipeline::new(
            validator.defaults(),
            validator.paths(),
            vec![file.clone()],
            FlagSet::new(),
            "",
            Arc::new(HashMap::<String, String>::new()),
        );
        let live = LiveSnapshot::new(pipeline.build().unwrap());
        let validation_failures = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&validation_failures);

        let context = Arc::new(ReloadContext {
            pipeline,
            validator,
            immutables: ImmutableKeySet::new(immutables.iter().copied()),
            live,
            notifier: Notifier::new(16, None),
            on_validation_error: Some(Arc::new(move |_: &Snapshot, _: &ValidationError| {
                counter.fetch_add(1, Ordering::SeqCst);
            })),
            clock: Arc::new(FixedClock(at())),
        });

        Self {
            _dir: dir,
            file,
            context,
            validation_failures,
        }
    }

    fn coordinator(&self) -> (watch::Sender<bool>, ReloadCoordinator) {
        let (tx, rx) = watch::channel(false);
        (
            tx,
            ReloadCoordinator::new(&self.file, Arc::clone(&self.context), rx),
        )
    }

    fn edit(&self, content: &str) {
        std::fs::write(&self.file, content).unwrap();
    }

    fn changed(&self) -> ReloadEvent {
        ReloadEvent::Changed(self.file.clone())
    }

    fn live(&self, key: &str) -> Option<Value> {
        self.context.live.load().get(key).cloned()
    }
}

mod commit {
    use super::*;

    #[test]
    fn valid_change_is_committed_and_notified() {
        let fx = Fixture::new("log:\n  level: info\n", &[]);
        let mut rx = fx.context.notifier.subscribe();
        let (_cancel, mut coordinator) = fx.coordinator();

        fx.edit("log:\n  level: debug\n");
        let outcome = coordinator.handle(fx.changed());

        assert!(matches!(outcome, ReloadOutcome::Committed));
        assert_eq!(fx.live("log.level"), Some(Value::from("debug")));
        assert_eq!(coordinator.state(), ReloadState::Watching);

        let notification = rx.try_recv().unwrap();
        assert!(notification.is_success());
        assert_eq!(notification.event, fx.changed());
        assert_eq!(notification.at, at());
    }

    #[test]
    fn immutable_key_unchanged_still_commits() {
        let fx = Fixture::new("db:\n  url: X\nlog:\n  level: info\n", &["db.url"]);
        let (_cancel, mut coordinator) = fx.coordinator();

        fx.edit("db:\n  url: X\nlog:\n  level: warn\n");

        assert!(matches!(coordinator.handle(fx.changed()), ReloadOutcome::Committed));
        assert_eq!(fx.live("log.level"), Some(Value::from("warn")));
    }
}

mod rollback {
    use super::*;

    #[test]
    fn immutable_key_change_is_rejected() {
        let fx = Fixture::new("db:\n  url: X\n", &["db.url"]);
        let mut rx = fx.context.notifier.subscribe();
        let (_cancel, mut coordinator) = fx.coordinator();

        fx.edit("db:\n  url: Y\n");
        let outcome = coordinator.handle(fx.changed());

        let ReloadOutcome::RolledBack(error) = outcome else {
            panic!("expected rollback");
        };
        let violation = error.as_immutable().unwrap();
        assert_eq!(violation.key, "db.url");
        assert_eq!(violation.old, Some(Value::from("X")));
        assert_eq!(violation.new, Some(Value::from("Y")));
        assert_eq!(fx.live("db.url"), Some(Value::from("X")));

        let notification = rx.try_recv().unwrap();
        assert!(matches!(
            notification.error.as_deref(),
            Some(ReloadError::Immutable(_))
        ));
    }

    #[test]
    fn malformed_yaml_keeps_live_snapshot() {
        let fx = Fixture::new("log:\n  level: debug\n", &[]);
        let mut rx = fx.context.notifier.subscribe();
        let (_cancel, mut coordinator) = fx.coordinator();
        let before = fx.context.live.load().to_json_bytes();

        fx.edit("log: [unclosed\n");
        let outcome = coordinator.handle(fx.changed());

        assert!(matches!(
            outcome,
            ReloadOutcome::RolledBack(ref e) if matches!(**e, ReloadError::Load(_))
        ));
        assert_eq!(fx.context.live.load().to_json_bytes(), before);
        assert!(rx.try_recv().unwrap().error.is_some());
    }

    #[test]
    fn invalid_candidate_keeps_live_snapshot_and_calls_hook() {
        let fx = Fixture::new("log:\n  level: debug\n", &[]);
        let (_cancel, mut coordinator) = fx.coordinator();

        fx.edit("log:\n  level: loud\n");
        let outcome = coordinator.handle(fx.changed());

        let ReloadOutcome::RolledBack(error) = outcome else {
            panic!("expected rollback");
        };
        assert!(error.as_validation().unwrap().mentions("log.level"));
        assert_eq!(fx.live("log.level"), Some(Value::from("debug")));
        assert_eq!(fx.validation_failures.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn removed_file_rolls_back() {
        let fx = Fixture::new("log:\n  level: debug\n", &[]);
        let (_cancel, mut coordinator) = fx.coordinator();

        std::fs::remove_file(&fx.file).unwrap();
        let outcome = coordinator.handle(ReloadEvent::Removed(fx.file.clone()));

        assert!(matches!(outcome, ReloadOutcome::RolledBack(_)));
        assert_eq!(fx.live("log.level"), Some(Value::from("debug")));
    }

    #[test]
    fn recovers_after_a_failed_attempt() {
        let fx = Fixture::new("log:\n  level: debug\n", &[]);
        let (_cancel, mut coordinator) = fx.coordinator();

        fx.edit("log:\n  level: loud\n");
        coordinator.handle(fx.changed());
        fx.edit("log:\n  level: warn\n");
        let outcome = coordinator.handle(fx.changed());

        assert!(matches!(outcome, ReloadOutcome::Committed));
        assert_eq!(fx.live("log.level"), Some(Value::from("warn")));
    }
}

mod watch_errors {
    use super::*;

    #[test]
    fn watch_error_is_reported_without_rebuild() {
        let fx = Fixture::new("log:\n  level: debug\n", &[]);
        let mut rx = fx.context.notifier.subscribe();
        let (_cancel, mut coordinator) = fx.coordinator();

        // Would fail validation if a rebuild were attempted
        fx.edit("log:\n  level: loud\n");
        let outcome = coordinator.handle(ReloadEvent::WatchError {
            path: fx.file.clone(),
            cause: WatchError::Backend("overflow".to_string()),
        });

        assert!(matches!(outcome, ReloadOutcome::Reported(WatchError::Backend(_))));
        assert_eq!(fx.validation_failures.load(Ordering::SeqCst), 0);
        assert!(matches!(
            rx.try_recv().unwrap().error.as_deref(),
            Some(ReloadError::Watch(_))
        ));
        assert_eq!(coordinator.state(), ReloadState::Watching);
    }
}

mod cancellation {
    use super::*;

    #[test]
    fn no_commit_after_cancel() {
        let fx = Fixture::new("log:\n  level: debug\n", &[]);
        let (cancel, mut coordinator) = fx.coordinator();

        cancel.send(true).unwrap();
        fx.edit("log:\n  level: warn\n");

        assert!(matches!(coordinator.handle(fx.changed()), ReloadOutcome::Cancelled));
        assert_eq!(fx.live("log.level"), Some(Value::from("debug")));
    }

    #[tokio::test]
    async fn run_stops_when_cancelled() {
        let fx = Fixture::new("log:\n  level: debug\n", &[]);
        let (cancel, coordinator) = fx.coordinator();
        let (_tx, rx) = mpsc::unbounded_channel::<ReloadEvent>();

        let task = tokio::spawn(coordinator.run(UnboundedReceiverStream::new(rx)));
        cancel.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn run_processes_events_in_order() {
        let fx = Fixture::new("log:\n  level: debug\n", &[]);
        let (_cancel, coordinator) = fx.coordinator();
        let (tx, rx) = mpsc::unbounded_channel();
        let mut notifications = fx.context.notifier.subscribe();

        fx.edit("log:\n  level: warn\n");
        tx.send(fx.changed()).unwrap();
        tx.send(ReloadEvent::WatchError {
            path: fx.file.clone(),
            cause: WatchError::Backend("late".to_string()),
        })
        .unwrap();
        drop(tx);

        coordinator.run(UnboundedReceiverStream::new(rx)).await;

        assert!(notifications.recv().await.unwrap().is_success());
        assert!(notifications.recv().await.unwrap().event.is_watch_error());
        assert_eq!(fx.live("log.level"), Some(Value::from("warn")));
    }
}

mod concurrency {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn readers_only_see_whole_snapshots() {
        let fx = Fixture::new("db:\n  url: a\nlog:\n  level: debug\n", &[]);
        let context = Arc::clone(&fx.context);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let reader = tokio::spawn(async move {
            for _ in 0..200 {
                let snapshot = context.live.load();
                let pair = (snapshot.get("db.url").cloned(), snapshot.get("log.level").cloned());
                sink.lock().unwrap().push(pair);
                tokio::task::yield_now().await;
            }
        });

        let (_cancel, mut coordinator) = fx.coordinator();
        for (url, level) in [("b", "warn"), ("c", "info"), ("d", "debug")] {
            fx.edit(&format!("db:\n  url: {url}\nlog:\n  level: {level}\n"));
            coordinator.handle(fx.changed());
        }
        reader.await.unwrap();

        let valid = [("a", "debug"), ("b", "warn"), ("c", "info"), ("d", "debug")];
        for (url, level) in seen.lock().unwrap().iter() {
            let pair = (
                url.as_ref().and_then(Value::as_str).unwrap(),
                level.as_ref().and_then(Value::as_str).unwrap(),
            );
            assert!(valid.contains(&pair), "torn snapshot {pair:?}");
        }
    }

    #[test]
    fn path_is_reported() {
        let fx = Fixture::new("", &[]);
        let (_cancel, coordinator) = fx.coordinator();
        assert_eq!(coordinator.path(), Path::new(&fx.file));
    }
}

mod state_order {
    use super::*;

    use std::io;

    /// Collects formatted log lines in memory.
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn handle_logged(fx: &Fixture) -> (ReloadOutcome, String) {
        let buffer = LogBuffer::default();
        let sink = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(move || sink.clone())
            .finish();
        let (_cancel, mut coordinator) = fx.coordinator();

        let outcome =
            tracing::subscriber::with_default(subscriber, || coordinator.handle(fx.changed()));

        (outcome, buffer.contents())
    }

    #[test]
    fn committing_is_entered_before_the_store() {
        let fx = Fixture::new("log:\n  level: info\n", &[]);
        fx.edit("log:\n  level: debug\n");

        let (outcome, logs) = handle_logged(&fx);

        assert!(matches!(outcome, ReloadOutcome::Committed));
        let committing = logs.find("to=committing").expect("committing transition logged");
        let stored = logs.find("Live snapshot replaced").expect("store logged");
        assert!(committing < stored, "{logs}");
    }

    #[test]
    fn rejected_commit_moves_from_committing_to_rolling_back() {
        let fx = Fixture::new("db:\n  url: postgres://a\n", &["db.url"]);
        fx.edit("db:\n  url: postgres://b\n");

        let (outcome, logs) = handle_logged(&fx);

        assert!(matches!(outcome, ReloadOutcome::RolledBack(_)));
        let committing = logs.find("to=committing").expect("committing transition logged");
        let rolling_back = logs.find("to=rolling back").expect("rollback transition logged");
        assert!(committing < rolling_back, "{logs}");
        assert!(!logs.contains("Live snapshot replaced"));
    }
}
