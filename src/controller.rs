//! Run orchestration: gate check, identify, enrich, measure, record, sync.
//!
//! The sequence is strictly linear. Side effects are ordered so the local
//! append always happens before the remote sync is attempted; a crash
//! mid-sync never loses a recorded measurement. Each step has a typed
//! error, and the entry point decides the exit code from the outcome.

use chrono::Local;
use thiserror::Error;

use crate::config::Config;
use crate::gate;
use crate::geo::{GeoError, LocationProvider};
use crate::identity::{IdentityError, IpResolver};
use crate::ledger::{Ledger, LedgerError, RunLock};
use crate::measure::ThroughputProvider;
use crate::record::MeasurementRecord;
use crate::remote::RemoteStore;
use crate::sync::{self, SyncReport};

/// A step failure that aborts the remainder of the current run.
///
/// Sync failures are deliberately not represented here: once the record is
/// in the local ledger the run has completed, and a failed mirror push is
/// reported through [`SyncReport`] instead.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("public IP discovery failed")]
    Identify(#[source] IdentityError),

    #[error("geolocation lookup failed")]
    Enrich(#[source] GeoError),

    #[error("throughput measurement failed")]
    Measure(#[source] anyhow::Error),

    #[error("ledger append failed")]
    Ledger(#[source] LedgerError),
}

/// Terminal state of one invocation.
#[derive(Debug)]
pub enum RunOutcome {
    /// Gate marker absent or unreachable; nothing else happened.
    GateSkipped,
    /// Measurement recorded locally; `synced` says whether the mirrors took.
    Completed { synced: SyncReport },
    /// A step in identify/enrich/measure/append failed; later steps were
    /// skipped, earlier side effects (none or the lock only) are undone.
    Failed(RunError),
}

pub struct RunController<'a> {
    config: &'a Config,
    store: &'a dyn RemoteStore,
    resolver: &'a dyn IpResolver,
    locator: Option<&'a dyn LocationProvider>,
    provider: &'a dyn ThroughputProvider,
}

impl<'a> RunController<'a> {
    pub fn new(
        config: &'a Config,
        store: &'a dyn RemoteStore,
        resolver: &'a dyn IpResolver,
        locator: Option<&'a dyn LocationProvider>,
        provider: &'a dyn ThroughputProvider,
    ) -> Self {
        Self {
            config,
            store,
            resolver,
            locator,
            provider,
        }
    }

    /// Execute one gated run end to end.
    ///
    /// Always logs the terminal "Done" line, whatever the outcome.
    pub async fn run(&self) -> RunOutcome {
        let outcome = self.run_inner().await;
        match &outcome {
            RunOutcome::GateSkipped => {}
            RunOutcome::Completed { synced } => {
                tracing::info!(
                    ledger_synced = synced.ledger,
                    log_synced = synced.log,
                    "run completed"
                );
            }
            RunOutcome::Failed(e) => {
                tracing::error!(error = %e, detail = ?e, "run aborted");
            }
        }
        tracing::info!("Done");
        outcome
    }

    async fn run_inner(&self) -> RunOutcome {
        if !gate::check(self.store, &self.config.remote.gate_path()).await {
            return RunOutcome::GateSkipped;
        }

        let _lock = match RunLock::acquire(self.config.storage.lock_path()) {
            Ok(lock) => lock,
            Err(e) => return RunOutcome::Failed(RunError::Ledger(e)),
        };

        match self.measure_and_record().await {
            Ok(synced) => RunOutcome::Completed { synced },
            Err(e) => RunOutcome::Failed(e),
        }
    }

    async fn measure_and_record(&self) -> Result<SyncReport, RunError> {
        let ip = self
            .resolver
            .public_ip()
            .await
            .map_err(RunError::Identify)?;
        tracing::info!(%ip, "identified public address");

        let location = match self.locator {
            Some(locator) => Some(locator.locate(&ip).await.map_err(RunError::Enrich)?),
            None => None,
        };

        let throughput = self.provider.measure().await.map_err(RunError::Measure)?;

        let record = MeasurementRecord {
            timestamp: Local::now().naive_local(),
            ip,
            location,
            download_mbps: throughput.download_mbps,
            upload_mbps: throughput.upload_mbps,
        };
        let line = record.to_line();
        tracing::info!(record = line.trim_end(), "saving measurement");

        let ledger = Ledger::new(self.config.storage.ledger_path());
        ledger.append(&line).map_err(RunError::Ledger)?;

        Ok(sync::push_all(
            self.store,
            &self.config.storage.ledger_path(),
            &self.config.storage.log_path(),
            &self.config.remote.root,
        )
        .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measure::Throughput;
    use crate::remote::RemoteError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    /// In-memory log sink so tests can assert on emitted lines.
    #[derive(Clone, Default)]
    struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

    impl CaptureWriter {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl std::io::Write for CaptureWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CaptureWriter {
        type Writer = CaptureWriter;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    struct MockStore {
        gate_present: bool,
        fail_uploads: bool,
        exists_calls: AtomicUsize,
        objects: Mutex<HashMap<String, Vec<u8>>>,
    }

    impl MockStore {
        fn new(gate_present: bool) -> Self {
            Self {
                gate_present,
                fail_uploads: false,
                exists_calls: AtomicUsize::new(0),
                objects: Mutex::new(HashMap::new()),
            }
        }
    }

    #[async_trait]
    impl RemoteStore for MockStore {
        async fn exists(&self, _path: &str) -> Result<bool, RemoteError> {
            self.exists_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.gate_present)
        }

        async fn upload_overwrite(&self, path: &str, body: Vec<u8>) -> Result<(), RemoteError> {
            if self.fail_uploads {
                return Err(RemoteError::Api {
                    status: 503,
                    body: "upload refused".to_string(),
                });
            }
            self.objects.lock().unwrap().insert(path.to_string(), body);
            Ok(())
        }
    }

    struct MockResolver {
        calls: AtomicUsize,
    }

    impl MockResolver {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl IpResolver for MockResolver {
        async fn public_ip(&self) -> Result<String, IdentityError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("203.0.113.5".to_string())
        }
    }

    struct MockLocator;

    #[async_trait]
    impl LocationProvider for MockLocator {
        async fn locate(&self, _ip: &str) -> Result<String, GeoError> {
            Ok("Springfield, ExampleISP".to_string())
        }
    }

    struct MockProvider {
        fail: bool,
        calls: AtomicUsize,
    }

    impl MockProvider {
        fn new(fail: bool) -> Self {
            Self {
                fail,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ThroughputProvider for MockProvider {
        async fn measure(&self) -> anyhow::Result<Throughput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("speedtest binary not found");
            }
            Ok(Throughput {
                download_mbps: 93.4,
                upload_mbps: 11.2,
            })
        }
    }

    fn test_config(dir: &std::path::Path) -> Config {
        let mut cfg = Config::default();
        cfg.storage.data_dir = dir.to_path_buf();
        cfg
    }

    #[tokio::test]
    async fn test_gate_closed_means_no_side_effects() {
        let dir = tempfile::TempDir::new().unwrap();
        let cfg = test_config(dir.path());
        let store = MockStore::new(false);
        let resolver = MockResolver::new();
        let provider = MockProvider::new(false);

        let controller = RunController::new(&cfg, &store, &resolver, None, &provider);
        let outcome = controller.run().await;

        assert!(matches!(outcome, RunOutcome::GateSkipped));
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert!(store.objects.lock().unwrap().is_empty());
        assert!(!cfg.storage.ledger_path().exists());
    }

    #[tokio::test]
    async fn test_successful_run_appends_exactly_one_record() {
        let dir = tempfile::TempDir::new().unwrap();
        let cfg = test_config(dir.path());
        let store = MockStore::new(true);
        let resolver = MockResolver::new();
        let locator = MockLocator;
        let provider = MockProvider::new(false);

        let ledger = Ledger::new(cfg.storage.ledger_path());
        ledger.append("2023-12-31 23:59:59  |  198.51.100.1  |  download = 50.0 Mbps  |  upload = 5.0 Mbps\n").unwrap();
        // Give the sync something to push for the log file too.
        std::fs::write(cfg.storage.log_path(), "log so far\n").unwrap();

        let controller =
            RunController::new(&cfg, &store, &resolver, Some(&locator), &provider);
        let outcome = controller.run().await;

        let RunOutcome::Completed { synced } = outcome else {
            panic!("expected completed run");
        };
        assert!(synced.all_ok());
        assert_eq!(ledger.line_count().unwrap(), 2);

        let content = std::fs::read_to_string(cfg.storage.ledger_path()).unwrap();
        let last = content.lines().last().unwrap();
        assert!(last.ends_with(
            "|  203.0.113.5  |  Springfield, ExampleISP  |  download = 93.4 Mbps  |  upload = 11.2 Mbps"
        ));

        // Remote ledger mirrors the full local file, not just the new line.
        let objects = store.objects.lock().unwrap();
        let remote_ledger = objects.get("/internet_speed/speed_tests.txt").unwrap();
        assert_eq!(remote_ledger, content.as_bytes());
        assert!(objects.contains_key("/internet_speed/speedledger.log"));
    }

    #[tokio::test]
    async fn test_measurement_failure_leaves_ledger_unchanged() {
        let dir = tempfile::TempDir::new().unwrap();
        let cfg = test_config(dir.path());
        let store = MockStore::new(true);
        let resolver = MockResolver::new();
        let provider = MockProvider::new(true);

        let logs = CaptureWriter::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let controller = RunController::new(&cfg, &store, &resolver, None, &provider);
        let outcome = controller.run().await;

        assert!(matches!(
            outcome,
            RunOutcome::Failed(RunError::Measure(_))
        ));
        assert!(!cfg.storage.ledger_path().exists());
        assert!(store.objects.lock().unwrap().is_empty());
        // The terminal line is logged even though the run aborted.
        assert!(logs.contents().contains("Done"));
    }

    #[tokio::test]
    async fn test_sync_failure_keeps_local_record_and_does_not_propagate() {
        let dir = tempfile::TempDir::new().unwrap();
        let cfg = test_config(dir.path());
        let mut store = MockStore::new(true);
        store.fail_uploads = true;
        let resolver = MockResolver::new();
        let provider = MockProvider::new(false);

        let controller = RunController::new(&cfg, &store, &resolver, None, &provider);
        let outcome = controller.run().await;

        let RunOutcome::Completed { synced } = outcome else {
            panic!("sync failure must not fail the run");
        };
        assert!(!synced.ledger);

        let ledger = Ledger::new(cfg.storage.ledger_path());
        assert_eq!(ledger.line_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_run_releases_lock_for_next_invocation() {
        let dir = tempfile::TempDir::new().unwrap();
        let cfg = test_config(dir.path());
        let store = MockStore::new(true);
        let resolver = MockResolver::new();
        let provider = MockProvider::new(false);

        let controller = RunController::new(&cfg, &store, &resolver, None, &provider);
        controller.run().await;
        assert!(!cfg.storage.lock_path().exists());

        // A held lock makes the next run fail instead of interleaving.
        let held = RunLock::acquire(cfg.storage.lock_path()).unwrap();
        let outcome = controller.run().await;
        assert!(matches!(
            outcome,
            RunOutcome::Failed(RunError::Ledger(LedgerError::Locked { .. }))
        ));
        drop(held);
    }
}
