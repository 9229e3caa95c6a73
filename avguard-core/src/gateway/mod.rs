//! One-shot engine commands dispatched off the caller's task.

use std::{future::Future, sync::Arc, time::Duration};

use avguard_model::{EngineFailure, ProtectionStatus};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub mod io_pool;

pub use io_pool::IoPool;

use crate::{
    config::GuardConfig,
    engine::EngineApi,
    error::{GuardError, Result},
    synthesizer::{DEFAULT_DEBOUNCE_WINDOW, ScanStateSynthesizer},
};

/// Front door to the engine for UI code.
///
/// Every command is a single engine round trip executed on the [`IoPool`].
/// Engine failures come back unchanged as [`GuardError::Engine`]; nothing is
/// retried here.
#[derive(Clone)]
pub struct CommandGateway {
    engine: Arc<dyn EngineApi>,
    io: Arc<IoPool>,
    debounce_window: Duration,
}

impl std::fmt::Debug for CommandGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let engine_type = std::any::type_name_of_val(self.engine.as_ref());
        f.debug_struct("CommandGateway")
            .field("engine_type", &engine_type)
            .field("io", &self.io)
            .field("debounce_window", &self.debounce_window)
            .finish()
    }
}

impl CommandGateway {
    pub fn new(engine: Arc<dyn EngineApi>, io: Arc<IoPool>) -> Self {
        Self {
            engine,
            io,
            debounce_window: DEFAULT_DEBOUNCE_WINDOW,
        }
    }

    /// Build a gateway with its own I/O pool sized from `config`.
    pub fn from_config(
        engine: Arc<dyn EngineApi>,
        config: &GuardConfig,
    ) -> Result<Self> {
        let io = IoPool::new(config.io_worker_threads, &config.io_thread_name)?;
        Ok(Self::new(engine, Arc::new(io))
            .with_debounce_window(config.debounce_window()))
    }

    pub fn with_debounce_window(mut self, window: Duration) -> Self {
        self.debounce_window = window;
        self
    }

    pub fn debounce_window(&self) -> Duration {
        self.debounce_window
    }

    pub async fn is_protection_enabled(&self) -> Result<bool> {
        let body = self
            .dispatch("is_protection_enabled", |engine| async move {
                engine.is_protection_enabled().await
            })
            .await?;

        let Some(body) = body else {
            debug!("protection status response carried no body");
            return Ok(false);
        };

        let status = ProtectionStatus::decode(&body).map_err(|err| {
            warn!(error = %err, "protection status body could not be decoded");
            GuardError::from(err)
        })?;
        Ok(status.is_enabled())
    }

    pub async fn enable_protection(&self) -> Result<()> {
        self.dispatch("enable_protection", |engine| async move {
            engine.enable_protection().await
        })
        .await
    }

    pub async fn disable_protection(&self) -> Result<()> {
        self.dispatch("disable_protection", |engine| async move {
            engine.disable_protection().await
        })
        .await
    }

    pub async fn start_scan(&self, path: impl Into<String>) -> Result<()> {
        let path = path.into();
        info!(path = %path, "requesting scan");
        self.dispatch("start_scan", move |engine| async move {
            engine.start_scan(&path).await
        })
        .await
    }

    pub async fn pause_scan(&self) -> Result<()> {
        self.dispatch("pause_scan", |engine| async move {
            engine.pause_scan().await
        })
        .await
    }

    pub async fn resume_scan(&self) -> Result<()> {
        self.dispatch("resume_scan", |engine| async move {
            engine.resume_scan().await
        })
        .await
    }

    pub async fn stop_scan(&self) -> Result<()> {
        self.dispatch("stop_scan", |engine| async move {
            engine.stop_scan().await
        })
        .await
    }

    /// Start a synthesizer over the engine's scanner cache, bound to `scope`.
    pub fn observe_scan_state(
        &self,
        scope: &CancellationToken,
    ) -> ScanStateSynthesizer {
        ScanStateSynthesizer::spawn(
            self.engine.scanner_snapshots(),
            self.debounce_window,
            scope,
        )
    }

    async fn dispatch<T, F, Fut>(
        &self,
        operation: &'static str,
        call: F,
    ) -> Result<T>
    where
        F: FnOnce(Arc<dyn EngineApi>) -> Fut,
        Fut: Future<Output = std::result::Result<T, EngineFailure>>
            + Send
            + 'static,
        T: Send + 'static,
    {
        debug!(operation, "dispatching engine request");
        let outcome = self.io.run(operation, call(Arc::clone(&self.engine))).await?;

        outcome.map_err(|failure| {
            warn!(
                operation,
                error_code = failure.error_code,
                description = %failure.description,
                "engine request failed"
            );
            GuardError::Engine(failure)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{MockEngineApi, SnapshotCell};
    use avguard_model::{EntryStatus, RawScanEntry, RawScanSnapshot, ScanState, ScannerStatus};

    fn gateway(engine: MockEngineApi) -> CommandGateway {
        CommandGateway::new(
            Arc::new(engine),
            Arc::new(IoPool::current().expect("test runtime")),
        )
    }

    #[tokio::test]
    async fn missing_body_means_disabled() {
        let mut engine = MockEngineApi::new();
        engine
            .expect_is_protection_enabled()
            .times(1)
            .returning(|| Ok(None));

        assert_eq!(gateway(engine).is_protection_enabled().await, Ok(false));
    }

    #[tokio::test]
    async fn enabled_body_means_enabled() {
        let mut engine = MockEngineApi::new();
        engine
            .expect_is_protection_enabled()
            .returning(|| Ok(Some(ProtectionStatus::Enabled.encode())));

        assert_eq!(gateway(engine).is_protection_enabled().await, Ok(true));
    }

    #[tokio::test]
    async fn other_status_values_mean_disabled() {
        for body in [vec![0u8], vec![7u8], vec![0x80u8]] {
            let mut engine = MockEngineApi::new();
            engine
                .expect_is_protection_enabled()
                .returning(move || Ok(Some(body.clone())));

            assert_eq!(gateway(engine).is_protection_enabled().await, Ok(false));
        }
    }

    #[tokio::test]
    async fn malformed_body_is_an_error() {
        let mut engine = MockEngineApi::new();
        engine
            .expect_is_protection_enabled()
            .returning(|| Ok(Some(vec![1, 1, 1])));

        let err = gateway(engine).is_protection_enabled().await.unwrap_err();
        assert!(matches!(err, GuardError::Decode(_)));
        assert_eq!(err.error_code(), None);
    }

    #[tokio::test]
    async fn engine_failures_pass_through_unchanged() {
        let mut engine = MockEngineApi::new();
        engine
            .expect_is_protection_enabled()
            .returning(|| Err(EngineFailure::new("pipe closed", -32)));
        engine
            .expect_pause_scan()
            .times(1)
            .returning(|| Err(EngineFailure::new("not scanning", 2)));

        let gateway = gateway(engine);
        let err = gateway.is_protection_enabled().await.unwrap_err();
        assert_eq!(
            err.engine_failure(),
            Some(&EngineFailure::new("pipe closed", -32))
        );

        let err = gateway.pause_scan().await.unwrap_err();
        assert_eq!(err, GuardError::Engine(EngineFailure::new("not scanning", 2)));
        assert_eq!(err.error_code(), Some(2));
    }

    #[tokio::test]
    async fn each_command_issues_one_request() {
        let mut engine = MockEngineApi::new();
        engine.expect_enable_protection().times(1).returning(|| Ok(()));
        engine.expect_disable_protection().times(1).returning(|| Ok(()));
        engine
            .expect_start_scan()
            .withf(|path| path == "/home/user/Downloads")
            .times(1)
            .returning(|_| Ok(()));
        engine.expect_pause_scan().times(1).returning(|| Ok(()));
        engine.expect_resume_scan().times(1).returning(|| Ok(()));
        engine.expect_stop_scan().times(1).returning(|| Ok(()));

        let gateway = gateway(engine);
        gateway.enable_protection().await.unwrap();
        gateway.disable_protection().await.unwrap();
        gateway.start_scan("/home/user/Downloads").await.unwrap();
        gateway.pause_scan().await.unwrap();
        gateway.resume_scan().await.unwrap();
        gateway.stop_scan().await.unwrap();
    }

    #[tokio::test]
    async fn commands_run_on_the_io_pool() {
        let mut engine = MockEngineApi::new();
        engine.expect_stop_scan().returning(|| {
            assert_eq!(
                std::thread::current().name(),
                Some("avguard-io-gateway"),
                "engine call must not run on the caller thread"
            );
            Ok(())
        });

        let io = IoPool::new(1, "avguard-io-gateway").unwrap();
        let gateway = CommandGateway::new(Arc::new(engine), Arc::new(io));
        gateway.stop_scan().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn observe_scan_state_uses_engine_snapshots() {
        let cell = SnapshotCell::with_snapshot(Some(RawScanSnapshot::new(
            ScannerStatus::Idle,
            vec![RawScanEntry::new("a.txt", EntryStatus::ScannedInfected)],
        )));
        let subscription = cell.clone();
        let mut engine = MockEngineApi::new();
        engine
            .expect_scanner_snapshots()
            .times(1)
            .returning(move || subscription.subscribe());

        let gateway = gateway(engine).with_debounce_window(Duration::from_millis(50));
        let scope = CancellationToken::new();
        let synth = gateway.observe_scan_state(&scope);

        assert_eq!(synth.window(), Duration::from_millis(50));
        let mut observer = synth.observe();
        assert_eq!(
            observer.next().await,
            Some(ScanState::VirusesDetected {
                viruses: vec!["a.txt".into()],
            })
        );

        cell.publish(None);
        assert_eq!(observer.next().await, Some(ScanState::Empty));
    }
}
