//! Stage reconciliation.

use crate::batch::{MAX_OPERATIONS_PER_BATCH, PatchBatch, chunk};
use crate::retry::{RetryPolicy, Sleeper, TokioSleeper};
use chrono::{DateTime, Utc};
use gwcache_core::patch::compile;
use gwcache_core::ports::{GatewayError, StageGateway};
use gwcache_core::settings::Resolution;
use gwcache_core::stage::{StageSnapshot, StageTarget};
use gwcache_core::{Error, ReconciliationId, Result};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, debug, error, info, info_span, warn};

/// Phases of one reconciliation pass, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcilePhase {
    Resolving,
    FetchingLiveState,
    Compiling,
    Chunking,
    Applying,
    Done,
    Failed,
}

impl fmt::Display for ReconcilePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Resolving => "resolving",
            Self::FetchingLiveState => "fetching_live_state",
            Self::Compiling => "compiling",
            Self::Chunking => "chunking",
            Self::Applying => "applying",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// How a successful pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// The service declares no caching block.
    SettingsUndefined,
    /// The compiled patch set was empty.
    NothingToApply,
    Applied,
}

/// One `updateStage` call. `error` holds the conflict that caused a retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyAttempt {
    pub batch: usize,
    pub attempt: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub id: ReconciliationId,
    pub target: Option<StageTarget>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: ReconcileOutcome,
    pub operations: usize,
    pub batches: usize,
    pub apply_calls: u32,
    pub attempts: Vec<ApplyAttempt>,
}

impl ReconcileReport {
    fn started(id: ReconciliationId) -> Self {
        let now = Utc::now();
        Self {
            id,
            target: None,
            started_at: now,
            finished_at: now,
            outcome: ReconcileOutcome::SettingsUndefined,
            operations: 0,
            batches: 0,
            apply_calls: 0,
            attempts: Vec::new(),
        }
    }

    fn finish(mut self, outcome: ReconcileOutcome) -> Self {
        self.outcome = outcome;
        self.finished_at = Utc::now();
        self
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

/// Brings a deployed stage in line with resolved caching settings.
pub struct StageReconciler {
    gateway: Arc<dyn StageGateway>,
    sleeper: Arc<dyn Sleeper>,
    retry: RetryPolicy,
    batch_size: usize,
    deadline: Option<Duration>,
}

impl StageReconciler {
    pub fn new(gateway: Arc<dyn StageGateway>) -> Self {
        Self {
            gateway,
            sleeper: Arc::new(TokioSleeper),
            retry: RetryPolicy::default(),
            batch_size: MAX_OPERATIONS_PER_BATCH,
            deadline: None,
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Bound the apply phase. Batches already applied stay applied.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Run one reconciliation pass against `rest_api_id`.
    pub async fn reconcile(&self, resolution: &Resolution, rest_api_id: &str) -> Result<ReconcileReport> {
        let id = ReconciliationId::new();
        let span = info_span!("reconcile", reconciliation = %id, rest_api_id);
        async move {
            let result = self.run(id, resolution, rest_api_id).await;
            match &result {
                Ok(report) => info!(
                    phase = %ReconcilePhase::Done,
                    outcome = ?report.outcome,
                    apply_calls = report.apply_calls,
                    duration_ms = report.duration_ms(),
                    "Reconciliation finished"
                ),
                Err(e) => error!(phase = %ReconcilePhase::Failed, error = %e, "Reconciliation failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run(&self, id: ReconciliationId, resolution: &Resolution, rest_api_id: &str) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::started(id);

        debug!(phase = %ReconcilePhase::Resolving);
        let Some(settings) = resolution.settings() else {
            info!("No caching settings declared, nothing to reconcile");
            return Ok(report.finish(ReconcileOutcome::SettingsUndefined));
        };
        let target = StageTarget::new(rest_api_id, &settings.global.stage, &settings.global.region);
        report.target = Some(target.clone());

        debug!(phase = %ReconcilePhase::FetchingLiveState, target = %target);
        let live_stage = match self.gateway.fetch_stage(&target).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Could not read current stage settings, CloudWatch settings will not be inherited");
                StageSnapshot::default()
            }
        };

        debug!(phase = %ReconcilePhase::Compiling);
        if settings.global.caching_enabled && settings.caching_endpoints().next().is_none() {
            warn!("API Gateway caching is enabled but none of the endpoints have caching enabled");
        }
        let operations = compile(settings, &live_stage);
        report.operations = operations.len();
        if operations.is_empty() {
            info!("No stage settings to update");
            return Ok(report.finish(ReconcileOutcome::NothingToApply));
        }

        debug!(phase = %ReconcilePhase::Chunking, operations = operations.len());
        let batches = chunk(operations, self.batch_size);
        report.batches = batches.len();

        info!(
            phase = %ReconcilePhase::Applying,
            target = %target,
            operations = report.operations,
            batches = report.batches,
            "Updating API Gateway cache settings"
        );
        let apply = self.apply_batches(&target, &batches);
        report.attempts = match self.deadline {
            Some(deadline) => tokio::time::timeout(deadline, apply).await.map_err(|_| {
                Error::DeadlineExceeded {
                    millis: deadline.as_millis(),
                }
            })??,
            None => apply.await?,
        };
        report.apply_calls = u32::try_from(report.attempts.len()).unwrap_or(u32::MAX);

        Ok(report.finish(ReconcileOutcome::Applied))
    }

    async fn apply_batches(&self, target: &StageTarget, batches: &[PatchBatch]) -> Result<Vec<ApplyAttempt>> {
        let mut attempts = Vec::new();
        for batch in batches {
            self.apply_batch(target, batch, &mut attempts).await?;
        }
        Ok(attempts)
    }

    /// Apply one batch, retrying conflicts. Every call is appended to `attempts`.
    async fn apply_batch(
        &self,
        target: &StageTarget,
        batch: &PatchBatch,
        attempts: &mut Vec<ApplyAttempt>,
    ) -> Result<()> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            debug!(
                batch = batch.number(),
                batches = batch.total,
                operations = batch.operations.len(),
                attempt,
                "Applying stage patch"
            );

            let result = self.gateway.apply_patch(target, &batch.operations).await;
            attempts.push(ApplyAttempt {
                batch: batch.number(),
                attempt,
                error: result.as_ref().err().map(|e| e.message().to_string()),
            });

            match result {
                Ok(()) => {
                    if attempt > 1 {
                        info!(batch = batch.number(), attempt, "Stage update succeeded after retries");
                    }
                    return Ok(());
                }
                Err(GatewayError::Retryable(message)) if attempt < max_attempts => {
                    let delay = self.retry.delay_after(attempt);
                    warn!(
                        batch = batch.number(),
                        attempt,
                        max_attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %message,
                        "Stage is being modified concurrently, retrying"
                    );
                    self.sleeper.sleep(delay).await;
                }
                Err(GatewayError::Retryable(message)) => {
                    return Err(Error::RetriesExhausted {
                        batch: batch.number(),
                        batches: batch.total,
                        operations: batch.operations.len(),
                        attempts: attempt,
                        message,
                    });
                }
                Err(GatewayError::Fatal(message)) => {
                    return Err(Error::StageUpdateFailed {
                        batch: batch.number(),
                        batches: batch.total,
                        operations: batch.operations.len(),
                        message,
                    });
                }
            }
        }
    }
}
