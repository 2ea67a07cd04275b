//! Queue + worker pool orchestration (spec §4.H).

use std::collections::VecDeque;
use std::sync::Arc;

use railyard_core::{Clock, Logger, RailyardError, RunError, TestEntry};
use railyard_transport::Transport;
use railyard_worker::{Outcome, Worker};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::ControllerConfig;
use crate::factory::WorkerFactory;
use crate::hooks::{self, ControllerHooks, Veto};
use crate::outcome::{ExecutedTest, RunQueueOutcome, RunStats};
use crate::peer_lost::PeerLostWatcher;
use crate::pool::WorkerPool;

pub struct Controller {
    config: ControllerConfig,
    hooks: Arc<ControllerHooks>,
    factory: Arc<dyn WorkerFactory>,
    clock: Arc<dyn Clock>,
    logger: Arc<dyn Logger>,
    transport: Transport,
}

impl Controller {
    pub fn new(
        config: ControllerConfig,
        factory: Arc<dyn WorkerFactory>,
        clock: Arc<dyn Clock>,
        logger: Box<dyn Logger>,
        transport: Transport,
    ) -> Self {
        Self {
            config,
            hooks: Arc::new(ControllerHooks::new()),
            factory,
            clock,
            logger: Arc::from(logger),
            transport,
        }
    }

    /// Register plugin callbacks before calling [`Controller::run_queue`].
    pub fn hooks(&self) -> &ControllerHooks {
        &self.hooks
    }

    pub async fn run_queue(&self, entries: Vec<TestEntry>) -> RunQueueOutcome {
        let entries = match self.hooks.before_run.call(hooks::BEFORE_RUN, entries).await {
            Ok(entries) => entries,
            Err(err) => {
                self.logger.error(&format!("beforeRun aborted the run: {err}"));
                return RunQueueOutcome::default();
            }
        };

        let abort = self
            .hooks
            .should_not_execute
            .call(hooks::SHOULD_NOT_EXECUTE, Veto::new(entries.clone()))
            .await
            .map(|v| v.veto)
            .unwrap_or(false);

        let capacity = self.config.worker_limit.as_count();

        if abort || entries.is_empty() || capacity == 0 {
            let errors = Vec::new();
            let _ = self.hooks.after_run.call(hooks::AFTER_RUN, errors.clone()).await;
            return RunQueueOutcome {
                errors,
                stats: RunStats::default(),
            };
        }

        let ctx = Arc::new(RunContext {
            config: self.config.clone(),
            hooks: self.hooks.clone(),
            pool: WorkerPool::new(self.factory.clone(), capacity),
            queue: Mutex::new(entries.into_iter().collect()),
            errors: Mutex::new(Vec::new()),
            stats: Mutex::new(RunStats::default()),
            bail_token: CancellationToken::new(),
            lost: PeerLostWatcher::attach(&self.transport).await,
            clock: self.clock.clone(),
            logger: self.logger.clone(),
        });

        let lanes: Vec<_> = (0..capacity)
            .map(|lane| {
                let ctx = ctx.clone();
                tokio::spawn(async move { run_lane(ctx, lane).await })
            })
            .collect();
        for lane in lanes {
            let _ = lane.await;
        }

        ctx.pool.kill_all().await;

        let errors = ctx.errors.lock().await.clone();
        let stats = ctx.stats.lock().await.clone();
        let _ = self.hooks.after_run.call(hooks::AFTER_RUN, errors.clone()).await;
        RunQueueOutcome { errors, stats }
    }
}

struct RunContext {
    config: ControllerConfig,
    hooks: Arc<ControllerHooks>,
    pool: WorkerPool,
    queue: Mutex<VecDeque<TestEntry>>,
    errors: Mutex<Vec<RunError>>,
    stats: Mutex<RunStats>,
    bail_token: CancellationToken,
    lost: PeerLostWatcher,
    clock: Arc<dyn Clock>,
    logger: Arc<dyn Logger>,
}

async fn run_lane(ctx: Arc<RunContext>, lane: usize) {
    loop {
        if ctx.bail_token.is_cancelled() {
            return;
        }

        let entry = {
            let mut queue = ctx.queue.lock().await;
            queue.pop_front()
        };
        let Some(entry) = entry else {
            return;
        };

        let veto = ctx
            .hooks
            .should_not_start
            .call(hooks::SHOULD_NOT_START, Veto::new(entry))
            .await;
        let (entry, skip) = match veto {
            Ok(v) => (v.subject, v.veto),
            Err(_) => continue,
        };
        if skip {
            continue;
        }

        let entry = ctx
            .hooks
            .before_test
            .call(hooks::BEFORE_TEST, entry.clone())
            .await
            .unwrap_or(entry);

        let worker = match ctx.pool.worker_for_lane(lane).await {
            Ok(worker) => worker,
            Err(err) => {
                record_failure(&ctx, &entry, &err).await;
                return;
            }
        };

        let outcome = dispatch_one(&ctx, worker.as_ref(), entry.clone()).await;

        let _ = ctx
            .hooks
            .after_test
            .call(
                hooks::AFTER_TEST,
                ExecutedTest {
                    entry: entry.clone(),
                    outcome: outcome.clone(),
                },
            )
            .await;

        match outcome {
            Outcome::Success(_) => {
                ctx.stats.lock().await.passed += 1;
                if ctx.config.restart_worker {
                    let _ = ctx.pool.replace(lane).await;
                }
            }
            Outcome::Failure(err) => handle_failure(&ctx, lane, entry, err).await,
        }
    }
}

async fn dispatch_one(ctx: &Arc<RunContext>, worker: &dyn Worker, entry: TestEntry) -> Outcome {
    let worker_id = worker.worker_id().to_string();
    tokio::select! {
        outcome = worker.execute(entry.file.clone(), entry.parameters.clone(), entry.env_parameters.clone()) => outcome,
        _ = ctx.bail_token.cancelled() => Outcome::Failure(RailyardError::BailCancel),
        _ = ctx.lost.wait_for(&worker_id) => Outcome::Failure(RailyardError::PeerLost { worker_id }),
    }
}

async fn handle_failure(ctx: &Arc<RunContext>, lane: usize, mut entry: TestEntry, err: RailyardError) {
    let mut worker_replaced = false;
    if matches!(err, RailyardError::PeerLost { .. }) {
        let _ = ctx.pool.replace(lane).await;
        worker_replaced = true;
    }

    if matches!(err, RailyardError::BailCancel) {
        record_failure(ctx, &entry, &err).await;
        return;
    }

    // Fatal infrastructure errors abort the run regardless of `bail`
    // (spec §7) — a dead Transport or a driver that can no longer talk
    // to the browser makes every other lane's eventual failure certain
    // too, so there is nothing to gain by letting them keep running.
    if err.is_fatal_infrastructure() {
        record_failure(ctx, &entry, &err).await;
        ctx.stats.lock().await.bailed += 1;
        if !ctx.bail_token.is_cancelled() {
            ctx.bail_token.cancel();
            ctx.pool.kill_all().await;
        }
        return;
    }

    if ctx.config.bail {
        record_failure(ctx, &entry, &err).await;
        ctx.stats.lock().await.bailed += 1;
        if !ctx.bail_token.is_cancelled() {
            ctx.bail_token.cancel();
            ctx.pool.kill_all().await;
        }
        return;
    }

    let retryable = entry.retries_used < ctx.config.retry_count && err.is_retryable_by_default();
    let vetoed = if retryable {
        ctx.hooks
            .should_not_retry
            .call(hooks::SHOULD_NOT_RETRY, Veto::new((entry.clone(), err.clone())))
            .await
            .map(|v| v.veto)
            .unwrap_or(false)
    } else {
        true
    };

    if retryable && !vetoed {
        entry.retries_used += 1;
        let retries_used = entry.retries_used;
        let _ = ctx
            .hooks
            .before_test_retry
            .call(hooks::BEFORE_TEST_RETRY, (entry.clone(), err.clone(), retries_used))
            .await;
        ctx.stats.lock().await.retried += 1;

        tokio::select! {
            _ = ctx.clock.sleep(ctx.config.retry_delay) => {
                ctx.queue.lock().await.push_back(entry);
            }
            _ = ctx.bail_token.cancelled() => {
                record_failure(ctx, &entry, &RailyardError::BailCancel).await;
            }
        }
        return;
    }

    record_failure(ctx, &entry, &err).await;
    if ctx.config.restart_worker && !worker_replaced {
        let _ = ctx.pool.replace(lane).await;
    }
}

async fn record_failure(ctx: &Arc<RunContext>, entry: &TestEntry, err: &RailyardError) {
    ctx.errors
        .lock()
        .await
        .push(RunError::new(entry.path_display(), entry.retries_used, err));
    ctx.stats.lock().await.failed += 1;
    ctx.logger.warn(&format!(
        "{} failed ({}): {err}",
        entry.path_display(),
        err.kind()
    ));
}
