use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use chrono::{DateTime, TimeDelta, Utc};
use serde_json::Value;
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info_span, warn, Instrument};

use crate::{
    collector::{
        explain_statement, select_digests_query, use_schema_statement, DatabaseError, EntrySender,
        ExplainConnection, ExplainDatabase, LogEntry, QueryCache, QueryCandidate, QueryDenylist,
        OP_EXPLAIN_PLAN_OUTPUT, RESTORE_SCHEMA_STATEMENT,
    },
    config::ExplainPlansConfig,
    error::{CollectorError, Result},
    plan::{parse_explain_plan, redact_attached_conditions, ExplainOutput},
    sql::{contains_reserved_keywords, EXPLAIN_RESERVED_WORD_DENYLIST},
};

pub const COLLECTOR_NAME: &str = "explain_plans";

/// The engine appends this to sample texts it had to cut.
pub const TRUNCATION_MARKER: &str = "...";

/// Engine error codes that will fail the same way on every retry.
pub const UNRECOVERABLE_ERROR_CODES: [&str; 3] = ["1044", "1142", "1143"];

const NO_MATCHING_ROW_MESSAGE: &str = "no matching row in const table";

pub const REASON_DENYLISTED: &str = "query denylisted";
pub const REASON_TRUNCATED: &str = "query is truncated";
pub const REASON_RESERVED_WORD: &str = "query contains reserved word";

pub struct ExplainPlansArguments<D: ExplainDatabase> {
    pub db: Arc<D>,
    pub config: ExplainPlansConfig,
    pub entry_sender: EntrySender,
    pub db_version: String,
}

/// What happens to a candidate once it has been looked at.
#[derive(Debug)]
enum CandidateOutcome {
    Report(ExplainOutput),
    /// Reported, and never tried again.
    Unrecoverable(ExplainOutput),
    /// Nothing is emitted; the candidate may come back on a later scan.
    Dropped,
}

pub fn is_unrecoverable(err: &DatabaseError) -> bool {
    UNRECOVERABLE_ERROR_CODES
        .iter()
        .any(|code| err.message.contains(&format!("Error {code}")))
}

/// Owns the candidate cache and the denylist; runs on a single task.
pub struct ExplainPlanWorker<D: ExplainDatabase> {
    db: Arc<D>,
    config: ExplainPlansConfig,
    entry_sender: EntrySender,
    db_version: String,
    select_digests: String,
    query_cache: QueryCache,
    denylist: QueryDenylist,
}

impl<D: ExplainDatabase> ExplainPlanWorker<D> {
    pub fn new(args: ExplainPlansArguments<D>) -> Self {
        let lookback = TimeDelta::from_std(args.config.initial_lookback).unwrap_or(TimeDelta::days(1));
        let bookmark = Utc::now()
            .checked_sub_signed(lookback)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        Self {
            select_digests: select_digests_query(&args.config.exclusion_clause()),
            db: args.db,
            config: args.config,
            entry_sender: args.entry_sender,
            db_version: args.db_version,
            query_cache: QueryCache::new(bookmark),
            denylist: QueryDenylist::new(),
        }
    }

    pub fn query_cache(&self) -> &QueryCache {
        &self.query_cache
    }

    pub fn denylist(&self) -> &QueryDenylist {
        &self.denylist
    }

    /// Pulls every digest seen after the bookmark. Nothing changes when the
    /// scan fails, so the same window is fetched again on the next poll.
    pub async fn populate_query_cache(&mut self) -> std::result::Result<(), DatabaseError> {
        let rows = self
            .db
            .select_digests(&self.select_digests, self.query_cache.bookmark())
            .await?;

        for row in rows {
            let candidate = QueryCandidate::from(row);
            if self.denylist.contains(&candidate.unique_key()) {
                debug!(digest = %candidate.digest, schema_name = %candidate.schema, "skipping denylisted query");
                let output = ExplainOutput::skipped(&self.db_version, &candidate.digest, REASON_DENYLISTED);
                self.emit(&candidate, &output).await;
                continue;
            }
            self.query_cache.insert(candidate);
        }

        let batch_size = self.query_cache.update_batch_size(self.config.per_collect_ratio);
        debug!(count = self.query_cache.len(), batch_size, "refilled query cache");
        Ok(())
    }

    /// One poll: refills the cache when it is empty, then explains the next
    /// batch. Stops between candidates once `cancel` fires.
    pub async fn fetch_explain_plans(&mut self, cancel: &CancellationToken) -> std::result::Result<(), DatabaseError> {
        if self.query_cache.is_empty() {
            self.populate_query_cache().await?;
        }

        for unique_key in self.query_cache.batch_keys() {
            if cancel.is_cancelled() {
                debug!("explain plan batch cancelled");
                break;
            }

            let Some(candidate) = self.query_cache.remove(&unique_key) else {
                continue;
            };

            match self.explain_candidate(&candidate).await {
                CandidateOutcome::Report(output) => self.emit(&candidate, &output).await,
                CandidateOutcome::Unrecoverable(output) => {
                    let failure_count = self.denylist.record_failure(&unique_key);
                    debug!(digest = %candidate.digest, schema_name = %candidate.schema, failure_count, "query denylisted");
                    self.emit(&candidate, &output).await;
                },
                CandidateOutcome::Dropped => {},
            }
        }

        Ok(())
    }

    async fn explain_candidate(&self, candidate: &QueryCandidate) -> CandidateOutcome {
        let digest = candidate.digest.as_str();
        let schema_name = candidate.schema.as_str();

        if candidate.query_text.ends_with(TRUNCATION_MARKER) {
            debug!(digest, schema_name, "skipping truncated query");
            return CandidateOutcome::Report(ExplainOutput::skipped(&self.db_version, digest, REASON_TRUNCATED));
        }

        match contains_reserved_keywords(&candidate.query_text, &EXPLAIN_RESERVED_WORD_DENYLIST) {
            Ok(true) => {
                debug!(digest, schema_name, "skipping query containing reserved word");
                return CandidateOutcome::Report(ExplainOutput::skipped(&self.db_version, digest, REASON_RESERVED_WORD));
            },
            Ok(false) => {},
            Err(err) => {
                error!(digest, schema_name, err = %err, "failed to check query for reserved words");
                return CandidateOutcome::Report(ExplainOutput::error(&self.db_version, digest, err.to_string()));
            },
        }

        let mut conn = match self.db.acquire().await {
            Ok(conn) => conn,
            Err(err) => {
                warn!(digest, schema_name, err = %err, "failed to acquire connection");
                return CandidateOutcome::Dropped;
            },
        };

        if let Err(err) = conn.execute(&use_schema_statement(schema_name)).await {
            warn!(digest, schema_name, err = %err, "failed to set schema");
            return CandidateOutcome::Dropped;
        }

        let explained = conn.query_explain_json(&explain_statement(&candidate.query_text)).await;
        if let Err(err) = conn.execute(RESTORE_SCHEMA_STATEMENT).await {
            error!(digest, schema_name, err = %err, "failed to restore default schema");
        }

        let payload = match explained {
            Ok(payload) => payload,
            Err(err) if is_unrecoverable(&err) => {
                error!(digest, schema_name, err = %err, "failed to fetch explain plan");
                return CandidateOutcome::Unrecoverable(ExplainOutput::error(&self.db_version, digest, err.message));
            },
            Err(err) => {
                warn!(digest, schema_name, err = %err, "failed to fetch explain plan, will retry when seen again");
                return CandidateOutcome::Dropped;
            },
        };

        let explain_json = match self.validate_payload(&payload) {
            Ok(explain_json) => explain_json,
            Err(reason) => {
                error!(digest, schema_name, err = %reason, "invalid explain plan payload");
                return CandidateOutcome::Unrecoverable(ExplainOutput::error(&self.db_version, digest, reason));
            },
        };

        let value: Value = match serde_json::from_str(explain_json) {
            Ok(value) => value,
            Err(err) => {
                error!(digest, schema_name, err = %err, "failed to decode explain plan");
                return CandidateOutcome::Unrecoverable(ExplainOutput::error(&self.db_version, digest, err.to_string()));
            },
        };

        let no_matching_rows = value
            .pointer("/query_block/message")
            .and_then(Value::as_str)
            .is_some_and(|message| message.contains(NO_MATCHING_ROW_MESSAGE));
        if no_matching_rows {
            debug!(digest, schema_name, "explain plan has no matching rows, skipping");
            return CandidateOutcome::Dropped;
        }

        match redact_attached_conditions(explain_json) {
            Ok((redacted, count)) => debug!(digest, schema_name, count, db_native_explain_plan = %redacted, "explain plan"),
            Err(err) => warn!(digest, schema_name, err = %err, "failed to redact explain plan"),
        }

        match parse_explain_plan(&value) {
            Ok(plan) => CandidateOutcome::Report(ExplainOutput::success(&self.db_version, digest, plan)),
            Err(incomplete) => {
                let partial = serde_json::to_string(&incomplete.partial).unwrap_or_default();
                error!(digest, schema_name, err = %incomplete, partial_plan = %partial, "failed to parse explain plan");
                CandidateOutcome::Unrecoverable(ExplainOutput::error(&self.db_version, digest, incomplete.to_string()))
            },
        }
    }

    fn validate_payload<'a>(&self, payload: &'a [u8]) -> std::result::Result<&'a str, String> {
        if payload.is_empty() {
            return Err("explain plan is empty".to_string());
        }
        std::str::from_utf8(payload).map_err(|err| format!("explain plan is not valid utf-8: {err}"))
    }

    async fn emit(&self, candidate: &QueryCandidate, output: &ExplainOutput) {
        let line = match output.to_log_line(&candidate.schema, &candidate.digest) {
            Ok(line) => line,
            Err(err) => {
                error!(digest = %candidate.digest, err = %err, "failed to encode explain output");
                return;
            },
        };

        if let Err(err) = self.entry_sender.send(LogEntry::new(OP_EXPLAIN_PLAN_OUTPUT, line)).await {
            error!(digest = %candidate.digest, err = %err, "failed to send explain output");
        }
    }
}

/// Runs an [`ExplainPlanWorker`] on a fixed interval until stopped.
pub struct ExplainPlans<D: ExplainDatabase> {
    worker: Option<ExplainPlanWorker<D>>,
    collect_interval: std::time::Duration,
    cancel: CancellationToken,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl<D: ExplainDatabase> ExplainPlans<D> {
    pub fn new(args: ExplainPlansArguments<D>) -> Result<Self> {
        args.config.validate()?;

        Ok(Self {
            collect_interval: args.config.collect_interval,
            worker: Some(ExplainPlanWorker::new(args)),
            cancel: CancellationToken::new(),
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        })
    }

    pub fn name(&self) -> &'static str {
        COLLECTOR_NAME
    }

    /// Spawns the poll loop. The first poll runs immediately.
    pub fn start(&mut self) -> Result<()> {
        let mut worker = self.worker.take().ok_or(CollectorError::AlreadyStarted)?;
        let cancel = self.cancel.clone();
        let running = self.running.clone();
        let collect_interval = self.collect_interval;

        running.store(true, Ordering::SeqCst);
        let span = info_span!("collector", collector = COLLECTOR_NAME);
        self.handle = Some(tokio::spawn(
            async move {
                let mut ticker = tokio::time::interval(collect_interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = ticker.tick() => {
                            if let Err(err) = worker.fetch_explain_plans(&cancel).await {
                                error!(err = %err, "failed to fetch explain plans");
                            }
                        },
                    }
                }
                running.store(false, Ordering::SeqCst);
                debug!("collector stopped");
            }
            .instrument(span),
        ));

        Ok(())
    }

    /// Signals the worker to exit. Safe to call repeatedly or before `start`.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// True once the worker task has exited, or if it never started.
    pub fn stopped(&self) -> bool {
        !self.running.load(Ordering::SeqCst)
    }

    /// Waits for the worker task to exit after [`ExplainPlans::stop`].
    pub async fn wait(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                error!(err = %err, "collector task failed");
            }
        }
        self.running.store(false, Ordering::SeqCst);
    }
}

impl<D: ExplainDatabase> Drop for ExplainPlans<D> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
