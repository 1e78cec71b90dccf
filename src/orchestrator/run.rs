//! The configuration run state machine.
//!
//! `Rendering -> Validating -> BackingUp -> Applying -> Reloading -> Verifying`
//!
//! Failures before Applying leave the live file untouched. Failures from
//! Applying on restore the snapshot taken in BackingUp; if the restore or the
//! service's recovery fails as well, the run reports an inconsistent state.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Deserialize;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::audit::{AuditEntry, AuditLogger};
use crate::backup::{BackupStore, ConfigSnapshot};
use crate::config::Settings;
use crate::error::{DaemonError, ServiceErrorKind};
use crate::executor::CommandRunner;
use crate::files::{AtomicWriter, ConfigWriter};
use crate::services::{
    ServiceAction, ServiceController, ServiceProfile, ServiceRegistry, ServiceState,
};
use crate::shares::{content_hash, GlobalOptions, RenderedConfig, ShareSpec};
use crate::templates::{Renderer, TemplateEngine};
use crate::validation::check_share_directory;
use crate::validator::Validator;

use super::locks::LockTable;
use super::result::{OperationResult, Outcome, RollbackReport, Stage};

/// One service's share list, as submitted by the domain layer.
#[derive(Debug, Clone, Deserialize)]
pub struct ApplyRequest {
    pub service: String,
    #[serde(default)]
    pub specs: Vec<ShareSpec>,
    #[serde(default)]
    pub options: GlobalOptions,
}

/// Sequences render, validate, backup, apply, reload and verify per service.
///
/// Cheap to clone; clones share locks, history and collaborators.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Arc<ServiceRegistry>,
    renderer: Renderer,
    validator: Validator,
    store: BackupStore,
    controller: ServiceController,
    writer: Arc<dyn ConfigWriter>,
    locks: LockTable,
    audit: Option<Arc<AuditLogger>>,
    skip_unchanged: bool,
    require_existing_paths: bool,
    verify_grace: Duration,
    verify_poll: Duration,
}

/// Assembles an [`Orchestrator`] from settings and collaborators.
pub struct OrchestratorBuilder {
    settings: Settings,
    registry: Arc<ServiceRegistry>,
    runner: Arc<dyn CommandRunner>,
    writer: Arc<dyn ConfigWriter>,
    engine: Option<TemplateEngine>,
    audit: Option<Arc<AuditLogger>>,
}

impl OrchestratorBuilder {
    /// Replace the atomic file writer used for live files.
    pub fn writer(mut self, writer: Arc<dyn ConfigWriter>) -> Self {
        self.writer = writer;
        self
    }

    /// Use `engine` instead of loading templates from the settings.
    pub fn templates(mut self, engine: TemplateEngine) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Append every run and rollback to `audit`.
    pub fn audit(mut self, audit: Arc<AuditLogger>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn build(self) -> Result<Orchestrator, DaemonError> {
        let settings = self.settings;

        let engine = match (self.engine, &settings.paths.templates_dir) {
            (Some(engine), _) => engine,
            (None, Some(dir)) => TemplateEngine::with_overrides(dir)?,
            (None, None) => TemplateEngine::builtin()?,
        };

        for id in self.registry.list() {
            let profile = self.registry.get(id)?;
            if !engine.has_template(profile.template) {
                return Err(DaemonError::Template {
                    message: format!(
                        "Service '{}' needs template '{}', which is not loaded",
                        id, profile.template
                    ),
                });
            }
        }

        let timeouts = &settings.timeouts;

        Ok(Orchestrator {
            inner: Arc::new(Inner {
                registry: self.registry,
                renderer: Renderer::new(engine),
                validator: Validator::new(self.runner.clone(), timeouts.validate()),
                store: BackupStore::new(&settings.backup.dir, settings.backup.retention),
                controller: ServiceController::new(self.runner, timeouts.control()),
                writer: self.writer,
                locks: LockTable::new(),
                audit: self.audit,
                skip_unchanged: settings.orchestrator.skip_unchanged,
                require_existing_paths: settings.paths.require_existing_share_paths,
                verify_grace: timeouts.verify_grace(),
                verify_poll: timeouts.verify_poll(),
            }),
        })
    }
}

impl Orchestrator {
    /// Start assembling an orchestrator.
    pub fn builder(
        settings: &Settings,
        registry: Arc<ServiceRegistry>,
        runner: Arc<dyn CommandRunner>,
    ) -> OrchestratorBuilder {
        OrchestratorBuilder {
            settings: settings.clone(),
            registry,
            runner,
            writer: Arc::new(AtomicWriter),
            engine: None,
            audit: None,
        }
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.inner.registry
    }

    pub fn store(&self) -> &BackupStore {
        &self.inner.store
    }

    /// Bring `service` in line with `specs`.
    pub async fn apply_configuration(
        &self,
        service: &str,
        specs: Vec<ShareSpec>,
        options: GlobalOptions,
    ) -> OperationResult {
        self.apply_configuration_with_cancel(service, specs, options, CancellationToken::new())
            .await
    }

    /// [`apply_configuration`](Self::apply_configuration) with cancellation.
    ///
    /// `cancel` is honored while the run waits for the service lock, right
    /// after the lock is acquired, and between validation and backup. Once
    /// the backup has started the run always proceeds to a terminal state.
    pub async fn apply_configuration_with_cancel(
        &self,
        service: &str,
        specs: Vec<ShareSpec>,
        options: GlobalOptions,
        cancel: CancellationToken,
    ) -> OperationResult {
        let mut run = RunTracker::new(service);
        let operation_id = run.result.operation_id;

        let profile = match self.inner.registry.get(service) {
            Ok(profile) => profile,
            Err(e) => {
                run.enter(Stage::Render);
                return self.finish(run.fail(&e));
            }
        };

        if cancel.is_cancelled() {
            return self.finish(run.cancelled("lock"));
        }

        let lock = self.inner.locks.get(profile.id);
        let guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => return self.finish(run.cancelled("lock")),
            guard = lock.lock_owned() => guard,
        };

        if cancel.is_cancelled() {
            return self.finish(run.cancelled("render"));
        }

        let this = self.clone();
        let service_id = profile.id;
        let joined = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            let span = info_span!("apply", service = service_id, operation_id = %operation_id);
            span.in_scope(|| this.run_locked(run, &profile, &specs, &options, &cancel))
        })
        .await;

        let result = match joined {
            Ok(result) => result,
            Err(e) => {
                // The worker died mid-run; nothing is known about the live file.
                error!(service, operation_id = %operation_id, error = %e, "Configuration run aborted");
                let mut run = RunTracker::with_id(service, operation_id);
                run.enter(Stage::Apply);
                run.inconsistent(
                    DaemonError::service(ServiceErrorKind::InconsistentState {
                        service: service.to_string(),
                        message: format!("run aborted: {}", e),
                    }),
                )
            }
        };

        self.finish(result)
    }

    /// Apply several services concurrently. Results are in request order.
    pub async fn apply_many(&self, requests: Vec<ApplyRequest>) -> Vec<OperationResult> {
        let services: Vec<String> = requests.iter().map(|r| r.service.clone()).collect();
        let mut tasks = JoinSet::new();
        for (index, request) in requests.into_iter().enumerate() {
            let this = self.clone();
            tasks.spawn(async move {
                let result = this
                    .apply_configuration(&request.service, request.specs, request.options)
                    .await;
                (index, result)
            });
        }

        let mut results = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => {
                    results.insert(index, result);
                }
                Err(e) => error!(error = %e, "Apply task failed to complete"),
            }
        }

        in_request_order(&services, results)
            .into_iter()
            .map(|(result, completed)| if completed { result } else { self.finish(result) })
            .collect()
    }

    /// Current state of `service`, queried from the service manager.
    pub async fn get_service_status(&self, service: &str) -> Result<ServiceState, DaemonError> {
        let profile = self.inner.registry.get(service)?;
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.inner.controller.status(&profile))
            .await
            .map_err(join_error)?
    }

    /// Run a manual control action under the service lock.
    pub async fn control_service(
        &self,
        service: &str,
        action: ServiceAction,
    ) -> Result<ServiceState, DaemonError> {
        let profile = self.inner.registry.get(service)?;
        if action == ServiceAction::Status {
            return self.get_service_status(service).await;
        }

        let guard = self.inner.locks.get(profile.id).lock_owned().await;
        let this = self.clone();
        tokio::task::spawn_blocking(move || {
            let _guard = guard;
            let started = Instant::now();
            let result = this.inner.controller.control(&profile, action);
            this.audit_result(
                Uuid::new_v4(),
                &format!("control.{}", action),
                profile.id,
                result.as_ref().map(|state| serde_json::json!({ "state": state })),
                started,
            );
            result
        })
        .await
        .map_err(join_error)?
    }

    /// Restore the latest snapshot of `service` and reload it.
    pub async fn rollback_service(&self, service: &str) -> Result<RollbackReport, DaemonError> {
        let profile = self.inner.registry.get(service)?;
        let guard = self.inner.locks.get(profile.id).lock_owned().await;
        let this = self.clone();
        tokio::task::spawn_blocking(move || {
            let _guard = guard;
            this.rollback_locked(&profile)
        })
        .await
        .map_err(join_error)?
    }

    /// Render without touching anything; optionally run the syntax check too.
    ///
    /// Blocking: call from a blocking context.
    pub fn preview(
        &self,
        service: &str,
        specs: &[ShareSpec],
        options: &GlobalOptions,
        validate: bool,
    ) -> Result<RenderedConfig, DaemonError> {
        let profile = self.inner.registry.get(service)?;
        let rendered = self.render_checked(&profile, specs, options)?;
        if validate {
            self.inner.validator.validate(&profile, rendered.content())?;
        }
        Ok(rendered)
    }

    /// Snapshot history of `service`, most recent first.
    pub fn list_snapshots(&self, service: &str) -> Result<Vec<ConfigSnapshot>, DaemonError> {
        let profile = self.inner.registry.get(service)?;
        self.inner.store.list(profile.id)
    }

    fn run_locked(
        &self,
        mut run: RunTracker,
        profile: &ServiceProfile,
        specs: &[ShareSpec],
        options: &GlobalOptions,
        cancel: &CancellationToken,
    ) -> OperationResult {
        let inner = &self.inner;

        run.enter(Stage::Render);
        let rendered = match self.render_checked(profile, specs, options) {
            Ok(rendered) => rendered,
            Err(e) => return run.fail(&e),
        };
        run.result.content_hash = Some(rendered.content_hash().to_string());

        if inner.skip_unchanged && live_hash(profile).as_deref() == Some(rendered.content_hash()) {
            info!(service = profile.id, "Rendered configuration matches live file");
            run.result.unchanged = true;
            return self.ensure_running(run, profile);
        }

        run.enter(Stage::Validate);
        if let Err(e) = inner.validator.validate(profile, rendered.content()) {
            return run.fail(&e);
        }

        if cancel.is_cancelled() {
            return run.cancelled("backup");
        }

        run.enter(Stage::Backup);
        match inner.store.snapshot(profile.id, &profile.live_path) {
            Ok(snapshot) => run.result.snapshot_id = Some(snapshot.id),
            Err(e) => return run.fail(&e),
        }

        run.enter(Stage::Apply);
        if let Err(e) = inner.writer.write(&profile.live_path, rendered.content()) {
            let cause = DaemonError::service(ServiceErrorKind::ApplyFailure {
                path: profile.live_path.clone(),
                message: e.to_string(),
            });
            return self.recover(run, profile, cause, false);
        }
        info!(
            service = profile.id,
            path = %profile.live_path.display(),
            hash = %rendered.content_hash(),
            "Live configuration replaced"
        );

        run.enter(Stage::Reload);
        if let Err(e) = self.activate(profile) {
            return self.recover(run, profile, e, true);
        }

        run.enter(Stage::Verify);
        match self.verify(profile) {
            Ok(state) => {
                run.result.service_state = Some(state);
                run.finish(Outcome::Succeeded)
            }
            Err(e) => self.recover(run, profile, e, true),
        }
    }

    /// Bring up a service whose live file already matches the request.
    ///
    /// Nothing was written, so a failure here has nothing to roll back.
    fn ensure_running(&self, mut run: RunTracker, profile: &ServiceProfile) -> OperationResult {
        let controller = &self.inner.controller;
        match controller.status(profile) {
            Ok(ServiceState::Running) => {
                run.result.service_state = Some(ServiceState::Running);
                return run.finish(Outcome::Succeeded);
            }
            Ok(state) => info!(service = profile.id, state = %state, "Unchanged configuration, service not running"),
            Err(e) => warn!(service = profile.id, error = %e, "Cannot query service state"),
        }

        run.enter(Stage::Reload);
        if let Err(e) = self.activate(profile) {
            run.result.service_state = controller.status(profile).ok();
            return run.fail(&e);
        }

        run.enter(Stage::Verify);
        match self.verify(profile) {
            Ok(state) => {
                run.result.service_state = Some(state);
                run.finish(Outcome::Succeeded)
            }
            Err(e) => {
                run.result.service_state = controller.status(profile).ok();
                run.fail(&e)
            }
        }
    }

    fn render_checked(
        &self,
        profile: &ServiceProfile,
        specs: &[ShareSpec],
        options: &GlobalOptions,
    ) -> Result<RenderedConfig, DaemonError> {
        let rendered = self.inner.renderer.render(profile, specs, options)?;

        if self.inner.require_existing_paths {
            for spec in rendered.specs() {
                check_share_directory(&spec.path).map_err(|e| {
                    DaemonError::service(ServiceErrorKind::InvalidSpec {
                        share: spec.name.clone(),
                        reason: match e {
                            DaemonError::Validation { kind } => kind.to_string(),
                            other => other.to_string(),
                        },
                    })
                })?;
            }
        }

        Ok(rendered)
    }

    /// Restore the snapshot taken by this run and, when the service was
    /// already touched, bring it back up on the old configuration.
    fn recover(
        &self,
        mut run: RunTracker,
        profile: &ServiceProfile,
        cause: DaemonError,
        service_touched: bool,
    ) -> OperationResult {
        warn!(
            service = profile.id,
            stage = ?run.current(),
            error = %cause,
            "Run failed after backup, restoring snapshot"
        );

        if let Err(restore_error) = self.inner.store.restore(profile.id) {
            return run.inconsistent(self.inconsistent(profile, &cause, &restore_error));
        }

        if !service_touched {
            return run.rolled_back(&cause);
        }

        match self.activate(profile).and_then(|_| self.verify(profile)) {
            Ok(state) => {
                run.result.service_state = Some(state);
                run.rolled_back(&cause)
            }
            Err(recovery_error) => {
                run.result.service_state = self.inner.controller.status(profile).ok();
                run.inconsistent(self.inconsistent(profile, &cause, &recovery_error))
            }
        }
    }

    fn inconsistent(
        &self,
        profile: &ServiceProfile,
        cause: &DaemonError,
        recovery: &DaemonError,
    ) -> DaemonError {
        error!(
            service = profile.id,
            cause = %cause,
            recovery_error = %recovery,
            "Rollback failed, live configuration is in an unknown state"
        );
        DaemonError::service(ServiceErrorKind::InconsistentState {
            service: profile.id.to_string(),
            message: format!("{}; recovery failed: {}", cause, recovery),
        })
    }

    /// Make the service pick up its live file.
    ///
    /// A running service is reloaded, falling back to a restart when it
    /// cannot reload. A service that is not running is restarted.
    fn activate(&self, profile: &ServiceProfile) -> Result<ServiceState, DaemonError> {
        let controller = &self.inner.controller;

        let current = controller.status(profile)?;
        if current != ServiceState::Running {
            info!(service = profile.id, state = %current, "Service not running, restarting");
            return controller.control(profile, ServiceAction::Restart);
        }

        match controller.control(profile, ServiceAction::Reload) {
            Err(DaemonError::Service {
                kind: ServiceErrorKind::ReloadUnsupported { .. },
            }) => {
                info!(service = profile.id, "Reload unsupported, restarting");
                controller.control(profile, ServiceAction::Restart)
            }
            other => other,
        }
    }

    /// Poll the service until it reports running or the grace period ends.
    fn verify(&self, profile: &ServiceProfile) -> Result<ServiceState, DaemonError> {
        let deadline = Instant::now() + self.inner.verify_grace;

        loop {
            let state = self.inner.controller.status(profile)?;
            if state == ServiceState::Running {
                debug!(service = profile.id, "Service verified running");
                return Ok(state);
            }

            let now = Instant::now();
            if state == ServiceState::Failed || now >= deadline {
                return Err(DaemonError::service(ServiceErrorKind::ControlError {
                    unit: profile.unit.clone(),
                    action: "verify".to_string(),
                    message: format!(
                        "service is {} after {} ms",
                        state,
                        self.inner.verify_grace.as_millis()
                    ),
                }));
            }

            thread::sleep(self.inner.verify_poll.min(deadline - now));
        }
    }

    fn rollback_locked(&self, profile: &ServiceProfile) -> Result<RollbackReport, DaemonError> {
        let operation_id = Uuid::new_v4();
        let started = Instant::now();
        let span = info_span!("rollback", service = profile.id, operation_id = %operation_id);
        let _entered = span.enter();

        let outcome = self.inner.store.restore(profile.id).and_then(|snapshot| {
            let state = self.activate(profile).and_then(|_| self.verify(profile))?;
            Ok(RollbackReport {
                operation_id,
                service: profile.id.to_string(),
                snapshot_id: snapshot.id,
                restored_absent: snapshot.is_absent(),
                service_state: state,
                duration_ms: started.elapsed().as_millis() as u64,
            })
        });

        match &outcome {
            Ok(report) => {
                info!(snapshot_id = report.snapshot_id, "Manual rollback completed");
                if let Some(audit) = &self.inner.audit {
                    audit.record(&AuditEntry::from_rollback(report));
                }
            }
            Err(e) => {
                warn!(error = %e, "Manual rollback failed");
                self.audit_result(operation_id, "rollback", profile.id, Err(e), started);
            }
        }

        outcome
    }

    fn audit_result(
        &self,
        operation_id: Uuid,
        action: &str,
        service: &str,
        result: Result<serde_json::Value, &DaemonError>,
        started: Instant,
    ) {
        let Some(audit) = &self.inner.audit else {
            return;
        };
        let duration_ms = started.elapsed().as_millis() as u64;
        let entry = match result {
            Ok(detail) => AuditEntry::success(operation_id, action, service, detail, duration_ms),
            Err(e) => AuditEntry::failure(
                operation_id,
                action,
                service,
                serde_json::Value::Null,
                e.code(),
                e.to_string(),
                duration_ms,
            ),
        };
        audit.record(&entry);
    }

    fn finish(&self, result: OperationResult) -> OperationResult {
        match result.outcome {
            Outcome::Succeeded => info!(
                service = %result.service,
                operation_id = %result.operation_id,
                unchanged = result.unchanged,
                duration_ms = result.duration_ms,
                "Configuration run succeeded"
            ),
            _ if result.inconsistent => error!(
                service = %result.service,
                operation_id = %result.operation_id,
                diagnostic = ?result.diagnostic,
                "Configuration run left service inconsistent"
            ),
            outcome => warn!(
                service = %result.service,
                operation_id = %result.operation_id,
                outcome = ?outcome,
                failed_stage = ?result.failed_stage,
                error_code = ?result.error_code,
                "Configuration run failed"
            ),
        }

        if let Some(audit) = &self.inner.audit {
            audit.record(&AuditEntry::from_operation(&result));
        }
        result
    }
}

/// Hash of the current live file, if it can be read.
fn live_hash(profile: &ServiceProfile) -> Option<String> {
    match fs::read_to_string(&profile.live_path) {
        Ok(content) => Some(content_hash(&content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => {
            debug!(service = profile.id, error = %e, "Cannot read live file for change detection");
            None
        }
    }
}

/// Lines batch results up with the requests. A request whose task never
/// returned gets an `INTERNAL_ERROR` result in its slot, flagged `false`.
fn in_request_order(
    services: &[String],
    mut results: BTreeMap<usize, OperationResult>,
) -> Vec<(OperationResult, bool)> {
    services
        .iter()
        .enumerate()
        .map(|(index, service)| match results.remove(&index) {
            Some(result) => (result, true),
            None => {
                let mut run = RunTracker::new(service);
                run.enter(Stage::Render);
                let aborted = run.fail(&DaemonError::Internal {
                    message: "apply task did not complete".to_string(),
                });
                (aborted, false)
            }
        })
        .collect()
}

fn join_error(e: tokio::task::JoinError) -> DaemonError {
    DaemonError::Command {
        kind: crate::error::CommandErrorKind::ExecutionFailed {
            message: format!("Worker task failed: {}", e),
        },
    }
}

/// Accumulates an [`OperationResult`] while a run progresses.
struct RunTracker {
    result: OperationResult,
    started: Instant,
}

impl RunTracker {
    fn new(service: &str) -> Self {
        Self::with_id(service, Uuid::new_v4())
    }

    fn with_id(service: &str, operation_id: Uuid) -> Self {
        Self {
            result: OperationResult {
                operation_id,
                service: service.to_string(),
                outcome: Outcome::FailedNoRollback,
                stages: Vec::new(),
                failed_stage: None,
                error_code: None,
                diagnostic: None,
                rolled_back: false,
                inconsistent: false,
                content_hash: None,
                snapshot_id: None,
                unchanged: false,
                service_state: None,
                started_at: Utc::now(),
                duration_ms: 0,
            },
            started: Instant::now(),
        }
    }

    fn enter(&mut self, stage: Stage) {
        debug!(service = %self.result.service, stage = ?stage, "Entering stage");
        self.result.stages.push(stage);
    }

    fn current(&self) -> Option<Stage> {
        self.result.stages.last().copied()
    }

    fn record_error(&mut self, error: &DaemonError) {
        self.result.failed_stage = self.current();
        self.result.error_code = Some(error.code().to_string());
        self.result.diagnostic = Some(error.to_string());
    }

    fn finish(mut self, outcome: Outcome) -> OperationResult {
        self.result.outcome = outcome;
        self.result.duration_ms = self.started.elapsed().as_millis() as u64;
        self.result
    }

    fn fail(mut self, error: &DaemonError) -> OperationResult {
        self.record_error(error);
        self.finish(Outcome::FailedNoRollback)
    }

    fn cancelled(self, before: &str) -> OperationResult {
        info!(service = %self.result.service, before, "Configuration run cancelled");
        let error = DaemonError::service(ServiceErrorKind::Cancelled {
            stage: before.to_string(),
        });
        self.fail(&error)
    }

    fn rolled_back(mut self, cause: &DaemonError) -> OperationResult {
        self.record_error(cause);
        self.result.rolled_back = true;
        self.finish(Outcome::RolledBack)
    }

    fn inconsistent(mut self, error: DaemonError) -> OperationResult {
        self.record_error(&error);
        self.result.inconsistent = true;
        self.finish(Outcome::FailedNoRollback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_results_keep_request_slots() {
        let services: Vec<String> = ["smb", "nfs", "ftp"].iter().map(|s| s.to_string()).collect();
        let mut results = BTreeMap::new();
        results.insert(0, RunTracker::new("smb").finish(Outcome::Succeeded));
        results.insert(2, RunTracker::new("ftp").finish(Outcome::Succeeded));

        let ordered = in_request_order(&services, results);

        assert_eq!(ordered.len(), 3);
        let ids: Vec<&str> = ordered.iter().map(|(r, _)| r.service.as_str()).collect();
        assert_eq!(ids, ["smb", "nfs", "ftp"]);

        let (missing, completed) = &ordered[1];
        assert!(!completed);
        assert_eq!(missing.outcome, Outcome::FailedNoRollback);
        assert_eq!(missing.error_code.as_deref(), Some("INTERNAL_ERROR"));
        assert_eq!(missing.failed_stage, Some(Stage::Render));
        assert!(ordered[0].1 && ordered[2].1);
    }
}
