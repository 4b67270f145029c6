//! The job lifecycle manager.
//!
//! [`JobEngine`] owns submission, status, cancellation, download, and the
//! reconciliation loop. Work itself runs on blocking worker tasks (see
//! `runner`); the engine only ever touches jobs through the store so every
//! mutation goes through the lifecycle checks in one atomic step.
//!
//! Ownership is masked as absence on the job surface: asking about another
//! owner's job answers `NotFound`, never `Forbidden`, so job ids leak no
//! existence information.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::assets::text::FontCatalog;
use crate::foundation::error::{PlatenError, PlatenResult};
use crate::job::model::{ArtifactRef, Job, JobErrorDetail, JobKind, JobStatus};
use crate::job::runner;
use crate::job::store::JobStore;
use crate::media::{DocumentSource, MediaStore};
use crate::transform::ops::TransformKind;

#[derive(Clone, Copy, Debug)]
pub struct EngineOpts {
    /// A `PROCESSING` job untouched for this long is reconciled to `FAILED`.
    pub stale_after: Duration,
    /// Artifact download window after completion.
    pub artifact_ttl: Duration,
    pub reconcile_interval: Duration,
}

impl Default for EngineOpts {
    fn default() -> Self {
        Self {
            stale_after: Duration::from_secs(10 * 60),
            artifact_ttl: Duration::from_secs(24 * 60 * 60),
            reconcile_interval: Duration::from_secs(30),
        }
    }
}

pub(crate) struct EngineInner {
    pub(crate) store: Arc<dyn JobStore>,
    pub(crate) media: Arc<dyn MediaStore>,
    pub(crate) docs: Arc<dyn DocumentSource>,
    pub(crate) fonts: FontCatalog,
    pub(crate) opts: EngineOpts,
    cancel_flags: Mutex<HashMap<Uuid, Arc<AtomicBool>>>,
}

impl EngineInner {
    fn register_flag(&self, id: Uuid) -> Arc<AtomicBool> {
        let flag = Arc::new(AtomicBool::new(false));
        self.flags().insert(id, flag.clone());
        flag
    }

    pub(crate) fn flag(&self, id: Uuid) -> Option<Arc<AtomicBool>> {
        self.flags().get(&id).cloned()
    }

    pub(crate) fn remove_flag(&self, id: Uuid) {
        self.flags().remove(&id);
    }

    fn flags(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, Arc<AtomicBool>>> {
        self.cancel_flags
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Cheap to clone; all clones share one engine.
#[derive(Clone)]
pub struct JobEngine {
    inner: Arc<EngineInner>,
}

impl JobEngine {
    pub fn new(
        store: Arc<dyn JobStore>,
        media: Arc<dyn MediaStore>,
        docs: Arc<dyn DocumentSource>,
        fonts: FontCatalog,
        opts: EngineOpts,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                store,
                media,
                docs,
                fonts,
                opts,
                cancel_flags: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Validate and enqueue a job, then dispatch a worker for it.
    ///
    /// Validation failures reject the submission outright; no job record is
    /// created for them. Must be called within a Tokio runtime.
    pub fn submit(&self, owner: &str, kind: JobKind) -> PlatenResult<Job> {
        self.validate_submission(owner, &kind)?;

        let job = Job::new(owner, kind);
        let id = job.id;
        self.inner.store.insert(job.clone())?;
        self.inner.register_flag(id);
        info!(job = %id, kind = job.kind.name(), owner, "job submitted");

        let inner = self.inner.clone();
        tokio::spawn(runner::run_job(inner, id));
        Ok(job)
    }

    fn validate_submission(&self, owner: &str, kind: &JobKind) -> PlatenResult<()> {
        match kind {
            JobKind::RenderDocument { project, settings } => {
                settings.validate()?;
                let doc = self.inner.docs.get_project(*project, owner)?;
                doc.validate()?;
            }
            JobKind::TransformImage { request } => {
                if let TransformKind::Upscale { scale } = request.kind
                    && (!scale.is_finite() || scale <= 0.0)
                {
                    return Err(PlatenError::invalid_request(format!(
                        "upscale factor must be finite and > 0, got {scale}"
                    )));
                }
                self.inner.media.get_media(request.source, owner)?;
            }
        }
        Ok(())
    }

    /// Status lookup, scoped to `owner`.
    pub fn get_status(&self, id: Uuid, owner: &str) -> PlatenResult<Job> {
        self.masked_get(id, owner)
    }

    /// All of `owner`'s jobs, newest first.
    pub fn list_jobs(&self, owner: &str) -> PlatenResult<Vec<Job>> {
        self.inner.store.list_owned(owner)
    }

    /// Request cancellation.
    ///
    /// `PENDING` jobs cancel immediately; `PROCESSING` jobs get their
    /// cooperative flag raised and move to `CANCELLED` at the next stage
    /// boundary. Any terminal state answers `InvalidState` and the job is
    /// left unchanged.
    pub fn cancel(&self, id: Uuid, owner: &str) -> PlatenResult<Job> {
        self.masked_get(id, owner)?;
        let job = self.inner.store.apply(id, &mut |job| match job.status {
            JobStatus::Pending => job.cancel(),
            JobStatus::Processing => Ok(()),
            terminal => Err(PlatenError::invalid_state(format!(
                "job {id} already {terminal}"
            ))),
        })?;
        if let Some(flag) = self.inner.flag(id) {
            flag.store(true, Ordering::SeqCst);
        }
        info!(job = %id, status = %job.status, "cancellation requested");
        Ok(job)
    }

    /// Fetch the artifact bytes of a completed job.
    ///
    /// `NotReady` until completion, `Expired` once the artifact's download
    /// window has passed; the job's status itself stays `COMPLETED` either
    /// way.
    pub fn download(&self, id: Uuid, owner: &str) -> PlatenResult<(ArtifactRef, Vec<u8>)> {
        let job = self.masked_get(id, owner)?;
        if job.status != JobStatus::Completed {
            return Err(PlatenError::not_ready(format!(
                "job {id} is {}",
                job.status
            )));
        }
        let artifact = job
            .artifact
            .ok_or_else(|| PlatenError::not_ready(format!("job {id} has no artifact")))?;
        if Utc::now() > artifact.expires_at {
            return Err(PlatenError::expired(format!(
                "artifact of job {id} expired at {}",
                artifact.expires_at
            )));
        }
        let bytes = self.inner.media.read_media(artifact.media_id, owner)?;
        Ok((artifact, bytes))
    }

    /// Fail `PROCESSING` jobs that have not been touched within the staleness
    /// window. Returns how many were failed.
    pub fn reconcile_once(&self) -> PlatenResult<usize> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.inner.opts.stale_after)
                .map_err(|e| PlatenError::invalid_request(format!("stale_after: {e}")))?;
        let stale = self.inner.store.stale_processing(cutoff)?;
        let mut failed = 0;
        for id in stale {
            let res = self.inner.store.apply(id, &mut |job| {
                if job.status != JobStatus::Processing {
                    return Ok(());
                }
                job.fail(JobErrorDetail::new(
                    "stale",
                    format!(
                        "processing stalled for more than {}s",
                        self.inner.opts.stale_after.as_secs()
                    ),
                ))
            });
            match res {
                Ok(job) if job.status == JobStatus::Failed => {
                    warn!(job = %id, "reconciled stale job to FAILED");
                    self.inner.remove_flag(id);
                    failed += 1;
                }
                Ok(_) => {}
                Err(err) => warn!(job = %id, error = %err, "stale job reconciliation failed"),
            }
        }
        Ok(failed)
    }

    /// Spawn the background reconciliation loop. The task runs until the
    /// returned handle is aborted.
    pub fn spawn_reconciler(&self) -> tokio::task::JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(engine.inner.opts.reconcile_interval);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tick.tick().await;
                if let Err(err) = engine.reconcile_once() {
                    warn!(error = %err, "reconciliation pass failed");
                }
            }
        })
    }

    fn masked_get(&self, id: Uuid, owner: &str) -> PlatenResult<Job> {
        let job = self.inner.store.get(id)?;
        if job.owner != owner {
            // Another owner's job is indistinguishable from a missing one.
            return Err(PlatenError::not_found(format!("job {id}")));
        }
        Ok(job)
    }
}
