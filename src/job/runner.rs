//! Per-kind job execution on blocking worker tasks.
//!
//! The runner claims a `PENDING` job, dispatches on its kind, and settles it
//! into exactly one terminal state. Any error (including a panic in the
//! worker closure) lands the job in `FAILED` with the error message captured
//! on the record. Page renders report progress in the 0-90 band, reserving
//! 90-100 for encoding and artifact registration; the cooperative cancel
//! flag is checked between pages and before the single transform stage.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::doc::settings::RenderSettings;
use crate::encode::sink_for;
use crate::foundation::error::PlatenResult;
use crate::job::engine::EngineInner;
use crate::job::model::{ArtifactRef, JobErrorDetail, JobKind, JobResultMeta, JobStatus};
use crate::render::compositor::PageCompositor;
use crate::render::page::{PageStep, RenderOutcome, render_document};
use crate::transform::ops::{TransformRequest, apply_transform};

pub(crate) async fn run_job(inner: Arc<EngineInner>, id: Uuid) {
    let worker = {
        let inner = inner.clone();
        tokio::task::spawn_blocking(move || run_job_blocking(&inner, id))
    };
    if let Err(join_err) = worker.await {
        // The worker panicked; the record must still settle.
        let msg = format!("worker panicked: {join_err}");
        let settle = inner.store.apply(id, &mut |job| {
            if job.status == JobStatus::Processing {
                job.fail(JobErrorDetail::new("panic", msg.clone()))?;
            }
            Ok(())
        });
        if let Err(err) = settle {
            warn!(job = %id, error = %err, "failed to settle panicked job");
        }
    }
    inner.remove_flag(id);
}

fn run_job_blocking(inner: &EngineInner, id: Uuid) {
    let started = Instant::now();
    if let Err(err) = execute(inner, id, started) {
        let settle = inner.store.apply(id, &mut |job| {
            if job.status.is_terminal() {
                return Ok(());
            }
            job.fail(JobErrorDetail::from_error(&err))
        });
        match settle {
            Ok(_) => warn!(job = %id, error = %err, "job failed"),
            Err(apply_err) => {
                warn!(job = %id, error = %err, apply_error = %apply_err, "job failed and could not be settled")
            }
        }
    }
}

fn execute(inner: &EngineInner, id: Uuid, started: Instant) -> PlatenResult<()> {
    let flag = inner
        .flag(id)
        .unwrap_or_else(|| Arc::new(AtomicBool::new(false)));

    // Claim. A job cancelled before the worker ran stays cancelled.
    let job = inner.store.apply(id, &mut |job| match job.status {
        JobStatus::Pending => job.start(),
        JobStatus::Cancelled => Ok(()),
        _ => Ok(()),
    })?;
    if job.status != JobStatus::Processing {
        info!(job = %id, status = %job.status, "job not claimable, leaving as-is");
        return Ok(());
    }
    if flag.load(Ordering::SeqCst) {
        inner.store.apply(id, &mut |job| job.cancel())?;
        info!(job = %id, "job cancelled before work started");
        return Ok(());
    }

    match &job.kind {
        JobKind::RenderDocument { project, settings } => {
            run_render(inner, id, &job.owner, *project, settings, &flag, started)
        }
        JobKind::TransformImage { request } => {
            run_transform(inner, id, &job.owner, request, started)
        }
    }
}

fn run_render(
    inner: &EngineInner,
    id: Uuid,
    owner: &str,
    project: Uuid,
    settings: &RenderSettings,
    flag: &AtomicBool,
    started: Instant,
) -> PlatenResult<()> {
    let doc = inner.docs.get_project(project, owner)?;
    let mut compositor = PageCompositor::new(inner.media.clone(), inner.fonts.clone());
    let mut sink = sink_for(settings.format)?;

    let mut pages_rendered = 0usize;
    let outcome = render_document(
        &mut compositor,
        &doc,
        owner,
        settings,
        sink.as_mut(),
        &mut |done, total| {
            pages_rendered = done;
            let pct = ((done as f64 / total.max(1) as f64) * 90.0) as u8;
            let _ = inner.store.apply(id, &mut |job| {
                job.set_progress(pct);
                Ok(())
            });
            if flag.load(Ordering::SeqCst) {
                PageStep::Stop
            } else {
                PageStep::Continue
            }
        },
    )?;

    let bytes = match outcome {
        RenderOutcome::Stopped => {
            inner.store.apply(id, &mut |job| job.cancel())?;
            info!(job = %id, pages = pages_rendered, "render job cancelled between pages");
            return Ok(());
        }
        RenderOutcome::Completed(bytes) => bytes,
    };

    let _ = inner.store.apply(id, &mut |job| {
        job.set_progress(95);
        Ok(())
    });

    let name = artifact_name(id, settings.format.extension());
    let record = inner
        .media
        .register_artifact(&bytes, &name, settings.format.mime_type(), owner)?;
    let artifact = ArtifactRef {
        media_id: record.id,
        name,
        mime_type: record.mime_type,
        size_bytes: record.size_bytes,
        expires_at: Utc::now() + ttl(inner),
    };
    let result = JobResultMeta {
        duration_ms: started.elapsed().as_millis() as u64,
        page_count: Some(pages_rendered),
        quality_score: None,
    };
    inner
        .store
        .apply(id, &mut |job| job.complete(artifact.clone(), result.clone()))?;
    info!(job = %id, pages = pages_rendered, bytes = artifact.size_bytes, "render job completed");
    Ok(())
}

fn run_transform(
    inner: &EngineInner,
    id: Uuid,
    owner: &str,
    request: &TransformRequest,
    started: Instant,
) -> PlatenResult<()> {
    let _ = inner.store.apply(id, &mut |job| {
        job.set_progress(10);
        Ok(())
    });

    let source = retry_once(|| inner.media.read_media(request.source, owner))?;
    let output = apply_transform(&source, &request.kind)?;

    let _ = inner.store.apply(id, &mut |job| {
        job.set_progress(90);
        Ok(())
    });

    let name = artifact_name(id, "png");
    let record = inner
        .media
        .register_artifact(&output.png, &name, "image/png", owner)?;
    let artifact = ArtifactRef {
        media_id: record.id,
        name,
        mime_type: record.mime_type,
        size_bytes: record.size_bytes,
        expires_at: Utc::now() + ttl(inner),
    };
    let result = JobResultMeta {
        duration_ms: started.elapsed().as_millis() as u64,
        page_count: None,
        quality_score: Some(output.quality_score),
    };
    inner
        .store
        .apply(id, &mut |job| job.complete(artifact.clone(), result.clone()))?;
    info!(
        job = %id,
        kind = request.kind.name(),
        score = output.quality_score,
        "transform job completed"
    );
    Ok(())
}

/// Job id plus a millisecond timestamp; collision-free by construction.
fn artifact_name(id: Uuid, extension: &str) -> String {
    format!(
        "{id}-{}.{extension}",
        Utc::now().format("%Y%m%dT%H%M%S%3f")
    )
}

fn ttl(inner: &EngineInner) -> chrono::Duration {
    chrono::Duration::from_std(inner.opts.artifact_ttl)
        .unwrap_or_else(|_| chrono::Duration::hours(24))
}

/// One extra attempt for transient I/O; everything else fails straight away.
fn retry_once<T>(mut op: impl FnMut() -> PlatenResult<T>) -> PlatenResult<T> {
    match op() {
        Err(err) if err.is_retryable() => {
            warn!(error = %err, "transient I/O error, retrying once");
            op()
        }
        other => other,
    }
}
