//! End-to-end job lifecycle coverage: submission, progress, terminal states,
//! cancellation, ownership masking, artifact expiry, and reconciliation.

use std::sync::Arc;
use std::time::Duration;

use platen::assets::text::FontCatalog;
use platen::doc::model::{Document, Page};
use platen::doc::settings::{OutputFormat, RenderSettings};
use platen::foundation::core::{Dpi, PageSizeIn, Rgba8};
use platen::job::model::{Job, JobKind, JobStatus};
use platen::job::store::{InMemoryJobStore, JobStore};
use platen::media::{FsMediaStore, InMemoryDocumentSource};
use platen::transform::ops::{TransformKind, TransformRequest};
use platen::{EngineOpts, JobEngine, PlatenError};

struct Harness {
    engine: JobEngine,
    store: Arc<InMemoryJobStore>,
    media: Arc<FsMediaStore>,
    docs: Arc<InMemoryDocumentSource>,
    _dir: tempfile::TempDir,
}

fn harness(opts: EngineOpts) -> Harness {
    let _ = tracing_subscriber::fmt::try_init();
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(InMemoryJobStore::new());
    let media = Arc::new(FsMediaStore::new(dir.path()).unwrap());
    let docs = Arc::new(InMemoryDocumentSource::new());
    let engine = JobEngine::new(
        store.clone(),
        media.clone(),
        docs.clone(),
        FontCatalog::new(),
        opts,
    );
    Harness {
        engine,
        store,
        media,
        docs,
        _dir: dir,
    }
}

/// Small page so renders finish in milliseconds.
fn small_settings(format: OutputFormat) -> RenderSettings {
    let mut settings = RenderSettings::new(format);
    settings.dpi = Dpi::new(50.0).unwrap();
    settings.page_size = PageSizeIn {
        width: 2.0,
        height: 2.0,
    };
    settings
}

fn two_page_doc() -> Document {
    Document {
        title: "lifecycle test".to_string(),
        author: Some("tests".to_string()),
        subject: None,
        pages: vec![
            Page {
                background: Some(Rgba8::new(200, 40, 40, 255)),
                ..Page::default()
            },
            Page {
                background: Some(Rgba8::new(40, 40, 200, 255)),
                ..Page::default()
            },
        ],
    }
}

fn many_page_doc(pages: usize) -> Document {
    Document {
        title: "long render".to_string(),
        author: None,
        subject: None,
        pages: (0..pages)
            .map(|i| Page {
                background: Some(Rgba8::new((i % 256) as u8, 80, 80, 255)),
                ..Page::default()
            })
            .collect(),
    }
}

async fn wait_terminal(engine: &JobEngine, id: uuid::Uuid, owner: &str) -> Job {
    for _ in 0..300 {
        let job = engine.get_status(id, owner).unwrap();
        if job.status.is_terminal() {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("job {id} did not reach a terminal state in time");
}

fn png_bytes(w: u32, h: u32, px: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(w, h, image::Rgba(px));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

#[tokio::test(flavor = "multi_thread")]
async fn render_job_completes_with_artifact_and_stable_downloads() {
    let h = harness(EngineOpts::default());
    let project = h.docs.insert("alice", two_page_doc());

    let job = h
        .engine
        .submit(
            "alice",
            JobKind::RenderDocument {
                project,
                settings: small_settings(OutputFormat::Pdf),
            },
        )
        .unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.progress, 0);

    let done = wait_terminal(&h.engine, job.id, "alice").await;
    assert_eq!(done.status, JobStatus::Completed, "error: {:?}", done.error);
    assert_eq!(done.progress, 100);
    assert!(done.error.is_none());
    let artifact = done.artifact.expect("completed job has an artifact");
    assert_eq!(artifact.mime_type, "application/pdf");
    let result = done.result.expect("completed job has result metadata");
    assert_eq!(result.page_count, Some(2));

    let (_, first) = h.engine.download(job.id, "alice").unwrap();
    let (_, second) = h.engine.download(job.id, "alice").unwrap();
    assert!(first.starts_with(b"%PDF"));
    assert_eq!(first, second, "downloads must be byte-identical");
}

#[tokio::test(flavor = "multi_thread")]
async fn progress_never_regresses_and_hits_100_only_on_completion() {
    let h = harness(EngineOpts::default());
    let project = h.docs.insert("alice", two_page_doc());

    let job = h
        .engine
        .submit(
            "alice",
            JobKind::RenderDocument {
                project,
                settings: small_settings(OutputFormat::Pdf),
            },
        )
        .unwrap();

    let mut samples = vec![job.progress];
    loop {
        let snap = h.engine.get_status(job.id, "alice").unwrap();
        samples.push(snap.progress);
        if snap.status.is_terminal() {
            assert_eq!(snap.status, JobStatus::Completed);
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert!(samples.windows(2).all(|w| w[0] <= w[1]), "{samples:?}");
    let terminal = *samples.last().unwrap();
    assert_eq!(terminal, 100);
    assert!(samples[..samples.len() - 1].iter().all(|&p| p < 100));
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_document_is_rejected_with_no_job_record() {
    let h = harness(EngineOpts::default());
    let project = h.docs.insert(
        "alice",
        Document {
            title: "empty".to_string(),
            author: None,
            subject: None,
            pages: vec![],
        },
    );

    let err = h
        .engine
        .submit(
            "alice",
            JobKind::RenderDocument {
                project,
                settings: small_settings(OutputFormat::Pdf),
            },
        )
        .unwrap_err();
    assert!(matches!(err, PlatenError::InvalidRequest(_)));
    assert!(h.engine.list_jobs("alice").unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn cancel_on_terminal_job_is_invalid_state_and_leaves_it_unchanged() {
    let h = harness(EngineOpts::default());
    let project = h.docs.insert("alice", two_page_doc());
    let job = h
        .engine
        .submit(
            "alice",
            JobKind::RenderDocument {
                project,
                settings: small_settings(OutputFormat::Pdf),
            },
        )
        .unwrap();
    let done = wait_terminal(&h.engine, job.id, "alice").await;
    assert_eq!(done.status, JobStatus::Completed);

    let err = h.engine.cancel(job.id, "alice").unwrap_err();
    assert!(matches!(err, PlatenError::InvalidState(_)));

    let after = h.engine.get_status(job.id, "alice").unwrap();
    assert_eq!(after.status, JobStatus::Completed);
    assert_eq!(after.progress, 100);
    assert!(after.artifact.is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn pending_job_cancels_immediately() {
    // Inserted straight into the store: no worker is dispatched, so the job
    // stays PENDING until the cancel lands.
    let h = harness(EngineOpts::default());
    let job = Job::new(
        "alice",
        JobKind::RenderDocument {
            project: uuid::Uuid::new_v4(),
            settings: small_settings(OutputFormat::Pdf),
        },
    );
    let id = job.id;
    h.store.insert(job).unwrap();

    let cancelled = h.engine.cancel(id, "alice").unwrap();
    assert_eq!(cancelled.status, JobStatus::Cancelled);
    assert!(cancelled.progress < 100);
    assert!(cancelled.artifact.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn processing_job_cancels_cooperatively_between_pages() {
    let h = harness(EngineOpts::default());
    // Enough pages that the render is still mid-flight when the cancel lands.
    let project = h.docs.insert("alice", many_page_doc(300));

    let job = h
        .engine
        .submit(
            "alice",
            JobKind::RenderDocument {
                project,
                settings: small_settings(OutputFormat::Pdf),
            },
        )
        .unwrap();

    let mut observed_processing = false;
    for _ in 0..5000 {
        let snap = h.engine.get_status(job.id, "alice").unwrap();
        if snap.status == JobStatus::Processing {
            observed_processing = true;
            break;
        }
        assert!(
            !snap.status.is_terminal(),
            "render finished before it could be cancelled"
        );
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    assert!(observed_processing, "job never reached PROCESSING");

    // A PROCESSING job is not cancelled synchronously; the worker notices the
    // flag at the next page boundary.
    let accepted = h.engine.cancel(job.id, "alice").unwrap();
    assert_eq!(accepted.status, JobStatus::Processing);

    let done = wait_terminal(&h.engine, job.id, "alice").await;
    assert_eq!(done.status, JobStatus::Cancelled);
    assert!(done.progress < 100);
    assert!(done.artifact.is_none());
    assert!(done.error.is_none());
    assert!(matches!(
        h.engine.download(job.id, "alice"),
        Err(PlatenError::NotReady(_))
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn other_owners_jobs_answer_not_found() {
    let h = harness(EngineOpts::default());
    let project = h.docs.insert("alice", two_page_doc());
    let job = h
        .engine
        .submit(
            "alice",
            JobKind::RenderDocument {
                project,
                settings: small_settings(OutputFormat::Pdf),
            },
        )
        .unwrap();

    for result in [
        h.engine.get_status(job.id, "bob").map(|_| ()),
        h.engine.cancel(job.id, "bob").map(|_| ()),
        h.engine.download(job.id, "bob").map(|_| ()),
    ] {
        assert!(
            matches!(result, Err(PlatenError::NotFound(_))),
            "ownership must mask as absence"
        );
    }
    assert!(h.engine.list_jobs("bob").unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn expired_artifact_blocks_download_while_status_stays_completed() {
    let opts = EngineOpts {
        artifact_ttl: Duration::ZERO,
        ..EngineOpts::default()
    };
    let h = harness(opts);
    let project = h.docs.insert("alice", two_page_doc());
    let job = h
        .engine
        .submit(
            "alice",
            JobKind::RenderDocument {
                project,
                settings: small_settings(OutputFormat::Pdf),
            },
        )
        .unwrap();
    let done = wait_terminal(&h.engine, job.id, "alice").await;
    assert_eq!(done.status, JobStatus::Completed);

    tokio::time::sleep(Duration::from_millis(10)).await;
    let err = h.engine.download(job.id, "alice").unwrap_err();
    assert!(matches!(err, PlatenError::Expired(_)));

    let after = h.engine.get_status(job.id, "alice").unwrap();
    assert_eq!(after.status, JobStatus::Completed);
}

#[tokio::test(flavor = "multi_thread")]
async fn upscale_transform_doubles_dimensions_and_scores() {
    let h = harness(EngineOpts::default());
    let source = h
        .media
        .register_source(&png_bytes(100, 100, [120, 120, 120, 255]), "src.png", "image/png", "alice")
        .unwrap();

    let job = h
        .engine
        .submit(
            "alice",
            JobKind::TransformImage {
                request: TransformRequest {
                    source: source.id,
                    kind: TransformKind::Upscale { scale: 2.0 },
                },
            },
        )
        .unwrap();

    let done = wait_terminal(&h.engine, job.id, "alice").await;
    assert_eq!(done.status, JobStatus::Completed, "error: {:?}", done.error);
    let result = done.result.unwrap();
    let score = result.quality_score.expect("transform jobs carry a score");
    assert!(score <= 100);

    let (artifact, bytes) = h.engine.download(job.id, "alice").unwrap();
    assert_eq!(artifact.mime_type, "image/png");
    let decoded = image::load_from_memory(&bytes).unwrap();
    assert!((decoded.width() as i64 - 200).abs() <= 1);
    assert!((decoded.height() as i64 - 200).abs() <= 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn transform_with_unknown_source_is_rejected_without_a_record() {
    let h = harness(EngineOpts::default());
    let err = h
        .engine
        .submit(
            "alice",
            JobKind::TransformImage {
                request: TransformRequest {
                    source: uuid::Uuid::new_v4(),
                    kind: TransformKind::Sharpen,
                },
            },
        )
        .unwrap_err();
    assert!(matches!(err, PlatenError::NotFound(_)));
    assert!(h.engine.list_jobs("alice").unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn reconciler_fails_stale_processing_jobs() {
    let opts = EngineOpts {
        stale_after: Duration::from_secs(60),
        ..EngineOpts::default()
    };
    let h = harness(opts);

    let mut job = Job::new(
        "alice",
        JobKind::RenderDocument {
            project: uuid::Uuid::new_v4(),
            settings: small_settings(OutputFormat::Pdf),
        },
    );
    job.start().unwrap();
    let id = job.id;
    h.store.insert(job).unwrap();
    // Backdate past the staleness window; its worker is long gone.
    h.store
        .apply(id, &mut |job| {
            job.updated_at = chrono::Utc::now() - chrono::Duration::seconds(120);
            Ok(())
        })
        .unwrap();

    assert_eq!(h.engine.reconcile_once().unwrap(), 1);
    let job = h.engine.get_status(id, "alice").unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    let detail = job.error.unwrap();
    assert_eq!(detail.kind, "stale");
    assert!(detail.message.contains("stalled"));

    // A second pass finds nothing.
    assert_eq!(h.engine.reconcile_once().unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn jobs_list_newest_first_per_owner() {
    let h = harness(EngineOpts::default());
    let project = h.docs.insert("alice", two_page_doc());

    let first = h
        .engine
        .submit(
            "alice",
            JobKind::RenderDocument {
                project,
                settings: small_settings(OutputFormat::Pdf),
            },
        )
        .unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = h
        .engine
        .submit(
            "alice",
            JobKind::RenderDocument {
                project,
                settings: small_settings(OutputFormat::Png),
            },
        )
        .unwrap();

    let listed = h.engine.list_jobs("alice").unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, second.id);
    assert_eq!(listed[1].id, first.id);
}
