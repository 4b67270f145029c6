//! Asynchronous rendering and image-transformation engine for a
//! print-product backend.
//!
//! The crate has two halves. The rendering half turns a page-based
//! [`doc::model::Document`] into a multi-page PDF or a single-page raster
//! image: relative (0-100%) placements are mapped to device pixels, each
//! element is composited with its rotation and photometric effects, and the
//! finished pages are encoded by a [`encode::sink::PageSink`]. The job half
//! wraps that work (and six standalone image transformations) in an
//! asynchronous lifecycle: jobs are submitted, progress is observable,
//! cancellation is cooperative, artifacts expire, and a reconciliation loop
//! fails jobs whose workers went away.
//!
//! ```no_run
//! # use std::sync::Arc;
//! use platen::{EngineOpts, JobEngine, JobKind};
//! use platen::assets::text::FontCatalog;
//! use platen::doc::settings::{OutputFormat, RenderSettings};
//! use platen::job::store::InMemoryJobStore;
//! use platen::media::{FsMediaStore, InMemoryDocumentSource};
//!
//! # async fn demo(project: uuid::Uuid) -> platen::PlatenResult<()> {
//! let docs = Arc::new(InMemoryDocumentSource::new());
//! let engine = JobEngine::new(
//!     Arc::new(InMemoryJobStore::new()),
//!     Arc::new(FsMediaStore::new("./media")?),
//!     docs,
//!     FontCatalog::with_system_defaults(),
//!     EngineOpts::default(),
//! );
//! let job = engine.submit(
//!     "alice",
//!     JobKind::RenderDocument {
//!         project,
//!         settings: RenderSettings::new(OutputFormat::Pdf),
//!     },
//! )?;
//! let status = engine.get_status(job.id, "alice")?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod assets;
pub mod doc;
pub mod encode;
pub mod foundation;
pub mod job;
pub mod media;
pub mod render;
pub mod transform;

pub use foundation::error::{PlatenError, PlatenResult};
pub use job::engine::{EngineOpts, JobEngine};
pub use job::model::{Job, JobKind, JobStatus};
