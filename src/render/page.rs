//! Document-level rendering: page selection, the page loop, and encoding.

use tracing::debug;

use crate::doc::model::Document;
use crate::doc::settings::RenderSettings;
use crate::encode::sink::{DocMeta, PageSink, SinkConfig};
use crate::foundation::error::PlatenResult;
use crate::render::compositor::{PageCompositor, canvas_px};

/// Caller verdict after each page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageStep {
    Continue,
    Stop,
}

/// How a document render ended.
pub enum RenderOutcome {
    /// All selected pages were encoded; the artifact bytes are ready.
    Completed(Vec<u8>),
    /// The caller stopped the render between pages. No artifact is produced.
    Stopped,
}

/// Resolve the page selection for `doc` under `settings`.
///
/// Raster formats carry a single page, so the selection is truncated to its
/// first entry for them.
pub fn select_pages(doc: &Document, settings: &RenderSettings) -> PlatenResult<Vec<usize>> {
    let mut selected = settings.page_range.resolve(doc.pages.len())?;
    if settings.format.is_raster() {
        selected.truncate(1);
    }
    Ok(selected)
}

/// Render the selected pages of `doc` into `sink`, one page at a time.
///
/// `on_page` runs after each encoded page with (pages done, pages total) and
/// may stop the render between pages; a stopped render produces no artifact.
pub fn render_document(
    compositor: &mut PageCompositor,
    doc: &Document,
    owner: &str,
    settings: &RenderSettings,
    sink: &mut dyn PageSink,
    on_page: &mut dyn FnMut(usize, usize) -> PageStep,
) -> PlatenResult<RenderOutcome> {
    settings.validate()?;
    doc.validate()?;
    let selected = select_pages(doc, settings)?;
    let total = selected.len();

    let meta = DocMeta {
        title: doc.title.clone(),
        author: doc.author.clone(),
        subject: doc.subject.clone(),
    };
    sink.begin(&SinkConfig::from_settings(settings, canvas_px(settings), meta))?;

    for (done, &page_idx) in selected.iter().enumerate() {
        let page = compositor.render_page(&doc.pages[page_idx], owner, settings)?;
        sink.push_page(&page)?;
        debug!(page = page_idx + 1, done = done + 1, total, "page rendered");
        if on_page(done + 1, total) == PageStep::Stop {
            return Ok(RenderOutcome::Stopped);
        }
    }

    let bytes = sink.end()?;
    Ok(RenderOutcome::Completed(bytes))
}
