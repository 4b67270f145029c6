pub mod pdf;
pub mod raster;
pub mod sink;

use crate::doc::settings::OutputFormat;
use crate::foundation::error::PlatenResult;

/// Build the sink for an output format.
///
/// The PDF sink is not `Send`; create the sink on the worker that drives it.
pub fn sink_for(format: OutputFormat) -> PlatenResult<Box<dyn sink::PageSink>> {
    Ok(match format {
        OutputFormat::Pdf => Box::new(pdf::PdfSink::new()),
        OutputFormat::Png | OutputFormat::Jpeg => Box::new(raster::RasterSink::new(format)?),
    })
}
