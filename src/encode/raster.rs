//! Single-page raster encoding (PNG and JPEG).
//!
//! Raster export covers the first page only; the renderer truncates the page
//! selection before pages reach this sink, and the sink itself rejects a
//! second page outright.

use std::io::Cursor;

use crate::doc::settings::OutputFormat;
use crate::encode::sink::{PageRGBA, PageSink, SinkConfig};
use crate::foundation::error::{PlatenError, PlatenResult};

pub struct RasterSink {
    format: OutputFormat,
    quality: u8,
    page: Option<PageRGBA>,
    begun: bool,
}

impl RasterSink {
    /// `format` must be a raster format.
    pub fn new(format: OutputFormat) -> PlatenResult<Self> {
        if !format.is_raster() {
            return Err(PlatenError::unsupported_kind(format!(
                "raster sink cannot encode {format:?}"
            )));
        }
        Ok(Self {
            format,
            quality: 95,
            page: None,
            begun: false,
        })
    }
}

impl PageSink for RasterSink {
    fn begin(&mut self, config: &SinkConfig) -> PlatenResult<()> {
        self.quality = config.quality;
        self.page = None;
        self.begun = true;
        Ok(())
    }

    fn push_page(&mut self, page: &PageRGBA) -> PlatenResult<()> {
        if !self.begun {
            return Err(PlatenError::render("raster sink used before begin"));
        }
        if self.page.is_some() {
            return Err(PlatenError::render("raster sink accepts a single page"));
        }
        if page.data.len() != page.expected_len() {
            return Err(PlatenError::render("page byte length mismatch"));
        }
        self.page = Some(page.clone());
        Ok(())
    }

    fn end(&mut self) -> PlatenResult<Vec<u8>> {
        let page = self
            .page
            .take()
            .ok_or_else(|| PlatenError::render("raster sink ended with no page"))?;
        self.begun = false;

        let mut buf = Vec::new();
        match self.format {
            OutputFormat::Png => {
                let rgba = image::RgbaImage::from_raw(page.width, page.height, page.data)
                    .ok_or_else(|| PlatenError::render("page buffer shorter than dimensions"))?;
                image::DynamicImage::ImageRgba8(rgba)
                    .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
                    .map_err(|e| PlatenError::render(format!("png encode failed: {e}")))?;
            }
            OutputFormat::Jpeg => {
                let rgb = page.to_rgb8();
                let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(
                    Cursor::new(&mut buf),
                    self.quality.clamp(1, 100),
                );
                let img = image::RgbImage::from_raw(page.width, page.height, rgb)
                    .ok_or_else(|| PlatenError::render("page buffer shorter than dimensions"))?;
                img.write_with_encoder(encoder)
                    .map_err(|e| PlatenError::render(format!("jpeg encode failed: {e}")))?;
            }
            OutputFormat::Pdf => unreachable!("rejected in RasterSink::new"),
        }
        Ok(buf)
    }
}
