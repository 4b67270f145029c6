//! Page output sinks.
//!
//! A renderer produces pages one at a time; a [`PageSink`] consumes them in
//! order and yields the encoded artifact bytes from [`PageSink::end`]. The
//! PDF and raster encoders implement this; [`InMemorySink`] keeps raw pages
//! for assertions in tests.

use crate::doc::settings::RenderSettings;
use crate::foundation::core::{PagePx, PageSizeIn};
use crate::foundation::error::{PlatenError, PlatenResult};

/// One rendered page: tightly packed premultiplied RGBA8, row-major.
///
/// All pages produced by the renderer are fully opaque (they sit on an opaque
/// base fill), so premultiplied and straight bytes coincide and the RGB
/// conversion below is a plain channel drop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageRGBA {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl PageRGBA {
    pub fn expected_len(&self) -> usize {
        (self.width as usize)
            .saturating_mul(self.height as usize)
            .saturating_mul(4)
    }

    /// Drop the alpha channel, un-premultiplying any non-opaque pixel.
    pub fn to_rgb8(&self) -> Vec<u8> {
        let mut rgb = Vec::with_capacity(self.expected_len() / 4 * 3);
        for px in self.data.chunks_exact(4) {
            let a = px[3];
            if a == 255 || a == 0 {
                rgb.extend_from_slice(&px[..3]);
            } else {
                let un = |c: u8| -> u8 {
                    ((u32::from(c) * 255 + u32::from(a) / 2) / u32::from(a)).min(255) as u8
                };
                rgb.extend_from_slice(&[un(px[0]), un(px[1]), un(px[2])]);
            }
        }
        rgb
    }

    /// Sample one pixel as straight RGBA. Panics outside bounds; test helper.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.data[idx],
            self.data[idx + 1],
            self.data[idx + 2],
            self.data[idx + 3],
        ]
    }
}

/// Document metadata forwarded to encoders.
#[derive(Clone, Debug, Default)]
pub struct DocMeta {
    pub title: String,
    pub author: Option<String>,
    pub subject: Option<String>,
}

/// Fixed per-job parameters a sink needs before the first page arrives.
#[derive(Clone, Debug)]
pub struct SinkConfig {
    /// Full canvas size of every incoming page, bleed included.
    pub page_px: PagePx,
    /// Trim size of the page, bleed excluded.
    pub page_size: PageSizeIn,
    pub dpi: f64,
    /// JPEG quality, 1..=100. Ignored by lossless encoders.
    pub quality: u8,
    pub crop_marks: bool,
    pub meta: DocMeta,
}

impl SinkConfig {
    pub fn from_settings(settings: &RenderSettings, page_px: PagePx, meta: DocMeta) -> Self {
        Self {
            page_px,
            page_size: settings.page_size,
            dpi: settings.dpi.0,
            quality: settings.quality,
            crop_marks: settings.crop_marks,
            meta,
        }
    }
}

/// Ordered consumer of rendered pages.
pub trait PageSink {
    fn begin(&mut self, config: &SinkConfig) -> PlatenResult<()>;

    /// Pages arrive in output order; dimensions must match the config.
    fn push_page(&mut self, page: &PageRGBA) -> PlatenResult<()>;

    /// Finish and return the encoded artifact bytes.
    fn end(&mut self) -> PlatenResult<Vec<u8>>;
}

/// Collects raw pages; `end` yields no encoded bytes. Test double.
#[derive(Default)]
pub struct InMemorySink {
    pub pages: Vec<PageRGBA>,
    pub config: Option<SinkConfig>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PageSink for InMemorySink {
    fn begin(&mut self, config: &SinkConfig) -> PlatenResult<()> {
        self.config = Some(config.clone());
        self.pages.clear();
        Ok(())
    }

    fn push_page(&mut self, page: &PageRGBA) -> PlatenResult<()> {
        if page.data.len() != page.expected_len() {
            return Err(PlatenError::render("page byte length mismatch"));
        }
        if let Some(cfg) = &self.config
            && (page.width != cfg.page_px.width || page.height != cfg.page_px.height)
        {
            return Err(PlatenError::render("page dimensions do not match sink config"));
        }
        self.pages.push(page.clone());
        Ok(())
    }

    fn end(&mut self) -> PlatenResult<Vec<u8>> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_page(w: u32, h: u32, px: [u8; 4]) -> PageRGBA {
        PageRGBA {
            width: w,
            height: h,
            data: px.repeat((w * h) as usize),
        }
    }

    #[test]
    fn rgb_conversion_drops_alpha_for_opaque_pixels() {
        let page = solid_page(2, 1, [10, 20, 30, 255]);
        assert_eq!(page.to_rgb8(), vec![10, 20, 30, 10, 20, 30]);
    }

    #[test]
    fn rgb_conversion_unpremultiplies() {
        let page = solid_page(1, 1, [64, 64, 64, 128]);
        let rgb = page.to_rgb8();
        assert_eq!(rgb.len(), 3);
        assert!(rgb[0] >= 127 && rgb[0] <= 128);
    }

    #[test]
    fn in_memory_sink_rejects_mismatched_pages() {
        let mut sink = InMemorySink::new();
        let cfg = SinkConfig {
            page_px: PagePx {
                width: 2,
                height: 2,
            },
            page_size: PageSizeIn::LETTER,
            dpi: 300.0,
            quality: 95,
            crop_marks: false,
            meta: DocMeta::default(),
        };
        sink.begin(&cfg).unwrap();
        assert!(sink.push_page(&solid_page(2, 2, [0, 0, 0, 255])).is_ok());
        assert!(sink.push_page(&solid_page(3, 2, [0, 0, 0, 255])).is_err());
        assert_eq!(sink.pages.len(), 1);
    }
}
