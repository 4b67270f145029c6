//! Multi-page PDF encoding.
//!
//! Each rendered page is embedded as a full-bleed RGB raster; placing it at
//! the origin with the render DPI makes the pixel grid and the physical page
//! agree exactly. Crop marks are stroked in the bleed margin when requested.

use std::io::{BufWriter, Cursor};

use printpdf::{Mm, Point};

use crate::encode::sink::{PageRGBA, PageSink, SinkConfig};
use crate::foundation::error::{PlatenError, PlatenResult};

const MM_PER_INCH: f64 = 25.4;
/// Crop marks stop this far short of the trim corner.
const MARK_GAP_MM: f32 = 0.5;

pub struct PdfSink {
    state: Option<PdfState>,
}

struct PdfState {
    doc: printpdf::PdfDocumentReference,
    first_page: printpdf::indices::PdfPageIndex,
    first_layer: printpdf::indices::PdfLayerIndex,
    first_used: bool,
    config: SinkConfig,
    page_w_mm: f32,
    page_h_mm: f32,
}

impl PdfSink {
    pub fn new() -> Self {
        Self { state: None }
    }
}

impl Default for PdfSink {
    fn default() -> Self {
        Self::new()
    }
}

impl PageSink for PdfSink {
    fn begin(&mut self, config: &SinkConfig) -> PlatenResult<()> {
        let page_w_mm =
            (f64::from(config.page_px.width) / config.dpi * MM_PER_INCH) as f32;
        let page_h_mm =
            (f64::from(config.page_px.height) / config.dpi * MM_PER_INCH) as f32;
        let (doc, first_page, first_layer) = printpdf::PdfDocument::new(
            &config.meta.title,
            Mm(page_w_mm),
            Mm(page_h_mm),
            "Layer 1",
        );
        self.state = Some(PdfState {
            doc,
            first_page,
            first_layer,
            first_used: false,
            config: config.clone(),
            page_w_mm,
            page_h_mm,
        });
        Ok(())
    }

    fn push_page(&mut self, page: &PageRGBA) -> PlatenResult<()> {
        let state = self
            .state
            .as_mut()
            .ok_or_else(|| PlatenError::render("pdf sink used before begin"))?;
        if page.width != state.config.page_px.width
            || page.height != state.config.page_px.height
        {
            return Err(PlatenError::render("page dimensions do not match sink config"));
        }
        if page.data.len() != page.expected_len() {
            return Err(PlatenError::render("page byte length mismatch"));
        }

        let layer = if state.first_used {
            let (p, l) =
                state
                    .doc
                    .add_page(Mm(state.page_w_mm), Mm(state.page_h_mm), "Layer 1");
            state.doc.get_page(p).get_layer(l)
        } else {
            state.first_used = true;
            state
                .doc
                .get_page(state.first_page)
                .get_layer(state.first_layer)
        };

        let xobject = printpdf::ImageXObject {
            width: printpdf::Px(page.width as usize),
            height: printpdf::Px(page.height as usize),
            color_space: printpdf::ColorSpace::Rgb,
            bits_per_component: printpdf::ColorBits::Bit8,
            interpolate: false,
            image_data: page.to_rgb8(),
            image_filter: None,
            clipping_bbox: None,
            smask: None,
        };
        printpdf::Image::from(xobject).add_to_layer(
            layer.clone(),
            printpdf::ImageTransform {
                translate_x: Some(Mm(0.0)),
                translate_y: Some(Mm(0.0)),
                dpi: Some(state.config.dpi as f32),
                ..Default::default()
            },
        );

        if state.config.crop_marks {
            let trim_w = state.config.page_size.width_mm() as f32;
            let trim_h = state.config.page_size.height_mm() as f32;
            let margin_x = (state.page_w_mm - trim_w) / 2.0;
            let margin_y = (state.page_h_mm - trim_h) / 2.0;
            if margin_x > MARK_GAP_MM && margin_y > MARK_GAP_MM {
                draw_crop_marks(&layer, state.page_w_mm, state.page_h_mm, margin_x, margin_y);
            }
        }
        Ok(())
    }

    fn end(&mut self) -> PlatenResult<Vec<u8>> {
        let state = self
            .state
            .take()
            .ok_or_else(|| PlatenError::render("pdf sink used before begin"))?;
        let mut buf = Vec::new();
        {
            let mut writer = BufWriter::new(Cursor::new(&mut buf));
            state
                .doc
                .save(&mut writer)
                .map_err(|e| PlatenError::render(format!("pdf serialization failed: {e}")))?;
        }
        Ok(buf)
    }
}

/// Eight trim marks, two per corner, stroked inside the bleed margin.
fn draw_crop_marks(
    layer: &printpdf::PdfLayerReference,
    page_w: f32,
    page_h: f32,
    margin_x: f32,
    margin_y: f32,
) {
    layer.set_outline_color(printpdf::Color::Rgb(printpdf::Rgb::new(
        0.0, 0.0, 0.0, None,
    )));
    layer.set_outline_thickness(0.5);

    // Trim box edges in page coordinates (origin bottom-left).
    let left = margin_x;
    let right = page_w - margin_x;
    let bottom = margin_y;
    let top = page_h - margin_y;

    let h_len = margin_x - MARK_GAP_MM;
    let v_len = margin_y - MARK_GAP_MM;

    for y in [bottom, top] {
        stroke_line(layer, 0.0, y, h_len, y);
        stroke_line(layer, page_w - h_len, y, page_w, y);
    }
    for x in [left, right] {
        stroke_line(layer, x, 0.0, x, v_len);
        stroke_line(layer, x, page_h - v_len, x, page_h);
    }
}

fn stroke_line(layer: &printpdf::PdfLayerReference, x1: f32, y1: f32, x2: f32, y2: f32) {
    let points = vec![
        (Point::new(Mm(x1), Mm(y1)), false),
        (Point::new(Mm(x2), Mm(y2)), false),
    ];
    layer.add_line(printpdf::Line {
        points,
        is_closed: false,
    });
}
