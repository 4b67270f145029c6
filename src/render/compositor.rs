use std::collections::HashMap;
use std::sync::Arc;

use kurbo::Affine;
use uuid::Uuid;

use crate::assets::decode::{PreparedImage, decode_image, premultiply_rgba8_in_place};
use crate::assets::text::{FontCatalog, TextBrushRgba8, TextLayoutEngine};
use crate::doc::model::{ImageElement, Page, TextElement};
use crate::doc::settings::RenderSettings;
use crate::encode::sink::PageRGBA;
use crate::foundation::core::{PagePx, PxBox};
use crate::foundation::error::{PlatenError, PlatenResult};
use crate::media::MediaStore;

/// Composites one page (background, then image elements, then text elements,
/// each in list order) onto a CPU raster canvas.
///
/// The render context and decoded-image cache are reused across pages of a
/// job; a compositor is single-job, single-threaded state.
pub struct PageCompositor {
    media: Arc<dyn MediaStore>,
    fonts: FontCatalog,
    ctx: Option<vello_cpu::RenderContext>,
    text_engine: TextLayoutEngine,
    image_cache: HashMap<Uuid, PreparedImage>,
    identity_paint_cache: HashMap<Uuid, ImagePaint>,
}

#[derive(Clone)]
struct ImagePaint {
    paint: vello_cpu::Image,
    w: u32,
    h: u32,
}

impl PageCompositor {
    pub fn new(media: Arc<dyn MediaStore>, fonts: FontCatalog) -> Self {
        Self {
            media,
            fonts,
            ctx: None,
            text_engine: TextLayoutEngine::new(),
            image_cache: HashMap::new(),
            identity_paint_cache: HashMap::new(),
        }
    }

    /// Render one page for `owner` at the settings' page size and DPI.
    ///
    /// Returns premultiplied RGBA8 pixels; with an all-opaque page (the
    /// default white base) premultiplied and straight bytes coincide.
    pub fn render_page(
        &mut self,
        page: &Page,
        owner: &str,
        settings: &RenderSettings,
    ) -> PlatenResult<PageRGBA> {
        let base_px = settings.page_size.to_px(settings.dpi);
        let bleed_px = bleed_px(settings);
        let canvas = canvas_px(settings);
        let w: u16 = canvas
            .width
            .try_into()
            .map_err(|_| PlatenError::render("page width exceeds raster limit (u16)"))?;
        let h: u16 = canvas
            .height
            .try_into()
            .map_err(|_| PlatenError::render("page height exceeds raster limit (u16)"))?;

        let offset = Affine::translate((f64::from(bleed_px), f64::from(bleed_px)));

        let mut ctx = match self.ctx.take() {
            Some(ctx) if ctx.width() == w && ctx.height() == h => ctx,
            _ => vello_cpu::RenderContext::new(w, h),
        };
        ctx.reset();

        // White base; the page fill, if any, blends over it with its own
        // alpha. The canvas stays fully opaque.
        let full = vello_cpu::kurbo::Rect::new(
            0.0,
            0.0,
            f64::from(canvas.width),
            f64::from(canvas.height),
        );
        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(255, 255, 255, 255));
        ctx.fill_rect(&full);
        if let Some(base) = page.background {
            ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                base.r, base.g, base.b, base.a,
            ));
            ctx.fill_rect(&full);
        }

        for element in &page.images {
            self.draw_image_element(&mut ctx, element, owner, base_px, offset, settings)?;
        }
        for element in &page.texts {
            self.draw_text_element(&mut ctx, element, base_px, offset, settings)?;
        }

        ctx.flush();
        let mut pixmap = vello_cpu::Pixmap::new(w, h);
        ctx.render_to_pixmap(&mut pixmap);
        self.ctx = Some(ctx);

        Ok(PageRGBA {
            width: canvas.width,
            height: canvas.height,
            data: pixmap.data_as_u8_slice().to_vec(),
        })
    }

    fn prepared_image(&mut self, media_id: Uuid, owner: &str) -> PlatenResult<PreparedImage> {
        if let Some(prepared) = self.image_cache.get(&media_id) {
            return Ok(prepared.clone());
        }
        let bytes = self.media.read_media(media_id, owner)?;
        let prepared = decode_image(&bytes)?;
        self.image_cache.insert(media_id, prepared.clone());
        Ok(prepared)
    }

    /// Paint for an element: the identity path re-uses the decoded source
    /// pixels (cached per media id); any rotation-independent effect forces a
    /// one-off adjusted copy.
    fn element_paint(
        &mut self,
        element: &ImageElement,
        owner: &str,
    ) -> PlatenResult<ImagePaint> {
        if element.effects.is_identity() {
            if let Some(paint) = self.identity_paint_cache.get(&element.media_id) {
                return Ok(paint.clone());
            }
        }

        let prepared = self.prepared_image(element.media_id, owner)?;
        let mut rgba = prepared.rgba8.as_ref().clone();
        if !element.effects.is_identity() {
            super::effects::apply_effects(&mut rgba, &element.effects);
        }
        premultiply_rgba8_in_place(&mut rgba);

        let pixmap = pixmap_from_premul_bytes(&rgba, prepared.width, prepared.height)?;
        let paint = ImagePaint {
            paint: vello_cpu::Image {
                image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
                sampler: vello_cpu::peniko::ImageSampler::default(),
            },
            w: prepared.width,
            h: prepared.height,
        };
        if element.effects.is_identity() {
            self.identity_paint_cache
                .insert(element.media_id, paint.clone());
        }
        Ok(paint)
    }

    fn draw_image_element(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        element: &ImageElement,
        owner: &str,
        page_px: PagePx,
        offset: Affine,
        settings: &RenderSettings,
    ) -> PlatenResult<()> {
        let abs = element.placement.to_px(page_px, settings.clip_elements);
        if abs.width <= 0 || abs.height <= 0 {
            return Ok(());
        }

        let paint = self.element_paint(element, owner)?;
        if paint.w == 0 || paint.h == 0 {
            return Ok(());
        }

        let tr = offset * element_transform(abs, element.rotation_deg, paint.w, paint.h);
        ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
        ctx.set_transform(affine_to_cpu(tr));
        ctx.set_paint(paint.paint);
        ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
            0.0,
            0.0,
            f64::from(paint.w),
            f64::from(paint.h),
        ));
        Ok(())
    }

    fn draw_text_element(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        element: &TextElement,
        page_px: PagePx,
        offset: Affine,
        settings: &RenderSettings,
    ) -> PlatenResult<()> {
        let abs = element.placement.to_px(page_px, settings.clip_elements);
        if abs.width <= 0 {
            return Ok(());
        }

        let font_bytes = self.fonts.resolve(element.style.font_family.as_deref())?;
        // Font size is in points; scale to device pixels at the page DPI.
        let size_px = (element.style.font_size / 72.0 * settings.dpi.0) as f32;
        let color = element.style.color;
        let layout = self.text_engine.layout_plain(
            &element.content,
            &font_bytes,
            size_px,
            TextBrushRgba8 {
                r: color.r,
                g: color.g,
                b: color.b,
                a: color.a,
            },
            abs.width as f32,
            element.style.align,
        )?;

        let font = vello_cpu::peniko::FontData::new(
            vello_cpu::peniko::Blob::from(font_bytes.as_ref().clone()),
            0,
        );

        let tr = offset * Affine::translate((abs.x as f64, abs.y as f64));
        ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
        ctx.set_transform(affine_to_cpu(tr));
        for line in layout.lines() {
            for item in line.items() {
                let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                    continue;
                };
                let brush = run.style().brush;
                ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                    brush.r, brush.g, brush.b, brush.a,
                ));
                let glyphs = run.positioned_glyphs().map(|g| vello_cpu::Glyph {
                    id: g.id,
                    x: g.x,
                    y: g.y,
                });
                ctx.glyph_run(&font)
                    .font_size(run.run().font_size())
                    .fill_glyphs(glyphs);
            }
        }
        Ok(())
    }
}

/// Bleed margin in device pixels (3 mm per side when enabled).
pub fn bleed_px(settings: &RenderSettings) -> u32 {
    if settings.bleed {
        (3.0 / 25.4 * settings.dpi.0).round() as u32
    } else {
        0
    }
}

/// Full canvas size of a rendered page, bleed included.
pub fn canvas_px(settings: &RenderSettings) -> PagePx {
    let base = settings.page_size.to_px(settings.dpi);
    let bleed = bleed_px(settings);
    PagePx {
        width: base.width + 2 * bleed,
        height: base.height + 2 * bleed,
    }
}

/// Placement transform for an image element: scale the source raster into the
/// absolute box, then rotate about the box center.
fn element_transform(abs: PxBox, rotation_deg: f64, img_w: u32, img_h: u32) -> Affine {
    let sx = abs.width as f64 / f64::from(img_w);
    let sy = abs.height as f64 / f64::from(img_h);
    let place = Affine::translate((abs.x as f64, abs.y as f64))
        * Affine::scale_non_uniform(sx, sy);
    if rotation_deg == 0.0 {
        return place;
    }
    let cx = abs.x as f64 + abs.width as f64 / 2.0;
    let cy = abs.y as f64 + abs.height as f64 / 2.0;
    Affine::translate((cx, cy))
        * Affine::rotate(rotation_deg.to_radians())
        * Affine::translate((-cx, -cy))
        * place
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn pixmap_from_premul_bytes(
    bytes: &[u8],
    width: u32,
    height: u32,
) -> PlatenResult<vello_cpu::Pixmap> {
    let w: u16 = width
        .try_into()
        .map_err(|_| PlatenError::render("image width exceeds u16"))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| PlatenError::render("image height exceeds u16"))?;
    if bytes.len()
        != (width as usize)
            .saturating_mul(height as usize)
            .saturating_mul(4)
    {
        return Err(PlatenError::render("pixmap byte len mismatch"));
    }
    let mut pixels = Vec::<vello_cpu::peniko::color::PremulRgba8>::with_capacity(
        (width as usize) * (height as usize),
    );
    for px in bytes.chunks_exact(4) {
        pixels.push(vello_cpu::peniko::color::PremulRgba8::from_u8_array([
            px[0], px[1], px[2], px[3],
        ]));
    }
    Ok(vello_cpu::Pixmap::from_parts_with_opacity(
        pixels, w, h, true,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_transform_maps_corners_into_box() {
        let abs = PxBox {
            x: 100,
            y: 200,
            width: 50,
            height: 80,
        };
        let tr = element_transform(abs, 0.0, 10, 10);
        let origin = tr * kurbo::Point::new(0.0, 0.0);
        let far = tr * kurbo::Point::new(10.0, 10.0);
        assert!((origin.x - 100.0).abs() < 1e-9);
        assert!((origin.y - 200.0).abs() < 1e-9);
        assert!((far.x - 150.0).abs() < 1e-9);
        assert!((far.y - 280.0).abs() < 1e-9);
    }

    #[test]
    fn rotation_preserves_center() {
        let abs = PxBox {
            x: 0,
            y: 0,
            width: 100,
            height: 100,
        };
        let tr = element_transform(abs, 37.0, 10, 10);
        let center = tr * kurbo::Point::new(5.0, 5.0);
        assert!((center.x - 50.0).abs() < 1e-9);
        assert!((center.y - 50.0).abs() < 1e-9);
    }

    #[test]
    fn pixmap_rejects_mismatched_len() {
        assert!(pixmap_from_premul_bytes(&[0u8; 7], 1, 2).is_err());
        assert!(pixmap_from_premul_bytes(&[0u8; 8], 1, 2).is_ok());
    }
}
