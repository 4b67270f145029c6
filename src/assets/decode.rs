use std::sync::Arc;

use anyhow::Context;

use crate::foundation::error::PlatenResult;

/// Decoded raster image in both straight and premultiplied RGBA8 form.
///
/// The straight bytes feed photometric effects (which operate on unassociated
/// color); the premultiplied bytes feed the compositor directly on the
/// identity path.
#[derive(Clone, Debug)]
pub struct PreparedImage {
    pub width: u32,
    pub height: u32,
    /// Row-major straight-alpha RGBA8.
    pub rgba8: Arc<Vec<u8>>,
}

pub fn decode_image(bytes: &[u8]) -> PlatenResult<PreparedImage> {
    let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();

    Ok(PreparedImage {
        width,
        height,
        rgba8: Arc::new(rgba.into_raw()),
    })
}

pub fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = ((px[0] as u16 * a + 127) / 255) as u8;
        px[1] = ((px[1] as u16 * a + 127) / 255) as u8;
        px[2] = ((px[2] as u16 * a + 127) / 255) as u8;
    }
}
