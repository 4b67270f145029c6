use crate::foundation::error::{PlatenError, PlatenResult};

/// Output resolution in dots per inch.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Dpi(pub f64);

impl Dpi {
    /// Create a validated DPI value.
    pub fn new(v: f64) -> PlatenResult<Self> {
        if !v.is_finite() || v <= 0.0 {
            return Err(PlatenError::invalid_request("dpi must be finite and > 0"));
        }
        Ok(Self(v))
    }
}

impl Default for Dpi {
    fn default() -> Self {
        Self(300.0)
    }
}

/// Physical page size in inches.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PageSizeIn {
    /// Width in inches.
    pub width: f64,
    /// Height in inches.
    pub height: f64,
}

impl PageSizeIn {
    /// US Letter, 8.5×11 inches.
    pub const LETTER: Self = Self {
        width: 8.5,
        height: 11.0,
    };

    /// Pixel dimensions of this page at `dpi`, rounded half away from zero.
    pub fn to_px(self, dpi: Dpi) -> PagePx {
        PagePx {
            width: (self.width * dpi.0).round().max(1.0) as u32,
            height: (self.height * dpi.0).round().max(1.0) as u32,
        }
    }

    pub fn width_mm(self) -> f64 {
        self.width * 25.4
    }

    pub fn height_mm(self) -> f64 {
        self.height * 25.4
    }
}

impl Default for PageSizeIn {
    fn default() -> Self {
        Self::LETTER
    }
}

/// Page canvas dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PagePx {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Element placement in relative page units.
///
/// All fields are percentages of the page dimension, nominally in `[0,100]`.
/// Out-of-range values are not rejected here; mapping is permissive unless the
/// caller asks for clamping (see [`RelBox::to_px`]).
#[derive(Clone, Copy, Debug, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct RelBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Absolute element placement in page pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PxBox {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl RelBox {
    /// Map relative (0–100%) placement onto a pixel page.
    ///
    /// `abs = rel / 100 * page_dimension`, rounded half away from zero.
    /// With `clamp` set, the mapped box is intersected with the page rectangle
    /// (a geometric clamp; rotated content is not path-clipped).
    pub fn to_px(self, page: PagePx, clamp: bool) -> PxBox {
        let map = |rel: f64, dim: u32| -> i64 { (rel / 100.0 * f64::from(dim)).round() as i64 };
        let mut out = PxBox {
            x: map(self.x, page.width),
            y: map(self.y, page.height),
            width: map(self.width, page.width),
            height: map(self.height, page.height),
        };
        if clamp {
            let pw = i64::from(page.width);
            let ph = i64::from(page.height);
            let x0 = out.x.clamp(0, pw);
            let y0 = out.y.clamp(0, ph);
            let x1 = (out.x + out.width).clamp(0, pw);
            let y1 = (out.y + out.height).clamp(0, ph);
            out = PxBox {
                x: x0,
                y: y0,
                width: (x1 - x0).max(0),
                height: (y1 - y0).max(0),
            };
        }
        out
    }
}

/// Straight-alpha RGBA8 color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const BLACK: Self = Self {
        r: 0,
        g: 0,
        b: 0,
        a: 255,
    };

    pub const WHITE: Self = Self {
        r: 255,
        g: 255,
        b: 255,
        a: 255,
    };

    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}
