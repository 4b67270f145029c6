use crate::foundation::{
    core::{RelBox, Rgba8},
    error::{PlatenError, PlatenResult},
};

/// The page-based visual model being rendered.
///
/// A document is an ordered sequence of pages; every page shares the physical
/// page size chosen by the render settings.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Document {
    /// Document title, embedded into paginated output.
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    pub pages: Vec<Page>,
}

/// One page: optional background fill plus ordered element lists.
///
/// A translucent background blends over the opaque white page base, so the
/// rendered canvas is always fully opaque.
///
/// Z-order is list order: images draw over the background in array order,
/// text draws over all images in array order. There are no layering controls
/// beyond list position.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct Page {
    #[serde(default)]
    pub background: Option<Rgba8>,
    #[serde(default)]
    pub images: Vec<ImageElement>,
    #[serde(default)]
    pub texts: Vec<TextElement>,
}

/// A placed raster image element.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ImageElement {
    /// Source media reference, resolved through the media store.
    pub media_id: uuid::Uuid,
    /// Placement in relative (0–100%) page units.
    pub placement: RelBox,
    /// Rotation in degrees, about the element center. Arbitrary values allowed.
    #[serde(default)]
    pub rotation_deg: f64,
    #[serde(default)]
    pub effects: EffectSet,
}

/// Photometric adjustments applied to an image element before drawing.
///
/// Each effect is a no-op when absent. Application order is fixed:
/// brightness, then contrast, then saturation. Brightness and saturation are
/// multiplicative modulation factors (1.0 = unchanged); contrast is a linear
/// adjustment about mid-gray (see [`crate::render::effects`]).
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EffectSet {
    #[serde(default)]
    pub brightness: Option<f64>,
    #[serde(default)]
    pub contrast: Option<f64>,
    #[serde(default)]
    pub saturation: Option<f64>,
}

impl EffectSet {
    /// True when no adjustment is requested; the identity path re-uses the
    /// decoded source pixels without an intermediate copy.
    pub fn is_identity(&self) -> bool {
        self.brightness.is_none() && self.contrast.is_none() && self.saturation.is_none()
    }
}

/// A placed text element.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct TextElement {
    pub content: String,
    /// Placement in relative (0–100%) page units. Text wraps within the
    /// mapped absolute width.
    pub placement: RelBox,
    #[serde(default)]
    pub style: TextStyle,
}

/// Text styling with renderer defaults.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct TextStyle {
    /// Font family name; the catalog default is used when unset.
    #[serde(default)]
    pub font_family: Option<String>,
    /// Font size in points.
    #[serde(default = "default_font_size")]
    pub font_size: f64,
    #[serde(default = "default_text_color")]
    pub color: Rgba8,
    #[serde(default)]
    pub align: TextAlign,
}

fn default_font_size() -> f64 {
    12.0
}

fn default_text_color() -> Rgba8 {
    Rgba8::BLACK
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_family: None,
            font_size: default_font_size(),
            color: default_text_color(),
            align: TextAlign::default(),
        }
    }
}

/// Horizontal alignment within the element box.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

impl Document {
    /// Validate the document for submission.
    ///
    /// Relative placements are deliberately not range-checked here: the
    /// coordinate mapper is permissive by design and out-of-range values are
    /// a rendering concern, not a submission error.
    pub fn validate(&self) -> PlatenResult<()> {
        if self.pages.is_empty() {
            return Err(PlatenError::invalid_request(
                "document must have at least one page",
            ));
        }
        for (i, page) in self.pages.iter().enumerate() {
            for text in &page.texts {
                if !text.style.font_size.is_finite() || text.style.font_size <= 0.0 {
                    return Err(PlatenError::invalid_request(format!(
                        "page {}: text font_size must be finite and > 0",
                        i + 1
                    )));
                }
            }
        }
        Ok(())
    }
}
