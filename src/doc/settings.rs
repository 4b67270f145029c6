use crate::foundation::{
    core::{Dpi, PageSizeIn},
    error::{PlatenError, PlatenResult},
};

/// Deliverable output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Paginated vector container, one logical page per document page.
    Pdf,
    /// Single raster image of the first page (documented v1 limitation, see
    /// [`crate::encode::raster`]).
    Png,
    /// Single raster image of the first page, lossy.
    Jpeg,
}

impl OutputFormat {
    pub fn is_raster(self) -> bool {
        matches!(self, Self::Png | Self::Jpeg)
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }
}

/// Color profile tag carried with the artifact. Rendering is always performed
/// in 8-bit RGBA; the tag records the intended interpretation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorProfile {
    #[default]
    Srgb,
    AdobeRgb,
}

/// Page selection, 1-based inclusive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageRange {
    #[default]
    All,
    Pages {
        start: u32,
        end: u32,
    },
}

impl PageRange {
    /// Resolve to 0-based page indices against a document with `page_count`
    /// pages.
    pub fn resolve(self, page_count: usize) -> PlatenResult<Vec<usize>> {
        match self {
            Self::All => Ok((0..page_count).collect()),
            Self::Pages { start, end } => {
                if start == 0 || end < start || (end as usize) > page_count {
                    return Err(PlatenError::invalid_request(format!(
                        "page range {start}-{end} is invalid for a {page_count}-page document"
                    )));
                }
                Ok(((start as usize - 1)..(end as usize)).collect())
            }
        }
    }
}

/// Render configuration for a document export job.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct RenderSettings {
    #[serde(default)]
    pub dpi: Dpi,
    /// Encoder quality (JPEG only), 1–100.
    #[serde(default = "default_quality")]
    pub quality: u8,
    #[serde(default)]
    pub color_profile: ColorProfile,
    #[serde(default)]
    pub page_size: PageSizeIn,
    #[serde(default)]
    pub page_range: PageRange,
    pub format: OutputFormat,
    /// Expand the raster page by 3 mm per side for trimming.
    #[serde(default)]
    pub bleed: bool,
    /// Draw corner crop marks in paginated output.
    #[serde(default)]
    pub crop_marks: bool,
    /// Geometrically clamp mapped element boxes to page bounds. Off by
    /// default: elements may extend past the page, matching caller-facing
    /// behavior of the layout editor.
    #[serde(default)]
    pub clip_elements: bool,
}

fn default_quality() -> u8 {
    95
}

impl RenderSettings {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            dpi: Dpi::default(),
            quality: default_quality(),
            color_profile: ColorProfile::default(),
            page_size: PageSizeIn::default(),
            page_range: PageRange::default(),
            format,
            bleed: false,
            crop_marks: false,
            clip_elements: false,
        }
    }

    pub fn validate(&self) -> PlatenResult<()> {
        Dpi::new(self.dpi.0)?;
        if self.quality == 0 || self.quality > 100 {
            return Err(PlatenError::invalid_request("quality must be in 1..=100"));
        }
        if self.page_size.width <= 0.0 || self.page_size.height <= 0.0 {
            return Err(PlatenError::invalid_request("page size must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_contract() {
        let s = RenderSettings::new(OutputFormat::Pdf);
        assert_eq!(s.dpi.0, 300.0);
        assert_eq!(s.quality, 95);
        assert_eq!(s.color_profile, ColorProfile::Srgb);
        assert_eq!(s.page_range, PageRange::All);
        assert!(!s.clip_elements);
        s.validate().unwrap();
    }

    #[test]
    fn page_range_resolution() {
        assert_eq!(PageRange::All.resolve(3).unwrap(), vec![0, 1, 2]);
        assert_eq!(
            PageRange::Pages { start: 2, end: 3 }.resolve(3).unwrap(),
            vec![1, 2]
        );
        assert!(PageRange::Pages { start: 0, end: 1 }.resolve(3).is_err());
        assert!(PageRange::Pages { start: 2, end: 1 }.resolve(3).is_err());
        assert!(PageRange::Pages { start: 1, end: 4 }.resolve(3).is_err());
    }

    #[test]
    fn validate_rejects_bad_quality() {
        let mut s = RenderSettings::new(OutputFormat::Jpeg);
        s.quality = 0;
        assert!(s.validate().is_err());
        s.quality = 101;
        assert!(s.validate().is_err());
    }

    #[test]
    fn format_metadata() {
        assert!(OutputFormat::Png.is_raster());
        assert!(!OutputFormat::Pdf.is_raster());
        assert_eq!(OutputFormat::Jpeg.mime_type(), "image/jpeg");
        assert_eq!(OutputFormat::Pdf.extension(), "pdf");
    }
}
