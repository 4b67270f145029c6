use std::collections::HashMap;
use std::sync::Arc;

use crate::doc::model::TextAlign;
use crate::foundation::error::{PlatenError, PlatenResult};

/// RGBA8 brush color used by Parley text layout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TextBrushRgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

/// Font bytes by family name.
///
/// The renderer never touches the filesystem for fonts directly; callers
/// register families here. [`FontCatalog::with_system_defaults`] probes a
/// small list of well-known font paths so a bare Linux/macOS/Windows host
/// resolves a usable default without configuration.
#[derive(Clone, Default)]
pub struct FontCatalog {
    families: HashMap<String, Arc<Vec<u8>>>,
    default_family: Option<String>,
}

const SYSTEM_FONT_CANDIDATES: &[(&str, &str)] = &[
    ("DejaVu Sans", "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf"),
    ("DejaVu Sans", "/usr/share/fonts/TTF/DejaVuSans.ttf"),
    ("DejaVu Sans", "/usr/share/fonts/dejavu/DejaVuSans.ttf"),
    (
        "Liberation Sans",
        "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    ),
    (
        "Liberation Sans",
        "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    ),
    ("Arial", "/Library/Fonts/Arial.ttf"),
    ("Arial", "C:/Windows/Fonts/arial.ttf"),
];

impl FontCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Probe well-known system font locations and register the first hit as
    /// the default family. Returns an empty catalog when none resolve.
    pub fn with_system_defaults() -> Self {
        let mut catalog = Self::new();
        for (family, path) in SYSTEM_FONT_CANDIDATES {
            if catalog.default_family.is_some() {
                break;
            }
            if let Ok(bytes) = std::fs::read(path) {
                catalog.register(family, bytes);
            }
        }
        catalog
    }

    /// Register font bytes under `family`. The first registered family
    /// becomes the default.
    pub fn register(&mut self, family: &str, bytes: Vec<u8>) {
        if self.default_family.is_none() {
            self.default_family = Some(family.to_string());
        }
        self.families.insert(family.to_string(), Arc::new(bytes));
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    /// Resolve a family to its font bytes, falling back to the default
    /// family when `family` is unset or unknown.
    pub fn resolve(&self, family: Option<&str>) -> PlatenResult<Arc<Vec<u8>>> {
        if let Some(name) = family
            && let Some(bytes) = self.families.get(name)
        {
            return Ok(bytes.clone());
        }
        let default = self
            .default_family
            .as_ref()
            .and_then(|name| self.families.get(name))
            .cloned();
        default.ok_or_else(|| {
            PlatenError::render(match family {
                Some(name) => format!("font family '{name}' not registered and no default font"),
                None => "no default font registered".to_string(),
            })
        })
    }
}

/// Stateful helper for building Parley text layouts from raw font bytes.
pub struct TextLayoutEngine {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrushRgba8>,
}

impl Default for TextLayoutEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TextLayoutEngine {
    pub fn new() -> Self {
        Self {
            font_ctx: parley::FontContext::default(),
            layout_ctx: parley::LayoutContext::new(),
        }
    }

    /// Shape and lay out plain text using the provided font bytes, wrapping at
    /// `max_width_px` and aligning lines within it.
    pub fn layout_plain(
        &mut self,
        text: &str,
        font_bytes: &[u8],
        size_px: f32,
        brush: TextBrushRgba8,
        max_width_px: f32,
        align: TextAlign,
    ) -> PlatenResult<parley::Layout<TextBrushRgba8>> {
        if !size_px.is_finite() || size_px <= 0.0 {
            return Err(PlatenError::render("text size_px must be finite and > 0"));
        }

        let families = self
            .font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(font_bytes.to_vec()), None);
        let family_id = families
            .first()
            .map(|(id, _)| *id)
            .ok_or_else(|| PlatenError::render("no font families registered from font bytes"))?;

        let family_name = self
            .font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| PlatenError::render("registered font family has no name"))?
            .to_string();

        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Owned(family_name)),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::Brush(brush));

        let mut layout: parley::Layout<TextBrushRgba8> = builder.build(text);
        layout.break_all_lines(Some(max_width_px));
        let alignment = match align {
            TextAlign::Left => parley::Alignment::Start,
            TextAlign::Center => parley::Alignment::Center,
            TextAlign::Right => parley::Alignment::End,
        };
        layout.align(
            Some(max_width_px),
            alignment,
            parley::AlignmentOptions::default(),
        );

        Ok(layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_catalog_resolve_fails() {
        let catalog = FontCatalog::new();
        assert!(catalog.is_empty());
        assert!(catalog.resolve(None).is_err());
        assert!(catalog.resolve(Some("DejaVu Sans")).is_err());
    }

    #[test]
    fn unknown_family_falls_back_to_default() {
        let mut catalog = FontCatalog::new();
        catalog.register("First", vec![1, 2, 3]);
        catalog.register("Second", vec![4, 5, 6]);
        assert_eq!(catalog.resolve(None).unwrap().as_slice(), &[1, 2, 3]);
        assert_eq!(
            catalog.resolve(Some("Second")).unwrap().as_slice(),
            &[4, 5, 6]
        );
        assert_eq!(
            catalog.resolve(Some("no-such-family")).unwrap().as_slice(),
            &[1, 2, 3]
        );
    }

    #[test]
    fn layout_rejects_nonpositive_size() {
        let mut engine = TextLayoutEngine::new();
        let err = engine.layout_plain(
            "x",
            &[],
            0.0,
            TextBrushRgba8::default(),
            100.0,
            TextAlign::Left,
        );
        assert!(err.is_err());
    }
}
