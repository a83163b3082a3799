//! Read-side helpers for choosing among the variants of a [`CacheRecord`].

use crate::types::{CacheRecord, VariantFormat};

/// Split a variant key such as `"800w.avif"` into width and format.
pub fn parse_variant_key(key: &str) -> Option<(u32, VariantFormat)> {
    let (width, format) = key.split_once("w.")?;
    Some((width.parse().ok()?, VariantFormat::parse(format)?))
}

impl CacheRecord {
    /// Variants of one format as `(width, url)`, narrowest first.
    pub fn variants_of(&self, format: VariantFormat) -> Vec<(u32, &str)> {
        let mut out: Vec<(u32, &str)> = self
            .variants
            .iter()
            .filter_map(|(key, url)| match parse_variant_key(key) {
                Some((width, f)) if f == format => Some((width, url.as_str())),
                _ => None,
            })
            .collect();
        out.sort_by_key(|(width, _)| *width);
        out
    }

    /// `srcset` attribute value for one format, e.g. `"a 400w, b 800w"`.
    pub fn srcset(&self, format: VariantFormat) -> String {
        self.variants_of(format)
            .into_iter()
            .map(|(width, url)| format!("{} {}w", url, width))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Largest JPEG, or any variant if no JPEG exists.
    pub fn fallback_url(&self) -> Option<&str> {
        self.variants_of(VariantFormat::Jpeg)
            .last()
            .map(|(_, url)| *url)
            .or_else(|| self.variants.values().next().map(String::as_str))
    }

    /// Best URL for a display slot of `display_width` CSS pixels.
    ///
    /// Picks the narrowest variant of `preferred` that covers
    /// `display_width × dpr`, else the widest of that format, else the
    /// fallback.
    pub fn best_variant(
        &self,
        display_width: u32,
        dpr: f32,
        preferred: VariantFormat,
    ) -> Option<&str> {
        let needed = (display_width as f32 * dpr.max(1.0)).ceil() as u32;
        let candidates = self.variants_of(preferred);
        candidates
            .iter()
            .find(|(width, _)| *width >= needed)
            .or_else(|| candidates.last())
            .map(|(_, url)| *url)
            .or_else(|| self.fallback_url())
    }

    /// Width over height of the original.
    pub fn aspect_ratio(&self) -> f64 {
        if self.original_height == 0 {
            return 1.0;
        }
        f64::from(self.original_width) / f64::from(self.original_height)
    }
}
