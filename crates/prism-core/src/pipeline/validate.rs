//! Upload eligibility gate, applied before anything is downloaded.

use crate::config::{LimitsConfig, PathsConfig};
use crate::types::{SkipReason, UploadEvent};

/// Content types the pipeline accepts (compared case-insensitively).
///
/// HEIC and HEIF are admitted so an upload the decoder cannot read ends up in
/// the error log rather than being silently skipped.
pub const ALLOWED_CONTENT_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/webp",
    "image/heic",
    "image/heif",
];

/// Decides whether an upload should enter the pipeline at all.
///
/// Every check is on event fields only, so the decision costs no I/O.
/// A rejection is a skip, never an error.
pub struct Validator {
    paths: PathsConfig,
    limits: LimitsConfig,
}

impl Validator {
    /// Create a new validator with the given path conventions and limits.
    pub fn new(paths: PathsConfig, limits: LimitsConfig) -> Self {
        Self { paths, limits }
    }

    /// Return `Some(reason)` when the upload must be skipped.
    pub fn check(&self, event: &UploadEvent) -> Option<SkipReason> {
        if !self.is_original_upload(&event.storage_path) {
            return Some(
                if self.is_variant_path(&event.storage_path) {
                    SkipReason::VariantOutput
                } else {
                    SkipReason::NotAnOriginal
                },
            );
        }

        let content_type = match event.content_type.as_deref() {
            Some(ct) if !ct.trim().is_empty() => ct,
            _ => return Some(SkipReason::MissingContentType),
        };
        if !Self::is_processable_content_type(content_type) {
            return Some(SkipReason::UnsupportedContentType(content_type.to_string()));
        }

        let size = event.byte_size();
        if size == 0 {
            return Some(SkipReason::EmptyFile);
        }
        if size > self.limits.max_bytes {
            return Some(SkipReason::TooLarge {
                size,
                max: self.limits.max_bytes,
            });
        }

        None
    }

    /// Under the originals prefix and not inside any variants namespace.
    fn is_original_upload(&self, path: &str) -> bool {
        path.starts_with(&self.paths.originals_prefix) && !self.is_variant_path(path)
    }

    fn is_variant_path(&self, path: &str) -> bool {
        path.starts_with(&self.paths.variants_prefix) || path.contains("/variants/")
    }

    fn is_processable_content_type(content_type: &str) -> bool {
        ALLOWED_CONTENT_TYPES
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(content_type.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DeclaredSize;

    fn validator() -> Validator {
        Validator::new(PathsConfig::default(), LimitsConfig::default())
    }

    fn event(path: &str, content_type: Option<&str>, size: u64) -> UploadEvent {
        UploadEvent {
            storage_path: path.to_string(),
            content_type: content_type.map(str::to_string),
            size: Some(DeclaredSize::Number(size)),
            bucket: "shop".to_string(),
        }
    }

    #[test]
    fn test_accepts_original_jpeg() {
        let e = event("products/shoe.jpg", Some("image/jpeg"), 1024);
        assert_eq!(validator().check(&e), None);
    }

    #[test]
    fn test_content_type_is_case_insensitive() {
        let e = event("products/shoe.png", Some("IMAGE/PNG"), 1024);
        assert_eq!(validator().check(&e), None);
    }

    #[test]
    fn test_accepts_heic_and_heif() {
        for ct in ["image/heic", "image/heif", "Image/HEIC"] {
            let e = event("products/phone.heic", Some(ct), 2048);
            assert_eq!(validator().check(&e), None, "{ct}");
        }
    }

    #[test]
    fn test_rejects_outside_originals() {
        let e = event("avatars/me.jpg", Some("image/jpeg"), 1024);
        assert_eq!(validator().check(&e), Some(SkipReason::NotAnOriginal));
    }

    #[test]
    fn test_rejects_own_variant_output() {
        let e = event(
            "products/variants/0123456789abcdef/shoe-400w.jpeg",
            Some("image/jpeg"),
            1024,
        );
        assert_eq!(validator().check(&e), Some(SkipReason::VariantOutput));

        let nested = event("products/summer/variants/x.jpg", Some("image/jpeg"), 1024);
        assert_eq!(validator().check(&nested), Some(SkipReason::VariantOutput));
    }

    #[test]
    fn test_rejects_missing_or_unsupported_type() {
        let missing = event("products/a.jpg", None, 1024);
        assert_eq!(
            validator().check(&missing),
            Some(SkipReason::MissingContentType)
        );

        let text = event("products/a.txt", Some("text/plain"), 1024);
        assert_eq!(
            validator().check(&text),
            Some(SkipReason::UnsupportedContentType("text/plain".into()))
        );
    }

    #[test]
    fn test_rejects_empty_and_oversized() {
        let empty = event("products/a.jpg", Some("image/jpeg"), 0);
        assert_eq!(validator().check(&empty), Some(SkipReason::EmptyFile));

        let max = LimitsConfig::default().max_bytes;
        let at_limit = event("products/a.jpg", Some("image/jpeg"), max);
        assert_eq!(validator().check(&at_limit), None);

        let huge = event("products/a.jpg", Some("image/jpeg"), max + 1);
        assert!(matches!(
            validator().check(&huge),
            Some(SkipReason::TooLarge { .. })
        ));
    }

    #[test]
    fn test_missing_size_is_empty() {
        let mut e = event("products/a.jpg", Some("image/jpeg"), 10);
        e.size = None;
        assert_eq!(validator().check(&e), Some(SkipReason::EmptyFile));
    }
}
