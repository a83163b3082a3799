//! Turn files under a bucket directory into upload events.

use prism_core::types::DeclaredSize;
use prism_core::UploadEvent;
use std::path::Path;
use walkdir::WalkDir;

/// Build one event per regular file at or below `bucket_dir/input`.
///
/// Hidden entries are skipped, which keeps the local store's `.meta` and
/// `.cache` trees out of the walk. Events are sorted by storage path.
pub fn discover_events(
    bucket_dir: &Path,
    bucket: &str,
    input: &Path,
) -> anyhow::Result<Vec<UploadEvent>> {
    let start = bucket_dir.join(input);
    if !start.exists() {
        anyhow::bail!(
            "Input path does not exist: {:?}\n\n  Hint: PATH is relative to the bucket directory {:?}.",
            start,
            bucket_dir
        );
    }

    let mut events = Vec::new();
    let walker = WalkDir::new(&start)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(bucket_dir) else {
            continue;
        };
        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        events.push(UploadEvent {
            storage_path: storage_path(relative),
            content_type: content_type_for(entry.path()).map(str::to_string),
            size: Some(DeclaredSize::Number(size)),
            bucket: bucket.to_string(),
        });
    }

    events.sort_by(|a, b| a.storage_path.cmp(&b.storage_path));
    tracing::debug!("Discovered {} files under {:?}", events.len(), start);
    Ok(events)
}

/// Forward-slash object path for a path relative to the bucket.
fn storage_path(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// MIME type by file extension, as a storage service would declare it.
pub fn content_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    Some(match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "gif" => "image/gif",
        "tif" | "tiff" => "image/tiff",
        "bmp" => "image/bmp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "txt" => "text/plain",
        "json" => "application/json",
        _ => return None,
    })
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().map(|s| s.starts_with('.')).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for(Path::new("a/B.JPG")), Some("image/jpeg"));
        assert_eq!(content_type_for(Path::new("a/b.png")), Some("image/png"));
        assert_eq!(content_type_for(Path::new("x.HEIF")), Some("image/heif"));
        assert_eq!(content_type_for(Path::new("notes.txt")), Some("text/plain"));
        assert_eq!(content_type_for(Path::new("README")), None);
    }

    #[test]
    fn test_discover_events() {
        let dir = tempfile::tempdir().unwrap();
        let bucket = dir.path().join("shop");
        std::fs::create_dir_all(bucket.join("products/shoes")).unwrap();
        std::fs::create_dir_all(bucket.join(".meta/shop/products")).unwrap();
        std::fs::write(bucket.join("products/shoes/red.jpg"), [0u8; 10]).unwrap();
        std::fs::write(bucket.join("products/hat.png"), [0u8; 3]).unwrap();
        std::fs::write(bucket.join(".meta/shop/products/hat.png.json"), "{}").unwrap();

        let events = discover_events(&bucket, "shop", Path::new("")).unwrap();
        let paths: Vec<&str> = events.iter().map(|e| e.storage_path.as_str()).collect();
        assert_eq!(paths, vec!["products/hat.png", "products/shoes/red.jpg"]);
        assert_eq!(events[1].content_type.as_deref(), Some("image/jpeg"));
        assert_eq!(events[1].byte_size(), 10);
        assert_eq!(events[0].bucket, "shop");
    }

    #[test]
    fn test_discover_single_file_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("products")).unwrap();
        std::fs::write(dir.path().join("products/a.jpg"), [1u8; 4]).unwrap();

        let events = discover_events(dir.path(), "b", Path::new("products/a.jpg")).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].storage_path, "products/a.jpg");

        assert!(discover_events(dir.path(), "b", Path::new("nope")).is_err());
    }
}
