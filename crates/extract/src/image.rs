//! Image file loading.

use std::path::Path;

use rollcall_core::{ExtractionError, ImagePayload};

/// Whether `path` has an image extension the oracle accepts.
pub fn is_image_path(path: &Path) -> bool {
    media_type_of(path).is_some()
}

fn media_type_of(path: &Path) -> Option<&'static str> {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(ImagePayload::media_type_for_extension)
}

/// Load an image, refusing files over `max_bytes` and formats the oracle
/// cannot read.
pub async fn load_image(path: &Path, max_bytes: u64) -> Result<ImagePayload, ExtractionError> {
    let source_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let image_error = |reason: String| ExtractionError::Image {
        source_name: source_name.clone(),
        reason,
    };

    let media_type =
        media_type_of(path).ok_or_else(|| image_error("unsupported image format".into()))?;

    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| image_error(e.to_string()))?;
    if metadata.len() > max_bytes {
        return Err(image_error(format!(
            "{} bytes exceeds the {max_bytes} byte limit",
            metadata.len()
        )));
    }

    let data = tokio::fs::read(path)
        .await
        .map_err(|e| image_error(e.to_string()))?;
    if data.is_empty() {
        return Err(image_error("file is empty".into()));
    }

    Ok(ImagePayload::new(source_name, media_type, data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn loads_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot1.PNG");
        std::fs::write(&path, [0x89, b'P', b'N', b'G']).unwrap();

        let image = load_image(&path, 1024).await.unwrap();
        assert_eq!(image.source, "shot1.PNG");
        assert_eq!(image.media_type, "image/png");
        assert_eq!(image.data.len(), 4);
    }

    #[tokio::test]
    async fn rejects_oversized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.jpg");
        std::fs::write(&path, vec![0u8; 64]).unwrap();

        let err = load_image(&path, 32).await.unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }

    #[tokio::test]
    async fn rejects_unknown_format_and_missing_file() {
        let err = load_image(Path::new("/tmp/shot.bmp"), 1024).await.unwrap_err();
        assert!(err.to_string().contains("unsupported"));

        let err = load_image(Path::new("/nonexistent/shot.png"), 1024).await.unwrap_err();
        assert!(matches!(err, ExtractionError::Image { .. }));
    }

    #[tokio::test]
    async fn rejects_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.webp");
        std::fs::write(&path, []).unwrap();
        assert!(load_image(&path, 1024).await.is_err());
    }

    #[test]
    fn image_path_detection() {
        assert!(is_image_path(Path::new("a/b/shot.jpeg")));
        assert!(!is_image_path(Path::new("roster.xlsx")));
    }
}
