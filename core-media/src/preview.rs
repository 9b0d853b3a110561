//! Local thumbnail previews for staged files
//!
//! Decoding and resizing run on the blocking pool so a large photo does not
//! stall the async executor. Output is a PNG `data:` URI the host can put
//! straight into an `<img>` tag.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use tracing::{debug, instrument};

use crate::error::{MediaError, Result};
use crate::types::{LocalFile, Preview};

#[derive(Debug, Clone, Copy)]
pub struct PreviewGenerator {
    max_dimension: u32,
}

impl PreviewGenerator {
    pub const DEFAULT_MAX_DIMENSION: u32 = 320;

    /// `max_dimension` bounds the longest edge of generated thumbnails.
    pub fn new(max_dimension: u32) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
        }
    }

    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    #[instrument(skip(self, file), fields(file = %file.name, size = file.size()))]
    pub async fn preview(&self, file: &LocalFile) -> Result<Preview> {
        let bytes = file.bytes.clone();
        let file_name = file.name.clone();
        let max_dimension = self.max_dimension;

        let preview = tokio::task::spawn_blocking(move || render(&bytes, max_dimension))
            .await
            .map_err(|e| MediaError::Preview {
                file_name: file_name.clone(),
                reason: format!("preview task failed: {}", e),
            })?
            .map_err(|reason| MediaError::Preview { file_name, reason })?;

        debug!(
            width = preview.width,
            height = preview.height,
            "Preview rendered"
        );
        Ok(preview)
    }
}

impl Default for PreviewGenerator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_DIMENSION)
    }
}

fn render(data: &[u8], max_dimension: u32) -> std::result::Result<Preview, String> {
    let img = image::load_from_memory(data).map_err(|e| format!("not a readable image: {}", e))?;
    let thumb = shrink(img, max_dimension);

    let mut buffer = Vec::new();
    thumb
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .map_err(|e| format!("failed to encode preview: {}", e))?;

    Ok(Preview {
        data_uri: format!("data:image/png;base64,{}", STANDARD.encode(&buffer)),
        width: thumb.width(),
        height: thumb.height(),
    })
}

/// Fit the image inside `max_dimension` on both axes; smaller images are kept.
fn shrink(img: DynamicImage, max_dimension: u32) -> DynamicImage {
    if img.width() <= max_dimension && img.height() <= max_dimension {
        return img;
    }
    img.resize(
        max_dimension,
        max_dimension,
        image::imageops::FilterType::Lanczos3,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn jpeg(width: u32, height: u32) -> LocalFile {
        let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            width,
            height,
            image::Rgb([200, 30, 30]),
        ));
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Jpeg)
            .unwrap();
        LocalFile::new("caliper.jpg", "image/jpeg", Bytes::from(buffer))
    }

    #[tokio::test]
    async fn test_large_image_is_downsized() {
        let generator = PreviewGenerator::new(64);
        let preview = generator.preview(&jpeg(400, 200)).await.unwrap();

        assert_eq!(preview.width, 64);
        assert_eq!(preview.height, 32);
        assert!(preview.data_uri.starts_with("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn test_small_image_keeps_size() {
        let preview = PreviewGenerator::default()
            .preview(&jpeg(40, 30))
            .await
            .unwrap();
        assert_eq!((preview.width, preview.height), (40, 30));
    }

    #[tokio::test]
    async fn test_undecodable_file_is_reported() {
        let file = LocalFile::new("notes.jpg", "image/jpeg", Bytes::from_static(b"plain text"));
        let err = PreviewGenerator::default().preview(&file).await.unwrap_err();

        match err {
            MediaError::Preview { file_name, .. } => assert_eq!(file_name, "notes.jpg"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_data_uri_decodes_to_png() {
        let file = jpeg(10, 10);
        let preview = render(&file.bytes, 320).unwrap();
        let encoded = preview
            .data_uri
            .strip_prefix("data:image/png;base64,")
            .unwrap();
        let png = STANDARD.decode(encoded).unwrap();
        assert_eq!(&png[..4], b"\x89PNG");
    }
}
