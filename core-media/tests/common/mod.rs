//! Shared fixtures for core-media integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use core_media::{ApiError, DialogObserver, EntityRef, LocalFile, MediaApi, MediaSet, UploadBatch};
use image::{DynamicImage, ImageFormat};
use mockall::mock;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

mock! {
    pub MediaApi {}

    #[async_trait]
    impl MediaApi for MediaApi {
        async fn fetch_media(&self, entity: &EntityRef) -> Result<MediaSet, ApiError>;
        async fn delete_images(&self, entity: &EntityRef, image_paths: &[String]) -> Result<(), ApiError>;
        async fn upload_images(&self, entity: &EntityRef, batch: UploadBatch) -> Result<(), ApiError>;
    }
}

pub fn product() -> EntityRef {
    EntityRef::product("65f0c1")
}

/// Baseline with a main image and `details` detail images `d0.jpg`, `d1.jpg`, ...
pub fn media_set(details: usize) -> MediaSet {
    MediaSet::new("65f0c1")
        .with_main_image("uploads/main.jpg")
        .with_detail_images((0..details).map(|i| format!("d{i}.jpg")))
}

/// File of exactly `size` bytes; not a decodable image.
pub fn blob(name: &str, size: usize) -> LocalFile {
    LocalFile::new(name, "image/jpeg", Bytes::from(vec![0u8; size]))
}

pub fn blobs(count: usize) -> Vec<LocalFile> {
    (0..count).map(|i| blob(&format!("new{i}.jpg"), 1024)).collect()
}

/// A real JPEG, for tests that render previews.
pub fn jpeg(name: &str, width: u32, height: u32) -> LocalFile {
    let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
        width,
        height,
        image::Rgb([40, 90, 200]),
    ));
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Jpeg)
        .unwrap();
    LocalFile::new(name, "image/jpeg", Bytes::from(buffer))
}

pub fn server_error() -> ApiError {
    ApiError::Status {
        status: 500,
        message: "storage backend unavailable".to_string(),
    }
}

/// Observer that counts notifications.
#[derive(Default)]
pub struct RecordingObserver {
    pub uploads: AtomicUsize,
    pub open_changes: Mutex<Vec<bool>>,
}

impl RecordingObserver {
    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn open_changes(&self) -> Vec<bool> {
        self.open_changes.lock().unwrap().clone()
    }
}

impl DialogObserver for RecordingObserver {
    fn on_upload_complete(&self, _entity: &EntityRef) {
        self.uploads.fetch_add(1, Ordering::SeqCst);
    }

    fn on_open_change(&self, open: bool) {
        self.open_changes.lock().unwrap().push(open);
    }
}
