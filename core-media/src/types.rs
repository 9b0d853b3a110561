//! Media data model
//!
//! Server-side state ([`MediaSet`]), locally selected files ([`LocalFile`])
//! and the staged additions built from them.

use bridge_traits::storage::FileSystemAccess;
use bytes::Bytes;
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{MediaError, Result, ValidationError};

// ============================================================================
// Entities
// ============================================================================

/// Catalog resource whose dialogs manage images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    Products,
    SpareParts,
}

impl ResourceKind {
    /// URL path segment of the resource collection.
    pub fn path_segment(&self) -> &'static str {
        match self {
            ResourceKind::Products => "products",
            ResourceKind::SpareParts => "spare-parts",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_segment())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "products" => Ok(ResourceKind::Products),
            "spare-parts" | "spareparts" => Ok(ResourceKind::SpareParts),
            other => Err(format!("Unknown resource: {}", other)),
        }
    }
}

/// Addresses one catalog entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub resource: ResourceKind,
    pub id: String,
}

impl EntityRef {
    pub fn new(resource: ResourceKind, id: impl Into<String>) -> Self {
        Self {
            resource,
            id: id.into(),
        }
    }

    pub fn product(id: impl Into<String>) -> Self {
        Self::new(ResourceKind::Products, id)
    }

    pub fn spare_part(id: impl Into<String>) -> Self {
        Self::new(ResourceKind::SpareParts, id)
    }

    /// Relative API path, e.g. `products/42`.
    pub fn path(&self) -> String {
        format!("{}/{}", self.resource.path_segment(), self.id)
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.resource, self.id)
    }
}

/// Server-confirmed images of one entity, as last fetched.
///
/// Deserializes straight from the entity JSON returned by the API, which
/// carries the id as `_id` (or `id`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSet {
    #[serde(rename = "_id", alias = "id")]
    pub entity_id: String,
    /// Empty when the entity has no main image
    #[serde(rename = "mainImage", default, deserialize_with = "null_as_empty")]
    pub main_image_ref: String,
    #[serde(rename = "detailImages", default, deserialize_with = "null_as_default")]
    pub detail_image_refs: Vec<String>,
}

impl MediaSet {
    pub fn new(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            ..Self::default()
        }
    }

    pub fn with_main_image(mut self, image_ref: impl Into<String>) -> Self {
        self.main_image_ref = image_ref.into();
        self
    }

    pub fn with_detail_images<I, S>(mut self, refs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.detail_image_refs = refs.into_iter().map(Into::into).collect();
        self
    }

    pub fn has_main_image(&self) -> bool {
        !self.main_image_ref.is_empty()
    }

    pub fn contains_detail(&self, image_ref: &str) -> bool {
        self.detail_image_refs.iter().any(|r| r == image_ref)
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_default<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

// ============================================================================
// Local files
// ============================================================================

/// A file the operator selected for upload.
#[derive(Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl LocalFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Bytes) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Read a file picked on the local machine.
    ///
    /// Files larger than `max_size_bytes` are rejected from their metadata
    /// without being read. The content type is derived from the file
    /// extension.
    pub async fn from_path(
        fs: &dyn FileSystemAccess,
        path: &Path,
        max_size_bytes: u64,
    ) -> Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let access_error = |source| MediaError::FileAccess {
            file_name: name.clone(),
            source,
        };

        let size = fs.metadata(path).await.map_err(access_error)?.size;
        if size > max_size_bytes {
            return Err(ValidationError::OversizedFile {
                file_name: name.clone(),
                size,
                limit: max_size_bytes,
            }
            .into());
        }

        let bytes = fs.read_file(path).await.map_err(access_error)?;
        let content_type = content_type_for(path);
        Ok(Self::new(name, content_type, bytes))
    }
}

impl fmt::Debug for LocalFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalFile")
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

fn content_type_for(path: &Path) -> &'static str {
    ImageFormat::from_path(path)
        .map(|format| format.to_mime_type())
        .unwrap_or("application/octet-stream")
}

// ============================================================================
// Staged additions and previews
// ============================================================================

/// Handle to a locally generated preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PreviewRef(Uuid);

impl PreviewRef {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PreviewRef {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PreviewRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A rendered thumbnail, ready to display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Preview {
    /// `data:image/png;base64,...`
    pub data_uri: String,
    pub width: u32,
    pub height: u32,
}

/// A file waiting to be uploaded on the next commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagedAddition {
    /// Replaces the entity's main image
    MainImage { file: LocalFile, preview: PreviewRef },
    /// Appended to the entity's detail images
    DetailImage { file: LocalFile, preview: PreviewRef },
}

impl StagedAddition {
    pub fn file(&self) -> &LocalFile {
        match self {
            StagedAddition::MainImage { file, .. } | StagedAddition::DetailImage { file, .. } => {
                file
            }
        }
    }

    pub fn preview_ref(&self) -> PreviewRef {
        match self {
            StagedAddition::MainImage { preview, .. }
            | StagedAddition::DetailImage { preview, .. } => *preview,
        }
    }

    pub fn is_main(&self) -> bool {
        matches!(self, StagedAddition::MainImage { .. })
    }
}

/// Work item for the preview generator, returned by staging operations.
#[derive(Debug, Clone)]
pub struct PreviewRequest {
    pub preview: PreviewRef,
    pub file: LocalFile,
}

/// Files sent in one upload call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadBatch {
    pub main_image: Option<LocalFile>,
    pub detail_images: Vec<LocalFile>,
}

impl UploadBatch {
    pub fn is_empty(&self) -> bool {
        self.main_image.is_none() && self.detail_images.is_empty()
    }

    pub fn len(&self) -> usize {
        usize::from(self.main_image.is_some()) + self.detail_images.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_paths() {
        assert_eq!(EntityRef::product("42").path(), "products/42");
        assert_eq!(EntityRef::spare_part("b7").path(), "spare-parts/b7");
        assert_eq!(
            "spare-parts".parse::<ResourceKind>().unwrap(),
            ResourceKind::SpareParts
        );
        assert!("vehicles".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn test_media_set_from_api_json() {
        let json = r#"{
            "_id": "65f0c",
            "name": "Brake caliper",
            "mainImage": "uploads/main.jpg",
            "detailImages": ["uploads/a.jpg", "uploads/b.jpg"]
        }"#;
        let set: MediaSet = serde_json::from_str(json).unwrap();
        assert_eq!(set.entity_id, "65f0c");
        assert_eq!(set.main_image_ref, "uploads/main.jpg");
        assert_eq!(set.detail_image_refs.len(), 2);
        assert!(set.contains_detail("uploads/b.jpg"));

        let sparse: MediaSet =
            serde_json::from_str(r#"{"id": "9", "mainImage": null, "detailImages": null}"#)
                .unwrap();
        assert_eq!(sparse.entity_id, "9");
        assert!(!sparse.has_main_image());
        assert!(sparse.detail_image_refs.is_empty());
    }

    #[test]
    fn test_local_file_debug_omits_bytes() {
        let file = LocalFile::new("a.png", "image/png", Bytes::from(vec![7u8; 1024]));
        assert_eq!(file.size(), 1024);
        let debug = format!("{:?}", file);
        assert!(debug.contains("size: 1024"));
        assert!(!debug.contains("7, 7"));
    }

    #[test]
    fn test_content_type_from_extension() {
        assert_eq!(content_type_for(Path::new("x/rotor.JPG")), "image/jpeg");
        assert_eq!(content_type_for(Path::new("pad.webp")), "image/webp");
        assert_eq!(content_type_for(Path::new("caliper.png")), "image/png");
        assert_eq!(
            content_type_for(Path::new("notes")),
            "application/octet-stream"
        );
    }

    /// Filesystem holding one file that must never be read.
    struct Unreadable {
        size: u64,
    }

    #[async_trait::async_trait]
    impl FileSystemAccess for Unreadable {
        async fn exists(&self, _path: &Path) -> bridge_traits::error::Result<bool> {
            Ok(true)
        }

        async fn metadata(
            &self,
            _path: &Path,
        ) -> bridge_traits::error::Result<bridge_traits::storage::FileMetadata> {
            Ok(bridge_traits::storage::FileMetadata {
                size: self.size,
                modified_at: None,
                is_directory: false,
            })
        }

        async fn read_file(&self, _path: &Path) -> bridge_traits::error::Result<Bytes> {
            panic!("oversized file was read");
        }
    }

    #[tokio::test]
    async fn test_oversized_file_rejected_before_read() {
        let fs = Unreadable { size: 4_000_000 };
        let err = LocalFile::from_path(&fs, Path::new("/picked/huge.png"), 512_000)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MediaError::Validation(ValidationError::OversizedFile {
                ref file_name,
                size: 4_000_000,
                limit: 512_000,
            }) if file_name == "huge.png"
        ));
    }

    #[test]
    fn test_staged_addition_accessors() {
        let file = LocalFile::new("a.png", "image/png", Bytes::from_static(b"x"));
        let preview = PreviewRef::new();
        let addition = StagedAddition::MainImage {
            file: file.clone(),
            preview,
        };
        assert!(addition.is_main());
        assert_eq!(addition.preview_ref(), preview);
        assert_eq!(addition.file(), &file);
    }

    #[test]
    fn test_upload_batch_len() {
        let file = LocalFile::new("a.png", "image/png", Bytes::from_static(b"x"));
        let batch = UploadBatch {
            main_image: Some(file.clone()),
            detail_images: vec![file.clone(), file],
        };
        assert_eq!(batch.len(), 3);
        assert!(UploadBatch::default().is_empty());
    }
}
