//! Size and count policy for staged images

use core_runtime::config::MediaConfig;

use crate::error::ValidationError;
use crate::types::LocalFile;

/// Limits every staging mutation is checked against.
///
/// Pure value type; checks have no side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationPolicy {
    pub max_detail_images: usize,
    pub max_file_size_bytes: u64,
}

impl ValidationPolicy {
    pub const DEFAULT: ValidationPolicy = ValidationPolicy {
        max_detail_images: 5,
        max_file_size_bytes: 512_000,
    };

    pub fn new(max_detail_images: usize, max_file_size_bytes: u64) -> Self {
        Self {
            max_detail_images,
            max_file_size_bytes,
        }
    }

    pub fn validate_main_image(&self, file: &LocalFile) -> Result<(), ValidationError> {
        self.check_size(file)
    }

    /// Check a batch of detail files about to be staged.
    ///
    /// `current_staged_count` is the number of staged detail additions that
    /// survive the mutation, `active_count` the baseline refs not staged for
    /// removal. Oversized files are reported before the count.
    pub fn validate_detail_batch(
        &self,
        files: &[LocalFile],
        current_staged_count: usize,
        active_count: usize,
    ) -> Result<(), ValidationError> {
        for file in files {
            self.check_size(file)?;
        }
        self.validate_effective_count(active_count + current_staged_count + files.len())
    }

    pub fn validate_effective_count(&self, count: usize) -> Result<(), ValidationError> {
        if count > self.max_detail_images {
            return Err(ValidationError::TooManyImages {
                requested: count,
                limit: self.max_detail_images,
            });
        }
        Ok(())
    }

    fn check_size(&self, file: &LocalFile) -> Result<(), ValidationError> {
        if file.size() > self.max_file_size_bytes {
            return Err(ValidationError::OversizedFile {
                file_name: file.name.clone(),
                size: file.size(),
                limit: self.max_file_size_bytes,
            });
        }
        Ok(())
    }
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<&MediaConfig> for ValidationPolicy {
    fn from(config: &MediaConfig) -> Self {
        Self::new(config.max_detail_images, config.max_file_size_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn file_of(size: usize) -> LocalFile {
        LocalFile::new("img.jpg", "image/jpeg", Bytes::from(vec![0u8; size]))
    }

    #[test]
    fn test_size_limit_is_inclusive() {
        let policy = ValidationPolicy::DEFAULT;
        assert!(policy.validate_main_image(&file_of(512_000)).is_ok());
        assert_eq!(
            policy.validate_main_image(&file_of(512_001)),
            Err(ValidationError::OversizedFile {
                file_name: "img.jpg".to_string(),
                size: 512_001,
                limit: 512_000,
            })
        );
    }

    #[test]
    fn test_batch_count() {
        let policy = ValidationPolicy::DEFAULT;
        let two = vec![file_of(10), file_of(10)];
        let three = vec![file_of(10), file_of(10), file_of(10)];

        assert!(policy.validate_detail_batch(&two, 0, 3).is_ok());
        assert_eq!(
            policy.validate_detail_batch(&three, 0, 3),
            Err(ValidationError::TooManyImages {
                requested: 6,
                limit: 5
            })
        );
        assert!(policy.validate_detail_batch(&two, 1, 3).is_err());
    }

    #[test]
    fn test_oversized_reported_before_count() {
        let policy = ValidationPolicy::new(1, 100);
        let files = vec![file_of(10), file_of(101)];
        assert!(matches!(
            policy.validate_detail_batch(&files, 0, 0),
            Err(ValidationError::OversizedFile { size: 101, .. })
        ));
    }

    #[test]
    fn test_from_media_config() {
        let config = MediaConfig::default()
            .with_max_detail_images(8)
            .with_max_file_size_bytes(1_000_000);
        let policy = ValidationPolicy::from(&config);
        assert_eq!(policy.max_detail_images, 8);
        assert_eq!(policy.max_file_size_bytes, 1_000_000);
        assert_eq!(ValidationPolicy::default(), ValidationPolicy::DEFAULT);
    }
}
