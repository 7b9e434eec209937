use crate::{
    entities::{hotel_picture, Hotel, HotelPicture},
    errors::{FieldErrors, ServiceError},
    storage::{file_extension, sanitize_filename, FileStorage},
};
use bytes::Bytes;
use chrono::Utc;
use image::ImageFormat;
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

pub const MAX_PICTURES_PER_BATCH: usize = 10;
pub const ALLOWED_EXTENSIONS: [&str; 4] = ["jpeg", "png", "jpg", "webp"];

/// Directory (relative to the storage root) holding hotel pictures.
const PICTURE_DIR: &str = "hotels";
const SINGLE_FIELD: &str = "picture";
const BATCH_FIELD: &str = "pictures";

/// An uploaded file as received from a multipart request.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub original_name: String,
    pub bytes: Bytes,
}

impl UploadedFile {
    pub fn new(original_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            original_name: original_name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Why a file is not an acceptable picture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageRejection {
    Empty,
    NotAnImage,
    UnsupportedType,
    TooLarge,
}

/// Checks content, extension and size of an uploaded picture.
///
/// The content is sniffed rather than trusting the client's content type.
pub fn check_image(file: &UploadedFile, max_bytes: u64) -> Result<ImageFormat, ImageRejection> {
    if file.bytes.is_empty() {
        return Err(ImageRejection::Empty);
    }

    let format = match image::guess_format(&file.bytes) {
        Ok(format @ (ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::WebP)) => format,
        Ok(_) => return Err(ImageRejection::UnsupportedType),
        Err(_) => return Err(ImageRejection::NotAnImage),
    };

    let extension_ok = file_extension(&file.original_name)
        .map(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false);
    if !extension_ok {
        return Err(ImageRejection::UnsupportedType);
    }

    if file.size() > max_bytes {
        return Err(ImageRejection::TooLarge);
    }

    Ok(format)
}

fn describe_size_limit(max_bytes: u64) -> String {
    let kb = max_bytes / 1024;
    if kb % 1024 == 0 {
        format!("{}MB", kb / 1024)
    } else {
        format!("{}KB", kb)
    }
}

/// A file from a batch that could not be stored.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FailedUpload {
    pub file: String,
    pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub uploaded: Vec<hotel_picture::Model>,
    pub failed: Vec<FailedUpload>,
}

impl BatchOutcome {
    pub fn message(&self) -> String {
        let mut message = format!("{} picture(s) uploaded successfully", self.uploaded.len());
        if !self.failed.is_empty() {
            message.push_str(&format!(", {} failed", self.failed.len()));
        }
        message
    }
}

/// First of `count` positions following `current_max` (an empty gallery starts
/// at 1), or `None` when the last one would not fit in an `i32`.
fn append_positions(current_max: Option<i32>, count: usize) -> Option<i32> {
    let base = current_max.unwrap_or(0).checked_add(1)?;
    let extra = i32::try_from(count.saturating_sub(1)).ok()?;
    base.checked_add(extra).map(|_| base)
}

/// Builds the stored path for an upload; `index` is set for batch uploads.
fn picture_path(original_name: &str, index: Option<usize>) -> String {
    let token = Uuid::new_v4().simple().to_string();
    let token = &token[..8];
    let timestamp = Utc::now().timestamp();
    let name = sanitize_filename(original_name);
    match index {
        Some(index) => format!("{PICTURE_DIR}/{timestamp}_{index}_{token}_{name}"),
        None => format!("{PICTURE_DIR}/{timestamp}_{token}_{name}"),
    }
}

/// Gallery management: uploads, ordering and removal of hotel pictures
#[derive(Clone)]
pub struct PictureService {
    db: Arc<DatabaseConnection>,
    storage: Arc<dyn FileStorage>,
    max_upload_bytes: u64,
}

impl PictureService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        storage: Arc<dyn FileStorage>,
        max_upload_bytes: u64,
    ) -> Self {
        Self {
            db,
            storage,
            max_upload_bytes,
        }
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    async fn ensure_hotel(&self, hotel_id: i32) -> Result<(), ServiceError> {
        Hotel::find_by_id(hotel_id)
            .one(&*self.db)
            .await?
            .map(|_| ())
            .ok_or_else(|| ServiceError::not_found("Hotel", hotel_id))
    }

    /// Resolves a picture that must belong to `hotel_id`.
    #[instrument(skip(self))]
    pub async fn find_owned(
        &self,
        hotel_id: i32,
        picture_id: i32,
    ) -> Result<hotel_picture::Model, ServiceError> {
        self.ensure_hotel(hotel_id).await?;
        HotelPicture::find_by_id(picture_id)
            .filter(hotel_picture::Column::HotelId.eq(hotel_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Picture", picture_id))
    }

    /// First of `count` consecutive positions after the end of the gallery
    /// (highest existing position + 1, or 1 for an empty gallery).
    ///
    /// Fails with a validation error keyed `field` when the run would pass `i32::MAX`.
    async fn reserve_positions(
        &self,
        hotel_id: i32,
        count: usize,
        field: &str,
    ) -> Result<i32, ServiceError> {
        let max: Option<Option<i32>> = HotelPicture::find()
            .select_only()
            .column_as(hotel_picture::Column::Position.max(), "max_position")
            .filter(hotel_picture::Column::HotelId.eq(hotel_id))
            .into_tuple()
            .one(&*self.db)
            .await?;

        append_positions(max.flatten(), count).ok_or_else(|| {
            ServiceError::invalid_field(
                field,
                "The gallery has no free position left. Move pictures to lower positions first.",
            )
        })
    }

    fn validate_single(&self, file: Option<&UploadedFile>) -> Result<(), ServiceError> {
        let Some(file) = file else {
            return Err(ServiceError::invalid_field(
                SINGLE_FIELD,
                "The picture field is required.",
            ));
        };

        check_image(file, self.max_upload_bytes)
            .map(|_| ())
            .map_err(|rejection| {
                let message = match rejection {
                    ImageRejection::Empty => "The picture field is required.".to_string(),
                    ImageRejection::NotAnImage => "The picture field must be an image.".to_string(),
                    ImageRejection::UnsupportedType => {
                        "The picture field must be a file of type: jpeg, png, jpg, webp."
                            .to_string()
                    }
                    ImageRejection::TooLarge => format!(
                        "The picture field must not be greater than {} kilobytes.",
                        self.max_upload_bytes / 1024
                    ),
                };
                ServiceError::invalid_field(SINGLE_FIELD, message)
            })
    }

    /// Validates the whole batch before anything is stored.
    pub fn validate_batch(&self, files: &[UploadedFile]) -> Result<(), ServiceError> {
        if files.is_empty() {
            return Err(ServiceError::invalid_field(
                BATCH_FIELD,
                "At least one picture is required.",
            ));
        }
        if files.len() > MAX_PICTURES_PER_BATCH {
            return Err(ServiceError::invalid_field(
                BATCH_FIELD,
                format!("Maximum {MAX_PICTURES_PER_BATCH} pictures allowed."),
            ));
        }

        let mut errors = FieldErrors::new();
        for (index, file) in files.iter().enumerate() {
            if let Err(rejection) = check_image(file, self.max_upload_bytes) {
                let message = match rejection {
                    ImageRejection::Empty => "Each picture is required.".to_string(),
                    ImageRejection::NotAnImage => "Each file must be an image.".to_string(),
                    ImageRejection::UnsupportedType => {
                        "Each image must be a jpeg, png, jpg, or webp file.".to_string()
                    }
                    ImageRejection::TooLarge => format!(
                        "Each image must not exceed {}.",
                        describe_size_limit(self.max_upload_bytes)
                    ),
                };
                errors.insert(format!("pictures.{index}"), vec![message]);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ServiceError::ValidationError(errors))
        }
    }

    /// Writes the file, then the record. A failed insert removes the file again.
    async fn store_picture(
        &self,
        hotel_id: i32,
        filepath: String,
        file: &UploadedFile,
        position: i32,
    ) -> Result<hotel_picture::Model, ServiceError> {
        self.storage.put(&filepath, file.bytes.clone()).await?;

        let picture = hotel_picture::ActiveModel {
            hotel_id: Set(hotel_id),
            filepath: Set(filepath.clone()),
            filesize: Set(file.size() as i64),
            position: Set(position),
            ..Default::default()
        };

        match picture.insert(&*self.db).await {
            Ok(picture) => Ok(picture),
            Err(err) => {
                if let Err(cleanup) = self.storage.delete(&filepath).await {
                    warn!(
                        filepath = %filepath,
                        error = %cleanup,
                        "Failed to remove orphaned picture file"
                    );
                }
                Err(err.into())
            }
        }
    }

    /// Stores a single picture at the end of the gallery.
    #[instrument(skip(self, file), fields(file = file.as_ref().map(|f| f.original_name.as_str())))]
    pub async fn upload_single(
        &self,
        hotel_id: i32,
        file: Option<UploadedFile>,
    ) -> Result<hotel_picture::Model, ServiceError> {
        self.ensure_hotel(hotel_id).await?;
        self.validate_single(file.as_ref())?;
        let Some(file) = file else {
            return Err(ServiceError::invalid_field(
                SINGLE_FIELD,
                "The picture field is required.",
            ));
        };

        let position = self.reserve_positions(hotel_id, 1, SINGLE_FIELD).await?;
        let filepath = picture_path(&file.original_name, None);
        let picture = self.store_picture(hotel_id, filepath, &file, position).await?;

        counter!("hotel_api.pictures.uploaded", 1);
        info!(
            "Uploaded picture {} for hotel {} at position {}",
            picture.id, hotel_id, position
        );
        Ok(picture)
    }

    /// Stores a validated batch sequentially. Failures of individual files are
    /// collected and never undo earlier successes.
    #[instrument(skip(self, files), fields(count = files.len()))]
    pub async fn upload_multiple(
        &self,
        hotel_id: i32,
        files: Vec<UploadedFile>,
    ) -> Result<BatchOutcome, ServiceError> {
        self.ensure_hotel(hotel_id).await?;
        self.validate_batch(&files)?;

        let base = self
            .reserve_positions(hotel_id, files.len(), BATCH_FIELD)
            .await?;
        let mut outcome = BatchOutcome::default();

        for (index, file) in files.iter().enumerate() {
            let filepath = picture_path(&file.original_name, Some(index));
            // In range: reserve_positions checked base + len - 1.
            let position = base + index as i32;
            match self.store_picture(hotel_id, filepath, file, position).await {
                Ok(picture) => outcome.uploaded.push(picture),
                Err(err) => {
                    warn!(
                        hotel_id,
                        file = %file.original_name,
                        error = %err,
                        "Failed to store picture from batch"
                    );
                    counter!("hotel_api.pictures.upload_failed", 1);
                    outcome.failed.push(FailedUpload {
                        file: file.original_name.clone(),
                        error: err.response_message(),
                    });
                }
            }
        }

        counter!("hotel_api.pictures.uploaded", outcome.uploaded.len() as u64);
        info!(
            "Batch upload for hotel {}: {} stored, {} failed",
            hotel_id,
            outcome.uploaded.len(),
            outcome.failed.len()
        );
        Ok(outcome)
    }

    /// Moves a picture to `position`. Siblings are left untouched.
    #[instrument(skip(self))]
    pub async fn reposition(
        &self,
        hotel_id: i32,
        picture_id: i32,
        position: i32,
    ) -> Result<hotel_picture::Model, ServiceError> {
        let picture = self.find_owned(hotel_id, picture_id).await?;

        let mut active: hotel_picture::ActiveModel = picture.into();
        active.position = Set(position);
        let picture = active.update(&*self.db).await?;

        info!(
            "Moved picture {} of hotel {} to position {}",
            picture_id, hotel_id, position
        );
        Ok(picture)
    }

    /// Removes the stored file (a missing or undeletable file is only logged),
    /// then the record.
    #[instrument(skip(self))]
    pub async fn delete(&self, hotel_id: i32, picture_id: i32) -> Result<(), ServiceError> {
        let picture = self.find_owned(hotel_id, picture_id).await?;

        match self.storage.delete(&picture.filepath).await {
            Ok(true) => {}
            Ok(false) => debug!(filepath = %picture.filepath, "Picture file already gone"),
            Err(err) => warn!(
                filepath = %picture.filepath,
                error = %err,
                "Failed to remove picture file; deleting record anyway"
            ),
        }

        picture.delete(&*self.db).await?;

        counter!("hotel_api.pictures.deleted", 1);
        info!("Deleted picture {} of hotel {}", picture_id, hotel_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
    const JPEG: &[u8] = b"\xFF\xD8\xFF\xE0\0\x10JFIF\0";
    const WEBP: &[u8] = b"RIFF\x24\0\0\0WEBPVP8 ";
    const PDF: &[u8] = b"%PDF-1.4\n%\xE2\xE3\xCF\xD3";

    #[rstest]
    #[case("lobby.png", PNG, ImageFormat::Png)]
    #[case("pool.JPG", JPEG, ImageFormat::Jpeg)]
    #[case("suite.jpeg", JPEG, ImageFormat::Jpeg)]
    #[case("roof.webp", WEBP, ImageFormat::WebP)]
    fn accepts_supported_images(
        #[case] name: &str,
        #[case] bytes: &'static [u8],
        #[case] expected: ImageFormat,
    ) {
        let file = UploadedFile::new(name, bytes);
        assert_eq!(check_image(&file, 1024).unwrap(), expected);
    }

    #[test]
    fn rejects_non_images_even_with_image_extension() {
        let file = UploadedFile::new("brochure.png", PDF);
        assert_eq!(check_image(&file, 1024), Err(ImageRejection::NotAnImage));
    }

    #[test]
    fn rejects_other_image_formats() {
        let gif = UploadedFile::new("anim.gif", &b"GIF89a\x01\0\x01\0"[..]);
        assert_eq!(check_image(&gif, 1024), Err(ImageRejection::UnsupportedType));
    }

    #[test]
    fn rejects_images_with_wrong_extension() {
        let file = UploadedFile::new("lobby.gif", PNG);
        assert_eq!(check_image(&file, 1024), Err(ImageRejection::UnsupportedType));
    }

    #[test]
    fn rejects_empty_and_oversized_files() {
        assert_eq!(
            check_image(&UploadedFile::new("a.png", Bytes::new()), 1024),
            Err(ImageRejection::Empty)
        );
        assert_eq!(
            check_image(&UploadedFile::new("a.png", PNG), 4),
            Err(ImageRejection::TooLarge)
        );
    }

    #[test]
    fn stored_paths_live_under_the_picture_dir() {
        let single = picture_path("../My Pool.jpg", None);
        assert!(single.starts_with("hotels/"));
        assert!(single.ends_with("_My_Pool.jpg"));
        assert_eq!(single.matches('/').count(), 1);

        let batch = picture_path("room.png", Some(3));
        let name = batch.trim_start_matches("hotels/");
        let parts: Vec<&str> = name.splitn(4, '_').collect();
        assert_eq!(parts[1], "3");
        assert_eq!(parts[2].len(), 8);
        assert_eq!(parts[3], "room.png");
    }

    #[test]
    fn batch_message_mentions_failures_only_when_present() {
        let mut outcome = BatchOutcome::default();
        assert_eq!(outcome.message(), "0 picture(s) uploaded successfully");
        outcome.failed.push(FailedUpload {
            file: "a.png".into(),
            error: "File storage error.".into(),
        });
        assert_eq!(
            outcome.message(),
            "0 picture(s) uploaded successfully, 1 failed"
        );
    }

    #[rstest]
    #[case(None, 1, Some(1))]
    #[case(None, 3, Some(1))]
    #[case(Some(0), 1, Some(1))]
    #[case(Some(4), 3, Some(5))]
    #[case(Some(i32::MAX - 3), 3, Some(i32::MAX - 2))]
    #[case(Some(i32::MAX - 3), 4, None)]
    #[case(Some(i32::MAX), 1, None)]
    fn appended_positions_stay_within_i32(
        #[case] current_max: Option<i32>,
        #[case] count: usize,
        #[case] expected: Option<i32>,
    ) {
        assert_eq!(append_positions(current_max, count), expected);
    }

    #[test]
    fn size_limit_is_described_in_megabytes_when_whole() {
        assert_eq!(describe_size_limit(5120 * 1024), "5MB");
        assert_eq!(describe_size_limit(300 * 1024), "300KB");
    }

    #[test]
    fn unsupported_file_errors_are_keyed_by_index() {
        let db = Arc::new(sea_orm::DatabaseConnection::Disconnected);
        let storage = Arc::new(crate::storage::LocalFileStorage::new("/tmp", "http://x"));
        let service = PictureService::new(db, storage, 5120 * 1024);

        let files = vec![
            UploadedFile::new("a.png", PNG),
            UploadedFile::new("b.pdf", PDF),
        ];
        let err = service.validate_batch(&files).unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(fields) => {
            assert_eq!(
                fields["pictures.1"],
                vec!["Each file must be an image."]
            );
            assert!(!fields.contains_key("pictures.0"));
        });

        let too_many = vec![UploadedFile::new("a.png", PNG); 11];
        assert_matches!(
            service.validate_batch(&too_many),
            Err(ServiceError::ValidationError(fields)) if fields.contains_key("pictures")
        );
        assert_matches!(
            service.validate_batch(&[]),
            Err(ServiceError::ValidationError(fields)) if fields["pictures"] == vec!["At least one picture is required."]
        );
    }
}
