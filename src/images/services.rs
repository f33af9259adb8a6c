use anyhow::Context;
use bytes::Bytes;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{error::AppError, storage::ImageStore};

pub const IMAGE_FIELD: &str = "profile_image";

/// An uploaded file as received from the client.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub body: Bytes,
    pub content_type: Option<String>,
    pub file_name: Option<String>,
}

/// Validates the upload and writes it under `profiles/{user}/`. Returns the
/// storage key.
pub async fn store_profile_image(
    storage: &dyn ImageStore,
    user_id: Uuid,
    upload: ImageUpload,
) -> Result<String, AppError> {
    if upload.body.is_empty() {
        return Err(AppError::field(IMAGE_FIELD, "The submitted file is empty."));
    }
    let (mime, ext) = resolve_type(&upload).ok_or_else(|| {
        AppError::field(
            IMAGE_FIELD,
            "Upload a valid image. The file you uploaded was either not an image or a corrupted image.",
        )
    })?;

    let key = format!("profiles/{}/{}.{}", user_id, Uuid::new_v4(), ext);
    storage
        .put(&key, upload.body, mime)
        .await
        .with_context(|| format!("store image {}", key))?;
    debug!(%user_id, key = %key, "profile image stored");
    Ok(key)
}

/// Best-effort removal of an object nobody references anymore.
pub async fn discard(storage: &dyn ImageStore, key: &str) {
    if let Err(e) = storage.delete(key).await {
        warn!(error = %e, key = %key, "could not delete stale profile image");
    }
}

pub async fn presign(
    storage: &dyn ImageStore,
    key: &str,
    ttl_secs: u64,
) -> anyhow::Result<String> {
    storage
        .signed_url(key, ttl_secs)
        .await
        .with_context(|| format!("presign url for key {}", key))
}

fn resolve_type(upload: &ImageUpload) -> Option<(&'static str, &'static str)> {
    upload
        .content_type
        .as_deref()
        .and_then(image_type_from_mime)
        .or_else(|| upload.file_name.as_deref().and_then(image_type_from_file_name))
}

fn image_type_from_mime(ct: &str) -> Option<(&'static str, &'static str)> {
    match ct {
        "image/jpeg" | "image/jpg" => Some(("image/jpeg", "jpg")),
        "image/png" => Some(("image/png", "png")),
        "image/webp" => Some(("image/webp", "webp")),
        "image/heic" => Some(("image/heic", "heic")),
        "image/gif" => Some(("image/gif", "gif")),
        _ => None,
    }
}

fn image_type_from_file_name(name: &str) -> Option<(&'static str, &'static str)> {
    let (_, ext) = name.rsplit_once('.')?;
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => image_type_from_mime("image/jpeg"),
        "png" => image_type_from_mime("image/png"),
        "webp" => image_type_from_mime("image/webp"),
        "heic" => image_type_from_mime("image/heic"),
        "gif" => image_type_from_mime("image/gif"),
        _ => None,
    }
}

#[cfg(test)]
mod image_tests {
    use super::*;
    use crate::storage::MemoryImageStore;

    fn upload(ct: Option<&str>, name: Option<&str>) -> ImageUpload {
        ImageUpload {
            body: Bytes::from_static(b"\x89PNG fake"),
            content_type: ct.map(str::to_string),
            file_name: name.map(str::to_string),
        }
    }

    #[test]
    fn test_image_type_from_mime() {
        assert_eq!(image_type_from_mime("image/jpeg"), Some(("image/jpeg", "jpg")));
        assert_eq!(image_type_from_mime("image/jpg"), Some(("image/jpeg", "jpg")));
        assert_eq!(image_type_from_mime("image/png"), Some(("image/png", "png")));
        assert_eq!(image_type_from_mime("image/webp"), Some(("image/webp", "webp")));
        assert_eq!(image_type_from_mime("image/heic"), Some(("image/heic", "heic")));
        assert_eq!(image_type_from_mime("application/octet-stream"), None);
        assert_eq!(image_type_from_mime("whatever/else"), None);
    }

    #[test]
    fn octet_stream_falls_back_to_file_name() {
        let u = upload(Some("application/octet-stream"), Some("me.PNG"));
        assert_eq!(resolve_type(&u), Some(("image/png", "png")));
        assert_eq!(resolve_type(&upload(None, Some("notes.txt"))), None);
        assert_eq!(resolve_type(&upload(None, None)), None);
    }

    #[tokio::test]
    async fn store_writes_under_user_prefix() {
        let storage = MemoryImageStore::default();
        let user_id = Uuid::new_v4();
        let key = store_profile_image(&storage, user_id, upload(Some("image/png"), None))
            .await
            .unwrap();
        assert!(key.starts_with(&format!("profiles/{}/", user_id)));
        assert!(key.ends_with(".png"));
        let (_, ct) = storage.get(&key).await.unwrap();
        assert_eq!(ct, "image/png");
    }

    #[tokio::test]
    async fn store_rejects_non_images_and_empty_files() {
        let storage = MemoryImageStore::default();
        let err = store_profile_image(&storage, Uuid::new_v4(), upload(Some("text/plain"), None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(f) if f.contains(IMAGE_FIELD)));

        let empty = ImageUpload {
            body: Bytes::new(),
            content_type: Some("image/png".into()),
            file_name: None,
        };
        assert!(store_profile_image(&storage, Uuid::new_v4(), empty).await.is_err());
        assert!(storage.keys().await.is_empty());
    }

    #[tokio::test]
    async fn presign_and_discard() {
        let storage = MemoryImageStore::default();
        let key = store_profile_image(&storage, Uuid::new_v4(), upload(Some("image/jpeg"), None))
            .await
            .unwrap();
        let url = presign(&storage, &key, 1800).await.unwrap();
        assert!(url.contains(&key));

        discard(&storage, &key).await;
        assert!(storage.get(&key).await.is_none());
    }
}
