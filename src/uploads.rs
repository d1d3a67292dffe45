use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::{AppError, Result};

/// Allowed payment-proof image extensions
const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// Maximum file size (5 MB)
const MAX_FILE_SIZE: usize = 5 * 1024 * 1024;

/// Save an uploaded payment-proof image to the uploads directory.
/// Returns the relative path to the file (e.g., "uploads/abc123.jpg")
pub async fn save_payment_proof(uploads_dir: &str, filename: &str, data: &[u8]) -> Result<String> {
    if data.is_empty() {
        return Err(AppError::Validation("Empty file".to_string()));
    }
    if data.len() > MAX_FILE_SIZE {
        return Err(AppError::Validation(
            "File too large (max 5 MB)".to_string(),
        ));
    }

    let extension = filename
        .rsplit('.')
        .next()
        .map(|s| s.to_lowercase())
        .ok_or_else(|| AppError::Validation("Invalid filename".to_string()))?;

    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(AppError::Validation(format!(
            "Invalid file type. Allowed: {}",
            ALLOWED_EXTENSIONS.join(", ")
        )));
    }

    let uploads_path = PathBuf::from(uploads_dir);
    fs::create_dir_all(&uploads_path)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to create uploads directory: {}", e)))?;

    let new_filename = format!("{}.{}", Uuid::new_v4(), extension);
    let file_path = uploads_path.join(&new_filename);

    let mut file = fs::File::create(&file_path)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to create file: {}", e)))?;

    file.write_all(data)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to write file: {}", e)))?;

    Ok(format!("uploads/{}", new_filename))
}
