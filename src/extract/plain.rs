use crate::error::AppError;

/// Decode an uploaded `.txt` file. Invalid UTF-8 is an error, never replaced.
pub fn extract_plain(bytes: Vec<u8>) -> Result<String, AppError> {
    String::from_utf8(bytes).map_err(|e| AppError::extraction_with("File is not valid UTF-8", e))
}
