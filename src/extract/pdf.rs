use crate::error::AppError;

/// Extract text from PDF bytes, one block per page in page order.
pub fn extract_pdf(bytes: &[u8]) -> Result<String, AppError> {
    let doc = lopdf::Document::load_mem(bytes)
        .map_err(|e| AppError::extraction_with("Failed to parse PDF", e.to_string()))?;

    // BTreeMap keys, already in page order
    let pages: Vec<u32> = doc.get_pages().keys().copied().collect();

    let mut texts = Vec::with_capacity(pages.len());
    for page_num in &pages {
        let page_text = doc.extract_text(&[*page_num]).map_err(|e| {
            AppError::extraction_with(
                format!("Failed to read text of page {}", page_num),
                e.to_string(),
            )
        })?;
        texts.push(page_text.trim_end_matches('\n').to_string());
    }

    tracing::debug!(pages = pages.len(), "extracted PDF text");
    Ok(texts.join("\n"))
}
