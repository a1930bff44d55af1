//! crates/patrol_core/src/records.rs
//!
//! Record retrieval on top of the `PatrolApi` port.

use tracing::debug;

use crate::domain::{FilterOptions, PatrolRecord, RecordQuery, MAX_PAGE_LIMIT};
use crate::ports::{PatrolApi, PortError, PortResult};

/// Image payloads shorter than this are treated as broken.
pub const MIN_IMAGE_BYTES: usize = 100;

/// Loads every record matching `filter`, walking pages of the maximum size.
pub async fn fetch_all(
    api: &dyn PatrolApi,
    filter: &FilterOptions,
) -> PortResult<Vec<PatrolRecord>> {
    let mut records = Vec::new();
    let mut page = 1;
    loop {
        let query = RecordQuery::new(page, MAX_PAGE_LIMIT, filter.clone());
        let response = api.list_records(&query).await?;
        debug!(
            page,
            fetched = response.records.len(),
            total_pages = response.total_pages,
            "Fetched record page"
        );
        records.extend(response.records);

        if page >= response.total_pages.max(1) {
            break;
        }
        page += 1;
    }
    Ok(records)
}

/// Fetches a record image, rejecting payloads too small to be an image.
pub async fn fetch_image(api: &dyn PatrolApi, image_id: &str) -> PortResult<Vec<u8>> {
    if image_id.trim().is_empty() {
        return Err(PortError::NotFound("record has no image".to_string()));
    }
    let bytes = api.fetch_image(image_id).await?;
    if bytes.len() < MIN_IMAGE_BYTES {
        return Err(PortError::Unexpected(format!(
            "image {} is only {} bytes",
            image_id,
            bytes.len()
        )));
    }
    Ok(bytes)
}
