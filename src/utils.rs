//! Utility functions for common operations.

use crate::error::ScraperError;
use rand::Rng;
use std::time::{SystemTime, UNIX_EPOCH};

/// Keeps only the ASCII digits of `text`.
///
/// Used as the fallback episode sort key, so "第12集" becomes "12" and
/// "Special" becomes "".
pub fn digits_only(text: &str) -> String {
    text.chars().filter(char::is_ascii_digit).collect()
}

/// Generates a session-unique identifier for a search result.
///
/// Millisecond timestamp plus 32 random bits. Collisions are improbable, not
/// impossible.
pub fn generate_result_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let salt: u32 = rand::rng().random();
    format!("{:x}-{:08x}", millis, salt)
}

/// Checks if an HTTP response is successful, and if not, returns a detailed error.
///
/// This helper extracts both the status code and response body for better error messages.
///
/// # Arguments
/// * `response` - The reqwest Response to check
///
/// # Returns
/// Ok(response) if successful, or Err(ScraperError) with details if not
pub async fn check_response_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, ScraperError> {
    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(ScraperError::RenderingService { status, body });
    }
    Ok(response)
}
