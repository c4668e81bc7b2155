//! Caption building for shipped snapshots.
//!
//! The caption summarizes the installation, file, and added-line count, and
//! quotes the most recent error-looking lines. It always fits the endpoint's
//! caption limit; when space runs out, older error lines are dropped first so
//! the newest ones survive.

use chrono::Utc;
use logship_delivery::MAX_CAPTION_CHARS;

/// Most error lines ever quoted in a caption.
const MAX_ERROR_LINES: usize = 5;

/// Whether a line looks like an error report.
fn is_error_line(line: &str) -> bool {
    let lower = line.to_lowercase();
    lower.contains("error") || lower.contains("fatal") || lower.contains("panic")
}

/// Builds a snapshot caption of at most [`MAX_CAPTION_CHARS`] characters.
pub fn build_caption(install_id: &str, file_name: &str, added_count: u64, added: &[String]) -> String {
    let header = format!(
        "{install_id} | {file_name} | {} UTC | +{added_count} lines",
        Utc::now().format("%Y-%m-%d %H:%M:%S"),
    );

    let mut errors: Vec<&str> = added
        .iter()
        .map(String::as_str)
        .filter(|l| is_error_line(l))
        .collect();
    if errors.len() > MAX_ERROR_LINES {
        errors.drain(..errors.len() - MAX_ERROR_LINES);
    }

    // Drop the oldest quoted lines until the caption fits.
    loop {
        let caption = if errors.is_empty() {
            header.clone()
        } else {
            format!("{header}\n{}", errors.join("\n"))
        };
        if caption.chars().count() <= MAX_CAPTION_CHARS {
            return caption;
        }
        if errors.is_empty() {
            return caption.chars().take(MAX_CAPTION_CHARS).collect();
        }
        errors.remove(0);
    }
}
