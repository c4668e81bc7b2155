//! Text chunking for the endpoint's message size limit.

/// Maximum characters per outbound text message.
pub const MAX_TEXT_CHUNK_CHARS: usize = 3500;

/// Splits text into order-preserving chunks of at most
/// [`MAX_TEXT_CHUNK_CHARS`] characters.
///
/// Splitting is by character count, never mid-codepoint. Each chunk is sent
/// as an independent message, so the sequence is not atomic as a unit.
pub fn chunk_text(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut count = 0;

    for ch in text.chars() {
        if count == MAX_TEXT_CHUNK_CHARS {
            chunks.push(std::mem::take(&mut current));
            count = 0;
        }
        current.push(ch);
        count += 1;
    }
    chunks.push(current);
    chunks
}
