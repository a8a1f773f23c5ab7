//! Resolves the extent of a diagnostic from the single position the compiler reports.
//!
//! The span covers one "token": from the reported column up to the first
//! whitespace character, or to the end of the line when there is none.
//! The compiler counts columns in characters; published positions are UTF-16.

use tower_lsp::lsp_types::{Position, Range};

use crate::documents::DocumentTextCache;
use crate::error::TextSourceError;
use crate::utils::char_to_utf16;
use url::Url;

/// Returns the end character for a span starting at `start_character`, given the
/// text of the line from `start_character` onward.
pub fn resolve_end(remainder: &str, start_character: u32) -> u32 {
    let width = remainder
        .chars()
        .position(char::is_whitespace)
        .unwrap_or_else(|| remainder.chars().count());
    start_character.saturating_add(width as u32)
}

/// UTF-16 column of character `index`; columns past the end count one unit each.
fn utf16_column(line: &str, index: u32) -> u32 {
    let len = line.chars().count() as u32;
    char_to_utf16(line, index as usize) + index.saturating_sub(len)
}

/// Builds the full single-line range for an error anchored at `(line, start_character)`.
pub async fn resolve_range(
    cache: &mut DocumentTextCache<'_>,
    uri: &Url,
    line: u32,
    start_character: u32,
) -> Result<Range, TextSourceError> {
    let text = cache.line_text(uri, line).await?;
    let remainder: String = text.chars().skip(start_character as usize).collect();
    let end = resolve_end(&remainder, start_character);
    Ok(Range::new(
        Position::new(line, utf16_column(&text, start_character)),
        Position::new(line, utf16_column(&text, end)),
    ))
}
