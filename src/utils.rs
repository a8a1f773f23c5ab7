use tower_lsp::Client;
use tower_lsp::lsp_types::MessageType;

pub fn spawn_log(client: Client, ty: MessageType, msg: String) {
    tokio::spawn(async move {
        client.log_message(ty, msg).await;
    });
}

/// Converts a UTF-16 column on `line` to a character index, clamped to the line length.
pub fn utf16_to_char(line: &str, character: u32) -> usize {
    let mut units = 0u32;
    for (idx, c) in line.chars().enumerate() {
        if units >= character {
            return idx;
        }
        units += c.len_utf16() as u32;
    }
    line.chars().count()
}

/// Converts a character index on `line` to a UTF-16 column.
pub fn char_to_utf16(line: &str, index: usize) -> u32 {
    line.chars().take(index).map(|c| c.len_utf16() as u32).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf16_conversions() {
        let line = "a😀b";
        assert_eq!(utf16_to_char(line, 0), 0);
        assert_eq!(utf16_to_char(line, 1), 1);
        assert_eq!(utf16_to_char(line, 3), 2);
        assert_eq!(utf16_to_char(line, 99), 3);
        assert_eq!(char_to_utf16(line, 2), 3);
        assert_eq!(char_to_utf16(line, 3), 4);
    }
}
