//! Hover for `$NAME` references to variables of the configured environment overlay.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
#[allow(clippy::wildcard_imports)]
use tower_lsp::lsp_types::*;

use crate::utils::{char_to_utf16, utf16_to_char};

static IDENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("Hover: regex failure"));

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Finds the `$NAME` reference around `character` (UTF-16) on `line`, returning
/// the name and its character range including the sigil.
pub fn reference_at(line: &str, character: u32) -> Option<(String, u32, u32)> {
    let chars: Vec<char> = line.chars().collect();
    let cursor = utf16_to_char(line, character).min(chars.len());

    let sigil = chars[..cursor].iter().rposition(|&c| c == '$')?;
    let mut end = cursor;
    while end < chars.len() && is_ident_char(chars[end]) {
        end += 1;
    }

    let name: String = chars[sigil + 1..end].iter().collect();
    if !IDENT_RE.is_match(&name) {
        return None;
    }
    Some((name, sigil as u32, end as u32))
}

/// Builds the hover for the reference under `position`, if it names a known variable.
pub fn env_hover(text: &str, position: Position, env: &BTreeMap<String, String>) -> Option<Hover> {
    let line = text.lines().nth(position.line as usize)?;
    let (name, start, end) = reference_at(line, position.character)?;
    let value = env.get(&name)?;

    Some(Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value: format!("`${name}` = `{value}`"),
        }),
        range: Some(Range::new(
            Position::new(position.line, char_to_utf16(line, start as usize)),
            Position::new(position.line, char_to_utf16(line, end as usize)),
        )),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("TARGET".to_string(), "luajit".to_string()),
            ("DEBUG_MODE".to_string(), "true".to_string()),
        ])
    }

    fn hover_text(hover: Hover) -> String {
        match hover.contents {
            HoverContents::Markup(markup) => markup.value,
            other => panic!("unexpected hover contents: {other:?}"),
        }
    }

    #[test]
    fn resolves_known_variable_anywhere_in_reference() {
        let text = "local t = $TARGET\nprint(t)";
        for character in [11, 14, 17] {
            let hover = env_hover(text, Position::new(0, character), &env()).expect("hover");
            assert_eq!(
                hover.range,
                Some(Range::new(Position::new(0, 10), Position::new(0, 17)))
            );
            assert_eq!(hover_text(hover), "`$TARGET` = `luajit`");
        }
    }

    #[test]
    fn unknown_or_broken_references_have_no_hover() {
        assert!(env_hover("x = $NOPE", Position::new(0, 6), &env()).is_none());
        assert!(env_hover("x = $TARGET + y", Position::new(0, 14), &env()).is_none());
        assert!(env_hover("x = TARGET", Position::new(0, 6), &env()).is_none());
        assert!(env_hover("x = $1ABC", Position::new(0, 6), &env()).is_none());
        assert!(env_hover("x", Position::new(4, 0), &env()).is_none());
    }

    #[test]
    fn utf16_columns_are_respected() {
        let line = "s = \"😀\" .. $DEBUG_MODE";
        let (name, start, end) = reference_at(line, 14).expect("reference");
        assert_eq!(name, "DEBUG_MODE");
        assert_eq!((start, end), (11, 22));
    }
}
