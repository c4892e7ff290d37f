//! Detection of deferred-value variable references
//!
//! A stored secret may reference variables that are only resolved at
//! runtime, either Unix style (`${NAME}`) or Windows style (`%%NAME%%`).
//! Such strings must not be encrypted as they are, because the real secret
//! is not known yet.

const UNIX_OPEN: &str = "${";
const UNIX_CLOSE: &str = "}";
const WINDOWS_OPEN: &str = "%%";
const WINDOWS_CLOSE: &str = "%%";

/// Returns true if `text` references at least one variable.
pub fn contains_unresolved_variables(text: &str) -> bool {
    !used_variables(text).is_empty()
}

/// Names of all variables referenced by `text`, without duplicates, Unix
/// style references first.
pub fn used_variables(text: &str) -> Vec<String> {
    let mut names = Vec::new();
    collect(text, UNIX_OPEN, UNIX_CLOSE, &mut names);
    collect(text, WINDOWS_OPEN, WINDOWS_CLOSE, &mut names);
    names
}

fn collect(text: &str, open: &str, close: &str, names: &mut Vec<String>) {
    let mut pos = 0;
    while pos < text.len() {
        if !text[pos..].starts_with(open) {
            pos += next_char_len(text, pos);
            continue;
        }

        let name_start = pos + open.len();
        // The closing token is searched one character past the opening
        // token, so "${}" on its own is not a reference.
        let search_from = name_start + next_char_len(text, name_start).max(1);
        match text.get(search_from..).and_then(|rest| rest.find(close)) {
            Some(offset) => {
                let name_end = search_from + offset;
                let name = &text[name_start..name_end];
                if !names.iter().any(|known| known == name) {
                    names.push(name.to_string());
                }
                pos = name_end + close.len();
            }
            None => pos += next_char_len(text, pos),
        }
    }
}

/// Byte length of the character at `pos`, 0 at the end of `text`
fn next_char_len(text: &str, pos: usize) -> usize {
    text[pos..].chars().next().map_or(0, char::len_utf8)
}
