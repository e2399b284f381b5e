//! Join-key normalization for free-text ad and segmentation names.
//!
//! The spend CSV and the lead store name the same ad independently, with
//! inconsistent casing, accents, template artifacts and trailing media file
//! names. Two names refer to the same entity iff their normalized keys are
//! equal (unless a platform ad-id says otherwise, which the reconciliation
//! engine checks first). Normalization is pure and idempotent.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Sentinel for names that clean up to nothing. Never an empty string:
/// empty display names would collide as a false join match downstream.
pub const NO_NAME: &str = "[Sin nombre]";

const MEDIA_EXTENSIONS: &[&str] = &[".mp4", ".mov", ".jpg", ".jpeg", ".png", ".gif", ".webm"];

/// Strip template-placeholder wrappers and editor artifacts from a raw name,
/// keeping it human-readable. Empty, `"-"` and `"undefined"` results become
/// the [`NO_NAME`] sentinel.
pub fn clean_display_name(raw: &str) -> String {
    let mut name = raw.trim_start_matches('\u{FEFF}').trim();

    // Leading {{...}} tokens left behind by ad tooling templates.
    while let Some(rest) = name.strip_prefix("{{") {
        match rest.find("}}") {
            Some(end) => name = rest[end + 2..].trim_start(),
            None => break,
        }
    }

    // Creative names sometimes carry the uploaded media file name.
    loop {
        let stripped = strip_media_extension(name);
        if stripped.len() == name.len() {
            break;
        }
        name = stripped.trim_end();
    }

    let name: String = name.chars().filter(|c| !matches!(c, '{' | '}' | '=')).collect();
    let name = name.trim();

    if name.is_empty() || name == "-" || name.eq_ignore_ascii_case("undefined") {
        NO_NAME.to_string()
    } else {
        name.to_string()
    }
}

fn strip_media_extension(name: &str) -> &str {
    for ext in MEDIA_EXTENSIONS {
        if name.len() > ext.len() && name.is_char_boundary(name.len() - ext.len()) {
            let (head, tail) = name.split_at(name.len() - ext.len());
            if tail.eq_ignore_ascii_case(ext) {
                return head;
            }
        }
    }
    name
}

/// Canonical join key: cleaned, lowercased, accents stripped (NFD plus
/// combining-mark removal), restricted to `[a-z0-9 _-]`, whitespace
/// collapsed. Returns an empty string only for no-name input; callers must
/// treat an empty key as unmatchable and never join on it.
pub fn normalize(raw: &str) -> String {
    let cleaned = clean_display_name(raw);
    if cleaned == NO_NAME {
        return String::new();
    }

    let mut key = String::with_capacity(cleaned.len());
    let mut pending_space = false;
    for c in cleaned.nfd().filter(|c| !is_combining_mark(*c)) {
        for lc in c.to_lowercase() {
            match lc {
                'a'..='z' | '0'..='9' | '_' | '-' => {
                    if pending_space && !key.is_empty() {
                        key.push(' ');
                    }
                    pending_space = false;
                    key.push(lc);
                }
                w if w.is_whitespace() => pending_space = true,
                _ => {}
            }
        }
    }

    // A second cleaning pass would blank these; map them to unmatchable now
    // so normalize stays idempotent.
    if key == "-" || key == "undefined" {
        return String::new();
    }
    key
}
