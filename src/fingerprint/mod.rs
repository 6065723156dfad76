//! Stable content identifiers for pages, elements, and actions.
//!
//! Pure and infallible: the same logical input always produces the same
//! SHA-256 hex digest. Pages are deliberately coarsened by stripping the
//! query string and fragment so parameterized variants of one view collapse
//! to a single fingerprint.

use crate::action::Action;
use sha2::{Digest, Sha256};
use url::Url;

pub fn page_fingerprint(url: &str, title: &str) -> String {
    let base = strip_query(url);
    let mut hasher = Sha256::new();
    hasher.update(base.as_bytes());
    hasher.update(b"_");
    hasher.update(title.as_bytes());
    to_hex(&hasher.finalize())
}

pub fn element_fingerprint(selector: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(selector.as_bytes());
    hasher.update(b"_");
    hasher.update(text.as_bytes());
    to_hex(&hasher.finalize())
}

/// Only kind, selector, and url participate; `reasoning` and any other
/// metadata never do.
pub fn action_fingerprint(action: &Action) -> String {
    let mut hasher = Sha256::new();
    hasher.update(action.kind.tag().as_bytes());
    hasher.update([0]);
    hasher.update(action.selector().unwrap_or("").as_bytes());
    hasher.update([0]);
    hasher.update(action.url().unwrap_or("").as_bytes());
    to_hex(&hasher.finalize())
}

fn strip_query(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_query(None);
            parsed.set_fragment(None);
            parsed.into()
        }
        // Relative or otherwise unparseable URLs still dedup on the part
        // before the query string.
        Err(_) => url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    }
}

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    const HEX: &[u8; 16] = b"0123456789abcdef";
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}
