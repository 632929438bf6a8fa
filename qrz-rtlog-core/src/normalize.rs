//! Turns a raw WSJT-X logged-ADIF payload into a single-line upload record.

use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

fn end_of_header() -> &'static Regex {
    static EOH: OnceLock<Regex> = OnceLock::new();
    EOH.get_or_init(|| Regex::new(r"(?i)<EOH>").expect("end-of-header pattern is valid"))
}

/// Strip an ADIF payload down to the text after its `<EOH>` marker.
///
/// Steps, in order: lossy UTF-8 decode, every CR and LF becomes a space,
/// everything up to and including the first case-insensitive `<EOH>` is
/// dropped, surrounding whitespace is trimmed. A payload without the marker
/// is kept whole.
pub fn normalize(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    let flat = text.replace(['\n', '\r'], " ");
    let body = match end_of_header().find(&flat) {
        Some(m) => &flat[m.end()..],
        None => {
            debug!("no end-of-header marker in payload, keeping it whole");
            flat.as_str()
        }
    };
    body.trim().to_string()
}
