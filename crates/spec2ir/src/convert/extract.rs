//! Reduce raw model output to the JSON object it contains.

use crate::result::{Spec2IrError, Spec2IrResult};
use regex::Regex;
use std::sync::LazyLock;

#[allow(clippy::unwrap_used)]
static LEADING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^```(?:json)?\s*").unwrap());

#[allow(clippy::unwrap_used)]
static TRAILING_FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*```$").unwrap());

/// Extract the JSON object span from model output.
///
/// Strips one leading fence (optionally tagged `json`) and one trailing fence,
/// then returns everything from the first `{` to the last `}` inclusive.
/// Commentary around the object is discarded. Applying it to its own output
/// returns the same text.
///
/// # Errors
/// `MalformedModelOutput` carrying the raw text when no `{ ... }` span exists.
pub fn extract_json_object(raw: &str) -> Spec2IrResult<&str> {
    let text = raw.trim();
    let text = LEADING_FENCE.find(text).map_or(text, |m| &text[m.end()..]);
    let text = TRAILING_FENCE
        .find(text)
        .map_or(text, |m| &text[..m.start()]);

    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => Ok(&text[start..=end]),
        _ => Err(Spec2IrError::MalformedModelOutput {
            message: "output does not contain a JSON object".to_string(),
            raw: raw.to_string(),
        }),
    }
}
