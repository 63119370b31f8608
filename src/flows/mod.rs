//! The two burnout workflows built on the engine.
//!
//! Both are ordinary [`Graph`](crate::Graph) instances wired from the
//! collaborator traits: [`assessment`] persists a per-test verdict,
//! [`analyzer`] decides whether to e-mail recommendations. They share the
//! engine and the collaborator records, not step code.

use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

pub mod analyzer;
pub mod assessment;

/// How many prior assessments the gather steps request.
pub const RECENT_ASSESSMENT_LIMIT: usize = 3;

/// Parse a model completion into a structured schema.
///
/// Tolerates a surrounding markdown code fence, which providers add even
/// when asked for bare JSON. Any remaining mismatch is a fatal
/// [`Error::Parse`].
pub(crate) fn parse_structured<T: DeserializeOwned>(text: &str) -> Result<T> {
    let payload = strip_code_fence(text.trim());
    serde_json::from_str(payload).map_err(|e| Error::Parse(e.to_string()))
}

fn strip_code_fence(text: &str) -> &str {
    let Some(inner) = text.strip_prefix("```") else {
        return text;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    let inner = inner.trim_end();
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    inner.trim()
}
