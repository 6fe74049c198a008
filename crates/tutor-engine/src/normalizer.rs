//! Extraction of a JSON candidate from free-form generator output.
//!
//! The generator is asked for a single JSON object but routinely wraps it in
//! prose or markdown fences, truncates it, or ignores the instruction
//! entirely. [`normalize`] never fails: it either extracts the object or
//! synthesizes a deterministic fallback lesson from the raw text, so the
//! learner always receives some module.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};

use crate::module::ACCEPT_ANY_ANSWER;

/// Number of characters of raw text used as the fallback introduction.
pub const FALLBACK_INTRO_CHARS: usize = 280;

/// Maximum length of a title taken from the first line of raw text.
const FALLBACK_TITLE_CHARS: usize = 100;

/// Wrapper keys some generators nest the lesson object under.
const WRAPPER_KEYS: [&str; 2] = ["module", "lesson"];

/// Leading markdown decoration on a line: headings, emphasis, quotes, bullets.
static LEADING_MARKUP: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^(?:#{1,6}\s*|[*_>`~-]+\s*)+").ok());

/// Trailing emphasis markers on a line.
static TRAILING_MARKUP: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"[*_`~]+$").ok());

/// Where the candidate object came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizedSource {
    /// A JSON object was found in the raw text.
    Extracted,
    /// No usable JSON was found; the object was synthesized from the text.
    Fallback,
}

impl std::fmt::Display for NormalizedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Extracted => write!(f, "extracted"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

/// A candidate lesson object ready for validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    /// The candidate object (always a JSON object).
    pub candidate: Value,
    /// Whether the object was extracted or synthesized.
    pub source: NormalizedSource,
}

impl Normalized {
    /// Returns `true` if the fallback object was synthesized.
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.source == NormalizedSource::Fallback
    }
}

/// Turns raw generator output into a candidate lesson object.
///
/// The span from the first `{` to the last `}` is parsed as JSON; if that
/// yields an object it becomes the candidate (unwrapped from a lone `module`
/// or `lesson` key). Anything else produces the fallback object.
///
/// # Examples
///
/// ```
/// use tutor_engine::normalizer::{normalize, NormalizedSource};
///
/// let raw = "Here you go:\n```json\n{\"title\": \"Fractions\"}\n```";
/// let normalized = normalize(raw);
/// assert_eq!(normalized.source, NormalizedSource::Extracted);
/// assert_eq!(normalized.candidate["title"], "Fractions");
///
/// let normalized = normalize("Sure! Here's your lesson: ...");
/// assert_eq!(normalized.source, NormalizedSource::Fallback);
/// ```
#[must_use]
pub fn normalize(raw: &str) -> Normalized {
    match extract_object(raw) {
        Some(object) => Normalized {
            candidate: Value::Object(unwrap_nested(object)),
            source: NormalizedSource::Extracted,
        },
        None => Normalized {
            candidate: fallback_object(raw),
            source: NormalizedSource::Fallback,
        },
    }
}

/// Parses the outermost brace span of `raw` as a JSON object.
fn extract_object(raw: &str) -> Option<Map<String, Value>> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }

    match serde_json::from_str::<Value>(&raw[start..=end]) {
        Ok(Value::Object(object)) => Some(object),
        Ok(_) | Err(_) => None,
    }
}

/// Unwraps `{"module": {...}}` style envelopes.
fn unwrap_nested(mut object: Map<String, Value>) -> Map<String, Value> {
    if object.len() == 1 {
        for key in WRAPPER_KEYS {
            if matches!(object.get(key), Some(Value::Object(_))) {
                if let Some(Value::Object(inner)) = object.remove(key) {
                    return inner;
                }
            }
        }
    }
    object
}

/// Builds the deterministic fallback lesson from raw text.
///
/// The title is left empty when the text has no usable first line, which
/// makes the validator synthesize `"Module {n}"`.
#[must_use]
pub fn fallback_object(raw: &str) -> Value {
    let trimmed = raw.trim();

    json!({
        "title": fallback_title(trimmed),
        "objectives": [
            "Review the key ideas presented in this lesson",
            "Put the main concept into your own words",
        ],
        "introduction": truncate_chars(trimmed, FALLBACK_INTRO_CHARS),
        "explanation": raw,
        "practiceItems": [{
            "question": "Summarize the main idea of this lesson in your own words.",
            "hint": "Re-read the explanation and pick out the sentence that matters most.",
            "solution": "Answers will vary; compare yours with the explanation.",
            "difficulty": "easy",
        }],
        "quizItems": [{
            "question": "What is one thing you learned from this lesson?",
            "kind": "short_answer",
            "correctAnswer": ACCEPT_ANY_ANSWER,
            "explanation": "Any thoughtful answer is accepted for this lesson.",
        }],
        "summaryPoints": [
            "This lesson could not be fully structured; review the explanation text.",
            "Request the next module to continue.",
        ],
        "nextModulePreview": "",
    })
}

/// Takes the first non-empty, non-fence line and strips markdown decoration.
fn fallback_title(text: &str) -> String {
    let Some(line) = text
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with("```"))
    else {
        return String::new();
    };

    let mut title = line.to_string();
    if let Some(re) = LEADING_MARKUP.as_ref() {
        title = re.replace(&title, "").into_owned();
    }
    if let Some(re) = TRAILING_MARKUP.as_ref() {
        title = re.replace(&title, "").into_owned();
    }

    truncate_chars(title.trim(), FALLBACK_TITLE_CHARS)
        .trim_end()
        .to_string()
}

/// Returns at most `max` characters of `s`, respecting char boundaries.
pub(crate) fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((byte_index, _)) => &s[..byte_index],
        None => s,
    }
}
