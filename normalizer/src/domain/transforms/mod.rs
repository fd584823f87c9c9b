//! Built-in value transforms.
//!
//! Rule documents bind a transform name to one of the functions below plus
//! parameters. Nothing supplied by a rule document is ever executed; the
//! registry is the closed set of what a mapping can do to a value.

mod normalize;

use serde_json::{Map, Number, Value as JsonValue};
use thiserror::Error;

use crate::utils::string::truncate_chars;

pub use normalize::{ChatRole, FinishReason, join_text_blocks, normalize_messages};

// =============================================================================
// Registry
// =============================================================================

/// Whether a registry function consumes one value or a list of values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformKind {
    Unary,
    Aggregate,
}

impl std::fmt::Display for TransformKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransformKind::Unary => write!(f, "unary"),
            TransformKind::Aggregate => write!(f, "aggregate"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    #[error("unknown transform function '{0}'")]
    UnknownFunction(String),

    #[error("invalid parameters for '{function}': {reason}")]
    InvalidParams { function: String, reason: String },
}

// =============================================================================
// Transform Specs
// =============================================================================

/// Single-value transform with its parameters bound
#[derive(Debug, Clone, PartialEq)]
pub enum UnaryTransform {
    Identity,
    ToString,
    ToInteger,
    ToFloat,
    ToBool,
    Lowercase,
    NormalizeFinishReason,
    NormalizeRole,
    NormalizeMessages,
    JoinTextBlocks,
    ParseJson,
    StripProviderPrefix,
    Truncate { max_chars: usize },
    Default { value: JsonValue },
}

/// Many-to-one transform used by derived mappings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateTransform {
    Sum,
    Max,
    First,
    Count,
}

/// A registry function bound to its parameters
#[derive(Debug, Clone, PartialEq)]
pub enum TransformSpec {
    Unary(UnaryTransform),
    Aggregate(AggregateTransform),
}

impl TransformSpec {
    /// Bind a registry function name and parameters.
    pub fn resolve(function: &str, params: &Map<String, JsonValue>) -> Result<Self, TransformError> {
        let spec = match function {
            "identity" => Self::Unary(UnaryTransform::Identity),
            "to_string" => Self::Unary(UnaryTransform::ToString),
            "to_integer" => Self::Unary(UnaryTransform::ToInteger),
            "to_float" => Self::Unary(UnaryTransform::ToFloat),
            "to_bool" => Self::Unary(UnaryTransform::ToBool),
            "lowercase" => Self::Unary(UnaryTransform::Lowercase),
            "normalize_finish_reason" => Self::Unary(UnaryTransform::NormalizeFinishReason),
            "normalize_role" => Self::Unary(UnaryTransform::NormalizeRole),
            "normalize_messages" => Self::Unary(UnaryTransform::NormalizeMessages),
            "join_text_blocks" => Self::Unary(UnaryTransform::JoinTextBlocks),
            "parse_json" => Self::Unary(UnaryTransform::ParseJson),
            "strip_provider_prefix" => Self::Unary(UnaryTransform::StripProviderPrefix),
            "truncate" => {
                let max_chars = params
                    .get("max_chars")
                    .and_then(JsonValue::as_u64)
                    .filter(|n| *n > 0)
                    .ok_or_else(|| invalid(function, "'max_chars' must be a positive integer"))?;
                check_params(function, params, &["max_chars"])?;
                return Ok(Self::Unary(UnaryTransform::Truncate {
                    max_chars: max_chars as usize,
                }));
            }
            "default" => {
                let value = params
                    .get("value")
                    .cloned()
                    .ok_or_else(|| invalid(function, "'value' is required"))?;
                check_params(function, params, &["value"])?;
                return Ok(Self::Unary(UnaryTransform::Default { value }));
            }
            "sum" => Self::Aggregate(AggregateTransform::Sum),
            "max" => Self::Aggregate(AggregateTransform::Max),
            "first" => Self::Aggregate(AggregateTransform::First),
            "count" => Self::Aggregate(AggregateTransform::Count),
            other => return Err(TransformError::UnknownFunction(other.to_string())),
        };
        check_params(function, params, &[])?;
        Ok(spec)
    }

    pub fn kind(&self) -> TransformKind {
        match self {
            Self::Unary(_) => TransformKind::Unary,
            Self::Aggregate(_) => TransformKind::Aggregate,
        }
    }
}

fn invalid(function: &str, reason: &str) -> TransformError {
    TransformError::InvalidParams {
        function: function.to_string(),
        reason: reason.to_string(),
    }
}

fn check_params(
    function: &str,
    params: &Map<String, JsonValue>,
    allowed: &[&str],
) -> Result<(), TransformError> {
    match params.keys().find(|k| !allowed.contains(&k.as_str())) {
        Some(key) => Err(invalid(function, &format!("unexpected parameter '{key}'"))),
        None => Ok(()),
    }
}

// =============================================================================
// Application
// =============================================================================

impl UnaryTransform {
    /// Apply to one value. `None` means the input shape is unsupported.
    pub fn apply(&self, value: &JsonValue) -> Option<JsonValue> {
        match self {
            Self::Identity => Some(value.clone()),
            Self::ToString => to_string(value),
            Self::ToInteger => to_integer(value),
            Self::ToFloat => to_float(value),
            Self::ToBool => to_bool(value),
            Self::Lowercase => value.as_str().map(|s| JsonValue::String(s.to_lowercase())),
            Self::NormalizeFinishReason => normalize_token(value, |s| {
                FinishReason::from_str_normalized(s).map(|r| r.as_str())
            }),
            Self::NormalizeRole => {
                normalize_token(value, |s| ChatRole::try_from_str(s).map(|r| r.as_str()))
            }
            Self::NormalizeMessages => normalize_messages(value),
            Self::JoinTextBlocks => join_text_blocks(value).map(JsonValue::String),
            Self::ParseJson => parse_json(value),
            Self::StripProviderPrefix => value
                .as_str()
                .map(|s| JsonValue::String(strip_provider_prefix(s).to_string())),
            Self::Truncate { max_chars } => value
                .as_str()
                .map(|s| JsonValue::String(truncate_chars(s, *max_chars))),
            Self::Default { value: fallback } => match value {
                JsonValue::Null => Some(fallback.clone()),
                JsonValue::String(s) if s.is_empty() => Some(fallback.clone()),
                other => Some(other.clone()),
            },
        }
    }
}

impl AggregateTransform {
    /// Combine values in document order. `None` when nothing applies.
    pub fn apply(&self, values: &[&JsonValue]) -> Option<JsonValue> {
        match self {
            Self::Sum => fold_numbers(values, |a, b| a + b, |a, b| a.checked_add(b)),
            Self::Max => fold_numbers(values, f64::max, |a, b| Some(a.max(b))),
            Self::First => values.iter().find(|v| !v.is_null()).map(|v| (*v).clone()),
            Self::Count => {
                let n = values.iter().filter(|v| !v.is_null()).count();
                (n > 0).then(|| JsonValue::from(n as u64))
            }
        }
    }
}

// =============================================================================
// Scalar Conversions
// =============================================================================

fn to_string(value: &JsonValue) -> Option<JsonValue> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(_) => Some(value.clone()),
        JsonValue::Bool(b) => Some(JsonValue::String(b.to_string())),
        JsonValue::Number(n) => Some(JsonValue::String(n.to_string())),
        JsonValue::Array(_) | JsonValue::Object(_) => {
            serde_json::to_string(value).ok().map(JsonValue::String)
        }
    }
}

fn to_integer(value: &JsonValue) -> Option<JsonValue> {
    match value {
        JsonValue::Number(n) if n.is_i64() || n.is_u64() => Some(value.clone()),
        JsonValue::Number(n) => n.as_f64().and_then(whole_f64_to_i64).map(JsonValue::from),
        JsonValue::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(whole_f64_to_i64))
                .map(JsonValue::from)
        }
        _ => None,
    }
}

fn whole_f64_to_i64(f: f64) -> Option<i64> {
    (f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64).then_some(f as i64)
}

fn to_float(value: &JsonValue) -> Option<JsonValue> {
    let f = match value {
        JsonValue::Number(n) => n.as_f64()?,
        JsonValue::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    Number::from_f64(f).map(JsonValue::Number)
}

fn to_bool(value: &JsonValue) -> Option<JsonValue> {
    let b = match value {
        JsonValue::Bool(b) => *b,
        JsonValue::Number(n) => match n.as_i64() {
            Some(0) => false,
            Some(1) => true,
            _ => return None,
        },
        JsonValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => true,
            "false" | "no" | "0" => false,
            _ => return None,
        },
        _ => return None,
    };
    Some(JsonValue::Bool(b))
}

/// Normalize a token or the first token of a list; unrecognized tokens are lowercased.
fn normalize_token(
    value: &JsonValue,
    normalize: impl Fn(&str) -> Option<&'static str>,
) -> Option<JsonValue> {
    let raw = match value {
        JsonValue::String(s) => s.as_str(),
        JsonValue::Array(items) => items.first()?.as_str()?,
        _ => return None,
    };
    let token = raw.trim();
    if token.is_empty() {
        return None;
    }
    Some(JsonValue::String(
        normalize(token)
            .map(str::to_string)
            .unwrap_or_else(|| token.to_lowercase()),
    ))
}

fn parse_json(value: &JsonValue) -> Option<JsonValue> {
    match value {
        JsonValue::String(s) => serde_json::from_str(s).ok(),
        JsonValue::Null => None,
        other => Some(other.clone()),
    }
}

/// Provider and region qualifiers that precede model ids
/// (`openai/gpt-4o`, `anthropic.claude-3-haiku`, `us.anthropic.claude-3-5-sonnet`).
const PROVIDER_QUALIFIERS: &[&str] = &[
    "openai",
    "anthropic",
    "amazon",
    "meta",
    "cohere",
    "mistral",
    "mistralai",
    "ai21",
    "google",
    "vertex_ai",
    "bedrock",
    "azure",
    "groq",
    "deepseek",
    "us",
    "eu",
    "apac",
    "global",
];

fn strip_provider_prefix(model: &str) -> &str {
    let mut rest = model.trim();
    // At most region + provider, e.g. `us.anthropic.`
    for _ in 0..3 {
        let Some(idx) = rest.find(['.', '/']) else {
            break;
        };
        let head = &rest[..idx];
        if !PROVIDER_QUALIFIERS.iter().any(|q| q.eq_ignore_ascii_case(head)) || idx + 1 >= rest.len() {
            break;
        }
        rest = &rest[idx + 1..];
    }
    rest
}

fn fold_numbers(
    values: &[&JsonValue],
    float_op: impl Fn(f64, f64) -> f64,
    int_op: impl Fn(i64, i64) -> Option<i64>,
) -> Option<JsonValue> {
    let numbers: Vec<&Number> = values.iter().filter_map(|v| v.as_number()).collect();
    let (first, rest) = numbers.split_first()?;

    if numbers.iter().all(|n| n.is_i64()) {
        let mut acc = first.as_i64()?;
        let mut overflowed = false;
        for n in rest {
            match n.as_i64().and_then(|v| int_op(acc, v)) {
                Some(next) => acc = next,
                None => {
                    overflowed = true;
                    break;
                }
            }
        }
        if !overflowed {
            return Some(JsonValue::from(acc));
        }
    }

    let mut acc = first.as_f64()?;
    for n in rest {
        acc = float_op(acc, n.as_f64()?);
    }
    Number::from_f64(acc).map(JsonValue::Number)
}

#[cfg(test)]
#[path = "transforms_tests.rs"]
mod tests;
