/// Rule generator: randomized values for variable `set` actions.
///
/// A rule is one of:
/// - a range, `[1,6]` or `(0,10]`, yielding a uniform integer
/// - a probability literal in `[0,1]`, yielding a boolean
/// - a template. An uppercase class letter (`D U L A H E C`) draws one
///   character from its table, so `EEEE-EEEE` mints a grouped code.
///   `%` followed by a lowercase class letter draws too; `%` before any
///   other character emits that character, so `%%` is `%` and `%E` is `E`

use rand::Rng;
use thiserror::Error;

use crate::schema::value::{parse_numeric, Value};

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("invalid rule \"{rule}\": {reason}")]
    InvalidRule { rule: String, reason: String },
}

impl RuleError {
    fn invalid(rule: &str, reason: impl Into<String>) -> Self {
        Self::InvalidRule {
            rule: rule.to_string(),
            reason: reason.into(),
        }
    }
}

const DIGITS: &[u8] = b"0123456789";
const UPPER: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWER: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const ALNUM: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const HEX: &[u8] = b"0123456789ABCDEF";
/// Uppercase letters and digits minus the glyphs that read alike.
pub const UNAMBIGUOUS: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
/// The glyphs left out of [`UNAMBIGUOUS`].
pub const CONFUSABLE: &[u8] = b"01IO";

/// Character table selected by a template class letter.
pub fn class_table(letter: char) -> Option<&'static [u8]> {
    match letter.to_ascii_lowercase() {
        'd' => Some(DIGITS),
        'u' => Some(UPPER),
        'l' => Some(LOWER),
        'a' => Some(ALNUM),
        'h' => Some(HEX),
        'e' => Some(UNAMBIGUOUS),
        'c' => Some(CONFUSABLE),
        _ => None,
    }
}

/// Produce a value from a rule.
pub fn generate(rule: &str, rng: &mut impl Rng) -> Result<Value, RuleError> {
    let trimmed = rule.trim();
    if let Some((lo, hi)) = parse_range(trimmed)? {
        return Ok(Value::from(rng.gen_range(lo..=hi) as f64));
    }
    if let Some(p) = parse_probability(trimmed)? {
        return Ok(Value::Bool(rng.gen_bool(p)));
    }
    expand_template(rule, rng).map(Value::String)
}

/// Parse `[a,b]`-style ranges into an inclusive integer range. Returns
/// `Ok(None)` when the rule is not shaped like a range at all.
fn parse_range(rule: &str) -> Result<Option<(i64, i64)>, RuleError> {
    let mut chars = rule.chars();
    let (Some(open), Some(close)) = (chars.next(), chars.next_back()) else {
        return Ok(None);
    };
    if !matches!(open, '[' | '(') || !matches!(close, ']' | ')') {
        return Ok(None);
    }
    let body = chars.as_str();
    let Some((a, b)) = body.split_once(',') else {
        return Err(RuleError::invalid(rule, "range needs two bounds"));
    };
    let bound = |s: &str| {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }
        parse_numeric(s).filter(|n| n.is_finite())
    };
    let (Some(a), Some(b)) = (bound(a), bound(b)) else {
        return Err(RuleError::invalid(rule, "range bounds must be numbers"));
    };

    let lo = if open == '[' { a.ceil() } else { a.floor() + 1.0 };
    let hi = if close == ']' { b.floor() } else { b.ceil() - 1.0 };
    if lo > hi {
        return Err(RuleError::invalid(rule, "range is empty or inverted"));
    }
    Ok(Some((lo as i64, hi as i64)))
}

/// A rule made only of a number is a probability.
fn parse_probability(rule: &str) -> Result<Option<f64>, RuleError> {
    let looks_numeric = !rule.is_empty()
        && rule
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+'))
        && rule.chars().any(|c| c.is_ascii_digit());
    if !looks_numeric {
        return Ok(None);
    }
    match rule.parse::<f64>() {
        Ok(p) if (0.0..=1.0).contains(&p) => Ok(Some(p)),
        Ok(_) => Err(RuleError::invalid(rule, "probability must be within [0,1]")),
        Err(_) => Ok(None),
    }
}

fn expand_template(rule: &str, rng: &mut impl Rng) -> Result<String, RuleError> {
    let mut out = String::with_capacity(rule.len());
    let mut chars = rule.chars();
    while let Some(c) = chars.next() {
        match c {
            '%' => match chars.next() {
                Some(letter) if letter.is_ascii_lowercase() => {
                    let table = class_table(letter).ok_or_else(|| {
                        RuleError::invalid(rule, format!("unknown character class %{}", letter))
                    })?;
                    out.push(draw(table, rng));
                }
                Some(literal) => out.push(literal),
                None => return Err(RuleError::invalid(rule, "dangling %")),
            },
            c if c.is_ascii_uppercase() => match class_table(c) {
                Some(table) => out.push(draw(table, rng)),
                None => out.push(c),
            },
            c => out.push(c),
        }
    }
    Ok(out)
}

fn draw(table: &[u8], rng: &mut impl Rng) -> char {
    char::from(table[rng.gen_range(0..table.len())])
}
