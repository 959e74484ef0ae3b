//! Helpers for reading loosely-typed JSON values.
//!
//! Upstream feeds disagree on whether numbers are numbers or strings, and
//! whether booleans are booleans or `"true"`. These helpers accept both and
//! reject anything non-finite.

use serde_json::Value;

use crate::domain::RawProduct;

/// Look up a dotted path on an object.
pub fn lookup<'a>(obj: &'a RawProduct, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = obj.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// Non-empty, trimmed text for a scalar value.
pub fn text(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    if s.is_empty() { None } else { Some(s) }
}

/// First non-empty text among candidate keys.
pub fn first_text(obj: &RawProduct, keys: &[String]) -> Option<String> {
    keys.iter().find_map(|k| lookup(obj, k).and_then(text))
}

/// Numeric value from a number or a numeric string (`"395.00"`, `"$1,000"`, `"6.24%"`).
pub fn number(value: &Value) -> Option<f64> {
    let v = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let cleaned: String = s
                .trim()
                .chars()
                .filter(|c| !matches!(c, '$' | ',' | '%' | ' '))
                .collect();
            if cleaned.is_empty() {
                return None;
            }
            cleaned.parse::<f64>().ok()?
        }
        _ => return None,
    };
    if v.is_finite() { Some(v) } else { None }
}

pub fn boolean(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" => Some(true),
            "false" | "no" | "n" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Objects of an array field, skipping anything that isn't an object.
pub fn objects<'a>(obj: &'a RawProduct, path: &str) -> impl Iterator<Item = &'a RawProduct> + use<'a> {
    lookup(obj, path)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
}

/// Normalize an enum-like tag: upper case, `-`/space → `_`.
pub fn tag(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| if c == '-' || c == ' ' { '_' } else { c.to_ascii_uppercase() })
        .collect()
}

/// `OFFSET_ACCOUNT` → `Offset Account`.
pub fn title_case(code: &str) -> String {
    code.split(|c: char| c == '_' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(|w| {
            let lower = w.to_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whole months in an ISO-8601 duration (`P1Y`, `P18M`, `P1Y6M`).
///
/// Day/week/time components are not month-aligned and yield `None`.
pub fn duration_months(raw: &str) -> Option<u32> {
    let body = raw.trim().to_ascii_uppercase();
    let body = body.strip_prefix('P')?;
    if body.is_empty() {
        return None;
    }

    let mut months = 0u32;
    let mut digits = String::new();
    for c in body.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let n: u32 = digits.parse().ok()?;
        digits.clear();
        match c {
            'Y' => months = months.checked_add(n.checked_mul(12)?)?,
            'M' => months = months.checked_add(n)?,
            _ => return None,
        }
    }
    if !digits.is_empty() {
        return None;
    }
    Some(months)
}

/// Round to a fixed number of decimals.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lookup_follows_dotted_paths() {
        let obj = json!({"additionalInformation": {"overviewUri": "https://bank.test"}, "name": "Loan"});
        let obj = obj.as_object().unwrap();
        assert_eq!(lookup(obj, "additionalInformation.overviewUri"), Some(&json!("https://bank.test")));
        assert_eq!(lookup(obj, "name.inner"), None);
        assert_eq!(first_text(obj, &["missing".to_string(), "name".to_string()]), Some("Loan".to_string()));
    }

    #[test]
    fn number_accepts_strings_and_rejects_junk() {
        assert_eq!(number(&json!("0.0624")), Some(0.0624));
        assert_eq!(number(&json!("$1,250.50")), Some(1250.5));
        assert_eq!(number(&json!(6.24)), Some(6.24));
        assert_eq!(number(&json!(0)), Some(0.0));
        assert_eq!(number(&json!("")), None);
        assert_eq!(number(&json!("n/a")), None);
        assert_eq!(number(&json!(null)), None);
    }

    #[test]
    fn durations_in_months() {
        assert_eq!(duration_months("P1Y"), Some(12));
        assert_eq!(duration_months("P36M"), Some(36));
        assert_eq!(duration_months("p1y6m"), Some(18));
        assert_eq!(duration_months("P30D"), None);
        assert_eq!(duration_months("3Y"), None);
        assert_eq!(duration_months("P"), None);
    }

    #[test]
    fn tags_and_titles() {
        assert_eq!(tag(" owner-occupied "), "OWNER_OCCUPIED");
        assert_eq!(title_case("OFFSET_ACCOUNT"), "Offset Account");
        assert_eq!(boolean(&json!("Yes")), Some(true));
        assert_eq!(boolean(&json!(1)), None);
    }
}
