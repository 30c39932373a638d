//! Plain scalar resolution for YAML 1.1 and YAML 1.2 (core schema).
//!
//! Quoted and block scalars are always strings; only plain scalars go
//! through [`resolve_plain`]. Infinity and NaN have no JSON form and stay
//! strings.

use serde_json::{Number, Value};
use ysv_core::YamlVersion;

/// Resolve an untagged plain scalar.
pub fn resolve_plain(text: &str, version: YamlVersion) -> Value {
    match version {
        YamlVersion::V1_2 => resolve_core(text),
        YamlVersion::V1_1 => resolve_legacy(text),
    }
}

/// Resolve a scalar carrying an explicit tag such as `!!int`.
///
/// A value that does not fit its tag falls back to a string. Unknown
/// tags resolve like an untagged plain scalar.
pub fn resolve_tagged(text: &str, handle: &str, suffix: &str, version: YamlVersion) -> Value {
    let standard = handle == "!!" || handle == "tag:yaml.org,2002:";
    if !standard {
        if handle == "!" && suffix.is_empty() {
            return Value::String(text.to_string());
        }
        return resolve_plain(text, version);
    }
    let resolved = resolve_plain(text, version);
    let fits = match suffix {
        "str" => return Value::String(text.to_string()),
        "null" => resolved.is_null(),
        "bool" => resolved.is_boolean(),
        "int" => resolved.is_i64() || resolved.is_u64(),
        "float" => {
            if let Some(n) = resolved.as_f64() {
                return Number::from_f64(n).map_or(resolved, Value::Number);
            }
            false
        }
        _ => true,
    };
    if fits {
        resolved
    } else {
        Value::String(text.to_string())
    }
}

fn resolve_core(text: &str) -> Value {
    match text {
        "" | "~" | "null" | "Null" | "NULL" => return Value::Null,
        "true" | "True" | "TRUE" => return Value::Bool(true),
        "false" | "False" | "FALSE" => return Value::Bool(false),
        _ => {}
    }
    if let Some(digits) = text.strip_prefix("0o") {
        return radix_int(digits, 8, false).unwrap_or_else(|| string(text));
    }
    if let Some(digits) = text.strip_prefix("0x") {
        return radix_int(digits, 16, false).unwrap_or_else(|| string(text));
    }
    let (negative, body) = split_sign(text);
    if !body.is_empty() && body.bytes().all(|b| b.is_ascii_digit()) {
        return decimal_int(negative, body).unwrap_or_else(|| string(text));
    }
    if is_core_float(body) {
        return float(text).unwrap_or_else(|| string(text));
    }
    string(text)
}

fn resolve_legacy(text: &str) -> Value {
    match text {
        "" | "~" | "null" | "Null" | "NULL" => return Value::Null,
        "y" | "Y" | "yes" | "Yes" | "YES" | "true" | "True" | "TRUE" | "on" | "On" | "ON" => {
            return Value::Bool(true)
        }
        "n" | "N" | "no" | "No" | "NO" | "false" | "False" | "FALSE" | "off" | "Off" | "OFF" => {
            return Value::Bool(false)
        }
        _ => {}
    }

    let (negative, body) = split_sign(text);
    if let Some(digits) = body.strip_prefix("0b") {
        return radix_int(digits, 2, negative).unwrap_or_else(|| string(text));
    }
    if let Some(digits) = body.strip_prefix("0x") {
        return radix_int(digits, 16, negative).unwrap_or_else(|| string(text));
    }
    if body.len() > 1 && body.starts_with('0') && body.bytes().all(|b| b.is_ascii_digit() || b == b'_') {
        return radix_int(&body[1..], 8, negative).unwrap_or_else(|| string(text));
    }
    if is_legacy_decimal(body) {
        let cleaned: String = body.chars().filter(|c| *c != '_').collect();
        return decimal_int(negative, &cleaned).unwrap_or_else(|| string(text));
    }
    if let Some(value) = sexagesimal(body) {
        let signed = if negative { -value } else { value };
        return Value::Number(Number::from(signed));
    }
    if is_legacy_float(body) {
        let cleaned: String = text.chars().filter(|c| *c != '_').collect();
        return float(&cleaned).unwrap_or_else(|| string(text));
    }
    string(text)
}

fn string(text: &str) -> Value {
    Value::String(text.to_string())
}

fn split_sign(text: &str) -> (bool, &str) {
    if let Some(rest) = text.strip_prefix('-') {
        (true, rest)
    } else if let Some(rest) = text.strip_prefix('+') {
        (false, rest)
    } else {
        (false, text)
    }
}

fn radix_int(digits: &str, radix: u32, negative: bool) -> Option<Value> {
    let cleaned: String = digits.chars().filter(|c| *c != '_').collect();
    if cleaned.is_empty() {
        return None;
    }
    let magnitude = u64::from_str_radix(&cleaned, radix).ok()?;
    signed_number(negative, magnitude)
}

fn decimal_int(negative: bool, digits: &str) -> Option<Value> {
    let magnitude: u64 = digits.parse().ok()?;
    signed_number(negative, magnitude)
}

fn signed_number(negative: bool, magnitude: u64) -> Option<Value> {
    if !negative {
        return Some(Value::Number(Number::from(magnitude)));
    }
    let value = i64::try_from(magnitude).ok()?;
    Some(Value::Number(Number::from(-value)))
}

fn float(text: &str) -> Option<Value> {
    let parsed: f64 = text.parse().ok()?;
    Number::from_f64(parsed).map(Value::Number)
}

/// `(\.[0-9]+|[0-9]+(\.[0-9]*)?)([eE][-+]?[0-9]+)?` after the sign.
fn is_core_float(body: &str) -> bool {
    let (mantissa, exponent) = match body.find(['e', 'E']) {
        Some(idx) => (&body[..idx], Some(&body[idx + 1..])),
        None => (body, None),
    };
    let mantissa_ok = match mantissa.split_once('.') {
        Some((int, frac)) => {
            let digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
            digits(int) && digits(frac) && !(int.is_empty() && frac.is_empty())
        }
        None => !mantissa.is_empty() && mantissa.bytes().all(|b| b.is_ascii_digit()),
    };
    let exponent_ok = match exponent {
        None => true,
        Some(exp) => {
            let exp = exp.strip_prefix(['+', '-']).unwrap_or(exp);
            !exp.is_empty() && exp.bytes().all(|b| b.is_ascii_digit())
        }
    };
    mantissa_ok && exponent_ok
}

/// `0|[1-9][0-9_]*`
fn is_legacy_decimal(body: &str) -> bool {
    let mut bytes = body.bytes();
    match bytes.next() {
        Some(b'0') => body.len() == 1,
        Some(b'1'..=b'9') => bytes.all(|b| b.is_ascii_digit() || b == b'_'),
        _ => false,
    }
}

/// `[0-9][0-9_]*(\.[0-9_]*)?([eE][-+][0-9]+)?` or `\.[0-9_]+` after the sign.
fn is_legacy_float(body: &str) -> bool {
    let (mantissa, exponent) = match body.find(['e', 'E']) {
        Some(idx) => (&body[..idx], Some(&body[idx + 1..])),
        None => (body, None),
    };
    let digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit() || b == b'_');
    let mantissa_ok = match mantissa.split_once('.') {
        Some((int, frac)) => {
            digits(int)
                && digits(frac)
                && (int.bytes().any(|b| b.is_ascii_digit()) || frac.bytes().any(|b| b.is_ascii_digit()))
        }
        None => false,
    };
    let exponent_ok = match exponent {
        None => true,
        Some(exp) => match exp.strip_prefix(['+', '-']) {
            Some(rest) => !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()),
            None => false,
        },
    };
    mantissa_ok && exponent_ok
}

/// `[1-9][0-9_]*(:[0-5]?[0-9])+`
fn sexagesimal(body: &str) -> Option<i64> {
    let mut parts = body.split(':');
    let head = parts.next()?;
    if !is_legacy_decimal(head) || head == "0" {
        return None;
    }
    let mut value: i64 = head.replace('_', "").parse().ok()?;
    let mut any = false;
    for part in parts {
        if part.is_empty() || part.len() > 2 || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let digit: i64 = part.parse().ok()?;
        if digit >= 60 {
            return None;
        }
        value = value.checked_mul(60)?.checked_add(digit)?;
        any = true;
    }
    any.then_some(value)
}
