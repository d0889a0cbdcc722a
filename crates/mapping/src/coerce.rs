//! Coercion of payload values into typed attribute values.
//!
//! | Declared kind | Accepted source forms | Rule |
//! |---|---|---|
//! | string | string, number | number → canonical decimal text |
//! | date | date | pass through, no string parsing |
//! | integer16/32/64 | number, numeric string | integral, in range |
//! | float/double | number, numeric string | finite parse, float within `f32` range |
//! | boolean | bool, number, string | non-zero / truthy prefix |
//! | decimal | number, numeric string | arbitrary precision parse |
//! | uuid | uuid, string | parse, malformed rejected |
//! | url | url, string | parse, malformed rejected |
//! | binary/transformable/undefined | anything | pass through |
//!
//! Anything outside the table yields `None`; callers turn that into a
//! mapping failure naming the attribute.
use std::str::FromStr;

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde_json::Number;
use store::{AttributeValue, PayloadValue};
use url::Url;
use uuid::Uuid;

use crate::schema::ScalarKind;

/// Coerces `value` to `kind`, or `None` if the source form is not accepted.
///
/// # Example
///
/// ```rust
/// use mapping::{coerce, ScalarKind};
/// use store::{AttributeValue, PayloadValue};
///
/// assert_eq!(
///     coerce(&PayloadValue::from("30"), ScalarKind::Integer32),
///     Some(AttributeValue::Int32(30))
/// );
/// assert_eq!(
///     coerce(&PayloadValue::from(1.5), ScalarKind::String),
///     Some(AttributeValue::String("1.5".into()))
/// );
/// assert_eq!(coerce(&PayloadValue::from("not-a-uuid"), ScalarKind::Uuid), None);
/// ```
pub fn coerce(value: &PayloadValue, kind: ScalarKind) -> Option<AttributeValue> {
    match kind {
        ScalarKind::String => match value {
            PayloadValue::String(s) => Some(AttributeValue::String(s.clone())),
            PayloadValue::Number(n) => Some(AttributeValue::String(number_to_string(n))),
            PayloadValue::Decimal(d) => Some(AttributeValue::String(d.to_string())),
            _ => None,
        },
        ScalarKind::Date => match value {
            PayloadValue::Date(date) => Some(AttributeValue::Date(*date)),
            _ => None,
        },
        ScalarKind::Integer16 => integer(value)
            .and_then(|v| i16::try_from(v).ok())
            .map(AttributeValue::Int16),
        ScalarKind::Integer32 => integer(value)
            .and_then(|v| i32::try_from(v).ok())
            .map(AttributeValue::Int32),
        ScalarKind::Integer64 => integer(value).map(AttributeValue::Int64),
        ScalarKind::Float => floating(value)
            .filter(|v| v.abs() <= f64::from(f32::MAX))
            .map(|v| AttributeValue::Float(v as f32)),
        ScalarKind::Double => floating(value).map(AttributeValue::Double),
        ScalarKind::Boolean => boolean(value).map(AttributeValue::Bool),
        ScalarKind::Decimal => decimal(value).map(AttributeValue::Decimal),
        ScalarKind::Uuid => match value {
            PayloadValue::Uuid(uuid) => Some(AttributeValue::Uuid(*uuid)),
            PayloadValue::String(s) => Uuid::parse_str(s.trim()).ok().map(AttributeValue::Uuid),
            _ => None,
        },
        ScalarKind::Url => match value {
            PayloadValue::Url(url) => Some(AttributeValue::Url(url.clone())),
            PayloadValue::String(s) => Url::parse(s.trim()).ok().map(AttributeValue::Url),
            _ => None,
        },
        ScalarKind::Binary | ScalarKind::Transformable | ScalarKind::Undefined => match value {
            PayloadValue::Binary(bytes) => Some(AttributeValue::Binary(bytes.clone())),
            other => Some(AttributeValue::Opaque(other.clone())),
        },
    }
}

/// Integers print without a fraction; floats use the shortest round-trip form.
fn number_to_string(n: &Number) -> String {
    if n.is_i64() || n.is_u64() {
        return n.to_string();
    }
    match n.as_f64() {
        Some(f) => format!("{f}"),
        None => n.to_string(),
    }
}

fn integer(value: &PayloadValue) -> Option<i64> {
    match value {
        PayloadValue::Number(n) => n.as_i64().or_else(|| integral_f64(n.as_f64()?)),
        PayloadValue::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| integral_f64(s.parse::<f64>().ok()?))
        }
        PayloadValue::Decimal(d) if d.fract().is_zero() => d.to_i64(),
        _ => None,
    }
}

/// `i64::MAX as f64` rounds up to 2^63, so the upper bound is exclusive.
fn integral_f64(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

/// Finite values only: `NaN` never compares equal, and infinities are not data.
fn floating(value: &PayloadValue) -> Option<f64> {
    let parsed = match value {
        PayloadValue::Number(n) => n.as_f64(),
        PayloadValue::String(s) => s.trim().parse::<f64>().ok(),
        PayloadValue::Decimal(d) => d.to_f64(),
        _ => None,
    };
    parsed.filter(|f| f.is_finite())
}

fn boolean(value: &PayloadValue) -> Option<bool> {
    match value {
        PayloadValue::Bool(b) => Some(*b),
        PayloadValue::Number(n) => n.as_f64().map(|f| f != 0.0),
        PayloadValue::String(s) => Some(truthy(s)),
        PayloadValue::Decimal(d) => Some(!d.is_zero()),
        _ => None,
    }
}

/// Truthiness of a string: skip whitespace, an optional sign, and leading
/// zeros, then `Y`/`y`/`T`/`t` or a digit `1`-`9` means true.
fn truthy(s: &str) -> bool {
    let rest = s.trim_start();
    let rest = rest.strip_prefix(['+', '-']).unwrap_or(rest);
    let rest = rest.trim_start_matches('0');
    matches!(
        rest.chars().next(),
        Some('Y' | 'y' | 'T' | 't' | '1'..='9')
    )
}

fn decimal(value: &PayloadValue) -> Option<Decimal> {
    match value {
        PayloadValue::Decimal(d) => Some(*d),
        PayloadValue::Number(n) => {
            let text = n.to_string();
            parse_decimal(&text).or_else(|| Decimal::from_f64(n.as_f64()?))
        }
        PayloadValue::String(s) => parse_decimal(s.trim()),
        _ => None,
    }
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    Decimal::from_str(text)
        .ok()
        .or_else(|| Decimal::from_scientific(text).ok())
}
