use crate::error::{Error, Location};
use crate::node::ScalarStyle;
use crate::tags::{TAG_BOOL, TAG_FLOAT, TAG_INT, TAG_NULL, TAG_STR};

/// Parse a YAML 1.1 boolean from a &str (handles the "Norway problem").
///
/// Accepted TRUE literals (case-insensitive): "y", "yes", "true", "on"
/// Accepted FALSE literals (case-insensitive): "n", "no", "false", "off"
pub(crate) fn parse_yaml11_bool(s: &str) -> Result<bool, String> {
    let t = s.trim();
    if t.eq_ignore_ascii_case("true")
        || t.eq_ignore_ascii_case("yes")
        || t.eq_ignore_ascii_case("y")
        || t.eq_ignore_ascii_case("on")
    {
        Ok(true)
    } else if t.eq_ignore_ascii_case("false")
        || t.eq_ignore_ascii_case("no")
        || t.eq_ignore_ascii_case("n")
        || t.eq_ignore_ascii_case("off")
    {
        Ok(false)
    } else {
        Err(format!("invalid YAML 1.1 bool: `{s}`"))
    }
}

/// YAML 1.2 core schema booleans, used for implicit tag resolution.
pub(crate) fn parse_yaml12_bool(s: &str) -> Option<bool> {
    match s {
        "true" | "True" | "TRUE" => Some(true),
        "false" | "False" | "FALSE" => Some(false),
        _ => None,
    }
}

/// True for the plain scalars that mean null: empty, `~`, `null` in its three spellings.
pub(crate) fn scalar_is_nullish(value: &str, style: ScalarStyle) -> bool {
    style == ScalarStyle::Plain && matches!(value, "" | "~" | "null" | "Null" | "NULL")
}

fn parse_digits_u128(digits: &str, radix: u32) -> Option<u128> {
    let mut val: u128 = 0;
    let mut saw = false;
    for c in digits.chars() {
        if c == '_' {
            continue;
        }
        let d = c.to_digit(radix)?;
        val = val.checked_mul(radix as u128)?.checked_add(d as u128)?;
        saw = true;
    }
    if saw { Some(val) } else { None }
}

/// Split sign and radix prefix: returns (negative, radix, digits).
fn split_int(t: &str) -> (bool, u32, &str) {
    let (neg, rest) = match t.strip_prefix('+') {
        Some(r) => (false, r),
        None => match t.strip_prefix('-') {
            Some(r) => (true, r),
            None => (false, t),
        },
    };
    if let Some(r) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        (neg, 16, r)
    } else if let Some(r) = rest.strip_prefix("0o").or_else(|| rest.strip_prefix("0O")) {
        (neg, 8, r)
    } else if let Some(r) = rest.strip_prefix("0b").or_else(|| rest.strip_prefix("0B")) {
        (neg, 2, r)
    } else {
        (neg, 10, rest)
    }
}

/// Parse a signed integer in any of the YAML bases into `T`.
pub(crate) fn parse_int_signed<T>(s: &str, ty: &'static str, location: Location) -> Result<T, Error>
where
    T: TryFrom<i128>,
{
    let invalid = || Error::msg(format!("invalid {ty}: `{s}`")).with_location(location);
    let (neg, radix, digits) = split_int(s.trim());
    let mag = parse_digits_u128(digits, radix).ok_or_else(invalid)?;
    let val: i128 = if neg {
        if mag == (i128::MAX as u128) + 1 {
            i128::MIN
        } else {
            let m: i128 = mag.try_into().map_err(|_| invalid())?;
            -m
        }
    } else {
        mag.try_into().map_err(|_| invalid())?
    };
    T::try_from(val).map_err(|_| invalid())
}

/// Parse an unsigned integer in any of the YAML bases into `T`.
pub(crate) fn parse_int_unsigned<T>(
    s: &str,
    ty: &'static str,
    location: Location,
) -> Result<T, Error>
where
    T: TryFrom<u128>,
{
    let invalid = || Error::msg(format!("invalid {ty}: `{s}`")).with_location(location);
    let (neg, radix, digits) = split_int(s.trim());
    if neg {
        return Err(invalid());
    }
    let mag = parse_digits_u128(digits, radix).ok_or_else(invalid)?;
    T::try_from(mag).map_err(|_| invalid())
}

/// Parse a float per YAML 1.2 (`.inf`, `-.inf`, `.nan` in any case).
pub(crate) fn parse_yaml12_f64(s: &str, location: Location) -> Result<f64, Error> {
    let t = s.trim();
    let lower = t.to_ascii_lowercase();
    match lower.as_str() {
        ".nan" | "+.nan" | "-.nan" => Ok(f64::NAN),
        ".inf" | "+.inf" => Ok(f64::INFINITY),
        "-.inf" => Ok(f64::NEG_INFINITY),
        _ => {
            let cleaned: String = t.chars().filter(|c| *c != '_').collect();
            cleaned
                .parse::<f64>()
                .map_err(|_| Error::msg(format!("invalid floating point value: `{s}`")).with_location(location))
        }
    }
}

fn looks_like_yaml_float(t: &str) -> bool {
    let body = t.strip_prefix(['+', '-']).unwrap_or(t);
    if body.is_empty() {
        return false;
    }
    let lower = body.to_ascii_lowercase();
    if lower == ".inf" || lower == ".nan" {
        return true;
    }
    // rust accepts "inf", "nan", "infinity" which YAML does not.
    if !body.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
        return false;
    }
    body.chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-' | '_'))
        && body.chars().any(|c| c.is_ascii_digit())
}

/// Resolve the implicit tag of a plain, untagged scalar (YAML 1.2 core schema).
pub(crate) fn resolve_plain_tag(value: &str) -> &'static str {
    if matches!(value, "" | "~" | "null" | "Null" | "NULL") {
        return TAG_NULL;
    }
    if parse_yaml12_bool(value).is_some() {
        return TAG_BOOL;
    }
    if parse_int_signed::<i128>(value, "int", Location::UNKNOWN).is_ok()
        || parse_int_unsigned::<u128>(value, "int", Location::UNKNOWN).is_ok()
    {
        return TAG_INT;
    }
    if looks_like_yaml_float(value) && parse_yaml12_f64(value, Location::UNKNOWN).is_ok() {
        return TAG_FLOAT;
    }
    TAG_STR
}

/// Canonical text for a float, readable back as `!!float`.
pub(crate) fn format_float(v: f64) -> String {
    if v.is_nan() {
        ".nan".to_string()
    } else if v.is_infinite() {
        if v.is_sign_negative() { "-.inf".to_string() } else { ".inf".to_string() }
    } else if v.fract() == 0.0 && v.abs() < 1e16 {
        format!("{v:.1}")
    } else {
        format!("{v}")
    }
}
