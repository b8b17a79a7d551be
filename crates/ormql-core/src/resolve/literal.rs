//! Numeric literal classification and decimal normalization.

use ormql_proto::SqlType;

use crate::config::DecimalFormat;
use crate::error::{Result, SemanticError};

/// Significant digits kept by the approximate (scientific) rendering.
const APPROXIMATE_PRECISION: usize = 17;

/// Zero padding allowed when an exponent is expanded into plain notation.
const MAX_PLAIN_PADDING: u64 = 1 << 16;

/// A classified numeric literal and its SQL text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumericLiteral {
    pub ty: SqlType,
    pub text: String,
}

/// Classifies a numeric literal by its suffix or shape and renders it.
///
/// Suffixes `bi`, `bd`, `l`, `f` and `d` (any case) select big integer, big
/// decimal, long, float and double. Unsuffixed literals containing a decimal
/// point or exponent are doubles; plain integers are `integer` when they fit,
/// then `long`, then big integer. Big forms are re-rendered with `format`.
pub fn classify_numeric(text: &str, format: DecimalFormat) -> Result<NumericLiteral> {
    let invalid = || SemanticError::InvalidLiteral(text.to_string());
    let trimmed = text.trim();
    let lower = trimmed.to_ascii_lowercase();

    if let Some(hex) = lower.strip_prefix("0x") {
        let value = i64::from_str_radix(hex.trim_end_matches('l'), 16).map_err(|_| invalid())?;
        let ty = if lower.ends_with('l') || i32::try_from(value).is_err() {
            SqlType::Long
        } else {
            SqlType::Integer
        };
        return Ok(NumericLiteral { ty, text: value.to_string() });
    }

    let (ty, body) = if let Some(body) = lower.strip_suffix("bi") {
        (SqlType::BigInteger, body)
    } else if let Some(body) = lower.strip_suffix("bd") {
        (SqlType::BigDecimal, body)
    } else if let Some(body) = lower.strip_suffix('l') {
        (SqlType::Long, body)
    } else if let Some(body) = lower.strip_suffix('f') {
        (SqlType::Float, body)
    } else if let Some(body) = lower.strip_suffix('d') {
        (SqlType::Double, body)
    } else if lower.contains(['.', 'e']) {
        (SqlType::Double, lower.as_str())
    } else {
        let parts = DecimalParts::parse(&lower).ok_or_else(invalid)?;
        if parts.is_integral() {
            let ty = if lower.parse::<i32>().is_ok() {
                SqlType::Integer
            } else if lower.parse::<i64>().is_ok() {
                SqlType::Long
            } else {
                SqlType::BigInteger
            };
            let text = if ty == SqlType::BigInteger {
                parts.render(format).ok_or_else(invalid)?
            } else {
                trimmed.trim_start_matches('+').to_string()
            };
            return Ok(NumericLiteral { ty, text });
        }
        return Err(invalid());
    };

    let parts = DecimalParts::parse(body).ok_or_else(invalid)?;
    let text = match ty {
        SqlType::BigInteger | SqlType::Long if !parts.is_integral() => return Err(invalid()),
        SqlType::Long => {
            body.parse::<i64>().map_err(|_| invalid())?;
            body.trim_start_matches('+').to_string()
        }
        SqlType::BigInteger | SqlType::BigDecimal => parts.render(format).ok_or_else(invalid)?,
        _ => body.trim_start_matches('+').to_string(),
    };
    Ok(NumericLiteral { ty, text })
}

/// Decomposed decimal: `digits` with the point after `point` digits once
/// the exponent is applied. Exponent and point stay within the `i32` scale
/// range of a big decimal.
#[derive(Debug, Clone, PartialEq, Eq)]
struct DecimalParts {
    negative: bool,
    digits: Vec<u8>,
    point: i64,
    exponent: i32,
    has_point: bool,
}

impl DecimalParts {
    fn parse(text: &str) -> Option<Self> {
        let (negative, rest) = match text.as_bytes().first()? {
            b'-' => (true, &text[1..]),
            b'+' => (false, &text[1..]),
            _ => (false, text),
        };
        let (mantissa, exponent) = match rest.split_once('e') {
            Some((m, e)) => (m, Some(e)),
            None => (rest, None),
        };
        let exponent = match exponent {
            Some(e) => e.parse::<i32>().ok()?,
            None => 0,
        };
        let (int_part, frac_part, has_point) = match mantissa.split_once('.') {
            Some((i, f)) => (i, f, true),
            None => (mantissa, "", false),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return None;
        }
        let digits: Vec<u8> = int_part
            .bytes()
            .chain(frac_part.bytes())
            .map(|b| b.is_ascii_digit().then(|| b - b'0'))
            .collect::<Option<_>>()?;
        let point = i64::try_from(int_part.len())
            .ok()?
            .checked_add(i64::from(exponent))?;
        i32::try_from(point).ok()?;
        Some(Self {
            negative,
            digits,
            point,
            exponent,
            has_point,
        })
    }

    fn is_integral(&self) -> bool {
        !self.has_point && self.exponent == 0
    }

    fn render(&self, format: DecimalFormat) -> Option<String> {
        match format {
            DecimalFormat::Exact => self.plain(),
            DecimalFormat::Approximate => Some(self.scientific()),
        }
    }

    /// Plain notation, preserving the written scale. `None` when the
    /// exponent would expand into more than [`MAX_PLAIN_PADDING`] zeros.
    fn plain(&self) -> Option<String> {
        let point = self.point;
        let len = i64::try_from(self.digits.len()).ok()?;
        let padding = if point <= 0 { point.unsigned_abs() } else { (point - len).max(0) as u64 };
        if padding > MAX_PLAIN_PADDING {
            return None;
        }
        let digit = |d: &u8| char::from(b'0' + d);

        let (mut int_part, frac_part): (String, String) = if point <= 0 {
            let zeros = "0".repeat(point.unsigned_abs() as usize);
            ("0".into(), zeros + &self.digits.iter().map(digit).collect::<String>())
        } else if point >= len {
            let zeros = "0".repeat((point - len) as usize);
            (self.digits.iter().map(digit).collect::<String>() + &zeros, String::new())
        } else {
            let (i, f) = self.digits.split_at(point as usize);
            (i.iter().map(digit).collect(), f.iter().map(digit).collect())
        };

        let trimmed = int_part.trim_start_matches('0');
        int_part = if trimmed.is_empty() { "0".into() } else { trimmed.into() };

        let sign = if self.negative { "-" } else { "" };
        if frac_part.is_empty() {
            Some(format!("{sign}{int_part}"))
        } else {
            Some(format!("{sign}{int_part}.{frac_part}"))
        }
    }

    /// Scientific notation with one leading digit, at least one fraction
    /// digit and up to [`APPROXIMATE_PRECISION`] significant digits.
    fn scientific(&self) -> String {
        let Some(first) = self.digits.iter().position(|&d| d != 0) else {
            return "0.0E0".to_string();
        };
        let last = self.digits.iter().rposition(|&d| d != 0).unwrap_or(first);
        let mut significant: Vec<u8> = self.digits[first..=last].to_vec();
        let mut exponent = self.point - first as i64 - 1;

        if significant.len() > APPROXIMATE_PRECISION {
            let round_up = significant[APPROXIMATE_PRECISION] >= 5;
            significant.truncate(APPROXIMATE_PRECISION);
            if round_up {
                let mut i = significant.len();
                loop {
                    if i == 0 {
                        significant.insert(0, 1);
                        significant.pop();
                        exponent += 1;
                        break;
                    }
                    i -= 1;
                    if significant[i] == 9 {
                        significant[i] = 0;
                    } else {
                        significant[i] += 1;
                        break;
                    }
                }
            }
            while significant.len() > 1 && significant.last() == Some(&0) {
                significant.pop();
            }
        }

        let head = char::from(b'0' + significant[0]);
        let tail: String = if significant.len() > 1 {
            significant[1..].iter().map(|d| char::from(b'0' + d)).collect()
        } else {
            "0".to_string()
        };
        let sign = if self.negative { "-" } else { "" };
        format!("{sign}{head}.{tail}E{exponent}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;

    fn exact(text: &str) -> NumericLiteral {
        classify_numeric(text, DecimalFormat::Exact).unwrap()
    }

    fn approx(text: &str) -> NumericLiteral {
        classify_numeric(text, DecimalFormat::Approximate).unwrap()
    }

    #[test]
    fn test_suffix_classification() {
        assert_eq!(exact("10bi").ty, SqlType::BigInteger);
        assert_eq!(exact("10.5BD").ty, SqlType::BigDecimal);
        assert_eq!(exact("10L").ty, SqlType::Long);
        assert_eq!(exact("1.5f").ty, SqlType::Float);
        assert_eq!(exact("1.5D").ty, SqlType::Double);
        assert_eq!(exact("1.5f").text, "1.5");
    }

    #[test]
    fn test_unsuffixed_classification() {
        assert_eq!(exact("42"), NumericLiteral { ty: SqlType::Integer, text: "42".into() });
        assert_eq!(exact("3000000000").ty, SqlType::Long);
        assert_eq!(exact("99999999999999999999").ty, SqlType::BigInteger);
        assert_eq!(exact("1.25").ty, SqlType::Double);
        assert_eq!(exact("1e3").ty, SqlType::Double);
        assert_eq!(exact("0x1F").text, "31");
    }

    #[test]
    fn test_exact_decimal_rendering() {
        assert_eq!(exact("123.450bd").text, "123.450");
        assert_eq!(exact("1.5e3bd").text, "1500");
        assert_eq!(exact("12e-4bd").text, "0.0012");
        assert_eq!(exact("-0042bd").text, "-42");
        assert_eq!(exact(".5bd").text, "0.5");
    }

    #[test]
    fn test_approximate_decimal_rendering() {
        assert_eq!(approx("123.45bd").text, "1.2345E2");
        assert_eq!(approx("0.00123bd").text, "1.23E-3");
        assert_eq!(approx("100bi").text, "1.0E2");
        assert_eq!(approx("0bd").text, "0.0E0");
        assert_eq!(approx("99999999999999999999bi").text, "1.0E20");
        assert_eq!(approx("123456789012345678bd").text, "1.2345678901234568E17");
        assert_eq!(approx("1e100000bd").text, "1.0E100000");
    }

    #[test]
    fn test_invalid_literals() {
        for text in [
            "1.2.3",
            "abc",
            "1.5l",
            "12x",
            "",
            "e5",
            "1e9223372036854775807bd",
            "1e4000000000bd",
            "1e2147483647bd",
            "1e100000bd",
        ] {
            let err = classify_numeric(text, DecimalFormat::Exact).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidLiteral, "{text}");
        }
    }
}
