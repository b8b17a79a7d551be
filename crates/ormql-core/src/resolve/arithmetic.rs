//! Type rules for binary arithmetic.

use ormql_proto::{ArithmeticOp, SqlType};

use crate::error::{Result, SemanticError};

/// Outcome of arithmetic type resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArithmeticType {
    Known(SqlType),
    /// Neither operand is typed; `double` is a best-effort guess, not a guarantee.
    Guessed(SqlType),
    /// Deliberately left open (e.g. `:p - date`: a duration or another date).
    Unknown,
}

/// Expected type for an untyped parameter operand, given the other operand's
/// type and side.
///
/// Date/time operands follow their own rules: `date + ?` expects a numeric
/// duration, `date - ?` expects the same date/time type, and `? - date` is
/// ambiguous and infers nothing.
pub fn expected_operand_type(op: ArithmeticOp, known: &SqlType, known_on_left: bool) -> Option<SqlType> {
    if !known.is_datetime() {
        return Some(known.clone());
    }
    match op {
        ArithmeticOp::Add => Some(SqlType::Double),
        ArithmeticOp::Subtract if known_on_left => Some(known.clone()),
        ArithmeticOp::Subtract | ArithmeticOp::Multiply | ArithmeticOp::Divide => None,
    }
}

/// Result type of `lhs op rhs`.
///
/// Numeric operands widen double > float > big decimal > big integer > long >
/// integer; otherwise whichever operand is typed wins.
pub fn result_type(
    op: ArithmeticOp,
    lhs: Option<&SqlType>,
    rhs: Option<&SqlType>,
    text: &str,
) -> Result<ArithmeticType> {
    let lhs_dt = lhs.is_some_and(SqlType::is_datetime);
    let rhs_dt = rhs.is_some_and(SqlType::is_datetime);

    if lhs_dt || rhs_dt {
        return datetime_result(op, lhs, rhs, lhs_dt, rhs_dt, text);
    }

    Ok(match (lhs, rhs) {
        (Some(l), Some(r)) => ArithmeticType::Known(widen(l, r)),
        (Some(t), None) | (None, Some(t)) => ArithmeticType::Known(t.clone()),
        (None, None) => ArithmeticType::Guessed(SqlType::Double),
    })
}

fn datetime_result(
    op: ArithmeticOp,
    lhs: Option<&SqlType>,
    rhs: Option<&SqlType>,
    lhs_dt: bool,
    rhs_dt: bool,
    text: &str,
) -> Result<ArithmeticType> {
    let invalid = || SemanticError::InvalidDateTimeArithmetic(text.to_string());
    match op {
        ArithmeticOp::Multiply | ArithmeticOp::Divide => Err(invalid()),
        ArithmeticOp::Add => match (lhs_dt, rhs_dt) {
            (true, true) => Err(invalid()),
            (true, false) => Ok(ArithmeticType::Known(lhs.cloned().ok_or_else(invalid)?)),
            _ => Ok(ArithmeticType::Known(rhs.cloned().ok_or_else(invalid)?)),
        },
        ArithmeticOp::Subtract => match (lhs_dt, rhs_dt) {
            (true, true) => Ok(ArithmeticType::Known(SqlType::Double)),
            (true, false) => Ok(ArithmeticType::Known(lhs.cloned().ok_or_else(invalid)?)),
            // `? - date` may be a date or a duration
            _ if lhs.is_none() => Ok(ArithmeticType::Unknown),
            _ => Err(invalid()),
        },
    }
}

/// The wider of two known types.
fn widen(lhs: &SqlType, rhs: &SqlType) -> SqlType {
    match (lhs.numeric_rank(), rhs.numeric_rank()) {
        (Some(l), Some(r)) if r > l => rhs.clone(),
        (Some(_), _) => lhs.clone(),
        (None, Some(_)) => rhs.clone(),
        (None, None) => lhs.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const ORDER: [SqlType; 6] = [
        SqlType::Integer,
        SqlType::Long,
        SqlType::BigInteger,
        SqlType::BigDecimal,
        SqlType::Float,
        SqlType::Double,
    ];

    fn known(op: ArithmeticOp, l: &SqlType, r: &SqlType) -> SqlType {
        match result_type(op, Some(l), Some(r), "x").unwrap() {
            ArithmeticType::Known(t) => t,
            other => panic!("expected known type, got {:?}", other),
        }
    }

    #[test]
    fn test_widening_order_all_pairs() {
        for (i, a) in ORDER.iter().enumerate() {
            for (j, b) in ORDER.iter().enumerate() {
                let expected = if i >= j { a } else { b };
                assert_eq!(&known(ArithmeticOp::Add, a, b), expected, "{} + {}", a, b);
                assert_eq!(&known(ArithmeticOp::Multiply, b, a), expected, "{} * {}", b, a);
            }
        }
    }

    #[test]
    fn test_float_outranks_big_decimal() {
        for (l, r) in [
            (SqlType::Float, SqlType::BigDecimal),
            (SqlType::BigDecimal, SqlType::Float),
        ] {
            assert_eq!(known(ArithmeticOp::Add, &l, &r), SqlType::Float);
            assert_eq!(known(ArithmeticOp::Divide, &l, &r), SqlType::Float);
        }
    }

    #[test]
    fn test_widening_examples() {
        assert_eq!(
            known(ArithmeticOp::Add, &SqlType::Integer, &SqlType::Long),
            SqlType::Long
        );
        assert_eq!(
            known(ArithmeticOp::Add, &SqlType::Float, &SqlType::BigDecimal),
            SqlType::Float
        );
        assert_eq!(
            known(ArithmeticOp::Add, &SqlType::Short, &SqlType::Long),
            SqlType::Long
        );
    }

    #[test]
    fn test_one_side_known_falls_back() {
        assert_eq!(
            result_type(ArithmeticOp::Add, Some(&SqlType::Long), None, "x").unwrap(),
            ArithmeticType::Known(SqlType::Long)
        );
    }

    #[test]
    fn test_both_unknown_is_documented_guess() {
        assert_eq!(
            result_type(ArithmeticOp::Add, None, None, ":p1 + :p2").unwrap(),
            ArithmeticType::Guessed(SqlType::Double)
        );
    }

    #[test]
    fn test_datetime_arithmetic() {
        let ts = SqlType::Timestamp;
        assert_eq!(known(ArithmeticOp::Subtract, &ts, &ts), SqlType::Double);
        assert_eq!(
            known(ArithmeticOp::Add, &SqlType::Date, &SqlType::Integer),
            SqlType::Date
        );
        assert_eq!(
            known(ArithmeticOp::Add, &SqlType::Integer, &SqlType::Date),
            SqlType::Date
        );
        assert_eq!(
            known(ArithmeticOp::Subtract, &ts, &SqlType::Double),
            SqlType::Timestamp
        );

        for op in [ArithmeticOp::Multiply, ArithmeticOp::Divide] {
            let err = result_type(op, Some(&ts), Some(&SqlType::Integer), "t * 2").unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidDateTimeArithmetic);
        }
        let err = result_type(ArithmeticOp::Add, Some(&ts), Some(&ts), "t + t").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidDateTimeArithmetic);
        let err =
            result_type(ArithmeticOp::Subtract, Some(&SqlType::Integer), Some(&ts), "1 - t").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidDateTimeArithmetic);
        assert_eq!(
            result_type(ArithmeticOp::Subtract, None, Some(&ts), ":p - t").unwrap(),
            ArithmeticType::Unknown
        );
    }

    #[test]
    fn test_expected_operand_types() {
        let date = SqlType::Date;
        assert_eq!(
            expected_operand_type(ArithmeticOp::Add, &date, true),
            Some(SqlType::Double)
        );
        assert_eq!(
            expected_operand_type(ArithmeticOp::Subtract, &date, true),
            Some(SqlType::Date)
        );
        assert_eq!(expected_operand_type(ArithmeticOp::Subtract, &date, false), None);
        assert_eq!(
            expected_operand_type(ArithmeticOp::Multiply, &SqlType::Long, false),
            Some(SqlType::Long)
        );
    }
}
