//! Exact rational numbers and their canonical JSON encoding.
//!
//! Every value that crosses the verification boundary is an [`ExactRational`].
//! The wire form is `{"num": <integer>, "den": <integer>}` with both integers
//! written verbatim (serde_json's `arbitrary_precision`), so no floating-point
//! value ever sits between the caller and the verification engine.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{Add, Mul, Neg, Sub};
use std::str::FromStr;

use num_bigint::BigInt;
use num_integer::Integer;
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value};
use thiserror::Error;

/// Largest decimal exponent accepted by the literal parser.
const MAX_DECIMAL_EXPONENT: i64 = 4096;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("expected a rational object {{\"num\", \"den\"}}, got {0}")]
    NotAnObject(String),
    #[error("missing field `{0}` in rational")]
    MissingField(&'static str),
    #[error("field `{field}` must be an integer, got {value}")]
    NotAnInteger { field: &'static str, value: String },
    #[error("denominator must be non-zero")]
    ZeroDenominator,
    #[error("invalid rational literal `{0}`")]
    InvalidLiteral(String),
}

/// A fraction of two arbitrary-precision integers.
///
/// The denominator is always positive. The fraction is not necessarily in
/// lowest terms; equality, ordering and hashing all work on the represented
/// value.
#[derive(Debug, Clone)]
pub struct ExactRational {
    numerator: BigInt,
    denominator: BigInt,
}

impl ExactRational {
    pub fn new(
        numerator: impl Into<BigInt>,
        denominator: impl Into<BigInt>,
    ) -> Result<Self, DecodeError> {
        let numerator = numerator.into();
        let denominator = denominator.into();
        if denominator.is_zero() {
            return Err(DecodeError::ZeroDenominator);
        }
        if denominator.is_negative() {
            Ok(Self {
                numerator: -numerator,
                denominator: -denominator,
            })
        } else {
            Ok(Self {
                numerator,
                denominator,
            })
        }
    }

    /// Builds `numerator / denominator` from literals known at compile time.
    ///
    /// # Panics
    ///
    /// Panics if `denominator` is zero.
    pub(crate) fn ratio(numerator: i64, denominator: u64) -> Self {
        assert!(denominator != 0, "ratio denominator must be non-zero");
        Self {
            numerator: BigInt::from(numerator),
            denominator: BigInt::from(denominator),
        }
    }

    pub fn from_integer(value: impl Into<BigInt>) -> Self {
        Self {
            numerator: value.into(),
            denominator: BigInt::one(),
        }
    }

    pub fn zero() -> Self {
        Self::from_integer(0)
    }

    pub fn one() -> Self {
        Self::from_integer(1)
    }

    pub fn numerator(&self) -> &BigInt {
        &self.numerator
    }

    pub fn denominator(&self) -> &BigInt {
        &self.denominator
    }

    pub fn is_zero(&self) -> bool {
        self.numerator.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.numerator.is_positive()
    }

    pub fn is_negative(&self) -> bool {
        self.numerator.is_negative()
    }

    pub fn abs(&self) -> Self {
        Self {
            numerator: self.numerator.abs(),
            denominator: self.denominator.clone(),
        }
    }

    /// Same value in lowest terms.
    pub fn reduced(&self) -> Self {
        let gcd = self.numerator.gcd(&self.denominator);
        if gcd.is_one() || gcd.is_zero() {
            return self.clone();
        }
        Self {
            numerator: &self.numerator / &gcd,
            denominator: &self.denominator / &gcd,
        }
    }

    pub fn checked_div(&self, rhs: &Self) -> Option<Self> {
        if rhs.is_zero() {
            return None;
        }
        Some((self.to_big_rational() / rhs.to_big_rational()).into())
    }

    pub fn to_big_rational(&self) -> BigRational {
        BigRational::new(self.numerator.clone(), self.denominator.clone())
    }

    /// Nearest `f64`. Lossy; only meant for feeding numeric integrators.
    pub fn to_f64(&self) -> f64 {
        self.to_big_rational().to_f64().unwrap_or(f64::NAN)
    }

    /// Canonical wire form `{"num": n, "den": d}`.
    pub fn encode(&self) -> Value {
        let mut object = Map::new();
        object.insert("num".to_string(), integer_value(&self.numerator));
        object.insert("den".to_string(), integer_value(&self.denominator));
        Value::Object(object)
    }

    /// Parses the wire form. Only integer literals are accepted; a float or an
    /// exponent in either field is an error rather than something to round.
    pub fn decode(value: &Value) -> Result<Self, DecodeError> {
        let object = value
            .as_object()
            .ok_or_else(|| DecodeError::NotAnObject(value.to_string()))?;
        let numerator = integer_field(object, "num")?;
        let denominator = integer_field(object, "den")?;
        Self::new(numerator, denominator)
    }

    fn parse_decimal(literal: &str) -> Result<Self, DecodeError> {
        let invalid = || DecodeError::InvalidLiteral(literal.to_string());

        let (mantissa, exponent) = match literal.find(|c: char| c == 'e' || c == 'E') {
            Some(idx) => {
                let exponent: i64 = literal[idx + 1..].parse().map_err(|_| invalid())?;
                (&literal[..idx], exponent)
            }
            None => (literal, 0),
        };
        if exponent.abs() > MAX_DECIMAL_EXPONENT {
            return Err(invalid());
        }

        let (negative, digits) = match mantissa.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, mantissa.strip_prefix('+').unwrap_or(mantissa)),
        };
        let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
        let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
        if (int_part.is_empty() && frac_part.is_empty())
            || !all_digits(int_part)
            || !all_digits(frac_part)
        {
            return Err(invalid());
        }

        let mut numerator: BigInt = format!("{int_part}{frac_part}")
            .parse()
            .map_err(|_| invalid())?;
        let scale = exponent - frac_part.len() as i64;
        let ten = BigInt::from(10u32);
        let mut denominator = BigInt::one();
        if scale >= 0 {
            numerator *= num_traits::pow(ten, scale as usize);
        } else {
            denominator = num_traits::pow(ten, scale.unsigned_abs() as usize);
        }
        if negative {
            numerator = -numerator;
        }
        Self::new(numerator, denominator)
    }
}

fn integer_value(value: &BigInt) -> Value {
    let text = value.to_string();
    // A BigInt always prints as a JSON integer; the string fallback is rejected by decode.
    Number::from_str(&text)
        .map(Value::Number)
        .unwrap_or(Value::String(text))
}

fn integer_field(object: &Map<String, Value>, field: &'static str) -> Result<BigInt, DecodeError> {
    let value = object.get(field).ok_or(DecodeError::MissingField(field))?;
    let not_integer = || DecodeError::NotAnInteger {
        field,
        value: value.to_string(),
    };
    let Value::Number(number) = value else {
        return Err(not_integer());
    };
    let text = number.to_string();
    let digits = text.strip_prefix('-').unwrap_or(&text);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(not_integer());
    }
    text.parse().map_err(|_| not_integer())
}

impl FromStr for ExactRational {
    type Err = DecodeError;

    /// Accepts `p/q`, plain integers and decimal literals such as `-0.1` or
    /// `2.5e-3`, all converted exactly.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.split_once('/') {
            Some((num, den)) => {
                let invalid = || DecodeError::InvalidLiteral(s.to_string());
                let num: BigInt = num.trim().parse().map_err(|_| invalid())?;
                let den: BigInt = den.trim().parse().map_err(|_| invalid())?;
                Self::new(num, den)
            }
            None => Self::parse_decimal(s),
        }
    }
}

impl fmt::Display for ExactRational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.denominator.is_one() {
            write!(f, "{}", self.numerator)
        } else {
            write!(f, "{}/{}", self.numerator, self.denominator)
        }
    }
}

impl PartialEq for ExactRational {
    fn eq(&self, other: &Self) -> bool {
        &self.numerator * &other.denominator == &other.numerator * &self.denominator
    }
}

impl Eq for ExactRational {}

impl Ord for ExactRational {
    fn cmp(&self, other: &Self) -> Ordering {
        // Denominators are positive, so cross-multiplication preserves order.
        (&self.numerator * &other.denominator).cmp(&(&other.numerator * &self.denominator))
    }
}

impl PartialOrd for ExactRational {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Hash for ExactRational {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let reduced = self.reduced();
        reduced.numerator.hash(state);
        reduced.denominator.hash(state);
    }
}

impl From<BigRational> for ExactRational {
    fn from(value: BigRational) -> Self {
        let (numerator, denominator) = value.into_raw();
        Self {
            numerator,
            denominator,
        }
    }
}

impl From<BigInt> for ExactRational {
    fn from(value: BigInt) -> Self {
        Self::from_integer(value)
    }
}

impl From<i64> for ExactRational {
    fn from(value: i64) -> Self {
        Self::from_integer(value)
    }
}

macro_rules! forward_binop {
    ($trait:ident, $method:ident) => {
        impl<'a> $trait<&'a ExactRational> for &'a ExactRational {
            type Output = ExactRational;
            fn $method(self, rhs: &'a ExactRational) -> ExactRational {
                self.to_big_rational().$method(rhs.to_big_rational()).into()
            }
        }

        impl $trait for ExactRational {
            type Output = ExactRational;
            fn $method(self, rhs: ExactRational) -> ExactRational {
                (&self).$method(&rhs)
            }
        }
    };
}

forward_binop!(Add, add);
forward_binop!(Sub, sub);
forward_binop!(Mul, mul);

impl Neg for ExactRational {
    type Output = ExactRational;
    fn neg(self) -> ExactRational {
        Self {
            numerator: -self.numerator,
            denominator: self.denominator,
        }
    }
}

impl Neg for &ExactRational {
    type Output = ExactRational;
    fn neg(self) -> ExactRational {
        -self.clone()
    }
}

impl Serialize for ExactRational {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.encode().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ExactRational {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::decode(&value).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn q(num: i64, den: i64) -> ExactRational {
        ExactRational::new(num, den).expect("non-zero denominator")
    }

    #[test]
    fn equality_ignores_representation() {
        assert_eq!(q(1, 2), q(2, 4));
        assert_eq!(q(-3, 6), q(1, -2));
        assert_ne!(q(1, 3), q(1, 2));
        assert_eq!(q(2, 4).reduced().numerator(), &BigInt::from(1));
    }

    #[test]
    fn negative_denominator_is_normalized() {
        let value = q(3, -4);
        assert_eq!(value.numerator(), &BigInt::from(-3));
        assert_eq!(value.denominator(), &BigInt::from(4));
    }

    #[test]
    fn zero_denominator_is_rejected() {
        assert_eq!(ExactRational::new(1, 0), Err(DecodeError::ZeroDenominator));
    }

    #[test]
    fn decimal_literals_are_exact() {
        assert_eq!("0.1".parse::<ExactRational>().unwrap(), q(1, 10));
        assert_eq!("-0.1".parse::<ExactRational>().unwrap(), q(-1, 10));
        assert_eq!("2.5e-3".parse::<ExactRational>().unwrap(), q(1, 400));
        assert_eq!("1E3".parse::<ExactRational>().unwrap(), q(1000, 1));
        assert_eq!("8/3".parse::<ExactRational>().unwrap(), q(8, 3));
        assert_eq!(" 5 ".parse::<ExactRational>().unwrap(), q(5, 1));
        assert!("abc".parse::<ExactRational>().is_err());
        assert!("1/0".parse::<ExactRational>().is_err());
        assert!("".parse::<ExactRational>().is_err());
        assert!("1e99999".parse::<ExactRational>().is_err());
    }

    #[test]
    fn ordering_and_arithmetic_are_exact() {
        let tenth = q(1, 10);
        assert!(q(1, 10) < q(1, 9));
        assert_eq!(&(&tenth + &tenth) + &tenth, q(3, 10));
        assert_eq!(&q(6, 1) * &tenth, q(3, 5));
        assert_eq!(&q(1, 2) - &q(3, 4), q(-1, 4));
        assert_eq!(q(-5, 2).abs(), q(5, 2));
        assert_eq!(-q(1, 3), q(-1, 3));
        assert_eq!(q(1, 2).checked_div(&q(1, 4)), Some(q(2, 1)));
        assert_eq!(q(1, 2).checked_div(&ExactRational::zero()), None);
        assert_eq!(std::cmp::max(q(1, 3), q(2, 7)), q(1, 3));
    }

    #[test]
    fn encode_uses_exact_integers() {
        assert_eq!(q(-1, 10).encode(), json!({"num": -1, "den": 10}));
        let huge = ExactRational::new(
            "123456789012345678901234567890".parse::<BigInt>().unwrap(),
            BigInt::from(7),
        )
        .unwrap();
        let text = huge.encode().to_string();
        assert!(text.contains("123456789012345678901234567890"), "{text}");
    }

    #[test]
    fn decode_rejects_malformed_values() {
        assert!(matches!(
            ExactRational::decode(&json!(0.5)),
            Err(DecodeError::NotAnObject(_))
        ));
        assert_eq!(
            ExactRational::decode(&json!({"num": 1})),
            Err(DecodeError::MissingField("den"))
        );
        assert!(matches!(
            ExactRational::decode(&json!({"num": "1", "den": 2})),
            Err(DecodeError::NotAnInteger { field: "num", .. })
        ));
        assert_eq!(
            ExactRational::decode(&json!({"num": 1, "den": 0})),
            Err(DecodeError::ZeroDenominator)
        );
        let float: Value = serde_json::from_str(r#"{"num": 1.0, "den": 2}"#).unwrap();
        assert!(matches!(
            ExactRational::decode(&float),
            Err(DecodeError::NotAnInteger { field: "num", .. })
        ));
        let exponent: Value = serde_json::from_str(r#"{"num": 1, "den": 1e1}"#).unwrap();
        assert!(ExactRational::decode(&exponent).is_err());
    }

    #[test]
    fn decode_normalizes_sign() {
        let value = ExactRational::decode(&json!({"num": 1, "den": -10})).unwrap();
        assert_eq!(value, q(-1, 10));
        assert!(value.denominator().is_positive());
    }

    #[test]
    fn serde_matches_codec() {
        let text = serde_json::to_string(&q(5, 1)).unwrap();
        assert_eq!(text, r#"{"den":1,"num":5}"#);
        let back: ExactRational = serde_json::from_str(r#"{"num": -2, "den": 6}"#).unwrap();
        assert_eq!(back, q(-1, 3));
        let err = serde_json::from_str::<ExactRational>(r#"{"num": 1, "den": 0}"#).unwrap_err();
        assert!(err.to_string().contains("non-zero"));
    }

    #[test]
    fn to_f64_is_close() {
        assert!((q(1, 3).to_f64() - 1.0 / 3.0).abs() < 1e-15);
        assert_eq!(q(-5, 1).to_f64(), -5.0);
    }

    #[test]
    fn ratio_matches_checked_constructor() {
        assert_eq!(ExactRational::ratio(981, 100), q(981, 100));
        assert_eq!(ExactRational::ratio(-8, 3).denominator(), &BigInt::from(3));
    }

    #[test]
    #[should_panic(expected = "non-zero")]
    fn ratio_rejects_zero_denominator() {
        let _ = ExactRational::ratio(1, 0);
    }

    #[test]
    fn huge_integers_encode_as_json_numbers() {
        let huge: BigInt = "-123456789012345678901234567890123456789".parse().unwrap();
        let value = ExactRational::new(huge.clone(), 7).unwrap();
        let encoded = value.encode();
        assert!(encoded["num"].is_number(), "{encoded}");
        assert!(encoded["den"].is_number(), "{encoded}");
        assert!(encoded.to_string().contains(&huge.to_string()));
        assert_eq!(ExactRational::decode(&encoded).unwrap(), value);
    }

    fn big_integer() -> impl Strategy<Value = BigInt> {
        (any::<bool>(), prop::collection::vec(any::<u32>(), 3..8)).prop_map(|(negative, mut digits)| {
            // Keep the top digit set so the magnitude always needs more than 64 bits.
            if let Some(top) = digits.last_mut() {
                *top |= 1;
            }
            let magnitude = BigInt::from_slice(num_bigint::Sign::Plus, &digits);
            if negative {
                -magnitude
            } else {
                magnitude
            }
        })
    }

    proptest! {
        #[test]
        fn big_values_survive_encoding(num in big_integer(), den in big_integer()) {
            let den = den.abs() + 1;
            let value = ExactRational::new(num.clone(), den).unwrap();
            let text = value.encode().to_string();
            prop_assert!(text.contains(&num.to_string()));
            let parsed: Value = serde_json::from_str(&text).unwrap();
            prop_assert_eq!(ExactRational::decode(&parsed).unwrap(), value);
        }

        #[test]
        fn decode_encode_round_trips(num in any::<i64>(), den in any::<i64>().prop_filter("non-zero", |d| *d != 0)) {
            let value = ExactRational::new(num, den).unwrap();
            let text = value.encode().to_string();
            let parsed: Value = serde_json::from_str(&text).unwrap();
            let back = ExactRational::decode(&parsed).unwrap();
            prop_assert_eq!(&back, &value);
            prop_assert!(back.denominator().is_positive());
        }
    }
}
