//! Validation of compute resource quantities (`"64Mi"`, `"200m"`, `"1e3"` ...).
//!
//! Accepts the same grammar as the Kubernetes API server:
//!
//! ```text
//! quantity        ::= signedNumber suffix
//! signedNumber    ::= [ "+" | "-" ] number
//! number          ::= digits | digits "." digits | digits "." | "." digits
//! suffix          ::= binarySI | decimalExponent | decimalSI
//! binarySI        ::= Ki | Mi | Gi | Ti | Pi | Ei
//! decimalSI       ::= m | "" | k | M | G | T | P | E
//! decimalExponent ::= ("e" | "E") [ "+" | "-" ] digits
//! ```

use k8s_openapi::apimachinery::pkg::api::resource::Quantity as K8sQuantity;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuantityFormat {
    BinarySI,
    DecimalSI,
    DecimalExponent,
}

/// A quantity that passed validation.
///
/// Holds the input text verbatim, which is what gets written into the
/// workload, alongside its value in milli-units.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Quantity {
    text: String,
    format: QuantityFormat,
    millis: i128,
}

impl Quantity {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn format(&self) -> QuantityFormat {
        self.format
    }

    /// Value in thousandths of the base unit, rounded away from zero and
    /// clamped to the `i128` range.
    pub fn millis(&self) -> i128 {
        self.millis
    }

    pub fn to_k8s(&self) -> K8sQuantity {
        K8sQuantity(self.text.clone())
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl FromStr for Quantity {
    type Err = QuantityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let number = Number::scan(s)?;
        let suffix = Suffix::parse(number.rest)?;
        let millis = number.millis(&suffix);

        Ok(Self {
            text: s.to_string(),
            format: suffix.format(),
            millis,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantityError {
    #[error("quantity is empty")]
    Empty,
    #[error("expected a number")]
    InvalidNumber,
    #[error("unknown suffix {0:?}")]
    InvalidSuffix(String),
}

/// Which of the four quantity fields of `spec.resources` is being validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceField {
    MemoryRequest,
    MemoryLimit,
    CpuRequest,
    CpuLimit,
}

impl ResourceField {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceField::MemoryRequest => "resources.memoryRequest",
            ResourceField::MemoryLimit => "resources.memoryLimit",
            ResourceField::CpuRequest => "resources.cpuRequest",
            ResourceField::CpuLimit => "resources.cpuLimit",
        }
    }
}

impl fmt::Display for ResourceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid quantity {value:?} in {field}: {reason}")]
pub struct ValidationError {
    pub field: ResourceField,
    pub value: String,
    #[source]
    pub reason: QuantityError,
}

/// Parses one quantity field, attributing any failure to `field`.
pub fn parse(field: ResourceField, text: &str) -> Result<Quantity, ValidationError> {
    text.parse().map_err(|reason| ValidationError {
        field,
        value: text.to_string(),
        reason,
    })
}

struct Number<'a> {
    negative: bool,
    /// Integer and fraction digits with leading/trailing zeros stripped.
    digits: String,
    /// How many of `digits` sit after the decimal point.
    scale: i64,
    rest: &'a str,
}

impl<'a> Number<'a> {
    fn scan(s: &'a str) -> Result<Self, QuantityError> {
        if s.is_empty() {
            return Err(QuantityError::Empty);
        }

        let (negative, unsigned) = match s.as_bytes()[0] {
            b'-' => (true, &s[1..]),
            b'+' => (false, &s[1..]),
            _ => (false, s),
        };

        let int_len = leading_digits(unsigned);
        let (int_part, after_int) = unsigned.split_at(int_len);

        let (frac_part, rest) = match after_int.strip_prefix('.') {
            Some(after_dot) => {
                let frac_len = leading_digits(after_dot);
                after_dot.split_at(frac_len)
            }
            None => ("", after_int),
        };

        if int_part.is_empty() && frac_part.is_empty() {
            return Err(QuantityError::InvalidNumber);
        }

        let frac_part = frac_part.trim_end_matches('0');
        let mut digits = format!("{int_part}{frac_part}");
        let significant = digits.trim_start_matches('0').len();
        digits.drain(..digits.len() - significant);

        let scale = i64::try_from(frac_part.len()).unwrap_or(i64::MAX);

        Ok(Self {
            negative,
            digits,
            scale,
            rest,
        })
    }

    fn millis(&self, suffix: &Suffix) -> i128 {
        if self.digits.is_empty() {
            return 0;
        }

        let mut digits: Vec<u8> = self.digits.bytes().map(|b| b - b'0').collect();
        let exponent = match *suffix {
            Suffix::Binary(power) => {
                for _ in 0..power {
                    mul_small(&mut digits, 1024);
                }
                0
            }
            Suffix::Decimal(exponent) | Suffix::Exponent(exponent) => exponent,
        };

        // digits * 10^(exponent + 3 - scale)
        let shift = exponent.saturating_add(3).saturating_sub(self.scale);
        let magnitude = if shift >= 0 {
            u32::try_from(shift)
                .ok()
                .and_then(|s| 10i128.checked_pow(s))
                .zip(to_i128(&digits))
                .and_then(|(factor, base)| base.checked_mul(factor))
        } else {
            let dropped = usize::try_from(shift.unsigned_abs()).unwrap_or(usize::MAX);
            if dropped >= digits.len() {
                // Non-zero but below one milli-unit.
                Some(1)
            } else {
                let (whole, fraction) = digits.split_at(digits.len() - dropped);
                let round_up = fraction.iter().any(|&d| d != 0);
                to_i128(whole).and_then(|w| w.checked_add(i128::from(round_up)))
            }
        };

        match (magnitude, self.negative) {
            (Some(m), false) => m,
            (Some(m), true) => -m,
            (None, false) => i128::MAX,
            (None, true) => i128::MIN,
        }
    }
}

/// Multiplies a big-endian decimal digit string in place.
fn mul_small(digits: &mut Vec<u8>, factor: u32) {
    let mut carry = 0u64;
    for d in digits.iter_mut().rev() {
        let product = u64::from(*d) * u64::from(factor) + carry;
        *d = (product % 10) as u8;
        carry = product / 10;
    }
    while carry > 0 {
        digits.insert(0, (carry % 10) as u8);
        carry /= 10;
    }
}

fn to_i128(digits: &[u8]) -> Option<i128> {
    digits.iter().try_fold(0i128, |acc, &d| {
        acc.checked_mul(10)?.checked_add(i128::from(d))
    })
}

enum Suffix {
    /// Power of 1024.
    Binary(u32),
    /// Power of ten from an SI prefix.
    Decimal(i64),
    /// Power of ten from an `e`/`E` exponent.
    Exponent(i64),
}

impl Suffix {
    fn parse(s: &str) -> Result<Self, QuantityError> {
        let suffix = match s {
            "" => Suffix::Decimal(0),
            "m" => Suffix::Decimal(-3),
            "k" => Suffix::Decimal(3),
            "M" => Suffix::Decimal(6),
            "G" => Suffix::Decimal(9),
            "T" => Suffix::Decimal(12),
            "P" => Suffix::Decimal(15),
            "E" => Suffix::Decimal(18),
            "Ki" => Suffix::Binary(1),
            "Mi" => Suffix::Binary(2),
            "Gi" => Suffix::Binary(3),
            "Ti" => Suffix::Binary(4),
            "Pi" => Suffix::Binary(5),
            "Ei" => Suffix::Binary(6),
            other => {
                let exponent = other
                    .strip_prefix('e')
                    .or_else(|| other.strip_prefix('E'))
                    .and_then(parse_exponent)
                    .ok_or_else(|| QuantityError::InvalidSuffix(other.to_string()))?;
                Suffix::Exponent(exponent)
            }
        };
        Ok(suffix)
    }

    fn format(&self) -> QuantityFormat {
        match self {
            Suffix::Binary(_) => QuantityFormat::BinarySI,
            Suffix::Decimal(_) => QuantityFormat::DecimalSI,
            Suffix::Exponent(_) => QuantityFormat::DecimalExponent,
        }
    }
}

fn parse_exponent(s: &str) -> Option<i64> {
    let unsigned = s.strip_prefix(['+', '-']).unwrap_or(s);
    if unsigned.is_empty() || leading_digits(unsigned) != unsigned.len() {
        return None;
    }
    s.parse::<i64>().ok()
}

fn leading_digits(s: &str) -> usize {
    s.bytes().take_while(u8::is_ascii_digit).count()
}



#[cfg(test)]
mod tests {
    use super::*;

    fn millis(text: &str) -> i128 {
        text.parse::<Quantity>().unwrap().millis()
    }

    #[test]
    fn accepts_decimal_si() {
        assert_eq!(millis("100m"), 100);
        assert_eq!(millis("200m"), 200);
        assert_eq!(millis("1"), 1_000);
        assert_eq!(millis("1.5"), 1_500);
        assert_eq!(millis("2k"), 2_000_000);
        assert_eq!(millis("1E"), 1_000_000_000_000_000_000_000);
    }

    #[test]
    fn accepts_binary_si() {
        let q: Quantity = "32Mi".parse().unwrap();
        assert_eq!(q.format(), QuantityFormat::BinarySI);
        assert_eq!(q.millis(), 32 * 1024 * 1024 * 1000);
        assert_eq!(millis("1Ki"), 1_024_000);
        assert_eq!(millis("1.5Gi"), 1_610_612_736_000);
    }

    #[test]
    fn accepts_exponents() {
        let q: Quantity = "1e3".parse().unwrap();
        assert_eq!(q.format(), QuantityFormat::DecimalExponent);
        assert_eq!(q.millis(), 1_000_000);
        assert_eq!(millis("5E-3"), 5);
        assert_eq!(millis("12e+1"), 120_000);
    }

    #[test]
    fn accepts_partial_numbers_and_signs() {
        assert_eq!(millis("5."), 5_000);
        assert_eq!(millis(".5"), 500);
        assert_eq!(millis("+3"), 3_000);
        assert_eq!(millis("-1"), -1_000);
        assert_eq!(millis("000.000"), 0);
    }

    #[test]
    fn rounds_sub_milli_values_up() {
        assert_eq!(millis("0.0001"), 1);
        assert_eq!(millis("1.0001"), 1_001);
        assert_eq!(millis("-0.0001"), -1);
        assert_eq!(millis("1e-50"), 1);
    }

    #[test]
    fn keeps_original_text() {
        let q: Quantity = "64Mi".parse().unwrap();
        assert_eq!(q.as_str(), "64Mi");
        assert_eq!(q.to_string(), "64Mi");
        assert_eq!(q.to_k8s(), K8sQuantity("64Mi".to_string()));
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!("".parse::<Quantity>(), Err(QuantityError::Empty));
        assert_eq!(
            "notaquantity".parse::<Quantity>(),
            Err(QuantityError::InvalidNumber)
        );
        assert_eq!("+".parse::<Quantity>(), Err(QuantityError::InvalidNumber));
        assert_eq!(".".parse::<Quantity>(), Err(QuantityError::InvalidNumber));
        assert_eq!(" 1".parse::<Quantity>(), Err(QuantityError::InvalidNumber));

        for bad in ["1 ", "1.2.3", "1e", "1e1.5", "1Mb", "1ki", "10mi", "1KiB"] {
            assert!(
                matches!(bad.parse::<Quantity>(), Err(QuantityError::InvalidSuffix(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn clamps_values_beyond_i128() {
        assert_eq!(millis("1e40"), i128::MAX);
        assert_eq!(millis("-1e40"), i128::MIN);
        assert_eq!(millis("9223372036854775807Ei"), i128::MAX);
        assert_eq!(millis("1e99999999999"), i128::MAX);
        assert_eq!(
            "1e99999999999999999999".parse::<Quantity>(),
            Err(QuantityError::InvalidSuffix("e99999999999999999999".to_string()))
        );
    }

    #[test]
    fn long_mantissas_keep_their_value() {
        assert_eq!(
            millis("123456789012345678901234567890123456789e-30"),
            123_456_789_013
        );
        assert_eq!(
            millis("0.000000000000000000000000000000000000000001Ki"),
            1
        );
        assert_eq!(millis("1.0000000000000000000000000000000000000000001"), 1_001);
    }

    #[test]
    fn validation_error_names_the_field() {
        let err = parse(ResourceField::CpuLimit, "notaquantity").unwrap_err();
        assert_eq!(err.field, ResourceField::CpuLimit);
        assert_eq!(err.value, "notaquantity");
        assert!(err.to_string().contains("resources.cpuLimit"));
    }
}
