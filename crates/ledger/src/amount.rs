//! Exact decimal amounts.
//!
//! Amounts arrive as decimal strings and are parsed into `rust_decimal`
//! values (96-bit integer mantissa + base-10 scale). Binary floating point is
//! never involved in parsing, summing or the comparison to zero.

use core::fmt;
use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use flowpay_core::ValueObject;

use crate::error::LedgerError;

/// Why a decimal string was rejected.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AmountParseError {
    #[error("amount is empty")]
    Empty,

    /// Anything outside `[+-]digits[.digits]`: exponents, separators, NaN, ...
    #[error("not a plain decimal number")]
    Malformed,

    /// Well-formed, but cannot be represented without rounding.
    #[error("amount exceeds the supported precision")]
    OutOfRange,
}

/// A signed, exact decimal amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(Decimal);

impl ValueObject for Amount {}

impl Amount {
    pub const ZERO: Self = Amount(Decimal::ZERO);

    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl FromStr for Amount {
    type Err = AmountParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AmountCodec::parse(s)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Parses entry amounts and checks that a transaction balances.
#[derive(Debug, Clone, Copy, Default)]
pub struct AmountCodec;

impl AmountCodec {
    /// Parse one decimal string.
    ///
    /// Accepts an optional sign, integer digits and an optional fraction
    /// (`"100.00"`, `"-50"`, `".5"`, `"5."`). Surrounding ASCII whitespace
    /// is ignored. The scale of the input is preserved (`"1.50"` keeps two
    /// places).
    pub fn parse(raw: &str) -> Result<Amount, AmountParseError> {
        let trimmed = raw.trim_matches(|c: char| c.is_ascii_whitespace());
        if trimmed.is_empty() {
            return Err(AmountParseError::Empty);
        }

        let (negative, unsigned) = match trimmed.as_bytes()[0] {
            b'-' => (true, &trimmed[1..]),
            b'+' => (false, &trimmed[1..]),
            _ => (false, trimmed),
        };

        let (int_part, frac_part) = match unsigned.split_once('.') {
            Some((int_part, frac_part)) => (int_part, frac_part),
            None => (unsigned, ""),
        };

        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if (int_part.is_empty() && frac_part.is_empty())
            || !all_digits(int_part)
            || !all_digits(frac_part)
        {
            return Err(AmountParseError::Malformed);
        }

        let mut canonical = String::with_capacity(trimmed.len() + 1);
        if negative {
            canonical.push('-');
        }
        canonical.push_str(if int_part.is_empty() { "0" } else { int_part });
        if !frac_part.is_empty() {
            canonical.push('.');
            canonical.push_str(frac_part);
        }

        Decimal::from_str_exact(&canonical)
            .map(Amount)
            .map_err(|_| AmountParseError::OutOfRange)
    }

    /// Parse every entry amount, in order, and require an exact zero sum.
    ///
    /// The first malformed amount is reported with its entry index. A sum
    /// that overflows is reported as an invalid amount at the entry that
    /// pushed it out of range.
    pub fn parse_balanced<'a, I>(raw_amounts: I) -> Result<Vec<Amount>, LedgerError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut parsed = Vec::new();
        let mut sum = Amount::ZERO;

        for (index, raw) in raw_amounts.into_iter().enumerate() {
            let amount = Self::parse(raw).map_err(|reason| LedgerError::InvalidAmount {
                index,
                amount: raw.to_string(),
                reason,
            })?;

            sum = sum.checked_add(amount).ok_or_else(|| LedgerError::InvalidAmount {
                index,
                amount: raw.to_string(),
                reason: AmountParseError::OutOfRange,
            })?;

            parsed.push(amount);
        }

        if !sum.is_zero() {
            return Err(LedgerError::EntriesUnbalanced { sum: sum.value() });
        }

        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str_exact(s).unwrap()
    }

    #[test]
    fn parses_plain_decimals_exactly() {
        assert_eq!(AmountCodec::parse("100.00").unwrap().value(), dec("100.00"));
        assert_eq!(AmountCodec::parse("-50").unwrap().value(), dec("-50"));
        assert_eq!(AmountCodec::parse("+7.25").unwrap().value(), dec("7.25"));
        assert_eq!(AmountCodec::parse(".5").unwrap().value(), dec("0.5"));
        assert_eq!(AmountCodec::parse("5.").unwrap().value(), dec("5"));
        assert_eq!(AmountCodec::parse("  12.30 ").unwrap().value(), dec("12.30"));
    }

    #[test]
    fn keeps_input_scale() {
        assert_eq!(AmountCodec::parse("1.50").unwrap().to_string(), "1.50");
    }

    #[test]
    fn rejects_non_decimal_text() {
        for raw in ["abc", "1e5", "1,000.00", "1_000", "--1", "1.2.3", ".", "-", "NaN", "0x10"] {
            assert_eq!(
                AmountCodec::parse(raw),
                Err(AmountParseError::Malformed),
                "expected {raw:?} to be malformed"
            );
        }
        assert_eq!(AmountCodec::parse("   "), Err(AmountParseError::Empty));
        assert_eq!(
            AmountCodec::parse("\u{2003}100.00\u{3000}"),
            Err(AmountParseError::Malformed)
        );
    }

    #[test]
    fn rejects_values_that_would_need_rounding() {
        assert_eq!(
            AmountCodec::parse("0.00000000000000000000000000001"),
            Err(AmountParseError::OutOfRange)
        );
        assert_eq!(
            AmountCodec::parse("99999999999999999999999999999999"),
            Err(AmountParseError::OutOfRange)
        );
    }

    #[test]
    fn balanced_entries_parse_in_order() {
        let amounts = AmountCodec::parse_balanced(["100.00", "-100.00"]).unwrap();
        assert_eq!(amounts, vec![Amount::new(dec("100.00")), Amount::new(dec("-100.00"))]);
    }

    #[test]
    fn sum_is_exact_where_binary_floats_drift() {
        // 0.1 + 0.2 - 0.3 is not zero in f64.
        AmountCodec::parse_balanced(["0.1", "0.2", "-0.3"]).unwrap();
    }

    #[test]
    fn unbalanced_entries_report_the_exact_sum() {
        let err = AmountCodec::parse_balanced(["100.00", "-50.00"]).unwrap_err();
        match err {
            LedgerError::EntriesUnbalanced { sum } => assert_eq!(sum, dec("50.00")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn malformed_entry_is_reported_with_its_index() {
        let err = AmountCodec::parse_balanced(["10", "ten", "-10"]).unwrap_err();
        match err {
            LedgerError::InvalidAmount { index, amount, reason } => {
                assert_eq!(index, 1);
                assert_eq!(amount, "ten");
                assert_eq!(reason, AmountParseError::Malformed);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn overflowing_sum_is_an_invalid_amount() {
        let max = "79228162514264337593543950335";
        let err = AmountCodec::parse_balanced([max, max]).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InvalidAmount { index: 1, reason: AmountParseError::OutOfRange, .. }
        ));
    }

    proptest! {
        /// Property: any set of cent amounts plus its exact negation balances,
        /// and perturbing one entry by a single cent never does.
        #[test]
        fn exact_negation_balances_and_one_cent_does_not(
            cents in prop::collection::vec(-10_000_000i64..10_000_000i64, 1..8)
        ) {
            let mut raw: Vec<String> = cents
                .iter()
                .map(|c| Decimal::new(*c, 2).to_string())
                .collect();
            let total: i64 = cents.iter().sum();
            raw.push(Decimal::new(-total, 2).to_string());

            prop_assert!(AmountCodec::parse_balanced(raw.iter().map(String::as_str)).is_ok());

            let last = raw.len() - 1;
            raw[last] = Decimal::new(-total + 1, 2).to_string();
            let is_unbalanced = matches!(
                AmountCodec::parse_balanced(raw.iter().map(String::as_str)),
                Err(LedgerError::EntriesUnbalanced { .. })
            );
            prop_assert!(is_unbalanced);
        }
    }
}
