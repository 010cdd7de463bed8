use std::fmt::Display;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};
use std::str::FromStr;

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, Zero};
use snafu::{OptionExt, Snafu};

#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(display("cannot read {input:?} as a weight"))]
pub struct ParseWeightError {
    input: String,
}

/// An exact amount of ballot weight.
///
/// Weights start as whole numbers (one per cast ballot, or the count of an aggregated
/// ballot) and become fractions once a surplus is transferred. All the round arithmetic
/// is done on rationals so that no weight is ever created or lost through rounding.
#[derive(Eq, PartialEq, Debug, Clone, PartialOrd, Ord, Hash)]
pub struct Weight(BigRational);

impl Weight {
    pub fn zero() -> Weight {
        Weight(BigRational::zero())
    }

    pub fn one() -> Weight {
        Weight(BigRational::one())
    }

    pub fn from_count(count: u64) -> Weight {
        Weight(BigRational::from_integer(BigInt::from(count)))
    }

    /// A fractional weight. Returns None for a zero denominator.
    pub fn from_fraction(numer: i64, denom: i64) -> Option<Weight> {
        if denom == 0 {
            return None;
        }
        Some(Weight(BigRational::new(
            BigInt::from(numer),
            BigInt::from(denom),
        )))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.0.is_positive()
    }

    pub fn floor(&self) -> Weight {
        Weight(self.0.floor())
    }

    /// The weight rounded to three decimal places, as used by the accounting checks.
    pub fn round_thousandths(&self) -> Weight {
        let scale = BigRational::from_integer(BigInt::from(1000));
        Weight((&self.0 * &scale).round() / scale)
    }

    /// Ratio of two weights. Returns None when dividing by zero.
    pub fn checked_div(&self, rhs: &Weight) -> Option<Weight> {
        if rhs.is_zero() {
            None
        } else {
            Some(Weight(&self.0 / &rhs.0))
        }
    }
}

impl Display for Weight {
    /// Whole weights print as integers, fractional ones with four decimals.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_integer() {
            return write!(f, "{}", self.0.numer());
        }
        let scaled = (&self.0 * BigRational::from_integer(BigInt::from(10_000)))
            .round()
            .to_integer();
        let sign = if scaled.is_negative() { "-" } else { "" };
        let magnitude = scaled.abs();
        let int_part = &magnitude / BigInt::from(10_000);
        let frac_part = &magnitude % BigInt::from(10_000);
        write!(f, "{}{}.{:0>4}", sign, int_part, frac_part.to_string())
    }
}

impl Default for Weight {
    fn default() -> Self {
        Weight::zero()
    }
}

impl Sum for Weight {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Weight::zero(), |acc, w| acc + w)
    }
}

impl<'a> Sum<&'a Weight> for Weight {
    fn sum<I: Iterator<Item = &'a Weight>>(iter: I) -> Self {
        iter.fold(Weight::zero(), |acc, w| acc + w)
    }
}

impl AddAssign for Weight {
    fn add_assign(&mut self, rhs: Weight) {
        self.0 += rhs.0;
    }
}

impl<'a> AddAssign<&'a Weight> for Weight {
    fn add_assign(&mut self, rhs: &'a Weight) {
        self.0 += &rhs.0;
    }
}

impl SubAssign for Weight {
    fn sub_assign(&mut self, rhs: Weight) {
        self.0 -= rhs.0;
    }
}

impl<'a> SubAssign<&'a Weight> for Weight {
    fn sub_assign(&mut self, rhs: &'a Weight) {
        self.0 -= &rhs.0;
    }
}

impl Add for Weight {
    type Output = Weight;
    fn add(self, rhs: Weight) -> Weight {
        Weight(self.0 + rhs.0)
    }
}

impl<'a> Add<&'a Weight> for Weight {
    type Output = Weight;
    fn add(self, rhs: &'a Weight) -> Weight {
        Weight(self.0 + &rhs.0)
    }
}

impl Sub for Weight {
    type Output = Weight;
    fn sub(self, rhs: Weight) -> Weight {
        Weight(self.0 - rhs.0)
    }
}

impl<'a> Sub<&'a Weight> for &'a Weight {
    type Output = Weight;
    fn sub(self, rhs: &'a Weight) -> Weight {
        Weight(&self.0 - &rhs.0)
    }
}

impl<'a> Mul<&'a Weight> for &'a Weight {
    type Output = Weight;
    fn mul(self, rhs: &'a Weight) -> Weight {
        Weight(&self.0 * &rhs.0)
    }
}

impl Mul<u64> for Weight {
    type Output = Weight;
    fn mul(self, rhs: u64) -> Weight {
        Weight(self.0 * BigRational::from_integer(BigInt::from(rhs)))
    }
}

impl Div<u64> for Weight {
    type Output = Weight;
    /// Panics on a zero divisor, like integer division.
    fn div(self, rhs: u64) -> Weight {
        Weight(self.0 / BigRational::from_integer(BigInt::from(rhs)))
    }
}

impl Neg for Weight {
    type Output = Weight;
    fn neg(self) -> Weight {
        Weight(-self.0)
    }
}

/// Reads a whole number, a decimal number (`0.25`) or a fraction (`1/3`).
impl FromStr for Weight {
    type Err = ParseWeightError;

    fn from_str(s: &str) -> Result<Weight, ParseWeightError> {
        let input = s.trim();
        let parsed = match input.split_once('.') {
            Some((int_part, frac_part)) => {
                let all_digits =
                    !frac_part.is_empty() && frac_part.chars().all(|c| c.is_ascii_digit());
                let digits = format!("{}{}", int_part, frac_part);
                let denom = num_traits::pow(BigInt::from(10), frac_part.len());
                BigInt::from_str(&digits)
                    .ok()
                    .filter(|_| all_digits)
                    .map(|numer| BigRational::new(numer, denom))
            }
            None => BigRational::from_str(input).ok(),
        };
        parsed.map(Weight).context(ParseWeightSnafu { input })
    }
}

impl From<u64> for Weight {
    fn from(count: u64) -> Weight {
        Weight::from_count(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_whole_and_fractional() {
        assert_eq!(Weight::from_count(12).to_string(), "12");
        assert_eq!(Weight::from_fraction(1, 3).unwrap().to_string(), "0.3333");
        assert_eq!(Weight::from_fraction(-5, 4).unwrap().to_string(), "-1.2500");
        assert_eq!(Weight::from_fraction(2, 3).unwrap().to_string(), "0.6667");
    }

    #[test]
    fn thirds_add_up_exactly() {
        let third = Weight::from_fraction(1, 3).unwrap();
        let total: Weight = vec![third.clone(), third.clone(), third].into_iter().sum();
        assert_eq!(total, Weight::one());
    }

    #[test]
    fn rounding_to_thousandths() {
        let w = Weight::from_fraction(12_345, 10_000).unwrap();
        assert_eq!(
            w.round_thousandths(),
            Weight::from_fraction(1_235, 1_000).unwrap()
        );
    }

    #[test]
    fn parsing() {
        assert_eq!("3".parse::<Weight>(), Ok(Weight::from_count(3)));
        assert_eq!("0.25".parse::<Weight>().unwrap(), Weight::from_fraction(1, 4).unwrap());
        assert_eq!("1/3".parse::<Weight>().unwrap(), Weight::from_fraction(1, 3).unwrap());
        assert!("1.".parse::<Weight>().is_err());
        assert!("1.x".parse::<Weight>().is_err());
        assert!("abc".parse::<Weight>().is_err());
    }

    #[test]
    fn zero_denominators_are_rejected() {
        assert_eq!(Weight::from_fraction(1, 0), None);
        assert_eq!(Weight::one().checked_div(&Weight::zero()), None);
    }
}
