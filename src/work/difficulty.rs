//! Exact difficulty arithmetic
//!
//! Difficulty is the ratio of the difficulty-1 target to a given expanded
//! target. It is kept as a reduced fraction so that sums over queues do not
//! drift; [`Difficulty::to_f64`] is the lossy view used for economics.

use num_bigint::{BigInt, BigUint, Sign};
use num_integer::Integer;
use num_traits::{One, Signed, ToPrimitive, Zero};
use once_cell::sync::Lazy;
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Div, Mul, Sub};

/// The expanded target of difficulty 1: `0x00000000ffff...ff` (224 one bits)
pub static DIFFICULTY_1_TARGET: Lazy<BigUint> =
    Lazy::new(|| (BigUint::one() << 224usize) - BigUint::one());

/// A difficulty as an exact, reduced fraction
#[derive(Debug, Clone)]
pub struct Difficulty {
    numerator: BigInt,
    denominator: BigUint,
}

impl Difficulty {
    /// Build a reduced fraction. The denominator must be nonzero.
    fn reduced(numerator: BigInt, denominator: BigUint) -> Self {
        debug_assert!(!denominator.is_zero());
        if numerator.is_zero() {
            return Self {
                numerator,
                denominator: BigUint::one(),
            };
        }
        let divisor = numerator.magnitude().gcd(&denominator);
        let sign = numerator.sign();
        let magnitude = numerator.magnitude() / &divisor;
        Self {
            numerator: BigInt::from_biguint(sign, magnitude),
            denominator: denominator / divisor,
        }
    }

    /// Difficulty of an expanded target; the target must be nonzero
    pub fn from_expanded_target(expanded: &BigUint) -> Self {
        Self::reduced(
            BigInt::from_biguint(Sign::Plus, DIFFICULTY_1_TARGET.clone()),
            expanded.clone(),
        )
    }

    /// Construct from a whole number
    pub fn from_integer(value: i64) -> Self {
        Self {
            numerator: BigInt::from(value),
            denominator: BigUint::one(),
        }
    }

    /// Construct from a fraction, `None` when the denominator is zero
    pub fn from_ratio(numerator: BigInt, denominator: BigUint) -> Option<Self> {
        if denominator.is_zero() {
            return None;
        }
        Some(Self::reduced(numerator, denominator))
    }

    /// The smallest difficulty a job may have
    pub fn minimum() -> Self {
        Self::from_integer(1)
    }

    /// Zero difficulty
    pub fn zero() -> Self {
        Self::from_integer(0)
    }

    pub fn numerator(&self) -> &BigInt {
        &self.numerator
    }

    pub fn denominator(&self) -> &BigUint {
        &self.denominator
    }

    pub fn is_zero(&self) -> bool {
        self.numerator.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.numerator.is_negative()
    }

    /// Division that returns `None` instead of panicking on a zero divisor
    pub fn checked_div(&self, other: &Self) -> Option<Self> {
        if other.is_zero() {
            return None;
        }
        let numerator = &self.numerator * BigInt::from(other.denominator.clone());
        let denominator = &self.denominator * other.numerator.magnitude();
        let numerator = if other.is_negative() { -numerator } else { numerator };
        Some(Self::reduced(numerator, denominator))
    }

    /// Lossy floating-point view
    pub fn to_f64(&self) -> f64 {
        match (self.numerator.to_f64(), self.denominator.to_f64()) {
            (Some(n), Some(d)) if n.is_finite() && d.is_finite() => n / d,
            _ => {
                // Scale both sides down so the conversion stays finite.
                let bits = self.denominator.bits().max(self.numerator.magnitude().bits());
                let shift = bits.saturating_sub(1000) as usize;
                let n = (&self.numerator >> shift).to_f64().unwrap_or(0.0);
                let d = (&self.denominator >> shift).to_f64().unwrap_or(1.0);
                if d == 0.0 {
                    f64::INFINITY
                } else {
                    n / d
                }
            }
        }
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Self::zero()
    }
}

impl PartialEq for Difficulty {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Difficulty {}

impl PartialOrd for Difficulty {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Difficulty {
    fn cmp(&self, other: &Self) -> Ordering {
        let lhs = &self.numerator * BigInt::from(other.denominator.clone());
        let rhs = &other.numerator * BigInt::from(self.denominator.clone());
        lhs.cmp(&rhs)
    }
}

impl Add for &Difficulty {
    type Output = Difficulty;

    fn add(self, rhs: &Difficulty) -> Difficulty {
        let numerator = &self.numerator * BigInt::from(rhs.denominator.clone())
            + &rhs.numerator * BigInt::from(self.denominator.clone());
        Difficulty::reduced(numerator, &self.denominator * &rhs.denominator)
    }
}

impl Sub for &Difficulty {
    type Output = Difficulty;

    fn sub(self, rhs: &Difficulty) -> Difficulty {
        let numerator = &self.numerator * BigInt::from(rhs.denominator.clone())
            - &rhs.numerator * BigInt::from(self.denominator.clone());
        Difficulty::reduced(numerator, &self.denominator * &rhs.denominator)
    }
}

impl Mul for &Difficulty {
    type Output = Difficulty;

    fn mul(self, rhs: &Difficulty) -> Difficulty {
        Difficulty::reduced(
            &self.numerator * &rhs.numerator,
            &self.denominator * &rhs.denominator,
        )
    }
}

impl Div for &Difficulty {
    type Output = Difficulty;

    /// Panics when dividing by zero; see [`Difficulty::checked_div`].
    fn div(self, rhs: &Difficulty) -> Difficulty {
        match self.checked_div(rhs) {
            Some(quotient) => quotient,
            None => panic!("division of difficulty by zero"),
        }
    }
}

macro_rules! forward_owned_op {
    ($trait:ident, $method:ident) => {
        impl $trait for Difficulty {
            type Output = Difficulty;

            fn $method(self, rhs: Difficulty) -> Difficulty {
                (&self).$method(&rhs)
            }
        }
    };
}

forward_owned_op!(Add, add);
forward_owned_op!(Sub, sub);
forward_owned_op!(Mul, mul);
forward_owned_op!(Div, div);

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.denominator.is_one() {
            write!(f, "{}", self.numerator)
        } else {
            write!(f, "{:.6}", self.to_f64())
        }
    }
}
