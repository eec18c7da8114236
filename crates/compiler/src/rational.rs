//! Exact rational arithmetic for compile-time literal evaluation.
//!
//! Solidity evaluates constant numeric expressions over unbounded exact
//! rationals and only demands an integer once a value is actually used. The
//! [`RationalLiteral`] type reproduces that behavior: arbitrary-precision
//! numerator and denominator, no implicit rounding anywhere, and an explicit
//! [`RationalLiteral::to_integer`] that succeeds only for exact quotients.
//!
//! Fractions are deliberately **not** reduced on construction. The
//! arithmetic instead keeps denominators small lazily: addition reuses a
//! common denominator when one exists, and scales the smaller side when one
//! denominator divides the other, falling back to cross-multiplication only
//! when it must.

use std::fmt::{Display, Formatter};

use num_bigint::BigInt;
use num_traits::{One, Signed, ToPrimitive, Zero};
use stc_errors::transpile::{Error, Result};

/// An exact rational number with arbitrary-precision components.
///
/// # Invariant
///
/// The denominator is strictly positive at all times. The constructor
/// normalises a negative denominator by negating both components, and
/// rejects a zero denominator with [`Error::DivisionByZero`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RationalLiteral {
    /// The numerator, carrying the sign of the value.
    numerator: BigInt,

    /// The denominator. Strictly positive.
    denominator: BigInt,
}

impl RationalLiteral {
    /// Creates a new rational from the provided `numerator` and
    /// `denominator`.
    ///
    /// # Errors
    ///
    /// - [`Error::DivisionByZero`] if `denominator` is zero.
    pub fn new(numerator: BigInt, denominator: BigInt) -> Result<Self> {
        if denominator.is_zero() {
            Err(Error::DivisionByZero)?;
        }
        if denominator.is_negative() {
            Ok(Self {
                numerator:   -numerator,
                denominator: -denominator,
            })
        } else {
            Ok(Self {
                numerator,
                denominator,
            })
        }
    }

    /// Creates the rational `n / 1` from the provided integer.
    #[must_use]
    pub fn from_integer(n: impl Into<BigInt>) -> Self {
        Self {
            numerator:   n.into(),
            denominator: BigInt::one(),
        }
    }

    /// Wraps components known to satisfy the invariant already.
    fn from_parts(numerator: BigInt, denominator: BigInt) -> Self {
        debug_assert!(denominator.is_positive());
        Self {
            numerator,
            denominator,
        }
    }

    /// Gets the numerator of this rational.
    #[must_use]
    pub fn numerator(&self) -> &BigInt {
        &self.numerator
    }

    /// Gets the denominator of this rational. Always strictly positive.
    #[must_use]
    pub fn denominator(&self) -> &BigInt {
        &self.denominator
    }

    /// Computes `self + other`.
    ///
    /// Denominators are kept as small as the operands allow: equal
    /// denominators are reused, a denominator that divides the other scales
    /// only the smaller side, and otherwise the components are
    /// cross-multiplied.
    #[must_use]
    pub fn add(&self, other: &Self) -> Self {
        if self.denominator == other.denominator {
            return Self::from_parts(
                &self.numerator + &other.numerator,
                self.denominator.clone(),
            );
        }

        if (&other.denominator % &self.denominator).is_zero() {
            let scale = &other.denominator / &self.denominator;
            return Self::from_parts(
                &self.numerator * &scale + &other.numerator,
                other.denominator.clone(),
            );
        }

        if (&self.denominator % &other.denominator).is_zero() {
            let scale = &self.denominator / &other.denominator;
            return Self::from_parts(
                &self.numerator + &other.numerator * &scale,
                self.denominator.clone(),
            );
        }

        Self::from_parts(
            &self.numerator * &other.denominator + &other.numerator * &self.denominator,
            &self.denominator * &other.denominator,
        )
    }

    /// Computes `self - other` as addition of the negated operand.
    #[must_use]
    pub fn subtract(&self, other: &Self) -> Self {
        self.add(&other.negate())
    }

    /// Computes `-self`.
    #[must_use]
    pub fn negate(&self) -> Self {
        Self::from_parts(-&self.numerator, self.denominator.clone())
    }

    /// Computes `self * other` componentwise.
    #[must_use]
    pub fn multiply(&self, other: &Self) -> Self {
        Self::from_parts(
            &self.numerator * &other.numerator,
            &self.denominator * &other.denominator,
        )
    }

    /// Computes `self / other`.
    ///
    /// # Errors
    ///
    /// - [`Error::DivisionByZero`] if `other` has a zero numerator.
    pub fn divide_by(&self, other: &Self) -> Result<Self> {
        Self::new(
            &self.numerator * &other.denominator,
            &self.denominator * &other.numerator,
        )
    }

    /// Computes `self mod other` as
    /// `(n₁·d₂ mod n₂·d₁, d₁·d₂)`.
    ///
    /// The remainder follows [`BigInt`]'s truncated-division convention and
    /// hence takes the sign of the dividend.
    ///
    /// # Errors
    ///
    /// - [`Error::DivisionByZero`] if `other` has a zero numerator.
    pub fn rem(&self, other: &Self) -> Result<Self> {
        if other.numerator.is_zero() {
            Err(Error::DivisionByZero)?;
        }
        Ok(Self::from_parts(
            (&self.numerator * &other.denominator) % (&other.numerator * &self.denominator),
            &self.denominator * &other.denominator,
        ))
    }

    /// Computes `self ** other` for integral `other`.
    ///
    /// A zero exponent yields `1 / 1` for every base, zero included. A
    /// negative exponent takes the reciprocal power, which preserves the
    /// sign of the result because the constructor re-normalises the
    /// components.
    ///
    /// # Errors
    ///
    /// - [`Error::TranspileFailed`] if `other` is not an exact integer, or
    ///   is too large to be a sensible exponent.
    /// - [`Error::DivisionByZero`] if the base is zero and the exponent is
    ///   negative.
    pub fn exp(&self, other: &Self) -> Result<Self> {
        let exponent = other.to_integer().ok_or_else(|| {
            Error::TranspileFailed(format!("exponent {other} is not an integer"))
        })?;

        if exponent.is_zero() {
            return Ok(Self::from_integer(1));
        }

        let power = exponent.magnitude().to_u32().ok_or_else(|| {
            Error::TranspileFailed(format!("exponent {exponent} is too large"))
        })?;

        if exponent.is_positive() {
            Ok(Self::from_parts(
                self.numerator.pow(power),
                self.denominator.pow(power),
            ))
        } else if self.numerator.is_zero() {
            Err(Error::DivisionByZero)
        } else {
            // The reciprocal may put the sign into the denominator; the
            // constructor moves it back into the numerator.
            Self::new(self.denominator.pow(power), self.numerator.pow(power))
        }
    }

    /// Checks whether `self` and `other` denote the same value, by
    /// cross-multiplication.
    #[must_use]
    pub fn equal_value_of(&self, other: &Self) -> bool {
        &self.numerator * &other.denominator == &other.numerator * &self.denominator
    }

    /// Checks whether `self` is strictly greater than `other`.
    ///
    /// Because denominators are strictly positive, the sign of the cross
    /// products is the sign of the comparison.
    #[must_use]
    pub fn greater_than(&self, other: &Self) -> bool {
        &self.numerator * &other.denominator > &other.numerator * &self.denominator
    }

    /// Gets the value of `self` as an integer iff the division is exact,
    /// and [`None`] otherwise.
    #[must_use]
    pub fn to_integer(&self) -> Option<BigInt> {
        (&self.numerator % &self.denominator)
            .is_zero()
            .then(|| &self.numerator / &self.denominator)
    }

    /// Parses a Solidity numeric literal into a rational.
    ///
    /// Digit separators (`_`) are stripped first. The accepted forms are,
    /// in the order they are tried: hexadecimal (`0x…`), scientific
    /// (`<coefficient>e<exponent>`), decimal-point, and plain decimal
    /// integer.
    ///
    /// # Errors
    ///
    /// - [`Error::TranspileFailed`] if `text` is not one of the accepted
    ///   literal forms.
    pub fn parse(text: &str) -> Result<Self> {
        use chumsky::{prelude::end, Parser};

        let stripped: String = text.chars().filter(|c| *c != '_').collect();
        let input = stripped.as_str();

        if let Ok(value) = parsing::hex_literal().then_ignore(end()).parse(input) {
            Ok(value)
        } else if let Ok(value) = parsing::scientific_literal().then_ignore(end()).parse(input) {
            value
        } else if let Ok(value) = parsing::decimal_literal().then_ignore(end()).parse(input) {
            Ok(value)
        } else if let Ok(value) = parsing::integer_literal().then_ignore(end()).parse(input) {
            Ok(value)
        } else {
            Err(Error::TranspileFailed(format!(
                "`{text}` could not be parsed as a numeric literal"
            )))
        }
    }
}

/// Renders the value in a form that [`RationalLiteral::parse`] accepts
/// whenever the denominator divides a power of ten, which holds for every
/// parsed literal, and as `n / d` otherwise.
impl Display for RationalLiteral {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let Some(integer) = self.to_integer() {
            return write!(f, "{integer}");
        }

        // Count the factors of two and five in the denominator. Whatever
        // remains decides whether an exact decimal expansion exists.
        let mut rest = self.denominator.clone();
        let two = BigInt::from(2);
        let five = BigInt::from(5);
        let mut twos = 0_u32;
        let mut fives = 0_u32;
        while (&rest % &two).is_zero() {
            rest /= &two;
            twos += 1;
        }
        while (&rest % &five).is_zero() {
            rest /= &five;
            fives += 1;
        }

        if !rest.is_one() {
            return write!(f, "{} / {}", self.numerator, self.denominator);
        }

        let digits = twos.max(fives);
        let scaled = self.numerator.magnitude() * BigInt::from(10).magnitude().pow(digits)
            / self.denominator.magnitude();
        let mut body = scaled.to_string();
        let digits = digits as usize;
        if body.len() <= digits {
            body = format!("{}{body}", "0".repeat(digits - body.len() + 1));
        }
        body.insert(body.len() - digits, '.');

        let sign = if self.numerator.is_negative() { "-" } else { "" };
        write!(f, "{sign}{body}")
    }
}

/// Utility parsing functions for the accepted literal forms, kept separate
/// from the arithmetic so each form stays small and testable.
pub mod parsing {
    use chumsky::{error::Simple, prelude::just, text::digits, Parser};
    use num_bigint::BigInt;
    use num_traits::{Signed, Zero};

    use crate::rational::RationalLiteral;

    /// Simply to avoid typing out the whole parser type parameter
    /// specification every single time given it only varies in one
    /// parameter.
    pub trait LiteralParser<T>: Parser<char, T, Error = Simple<char>> {}

    /// A blanket impl to make this work, because yay.
    impl<T, U> LiteralParser<T> for U where U: Parser<char, T, Error = Simple<char>> {}

    /// Converts a digit string in the given radix to a [`BigInt`].
    fn bigint(digits: &str, radix: u32, span: std::ops::Range<usize>) -> Result<BigInt, Simple<char>> {
        BigInt::parse_bytes(digits.as_bytes(), radix).ok_or_else(|| {
            Simple::custom(span, format!("`{digits}` is not a base-{radix} integer"))
        })
    }

    /// Parses a hexadecimal literal, e.g. `0x2a`.
    #[must_use]
    pub fn hex_literal() -> impl LiteralParser<RationalLiteral> {
        just("0x")
            .ignore_then(digits(16))
            .try_map(|num: String, span| {
                let value = bigint(&num, 16, span)?;
                Ok(RationalLiteral::from_integer(value))
            })
    }

    /// Parses a plain decimal integer literal, e.g. `1000`.
    #[must_use]
    pub fn integer_literal() -> impl LiteralParser<RationalLiteral> {
        digits(10).try_map(|num: String, span| {
            let value = bigint(&num, 10, span)?;
            Ok(RationalLiteral::from_integer(value))
        })
    }

    /// Parses a decimal-point literal, e.g. `1.5`, `.5`, or `1.`.
    ///
    /// The integer part is taken without leading zeros and the fractional
    /// part without trailing zeros; the value is
    /// `intPart·fracPart / 10^len(fracPart)`. Both parts empty denotes
    /// zero.
    #[must_use]
    pub fn decimal_literal() -> impl LiteralParser<RationalLiteral> {
        digits(10)
            .or_not()
            .then_ignore(just('.'))
            .then(digits(10).or_not())
            .try_map(|(int_part, frac_part): (Option<String>, Option<String>), span| {
                let int_part = int_part.unwrap_or_default();
                let int_part = int_part.trim_start_matches('0');
                let frac_part = frac_part.unwrap_or_default();
                let frac_part = frac_part.trim_end_matches('0');

                let joined = format!("{int_part}{frac_part}");
                let numerator = if joined.is_empty() {
                    BigInt::zero()
                } else {
                    bigint(&joined, 10, span)?
                };
                #[allow(clippy::cast_possible_truncation)] // A literal cannot have 2^32 digits
                let denominator = BigInt::from(10).pow(frac_part.len() as u32);

                Ok(RationalLiteral {
                    numerator,
                    denominator,
                })
            })
    }

    /// Parses a scientific literal, e.g. `1.5e2` or `2e-3`.
    ///
    /// The coefficient is a decimal-point or integer literal; the factor is
    /// `10^exponent`, with negative exponents producing fractions.
    ///
    /// The parsed value is a `Result` because a negative exponent with a
    /// zero coefficient still constructs through the checked constructor.
    #[must_use]
    pub fn scientific_literal(
    ) -> impl LiteralParser<stc_errors::transpile::Result<RationalLiteral>> {
        let coefficient = decimal_literal().or(integer_literal());
        let exponent = just('-').or_not().then(digits(10)).map(
            |(sign, digits): (Option<char>, String)| {
                let mut text = String::new();
                text.extend(sign);
                text.push_str(&digits);
                text
            },
        );

        coefficient
            .then_ignore(just('e').or(just('E')))
            .then(exponent)
            .try_map(|(coefficient, exponent), span: std::ops::Range<usize>| {
                let exponent: BigInt = bigint(&exponent, 10, span.clone())?;
                let power = u32::try_from(exponent.magnitude()).map_err(|_| {
                    Simple::custom(span, format!("exponent {exponent} is too large"))
                })?;
                let factor = BigInt::from(10).pow(power);

                let value = if exponent.is_negative() {
                    RationalLiteral::new(
                        coefficient.numerator,
                        coefficient.denominator * factor,
                    )
                } else {
                    Ok(RationalLiteral {
                        numerator:   coefficient.numerator * factor,
                        denominator: coefficient.denominator,
                    })
                };
                Ok(value)
            })
    }
}
