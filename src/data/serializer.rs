// ============================================================
// Digit-by-Digit Float Serializer
// ============================================================
// Turns a float into a fixed-length token sequence and back:
//
//   value = ±0.d₁d₂…dₖ × 10^e
//
//   123.45  →  <+> <1> <2> <3> <5> <E3>     (k = 4)
//   -0.042  →  <-> <4> <2> <0> <0> <E-1>
//
// Why digit tokens instead of one token per float?
//   A finite token set covers every float at fixed precision,
//   so the vocabulary stays small and the sequence shape stays
//   static regardless of the value's magnitude.
//
// The exponent is clamped to a configurable range; values that
// overflow it saturate to the largest representable magnitude,
// values that underflow collapse to zero. Precision is bounded
// by k mantissa digits.

use anyhow::{bail, Result};

use crate::domain::traits::FloatSerializer;

/// Serializes floats digit by digit: one sign token, `num_digits`
/// mantissa digit tokens, and one exponent token.
#[derive(Debug, Clone)]
pub struct DigitFloatSerializer {
    /// Number of mantissa digits k (precision)
    num_digits: usize,

    /// Exponents are clamped to [-exp_range, exp_range]
    exp_range: i32,
}

impl DigitFloatSerializer {
    /// Create a serializer with the given precision and exponent range
    pub fn new(num_digits: usize, exp_range: i32) -> Self {
        Self { num_digits, exp_range }
    }

    fn sign_token(negative: bool) -> String {
        if negative { "<->".to_string() } else { "<+>".to_string() }
    }

    fn digit_token(d: u32) -> String {
        format!("<{d}>")
    }

    fn exp_token(e: i32) -> String {
        format!("<E{e}>")
    }
}

impl Default for DigitFloatSerializer {
    fn default() -> Self {
        Self::new(4, 10)
    }
}

impl FloatSerializer for DigitFloatSerializer {
    fn num_tokens_per_value(&self) -> usize {
        // sign + mantissa digits + exponent
        self.num_digits + 2
    }

    fn all_tokens(&self) -> Vec<String> {
        let mut tokens = vec![Self::sign_token(false), Self::sign_token(true)];
        tokens.extend((0..10).map(Self::digit_token));
        tokens.extend((-self.exp_range..=self.exp_range).map(Self::exp_token));
        tokens
    }

    fn serialize(&self, value: f64) -> Result<Vec<String>> {
        if !value.is_finite() {
            bail!("cannot serialize non-finite value: {value}");
        }

        let scale = 10f64.powi(self.num_digits as i32);
        let abs   = value.abs();

        // Normalise to mantissa in [0.1, 1) with integer exponent,
        // then round the mantissa to k digits.
        let (mut digits, mut exp) = if abs == 0.0 {
            (0u64, 0i32)
        } else {
            let e = abs.log10().floor() as i32 + 1;
            let d = (abs / 10f64.powi(e) * scale).round() as u64;
            (d, e)
        };

        // Rounding may carry over (0.99995 → 1.0000): shift back into range
        if digits >= scale as u64 {
            digits /= 10;
            exp += 1;
        }

        // Saturate on exponent overflow, collapse to zero on underflow
        if exp > self.exp_range {
            digits = scale as u64 - 1;
            exp    = self.exp_range;
        } else if exp < -self.exp_range {
            digits = 0;
            exp    = -self.exp_range;
        }

        let mut tokens = Vec::with_capacity(self.num_tokens_per_value());
        tokens.push(Self::sign_token(value.is_sign_negative() && digits != 0));

        // Most significant digit first
        let digit_str = format!("{digits:0width$}", width = self.num_digits);
        for ch in digit_str.chars() {
            let d = ch.to_digit(10).expect("digit string contains only digits");
            tokens.push(Self::digit_token(d));
        }

        tokens.push(Self::exp_token(exp));
        Ok(tokens)
    }

    fn deserialize(&self, tokens: &[String]) -> Result<f64> {
        if tokens.len() != self.num_tokens_per_value() {
            bail!(
                "expected {} tokens, got {}",
                self.num_tokens_per_value(),
                tokens.len()
            );
        }

        let sign = match tokens[0].as_str() {
            "<+>" => 1.0,
            "<->" => -1.0,
            other => bail!("invalid sign token '{other}'"),
        };

        let mut mantissa = 0u64;
        for token in &tokens[1..=self.num_digits] {
            let inner = token
                .strip_prefix('<')
                .and_then(|t| t.strip_suffix('>'))
                .and_then(|t| t.parse::<u64>().ok());
            match inner {
                Some(d) if d < 10 => mantissa = mantissa * 10 + d,
                _ => bail!("invalid digit token '{token}'"),
            }
        }

        let exp_token = &tokens[self.num_digits + 1];
        let exp = exp_token
            .strip_prefix("<E")
            .and_then(|t| t.strip_suffix('>'))
            .and_then(|t| t.parse::<i32>().ok());
        let exp = match exp {
            Some(e) if e.abs() <= self.exp_range => e,
            _ => bail!("invalid exponent token '{exp_token}'"),
        };

        let scale = 10f64.powi(self.num_digits as i32);
        Ok(sign * (mantissa as f64 / scale) * 10f64.powi(exp))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_count_is_fixed() {
        let ser = DigitFloatSerializer::default();
        assert_eq!(ser.num_tokens_per_value(), 6);
        assert_eq!(ser.serialize(123.45).unwrap().len(), 6);
        assert_eq!(ser.serialize(0.0).unwrap().len(), 6);
    }

    #[test]
    fn test_serialize_positive_value() {
        let ser    = DigitFloatSerializer::default();
        let tokens = ser.serialize(123.45).unwrap();
        assert_eq!(
            tokens,
            vec!["<+>", "<1>", "<2>", "<3>", "<5>", "<E3>"]
        );
        // Round-trips within the 4-digit precision
        let back = ser.deserialize(&tokens).unwrap();
        assert!((back - 123.45).abs() / 123.45 < 1e-2);
    }

    #[test]
    fn test_serialize_negative_and_zero() {
        let ser = DigitFloatSerializer::default();

        let neg = ser.serialize(-0.042).unwrap();
        assert_eq!(neg[0], "<->");
        let back = ser.deserialize(&neg).unwrap();
        assert!((back + 0.042).abs() < 1e-4);

        let zero = ser.serialize(0.0).unwrap();
        assert_eq!(zero[0], "<+>");
        assert_eq!(ser.deserialize(&zero).unwrap(), 0.0);
    }

    #[test]
    fn test_exponent_clamping() {
        let ser = DigitFloatSerializer::new(4, 10);

        // Overflow saturates to the largest representable magnitude
        let big  = ser.serialize(1e30).unwrap();
        let back = ser.deserialize(&big).unwrap();
        assert!((back - 0.9999e10).abs() < 1e6);

        // Underflow collapses to zero
        let tiny = ser.serialize(1e-30).unwrap();
        assert_eq!(ser.deserialize(&tiny).unwrap(), 0.0);
    }

    #[test]
    fn test_rounding_carry() {
        // 0.99996 rounds up past the mantissa width and must carry
        let ser    = DigitFloatSerializer::new(4, 10);
        let tokens = ser.serialize(0.99996).unwrap();
        let back   = ser.deserialize(&tokens).unwrap();
        assert!((back - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_non_finite_rejected() {
        let ser = DigitFloatSerializer::default();
        assert!(ser.serialize(f64::NAN).is_err());
        assert!(ser.serialize(f64::INFINITY).is_err());
    }

    #[test]
    fn test_deserialize_rejects_malformed() {
        let ser  = DigitFloatSerializer::default();
        let bad: Vec<String> = vec!["<?>".into(); 6];
        assert!(ser.deserialize(&bad).is_err());
        assert!(ser.deserialize(&[]).is_err());
    }
}
