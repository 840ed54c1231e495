//! Numbers as they appear on the stack.

use std::ops::{Add, Neg, Sub};

#[derive(Debug, Clone, Copy, Eq, PartialEq, thiserror::Error)]
pub enum NumError {
    #[error("number exceeds the permitted encoded length")]
    Overflow,
    #[error("number is not minimally encoded")]
    NotMinimallyEncoded,
}

/// Integer operand of the arithmetic opcodes.
///
/// The stack form is little-endian sign-magnitude: the high bit of the final byte
/// is the sign and zero is the empty element. Arithmetic is carried out on `i64`,
/// so results of 4-byte operands never overflow, but they may be re-encoded in up
/// to 5 bytes and are then unusable as operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ScriptNum {
    value: i64,
}

impl<T: Into<i64>> From<T> for ScriptNum {
    fn from(value: T) -> Self {
        Self {
            value: value.into(),
        }
    }
}

impl ScriptNum {
    /// Longest operand accepted by arithmetic opcodes.
    pub const MAX_NUM_SIZE: usize = 4;

    /// Decodes a stack element, rejecting it when longer than `max_size` bytes
    /// (default [`Self::MAX_NUM_SIZE`]) or, with `require_minimal`, when it carries
    /// redundant trailing bytes.
    pub fn from_bytes(
        data: &[u8],
        require_minimal: bool,
        max_size: Option<usize>,
    ) -> Result<Self, NumError> {
        if data.len() > max_size.unwrap_or(Self::MAX_NUM_SIZE).min(8) {
            return Err(NumError::Overflow);
        }
        if require_minimal && !is_minimal(data) {
            return Err(NumError::NotMinimallyEncoded);
        }

        let Some((&last, _)) = data.split_last() else {
            return Ok(Self { value: 0 });
        };

        let magnitude = data
            .iter()
            .rev()
            .fold(0u64, |acc, &byte| (acc << 8) | u64::from(byte))
            & !(0x80u64 << (8 * (data.len() - 1)));
        let magnitude = magnitude as i64;

        let value = if last & 0x80 != 0 {
            -magnitude
        } else {
            magnitude
        };
        Ok(Self { value })
    }

    /// Minimal stack encoding of the number.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut magnitude = self.value.unsigned_abs();
        let mut bytes = Vec::with_capacity(9);
        while magnitude > 0 {
            bytes.push(magnitude as u8);
            magnitude >>= 8;
        }

        let sign = if self.value < 0 { 0x80 } else { 0x00 };
        match bytes.last().copied() {
            // The high bit is taken, so the sign needs a byte of its own.
            Some(last) if last & 0x80 != 0 => bytes.push(sign),
            Some(last) => {
                let top = bytes.len() - 1;
                bytes[top] = last | sign;
            }
            None => {}
        }
        bytes
    }

    pub fn value(&self) -> i64 {
        self.value
    }

    pub fn is_zero(&self) -> bool {
        self.value == 0
    }

    pub fn is_negative(&self) -> bool {
        self.value < 0
    }

    pub fn abs(&self) -> Self {
        Self {
            value: self.value.saturating_abs(),
        }
    }

    fn checked(value: Option<i64>) -> Result<Self, NumError> {
        value.map(|value| Self { value }).ok_or(NumError::Overflow)
    }
}

/// A trailing `0x00` or `0x80` byte is only allowed when the byte before it has
/// its high bit set. Negative zero is never minimal.
fn is_minimal(data: &[u8]) -> bool {
    match data {
        [] => true,
        [.., last] if last & 0x7f != 0 => true,
        [.., before, _] => before & 0x80 != 0,
        [_] => false,
    }
}

impl Add for ScriptNum {
    type Output = Result<Self, NumError>;

    fn add(self, rhs: Self) -> Self::Output {
        Self::checked(self.value.checked_add(rhs.value))
    }
}

impl Sub for ScriptNum {
    type Output = Result<Self, NumError>;

    fn sub(self, rhs: Self) -> Self::Output {
        Self::checked(self.value.checked_sub(rhs.value))
    }
}

impl Neg for ScriptNum {
    type Output = Result<Self, NumError>;

    fn neg(self) -> Self::Output {
        Self::checked(self.value.checked_neg())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(hex: &str, max_size: usize) -> Result<i64, NumError> {
        let data = hex::decode(hex).unwrap();
        ScriptNum::from_bytes(&data, true, Some(max_size)).map(|n| n.value())
    }

    #[test]
    fn test_encoding_boundaries() {
        let cases = [
            (0i64, ""),
            (1, "01"),
            (-1, "81"),
            (127, "7f"),
            (-127, "ff"),
            (128, "8000"),
            (-128, "8080"),
            (255, "ff00"),
            (256, "0001"),
            (-256, "0081"),
            (-32768, "008080"),
            (2147483647, "ffffff7f"),
            (-2147483647, "ffffffff"),
            (2147483648, "0000008000"),
            (-2147483648, "0000008080"),
            (4294967295, "ffffffff00"),
        ];

        for (value, hex) in cases {
            assert_eq!(hex::encode(ScriptNum::from(value).to_bytes()), hex, "{value}");
            assert_eq!(decode(hex, 5), Ok(value), "{hex}");
        }
    }

    #[test]
    fn test_operand_length_limit() {
        assert_eq!(decode("ffffff7f", 4), Ok(i32::MAX.into()));
        assert_eq!(decode("0000008000", 4), Err(NumError::Overflow));
        assert_eq!(decode("0000008000", 5), Ok(1 << 31));
        assert_eq!(decode("ffffffffff", 5), Ok(-549755813887));
        assert_eq!(decode("000000000001", 5), Err(NumError::Overflow));
    }

    #[test]
    fn test_minimal_encoding() {
        for hex in ["00", "80", "0100", "7f00", "ff7f00", "000080", "00000800"] {
            assert_eq!(decode(hex, 4), Err(NumError::NotMinimallyEncoded), "{hex}");
        }
        // Padding is accepted once the minimal check is off.
        let lenient = |hex: &str| {
            ScriptNum::from_bytes(&hex::decode(hex).unwrap(), false, None).map(|n| n.value())
        };
        assert_eq!(lenient("00"), Ok(0));
        assert_eq!(lenient("80"), Ok(0));
        assert_eq!(lenient("0100"), Ok(1));
        assert_eq!(lenient("000080"), Ok(0));
        assert_eq!(lenient("00000800"), Ok(524288));
    }

    #[test]
    fn test_checked_arithmetic() {
        let five = ScriptNum::from(5);
        let three = ScriptNum::from(3);
        assert_eq!((five + three).map(|n| n.value()), Ok(8));
        assert_eq!((three - five).map(|n| n.value()), Ok(-2));
        assert_eq!((-five).map(|n| n.value()), Ok(-5));
        assert_eq!(ScriptNum::from(-7).abs().value(), 7);
        assert!(ScriptNum::from(-7).is_negative());
        assert!(ScriptNum::from(0).is_zero());

        assert_eq!(ScriptNum::from(i64::MAX) + ScriptNum::from(1), Err(NumError::Overflow));
        assert_eq!(ScriptNum::from(i64::MIN) - ScriptNum::from(1), Err(NumError::Overflow));
        assert_eq!(-ScriptNum::from(i64::MIN), Err(NumError::Overflow));
    }
}
