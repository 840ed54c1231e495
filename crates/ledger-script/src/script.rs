//! Decoded scripts.
//!
//! A [`Script`] keeps its encoded bytes next to the [`Op`]s they decode to. Bytes
//! are turned into a script by [`Script::decode`], which walks the instructions of
//! [`bitcoin::Script`] and never evaluates anything.

use crate::constants::MAX_SCRIPT_SIZE;
use crate::error::ParseError;
use bitcoin::WitnessVersion;
use bitcoin::opcodes::all::OP_PUSHNUM_16;
use bitcoin::opcodes::{Class, ClassifyContext, Opcode};
use bitcoin::script::{Builder, Instruction, ScriptBuf};
use std::fmt;

/// A single decoded script element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// Pushes the carried bytes. `OP_0` decodes to the empty push.
    Push(Vec<u8>),
    /// Any other byte, assigned or not.
    Code(Opcode),
}

impl Op {
    /// Returns the small integer pushed by `OP_1NEGATE` or `OP_1..=OP_16`.
    pub fn small_int(&self) -> Option<i64> {
        match self {
            Self::Code(op) => match op.classify(ClassifyContext::Legacy) {
                Class::PushNum(n) => Some(i64::from(n)),
                _ => None,
            },
            Self::Push(_) => None,
        }
    }

    /// Whether executing this op only pushes data (`OP_RESERVED` counts as a push).
    pub fn is_push(&self) -> bool {
        match self {
            Self::Push(_) => true,
            Self::Code(op) => op.to_u8() <= OP_PUSHNUM_16.to_u8(),
        }
    }
}

/// An immutable, structurally valid script.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
    bytes: ScriptBuf,
    ops: Vec<Op>,
}

impl Script {
    /// Decodes the binary format.
    ///
    /// Fails with [`ParseError::ScriptTooLarge`] for input over `MAX_SCRIPT_SIZE`
    /// bytes and with [`ParseError::TruncatedPush`] when a push runs past the end.
    pub fn decode(bytes: &[u8]) -> Result<Self, ParseError> {
        if bytes.len() > MAX_SCRIPT_SIZE {
            return Err(ParseError::ScriptTooLarge(bytes.len()));
        }
        Self::try_from(ScriptBuf::from_bytes(bytes.to_vec()))
    }

    fn split(script: &bitcoin::Script) -> Result<Vec<Op>, ParseError> {
        let mut instructions = script.instructions();
        let mut ops = Vec::new();

        loop {
            let position = script.len() - instructions.as_script().len();

            let op = match instructions.next() {
                None => break,
                Some(Ok(Instruction::PushBytes(data))) => Op::Push(data.as_bytes().to_vec()),
                Some(Ok(Instruction::Op(opcode))) => Op::Code(opcode),
                // The non-minimal iterator only fails on a push that cannot be read.
                Some(Err(_)) => return Err(ParseError::TruncatedPush { position }),
            };

            ops.push(op);
        }

        Ok(ops)
    }

    /// Encoded form, exactly as decoded or built.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.bytes.to_bytes()
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.bytes.as_bytes()
    }

    pub fn as_script(&self) -> &bitcoin::Script {
        &self.bytes
    }

    /// Encoded size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Op> {
        self.ops.iter()
    }

    pub fn is_push_only(&self) -> bool {
        self.ops.iter().all(Op::is_push)
    }

    /// Returns the program of a version 0 witness program (`OP_0 <2..=40 bytes>`).
    pub fn witness_program(&self) -> Option<&[u8]> {
        if self.bytes.witness_version() != Some(WitnessVersion::V0) {
            return None;
        }
        self.bytes.as_bytes().get(2..)
    }

    /// `OP_0 <20 bytes>`
    pub fn is_witness_key_hash(&self) -> bool {
        self.bytes.is_p2wpkh()
    }

    /// `OP_0 <32 bytes>`
    pub fn is_witness_script_hash(&self) -> bool {
        self.bytes.is_p2wsh()
    }
}

/// Checks the structure only. The size limit is left to [`Script::decode`] and
/// to the engine.
impl TryFrom<ScriptBuf> for Script {
    type Error = ParseError;

    fn try_from(bytes: ScriptBuf) -> Result<Self, Self::Error> {
        let ops = Self::split(&bytes)?;
        Ok(Self { bytes, ops })
    }
}

impl TryFrom<Builder> for Script {
    type Error = ParseError;

    fn try_from(builder: Builder) -> Result<Self, Self::Error> {
        Self::try_from(builder.into_script())
    }
}

impl<'a> IntoIterator for &'a Script {
    type Item = &'a Op;
    type IntoIter = std::slice::Iter<'a, Op>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.iter()
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, op) in self.ops.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            match op {
                Op::Push(data) if data.is_empty() => f.write_str("OP_0")?,
                Op::Push(data) => f.write_str(&hex::encode(data))?,
                Op::Code(opcode) => write!(f, "{opcode}")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::opcodes::all::*;

    fn decode_hex(s: &str) -> Script {
        Script::decode(&hex::decode(s).unwrap()).unwrap()
    }

    #[test]
    fn test_decode_key_hash_script() {
        let bytes = hex::decode("76a91489abcdefabbaabbaabbaabbaabbaabbaabbaabba88ac").unwrap();
        let script = Script::decode(&bytes).unwrap();
        assert_eq!(
            script.ops(),
            &[
                Op::Code(OP_DUP),
                Op::Code(OP_HASH160),
                Op::Push(hex::decode("89abcdefabbaabbaabbaabbaabbaabbaabbaabba").unwrap()),
                Op::Code(OP_EQUALVERIFY),
                Op::Code(OP_CHECKSIG),
            ]
        );
        assert_eq!(script.to_bytes(), bytes);
        assert_eq!(script.len(), bytes.len());
        assert_eq!(
            script.to_string(),
            "OP_DUP OP_HASH160 89abcdefabbaabbaabbaabbaabbaabbaabbaabba OP_EQUALVERIFY OP_CHECKSIG"
        );
    }

    #[test]
    fn test_decode_pushdata_forms() {
        let bytes = [0x4c, 0x02, 0xaa, 0xbb, 0x4d, 0x01, 0x00, 0xcc];
        let script = Script::decode(&bytes).unwrap();
        assert_eq!(script.ops(), &[Op::Push(vec![0xaa, 0xbb]), Op::Push(vec![0xcc])]);
        // Non-minimal pushes keep their encoding.
        assert_eq!(script.as_bytes(), &bytes);

        let script = Script::decode(&[0x00, 0x4e, 0x00, 0x00, 0x00, 0x00, 0x51]).unwrap();
        assert_eq!(
            script.ops(),
            &[Op::Push(vec![]), Op::Push(vec![]), Op::Code(OP_PUSHNUM_1)]
        );
        assert_eq!(script.to_string(), "OP_0 OP_0 OP_PUSHNUM_1");
    }

    #[test]
    fn test_decode_truncated_push() {
        assert_eq!(
            Script::decode(&[0x51, 0x03, 0x01, 0x02]),
            Err(ParseError::TruncatedPush { position: 1 })
        );
        assert_eq!(
            Script::decode(&[0x4d, 0x01]),
            Err(ParseError::TruncatedPush { position: 0 })
        );
        assert_eq!(
            Script::decode(&[0x76, 0x4e, 0xff, 0xff, 0xff, 0xff, 0x00]),
            Err(ParseError::TruncatedPush { position: 1 })
        );
        assert_eq!(
            Script::try_from(ScriptBuf::from_bytes(vec![0x4c])),
            Err(ParseError::TruncatedPush { position: 0 })
        );
    }

    #[test]
    fn test_decode_size_limit() {
        let bytes = vec![OP_NOP.to_u8(); MAX_SCRIPT_SIZE];
        assert_eq!(Script::decode(&bytes).unwrap().len(), MAX_SCRIPT_SIZE);

        let bytes = vec![OP_NOP.to_u8(); MAX_SCRIPT_SIZE + 1];
        assert_eq!(
            Script::decode(&bytes),
            Err(ParseError::ScriptTooLarge(MAX_SCRIPT_SIZE + 1))
        );
    }

    #[test]
    fn test_decode_unassigned_bytes() {
        let script = Script::decode(&[0xbb, 0xff]).unwrap();
        assert_eq!(
            script.ops(),
            &[Op::Code(Opcode::from(0xbb)), Op::Code(OP_INVALIDOPCODE)]
        );
        assert_eq!(script.to_bytes(), vec![0xbb, 0xff]);
        assert_eq!(script.to_string(), "OP_RETURN_187 OP_INVALIDOPCODE");
    }

    #[test]
    fn test_small_ints() {
        let script = Builder::new()
            .push_int(0)
            .push_int(-1)
            .push_int(16)
            .push_int(17)
            .push_opcode(OP_RESERVED)
            .into_script();
        let script = Script::try_from(script).unwrap();
        let small_ints = script.iter().map(Op::small_int).collect::<Vec<_>>();
        assert_eq!(small_ints, vec![None, Some(-1), Some(16), None, None]);
        assert!(script.is_push_only());
    }

    #[test]
    fn test_witness_programs() {
        let script = decode_hex(&format!("0014{}", "00".repeat(20)));
        assert!(script.is_push_only());
        assert_eq!(script.witness_program(), Some(&[0u8; 20][..]));
        assert!(script.is_witness_key_hash());
        assert!(!script.is_witness_script_hash());

        let script = decode_hex(&format!("0020{}", "ab".repeat(32)));
        assert!(script.is_witness_script_hash());

        // Too short, and not version 0.
        assert_eq!(decode_hex("000101").witness_program(), None);
        assert_eq!(decode_hex(&format!("5114{}", "00".repeat(20))).witness_program(), None);

        let script = decode_hex("0176");
        assert!(!Script::decode(&[0x01, 0x76, 0x76]).unwrap().is_push_only());
        assert!(script.is_push_only());
        assert!(!Script::decode(&[0xba]).unwrap().is_push_only());
    }
}
