use crate::constants::{LOCKTIME_NUM_SIZE, MAX_PUBKEYS_PER_MULTISIG};
use crate::num::ScriptNum;
use crate::script::{Op, Script};
use crate::template::Template;
use bitcoin::opcodes::all::*;

/// Standard locking-script kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptType {
    KeyHash,
    ScriptHash,
    WitnessKeyHash,
    WitnessScriptHash,
    Multisig { required: u8, total: u8 },
    AbsoluteTimelock,
    RelativeTimelock,
    HashedTimelock,
    Unknown,
}

impl ScriptType {
    /// Stable lowercase label.
    pub fn name(&self) -> &'static str {
        match self {
            Self::KeyHash => "keyhash",
            Self::ScriptHash => "scripthash",
            Self::WitnessKeyHash => "witness_keyhash",
            Self::WitnessScriptHash => "witness_scripthash",
            Self::Multisig { .. } => "multisig",
            Self::AbsoluteTimelock => "absolute_timelock",
            Self::RelativeTimelock => "relative_timelock",
            Self::HashedTimelock => "hashed_timelock",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ScriptType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Multisig { required, total } => write!(f, "multisig({required},{total})"),
            other => f.write_str(other.name()),
        }
    }
}

/// Reports which standard template `script` matches.
pub fn classify(script: &Script) -> ScriptType {
    solve(script).map_or(ScriptType::Unknown, |template| template.script_type())
}

/// Recognises a standard locking script and extracts its parameters.
///
/// Templates are tried in a fixed order and the first match wins.
pub fn solve(script: &Script) -> Option<Template> {
    let ops = script.ops();

    match_script_hash(ops)
        .or_else(|| match_witness_program(script))
        .or_else(|| key_hash_body(ops).map(|pubkey_hash| Template::KeyHash { pubkey_hash }))
        .or_else(|| match_hashed_timelock(ops))
        .or_else(|| match_timelock(ops))
        .or_else(|| match_multisig(ops))
}

fn match_script_hash(ops: &[Op]) -> Option<Template> {
    match ops {
        [Op::Code(OP_HASH160), Op::Push(hash), Op::Code(OP_EQUAL)] => Some(Template::ScriptHash {
            script_hash: hash.as_slice().try_into().ok()?,
        }),
        _ => None,
    }
}

fn match_witness_program(script: &Script) -> Option<Template> {
    let program = script.witness_program()?;

    if script.is_witness_key_hash() {
        Some(Template::WitnessKeyHash {
            pubkey_hash: program.try_into().ok()?,
        })
    } else if script.is_witness_script_hash() {
        Some(Template::WitnessScriptHash {
            script_hash: program.try_into().ok()?,
        })
    } else {
        None
    }
}

/// `OP_DUP OP_HASH160 <20 bytes> OP_EQUALVERIFY OP_CHECKSIG`
fn key_hash_body(ops: &[Op]) -> Option<[u8; 20]> {
    match ops {
        [
            Op::Code(OP_DUP),
            Op::Code(OP_HASH160),
            Op::Push(hash),
            Op::Code(OP_EQUALVERIFY),
            Op::Code(OP_CHECKSIG),
        ] => hash.as_slice().try_into().ok(),
        _ => None,
    }
}

fn match_timelock(ops: &[Op]) -> Option<Template> {
    match ops {
        [lock, Op::Code(OP_CLTV), Op::Code(OP_DROP), body @ ..] => {
            Some(Template::AbsoluteTimelock {
                lock_time: parse_lock_value(lock)?,
                pubkey_hash: key_hash_body(body)?,
            })
        }
        [lock, Op::Code(OP_CSV), Op::Code(OP_DROP), body @ ..] => {
            Some(Template::RelativeTimelock {
                sequence: parse_lock_value(lock)?,
                pubkey_hash: key_hash_body(body)?,
            })
        }
        _ => None,
    }
}

fn match_hashed_timelock(ops: &[Op]) -> Option<Template> {
    match ops {
        [
            Op::Code(OP_IF),
            Op::Code(OP_SHA256),
            Op::Push(payment_hash),
            Op::Code(OP_EQUALVERIFY),
            Op::Code(OP_DUP),
            Op::Code(OP_HASH160),
            Op::Push(recipient),
            Op::Code(OP_ELSE),
            timeout,
            Op::Code(OP_CLTV),
            Op::Code(OP_DROP),
            Op::Code(OP_DUP),
            Op::Code(OP_HASH160),
            Op::Push(sender),
            Op::Code(OP_ENDIF),
            Op::Code(OP_EQUALVERIFY),
            Op::Code(OP_CHECKSIG),
        ] => Some(Template::HashedTimelock {
            payment_hash: payment_hash.as_slice().try_into().ok()?,
            timeout: parse_lock_value(timeout)?,
            recipient_pubkey_hash: recipient.as_slice().try_into().ok()?,
            sender_pubkey_hash: sender.as_slice().try_into().ok()?,
        }),
        _ => None,
    }
}

/// Checks whether a script is a bare multisig script:
///
///    `2 <pubkey1> <pubkey2> <pubkey3> 3 OP_CHECKMULTISIG`
fn match_multisig(ops: &[Op]) -> Option<Template> {
    let [required, keys @ .., total, Op::Code(OP_CHECKMULTISIG)] = ops else {
        return None;
    };

    let required = parse_int(required, ScriptNum::MAX_NUM_SIZE)?;
    let total = parse_int(total, ScriptNum::MAX_NUM_SIZE)?;

    if total != keys.len() as i64 || total > MAX_PUBKEYS_PER_MULTISIG {
        return None;
    }

    if required < 1 || required > total {
        return None;
    }

    let pubkeys = keys
        .iter()
        .map(|key| match key {
            Op::Push(key) if !key.is_empty() => Some(key.clone()),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;

    Some(Template::Multisig {
        required: required as u8,
        pubkeys,
    })
}

fn parse_int(op: &Op, max_size: usize) -> Option<i64> {
    match op {
        Op::Push(data) => ScriptNum::from_bytes(data, true, Some(max_size))
            .ok()
            .map(|num| num.value()),
        op => op.small_int(),
    }
}

fn parse_lock_value(op: &Op) -> Option<u32> {
    parse_int(op, LOCKTIME_NUM_SIZE).and_then(|value| u32::try_from(value).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::BuilderExt;
    use bitcoin::script::Builder;

    #[test]
    fn test_classify_decoded_key_hash() {
        let bytes = hex::decode("76a91489abcdefabbaabbaabbaabbaabbaabbaabbaabba88ac").unwrap();
        let script = Script::decode(&bytes).unwrap();
        assert_eq!(classify(&script), ScriptType::KeyHash);
        assert_eq!(
            solve(&script),
            Some(Template::KeyHash {
                pubkey_hash: hex::decode("89abcdefabbaabbaabbaabbaabbaabbaabbaabba")
                    .unwrap()
                    .try_into()
                    .unwrap()
            })
        );
    }

    #[test]
    fn test_classify_rejects_wrong_hash_sizes() {
        let script = Builder::new()
            .push_opcode(OP_HASH160)
            .push_data([0u8; 19])
            .push_opcode(OP_EQUAL)
            .build();
        assert_eq!(classify(&script), ScriptType::Unknown);

        let script = Builder::new().push_int(0).push_data([0u8; 25]).build();
        assert_eq!(classify(&script), ScriptType::Unknown);
    }

    #[test]
    fn test_classify_multisig() {
        let key = vec![0x02; 33];
        let script = Builder::new()
            .push_int(2)
            .push_data(&key)
            .push_data(&key)
            .push_data(&key)
            .push_int(3)
            .push_opcode(OP_CHECKMULTISIG)
            .build();
        assert_eq!(classify(&script), ScriptType::Multisig { required: 2, total: 3 });
        assert_eq!(classify(&script).to_string(), "multisig(2,3)");

        // Key count does not match.
        let script = Builder::new()
            .push_int(1)
            .push_data(&key)
            .push_int(2)
            .push_opcode(OP_CHECKMULTISIG)
            .build();
        assert_eq!(classify(&script), ScriptType::Unknown);

        // Empty keys.
        let script = Builder::new()
            .push_int(1)
            .push_int(0)
            .push_int(1)
            .push_opcode(OP_CHECKMULTISIG)
            .build();
        assert_eq!(classify(&script), ScriptType::Unknown);

        // More signatures required than keys.
        let script = Builder::new()
            .push_int(3)
            .push_data(&key)
            .push_data(&key)
            .push_int(2)
            .push_opcode(OP_CHECKMULTISIG)
            .build();
        assert_eq!(classify(&script), ScriptType::Unknown);
    }

    #[test]
    fn test_classify_unknown() {
        assert_eq!(classify(&Script::default()), ScriptType::Unknown);
        let script = Builder::new().push_opcode(OP_RETURN).push_data(b"data").build();
        assert_eq!(classify(&script), ScriptType::Unknown);
        assert_eq!(ScriptType::Unknown.name(), "unknown");
    }

    #[test]
    fn test_negative_lock_value_is_not_a_timelock() {
        let script = Builder::new()
            .push_int(-5)
            .push_opcode(OP_CLTV)
            .push_opcode(OP_DROP)
            .push_opcode(OP_DUP)
            .push_opcode(OP_HASH160)
            .push_data([0u8; 20])
            .push_opcode(OP_EQUALVERIFY)
            .push_opcode(OP_CHECKSIG)
            .build();
        assert_eq!(classify(&script), ScriptType::Unknown);
    }
}
