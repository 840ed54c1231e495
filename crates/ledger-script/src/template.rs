//! Standard spending templates.
//!
//! Locking scripts are built from a [`Template`] by [`build_template`], which is
//! the inverse of [`crate::solve`]. The unlocking side of every template has its
//! own builder below. Templates only take precomputed hashes.

use crate::constants::MAX_PUBKEYS_PER_MULTISIG;
use crate::error::TemplateError;
use crate::script::Script;
use crate::solver::ScriptType;
use bitcoin::Witness;
use bitcoin::opcodes::all::*;
use bitcoin::script::{Builder, PushBytes};

/// A standard locking script together with its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Template {
    /// `OP_DUP OP_HASH160 <pubkey_hash> OP_EQUALVERIFY OP_CHECKSIG`
    KeyHash { pubkey_hash: [u8; 20] },
    /// `OP_HASH160 <script_hash> OP_EQUAL`, where `script_hash` is HASH160 of the redeem script.
    ScriptHash { script_hash: [u8; 20] },
    /// `OP_0 <pubkey_hash>`
    WitnessKeyHash { pubkey_hash: [u8; 20] },
    /// `OP_0 <script_hash>`, where `script_hash` is SHA256 of the witness script.
    WitnessScriptHash { script_hash: [u8; 32] },
    /// `<required> <pubkey>... <n> OP_CHECKMULTISIG`
    ///
    /// Valid for `1 <= required <= n <= 20` with non-empty keys.
    Multisig { required: u8, pubkeys: Vec<Vec<u8>> },
    /// `<lock_time> OP_CHECKLOCKTIMEVERIFY OP_DROP` followed by a key-hash body.
    AbsoluteTimelock { lock_time: u32, pubkey_hash: [u8; 20] },
    /// `<sequence> OP_CHECKSEQUENCEVERIFY OP_DROP` followed by a key-hash body.
    RelativeTimelock { sequence: u32, pubkey_hash: [u8; 20] },
    /// Claimable by the recipient with the preimage of `payment_hash` (SHA256),
    /// or by the sender once `timeout` is reached.
    HashedTimelock {
        payment_hash: [u8; 32],
        timeout: u32,
        recipient_pubkey_hash: [u8; 20],
        sender_pubkey_hash: [u8; 20],
    },
}

impl Template {
    /// Kind of the script this template builds, [`ScriptType::Unknown`] when its
    /// parameters are out of range.
    pub fn script_type(&self) -> ScriptType {
        match self {
            Self::KeyHash { .. } => ScriptType::KeyHash,
            Self::ScriptHash { .. } => ScriptType::ScriptHash,
            Self::WitnessKeyHash { .. } => ScriptType::WitnessKeyHash,
            Self::WitnessScriptHash { .. } => ScriptType::WitnessScriptHash,
            Self::Multisig { required, pubkeys } => {
                match (self.check(), u8::try_from(pubkeys.len())) {
                    (Ok(()), Ok(total)) => ScriptType::Multisig {
                        required: *required,
                        total,
                    },
                    _ => ScriptType::Unknown,
                }
            }
            Self::AbsoluteTimelock { .. } => ScriptType::AbsoluteTimelock,
            Self::RelativeTimelock { .. } => ScriptType::RelativeTimelock,
            Self::HashedTimelock { .. } => ScriptType::HashedTimelock,
        }
    }

    /// Rejects parameters whose script [`crate::classify`] would not recognise.
    pub fn check(&self) -> Result<(), TemplateError> {
        let Self::Multisig { required, pubkeys } = self else {
            return Ok(());
        };

        let total = pubkeys.len();
        if total == 0 || total as i64 > MAX_PUBKEYS_PER_MULTISIG {
            return Err(TemplateError::PubkeyCount(total));
        }
        if *required == 0 || usize::from(*required) > total {
            return Err(TemplateError::Threshold {
                required: *required,
                total,
            });
        }
        if let Some(index) = pubkeys.iter().position(Vec::is_empty) {
            return Err(TemplateError::EmptyPubkey(index));
        }

        Ok(())
    }

    pub fn to_script(&self) -> Result<Script, TemplateError> {
        build_template(self)
    }
}

fn push_bytes(builder: Builder, data: &[u8]) -> Result<Builder, TemplateError> {
    Ok(builder.push_slice(<&PushBytes>::try_from(data)?))
}

fn push_key_hash_body(builder: Builder, pubkey_hash: &[u8; 20]) -> Builder {
    builder
        .push_opcode(OP_DUP)
        .push_opcode(OP_HASH160)
        .push_slice(pubkey_hash)
        .push_opcode(OP_EQUALVERIFY)
        .push_opcode(OP_CHECKSIG)
}

/// Builds the canonical locking script of `template`.
pub fn build_template(template: &Template) -> Result<Script, TemplateError> {
    template.check()?;

    let builder = Builder::new();

    let builder = match template {
        Template::KeyHash { pubkey_hash } => push_key_hash_body(builder, pubkey_hash),
        Template::ScriptHash { script_hash } => builder
            .push_opcode(OP_HASH160)
            .push_slice(script_hash)
            .push_opcode(OP_EQUAL),
        Template::WitnessKeyHash { pubkey_hash } => builder.push_int(0).push_slice(pubkey_hash),
        Template::WitnessScriptHash { script_hash } => builder.push_int(0).push_slice(script_hash),
        Template::Multisig { required, pubkeys } => pubkeys
            .iter()
            .try_fold(builder.push_int(i64::from(*required)), |builder, pubkey| {
                push_bytes(builder, pubkey)
            })?
            .push_int(pubkeys.len() as i64)
            .push_opcode(OP_CHECKMULTISIG),
        Template::AbsoluteTimelock {
            lock_time,
            pubkey_hash,
        } => push_key_hash_body(
            builder
                .push_int(i64::from(*lock_time))
                .push_opcode(OP_CLTV)
                .push_opcode(OP_DROP),
            pubkey_hash,
        ),
        Template::RelativeTimelock {
            sequence,
            pubkey_hash,
        } => push_key_hash_body(
            builder
                .push_int(i64::from(*sequence))
                .push_opcode(OP_CSV)
                .push_opcode(OP_DROP),
            pubkey_hash,
        ),
        Template::HashedTimelock {
            payment_hash,
            timeout,
            recipient_pubkey_hash,
            sender_pubkey_hash,
        } => builder
            .push_opcode(OP_IF)
            .push_opcode(OP_SHA256)
            .push_slice(payment_hash)
            .push_opcode(OP_EQUALVERIFY)
            .push_opcode(OP_DUP)
            .push_opcode(OP_HASH160)
            .push_slice(recipient_pubkey_hash)
            .push_opcode(OP_ELSE)
            .push_int(i64::from(*timeout))
            .push_opcode(OP_CLTV)
            .push_opcode(OP_DROP)
            .push_opcode(OP_DUP)
            .push_opcode(OP_HASH160)
            .push_slice(sender_pubkey_hash)
            .push_opcode(OP_ENDIF)
            .push_opcode(OP_EQUALVERIFY)
            .push_opcode(OP_CHECKSIG),
    };

    Ok(Script::try_from(builder)?)
}

/// `<sig> <pubkey>`, for key-hash and both timelock templates.
pub fn key_hash_unlocking(signature: &[u8], pubkey: &[u8]) -> Result<Script, TemplateError> {
    let builder = push_bytes(push_bytes(Builder::new(), signature)?, pubkey)?;
    Ok(Script::try_from(builder)?)
}

/// `OP_0 <sig>...`
///
/// `OP_CHECKMULTISIG` consumes one element more than the signatures, `OP_0` is
/// that placeholder. Signatures must be given in the order of their keys.
pub fn multisig_unlocking<S: AsRef<[u8]>>(signatures: &[S]) -> Result<Script, TemplateError> {
    let builder = signatures
        .iter()
        .try_fold(Builder::new().push_int(0), |builder, sig| {
            push_bytes(builder, sig.as_ref())
        })?;
    Ok(Script::try_from(builder)?)
}

/// The redeem script's own unlocking ops followed by a push of the redeem script.
pub fn script_hash_unlocking(
    redeem_unlocking: &Script,
    redeem_script: &Script,
) -> Result<Script, TemplateError> {
    let builder = Builder::from(redeem_unlocking.to_bytes());
    let builder = push_bytes(builder, redeem_script.as_bytes())?;
    Ok(Script::try_from(builder)?)
}

/// `<sig> <pubkey> <preimage> OP_1`, takes the `OP_IF` branch.
pub fn htlc_claim_unlocking(
    signature: &[u8],
    pubkey: &[u8],
    preimage: &[u8],
) -> Result<Script, TemplateError> {
    let builder = push_bytes(push_bytes(Builder::new(), signature)?, pubkey)?;
    let builder = push_bytes(builder, preimage)?.push_int(1);
    Ok(Script::try_from(builder)?)
}

/// `<sig> <pubkey> OP_0`, takes the `OP_ELSE` branch.
pub fn htlc_refund_unlocking(signature: &[u8], pubkey: &[u8]) -> Result<Script, TemplateError> {
    let builder = push_bytes(push_bytes(Builder::new(), signature)?, pubkey)?.push_int(0);
    Ok(Script::try_from(builder)?)
}

pub fn witness_key_hash_witness(signature: &[u8], pubkey: &[u8]) -> Witness {
    Witness::from(vec![signature.to_vec(), pubkey.to_vec()])
}

/// Witness stack elements followed by the witness script itself.
///
/// A multisig witness script needs an empty first element as its placeholder.
pub fn witness_script_hash_witness<S: AsRef<[u8]>>(args: &[S], witness_script: &Script) -> Witness {
    let mut witness = Witness::new();
    for arg in args {
        witness.push(arg.as_ref());
    }
    witness.push(witness_script.as_bytes());
    witness
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::Op;
    use crate::solver::{classify, solve};

    fn all_templates() -> Vec<Template> {
        vec![
            Template::KeyHash {
                pubkey_hash: [1; 20],
            },
            Template::ScriptHash {
                script_hash: [2; 20],
            },
            Template::WitnessKeyHash {
                pubkey_hash: [3; 20],
            },
            Template::WitnessScriptHash {
                script_hash: [4; 32],
            },
            Template::Multisig {
                required: 2,
                pubkeys: vec![vec![0x02; 33], vec![0x03; 33], vec![0x04; 65]],
            },
            Template::Multisig {
                required: 17,
                pubkeys: vec![vec![0x02; 33]; 20],
            },
            Template::AbsoluteTimelock {
                lock_time: 700_000,
                pubkey_hash: [5; 20],
            },
            Template::AbsoluteTimelock {
                lock_time: 1_700_000_000,
                pubkey_hash: [5; 20],
            },
            Template::RelativeTimelock {
                sequence: 144,
                pubkey_hash: [6; 20],
            },
            Template::RelativeTimelock {
                sequence: 0,
                pubkey_hash: [6; 20],
            },
            Template::HashedTimelock {
                payment_hash: [7; 32],
                timeout: 800_000,
                recipient_pubkey_hash: [8; 20],
                sender_pubkey_hash: [9; 20],
            },
        ]
    }

    #[test]
    fn test_build_then_solve() {
        for template in all_templates() {
            let script = build_template(&template).unwrap();
            assert_eq!(classify(&script), template.script_type(), "{script}");
            assert_eq!(solve(&script).as_ref(), Some(&template));

            let decoded = Script::decode(&script.to_bytes()).unwrap();
            assert_eq!(solve(&decoded), Some(template));
        }
    }

    #[test]
    fn test_key_hash_layout() {
        let script = build_template(&Template::KeyHash {
            pubkey_hash: [0xab; 20],
        })
        .unwrap();
        let mut expected = vec![0x76, 0xa9, 0x14];
        expected.extend([0xabu8; 20]);
        expected.extend([0x88, 0xac]);
        assert_eq!(script.to_bytes(), expected);
    }

    #[test]
    fn test_htlc_layout() {
        let script = build_template(&Template::HashedTimelock {
            payment_hash: [7; 32],
            timeout: 100,
            recipient_pubkey_hash: [8; 20],
            sender_pubkey_hash: [9; 20],
        })
        .unwrap();
        assert_eq!(
            script.to_string(),
            format!(
                "OP_IF OP_SHA256 {} OP_EQUALVERIFY OP_DUP OP_HASH160 {} OP_ELSE 64 \
                 OP_CLTV OP_DROP OP_DUP OP_HASH160 {} OP_ENDIF OP_EQUALVERIFY \
                 OP_CHECKSIG",
                hex::encode([7u8; 32]),
                hex::encode([8u8; 20]),
                hex::encode([9u8; 20]),
            )
        );
    }

    #[test]
    fn test_unlocking_builders() {
        let unlocking = multisig_unlocking(&[vec![1u8; 71], vec![2u8; 72]]).unwrap();
        assert_eq!(
            unlocking.ops(),
            &[
                Op::Push(vec![]),
                Op::Push(vec![1u8; 71]),
                Op::Push(vec![2u8; 72])
            ]
        );

        let redeem = build_template(&Template::Multisig {
            required: 1,
            pubkeys: vec![vec![0x02; 33]],
        })
        .unwrap();
        let unlocking =
            script_hash_unlocking(&multisig_unlocking(&[[1u8; 71]]).unwrap(), &redeem).unwrap();
        assert_eq!(unlocking.ops().len(), 3);
        assert_eq!(unlocking.ops()[2], Op::Push(redeem.to_bytes()));
        assert!(unlocking.is_push_only());

        assert_eq!(
            htlc_refund_unlocking(&[1], &[2]).unwrap().ops(),
            &[Op::Push(vec![1]), Op::Push(vec![2]), Op::Push(vec![])]
        );
        assert_eq!(
            htlc_claim_unlocking(&[1], &[2], &[3]).unwrap().ops().last(),
            Some(&Op::Code(OP_PUSHNUM_1))
        );

        let witness = witness_script_hash_witness(&[vec![], vec![1u8; 71]], &redeem);
        assert_eq!(witness.len(), 3);
        assert_eq!(witness.last(), Some(redeem.to_bytes().as_slice()));
        assert_eq!(witness_key_hash_witness(&[1], &[2]).to_vec(), vec![vec![1], vec![2]]);
    }

    #[test]
    fn test_out_of_range_multisig() {
        let key = vec![0x02; 33];
        let cases = [
            (0, vec![key.clone()], TemplateError::Threshold { required: 0, total: 1 }),
            (3, vec![key.clone(); 2], TemplateError::Threshold { required: 3, total: 2 }),
            (1, vec![], TemplateError::PubkeyCount(0)),
            (1, vec![key.clone(); 21], TemplateError::PubkeyCount(21)),
            (1, vec![key.clone(), vec![]], TemplateError::EmptyPubkey(1)),
        ];

        for (required, pubkeys, error) in cases {
            let template = Template::Multisig { required, pubkeys };
            assert_eq!(build_template(&template), Err(error.clone()));
            assert_eq!(template.to_script(), Err(error));
            assert_eq!(template.script_type(), ScriptType::Unknown);
        }

        // 256 keys would wrap a u8 count.
        let template = Template::Multisig {
            required: 1,
            pubkeys: vec![key; 256],
        };
        assert_eq!(template.script_type(), ScriptType::Unknown);
        assert_eq!(build_template(&template), Err(TemplateError::PubkeyCount(256)));
    }
}
