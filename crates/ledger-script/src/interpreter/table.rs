//! The immutable opcode registry.
//!
//! Built once on first use and shared read-only by every evaluation.

use super::eval::{Machine, locktime, multisig, sig};
use super::{ConditionalFrame, SigVersion};
use crate::VerifyFlags;
use crate::crypto::HashAlgorithm;
use crate::error::Fault;
use crate::num::ScriptNum;
use crate::stack::cast_to_bool;
use bitcoin::opcodes::all::*;
use bitcoin::opcodes::{Class, ClassifyContext, Opcode};
use std::sync::LazyLock;

/// Handler invoked for an opcode once the engine decides it runs.
pub(crate) type Handler = fn(&mut Machine<'_, '_>, Opcode) -> Result<(), Fault>;

/// How the engine treats an opcode met during evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpcodeClass {
    /// Runs only inside a taken branch. Reserved and unassigned bytes are ordinary
    /// opcodes whose handler faults.
    Ordinary,
    /// `OP_IF`, `OP_NOTIF`, `OP_ELSE` and `OP_ENDIF` run in every branch.
    Conditional,
    /// Faults with `DisabledOp` wherever it appears.
    Disabled,
    /// `OP_RETURN` faults with `ExplicitFailure` wherever it appears.
    Return,
}

/// Registry entry of one opcode.
#[derive(Clone, Copy)]
pub struct OpcodeInfo {
    pub opcode: Opcode,
    pub class: OpcodeClass,
    /// Stack elements that must be present before the handler runs.
    pub operands: usize,
    pub(crate) handler: Handler,
}

impl std::fmt::Debug for OpcodeInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpcodeInfo")
            .field("opcode", &self.opcode)
            .field("class", &self.class)
            .field("operands", &self.operands)
            .finish_non_exhaustive()
    }
}

/// Push prefixes have no entry, the decoder turns them into data.
static OPCODE_TABLE: LazyLock<[Option<OpcodeInfo>; 256]> =
    LazyLock::new(|| std::array::from_fn(|byte| describe(Opcode::from(byte as u8))));

/// Looks up the registry entry of `opcode`.
pub fn opcode_info(opcode: Opcode) -> Option<&'static OpcodeInfo> {
    OPCODE_TABLE[usize::from(opcode.to_u8())].as_ref()
}

fn entry(opcode: Opcode, operands: usize, handler: Handler) -> OpcodeInfo {
    OpcodeInfo {
        opcode,
        class: OpcodeClass::Ordinary,
        operands,
        handler,
    }
}

fn disabled(opcode: Opcode) -> OpcodeInfo {
    OpcodeInfo {
        class: OpcodeClass::Disabled,
        ..entry(opcode, 0, |_, op| Err(Fault::DisabledOp(op)))
    }
}

fn op_return(opcode: Opcode) -> OpcodeInfo {
    OpcodeInfo {
        class: OpcodeClass::Return,
        ..entry(opcode, 0, |_, _| Err(Fault::ExplicitFailure))
    }
}

fn describe(opcode: Opcode) -> Option<OpcodeInfo> {
    let info = match opcode.classify(ClassifyContext::Legacy) {
        Class::PushBytes(_) => return None,
        Class::PushNum(_) => entry(opcode, 0, push_small_int),
        // OP_VERIF, OP_VERNOTIF, OP_INVALIDOPCODE and the splice, bitwise and
        // multiplicative opcodes.
        Class::IllegalOp => disabled(opcode),
        Class::ReturnOp if opcode == OP_RETURN => op_return(opcode),
        // OP_RESERVED, OP_VER, OP_RESERVED1/2 and everything from 0xba on.
        Class::ReturnOp | Class::SuccessOp => {
            entry(opcode, 0, |_, op| Err(Fault::BadOpcode(op.to_u8())))
        }
        Class::NoOp => describe_nop(opcode),
        Class::Ordinary(_) => describe_ordinary(opcode)?,
    };
    Some(info)
}

fn describe_nop(opcode: Opcode) -> OpcodeInfo {
    match opcode {
        OP_NOP => entry(opcode, 0, |_, _| Ok(())),
        OP_CLTV => entry(opcode, 0, |m, op| {
            if !m.ctx.flags.contains(VerifyFlags::CHECKLOCKTIMEVERIFY) {
                return upgradable_nop(m, op);
            }
            locktime::check_lock_time_verify(m)
        }),
        OP_CSV => entry(opcode, 0, |m, op| {
            if !m.ctx.flags.contains(VerifyFlags::CHECKSEQUENCEVERIFY) {
                return upgradable_nop(m, op);
            }
            locktime::check_sequence_verify(m)
        }),
        _ => entry(opcode, 0, upgradable_nop),
    }
}

fn describe_ordinary(opcode: Opcode) -> Option<OpcodeInfo> {
    let info = match opcode {
        // Flow control
        OP_IF | OP_NOTIF => conditional(opcode, 1, op_if),
        OP_ELSE => conditional(opcode, 0, op_else),
        OP_ENDIF => conditional(opcode, 0, op_endif),
        OP_VERIFY => entry(opcode, 1, |m, op| {
            if !m.stack.pop_bool()? {
                return Err(Fault::VerifyFailed(op));
            }
            Ok(())
        }),

        // Stack
        OP_TOALTSTACK => entry(opcode, 1, |m, _| {
            let v = m.stack.pop()?;
            m.alt_stack.push(v);
            Ok(())
        }),
        OP_FROMALTSTACK => entry(opcode, 0, |m, _| {
            let v = m.alt_stack.pop()?;
            m.stack.push(v);
            Ok(())
        }),
        OP_2DROP => entry(opcode, 2, |m, _| Ok(m.stack.drop(2)?)),
        OP_2DUP => entry(opcode, 2, |m, _| Ok(m.stack.dup(2)?)),
        OP_3DUP => entry(opcode, 3, |m, _| Ok(m.stack.dup(3)?)),
        OP_2OVER => entry(opcode, 4, |m, _| Ok(m.stack.over(2)?)),
        OP_2ROT => entry(opcode, 6, |m, _| Ok(m.stack.rot(2)?)),
        OP_2SWAP => entry(opcode, 4, |m, _| Ok(m.stack.swap(2)?)),
        OP_IFDUP => entry(opcode, 1, |m, _| {
            if m.stack.peek_bool()? {
                m.stack.dup(1)?;
            }
            Ok(())
        }),
        OP_DEPTH => entry(opcode, 0, |m, _| {
            let depth = m.stack.len() as i64;
            m.stack.push_num(depth);
            Ok(())
        }),
        OP_DROP => entry(opcode, 1, |m, _| Ok(m.stack.drop(1)?)),
        OP_DUP => entry(opcode, 1, |m, _| Ok(m.stack.dup(1)?)),
        OP_NIP => entry(opcode, 2, |m, _| Ok(m.stack.nip()?)),
        OP_OVER => entry(opcode, 2, |m, _| Ok(m.stack.over(1)?)),
        OP_PICK | OP_ROLL => entry(opcode, 2, pick_or_roll),
        OP_ROT => entry(opcode, 3, |m, _| Ok(m.stack.rot(1)?)),
        OP_SWAP => entry(opcode, 2, |m, _| Ok(m.stack.swap(1)?)),
        OP_TUCK => entry(opcode, 2, |m, _| Ok(m.stack.tuck()?)),
        OP_SIZE => entry(opcode, 1, |m, _| {
            let size = m.stack.last()?.len() as i64;
            m.stack.push_num(size);
            Ok(())
        }),

        // Equality
        OP_EQUAL => entry(opcode, 2, |m, _| {
            let equal = m.stack.pop()? == m.stack.pop()?;
            m.stack.push_bool(equal);
            Ok(())
        }),
        OP_EQUALVERIFY => entry(opcode, 2, |m, op| {
            if m.stack.pop()? != m.stack.pop()? {
                return Err(Fault::VerifyFailed(op));
            }
            Ok(())
        }),

        // Arithmetic
        OP_1ADD | OP_1SUB | OP_NEGATE | OP_ABS | OP_NOT | OP_0NOTEQUAL => {
            entry(opcode, 1, unary_arithmetic)
        }
        OP_ADD | OP_SUB | OP_BOOLAND | OP_BOOLOR | OP_NUMEQUAL | OP_NUMEQUALVERIFY
        | OP_NUMNOTEQUAL | OP_LESSTHAN | OP_GREATERTHAN | OP_LESSTHANOREQUAL
        | OP_GREATERTHANOREQUAL | OP_MIN | OP_MAX => entry(opcode, 2, binary_arithmetic),
        OP_WITHIN => entry(opcode, 3, |m, _| {
            // [x min max]
            let max = m.stack.pop_num()?;
            let min = m.stack.pop_num()?;
            let x = m.stack.pop_num()?;
            m.stack.push_bool((min..max).contains(&x));
            Ok(())
        }),

        // Crypto
        OP_RIPEMD160 | OP_SHA1 | OP_SHA256 | OP_HASH160 | OP_HASH256 => entry(opcode, 1, hash),
        OP_CODESEPARATOR => entry(opcode, 0, |_, _| Ok(())),
        OP_CHECKSIG | OP_CHECKSIGVERIFY => entry(opcode, 2, sig::handle_checksig),
        OP_CHECKMULTISIG | OP_CHECKMULTISIGVERIFY => {
            entry(opcode, 1, multisig::handle_checkmultisig)
        }

        // OP_PUSHDATA1/2/4
        _ => return None,
    };
    Some(info)
}

fn conditional(opcode: Opcode, operands: usize, handler: Handler) -> OpcodeInfo {
    OpcodeInfo {
        class: OpcodeClass::Conditional,
        ..entry(opcode, operands, handler)
    }
}

fn push_small_int(m: &mut Machine<'_, '_>, opcode: Opcode) -> Result<(), Fault> {
    match opcode.classify(ClassifyContext::Legacy) {
        Class::PushNum(n) => {
            m.stack.push_num(n);
            Ok(())
        }
        _ => Err(Fault::BadOpcode(opcode.to_u8())),
    }
}

fn upgradable_nop(m: &mut Machine<'_, '_>, _opcode: Opcode) -> Result<(), Fault> {
    if m.ctx.flags.contains(VerifyFlags::DISCOURAGE_UPGRADABLE_NOPS) {
        return Err(Fault::UpgradableNop);
    }
    Ok(())
}

fn op_if(m: &mut Machine<'_, '_>, opcode: Opcode) -> Result<(), Fault> {
    let mut value = false;

    if m.is_executing() {
        let top = m.stack.pop()?;

        // Only a policy rule, and only for witness scripts.
        if m.sig_version == SigVersion::WitnessV0
            && m.ctx.flags.contains(VerifyFlags::MINIMALIF)
            && !matches!(top.as_slice(), [] | [1])
        {
            return Err(Fault::MinimalIf);
        }

        value = cast_to_bool(&top);
        if opcode == OP_NOTIF {
            value = !value;
        }
    }

    m.conditions.push(ConditionalFrame::new(value));

    Ok(())
}

fn op_else(m: &mut Machine<'_, '_>, _opcode: Opcode) -> Result<(), Fault> {
    let frame = m
        .conditions
        .last_mut()
        .ok_or(Fault::UnbalancedConditional)?;

    if frame.seen_else {
        return Err(Fault::UnbalancedConditional);
    }

    frame.seen_else = true;
    frame.executing = !frame.executing;

    Ok(())
}

fn op_endif(m: &mut Machine<'_, '_>, _opcode: Opcode) -> Result<(), Fault> {
    m.conditions
        .pop()
        .map(|_| ())
        .ok_or(Fault::UnbalancedConditional)
}

fn pick_or_roll(m: &mut Machine<'_, '_>, opcode: Opcode) -> Result<(), Fault> {
    let n = m.stack.pop_num()?.value();
    if n < 0 || n >= m.stack.len() as i64 {
        return Err(Fault::StackUnderflow);
    }

    let v = if opcode == OP_PICK {
        m.stack.top(n as usize)?.clone()
    } else {
        m.stack.remove(n as usize)?
    };
    m.stack.push(v);

    Ok(())
}

fn unary_arithmetic(m: &mut Machine<'_, '_>, opcode: Opcode) -> Result<(), Fault> {
    let n = m.stack.pop_num()?;

    let result = match opcode {
        OP_1ADD => (n + 1.into())?,
        OP_1SUB => (n - 1.into())?,
        OP_NEGATE => (-n)?,
        OP_ABS => n.abs(),
        OP_NOT => ScriptNum::from(n.is_zero()),
        OP_0NOTEQUAL => ScriptNum::from(!n.is_zero()),
        _ => return Err(Fault::BadOpcode(opcode.to_u8())),
    };

    m.stack.push_num(result);

    Ok(())
}

fn binary_arithmetic(m: &mut Machine<'_, '_>, opcode: Opcode) -> Result<(), Fault> {
    let b = m.stack.pop_num()?;
    let a = m.stack.pop_num()?;

    let result = match opcode {
        OP_ADD => (a + b)?,
        OP_SUB => (a - b)?,
        OP_BOOLAND => ScriptNum::from(!a.is_zero() && !b.is_zero()),
        OP_BOOLOR => ScriptNum::from(!a.is_zero() || !b.is_zero()),
        OP_NUMEQUAL => ScriptNum::from(a == b),
        OP_NUMEQUALVERIFY => {
            if a != b {
                return Err(Fault::VerifyFailed(opcode));
            }
            return Ok(());
        }
        OP_NUMNOTEQUAL => ScriptNum::from(a != b),
        OP_LESSTHAN => ScriptNum::from(a < b),
        OP_GREATERTHAN => ScriptNum::from(a > b),
        OP_LESSTHANOREQUAL => ScriptNum::from(a <= b),
        OP_GREATERTHANOREQUAL => ScriptNum::from(a >= b),
        OP_MIN => a.min(b),
        OP_MAX => a.max(b),
        _ => return Err(Fault::BadOpcode(opcode.to_u8())),
    };

    m.stack.push_num(result);

    Ok(())
}

fn hash(m: &mut Machine<'_, '_>, opcode: Opcode) -> Result<(), Fault> {
    let algorithm = match opcode {
        OP_RIPEMD160 => HashAlgorithm::Ripemd160,
        OP_SHA1 => HashAlgorithm::Sha1,
        OP_SHA256 => HashAlgorithm::Sha256,
        OP_HASH160 => HashAlgorithm::Hash160,
        OP_HASH256 => HashAlgorithm::Hash256,
        _ => return Err(Fault::BadOpcode(opcode.to_u8())),
    };

    let data = m.stack.pop()?;
    let digest = m.ctx.crypto.hash(algorithm, &data);
    m.stack.push(digest);

    Ok(())
}
