use super::Machine;
use super::sig::check_signature;
use crate::VerifyFlags;
use crate::constants::MAX_PUBKEYS_PER_MULTISIG;
use crate::error::Fault;
use bitcoin::opcodes::Opcode;
use bitcoin::opcodes::all::OP_CHECKMULTISIGVERIFY;

/// Handles `OP_CHECKMULTISIG` and `OP_CHECKMULTISIGVERIFY`.
///
/// `[dummy sig_1 .. sig_m m pubkey_1 .. pubkey_n n] -> bool`
pub(crate) fn handle_checkmultisig(m: &mut Machine<'_, '_>, opcode: Opcode) -> Result<(), Fault> {
    let success = eval_checkmultisig(m)?;

    match opcode {
        OP_CHECKMULTISIGVERIFY if !success => Err(Fault::VerifyFailed(opcode)),
        OP_CHECKMULTISIGVERIFY => Ok(()),
        _ => {
            m.stack.push_bool(success);
            Ok(())
        }
    }
}

fn eval_checkmultisig(m: &mut Machine<'_, '_>) -> Result<bool, Fault> {
    let keys_count = m.stack.pop_num()?.value();
    if !(0..=MAX_PUBKEYS_PER_MULTISIG).contains(&keys_count) {
        return Err(Fault::PubkeyCount);
    }

    let keys_count = keys_count as usize;

    // Every key counts as an operation.
    m.add_ops(keys_count)?;

    m.stack.require(keys_count)?;
    let mut keys = Vec::with_capacity(keys_count);
    for _ in 0..keys_count {
        keys.push(m.stack.pop()?);
    }
    // Popped top first, restore push order.
    keys.reverse();

    let sigs_count = m.stack.pop_num()?.value();
    if sigs_count < 0 || sigs_count as usize > keys_count {
        return Err(Fault::SigCount(keys_count));
    }

    let sigs_count = sigs_count as usize;
    m.stack.require(sigs_count)?;
    let mut sigs = Vec::with_capacity(sigs_count);
    for _ in 0..sigs_count {
        sigs.push(m.stack.pop()?);
    }
    sigs.reverse();

    // One more element than the signatures is always consumed. Unlocking scripts
    // supply a placeholder for it.
    let dummy = m.stack.pop()?;

    if m.ctx.flags.contains(VerifyFlags::NULLDUMMY) && !dummy.is_empty() {
        return Err(Fault::NullDummy(dummy.len()));
    }

    // Signatures are matched against keys left to right. A key that fails the
    // current signature is skipped for good, so signatures out of key order fail.
    let mut key_index = 0;
    let mut sig_index = 0;

    while sig_index < sigs.len() {
        let remaining_keys = keys.len() - key_index;
        let remaining_sigs = sigs.len() - sig_index;

        if remaining_keys < remaining_sigs {
            return Ok(false);
        }

        if check_signature(m, &sigs[sig_index], &keys[key_index]) {
            sig_index += 1;
        }

        key_index += 1;
    }

    Ok(true)
}
