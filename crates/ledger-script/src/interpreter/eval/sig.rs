use super::Machine;
use crate::error::Fault;
use bitcoin::opcodes::Opcode;
use bitcoin::opcodes::all::OP_CHECKSIGVERIFY;

/// Checks `signature` against `pubkey` over the context digest.
///
/// An empty signature never verifies and is not handed to the capability.
pub(crate) fn check_signature(m: &Machine<'_, '_>, signature: &[u8], pubkey: &[u8]) -> bool {
    if signature.is_empty() {
        return false;
    }

    m.ctx
        .crypto
        .verify_signature(pubkey, signature, m.ctx.message_digest)
}

/// Handles `OP_CHECKSIG` and `OP_CHECKSIGVERIFY`.
///
/// `[sig pubkey] -> bool`
pub(crate) fn handle_checksig(m: &mut Machine<'_, '_>, opcode: Opcode) -> Result<(), Fault> {
    let pubkey = m.stack.pop()?;
    let signature = m.stack.pop()?;

    let success = check_signature(m, &signature, &pubkey);

    match opcode {
        OP_CHECKSIGVERIFY if !success => Err(Fault::VerifyFailed(opcode)),
        OP_CHECKSIGVERIFY => Ok(()),
        _ => {
            m.stack.push_bool(success);
            Ok(())
        }
    }
}
