use super::Machine;
use crate::constants::{
    LOCKTIME_NUM_SIZE, LOCKTIME_THRESHOLD, SEQUENCE_LOCKTIME_DISABLE_FLAG, SEQUENCE_LOCKTIME_MASK,
    SEQUENCE_LOCKTIME_TYPE_FLAG,
};
use crate::error::Fault;

/// Handles `OP_CHECKLOCKTIMEVERIFY`. The operand stays on the stack.
///
/// Operands below `LOCKTIME_THRESHOLD` are block heights checked against the
/// current height, the rest are timestamps checked against the current time.
pub(crate) fn check_lock_time_verify(m: &mut Machine<'_, '_>) -> Result<(), Fault> {
    // Five bytes so that every u32 lock value can be expressed.
    let lock_time = m.stack.peek_num_with_max_size(LOCKTIME_NUM_SIZE)?.value();

    if lock_time < 0 {
        return Err(Fault::NegativeLocktime);
    }

    let is_height = |value: i64| value < i64::from(LOCKTIME_THRESHOLD);

    let current = if is_height(lock_time) {
        i64::from(m.ctx.current_height)
    } else {
        i64::from(m.ctx.current_time)
    };

    // The context value must be of the same class as the operand.
    if is_height(lock_time) != is_height(current) {
        return Err(Fault::TypeMismatch);
    }

    if lock_time > current {
        return Err(Fault::LocktimeNotMet);
    }

    Ok(())
}

/// Handles `OP_CHECKSEQUENCEVERIFY`. The operand stays on the stack.
pub(crate) fn check_sequence_verify(m: &mut Machine<'_, '_>) -> Result<(), Fault> {
    let sequence = m.stack.peek_num_with_max_size(LOCKTIME_NUM_SIZE)?.value();

    if sequence < 0 {
        return Err(Fault::NegativeLocktime);
    }

    // Disabled operands make the opcode a NOP.
    if sequence & i64::from(SEQUENCE_LOCKTIME_DISABLE_FLAG) != 0 {
        return Ok(());
    }

    let sequence = sequence as u32;
    let context_sequence = m.ctx.sequence;

    // A claim that opted out of relative lock-times cannot satisfy one.
    if context_sequence & SEQUENCE_LOCKTIME_DISABLE_FLAG != 0 {
        return Err(Fault::LocktimeNotMet);
    }

    let is_time_based = |value: u32| value & SEQUENCE_LOCKTIME_TYPE_FLAG != 0;
    if is_time_based(sequence) != is_time_based(context_sequence) {
        return Err(Fault::TypeMismatch);
    }

    if sequence & SEQUENCE_LOCKTIME_MASK > context_sequence & SEQUENCE_LOCKTIME_MASK {
        return Err(Fault::LocktimeNotMet);
    }

    Ok(())
}
