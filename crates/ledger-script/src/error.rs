use crate::constants::{
    MAX_OPS_PER_SCRIPT, MAX_PUBKEYS_PER_MULTISIG, MAX_SCRIPT_ELEMENT_SIZE, MAX_SCRIPT_SIZE,
    MAX_STACK_SIZE,
};
use crate::num::NumError;
use crate::stack::StackError;
use bitcoin::opcodes::Opcode;
use bitcoin::script::PushBytesError;

/// Structural errors raised while decoding the binary format.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("push at byte {position} runs past the end of the script")]
    TruncatedPush { position: usize },
    #[error("script of {0} bytes exceeds max script size ({MAX_SCRIPT_SIZE})")]
    ScriptTooLarge(usize),
}

/// Runtime faults. Any fault aborts execution immediately.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum Fault {
    #[error("stack underflow")]
    StackUnderflow,
    #[error("element larger than {MAX_SCRIPT_ELEMENT_SIZE} bytes")]
    ElementTooLarge,
    /// Main and alt stack together hold more than the permitted number of elements.
    #[error("more than {MAX_STACK_SIZE} elements across both stacks")]
    StackTooDeep,
    #[error("invalid number: {0}")]
    InvalidNumber(NumError),
    #[error("{0} failed")]
    VerifyFailed(Opcode),
    /// ELSE or ENDIF with no open IF, a repeated ELSE, or an IF left open at the end.
    #[error("conditional block is not balanced")]
    UnbalancedConditional,
    #[error("{0} is disabled")]
    DisabledOp(Opcode),
    #[error("bad opcode {0:#04x}")]
    BadOpcode(u8),
    #[error("lock-time class of the operand does not match the context")]
    TypeMismatch,
    #[error("lock time not yet reached")]
    LocktimeNotMet,
    /// `OP_RETURN` anywhere in the script, executed or not.
    #[error("script contains OP_RETURN")]
    ExplicitFailure,
    #[error("redeem script is itself a script-hash script")]
    NestedScriptHashForbidden,
    #[error("script longer than {MAX_SCRIPT_SIZE} bytes")]
    ScriptTooLarge,
    #[error("more than {MAX_OPS_PER_SCRIPT} non-push opcodes")]
    OpCount,
    #[error("multisig key count outside 0..={MAX_PUBKEYS_PER_MULTISIG}")]
    PubkeyCount,
    #[error("multisig signature count outside 0..={0}")]
    SigCount(usize),
    #[error("multisig dummy element of {0} bytes must be empty")]
    NullDummy(usize),
    #[error("reserved no-op executed")]
    UpgradableNop,
    #[error("negative lock time operand")]
    NegativeLocktime,
    /// Witness script IF/NOTIF operand other than empty or `[0x01]`.
    #[error("conditional operand is not a minimal boolean")]
    MinimalIf,
}

impl From<StackError> for Fault {
    fn from(err: StackError) -> Self {
        match err {
            StackError::Underflow => Self::StackUnderflow,
            StackError::Num(err) => Self::InvalidNumber(err),
        }
    }
}

impl From<NumError> for Fault {
    fn from(err: NumError) -> Self {
        Self::InvalidNumber(err)
    }
}

/// Template parameters that would not produce a recognisable locking script.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum TemplateError {
    #[error("multisig needs 1 to {MAX_PUBKEYS_PER_MULTISIG} keys, got {0}")]
    PubkeyCount(usize),
    #[error("multisig threshold {required} out of range for {total} keys")]
    Threshold { required: u8, total: usize },
    #[error("multisig key {0} is empty")]
    EmptyPubkey(usize),
    #[error(transparent)]
    Push(#[from] PushBytesError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Why a claim was rejected.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum RejectReason {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Fault(#[from] Fault),
    /// The implicit script of a witness key-hash program could not be built.
    #[error(transparent)]
    Template(#[from] TemplateError),
    /// The scripts ran without a fault but left an empty stack or a false top element.
    #[error("evaluation ended with a false or missing result")]
    EvalFalse,
    #[error("redeem script does not match the committed script hash")]
    ScriptHashMismatch,
    #[error("unlocking script contains non-push opcodes")]
    SigPushOnly,
    #[error("stack not clean after evaluation")]
    CleanStack,
    #[error("native witness program spent with a non-empty unlocking script")]
    WitnessMalleated,
    #[error("wrapped witness program not pushed as a single element")]
    WitnessMalleatedScriptHash,
    #[error("witness supplied for a non-witness claim")]
    WitnessUnexpected,
    #[error("witness required but empty")]
    WitnessProgramWitnessEmpty,
    #[error("witness does not satisfy the witness program")]
    WitnessProgramMismatch,
    #[error("witness program of unsupported length")]
    WitnessProgramWrongLength,
}

impl RejectReason {
    /// Whether the claim was rejected for malformed or resource-violating input,
    /// as opposed to a well-formed but unsatisfied condition.
    pub fn is_fault(&self) -> bool {
        matches!(self, Self::Parse(_) | Self::Fault(_))
    }
}

impl From<StackError> for RejectReason {
    fn from(err: StackError) -> Self {
        Self::Fault(err.into())
    }
}
