/// Maximum size in bytes of a single stack element.
pub const MAX_SCRIPT_ELEMENT_SIZE: usize = 520;

/// Maximum serialized size of a script.
pub const MAX_SCRIPT_SIZE: usize = 10_000;

/// The maximum combined height of stack and alt stack during script execution.
pub const MAX_STACK_SIZE: usize = 1000;

/// Maximum number of non-push operations per script.
pub const MAX_OPS_PER_SCRIPT: usize = 201;

/// Maximum number of public keys per multisig.
pub const MAX_PUBKEYS_PER_MULTISIG: i64 = 20;

pub const WITNESS_V0_SCRIPTHASH_SIZE: usize = 32;
pub const WITNESS_V0_KEYHASH_SIZE: usize = 20;

/// Lock values below this threshold are block heights, the rest are unix timestamps.
pub const LOCKTIME_THRESHOLD: u32 = 500_000_000;

/// Lock-time operands may use up to 5 bytes so they can express every u32 value.
pub const LOCKTIME_NUM_SIZE: usize = 5;

/// If this flag is set in a relative lock value, it is NOT interpreted as a relative lock-time.
pub const SEQUENCE_LOCKTIME_DISABLE_FLAG: u32 = 1u32 << 31;

/// If set, the relative lock-time is time-based (units of 512 seconds), otherwise block-based.
pub const SEQUENCE_LOCKTIME_TYPE_FLAG: u32 = 1 << 22;

/// Mask applied to extract the relative lock value.
pub const SEQUENCE_LOCKTIME_MASK: u32 = 0x0000ffff;

/// Sequence value of a claim that opts out of relative lock-times.
pub const SEQUENCE_FINAL: u32 = 0xffffffff;
