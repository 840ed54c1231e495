mod eval;
mod table;
mod verify;

pub use self::eval::{eval_script, execute};
pub use self::table::{OpcodeClass, OpcodeInfo, opcode_info};
pub use self::verify::{Unlocking, ValidationState, Verdict, validate, verify_script};

/// Rule set a script is evaluated under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigVersion {
    /// Locking scripts, unlocking scripts and script-hash redeem scripts.
    Base,
    /// Scripts revealed through a version 0 witness program.
    WitnessV0,
}

/// A pending `OP_IF`/`OP_NOTIF` branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConditionalFrame {
    /// Whether the current branch of this frame runs.
    pub executing: bool,
    /// Whether `OP_ELSE` has already flipped this frame.
    pub seen_else: bool,
}

impl ConditionalFrame {
    fn new(executing: bool) -> Self {
        Self {
            executing,
            seen_else: false,
        }
    }
}
