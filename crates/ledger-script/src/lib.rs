//! Deterministic stack-based script engine.
//!
//! Scripts are decoded with [`decode`], run with [`execute`], recognised with
//! [`classify`], produced with [`build_template`] and checked against a claim
//! with [`validate`].

pub mod constants;
mod context;
mod crypto;
mod error;
mod interpreter;
mod num;
mod script;
mod solver;
mod stack;
mod template;


use bitflags::bitflags;

pub use bitcoin::Witness;
pub use bitcoin::opcodes::Opcode;
pub use bitcoin::script::Builder;

pub use self::context::ExecutionContext;
pub use self::crypto::{CryptoCapability, HashAlgorithm, NoSignatureCheck, Secp256k1Crypto};
pub use self::error::{Fault, ParseError, RejectReason, TemplateError};
pub use self::interpreter::{
    ConditionalFrame, OpcodeClass, OpcodeInfo, SigVersion, Unlocking, ValidationState, Verdict,
    eval_script, execute, opcode_info, validate, verify_script,
};
pub use self::num::{NumError, ScriptNum};
pub use self::script::{Op, Script};
pub use self::solver::{ScriptType, classify, solve};
pub use self::stack::{Stack, StackError};
pub use self::template::{
    Template, build_template, htlc_claim_unlocking, htlc_refund_unlocking, key_hash_unlocking,
    multisig_unlocking, script_hash_unlocking, witness_key_hash_witness,
    witness_script_hash_witness,
};

const LOG_TARGET: &str = "ledger_script";

bitflags! {
    /// Script verification flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct VerifyFlags: u32 {
        /// Evaluate script-hash redeem scripts.
        const P2SH = 1 << 0;
        /// Evaluate witness programs.
        const WITNESS = 1 << 1;
        /// The extra element consumed by CHECKMULTISIG must be empty.
        const NULLDUMMY = 1 << 2;
        /// Exactly one element must remain after evaluation.
        const CLEANSTACK = 1 << 3;
        /// The unlocking script may contain pushes only.
        const SIGPUSHONLY = 1 << 4;
        const CHECKLOCKTIMEVERIFY = 1 << 5;
        const CHECKSEQUENCEVERIFY = 1 << 6;
        /// Executing a reserved NOP is a fault.
        const DISCOURAGE_UPGRADABLE_NOPS = 1 << 7;
        /// IF/NOTIF operands in witness scripts must be empty or `[0x01]`.
        const MINIMALIF = 1 << 8;

        const STANDARD = Self::P2SH.bits()
            | Self::WITNESS.bits()
            | Self::NULLDUMMY.bits()
            | Self::CLEANSTACK.bits()
            | Self::CHECKLOCKTIMEVERIFY.bits()
            | Self::CHECKSEQUENCEVERIFY.bits();
    }
}

impl Default for VerifyFlags {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// Parses the binary form of a script.
pub fn decode(bytes: &[u8]) -> Result<Script, ParseError> {
    Script::decode(bytes)
}
