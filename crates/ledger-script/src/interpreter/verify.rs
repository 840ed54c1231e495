use super::{SigVersion, eval_script};
use crate::constants::{
    MAX_SCRIPT_ELEMENT_SIZE, WITNESS_V0_KEYHASH_SIZE, WITNESS_V0_SCRIPTHASH_SIZE,
};
use crate::context::ExecutionContext;
use crate::crypto::HashAlgorithm;
use crate::error::{Fault, RejectReason};
use crate::script::{Op, Script};
use crate::solver::solve;
use crate::stack::Stack;
use crate::template::{Template, build_template};
use crate::{LOG_TARGET, VerifyFlags};
use bitcoin::Witness;

/// Data supplied by the claimant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Unlocking {
    pub script_sig: Script,
    pub witness: Witness,
}

impl Unlocking {
    pub fn new(script_sig: Script, witness: Witness) -> Self {
        Self {
            script_sig,
            witness,
        }
    }

    /// A legacy unlocking script with an empty witness.
    pub fn script(script_sig: Script) -> Self {
        Self::new(script_sig, Witness::new())
    }

    /// A witness with an empty unlocking script.
    pub fn witness(witness: Witness) -> Self {
        Self::new(Script::default(), witness)
    }
}

impl From<Script> for Unlocking {
    fn from(script_sig: Script) -> Self {
        Self::script(script_sig)
    }
}

impl From<Witness> for Unlocking {
    fn from(witness: Witness) -> Self {
        Self::witness(witness)
    }
}

/// Outcome of [`validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected(RejectReason),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    pub fn reject_reason(&self) -> Option<&RejectReason> {
        match self {
            Self::Accepted => None,
            Self::Rejected(reason) => Some(reason),
        }
    }
}

impl From<Result<(), RejectReason>> for Verdict {
    fn from(result: Result<(), RejectReason>) -> Self {
        match result {
            Ok(()) => Self::Accepted,
            Err(reason) => Self::Rejected(reason),
        }
    }
}

/// Validation phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationState {
    Init,
    UnlockingExecuted,
    LockingExecuted,
    RedeemExecuted,
    Accepted,
    Rejected,
}

impl ValidationState {
    fn can_advance_to(self, next: Self) -> bool {
        use ValidationState::*;

        matches!(
            (self, next),
            (Init, UnlockingExecuted)
                | (UnlockingExecuted, LockingExecuted)
                | (LockingExecuted, RedeemExecuted)
                | (LockingExecuted | RedeemExecuted, Accepted)
                | (Init | UnlockingExecuted | LockingExecuted | RedeemExecuted, Rejected)
        )
    }
}

struct Validation<'a, 'c> {
    ctx: &'a ExecutionContext<'c>,
    state: ValidationState,
}

impl<'a, 'c> Validation<'a, 'c> {
    fn new(ctx: &'a ExecutionContext<'c>) -> Self {
        Self {
            ctx,
            state: ValidationState::Init,
        }
    }

    fn advance(&mut self, next: ValidationState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "Invalid validation transition {:?} -> {next:?}",
            self.state
        );
        tracing::debug!(target: LOG_TARGET, "Validation {:?} -> {next:?}", self.state);
        self.state = next;
    }

    fn flags(&self) -> VerifyFlags {
        self.ctx.flags
    }

    fn run(&mut self, locking: &Script, unlocking: &Unlocking) -> Result<(), RejectReason> {
        let script_sig = &unlocking.script_sig;
        let witness = &unlocking.witness;
        let flags = self.flags();

        if flags.contains(VerifyFlags::SIGPUSHONLY) && !script_sig.is_push_only() {
            return Err(RejectReason::SigPushOnly);
        }

        // The unlocking and locking scripts are evaluated one after the other on the
        // same stack, never concatenated.
        let mut stack = Stack::empty();

        eval_script(&mut stack, script_sig, self.ctx, SigVersion::Base)?;
        self.advance(ValidationState::UnlockingExecuted);

        let stack_copy = flags.contains(VerifyFlags::P2SH).then(|| stack.clone());

        eval_script(&mut stack, locking, self.ctx, SigVersion::Base)?;
        self.advance(ValidationState::LockingExecuted);

        require_true(&stack)?;

        let mut had_witness = false;

        if flags.contains(VerifyFlags::WITNESS) {
            if let Some(program) = locking.witness_program() {
                if !script_sig.is_empty() {
                    return Err(RejectReason::WitnessMalleated);
                }

                had_witness = true;

                self.verify_witness_program(witness, program)?;

                // Witness programs leave their own stack untouched.
                stack.truncate(1);
            }
        }

        let script_hash = match solve(locking) {
            Some(Template::ScriptHash { script_hash }) => Some(script_hash),
            _ => None,
        };

        if let (Some(script_hash), Some(mut redeem_stack)) = (script_hash, stack_copy) {
            if !script_sig.is_push_only() {
                return Err(RejectReason::SigPushOnly);
            }

            // Never empty here, the locking script ran on the same elements.
            let redeem_bytes = redeem_stack.pop()?;

            let digest = self.ctx.crypto.hash(HashAlgorithm::Hash160, &redeem_bytes);
            if digest != script_hash {
                return Err(RejectReason::ScriptHashMismatch);
            }

            let redeem_script = Script::decode(&redeem_bytes)?;

            // Script-hash evaluation goes one level deep only.
            if matches!(solve(&redeem_script), Some(Template::ScriptHash { .. })) {
                return Err(Fault::NestedScriptHashForbidden.into());
            }

            eval_script(&mut redeem_stack, &redeem_script, self.ctx, SigVersion::Base)?;
            self.advance(ValidationState::RedeemExecuted);

            require_true(&redeem_stack)?;

            if flags.contains(VerifyFlags::WITNESS) {
                if let Some(program) = redeem_script.witness_program() {
                    // The unlocking script must be exactly one push of the redeem
                    // program, anything else reintroduces malleability.
                    if script_sig.ops() != [Op::Push(redeem_bytes.clone())] {
                        return Err(RejectReason::WitnessMalleatedScriptHash);
                    }

                    had_witness = true;

                    self.verify_witness_program(witness, program)?;

                    redeem_stack.truncate(1);
                }
            }

            stack = redeem_stack;
        }

        // Only checked after script-hash evaluation, the inputs of a script-hash
        // claim are still on the stack before it.
        if flags.contains(VerifyFlags::CLEANSTACK) && stack.len() != 1 {
            return Err(RejectReason::CleanStack);
        }

        if flags.contains(VerifyFlags::WITNESS) && !had_witness && !witness.is_empty() {
            return Err(RejectReason::WitnessUnexpected);
        }

        Ok(())
    }

    fn verify_witness_program(
        &self,
        witness: &Witness,
        program: &[u8],
    ) -> Result<(), RejectReason> {
        match program.len() {
            WITNESS_V0_SCRIPTHASH_SIZE => {
                let Some(script_bytes) = witness.last() else {
                    return Err(RejectReason::WitnessProgramWitnessEmpty);
                };

                let script_hash = self.ctx.crypto.hash(HashAlgorithm::Sha256, script_bytes);
                if script_hash != program {
                    return Err(RejectReason::WitnessProgramMismatch);
                }

                let witness_script = Script::decode(script_bytes)?;
                let args = witness.iter().take(witness.len() - 1);

                self.execute_witness_script(args, &witness_script)
            }
            WITNESS_V0_KEYHASH_SIZE => {
                if witness.len() != 2 {
                    return Err(RejectReason::WitnessProgramMismatch);
                }

                let pubkey_hash = program
                    .try_into()
                    .map_err(|_| RejectReason::WitnessProgramWrongLength)?;
                let witness_script = build_template(&Template::KeyHash { pubkey_hash })?;

                self.execute_witness_script(witness.iter(), &witness_script)
            }
            _ => Err(RejectReason::WitnessProgramWrongLength),
        }
    }

    fn execute_witness_script<'w>(
        &self,
        args: impl Iterator<Item = &'w [u8]>,
        witness_script: &Script,
    ) -> Result<(), RejectReason> {
        let mut stack = Stack::from(args.map(<[u8]>::to_vec).collect::<Vec<_>>());

        if stack.iter().any(|elem| elem.len() > MAX_SCRIPT_ELEMENT_SIZE) {
            return Err(Fault::ElementTooLarge.into());
        }

        eval_script(&mut stack, witness_script, self.ctx, SigVersion::WitnessV0)?;

        // Witness scripts implicitly require a clean stack.
        if stack.len() != 1 {
            return Err(RejectReason::CleanStack);
        }

        require_true(&stack)
    }
}

fn require_true(stack: &Stack) -> Result<(), RejectReason> {
    if stack.is_empty() || !stack.peek_bool()? {
        return Err(RejectReason::EvalFalse);
    }
    Ok(())
}

/// Runs the full validation protocol, returning the reason of a rejection.
pub fn verify_script(
    locking: &Script,
    unlocking: &Unlocking,
    ctx: &ExecutionContext<'_>,
) -> Result<(), RejectReason> {
    let mut validation = Validation::new(ctx);

    let result = validation.run(locking, unlocking);

    match &result {
        Ok(()) => validation.advance(ValidationState::Accepted),
        Err(reason) => {
            validation.advance(ValidationState::Rejected);
            tracing::debug!(target: LOG_TARGET, "Rejected {locking}: {reason}");
        }
    }

    result
}

/// Decides whether `unlocking` satisfies `locking`.
pub fn validate(locking: &Script, unlocking: &Unlocking, ctx: &ExecutionContext<'_>) -> Verdict {
    verify_script(locking, unlocking, ctx).into()
}
