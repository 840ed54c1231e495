pub(super) mod locktime;
pub(super) mod multisig;
pub(super) mod sig;

use super::table::{OpcodeClass, opcode_info};
use super::{ConditionalFrame, SigVersion};
use crate::LOG_TARGET;
use crate::constants::{
    MAX_OPS_PER_SCRIPT, MAX_SCRIPT_ELEMENT_SIZE, MAX_SCRIPT_SIZE, MAX_STACK_SIZE,
};
use crate::context::ExecutionContext;
use crate::error::Fault;
use crate::script::{Op, Script};
use crate::stack::Stack;
use bitcoin::opcodes::all::OP_PUSHNUM_16;

/// Per-call machine state. Created for one script and dropped when it returns.
pub(crate) struct Machine<'s, 'c> {
    pub(crate) stack: &'s mut Stack,
    pub(crate) alt_stack: Stack,
    pub(crate) conditions: Vec<ConditionalFrame>,
    pub(crate) ctx: &'s ExecutionContext<'c>,
    pub(crate) sig_version: SigVersion,
    pub(crate) op_count: usize,
}

impl Machine<'_, '_> {
    /// A branch runs only if every enclosing frame runs.
    pub(crate) fn is_executing(&self) -> bool {
        self.conditions.iter().all(|frame| frame.executing)
    }

    pub(crate) fn add_ops(&mut self, n: usize) -> Result<(), Fault> {
        self.op_count += n;
        if self.op_count > MAX_OPS_PER_SCRIPT {
            return Err(Fault::OpCount);
        }
        Ok(())
    }

    fn check_limits(&self) -> Result<(), Fault> {
        if self.stack.len() + self.alt_stack.len() > MAX_STACK_SIZE {
            return Err(Fault::StackTooDeep);
        }
        if self
            .stack
            .last()
            .is_ok_and(|top| top.len() > MAX_SCRIPT_ELEMENT_SIZE)
        {
            return Err(Fault::ElementTooLarge);
        }
        Ok(())
    }
}

/// Executes `script` against a fresh stack and returns the final stack.
pub fn execute(script: &Script, ctx: &ExecutionContext<'_>) -> Result<Stack, Fault> {
    let mut stack = Stack::empty();
    eval_script(&mut stack, script, ctx, SigVersion::Base)?;
    Ok(stack)
}

/// Executes `script` on top of `stack`.
///
/// On error the stack is left in whatever state the failing op produced.
pub fn eval_script(
    stack: &mut Stack,
    script: &Script,
    ctx: &ExecutionContext<'_>,
    sig_version: SigVersion,
) -> Result<(), Fault> {
    if script.len() > MAX_SCRIPT_SIZE {
        return Err(Fault::ScriptTooLarge);
    }

    let mut machine = Machine {
        stack,
        alt_stack: Stack::empty(),
        conditions: Vec::new(),
        ctx,
        sig_version,
        op_count: 0,
    };

    for op in script {
        let executing = machine.is_executing();

        match op {
            Op::Push(data) => {
                if data.len() > MAX_SCRIPT_ELEMENT_SIZE {
                    return Err(Fault::ElementTooLarge);
                }
                if executing {
                    machine.stack.push(data.clone());
                }
            }
            Op::Code(opcode) => {
                let opcode = *opcode;

                // Push-range opcodes do not count towards the limit.
                if opcode.to_u8() > OP_PUSHNUM_16.to_u8() {
                    machine.add_ops(1)?;
                }

                let info = opcode_info(opcode).ok_or(Fault::BadOpcode(opcode.to_u8()))?;

                // Disabled opcodes and OP_RETURN fault even inside an untaken branch.
                let runs = match info.class {
                    OpcodeClass::Ordinary => executing,
                    OpcodeClass::Conditional | OpcodeClass::Disabled | OpcodeClass::Return => true,
                };
                if !runs {
                    continue;
                }

                if executing {
                    machine.stack.require(info.operands)?;
                }

                tracing::trace!(
                    target: LOG_TARGET,
                    "{opcode} (depth {}, executing: {executing})",
                    machine.stack.len()
                );

                (info.handler)(&mut machine, opcode)?;
            }
        }

        machine.check_limits()?;
    }

    if !machine.conditions.is_empty() {
        return Err(Fault::UnbalancedConditional);
    }

    Ok(())
}
