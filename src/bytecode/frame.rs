//! Call frames for the virtual machine.

use std::rc::Rc;

use crate::runtime::value::Closure;

/// One in-progress call: the closure being executed, the instruction
/// cursor into its bytecode, and where its stack region begins.
///
/// Locals are not stored in the frame; slot `i` lives on the operand stack
/// at `base_stack_index + i`.
#[derive(Debug, Clone)]
pub struct Frame {
    pub closure: Rc<Closure>,
    pub ins_index: usize,
    pub base_stack_index: usize,
}

impl Frame {
    pub fn new(closure: Rc<Closure>, base_stack_index: usize) -> Self {
        Self {
            closure,
            ins_index: 0,
            base_stack_index,
        }
    }

    pub fn instructions(&self) -> &[u8] {
        &self.closure.func.instructions
    }

    pub fn num_locals(&self) -> usize {
        self.closure.func.num_locals
    }
}
