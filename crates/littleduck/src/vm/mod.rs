//! The stack-based virtual machine.
//!
//! A fetch-decode-execute loop over the numeric quadruple list. Function
//! calls push activation records; `OPEN`/`CLOSE` push and pop memory
//! scopes inside the current record. When the program counter runs past
//! the last instruction the machine reads the exit code from the first
//! global variable slot and reports it through the [`PrintWriter`].

mod frame;
mod memory;
mod ops;

use tracing::trace;

pub use frame::ActivationRecord;
pub use memory::VmMemory;

use crate::{
    errors::{RuntimeError, RuntimeErrorKind, VmError, VmResult},
    io::PrintWriter,
    program::{FinalQuadruple, GeneratedCode},
    quad::Instruction,
    value::Value,
};

/// Executes compiled programs.
///
/// The machine itself is stateless between runs: every [`VirtualMachine::run`]
/// materializes fresh memory from the program's constant pool and global
/// template, so the same compiled program can be executed repeatedly.
#[derive(Debug)]
pub struct VirtualMachine {
    code: GeneratedCode,
}

impl VirtualMachine {
    #[must_use]
    pub fn new(code: GeneratedCode) -> Self {
        Self { code }
    }

    /// Runs the program to completion, returning its exit code.
    ///
    /// # Errors
    /// Returns [`VmError`] on any runtime or memory fault.
    pub fn run(&self, print: &mut impl PrintWriter) -> VmResult<i64> {
        let Some(global_template) = self.code.memory_templates.first() else {
            return Err(RuntimeError::new(RuntimeErrorKind::StackTemplateNotFound, 0).into());
        };
        let constants: Vec<Value> =
            self.code.constants.iter().map(|c| c.value.to_value()).collect();
        let mut machine = Machine {
            code: &self.code,
            memory: VmMemory::new(constants, global_template),
            pc: 0,
        };
        machine.run(print)
    }
}

/// What the program counter does after an instruction.
enum Control {
    Next,
    Jump(usize),
}

struct Machine<'a> {
    code: &'a GeneratedCode,
    memory: VmMemory,
    pc: usize,
}

impl Machine<'_> {
    fn run(&mut self, print: &mut impl PrintWriter) -> VmResult<i64> {
        while self.pc < self.code.quadruples.len() {
            let quadruple = self.code.quadruples[self.pc];
            let Some(instruction) = Instruction::from_repr(quadruple.op) else {
                return Err(self.fault(RuntimeErrorKind::InstructionDoesntExist));
            };
            trace!(pc = self.pc, op = %instruction, "execute");
            match self.execute(instruction, quadruple, print)? {
                Control::Next => self.pc += 1,
                Control::Jump(target) => self.pc = target,
            }
        }

        // Termination: the exit code lives in the first global variable
        // slot, right after the global scope's activation slot.
        let exit_code = match self.memory.global_scope_get(1)? {
            Value::Int(code) => code,
            _ => return Err(self.fault(RuntimeErrorKind::OperandTypeMismatch)),
        };
        print.stdout_push('\n');
        print.stdout_write(&format!("Program ended with exit code: {exit_code}"));
        print.stdout_push('\n');
        Ok(exit_code)
    }

    fn execute(
        &mut self,
        instruction: Instruction,
        quadruple: FinalQuadruple,
        print: &mut impl PrintWriter,
    ) -> VmResult<Control> {
        match instruction {
            Instruction::Open => self.open(quadruple),
            Instruction::Close => self.close(),
            Instruction::Goto => Ok(Control::Jump(self.jump_target(quadruple)?)),
            Instruction::Gotot => self.conditional_jump(quadruple, true),
            Instruction::Gotof => self.conditional_jump(quadruple, false),
            Instruction::Assign => self.assign(quadruple),
            Instruction::Print => self.print(print),
            Instruction::FunctionParameter => self.function_parameter(quadruple),
            Instruction::FunctionCall => self.function_call(quadruple),
            Instruction::FunctionArgument => self.function_argument(quadruple),
            Instruction::Return => self.function_return(quadruple),
            Instruction::And
            | Instruction::Or
            | Instruction::Eq
            | Instruction::Lt
            | Instruction::Gt
            | Instruction::Add
            | Instruction::Sub
            | Instruction::Mul
            | Instruction::Div => self.binary(instruction, quadruple),
            Instruction::Read => Err(self.fault(RuntimeErrorKind::InstructionDoesntExist)),
        }
    }

    //
    // Scope instructions
    //

    /// `OPEN template_i`: pushes a scope built from the template onto the
    /// top activation record.
    fn open(&mut self, quadruple: FinalQuadruple) -> VmResult<Control> {
        let Some(template_index) = quadruple.left else {
            return Err(self.fault(RuntimeErrorKind::StackTemplateNotFound));
        };
        let Some(template) = self.code.memory_templates.get(template_index) else {
            return Err(self.fault(RuntimeErrorKind::StackTemplateNotFound));
        };
        let record = self.top_record_mut()?;
        record.push_scope(template);
        trace!(pc = self.pc, template = template_index, "opened scope");
        Ok(Control::Next)
    }

    fn close(&mut self) -> VmResult<Control> {
        let fault = self.fault(RuntimeErrorKind::MemoryAddressMissing);
        let record = self.top_record_mut()?;
        if record.pop_scope().is_none() {
            return Err(fault);
        }
        Ok(Control::Next)
    }

    //
    // Jumps
    //

    fn jump_target(&self, quadruple: FinalQuadruple) -> VmResult<usize> {
        quadruple
            .result
            .ok_or_else(|| self.fault(RuntimeErrorKind::GotoJumpMissing))
    }

    /// `GOTOT`/`GOTOF`: jump when the condition's truthiness matches.
    /// The condition slot is deallocated when it is a temporary.
    fn conditional_jump(&mut self, quadruple: FinalQuadruple, want: bool) -> VmResult<Control> {
        let target = self.jump_target(quadruple)?;
        let Some(address) = quadruple.left else {
            return Err(self.fault(RuntimeErrorKind::MemoryAddressMissing));
        };
        let jump = self.memory.get_relative(address)?.is_truthy() == want;
        if self.memory.is_temp_relative(address)? {
            self.memory.deallocate_relative(address)?;
        }
        Ok(if jump { Control::Jump(target) } else { Control::Next })
    }

    //
    // Data movement
    //

    fn assign(&mut self, quadruple: FinalQuadruple) -> VmResult<Control> {
        let (Some(source), Some(target)) = (quadruple.left, quadruple.result) else {
            return Err(self.fault(RuntimeErrorKind::MemoryAddressMissing));
        };
        let value = self.memory.get_relative(source)?;
        self.memory.set_relative(target, Some(value))?;
        if self.memory.is_temp_relative(source)? {
            self.memory.deallocate_relative(source)?;
        }
        Ok(Control::Next)
    }

    fn binary(&mut self, instruction: Instruction, quadruple: FinalQuadruple) -> VmResult<Control> {
        let (Some(left), Some(right), Some(target)) =
            (quadruple.left, quadruple.right, quadruple.result)
        else {
            return Err(self.fault(RuntimeErrorKind::MemoryAddressMissing));
        };
        let left_value = self.memory.get_relative(left)?;
        let right_value = self.memory.get_relative(right)?;
        let result = ops::apply(instruction, &left_value, &right_value)
            .map_err(|kind| self.fault(kind))?;
        self.memory.set_relative(target, Some(result))?;
        if self.memory.is_temp_relative(left)? {
            self.memory.deallocate_relative(left)?;
        }
        if self.memory.is_temp_relative(right)? {
            self.memory.deallocate_relative(right)?;
        }
        Ok(Control::Next)
    }

    //
    // Console
    //

    /// `PRINT`: drains the current scope's parameter scratchpad and writes
    /// the values in push order, space-separated, newline-terminated.
    fn print(&mut self, print: &mut impl PrintWriter) -> VmResult<Control> {
        let fault = self.fault(RuntimeErrorKind::MemoryAddressMissing);
        let record = self.top_record_mut()?;
        let Some(scope) = record.top_scope_mut() else {
            return Err(fault);
        };
        let addresses = scope.parameter_drain();
        for (i, address) in addresses.iter().enumerate() {
            if i > 0 {
                print.stdout_push(' ');
            }
            let value = self.memory.get_global(*address)?;
            print.stdout_write(&value.to_string());
        }
        print.stdout_push('\n');
        for address in addresses {
            if self.memory.is_temp_global(address)? {
                self.memory.deallocate_global(address)?;
            }
        }
        Ok(Control::Next)
    }

    //
    // Functions
    //

    /// `PARAM addr`: resolves the relative address to a global one and
    /// pushes it onto the current scope's parameter scratchpad.
    fn function_parameter(&mut self, quadruple: FinalQuadruple) -> VmResult<Control> {
        let Some(address) = quadruple.left else {
            return Err(self.fault(RuntimeErrorKind::MemoryAddressMissing));
        };
        let record_index = self.memory.current_record_index().map_err(VmError::Memory)?;
        let global = self.memory.relative_to_global(address, record_index)?;
        let fault = self.fault(RuntimeErrorKind::MemoryAddressMissing);
        let Some(scope) = self.top_record_mut()?.top_scope_mut() else {
            return Err(fault);
        };
        scope.parameter_push(global);
        Ok(Control::Next)
    }

    /// `CALL fid [ret]`: drains the caller's parameters into a fresh
    /// activation record and jumps to the function's first instruction.
    /// The initial call of `main` is special-cased: there is no caller, so
    /// there are no parameters to pop.
    fn function_call(&mut self, quadruple: FinalQuadruple) -> VmResult<Control> {
        let Some(function_id) = quadruple.left else {
            return Err(self.fault(RuntimeErrorKind::FunctionNotFound));
        };
        let Some(entry) = self.code.function_directory.get(function_id) else {
            return Err(self.fault(RuntimeErrorKind::FunctionNotFound));
        };
        let address = entry.address;

        let arguments = if self.memory.has_records() {
            let fault = self.fault(RuntimeErrorKind::MemoryAddressMissing);
            let Some(scope) = self.top_record_mut()?.top_scope_mut() else {
                return Err(fault);
            };
            scope.parameter_drain()
        } else {
            Vec::new()
        };

        let record =
            ActivationRecord::new(function_id, self.pc + 1, arguments, quadruple.result);
        self.memory.push_record(record);
        trace!(pc = self.pc, function = function_id, target = address, "call");
        Ok(Control::Jump(address))
    }

    /// `ARG → dst`: pops one pending argument address and copies its value
    /// into the local slot.
    fn function_argument(&mut self, quadruple: FinalQuadruple) -> VmResult<Control> {
        let Some(target) = quadruple.result else {
            return Err(self.fault(RuntimeErrorKind::MemoryAddressMissing));
        };
        let no_more = self.fault(RuntimeErrorKind::NoMoreArguments);
        let record = self.top_record_mut()?;
        let Some(source) = record.arguments_to_load.pop() else {
            return Err(no_more);
        };
        let value = self.memory.get_global(source)?;
        self.memory.set_relative(target, Some(value))?;
        Ok(Control::Next)
    }

    /// `RETURN [val]`: pops the activation record, honors the return-value
    /// contract, deallocates temporary arguments, and resumes the caller.
    fn function_return(&mut self, quadruple: FinalQuadruple) -> VmResult<Control> {
        let value = match quadruple.left {
            Some(address) => Some(self.memory.get_relative(address)?),
            None => None,
        };
        let Some(record) = self.memory.pop_record() else {
            return Err(self.fault(RuntimeErrorKind::MemoryAddressMissing));
        };
        if !record.arguments_to_load.is_empty() {
            return Err(self.fault(RuntimeErrorKind::UnloadedArguments));
        }
        match (record.return_value_address, value) {
            (Some(address), Some(value)) => self.memory.set_relative(address, Some(value))?,
            (Some(_), None) => return Err(self.fault(RuntimeErrorKind::ReturnValueNotFound)),
            (None, Some(_)) => return Err(self.fault(RuntimeErrorKind::ReturnValueInVoid)),
            (None, None) => {}
        }
        for address in record.arguments {
            if self.memory.is_temp_global(address)? {
                self.memory.deallocate_global(address)?;
            }
        }
        trace!(
            pc = self.pc,
            function = record.function_id,
            resume = record.return_address,
            "return"
        );
        Ok(Control::Jump(record.return_address))
    }

    //
    // Helpers
    //

    fn top_record_mut(&mut self) -> VmResult<&mut ActivationRecord> {
        let fault = self.fault(RuntimeErrorKind::MemoryAddressMissing);
        self.memory.top_record_mut().ok_or(fault)
    }

    fn fault(&self, kind: RuntimeErrorKind) -> VmError {
        RuntimeError::new(kind, self.pc).into()
    }
}
