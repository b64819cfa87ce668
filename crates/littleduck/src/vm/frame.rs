//! Memory scopes and activation records.
//!
//! A memory scope is a block of typed slots created by `OPEN` and
//! destroyed by `CLOSE`. An activation record is created per function call
//! and stacks memory scopes for the nested lexical blocks of the body,
//! alongside the call's return linkage and argument bookkeeping.

use crate::{
    errors::{MemoryError, MemoryErrorKind},
    program::MemoryScopeTemplate,
    value::{Value, ValueType},
};

use super::memory::MemoryResult;

/// A block of typed slots inside an activation record.
///
/// Slot 0 records the IR index that opened the scope; the typed partitions
/// follow in the fixed order ints, bools, floats, strings, temps. The
/// partition a slot lives in decides its static type — temp slots have
/// none, which is what marks them for deallocation after use.
#[derive(Debug)]
pub struct MemoryScope {
    slots: Vec<Option<Value>>,
    bool_offset: usize,
    float_offset: usize,
    string_offset: usize,
    temp_offset: usize,
    /// Global addresses pushed by `PARAM`, drained by `CALL` and `PRINT`.
    parameter_store: Vec<usize>,
}

impl MemoryScope {
    #[must_use]
    pub fn new(template: &MemoryScopeTemplate) -> Self {
        let bool_offset = 1 + template.int_count;
        let float_offset = bool_offset + template.bool_count;
        let string_offset = float_offset + template.float_count;
        let temp_offset = string_offset + template.string_count;
        let mut slots = vec![None; template.size()];
        slots[0] = Some(Value::Int(template.activation_addr as i64));
        Self {
            slots,
            bool_offset,
            float_offset,
            string_offset,
            temp_offset,
            parameter_store: Vec::new(),
        }
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.slots.len()
    }

    /// Reads a slot; reading an unallocated slot is a fault.
    pub fn get(&self, address: usize) -> MemoryResult<Value> {
        match self.slots.get(address) {
            Some(Some(value)) => Ok(value.clone()),
            Some(None) => Err(MemoryError::new(MemoryErrorKind::UnallocatedAccess, address)),
            None => Err(MemoryError::new(MemoryErrorKind::AddressOutsideRange, address)),
        }
    }

    pub fn set(&mut self, address: usize, value: Option<Value>) -> MemoryResult<()> {
        match self.slots.get_mut(address) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(MemoryError::new(MemoryErrorKind::AddressOutsideRange, address)),
        }
    }

    /// Static type of a slot, decided by its partition. Temp slots have no
    /// type; the activation slot reads as int.
    #[must_use]
    pub fn slot_type(&self, address: usize) -> Option<ValueType> {
        if address < self.bool_offset {
            Some(ValueType::Int)
        } else if address < self.float_offset {
            Some(ValueType::Bool)
        } else if address < self.string_offset {
            Some(ValueType::Float)
        } else if address < self.temp_offset {
            Some(ValueType::String)
        } else {
            None
        }
    }

    pub fn parameter_push(&mut self, global_address: usize) {
        self.parameter_store.push(global_address);
    }

    /// Drains the whole parameter scratchpad in push order.
    pub fn parameter_drain(&mut self) -> Vec<usize> {
        std::mem::take(&mut self.parameter_store)
    }
}

/// A function call's runtime state.
#[derive(Debug)]
pub struct ActivationRecord {
    /// Dense function id, for diagnostics.
    pub function_id: usize,
    /// Instruction to resume at after `RETURN`.
    pub return_address: usize,
    /// Where the caller expects the return value, if any (caller-relative).
    pub return_value_address: Option<usize>,
    /// Global addresses of the call's arguments, kept so temporaries among
    /// them can be deallocated once the call returns.
    pub arguments: Vec<usize>,
    /// Argument addresses not yet consumed by `ARG`; popped back-to-front,
    /// matching the reverse emission order of `ARG` quadruples.
    pub arguments_to_load: Vec<usize>,
    scopes: Vec<MemoryScope>,
    scope_offsets: Vec<usize>,
    total_size: usize,
}

impl ActivationRecord {
    #[must_use]
    pub fn new(
        function_id: usize,
        return_address: usize,
        arguments: Vec<usize>,
        return_value_address: Option<usize>,
    ) -> Self {
        Self {
            function_id,
            return_address,
            return_value_address,
            arguments_to_load: arguments.clone(),
            arguments,
            scopes: Vec::new(),
            scope_offsets: Vec::new(),
            total_size: 0,
        }
    }

    #[must_use]
    pub fn total_size(&self) -> usize {
        self.total_size
    }

    pub fn push_scope(&mut self, template: &MemoryScopeTemplate) {
        let scope = MemoryScope::new(template);
        self.scope_offsets.push(self.total_size);
        self.total_size += scope.size();
        self.scopes.push(scope);
    }

    pub fn pop_scope(&mut self) -> Option<MemoryScope> {
        let scope = self.scopes.pop()?;
        self.scope_offsets.pop();
        self.total_size -= scope.size();
        Some(scope)
    }

    pub fn top_scope_mut(&mut self) -> Option<&mut MemoryScope> {
        self.scopes.last_mut()
    }

    /// Finds the scope owning a record-local address; innermost first.
    fn scope_index(&self, local_address: usize) -> MemoryResult<usize> {
        if local_address >= self.total_size {
            return Err(MemoryError::new(MemoryErrorKind::AddressOutsideRange, local_address));
        }
        for (i, offset) in self.scope_offsets.iter().enumerate().rev() {
            if local_address >= *offset {
                return Ok(i);
            }
        }
        Err(MemoryError::new(MemoryErrorKind::AddressOutsideRange, local_address))
    }

    pub fn get(&self, local_address: usize) -> MemoryResult<Value> {
        let i = self.scope_index(local_address)?;
        let base = self.scope_offsets[i];
        self.scopes[i].get(local_address - base).map_err(|e| e.offset_by(base))
    }

    pub fn set(&mut self, local_address: usize, value: Option<Value>) -> MemoryResult<()> {
        let i = self.scope_index(local_address)?;
        let base = self.scope_offsets[i];
        self.scopes[i].set(local_address - base, value).map_err(|e| e.offset_by(base))
    }

    pub fn slot_type(&self, local_address: usize) -> MemoryResult<Option<ValueType>> {
        let i = self.scope_index(local_address)?;
        Ok(self.scopes[i].slot_type(local_address - self.scope_offsets[i]))
    }
}
