//! Segmented virtual-machine memory.
//!
//! Physical memory is conceptually `[constants || globals || stack of
//! activation records]`. Constants are read-only; writing one is a fault.
//!
//! Two resolution paths exist: *global* addresses locate any slot in the
//! whole machine (used for parameter passing, which must outlive the
//! calling scope), while *relative* addresses below the local-scope offset
//! denote constants or globals and above it target the *current*
//! activation record directly. Memory errors pick up each layer's base
//! offset while unwinding, so the reported address is always absolute.

use tracing::trace;

use crate::{
    errors::{MemoryError, MemoryErrorKind},
    program::MemoryScopeTemplate,
    value::{Value, ValueType},
};

use super::frame::{ActivationRecord, MemoryScope};

/// Result alias for memory operations.
pub type MemoryResult<T> = Result<T, MemoryError>;

/// The whole machine's memory.
#[derive(Debug)]
pub struct VmMemory {
    constants: Vec<Value>,
    global_scope: MemoryScope,
    /// Base address of the global variable segment (= number of constants).
    global_offset: usize,
    /// First address past constants and globals; record-local addressing
    /// starts here.
    local_offset: usize,
    records: Vec<ActivationRecord>,
    record_offsets: Vec<usize>,
}

impl VmMemory {
    /// Materializes constants and the global scope from template 0.
    #[must_use]
    pub fn new(constants: Vec<Value>, global_template: &MemoryScopeTemplate) -> Self {
        let global_scope = MemoryScope::new(global_template);
        let global_offset = constants.len();
        let local_offset = global_offset + global_scope.size();
        trace!(global_offset, local_offset, "memory initialized");
        Self {
            constants,
            global_scope,
            global_offset,
            local_offset,
            records: Vec::new(),
            record_offsets: Vec::new(),
        }
    }

    #[must_use]
    pub fn has_records(&self) -> bool {
        !self.records.is_empty()
    }

    fn total_size(&self) -> usize {
        self.local_offset + self.records.iter().map(ActivationRecord::total_size).sum::<usize>()
    }

    //
    // Activation record handling
    //

    pub fn push_record(&mut self, record: ActivationRecord) {
        self.record_offsets.push(self.total_size());
        self.records.push(record);
    }

    pub fn pop_record(&mut self) -> Option<ActivationRecord> {
        self.record_offsets.pop();
        self.records.pop()
    }

    pub fn top_record_mut(&mut self) -> Option<&mut ActivationRecord> {
        self.records.last_mut()
    }

    fn top_record(&self) -> MemoryResult<&ActivationRecord> {
        self.records
            .last()
            .ok_or_else(|| MemoryError::new(MemoryErrorKind::AddressOutsideRange, self.local_offset))
    }

    /// Index of the current (topmost) activation record.
    pub fn current_record_index(&self) -> MemoryResult<usize> {
        if self.records.is_empty() {
            return Err(MemoryError::new(MemoryErrorKind::AddressOutsideRange, self.local_offset));
        }
        Ok(self.records.len() - 1)
    }

    /// The global scope's value at a scope-local address; used to read the
    /// exit code after the program terminates.
    pub fn global_scope_get(&self, address: usize) -> MemoryResult<Value> {
        self.global_scope.get(address).map_err(|e| e.offset_by(self.global_offset))
    }

    //
    // Global addressing (any slot in the machine)
    //

    fn validate_global(&self, address: usize) -> MemoryResult<()> {
        if address >= self.total_size() {
            return Err(MemoryError::new(MemoryErrorKind::AddressOutsideRange, address));
        }
        Ok(())
    }

    /// Index of the activation record owning a global address.
    fn record_index(&self, address: usize) -> MemoryResult<usize> {
        for (i, offset) in self.record_offsets.iter().enumerate().rev() {
            if address >= *offset {
                return Ok(i);
            }
        }
        Err(MemoryError::new(MemoryErrorKind::AddressOutsideRange, address))
    }

    pub fn get_global(&self, address: usize) -> MemoryResult<Value> {
        self.validate_global(address)?;
        if address < self.global_offset {
            Ok(self.constants[address].clone())
        } else if address < self.local_offset {
            self.global_scope
                .get(address - self.global_offset)
                .map_err(|e| e.offset_by(self.global_offset))
        } else {
            let i = self.record_index(address)?;
            let base = self.record_offsets[i];
            self.records[i].get(address - base).map_err(|e| e.offset_by(base))
        }
    }

    pub fn set_global(&mut self, address: usize, value: Option<Value>) -> MemoryResult<()> {
        self.validate_global(address)?;
        if address < self.global_offset {
            Err(MemoryError::new(MemoryErrorKind::AllocatedConstant, address))
        } else if address < self.local_offset {
            self.global_scope
                .set(address - self.global_offset, value)
                .map_err(|e| e.offset_by(self.global_offset))
        } else {
            let i = self.record_index(address)?;
            let base = self.record_offsets[i];
            self.records[i].set(address - base, value).map_err(|e| e.offset_by(base))
        }
    }

    pub fn deallocate_global(&mut self, address: usize) -> MemoryResult<()> {
        self.set_global(address, None)
    }

    fn slot_type_global(&self, address: usize) -> MemoryResult<Option<ValueType>> {
        self.validate_global(address)?;
        if address < self.global_offset {
            Ok(Some(self.constants[address].value_type()))
        } else if address < self.local_offset {
            Ok(self.global_scope.slot_type(address - self.global_offset))
        } else {
            let i = self.record_index(address)?;
            self.records[i].slot_type(address - self.record_offsets[i])
        }
    }

    /// Whether a global address lands in a temp partition; only
    /// temporaries are deallocated after use.
    pub fn is_temp_global(&self, address: usize) -> MemoryResult<bool> {
        Ok(self.slot_type_global(address)?.is_none())
    }

    //
    // Relative addressing (current activation record)
    //

    pub fn get_relative(&self, address: usize) -> MemoryResult<Value> {
        if address < self.local_offset {
            return self.get_global(address);
        }
        let base = *self.record_offsets.last().unwrap_or(&self.local_offset);
        self.top_record()?
            .get(address - self.local_offset)
            .map_err(|e| e.offset_by(base))
    }

    pub fn set_relative(&mut self, address: usize, value: Option<Value>) -> MemoryResult<()> {
        if address < self.local_offset {
            return self.set_global(address, value);
        }
        let base = *self.record_offsets.last().unwrap_or(&self.local_offset);
        let local = address - self.local_offset;
        match self.records.last_mut() {
            Some(record) => record.set(local, value).map_err(|e| e.offset_by(base)),
            None => Err(MemoryError::new(MemoryErrorKind::AddressOutsideRange, address)),
        }
    }

    pub fn deallocate_relative(&mut self, address: usize) -> MemoryResult<()> {
        self.set_relative(address, None)
    }

    pub fn is_temp_relative(&self, address: usize) -> MemoryResult<bool> {
        if address < self.local_offset {
            return self.is_temp_global(address);
        }
        Ok(self.top_record()?.slot_type(address - self.local_offset)?.is_none())
    }

    /// Converts a relative address into its global equivalent within the
    /// record at `record_index`. Constants and globals pass through.
    pub fn relative_to_global(&self, address: usize, record_index: usize) -> MemoryResult<usize> {
        if address < self.local_offset {
            return Ok(address);
        }
        let base = self
            .record_offsets
            .get(record_index)
            .copied()
            .ok_or_else(|| MemoryError::new(MemoryErrorKind::AddressOutsideRange, address))?;
        Ok(base + (address - self.local_offset))
    }
}
