//! Indirect call table patching with exact-restore bookkeeping.
//!
//! The firmware module dispatches every hardware operation through one
//! contiguous array of routine addresses. [`TablePatcher`] rewrites chosen
//! slots and keeps two records per slot (the value found before the first
//! patch and the value written by the last patch) so a full teardown can put
//! the table back byte for byte, no matter how many reload phases the
//! firmware module went through in between.
//!
//! The table itself stays unlocked on purpose. Its owner serializes its own
//! writes around load/unload and holds no lock while doing so; taking one
//! here would invite a deadlock against that sequencing.
//!
//! Every raw dereference of foreign memory in this crate's table handling
//! lives in this file.

mod slots;

pub use slots::Slot;

use thiserror::Error;

use crate::host::Address;

/// Number of slots a bound table must cover.
pub const TABLE_SLOTS: usize = Slot::COUNT;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VtableError {
    #[error("Table base pointer is NULL")]
    NullTable,

    #[error("Bound table has {0} slots, need at least {TABLE_SLOTS}")]
    TableTooSmall(usize),
}

type Result<T> = std::result::Result<T, VtableError>;

#[derive(Debug, Default, Clone, Copy)]
struct SlotRecord {
    original: Option<Address>,
    shim: Option<Address>,
}

/// Patch session over one firmware dispatch table.
///
/// One patcher handles one table; a new firmware load means a new `bind`.
pub struct TablePatcher {
    table: *mut Address,
    records: [SlotRecord; TABLE_SLOTS],
}

// Safety: the patcher is only ever driven from the host's serialized
// load/unload path; the raw pointer itself carries no thread affinity.
unsafe impl Send for TablePatcher {}

impl TablePatcher {
    /// Bind a patch session to the table at `base` with `len` slots.
    ///
    /// # Safety
    ///
    /// `base` must point to a live array of at least `len` routine addresses
    /// that stays valid until [`TablePatcher::restore`] runs (or the patcher
    /// is dropped without having patched anything).
    pub unsafe fn bind(base: *mut Address, len: usize) -> Result<Self> {
        if base.is_null() {
            return Err(VtableError::NullTable);
        }
        if len < TABLE_SLOTS {
            return Err(VtableError::TableTooSmall(len));
        }

        log::debug!("Bound dispatch table at {:p} ({} slots)", base, len);
        Ok(Self {
            table: base,
            records: [SlotRecord::default(); TABLE_SLOTS],
        })
    }

    fn read_slot(&self, idx: usize) -> Address {
        // Safety: bind() checked that idx < TABLE_SLOTS fits the table.
        unsafe { *self.table.add(idx) }
    }

    fn write_slot(&mut self, idx: usize, value: Address) {
        // Safety: as in read_slot; writes are serialized by the host's
        // load/unload sequencing.
        unsafe { *self.table.add(idx) = value };
    }

    /// Install `replacement` at `slot`.
    ///
    /// Re-patching a slot whose table value is still our own shim is a no-op;
    /// the firmware module re-asserts an already-patched table during its
    /// multi-phase load and that must not disturb the records. The original
    /// is recorded only the first time, so it is never clobbered by an
    /// intermediate shim value.
    pub fn patch(&mut self, slot: Slot, replacement: Address) {
        let idx = slot.index();
        let current = self.read_slot(idx);

        if self.records[idx].shim == Some(current) {
            return;
        }

        log::debug!(
            "Dispatch table [{idx}] ({slot:?}): {:#x} -> {:#x}",
            current,
            replacement
        );

        let rec = &mut self.records[idx];
        if rec.original.is_none() {
            rec.original = Some(current);
        }
        rec.shim = Some(replacement);
        self.write_slot(idx, replacement);
    }

    /// Put every patched slot back to its recorded original (which may
    /// legitimately be empty) and clear all records.
    pub fn restore(&mut self) {
        for idx in 0..TABLE_SLOTS {
            let rec = self.records[idx];
            if rec.shim.is_some() {
                let original = rec.original.unwrap_or(0);
                log::debug!("Dispatch table [{idx}]: restoring {:#x}", original);
                self.write_slot(idx, original);
            }
            self.records[idx] = SlotRecord::default();
        }
    }

    /// Number of slots currently carrying a shim record.
    pub fn patched_count(&self) -> usize {
        self.records.iter().filter(|r| r.shim.is_some()).count()
    }

    #[cfg(test)]
    fn recorded_original(&self, slot: Slot) -> Option<Address> {
        self.records[slot.index()].original
    }
}
