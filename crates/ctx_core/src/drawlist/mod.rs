//! Drawlist: the append-only command stream
//!
//! A drawlist is a flat array of 9-byte [`Record`]s. Commands with more than
//! two numeric arguments spill into continuation records; strings and pixel
//! data travel in length-prefixed data records. The byte image of a drawlist
//! is its serialized form.
//!
//! ```rust
//! use ctx_core::drawlist::{Command, Drawlist};
//!
//! let mut list = Drawlist::new(1024);
//! list.append(&Command::Rectangle { x: 0.0, y: 0.0, width: 10.0, height: 10.0 }).unwrap();
//! list.append(&Command::Fill).unwrap();
//!
//! let copy = Drawlist::from_bytes(list.as_bytes(), 1024).unwrap();
//! assert_eq!(copy.iter().count(), 2);
//! ```

mod command;
mod iter;
mod opcode;
mod pack;
mod record;
mod text;

pub use command::{data_blocks, Command, DashArray, EncodedRecords};
pub use iter::DrawlistIter;
pub use opcode::Opcode;
pub use record::{Record, PAYLOAD_SIZE, RECORD_SIZE};

use crate::config::Capacities;
use crate::error::DrawlistError;

/// Packed records store coordinates in 1/8 pixel units
pub const PACK_UNIT: f32 = 8.0;

/// Growable, capacity-bounded array of records
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Drawlist {
    records: Vec<Record>,
    capacity: usize,
    overflowed: bool,
}

impl Drawlist {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Vec::new(),
            capacity,
            overflowed: false,
        }
    }

    pub fn with_capacities(caps: &Capacities) -> Self {
        Self::new(caps.drawlist_records)
    }

    /// Load a serialized drawlist
    pub fn from_bytes(bytes: &[u8], capacity: usize) -> Result<Self, DrawlistError> {
        let mut list = Self::new(capacity);
        list.append_bytes(bytes)?;
        Ok(list)
    }

    /// Replace the contents with a serialized drawlist
    pub fn set_bytes(&mut self, bytes: &[u8]) -> Result<(), DrawlistError> {
        self.clear();
        self.append_bytes(bytes)
    }

    /// Append serialized records; all or nothing
    pub fn append_bytes(&mut self, bytes: &[u8]) -> Result<(), DrawlistError> {
        if bytes.len() % RECORD_SIZE != 0 {
            return Err(DrawlistError::InvalidLength(bytes.len()));
        }
        let records: &[Record] = bytemuck::cast_slice(bytes);
        self.push_records(records)
    }

    /// Append one command atomically
    pub fn append(&mut self, cmd: &Command) -> Result<(), DrawlistError> {
        let records = cmd.encode();
        self.push_records(&records)
    }

    /// Append raw records atomically
    pub fn push_records(&mut self, records: &[Record]) -> Result<(), DrawlistError> {
        if self.records.len() + records.len() > self.capacity {
            if !self.overflowed {
                tracing::warn!(
                    capacity = self.capacity,
                    "drawlist full, dropping further commands"
                );
            }
            self.overflowed = true;
            return Err(DrawlistError::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        self.records.extend_from_slice(records);
        Ok(())
    }

    /// Empty the list and reset the overflow flag
    pub fn clear(&mut self) {
        self.records.clear();
        self.overflowed = false;
    }

    /// Truncate to `count` records; larger counts are ignored
    pub fn force_count(&mut self, count: usize) {
        self.records.truncate(count);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether an append was dropped since the last clear
    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Serialized byte image
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.records)
    }

    pub fn iter(&self) -> DrawlistIter<'_> {
        DrawlistIter::new(&self.records, 0)
    }

    /// Iterate from a record index previously reported by [`DrawlistIter::position`]
    pub fn iter_from(&self, start: usize) -> DrawlistIter<'_> {
        DrawlistIter::new(&self.records, start)
    }
}

impl<'a> IntoIterator for &'a Drawlist {
    type Item = Command;
    type IntoIter = DrawlistIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
