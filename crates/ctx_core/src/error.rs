//! Error types and soft-fault diagnostics

use thiserror::Error;

/// Errors raised while building, loading or walking a drawlist
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DrawlistError {
    /// Appending would exceed the configured record capacity
    #[error("drawlist capacity of {capacity} records exceeded")]
    CapacityExceeded { capacity: usize },

    /// Byte buffer is not a whole number of records
    #[error("byte length {0} is not a multiple of the record size")]
    InvalidLength(usize),

    /// Record carries an opcode outside the command set
    #[error("unknown opcode {code:#04x} at record {offset}")]
    UnknownOpcode { offset: usize, code: u8 },

    /// Command is missing continuation or data records
    #[error("command {code:#04x} at record {offset} is truncated")]
    Truncated { offset: usize, code: u8 },

    /// Text form could not be parsed
    #[error("parse error on line {line}: {message}")]
    Parse { line: usize, message: String },
}

/// Errors raised by the graphics state stack
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateError {
    /// Save beyond the configured depth
    #[error("state stack full at depth {depth}")]
    StackFull { depth: usize },

    /// Restore without a matching save
    #[error("restore without matching save")]
    Underflow,

    /// Restore past a protected save point
    #[error("restore past protected save point")]
    Protected,

    /// Key/value store has no free entries
    #[error("key/value store full")]
    KeyDbFull,

    /// String pool has no room for the value
    #[error("string pool full")]
    StringPoolFull,
}

/// Soft faults recorded while processing a frame.
///
/// None of these stop rendering; they are counted so hosts and tests can
/// observe truncation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Diagnostics {
    /// A drawlist append was dropped for lack of capacity
    pub drawlist_overflow: bool,
    /// A fill or stroke produced more edges than the edge table holds
    pub edge_overflow: bool,
    /// Saves beyond the stack depth
    pub state_overflow: u32,
    /// Restores without a matching save
    pub unbalanced_restores: u32,
    /// Restores blocked by the protect watermark
    pub protected_restores: u32,
    /// Key/value writes dropped for lack of room
    pub keydb_overflow: u32,
    /// Iteration stopped at a malformed record
    pub malformed_stream: bool,
    /// Texture sources that resolved to nothing
    pub missing_textures: u32,
}

impl Diagnostics {
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }

    /// Record a state stack error
    pub fn note_state(&mut self, err: StateError) {
        match err {
            StateError::StackFull { .. } => self.state_overflow += 1,
            StateError::Underflow => self.unbalanced_restores += 1,
            StateError::Protected => self.protected_restores += 1,
            StateError::KeyDbFull | StateError::StringPoolFull => self.keydb_overflow += 1,
        }
    }

    /// Fold another frame's faults into this one
    pub fn merge(&mut self, other: &Diagnostics) {
        self.drawlist_overflow |= other.drawlist_overflow;
        self.edge_overflow |= other.edge_overflow;
        self.state_overflow += other.state_overflow;
        self.unbalanced_restores += other.unbalanced_restores;
        self.protected_restores += other.protected_restores;
        self.keydb_overflow += other.keydb_overflow;
        self.malformed_stream |= other.malformed_stream;
        self.missing_textures += other.missing_textures;
    }
}
