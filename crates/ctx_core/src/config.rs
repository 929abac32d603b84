//! Capacity configuration shared by the drawlist, state machine and rasterizer.

use serde::{Deserialize, Serialize};

/// Upper bounds for every fixed-size table in the pipeline.
///
/// Passed at construction; [`Capacities::validated`] enforces the minimums
/// each consumer relies on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capacities {
    /// Maximum number of records in one drawlist.
    pub drawlist_records: usize,
    /// Maximum number of edges built for a single fill or stroke.
    pub edge_table: usize,
    /// Maximum save depth of the graphics state stack.
    pub state_depth: usize,
    /// Maximum number of entries in the key/value store.
    pub keydb_entries: usize,
    /// Bytes available for string values in the key/value store.
    pub string_pool_bytes: usize,
    /// Number of texture slots before LRU eviction kicks in.
    pub texture_slots: usize,
    /// Number of distinct gradient ramps kept cached.
    pub gradient_cache: usize,
    /// Maximum number of curve segments a full-circle arc is split into.
    pub max_arc_segments: usize,
}

impl Default for Capacities {
    fn default() -> Self {
        Self::standard()
    }
}

impl Capacities {
    pub const MIN_DRAWLIST_RECORDS: usize = 64;
    pub const MIN_EDGE_TABLE: usize = 16;
    pub const MIN_STATE_DEPTH: usize = 2;
    pub const MIN_ARC_SEGMENTS: usize = 4;

    /// Standard capacities for desktop-sized framebuffers.
    pub fn standard() -> Self {
        Self {
            drawlist_records: 1 << 20,
            edge_table: 16 * 1024,
            state_depth: 16,
            keydb_entries: 128,
            string_pool_bytes: 4096,
            texture_slots: 32,
            gradient_cache: 16,
            max_arc_segments: 16,
        }
    }

    /// Small capacities for memory-constrained displays.
    pub fn embedded() -> Self {
        Self {
            drawlist_records: 4096,
            edge_table: 2048,
            state_depth: 10,
            keydb_entries: 64,
            string_pool_bytes: 1024,
            texture_slots: 8,
            gradient_cache: 4,
            max_arc_segments: 8,
        }
    }

    /// Raise every bound to its minimum.
    pub fn validated(mut self) -> Self {
        self.drawlist_records = self.drawlist_records.max(Self::MIN_DRAWLIST_RECORDS);
        self.edge_table = self.edge_table.max(Self::MIN_EDGE_TABLE);
        self.state_depth = self.state_depth.max(Self::MIN_STATE_DEPTH);
        self.keydb_entries = self.keydb_entries.max(1);
        self.texture_slots = self.texture_slots.max(1);
        self.gradient_cache = self.gradient_cache.max(1);
        self.max_arc_segments = self.max_arc_segments.max(Self::MIN_ARC_SEGMENTS);
        self
    }

    /// Set the drawlist record limit.
    pub fn with_drawlist_records(mut self, records: usize) -> Self {
        self.drawlist_records = records;
        self
    }

    /// Set the per-fill edge limit.
    pub fn with_edge_table(mut self, edges: usize) -> Self {
        self.edge_table = edges;
        self
    }

    /// Set the state stack depth.
    pub fn with_state_depth(mut self, depth: usize) -> Self {
        self.state_depth = depth;
        self
    }

    /// Set the key/value store limits.
    pub fn with_keydb(mut self, entries: usize, string_pool_bytes: usize) -> Self {
        self.keydb_entries = entries;
        self.string_pool_bytes = string_pool_bytes;
        self
    }

    /// Set the texture slot budget.
    pub fn with_texture_slots(mut self, slots: usize) -> Self {
        self.texture_slots = slots;
        self
    }

    /// Set the maximum arc segment count.
    pub fn with_max_arc_segments(mut self, segments: usize) -> Self {
        self.max_arc_segments = segments;
        self
    }
}
