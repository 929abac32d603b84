//! Graphics state machine
//!
//! A [`StateStack`] holds a bounded array of [`GraphicsState`]s plus the
//! save-scoped key/value store. `save` pushes a copy of the top state,
//! `restore` pops it. Restores never cross the protect watermark.

mod keydb;
mod transform;

pub use keydb::{strhash, KeyDb};
pub use transform::{FixedMatrix, Transform, TransformClass, FIXED_ONE, FIXED_SHIFT};

use crate::config::Capacities;
use crate::error::StateError;
use crate::geometry::{IntRect, Matrix};
use crate::paint::PaintSource;
use crate::style::{BlendMode, CompositingMode, Extend, FillRule, LineCap, LineJoin};

/// Maximum number of dash entries kept in the state
pub const MAX_DASHES: usize = 10;

/// Device-space flattening tolerance (squared distance, pixels)
pub const DEVICE_TOLERANCE: f32 = 0.25;

/// Stroke geometry settings
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LineStyle {
    pub width: f32,
    pub cap: LineCap,
    pub join: LineJoin,
    pub miter_limit: f32,
    dashes: [f32; MAX_DASHES],
    dash_count: u8,
    pub dash_offset: f32,
}

impl Default for LineStyle {
    fn default() -> Self {
        Self {
            width: 2.0,
            cap: LineCap::default(),
            join: LineJoin::default(),
            miter_limit: 4.0,
            dashes: [0.0; MAX_DASHES],
            dash_count: 0,
            dash_offset: 0.0,
        }
    }
}

impl LineStyle {
    pub fn dashes(&self) -> &[f32] {
        &self.dashes[..self.dash_count as usize]
    }

    /// Set the dash pattern; entries past [`MAX_DASHES`] are dropped and a
    /// pattern with no positive entry disables dashing.
    pub fn set_dashes(&mut self, dashes: &[f32]) {
        let n = dashes.len().min(MAX_DASHES);
        if dashes.len() > MAX_DASHES {
            tracing::warn!(count = dashes.len(), "dash pattern truncated to {MAX_DASHES} entries");
        }
        if dashes[..n].iter().all(|d| *d <= 0.0) {
            self.dash_count = 0;
            return;
        }
        for (slot, d) in self.dashes.iter_mut().zip(&dashes[..n]) {
            *slot = d.max(0.0);
        }
        self.dash_count = n as u8;
    }
}

/// Densely packed boolean options
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct StateFlags(u8);

impl StateFlags {
    pub const IMAGE_SMOOTHING: u8 = 1 << 0;
    /// Next source-setting command targets the stroke source
    pub const STROKE_SOURCE_PENDING: u8 = 1 << 1;
    /// Most recently set source was the stroke source
    pub const LAST_SOURCE_STROKE: u8 = 1 << 2;

    pub fn contains(self, bit: u8) -> bool {
        self.0 & bit != 0
    }

    pub fn set(&mut self, bit: u8, on: bool) {
        if on {
            self.0 |= bit;
        } else {
            self.0 &= !bit;
        }
    }
}

/// Everything save/restore scopes
#[derive(Clone, Debug, PartialEq)]
pub struct GraphicsState {
    transform: Transform,
    tolerance: f32,
    /// Device-pixel clip bounds
    pub clip: IntRect,
    pub clipped: bool,
    pub fill_source: PaintSource,
    pub stroke_source: PaintSource,
    pub line: LineStyle,
    pub fill_rule: FillRule,
    pub compositing: CompositingMode,
    pub blend: BlendMode,
    pub extend: Extend,
    pub font_size: f32,
    global_alpha: f32,
    global_alpha_u8: u8,
    pub flags: StateFlags,
    keydb_mark: (usize, usize),
}

impl GraphicsState {
    pub fn new(width: u32, height: u32) -> Self {
        let mut flags = StateFlags::default();
        flags.set(StateFlags::IMAGE_SMOOTHING, true);
        Self {
            transform: Transform::identity(),
            tolerance: DEVICE_TOLERANCE,
            clip: IntRect::from_size(width, height),
            clipped: false,
            fill_source: PaintSource::default(),
            stroke_source: PaintSource::default(),
            line: LineStyle::default(),
            fill_rule: FillRule::default(),
            compositing: CompositingMode::default(),
            blend: BlendMode::default(),
            extend: Extend::default(),
            font_size: 12.0,
            global_alpha: 1.0,
            global_alpha_u8: 255,
            flags,
            keydb_mark: (0, 0),
        }
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Replace the transform, recomputing every derived value
    pub fn set_transform(&mut self, matrix: Matrix) {
        self.transform.set(matrix);
        let scale = self.transform.scale_factor().max(0.01);
        self.tolerance = DEVICE_TOLERANCE / (scale * scale);
    }

    /// Prepend `m` to the current transform
    pub fn apply_transform(&mut self, m: &Matrix) {
        self.set_transform(self.transform.matrix().multiply(m));
    }

    /// Flattening tolerance in user space, squared distance
    pub fn tolerance(&self) -> f32 {
        self.tolerance
    }

    pub fn global_alpha(&self) -> f32 {
        self.global_alpha
    }

    pub fn global_alpha_u8(&self) -> u8 {
        self.global_alpha_u8
    }

    pub fn set_global_alpha(&mut self, alpha: f32) {
        let a = if alpha.is_nan() { 1.0 } else { alpha.clamp(0.0, 1.0) };
        self.global_alpha = a;
        self.global_alpha_u8 = crate::color::quantize(a);
    }

    pub fn image_smoothing(&self) -> bool {
        self.flags.contains(StateFlags::IMAGE_SMOOTHING)
    }

    /// Intersect the clip with device-space bounds
    pub fn clip_to(&mut self, bounds: IntRect) {
        self.clip = self.clip.intersect(&bounds);
        self.clipped = true;
    }

    /// Install a newly defined source on fill or stroke, honoring a
    /// pending stroke-source request
    pub fn set_source(&mut self, source: PaintSource) {
        let stroke = self.flags.contains(StateFlags::STROKE_SOURCE_PENDING);
        if stroke {
            self.stroke_source = source;
        } else {
            self.fill_source = source;
        }
        self.flags.set(StateFlags::STROKE_SOURCE_PENDING, false);
        self.flags.set(StateFlags::LAST_SOURCE_STROKE, stroke);
    }

    /// Source most recently installed by [`GraphicsState::set_source`]
    pub fn last_source_mut(&mut self) -> &mut PaintSource {
        if self.flags.contains(StateFlags::LAST_SOURCE_STROKE) {
            &mut self.stroke_source
        } else {
            &mut self.fill_source
        }
    }
}

/// Bounded save/restore stack
#[derive(Clone, Debug)]
pub struct StateStack {
    states: Vec<GraphicsState>,
    max_depth: usize,
    /// Saves dropped at the depth limit; restores consume these first
    overflow_saves: usize,
    /// Stack length that restores may not go below
    watermark: Option<usize>,
    keydb: KeyDb,
    width: u32,
    height: u32,
}

impl StateStack {
    pub fn new(width: u32, height: u32, caps: &Capacities) -> Self {
        let mut states = Vec::with_capacity(caps.state_depth);
        states.push(GraphicsState::new(width, height));
        Self {
            states,
            max_depth: caps.state_depth.max(Capacities::MIN_STATE_DEPTH),
            overflow_saves: 0,
            watermark: None,
            keydb: KeyDb::new(caps.keydb_entries, caps.string_pool_bytes),
            width,
            height,
        }
    }

    pub fn top(&self) -> &GraphicsState {
        // the base state is never popped
        &self.states[self.states.len() - 1]
    }

    pub fn top_mut(&mut self) -> &mut GraphicsState {
        let last = self.states.len() - 1;
        &mut self.states[last]
    }

    /// Number of saves currently in effect, including dropped ones
    pub fn depth(&self) -> usize {
        self.states.len() - 1 + self.overflow_saves
    }

    pub fn save(&mut self) -> Result<(), StateError> {
        if self.states.len() >= self.max_depth {
            self.overflow_saves += 1;
            tracing::warn!(depth = self.max_depth, "state stack full, save ignored");
            return Err(StateError::StackFull {
                depth: self.max_depth,
            });
        }
        let mut copy = self.top().clone();
        copy.keydb_mark = self.keydb.mark();
        self.keydb.set_scope(copy.keydb_mark);
        self.states.push(copy);
        Ok(())
    }

    pub fn restore(&mut self) -> Result<(), StateError> {
        if self.overflow_saves > 0 {
            self.overflow_saves -= 1;
            return Ok(());
        }
        if let Some(mark) = self.watermark {
            if self.states.len() <= mark {
                tracing::warn!("restore past protected save point ignored");
                return Err(StateError::Protected);
            }
        }
        if self.states.len() <= 1 {
            tracing::warn!("restore without matching save ignored");
            return Err(StateError::Underflow);
        }
        if let Some(popped) = self.states.pop() {
            let scope = self.top().keydb_mark;
            self.keydb.truncate(popped.keydb_mark);
            self.keydb.set_scope(scope);
        }
        Ok(())
    }

    /// Forbid restores below the current depth
    pub fn protect(&mut self) {
        self.watermark = Some(self.states.len());
    }

    pub fn unprotect(&mut self) {
        self.watermark = None;
    }

    pub fn is_protected(&self) -> bool {
        self.watermark.is_some()
    }

    /// Back to a single default state with an empty key/value store
    pub fn reset(&mut self) {
        self.states.truncate(1);
        self.states[0] = GraphicsState::new(self.width, self.height);
        self.overflow_saves = 0;
        self.watermark = None;
        self.keydb.clear();
    }

    pub fn keydb(&self) -> &KeyDb {
        &self.keydb
    }

    pub fn set_float(&mut self, key: u64, value: f32) -> Result<(), StateError> {
        self.keydb.set_float(key, value)
    }

    pub fn get_float(&self, key: u64) -> Option<f32> {
        self.keydb.get_float(key)
    }

    pub fn set_string(&mut self, key: u64, value: &str) -> Result<(), StateError> {
        self.keydb.set_string(key, value)
    }

    pub fn get_string(&self, key: u64) -> Option<&str> {
        self.keydb.get_string(key)
    }

    pub fn is_set(&self, key: u64) -> bool {
        self.keydb.is_set(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;

    fn stack(depth: usize) -> StateStack {
        StateStack::new(100, 100, &Capacities::standard().with_state_depth(depth))
    }

    #[test]
    fn test_save_restore_symmetry() {
        let mut s = stack(16);
        let before = s.top().clone();
        for i in 0..5 {
            s.save().unwrap();
            s.top_mut().apply_transform(&Matrix::translation(i as f32, 1.0));
            s.top_mut().line.width = i as f32;
            s.top_mut().set_source(PaintSource::Solid(Color::RED));
            s.top_mut().clip_to(IntRect::new(i, i, 50, 50));
        }
        for _ in 0..5 {
            s.restore().unwrap();
        }
        assert_eq!(*s.top(), before);
    }

    #[test]
    fn test_tolerance_tracks_scale() {
        let mut s = stack(4);
        s.top_mut().apply_transform(&Matrix::scaling(4.0, 4.0));
        assert!((s.top().tolerance() - 0.25 / 16.0).abs() < 1e-7);
        s.top_mut().set_transform(Matrix::scaling(0.0001, 0.0001));
        assert!((s.top().tolerance() - 0.25 / (0.01 * 0.01)).abs() < 1.0);
    }

    #[test]
    fn test_overflowed_saves_are_balanced() {
        let mut s = stack(3);
        s.save().unwrap();
        s.save().unwrap();
        assert!(matches!(s.save(), Err(StateError::StackFull { depth: 3 })));
        assert_eq!(s.depth(), 3);
        s.top_mut().line.width = 9.0;
        s.restore().unwrap();
        // the dropped save's restore leaves the real top in place
        assert_eq!(s.top().line.width, 9.0);
        s.restore().unwrap();
        s.restore().unwrap();
        assert_eq!(s.restore(), Err(StateError::Underflow));
        assert_eq!(s.depth(), 0);
    }

    #[test]
    fn test_protect_watermark() {
        let mut s = stack(8);
        s.save().unwrap();
        s.protect();
        s.save().unwrap();
        s.restore().unwrap();
        assert_eq!(s.restore(), Err(StateError::Protected));
        assert_eq!(s.depth(), 1);
        s.unprotect();
        s.restore().unwrap();
        assert_eq!(s.depth(), 0);
    }

    #[test]
    fn test_keydb_scoped_to_save() {
        let mut s = stack(8);
        let k = strhash("x");
        s.set_float(k, 1.0).unwrap();
        s.save().unwrap();
        s.set_float(k, 2.0).unwrap();
        s.set_string(strhash("name"), "abc").unwrap();
        assert_eq!(s.get_float(k), Some(2.0));
        s.restore().unwrap();
        assert_eq!(s.get_float(k), Some(1.0));
        assert!(!s.is_set(strhash("name")));
    }

    #[test]
    fn test_keydb_rewrites_do_not_exhaust_entries() {
        let mut s = stack(8);
        let k = strhash("x");
        s.set_float(k, -1.0).unwrap();
        s.save().unwrap();
        for i in 0..1000 {
            s.set_float(k, i as f32).unwrap();
        }
        assert_eq!(s.get_float(k), Some(999.0));
        assert_eq!(s.keydb().len(), 2);
        s.save().unwrap();
        s.set_float(k, 5.0).unwrap();
        s.restore().unwrap();
        assert_eq!(s.get_float(k), Some(999.0));
        s.set_float(k, 7.0).unwrap();
        assert_eq!(s.keydb().len(), 2);
        s.restore().unwrap();
        assert_eq!(s.get_float(k), Some(-1.0));
    }

    #[test]
    fn test_stroke_source_pending() {
        let mut s = stack(4);
        s.top_mut().flags.set(StateFlags::STROKE_SOURCE_PENDING, true);
        s.top_mut().set_source(PaintSource::Solid(Color::BLUE));
        assert_eq!(s.top().stroke_source.solid(), Some(Color::BLUE));
        assert_eq!(s.top().fill_source.solid(), Some(Color::BLACK));
        s.top_mut().set_source(PaintSource::Solid(Color::GREEN));
        assert_eq!(s.top().fill_source.solid(), Some(Color::GREEN));
    }

    #[test]
    fn test_dash_pattern_limits() {
        let mut line = LineStyle::default();
        line.set_dashes(&[1.0; 12]);
        assert_eq!(line.dashes().len(), MAX_DASHES);
        line.set_dashes(&[0.0, 0.0]);
        assert!(line.dashes().is_empty());
    }
}
