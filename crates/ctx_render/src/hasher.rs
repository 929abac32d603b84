//! Tile hasher
//!
//! Splits the target into a grid of tiles and folds the hash of every
//! drawing command into each tile its device bounds touch. Commands are
//! hashed from their record encoding together with the state and path
//! commands preceding them, so two drawlists that draw the same thing into
//! a tile give that tile the same hash. Comparing with the previous frame's
//! hashes tells which tiles need repainting.

use std::f32::consts::SQRT_2;
use std::hash::{Hash, Hasher};

use ctx_core::{
    Capacities, Command, DrawOp, Drawlist, IntRect, Interpreter, LineJoin, PathSegment, Point, Record, Rect,
};
use rustc_hash::FxHasher;
use smallvec::SmallVec;

use crate::config::RenderConfig;

/// Dirty tile rectangles; most frames touch only a few tiles
pub type TileList = SmallVec<[IntRect; 8]>;

fn mix(a: u64, b: u64) -> u64 {
    let mut hasher = FxHasher::default();
    a.hash(&mut hasher);
    b.hash(&mut hasher);
    hasher.finish()
}

fn command_hash(cmd: &Command) -> u64 {
    let records = cmd.encode();
    let mut hasher = FxHasher::default();
    bytemuck::cast_slice::<Record, u8>(records.as_slice()).hash(&mut hasher);
    hasher.finish()
}

fn segment_extents(path: &[PathSegment]) -> Option<Rect> {
    let mut bounds: Option<Rect> = None;
    let mut include = |p: Point| match bounds.as_mut() {
        Some(b) => b.include(p),
        None => bounds = Some(Rect::new(p.x, p.y, 0.0, 0.0)),
    };
    for segment in path {
        match *segment {
            PathSegment::MoveTo(p) | PathSegment::LineTo(p) => include(p),
            PathSegment::QuadTo(c, p) => {
                include(c);
                include(p);
            }
            PathSegment::CurveTo(c0, c1, p) => {
                include(c0);
                include(c1);
                include(p);
            }
            PathSegment::Close => {}
        }
    }
    bounds
}

fn padded(rect: Rect, pad: f32) -> IntRect {
    IntRect::covering(&Rect::new(
        rect.x - pad,
        rect.y - pad,
        rect.width + 2.0 * pad,
        rect.height + 2.0 * pad,
    ))
}

/// Device pixels an op may touch; `None` for ops that draw nothing
fn op_bounds(op: &DrawOp<'_>) -> Option<IntRect> {
    let bounds = match op {
        DrawOp::Fill { path, state } => segment_extents(path)
            .map(|r| padded(r, 1.0).intersect(&state.clip))
            .unwrap_or(IntRect::EMPTY),
        DrawOp::Stroke { path, state } => {
            let half = state.line.width * state.transform().scale_factor() * 0.5;
            let reach = match state.line.join {
                LineJoin::Miter => state.line.miter_limit.max(SQRT_2),
                _ => SQRT_2,
            };
            segment_extents(path)
                .map(|r| padded(r, half * reach + 1.0).intersect(&state.clip))
                .unwrap_or(IntRect::EMPTY)
        }
        DrawOp::Paint { state } | DrawOp::Text { state, .. } | DrawOp::Glyph { state, .. } => state.clip,
        DrawOp::SetPixel { x, y, .. } => {
            let (x, y) = (*x as i32, *y as i32);
            IntRect::new(x, y, x + 1, y + 1)
        }
        DrawOp::DefineTexture { .. } | DrawOp::StartFrame | DrawOp::EndFrame => return None,
    };
    Some(bounds)
}

/// Per-tile content hashes of a drawlist
pub struct TileHasher {
    width: u32,
    height: u32,
    cols: u32,
    rows: u32,
    tile_width: u32,
    tile_height: u32,
    hashes: Vec<u64>,
    interp: Interpreter,
}

impl TileHasher {
    pub fn new(width: u32, height: u32, cols: u32, rows: u32, caps: &Capacities) -> Self {
        let (cols, rows) = (cols.max(1), rows.max(1));
        Self {
            width,
            height,
            cols,
            rows,
            tile_width: width.div_ceil(cols).max(1),
            tile_height: height.div_ceil(rows).max(1),
            hashes: vec![0; (cols * rows) as usize],
            interp: Interpreter::new(width, height, caps),
        }
    }

    pub fn from_config(config: &RenderConfig) -> Self {
        Self::new(
            config.width,
            config.height,
            config.hash_cols,
            config.hash_rows,
            &config.capacities,
        )
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    /// Device rectangle of a tile, clipped to the target
    pub fn tile_rect(&self, col: u32, row: u32) -> IntRect {
        let x0 = (col * self.tile_width) as i32;
        let y0 = (row * self.tile_height) as i32;
        IntRect::new(
            x0,
            y0,
            x0 + self.tile_width as i32,
            y0 + self.tile_height as i32,
        )
        .intersect(&IntRect::from_size(self.width, self.height))
    }

    /// Hash of one tile after the last [`TileHasher::hash_drawlist`]
    pub fn hash(&self, col: u32, row: u32) -> Option<u64> {
        if col >= self.cols || row >= self.rows {
            return None;
        }
        Some(self.hashes[(row * self.cols + col) as usize])
    }

    pub fn hashes(&self) -> &[u64] {
        &self.hashes
    }

    /// Recompute every tile hash for `list`
    pub fn hash_drawlist(&mut self, list: &Drawlist) {
        self.hashes.fill(0);
        self.interp.reset();
        let target = IntRect::from_size(self.width, self.height);
        let mut state_hash = 0u64;
        let mut path_hash = 0u64;

        for cmd in list.iter() {
            let h = command_hash(&cmd);
            let drawn = self
                .interp
                .process(&cmd)
                .and_then(|op| op_bounds(&op))
                .map(|b| b.intersect(&target));
            match drawn {
                Some(bounds) => {
                    let op_hash = mix(mix(state_hash, path_hash), h);
                    if !bounds.is_empty() {
                        self.fold(bounds, op_hash);
                    }
                }
                None if cmd.is_path() => path_hash = mix(path_hash, h),
                None => state_hash = mix(state_hash, h),
            }
            if self.interp.path().is_empty() {
                path_hash = 0;
            }
        }
        self.interp.take_diagnostics();
    }

    fn fold(&mut self, bounds: IntRect, op_hash: u64) {
        let (tw, th) = (self.tile_width as i32, self.tile_height as i32);
        let col0 = (bounds.x0 / tw) as u32;
        let row0 = (bounds.y0 / th) as u32;
        let col1 = ((bounds.x1 + tw - 1) / tw).min(self.cols as i32) as u32;
        let row1 = ((bounds.y1 + th - 1) / th).min(self.rows as i32) as u32;
        for row in row0..row1 {
            for col in col0..col1 {
                let slot = &mut self.hashes[(row * self.cols + col) as usize];
                *slot = mix(*slot, op_hash);
            }
        }
    }

    /// Tiles whose hash differs from `previous`. Every non-empty tile is
    /// reported when `previous` comes from a different grid.
    pub fn changed_tiles(&self, previous: &[u64]) -> TileList {
        let mut tiles = TileList::new();
        for row in 0..self.rows {
            for col in 0..self.cols {
                let i = (row * self.cols + col) as usize;
                let rect = self.tile_rect(col, row);
                if rect.is_empty() {
                    continue;
                }
                if previous.len() != self.hashes.len() || previous[i] != self.hashes[i] {
                    tiles.push(rect);
                }
            }
        }
        tiles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctx_core::Color;

    fn two_squares(second: Color) -> Drawlist {
        let mut list = Drawlist::new(256);
        for cmd in [
            Command::Color(Color::RED),
            Command::Rectangle { x: 0.0, y: 0.0, width: 4.0, height: 4.0 },
            Command::Fill,
            Command::Color(second),
            Command::Rectangle { x: 20.0, y: 10.0, width: 4.0, height: 4.0 },
            Command::Fill,
        ] {
            list.append(&cmd).unwrap();
        }
        list
    }

    fn hasher() -> TileHasher {
        TileHasher::new(32, 16, 8, 4, &Capacities::standard())
    }

    #[test]
    fn test_identical_lists_hash_identically() {
        let mut a = hasher();
        let mut b = hasher();
        a.hash_drawlist(&two_squares(Color::BLUE));
        b.hash_drawlist(&two_squares(Color::BLUE));
        assert_eq!(a.hashes(), b.hashes());
        assert!(b.changed_tiles(a.hashes()).is_empty());
        assert_ne!(a.hash(0, 0), Some(0));
        assert_eq!(a.hash(7, 0), Some(0));
        assert_eq!(a.hash(8, 0), None);
    }

    #[test]
    fn test_change_dirties_only_touched_tiles() {
        let mut hasher = hasher();
        hasher.hash_drawlist(&two_squares(Color::BLUE));
        let before = hasher.hashes().to_vec();
        hasher.hash_drawlist(&two_squares(Color::GREEN));
        let changed = hasher.changed_tiles(&before);
        // Square 20..24 x 10..14 padded by one pixel spans columns 4..=6, rows 2..=3
        assert_eq!(changed.len(), 6);
        assert_eq!(hasher.hash(0, 0), Some(before[0]));
        assert!(changed.contains(&IntRect::new(20, 8, 24, 12)));
    }

    #[test]
    fn test_new_grid_reports_all_tiles() {
        let mut hasher = TileHasher::new(10, 10, 8, 4, &Capacities::standard());
        hasher.hash_drawlist(&Drawlist::new(4));
        // 2-pixel tiles only fill five of the eight columns
        assert_eq!(hasher.changed_tiles(&[]).len(), 5 * 4);
        assert!(hasher.tile_rect(7, 0).is_empty());
    }
}
