//! Gradient color ramps
//!
//! Stop lists are rasterized once into a 256-entry straight-alpha RGBA8
//! lookup table. Lookups interpolate between adjacent entries with an
//! 8-bit fraction, so the ramp resolution does not show as banding.
//!
//! Ramps are shared through a small LRU keyed by a hash of the stop list,
//! which lets repeated gradients across frames skip rebuilding.

use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::Arc;

use ctx_core::{Color, GradientStop};
use lru::LruCache;
use rustc_hash::FxHasher;

/// Number of entries in a ramp
pub const RAMP_SIZE: usize = 256;

/// Rasterized stop list
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GradientRamp {
    entries: Box<[[u8; 4]; RAMP_SIZE]>,
}

impl GradientRamp {
    /// Rasterize `stops`. Stops are ordered by offset, keeping the original
    /// order of equal offsets, so coincident stops form a hard edge.
    pub fn from_stops(stops: &[GradientStop]) -> Self {
        let mut entries = Box::new([[0u8; 4]; RAMP_SIZE]);
        if stops.is_empty() {
            return Self { entries };
        }

        let mut sorted: Vec<GradientStop> = stops.to_vec();
        sorted.sort_by(|a, b| a.offset.total_cmp(&b.offset));

        for (i, entry) in entries.iter_mut().enumerate() {
            let t = i as f32 / (RAMP_SIZE - 1) as f32;
            *entry = sample_stops(&sorted, t).to_rgba8();
        }
        Self { entries }
    }

    pub fn entries(&self) -> &[[u8; 4]; RAMP_SIZE] {
        &self.entries
    }

    /// Straight-alpha color at `t`, clamped to 0..=1
    #[inline]
    pub fn lookup(&self, t: f32) -> [u8; 4] {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let pos = (t * ((RAMP_SIZE - 1) * 256) as f32) as u32;
        let index = (pos >> 8) as usize;
        let frac = pos & 0xff;
        if frac == 0 || index + 1 >= RAMP_SIZE {
            return self.entries[index.min(RAMP_SIZE - 1)];
        }

        let a = self.entries[index];
        let b = self.entries[index + 1];
        let mut out = [0u8; 4];
        for c in 0..4 {
            out[c] = ((a[c] as u32 * (256 - frac) + b[c] as u32 * frac + 128) >> 8) as u8;
        }
        out
    }
}

/// Color of a sorted stop list at `t`
fn sample_stops(stops: &[GradientStop], t: f32) -> Color {
    let first = &stops[0];
    let last = &stops[stops.len() - 1];
    if t <= first.offset {
        return first.color;
    }
    if t >= last.offset {
        return last.color;
    }

    for pair in stops.windows(2) {
        let (s0, s1) = (&pair[0], &pair[1]);
        if t >= s0.offset && t < s1.offset {
            let range = s1.offset - s0.offset;
            if range < 1e-6 {
                return s1.color;
            }
            return Color::lerp(&s0.color, &s1.color, (t - s0.offset) / range);
        }
    }
    last.color
}

/// Hash identifying a stop list
pub fn stops_key(stops: &[GradientStop]) -> u64 {
    let mut hasher = FxHasher::default();
    stops.len().hash(&mut hasher);
    for stop in stops {
        stop.offset.to_bits().hash(&mut hasher);
        for c in stop.color.to_array() {
            c.to_bits().hash(&mut hasher);
        }
    }
    hasher.finish()
}

/// LRU of rasterized ramps
pub struct GradientCache {
    ramps: LruCache<u64, Arc<GradientRamp>>,
    hits: u64,
    misses: u64,
}

impl GradientCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            ramps: LruCache::new(capacity),
            hits: 0,
            misses: 0,
        }
    }

    /// Ramp for `stops`, building it on a miss
    pub fn get(&mut self, stops: &[GradientStop]) -> Arc<GradientRamp> {
        let key = stops_key(stops);
        if let Some(ramp) = self.ramps.get(&key) {
            self.hits += 1;
            return ramp.clone();
        }

        self.misses += 1;
        tracing::trace!("Building gradient ramp for {} stops", stops.len());
        let ramp = Arc::new(GradientRamp::from_stops(stops));
        self.ramps.put(key, ramp.clone());
        ramp
    }

    pub fn len(&self) -> usize {
        self.ramps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ramps.is_empty()
    }

    /// (hits, misses) since creation
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }

    pub fn clear(&mut self) {
        self.ramps.clear();
    }
}
