//! Texture cache
//!
//! Textures are pixel buffers keyed by an eid string. Each use stamps the
//! buffer with the texture clock, which advances once per frame. Eviction
//! is least-recently-used by frame and only runs between frames, so a
//! buffer referenced by the frame being rendered is never dropped.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use ctx_core::PixelFormat;
use ctx_raster::{PixelBuffer, TextureLookup};
use lru::LruCache;
use rustc_hash::FxHasher;

/// Eid derived from texture contents, used when the host supplies none
pub fn content_eid(width: u32, height: u32, format: PixelFormat, stride: u32, data: &[u8]) -> String {
    let mut hasher = FxHasher::default();
    (width, height, format, stride).hash(&mut hasher);
    data.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// Slot-bounded store of textures by eid
pub struct TextureCache {
    textures: LruCache<Arc<str>, PixelBuffer>,
    slots: usize,
    clock: u64,
    evictions: u64,
}

impl TextureCache {
    pub fn new(slots: usize) -> Self {
        Self {
            textures: LruCache::unbounded(),
            slots: slots.max(1),
            clock: 0,
            evictions: 0,
        }
    }

    /// Current texture clock
    pub fn clock(&self) -> u64 {
        self.clock
    }

    /// Override the texture clock, e.g. to share one clock between contexts
    pub fn set_clock(&mut self, frame: u64) {
        self.clock = frame;
    }

    /// Start a new frame on the texture clock
    pub fn advance_clock(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Store a texture, or refresh the use stamp of an already defined eid.
    ///
    /// Only the first `stride * height` bytes of `data` are kept.
    pub fn define(
        &mut self,
        eid: &str,
        width: u32,
        height: u32,
        format: PixelFormat,
        stride: u32,
        data: &[u8],
    ) -> ctx_raster::Result<Arc<str>> {
        if let Some(buffer) = self.textures.get_mut(eid) {
            buffer.touch(self.clock);
            if let Some(key) = buffer.eid() {
                return Ok(key.clone());
            }
        }
        let needed = (stride as usize * height as usize).min(data.len());
        let mut buffer =
            PixelBuffer::from_data(width, height, format, stride as usize, data[..needed].to_vec())?;
        let eid: Arc<str> = Arc::from(eid);
        let repaired = buffer.clamp_to_alpha();
        if repaired > 0 {
            tracing::warn!(%eid, repaired, "texture had color channels above alpha, clamped to premultiplied");
        }
        buffer.set_eid(eid.clone());
        buffer.touch(self.clock);
        tracing::debug!(%eid, width, height, ?format, "texture defined");
        self.textures.put(eid.clone(), buffer);
        Ok(eid)
    }

    /// Mark a texture used by the current frame. Returns false if unknown.
    pub fn touch(&mut self, eid: &str) -> bool {
        match self.textures.get_mut(eid) {
            Some(buffer) => {
                buffer.touch(self.clock);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, eid: &str) -> Option<&PixelBuffer> {
        self.textures.peek(eid)
    }

    pub fn contains(&self, eid: &str) -> bool {
        self.textures.contains(eid)
    }

    /// Forget a texture. Returns whether it was present.
    pub fn drop_eid(&mut self, eid: &str) -> bool {
        self.textures.pop(eid).is_some()
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    pub fn slots(&self) -> usize {
        self.slots
    }

    /// Textures evicted since creation
    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    /// Drop least recently used textures until the slot budget holds.
    /// Textures used on the current clock are kept even over budget.
    pub fn evict(&mut self) {
        while self.textures.len() > self.slots {
            let Some((_, lru)) = self.textures.peek_lru() else {
                break;
            };
            if lru.last_used_frame() >= self.clock {
                tracing::warn!(
                    slots = self.slots,
                    in_use = self.textures.len(),
                    "texture slots exceeded by textures in use this frame"
                );
                break;
            }
            if let Some((eid, _)) = self.textures.pop_lru() {
                tracing::debug!(%eid, "texture evicted");
                self.evictions += 1;
            }
        }
    }

    pub fn clear(&mut self) {
        self.textures.clear();
    }
}

impl TextureLookup for TextureCache {
    fn texture(&self, eid: &str) -> Option<&PixelBuffer> {
        self.get(eid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn define(cache: &mut TextureCache, eid: &str) {
        cache.define(eid, 2, 2, PixelFormat::Rgba8, 8, &[255; 16]).unwrap();
    }

    #[test]
    fn test_content_eid_is_stable() {
        let a = content_eid(2, 2, PixelFormat::Rgba8, 8, &[1; 16]);
        assert_eq!(a, content_eid(2, 2, PixelFormat::Rgba8, 8, &[1; 16]));
        assert_ne!(a, content_eid(2, 2, PixelFormat::Rgba8, 8, &[2; 16]));
        assert_ne!(a, content_eid(4, 1, PixelFormat::Rgba8, 16, &[1; 16]));
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn test_define_existing_eid_keeps_pixels() {
        let mut cache = TextureCache::new(4);
        define(&mut cache, "a");
        cache.define("a", 1, 1, PixelFormat::Gray8, 1, &[0]).unwrap();
        assert_eq!(cache.get("a").unwrap().width(), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_straight_alpha_texels_clamped_on_define() {
        let mut cache = TextureCache::new(4);
        cache
            .define("straight", 2, 1, PixelFormat::Rgba8, 8, &[255, 255, 255, 128, 0, 64, 0, 64])
            .unwrap();
        let texture = cache.get("straight").unwrap();
        assert_eq!(texture.pixel(0, 0), [128, 128, 128, 128]);
        assert_eq!(texture.pixel(1, 0), [0, 64, 0, 64]);
    }

    #[test]
    fn test_invalid_texture_rejected() {
        let mut cache = TextureCache::new(4);
        assert!(cache.define("bad", 4, 4, PixelFormat::Rgba8, 16, &[0; 8]).is_err());
        assert!(!cache.contains("bad"));
    }

    #[test]
    fn test_lru_by_frame_eviction() {
        let mut cache = TextureCache::new(2);
        cache.advance_clock();
        define(&mut cache, "a");
        define(&mut cache, "b");
        cache.advance_clock();
        define(&mut cache, "c");
        assert!(cache.touch("a"));
        cache.evict();
        assert_eq!(cache.len(), 2);
        assert!(cache.contains("a"));
        assert!(!cache.contains("b"));
        assert_eq!(cache.evictions(), 1);
    }

    #[test]
    fn test_textures_in_use_survive_over_budget() {
        let mut cache = TextureCache::new(1);
        cache.advance_clock();
        define(&mut cache, "a");
        define(&mut cache, "b");
        cache.evict();
        assert_eq!(cache.len(), 2);
        cache.advance_clock();
        cache.touch("b");
        cache.evict();
        assert!(!cache.contains("a"));
        assert!(cache.contains("b"));
    }

    #[test]
    fn test_drop_eid() {
        let mut cache = TextureCache::new(2);
        define(&mut cache, "a");
        assert!(cache.drop_eid("a"));
        assert!(!cache.drop_eid("a"));
        assert!(cache.texture("a").is_none());
    }
}
