//! ctx render
//!
//! The host-facing half of the ctx pipeline:
//!
//! - **Context**: canvas-like drawing API recording into a drawlist, with a
//!   `start_frame`/`end_frame` lifecycle
//! - **Backends**: drawlist-only, immediate framebuffer, pixel callback with
//!   memory-budgeted chunks and tile-hash damage tracking, and a dedicated
//!   render thread
//! - **Renderer**: two-pass drawlist rendering, splitting the target into
//!   row bands rendered in parallel
//! - **Textures**: eid-keyed cache with a per-frame clock and LRU eviction
//! - **Collaborators**: font engine and event source traits
//!
//! # Example
//!
//! ```rust
//! use ctx_core::Color;
//! use ctx_render::{Context, RenderConfig};
//!
//! let config = RenderConfig::standard().with_size(32, 32);
//! let mut ctx = Context::new_framebuffer(&config).unwrap();
//!
//! ctx.start_frame();
//! ctx.color(Color::RED);
//! ctx.rectangle(4.0, 4.0, 8.0, 8.0);
//! ctx.fill();
//! let diagnostics = ctx.end_frame().unwrap();
//!
//! assert!(diagnostics.is_clean());
//! assert_eq!(ctx.framebuffer().pixel(6, 6), [255, 0, 0, 255]);
//! ```

pub mod backend;
pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod font;
pub mod hasher;
pub mod renderer;
pub mod texture;
pub mod thread;

pub use backend::{Backend, CallbackBackend, DrawlistBackend, FramebufferBackend, PixelSink};
pub use config::{RenderConfig, RenderFlags};
pub use context::Context;
pub use error::{RenderError, Result};
pub use event::{Event, EventQueue, EventSource, KeyKind, PointerKind};
pub use font::{layout_text, text_width, FontEngine, GlyphPath, GlyphSink};
pub use hasher::{TileHasher, TileList};
pub use renderer::Renderer;
pub use texture::{content_eid, TextureCache};
pub use thread::ThreadedBackend;
