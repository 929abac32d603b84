//! ctx core
//!
//! This crate provides the protocol and state half of the ctx vector
//! graphics pipeline:
//!
//! - **Drawlist**: append-only stream of 9-byte records, with a lazy
//!   iterator, packed encodings and an equivalent text form
//! - **Graphics State**: bounded save/restore stack carrying transform, clip,
//!   paint sources, line style and a save-scoped key/value store
//! - **Path Interpreter**: resolves relative, shorthand and arc commands into
//!   device-space segments
//! - **Interpreter**: drives state and path from commands and yields the
//!   pixel-producing [`DrawOp`]s a rasterizer executes
//!
//! # Example
//!
//! ```rust
//! use ctx_core::{Capacities, Command, DrawOp, Drawlist, Interpreter};
//!
//! let mut list = Drawlist::new(1024);
//! list.append(&Command::Rectangle { x: 1.0, y: 1.0, width: 8.0, height: 8.0 }).unwrap();
//! list.append(&Command::Fill).unwrap();
//!
//! let mut interp = Interpreter::new(16, 16, &Capacities::standard());
//! let mut fills = 0;
//! interp.run(&list, |op| {
//!     if let DrawOp::Fill { path, .. } = op {
//!         assert_eq!(path.len(), 5);
//!         fills += 1;
//!     }
//! });
//! assert_eq!(fills, 1);
//! ```

pub mod color;
pub mod config;
pub mod drawlist;
pub mod error;
pub mod format;
pub mod geometry;
pub mod interp;
pub mod paint;
pub mod path;
pub mod state;
pub mod style;

pub use color::{Color, GradientStop};
pub use config::Capacities;
pub use drawlist::{Command, Drawlist, DrawlistIter, Opcode, Record};
pub use error::{Diagnostics, DrawlistError, StateError};
pub use format::PixelFormat;
pub use geometry::{IntRect, Matrix, Point, Rect};
pub use interp::{DrawOp, Interpreter, ProtectedScope};
pub use paint::{Gradient, GradientKind, PaintSource, SourceSpace};
pub use path::{PathBuilder, PathSegment, PathState};
pub use state::{
    strhash, FixedMatrix, GraphicsState, LineStyle, StateFlags, StateStack, Transform,
    TransformClass,
};
pub use style::{Antialias, BlendMode, CompositingMode, Extend, FillRule, LineCap, LineJoin};
