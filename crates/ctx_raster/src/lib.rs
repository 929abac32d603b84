//! ctx raster
//!
//! Software rasterization for the ctx pipeline:
//!
//! - **Rasterizer**: edge table and antialiased scanline sweep with
//!   non-zero and even-odd fill rules
//! - **Stroker**: joins, caps and dashes expanded to fillable polygons
//! - **Sampler**: solid, gradient and texture sources mapped back through
//!   the source transform
//! - **Compositor**: Porter-Duff operators and blend modes in a
//!   premultiplied RGBA8 working format, converted to and from every
//!   supported pixel format
//!
//! # Example
//!
//! ```rust
//! use ctx_core::{Antialias, Color, GraphicsState, PaintSource, PathSegment, PixelFormat, Point};
//! use ctx_raster::{NoTextures, Painter, PixelBuffer};
//!
//! let mut buffer = PixelBuffer::new(8, 8, PixelFormat::Rgba8).unwrap();
//! let mut state = GraphicsState::new(8, 8);
//! state.fill_source = PaintSource::Solid(Color::RED);
//!
//! let path = [
//!     PathSegment::MoveTo(Point::new(2.0, 2.0)),
//!     PathSegment::LineTo(Point::new(6.0, 2.0)),
//!     PathSegment::LineTo(Point::new(6.0, 6.0)),
//!     PathSegment::LineTo(Point::new(2.0, 6.0)),
//!     PathSegment::Close,
//! ];
//! let mut painter = Painter::new(1024, Antialias::Default, 4);
//! painter.fill(&mut buffer.view_mut(), &path, &state, &NoTextures);
//! assert_eq!(buffer.pixel(4, 4), [255, 0, 0, 255]);
//! ```

pub mod buffer;
pub mod composite;
pub mod edge;
pub mod error;
pub mod format;
pub mod gradient;
pub mod painter;
pub mod rasterizer;
pub mod sampler;
pub mod stroke;

pub use buffer::{PixelBuffer, TargetView};
pub use composite::{div255, premultiply, unpremultiply, CompositeOp, Rgba};
pub use edge::{Edge, EdgeTable};
pub use error::{RasterError, Result};
pub use format::{ops_for, PixelFormatOps};
pub use gradient::{GradientCache, GradientRamp};
pub use painter::Painter;
pub use rasterizer::{CoverageMask, Rasterizer, SpanSink};
pub use sampler::{NoTextures, Sampler, TextureLookup};
pub use stroke::{stroke_polygons, StrokeParams};
