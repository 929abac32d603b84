//! Command interpreter
//!
//! Applies logical commands to the state stack and path builder. Commands
//! that produce pixels come back as [`DrawOp`]s borrowing the interpreter's
//! path and state, for a rasterizer to execute.

use std::sync::Arc;

use crate::color::{Color, GradientStop};
use crate::config::Capacities;
use crate::drawlist::{Command, Drawlist};
use crate::error::Diagnostics;
use crate::format::PixelFormat;
use crate::geometry::{IntRect, Matrix, Point};
use crate::paint::{Gradient, GradientKind, PaintSource, SourceSpace};
use crate::path::{PathBuilder, PathSegment};
use crate::state::{GraphicsState, StateFlags, StateStack};

/// A pixel-producing operation
#[derive(Debug)]
pub enum DrawOp<'a> {
    Fill {
        path: &'a [PathSegment],
        state: &'a GraphicsState,
    },
    Stroke {
        path: &'a [PathSegment],
        state: &'a GraphicsState,
    },
    /// Fill the whole clip region
    Paint { state: &'a GraphicsState },
    DefineTexture {
        eid: &'a str,
        width: u32,
        height: u32,
        format: PixelFormat,
        stride: u32,
        data: &'a [u8],
    },
    Text {
        text: &'a str,
        /// Pen position, user space
        origin: Point,
        state: &'a GraphicsState,
    },
    Glyph {
        unichar: u32,
        stroke: bool,
        origin: Point,
        state: &'a GraphicsState,
    },
    SetPixel {
        x: u16,
        y: u16,
        rgba: [u8; 4],
    },
    StartFrame,
    EndFrame,
}

/// Depth marker returned by [`Interpreter::enter_protected`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[must_use]
pub struct ProtectedScope {
    depth: usize,
}

pub struct Interpreter {
    stack: StateStack,
    path: PathBuilder,
    /// Scratch path for rectangle shortcuts, leaves the current path alone
    scratch: PathBuilder,
    /// Path handed out by the last non-preserving fill/stroke
    taken: Vec<PathSegment>,
    preserve: bool,
    diagnostics: Diagnostics,
}

impl Interpreter {
    pub fn new(width: u32, height: u32, caps: &Capacities) -> Self {
        Self {
            stack: StateStack::new(width, height, caps),
            path: PathBuilder::new(caps.max_arc_segments),
            scratch: PathBuilder::new(caps.max_arc_segments),
            taken: Vec::new(),
            preserve: false,
            diagnostics: Diagnostics::default(),
        }
    }

    pub fn state(&self) -> &GraphicsState {
        self.stack.top()
    }

    pub fn stack(&self) -> &StateStack {
        &self.stack
    }

    pub fn stack_mut(&mut self) -> &mut StateStack {
        &mut self.stack
    }

    pub fn path(&self) -> &PathBuilder {
        &self.path
    }

    pub fn path_mut(&mut self) -> &mut PathBuilder {
        &mut self.path
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Diagnostics {
        std::mem::take(&mut self.diagnostics)
    }

    /// Back to the initial state with an empty path
    pub fn reset(&mut self) {
        self.stack.reset();
        self.path.reset();
        self.preserve = false;
    }

    /// Save and protect the current state so a foreign drawlist cannot
    /// restore past it
    pub fn enter_protected(&mut self) -> ProtectedScope {
        if let Err(err) = self.stack.save() {
            self.diagnostics.note_state(err);
        }
        let depth = self.stack.depth();
        self.stack.protect();
        ProtectedScope { depth }
    }

    /// Drop saves left open inside the scope and restore the protected state
    pub fn leave_protected(&mut self, scope: ProtectedScope) {
        self.stack.unprotect();
        while self.stack.depth() > scope.depth {
            if self.stack.restore().is_err() {
                break;
            }
        }
        if let Err(err) = self.stack.restore() {
            self.diagnostics.note_state(err);
        }
    }

    fn restore(&mut self) {
        if let Err(err) = self.stack.restore() {
            self.diagnostics.note_state(err);
        }
    }

    /// Consume the preserve flag; a non-preserved path moves to `taken`
    fn consume_path(&mut self) -> bool {
        let preserved = std::mem::take(&mut self.preserve);
        if !preserved {
            self.taken = self.path.take(false);
        }
        preserved
    }

    fn op_path(&self, preserved: bool) -> &[PathSegment] {
        if preserved {
            self.path.segments()
        } else {
            &self.taken
        }
    }

    fn set_gradient(&mut self, kind: GradientKind) {
        let gs = self.stack.top_mut();
        let space = SourceSpace::new(*gs.transform().matrix());
        gs.set_source(PaintSource::Gradient {
            gradient: Gradient::new(kind),
            space,
        });
    }

    /// Apply one command; pixel-producing commands return a [`DrawOp`]
    pub fn process<'a>(&'a mut self, cmd: &'a Command) -> Option<DrawOp<'a>> {
        tracing::trace!(?cmd, "process");
        let path = &mut self.path;
        let gs = self.stack.top();

        match cmd {
            Command::Nop => {}
            Command::MoveTo { x, y } => path.move_to(gs, *x, *y),
            Command::LineTo { x, y } => path.line_to(gs, *x, *y),
            Command::CurveTo { cx0, cy0, cx1, cy1, x, y } => path.curve_to(
                gs,
                Point::new(*cx0, *cy0),
                Point::new(*cx1, *cy1),
                Point::new(*x, *y),
            ),
            Command::QuadTo { cx, cy, x, y } => {
                path.quad_to(gs, Point::new(*cx, *cy), Point::new(*x, *y))
            }
            Command::SmoothTo { cx1, cy1, x, y } => {
                path.smooth_to(gs, Point::new(*cx1, *cy1), Point::new(*x, *y))
            }
            Command::SmoothQuadTo { x, y } => path.smooth_quad_to(gs, Point::new(*x, *y)),
            Command::RelMoveTo { x, y } => path.rel_move_to(gs, *x, *y),
            Command::RelLineTo { x, y } => path.rel_line_to(gs, *x, *y),
            Command::RelCurveTo { cx0, cy0, cx1, cy1, x, y } => path.rel_curve_to(
                gs,
                Point::new(*cx0, *cy0),
                Point::new(*cx1, *cy1),
                Point::new(*x, *y),
            ),
            Command::RelQuadTo { cx, cy, x, y } => {
                path.rel_quad_to(gs, Point::new(*cx, *cy), Point::new(*x, *y))
            }
            Command::RelSmoothTo { cx1, cy1, x, y } => {
                path.rel_smooth_to(gs, Point::new(*cx1, *cy1), Point::new(*x, *y))
            }
            Command::RelSmoothQuadTo { x, y } => path.rel_smooth_quad_to(gs, Point::new(*x, *y)),
            Command::HorLineTo(x) => path.hor_line_to(gs, *x),
            Command::VerLineTo(y) => path.ver_line_to(gs, *y),
            Command::RelHorLineTo(dx) => {
                let x = path.current_point().unwrap_or_default().x + dx;
                path.hor_line_to(gs, x)
            }
            Command::RelVerLineTo(dy) => {
                let y = path.current_point().unwrap_or_default().y + dy;
                path.ver_line_to(gs, y)
            }
            Command::ArcTo { x1, y1, x2, y2, radius } => {
                path.arc_to(gs, Point::new(*x1, *y1), Point::new(*x2, *y2), *radius)
            }
            Command::RelArcTo { x1, y1, x2, y2, radius } => {
                path.rel_arc_to(gs, Point::new(*x1, *y1), Point::new(*x2, *y2), *radius)
            }
            Command::Arc { x, y, radius, angle1, angle2, anticlockwise } => {
                path.arc(gs, *x, *y, *radius, *angle1, *angle2, *anticlockwise)
            }
            Command::Rectangle { x, y, width, height } => {
                path.rectangle(gs, *x, *y, *width, *height)
            }
            Command::RoundRectangle { x, y, width, height, radius } => {
                path.round_rectangle(gs, *x, *y, *width, *height, *radius)
            }
            Command::ClosePath => path.close(),
            Command::ResetPath => path.reset(),

            Command::Preserve => self.preserve = true,
            Command::Fill => {
                let preserved = self.consume_path();
                return Some(DrawOp::Fill {
                    path: self.op_path(preserved),
                    state: self.stack.top(),
                });
            }
            Command::Stroke => {
                let preserved = self.consume_path();
                return Some(DrawOp::Stroke {
                    path: self.op_path(preserved),
                    state: self.stack.top(),
                });
            }
            Command::Clip => {
                let bounds = self.path.extents().map(|r| IntRect::covering(&r));
                self.consume_path();
                self.stack
                    .top_mut()
                    .clip_to(bounds.unwrap_or(IntRect::EMPTY));
            }
            Command::Paint => {
                return Some(DrawOp::Paint {
                    state: self.stack.top(),
                })
            }
            Command::FillRect { x, y, width, height } | Command::StrokeRect { x, y, width, height } => {
                self.scratch.reset();
                self.scratch
                    .rectangle(self.stack.top(), *x, *y, *width, *height);
                let path = self.scratch.segments();
                let state = self.stack.top();
                return Some(if matches!(cmd, Command::FillRect { .. }) {
                    DrawOp::Fill { path, state }
                } else {
                    DrawOp::Stroke { path, state }
                });
            }

            Command::Save => {
                if let Err(err) = self.stack.save() {
                    self.diagnostics.note_state(err);
                }
            }
            Command::Restore => self.restore(),
            Command::StartFrame => {
                self.reset();
                return Some(DrawOp::StartFrame);
            }
            Command::EndFrame => return Some(DrawOp::EndFrame),

            Command::Identity => self.stack.top_mut().set_transform(Matrix::IDENTITY),
            Command::Translate { x, y } => self
                .stack
                .top_mut()
                .apply_transform(&Matrix::translation(*x, *y)),
            Command::Scale { x, y } => self
                .stack
                .top_mut()
                .apply_transform(&Matrix::scaling(*x, *y)),
            Command::Rotate(angle) => self
                .stack
                .top_mut()
                .apply_transform(&Matrix::rotation(*angle)),
            Command::ApplyTransform(m) => self
                .stack
                .top_mut()
                .apply_transform(&Matrix::from_array(*m)),
            Command::SourceTransform(m) => {
                if let Some(space) = self.stack.top_mut().last_source_mut().space_mut() {
                    space.set_source_transform(Matrix::from_array(*m));
                }
            }

            Command::StrokeSource => self
                .stack
                .top_mut()
                .flags
                .set(StateFlags::STROKE_SOURCE_PENDING, true),
            Command::Color(c) => self.stack.top_mut().set_source(PaintSource::Solid(*c)),
            Command::Rgba8(rgba) => self
                .stack
                .top_mut()
                .set_source(PaintSource::Solid(Color::from_rgba8(*rgba))),
            Command::LinearGradient { x0, y0, x1, y1 } => self.set_gradient(GradientKind::Linear {
                x0: *x0,
                y0: *y0,
                x1: *x1,
                y1: *y1,
            }),
            Command::RadialGradient { x0, y0, r0, x1, y1, r1 } => {
                self.set_gradient(GradientKind::Radial {
                    x0: *x0,
                    y0: *y0,
                    r0: *r0,
                    x1: *x1,
                    y1: *y1,
                    r1: *r1,
                })
            }
            Command::ConicGradient { x, y, start_angle, cycles } => {
                self.set_gradient(GradientKind::Conic {
                    x: *x,
                    y: *y,
                    start_angle: *start_angle,
                    cycles: *cycles,
                })
            }
            Command::GradientStop { offset, color } => {
                match self.stack.top_mut().last_source_mut() {
                    PaintSource::Gradient { gradient, .. } => {
                        gradient.add_stop(GradientStop::new(*offset, *color))
                    }
                    _ => tracing::debug!("gradient stop without a gradient source ignored"),
                }
            }
            Command::Texture { eid, x, y } => {
                let gs = self.stack.top_mut();
                let user = gs.transform().matrix().multiply(&Matrix::translation(*x, *y));
                gs.set_source(PaintSource::Texture {
                    eid: Arc::from(eid.as_str()),
                    space: SourceSpace::new(user),
                });
            }
            Command::DefineTexture { eid, width, height, format, stride, data } => {
                return Some(DrawOp::DefineTexture {
                    eid,
                    width: *width,
                    height: *height,
                    format: *format,
                    stride: *stride,
                    data,
                })
            }

            Command::Text(text) => {
                return Some(DrawOp::Text {
                    text,
                    origin: self.path.current_point().unwrap_or_default(),
                    state: self.stack.top(),
                })
            }
            Command::Glyph { unichar, stroke } => {
                return Some(DrawOp::Glyph {
                    unichar: *unichar,
                    stroke: *stroke,
                    origin: self.path.current_point().unwrap_or_default(),
                    state: self.stack.top(),
                })
            }
            Command::SetPixel { x, y, rgba } => {
                return Some(DrawOp::SetPixel {
                    x: *x,
                    y: *y,
                    rgba: *rgba,
                })
            }

            Command::LineDash(dashes) => self.stack.top_mut().line.set_dashes(dashes),
            Command::FillRule(v) => self.stack.top_mut().fill_rule = *v,
            Command::BlendMode(v) => self.stack.top_mut().blend = *v,
            Command::MiterLimit(v) => self.stack.top_mut().line.miter_limit = *v,
            Command::LineJoin(v) => self.stack.top_mut().line.join = *v,
            Command::LineCap(v) => self.stack.top_mut().line.cap = *v,
            Command::LineWidth(v) => self.stack.top_mut().line.width = *v,
            Command::GlobalAlpha(v) => self.stack.top_mut().set_global_alpha(*v),
            Command::Compositing(v) => self.stack.top_mut().compositing = *v,
            Command::FontSize(v) => self.stack.top_mut().font_size = *v,
            Command::ImageSmoothing(v) => self
                .stack
                .top_mut()
                .flags
                .set(StateFlags::IMAGE_SMOOTHING, *v),
            Command::LineDashOffset(v) => self.stack.top_mut().line.dash_offset = *v,
            Command::Extend(v) => self.stack.top_mut().extend = *v,
        }
        None
    }

    /// Interpret a whole drawlist, handing every draw op to `f`.
    ///
    /// A malformed record ends the walk; state applied so far is kept.
    pub fn run(&mut self, list: &Drawlist, mut f: impl FnMut(DrawOp<'_>)) {
        let mut iter = list.iter();
        for cmd in iter.by_ref() {
            if let Some(op) = self.process(&cmd) {
                f(op);
            }
        }
        if iter.error().is_some() {
            self.diagnostics.malformed_stream = true;
        }
        if list.overflowed() {
            self.diagnostics.drawlist_overflow = true;
        }
    }
}
