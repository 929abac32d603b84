//! Drawlist iteration
//!
//! Walks records, reassembles continuation and data records into logical
//! commands and expands packed records. A malformed record ends iteration;
//! the error stays available through [`DrawlistIter::error`].

use smallvec::SmallVec;

use super::command::{float_arity, float_records, from_floats, Command, DashArray};
use super::opcode::Opcode;
use super::record::{Record, PAYLOAD_SIZE};
use super::PACK_UNIT;
use crate::error::DrawlistError;
use crate::format::PixelFormat;
use crate::style::{BlendMode, CompositingMode, Extend, FillRule, LineCap, LineJoin};

/// Lazy, restartable iterator over the logical commands of a record slice
#[derive(Clone, Debug)]
pub struct DrawlistIter<'a> {
    records: &'a [Record],
    pos: usize,
    /// Expanded commands of a packed record, stored in reverse order
    pending: SmallVec<[Command; 4]>,
    error: Option<DrawlistError>,
}

impl<'a> DrawlistIter<'a> {
    pub fn new(records: &'a [Record], start: usize) -> Self {
        Self {
            records,
            pos: start.min(records.len()),
            pending: SmallVec::new(),
            error: None,
        }
    }

    /// Record index of the next command boundary
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Error that stopped iteration early, if any
    pub fn error(&self) -> Option<&DrawlistError> {
        self.error.as_ref()
    }

    fn fail(&mut self, err: DrawlistError) -> Option<Command> {
        tracing::warn!("drawlist iteration stopped: {err}");
        self.error = Some(err);
        self.pos = self.records.len();
        None
    }

    fn truncated(&mut self, offset: usize, code: u8) -> Option<Command> {
        self.fail(DrawlistError::Truncated { offset, code })
    }

    /// Continuation records `first..first+count`, all tagged `Cont`
    fn continuations(&self, first: usize, count: usize) -> Option<&'a [Record]> {
        let recs = self.records.get(first..first + count)?;
        recs.iter()
            .all(|r| r.code == Opcode::Cont.code())
            .then_some(recs)
    }

    /// Read a data block at `at`, returning its bytes and records consumed
    fn data_block(&self, at: usize) -> Option<(Vec<u8>, usize)> {
        let head = self.records.get(at)?;
        if head.code != Opcode::Data.code() {
            return None;
        }
        let len = head.u32(0) as usize;
        let blocks = head.u32(1) as usize;
        if blocks * PAYLOAD_SIZE < len {
            return None;
        }
        let body = self.continuations(at + 1, blocks)?;
        let mut bytes = Vec::with_capacity(blocks * PAYLOAD_SIZE);
        for rec in body {
            bytes.extend_from_slice(&rec.data);
        }
        bytes.truncate(len);
        Some((bytes, 1 + blocks))
    }

    fn data_string(&self, at: usize) -> Option<(String, usize)> {
        let (bytes, used) = self.data_block(at)?;
        String::from_utf8(bytes).ok().map(|s| (s, used))
    }

    fn decode(&mut self) -> Option<Command> {
        let at = self.pos;
        let head = self.records[at];
        let Some(op) = Opcode::from_u8(head.code) else {
            return self.fail(DrawlistError::UnknownOpcode {
                offset: at,
                code: head.code,
            });
        };

        if let Some(n) = float_arity(op) {
            let count = float_records(n);
            let Some(rest) = self.continuations(at + 1, count - 1) else {
                return self.truncated(at, head.code);
            };
            let mut args: SmallVec<[f32; 10]> = SmallVec::new();
            args.push(head.f32(0));
            args.push(head.f32(1));
            for rec in rest {
                args.push(rec.f32(0));
                args.push(rec.f32(1));
            }
            self.pos = at + count;
            return from_floats(op, &args[..n]);
        }

        let setter = |v: u32| -> Option<Command> {
            Some(match op {
                Opcode::FillRule => Command::FillRule(FillRule::from_u32(v)?),
                Opcode::BlendMode => Command::BlendMode(BlendMode::from_u32(v)?),
                Opcode::LineJoin => Command::LineJoin(LineJoin::from_u32(v)?),
                Opcode::LineCap => Command::LineCap(LineCap::from_u32(v)?),
                Opcode::Compositing => Command::Compositing(CompositingMode::from_u32(v)?),
                Opcode::Extend => Command::Extend(Extend::from_u32(v)?),
                Opcode::ImageSmoothing => Command::ImageSmoothing(v != 0),
                _ => return None,
            })
        };
        if let Some(cmd) = setter(head.u32(0)) {
            self.pos = at + 1;
            return Some(cmd);
        }

        let unit = |v: f32| v / PACK_UNIT;
        match op {
            Opcode::Rgba8 => {
                self.pos = at + 1;
                Some(Command::Rgba8([head.data[0], head.data[1], head.data[2], head.data[3]]))
            }
            Opcode::Glyph => {
                self.pos = at + 1;
                Some(Command::Glyph {
                    unichar: head.u32(0),
                    stroke: head.u32(1) != 0,
                })
            }
            Opcode::SetPixel => {
                self.pos = at + 1;
                let d = head.data;
                Some(Command::SetPixel {
                    x: u16::from_le_bytes([d[4], d[5]]),
                    y: u16::from_le_bytes([d[6], d[7]]),
                    rgba: [d[0], d[1], d[2], d[3]],
                })
            }
            Opcode::Text => match self.data_string(at + 1) {
                Some((text, used)) => {
                    self.pos = at + 1 + used;
                    Some(Command::Text(text))
                }
                None => self.truncated(at, head.code),
            },
            Opcode::Texture => match self.data_string(at + 1) {
                Some((eid, used)) => {
                    self.pos = at + 1 + used;
                    Some(Command::Texture {
                        eid,
                        x: head.f32(0),
                        y: head.f32(1),
                    })
                }
                None => self.truncated(at, head.code),
            },
            Opcode::DefineTexture => {
                let Some(meta) = self.continuations(at + 1, 1).map(|r| r[0]) else {
                    return self.truncated(at, head.code);
                };
                let Some(format) = PixelFormat::from_u32(meta.u32(0)) else {
                    return self.truncated(at, head.code);
                };
                let Some((eid, eid_used)) = self.data_string(at + 2) else {
                    return self.truncated(at, head.code);
                };
                let Some((data, data_used)) = self.data_block(at + 2 + eid_used) else {
                    return self.truncated(at, head.code);
                };
                self.pos = at + 2 + eid_used + data_used;
                Some(Command::DefineTexture {
                    eid,
                    width: head.u32(0),
                    height: head.u32(1),
                    format,
                    stride: meta.u32(1),
                    data,
                })
            }
            Opcode::LineDash => {
                let count = head.u32(0) as usize;
                let Some(rest) = self.continuations(at + 1, count.div_ceil(2)) else {
                    return self.truncated(at, head.code);
                };
                let mut dashes = DashArray::new();
                for rec in rest {
                    dashes.push(rec.f32(0));
                    dashes.push(rec.f32(1));
                }
                dashes.truncate(count);
                self.pos = at + 1 + rest.len();
                Some(Command::LineDash(dashes))
            }
            Opcode::RelLineToX4 => {
                self.pos = at + 1;
                for i in (0..4).rev() {
                    self.pending.push(Command::RelLineTo {
                        x: unit(head.i8(i * 2) as f32),
                        y: unit(head.i8(i * 2 + 1) as f32),
                    });
                }
                self.pending.pop()
            }
            Opcode::RelLineToX2 => {
                self.pos = at + 1;
                self.pending.push(Command::RelLineTo {
                    x: unit(head.i16(2) as f32),
                    y: unit(head.i16(3) as f32),
                });
                Some(Command::RelLineTo {
                    x: unit(head.i16(0) as f32),
                    y: unit(head.i16(1) as f32),
                })
            }
            Opcode::MoveToRelLineTo => {
                self.pos = at + 1;
                self.pending.push(Command::RelLineTo {
                    x: unit(head.i16(2) as f32),
                    y: unit(head.i16(3) as f32),
                });
                Some(Command::MoveTo {
                    x: unit(head.i16(0) as f32),
                    y: unit(head.i16(1) as f32),
                })
            }
            Opcode::RelLineToRelMoveTo => {
                self.pos = at + 1;
                self.pending.push(Command::RelMoveTo {
                    x: unit(head.i16(2) as f32),
                    y: unit(head.i16(3) as f32),
                });
                Some(Command::RelLineTo {
                    x: unit(head.i16(0) as f32),
                    y: unit(head.i16(1) as f32),
                })
            }
            Opcode::FillMoveTo => {
                self.pos = at + 1;
                self.pending.push(Command::MoveTo {
                    x: head.f32(0),
                    y: head.f32(1),
                });
                Some(Command::Fill)
            }
            Opcode::RelQuadToS16 => {
                self.pos = at + 1;
                Some(Command::RelQuadTo {
                    cx: unit(head.i16(0) as f32),
                    cy: unit(head.i16(1) as f32),
                    x: unit(head.i16(2) as f32),
                    y: unit(head.i16(3) as f32),
                })
            }
            // A setter with an out-of-range value
            _ => self.fail(DrawlistError::UnknownOpcode {
                offset: at,
                code: head.code,
            }),
        }
    }

    /// Skip stray continuation and data records at a command boundary
    fn skip_stray(&mut self) {
        while let Some(rec) = self.records.get(self.pos) {
            if rec.code == Opcode::Cont.code() {
                self.pos += 1;
            } else if rec.code == Opcode::Data.code() {
                let blocks = rec.u32(1) as usize;
                self.pos = (self.pos + 1 + blocks).min(self.records.len());
            } else {
                break;
            }
        }
    }
}

impl Iterator for DrawlistIter<'_> {
    type Item = Command;

    fn next(&mut self) -> Option<Command> {
        if let Some(cmd) = self.pending.pop() {
            return Some(cmd);
        }
        self.skip_stray();
        if self.pos >= self.records.len() {
            return None;
        }
        self.decode()
    }
}
