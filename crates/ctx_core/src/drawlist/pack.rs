//! Compaction of common command sequences into single packed records

use super::opcode::Opcode;
use super::record::Record;
use super::{Command, Drawlist, PACK_UNIT};

// -0.0 has no packed form and keeps its full record

fn to_i8(v: f32) -> Option<i8> {
    let s = v * PACK_UNIT;
    let exact = s.fract() == 0.0 && !(s == 0.0 && s.is_sign_negative());
    (exact && s >= i8::MIN as f32 && s <= i8::MAX as f32).then_some(s as i8)
}

fn to_i16(v: f32) -> Option<i16> {
    let s = v * PACK_UNIT;
    let exact = s.fract() == 0.0 && !(s == 0.0 && s.is_sign_negative());
    (exact && s >= i16::MIN as f32 && s <= i16::MAX as f32).then_some(s as i16)
}

fn i16_quad(a: f32, b: f32, c: f32, d: f32) -> Option<[i16; 4]> {
    Some([to_i16(a)?, to_i16(b)?, to_i16(c)?, to_i16(d)?])
}

/// Pack a prefix of `cmds` into one record, returning commands consumed
fn pack_prefix(cmds: &[Command]) -> Option<(Record, usize)> {
    if let [Command::RelLineTo { x: x0, y: y0 }, Command::RelLineTo { x: x1, y: y1 }, Command::RelLineTo { x: x2, y: y2 }, Command::RelLineTo { x: x3, y: y3 }, ..] =
        cmds
    {
        let packed = (|| {
            Some([
                to_i8(*x0)?,
                to_i8(*y0)?,
                to_i8(*x1)?,
                to_i8(*y1)?,
                to_i8(*x2)?,
                to_i8(*y2)?,
                to_i8(*x3)?,
                to_i8(*y3)?,
            ])
        })();
        if let Some(v) = packed {
            return Some((Record::with_i8(Opcode::RelLineToX4.code(), v), 4));
        }
    }

    match cmds {
        [Command::RelLineTo { x: x0, y: y0 }, Command::RelLineTo { x: x1, y: y1 }, ..] => {
            let v = i16_quad(*x0, *y0, *x1, *y1)?;
            Some((Record::with_i16(Opcode::RelLineToX2.code(), v), 2))
        }
        [Command::MoveTo { x: x0, y: y0 }, Command::RelLineTo { x: x1, y: y1 }, ..] => {
            let v = i16_quad(*x0, *y0, *x1, *y1)?;
            Some((Record::with_i16(Opcode::MoveToRelLineTo.code(), v), 2))
        }
        [Command::RelLineTo { x: x0, y: y0 }, Command::RelMoveTo { x: x1, y: y1 }, ..] => {
            let v = i16_quad(*x0, *y0, *x1, *y1)?;
            Some((Record::with_i16(Opcode::RelLineToRelMoveTo.code(), v), 2))
        }
        [Command::Fill, Command::MoveTo { x, y }, ..] => {
            Some((Record::with_f32(Opcode::FillMoveTo.code(), *x, *y), 2))
        }
        [Command::RelQuadTo { cx, cy, x, y }, ..] => {
            let v = i16_quad(*cx, *cy, *x, *y)?;
            Some((Record::with_i16(Opcode::RelQuadToS16.code(), v), 1))
        }
        _ => None,
    }
}

impl Drawlist {
    /// Copy of this drawlist with packable sequences compacted.
    ///
    /// Only values exactly representable in 1/8 pixel units are packed, so
    /// iterating the packed list yields the same commands as the original.
    pub fn pack(&self) -> Drawlist {
        let cmds: Vec<Command> = self.iter().collect();
        let mut records = Vec::with_capacity(self.records.len());
        let mut i = 0;
        while i < cmds.len() {
            if let Some((record, used)) = pack_prefix(&cmds[i..]) {
                records.push(record);
                i += used;
            } else {
                records.extend(cmds[i].encode());
                i += 1;
            }
        }
        Drawlist {
            records,
            capacity: self.capacity,
            overflowed: self.overflowed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_preserves_commands() {
        let mut list = Drawlist::new(256);
        let cmds = [
            Command::MoveTo { x: 10.0, y: 10.0 },
            Command::RelLineTo { x: 5.0, y: 0.0 },
            Command::RelLineTo { x: 0.5, y: 0.25 },
            Command::RelLineTo { x: -1.0, y: 2.0 },
            Command::RelLineTo { x: 1.0, y: 1.0 },
            Command::RelLineTo { x: -3.0, y: 0.125 },
            Command::RelLineTo { x: 500.0, y: 0.0 },
            Command::RelMoveTo { x: 1.0, y: 1.0 },
            Command::RelQuadTo { cx: 1.0, cy: 2.0, x: 3.0, y: 4.0 },
            Command::ClosePath,
            Command::Fill,
            Command::MoveTo { x: 0.1, y: 0.2 },
            Command::RelLineTo { x: 0.1, y: 0.0 },
        ];
        for c in &cmds {
            list.append(c).unwrap();
        }
        let packed = list.pack();
        assert!(packed.len() < list.len());
        assert_eq!(packed.iter().collect::<Vec<_>>(), cmds.to_vec());
        assert!(packed.records().iter().any(|r| r.code == Opcode::RelLineToX4.code()));
        assert!(packed.records().iter().any(|r| r.code == Opcode::FillMoveTo.code()));
    }

    #[test]
    fn test_inexact_values_stay_unpacked() {
        let mut list = Drawlist::new(16);
        list.append(&Command::RelQuadTo { cx: 0.1, cy: 0.0, x: 1.0, y: 1.0 }).unwrap();
        assert_eq!(list.pack().as_bytes(), list.as_bytes());
    }

    #[test]
    fn test_negative_zero_survives_packing() {
        let mut list = Drawlist::new(64);
        for c in [
            Command::RelLineTo { x: -0.0, y: 1.0 },
            Command::RelLineTo { x: 1.0, y: 0.0 },
            Command::RelLineTo { x: 2.0, y: -0.0 },
            Command::RelLineTo { x: 1.0, y: 1.0 },
            Command::RelLineTo { x: 0.5, y: 0.5 },
        ] {
            list.append(&c).unwrap();
        }
        let mut expanded = Drawlist::new(64);
        for c in list.pack().iter() {
            expanded.append(&c).unwrap();
        }
        assert_eq!(expanded.as_bytes(), list.as_bytes());
    }
}
