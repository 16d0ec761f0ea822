// Bit-buffer packet codec. Each quantity packs into the fewest bits its
// declared min/max/precision needs; oversized payloads are zstd-compressed
// behind a header flag.

use crate::domain::ImpactKind;
use crate::interface_adapters::protocol::Packet;
use glam::Vec2;
use thiserror::Error;

/// Header bit 7 marks a zstd-compressed body.
const COMPRESSED_FLAG: u8 = 0x80;
const TAG_MASK: u8 = 0x7f;

/// Bodies below this size never win from compression.
const COMPRESS_MIN_BYTES: usize = 96;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("bit buffer exhausted")]
    OutOfBits,
    #[error("empty packet")]
    Empty,
    #[error("unknown packet tag {0}")]
    BadTag(u8),
    #[error("body decompression failed")]
    Decompress,
    #[error("malformed string payload")]
    BadString,
}

pub struct BitWriter {
    out: Vec<u8>,
    scratch: u8,
    used: u8,
}

impl BitWriter {
    pub fn new() -> Self {
        Self {
            out: Vec::new(),
            scratch: 0,
            used: 0,
        }
    }

    pub fn write_bit(&mut self, bit: bool) {
        if bit {
            self.scratch |= 1 << self.used;
        }
        self.used += 1;
        if self.used == 8 {
            self.out.push(self.scratch);
            self.scratch = 0;
            self.used = 0;
        }
    }

    /// Write the low `bits` bits of `value`, LSB first.
    pub fn write_bits(&mut self, value: u32, bits: u32) {
        debug_assert!(bits <= 32);
        for i in 0..bits {
            self.write_bit(value >> i & 1 != 0);
        }
    }

    pub fn finish(mut self) -> Vec<u8> {
        if self.used > 0 {
            self.out.push(self.scratch);
        }
        self.out
    }
}

impl Default for BitWriter {
    fn default() -> Self {
        Self::new()
    }
}

pub struct BitReader<'a> {
    data: &'a [u8],
    byte: usize,
    bit: u8,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            byte: 0,
            bit: 0,
        }
    }

    pub fn read_bit(&mut self) -> Result<bool, WireError> {
        let byte = *self.data.get(self.byte).ok_or(WireError::OutOfBits)?;
        let bit = byte >> self.bit & 1 != 0;
        self.bit += 1;
        if self.bit == 8 {
            self.bit = 0;
            self.byte += 1;
        }
        Ok(bit)
    }

    pub fn read_bits(&mut self, bits: u32) -> Result<u32, WireError> {
        debug_assert!(bits <= 32);
        let mut value = 0u32;
        for i in 0..bits {
            if self.read_bit()? {
                value |= 1 << i;
            }
        }
        Ok(value)
    }
}

/// Uniform quantizer over a declared [min, max] range.
#[derive(Debug, Clone, Copy)]
pub struct Quantizer {
    min: f32,
    max: f32,
    bits: u32,
}

impl Quantizer {
    pub const fn new(min: f32, max: f32, bits: u32) -> Self {
        Self { min, max, bits }
    }

    /// Worst-case reconstruction error.
    pub fn precision(&self) -> f32 {
        (self.max - self.min) / ((1u64 << self.bits) - 1) as f32
    }

    pub fn write(&self, w: &mut BitWriter, value: f32) {
        let clamped = value.clamp(self.min, self.max);
        let t = (clamped - self.min) / (self.max - self.min);
        let steps = ((1u64 << self.bits) - 1) as f32;
        w.write_bits((t * steps).round() as u32, self.bits);
    }

    pub fn read(&self, r: &mut BitReader) -> Result<f32, WireError> {
        let raw = r.read_bits(self.bits)?;
        let steps = ((1u64 << self.bits) - 1) as f32;
        Ok(self.min + (raw as f32 / steps) * (self.max - self.min))
    }
}

// Declared ranges. World positions reconstruct within 0.05 units.
pub const Q_WORLD_X: Quantizer = Quantizer::new(-4096.0, 4096.0, 18);
pub const Q_WORLD_Y: Quantizer = Quantizer::new(-256.0, 2048.0, 16);
pub const Q_VEL: Quantizer = Quantizer::new(-2048.0, 2048.0, 16);
pub const Q_ANGLE_DEG: Quantizer = Quantizer::new(0.0, 360.0, 12);
pub const Q_HEALTH: Quantizer = Quantizer::new(0.0, 1024.0, 10);
pub const Q_DEFLECTION: Quantizer = Quantizer::new(-1.0, 1.0, 8);
pub const Q_LOCAL_OFFSET: Quantizer = Quantizer::new(-64.0, 64.0, 12);
pub const Q_FRAME_DT_MS: Quantizer = Quantizer::new(0.0, 256.0, 10);

fn write_pos(w: &mut BitWriter, pos: Vec2) {
    Q_WORLD_X.write(w, pos.x);
    Q_WORLD_Y.write(w, pos.y);
}

fn read_pos(r: &mut BitReader) -> Result<Vec2, WireError> {
    Ok(Vec2::new(Q_WORLD_X.read(r)?, Q_WORLD_Y.read(r)?))
}

fn write_vel(w: &mut BitWriter, vel: Vec2) {
    Q_VEL.write(w, vel.x);
    Q_VEL.write(w, vel.y);
}

fn read_vel(r: &mut BitReader) -> Result<Vec2, WireError> {
    Ok(Vec2::new(Q_VEL.read(r)?, Q_VEL.read(r)?))
}

fn write_id(w: &mut BitWriter, id: u64) {
    debug_assert!(id <= u32::MAX as u64);
    w.write_bits(id as u32, 32);
}

fn read_id(r: &mut BitReader) -> Result<u64, WireError> {
    Ok(r.read_bits(32)? as u64)
}

fn write_t_ms(w: &mut BitWriter, t_ms: f64) {
    // Quarter-millisecond resolution in 32 bits spans a 12-day session.
    w.write_bits((t_ms * 4.0).round() as u32, 32);
}

fn read_t_ms(r: &mut BitReader) -> Result<f64, WireError> {
    Ok(r.read_bits(32)? as f64 / 4.0)
}

fn write_string(w: &mut BitWriter, text: &str) {
    let bytes = text.as_bytes();
    let len = bytes.len().min(255);
    w.write_bits(len as u32, 8);
    for b in &bytes[..len] {
        w.write_bits(*b as u32, 8);
    }
}

fn read_string(r: &mut BitReader) -> Result<String, WireError> {
    let len = r.read_bits(8)? as usize;
    let mut bytes = Vec::with_capacity(len);
    for _ in 0..len {
        bytes.push(r.read_bits(8)? as u8);
    }
    String::from_utf8(bytes).map_err(|_| WireError::BadString)
}

fn write_impact_kind(w: &mut BitWriter, kind: ImpactKind) {
    let raw = match kind {
        ImpactKind::Bullet => 0,
        ImpactKind::Missile => 1,
        ImpactKind::Splash => 2,
    };
    w.write_bits(raw, 2);
}

fn read_impact_kind(r: &mut BitReader) -> Result<ImpactKind, WireError> {
    match r.read_bits(2)? {
        0 => Ok(ImpactKind::Bullet),
        1 => Ok(ImpactKind::Missile),
        2 => Ok(ImpactKind::Splash),
        n => Err(WireError::BadTag(n as u8)),
    }
}

/// Pack a packet into header byte + bit-packed (possibly compressed) body.
pub fn encode(packet: &Packet) -> Vec<u8> {
    let mut w = BitWriter::new();
    match packet {
        Packet::Sync { peer, t_ms } => {
            w.write_bits(*peer, 32);
            write_t_ms(&mut w, *t_ms);
        }
        Packet::Identity { peer, plane, pos } => {
            w.write_bits(*peer, 32);
            write_id(&mut w, *plane);
            write_pos(&mut w, *pos);
        }
        Packet::PositionUpdate {
            id,
            pos,
            vel,
            rot_deg,
            deflection,
            dt_ms,
            t_ms,
        } => {
            write_id(&mut w, *id);
            write_pos(&mut w, *pos);
            write_vel(&mut w, *vel);
            Q_ANGLE_DEG.write(&mut w, *rot_deg);
            Q_DEFLECTION.write(&mut w, *deflection);
            Q_FRAME_DT_MS.write(&mut w, *dt_ms);
            write_t_ms(&mut w, *t_ms);
        }
        Packet::StatusUpdate { id, hp, alive } => {
            write_id(&mut w, *id);
            Q_HEALTH.write(&mut w, *hp as f32);
            w.write_bit(*alive);
        }
        Packet::SpawnBullet { id, owner, pos, vel }
        | Packet::SpawnDecoy { id, owner, pos, vel } => {
            write_id(&mut w, *id);
            write_id(&mut w, *owner);
            write_pos(&mut w, *pos);
            write_vel(&mut w, *vel);
        }
        Packet::SpawnMissile {
            id,
            owner,
            pos,
            vel,
            rot_deg,
        } => {
            write_id(&mut w, *id);
            write_id(&mut w, *owner);
            write_pos(&mut w, *pos);
            write_vel(&mut w, *vel);
            Q_ANGLE_DEG.write(&mut w, *rot_deg);
        }
        Packet::Expire { id } => {
            write_id(&mut w, *id);
        }
        Packet::Impact {
            target,
            kind,
            offset,
            angle_deg,
            damage,
            headshot,
        } => {
            write_id(&mut w, *target);
            write_impact_kind(&mut w, *kind);
            Q_LOCAL_OFFSET.write(&mut w, offset.x);
            Q_LOCAL_OFFSET.write(&mut w, offset.y);
            Q_ANGLE_DEG.write(&mut w, *angle_deg);
            Q_HEALTH.write(&mut w, *damage as f32);
            w.write_bit(*headshot);
        }
        Packet::Chat { peer, text } => {
            w.write_bits(*peer, 32);
            write_string(&mut w, text);
        }
        Packet::Input {
            thrust,
            turn,
            fire_gun,
            fire_missile,
            drop_decoy,
        } => {
            Q_DEFLECTION.write(&mut w, *thrust);
            Q_DEFLECTION.write(&mut w, *turn);
            w.write_bit(*fire_gun);
            w.write_bit(*fire_missile);
            w.write_bit(*drop_decoy);
        }
    }

    let body = w.finish();
    let mut header = packet.tag();
    let body = if body.len() >= COMPRESS_MIN_BYTES {
        match zstd::encode_all(&body[..], 1) {
            Ok(compressed) if compressed.len() < body.len() => {
                header |= COMPRESSED_FLAG;
                compressed
            }
            _ => body,
        }
    } else {
        body
    };

    let mut out = Vec::with_capacity(1 + body.len());
    out.push(header);
    out.extend_from_slice(&body);
    out
}

/// Decode one packet. Any failure means the caller treats the datagram as
/// lost; nothing here escalates into simulation state.
pub fn decode(bytes: &[u8]) -> Result<Packet, WireError> {
    let (&header, body) = bytes.split_first().ok_or(WireError::Empty)?;
    let tag = header & TAG_MASK;

    let decompressed;
    let body = if header & COMPRESSED_FLAG != 0 {
        decompressed = zstd::decode_all(body).map_err(|_| WireError::Decompress)?;
        &decompressed[..]
    } else {
        body
    };
    let mut r = BitReader::new(body);

    let packet = match tag {
        0 => Packet::Sync {
            peer: r.read_bits(32)?,
            t_ms: read_t_ms(&mut r)?,
        },
        1 => Packet::Identity {
            peer: r.read_bits(32)?,
            plane: read_id(&mut r)?,
            pos: read_pos(&mut r)?,
        },
        2 => Packet::PositionUpdate {
            id: read_id(&mut r)?,
            pos: read_pos(&mut r)?,
            vel: read_vel(&mut r)?,
            rot_deg: Q_ANGLE_DEG.read(&mut r)?,
            deflection: Q_DEFLECTION.read(&mut r)?,
            dt_ms: Q_FRAME_DT_MS.read(&mut r)?,
            t_ms: read_t_ms(&mut r)?,
        },
        3 => Packet::StatusUpdate {
            id: read_id(&mut r)?,
            hp: Q_HEALTH.read(&mut r)?.round() as i32,
            alive: r.read_bit()?,
        },
        4 => Packet::SpawnBullet {
            id: read_id(&mut r)?,
            owner: read_id(&mut r)?,
            pos: read_pos(&mut r)?,
            vel: read_vel(&mut r)?,
        },
        5 => Packet::SpawnMissile {
            id: read_id(&mut r)?,
            owner: read_id(&mut r)?,
            pos: read_pos(&mut r)?,
            vel: read_vel(&mut r)?,
            rot_deg: Q_ANGLE_DEG.read(&mut r)?,
        },
        6 => Packet::SpawnDecoy {
            id: read_id(&mut r)?,
            owner: read_id(&mut r)?,
            pos: read_pos(&mut r)?,
            vel: read_vel(&mut r)?,
        },
        7 => Packet::Expire {
            id: read_id(&mut r)?,
        },
        8 => Packet::Impact {
            target: read_id(&mut r)?,
            kind: read_impact_kind(&mut r)?,
            offset: Vec2::new(Q_LOCAL_OFFSET.read(&mut r)?, Q_LOCAL_OFFSET.read(&mut r)?),
            angle_deg: Q_ANGLE_DEG.read(&mut r)?,
            damage: Q_HEALTH.read(&mut r)?.round() as i32,
            headshot: r.read_bit()?,
        },
        9 => Packet::Chat {
            peer: r.read_bits(32)?,
            text: read_string(&mut r)?,
        },
        10 => Packet::Input {
            thrust: Q_DEFLECTION.read(&mut r)?,
            turn: Q_DEFLECTION.read(&mut r)?,
            fire_gun: r.read_bit()?,
            fire_missile: r.read_bit()?,
            drop_decoy: r.read_bit()?,
        },
        n => return Err(WireError::BadTag(n)),
    };
    Ok(packet)
}
