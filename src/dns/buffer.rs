//! low level byte buffer for assembling canonical wire-format records

use derive_more::{Display, Error};

#[derive(Debug, Display, Error)]
pub enum BufferError {
    EndOfBuffer,
    LabelTooLong,
    NameTooLong,
}

type Result<T> = std::result::Result<T, BufferError>;

/// `PacketBuffer` exposes the operations needed to assemble resource
/// records in canonical form: names are written lowercase and without
/// compression, as RFC 4034 requires for signing and digest input.
pub trait PacketBuffer {
    fn write(&mut self, val: u8) -> Result<()>;
    fn read_at(&self, pos: usize) -> Result<u8>;
    fn set(&mut self, pos: usize, val: u8) -> Result<()>;
    fn pos(&self) -> usize;

    fn write_u8(&mut self, val: u8) -> Result<()> {
        self.write(val)
    }

    fn write_u16(&mut self, val: u16) -> Result<()> {
        self.write((val >> 8) as u8)?;
        self.write((val & 0xFF) as u8)
    }

    fn write_u32(&mut self, val: u32) -> Result<()> {
        self.write_u16((val >> 16) as u16)?;
        self.write_u16((val & 0xFFFF) as u16)
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        for b in bytes {
            self.write(*b)?;
        }
        Ok(())
    }

    fn set_u16(&mut self, pos: usize, val: u16) -> Result<()> {
        self.set(pos, (val >> 8) as u8)?;
        self.set(pos + 1, (val & 0xFF) as u8)
    }

    /// Write a name in canonical wire form: lowercase labels, no
    /// compression pointers, terminated by the root label.
    fn write_qname(&mut self, qname: &str) -> Result<()> {
        let name = qname.trim_end_matches('.');
        if name.len() > 253 {
            return Err(BufferError::NameTooLong);
        }
        if !name.is_empty() {
            for label in name.split('.') {
                if label.len() > 0x3F {
                    return Err(BufferError::LabelTooLong);
                }
                self.write(label.len() as u8)?;
                for b in label.bytes() {
                    self.write(b.to_ascii_lowercase())?;
                }
            }
        }
        self.write(0)
    }
}

/// A growable buffer for serializing records of unknown size.
#[derive(Default)]
pub struct VectorPacketBuffer {
    pub buffer: Vec<u8>,
    pub pos: usize,
}

impl VectorPacketBuffer {
    pub fn new() -> VectorPacketBuffer {
        VectorPacketBuffer {
            buffer: Vec::new(),
            pos: 0,
        }
    }

    /// The bytes written so far.
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer[0..self.pos]
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }
}

impl PacketBuffer for VectorPacketBuffer {
    fn write(&mut self, val: u8) -> Result<()> {
        self.buffer.push(val);
        self.pos += 1;
        Ok(())
    }

    fn read_at(&self, pos: usize) -> Result<u8> {
        self.buffer.get(pos).copied().ok_or(BufferError::EndOfBuffer)
    }

    fn set(&mut self, pos: usize, val: u8) -> Result<()> {
        match self.buffer.get_mut(pos) {
            Some(slot) => {
                *slot = val;
                Ok(())
            }
            None => Err(BufferError::EndOfBuffer),
        }
    }

    fn pos(&self) -> usize {
        self.pos
    }
}
