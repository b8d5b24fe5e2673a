//! Raw channel samples.
//!
//! Channel data services stream signed little-endian integers with no
//! header and no terminator; the reader must already know how many bytes
//! to expect.

use serde::{Deserialize, Serialize};

/// Width of one sample on the wire.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SampleWidth {
    /// 16-bit samples
    #[default]
    Short,
    /// 32-bit samples
    Long,
}

impl SampleWidth {
    /// Bytes per sample.
    pub const fn bytes(self) -> usize {
        match self {
            Self::Short => 2,
            Self::Long => 4,
        }
    }
}

impl TryFrom<usize> for SampleWidth {
    type Error = usize;

    fn try_from(bytes: usize) -> Result<Self, Self::Error> {
        match bytes {
            2 => Ok(Self::Short),
            4 => Ok(Self::Long),
            other => Err(other),
        }
    }
}

/// Decoded samples for one channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChannelBuffer {
    I16(Vec<i16>),
    I32(Vec<i32>),
}

impl ChannelBuffer {
    /// Decode the first `count` samples of `bytes`.
    ///
    /// Returns `None` if `bytes` holds fewer than `count` samples.
    pub fn decode(bytes: &[u8], width: SampleWidth, count: usize) -> Option<Self> {
        let needed = count.checked_mul(width.bytes())?;
        let bytes = bytes.get(..needed)?;
        let buf = match width {
            SampleWidth::Short => Self::I16(
                bytes
                    .chunks_exact(2)
                    .map(|b| i16::from_le_bytes([b[0], b[1]]))
                    .collect(),
            ),
            SampleWidth::Long => Self::I32(
                bytes
                    .chunks_exact(4)
                    .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                    .collect(),
            ),
        };
        Some(buf)
    }

    pub fn width(&self) -> SampleWidth {
        match self {
            Self::I16(_) => SampleWidth::Short,
            Self::I32(_) => SampleWidth::Long,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::I16(v) => v.len(),
            Self::I32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sample `i`, widened.
    pub fn get(&self, i: usize) -> Option<i32> {
        match self {
            Self::I16(v) => v.get(i).map(|&x| x as i32),
            Self::I32(v) => v.get(i).copied(),
        }
    }

    /// All samples, widened.
    pub fn iter(&self) -> Box<dyn Iterator<Item = i32> + '_> {
        match self {
            Self::I16(v) => Box::new(v.iter().map(|&x| x as i32)),
            Self::I32(v) => Box::new(v.iter().copied()),
        }
    }

    /// Re-encode as the wire representation.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        match self {
            Self::I16(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            Self::I32(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        }
    }
}
