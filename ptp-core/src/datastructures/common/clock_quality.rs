use crate::datastructures::{WireFormat, WireFormatError};

use super::ClockAccuracy;

/// `clockQuality`, IEEE1588-2019 §7.6.2: class, accuracy and the scaled-log
/// variance advertised in `Announce` messages and held in Default-DS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClockQuality {
    pub clock_class: u8,
    pub clock_accuracy: ClockAccuracy,
    pub offset_scaled_log_variance: u16,
}

impl ClockQuality {
    /// A clock-class < 128 means the node is a legitimate grandmaster
    /// candidate (IEEE1588-2019 Table 5); a slave-only node advertises 255.
    pub fn is_master_candidate(&self) -> bool {
        self.clock_class < 128
    }
}

impl WireFormat for ClockQuality {
    fn wire_size(&self) -> usize {
        4
    }

    fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < 4 {
            return Err(WireFormatError::BufferTooShort);
        }
        buffer[0] = self.clock_class;
        buffer[1] = self.clock_accuracy.to_primitive();
        buffer[2..4].copy_from_slice(&self.offset_scaled_log_variance.to_be_bytes());
        Ok(())
    }

    fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        let buffer = buffer.get(0..4).ok_or(WireFormatError::BufferTooShort)?;
        Ok(Self {
            clock_class: buffer[0],
            clock_accuracy: ClockAccuracy::from_primitive(buffer[1]),
            offset_scaled_log_variance: u16::from_be_bytes(buffer[2..4].try_into().unwrap()),
        })
    }
}
