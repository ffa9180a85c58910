use crate::{
    datastructures::{WireFormat, WireFormatError},
    time::Time,
};

/// The wire representation of a PTP timestamp: unsigned 48-bit seconds
/// (transmitted as 6 big-endian octets) plus unsigned 32-bit nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, PartialOrd, Ord)]
pub struct WireTimestamp {
    pub seconds: u64,
    pub nanos: u32,
}

impl WireFormat for WireTimestamp {
    fn wire_size(&self) -> usize {
        10
    }

    fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < 10 {
            return Err(WireFormatError::BufferTooShort);
        }
        buffer[0..6].copy_from_slice(&self.seconds.to_be_bytes()[2..8]);
        buffer[6..10].copy_from_slice(&self.nanos.to_be_bytes());
        Ok(())
    }

    fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        let buffer = buffer.get(0..10).ok_or(WireFormatError::BufferTooShort)?;
        let mut seconds_bytes = [0u8; 8];
        seconds_bytes[2..8].copy_from_slice(&buffer[0..6]);
        Ok(Self {
            seconds: u64::from_be_bytes(seconds_bytes),
            nanos: u32::from_be_bytes(buffer[6..10].try_into().unwrap()),
        })
    }
}

impl From<Time> for WireTimestamp {
    fn from(time: Time) -> Self {
        Self {
            seconds: time.seconds(),
            nanos: time.subsec_nanos(),
        }
    }
}

impl From<WireTimestamp> for Time {
    fn from(ts: WireTimestamp) -> Self {
        Time::new(ts.seconds, ts.nanos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wireformat_roundtrip() {
        let representations = [(
            [0x00, 0x00, 0x45, 0xb1, 0x11, 0x5a, 0x0a, 0x64, 0xfa, 0xb0],
            WireTimestamp {
                seconds: 1169232218,
                nanos: 174389936,
            },
        )];

        for (bytes, value) in representations {
            let mut buf = [0; 10];
            value.serialize(&mut buf).unwrap();
            assert_eq!(buf, bytes);
            assert_eq!(WireTimestamp::deserialize(&bytes).unwrap(), value);
        }
    }
}
