//! PTP wire messages (§6): the 34-octet common header plus one of the eight
//! message bodies this clock implements.

mod announce;
mod delay_req;
mod delay_resp;
mod follow_up;
mod header;
mod p_delay_req;
mod p_delay_resp;
mod p_delay_resp_follow_up;
mod sync;

pub use announce::AnnounceMessage;
pub use delay_req::DelayReqMessage;
pub use delay_resp::DelayRespMessage;
pub use follow_up::FollowUpMessage;
pub use header::{Header, HeaderFlags, HEADER_LEN};
pub use p_delay_req::PDelayReqMessage;
pub use p_delay_resp::PDelayRespMessage;
pub use p_delay_resp_follow_up::PDelayRespFollowUpMessage;
pub use sync::SyncMessage;

use super::{
    common::{ClockIdentity, PortIdentity, TimeInterval, WireTimestamp},
    datasets::{CurrentDS, DefaultDS, ParentDS, TimePropertiesDS},
    WireFormat, WireFormatError,
};
use crate::time::{Interval, Time};

/// Maximum encoded size of any message this implementation sends or accepts.
pub const MAX_MESSAGE_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum MessageType {
    Sync = 0x0,
    DelayReq = 0x1,
    PDelayReq = 0x2,
    PDelayResp = 0x3,
    FollowUp = 0x8,
    DelayResp = 0x9,
    PDelayRespFollowUp = 0xa,
    Announce = 0xb,
    Signaling = 0xc,
    Management = 0xd,
}

impl MessageType {
    pub fn to_primitive(self) -> u8 {
        self as u8
    }

    /// Unrecognised values fall back to `Management`, which this
    /// implementation already treats as an accept-and-ignore no-op (§4.2.6).
    pub fn from_primitive(value: u8) -> Self {
        match value {
            0x0 => Self::Sync,
            0x1 => Self::DelayReq,
            0x2 => Self::PDelayReq,
            0x3 => Self::PDelayResp,
            0x8 => Self::FollowUp,
            0x9 => Self::DelayResp,
            0xa => Self::PDelayRespFollowUp,
            0xb => Self::Announce,
            0xc => Self::Signaling,
            _ => Self::Management,
        }
    }

    pub fn is_event(self) -> bool {
        matches!(
            self,
            Self::Sync | Self::DelayReq | Self::PDelayReq | Self::PDelayResp
        )
    }
}

/// A parsed message body. `Signaling` and `Management` carry no payload:
/// both are accepted on the wire and then discarded (§4.2.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageBody {
    Sync(SyncMessage),
    DelayReq(DelayReqMessage),
    PDelayReq(PDelayReqMessage),
    PDelayResp(PDelayRespMessage),
    FollowUp(FollowUpMessage),
    DelayResp(DelayRespMessage),
    PDelayRespFollowUp(PDelayRespFollowUpMessage),
    Announce(AnnounceMessage),
    Signaling,
    Management,
}

impl MessageBody {
    fn wire_size(&self) -> usize {
        match self {
            Self::Sync(m) => m.content_size(),
            Self::DelayReq(m) => m.content_size(),
            Self::PDelayReq(m) => m.content_size(),
            Self::PDelayResp(m) => m.content_size(),
            Self::FollowUp(m) => m.content_size(),
            Self::DelayResp(m) => m.content_size(),
            Self::PDelayRespFollowUp(m) => m.content_size(),
            Self::Announce(m) => m.content_size(),
            Self::Signaling | Self::Management => 0,
        }
    }

    fn message_type(&self) -> MessageType {
        match self {
            Self::Sync(_) => MessageType::Sync,
            Self::DelayReq(_) => MessageType::DelayReq,
            Self::PDelayReq(_) => MessageType::PDelayReq,
            Self::PDelayResp(_) => MessageType::PDelayResp,
            Self::FollowUp(_) => MessageType::FollowUp,
            Self::DelayResp(_) => MessageType::DelayResp,
            Self::PDelayRespFollowUp(_) => MessageType::PDelayRespFollowUp,
            Self::Announce(_) => MessageType::Announce,
            Self::Signaling => MessageType::Signaling,
            Self::Management => MessageType::Management,
        }
    }

    fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        match self {
            Self::Sync(m) => m.serialize_content(buffer),
            Self::DelayReq(m) => m.serialize_content(buffer),
            Self::PDelayReq(m) => m.serialize_content(buffer),
            Self::PDelayResp(m) => m.serialize_content(buffer),
            Self::FollowUp(m) => m.serialize_content(buffer),
            Self::DelayResp(m) => m.serialize_content(buffer),
            Self::PDelayRespFollowUp(m) => m.serialize_content(buffer),
            Self::Announce(m) => m.serialize_content(buffer),
            Self::Signaling | Self::Management => Ok(()),
        }
    }

    fn deserialize(message_type: MessageType, buffer: &[u8]) -> Result<Self, WireFormatError> {
        Ok(match message_type {
            MessageType::Sync => Self::Sync(SyncMessage::deserialize_content(buffer)?),
            MessageType::DelayReq => Self::DelayReq(DelayReqMessage::deserialize_content(buffer)?),
            MessageType::PDelayReq => {
                Self::PDelayReq(PDelayReqMessage::deserialize_content(buffer)?)
            }
            MessageType::PDelayResp => {
                Self::PDelayResp(PDelayRespMessage::deserialize_content(buffer)?)
            }
            MessageType::FollowUp => Self::FollowUp(FollowUpMessage::deserialize_content(buffer)?),
            MessageType::DelayResp => {
                Self::DelayResp(DelayRespMessage::deserialize_content(buffer)?)
            }
            MessageType::PDelayRespFollowUp => {
                Self::PDelayRespFollowUp(PDelayRespFollowUpMessage::deserialize_content(buffer)?)
            }
            MessageType::Announce => Self::Announce(AnnounceMessage::deserialize_content(buffer)?),
            MessageType::Signaling => Self::Signaling,
            MessageType::Management => Self::Management,
        })
    }
}

/// A complete PTP message: header plus body (§6.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message {
    pub header: Header,
    pub body: MessageBody,
}

fn base_header(default_ds: &DefaultDS, port_identity: PortIdentity, sequence_id: u16) -> Header {
    Header {
        domain_number: default_ds.domain_number,
        source_port_identity: port_identity,
        sequence_id,
        ..Default::default()
    }
}

impl Message {
    pub fn is_event(&self) -> bool {
        self.body.message_type().is_event()
    }

    pub fn sync(default_ds: &DefaultDS, port_identity: PortIdentity, sequence_id: u16) -> Self {
        let header = Header {
            flags: HeaderFlags {
                two_step: true,
                ..Default::default()
            },
            ..base_header(default_ds, port_identity, sequence_id)
        };

        Message {
            header,
            body: MessageBody::Sync(SyncMessage::default()),
        }
    }

    pub fn follow_up(
        default_ds: &DefaultDS,
        port_identity: PortIdentity,
        sequence_id: u16,
        timestamp: Time,
    ) -> Self {
        let wire: WireTimestamp = timestamp.into();
        Message {
            header: base_header(default_ds, port_identity, sequence_id),
            body: MessageBody::FollowUp(FollowUpMessage {
                precise_origin_timestamp: wire,
            }),
        }
    }

    pub fn delay_req(default_ds: &DefaultDS, port_identity: PortIdentity, sequence_id: u16) -> Self {
        let header = Header {
            log_message_interval: 0x7f,
            ..base_header(default_ds, port_identity, sequence_id)
        };

        Message {
            header,
            body: MessageBody::DelayReq(DelayReqMessage::default()),
        }
    }

    pub fn delay_resp(
        request_header: &Header,
        port_identity: PortIdentity,
        min_delay_req_interval: Interval,
        receive_timestamp: Time,
    ) -> Self {
        let header = Header {
            source_port_identity: port_identity,
            sequence_id: request_header.sequence_id,
            domain_number: request_header.domain_number,
            log_message_interval: min_delay_req_interval.as_log_2(),
            // Echo the requester's correction-field (§4.2.6) rather than
            // starting a fresh one.
            correction_field: request_header.correction_field,
            ..Default::default()
        };

        Message {
            header,
            body: MessageBody::DelayResp(DelayRespMessage {
                receive_timestamp: receive_timestamp.into(),
                requesting_port_identity: request_header.source_port_identity,
            }),
        }
    }

    pub fn pdelay_req(default_ds: &DefaultDS, port_identity: PortIdentity, sequence_id: u16) -> Self {
        Message {
            header: base_header(default_ds, port_identity, sequence_id),
            body: MessageBody::PDelayReq(PDelayReqMessage::default()),
        }
    }

    pub fn pdelay_resp(
        request_header: &Header,
        port_identity: PortIdentity,
        request_receive_timestamp: Time,
    ) -> Self {
        let header = Header {
            source_port_identity: port_identity,
            sequence_id: request_header.sequence_id,
            domain_number: request_header.domain_number,
            flags: HeaderFlags {
                two_step: true,
                ..Default::default()
            },
            ..Default::default()
        };

        Message {
            header,
            body: MessageBody::PDelayResp(PDelayRespMessage {
                request_receive_timestamp: request_receive_timestamp.into(),
                requesting_port_identity: request_header.source_port_identity,
            }),
        }
    }

    pub fn pdelay_resp_follow_up(
        request_header: &Header,
        port_identity: PortIdentity,
        response_origin_timestamp: Time,
    ) -> Self {
        let header = Header {
            source_port_identity: port_identity,
            sequence_id: request_header.sequence_id,
            domain_number: request_header.domain_number,
            ..Default::default()
        };

        Message {
            header,
            body: MessageBody::PDelayRespFollowUp(PDelayRespFollowUpMessage {
                response_origin_timestamp: response_origin_timestamp.into(),
                requesting_port_identity: request_header.source_port_identity,
            }),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn announce(
        default_ds: &DefaultDS,
        parent_ds: &ParentDS,
        current_ds: &CurrentDS,
        time_properties_ds: &TimePropertiesDS,
        port_identity: PortIdentity,
        sequence_id: u16,
    ) -> Self {
        let header = Header {
            flags: HeaderFlags {
                leap59: time_properties_ds.leap59,
                leap61: time_properties_ds.leap61,
                utc_offset_valid: time_properties_ds.current_utc_offset_valid,
                ptp_timescale: time_properties_ds.ptp_timescale,
                time_traceable: time_properties_ds.time_traceable,
                frequency_traceable: time_properties_ds.frequency_traceable,
                ..Default::default()
            },
            ..base_header(default_ds, port_identity, sequence_id)
        };

        let body = MessageBody::Announce(AnnounceMessage {
            origin_timestamp: WireTimestamp::default(),
            current_utc_offset: time_properties_ds.current_utc_offset,
            grandmaster_priority_1: parent_ds.grandmaster_priority_1,
            grandmaster_clock_quality: parent_ds.grandmaster_clock_quality,
            grandmaster_priority_2: parent_ds.grandmaster_priority_2,
            grandmaster_identity: parent_ds.grandmaster_identity,
            steps_removed: current_ds.steps_removed,
            time_source: time_properties_ds.time_source,
        });

        Message { header, body }
    }

    pub fn grandmaster_identity(&self) -> Option<ClockIdentity> {
        match self.body {
            MessageBody::Announce(a) => Some(a.grandmaster_identity),
            _ => None,
        }
    }

    pub fn wire_size(&self) -> usize {
        HEADER_LEN + self.body.wire_size()
    }

    pub fn serialize(&self, buffer: &mut [u8]) -> Result<usize, WireFormatError> {
        let size = self.wire_size();
        if buffer.len() < size {
            return Err(WireFormatError::BufferTooShort);
        }

        let header = Header {
            message_type: self.body.message_type(),
            message_length: size as u16,
            ..self.header
        };

        header.serialize(&mut buffer[0..HEADER_LEN])?;
        self.body.serialize(&mut buffer[HEADER_LEN..size])?;

        Ok(size)
    }

    pub fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        let header = Header::deserialize(buffer)?;

        if (header.message_length as usize) < HEADER_LEN {
            return Err(WireFormatError::BufferTooShort);
        }

        let content = buffer
            .get(HEADER_LEN..header.message_length as usize)
            .ok_or(WireFormatError::BufferTooShort)?;

        let body = MessageBody::deserialize(header.message_type, content)?;

        Ok(Message { header, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastructures::common::{ClockAccuracy, ClockIdentity, ClockQuality};

    fn default_ds() -> DefaultDS {
        DefaultDS::new(
            ClockIdentity([1, 2, 3, 0xff, 0xfe, 4, 5, 6]),
            ClockQuality {
                clock_class: 248,
                clock_accuracy: ClockAccuracy::Unknown,
                offset_scaled_log_variance: 0xffff,
            },
            128,
            128,
            0,
            false,
            true,
        )
    }

    #[test]
    fn sync_roundtrips_through_the_wire() {
        let default_ds = default_ds();
        let port_identity = PortIdentity {
            clock_identity: default_ds.clock_identity,
            port_number: 1,
        };
        let message = Message::sync(&default_ds, port_identity, 7);

        let mut buf = [0u8; MAX_MESSAGE_LEN];
        let len = message.serialize(&mut buf).unwrap();
        assert_eq!(len, 44);

        let parsed = Message::deserialize(&buf[..len]).unwrap();
        assert_eq!(parsed, message);
    }

    #[test]
    fn announce_roundtrips_through_the_wire() {
        let default_ds = default_ds();
        let parent_ds = ParentDS::from_own_data(&default_ds);
        let current_ds = CurrentDS::default();
        let time_properties_ds = TimePropertiesDS::default();
        let port_identity = PortIdentity {
            clock_identity: default_ds.clock_identity,
            port_number: 1,
        };

        let message = Message::announce(
            &default_ds,
            &parent_ds,
            &current_ds,
            &time_properties_ds,
            port_identity,
            3,
        );

        let mut buf = [0u8; MAX_MESSAGE_LEN];
        let len = message.serialize(&mut buf).unwrap();
        assert_eq!(len, 64);

        let parsed = Message::deserialize(&buf[..len]).unwrap();
        assert_eq!(parsed, message);
        assert_eq!(parsed.grandmaster_identity(), Some(default_ds.clock_identity));
    }

    #[test]
    fn unknown_message_type_is_treated_as_management_no_op() {
        assert_eq!(MessageType::from_primitive(0xf), MessageType::Management);
    }
}
