use super::DefaultDS;
use crate::datastructures::common::{ClockIdentity, ClockQuality, PortIdentity};

/// Parent-DS (§3.3): identity of the current parent/grandmaster, populated
/// by the BMC helpers M1/M2/S1 (§4.3.3).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParentDS {
    pub parent_port_identity: PortIdentity,
    pub grandmaster_identity: ClockIdentity,
    pub grandmaster_clock_quality: ClockQuality,
    pub grandmaster_priority_1: u8,
    pub grandmaster_priority_2: u8,
    /// Only maintained when parent statistics are enabled (§3.3).
    pub parent_clock_phase_change_rate: Option<i32>,
    pub observed_parent_offset_scaled_log_variance: Option<u16>,
}

impl ParentDS {
    /// M1/M2 (§4.3.3): copy our own identity into Parent-DS and the
    /// grandmaster fields.
    pub fn from_own_data(default_ds: &DefaultDS) -> Self {
        Self {
            parent_port_identity: PortIdentity {
                clock_identity: default_ds.clock_identity,
                port_number: 0,
            },
            grandmaster_identity: default_ds.clock_identity,
            grandmaster_clock_quality: default_ds.clock_quality,
            grandmaster_priority_1: default_ds.priority_1,
            grandmaster_priority_2: default_ds.priority_2,
            parent_clock_phase_change_rate: None,
            observed_parent_offset_scaled_log_variance: None,
        }
    }
}
