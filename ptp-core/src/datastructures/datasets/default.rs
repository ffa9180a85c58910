use crate::datastructures::common::{ClockIdentity, ClockQuality};

/// Default-DS (§3.3): the node's own identity, quality and the tiebreakers
/// and mode flags that never change without an INITIALIZING transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultDS {
    pub clock_identity: ClockIdentity,
    pub clock_quality: ClockQuality,
    pub priority_1: u8,
    pub priority_2: u8,
    pub domain_number: u8,
    pub slave_only: bool,
    pub two_step_flag: bool,
    pub number_ports: u16,
}

impl DefaultDS {
    pub fn new(
        clock_identity: ClockIdentity,
        mut clock_quality: ClockQuality,
        priority_1: u8,
        priority_2: u8,
        domain_number: u8,
        slave_only: bool,
        two_step_flag: bool,
    ) -> Self {
        // §3.5 invariant: slave-only forces clock-class 255, which in turn
        // forces the master-capability check below to always fail.
        if slave_only {
            clock_quality.clock_class = 255;
        }

        Self {
            clock_identity,
            clock_quality,
            priority_1,
            priority_2,
            domain_number,
            slave_only,
            two_step_flag,
            number_ports: 1,
        }
    }

    /// Exactly one of `(slave_only, clock_class < 128, clock_class == 255)`
    /// controls master-capability in BMC (§3.5).
    pub fn is_master_candidate(&self) -> bool {
        !self.slave_only && self.clock_quality.is_master_candidate() && self.clock_quality.clock_class != 255
    }
}
