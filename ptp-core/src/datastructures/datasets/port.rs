use core::fmt;

use crate::{datastructures::common::PortIdentity, time::Duration};

/// IEEE 1588 §9 port states (§4.2.1). `INITIALIZING` is the initial state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PortState {
    #[default]
    Initializing,
    Faulty,
    Disabled,
    Listening,
    PreMaster,
    Master,
    Passive,
    Uncalibrated,
    Slave,
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PortState::Initializing => "INITIALIZING",
            PortState::Faulty => "FAULTY",
            PortState::Disabled => "DISABLED",
            PortState::Listening => "LISTENING",
            PortState::PreMaster => "PRE_MASTER",
            PortState::Master => "MASTER",
            PortState::Passive => "PASSIVE",
            PortState::Uncalibrated => "UNCALIBRATED",
            PortState::Slave => "SLAVE",
        })
    }
}

/// Which delay mechanism a port uses (§4.2.8, §6.4). Boundary/transparent
/// clock relaying is out of scope, so only E2E and P2P are real options;
/// `Disabled` models a port with delay measurement turned off entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayMechanism {
    E2E,
    P2P,
    Disabled,
}

/// Port-DS (§3.3).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortDS {
    pub port_identity: PortIdentity,
    pub port_state: PortState,
    pub log_announce_interval: i8,
    pub log_sync_interval: i8,
    pub log_min_delay_req_interval: i8,
    pub log_min_pdelay_req_interval: i8,
    pub announce_receipt_timeout: u8,
    pub peer_mean_path_delay: Duration,
    pub delay_mechanism: DelayMechanism,
    pub version_number: u8,
}

impl PortDS {
    pub fn new(port_identity: PortIdentity, delay_mechanism: DelayMechanism) -> Self {
        Self {
            port_identity,
            port_state: PortState::Initializing,
            log_announce_interval: 1,
            log_sync_interval: 0,
            log_min_delay_req_interval: 0,
            log_min_pdelay_req_interval: 0,
            announce_receipt_timeout: 3,
            peer_mean_path_delay: Duration::ZERO,
            delay_mechanism,
            version_number: 2,
        }
    }

    /// `announceReceiptTimeout * 2^logAnnounceInterval` seconds (§3.6).
    pub fn announce_receipt_timeout_interval(&self) -> Duration {
        let one_interval = Duration::from_interval(crate::time::Interval::from_log_2(
            self.log_announce_interval,
        ));
        one_interval * self.announce_receipt_timeout as i32
    }
}
