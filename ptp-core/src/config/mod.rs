//! Init-time configuration (§6.4). No runtime reconfiguration is supported;
//! changing any of these values requires the port to re-enter INITIALIZING.

use crate::{
    datastructures::{
        common::{ClockIdentity, ClockQuality},
        datasets::DelayMechanism,
    },
    servo::ServoConfig,
};

/// Options that apply to the whole clock instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceConfig {
    pub clock_identity: ClockIdentity,
    pub clock_quality: ClockQuality,
    pub priority_1: u8,
    pub priority_2: u8,
    pub domain_number: u8,
    pub slave_only: bool,
    pub two_step_flag: bool,
}

/// Options that apply to a single port.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortConfig {
    pub delay_mechanism: DelayMechanism,
    /// Rate of ANNOUNCE issue while MASTER, log2 seconds (§3.6).
    pub log_announce_interval: i8,
    /// Rate of SYNC issue while MASTER, log2 seconds.
    pub log_sync_interval: i8,
    pub log_min_delay_req_interval: i8,
    pub log_min_pdelay_req_interval: i8,
    pub announce_receipt_timeout: u8,
    /// Fixed latency correction applied to received timestamps before any
    /// offset computation (§4.2.4).
    pub inbound_latency: crate::time::Duration,
    /// Fixed latency correction applied to transmit timestamps.
    pub outbound_latency: crate::time::Duration,
    pub servo: ServoConfig,
    pub max_foreign_records: usize,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            delay_mechanism: DelayMechanism::E2E,
            log_announce_interval: 1,
            log_sync_interval: 0,
            log_min_delay_req_interval: 0,
            log_min_pdelay_req_interval: 0,
            announce_receipt_timeout: 3,
            inbound_latency: crate::time::Duration::ZERO,
            outbound_latency: crate::time::Duration::ZERO,
            servo: ServoConfig::default(),
            max_foreign_records: crate::datastructures::datasets::DEFAULT_FOREIGN_MASTER_CAPACITY,
        }
    }
}
