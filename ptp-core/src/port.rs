//! PTP-ENGINE (§4.2): the cooperative, single-threaded port state machine
//! that ties BMC (§4.3), PTP-SERVO (§4.4), PTP-NET (§4.5) and PTP-TIMERS
//! (§4.6) together. Grounded function-for-function on `ptpd_protocol.c`'s
//! `doState`/`handle*` dispatch.

use arrayvec::ArrayVec;
use rand::Rng;

use crate::{
    bmc::{self, RecommendedState},
    clock::Clock,
    config::{InstanceConfig, PortConfig},
    datastructures::{
        common::PortIdentity,
        datasets::{
            CurrentDS, DefaultDS, DelayMechanism, ForeignMasterDS, ParentDS, PortDS, PortState,
            TimePropertiesDS,
        },
        messages::{
            AnnounceMessage, DelayRespMessage, FollowUpMessage, Header, Message, MessageBody,
            PDelayRespFollowUpMessage, PDelayRespMessage, SyncMessage, MAX_MESSAGE_LEN,
        },
        WireFormatError,
    },
    error::PortError,
    network::NetworkPort,
    servo::Servo,
    time::{Duration, Interval, Time},
    timers::{TimerSlot, Timers},
    Event,
};

/// Upper bound on frames drained from one queue per [`PtpPort::do_state`]
/// call (§4.2.3 step 4), so a flooded link cannot starve the rest of the
/// cooperative loop.
const MAX_FRAMES_PER_POLL: usize = 16;

/// Event bitmask (§4.2.4): one-shot signals raised by decode/timer code
/// paths and consumed by the state-reconciliation steps of `do_state`.
#[derive(Debug, Clone, Copy, Default)]
struct EventFlags {
    state_decision: bool,
    master_clock_selected: bool,
    master_clock_changed: bool,
    synchronization_fault: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct SequenceIds {
    announce: u16,
    sync: u16,
    delay_req: u16,
    pdelay_req: u16,
}

impl SequenceIds {
    fn next_announce(&mut self) -> u16 {
        let v = self.announce;
        self.announce = self.announce.wrapping_add(1);
        v
    }

    fn next_sync(&mut self) -> u16 {
        let v = self.sync;
        self.sync = self.sync.wrapping_add(1);
        v
    }

    fn next_delay_req(&mut self) -> u16 {
        let v = self.delay_req;
        self.delay_req = self.delay_req.wrapping_add(1);
        v
    }

    fn next_pdelay_req(&mut self) -> u16 {
        let v = self.pdelay_req;
        self.pdelay_req = self.pdelay_req.wrapping_add(1);
        v
    }
}

/// A two-step SYNC whose FOLLOW_UP has not arrived yet.
#[derive(Debug, Clone, Copy)]
struct SyncWait {
    sequence_id: u16,
    t2: Time,
    correction: Duration,
}

/// An outstanding E2E DELAY_REQ, waiting on its DELAY_RESP.
#[derive(Debug, Clone, Copy)]
struct DelayReqPending {
    sequence_id: u16,
    t3: Time,
}

/// An outstanding P2P PDELAY_REQ, waiting on its PDELAY_RESP (and, if
/// two-step, the PDELAY_RESP_FOLLOW_UP after it).
#[derive(Debug, Clone, Copy)]
struct PDelayPending {
    sequence_id: u16,
    t1: Time,
    corr_sum: Duration,
    t2: Option<Time>,
    t4: Option<Time>,
}

/// A single ordinary-clock PTP port (§3.2, §4.2), generic over the
/// HW-CLOCK, PTP-NET and PTP-TIMERS implementations it drives, and over the
/// random source it uses to phase-stagger request timers (§4.2.2).
pub struct PtpPort<C, N, T, R> {
    default_ds: DefaultDS,
    parent_ds: ParentDS,
    current_ds: CurrentDS,
    time_properties_ds: TimePropertiesDS,
    own_time_properties_ds: TimePropertiesDS,
    port_ds: PortDS,
    foreign_master_ds: ForeignMasterDS,
    servo: Servo,

    clock: C,
    network: N,
    timers: T,
    rng: R,
    config: PortConfig,

    events: EventFlags,
    recommended_state: Option<RecommendedState>,
    sequence_ids: SequenceIds,

    sync_wait: Option<SyncWait>,
    delay_req_pending: Option<DelayReqPending>,
    pdelay_pending: Option<PDelayPending>,
    last_tms: Option<Duration>,
}

impl<C, N, T, R> PtpPort<C, N, T, R>
where
    C: Clock,
    N: NetworkPort,
    T: Timers,
    R: Rng,
{
    pub fn new(
        instance: InstanceConfig,
        port_config: PortConfig,
        time_properties: TimePropertiesDS,
        clock: C,
        network: N,
        timers: T,
        rng: R,
    ) -> Self {
        let default_ds = DefaultDS::new(
            instance.clock_identity,
            instance.clock_quality,
            instance.priority_1,
            instance.priority_2,
            instance.domain_number,
            instance.slave_only,
            instance.two_step_flag,
        );

        let port_identity = PortIdentity {
            clock_identity: instance.clock_identity,
            port_number: 1,
        };

        let port_ds = PortDS {
            log_announce_interval: port_config.log_announce_interval,
            log_sync_interval: port_config.log_sync_interval,
            log_min_delay_req_interval: port_config.log_min_delay_req_interval,
            log_min_pdelay_req_interval: port_config.log_min_pdelay_req_interval,
            announce_receipt_timeout: port_config.announce_receipt_timeout,
            ..PortDS::new(port_identity, port_config.delay_mechanism)
        };

        let parent_ds = ParentDS::from_own_data(&default_ds);

        Self {
            default_ds,
            parent_ds,
            current_ds: CurrentDS::default(),
            time_properties_ds: time_properties,
            own_time_properties_ds: time_properties,
            port_ds,
            foreign_master_ds: ForeignMasterDS::new(port_config.max_foreign_records),
            servo: Servo::new(port_config.servo),
            clock,
            network,
            timers,
            rng,
            config: port_config,
            events: EventFlags::default(),
            recommended_state: None,
            sequence_ids: SequenceIds::default(),
            sync_wait: None,
            delay_req_pending: None,
            pdelay_pending: None,
            last_tms: None,
        }
    }

    pub fn port_identity(&self) -> PortIdentity {
        self.port_ds.port_identity
    }

    pub fn state(&self) -> PortState {
        self.port_ds.port_state
    }

    pub fn default_ds(&self) -> &DefaultDS {
        &self.default_ds
    }

    pub fn parent_ds(&self) -> &ParentDS {
        &self.parent_ds
    }

    pub fn current_ds(&self) -> &CurrentDS {
        &self.current_ds
    }

    pub fn time_properties_ds(&self) -> &TimePropertiesDS {
        &self.time_properties_ds
    }

    pub fn port_ds(&self) -> &PortDS {
        &self.port_ds
    }

    pub fn foreign_master_ds(&self) -> &ForeignMasterDS {
        &self.foreign_master_ds
    }

    /// The timer driver, so a caller can size a bounded wait around
    /// [`Self::do_state`] (§4.6).
    pub fn timers(&self) -> &T {
        &self.timers
    }

    /// Randomized phase `rand(0, 2^(log_int+1))` seconds for (re)arming a
    /// request timer (§4.2.2, §4.2.8).
    fn randomized_request_interval(&mut self, log_interval: i8) -> Duration {
        let max_seconds = 2f64.powi(log_interval as i32 + 1);
        let seconds = if max_seconds > 0.0 {
            self.rng.gen_range(0.0..max_seconds)
        } else {
            0.0
        };
        Duration::from_nanos((seconds * 1_000_000_000.0) as i64)
    }

    /// State entry/exit actions (§4.2.2).
    fn to_state(&mut self, new_state: PortState, events: &mut ArrayVec<Event, 4>) {
        let old_state = self.port_ds.port_state;
        if old_state == new_state {
            return;
        }

        match old_state {
            PortState::Listening => {
                self.timers.stop(TimerSlot::AnnounceReceiptTimeout);
                self.servo = Servo::new(self.config.servo);
            }
            PortState::Master => {
                self.timers.stop(TimerSlot::SyncInterval);
                self.timers.stop(TimerSlot::AnnounceInterval);
                if self.port_ds.delay_mechanism == DelayMechanism::P2P {
                    self.timers.stop(TimerSlot::PeerDelayReqInterval);
                }
                self.servo = Servo::new(self.config.servo);
            }
            PortState::Uncalibrated | PortState::Slave => {
                self.timers.stop(TimerSlot::AnnounceReceiptTimeout);
                match self.port_ds.delay_mechanism {
                    DelayMechanism::E2E => self.timers.stop(TimerSlot::DelayReqInterval),
                    DelayMechanism::P2P => self.timers.stop(TimerSlot::PeerDelayReqInterval),
                    DelayMechanism::Disabled => {}
                }
                self.servo = Servo::new(self.config.servo);
            }
            PortState::Passive => {
                self.timers.stop(TimerSlot::AnnounceReceiptTimeout);
                if self.port_ds.delay_mechanism == DelayMechanism::P2P {
                    self.timers.stop(TimerSlot::PeerDelayReqInterval);
                }
                self.servo = Servo::new(self.config.servo);
            }
            PortState::PreMaster => self.timers.stop(TimerSlot::QualificationTimeout),
            PortState::Initializing | PortState::Faulty | PortState::Disabled => {}
        }

        match new_state {
            PortState::Initializing => {
                self.foreign_master_ds.clear();
                self.parent_ds = ParentDS::from_own_data(&self.default_ds);
                self.current_ds = CurrentDS::default();
                self.time_properties_ds = self.own_time_properties_ds;
            }
            PortState::Listening => {
                self.timers.start(
                    TimerSlot::AnnounceReceiptTimeout,
                    self.port_ds.announce_receipt_timeout_interval(),
                );
                self.foreign_master_ds.set_best_by_port_identity(None);
                self.recommended_state = None;
            }
            PortState::Master => {
                self.timers.start(
                    TimerSlot::SyncInterval,
                    Interval::from_log_2(self.port_ds.log_sync_interval).as_duration(),
                );
                self.timers.start(
                    TimerSlot::AnnounceInterval,
                    Interval::from_log_2(self.port_ds.log_announce_interval).as_duration(),
                );
                if self.port_ds.delay_mechanism == DelayMechanism::P2P {
                    let phase =
                        self.randomized_request_interval(self.port_ds.log_min_pdelay_req_interval);
                    self.timers.start(TimerSlot::PeerDelayReqInterval, phase);
                }
            }
            PortState::Uncalibrated | PortState::Slave => {
                self.timers.start(
                    TimerSlot::AnnounceReceiptTimeout,
                    self.port_ds.announce_receipt_timeout_interval(),
                );
                match self.port_ds.delay_mechanism {
                    DelayMechanism::E2E => {
                        let phase = self
                            .randomized_request_interval(self.port_ds.log_min_delay_req_interval);
                        self.timers.start(TimerSlot::DelayReqInterval, phase);
                    }
                    DelayMechanism::P2P => {
                        let phase = self.randomized_request_interval(
                            self.port_ds.log_min_pdelay_req_interval,
                        );
                        self.timers.start(TimerSlot::PeerDelayReqInterval, phase);
                    }
                    DelayMechanism::Disabled => {}
                }
            }
            PortState::Passive => {
                self.timers.start(
                    TimerSlot::AnnounceReceiptTimeout,
                    self.port_ds.announce_receipt_timeout_interval(),
                );
                if self.port_ds.delay_mechanism == DelayMechanism::P2P {
                    let phase =
                        self.randomized_request_interval(self.port_ds.log_min_pdelay_req_interval);
                    self.timers.start(TimerSlot::PeerDelayReqInterval, phase);
                }
            }
            PortState::PreMaster => {
                // This implementation has no external qualification
                // criteria beyond "BMC still recommends MASTER", so the
                // qualification window is just the announce-receipt
                // timeout interval (§4.2.1: PRE_MASTER collapses to MASTER
                // as soon as it elapses).
                self.timers.start(
                    TimerSlot::QualificationTimeout,
                    self.port_ds.announce_receipt_timeout_interval(),
                );
            }
            PortState::Faulty | PortState::Disabled => {}
        }

        self.port_ds.port_state = new_state;
        events.push(state_event(self.port_ds.port_identity, new_state, &self.parent_ds));
    }

    /// S1 (§4.3.3): adopt a foreign master's announce as our parent.
    /// `MASTER_CLOCK_CHANGED` is only meaningful while already SLAVE — a
    /// parent change observed in any other state is just normal BMC
    /// convergence, not a fault to recover from (§4.2.4).
    fn apply_s1(&mut self, header: &Header, announce: &AnnounceMessage) {
        let new_parent = header.source_port_identity;
        if self.port_ds.port_state == PortState::Slave && new_parent != self.parent_ds.parent_port_identity
        {
            self.events.master_clock_changed = true;
        }

        self.parent_ds = ParentDS {
            parent_port_identity: new_parent,
            grandmaster_identity: announce.grandmaster_identity,
            grandmaster_clock_quality: announce.grandmaster_clock_quality,
            grandmaster_priority_1: announce.grandmaster_priority_1,
            grandmaster_priority_2: announce.grandmaster_priority_2,
            parent_clock_phase_change_rate: None,
            observed_parent_offset_scaled_log_variance: None,
        };
        self.current_ds.steps_removed = announce.steps_removed + 1;

        self.time_properties_ds = TimePropertiesDS {
            current_utc_offset: announce.current_utc_offset,
            current_utc_offset_valid: header.flags.utc_offset_valid,
            leap59: header.flags.leap59,
            leap61: header.flags.leap61,
            time_traceable: header.flags.time_traceable,
            frequency_traceable: header.flags.frequency_traceable,
            ptp_timescale: header.flags.ptp_timescale,
            time_source: announce.time_source,
        };
    }

    /// M1/M2 (§4.3.3): this clock is its own master.
    fn apply_m1(&mut self) {
        self.parent_ds = ParentDS::from_own_data(&self.default_ds);
        self.current_ds.offset_from_master = Duration::ZERO;
        self.current_ds.mean_path_delay = Duration::ZERO;
        self.current_ds.steps_removed = 0;
        self.time_properties_ds = self.own_time_properties_ds;
    }

    /// BMC (§4.3): recompute `recommendedState` from Foreign-Master-DS.
    fn run_bmc(&mut self) {
        let mut recommended = bmc::state_decision(&self.default_ds, &self.foreign_master_ds);

        if matches!(recommended, RecommendedState::Master)
            && (self.default_ds.slave_only || self.default_ds.clock_quality.clock_class == 255)
        {
            recommended = RecommendedState::Listening;
        }

        match recommended {
            RecommendedState::Master => {
                self.apply_m1();
                self.foreign_master_ds.set_best_by_port_identity(None);
            }
            RecommendedState::Listening => {
                self.foreign_master_ds.set_best_by_port_identity(None);
            }
            RecommendedState::Slave(port_identity) => {
                self.foreign_master_ds
                    .set_best_by_port_identity(Some(port_identity));

                if port_identity != self.parent_ds.parent_port_identity {
                    let record = self
                        .foreign_master_ds
                        .iter()
                        .find(|r| r.port_identity == port_identity)
                        .copied();
                    if let Some(record) = record {
                        self.apply_s1(&record.header, &record.announce);
                    }
                }
            }
        }

        self.recommended_state = Some(recommended);
    }

    /// Transition table (§4.2.5): reconcile current state against the last
    /// BMC recommendation.
    fn reconcile_transition(&mut self, events: &mut ArrayVec<Event, 4>) {
        let Some(recommended) = self.recommended_state else {
            return;
        };

        let next = match (self.port_ds.port_state, recommended) {
            (PortState::PreMaster, RecommendedState::Master) => {
                if self.timers.expired(TimerSlot::QualificationTimeout) {
                    Some(PortState::Master)
                } else {
                    None
                }
            }
            (PortState::PreMaster, RecommendedState::Slave(_)) => Some(PortState::Uncalibrated),
            (PortState::PreMaster, RecommendedState::Listening) => Some(PortState::Listening),

            (PortState::Master, RecommendedState::Slave(_)) => Some(PortState::Uncalibrated),
            (PortState::Master, RecommendedState::Listening) => Some(PortState::Listening),

            (PortState::Slave, RecommendedState::Master)
            | (PortState::Uncalibrated, RecommendedState::Master) => Some(PortState::PreMaster),
            (PortState::Slave, RecommendedState::Listening)
            | (PortState::Uncalibrated, RecommendedState::Listening) => Some(PortState::Listening),

            (PortState::Listening, RecommendedState::Master) => Some(PortState::PreMaster),
            (PortState::Listening, RecommendedState::Slave(_)) => Some(PortState::Uncalibrated),

            _ => None,
        };

        if let Some(next) = next {
            self.to_state(next, events);
        }
    }

    /// Event-driven transitions (§4.2.4) not covered by the recommendation
    /// table: calibration and loss-of-sync while SLAVE/UNCALIBRATED.
    fn apply_event_transitions(&mut self, events: &mut ArrayVec<Event, 4>) {
        if self.port_ds.port_state == PortState::Slave
            && (self.events.master_clock_changed || self.events.synchronization_fault)
        {
            self.events.master_clock_changed = false;
            self.events.synchronization_fault = false;
            self.to_state(PortState::Uncalibrated, events);
            return;
        }

        if self.port_ds.port_state == PortState::Uncalibrated && self.events.master_clock_selected {
            self.events.master_clock_selected = false;
            self.to_state(PortState::Slave, events);
        }
    }

    fn send_message(&mut self, message: &Message) -> Result<Time, PortError<N::Error, C::Error>> {
        let mut buf = [0u8; MAX_MESSAGE_LEN];
        let len = message.serialize(&mut buf)?;

        let is_peer = matches!(
            message.body,
            MessageBody::PDelayReq(_) | MessageBody::PDelayResp(_) | MessageBody::PDelayRespFollowUp(_)
        );

        if message.is_event() {
            let tx = if is_peer {
                self.network.send_peer_event(&buf[..len])
            } else {
                self.network.send_event(&buf[..len])
            }
            .map_err(PortError::Network)?;
            Ok(tx)
        } else {
            if is_peer {
                self.network.send_peer_general(&buf[..len])
            } else {
                self.network.send_general(&buf[..len])
            }
            .map_err(PortError::Network)?;
            Ok(Time::EPOCH)
        }
    }

    /// Transmit timer actions, MASTER side (§4.2.7).
    fn issue_sync(&mut self) -> Result<(), PortError<N::Error, C::Error>> {
        let seq = self.sequence_ids.next_sync();
        let message = Message::sync(&self.default_ds, self.port_ds.port_identity, seq);
        let tx_time = self.send_message(&message)?;

        if tx_time != Time::EPOCH {
            let precise = tx_time + self.config.outbound_latency;
            let follow_up = Message::follow_up(
                &self.default_ds,
                self.port_ds.port_identity,
                seq,
                precise,
            );
            self.send_message(&follow_up)?;
        }

        Ok(())
    }

    fn issue_announce(&mut self) -> Result<(), PortError<N::Error, C::Error>> {
        let seq = self.sequence_ids.next_announce();
        let message = Message::announce(
            &self.default_ds,
            &self.parent_ds,
            &self.current_ds,
            &self.time_properties_ds,
            self.port_ds.port_identity,
            seq,
        );
        self.send_message(&message)?;
        Ok(())
    }

    /// Transmit timer actions, SLAVE side (§4.2.8).
    fn issue_delay_req(&mut self) -> Result<(), PortError<N::Error, C::Error>> {
        let seq = self.sequence_ids.next_delay_req();
        let message = Message::delay_req(&self.default_ds, self.port_ds.port_identity, seq);
        let tx_time = self.send_message(&message)?;

        if tx_time != Time::EPOCH {
            self.delay_req_pending = Some(DelayReqPending {
                sequence_id: seq,
                t3: tx_time + self.config.outbound_latency,
            });
        }

        let phase = self.randomized_request_interval(self.port_ds.log_min_delay_req_interval);
        self.timers.start(TimerSlot::DelayReqInterval, phase);
        Ok(())
    }

    fn issue_pdelay_req(&mut self) -> Result<(), PortError<N::Error, C::Error>> {
        let seq = self.sequence_ids.next_pdelay_req();
        let message = Message::pdelay_req(&self.default_ds, self.port_ds.port_identity, seq);
        let tx_time = self.send_message(&message)?;

        if tx_time != Time::EPOCH {
            self.pdelay_pending = Some(PDelayPending {
                sequence_id: seq,
                t1: tx_time + self.config.outbound_latency,
                corr_sum: Duration::ZERO,
                t2: None,
                t4: None,
            });
        }

        let phase = self.randomized_request_interval(self.port_ds.log_min_pdelay_req_interval);
        self.timers.start(TimerSlot::PeerDelayReqInterval, phase);
        Ok(())
    }

    fn poll_timers(&mut self, events: &mut ArrayVec<Event, 4>) -> Result<(), PortError<N::Error, C::Error>> {
        if self.timers.expired(TimerSlot::AnnounceReceiptTimeout) {
            // §8.4 scenario 5: suppressed announces reset the ring and
            // force a re-decision.
            self.events.state_decision = true;
            self.foreign_master_ds.clear();
            self.recommended_state = None;

            if self.default_ds.is_master_candidate() {
                self.to_state(PortState::PreMaster, events);
            } else {
                self.to_state(PortState::Listening, events);
            }
        }

        if self.port_ds.port_state == PortState::Master {
            if self.timers.expired(TimerSlot::SyncInterval) {
                self.issue_sync()?;
                self.timers.start(
                    TimerSlot::SyncInterval,
                    Interval::from_log_2(self.port_ds.log_sync_interval).as_duration(),
                );
            }
            if self.timers.expired(TimerSlot::AnnounceInterval) {
                self.issue_announce()?;
                self.timers.start(
                    TimerSlot::AnnounceInterval,
                    Interval::from_log_2(self.port_ds.log_announce_interval).as_duration(),
                );
            }
        }

        if matches!(self.port_ds.port_state, PortState::Uncalibrated | PortState::Slave) {
            match self.port_ds.delay_mechanism {
                DelayMechanism::E2E => {
                    if self.timers.expired(TimerSlot::DelayReqInterval) {
                        self.issue_delay_req()?;
                    }
                }
                DelayMechanism::P2P => {
                    if self.timers.expired(TimerSlot::PeerDelayReqInterval) {
                        self.issue_pdelay_req()?;
                    }
                }
                DelayMechanism::Disabled => {}
            }
        }

        if matches!(self.port_ds.port_state, PortState::Master | PortState::Passive)
            && self.port_ds.delay_mechanism == DelayMechanism::P2P
            && self.timers.expired(TimerSlot::PeerDelayReqInterval)
        {
            self.issue_pdelay_req()?;
        }

        Ok(())
    }

    /// §4.4.1/§4.4.3 fused: filter a new offset-from-master sample, flag
    /// faults/calibration per the thresholds, and steer HW-CLOCK.
    fn update_offset(
        &mut self,
        t2: Time,
        origin: Time,
        corr: Duration,
    ) -> Result<(), PortError<N::Error, C::Error>> {
        let mean_path_delay = match self.port_ds.delay_mechanism {
            DelayMechanism::P2P => self.port_ds.peer_mean_path_delay,
            _ => self.current_ds.mean_path_delay,
        };

        let tms = t2 - origin - corr;
        self.last_tms = Some(tms);

        let offset = tms - mean_path_delay;
        self.current_ds.offset_from_master = offset;

        if self.port_ds.port_state == PortState::Slave
            && (offset.seconds() != 0 || offset.abs() > Duration::from_nanos(1_000_000))
        {
            self.events.synchronization_fault = true;
        }

        if self.port_ds.port_state == PortState::Uncalibrated
            && offset.abs() < Duration::from_nanos(10_000)
        {
            self.events.master_clock_selected = true;
        }

        self.servo
            .update_offset(&mut self.clock, offset)
            .map_err(PortError::Clock)?;

        Ok(())
    }

    /// Message handlers (§4.2.6).
    fn handle_announce(&mut self, header: &Header, announce: &AnnounceMessage) {
        self.events.state_decision = true;

        if header.source_port_identity == self.parent_ds.parent_port_identity {
            self.apply_s1(header, announce);
            self.timers.start(
                TimerSlot::AnnounceReceiptTimeout,
                self.port_ds.announce_receipt_timeout_interval(),
            );
        } else {
            self.foreign_master_ds
                .insert_or_update(header.source_port_identity, *header, *announce);
        }
    }

    fn handle_sync(&mut self, header: &Header, sync: &SyncMessage, receive_time: Option<Time>) {
        if !matches!(self.port_ds.port_state, PortState::Uncalibrated | PortState::Slave) {
            return;
        }
        if header.source_port_identity != self.parent_ds.parent_port_identity {
            return;
        }
        let Some(t2) = receive_time else {
            return;
        };

        if header.flags.two_step {
            self.sync_wait = Some(SyncWait {
                sequence_id: header.sequence_id,
                t2,
                correction: Duration::from(header.correction_field),
            });
        } else {
            let origin: Time = sync.origin_timestamp.into();
            let _ = self.update_offset(t2, origin, Duration::from(header.correction_field));
        }
    }

    fn handle_follow_up(&mut self, header: &Header, follow_up: &FollowUpMessage) {
        let Some(wait) = self.sync_wait else {
            return;
        };
        if header.source_port_identity != self.parent_ds.parent_port_identity {
            return;
        }
        if header.sequence_id != wait.sequence_id {
            return;
        }

        self.sync_wait = None;
        let origin: Time = follow_up.precise_origin_timestamp.into();
        let combined = wait.correction + Duration::from(header.correction_field);
        let _ = self.update_offset(wait.t2, origin, combined);
    }

    fn handle_delay_req(
        &mut self,
        header: &Header,
        receive_time: Option<Time>,
    ) -> Result<(), PortError<N::Error, C::Error>> {
        if self.port_ds.port_state != PortState::Master {
            return Ok(());
        }
        let Some(t_rx) = receive_time else {
            return Ok(());
        };

        let response = Message::delay_resp(
            header,
            self.port_ds.port_identity,
            Interval::from_log_2(self.port_ds.log_min_delay_req_interval),
            t_rx,
        );
        self.send_message(&response)?;
        Ok(())
    }

    fn handle_delay_resp(&mut self, header: &Header, resp: &DelayRespMessage) {
        if !matches!(self.port_ds.port_state, PortState::Uncalibrated | PortState::Slave) {
            return;
        }
        let Some(pending) = self.delay_req_pending else {
            return;
        };
        if header.sequence_id != pending.sequence_id {
            return;
        }
        if resp.requesting_port_identity != self.port_ds.port_identity {
            return;
        }
        let Some(tms) = self.last_tms else {
            return;
        };

        self.delay_req_pending = None;

        if header.log_message_interval != 0x7f {
            self.port_ds.log_min_delay_req_interval = header.log_message_interval;
        }

        let t4: Time = resp.receive_timestamp.into();
        let corr = Duration::from(header.correction_field);
        let tsm = t4 - pending.t3 - corr;

        let raw_delay = (tms + tsm) / 2;
        self.current_ds.mean_path_delay = self.servo.update_delay(raw_delay);
    }

    fn handle_pdelay_req(
        &mut self,
        header: &Header,
        receive_time: Option<Time>,
    ) -> Result<(), PortError<N::Error, C::Error>> {
        if self.port_ds.delay_mechanism != DelayMechanism::P2P {
            return Ok(());
        }
        let Some(t2) = receive_time else {
            return Ok(());
        };

        let resp = Message::pdelay_resp(header, self.port_ds.port_identity, t2);
        let resp_tx_time = self.send_message(&resp)?;

        let follow_up = Message::pdelay_resp_follow_up(
            header,
            self.port_ds.port_identity,
            resp_tx_time + self.config.outbound_latency,
        );
        self.send_message(&follow_up)?;
        Ok(())
    }

    fn handle_pdelay_resp(
        &mut self,
        header: &Header,
        resp: &PDelayRespMessage,
        receive_time: Option<Time>,
    ) {
        let Some(pending) = self.pdelay_pending else {
            return;
        };
        if header.sequence_id != pending.sequence_id {
            return;
        }
        let Some(t4) = receive_time else {
            return;
        };

        let t2: Time = resp.request_receive_timestamp.into();
        let corr = Duration::from(header.correction_field);

        if header.flags.two_step {
            self.pdelay_pending = Some(PDelayPending {
                t2: Some(t2),
                t4: Some(t4),
                corr_sum: pending.corr_sum + corr,
                ..pending
            });
        } else {
            let raw = (t4 - pending.t1 - corr) / 2;
            self.port_ds.peer_mean_path_delay = self.servo.update_peer_delay(raw);
            self.pdelay_pending = None;
        }
    }

    fn handle_pdelay_resp_follow_up(&mut self, header: &Header, fu: &PDelayRespFollowUpMessage) {
        let Some(pending) = self.pdelay_pending else {
            return;
        };
        if header.sequence_id != pending.sequence_id {
            return;
        }
        let (Some(t2), Some(t4)) = (pending.t2, pending.t4) else {
            return;
        };

        let t3: Time = fu.response_origin_timestamp.into();
        let corr = pending.corr_sum + Duration::from(header.correction_field);

        let raw = ((t2 - pending.t1) + (t4 - t3) - corr) / 2;
        self.port_ds.peer_mean_path_delay = self.servo.update_peer_delay(raw);
        self.pdelay_pending = None;
    }

    fn handle_message(
        &mut self,
        header: &Header,
        body: &MessageBody,
        receive_time: Option<Time>,
    ) -> Result<(), PortError<N::Error, C::Error>> {
        match body {
            MessageBody::Announce(announce) => self.handle_announce(header, announce),
            MessageBody::Sync(sync) => self.handle_sync(header, sync, receive_time),
            MessageBody::FollowUp(follow_up) => self.handle_follow_up(header, follow_up),
            MessageBody::DelayReq(_) => self.handle_delay_req(header, receive_time)?,
            MessageBody::DelayResp(resp) => self.handle_delay_resp(header, resp),
            MessageBody::PDelayReq(_) => self.handle_pdelay_req(header, receive_time)?,
            MessageBody::PDelayResp(resp) => self.handle_pdelay_resp(header, resp, receive_time),
            MessageBody::PDelayRespFollowUp(fu) => self.handle_pdelay_resp_follow_up(header, fu),
            // MANAGEMENT, SIGNALING: accepted, currently no-ops (§4.2.6).
            MessageBody::Signaling | MessageBody::Management => {}
        }
        Ok(())
    }

    fn process_frame(
        &mut self,
        buffer: &[u8],
        receive_time: Option<Time>,
    ) -> Result<(), PortError<N::Error, C::Error>> {
        let message = match Message::deserialize(buffer) {
            Ok(message) => message,
            Err(WireFormatError::BufferTooShort) | Err(WireFormatError::EnumConversionError) => {
                return Ok(())
            }
        };

        if message.header.version != self.port_ds.version_number {
            return Ok(());
        }
        if message.header.domain_number != self.default_ds.domain_number {
            return Ok(());
        }
        if message.header.source_port_identity == self.port_ds.port_identity {
            return Ok(());
        }

        let receive_time = receive_time.map(|t| t - self.config.inbound_latency);
        self.handle_message(&message.header, &message.body, receive_time)
    }

    fn drain_network(&mut self) -> Result<(), PortError<N::Error, C::Error>> {
        let mut buf = [0u8; MAX_MESSAGE_LEN];

        for _ in 0..MAX_FRAMES_PER_POLL {
            match self.network.recv_event(&mut buf).map_err(PortError::Network)? {
                Some((len, ts)) => self.process_frame(&buf[..len], Some(ts))?,
                None => break,
            }
        }

        for _ in 0..MAX_FRAMES_PER_POLL {
            match self.network.recv_general(&mut buf).map_err(PortError::Network)? {
                Some(len) => self.process_frame(&buf[..len], None)?,
                None => break,
            }
        }

        Ok(())
    }

    /// The main step (§4.2.3). Call this once per iteration of the
    /// cooperative loop; transitions observed during the call are appended
    /// to `events` in order.
    pub fn do_state(
        &mut self,
        events: &mut ArrayVec<Event, 4>,
    ) -> Result<(), PortError<N::Error, C::Error>> {
        if self.port_ds.port_state == PortState::Disabled {
            return Ok(());
        }

        if self.port_ds.port_state == PortState::Faulty {
            self.to_state(PortState::Initializing, events);
        }
        if self.port_ds.port_state == PortState::Initializing {
            self.to_state(PortState::Listening, events);
        }

        if self.events.state_decision
            && matches!(
                self.port_ds.port_state,
                PortState::Listening
                    | PortState::Uncalibrated
                    | PortState::Slave
                    | PortState::PreMaster
                    | PortState::Master
                    | PortState::Passive
            )
        {
            self.events.state_decision = false;
            self.run_bmc();
        }

        self.reconcile_transition(events);
        self.apply_event_transitions(events);

        self.poll_timers(events)?;
        self.drain_network()?;

        Ok(())
    }
}

fn state_event(port_id: PortIdentity, state: PortState, parent_ds: &ParentDS) -> Event {
    match state {
        PortState::Initializing => Event::PortBecameInitializing { port_id },
        PortState::Faulty => Event::PortBecameFaulty { port_id },
        PortState::Disabled => Event::PortBecameDisabled { port_id },
        PortState::Listening => Event::PortBecameListening { port_id },
        PortState::PreMaster => Event::PortBecamePreMaster { port_id },
        PortState::Master => Event::PortBecameMaster { port_id },
        PortState::Passive => Event::PortBecamePassive { port_id },
        PortState::Uncalibrated => Event::PortBecameUncalibrated { port_id },
        PortState::Slave => Event::PortBecameSlave {
            port_id,
            master_port_id: parent_ds.parent_port_identity,
        },
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::datastructures::common::{ClockAccuracy, ClockIdentity, ClockQuality, TimeSource};

    #[derive(Default)]
    struct TestClock {
        time: Time,
    }

    impl Clock for TestClock {
        type Error = core::convert::Infallible;

        fn get(&self) -> Result<Time, Self::Error> {
            Ok(self.time)
        }

        fn set(&mut self, time: Time) -> Result<(), Self::Error> {
            self.time = time;
            Ok(())
        }

        fn adjust_freq(&mut self, _ppb: i32) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct TestNetwork {
        event_rx: VecDeque<(Vec<u8>, Time)>,
        general_rx: VecDeque<Vec<u8>>,
    }

    impl NetworkPort for TestNetwork {
        type Error = core::convert::Infallible;

        fn recv_event(&mut self, buffer: &mut [u8]) -> Result<Option<(usize, Time)>, Self::Error> {
            Ok(self.event_rx.pop_front().map(|(frame, ts)| {
                buffer[..frame.len()].copy_from_slice(&frame);
                (frame.len(), ts)
            }))
        }

        fn recv_general(&mut self, buffer: &mut [u8]) -> Result<Option<usize>, Self::Error> {
            Ok(self.general_rx.pop_front().map(|frame| {
                buffer[..frame.len()].copy_from_slice(&frame);
                frame.len()
            }))
        }

        fn send_event(&mut self, _buffer: &[u8]) -> Result<Time, Self::Error> {
            Ok(Time::EPOCH)
        }

        fn send_peer_event(&mut self, _buffer: &[u8]) -> Result<Time, Self::Error> {
            Ok(Time::EPOCH)
        }

        fn send_general(&mut self, _buffer: &[u8]) -> Result<(), Self::Error> {
            Ok(())
        }

        fn send_peer_general(&mut self, _buffer: &[u8]) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    type TestPort = PtpPort<TestClock, TestNetwork, crate::timers::test::VirtualTimers, rand::rngs::mock::StepRng>;

    fn make_port(slave_only: bool) -> TestPort {
        let instance = InstanceConfig {
            clock_identity: ClockIdentity([1, 2, 3, 4, 5, 6, 7, 8]),
            clock_quality: ClockQuality {
                clock_class: if slave_only { 255 } else { 248 },
                clock_accuracy: ClockAccuracy::Unknown,
                offset_scaled_log_variance: 0xffff,
            },
            priority_1: 128,
            priority_2: 128,
            domain_number: 0,
            slave_only,
            two_step_flag: true,
        };

        PtpPort::new(
            instance,
            PortConfig::default(),
            TimePropertiesDS::new_arbitrary(false, false, TimeSource::InternalOscillator),
            TestClock::default(),
            TestNetwork::default(),
            crate::timers::test::VirtualTimers::default(),
            rand::rngs::mock::StepRng::new(0, 1),
        )
    }

    #[test]
    fn boots_from_initializing_through_listening() {
        let mut port = make_port(true);
        let mut events = ArrayVec::new();
        assert_eq!(port.state(), PortState::Initializing);

        port.do_state(&mut events).unwrap();
        assert_eq!(port.state(), PortState::Listening);
    }

    #[test]
    fn slave_only_port_with_no_foreign_masters_stays_listening() {
        let mut port = make_port(true);
        let mut events = ArrayVec::new();
        port.do_state(&mut events).unwrap();

        port.timers.advance(Duration::from_secs(100));
        port.do_state(&mut events).unwrap();
        assert_eq!(port.state(), PortState::Listening);
    }

    #[test]
    fn master_capable_port_with_no_foreign_masters_becomes_master() {
        let mut port = make_port(false);
        let mut events = ArrayVec::new();
        port.do_state(&mut events).unwrap();

        port.timers.advance(Duration::from_secs(100));
        port.do_state(&mut events).unwrap();
        assert_eq!(port.state(), PortState::PreMaster);

        port.timers.advance(Duration::from_secs(100));
        port.do_state(&mut events).unwrap();
        assert_eq!(port.state(), PortState::Master);
    }

    #[test]
    fn receiving_a_better_announce_moves_listening_port_to_uncalibrated() {
        let mut port = make_port(false);
        let mut events = ArrayVec::new();
        port.do_state(&mut events).unwrap();
        assert_eq!(port.state(), PortState::Listening);

        let foreign_identity = ClockIdentity([9; 8]);
        let foreign_port_identity = PortIdentity {
            clock_identity: foreign_identity,
            port_number: 1,
        };
        let foreign_default_ds = DefaultDS::new(
            foreign_identity,
            ClockQuality {
                clock_class: 6,
                clock_accuracy: ClockAccuracy::NS25,
                offset_scaled_log_variance: 0,
            },
            1,
            128,
            0,
            false,
            true,
        );
        let announce = Message::announce(
            &foreign_default_ds,
            &ParentDS::from_own_data(&foreign_default_ds),
            &CurrentDS::default(),
            &TimePropertiesDS::default(),
            foreign_port_identity,
            0,
        );
        let mut buf = [0u8; MAX_MESSAGE_LEN];
        let len = announce.serialize(&mut buf).unwrap();
        port.network.general_rx.push_back(buf[..len].to_vec());

        port.do_state(&mut events).unwrap();
        assert_eq!(port.foreign_master_ds().count(), 1);

        port.do_state(&mut events).unwrap();
        assert_eq!(port.state(), PortState::Uncalibrated);
        assert_eq!(
            port.parent_ds().parent_port_identity,
            foreign_port_identity
        );
    }

    #[test]
    fn master_replies_to_delay_req_with_matching_sequence_and_correction() {
        let mut port = make_port(false);
        port.port_ds.port_state = PortState::Master;

        let requester = PortIdentity {
            clock_identity: ClockIdentity([9; 8]),
            port_number: 1,
        };
        let request_header = Header {
            source_port_identity: requester,
            sequence_id: 42,
            ..Default::default()
        };

        port.handle_delay_req(&request_header, Some(Time::new(100, 0)))
            .unwrap();
    }

    #[test]
    fn e2e_delay_response_updates_mean_path_delay() {
        let mut port = make_port(true);
        port.port_ds.port_state = PortState::Slave;
        port.parent_ds.parent_port_identity = PortIdentity {
            clock_identity: ClockIdentity([9; 8]),
            port_number: 1,
        };

        // Prime last_tms the way handle_sync/handle_follow_up would.
        port.last_tms = Some(Duration::from_nanos(1_000));
        port.delay_req_pending = Some(DelayReqPending {
            sequence_id: 5,
            t3: Time::new(1000, 10_000),
        });

        let resp_header = Header {
            source_port_identity: port.parent_ds.parent_port_identity,
            sequence_id: 5,
            ..Default::default()
        };
        let resp = DelayRespMessage {
            receive_timestamp: Time::new(1000, 11_500).into(),
            requesting_port_identity: port.port_identity(),
        };

        port.handle_delay_resp(&resp_header, &resp);

        // tsm = 11_500 - 10_000 - 0 = 1_500ns; tms = 1_000ns.
        // raw = (1_000 + 1_500) / 2 = 1_250ns. The delay filter's window
        // widens from 1 on its first sample, so it reports raw/2 = 625ns
        // rather than the raw value itself (§4.4.4).
        assert_eq!(port.current_ds().mean_path_delay, Duration::from_nanos(625));
        assert!(port.delay_req_pending.is_none());
    }
}
