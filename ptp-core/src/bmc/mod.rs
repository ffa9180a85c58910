//! PTP-ENGINE's Best Master Clock logic (§4.3): deciding, from the
//! announce messages a port has collected, whether this clock should be
//! MASTER, SLAVE (and to whom), PASSIVE or LISTENING. Grounded on
//! `ptpd_bmc.c`'s `ptpd_bmc`/`ptpd_state_decision` state-decision
//! algorithm, simplified to a single-port ordinary clock (no boundary-clock
//! port-to-port arbitration).

pub mod dataset_comparison;

use dataset_comparison::{ComparisonDataset, DatasetOrdering};

use crate::datastructures::{
    common::PortIdentity,
    datasets::{DefaultDS, ForeignMasterDS, ForeignMasterRecord},
};

fn better_or_equal(a: &ComparisonDataset, b: &ComparisonDataset) -> bool {
    !matches!(a.compare(b), DatasetOrdering::Worse | DatasetOrdering::WorseByTopology)
}

/// Scan Foreign-Master-DS for the best-qualified candidate master, i.e. the
/// ptpd "Ebest" (§4.3.2). `None` if the ring is empty.
pub fn best_foreign_master(foreign: &ForeignMasterDS) -> Option<&ForeignMasterRecord> {
    let mut best: Option<(&ForeignMasterRecord, ComparisonDataset)> = None;

    for record in foreign.iter() {
        let candidate = ComparisonDataset::from_announce_message(
            &record.header,
            &record.announce,
            &record.port_identity,
        );

        best = Some(match best {
            None => (record, candidate),
            Some((best_record, best_candidate)) => {
                if better_or_equal(&candidate, &best_candidate) && candidate != best_candidate {
                    (record, candidate)
                } else {
                    (best_record, best_candidate)
                }
            }
        });
    }

    best.map(|(record, _)| record)
}

/// The outcome of the state decision algorithm for a single port (§4.3.3,
/// Table 17 collapsed to the ordinary-clock case).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecommendedState {
    /// M1/M2: this clock is its own best master.
    Master,
    /// No qualified foreign master and this clock cannot be a master either
    /// (slave-only, or clock-class 255).
    Listening,
    /// S1: `erbest` beats this clock's own dataset; port should synchronize
    /// to the named master.
    Slave(PortIdentity),
}

/// Decide the recommended state for a port given its own Default-DS and its
/// Foreign-Master-DS (§4.3.2-4.3.3).
pub fn state_decision(default_ds: &DefaultDS, foreign: &ForeignMasterDS) -> RecommendedState {
    let own = ComparisonDataset::from_own_data(default_ds);

    match best_foreign_master(foreign) {
        None => {
            if default_ds.is_master_candidate() {
                RecommendedState::Master
            } else {
                RecommendedState::Listening
            }
        }
        Some(erbest) => {
            let erbest_cd = ComparisonDataset::from_announce_message(
                &erbest.header,
                &erbest.announce,
                &erbest.port_identity,
            );

            if better_or_equal(&own, &erbest_cd) {
                RecommendedState::Master
            } else {
                RecommendedState::Slave(erbest.port_identity)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastructures::{
        common::{ClockAccuracy, ClockIdentity, ClockQuality},
        messages::{AnnounceMessage, Header},
    };

    fn default_ds(priority_1: u8) -> DefaultDS {
        DefaultDS::new(
            ClockIdentity([9; 8]),
            ClockQuality {
                clock_class: 248,
                clock_accuracy: ClockAccuracy::Unknown,
                offset_scaled_log_variance: 0xffff,
            },
            priority_1,
            128,
            0,
            false,
            true,
        )
    }

    fn foreign_record(identity: u8, priority_1: u8) -> ForeignMasterRecord {
        let port_identity = PortIdentity {
            clock_identity: ClockIdentity([identity; 8]),
            port_number: 1,
        };
        ForeignMasterRecord {
            port_identity,
            header: Header {
                source_port_identity: port_identity,
                ..Default::default()
            },
            announce: AnnounceMessage {
                grandmaster_priority_1: priority_1,
                grandmaster_clock_quality: ClockQuality {
                    clock_class: 6,
                    clock_accuracy: ClockAccuracy::NS25,
                    offset_scaled_log_variance: 0,
                },
                grandmaster_priority_2: 128,
                grandmaster_identity: port_identity.clock_identity,
                ..Default::default()
            },
        }
    }

    #[test]
    fn empty_foreign_master_ds_and_master_capable_recommends_master() {
        let default_ds = default_ds(128);
        let foreign = ForeignMasterDS::new(5);
        assert_eq!(state_decision(&default_ds, &foreign), RecommendedState::Master);
    }

    #[test]
    fn empty_foreign_master_ds_and_slave_only_recommends_listening() {
        let mut default_ds = default_ds(128);
        default_ds.slave_only = true;
        let foreign = ForeignMasterDS::new(5);
        assert_eq!(
            state_decision(&default_ds, &foreign),
            RecommendedState::Listening
        );
    }

    #[test]
    fn better_foreign_master_recommends_slave() {
        let default_ds = default_ds(200);
        let mut foreign = ForeignMasterDS::new(5);
        let record = foreign_record(1, 1);
        foreign.insert_or_update(record.port_identity, record.header, record.announce);

        assert_eq!(
            state_decision(&default_ds, &foreign),
            RecommendedState::Slave(record.port_identity)
        );
    }

    #[test]
    fn worse_foreign_master_recommends_master() {
        let default_ds = default_ds(1);
        let mut foreign = ForeignMasterDS::new(5);
        let record = foreign_record(1, 200);
        foreign.insert_or_update(record.port_identity, record.header, record.announce);

        assert_eq!(state_decision(&default_ds, &foreign), RecommendedState::Master);
    }
}
