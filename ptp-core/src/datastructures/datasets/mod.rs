//! The protocol datasets an ordinary clock maintains (§3.3).

mod current;
mod default;
mod foreign_master;
mod parent;
mod port;
mod time_properties;

pub use current::CurrentDS;
pub use default::DefaultDS;
pub use foreign_master::{
    ForeignMasterDS, ForeignMasterRecord, DEFAULT_FOREIGN_MASTER_CAPACITY, MAX_FOREIGN_RECORDS,
};
pub use parent::ParentDS;
pub use port::{DelayMechanism, PortDS, PortState};
pub use time_properties::TimePropertiesDS;
