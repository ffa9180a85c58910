use crate::time::Duration;

/// Current-DS (§3.3): steps-removed from the grandmaster and the two
/// quantities the servo maintains.
#[derive(Default, Copy, Clone, Debug, PartialEq)]
pub struct CurrentDS {
    pub steps_removed: u16,
    pub offset_from_master: Duration,
    pub mean_path_delay: Duration,
}
