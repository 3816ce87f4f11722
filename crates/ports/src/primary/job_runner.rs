use chrono::{DateTime, Utc};

use domain::common::error::RunnerError;
use domain::monitor::entity::{Monitor, ScheduledJob};

/// Primary port: the contract the external job scheduler drives.
///
/// `run_job` validates the job kind and hands the run to a child task; it
/// must not block on the run itself. `post_index`/`post_delete` fire the
/// alert-move housekeeping after a monitor definition changed; their
/// failures are logged by the implementation, never surfaced to the
/// scheduler.
pub trait JobRunner: Send + Sync {
    /// Accepts only Monitor jobs; any other kind is an argument error.
    fn run_job(
        &self,
        job: ScheduledJob,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> Result<(), RunnerError>;

    /// A monitor definition was written (created or updated).
    fn post_index(&self, monitor: &Monitor);

    /// A monitor definition was deleted.
    fn post_delete(&self, monitor_id: &str);
}
