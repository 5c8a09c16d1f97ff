mod device_status;
pub use device_status::DeviceStatus;

mod presence;
pub use presence::DevicePresence;

mod variables;
pub use variables::{ExecutionVariables, VarValue};

mod job;
pub use job::{Job, JobId};

mod job_state;
pub use job_state::{JOB_INFO_FILE, JobInfo, JobState};

mod details;
pub use details::{DeviceDetails, RegisteredDevice, ReservationDetails};

mod statistic;
pub use statistic::{Statistic, StatisticFormat};

/// Name of a job queue a worker may reserve from.
pub type QueueName = String;

/// Identifier assigned to a device by the registry.
pub type DeviceId = String;
