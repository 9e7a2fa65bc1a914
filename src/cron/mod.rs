pub mod jobs;
mod scheduler;
mod trigger;

pub use jobs::JobContext;
pub use scheduler::CronScheduler;
pub use trigger::{JobKind, JobTrigger};
