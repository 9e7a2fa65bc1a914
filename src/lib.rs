pub mod cache;
pub mod chain;
pub mod config;
pub mod cron;
pub mod db;
pub mod service;
pub mod utils;

pub use cache::{CacheAside, MokaStore};
pub use chain::CosmosRestReader;
pub use config::Settings;
pub use cron::{CronScheduler, JobContext, JobKind, JobTrigger};
pub use db::Database;
pub use service::QueryService;
