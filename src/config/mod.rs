#[allow(clippy::module_inception)]
mod config;

pub use config::{
    CacheSettings, ChainApiSettings, JobSettings, PostgresSettings, Settings,
};
