mod client;
mod ops;
mod transaction;

pub use client::PostgresClient;
pub use transaction::PgTransaction;
