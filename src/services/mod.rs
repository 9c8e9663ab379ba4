// Service exports
pub mod oracle;
pub mod postgres;
pub mod store;

pub use oracle::{HttpOracle, Oracle, OracleError};
pub use postgres::PostgresStore;
pub use store::{Store, StoreError};
