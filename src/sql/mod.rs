pub mod client;
pub mod connection;
pub mod database_stats;
pub mod server_stats;
pub mod version;

pub use client::SqlServerUsageClient;
pub use connection::{
    ConnectionSpec, QueryRows, SqlConnection, SqlConnectionFactory, SqlRow, SqlValue, Statement,
    TestConnectionResult,
};
pub use version::{SqlServerVersion, StatsCaches, VersionInfo};
