//! Engine version probing and the process-wide stats caches.
//!
//! Both caches are sticky for the process lifetime: engine versions and
//! `VIEW DATABASE STATE` grants are stable for a deployment, and probing
//! either requires a live connection. A permission granted after the first
//! probe is not observed until restart (or an explicit `invalidate_all`).

use lazy_static::lazy_static;
use parking_lot::RwLock;
use regex::Regex;
use std::collections::HashMap;
use tracing::{debug, error};

use super::connection::{
    test_open_connection, ConnectionSpec, SqlConnectionFactory, SqlValue, Statement,
};
use crate::error::{ChartError, Result};
use crate::metrics::STATS_CACHE_HITS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlServerVersion {
    V11,
    V12,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    pub version: SqlServerVersion,
    pub detailed: String,
}

lazy_static! {
    // Azure engines report e.g. "Microsoft SQL Azure (RTM) - 12.0.2000.8".
    static ref MAJOR_VERSION: Regex = Regex::new(r"-\s*(\d+)\.").unwrap();
}

impl VersionInfo {
    pub fn from_detailed(detailed: impl Into<String>) -> Self {
        let detailed = detailed.into();
        let major = MAJOR_VERSION
            .captures(&detailed)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok());

        let version = match major {
            Some(11) => SqlServerVersion::V11,
            Some(12) => SqlServerVersion::V12,
            _ => SqlServerVersion::Unknown,
        };

        VersionInfo { version, detailed }
    }
}

/// Injected (never ambient) concurrent caches for version and permission
/// probe results, keyed by `server:database:user`. Concurrent probes for the
/// same key may race; the first write wins and all racers agree on the value.
#[derive(Debug, Default)]
pub struct StatsCaches {
    versions: RwLock<HashMap<String, VersionInfo>>,
    permissions: RwLock<HashMap<String, bool>>,
}

impl StatsCaches {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cached_version(&self, key: &str) -> Option<VersionInfo> {
        let hit = self.versions.read().get(key).cloned();
        if hit.is_some() {
            STATS_CACHE_HITS.inc();
        }
        hit
    }

    pub fn store_version(&self, key: String, info: VersionInfo) -> VersionInfo {
        self.versions.write().entry(key).or_insert(info).clone()
    }

    pub fn cached_permission(&self, key: &str) -> Option<bool> {
        let hit = self.permissions.read().get(key).copied();
        if hit.is_some() {
            STATS_CACHE_HITS.inc();
        }
        hit
    }

    pub fn store_permission(&self, key: String, allowed: bool) -> bool {
        *self.permissions.write().entry(key).or_insert(allowed)
    }

    /// Drops everything. Intended for tests; production code relies on the
    /// process-lifetime stickiness.
    pub fn invalidate_all(&self) {
        self.versions.write().clear();
        self.permissions.write().clear();
    }
}

/// Resolve the engine version behind `spec`, memoized. Failure to probe is
/// surfaced, not cached: the next request retries.
pub async fn resolve_version(
    factory: &dyn SqlConnectionFactory,
    spec: &ConnectionSpec,
    caches: &StatsCaches,
) -> Result<VersionInfo> {
    let key = spec.cache_key();
    if let Some(info) = caches.cached_version(&key) {
        debug!(server = %spec.server, version = ?info.version, "version from cache");
        return Ok(info);
    }

    let mut connection = factory
        .connect(&spec.server, &spec.database, &spec.credentials)
        .await?;
    let result = connection.query(&Statement::new("SELECT @@VERSION")).await?;

    let detailed = result
        .rows
        .first()
        .and_then(|row| row.first_value())
        .and_then(|value| value.as_text())
        .ok_or_else(|| {
            ChartError::Connection(format!("{} returned no version row", spec.server))
        })?
        .to_string();

    Ok(caches.store_version(key, VersionInfo::from_detailed(detailed)))
}

const HAS_VIEW_DATABASE_STATE_SQL: &str = "\
select count(*) from sys.database_principals prin
left join sys.database_permissions perm on prin.principal_id = perm.grantee_principal_id
where prin.name=@User and permission_name = 'VIEW DATABASE STATE'";

/// Whether `spec`'s user can read the per-database resource stats view.
/// Checks connectivity then the `VIEW DATABASE STATE` grant; both are folded
/// into one cached boolean. Negative results are sticky.
pub async fn can_read_stats(
    factory: &dyn SqlConnectionFactory,
    spec: &ConnectionSpec,
    caches: &StatsCaches,
) -> bool {
    let key = spec.cache_key();
    if let Some(allowed) = caches.cached_permission(&key) {
        debug!(key = %key, allowed, "permission from cache");
        return allowed;
    }

    let allowed = probe_can_read_stats(factory, spec).await;
    caches.store_permission(key, allowed)
}

async fn probe_can_read_stats(factory: &dyn SqlConnectionFactory, spec: &ConnectionSpec) -> bool {
    let connection_result = test_open_connection(factory, spec).await;
    if !connection_result.is_success() {
        error!(
            server = %spec.server,
            database = %spec.database,
            result = ?connection_result,
            "couldn't connect to database for sys.dm_db_resource_stats"
        );
        return false;
    }

    match query_view_database_permission(factory, spec).await {
        Ok(true) => true,
        Ok(false) => {
            error!(
                user = %spec.credentials.username,
                database = %spec.database,
                "user doesn't have VIEW DATABASE STATE permission"
            );
            false
        }
        Err(e) => {
            error!(
                server = %spec.server,
                database = %spec.database,
                error = %e,
                "permission introspection query failed"
            );
            false
        }
    }
}

async fn query_view_database_permission(
    factory: &dyn SqlConnectionFactory,
    spec: &ConnectionSpec,
) -> Result<bool> {
    let mut connection = factory
        .connect(&spec.server, &spec.database, &spec.credentials)
        .await?;
    let statement = Statement::new(HAS_VIEW_DATABASE_STATE_SQL).bind(
        "User",
        SqlValue::Text(spec.credentials.username.clone()),
    );
    let result = connection.query(&statement).await?;

    let count = result
        .rows
        .first()
        .and_then(|row| row.first_value())
        .and_then(|value| value.as_f64())
        .unwrap_or(0.0);

    Ok(count != 0.0)
}
