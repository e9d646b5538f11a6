//! Chart target parsing.
//!
//! A chart is identified by a URI whose scheme names the resource kind:
//!
//! - `dummy://demo`
//! - `sql-database://{server}/{database}/{counter}`
//! - `subscription://{account}/websites/{webspace}/{site}/{counter}`
//! - `subscription://{account}/cloud-services/{service}/{slot}/{role}/{counter}`
//!
//! The URI is parsed exactly once, at the boundary, into a closed set of
//! typed targets; everything downstream dispatches on these enums.

use std::time::Duration;
use url::Url;

use crate::error::{ChartError, Result};
use crate::window;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlCounterKind {
    Cpu,
    LogIo,
    DataIo,
    Storage,
    Memory,
    Sessions,
    AvgMemoryUsage,
}

impl SqlCounterKind {
    fn parse(token: &str) -> Result<Self> {
        match token {
            "cpu" => Ok(SqlCounterKind::Cpu),
            "logio" => Ok(SqlCounterKind::LogIo),
            "dataio" => Ok(SqlCounterKind::DataIo),
            "storage" => Ok(SqlCounterKind::Storage),
            "memory" => Ok(SqlCounterKind::Memory),
            "sessions" => Ok(SqlCounterKind::Sessions),
            "avg_memory_usage" => Ok(SqlCounterKind::AvgMemoryUsage),
            other => Err(ChartError::UnsupportedTarget(other.to_string())),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SqlCounterKind::Cpu => "CPU",
            SqlCounterKind::LogIo => "Log I/O",
            SqlCounterKind::DataIo => "Data I/O",
            SqlCounterKind::Storage => "Storage",
            SqlCounterKind::Memory => "Memory",
            SqlCounterKind::Sessions => "Sessions",
            SqlCounterKind::AvgMemoryUsage => "Average memory usage",
        }
    }

    /// Engine metric columns backing this chart, in display order.
    pub fn metrics(&self) -> &'static [&'static str] {
        match self {
            SqlCounterKind::Cpu => &["avg_cpu_percent"],
            SqlCounterKind::LogIo => &["avg_log_write_percent"],
            SqlCounterKind::DataIo => &["avg_physical_data_read_percent", "avg_data_io_percent"],
            SqlCounterKind::Storage => &["storage_in_megabytes"],
            SqlCounterKind::Memory => &["active_memory_used_kb"],
            SqlCounterKind::Sessions => &["active_session_count"],
            SqlCounterKind::AvgMemoryUsage => &["avg_memory_usage_percent"],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudServiceCounterKind {
    Cpu,
    Disk,
    Network,
}

impl CloudServiceCounterKind {
    fn parse(token: &str) -> Result<Self> {
        match token {
            "cpu" => Ok(CloudServiceCounterKind::Cpu),
            "disk" => Ok(CloudServiceCounterKind::Disk),
            "network" => Ok(CloudServiceCounterKind::Network),
            other => Err(ChartError::UnsupportedTarget(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebsiteCounterKind {
    Requests,
    Cpu,
    Memory,
    Traffic,
    ResponseTimes,
}

impl WebsiteCounterKind {
    fn parse(token: &str) -> Result<Self> {
        match token {
            "requests" => Ok(WebsiteCounterKind::Requests),
            "cpu" => Ok(WebsiteCounterKind::Cpu),
            "memory" => Ok(WebsiteCounterKind::Memory),
            "traffic" => Ok(WebsiteCounterKind::Traffic),
            "response-times" => Ok(WebsiteCounterKind::ResponseTimes),
            other => Err(ChartError::UnsupportedTarget(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudServiceRoleId {
    pub account: String,
    pub service: String,
    pub slot: String,
    pub role: String,
}

impl CloudServiceRoleId {
    pub fn display_name(&self) -> String {
        format!("{}/{}", self.service, self.role)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebsiteId {
    pub account: String,
    pub webspace: String,
    pub site: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChartTarget {
    Dummy,
    SqlDatabase {
        server: String,
        database: String,
        counter: SqlCounterKind,
    },
    CloudService {
        role: CloudServiceRoleId,
        counter: CloudServiceCounterKind,
    },
    Website {
        site: WebsiteId,
        counter: WebsiteCounterKind,
    },
}

/// A fully parsed chart request: the typed target plus the query duration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartRequest {
    pub target: ChartTarget,
    pub duration: Duration,
}

impl ChartRequest {
    pub fn parse(uri: &str) -> Result<Self> {
        let url = Url::parse(uri)?;

        let mut interval = None;
        let mut unit = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "interval" => interval = Some(value.into_owned()),
                "unit" => unit = Some(value.into_owned()),
                _ => {}
            }
        }
        let duration = window::compute_duration(interval.as_deref(), unit.as_deref())?;

        let target = parse_target(&url)?;

        Ok(ChartRequest { target, duration })
    }
}

fn parse_target(url: &Url) -> Result<ChartTarget> {
    let host = url
        .host_str()
        .ok_or_else(|| ChartError::InvalidUri(format!("missing host in {}", url)))?
        .to_string();

    let segments: Vec<&str> = url
        .path()
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();

    match url.scheme() {
        "dummy" => Ok(ChartTarget::Dummy),

        "sql-database" => {
            let [database, counter] = require_segments::<2>(url, &segments)?;
            Ok(ChartTarget::SqlDatabase {
                server: host,
                database: database.to_string(),
                counter: SqlCounterKind::parse(counter)?,
            })
        }

        "subscription" => match segments.first().copied() {
            Some("websites") => {
                let [_, webspace, site, counter] = require_segments::<4>(url, &segments)?;
                Ok(ChartTarget::Website {
                    site: WebsiteId {
                        account: host,
                        webspace: webspace.to_string(),
                        site: site.to_string(),
                    },
                    counter: WebsiteCounterKind::parse(counter)?,
                })
            }
            Some("cloud-services") => {
                let [_, service, slot, role, counter] = require_segments::<5>(url, &segments)?;
                Ok(ChartTarget::CloudService {
                    role: CloudServiceRoleId {
                        account: host,
                        service: service.to_string(),
                        slot: slot.to_string(),
                        role: role.to_string(),
                    },
                    counter: CloudServiceCounterKind::parse(counter)?,
                })
            }
            Some(other) => Err(ChartError::UnsupportedTarget(other.to_string())),
            None => Err(ChartError::InvalidUri(format!(
                "missing resource path in {}",
                url
            ))),
        },

        other => Err(ChartError::UnsupportedTarget(other.to_string())),
    }
}

fn require_segments<'a, const N: usize>(url: &Url, segments: &[&'a str]) -> Result<[&'a str; N]> {
    <[&str; N]>::try_from(segments)
        .map_err(|_| ChartError::InvalidUri(format!("unexpected path shape in {}", url)))
}
