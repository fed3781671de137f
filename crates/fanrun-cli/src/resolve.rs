//! Concurrent host lookup.
//!
//! Each unit resolves one host name; the deliver step expands a lookup into
//! one record per address.

use std::net::{IpAddr, SocketAddr};

use clap::ValueEnum;
use fanrun_core::{Pipeline, PipelineError};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Host resolved when no input is given.
pub const LOCAL_HOST: &str = "localhost";

/// Errors from a single lookup.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Failed to resolve '{host}': {source}")]
    Resolve {
        host: String,
        #[source]
        source: std::io::Error,
    },
}

/// Address family filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Family {
    /// Keep every address.
    #[default]
    Any,
    /// IPv4 only.
    V4,
    /// IPv6 only.
    V6,
}

impl Family {
    fn matches(&self, addr: &IpAddr) -> bool {
        match self {
            Self::Any => true,
            Self::V4 => addr.is_ipv4(),
            Self::V6 => addr.is_ipv6(),
        }
    }
}

/// Addresses found for one host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup {
    pub host: String,
    pub addresses: Vec<SocketAddr>,
}

/// One address of a looked-up host, as written to output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressRecord {
    pub host: String,
    pub address: IpAddr,
    pub port: u16,
    pub family: &'static str,
}

/// Resolve `host` (or [`LOCAL_HOST`]) and keep addresses of `family`.
///
/// An empty address list after filtering is not an error.
pub async fn resolve(host: Option<String>, port: u16, family: Family) -> Result<Lookup, LookupError> {
    let host = host.unwrap_or_else(|| LOCAL_HOST.to_string());

    let resolved = tokio::net::lookup_host((host.as_str(), port))
        .await
        .map_err(|source| LookupError::Resolve {
            host: host.clone(),
            source,
        })?;

    let mut addresses: Vec<SocketAddr> = Vec::new();
    for addr in resolved.filter(|addr| family.matches(&addr.ip())) {
        if !addresses.contains(&addr) {
            addresses.push(addr);
        }
    }

    debug!(host = %host, addresses = addresses.len(), "Resolved host");
    Ok(Lookup { host, addresses })
}

/// Expand a lookup into one record per address.
pub fn project(lookup: Lookup) -> Vec<AddressRecord> {
    let Lookup { host, addresses } = lookup;
    addresses
        .into_iter()
        .map(|addr| AddressRecord {
            host: host.clone(),
            address: addr.ip(),
            port: addr.port(),
            family: if addr.is_ipv4() { "IPv4" } else { "IPv6" },
        })
        .collect()
}

/// Deliver a lookup by writing each of its address records.
pub fn deliver_lookup<P>(lookup: Lookup, pipeline: &mut P) -> Result<(), PipelineError>
where
    P: Pipeline<Object = AddressRecord>,
{
    for record in project(lookup) {
        pipeline.write_object(record)?;
    }
    Ok(())
}
