use anyhow::{Context, Result};
use ipnetwork::Ipv4Network;
use std::net::Ipv4Addr;

/// Inclusive range of IPv4 addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Range {
    pub start_addr: Ipv4Addr,
    pub end_addr: Ipv4Addr,
}

impl Ipv4Range {
    pub fn new(start_addr: Ipv4Addr, end_addr: Ipv4Addr) -> Self {
        Self {
            start_addr,
            end_addr,
        }
    }

    /// Empty when `start_addr > end_addr`.
    pub fn iter(&self) -> impl Iterator<Item = Ipv4Addr> {
        let start: u32 = self.start_addr.into();
        let end: u32 = self.end_addr.into();
        (start..=end).map(Ipv4Addr::from)
    }
}

/// Usable host addresses of an IPv4 CIDR block such as `192.168.1.0/24`.
///
/// Network and broadcast addresses are left out, except for `/31` and `/32`
/// blocks which have no room for them.
pub fn hosts(cidr: &str) -> Result<Vec<Ipv4Addr>> {
    let network: Ipv4Network = cidr
        .trim()
        .parse()
        .with_context(|| format!("Invalid CIDR block: {cidr}"))?;

    let all = Ipv4Range::new(network.network(), network.broadcast());
    if network.prefix() >= 31 {
        return Ok(all.iter().collect());
    }

    let start = u32::from(network.network()) + 1;
    let end = u32::from(network.broadcast()) - 1;
    Ok(Ipv4Range::new(start.into(), end.into()).iter().collect())
}

/// Every address from `start` to `end`, both included.
pub fn ip_range(start: Ipv4Addr, end: Ipv4Addr) -> Vec<Ipv4Addr> {
    Ipv4Range::new(start, end).iter().collect()
}
