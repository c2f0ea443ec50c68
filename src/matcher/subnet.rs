use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use ipnet::Ipv4Net;

use crate::error::{AnalyzerError, Result};

/// Byte order of a raw 32-bit address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Big-endian, as found in packet headers and `in_addr_t`
    Network,
    /// Native integer value, `a.b.c.d` == `a << 24 | b << 16 | c << 8 | d`
    Host,
}

impl ByteOrder {
    fn to_host(self, value: u32) -> u32 {
        match self {
            ByteOrder::Network => u32::from_be(value),
            ByteOrder::Host => value,
        }
    }

    fn from_host(self, value: u32) -> u32 {
        match self {
            ByteOrder::Network => value.to_be(),
            ByteOrder::Host => value,
        }
    }
}

/// IPv4 subnet stored as network address and mask in host byte order.
///
/// The mask is always a contiguous prefix mask and the network address
/// never has bits set outside of the mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subnet {
    network: u32,
    mask: u32,
}

impl Subnet {
    /// Create a subnet from CIDR notation, e.g. `10.0.0.0/24`.
    pub fn from_cidr(cidr: &str) -> Result<Self> {
        let net: Ipv4Net = cidr
            .trim()
            .parse()
            .map_err(|_| AnalyzerError::InvalidSubnet(format!("invalid CIDR format [{}]", cidr)))?;
        Self::build(u32::from(net.addr()), u32::from(net.netmask()))
    }

    /// Create a subnet from a dotted-quad network and netmask pair.
    pub fn from_netmask(network: &str, netmask: &str) -> Result<Self> {
        let network: Ipv4Addr = network.trim().parse().map_err(|_| {
            AnalyzerError::InvalidSubnet(format!("invalid network address format [{}]", network))
        })?;
        let netmask: Ipv4Addr = netmask.trim().parse().map_err(|_| {
            AnalyzerError::InvalidSubnet(format!("invalid mask address format [{}]", netmask))
        })?;
        Self::build(u32::from(network), u32::from(netmask))
    }

    /// Create a subnet from raw 32-bit values in the given byte order.
    pub fn from_raw(network: u32, netmask: u32, order: ByteOrder) -> Result<Self> {
        Self::build(order.to_host(network), order.to_host(netmask))
    }

    fn build(network: u32, mask: u32) -> Result<Self> {
        // A prefix mask has no zero bit followed by a one bit.
        if mask & (!mask >> 1) != 0 {
            return Err(AnalyzerError::InvalidSubnet(format!(
                "invalid mask address [{}]",
                Ipv4Addr::from(mask)
            )));
        }
        Ok(Self {
            network: network & mask,
            mask,
        })
    }

    /// Check whether an address belongs to this subnet
    #[inline]
    pub fn contains(&self, address: Ipv4Addr) -> bool {
        self.contains_raw(u32::from(address), ByteOrder::Host)
    }

    /// Check whether a raw address belongs to this subnet
    #[inline]
    pub fn contains_raw(&self, address: u32, order: ByteOrder) -> bool {
        (order.to_host(address) & self.mask) == self.network
    }

    /// Check whether a textual address belongs to this subnet.
    /// Text that is not an IPv4 address never does.
    pub fn contains_str(&self, address: &str) -> bool {
        address
            .trim()
            .parse::<Ipv4Addr>()
            .is_ok_and(|ip| self.contains(ip))
    }

    pub fn network(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.network)
    }

    pub fn netmask(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.mask)
    }

    pub fn wildcard(&self) -> Ipv4Addr {
        Ipv4Addr::from(!self.mask)
    }

    pub fn broadcast(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.network | !self.mask)
    }

    /// Lowest usable host address
    pub fn first_host(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.network.wrapping_add(1))
    }

    /// Highest usable host address
    pub fn last_host(&self) -> Ipv4Addr {
        Ipv4Addr::from((self.network | !self.mask).wrapping_sub(1))
    }

    /// Number of host addresses, excluding network and broadcast
    pub fn addressable_hosts(&self) -> u32 {
        (!self.mask).saturating_sub(1)
    }

    pub fn prefix_len(&self) -> u8 {
        self.mask.leading_ones() as u8
    }

    /// Raw network address in the requested byte order
    pub fn network_raw(&self, order: ByteOrder) -> u32 {
        order.from_host(self.network)
    }

    /// Raw mask in the requested byte order
    pub fn netmask_raw(&self, order: ByteOrder) -> u32 {
        order.from_host(self.mask)
    }

    pub fn to_ipnet(&self) -> Result<Ipv4Net> {
        Ipv4Net::new(self.network(), self.prefix_len())
            .map_err(|e| AnalyzerError::InvalidSubnet(e.to_string()))
    }
}

impl FromStr for Subnet {
    type Err = AnalyzerError;

    fn from_str(s: &str) -> Result<Self> {
        Subnet::from_cidr(s)
    }
}

impl fmt::Display for Subnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network(), self.prefix_len())
    }
}

/// Parse a comma separated list of CIDR subnets.
pub fn parse_subnet_list(pattern: &str) -> Result<Vec<Subnet>> {
    let subnets = pattern
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Subnet::from_cidr)
        .collect::<Result<Vec<_>>>()?;

    if subnets.is_empty() {
        return Err(AnalyzerError::InvalidSubnet(format!(
            "no subnet in pattern [{}]",
            pattern
        )));
    }
    Ok(subnets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cidr() {
        let subnet = Subnet::from_cidr("10.0.0.0/24").unwrap();
        assert_eq!(subnet.network(), Ipv4Addr::new(10, 0, 0, 0));
        assert_eq!(subnet.netmask(), Ipv4Addr::new(255, 255, 255, 0));
        assert_eq!(subnet.prefix_len(), 24);
        assert_eq!(subnet.to_string(), "10.0.0.0/24");
    }

    #[test]
    fn test_from_cidr_masks_host_bits() {
        let subnet = Subnet::from_cidr("192.168.1.77/16").unwrap();
        assert_eq!(subnet.network(), Ipv4Addr::new(192, 168, 0, 0));
    }

    #[test]
    fn test_invalid_cidr() {
        assert!(Subnet::from_cidr("10.0.0.0/33").is_err());
        assert!(Subnet::from_cidr("not-an-ip/24").is_err());
        assert!(Subnet::from_cidr("10.0.0/24").is_err());
        assert!(Subnet::from_cidr("10.0.0.256/24").is_err());
        assert!(Subnet::from_cidr("10.0.0.0").is_err());
        assert!(Subnet::from_cidr("").is_err());
    }

    #[test]
    fn test_invalid_cidr_is_subnet_error() {
        let err = Subnet::from_cidr("10.0.0.0/33").unwrap_err();
        assert!(matches!(err, AnalyzerError::InvalidSubnet(_)));
    }

    #[test]
    fn test_from_netmask() {
        let subnet = Subnet::from_netmask("172.16.5.4", "255.240.0.0").unwrap();
        assert_eq!(subnet.network(), Ipv4Addr::new(172, 16, 0, 0));
        assert_eq!(subnet.prefix_len(), 12);
    }

    #[test]
    fn test_non_contiguous_mask_rejected() {
        assert!(Subnet::from_netmask("10.0.0.1", "255.255.0.255").is_err());
        assert!(Subnet::from_netmask("10.0.0.1", "0.255.255.255").is_err());
        assert!(Subnet::from_netmask("10.0.0.1", "255.255.255.0").is_ok());
        assert!(Subnet::from_netmask("10.0.0.1", "0.0.0.0").is_ok());
    }

    #[test]
    fn test_from_raw_byte_orders() {
        let host = Subnet::from_raw(0x0A00_0000, 0xFFFF_FF00, ByteOrder::Host).unwrap();
        let network = Subnet::from_raw(
            0x0A00_0000u32.to_be(),
            0xFFFF_FF00u32.to_be(),
            ByteOrder::Network,
        )
        .unwrap();
        assert_eq!(host, network);
        assert_eq!(network.network_raw(ByteOrder::Network), 0x0A00_0000u32.to_be());
        assert!(Subnet::from_raw(0, 0xFF00_FF00, ByteOrder::Host).is_err());
    }

    #[test]
    fn test_contains() {
        let subnet = Subnet::from_cidr("10.0.0.0/24").unwrap();
        assert!(subnet.contains(Ipv4Addr::new(10, 0, 0, 5)));
        assert!(subnet.contains(Ipv4Addr::new(10, 0, 0, 255)));
        assert!(!subnet.contains(Ipv4Addr::new(10, 0, 1, 5)));
        assert!(subnet.contains_str("10.0.0.9"));
        assert!(!subnet.contains_str("garbage"));
        assert!(!subnet.contains_str(""));
    }

    #[test]
    fn test_contains_raw_network_order() {
        let subnet = Subnet::from_cidr("192.168.0.0/16").unwrap();
        let addr = u32::from(Ipv4Addr::new(192, 168, 3, 4));
        assert!(subnet.contains_raw(addr, ByteOrder::Host));
        assert!(subnet.contains_raw(addr.to_be(), ByteOrder::Network));
    }

    #[test]
    fn test_zero_prefix_contains_everything() {
        let subnet = Subnet::from_cidr("0.0.0.0/0").unwrap();
        assert!(subnet.contains(Ipv4Addr::new(1, 2, 3, 4)));
        assert!(subnet.contains(Ipv4Addr::new(255, 255, 255, 255)));
    }

    #[test]
    fn test_host_range() {
        let subnet = Subnet::from_cidr("10.0.0.0/24").unwrap();
        assert_eq!(subnet.first_host(), Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(subnet.last_host(), Ipv4Addr::new(10, 0, 0, 254));
        assert_eq!(subnet.broadcast(), Ipv4Addr::new(10, 0, 0, 255));
        assert_eq!(subnet.wildcard(), Ipv4Addr::new(0, 0, 0, 255));
        assert_eq!(subnet.addressable_hosts(), 254);

        let single = Subnet::from_cidr("10.0.0.1/32").unwrap();
        assert_eq!(single.addressable_hosts(), 0);
    }

    #[test]
    fn test_to_ipnet() {
        let subnet = Subnet::from_cidr("10.1.0.0/16").unwrap();
        let net = subnet.to_ipnet().unwrap();
        assert_eq!(net.to_string(), "10.1.0.0/16");
    }

    #[test]
    fn test_parse_subnet_list() {
        let subnets = parse_subnet_list("10.0.0.0/24, 192.168.1.0/24,").unwrap();
        assert_eq!(subnets.len(), 2);
        assert_eq!(subnets[1].network(), Ipv4Addr::new(192, 168, 1, 0));

        assert!(parse_subnet_list("10.0.0.0/24,bogus").is_err());
        assert!(parse_subnet_list(" , ").is_err());
    }
}
