//! IPVS address and netmask representations.
//!
//! The kernel stores addresses in a 16-byte union: IPv4 addresses occupy the
//! first four bytes and the remainder is zero. Neither form carries its own
//! family, so every conversion back to [`IpAddr`] takes an [`AddressFamily`].

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use crate::types::AddressFamily;

const V4_IN_V6_PREFIX: [u8; 12] = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xff, 0xff];

/// An IPv4 or IPv6 address in the kernel's 16-byte layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Address([u8; 16]);

impl Address {
    /// Wrap raw kernel bytes without normalisation.
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Build an address from a 4-byte IPv4 or 16-byte IPv6 buffer.
    ///
    /// IPv4-mapped IPv6 input (`::ffff:a.b.c.d`) is stored as IPv4. Any other
    /// length returns `None`.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let mut out = [0u8; 16];
        match bytes.len() {
            4 => out[..4].copy_from_slice(bytes),
            16 if bytes[..12] == V4_IN_V6_PREFIX => out[..4].copy_from_slice(&bytes[12..]),
            16 => out.copy_from_slice(bytes),
            _ => return None,
        }
        Some(Self(out))
    }

    /// Copy a kernel address payload, left-justified, without normalisation.
    pub(crate) fn from_raw(bytes: &[u8]) -> Option<Self> {
        if bytes.len() > 16 {
            return None;
        }
        let mut out = [0u8; 16];
        out[..bytes.len()].copy_from_slice(bytes);
        Some(Self(out))
    }

    /// Clear the bytes `family` does not use, so IPv4 keeps only its first four.
    pub(crate) fn for_family(mut self, family: AddressFamily) -> Self {
        if family == AddressFamily::Inet {
            self.0[4..].fill(0);
        }
        self
    }

    /// The address bytes as sent for `family`: 4 bytes for IPv4, 16 otherwise.
    pub fn to_bytes(&self, family: AddressFamily) -> &[u8] {
        match family {
            AddressFamily::Inet => &self.0[..4],
            _ => &self.0,
        }
    }

    /// The full 16-byte buffer.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Convert to a standard address, if `family` is IPv4 or IPv6.
    pub fn to_ip(&self, family: AddressFamily) -> Option<IpAddr> {
        match family {
            AddressFamily::Inet => {
                let [a, b, c, d, ..] = self.0;
                Some(IpAddr::V4(Ipv4Addr::new(a, b, c, d)))
            }
            AddressFamily::Inet6 => Some(IpAddr::V6(Ipv6Addr::from(self.0))),
            _ => None,
        }
    }

    pub fn is_unspecified(&self) -> bool {
        self.0 == [0u8; 16]
    }
}

impl From<Ipv4Addr> for Address {
    fn from(ip: Ipv4Addr) -> Self {
        let mut out = [0u8; 16];
        out[..4].copy_from_slice(&ip.octets());
        Self(out)
    }
}

impl From<Ipv6Addr> for Address {
    fn from(ip: Ipv6Addr) -> Self {
        match ip.to_ipv4_mapped() {
            Some(v4) => Self::from(v4),
            None => Self(ip.octets()),
        }
    }
}

impl From<IpAddr> for Address {
    fn from(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(v4) => Self::from(v4),
            IpAddr::V6(v6) => Self::from(v6),
        }
    }
}

/// Persistence netmask of a virtual service.
///
/// IPv4 masks are kept verbatim, including non-contiguous ones. IPv6 masks
/// are always prefixes, so only the prefix length is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Netmask {
    /// No mask set. Every accessor reports absence.
    #[default]
    Invalid,
    /// Literal IPv4 mask bytes.
    V4([u8; 4]),
    /// IPv6 prefix length, 0 to 128.
    V6(u8),
}

/// Error returned when a netmask cannot be decoded or parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid netmask: {0}")]
pub struct NetmaskError(String);

impl Netmask {
    /// Literal IPv4 mask.
    pub const fn from_v4(mask: [u8; 4]) -> Self {
        Self::V4(mask)
    }

    /// IPv6 prefix mask; `None` if `prefix` exceeds 128.
    pub fn from_v6_prefix(prefix: u8) -> Option<Self> {
        (prefix <= 128).then_some(Self::V6(prefix))
    }

    /// Contiguous mask of `ones` leading bits out of `bits` (32 or 128).
    ///
    /// Returns [`Netmask::Invalid`] when the arguments are out of range.
    pub fn from_prefix(ones: u8, bits: u8) -> Self {
        match bits {
            32 if ones <= 32 => {
                let mask = u32::MAX.checked_shl(32 - u32::from(ones)).unwrap_or(0);
                Self::V4(mask.to_be_bytes())
            }
            128 if ones <= 128 => Self::V6(ones),
            _ => Self::Invalid,
        }
    }

    /// Interpret a 4-byte IPv4 or 16-byte IPv6 mask.
    ///
    /// A 16-byte mask must be a contiguous prefix; anything else is Invalid.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        match bytes.len() {
            4 => {
                let mut mask = [0u8; 4];
                mask.copy_from_slice(bytes);
                Self::V4(mask)
            }
            16 => contiguous_prefix(bytes).map_or(Self::Invalid, Self::V6),
            _ => Self::Invalid,
        }
    }

    /// Interpret `bytes` as a mask for `family`.
    ///
    /// IPv4 requires 4 bytes and IPv6 16 bytes; other families fall back to
    /// the length of the input.
    pub fn from_bytes_with_family(bytes: &[u8], family: AddressFamily) -> Self {
        match (family, bytes.len()) {
            (AddressFamily::Inet, 4) | (AddressFamily::Inet6, 16) => Self::from_bytes(bytes),
            (AddressFamily::Inet | AddressFamily::Inet6, _) => Self::Invalid,
            _ => Self::from_bytes(bytes),
        }
    }

    /// Compact wire form: 4 mask bytes for IPv4, one prefix byte for IPv6,
    /// nothing for Invalid.
    pub fn to_wire(&self) -> Vec<u8> {
        match self {
            Self::Invalid => Vec::new(),
            Self::V4(mask) => mask.to_vec(),
            Self::V6(prefix) => vec![*prefix],
        }
    }

    /// Inverse of [`Netmask::to_wire`].
    pub fn from_wire(bytes: &[u8]) -> Result<Self, NetmaskError> {
        match bytes {
            [] => Ok(Self::Invalid),
            [prefix] => Self::from_v6_prefix(*prefix)
                .ok_or_else(|| NetmaskError(format!("IPv6 prefix length {prefix}"))),
            [a, b, c, d] => Ok(Self::V4([*a, *b, *c, *d])),
            other => Err(NetmaskError(format!("wire length {}", other.len()))),
        }
    }

    /// Expanded mask bytes: 4 for IPv4, 16 for IPv6.
    pub fn to_mask_bytes(&self) -> Option<Vec<u8>> {
        match self {
            Self::Invalid => None,
            Self::V4(mask) => Some(mask.to_vec()),
            Self::V6(prefix) => {
                let bits = u128::MAX
                    .checked_shl(128u32.saturating_sub(u32::from(*prefix)))
                    .unwrap_or(0);
                Some(bits.to_be_bytes().to_vec())
            }
        }
    }

    /// Number of leading one bits, if the mask is a contiguous prefix.
    pub fn prefix_len(&self) -> Option<u8> {
        match self {
            Self::Invalid => None,
            Self::V4(mask) => contiguous_prefix(mask),
            Self::V6(prefix) => Some(*prefix),
        }
    }

    pub fn as_v4(&self) -> Option<[u8; 4]> {
        match self {
            Self::V4(mask) => Some(*mask),
            _ => None,
        }
    }

    pub fn v6_prefix(&self) -> Option<u8> {
        match self {
            Self::V6(prefix) => Some(*prefix),
            _ => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self, Self::Invalid)
    }

    pub fn is_v4(&self) -> bool {
        matches!(self, Self::V4(_))
    }

    pub fn is_v6(&self) -> bool {
        matches!(self, Self::V6(_))
    }
}

/// Leading one bits of `mask`, or `None` if a one follows a zero.
fn contiguous_prefix(mask: &[u8]) -> Option<u8> {
    let mut ones = 0u8;
    let mut bytes = mask.iter();
    for &byte in bytes.by_ref() {
        let lead = byte.leading_ones() as u8;
        ones += lead;
        if lead < 8 {
            if byte << lead != 0 {
                return None;
            }
            break;
        }
    }
    bytes.all(|b| *b == 0).then_some(ones)
}

impl fmt::Display for Netmask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid => write!(f, "invalid mask"),
            Self::V4(mask) => write!(f, "{}", Ipv4Addr::from(*mask)),
            Self::V6(prefix) => write!(f, "{}", prefix),
        }
    }
}

impl FromStr for Netmask {
    type Err = NetmaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Self::Invalid);
        }
        if s.contains('.') {
            let ip: Ipv4Addr = s
                .parse()
                .map_err(|_| NetmaskError(format!("not a dotted quad: {s:?}")))?;
            return Ok(Self::V4(ip.octets()));
        }
        let prefix: u8 = s
            .parse()
            .map_err(|_| NetmaskError(format!("not a prefix length: {s:?}")))?;
        Self::from_v6_prefix(prefix).ok_or_else(|| NetmaskError(format!("IPv6 prefix length {prefix}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_from_bytes() {
        let v4 = Address::from_bytes(&[127, 0, 0, 1]).unwrap();
        assert_eq!(v4.as_bytes()[..4], [127, 0, 0, 1]);
        assert!(v4.as_bytes()[4..].iter().all(|b| *b == 0));

        let mapped: Ipv6Addr = "::ffff:127.0.0.1".parse().unwrap();
        assert_eq!(Address::from_bytes(&mapped.octets()), Some(v4));

        let v6: Ipv6Addr = "2001:db8:85a3::8a2e:370:7334".parse().unwrap();
        assert_eq!(Address::from_bytes(&v6.octets()).unwrap().as_bytes(), &v6.octets());

        assert_eq!(Address::from_bytes(&[1, 2, 3]), None);
    }

    #[test]
    fn test_address_leading_v6() {
        let ip: Ipv6Addr = "ff00::".parse().unwrap();
        let addr = Address::from(ip);
        let mut expected = [0u8; 16];
        expected[0] = 0xff;
        assert_eq!(addr, Address::new(expected));
        assert_eq!(addr.to_ip(AddressFamily::Inet6), Some(IpAddr::V6(ip)));
    }

    #[test]
    fn test_address_to_ip() {
        let addr = Address::from(Ipv4Addr::new(127, 0, 0, 1));
        assert_eq!(
            addr.to_ip(AddressFamily::Inet),
            Some(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)))
        );
        assert_eq!(addr.to_bytes(AddressFamily::Inet), &[127, 0, 0, 1]);
        assert_eq!(addr.to_bytes(AddressFamily::Inet6).len(), 16);
        assert_eq!(addr.to_ip(AddressFamily::Unspecified), None);
    }

    #[test]
    fn test_address_for_family() {
        let mut raw = [9u8; 16];
        raw[..4].copy_from_slice(&[10, 0, 0, 1]);
        let addr = Address::new(raw);

        let v4 = addr.for_family(AddressFamily::Inet);
        assert_eq!(v4, Address::from(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(addr.for_family(AddressFamily::Inet6), addr);
        assert_eq!(addr.for_family(AddressFamily::Unspecified), addr);
    }

    #[test]
    fn test_netmask_from_prefix() {
        assert_eq!(Netmask::from_prefix(0, 32), Netmask::V4([0, 0, 0, 0]));
        assert_eq!(Netmask::from_prefix(24, 32), Netmask::V4([255, 255, 255, 0]));
        assert_eq!(Netmask::from_prefix(31, 32), Netmask::V4([255, 255, 255, 254]));
        assert_eq!(Netmask::from_prefix(32, 32), Netmask::V4([255; 4]));
        assert_eq!(Netmask::from_prefix(96, 128), Netmask::V6(96));
        assert_eq!(Netmask::from_prefix(255, 32), Netmask::Invalid);
        assert_eq!(Netmask::from_prefix(8, 64), Netmask::Invalid);
    }

    #[test]
    fn test_netmask_from_bytes() {
        assert_eq!(Netmask::from_bytes(&[0, 0, 255, 0]), Netmask::V4([0, 0, 255, 0]));
        assert_eq!(Netmask::from_bytes(&[0xff; 16]), Netmask::V6(128));
        assert_eq!(Netmask::from_bytes(&[0; 16]), Netmask::V6(0));

        let mut slash96 = [0xffu8; 16];
        slash96[12..].fill(0);
        assert_eq!(Netmask::from_bytes(&slash96), Netmask::V6(96));

        let mut slash65 = [0u8; 16];
        slash65[..8].fill(0xff);
        slash65[8] = 0x80;
        assert_eq!(Netmask::from_bytes(&slash65), Netmask::V6(65));

        let mut non_prefix = [0u8; 16];
        non_prefix[..4].fill(0xff);
        non_prefix[8..12].fill(0xff);
        assert_eq!(Netmask::from_bytes(&non_prefix), Netmask::Invalid);

        let mut hole = [0xffu8; 16];
        hole[3] = 0xfe;
        assert_eq!(Netmask::from_bytes(&hole), Netmask::Invalid);

        assert_eq!(Netmask::from_bytes(&[255, 255]), Netmask::Invalid);
    }

    #[test]
    fn test_netmask_from_bytes_with_family() {
        assert_eq!(
            Netmask::from_bytes_with_family(&[255, 255, 0, 0], AddressFamily::Inet),
            Netmask::V4([255, 255, 0, 0])
        );
        assert_eq!(
            Netmask::from_bytes_with_family(&[255, 255, 0, 0], AddressFamily::Inet6),
            Netmask::Invalid
        );
        assert_eq!(
            Netmask::from_bytes_with_family(&[0xff; 16], AddressFamily::Inet),
            Netmask::Invalid
        );
        assert_eq!(
            Netmask::from_bytes_with_family(&[0xff; 16], AddressFamily::Inet6),
            Netmask::V6(128)
        );
    }

    #[test]
    fn test_netmask_accessors() {
        let v4 = Netmask::V4([255, 0, 255, 0]);
        assert!(v4.is_valid() && v4.is_v4() && !v4.is_v6());
        assert_eq!(v4.as_v4(), Some([255, 0, 255, 0]));
        assert_eq!(v4.v6_prefix(), None);
        assert_eq!(v4.prefix_len(), None);

        let v6 = Netmask::V6(128);
        assert!(v6.is_valid() && v6.is_v6() && !v6.is_v4());
        assert_eq!(v6.as_v4(), None);
        assert_eq!(v6.prefix_len(), Some(128));

        let invalid = Netmask::Invalid;
        assert!(!invalid.is_valid() && !invalid.is_v4() && !invalid.is_v6());
        assert_eq!(invalid.as_v4(), None);
        assert_eq!(invalid.v6_prefix(), None);
        assert_eq!(invalid.prefix_len(), None);
        assert_eq!(invalid.to_mask_bytes(), None);
        assert!(invalid.to_wire().is_empty());
    }

    #[test]
    fn test_netmask_prefix_len() {
        for ones in 0..=32 {
            assert_eq!(Netmask::from_prefix(ones, 32).prefix_len(), Some(ones));
        }
        for ones in 0..=128 {
            assert_eq!(Netmask::from_prefix(ones, 128).prefix_len(), Some(ones));
        }
    }

    #[test]
    fn test_netmask_to_mask_bytes() {
        assert_eq!(
            Netmask::V4([255, 255, 255, 0]).to_mask_bytes(),
            Some(vec![255, 255, 255, 0])
        );
        assert_eq!(Netmask::V6(128).to_mask_bytes(), Some(vec![0xff; 16]));
        assert_eq!(Netmask::V6(0).to_mask_bytes(), Some(vec![0; 16]));

        let mut slash96 = vec![0xffu8; 16];
        slash96[12..].fill(0);
        assert_eq!(Netmask::V6(96).to_mask_bytes(), Some(slash96));
    }

    #[test]
    fn test_netmask_wire() {
        assert_eq!(Netmask::from_prefix(31, 32).to_wire(), vec![0xff, 0xff, 0xff, 0xfe]);
        assert_eq!(Netmask::V4([0xff, 0, 0xff, 0]).to_wire(), vec![0xff, 0, 0xff, 0]);
        assert_eq!(Netmask::V6(128).to_wire(), vec![128]);

        assert_eq!(Netmask::from_wire(&[]), Ok(Netmask::Invalid));
        assert_eq!(Netmask::from_wire(&[56]), Ok(Netmask::V6(56)));
        assert_eq!(Netmask::from_wire(&[255, 0, 255, 0]), Ok(Netmask::V4([255, 0, 255, 0])));
        assert!(Netmask::from_wire(&[129]).is_err());
        assert!(Netmask::from_wire(&[1, 2]).is_err());
    }

    #[test]
    fn test_netmask_wire_round_trip_v6() {
        for prefix in 0..=128u8 {
            let mask = Netmask::V6(prefix);
            assert_eq!(Netmask::from_wire(&mask.to_wire()), Ok(mask));
        }
    }

    #[test]
    fn test_netmask_wire_round_trip_v4() {
        // Walks every byte value in each position, plus every prefix.
        for pos in 0..4 {
            for value in 0..=255u8 {
                let mut bytes = [0xa5u8; 4];
                bytes[pos] = value;
                let mask = Netmask::V4(bytes);
                assert_eq!(Netmask::from_wire(&mask.to_wire()), Ok(mask));
            }
        }
        for ones in 0..=32 {
            let mask = Netmask::from_prefix(ones, 32);
            assert_eq!(Netmask::from_wire(&mask.to_wire()), Ok(mask));
        }
    }

    #[test]
    fn test_netmask_text() {
        assert_eq!(Netmask::Invalid.to_string(), "invalid mask");
        assert_eq!(Netmask::from_prefix(31, 32).to_string(), "255.255.255.254");
        assert_eq!(Netmask::V4([0xff, 0, 0xff, 0]).to_string(), "255.0.255.0");
        assert_eq!(Netmask::V6(128).to_string(), "128");
        assert_eq!(Netmask::V4([0; 4]).to_string(), "0.0.0.0");
        assert_eq!(Netmask::V6(0).to_string(), "0");

        assert_eq!("".parse(), Ok(Netmask::Invalid));
        assert_eq!("255.255.255.254".parse(), Ok(Netmask::V4([255, 255, 255, 254])));
        assert_eq!("255.0.255.0".parse(), Ok(Netmask::V4([255, 0, 255, 0])));
        assert_eq!("56".parse(), Ok(Netmask::V6(56)));
        assert!("129".parse::<Netmask>().is_err());
        assert!("255.0".parse::<Netmask>().is_err());
    }

    #[test]
    fn test_netmask_text_round_trip() {
        for ones in 0..=32 {
            let mask = Netmask::from_prefix(ones, 32);
            assert_eq!(mask.to_string().parse(), Ok(mask));
        }
        for ones in 0..=128 {
            let mask = Netmask::from_prefix(ones, 128);
            assert_eq!(mask.to_string().parse(), Ok(mask));
        }
    }
}
