//! Attribute payload primitives.
//!
//! Ports travel big-endian; every other integer attribute is in host byte
//! order. All byte-order decisions live here.

use common::{Error, Result};
use netlink_packet_core::{
    NLA_HEADER_SIZE, NlasIterator, parse_u8, parse_u16, parse_u16_be, parse_u32,
    parse_u64,
};

/// Largest attribute payload that fits the 16-bit length field.
pub const MAX_ATTR_PAYLOAD: usize = u16::MAX as usize - NLA_HEADER_SIZE;

pub(crate) fn port(payload: &[u8]) -> Result<u16> {
    parse_u16_be(payload).map_err(|e| Error::decode(format!("port: {}", e)))
}

pub(crate) fn u8_value(payload: &[u8], what: &str) -> Result<u8> {
    parse_u8(payload).map_err(|e| Error::decode(format!("{}: {}", what, e)))
}

pub(crate) fn u16_value(payload: &[u8], what: &str) -> Result<u16> {
    parse_u16(payload).map_err(|e| Error::decode(format!("{}: {}", what, e)))
}

pub(crate) fn u32_value(payload: &[u8], what: &str) -> Result<u32> {
    parse_u32(payload).map_err(|e| Error::decode(format!("{}: {}", what, e)))
}

pub(crate) fn u64_value(payload: &[u8], what: &str) -> Result<u64> {
    parse_u64(payload).map_err(|e| Error::decode(format!("{}: {}", what, e)))
}

/// Decode a NUL-terminated string, stopping at the first NUL.
pub(crate) fn c_string(payload: &[u8], what: &str) -> Result<String> {
    let end = payload.iter().position(|b| *b == 0).unwrap_or(payload.len());
    std::str::from_utf8(&payload[..end])
        .map(str::to_string)
        .map_err(|e| Error::decode(format!("{}: {}", what, e)))
}

/// Walk the attributes in `buf`, handing each kind and payload to `visit`.
///
/// A truncated header or a length running past the buffer aborts the walk
/// with a decode error.
pub(crate) fn for_each<F>(buf: &[u8], mut visit: F) -> Result<()>
where
    F: FnMut(u16, &[u8]) -> Result<()>,
{
    for nla in NlasIterator::new(buf) {
        let nla = nla.map_err(|e| Error::decode(format!("attribute: {}", e)))?;
        if usize::from(nla.length()) < NLA_HEADER_SIZE {
            return Err(Error::decode(format!(
                "attribute length {} shorter than header",
                nla.length()
            )));
        }
        visit(nla.kind(), nla.value())?;
    }
    Ok(())
}
