//! IPv6 source addresses from a classic libpcap capture file.
//!
//! Only the framing needed to reach the IPv6 header is parsed. pcapng files
//! are rejected by their magic number.

use std::collections::BTreeSet;
use std::net::Ipv6Addr;
use std::path::Path;
use thiserror::Error;

const MAGIC_MICROS: u32 = 0xa1b2_c3d4;
const MAGIC_NANOS: u32 = 0xa1b2_3c4d;
const GLOBAL_HEADER_LEN: usize = 24;
const RECORD_HEADER_LEN: usize = 16;

const LINKTYPE_ETHERNET: u32 = 1;
const LINKTYPE_RAW: u32 = 101;
const LINKTYPE_LINUX_SLL: u32 = 113;

const ETHERTYPE_IPV6: u16 = 0x86dd;
const ETHERTYPE_VLAN: u16 = 0x8100;
const ETHERTYPE_QINQ: u16 = 0x88a8;

const ETHERNET_HEADER_LEN: usize = 14;
const VLAN_TAG_LEN: usize = 4;
const SLL_HEADER_LEN: usize = 16;
const IPV6_SOURCE: std::ops::Range<usize> = 8..24;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CaptureError {
    #[error("not a libpcap capture (magic {0:#010x})")]
    BadMagic(u32),
    #[error("unsupported link type {0}")]
    UnsupportedLinkType(u32),
    #[error("capture truncated at byte {0}")]
    Truncated(usize),
}

#[derive(Debug, Clone, Copy)]
enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    fn u32(self, bytes: [u8; 4]) -> u32 {
        match self {
            ByteOrder::Little => u32::from_le_bytes(bytes),
            ByteOrder::Big => u32::from_be_bytes(bytes),
        }
    }
}

fn read_array<const N: usize>(data: &[u8], offset: usize) -> Result<[u8; N], CaptureError> {
    data.get(offset..offset + N)
        .and_then(|slice| slice.try_into().ok())
        .ok_or(CaptureError::Truncated(data.len()))
}

fn detect_byte_order(data: &[u8]) -> Result<ByteOrder, CaptureError> {
    let magic = read_array::<4>(data, 0)?;
    for order in [ByteOrder::Little, ByteOrder::Big] {
        if matches!(order.u32(magic), MAGIC_MICROS | MAGIC_NANOS) {
            return Ok(order);
        }
    }
    Err(CaptureError::BadMagic(u32::from_be_bytes(magic)))
}

/// Strips link framing, returning the payload only when it carries IPv6.
fn ipv6_payload(link_type: u32, frame: &[u8]) -> Option<&[u8]> {
    match link_type {
        LINKTYPE_ETHERNET => {
            let mut offset = ETHERNET_HEADER_LEN - 2;
            let mut ethertype = u16::from_be_bytes(read_array(frame, offset).ok()?);
            while matches!(ethertype, ETHERTYPE_VLAN | ETHERTYPE_QINQ) {
                offset += VLAN_TAG_LEN;
                ethertype = u16::from_be_bytes(read_array(frame, offset).ok()?);
            }
            (ethertype == ETHERTYPE_IPV6).then(|| &frame[offset + 2..])
        }
        LINKTYPE_LINUX_SLL => {
            let protocol = u16::from_be_bytes(read_array(frame, SLL_HEADER_LEN - 2).ok()?);
            (protocol == ETHERTYPE_IPV6).then(|| &frame[SLL_HEADER_LEN..])
        }
        _ => {
            // Raw IP: the version nibble tells v4 from v6.
            let version = frame.first()? >> 4;
            (version == 6).then_some(frame)
        }
    }
}

/// Every distinct IPv6 source address in an in-memory capture.
pub fn ipv6_sources(data: &[u8]) -> Result<BTreeSet<Ipv6Addr>, CaptureError> {
    let order = detect_byte_order(data)?;
    let link_type = order.u32(read_array(data, 20)?);
    if !matches!(
        link_type,
        LINKTYPE_ETHERNET | LINKTYPE_RAW | LINKTYPE_LINUX_SLL
    ) {
        return Err(CaptureError::UnsupportedLinkType(link_type));
    }

    let mut sources = BTreeSet::new();
    let mut offset = GLOBAL_HEADER_LEN;
    while offset < data.len() {
        let included = order.u32(read_array(data, offset + 8)?) as usize;
        let start = offset + RECORD_HEADER_LEN;
        let frame = data
            .get(start..start + included)
            .ok_or(CaptureError::Truncated(data.len()))?;
        offset = start + included;

        let Some(packet) = ipv6_payload(link_type, frame) else {
            continue;
        };
        if let Some(source) = packet.get(IPV6_SOURCE) {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(source);
            sources.insert(Ipv6Addr::from(octets));
        }
    }

    Ok(sources)
}

pub fn read_ipv6_sources(path: &Path) -> anyhow::Result<BTreeSet<Ipv6Addr>> {
    use anyhow::Context;
    let data = std::fs::read(path).with_context(|| format!("Reading {}", path.display()))?;
    ipv6_sources(&data).with_context(|| format!("Parsing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put32(out: &mut Vec<u8>, value: u32, big_endian: bool) {
        if big_endian {
            out.extend_from_slice(&value.to_be_bytes());
        } else {
            out.extend_from_slice(&value.to_le_bytes());
        }
    }

    fn global_header(magic: u32, link_type: u32, big_endian: bool) -> Vec<u8> {
        let mut out = Vec::new();
        put32(&mut out, magic, big_endian);
        // version 2.4
        let version = if big_endian { [0, 2, 0, 4] } else { [2, 0, 4, 0] };
        out.extend_from_slice(&version);
        for field in [0, 0, 65535, link_type] {
            put32(&mut out, field, big_endian);
        }
        out
    }

    fn record(frame: &[u8], big_endian: bool) -> Vec<u8> {
        let mut out = Vec::new();
        for field in [1, 0, frame.len() as u32, frame.len() as u32] {
            put32(&mut out, field, big_endian);
        }
        out.extend_from_slice(frame);
        out
    }

    fn ipv6_header(source: Ipv6Addr) -> Vec<u8> {
        let mut out = vec![0x60, 0, 0, 0, 0, 0, 58, 255];
        out.extend_from_slice(&source.octets());
        out.extend_from_slice(&Ipv6Addr::LOCALHOST.octets());
        out
    }

    fn ethernet(ethertype: u16, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![0xff; 6];
        out.extend_from_slice(&[0xca, 0x02, 0x0a, 0x1c, 0x00, 0x08]);
        out.extend_from_slice(&ethertype.to_be_bytes());
        out.extend_from_slice(payload);
        out
    }

    fn addr(text: &str) -> Ipv6Addr {
        text.parse().unwrap()
    }

    #[test]
    fn test_ethernet_capture() {
        let r2 = addr("2001:db8:1:0:c802:aff:fe1c:8");
        let mut data = global_header(MAGIC_MICROS, LINKTYPE_ETHERNET, false);
        data.extend(record(&ethernet(ETHERTYPE_IPV6, &ipv6_header(r2)), false));
        data.extend(record(&ethernet(0x0800, &[0x45; 20]), false));
        data.extend(record(&ethernet(ETHERTYPE_IPV6, &ipv6_header(r2)), false));

        let sources = ipv6_sources(&data).unwrap();
        assert_eq!(sources.into_iter().collect::<Vec<_>>(), [r2]);
    }

    #[test]
    fn test_vlan_tagged_frame() {
        let src = addr("fe80::c803:aff:fe1c:8");
        let mut tagged = vec![0x00, 0x0a];
        tagged.extend_from_slice(&ETHERTYPE_IPV6.to_be_bytes());
        tagged.extend(ipv6_header(src));

        let mut data = global_header(MAGIC_MICROS, LINKTYPE_ETHERNET, false);
        data.extend(record(&ethernet(ETHERTYPE_VLAN, &tagged), false));
        assert!(ipv6_sources(&data).unwrap().contains(&src));
    }

    #[test]
    fn test_big_endian_nanosecond_raw_ip() {
        let src = addr("2001:db8:1::1");
        let mut data = global_header(MAGIC_NANOS, LINKTYPE_RAW, true);
        data.extend(record(&ipv6_header(src), true));
        data.extend(record(&[0x45; 20], true));
        assert_eq!(ipv6_sources(&data).unwrap().len(), 1);
    }

    #[test]
    fn test_linux_cooked_capture() {
        let src = addr("2001:db8:1::2");
        let mut frame = vec![0u8; SLL_HEADER_LEN - 2];
        frame.extend_from_slice(&ETHERTYPE_IPV6.to_be_bytes());
        frame.extend(ipv6_header(src));

        let mut data = global_header(MAGIC_MICROS, LINKTYPE_LINUX_SLL, false);
        data.extend(record(&frame, false));
        assert!(ipv6_sources(&data).unwrap().contains(&src));
    }

    #[test]
    fn test_truncated_record() {
        let mut data = global_header(MAGIC_MICROS, LINKTYPE_ETHERNET, false);
        let mut rec = record(&ethernet(ETHERTYPE_IPV6, &ipv6_header(Ipv6Addr::LOCALHOST)), false);
        rec.truncate(rec.len() - 5);
        data.extend(rec);
        assert!(matches!(
            ipv6_sources(&data),
            Err(CaptureError::Truncated(_))
        ));
    }

    #[test]
    fn test_rejects_other_formats() {
        // pcapng section header block
        let pcapng = [0x0a, 0x0d, 0x0d, 0x0a, 0, 0, 0, 0];
        assert_eq!(
            ipv6_sources(&pcapng),
            Err(CaptureError::BadMagic(0x0a0d0d0a))
        );
        let wifi = global_header(MAGIC_MICROS, 105, false);
        assert_eq!(
            ipv6_sources(&wifi),
            Err(CaptureError::UnsupportedLinkType(105))
        );
    }

    #[test]
    fn test_empty_capture() {
        let data = global_header(MAGIC_MICROS, LINKTYPE_RAW, false);
        assert!(ipv6_sources(&data).unwrap().is_empty());
    }
}
