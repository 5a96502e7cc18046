use crate::csnmp::ObjectIdentifier;
use crate::error::Error;
use crate::query_engine::SnmpAgent;
use anyhow::Result;
use serde::Serialize;
use tracing::{trace, warn};

/// ipAdEntAddr: the index carries the address itself.
pub const IPV4_ADDRESS_COLUMN: &str = "1.3.6.1.2.1.4.20.1.1";
/// ipAddressIfIndex column of the protocol-independent ipAddressTable.
pub const IPV6_ADDRESS_COLUMN: &str = "1.3.6.1.2.1.4.34.1.3";

/// The netmask column is not consulted; every IPv4 address is reported as a /24.
const IPV4_PREFIX_LEN: u8 = 24;
const IPV6_PREFIX_LEN: u8 = 64;

const IPV6_COLUMN_ARCS: [u32; 10] = [1, 3, 6, 1, 2, 1, 4, 34, 1, 3];

/// Index layout of an ipAddressTable row as this decoder reads it:
/// `[ifIndex][addressType][16 address octets]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv6AddressIndex {
    pub if_index: u32,
    pub address_type: u32,
    pub address: [u8; 16],
}

impl Ipv6AddressIndex {
    const LEN: usize = 18;

    /// `Ok(None)` when `oid` is outside the ipAddressIfIndex column or its
    /// index is too short to hold an address.
    fn from_oid(oid: &ObjectIdentifier) -> Result<Option<Self>, Error> {
        let Some(arcs) = oid.arcs().strip_prefix(&IPV6_COLUMN_ARCS[..]) else {
            return Ok(None);
        };
        if arcs.len() < Self::LEN {
            return Ok(None);
        }

        let mut address = [0u8; 16];
        for (octet, arc) in address.iter_mut().zip(&arcs[2..Self::LEN]) {
            *octet = u8::try_from(*arc)
                .map_err(|_| Error::malformed_oid(oid, "address octet above 255"))?;
        }

        Ok(Some(Self {
            if_index: arcs[0],
            address_type: arcs[1],
            address,
        }))
    }

    /// Eight fully-padded colon-separated groups, no zero compression.
    fn to_colon_hex(&self) -> String {
        self.address
            .chunks(2)
            .map(|pair| format!("{:02x}{:02x}", pair[0], pair[1]))
            .collect::<Vec<_>>()
            .join(":")
    }

    fn to_cidr(&self) -> String {
        format!("{}/{IPV6_PREFIX_LEN}", self.to_colon_hex())
    }
}

/// Turns an ipAdEntAddr row identifier into `a.b.c.d/24`.
pub fn decode_ipv4_binding(oid: &ObjectIdentifier) -> Result<String, Error> {
    let octets = oid
        .tail(4)
        .ok_or_else(|| Error::malformed_oid(oid, "fewer than four components"))?;
    let address = octets
        .iter()
        .map(|arc| arc.to_string())
        .collect::<Vec<_>>()
        .join(".");
    Ok(format!("{address}/{IPV4_PREFIX_LEN}"))
}

/// Turns an ipAddressTable row identifier into a `/64` colon-hex string.
///
/// Rows from another column or with an index too short to hold an address
/// are skipped (`Ok(None)`) rather than reported as errors.
pub fn decode_ipv6_binding(oid: &ObjectIdentifier) -> Result<Option<String>, Error> {
    let Some(index) = Ipv6AddressIndex::from_oid(oid)? else {
        return Ok(None);
    };
    trace!(
        "ifIndex {} type {} carries {:02x?}",
        index.if_index,
        index.address_type,
        index.address
    );
    Ok(Some(index.to_cidr()))
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct IpTable {
    pub v4: Vec<String>,
    pub v6: Vec<String>,
}

impl IpTable {
    pub(crate) async fn from_snmp(agent: &SnmpAgent) -> Result<IpTable> {
        let (v4_rows, v6_rows) = tokio::join!(
            agent.walk(IPV4_ADDRESS_COLUMN),
            agent.walk(IPV6_ADDRESS_COLUMN),
        );

        let mut table = IpTable::default();
        for (oid, _) in v4_rows? {
            match decode_ipv4_binding(&oid) {
                Ok(cidr) => table.v4.push(cidr),
                Err(e) => warn!("Skipping IPv4 row from {}: {e}", agent.address),
            }
        }
        for (oid, _) in v6_rows? {
            match decode_ipv6_binding(&oid) {
                Ok(Some(cidr)) => table.v6.push(cidr),
                Ok(None) => {}
                Err(e) => warn!("Skipping IPv6 row from {}: {e}", agent.address),
            }
        }

        Ok(table)
    }
}
