//! Hardware address recovery from SLAAC-style IPv6 addresses.
//!
//! An interface identifier built with modified EUI-64 is the 48-bit MAC with
//! `ff:fe` wedged between its third and fourth octets and the
//! universal/local bit inverted (RFC 4291, appendix A). Undoing that gives
//! back the MAC the router put on the wire.

use crate::error::Error;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::net::Ipv6Addr;

const EUI64_MARKER: [u8; 2] = [0xFF, 0xFE];
const UNIVERSAL_LOCAL_BIT: u8 = 0x02;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    /// IEEE canonical form, e.g. `AA-BB-CC-DD-EE-FF`.
    pub fn to_hyphenated(&self) -> String {
        self.0
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect::<Vec<_>>()
            .join("-")
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bs = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            bs[0], bs[1], bs[2], bs[3], bs[4], bs[5]
        )
    }
}

impl Serialize for MacAddress {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Recovers the MAC address embedded in a modified EUI-64 interface identifier.
///
/// Addresses whose identifier does not carry the `ff:fe` marker (manually
/// configured, privacy or stable-secret addresses) are rejected rather than
/// turned into a bogus MAC.
pub fn derive_mac_from_eui64(address: &Ipv6Addr) -> Result<MacAddress, Error> {
    let octets = address.octets();
    let mut eui64 = [0u8; 8];
    eui64.copy_from_slice(&octets[8..]);
    eui64[0] ^= UNIVERSAL_LOCAL_BIT;

    if eui64[3..5] != EUI64_MARKER {
        return Err(Error::malformed_input(
            address,
            "interface identifier lacks the ff:fe EUI-64 marker",
        ));
    }

    let mut mac = [0u8; 6];
    mac[..3].copy_from_slice(&eui64[..3]);
    mac[3..].copy_from_slice(&eui64[5..]);
    Ok(MacAddress(mac))
}

/// Parses `address` as IPv6 and derives its MAC.
pub fn derive_mac_from_str(address: &str) -> Result<MacAddress, Error> {
    let parsed: Ipv6Addr = address
        .parse()
        .map_err(|_| Error::malformed_input(address, "not an IPv6 address"))?;
    derive_mac_from_eui64(&parsed)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamedAddressAssignment {
    pub name: String,
    pub ipv6: String,
    pub mac: MacAddress,
}

/// Name to address pairings, in the order the names were given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AddressAssignments(Vec<NamedAddressAssignment>);

impl AddressAssignments {
    pub fn get(&self, name: &str) -> Option<&NamedAddressAssignment> {
        self.0.iter().find(|a| a.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NamedAddressAssignment> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Picks the addresses containing `prefix`, sorts them as text and hands
/// them out to `names` positionally.
///
/// Sorting is on the textual form, not numeric IPv6 order. Surplus
/// addresses are dropped and surplus names stay unassigned.
pub fn select_and_name_addresses<I, S>(
    all_addresses: I,
    prefix: &str,
    names: &[impl AsRef<str>],
) -> Result<AddressAssignments, Error>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let candidates: BTreeSet<String> = all_addresses
        .into_iter()
        .filter(|addr| addr.as_ref().contains(prefix))
        .map(|addr| addr.as_ref().to_string())
        .collect();

    let assignments = names
        .iter()
        .zip(candidates)
        .map(|(name, ipv6)| {
            let mac = derive_mac_from_str(&ipv6)?;
            Ok(NamedAddressAssignment {
                name: name.as_ref().to_string(),
                ipv6,
                mac,
            })
        })
        .collect::<Result<Vec<_>, Error>>()?;

    Ok(AddressAssignments(assignments))
}
