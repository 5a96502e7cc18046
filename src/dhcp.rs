use crate::address_codec::AddressAssignments;
use anyhow::{bail, Context, Result};
use ipnetwork::Ipv4Network;
use serde::Deserialize;
use std::net::Ipv4Addr;

/// A fixed lease tied to the MAC learned for one interface.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct HostReservation {
    pub pool: String,
    pub host: Ipv4Addr,
    pub interface: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DhcpPlan {
    pub network: Ipv4Addr,
    pub prefix_len: u8,
    pub default_router: Ipv4Addr,
    pub excluded: Vec<Ipv4Addr>,
    pub reservations: Vec<HostReservation>,
    pub dynamic_pool: String,
    /// Inclusive range kept out of the dynamic pool.
    pub dynamic_excluded: (Ipv4Addr, Ipv4Addr),
    pub lease_days: u32,
}

impl Default for DhcpPlan {
    fn default() -> Self {
        let net = |last| Ipv4Addr::new(198, 51, 101, last);
        Self {
            network: net(0),
            prefix_len: 24,
            default_router: net(5),
            excluded: vec![net(5), net(254)],
            reservations: vec![
                HostReservation {
                    pool: "R2_POOL".to_string(),
                    host: net(2),
                    interface: "R2-F0/0".to_string(),
                },
                HostReservation {
                    pool: "R3_POOL".to_string(),
                    host: net(4),
                    interface: "R3-F0/0".to_string(),
                },
            ],
            dynamic_pool: "R4_POOL".to_string(),
            dynamic_excluded: (net(1), net(5)),
            lease_days: 1,
        }
    }
}

impl DhcpPlan {
    /// IOS configuration lines for the DHCP server, in the order they are
    /// entered.
    pub fn config_commands(&self, assignments: &AddressAssignments) -> Result<Vec<String>> {
        let network = Ipv4Network::new(self.network, self.prefix_len)
            .with_context(|| format!("Invalid DHCP network {}/{}", self.network, self.prefix_len))?;
        let mask = network.mask();
        let mut commands = vec!["service dhcp".to_string()];
        commands.extend(
            self.excluded
                .iter()
                .map(|addr| format!("ip dhcp excluded-address {addr}")),
        );

        for reservation in &self.reservations {
            let Some(assignment) = assignments.get(&reservation.interface) else {
                bail!(
                    "No MAC address learned for {} (needed by {})",
                    reservation.interface,
                    reservation.pool
                );
            };
            commands.push(format!("ip dhcp pool {}", reservation.pool));
            commands.push(format!("host {} {mask}", reservation.host));
            commands.push(format!(
                "hardware-address {} ieee802",
                assignment.mac.to_hyphenated()
            ));
            commands.push(format!("default-router {}", self.default_router));
            commands.push("exit".to_string());
        }

        let (first, last) = self.dynamic_excluded;
        commands.push(format!("ip dhcp pool {}", self.dynamic_pool));
        commands.push(format!("network {} {mask}", network.network()));
        commands.push(format!("default-router {}", self.default_router));
        commands.push(format!("excluded-address {first} {last}"));
        commands.push(format!("lease {}", self.lease_days));

        Ok(commands)
    }
}

/// Client addresses from `show ip dhcp binding`, sorted.
pub fn parse_dhcp_bindings(output: &str) -> Vec<Ipv4Addr> {
    let mut clients: Vec<Ipv4Addr> = output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let first = fields.next()?;
            fields.next()?;
            first.parse().ok()
        })
        .collect();
    clients.sort();
    clients
}

/// First address starting with `prefix` in `show ipv6 neighbors` output.
pub fn find_neighbor_address(output: &str, prefix: &str) -> Option<String> {
    let prefix = prefix.to_ascii_lowercase();
    output.lines().find_map(|line| {
        let line = line.to_ascii_lowercase();
        let start = line.find(&prefix)?;
        let address: String = line[start..]
            .chars()
            .take_while(|c| c.is_ascii_hexdigit() || *c == ':')
            .collect();
        (address.len() > prefix.len()).then_some(address)
    })
}
