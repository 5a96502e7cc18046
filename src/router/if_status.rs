use crate::query_engine::{as_int, as_string, SnmpAgent};
use anyhow::Result;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::warn;

/// ifDescr
pub const INTERFACE_NAME_COLUMN: &str = "1.3.6.1.2.1.2.2.1.2";
/// ifOperStatus
pub const INTERFACE_STATUS_COLUMN: &str = "1.3.6.1.2.1.2.2.1.8";

const EXCLUDED_INTERFACE: &str = "null0";

/// ifOperStatus values (RFC 2863).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OperStatus {
    Up,
    Down,
    Testing,
    Unknown,
    Dormant,
    NotPresent,
    LowerLayerDown,
}

impl OperStatus {
    /// Codes outside 1..=7 read as `Unknown`.
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => OperStatus::Up,
            2 => OperStatus::Down,
            3 => OperStatus::Testing,
            5 => OperStatus::Dormant,
            6 => OperStatus::NotPresent,
            7 => OperStatus::LowerLayerDown,
            _ => OperStatus::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            OperStatus::Up => "up",
            OperStatus::Down => "down",
            OperStatus::Testing => "testing",
            OperStatus::Unknown => "unknown",
            OperStatus::Dormant => "dormant",
            OperStatus::NotPresent => "notPresent",
            OperStatus::LowerLayerDown => "lowerLayerDown",
        }
    }
}

impl fmt::Display for OperStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceState {
    pub name: String,
    pub status: OperStatus,
}

/// Labels one ifOperStatus row.
///
/// Never fails: unknown codes become `unknown` and unnamed interfaces are
/// called `if<index>`. The only rows dropped (`None`) are `Null0`
/// interfaces, matched case-insensitively.
pub fn decode_interface_status(
    status_code: i64,
    known_names: &HashMap<u32, String>,
    if_index: u32,
) -> Option<InterfaceState> {
    let status = OperStatus::from_code(status_code);
    let name = known_names
        .get(&if_index)
        .cloned()
        .unwrap_or_else(|| format!("if{if_index}"));

    if name.eq_ignore_ascii_case(EXCLUDED_INTERFACE) {
        return None;
    }
    Some(InterfaceState { name, status })
}

#[derive(Debug, Default, Clone, Serialize)]
#[serde(transparent)]
pub struct InterfaceTable {
    pub interfaces: BTreeMap<String, OperStatus>,
}

impl InterfaceTable {
    pub(crate) async fn from_snmp(agent: &SnmpAgent) -> Result<InterfaceTable> {
        let (names, statuses) = tokio::join!(
            agent.walk(INTERFACE_NAME_COLUMN),
            agent.walk(INTERFACE_STATUS_COLUMN),
        );

        let mut known_names = HashMap::new();
        for (oid, val) in names? {
            let Some(if_index) = oid.last_arc() else { continue };
            match as_string(&val) {
                Ok(name) => {
                    known_names.insert(if_index, name);
                }
                Err(e) => warn!("Unreadable name for ifIndex {if_index} on {}: {e}", agent.address),
            }
        }

        let mut table = InterfaceTable::default();
        for (oid, val) in statuses? {
            let Some(if_index) = oid.last_arc() else { continue };
            // A status that is not an integer still gets a label.
            let code = as_int(&val).unwrap_or(0);
            if let Some(state) = decode_interface_status(code, &known_names, if_index) {
                table.interfaces.insert(state.name, state.status);
            }
        }

        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> HashMap<u32, String> {
        HashMap::from([
            (1, "FastEthernet0/0".to_string()),
            (2, "FastEthernet0/1".to_string()),
            (4, "Null0".to_string()),
            (5, "NULL0".to_string()),
        ])
    }

    #[test]
    fn test_known_codes() {
        let state = decode_interface_status(1, &names(), 1).unwrap();
        assert_eq!(state.name, "FastEthernet0/0");
        assert_eq!(state.status.to_string(), "up");

        let labels: Vec<_> = (1..=7)
            .map(|code| OperStatus::from_code(code).label())
            .collect();
        assert_eq!(
            labels,
            ["up", "down", "testing", "unknown", "dormant", "notPresent", "lowerLayerDown"]
        );
    }

    #[test]
    fn test_every_code_gets_a_label() {
        for code in [-1, 0, 8, 99, i64::MAX, i64::MIN] {
            let state = decode_interface_status(code, &names(), 2).unwrap();
            assert_eq!(state.status, OperStatus::Unknown);
        }
    }

    #[test]
    fn test_unnamed_interface_falls_back_to_index() {
        let state = decode_interface_status(2, &names(), 9).unwrap();
        assert_eq!(state.name, "if9");
        assert_eq!(state.status, OperStatus::Down);
    }

    #[test]
    fn test_null0_is_excluded_in_any_case() {
        assert_eq!(decode_interface_status(1, &names(), 4), None);
        assert_eq!(decode_interface_status(1, &names(), 5), None);
    }

    #[test]
    fn test_serializes_as_label() {
        let json = serde_json::to_string(&OperStatus::LowerLayerDown).unwrap();
        assert_eq!(json, "\"lowerLayerDown\"");
    }
}
