use crate::router::{InterfaceTable, IpTable, Router};
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Everything one `collect` run learned, keyed by router name.
#[derive(Debug, Default, Serialize)]
pub struct NetworkSnapshot<'a> {
    pub addresses: BTreeMap<&'a str, &'a IpTable>,
    pub interface_status: BTreeMap<&'a str, &'a InterfaceTable>,
}

impl<'a> NetworkSnapshot<'a> {
    pub fn from_routers(routers: &'a [Router]) -> Self {
        let mut snapshot = Self::default();
        for router in routers {
            snapshot.addresses.insert(&router.name, &router.ip_table);
            snapshot
                .interface_status
                .insert(&router.name, &router.interfaces);
        }
        snapshot
    }

    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file =
            File::create(path).with_context(|| format!("Creating {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::OperStatus;

    #[test]
    fn test_layout() {
        let mut interfaces = InterfaceTable::default();
        interfaces
            .interfaces
            .insert("FastEthernet0/0".to_string(), OperStatus::Up);
        let routers = vec![Router {
            name: "R1".to_string(),
            ip_table: IpTable {
                v4: vec!["198.51.1.1/24".to_string()],
                v6: vec![],
            },
            interfaces,
        }];

        let mut out = Vec::new();
        NetworkSnapshot::from_routers(&routers)
            .write_to(&mut out)
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();

        assert_eq!(value["addresses"]["R1"]["v4"][0], "198.51.1.1/24");
        assert_eq!(value["addresses"]["R1"]["v6"], serde_json::json!([]));
        assert_eq!(value["interface_status"]["R1"]["FastEthernet0/0"], "up");
    }
}
