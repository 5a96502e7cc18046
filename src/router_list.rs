use crate::query_engine::SnmpAgent;
use crate::router::{router_builder, Router};
use anyhow::{bail, Context, Result};
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::error;

const DEFAULT_SNMP_PORT: u16 = 161;

fn default_snmp_port() -> u16 {
    DEFAULT_SNMP_PORT
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RouterTarget {
    pub name: String,
    pub ip_address: IpAddr,
    pub community: String,
    #[serde(default = "default_snmp_port")]
    pub snmp_port: u16,
}

impl RouterTarget {
    pub fn agent(&self, timeout: Duration) -> SnmpAgent {
        let address = SocketAddr::from((self.ip_address, self.snmp_port));
        SnmpAgent::new(address, &self.community, timeout)
    }
}

#[derive(Debug)]
pub struct RouterList {
    pub targets: Vec<RouterTarget>,
}

impl RouterList {
    pub fn from_csv(filename: &Path) -> Result<Self> {
        // Check that the file exists
        if !filename.exists() {
            bail!("File {} does not exist", filename.display());
        }
        let file = std::fs::File::open(filename)
            .with_context(|| format!("Opening {}", filename.display()))?;
        Self::from_reader(file)
    }

    /// Reads `name, ip_address, community[, snmp_port]` rows; `#` starts a comment.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let reader = ReaderBuilder::new()
            .comment(Some(b'#'))
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut targets = Vec::new();
        for line in reader.into_deserialize() {
            let target: RouterTarget = line?;
            targets.push(target);
        }

        Ok(Self { targets })
    }

    pub fn find(&self, name: &str) -> Option<&RouterTarget> {
        self.targets.iter().find(|t| t.name == name)
    }

    /// Polls every router concurrently. Routers come back ordered by name.
    pub async fn fetch_all(&self, timeout: Duration) -> Vec<Router> {
        let mut set = JoinSet::new();
        for target in self.targets.iter() {
            let router = router_builder(target.clone(), timeout);
            set.spawn(router);
        }

        let mut results = Vec::new();
        while let Some(res) = set.join_next().await {
            match res {
                Ok(router) => results.push(router),
                Err(e) => error!("JoinSet Error: {:?}", e),
            }
        }
        results.sort_by(|a, b| a.name.cmp(&b.name));

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csnmp::test_agent::spawn_agent;
    use crate::csnmp::ObjectValue;

    #[test]
    fn test_from_reader() {
        let csv = "\
name,ip_address,community
# lab core
R1, 198.51.1.1, public
R4,198.51.100.1,public
";
        let list = RouterList::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(list.targets.len(), 2);
        let r1 = list.find("R1").unwrap();
        assert_eq!(r1.ip_address, "198.51.1.1".parse::<IpAddr>().unwrap());
        assert_eq!(r1.community, "public");
        assert!(list.find("R9").is_none());
    }

    #[test]
    fn test_snmp_port_column() {
        let csv = "name,ip_address,community\nR1,198.51.1.1,public\n";
        let defaulted = RouterList::from_reader(csv.as_bytes()).unwrap();
        let agent = defaulted.targets[0].agent(Duration::from_secs(2));
        assert_eq!(agent.address, "198.51.1.1:161".parse().unwrap());

        let csv = "name,ip_address,community,snmp_port\nR1,198.51.1.1,public,1161\n";
        let custom = RouterList::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(custom.targets[0].snmp_port, 1161);
    }

    #[tokio::test]
    async fn test_fetch_all_orders_by_name() {
        let r1 = spawn_agent(vec![(
            "1.3.6.1.2.1.4.20.1.1.198.51.1.1",
            ObjectValue::IpAddress([198, 51, 1, 1].into()),
        )])
        .await;
        let r2 = spawn_agent(vec![(
            "1.3.6.1.2.1.4.20.1.1.198.51.100.1",
            ObjectValue::IpAddress([198, 51, 100, 1].into()),
        )])
        .await;
        let csv = format!(
            "name,ip_address,community,snmp_port\n\
             R2,127.0.0.1,public,{}\n\
             R1,127.0.0.1,public,{}\n",
            r2.port(),
            r1.port()
        );
        let list = RouterList::from_reader(csv.as_bytes()).unwrap();

        let routers = list.fetch_all(Duration::from_secs(1)).await;
        let names: Vec<_> = routers.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["R1", "R2"]);
        assert_eq!(routers[0].ip_table.v4, ["198.51.1.1/24"]);
        assert_eq!(routers[1].ip_table.v4, ["198.51.100.1/24"]);
    }

    #[test]
    fn test_rejects_bad_address() {
        let csv = "name,ip_address,community\nR1,not-an-ip,public\n";
        assert!(RouterList::from_reader(csv.as_bytes()).is_err());
    }

    #[test]
    fn test_missing_file() {
        assert!(RouterList::from_csv(Path::new("/nonexistent/router_list.csv")).is_err());
    }
}
