use crate::router_list::RouterTarget;
use std::time::Duration;
use tracing::{debug, error};
mod if_status;
pub use if_status::{InterfaceTable, OperStatus};
mod ip_table;
pub use ip_table::IpTable;

pub async fn router_builder(target: RouterTarget, timeout: Duration) -> Router {
    let agent = target.agent(timeout);
    let address = agent.address;
    debug!("Querying {} ({address}) for SNMP information", target.name);

    let (ip_table, interfaces) = tokio::join!(
        IpTable::from_snmp(&agent),
        InterfaceTable::from_snmp(&agent),
    );
    debug!("Finished querying {} for SNMP information", target.name);

    // A table that fails to walk is reported empty, the other is still kept.
    let ip_table = ip_table.unwrap_or_else(|e| {
        error!("Failed to query {address} for IP address information: {e:#}");
        IpTable::default()
    });
    let interfaces = interfaces.unwrap_or_else(|e| {
        error!("Failed to query {address} for interface information: {e:#}");
        InterfaceTable::default()
    });

    Router {
        name: target.name,
        ip_table,
        interfaces,
    }
}

#[derive(Debug)]
pub struct Router {
    pub name: String,
    pub ip_table: IpTable,
    pub interfaces: InterfaceTable,
}
