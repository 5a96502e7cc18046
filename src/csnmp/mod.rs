pub mod client;
pub mod message;
pub mod oid;
#[cfg(test)]
pub(crate) mod test_agent;

pub use crate::csnmp::client::Snmp2cClient;
pub use crate::csnmp::message::ObjectValue;
pub use crate::csnmp::oid::ObjectIdentifier;
