use crate::csnmp::{ObjectIdentifier, ObjectValue, Snmp2cClient};
use anyhow::{bail, Result};
use std::{net::SocketAddr, time::Duration};

// Setting this to large numbers breaks on Mikrotik
const MAX_REPEAT: u32 = 20;

/// Where and how to reach one SNMP agent.
#[derive(Clone, Debug)]
pub struct SnmpAgent {
    pub address: SocketAddr,
    pub community: String,
    pub timeout: Duration,
}

impl SnmpAgent {
    pub fn new(address: SocketAddr, community: &str, timeout: Duration) -> Self {
        Self {
            address,
            community: community.to_string(),
            timeout,
        }
    }

    async fn client(&self) -> Result<Snmp2cClient> {
        let bind: SocketAddr = match self.address {
            SocketAddr::V4(_) => "0.0.0.0:0".parse()?,
            SocketAddr::V6(_) => "[::]:0".parse()?,
        };
        Ok(Snmp2cClient::new(
            self.address,
            Vec::from(self.community.as_str()),
            Some(bind),
            Some(self.timeout),
        )
        .await?)
    }

    pub async fn walk(&self, oid: &str) -> Result<Vec<(ObjectIdentifier, ObjectValue)>> {
        let top_oid: ObjectIdentifier = oid.parse()?;
        let client = self.client().await?;
        let results = client.walk_bulk(top_oid, MAX_REPEAT).await?;
        Ok(results.into_iter().collect())
    }

    pub async fn get(&self, oid: &str) -> Result<ObjectValue> {
        let oid: ObjectIdentifier = oid.parse()?;
        let client = self.client().await?;
        Ok(client.get(&oid).await?)
    }
}

pub fn as_string(value: &ObjectValue) -> Result<String> {
    match value {
        ObjectValue::String(s) => Ok(String::from_utf8(s.clone())?),
        ObjectValue::Integer(i) => Ok(i.to_string()),
        ObjectValue::IpAddress(ip) => Ok(ip.to_string()),
        ObjectValue::Counter32(i) => Ok(i.to_string()),
        ObjectValue::Unsigned32(i) => Ok(i.to_string()),
        ObjectValue::Counter64(i) => Ok(i.to_string()),
        ObjectValue::TimeTicks(i) => Ok(i.to_string()),
        ObjectValue::Opaque(s) => Ok(String::from_utf8(s.clone())?),
        _ => bail!("Unknown value type"),
    }
}

pub fn as_int(value: &ObjectValue) -> Result<i64> {
    match value {
        ObjectValue::Integer(i) => Ok(i64::from(*i)),
        ObjectValue::Unsigned32(i) | ObjectValue::Counter32(i) => Ok(i64::from(*i)),
        _ => bail!("Unknown value type"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_string() {
        let name = ObjectValue::String(b"FastEthernet0/0".to_vec());
        assert_eq!(as_string(&name).unwrap(), "FastEthernet0/0");
        assert_eq!(as_string(&ObjectValue::Integer(-3)).unwrap(), "-3");
        assert!(as_string(&ObjectValue::Null).is_err());
        assert!(as_string(&ObjectValue::String(vec![0xff, 0xfe])).is_err());
    }

    #[test]
    fn test_as_int_accepts_gauges() {
        assert_eq!(as_int(&ObjectValue::Integer(2)).unwrap(), 2);
        assert_eq!(as_int(&ObjectValue::Unsigned32(35)).unwrap(), 35);
        assert!(as_int(&ObjectValue::String(b"2".to_vec())).is_err());
    }
}
