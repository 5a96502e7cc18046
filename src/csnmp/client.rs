use crate::csnmp::message::{
    ErrorStatus, ObjectValue, Pdu, PduType, Snmp2cMessage, SnmpMessageError,
};
use crate::csnmp::oid::ObjectIdentifier;
use derivative::Derivative;
use std::collections::BTreeMap;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{timeout_at, Instant};
use tracing::debug;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub(crate) const MAX_DATAGRAM: usize = 65535;

#[derive(thiserror::Error, Debug)]
pub enum SnmpClientError {
    #[error("Socket error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Message(#[from] SnmpMessageError),
    #[error("No response within {0:?}")]
    Timeout(Duration),
    #[error("Agent returned {status:?} at index {index}")]
    Agent { status: ErrorStatus, index: i64 },
    #[error("No such object {0}")]
    NoSuchObject(ObjectIdentifier),
    #[error("Agent returned an empty response")]
    EmptyResponse,
    #[error("Walk did not advance: {next} does not follow {previous}")]
    NonIncreasing {
        previous: ObjectIdentifier,
        next: ObjectIdentifier,
    },
}

/// A single-attempt SNMPv2c client bound to one agent.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Snmp2cClient {
    socket: UdpSocket,
    target: SocketAddr,
    #[derivative(Debug = "ignore")]
    community: Vec<u8>,
    timeout: Duration,
    request_id: AtomicI32,
}

impl Snmp2cClient {
    pub async fn new(
        target: SocketAddr,
        community: Vec<u8>,
        bind_addr: Option<SocketAddr>,
        timeout: Option<Duration>,
    ) -> Result<Self, SnmpClientError> {
        let bind_addr = bind_addr.unwrap_or(match target {
            SocketAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
            SocketAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
        });
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(target).await?;

        Ok(Self {
            socket,
            target,
            community,
            timeout: timeout.unwrap_or(DEFAULT_TIMEOUT),
            request_id: AtomicI32::new((std::process::id() & 0x7FFF) as i32),
        })
    }

    fn next_request_id(&self) -> i32 {
        self.request_id.fetch_add(1, Ordering::Relaxed) & 0x7FFF_FFFF
    }

    async fn request(&self, pdu: Pdu) -> Result<Pdu, SnmpClientError> {
        let request_id = pdu.request_id;
        let message = Snmp2cMessage {
            community: self.community.clone(),
            pdu,
        };
        self.socket.send(&message.encode()?).await?;

        let deadline = Instant::now() + self.timeout;
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            let len = match timeout_at(deadline, self.socket.recv(&mut buf)).await {
                Ok(received) => received?,
                Err(_) => return Err(SnmpClientError::Timeout(self.timeout)),
            };

            let response = match Snmp2cMessage::decode(&buf[..len]) {
                Ok(response) => response,
                Err(e) => {
                    debug!("Discarding undecodable datagram from {}: {e}", self.target);
                    continue;
                }
            };
            if response.pdu.pdu_type != PduType::Response || response.pdu.request_id != request_id
            {
                debug!(
                    "Discarding stale datagram from {} (request id {})",
                    self.target, response.pdu.request_id
                );
                continue;
            }

            let status = response.pdu.status();
            if status != ErrorStatus::NoError {
                return Err(SnmpClientError::Agent {
                    status,
                    index: response.pdu.error_index,
                });
            }
            return Ok(response.pdu);
        }
    }

    pub async fn get(&self, oid: &ObjectIdentifier) -> Result<ObjectValue, SnmpClientError> {
        let pdu = Pdu::get(self.next_request_id(), std::slice::from_ref(oid));
        let response = self.request(pdu).await?;
        let (_, value) = response
            .bindings
            .into_iter()
            .next()
            .ok_or(SnmpClientError::EmptyResponse)?;

        match value {
            ObjectValue::NoSuchObject | ObjectValue::NoSuchInstance => {
                Err(SnmpClientError::NoSuchObject(oid.clone()))
            }
            value => Ok(value),
        }
    }

    /// Walks the subtree under `top_oid` with GetBulk requests.
    pub async fn walk_bulk(
        &self,
        top_oid: ObjectIdentifier,
        max_repetitions: u32,
    ) -> Result<BTreeMap<ObjectIdentifier, ObjectValue>, SnmpClientError> {
        let mut results = BTreeMap::new();
        let mut cursor = top_oid.clone();

        'walk: loop {
            let pdu = Pdu::get_bulk(
                self.next_request_id(),
                0,
                max_repetitions,
                std::slice::from_ref(&cursor),
            );
            let response = self.request(pdu).await?;
            if response.bindings.is_empty() {
                break;
            }

            for (oid, value) in response.bindings {
                if value == ObjectValue::EndOfMibView || !oid.starts_with(&top_oid) {
                    break 'walk;
                }
                if oid <= cursor {
                    return Err(SnmpClientError::NonIncreasing {
                        previous: cursor,
                        next: oid,
                    });
                }
                cursor = oid.clone();
                results.insert(oid, value);
            }
        }

        debug!("Walked {} bindings under {top_oid} from {}", results.len(), self.target);
        Ok(results)
    }
}
