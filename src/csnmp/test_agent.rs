//! In-process SNMP agent serving a fixed table over loopback UDP.

use crate::csnmp::client::MAX_DATAGRAM;
use crate::csnmp::message::{Pdu, PduType, Snmp2cMessage};
use crate::csnmp::{ObjectIdentifier, ObjectValue};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::ops::Bound::{Excluded, Unbounded};
use tokio::net::UdpSocket;

/// Answers Get and GetBulk requests from `entries` until the test ends.
pub(crate) async fn spawn_agent(entries: Vec<(&str, ObjectValue)>) -> SocketAddr {
    let table: BTreeMap<ObjectIdentifier, ObjectValue> = entries
        .into_iter()
        .map(|(o, v)| (o.parse().unwrap(), v))
        .collect();
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();

    tokio::spawn(async move {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        while let Ok((len, peer)) = socket.recv_from(&mut buf).await {
            let request = Snmp2cMessage::decode(&buf[..len]).unwrap();
            let bindings = match request.pdu.pdu_type {
                PduType::GetRequest => request
                    .pdu
                    .bindings
                    .iter()
                    .map(|(o, _)| {
                        let value = table.get(o).cloned().unwrap_or(ObjectValue::NoSuchInstance);
                        (o.clone(), value)
                    })
                    .collect(),
                PduType::GetBulkRequest => {
                    let start = request.pdu.bindings[0].0.clone();
                    // max-repetitions travels in the error-index slot
                    let max = request.pdu.error_index as usize;
                    let mut found: Vec<_> = table
                        .range((Excluded(start.clone()), Unbounded))
                        .take(max)
                        .map(|(o, v)| (o.clone(), v.clone()))
                        .collect();
                    if found.is_empty() {
                        found.push((start, ObjectValue::EndOfMibView));
                    }
                    found
                }
                PduType::Response => Vec::new(),
            };
            let response = Snmp2cMessage {
                community: request.community,
                pdu: Pdu::response(request.pdu.request_id, bindings),
            };
            socket
                .send_to(&response.encode().unwrap(), peer)
                .await
                .unwrap();
        }
    });

    addr
}
