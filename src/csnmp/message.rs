use crate::csnmp::oid::ObjectIdentifier;
use derivative::Derivative;
use simple_asn1::{
    from_der, to_der, ASN1Block, ASN1Class, ASN1DecodeErr, ASN1EncodeErr, BigInt, BigUint,
};
use std::net::Ipv4Addr;

/// The version field carries 1 for SNMPv2c.
pub const VERSION_2C: i64 = 1;

#[derive(thiserror::Error, Debug)]
pub enum SnmpMessageError {
    #[error("BER decoding failed: {0}")]
    Decode(#[from] ASN1DecodeErr),
    #[error("BER encoding failed: {0}")]
    Encode(#[from] ASN1EncodeErr),
    #[error("Only SNMPv2c messages are supported")]
    UnsupportedVersion,
    #[error("Unknown PDU tag {0}")]
    UnknownPduType(u32),
    #[error("Malformed message: {0}")]
    Malformed(&'static str),
    #[error("Value out of range for {0}")]
    ValueOutOfRange(&'static str),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PduType {
    GetRequest,
    Response,
    GetBulkRequest,
}

impl PduType {
    fn tag(self) -> u32 {
        match self {
            PduType::GetRequest => 0,
            PduType::Response => 2,
            PduType::GetBulkRequest => 5,
        }
    }

    fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            0 => Some(PduType::GetRequest),
            2 => Some(PduType::Response),
            5 => Some(PduType::GetBulkRequest),
            _ => None,
        }
    }
}

/// RFC 3416 error-status values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorStatus {
    NoError,
    TooBig,
    NoSuchName,
    BadValue,
    ReadOnly,
    GenErr,
    NoAccess,
    WrongType,
    WrongLength,
    WrongEncoding,
    WrongValue,
    NoCreation,
    InconsistentValue,
    ResourceUnavailable,
    CommitFailed,
    UndoFailed,
    AuthorizationError,
    NotWritable,
    InconsistentName,
    Other(i64),
}

impl ErrorStatus {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => ErrorStatus::NoError,
            1 => ErrorStatus::TooBig,
            2 => ErrorStatus::NoSuchName,
            3 => ErrorStatus::BadValue,
            4 => ErrorStatus::ReadOnly,
            5 => ErrorStatus::GenErr,
            6 => ErrorStatus::NoAccess,
            7 => ErrorStatus::WrongType,
            8 => ErrorStatus::WrongLength,
            9 => ErrorStatus::WrongEncoding,
            10 => ErrorStatus::WrongValue,
            11 => ErrorStatus::NoCreation,
            12 => ErrorStatus::InconsistentValue,
            13 => ErrorStatus::ResourceUnavailable,
            14 => ErrorStatus::CommitFailed,
            15 => ErrorStatus::UndoFailed,
            16 => ErrorStatus::AuthorizationError,
            17 => ErrorStatus::NotWritable,
            18 => ErrorStatus::InconsistentName,
            other => ErrorStatus::Other(other),
        }
    }
}

/// A decoded var-bind value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ObjectValue {
    Integer(i32),
    String(Vec<u8>),
    ObjectId(ObjectIdentifier),
    IpAddress(Ipv4Addr),
    Counter32(u32),
    Unsigned32(u32),
    TimeTicks(u32),
    Opaque(Vec<u8>),
    Counter64(u64),
    Null,
    NoSuchObject,
    NoSuchInstance,
    EndOfMibView,
}

// Application class tags (RFC 2578 / RFC 3416).
const TAG_IP_ADDRESS: u8 = 0;
const TAG_COUNTER32: u8 = 1;
const TAG_UNSIGNED32: u8 = 2;
const TAG_TIMETICKS: u8 = 3;
const TAG_OPAQUE: u8 = 4;
const TAG_COUNTER64: u8 = 6;

// Context class tags for the v2 exception values.
const TAG_NO_SUCH_OBJECT: u8 = 0;
const TAG_NO_SUCH_INSTANCE: u8 = 1;
const TAG_END_OF_MIB_VIEW: u8 = 2;

impl ObjectValue {
    fn to_asn1(&self) -> ASN1Block {
        match self {
            ObjectValue::Integer(i) => ASN1Block::Integer(0, BigInt::from(*i)),
            ObjectValue::String(s) => ASN1Block::OctetString(0, s.clone()),
            ObjectValue::ObjectId(oid) => ASN1Block::ObjectIdentifier(0, oid.to_asn1()),
            ObjectValue::IpAddress(ip) => application(TAG_IP_ADDRESS, ip.octets().to_vec()),
            ObjectValue::Counter32(v) => application(TAG_COUNTER32, encode_unsigned(*v as u64)),
            ObjectValue::Unsigned32(v) => application(TAG_UNSIGNED32, encode_unsigned(*v as u64)),
            ObjectValue::TimeTicks(v) => application(TAG_TIMETICKS, encode_unsigned(*v as u64)),
            ObjectValue::Opaque(s) => application(TAG_OPAQUE, s.clone()),
            ObjectValue::Counter64(v) => application(TAG_COUNTER64, encode_unsigned(*v)),
            ObjectValue::Null => ASN1Block::Null(0),
            ObjectValue::NoSuchObject => exception(TAG_NO_SUCH_OBJECT),
            ObjectValue::NoSuchInstance => exception(TAG_NO_SUCH_INSTANCE),
            ObjectValue::EndOfMibView => exception(TAG_END_OF_MIB_VIEW),
        }
    }

    fn from_asn1(block: &ASN1Block) -> Result<Self, SnmpMessageError> {
        match block {
            ASN1Block::Integer(_, i) => i32::try_from(i)
                .map(ObjectValue::Integer)
                .map_err(|_| SnmpMessageError::ValueOutOfRange("Integer32")),
            ASN1Block::OctetString(_, s) => Ok(ObjectValue::String(s.clone())),
            ASN1Block::ObjectIdentifier(_, oid) => ObjectIdentifier::from_asn1(oid)
                .map(ObjectValue::ObjectId)
                .ok_or(SnmpMessageError::ValueOutOfRange("OBJECT IDENTIFIER")),
            ASN1Block::Null(_) => Ok(ObjectValue::Null),
            ASN1Block::Unknown(ASN1Class::Application, false, _, tag, body) => {
                match u8::try_from(tag).ok() {
                    Some(TAG_IP_ADDRESS) => {
                        let octets: [u8; 4] = body
                            .as_slice()
                            .try_into()
                            .map_err(|_| SnmpMessageError::ValueOutOfRange("IpAddress"))?;
                        Ok(ObjectValue::IpAddress(Ipv4Addr::from(octets)))
                    }
                    Some(TAG_COUNTER32) => Ok(ObjectValue::Counter32(decode_u32(body, "Counter32")?)),
                    Some(TAG_UNSIGNED32) => {
                        Ok(ObjectValue::Unsigned32(decode_u32(body, "Unsigned32")?))
                    }
                    Some(TAG_TIMETICKS) => Ok(ObjectValue::TimeTicks(decode_u32(body, "TimeTicks")?)),
                    Some(TAG_OPAQUE) => Ok(ObjectValue::Opaque(body.clone())),
                    Some(TAG_COUNTER64) => {
                        Ok(ObjectValue::Counter64(decode_unsigned(body, "Counter64")?))
                    }
                    _ => Err(SnmpMessageError::Malformed("unknown application tag")),
                }
            }
            ASN1Block::Unknown(ASN1Class::ContextSpecific, false, _, tag, _) => {
                match u8::try_from(tag).ok() {
                    Some(TAG_NO_SUCH_OBJECT) => Ok(ObjectValue::NoSuchObject),
                    Some(TAG_NO_SUCH_INSTANCE) => Ok(ObjectValue::NoSuchInstance),
                    Some(TAG_END_OF_MIB_VIEW) => Ok(ObjectValue::EndOfMibView),
                    _ => Err(SnmpMessageError::Malformed("unknown exception tag")),
                }
            }
            _ => Err(SnmpMessageError::Malformed("unsupported value type")),
        }
    }
}

fn application(tag: u8, body: Vec<u8>) -> ASN1Block {
    ASN1Block::Unknown(ASN1Class::Application, false, 0, BigUint::from(tag), body)
}

fn exception(tag: u8) -> ASN1Block {
    ASN1Block::Unknown(ASN1Class::ContextSpecific, false, 0, BigUint::from(tag), Vec::new())
}

fn encode_unsigned(value: u64) -> Vec<u8> {
    // Signed encoding keeps a leading zero octet when the high bit is set.
    BigInt::from(value).to_signed_bytes_be()
}

fn decode_unsigned(body: &[u8], what: &'static str) -> Result<u64, SnmpMessageError> {
    let significant: Vec<u8> = body.iter().copied().skip_while(|b| *b == 0).collect();
    if significant.len() > 8 {
        return Err(SnmpMessageError::ValueOutOfRange(what));
    }
    Ok(significant
        .iter()
        .fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}

fn decode_u32(body: &[u8], what: &'static str) -> Result<u32, SnmpMessageError> {
    u32::try_from(decode_unsigned(body, what)?).map_err(|_| SnmpMessageError::ValueOutOfRange(what))
}

/// A protocol data unit.
///
/// GetBulk requests reuse the `error_status` and `error_index` slots for
/// non-repeaters and max-repetitions, as the wire format does.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pdu {
    pub pdu_type: PduType,
    pub request_id: i32,
    pub error_status: i64,
    pub error_index: i64,
    pub bindings: Vec<(ObjectIdentifier, ObjectValue)>,
}

impl Pdu {
    pub fn get(request_id: i32, oids: &[ObjectIdentifier]) -> Self {
        Self::request(PduType::GetRequest, request_id, 0, 0, oids)
    }

    pub fn get_bulk(
        request_id: i32,
        non_repeaters: u32,
        max_repetitions: u32,
        oids: &[ObjectIdentifier],
    ) -> Self {
        Self::request(
            PduType::GetBulkRequest,
            request_id,
            i64::from(non_repeaters),
            i64::from(max_repetitions),
            oids,
        )
    }

    #[cfg(test)]
    pub fn response(request_id: i32, bindings: Vec<(ObjectIdentifier, ObjectValue)>) -> Self {
        Self {
            pdu_type: PduType::Response,
            request_id,
            error_status: 0,
            error_index: 0,
            bindings,
        }
    }

    fn request(
        pdu_type: PduType,
        request_id: i32,
        error_status: i64,
        error_index: i64,
        oids: &[ObjectIdentifier],
    ) -> Self {
        Self {
            pdu_type,
            request_id,
            error_status,
            error_index,
            bindings: oids
                .iter()
                .map(|oid| (oid.clone(), ObjectValue::Null))
                .collect(),
        }
    }

    pub fn status(&self) -> ErrorStatus {
        ErrorStatus::from_code(self.error_status)
    }

    fn to_asn1(&self) -> Result<ASN1Block, SnmpMessageError> {
        let bindings = self
            .bindings
            .iter()
            .map(|(oid, value)| {
                ASN1Block::Sequence(
                    0,
                    vec![ASN1Block::ObjectIdentifier(0, oid.to_asn1()), value.to_asn1()],
                )
            })
            .collect();

        let fields = [
            ASN1Block::Integer(0, BigInt::from(self.request_id)),
            ASN1Block::Integer(0, BigInt::from(self.error_status)),
            ASN1Block::Integer(0, BigInt::from(self.error_index)),
            ASN1Block::Sequence(0, bindings),
        ];
        let mut body = Vec::new();
        for field in fields.iter() {
            body.extend(to_der(field)?);
        }

        Ok(ASN1Block::Unknown(
            ASN1Class::ContextSpecific,
            true,
            0,
            BigUint::from(self.pdu_type.tag()),
            body,
        ))
    }

    fn from_asn1(block: &ASN1Block) -> Result<Self, SnmpMessageError> {
        let (tag, body) = match block {
            ASN1Block::Unknown(ASN1Class::ContextSpecific, true, _, tag, body) => (tag, body),
            _ => return Err(SnmpMessageError::Malformed("expected a PDU")),
        };
        let tag = u32::try_from(tag).map_err(|_| SnmpMessageError::Malformed("PDU tag"))?;
        let pdu_type = PduType::from_tag(tag).ok_or(SnmpMessageError::UnknownPduType(tag))?;

        let fields = from_der(body)?;
        let (request_id, error_status, error_index, bindings) = match fields.as_slice() {
            [ASN1Block::Integer(_, rid), ASN1Block::Integer(_, status), ASN1Block::Integer(_, index), ASN1Block::Sequence(_, bindings)] => {
                (rid, status, index, bindings)
            }
            _ => return Err(SnmpMessageError::Malformed("PDU fields")),
        };

        let bindings = bindings
            .iter()
            .map(|binding| match binding {
                ASN1Block::Sequence(_, pair) => match pair.as_slice() {
                    [ASN1Block::ObjectIdentifier(_, oid), value] => {
                        let oid = ObjectIdentifier::from_asn1(oid)
                            .ok_or(SnmpMessageError::ValueOutOfRange("var-bind name"))?;
                        Ok((oid, ObjectValue::from_asn1(value)?))
                    }
                    _ => Err(SnmpMessageError::Malformed("var-bind")),
                },
                _ => Err(SnmpMessageError::Malformed("var-bind")),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            pdu_type,
            request_id: i32::try_from(request_id)
                .map_err(|_| SnmpMessageError::ValueOutOfRange("request-id"))?,
            error_status: i64::try_from(error_status)
                .map_err(|_| SnmpMessageError::ValueOutOfRange("error-status"))?,
            error_index: i64::try_from(error_index)
                .map_err(|_| SnmpMessageError::ValueOutOfRange("error-index"))?,
            bindings,
        })
    }
}

#[derive(Derivative, Clone, PartialEq, Eq)]
#[derivative(Debug)]
pub struct Snmp2cMessage {
    #[derivative(Debug = "ignore")]
    pub community: Vec<u8>,
    pub pdu: Pdu,
}

impl Snmp2cMessage {
    pub fn encode(&self) -> Result<Vec<u8>, SnmpMessageError> {
        let message = ASN1Block::Sequence(
            0,
            vec![
                ASN1Block::Integer(0, BigInt::from(VERSION_2C)),
                ASN1Block::OctetString(0, self.community.clone()),
                self.pdu.to_asn1()?,
            ],
        );
        Ok(to_der(&message)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, SnmpMessageError> {
        let blocks = from_der(bytes)?;
        let items = match blocks.as_slice() {
            [ASN1Block::Sequence(_, items)] => items,
            _ => return Err(SnmpMessageError::Malformed("message is not a single SEQUENCE")),
        };

        match items.as_slice() {
            [ASN1Block::Integer(_, version), ASN1Block::OctetString(_, community), pdu] => {
                if i64::try_from(version).ok() != Some(VERSION_2C) {
                    return Err(SnmpMessageError::UnsupportedVersion);
                }
                Ok(Self {
                    community: community.clone(),
                    pdu: Pdu::from_asn1(pdu)?,
                })
            }
            _ => Err(SnmpMessageError::Malformed("message header")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(s: &str) -> ObjectIdentifier {
        s.parse().unwrap()
    }

    #[test]
    fn test_encode_get_request() {
        let message = Snmp2cMessage {
            community: b"public".to_vec(),
            pdu: Pdu::get(1, &[oid("1.3.6.1.2.1.1.5.0")]),
        };
        let expected: Vec<u8> = vec![
            0x30, 0x26, 0x02, 0x01, 0x01, 0x04, 0x06, b'p', b'u', b'b', b'l', b'i', b'c', 0xa0,
            0x19, 0x02, 0x01, 0x01, 0x02, 0x01, 0x00, 0x02, 0x01, 0x00, 0x30, 0x0e, 0x30, 0x0c,
            0x06, 0x08, 0x2b, 0x06, 0x01, 0x02, 0x01, 0x01, 0x05, 0x00, 0x05, 0x00,
        ];
        assert_eq!(message.encode().unwrap(), expected);
    }

    #[test]
    fn test_response_values_survive_the_wire() {
        let bindings = vec![
            (oid("1.3.6.1.2.1.1.5.0"), ObjectValue::String(b"R1".to_vec())),
            (oid("1.3.6.1.2.1.2.2.1.8.1"), ObjectValue::Integer(1)),
            (
                oid("1.3.6.1.2.1.4.20.1.1.198.51.1.1"),
                ObjectValue::IpAddress(Ipv4Addr::new(198, 51, 1, 1)),
            ),
            (oid("1.3.6.1.2.1.2.2.1.10.1"), ObjectValue::Counter32(u32::MAX)),
            (oid("1.3.6.1.2.1.1.3.0"), ObjectValue::TimeTicks(123_456)),
            (oid("1.3.6.1.2.1.31.1.1.1.6.1"), ObjectValue::Counter64(1 << 40)),
            (oid("1.3.6.1.2.1.1.2.0"), ObjectValue::ObjectId(oid("1.3.6.1.4.1.9.1.1"))),
            (oid("1.3.6.1.2.1.1.9.0"), ObjectValue::NoSuchInstance),
            (oid("1.3.6.1.2.1.99"), ObjectValue::EndOfMibView),
        ];
        let message = Snmp2cMessage {
            community: b"public".to_vec(),
            pdu: Pdu::response(42, bindings),
        };
        let decoded = Snmp2cMessage::decode(&message.encode().unwrap()).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn test_bulk_request_carries_repetitions() {
        let message = Snmp2cMessage {
            community: b"public".to_vec(),
            pdu: Pdu::get_bulk(7, 0, 20, &[oid("1.3.6.1.2.1.4.34.1.3")]),
        };
        let decoded = Snmp2cMessage::decode(&message.encode().unwrap()).unwrap();
        assert_eq!(decoded.pdu.pdu_type, PduType::GetBulkRequest);
        assert_eq!(decoded.pdu.error_index, 20);
    }

    #[test]
    fn test_rejects_other_versions() {
        // Same GetRequest as above with version 0 (SNMPv1).
        let mut bytes = Snmp2cMessage {
            community: b"public".to_vec(),
            pdu: Pdu::get(1, &[oid("1.3.6.1.2.1.1.5.0")]),
        }
        .encode()
        .unwrap();
        bytes[4] = 0x00;
        assert!(matches!(
            Snmp2cMessage::decode(&bytes),
            Err(SnmpMessageError::UnsupportedVersion)
        ));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(Snmp2cMessage::decode(&[0x02, 0x01, 0x01]).is_err());
        assert!(Snmp2cMessage::decode(&[]).is_err());
    }

    #[test]
    fn test_community_is_not_debug_printed() {
        let message = Snmp2cMessage {
            community: b"s3cret".to_vec(),
            pdu: Pdu::get(1, &[oid("1.3.6.1.2.1.1.5.0")]),
        };
        assert!(!format!("{message:?}").contains("s3cret"));
    }
}
