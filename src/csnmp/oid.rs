use crate::error::Error;
use simple_asn1::{BigUint, OID};
use std::fmt;
use std::str::FromStr;

/// Textual labels an agent or MIB tool may print in place of the first arc.
const ROOT_LABELS: [(&str, u32); 3] = [("ccitt", 0), ("iso", 1), ("joint-iso-ccitt", 2)];

/// A numeric SNMP object identifier.
///
/// Ordering is arc-by-arc, which is the order an agent walks its tree in.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectIdentifier {
    arcs: Vec<u32>,
}

impl ObjectIdentifier {
    pub fn arcs(&self) -> &[u32] {
        &self.arcs
    }

    pub fn last_arc(&self) -> Option<u32> {
        self.arcs.last().copied()
    }

    pub fn starts_with(&self, prefix: &ObjectIdentifier) -> bool {
        self.arcs.starts_with(&prefix.arcs)
    }

    /// The last `count` arcs, or `None` if the identifier is shorter.
    pub fn tail(&self, count: usize) -> Option<&[u32]> {
        let start = self.arcs.len().checked_sub(count)?;
        Some(&self.arcs[start..])
    }

    pub(crate) fn to_asn1(&self) -> OID {
        OID::new(self.arcs.iter().map(|arc| BigUint::from(*arc)).collect())
    }

    pub(crate) fn from_asn1(oid: &OID) -> Option<Self> {
        oid.as_vec::<u32>().ok().map(|arcs| Self { arcs })
    }
}

impl FromStr for ObjectIdentifier {
    type Err = Error;

    /// Accepts `1.3.6.1`, `.1.3.6.1` and label-rooted forms such as `iso.3.6.1`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches('.');
        if trimmed.is_empty() {
            return Err(Error::malformed_oid(s, "empty identifier"));
        }

        let mut parts = trimmed.split('.');
        let mut arcs = Vec::new();
        if let Some(first) = parts.next() {
            let root = ROOT_LABELS
                .iter()
                .find(|(label, _)| first.eq_ignore_ascii_case(label))
                .map(|(_, arc)| *arc);
            match root {
                Some(arc) => arcs.push(arc),
                None => arcs.push(parse_arc(s, first)?),
            }
        }
        for part in parts {
            arcs.push(parse_arc(s, part)?);
        }

        Ok(Self { arcs })
    }
}

fn parse_arc(oid: &str, part: &str) -> Result<u32, Error> {
    part.parse()
        .map_err(|_| Error::malformed_oid(oid, "non-numeric component"))
}

impl fmt::Display for ObjectIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for arc in &self.arcs {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{arc}")?;
            first = false;
        }
        Ok(())
    }
}
