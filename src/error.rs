/// Value-level failures raised by the address codec and the table decoders.
///
/// None of these originate from I/O; callers decide whether to skip the
/// offending record or abort.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Malformed input `{input}`: {reason}")]
    MalformedInput { input: String, reason: &'static str },
    #[error("Malformed object identifier `{oid}`: {reason}")]
    MalformedOid { oid: String, reason: &'static str },
}

impl Error {
    pub(crate) fn malformed_input(input: impl ToString, reason: &'static str) -> Self {
        Error::MalformedInput {
            input: input.to_string(),
            reason,
        }
    }

    pub(crate) fn malformed_oid(oid: impl ToString, reason: &'static str) -> Self {
        Error::MalformedOid {
            oid: oid.to_string(),
            reason,
        }
    }
}
