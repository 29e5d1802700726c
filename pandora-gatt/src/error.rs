use crate::platform::PlatformError;

#[derive(Debug, thiserror::Error)]
pub enum GattError {
    #[error("request carries no connection")]
    MissingConnection,
    #[error("invalid uuid: {0}")]
    InvalidUuid(String),
    #[error("invalid mtu: {0}")]
    InvalidMtu(i32),
    #[error("invalid handle range: {start}..={end}")]
    InvalidHandleRange { start: u32, end: u32 },
    #[error("characteristic handle {0} not found")]
    CharacteristicNotFound(u32),
    #[error("descriptor handle {0} not found")]
    DescriptorNotFound(u32),
    #[error("{0} already in progress")]
    Busy(String),
    #[error("{operation} failed with status 0x{status:03x}")]
    Status { operation: &'static str, status: u16 },
    #[error("timed out waiting for {0}")]
    Timeout(String),
    #[error("connection lost")]
    Disconnected,
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

impl From<GattError> for tonic::Status {
    fn from(e: GattError) -> Self {
        let message = e.to_string();
        match e {
            GattError::MissingConnection
            | GattError::InvalidUuid(_)
            | GattError::InvalidMtu(_)
            | GattError::InvalidHandleRange { .. } => tonic::Status::invalid_argument(message),
            GattError::CharacteristicNotFound(_)
            | GattError::DescriptorNotFound(_)
            | GattError::Platform(PlatformError::NoConnection(_)) => {
                tonic::Status::not_found(message)
            }
            GattError::Busy(_) => tonic::Status::failed_precondition(message),
            GattError::Timeout(_) => tonic::Status::deadline_exceeded(message),
            GattError::Disconnected => tonic::Status::unavailable(message),
            GattError::Platform(PlatformError::Unsupported(_)) => {
                tonic::Status::unimplemented(message)
            }
            GattError::Status { .. }
            | GattError::Platform(PlatformError::Rejected(_))
            | GattError::Platform(PlatformError::Other(_)) => tonic::Status::unknown(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::GattError;
    use crate::platform::PlatformError;
    use tonic::Code;

    fn code(e: GattError) -> Code {
        tonic::Status::from(e).code()
    }

    #[test]
    fn lookup_failures_are_not_found() {
        assert_eq!(code(GattError::CharacteristicNotFound(3)), Code::NotFound);
        assert_eq!(code(GattError::DescriptorNotFound(4)), Code::NotFound);
        assert_eq!(
            code(PlatformError::NoConnection("aabb".to_string()).into()),
            Code::NotFound
        );
    }

    #[test]
    fn platform_refusals_are_forwarded_as_unknown() {
        assert_eq!(code(PlatformError::Rejected("read").into()), Code::Unknown);
        assert_eq!(
            code(GattError::Status { operation: "write", status: 0x03 }),
            Code::Unknown
        );
        assert_eq!(code(PlatformError::Unsupported("mtu").into()), Code::Unimplemented);
    }

    #[test]
    fn status_message_carries_code() {
        let status = tonic::Status::from(GattError::Status {
            operation: "mtu exchange",
            status: 0x101,
        });
        assert_eq!(status.message(), "mtu exchange failed with status 0x101");
    }
}
