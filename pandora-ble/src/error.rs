use pandora_gatt::PlatformError;

#[derive(Debug, thiserror::Error)]
pub enum BleError {
    #[error("no bluetooth adapter at index {0}")]
    NoAdapter(usize),

    #[error("invalid bluetooth address: {0}")]
    InvalidAddress(String),

    #[error("bluetooth error: {0}")]
    Btleplug(#[from] btleplug::Error),
}

impl From<BleError> for PlatformError {
    fn from(e: BleError) -> Self {
        match e {
            BleError::InvalidAddress(addr) => PlatformError::NoConnection(addr),
            BleError::Btleplug(btleplug::Error::NotSupported(what)) => {
                tracing::debug!(%what, "unsupported by btleplug");
                PlatformError::Unsupported("operation")
            }
            other => PlatformError::Other(other.to_string()),
        }
    }
}
