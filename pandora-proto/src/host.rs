//! Connection handle shared by every Pandora service

/// Opaque connection reference issued by the harness's host service.
#[derive(Clone, PartialEq, Eq, Hash, prost::Message)]
pub struct Connection {
    #[prost(bytes = "vec", tag = "1")]
    pub cookie: Vec<u8>,
}

impl Connection {
    pub fn new(cookie: impl Into<Vec<u8>>) -> Self {
        Self { cookie: cookie.into() }
    }
}
