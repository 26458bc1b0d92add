use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    #[error(transparent)]
    MQTTOptionError(#[from] rumqttc::OptionError),

    #[error(transparent)]
    MQTTClientError(#[from] rumqttc::ClientError),

    #[error(transparent)]
    InvalidSocketAddr(#[from] std::net::AddrParseError),

    #[error(transparent)]
    JSONError(#[from] serde_json::Error),

    #[error("invalid MAC address: {0}")]
    InvalidMacAddress(String),

    #[error("malformed identity data: {0}")]
    Identity(std::borrow::Cow<'static, str>),

    #[error("register decode failed: {0}")]
    Decode(std::borrow::Cow<'static, str>),

    #[error("expected a {expected} value, got {got}")]
    ValueKind {
        expected: &'static str,
        got: &'static str,
    },

    #[error("SendError")]
    SendError,
}
