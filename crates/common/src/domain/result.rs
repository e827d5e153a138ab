use sensor_payload::PayloadError;
use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid uplink envelope: {0}")]
    InvalidEnvelope(#[from] serde_json::Error),

    #[error("Invalid device EUI: {0}")]
    InvalidDevEui(String),

    #[error("Payload decode error: {0}")]
    PayloadDecode(#[from] PayloadError),

    #[error("Invalid topic: {0}")]
    InvalidTopic(String),

    #[error("Invalid broker URL: {0}")]
    InvalidBrokerUrl(String),

    #[error("MQTT connection error: {0}")]
    ConnectionError(String),

    #[error("MQTT subscription rejected: {0}")]
    SubscriptionRejected(String),

    #[error("Invalid sink configuration: {0}")]
    InvalidSinkConfig(String),

    #[error("Point construction error: {0}")]
    PointConstruction(String),

    #[error("Sink write error: {0}")]
    SinkWriteError(#[from] anyhow::Error),
}
