use crate::domain::result::{DomainError, DomainResult};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// 64-bit LoRaWAN device identifier
///
/// Rendered as 16 lowercase hex characters, which is also the form used in MQTT
/// topics and as the `devEUI` tag value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DevEui([u8; 8]);

impl DevEui {
    pub fn new(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }
}

impl fmt::Display for DevEui {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl FromStr for DevEui {
    type Err = DomainError;

    fn from_str(s: &str) -> DomainResult<Self> {
        let s = s.trim();
        // from_str_radix alone would accept a leading '+' in each pair
        if s.len() != 16 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(DomainError::InvalidDevEui(format!(
                "expected 16 hex characters, got '{}'",
                s
            )));
        }

        let mut bytes = [0u8; 8];
        for (i, byte) in bytes.iter_mut().enumerate() {
            let pair = &s[i * 2..i * 2 + 2];
            *byte = u8::from_str_radix(pair, 16).map_err(|_| {
                DomainError::InvalidDevEui(format!("invalid hex digits '{}' in '{}'", pair, s))
            })?;
        }
        Ok(Self(bytes))
    }
}

impl Serialize for DevEui {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DevEui {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// Uplink message published by the network server on
/// `application/{app}/node/{devEUI}/rx`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UplinkEnvelope {
    #[serde(rename = "devEUI")]
    pub dev_eui: DevEui,

    #[serde(rename = "fPort")]
    pub fport: u8,

    /// Raw application payload. Encoded as base64 text or a byte array; `null`
    /// or a missing field means an empty payload.
    #[serde(default, deserialize_with = "deserialize_payload")]
    pub data: Vec<u8>,

    #[serde(default)]
    pub time: Option<chrono::DateTime<chrono::Utc>>,

    #[serde(default, rename = "fCnt")]
    pub fcnt: Option<u32>,

    #[serde(default, rename = "gatewayCount")]
    pub gateway_count: Option<u32>,

    #[serde(default)]
    pub rssi: Option<i32>,
}

impl UplinkEnvelope {
    /// Decode an envelope from an MQTT message body
    pub fn from_json(body: &[u8]) -> DomainResult<Self> {
        Ok(serde_json::from_slice(body)?)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PayloadRepr {
    Base64(String),
    Bytes(Vec<u8>),
}

fn deserialize_payload<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<PayloadRepr>::deserialize(deserializer)? {
        None => Ok(Vec::new()),
        Some(PayloadRepr::Bytes(bytes)) => Ok(bytes),
        Some(PayloadRepr::Base64(text)) => STANDARD
            .decode(text.as_bytes())
            .map_err(|e| de::Error::custom(format!("invalid base64 payload: {}", e))),
    }
}
