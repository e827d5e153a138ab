use common::domain::{DevEui, DomainError, DomainResult};
use std::fmt;

/// Which devices under an application the listener subscribes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceSelector {
    /// Every device, via the single-level `+` wildcard
    Any,
    /// A single fixed device
    Device(DevEui),
}

impl fmt::Display for DeviceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceSelector::Any => f.write_str("+"),
            DeviceSelector::Device(dev_eui) => write!(f, "{}", dev_eui),
        }
    }
}

/// Parsed uplink topic `application/{application_id}/node/{dev_eui}/rx`
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTopic {
    pub application_id: String,
    pub dev_eui: DevEui,
}

/// Build the subscription filter for uplinks of one application
///
/// # Examples
/// ```
/// use mqtt_listener::mqtt::{uplink_topic_filter, DeviceSelector};
///
/// let topic = uplink_topic_filter("0101010101010101", &DeviceSelector::Any).unwrap();
/// assert_eq!(topic, "application/0101010101010101/node/+/rx");
/// ```
pub fn uplink_topic_filter(application_id: &str, device: &DeviceSelector) -> DomainResult<String> {
    let application_id = application_id.trim();
    if application_id.is_empty() {
        return Err(DomainError::InvalidTopic(
            "Application ID cannot be empty".to_string(),
        ));
    }
    if application_id.contains(['/', '+', '#']) {
        return Err(DomainError::InvalidTopic(format!(
            "Application ID '{}' must not contain '/', '+' or '#'",
            application_id
        )));
    }

    Ok(format!("application/{}/node/{}/rx", application_id, device))
}

/// Parse a concrete uplink topic back into its application and device
pub fn parse_uplink_topic(topic: &str) -> DomainResult<ParsedTopic> {
    let parts: Vec<&str> = topic.split('/').collect();

    match parts.as_slice() {
        ["application", application_id, "node", dev_eui, "rx"] if !application_id.is_empty() => {
            Ok(ParsedTopic {
                application_id: application_id.to_string(),
                dev_eui: dev_eui.parse()?,
            })
        }
        _ => Err(DomainError::InvalidTopic(format!(
            "Invalid topic format '{}': expected 'application/{{app_id}}/node/{{dev_eui}}/rx'",
            topic
        ))),
    }
}
