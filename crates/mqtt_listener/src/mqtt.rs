mod subscriber;
mod topic;

pub use subscriber::{handle_uplink_message, run_mqtt_listener, MqttListenerConfig};
pub use topic::{parse_uplink_topic, uplink_topic_filter, DeviceSelector, ParsedTopic};
