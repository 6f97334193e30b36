pub const TOPIC_SENSOR: &str = "climate/sensor";
pub const TOPIC_COMMAND: &str = "climate/command";
