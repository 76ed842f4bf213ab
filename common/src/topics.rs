pub const TOPIC_DATA_EVENTS: &str = "weatherface/data/events";
pub const TOPIC_COMPANION_STATUS: &str = "weatherface/companion/status";
