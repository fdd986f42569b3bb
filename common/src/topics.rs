pub const STATUS_SUBTOPIC: &str = "status";
pub const DATA_SUBTOPIC: &str = "data";

/// `<base>/status` — retained availability messages.
pub fn status_topic(base_topic: &str) -> String {
    join(base_topic, STATUS_SUBTOPIC)
}

/// `<base>/data` — periodic sensor readings.
pub fn data_topic(base_topic: &str) -> String {
    join(base_topic, DATA_SUBTOPIC)
}

fn join(base_topic: &str, subtopic: &str) -> String {
    format!("{}/{}", base_topic.trim_end_matches('/'), subtopic)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn derives_subtopics_from_base() {
        assert_eq!(
            status_topic("airdry/devices/gateway001"),
            "airdry/devices/gateway001/status"
        );
        assert_eq!(
            data_topic("airdry/devices/gateway001"),
            "airdry/devices/gateway001/data"
        );
    }

    #[test]
    fn trailing_slash_does_not_double_up() {
        assert_eq!(data_topic("airdry/devices/gateway001/"), "airdry/devices/gateway001/data");
    }
}
