use serde::{Deserialize, Serialize};

/// Observable state of a workout timer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimerState {
    pub elapsed_seconds: u64,
    pub is_running: bool,
}

impl TimerState {
    #[must_use]
    pub fn to_record(self) -> TimerRecord {
        TimerRecord {
            elapsed_seconds: self.elapsed_seconds,
            is_running: self.is_running,
        }
    }
}

/// Advisory mirror of the timer kept in a durable slot so a reload keeps the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerRecord {
    pub elapsed_seconds: u64,
    pub is_running: bool,
}

impl TimerRecord {
    /// # Errors
    ///
    /// Returns `serde_json::Error` if the record cannot be serialized.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// # Errors
    ///
    /// Returns `serde_json::Error` for malformed input.
    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mirror_round_trips_through_json() {
        let state = TimerState {
            elapsed_seconds: 65,
            is_running: true,
        };
        let raw = state.to_record().encode().unwrap();
        assert_eq!(raw, r#"{"elapsedSeconds":65,"isRunning":true}"#);
        assert_eq!(TimerRecord::decode(&raw).unwrap(), state.to_record());
    }
}
