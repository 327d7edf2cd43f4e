use serde::{Deserialize, Serialize};

/// The group's persisted logging policy (`roConfig`'s `lt`/`i`/`bft` triple).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoggingType {
    AllData,
    Interval,
    PointChange,
}

impl Default for LoggingType {
    fn default() -> Self {
        LoggingType::AllData
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupConfig {
    #[serde(rename = "lt", default)]
    pub logging_type: LoggingType,
    /// Seconds between interval-sampler ticks. Only consulted when
    /// `logging_type == Interval`.
    #[serde(rename = "i", default = "default_interval_seconds")]
    pub interval_seconds: i64,
    /// Seconds between buffer-flush ticks. `0` disables buffering: writes
    /// happen (after draining anything already queued) directly from the
    /// call that produced them.
    #[serde(rename = "bft", default = "default_buffer_flush_seconds")]
    pub buffer_flush_seconds: i64,
}

fn default_interval_seconds() -> i64 {
    5
}

fn default_buffer_flush_seconds() -> i64 {
    5
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            logging_type: LoggingType::AllData,
            interval_seconds: default_interval_seconds(),
            buffer_flush_seconds: default_buffer_flush_seconds(),
        }
    }
}

impl GroupConfig {
    /// Negative periods are nonsensical for a scheduler tick; clamp them to
    /// 0 (disabled) rather than reject the whole edit.
    pub fn clamped(mut self) -> Self {
        if self.buffer_flush_seconds < 0 {
            self.buffer_flush_seconds = 0;
        }
        if self.interval_seconds < 0 {
            self.interval_seconds = 0;
        }
        self
    }

    /// Parses the `edit` action's parameters (`Buffer Flush Time`, `Logging
    /// Type`, `Interval`) when the node tree hands them over as a single
    /// query string, e.g. `bft=0&lt=POINT_CHANGE&i=5`. Missing fields fall
    /// back to the prior `roConfig` defaults via each field's own
    /// `#[serde(default)]`.
    pub fn from_query(query: Option<&str>) -> Result<Self, serde_urlencoded::de::Error> {
        match query {
            Some(q) => serde_urlencoded::from_str(q),
            None => Ok(Self::default()),
        }
    }
}
