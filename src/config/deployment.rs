//! Per-branch deployment configuration.

use std::fmt;
use std::time::Duration;

use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;

/// Deployment settings for one branch
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DeploymentConfig {
    /// Compose file override, exported as `COMPOSE_FILE`
    #[serde(default, rename = "file")]
    pub compose_file: Option<String>,

    /// Compose project name, exported as `COMPOSE_PROJECT_NAME` (required)
    #[serde(default, rename = "project")]
    pub project_name: String,

    #[serde(default)]
    pub skip_pull: bool,

    #[serde(default)]
    pub skip_build: bool,

    #[serde(default)]
    pub skip_up: bool,

    /// How long to capture `logs` after `up`; zero disables the phase
    #[serde(default, deserialize_with = "deserialize_duration")]
    pub tail_log: Duration,

    /// Only recreate containers whose configuration changed
    #[serde(default)]
    pub smart_recreate: bool,
}

impl DeploymentConfig {
    /// Check required fields, returning the name of the first missing one
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.project_name.is_empty() {
            return Err("project");
        }
        Ok(())
    }
}

/// Accepts `"1m30s"`-style strings or a plain number of seconds.
/// Negative values mean zero, i.e. no log capture.
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct DurationVisitor;

    impl<'de> Visitor<'de> for DurationVisitor {
        type Value = Duration;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a duration such as \"30s\" or a number of seconds")
        }

        fn visit_u64<E: de::Error>(self, secs: u64) -> Result<Duration, E> {
            Ok(Duration::from_secs(secs))
        }

        fn visit_i64<E: de::Error>(self, secs: i64) -> Result<Duration, E> {
            Ok(u64::try_from(secs).map_or(Duration::ZERO, Duration::from_secs))
        }

        fn visit_str<E: de::Error>(self, s: &str) -> Result<Duration, E> {
            let trimmed = s.trim();
            let (negative, magnitude) = match trimmed.strip_prefix('-') {
                Some(rest) => (true, rest.trim_start()),
                None => (false, trimmed),
            };
            let duration = humantime::parse_duration(magnitude)
                .map_err(|e| E::custom(format!("invalid duration {:?}: {}", s, e)))?;
            Ok(if negative { Duration::ZERO } else { duration })
        }

        fn visit_unit<E: de::Error>(self) -> Result<Duration, E> {
            Ok(Duration::ZERO)
        }
    }

    deserializer.deserialize_any(DurationVisitor)
}
