use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Severity of a notification, ordered from least to most urgent.
///
/// The ordering is used when deciding which notifications to keep when
/// trimming, and for mapping to accessibility roles: `Warning` and `Error`
/// are announced assertively, the rest politely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Success,
    Info,
    Warning,
    Error,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Success,
        Severity::Info,
        Severity::Warning,
        Severity::Error,
    ];

    /// Stable string form, also used as the style-class suffix on rendered
    /// notification elements.
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Success => "success",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }

    /// Whether this severity should interrupt the user (assertive live
    /// region) rather than wait for an idle moment.
    pub fn is_assertive(self) -> bool {
        matches!(self, Severity::Warning | Severity::Error)
    }

    /// Built-in auto-close duration in milliseconds, used when no
    /// per-severity override is configured.
    pub fn default_duration_ms(self) -> u64 {
        match self {
            Severity::Success => 4000,
            Severity::Info => 5000,
            Severity::Warning => 6000,
            Severity::Error => 8000,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownSeverity;

impl fmt::Display for UnknownSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unknown severity")
    }
}

impl std::error::Error for UnknownSeverity {}

impl FromStr for Severity {
    type Err = UnknownSeverity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Severity::Success),
            "info" => Ok(Severity::Info),
            "warning" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            _ => Err(UnknownSeverity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Success < Severity::Info);
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
    }

    #[test]
    fn test_severity_roundtrip() {
        for severity in Severity::ALL {
            assert_eq!(severity.as_str().parse::<Severity>(), Ok(severity));
        }
        assert!("critical".parse::<Severity>().is_err());
    }

    #[test]
    fn test_assertive_mapping() {
        assert!(!Severity::Success.is_assertive());
        assert!(!Severity::Info.is_assertive());
        assert!(Severity::Warning.is_assertive());
        assert!(Severity::Error.is_assertive());
    }

    #[test]
    fn test_severity_as_json_map_key() {
        use std::collections::HashMap;

        let mut durations = HashMap::new();
        durations.insert(Severity::Error, 10_000u64);
        let json = serde_json::to_string(&durations).unwrap();
        assert!(json.contains("Error"));

        let back: HashMap<Severity, u64> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.get(&Severity::Error), Some(&10_000));
    }
}
