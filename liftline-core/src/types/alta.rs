//! Alta lift report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One lift as reported by Alta.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AltaLift {
    /// Lift name
    pub name: String,
    /// Whether the lift is currently running
    pub open: bool,
    /// Scheduled opening time, when published
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opening_at: Option<String>,
    /// Scheduled closing time, when published
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closing_at: Option<String>,
}

/// Normalised Alta lift status document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AltaReport {
    /// Lifts in page order
    pub lifts: Vec<AltaLift>,
    /// When the page was fetched
    pub fetched_at: DateTime<Utc>,
}

impl AltaReport {
    /// Number of lifts currently open.
    pub fn open_count(&self) -> usize {
        self.lifts.iter().filter(|l| l.open).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialization_omits_missing_times() {
        let report = AltaReport {
            lifts: vec![AltaLift {
                name: "Collins".into(),
                open: true,
                opening_at: Some("09:00".into()),
                closing_at: None,
            }],
            fetched_at: Utc::now(),
        };
        let json = serde_json::to_value(&report).unwrap();
        let lift = &json["lifts"][0];
        assert_eq!(lift["opening_at"], "09:00");
        assert!(lift.get("closing_at").is_none());
        assert_eq!(report.open_count(), 1);
    }
}
