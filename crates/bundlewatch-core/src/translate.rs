//! Fleet bundle deployment state → commit status translation.
//!
//! The table is closed-world: a state without an entry is never guessed at,
//! the caller drops the event instead.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Commit status vocabulary of the external status API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Pending,
    Error,
    Failure,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Success => "success",
            Severity::Pending => "pending",
            Severity::Error => "error",
            Severity::Failure => "failure",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "success" => Ok(Severity::Success),
            "pending" => Ok(Severity::Pending),
            "error" => Ok(Severity::Error),
            "failure" => Ok(Severity::Failure),
            other => Err(format!(
                "unknown severity {other:?}, expected one of success, pending, error, failure"
            )),
        }
    }
}

/// One row of the translation table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateEntry {
    pub raw_state: &'static str,
    pub severity: Severity,
    pub description: &'static str,
}

const IN_PROGRESS: &str = "Bundle deployment in progress";

const DEFAULT_TABLE: [StateEntry; 7] = [
    StateEntry {
        raw_state: "Ready",
        severity: Severity::Success,
        description: "Bundle deployment succeeded",
    },
    StateEntry {
        raw_state: "NotReady",
        severity: Severity::Pending,
        description: IN_PROGRESS,
    },
    StateEntry {
        raw_state: "WaitApplied",
        severity: Severity::Pending,
        description: IN_PROGRESS,
    },
    StateEntry {
        raw_state: "ErrApplied",
        severity: Severity::Error,
        description: "Bundle deployment failed",
    },
    StateEntry {
        raw_state: "OutOfSync",
        severity: Severity::Error,
        description: "Bundle deployment OutOfSync",
    },
    StateEntry {
        raw_state: "Pending",
        severity: Severity::Pending,
        description: IN_PROGRESS,
    },
    StateEntry {
        raw_state: "Modified",
        severity: Severity::Success,
        description: "Bundle deployment modified",
    },
];

/// Case-sensitive lookup from deployment state to status entry.
#[derive(Debug, Clone)]
pub struct StateTranslator {
    entries: Vec<StateEntry>,
}

impl Default for StateTranslator {
    fn default() -> Self {
        Self {
            entries: DEFAULT_TABLE.to_vec(),
        }
    }
}

impl StateTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the severity reported for `Modified`.
    ///
    /// Whether drift should read as success or failure is an operator
    /// decision; the default stays `success`.
    pub fn with_modified_severity(mut self, severity: Severity) -> Self {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.raw_state == "Modified") {
            entry.severity = severity;
        }
        self
    }

    pub fn translate(&self, raw_state: &str) -> Option<&StateEntry> {
        self.entries.iter().find(|e| e.raw_state == raw_state)
    }

    pub fn entries(&self) -> &[StateEntry] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_known_state_translates_exactly() {
        let translator = StateTranslator::new();
        let expected = [
            ("Ready", Severity::Success, "Bundle deployment succeeded"),
            ("NotReady", Severity::Pending, "Bundle deployment in progress"),
            ("WaitApplied", Severity::Pending, "Bundle deployment in progress"),
            ("ErrApplied", Severity::Error, "Bundle deployment failed"),
            ("OutOfSync", Severity::Error, "Bundle deployment OutOfSync"),
            ("Pending", Severity::Pending, "Bundle deployment in progress"),
            ("Modified", Severity::Success, "Bundle deployment modified"),
        ];

        for (raw, severity, description) in expected {
            let entry = translator.translate(raw).expect(raw);
            assert_eq!(entry.severity, severity, "{raw}");
            assert_eq!(entry.description, description, "{raw}");
        }
        assert_eq!(translator.entries().len(), expected.len());
    }

    #[test]
    fn test_unknown_states_are_not_found() {
        let translator = StateTranslator::new();
        for raw in ["Bogus", "ready", "READY", "", " Ready", "Missing"] {
            assert!(translator.translate(raw).is_none(), "{raw:?} translated");
        }
    }

    #[test]
    fn test_modified_severity_is_overridable() {
        let translator = StateTranslator::new().with_modified_severity(Severity::Failure);
        let entry = translator.translate("Modified").unwrap();
        assert_eq!(entry.severity, Severity::Failure);
        assert_eq!(entry.description, "Bundle deployment modified");
        assert_eq!(
            translator.translate("Ready").unwrap().severity,
            Severity::Success
        );
    }

    #[test]
    fn test_severity_parse_and_display() {
        assert_eq!("failure".parse::<Severity>().unwrap(), Severity::Failure);
        assert_eq!("Success".parse::<Severity>().unwrap(), Severity::Success);
        assert!("ok".parse::<Severity>().is_err());
        assert_eq!(Severity::Pending.to_string(), "pending");
        assert_eq!(
            serde_json::to_string(&Severity::Error).unwrap(),
            "\"error\""
        );
    }
}
