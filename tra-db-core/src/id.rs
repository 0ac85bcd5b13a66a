//! Entity identifiers
//!
//! Assessment identifiers follow the `TRA-YYYY-XXXXXX` format (year plus six
//! uppercase hex characters). Child entities (documents, events, messages)
//! use plain v4 UUIDs.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Validated assessment identifier (`TRA-YYYY-XXXXXX`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssessmentId(String);

impl AssessmentId {
    /// Generate a fresh identifier for the current year
    ///
    /// The six-character suffix is drawn from a v4 UUID, uppercased.
    pub fn generate() -> Self {
        let year = Utc::now().year();
        let suffix: String = Uuid::new_v4()
            .simple()
            .to_string()
            .chars()
            .take(6)
            .collect::<String>()
            .to_uppercase();
        Self(format!("TRA-{year}-{suffix}"))
    }

    /// Parse and validate an identifier
    pub fn parse(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.splitn(3, '-').collect();
        let valid = parts.len() == 3
            && parts[0] == "TRA"
            && parts[1].len() == 4
            && parts[1].chars().all(|c| c.is_ascii_digit())
            && parts[2].len() == 6
            && parts[2]
                .chars()
                .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c));
        if !valid {
            return Err(Error::invalid_id(format!(
                "assessment id must match TRA-YYYY-XXXXXX, got {s:?}"
            )));
        }
        Ok(Self(s.to_string()))
    }

    /// Identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssessmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AssessmentId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Generate an identifier for a child entity (document, event, message)
pub fn new_entity_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_validate() {
        let id = AssessmentId::generate();
        assert!(AssessmentId::parse(id.as_str()).is_ok());
    }

    #[test]
    fn parse_accepts_canonical_form() {
        let id = AssessmentId::parse("TRA-2025-A1B2C3").unwrap();
        assert_eq!(id.as_str(), "TRA-2025-A1B2C3");
    }

    #[test]
    fn parse_rejects_malformed_ids() {
        for bad in [
            "TRA-2025-a1b2c3", // lowercase hex
            "TRA-25-A1B2C3",   // short year
            "TRA-2025-A1B2",   // short suffix
            "XYZ-2025-A1B2C3", // wrong prefix
            "TRA-2025-G1B2C3", // non-hex suffix
            "",
        ] {
            assert!(AssessmentId::parse(bad).is_err(), "accepted {bad:?}");
        }
    }
}
