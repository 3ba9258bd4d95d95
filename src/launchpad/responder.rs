//! Response table
//!
//! A [`ChallengeResponder`] backed by a CSV of known challenge/response
//! pairs captured from the host platform. Used together with a pinned
//! challenge on bench setups where the platform service is not reachable.

use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::info;

use super::handshake::{Challenge, ChallengeResponder};
use crate::error::{Result, SurfaceError};

#[derive(Debug, Deserialize)]
struct ResponseRow {
    challenge: String,
    response: String,
}

/// Known challenge -> response pairs
#[derive(Debug, Clone, Default)]
pub struct ResponseTable {
    entries: HashMap<u32, u16>,
}

impl ResponseTable {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let table = Self::from_reader(file)?;
        info!(
            "Loaded {} handshake responses from {}",
            table.len(),
            path.display()
        );
        Ok(table)
    }

    /// Parse CSV with a `challenge,response` header; numbers may be decimal
    /// or `0x` hex.
    pub fn from_reader(reader: impl Read) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .comment(Some(b'#'))
            .from_reader(reader);

        let mut entries = HashMap::new();
        for (line, row) in csv_reader.deserialize::<ResponseRow>().enumerate() {
            let row = row.map_err(|e| SurfaceError::ResponseTable(e.to_string()))?;
            let challenge = parse_number(&row.challenge)
                .ok_or_else(|| bad_row(line, "challenge", &row.challenge))?;
            let response = parse_number(&row.response)
                .and_then(|n| u16::try_from(n).ok())
                .ok_or_else(|| bad_row(line, "response", &row.response))?;

            entries.insert(Challenge::from_raw(challenge).value(), response);
        }

        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ChallengeResponder for ResponseTable {
    fn expected_response(&self, challenge: Challenge) -> Option<u16> {
        self.entries.get(&challenge.value()).copied()
    }
}

fn parse_number(text: &str) -> Option<u32> {
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

fn bad_row(line: usize, column: &str, value: &str) -> SurfaceError {
    SurfaceError::ResponseTable(format!("row {}: invalid {} '{}'", line + 1, column, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_table() {
        let csv = "challenge,response\n# bench unit\n0x12345658, 0x1A2B\n42,7\n";
        let table = ResponseTable::from_reader(csv.as_bytes()).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(
            table.expected_response(Challenge::from_raw(0x1234_5658)),
            Some(0x1A2B)
        );
        assert_eq!(table.expected_response(Challenge::from_raw(42)), Some(7));
        assert_eq!(table.expected_response(Challenge::from_raw(43)), None);
    }

    #[test]
    fn test_challenges_are_masked_on_load() {
        let csv = "challenge,response\n0x92B456F8,5\n";
        let table = ResponseTable::from_reader(csv.as_bytes()).unwrap();

        assert_eq!(
            table.expected_response(Challenge::from_raw(0x1234_5678)),
            Some(5)
        );
    }

    #[test]
    fn test_response_out_of_range() {
        let csv = "challenge,response\n1,70000\n";
        let err = ResponseTable::from_reader(csv.as_bytes()).unwrap_err();

        assert!(err.to_string().contains("invalid response"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("responses.csv");
        std::fs::write(&path, "challenge,response\n1,2\n").unwrap();

        let table = ResponseTable::load(&path).unwrap();
        assert_eq!(table.expected_response(Challenge::from_raw(1)), Some(2));
    }
}
