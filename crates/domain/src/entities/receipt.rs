//! Receipt lifecycle states

use std::fmt;

use serde::{Deserialize, Serialize};

/// Processing state of a stored receipt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    /// Fields were extracted and the record stored
    Recognized,
    /// The export resource was busy; the row still has to be written
    PendingExport,
    /// Row appended to the spreadsheet sink
    Exported,
    /// The sink rejected the row
    ExportFailed,
}

impl ReceiptStatus {
    /// Storage representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Recognized => "recognized",
            Self::PendingExport => "pending_export",
            Self::Exported => "exported",
            Self::ExportFailed => "export_failed",
        }
    }
}

impl fmt::Display for ReceiptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReceiptStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "recognized" => Ok(Self::Recognized),
            "pending_export" => Ok(Self::PendingExport),
            "exported" => Ok(Self::Exported),
            "export_failed" => Ok(Self::ExportFailed),
            _ => Err(format!("Unknown receipt status: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_its_own_representation() {
        for status in [
            ReceiptStatus::Recognized,
            ReceiptStatus::PendingExport,
            ReceiptStatus::Exported,
            ReceiptStatus::ExportFailed,
        ] {
            assert_eq!(status.as_str().parse::<ReceiptStatus>(), Ok(status));
        }
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!("archived".parse::<ReceiptStatus>().is_err());
    }
}
