//! The persisted outcome of one certificate image analysis.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Best-effort structured guesses derived from OCR text.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedFields {
    /// Full recognised text, lines joined with `\n`.
    pub text: String,
    pub possible_code: Option<String>,
    pub possible_issuer: Option<String>,
    pub possible_dates: Vec<String>,
}

/// One record per certificate, keyed by `certificate_id`.
///
/// Reprocessing the same certificate replaces the whole record.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CertificateAnalysis {
    pub certificate_id: String,

    /// Source object path.
    pub file_path: String,

    pub analysis: ExtractedFields,

    /// Terminal OCR response, as returned by the service.
    pub raw_analysis: serde_json::Value,

    /// Write time, assigned by the result store.
    pub timestamp: DateTime<Utc>,
}

/// A record ready to be written; the store stamps it on write.
#[derive(Clone, Debug)]
pub struct AnalysisDraft {
    pub certificate_id: String,
    pub file_path: String,
    pub analysis: ExtractedFields,
    pub raw_analysis: serde_json::Value,
}

impl AnalysisDraft {
    pub fn stamped(self, timestamp: DateTime<Utc>) -> CertificateAnalysis {
        CertificateAnalysis {
            certificate_id: self.certificate_id,
            file_path: self.file_path,
            analysis: self.analysis,
            raw_analysis: self.raw_analysis,
            timestamp,
        }
    }
}
