//! Wire format of the asynchronous read (OCR) service.

use serde::{Deserialize, Deserializer, Serialize};

/// Status reported by a polling response.
///
/// Anything other than `succeeded` or `failed` (e.g. `notStarted`,
/// `running`) means the operation is still in progress.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OcrStatus {
    Succeeded,
    Failed,
    Running(String),
}

impl OcrStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            s if s.eq_ignore_ascii_case("succeeded") => OcrStatus::Succeeded,
            s if s.eq_ignore_ascii_case("failed") => OcrStatus::Failed,
            other => OcrStatus::Running(other.to_string()),
        }
    }
}

/// Body of one polling response.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct OcrResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyze_result: Option<AnalyzeResult>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResult {
    #[serde(default, deserialize_with = "null_as_default")]
    pub read_results: Vec<ReadResult>,
}

/// One recognised page.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ReadResult {
    #[serde(default, deserialize_with = "null_as_default")]
    pub lines: Vec<Line>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Line {
    /// Missing or `null` text reads as an empty line.
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
}

/// Treat an explicit `null` like an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl OcrResponse {
    pub fn status(&self) -> OcrStatus {
        OcrStatus::parse(&self.status)
    }

    /// All recognised lines across pages, in page order then line order.
    pub fn lines(&self) -> Vec<String> {
        self.analyze_result
            .iter()
            .flat_map(|result| result.read_results.iter())
            .flat_map(|page| page.lines.iter())
            .map(|line| line.text.clone())
            .collect()
    }
}

/// A terminal (`succeeded`) polling response: typed view plus the untouched
/// JSON body kept for auditing.
#[derive(Clone, Debug)]
pub struct CompletedRead {
    pub response: OcrResponse,
    pub raw: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_parsing_treats_unknown_values_as_running() {
        assert_eq!(OcrStatus::parse("succeeded"), OcrStatus::Succeeded);
        assert_eq!(OcrStatus::parse("Failed"), OcrStatus::Failed);
        assert_eq!(
            OcrStatus::parse("notStarted"),
            OcrStatus::Running("notStarted".into())
        );
    }

    #[test]
    fn lines_are_flattened_across_pages_in_order() {
        let body = json!({
            "status": "succeeded",
            "analyzeResult": {
                "readResults": [
                    { "page": 1, "lines": [ { "text": "A", "boundingBox": [0, 1] }, { "text": "B" } ] },
                    { "page": 2, "lines": [ { "text": "C" } ] }
                ]
            }
        });
        let response: OcrResponse = serde_json::from_value(body).unwrap();
        assert_eq!(response.status(), OcrStatus::Succeeded);
        assert_eq!(response.lines(), vec!["A", "B", "C"]);
    }

    #[test]
    fn malformed_lines_do_not_fail_the_whole_body() {
        let body = json!({
            "status": "succeeded",
            "analyzeResult": {
                "readResults": [
                    { "lines": [ { "text": "A" }, { "boundingBox": [0, 1] }, { "text": null } ] },
                    { "lines": null }
                ]
            }
        });
        let response: OcrResponse = serde_json::from_value(body).unwrap();
        assert_eq!(response.lines(), vec!["A", "", ""]);
    }

    #[test]
    fn null_status_reads_as_still_running() {
        let response: OcrResponse = serde_json::from_value(json!({ "status": null })).unwrap();
        assert_eq!(response.status(), OcrStatus::Running(String::new()));
    }

    #[test]
    fn running_response_has_no_lines() {
        let response: OcrResponse = serde_json::from_value(json!({ "status": "running" })).unwrap();
        assert!(response.lines().is_empty());
    }
}
