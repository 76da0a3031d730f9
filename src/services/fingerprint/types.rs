use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::ServiceError;

#[derive(Serialize)]
pub(crate) struct ExtractRequest<'a> {
    pub samples: &'a [i16],
}

#[derive(Deserialize)]
pub(crate) struct ExtractResponse {
    #[serde(rename = "dataEx")]
    pub data_ex: Option<Value>,
    pub size: Option<u64>,
    pub message: Option<String>,
}

/// Opaque fingerprint returned by the extraction service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FingerprintDescriptor {
    pub data: Value,
    pub size: Option<u64>,
}

impl FingerprintDescriptor {
    /// `dataEx` arrives either as JSON or as a string holding JSON.
    pub(crate) fn from_response(resp: ExtractResponse) -> Result<Self, ServiceError> {
        if let Some(message) = resp.message {
            return Err(ServiceError::Message(message));
        }
        let data = match resp.data_ex {
            Some(Value::String(encoded)) => serde_json::from_str(&encoded)
                .map_err(|e| ServiceError::Malformed(format!("dataEx: {}", e)))?,
            Some(Value::Null) | None => {
                return Err(ServiceError::Malformed("missing dataEx".to_string()));
            }
            Some(other) => other,
        };
        Ok(Self { data, size: resp.size })
    }
}

/// One entry of the search response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchCandidate {
    #[serde(deserialize_with = "lenient_id")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub info: Option<String>,
    #[serde(rename = "matchPercentage", deserialize_with = "lenient_percentage")]
    pub match_percentage: u32,
}

impl SearchCandidate {
    pub fn has_info(&self) -> bool {
        self.info.as_deref().is_some_and(|s| !s.trim().is_empty())
    }
}

/// Validated search response.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Found(Vec<SearchCandidate>),
    Empty,
    Malformed(String),
}

impl SearchOutcome {
    pub fn parse(body: &str) -> Self {
        let value: Value = match serde_json::from_str(body) {
            Ok(v) => v,
            Err(e) => return SearchOutcome::Malformed(format!("not JSON: {}", e)),
        };

        match value {
            // Services answer `{ "message": "No Matching fingerprint found" }` on a miss.
            Value::Object(ref map) if map.contains_key("message") => SearchOutcome::Empty,
            Value::Array(items) if items.is_empty() => SearchOutcome::Empty,
            Value::Array(items) => {
                let total = items.len();
                let candidates: Vec<SearchCandidate> = items
                    .into_iter()
                    .filter_map(|item| serde_json::from_value(item).ok())
                    .collect();
                if candidates.is_empty() {
                    SearchOutcome::Malformed(format!("none of {} candidates has the expected shape", total))
                } else {
                    SearchOutcome::Found(candidates)
                }
            }
            other => SearchOutcome::Malformed(format!("unexpected {}", kind_of(&other))),
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn lenient_id<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    match Value::deserialize(de)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("id must be string or number, got {}", kind_of(&other)))),
    }
}

/// Integer prefix semantics: 42, 42.9, "42", "42%" all read as 42.
fn lenient_percentage<'de, D: Deserializer<'de>>(de: D) -> Result<u32, D::Error> {
    match Value::deserialize(de)? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.trunc() as u64))
            .map(|v| v.min(u32::MAX as u64) as u32)
            .ok_or_else(|| serde::de::Error::custom("negative matchPercentage")),
        Value::String(s) => {
            let digits: String = s.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
            digits
                .parse::<u32>()
                .map_err(|_| serde::de::Error::custom(format!("matchPercentage {:?} is not numeric", s)))
        }
        other => Err(serde::de::Error::custom(format!("matchPercentage got {}", kind_of(&other)))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_candidates_with_loose_types() {
        let body = r#"[
            {"id": 301, "name": "Mae Muller iTunes", "description": "", "type": "open_page",
             "info": "https://music.apple.com/us/album/1585274078", "matchPercentage": 2},
            {"id": "x7", "type": "save_page", "info": "https://example.org", "matchPercentage": "37"}
        ]"#;
        match SearchOutcome::parse(body) {
            SearchOutcome::Found(c) => {
                assert_eq!(c.len(), 2);
                assert_eq!(c[0].id, "301");
                assert_eq!(c[0].match_percentage, 2);
                assert_eq!(c[1].match_percentage, 37);
                assert!(c[1].has_info());
            }
            other => panic!("expected candidates, got {:?}", other),
        }
    }

    #[test]
    fn message_and_empty_array_are_empty() {
        assert_eq!(SearchOutcome::parse("[]"), SearchOutcome::Empty);
        assert_eq!(
            SearchOutcome::parse(r#"{"message":"No Matching fingerprint found"}"#),
            SearchOutcome::Empty
        );
    }

    #[test]
    fn wrong_shapes_are_malformed() {
        assert!(matches!(SearchOutcome::parse("<html>"), SearchOutcome::Malformed(_)));
        assert!(matches!(SearchOutcome::parse(r#"{"results": []}"#), SearchOutcome::Malformed(_)));
        assert!(matches!(SearchOutcome::parse(r#"[{"id": 1}]"#), SearchOutcome::Malformed(_)));
    }

    #[test]
    fn data_ex_string_is_decoded() {
        let resp = ExtractResponse {
            data_ex: Some(Value::String("[1,2,3]".to_string())),
            size: Some(3),
            message: None,
        };
        let desc = FingerprintDescriptor::from_response(resp).unwrap();
        assert_eq!(desc.data, serde_json::json!([1, 2, 3]));
    }
}
