use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterRecord {
    pub jurisdiction: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceSeed {
    pub ref_id: String,
    pub jurisdiction: String,
    pub name: String,
}

pub fn parse_jsonl_records(input: &str) -> Result<Vec<RosterRecord>, serde_json::Error> {
    parse_jsonl(input)
}

pub fn parse_jsonl_seeds(input: &str) -> Result<Vec<ReferenceSeed>, serde_json::Error> {
    parse_jsonl(input)
}

fn parse_jsonl<T: serde::de::DeserializeOwned>(input: &str) -> Result<Vec<T>, serde_json::Error> {
    let mut out = Vec::new();
    for line in input.lines() {
        if line.trim().is_empty() {
            continue;
        }
        out.push(serde_json::from_str(line)?);
    }
    Ok(out)
}
