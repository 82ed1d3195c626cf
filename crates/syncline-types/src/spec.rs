//! Connector self-description and connectivity status payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Payload of a `SPEC` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorSpecification {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub documentation_url: String,
    pub supports_incremental: bool,
    pub connection_specification: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Outcome carried by a `CONNECTION_STATUS` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckStatus {
    Succeeded,
    Failed,
}

/// Payload of a `CONNECTION_STATUS` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub status: CheckStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ConnectionStatus {
    pub fn succeeded() -> Self {
        Self { status: CheckStatus::Succeeded, reason: None }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self { status: CheckStatus::Failed, reason: Some(reason.into()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn spec_uses_camel_case_keys() {
        let spec = ConnectorSpecification {
            documentation_url: "https://docs.example.com".into(),
            supports_incremental: true,
            connection_specification: json!({"type": "object"}),
            notes: vec![],
            version: None,
        };
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["documentationUrl"], "https://docs.example.com");
        assert_eq!(json["supportsIncremental"], true);
        assert_eq!(json["connectionSpecification"]["type"], "object");
        assert!(json.get("notes").is_none());
        assert!(json.get("version").is_none());
    }

    #[test]
    fn empty_documentation_url_is_omitted() {
        let spec = ConnectorSpecification {
            documentation_url: String::new(),
            supports_incremental: false,
            connection_specification: json!({}),
            notes: vec!["rate limited to 100 req/min".into()],
            version: Some("1.2.0".into()),
        };
        let json = serde_json::to_value(&spec).unwrap();
        assert!(json.get("documentationUrl").is_none());
        assert_eq!(json["notes"][0], "rate limited to 100 req/min");
        assert_eq!(json["version"], "1.2.0");
    }

    #[test]
    fn status_wire_shape() {
        let ok = serde_json::to_value(ConnectionStatus::succeeded()).unwrap();
        assert_eq!(ok, json!({"status": "SUCCEEDED"}));

        let failed = serde_json::to_value(ConnectionStatus::failed("bad token")).unwrap();
        assert_eq!(failed, json!({"status": "FAILED", "reason": "bad token"}));
    }
}
