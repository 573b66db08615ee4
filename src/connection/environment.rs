//! The `api/v1/environment` probe and Microclimate version handling.

use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;

use crate::errors::ConnectionError;

/// Version number reported by unreleased development builds (`"latest"`).
pub const LATEST_VERSION: u32 = u32::MAX;

/// Oldest server release the tools can talk to (18.09).
pub const REQUIRED_VERSION: u32 = 1809;

/// Raw body of `GET api/v1/environment`.
#[derive(Debug, Clone, Deserialize)]
pub struct EnvironmentResponse {
    #[serde(default)]
    pub microclimate_version: Option<Value>,
    #[serde(default)]
    pub workspace_location: Option<String>,
    #[serde(default)]
    pub socket_namespace: Option<String>,
    #[serde(default)]
    pub user_string: Option<String>,
}

/// What a connection needs to know about its server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub version: u32,
    pub workspace_path: PathBuf,
    pub socket_namespace: String,
}

impl Environment {
    pub fn from_response(url: &str, response: EnvironmentResponse) -> Result<Self, ConnectionError> {
        let bad = |message: &str| ConnectionError::BadResponse {
            url: url.to_string(),
            message: message.to_string(),
        };

        let version = response
            .microclimate_version
            .as_ref()
            .and_then(parse_version)
            .ok_or_else(|| bad("missing or unreadable microclimate_version"))?;
        ensure_supported(version)?;

        let workspace_path = response
            .workspace_location
            .filter(|w| !w.is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| bad("missing workspace_location"))?;

        Ok(Self {
            version,
            workspace_path,
            socket_namespace: response.socket_namespace.unwrap_or_default(),
        })
    }
}

/// `"latest"`, `"1905"`, `"18.12"` or a bare number.
pub fn parse_version(raw: &Value) -> Option<u32> {
    match raw {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) if s.eq_ignore_ascii_case("latest") => Some(LATEST_VERSION),
        Value::String(s) => s.replace('.', "").trim().parse().ok(),
        _ => None,
    }
}

/// `1905` is shown as `19.05`.
pub fn version_to_string(version: u32) -> String {
    if version == LATEST_VERSION {
        "latest".to_string()
    } else {
        format!("{}.{:02}", version / 100, version % 100)
    }
}

pub fn ensure_supported(version: u32) -> Result<(), ConnectionError> {
    if version < REQUIRED_VERSION {
        return Err(ConnectionError::UnsupportedVersion {
            found: version_to_string(version),
            required: version_to_string(REQUIRED_VERSION),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_version_forms() {
        assert_eq!(parse_version(&json!("latest")), Some(LATEST_VERSION));
        assert_eq!(parse_version(&json!("1905")), Some(1905));
        assert_eq!(parse_version(&json!("18.12")), Some(1812));
        assert_eq!(parse_version(&json!(1901)), Some(1901));
        assert_eq!(parse_version(&json!("nope")), None);
        assert_eq!(parse_version(&json!(null)), None);
    }

    #[test]
    fn test_version_to_string() {
        assert_eq!(version_to_string(1905), "19.05");
        assert_eq!(version_to_string(1812), "18.12");
        assert_eq!(version_to_string(LATEST_VERSION), "latest");
    }

    #[test]
    fn test_environment_from_response() {
        let response: EnvironmentResponse = serde_json::from_value(json!({
            "microclimate_version": "1905",
            "workspace_location": "/home/dev/microclimate-workspace",
            "socket_namespace": "/default",
            "running_on_icp": false
        }))
        .unwrap();
        let env = Environment::from_response("http://mc/", response).unwrap();
        assert_eq!(env.version, 1905);
        assert_eq!(env.socket_namespace, "/default");
        assert_eq!(
            env.workspace_path,
            PathBuf::from("/home/dev/microclimate-workspace")
        );
    }

    #[test]
    fn test_old_versions_are_rejected() {
        let response: EnvironmentResponse = serde_json::from_value(json!({
            "microclimate_version": "18.03",
            "workspace_location": "/ws"
        }))
        .unwrap();
        let err = Environment::from_response("http://mc/", response).unwrap_err();
        assert!(matches!(err, ConnectionError::UnsupportedVersion { .. }));
    }

    #[test]
    fn test_missing_workspace_is_bad_response() {
        let response: EnvironmentResponse =
            serde_json::from_value(json!({ "microclimate_version": "latest" })).unwrap();
        let err = Environment::from_response("http://mc/", response).unwrap_err();
        assert!(matches!(err, ConnectionError::BadResponse { .. }));
    }
}
