//! Project action requests: restart, build, auto-build, enablement and unbind.

use std::str::FromStr;

use reqwest::Method;
use serde_json::json;
use url::Url;

use crate::connection::client::MicroclimateClient;
use crate::endpoints::{ProjectEndpoint, enablement_action, resolve_project_endpoint};
use crate::errors::ConnectionError;

/// Mode a project is restarted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartMode {
    #[default]
    Run,
    Debug,
    /// Debug without waiting for the debugger to attach on startup.
    DebugNoInit,
}

impl StartMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Run => "run",
            Self::Debug => "debug",
            Self::DebugNoInit => "debugNoInit",
        }
    }
}

impl FromStr for StartMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "run" => Ok(Self::Run),
            "debug" => Ok(Self::Debug),
            "debugNoInit" => Ok(Self::DebugNoInit),
            _ => Err(format!("Invalid start mode: {}", s)),
        }
    }
}

/// Value of the `action` field posted to the build endpoint.
fn build_action(auto_build: Option<bool>) -> &'static str {
    match auto_build {
        None => "build",
        Some(true) => "enableautobuild",
        Some(false) => "disableautobuild",
    }
}

impl MicroclimateClient {
    pub async fn request_restart(
        &self,
        mc_uri: &Url,
        project_id: &str,
        mode: StartMode,
    ) -> Result<(), ConnectionError> {
        let url = resolve_project_endpoint(mc_uri, project_id, ProjectEndpoint::Restart)?;
        let body = json!({ "startMode": mode.as_str() });
        self.send_action(Method::POST, url, Some(body)).await
    }

    pub async fn request_build(&self, mc_uri: &Url, project_id: &str) -> Result<(), ConnectionError> {
        let url = resolve_project_endpoint(mc_uri, project_id, ProjectEndpoint::Build)?;
        let body = json!({ "action": build_action(None) });
        self.send_action(Method::POST, url, Some(body)).await
    }

    pub async fn request_set_auto_build(
        &self,
        mc_uri: &Url,
        project_id: &str,
        enable: bool,
    ) -> Result<(), ConnectionError> {
        let url = resolve_project_endpoint(mc_uri, project_id, ProjectEndpoint::Build)?;
        let body = json!({ "action": build_action(Some(enable)) });
        self.send_action(Method::POST, url, Some(body)).await
    }

    pub async fn request_set_enabled(
        &self,
        mc_uri: &Url,
        project_id: &str,
        enable: bool,
    ) -> Result<(), ConnectionError> {
        let url = resolve_project_endpoint(mc_uri, project_id, enablement_action(enable))?;
        self.send_action(Method::PUT, url, None).await
    }

    pub async fn request_unbind(&self, mc_uri: &Url, project_id: &str) -> Result<(), ConnectionError> {
        let url = resolve_project_endpoint(mc_uri, project_id, ProjectEndpoint::Unbind)?;
        self.send_action(Method::POST, url, None).await
    }
}
