//! REST endpoint and portal URL resolution for a Microclimate server.
//!
//! Every connection URI is normalized to end in `/`, so endpoints are joined
//! as relative paths onto it.

use url::Url;

use crate::errors::ConnectionError;

/// Server-level endpoints, e.g. `localhost:9090/api/v1/environment`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McEndpoint {
    Environment,
    Templates,
    Projects,
    BindValidate,
    Bind,
}

impl McEndpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Self::Environment => "api/v1/environment",
            Self::Templates => "api/v1/templates",
            Self::Projects => "api/v1/projects",
            Self::BindValidate => "api/v1/validate",
            Self::Bind => "api/v1/projects/bind",
        }
    }
}

/// Project endpoints, appended to `api/v1/projects/<id>/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectEndpoint {
    Restart,
    Build,
    Properties,
    Logs,
    MetricsStatus,
    Open,
    Close,
    Unbind,
}

impl ProjectEndpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Self::Restart => "restart",
            Self::Build => "build",
            Self::Properties => "properties",
            Self::Logs => "logs",
            Self::MetricsStatus => "metrics/status",
            Self::Open => "open",
            Self::Close => "close",
            Self::Unbind => "unbind",
        }
    }
}

/// Parse a user-supplied server URL and normalize it to an http(s) base ending in `/`.
pub fn normalize_mc_uri(raw: &str) -> Result<Url, ConnectionError> {
    let invalid = |reason: &str| ConnectionError::InvalidUrl {
        url: raw.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = raw.trim();
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };

    let mut url = Url::parse(&with_scheme).map_err(|e| invalid(&e.to_string()))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(invalid("scheme must be http or https"));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host"));
    }
    url.set_query(None);
    url.set_fragment(None);
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// `host[:port]` of a connection URI. This is the key tokens are stored under.
pub fn host_key(mc_uri: &Url) -> String {
    let host = mc_uri.host_str().unwrap_or_default();
    match mc_uri.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

pub fn resolve_mc_endpoint(mc_uri: &Url, endpoint: McEndpoint) -> Result<Url, ConnectionError> {
    join(mc_uri, endpoint.path())
}

pub fn resolve_project_endpoint(
    mc_uri: &Url,
    project_id: &str,
    endpoint: ProjectEndpoint,
) -> Result<Url, ConnectionError> {
    let path = format!(
        "{}/{}/{}",
        McEndpoint::Projects.path(),
        project_id,
        endpoint.path()
    );
    join(mc_uri, &path)
}

/// Portal page showing the application monitor for a project.
pub fn resolve_app_monitor_url(mc_uri: &Url, project_id: &str) -> Url {
    let mut url = mc_uri.clone();
    url.set_query(Some(&format!("project={}&view=monitor", project_id)));
    url
}

/// Portal page for creating a new project, or importing an existing one.
pub fn resolve_create_or_import_url(mc_uri: &Url, create: bool) -> Url {
    let mut url = mc_uri.clone();
    url.set_query(Some(if create {
        "new-project=true"
    } else {
        "import-project=true"
    }));
    url
}

pub fn enablement_action(enable: bool) -> ProjectEndpoint {
    if enable {
        ProjectEndpoint::Open
    } else {
        ProjectEndpoint::Close
    }
}

fn join(mc_uri: &Url, path: &str) -> Result<Url, ConnectionError> {
    mc_uri.join(path).map_err(|e| ConnectionError::InvalidUrl {
        url: format!("{}{}", mc_uri, path),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        normalize_mc_uri("http://localhost:9090").unwrap()
    }

    #[test]
    fn test_normalize_adds_trailing_slash() {
        assert_eq!(base().as_str(), "http://localhost:9090/");
    }

    #[test]
    fn test_normalize_adds_scheme() {
        let url = normalize_mc_uri("mc.example.com:9090").unwrap();
        assert_eq!(url.as_str(), "http://mc.example.com:9090/");
    }

    #[test]
    fn test_normalize_strips_query() {
        let url = normalize_mc_uri("https://mc.example.com/portal?x=1#frag").unwrap();
        assert_eq!(url.as_str(), "https://mc.example.com/portal/");
    }

    #[test]
    fn test_normalize_rejects_other_schemes() {
        let err = normalize_mc_uri("ftp://mc.example.com").unwrap_err();
        assert!(matches!(err, ConnectionError::InvalidUrl { .. }));
    }

    #[test]
    fn test_host_key_includes_port() {
        assert_eq!(host_key(&base()), "localhost:9090");
        let no_port = normalize_mc_uri("https://mc.example.com").unwrap();
        assert_eq!(host_key(&no_port), "mc.example.com");
    }

    #[test]
    fn test_resolve_mc_endpoint() {
        let url = resolve_mc_endpoint(&base(), McEndpoint::Projects).unwrap();
        assert_eq!(url.as_str(), "http://localhost:9090/api/v1/projects");
    }

    #[test]
    fn test_resolve_project_endpoint() {
        let url = resolve_project_endpoint(
            &base(),
            "81eba580-0aea-11e9-b530-67b2995d0cd9",
            ProjectEndpoint::Restart,
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:9090/api/v1/projects/81eba580-0aea-11e9-b530-67b2995d0cd9/restart"
        );
    }

    #[test]
    fn test_resolve_project_endpoint_nested_path() {
        let url = resolve_project_endpoint(&base(), "p1", ProjectEndpoint::MetricsStatus).unwrap();
        assert!(url.as_str().ends_with("/api/v1/projects/p1/metrics/status"));
    }

    #[test]
    fn test_app_monitor_url() {
        let url = resolve_app_monitor_url(&base(), "p1");
        assert_eq!(url.as_str(), "http://localhost:9090/?project=p1&view=monitor");
    }

    #[test]
    fn test_create_or_import_url() {
        assert_eq!(
            resolve_create_or_import_url(&base(), true).query(),
            Some("new-project=true")
        );
        assert_eq!(
            resolve_create_or_import_url(&base(), false).query(),
            Some("import-project=true")
        );
    }

    #[test]
    fn test_enablement_action() {
        assert_eq!(enablement_action(true), ProjectEndpoint::Open);
        assert_eq!(enablement_action(false), ProjectEndpoint::Close);
    }
}
