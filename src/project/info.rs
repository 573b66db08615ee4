use serde::{Deserialize, Serialize};

/// Host-side ports of a running project. Microclimate reports them as strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPorts {
    #[serde(default)]
    pub exposed_port: Option<String>,
    #[serde(default)]
    pub internal_port: Option<String>,
    #[serde(default)]
    pub exposed_debug_port: Option<String>,
    #[serde(default)]
    pub internal_debug_port: Option<String>,
}

/// Raw project record from `GET api/v1/projects` or a project socket event.
///
/// Socket events carry partial records, so everything except the ID is optional
/// and [`ProjectInfo::merge`] only overwrites the fields that are present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInfo {
    #[serde(rename = "projectID")]
    pub project_id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Server-side action in progress, e.g. `"deleting"`.
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub project_type: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub loc_on_disk: Option<String>,
    #[serde(default)]
    pub context_root: Option<String>,
    #[serde(default)]
    pub auto_build: Option<bool>,
    #[serde(default)]
    pub app_status: Option<String>,
    #[serde(default)]
    pub build_status: Option<String>,
    #[serde(default)]
    pub detailed_build_status: Option<String>,
    /// `"open"` or `"closed"`.
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub start_mode: Option<String>,
    #[serde(default)]
    pub ports: Option<ProjectPorts>,
}

macro_rules! merge_fields {
    ($self:ident, $other:ident, $($field:ident),+ $(,)?) => {
        $(
            if $other.$field.is_some() {
                $self.$field = $other.$field;
            }
        )+
    };
}

impl ProjectInfo {
    pub fn new(project_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Overwrite every field that `other` carries. The ID never changes.
    pub fn merge(&mut self, other: ProjectInfo) {
        merge_fields!(
            self,
            other,
            name,
            action,
            project_type,
            language,
            loc_on_disk,
            context_root,
            auto_build,
            app_status,
            build_status,
            detailed_build_status,
            state,
            start_mode,
            ports,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_record() {
        let json = r#"{
            "projectID": "81eba580",
            "name": "nodeapp",
            "projectType": "nodejs",
            "language": "nodejs",
            "locOnDisk": "/microclimate-workspace/nodeapp",
            "autoBuild": true,
            "appStatus": "started",
            "buildStatus": "success",
            "state": "open",
            "startMode": "run",
            "ports": { "exposedPort": "32768", "internalPort": "3000" },
            "somethingElse": 42
        }"#;
        let info: ProjectInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.project_id, "81eba580");
        assert_eq!(info.name.as_deref(), Some("nodeapp"));
        assert_eq!(info.auto_build, Some(true));
        assert_eq!(info.app_status.as_deref(), Some("started"));
        assert_eq!(
            info.ports.unwrap().exposed_port.as_deref(),
            Some("32768")
        );
    }

    #[test]
    fn test_parse_minimal_record() {
        let info: ProjectInfo =
            serde_json::from_str(r#"{"projectID":"2","action":"validating"}"#).unwrap();
        assert_eq!(info.project_id, "2");
        assert_eq!(info.action.as_deref(), Some("validating"));
        assert!(info.name.is_none());
    }

    #[test]
    fn test_merge_only_overwrites_present_fields() {
        let mut info = ProjectInfo::new("1", "A");
        info.app_status = Some("started".into());
        info.auto_build = Some(true);

        let mut partial = ProjectInfo {
            project_id: "1".into(),
            ..ProjectInfo::default()
        };
        partial.app_status = Some("stopped".into());
        info.merge(partial);

        assert_eq!(info.name.as_deref(), Some("A"));
        assert_eq!(info.app_status.as_deref(), Some("stopped"));
        assert_eq!(info.auto_build, Some(true));
    }
}
