use std::fmt;

use crate::view::Icon;

/// The Microclimate project template a project was created from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectKind {
    MicroProfile,
    Spring,
    Node,
    Swift,
    Docker,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectType {
    pub kind: ProjectKind,
    pub language: String,
}

impl ProjectType {
    pub fn new(project_type: Option<&str>, language: Option<&str>) -> Self {
        let kind = match project_type.unwrap_or_default() {
            "liberty" => ProjectKind::MicroProfile,
            "spring" => ProjectKind::Spring,
            "nodejs" => ProjectKind::Node,
            "swift" => ProjectKind::Swift,
            "docker" => ProjectKind::Docker,
            _ => ProjectKind::Unknown,
        };
        Self {
            kind,
            language: language.unwrap_or_default().to_lowercase(),
        }
    }

    /// Icon for this project type. Docker projects are keyed by language.
    pub fn icon(&self) -> Icon {
        match self.kind {
            ProjectKind::MicroProfile | ProjectKind::Spring => Icon::Java,
            ProjectKind::Node => Icon::Node,
            ProjectKind::Swift => Icon::Swift,
            ProjectKind::Docker => match self.language.as_str() {
                "python" => Icon::Python,
                "go" => Icon::Go,
                "java" => Icon::Java,
                _ => Icon::Docker,
            },
            ProjectKind::Unknown => Icon::Microclimate,
        }
    }
}

impl fmt::Display for ProjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.kind {
            ProjectKind::MicroProfile => "Microprofile",
            ProjectKind::Spring => "Spring",
            ProjectKind::Node => "Node.js",
            ProjectKind::Swift => "Swift",
            ProjectKind::Docker => "Docker",
            ProjectKind::Unknown => "Unknown",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_types() {
        assert_eq!(
            ProjectType::new(Some("liberty"), Some("java")).kind,
            ProjectKind::MicroProfile
        );
        assert_eq!(
            ProjectType::new(Some("nodejs"), None).to_string(),
            "Node.js"
        );
    }

    #[test]
    fn test_docker_icon_follows_language() {
        assert_eq!(
            ProjectType::new(Some("docker"), Some("Python")).icon(),
            Icon::Python
        );
        assert_eq!(ProjectType::new(Some("docker"), Some("go")).icon(), Icon::Go);
        assert_eq!(ProjectType::new(Some("docker"), None).icon(), Icon::Docker);
    }

    #[test]
    fn test_unknown_type() {
        let t = ProjectType::new(Some("cobol"), None);
        assert_eq!(t.kind, ProjectKind::Unknown);
        assert_eq!(t.icon(), Icon::Microclimate);
    }
}
