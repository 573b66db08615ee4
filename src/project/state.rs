use std::fmt;

use super::info::ProjectInfo;

/// Application run state as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Started,
    Starting,
    Stopping,
    Stopped,
    Debugging,
    DebugStarting,
    Disabled,
    Unknown,
}

impl AppState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "Running",
            Self::Starting => "Starting",
            Self::Stopping => "Stopping",
            Self::Stopped => "Stopped",
            Self::Debugging => "Debugging",
            Self::DebugStarting => "Starting - Debug",
            Self::Disabled => "Disabled",
            Self::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    Success,
    Building,
    Failed,
    Queued,
    Unknown,
}

impl BuildState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "Build Succeeded",
            Self::Building => "Building",
            Self::Failed => "Build Failed",
            Self::Queued => "Build Queued",
            Self::Unknown => "Unknown",
        }
    }
}

/// Combined app and build state of a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectState {
    pub app_state: AppState,
    pub build_state: BuildState,
    pub build_detail: Option<String>,
}

impl ProjectState {
    pub fn unknown() -> Self {
        Self {
            app_state: AppState::Unknown,
            build_state: BuildState::Unknown,
            build_detail: None,
        }
    }

    pub fn from_info(info: &ProjectInfo) -> Self {
        Self {
            app_state: app_state_of(info),
            build_state: build_state_of(info),
            build_detail: info
                .detailed_build_status
                .as_ref()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.app_state != AppState::Disabled
    }

    pub fn is_started(&self) -> bool {
        matches!(self.app_state, AppState::Started | AppState::Debugging)
    }

    pub fn is_debuggable(&self) -> bool {
        self.app_state == AppState::Debugging
    }

    pub fn is_building(&self) -> bool {
        matches!(self.build_state, BuildState::Building | BuildState::Queued)
    }
}

impl fmt::Display for ProjectState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_enabled() || self.build_state == BuildState::Unknown {
            return write!(f, "{}", self.app_state.as_str());
        }
        write!(f, "{} - {}", self.app_state.as_str(), self.build_state.as_str())?;
        if let Some(detail) = &self.build_detail
            && self.is_building()
        {
            write!(f, " ({})", detail)?;
        }
        Ok(())
    }
}

fn is_debug_mode(info: &ProjectInfo) -> bool {
    matches!(
        info.start_mode.as_deref(),
        Some("debug") | Some("debugNoInit")
    )
}

fn app_state_of(info: &ProjectInfo) -> AppState {
    if info.state.as_deref() == Some("closed") {
        return AppState::Disabled;
    }
    let debug = is_debug_mode(info);
    match info.app_status.as_deref().map(str::to_lowercase).as_deref() {
        Some("started") if debug => AppState::Debugging,
        Some("started") => AppState::Started,
        Some("starting") if debug => AppState::DebugStarting,
        Some("starting") => AppState::Starting,
        Some("stopping") => AppState::Stopping,
        Some("stopped") => AppState::Stopped,
        _ => AppState::Unknown,
    }
}

fn build_state_of(info: &ProjectInfo) -> BuildState {
    match info.build_status.as_deref() {
        Some("success") => BuildState::Success,
        Some("inProgress") => BuildState::Building,
        Some("failed") => BuildState::Failed,
        Some("queued") => BuildState::Queued,
        _ => BuildState::Unknown,
    }
}
