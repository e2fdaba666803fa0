use std::fmt;

/// Parts of the pipeline tracked by the orchestrator, in startup order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Component {
    Display,
    Alerts,
    Presentation,
    Cameras,
    Keyboard,
}

impl Component {
    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Display => "display",
            Component::Alerts => "alerts",
            Component::Presentation => "presentation",
            Component::Cameras => "cameras",
            Component::Keyboard => "keyboard",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Component lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Failed,
}

/// System shutdown reason
#[derive(Debug, Clone, PartialEq)]
pub enum ShutdownReason {
    Signal(String),
    Error(String),
    UserRequest(String),
}

impl ShutdownReason {
    /// Exit status the process should report for this reason
    pub fn exit_code(&self) -> i32 {
        match self {
            ShutdownReason::Error(_) => 1,
            _ => 0,
        }
    }
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::Signal(signal) => write!(f, "signal {}", signal),
            ShutdownReason::Error(error) => write!(f, "error: {}", error),
            ShutdownReason::UserRequest(reason) => write!(f, "user request ({})", reason),
        }
    }
}
