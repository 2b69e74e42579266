/// Result alias that carries the custom [`LedGraphError`] type.
pub type Result<T> = std::result::Result<T, LedGraphError>;

/// Common error type for the core crate.
///
/// Graph variants reject a shape build, pattern variants reject a pattern
/// swap or a single tick. In both cases the installation keeps whatever was
/// active before and the error is surfaced to the host for display.
#[derive(Debug, thiserror::Error)]
pub enum LedGraphError {
    /// An edge refers to a node id that is not part of the shape.
    #[error("edge `{edge}` references unknown node `{node}`")]
    UnknownNode { edge: String, node: String },
    #[error("node id `{0}` is defined more than once")]
    DuplicateNode(String),
    #[error("edge id `{0}` is defined more than once")]
    DuplicateEdge(String),
    /// Raised only by the opt-in LED range validation.
    #[error("invalid LED index assignment: {0}")]
    LedRange(String),
    /// Pattern logic could not be produced from its source.
    #[error("pattern `{name}` failed to compile: {reason}")]
    PatternCompile { name: String, reason: String },
    /// Pattern logic failed while rendering a frame.
    #[error("pattern `{pattern}` failed on frame {frame}: {reason}")]
    PatternRuntime {
        pattern: String,
        frame: u64,
        reason: String,
    },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Free-form message for host-level failures.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl LedGraphError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// True for errors that reject a shape build.
    pub fn is_graph_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownNode { .. }
                | Self::DuplicateNode(_)
                | Self::DuplicateEdge(_)
                | Self::LedRange(_)
        )
    }

    /// True for errors raised while compiling or running pattern logic.
    pub fn is_pattern_error(&self) -> bool {
        matches!(
            self,
            Self::PatternCompile { .. } | Self::PatternRuntime { .. }
        )
    }
}

impl From<&str> for LedGraphError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for LedGraphError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
