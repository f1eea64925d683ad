use panemerge_text::TextError;
use thiserror::Error;

/// Precondition violations reported by the engine entry points.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("expected 1 to 3 panes, got {actual}")]
    PaneCount { actual: usize },
    #[error("operation needs {expected} panes, got {actual}")]
    PaneMismatch { expected: usize, actual: usize },
    #[error("pane {pane} is out of range for {panes} pane(s)")]
    PaneOutOfRange { pane: usize, panes: usize },
    #[error("sequences have not been set")]
    NotInitialised,
    #[error("pane {pane} changed while a diff was running")]
    StaleTask { pane: usize },
    #[error("sync point {index} is not strictly after the previous point in pane {pane}")]
    SyncPointOrder { index: usize, pane: usize },
    #[error("panes {from} and {to} are not a comparable pair")]
    InvalidPanePair { from: usize, to: usize },
    #[error(transparent)]
    Filter(#[from] TextError),
    #[error("failed to start inline match workers")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}
