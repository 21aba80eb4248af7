//! Error type for the probe's own I/O and serialization surface (report
//! directory creation, JSON rendering). Kept distinct from `void-core`'s
//! `VoidError`/`ConfigError`, mirroring the teacher's convention of giving
//! each crate its own `thiserror` error type rather than sharing one across
//! crate boundaries.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("creating reports directory {path:?}: {source}")]
    CreateReportsDir {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("rendering telemetry report as JSON: {0}")]
    RenderJson(#[from] serde_json::Error),
}
