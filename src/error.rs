//! Typed errors raised by the planner and executor.
//!
//! The rest of the crate (CLI glue, editor invocation, prompts) stays on
//! `anyhow`, exactly as the CLI front-end it is modeled on does; `PlanError`
//! converts into `anyhow::Error` at that boundary via the blanket `From`
//! impl `thiserror` derives from `#[source]`/`#[error]`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlanError {
    #[error("empty path in rename mapping")]
    EmptyPath,

    #[error("duplicate source after normalisation: {0:?}")]
    DuplicateSource(PathBuf),

    #[error("duplicate destination after normalisation: {0:?}")]
    DuplicateDestination(PathBuf),

    #[error("cannot rename {src:?} to {dst:?}: source and destination are in an ancestor/descendant relationship")]
    InvalidRename { src: PathBuf, dst: PathBuf },

    #[error("could not find an unused temporary path in {0:?}")]
    TemporaryPathError(PathBuf),

    #[error("{path:?}: {err}")]
    Io {
        path: PathBuf,
        #[source]
        err: std::io::Error,
    },
}
