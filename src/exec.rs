//! The rename executor.
//!
//! Applies a plan in strict order, creating missing destination parent
//! directories on demand and undoing already-completed steps on failure.
//! Ported from `itchyny/mmv`'s `Rename`/`doRename`.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::error::PlanError;
use crate::plan::Step;

/// Applies `steps` in order. In dry-run mode nothing touches the
/// filesystem; each step is printed as `src => dst` instead.
pub fn apply(steps: &[Step], dry_run: bool) -> Result<(), PlanError> {
    if dry_run {
        for (src, dst) in steps {
            println!("{} => {}", src.display(), dst.display());
        }
        return Ok(());
    }

    for (i, (src, dst)) in steps.iter().enumerate() {
        if let Err(err) = rename_with_parents(src, dst) {
            undo(&steps[..i]);
            return Err(err);
        }
    }
    Ok(())
}

/// Renames `src` to `dst`, creating `dst`'s parent directory on demand if
/// that is why the first attempt failed.
fn rename_with_parents(src: &Path, dst: &Path) -> Result<(), PlanError> {
    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            // Distinguish "the destination's parent is missing" from "the
            // source itself is missing" by checking the source directly;
            // stat-ing it does not require read access to its parent.
            if let Err(stat_err) = fs::symlink_metadata(src) {
                return Err(PlanError::Io {
                    path: src.to_path_buf(),
                    err: stat_err,
                });
            }
            if let Some(parent) = dst.parent() {
                create_dir_all_0755(parent).map_err(|err| PlanError::Io {
                    path: parent.to_path_buf(),
                    err,
                })?;
            }
            fs::rename(src, dst).map_err(|err| PlanError::Io {
                path: dst.to_path_buf(),
                err,
            })
        }
        Err(err) => Err(PlanError::Io {
            path: dst.to_path_buf(),
            err,
        }),
    }
}

/// Recursively creates `dir` with mode `0o755`, matching the Go original's
/// `os.MkdirAll(filepath.Dir(dst), 0755)` (spec §4.2). `fs::create_dir_all`
/// alone requests the platform default (0o777 pre-umask), which a
/// permissive umask would leave wide open; setting the mode explicitly
/// keeps the contract regardless of the caller's umask.
#[cfg(unix)]
fn create_dir_all_0755(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new().recursive(true).mode(0o755).create(dir)
}

#[cfg(not(unix))]
fn create_dir_all_0755(dir: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dir)
}

/// Best-effort reversal of the already-completed steps, in reverse order.
/// Stops at the first undo failure rather than risk overwriting a file;
/// directories created along the way during the forward pass are left in
/// place.
fn undo(completed: &[Step]) {
    for (src, dst) in completed.iter().rev() {
        if let Err(err) = fs::rename(dst, src) {
            tracing::warn!(
                src = %src.display(),
                dst = %dst.display(),
                %err,
                "undo step failed, stopping rollback to avoid overwriting files"
            );
            break;
        }
    }
}
