//! The rename planner.
//!
//! Pure with respect to the filesystem, except for the temporary-path
//! oracle, which has to check real filenames for existence. Ported from
//! `itchyny/mmv`'s `buildRenames` (the cycle-colouring walk is structurally
//! the same loop, translated from Go maps into `HashMap`s), generalised
//! with a subsumption pass for directory moves that the Go source does
//! not have, and with a typed error in place of Go's sentinel error
//! structs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rand::Rng;

use crate::error::PlanError;
use crate::path::{ancestor_at_depth, depth, is_strict_ancestor, normalize};

/// A single primitive rename to apply, in order.
pub type Step = (PathBuf, PathBuf);

/// Validates `edges` and produces an ordered list of primitive renames
/// realising them. See spec §4.1 for the three passes this runs.
pub fn plan<I>(edges: I) -> Result<Vec<Step>, PlanError>
where
    I: IntoIterator<Item = (PathBuf, PathBuf)>,
{
    let (mut files, mut revs) = normalize_and_validate(edges)?;
    let staged = subsume_directory_moves(&mut files, &mut revs)?;
    let mut steps = staged;
    steps.extend(emit_with_cycle_breaking(files, revs)?);
    Ok(steps)
}

/// Pass 1: per-edge validation and normalisation (spec §4.1.1).
fn normalize_and_validate<I>(
    edges: I,
) -> Result<(HashMap<PathBuf, PathBuf>, HashMap<PathBuf, PathBuf>), PlanError>
where
    I: IntoIterator<Item = (PathBuf, PathBuf)>,
{
    let mut files = HashMap::new();
    let mut revs = HashMap::new();

    for (src, dst) in edges {
        if src.as_os_str().is_empty() || dst.as_os_str().is_empty() {
            return Err(PlanError::EmptyPath);
        }
        let src = normalize(&src);
        let dst = normalize(&dst);

        if files.contains_key(&src) {
            return Err(PlanError::DuplicateSource(src));
        }
        if revs.contains_key(&dst) {
            return Err(PlanError::DuplicateDestination(dst));
        }
        if is_strict_ancestor(&src, &dst) || is_strict_ancestor(&dst, &src) {
            return Err(PlanError::InvalidRename { src, dst });
        }

        revs.insert(dst.clone(), src.clone());
        files.insert(src, dst);
    }

    // `src == dst` edges are left in place here: an identity edge nested
    // under a moving ancestor still needs staging through a temporary in
    // pass 2 (spec §4.1.2), so dropping it this early would silently let
    // it be carried along with the parent instead. Pass 2 drops any
    // identity edge that turns out not to be under a moving ancestor.
    Ok((files, revs))
}

/// Pass 2: elide child edges a moving ancestor already subsumes, or stage
/// the ones it doesn't through a temporary path (spec §4.1.2). Returns the
/// staging steps, which must run before the topological pass since they
/// rewrite `files`/`revs` in place.
fn subsume_directory_moves(
    files: &mut HashMap<PathBuf, PathBuf>,
    revs: &mut HashMap<PathBuf, PathBuf>,
) -> Result<Vec<Step>, PlanError> {
    let mut sources: Vec<PathBuf> = files.keys().cloned().collect();
    // deepest first
    sources.sort_by_key(|p| std::cmp::Reverse(depth(p)));

    let mut staged = Vec::new();

    for s in sources {
        let i = depth(&s);
        let mut acted = false;

        // nearest ancestor first
        for j in (0..i).rev() {
            let p = ancestor_at_depth(&s, j);
            let Some(d_p) = files.get(&p).cloned() else {
                continue;
            };
            if d_p == p {
                // p isn't moving (this is itself an identity edge left
                // over from pass 1); not a candidate ancestor.
                continue;
            }

            acted = true;
            let t = files.get(&s).cloned().expect("s is a key we just iterated");
            let tail_matches = s
                .strip_prefix(&p)
                .ok()
                .map(|tail| d_p.join(tail))
                .as_deref()
                == Some(t.as_path());

            if i == j + 1 && tail_matches {
                // the child is carried along automatically, drop it
                files.remove(&s);
                revs.remove(&t);
            } else {
                let tmp_dir = parent_dir(&p);
                let tmp = temp_path(tmp_dir)?;
                tracing::debug!(child = %s.display(), temp = %tmp.display(), "staging child of a directory move through a temporary path");
                staged.push((s.clone(), tmp.clone()));
                files.remove(&s);
                revs.remove(&t);
                files.insert(tmp.clone(), t.clone());
                revs.insert(t, tmp);
            }
            break;
        }

        if !acted {
            if files.get(&s) == Some(&s) {
                files.remove(&s);
                revs.remove(&s);
            }
        }
    }

    Ok(staged)
}

/// Pass 3: topological emission with cycle breaking (spec §4.1.3). This is
/// the direct translation of `buildRenames`'s component-colouring walk.
fn emit_with_cycle_breaking(
    files: HashMap<PathBuf, PathBuf>,
    revs: HashMap<PathBuf, PathBuf>,
) -> Result<Vec<Step>, PlanError> {
    let mut dsts: Vec<PathBuf> = files.values().cloned().collect();
    dsts.sort_by_key(|p| depth(p));

    let mut vs: HashMap<PathBuf, i64> = HashMap::new();
    let mut component_id: i64 = 0;
    let mut steps = Vec::new();

    for dst0 in dsts {
        if *vs.get(&dst0).unwrap_or(&0) > 0 {
            continue;
        }
        component_id += 1;
        let i = component_id;

        let mut dst = dst0;
        let mut cycle = false;
        loop {
            vs.insert(dst.clone(), i);
            match files.get(&dst) {
                Some(next) => {
                    dst = next.clone();
                    if *vs.get(&dst).unwrap_or(&0) > 0 {
                        cycle = vs[&dst] == i;
                        break;
                    }
                }
                None => break,
            }
        }

        let mut tmp = None;
        if cycle {
            let dir = parent_dir(&dst);
            let t = temp_path(dir)?;
            tracing::debug!(at = %dst.display(), temp = %t.display(), "breaking cycle via temporary path");
            steps.push((dst.clone(), t.clone()));
            *vs.get_mut(&dst).unwrap() -= 1;
            tmp = Some(t);
        }

        loop {
            let Some(src) = revs.get(&dst).cloned() else {
                break;
            };
            if cycle && vs.get(&src).copied().unwrap_or(0) != i {
                break;
            }
            steps.push((src.clone(), dst.clone()));
            if !cycle {
                vs.insert(dst.clone(), i);
            }
            dst = src;
        }

        if cycle {
            steps.push((tmp.expect("cycle always allocates a temp path"), dst));
        }
    }

    Ok(steps)
}

/// The directory containing `path`, matching Go's `filepath.Dir`: `"x"`
/// yields `"."`, not an empty path.
fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Samples a path inside `dir` that does not currently exist, retrying up
/// to 256 times. Collision probability with a 64-bit random suffix over
/// 256 draws is astronomically small; this does not need to be
/// cryptographically random.
pub fn temp_path(dir: &Path) -> Result<PathBuf, PlanError> {
    let mut rng = rand::thread_rng();
    for _ in 0..256 {
        let candidate = dir.join(format!(".bumv.{:016x}.tmp", rng.gen::<u64>()));
        if !candidate.exists() {
            return Ok(candidate);
        }
    }
    Err(PlanError::TemporaryPathError(dir.to_path_buf()))
}
