//! Lockstep recursive merge of N source trees into one output tree.
//!
//! Each source tree is walked physically (symlinks never followed) in
//! pre-order, children sorted by name so the traversal is deterministic.
//! Every visited path is resolved to its peers in the other trees and
//! handed to the file-set merger; paths a previous tree's pass already
//! merged are skipped.

use std::fs;
use std::path::{Path, PathBuf};

use crate::merge::merge_files;
use crate::{GlueError, GlueResult};

/// Merge the trees rooted at `roots` into `out_root`, walking the roots
/// in argument order.
pub fn merge_trees(out_root: &Path, roots: &[PathBuf]) -> GlueResult<()> {
    for root in roots {
        let meta = fs::symlink_metadata(root)?;
        if !meta.file_type().is_dir() {
            return Err(GlueError::NotADirectory { path: root.clone() });
        }
    }

    for index in 0..roots.len() {
        walk(out_root, roots, index, Path::new(""))?;
    }
    Ok(())
}

/// Visit `rel` under `roots[root_index]`, then recurse into it if it is a
/// directory.
fn walk(out_root: &Path, roots: &[PathBuf], root_index: usize, rel: &Path) -> GlueResult<()> {
    merge_path(out_root, roots, root_index, rel)?;

    let abs = join_rel(&roots[root_index], rel);
    if !fs::symlink_metadata(&abs)?.file_type().is_dir() {
        return Ok(());
    }

    let mut entries = fs::read_dir(&abs)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|entry| entry.file_name());
    for entry in entries {
        let child_rel = rel.join(entry.file_name());
        walk(out_root, roots, root_index, &child_rel)?;
    }
    Ok(())
}

/// Build the peer list for `rel` across all roots and merge it into the
/// target path, unless an earlier root's pass already did.
fn merge_path(out_root: &Path, roots: &[PathBuf], root_index: usize, rel: &Path) -> GlueResult<()> {
    let target = join_rel(out_root, rel);

    let mut peers: Vec<PathBuf> = Vec::new();
    let mut first_type: Option<fs::FileType> = None;
    let mut earlier_peer = false;

    for (j, root) in roots.iter().enumerate() {
        let candidate = join_rel(root, rel);
        match fs::symlink_metadata(&candidate) {
            Ok(meta) => {
                let ftype = meta.file_type();
                match first_type {
                    None => first_type = Some(ftype),
                    Some(t) if t != ftype => {
                        return Err(GlueError::TypeMismatch { path: candidate })
                    }
                    Some(_) => {}
                }
                if j < root_index {
                    earlier_peer = true;
                }
                peers.push(candidate);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }

    // A pass over an earlier root already merged this path.
    if root_index > 0 && earlier_peer && fs::symlink_metadata(&target).is_ok() {
        return Ok(());
    }

    merge_files(&target, &peers)
}

fn join_rel(base: &Path, rel: &Path) -> PathBuf {
    if rel.as_os_str().is_empty() {
        base.to_path_buf()
    } else {
        base.join(rel)
    }
}
