//! Inspection and forced resolution of conflicted in-memory merges.
use git2::{Index, IndexEntry, Oid, Repository};
use std::path::Path;

use crate::Result;

/// Stage bits of `IndexEntry::flags`.
const STAGE_MASK: u16 = 0x3000;

/// Sorted, de-duplicated paths of every conflicted entry in `index`.
pub fn conflicted_paths(index: &Index) -> Result<Vec<String>> {
    let mut paths = vec![];

    for conflict in index.conflicts()? {
        let conflict = conflict?;
        if let Some(entry) = conflict
            .our
            .as_ref()
            .or(conflict.their.as_ref())
            .or(conflict.ancestor.as_ref())
        {
            paths.push(String::from_utf8_lossy(&entry.path).into_owned());
        }
    }

    paths.sort();
    paths.dedup();

    Ok(paths)
}

/// Collapse every conflict in `index` into a stage-zero entry.
///
/// Entries changed on both sides get the file-level merge result,
/// conflict markers included. Any other shape keeps our side: an entry
/// the target branch does not have stays absent.
pub fn resolve_with_markers(repo: &Repository, index: &mut Index) -> Result<()> {
    let conflicts = index
        .conflicts()?
        .collect::<std::result::Result<Vec<_>, git2::Error>>()?;

    for conflict in conflicts {
        let resolved = match (&conflict.ancestor, &conflict.our, &conflict.their) {
            (Some(ancestor), Some(ours), Some(theirs)) => {
                let merged =
                    repo.merge_file_from_index(ancestor, ours, theirs, None)?;
                let blob = repo.blob(merged.content())?;
                let mut entry =
                    stage_zero(ours, blob, merged.content().len() as u32);
                entry.mode = merged.mode();
                Some(entry)
            }
            (_, Some(ours), _) => Some(stage_zero(ours, ours.id, ours.file_size)),
            (_, None, _) => None,
        };

        let Some(path) = conflict
            .our
            .as_ref()
            .or(conflict.their.as_ref())
            .or(conflict.ancestor.as_ref())
            .map(|e| String::from_utf8_lossy(&e.path).into_owned())
        else {
            continue;
        };

        index.conflict_remove(Path::new(&path))?;

        if let Some(entry) = resolved {
            index.add(&entry)?;
        }
    }

    Ok(())
}

fn stage_zero(entry: &IndexEntry, id: Oid, file_size: u32) -> IndexEntry {
    IndexEntry {
        ctime: entry.ctime,
        mtime: entry.mtime,
        dev: entry.dev,
        ino: entry.ino,
        mode: entry.mode,
        uid: entry.uid,
        gid: entry.gid,
        file_size,
        id,
        flags: entry.flags & !STAGE_MASK,
        flags_extended: entry.flags_extended,
        path: entry.path.clone(),
    }
}
