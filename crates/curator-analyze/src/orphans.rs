//! Orphan detection.
//!
//! An orphan is a file left alone in its folder, typically a sidecar whose
//! master was deleted by hand. The rule is structural: the parent directory
//! holds exactly that one file, whatever its extension. The legacy
//! `orphan_file_extensions` knob is kept in the config for a future
//! extension-filter mode but does not narrow the current rule.

use curator_core::{rebase, Operation, RootConfig, ScanModel};
use tracing::debug;

/// Collect lone-file orphans.
pub fn analyze(model: &ScanModel, config: &RootConfig) -> Vec<Operation> {
    let mut ops = Vec::new();

    for file in model.files.iter() {
        if file.ignored || file.marked_for_delete {
            continue;
        }
        // A lone file directly in the scan root is the archive's business,
        // not an orphan.
        if file.dir == model.root {
            continue;
        }
        let Some(parent) = model.directories.get(&file.dir) else {
            continue;
        };
        if parent.file_count != 1 {
            continue;
        }
        debug!(path = %file.path.display(), "orphan");
        ops.push(Operation::Orphan {
            path: file.path.clone(),
            move_to: rebase(&config.recycle_bin_path, &file.path),
        });
    }

    ops
}

#[cfg(test)]
mod tests {
    use super::*;
    use curator_core::{DirEntry, FileEntry, StatSnapshot};
    use std::path::{Path, PathBuf};

    fn stat(size: u64) -> StatSnapshot {
        StatSnapshot {
            size,
            mode: 0o100644,
            uid: 0,
            gid: 0,
            nlink: 1,
            mtime_ms: 0,
            ctime_ms: 0,
            birthtime_ms: None,
        }
    }

    fn model() -> ScanModel {
        let mut model = ScanModel::new(PathBuf::from("/r"));
        for (path, depth, file_count) in [
            ("/r", 0u32, 1u64),
            ("/r/only", 1, 1),
            ("/r/pair", 1, 2),
        ] {
            let mut dir = DirEntry::new(PathBuf::from(path), depth, stat(0));
            dir.file_count = file_count;
            model.directories.insert(PathBuf::from(path), dir);
        }
        for (path, depth) in [
            ("/r/root-level.xml", 1u32),
            ("/r/only/solo.xml", 2),
            ("/r/pair/one.jpg", 2),
            ("/r/pair/two.jpg", 2),
        ] {
            let entry = FileEntry::new(PathBuf::from(path), depth, stat(4));
            model.files.insert(PathBuf::from(path), entry);
        }
        model
    }

    fn config() -> RootConfig {
        RootConfig::builder()
            .scan_path("/r")
            .recycle_bin_path("/r/#recycle")
            .build()
            .unwrap()
    }

    #[test]
    fn lone_file_is_an_orphan() {
        let ops = analyze(&model(), &config());
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].path(), Path::new("/r/only/solo.xml"));
        assert_eq!(
            ops[0].move_to(),
            Some(Path::new("/r/#recycle/only/solo.xml"))
        );
    }

    #[test]
    fn files_with_siblings_are_not_orphans() {
        let ops = analyze(&model(), &config());
        assert!(ops.iter().all(|op| !op.path().starts_with("/r/pair")));
    }

    #[test]
    fn root_level_files_are_left_alone() {
        let ops = analyze(&model(), &config());
        assert!(ops.iter().all(|op| op.path() != Path::new("/r/root-level.xml")));
    }

    #[test]
    fn ignored_lone_file_is_not_an_orphan() {
        let mut m = model();
        m.files
            .get_mut(Path::new("/r/only/solo.xml"))
            .unwrap()
            .ignored = true;
        let ops = analyze(&m, &config());
        assert!(ops.is_empty());
    }
}
