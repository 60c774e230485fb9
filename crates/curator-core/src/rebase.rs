//! Path rebasing for recycle destinations.

use std::path::{Path, PathBuf};

/// Graft the tail of `target` onto `base`.
///
/// The two paths are compared component-by-component; at the first
/// divergence the remaining components of `target` are appended to `base`.
/// This is how a source path is mirrored under the recycle directory:
/// `rebase("/vol/photos/#recycle", "/vol/photos/a/b/c.jpg")` yields
/// `/vol/photos/#recycle/a/b/c.jpg`. When `target` already lies under
/// `base` the result is `target` itself.
pub fn rebase(base: &Path, target: &Path) -> PathBuf {
    let base_parts: Vec<_> = base.components().collect();
    let target_parts: Vec<_> = target.components().collect();

    let mut shared = 0;
    while shared < base_parts.len()
        && shared < target_parts.len()
        && base_parts[shared] == target_parts[shared]
    {
        shared += 1;
    }

    let mut out = base.to_path_buf();
    for part in &target_parts[shared..] {
        out.push(part);
    }
    out
}
