//! POSIX mode checking.

use curator_core::{ConfigError, Operation, RootConfig, ScanModel};
use tracing::debug;

/// Flag every entry whose mode differs from the configured one.
///
/// Fails only when the configured permission strings do not parse, which
/// config validation normally catches earlier.
pub fn analyze(model: &ScanModel, config: &RootConfig) -> Result<Vec<Operation>, ConfigError> {
    let file_mode = config.file_mode()?;
    let dir_mode = config.dir_mode()?;

    let mut ops = Vec::new();

    for dir in model.directories.iter() {
        let current = dir.stat.perm_bits();
        if current != dir_mode {
            ops.push(Operation::Permissions {
                path: dir.path.clone(),
                current_mode: current,
                desired_mode: dir_mode,
            });
        }
    }

    for file in model.files.iter() {
        if file.ignored {
            continue;
        }
        let current = file.stat.perm_bits();
        if current != file_mode {
            debug!(path = %file.path.display(), current_mode = current,
                desired_mode = file_mode, "wrong mode");
            ops.push(Operation::Permissions {
                path: file.path.clone(),
                current_mode: current,
                desired_mode: file_mode,
            });
        }
    }

    Ok(ops)
}
