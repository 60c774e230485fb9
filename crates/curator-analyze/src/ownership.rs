//! Ownership checking against the local account databases.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use curator_core::{ConfigError, Operation, RootConfig, ScanModel};

/// Name/id lookups over passwd- and group-format files.
///
/// The default instance reads `/etc/passwd` and `/etc/group`; tests point
/// it at fixture files. Both formats share the `name:x:id:...` line shape.
#[derive(Debug, Clone)]
pub struct AccountDb {
    passwd_path: PathBuf,
    group_path: PathBuf,
}

impl Default for AccountDb {
    fn default() -> Self {
        Self {
            passwd_path: PathBuf::from("/etc/passwd"),
            group_path: PathBuf::from("/etc/group"),
        }
    }
}

impl AccountDb {
    pub fn with_paths(passwd_path: impl Into<PathBuf>, group_path: impl Into<PathBuf>) -> Self {
        Self {
            passwd_path: passwd_path.into(),
            group_path: group_path.into(),
        }
    }

    /// uid for a user name.
    pub fn uid_of(&self, name: &str) -> Option<u32> {
        lookup_id(&self.passwd_path, name)
    }

    /// gid for a group name.
    pub fn gid_of(&self, name: &str) -> Option<u32> {
        lookup_id(&self.group_path, name)
    }

    /// Reverse map uid -> user name, one pass over the database.
    pub fn user_names(&self) -> HashMap<u32, String> {
        build_name_map(&self.passwd_path)
    }

    /// Reverse map gid -> group name.
    pub fn group_names(&self) -> HashMap<u32, String> {
        build_name_map(&self.group_path)
    }
}

fn lookup_id(db: &Path, name: &str) -> Option<u32> {
    let content = std::fs::read_to_string(db).ok()?;
    for line in content.lines() {
        let parts: Vec<&str> = line.split(':').collect();
        if parts.len() >= 3 && parts[0] == name {
            return parts[2].parse().ok();
        }
    }
    None
}

fn build_name_map(db: &Path) -> HashMap<u32, String> {
    let mut map = HashMap::new();
    let Ok(content) = std::fs::read_to_string(db) else {
        return map;
    };
    for line in content.lines() {
        let parts: Vec<&str> = line.split(':').collect();
        if parts.len() >= 3 {
            if let Ok(id) = parts[2].parse::<u32>() {
                map.entry(id).or_insert_with(|| parts[0].to_string());
            }
        }
    }
    map
}

/// Flag every entry not owned by the configured user/group.
///
/// Unresolvable names are a configuration error: silently skipping would
/// let a typo pass as "everything already owned correctly".
pub fn analyze(
    model: &ScanModel,
    config: &RootConfig,
    db: &AccountDb,
) -> Result<Vec<Operation>, ConfigError> {
    let user = config.owner_user.as_deref().ok_or(ConfigError::MissingOwner)?;
    let group = config.owner_group.as_deref().ok_or(ConfigError::MissingOwner)?;

    let uid = db.uid_of(user).ok_or_else(|| ConfigError::UnknownUser {
        name: user.to_string(),
    })?;
    let gid = db.gid_of(group).ok_or_else(|| ConfigError::UnknownGroup {
        name: group.to_string(),
    })?;

    let mut ops = Vec::new();

    for dir in model.directories.iter() {
        if dir.stat.uid != uid || dir.stat.gid != gid {
            ops.push(ownership_op(&dir.path, dir.stat.uid, dir.stat.gid, uid, gid, user, group));
        }
    }
    for file in model.files.iter() {
        if file.ignored {
            continue;
        }
        if file.stat.uid != uid || file.stat.gid != gid {
            debug!(path = %file.path.display(), uid = file.stat.uid, gid = file.stat.gid,
                "wrong owner");
            ops.push(ownership_op(
                &file.path, file.stat.uid, file.stat.gid, uid, gid, user, group,
            ));
        }
    }

    Ok(ops)
}

fn ownership_op(
    path: &Path,
    current_uid: u32,
    current_gid: u32,
    new_uid: u32,
    new_gid: u32,
    user: &str,
    group: &str,
) -> Operation {
    Operation::Ownership {
        path: path.to_path_buf(),
        current_uid,
        current_gid,
        new_uid,
        new_gid,
        user: user.to_string(),
        group: group.to_string(),
    }
}
