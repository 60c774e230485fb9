//! Date-based reorganization.
//!
//! Each dated file gets a target directory derived from the configured
//! template; files already where they belong produce nothing, so a second
//! run over a reorganized tree yields an empty plan. Date extraction
//! dominates the cost (EXIF reads), so it runs in a bounded pool.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use chrono::Datelike;
use rayon::prelude::*;
use tracing::{debug, warn};

use curator_core::{FileEntry, Operation, RootConfig, ScanModel};

use crate::dates::{DateExtractor, ExtractedDate};

/// Compute reorganize moves for one scan.
pub fn analyze(model: &ScanModel, config: &RootConfig) -> Vec<Operation> {
    let extractor = DateExtractor::new(config.date_threshold);
    let base = config.reorganize_base().to_path_buf();

    let candidates: Vec<&FileEntry> = model
        .files
        .iter()
        .filter(|f| !f.ignored && !f.marked_for_delete)
        .collect();

    let dated = extract_dates(&candidates, &extractor, config.effective_concurrency());

    let mut ops = Vec::new();
    let mut claimed_targets: HashSet<PathBuf> = HashSet::new();

    for (file, found) in candidates.iter().zip(dated) {
        let Some(found) = found else {
            continue;
        };
        let target_dir = normalize(&base.join(render_template(
            &config.reorganize_template,
            found.date,
        )));
        if target_dir == normalize(&file.dir) {
            continue;
        }

        let mut target = target_dir.join(file.name.as_str());
        if claimed_targets.contains(&target) {
            // Disambiguate with the source folder's leaf name, unless the
            // name already carries it.
            match disambiguated_name(file) {
                Some(name) => target = target_dir.join(name),
                None => {}
            }
            if claimed_targets.contains(&target) {
                warn!(path = %file.path.display(), target = %target.display(),
                    "reorganize target already taken, skipping");
                continue;
            }
        }

        debug!(
            path = %file.path.display(),
            target = %target.display(),
            source = %found.source,
            "reorganize"
        );
        claimed_targets.insert(target.clone());
        ops.push(Operation::Reorganize {
            path: file.path.clone(),
            move_to: target,
        });
    }

    ops
}

/// Bounded-parallel date extraction, order-preserving.
fn extract_dates(
    files: &[&FileEntry],
    extractor: &DateExtractor,
    concurrency: usize,
) -> Vec<Option<ExtractedDate>> {
    let run = || {
        files
            .par_iter()
            .map(|file| extractor.extract(file))
            .collect::<Vec<_>>()
    };
    match rayon::ThreadPoolBuilder::new()
        .num_threads(concurrency)
        .build()
    {
        Ok(pool) => pool.install(run),
        Err(err) => {
            warn!(error = %err, "falling back to sequential date extraction");
            files.iter().map(|file| extractor.extract(file)).collect()
        }
    }
}

/// Substitute `{year}`, `{month}` and `{day}` (zero-padded) and return the
/// result as a relative path fragment.
fn render_template(template: &str, date: chrono::NaiveDate) -> PathBuf {
    let rendered = template
        .replace("{year}", &format!("{:04}", date.year()))
        .replace("{month}", &format!("{:02}", date.month()))
        .replace("{day}", &format!("{:02}", date.day()));
    PathBuf::from(rendered.trim_matches('/'))
}

/// Lexical cleanup: drop `.` and resolve `..` without touching the
/// filesystem, so equal directories compare equal.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for part in path.components() {
        match part {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// `name_stem_<leaf>.ext`, or `None` when the leaf is already embedded.
fn disambiguated_name(file: &FileEntry) -> Option<String> {
    let leaf = file.dir.file_name()?.to_string_lossy().to_string();
    if file
        .name
        .to_lowercase()
        .contains(&leaf.to_lowercase())
    {
        return None;
    }
    let mut name = format!("{}_{}", file.stem, leaf);
    if !file.ext.is_empty() {
        name.push('.');
        name.push_str(&file.ext);
    }
    Some(name)
}
