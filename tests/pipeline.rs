//! End-to-end pipeline test: scan, analyze, arbitrate, execute, rescan,
//! post-cleanup, over a real temp tree.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use curator_analyze::{cleanup, duplicates, orphans, permissions, reorganize, CleanupPhase};
use curator_core::{Config, OperationKind, Plan, PlanArbiter, RootConfig, ScanModel};
use curator_ops::{AssumeYes, PlanExecutor};
use curator_scan::Scanner;

fn build_plan(model: &ScanModel, config: &RootConfig) -> Plan {
    let mut arbiter = PlanArbiter::new();
    arbiter.claim_destructive(
        cleanup::analyze(model, config, CleanupPhase::Pre).into_operations(),
    );
    arbiter.claim_destructive(duplicates::analyze(model, config).operations);
    arbiter.claim_destructive(orphans::analyze(model, config));
    arbiter.add_cosmetic(reorganize::analyze(model, config));
    arbiter.add_cosmetic(permissions::analyze(model, config).unwrap());
    arbiter.into_plan()
}

#[test]
fn test_full_pipeline_on_a_messy_archive() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();

    // cruft: an empty subtree and a marked file
    fs::create_dir_all(root.join("old/deeper")).unwrap();
    fs::create_dir(root.join("gallery")).unwrap();
    fs::write(root.join("gallery/Thumbs.db"), "blob").unwrap();
    fs::write(root.join("gallery/shot-2019-07-04.jpg"), "payload one").unwrap();
    fs::write(root.join("gallery/other-2019-07-04.jpg"), "payload two!").unwrap();

    // duplicates of both gallery images
    fs::create_dir(root.join("backup")).unwrap();
    fs::write(root.join("backup/shot.jpg"), "payload one").unwrap();
    fs::write(root.join("backup/other.jpg"), "payload two!").unwrap();

    // an orphan
    fs::create_dir(root.join("leftover")).unwrap();
    fs::write(root.join("leftover/meta.xml"), "<m/>").unwrap();

    let config = RootConfig::builder()
        .scan_path(root)
        .recycle_bin_path(root.join("#recycle"))
        .build()
        .unwrap();

    let scanner = Scanner::new();
    let model = scanner.scan(&config).unwrap();
    let plan = build_plan(&model, &config);

    let canon = root.canonicalize().unwrap();

    // plan sanity before executing
    assert!(!plan.ops_for(OperationKind::PreCleanup).is_empty());
    assert_eq!(plan.ops_for(OperationKind::Duplicate).len(), 2);
    assert_eq!(plan.ops_for(OperationKind::Orphan).len(), 1);

    // holds under any umask: mode fixes on or under reclaimed subtrees
    // (old, old/deeper) are suppressed by arbitration, not attempted
    let summary = PlanExecutor::new(AssumeYes).execute(&plan);
    assert_eq!(summary.total_failed(), 0, "errors: {:?}", summary.errors);
    assert!(!summary.cancelled);

    // cruft went to the recycle area, mirroring its source path
    assert!(!canon.join("old").exists());
    assert!(canon.join("#recycle/old/deeper").is_dir());
    assert!(canon.join("#recycle/gallery/Thumbs.db").exists());
    assert!(canon.join("#recycle/leftover/meta.xml").exists());

    // post-cleanup on a fresh scan reclaims what execution emptied
    let fresh = scanner.scan(&config).unwrap();
    let post = cleanup::analyze(&fresh, &config, CleanupPhase::Post);
    let mut arbiter = PlanArbiter::new();
    arbiter.claim_destructive(post.into_operations());
    let post_plan = arbiter.into_plan();
    let post_summary = PlanExecutor::new(AssumeYes).execute(&post_plan);
    assert_eq!(post_summary.total_failed(), 0);

    let final_model = scanner.scan(&config).unwrap();

    // exactly one copy of each duplicated payload survived outside the
    // recycle area, wherever reorganize ended up putting it
    for payload in ["payload one", "payload two!"] {
        let survivors = final_model
            .files
            .iter()
            .filter(|f| {
                fs::read_to_string(&f.path)
                    .map(|c| c == payload)
                    .unwrap_or(false)
            })
            .count();
        assert_eq!(survivors, 1, "exactly one copy of '{payload}' must survive");
    }

    // after post-cleanup, no empty directories remain outside the recycle
    for dir in final_model.directories.iter() {
        if dir.path == final_model.root {
            continue;
        }
        assert!(
            dir.total_size > 0,
            "{} should have been reclaimed",
            dir.path.display()
        );
    }

    // a second pass has no cruft or duplicates left to find
    let again = build_plan(&final_model, &config);
    assert!(again.ops_for(OperationKind::PreCleanup).is_empty());
    assert!(again.ops_for(OperationKind::Duplicate).is_empty());
}

#[test]
fn test_config_file_load_and_validation() {
    let temp = TempDir::new().unwrap();
    let config_path = temp.path().join("curator.json");
    fs::write(
        &config_path,
        r#"{
            "roots": [{
                "scanPath": "/data/photos",
                "recycleBinPath": "/data/photos/#recycle",
                "actions": ["pre-cleanup", "duplicates", "orphans"]
            }]
        }"#,
    )
    .unwrap();

    let config = Config::load(&config_path).unwrap();
    assert_eq!(config.roots.len(), 1);
    assert_eq!(config.roots[0].scan_path, Path::new("/data/photos"));

    // a relative recycle path must fail validation
    fs::write(
        &config_path,
        r#"{ "roots": [{ "scanPath": "/data", "recycleBinPath": "recycle" }] }"#,
    )
    .unwrap();
    assert!(Config::load(&config_path).is_err());
}

#[test]
fn test_reorganize_moves_then_stays_put() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::create_dir(root.join("unsorted")).unwrap();
    fs::write(root.join("unsorted/trip-2021-08-15.jpg"), "bytes").unwrap();

    let config = RootConfig::builder()
        .scan_path(root)
        .recycle_bin_path(root.join("#recycle"))
        .build()
        .unwrap();

    let scanner = Scanner::new();
    let model = scanner.scan(&config).unwrap();

    let mut arbiter = PlanArbiter::new();
    arbiter.add_cosmetic(reorganize::analyze(&model, &config));
    let plan = arbiter.into_plan();
    let summary = PlanExecutor::new(AssumeYes).execute(&plan);
    assert_eq!(summary.total_failed(), 0);

    let canon = root.canonicalize().unwrap();
    assert!(canon.join("2021/08/trip-2021-08-15.jpg").exists());

    // second run: nothing left to reorganize
    let model = scanner.scan(&config).unwrap();
    assert!(reorganize::analyze(&model, &config).is_empty());
}
