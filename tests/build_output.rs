//! End-to-end builds over real directories: template rendering, copy-only,
//! exec actions, imports.

use std::fs;
use std::path::Path;

use metaforge::cli::PassArgs;
use metaforge::entity::{Walk, process_project};
use metaforge::errors::MetaforgeError;
use metaforge::run_build;
use metaforge::store::Store;
use tempfile::TempDir;

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn pass_args(root: &TempDir) -> PassArgs {
    PassArgs {
        metafile: root.path().join("meta.json").to_string_lossy().into_owned(),
        source: root.path().join("work").to_string_lossy().into_owned(),
        destination: root.path().join("out").to_string_lossy().into_owned(),
        force: false,
    }
}

#[tokio::test]
async fn renders_templates_with_vars_and_snippet_chain() {
    let root = TempDir::new().unwrap();
    write(
        &root.path().join("meta.json"),
        r#"{
            "name": "site",
            "vars": {"author": "x"},
            "mappings": [{"start": "file:base.txt.tmpl", "end": "file:page.txt.tmpl"}],
            "files": {
                "base.txt.tmpl": {"no-output": true},
                "page.txt.tmpl": {}
            }
        }"#,
    );
    write(
        &root.path().join("work/base.txt.tmpl"),
        "{{define greeting}}\nhello\n{{end}}\n",
    );
    write(
        &root.path().join("work/page.txt.tmpl"),
        "{{greeting}} by {{author}}\n",
    );

    run_build(pass_args(&root)).await.unwrap();

    let page = fs::read_to_string(root.path().join("out/page.txt")).unwrap();
    assert_eq!(page, "hello by x\n");
    // no-output files are tracked but never written.
    assert!(!root.path().join("out/base.txt").exists());
}

#[tokio::test]
async fn copy_only_files_are_copied_verbatim() {
    let root = TempDir::new().unwrap();
    write(
        &root.path().join("meta.json"),
        r#"{
            "name": "site",
            "vars": {"author": "x"},
            "files": {"raw.txt": {"copy-only": true}}
        }"#,
    );
    write(&root.path().join("work/raw.txt"), "{{author}} stays\n");

    run_build(pass_args(&root)).await.unwrap();

    let raw = fs::read_to_string(root.path().join("out/raw.txt")).unwrap();
    assert_eq!(raw, "{{author}} stays\n");
}

#[tokio::test]
async fn file_vars_override_inherited_ones() {
    let root = TempDir::new().unwrap();
    write(
        &root.path().join("meta.json"),
        r#"{
            "name": "site",
            "vars": {"who": "project"},
            "directories": {
                "docs": {
                    "vars": {"who": "docs"},
                    "files": {
                        "a.txt.tmpl": {},
                        "b.txt.tmpl": {"vars": {"who": "file"}}
                    }
                }
            }
        }"#,
    );
    write(&root.path().join("work/docs/a.txt.tmpl"), "{{who}}");
    write(&root.path().join("work/docs/b.txt.tmpl"), "{{who}}");

    run_build(pass_args(&root)).await.unwrap();

    assert_eq!(
        fs::read_to_string(root.path().join("out/docs/a.txt")).unwrap(),
        "docs"
    );
    assert_eq!(
        fs::read_to_string(root.path().join("out/docs/b.txt")).unwrap(),
        "file"
    );
}

#[tokio::test]
async fn exec_runs_and_failures_do_not_abort_the_build() {
    let root = TempDir::new().unwrap();
    write(
        &root.path().join("meta.json"),
        r#"{
            "name": "site",
            "files": {"ok.txt": {"copy-only": true}},
            "execs": {
                "marker": {"cmd": ["sh", "-c", "echo ran > marker.txt"]},
                "boom": {"cmd": ["sh", "-c", "exit 3"]}
            }
        }"#,
    );
    write(&root.path().join("work/ok.txt"), "ok\n");

    run_build(pass_args(&root)).await.unwrap();

    // The failing exec was reported, not fatal: siblings still ran.
    let marker = fs::read_to_string(root.path().join("work/marker.txt")).unwrap();
    assert_eq!(marker, "ran\n");
    assert!(root.path().join("out/ok.txt").exists());
}

#[tokio::test]
async fn imported_meta_contributes_children() {
    let root = TempDir::new().unwrap();
    write(
        &root.path().join("meta.json"),
        r#"{
            "name": "site",
            "directories": {"lib": {"import": true}}
        }"#,
    );
    write(
        &root.path().join("work/lib/meta.json"),
        r#"{"files": {"extra.txt": {"copy-only": true}}}"#,
    );
    write(&root.path().join("work/lib/extra.txt"), "imported\n");

    run_build(pass_args(&root)).await.unwrap();

    assert_eq!(
        fs::read_to_string(root.path().join("out/lib/extra.txt")).unwrap(),
        "imported\n"
    );
}

#[test]
fn import_loops_are_reported_precisely() {
    let root = TempDir::new().unwrap();
    // The imported meta file maps a nested directory back onto "lib" itself.
    write(
        &root.path().join("work/lib/meta.json"),
        r#"{"directories": {"again": {"src-ovr": "/lib", "import": true}}}"#,
    );

    write(
        &root.path().join("meta.json"),
        r#"{
            "name": "site",
            "directories": {"lib": {"import": true}}
        }"#,
    );
    let cfg = metaforge::config::load_and_validate(&root.path().join("meta.json")).unwrap();

    let store = Store::start();
    let mut walk = Walk::new(1, root.path().join("work"));
    let err = process_project(&cfg, &store, &mut walk).unwrap_err();
    match err {
        MetaforgeError::TraversalCycle(id) => assert_eq!(id, "dir:lib"),
        other => panic!("expected traversal cycle, got {other:?}"),
    }
}
