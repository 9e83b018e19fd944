//! Plugin libraries built from `tests/fixtures`.

use std::path::PathBuf;
use std::process::Command;
use std::sync::OnceLock;

pub struct FixtureArtifacts {
    /// 40-byte state, schema 1, exported through the SDK. Finishes after 10 frames.
    pub v1: PathBuf,
    /// 64-byte state, schema 2, exported through the SDK. Appends fields to v1.
    pub v2: PathBuf,
    /// Hand-written exports without `panim_finished`.
    pub broken: PathBuf,
}

static FIXTURES: OnceLock<FixtureArtifacts> = OnceLock::new();

pub fn fixture_artifacts() -> &'static FixtureArtifacts {
    FIXTURES.get_or_init(|| FixtureArtifacts {
        v1: build_fixture_library("tests/fixtures/plugin_v1/Cargo.toml", "panim_fixture_v1"),
        v2: build_fixture_library("tests/fixtures/plugin_v2/Cargo.toml", "panim_fixture_v2"),
        broken: build_fixture_library(
            "tests/fixtures/plugin_broken/Cargo.toml",
            "panim_fixture_broken",
        ),
    })
}

fn build_fixture_library(manifest_rel: &str, crate_name: &str) -> PathBuf {
    let crate_root = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let manifest_path = crate_root.join(manifest_rel);
    let target_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("fixtures");

    let status = Command::new(cargo_bin())
        .arg("build")
        .arg("--quiet")
        .arg("--manifest-path")
        .arg(&manifest_path)
        .arg("--target-dir")
        .arg(&target_dir)
        .status()
        .expect("spawn cargo build for fixture plugin");
    assert!(
        status.success(),
        "fixture build failed: {}",
        manifest_path.display()
    );

    let artifact = target_dir.join("debug").join(dylib_filename(crate_name));
    assert!(
        artifact.is_file(),
        "cannot locate fixture library {}",
        artifact.display()
    );
    artifact
}

fn cargo_bin() -> String {
    std::env::var("CARGO").unwrap_or_else(|_| "cargo".to_string())
}

pub fn dylib_filename(crate_name: &str) -> String {
    let base = crate_name.replace('-', "_");
    match std::env::consts::OS {
        "windows" => format!("{base}.dll"),
        "linux" => format!("lib{base}.so"),
        "macos" => format!("lib{base}.dylib"),
        other => panic!("unsupported test platform: {other}"),
    }
}
