#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
//! Project policy tests for the Shadow Signal client.
//!
//! These tests verify that Cargo.toml lints and library sources conform to
//! the panic-free policy. All checks are synchronous filesystem reads.

use std::path::{Path, PathBuf};

/// Returns the project root directory (where Cargo.toml lives).
fn project_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

/// Reads a file relative to the project root and returns its contents.
fn read_project_file(relative_path: &str) -> String {
    let path = project_root().join(relative_path);
    std::fs::read_to_string(&path).unwrap_or_else(|e| {
        panic!(
            "Failed to read '{}': {}. This file is required by project policy.",
            path.display(),
            e
        )
    })
}

/// Library sources with their `#[cfg(test)]` tail removed.
fn library_sources() -> Vec<(PathBuf, String)> {
    fn walk(dir: &Path, out: &mut Vec<(PathBuf, String)>) {
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(&path, out);
            } else if path.extension().is_some_and(|e| e == "rs") {
                let text = std::fs::read_to_string(&path).unwrap();
                let body = match text.find("#[cfg(test)]") {
                    Some(at) => text[..at].to_string(),
                    None => text,
                };
                out.push((path, body));
            }
        }
    }
    let mut out = Vec::new();
    walk(&project_root().join("src"), &mut out);
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Module: panic_policy
// ─────────────────────────────────────────────────────────────────────────────

mod panic_policy {
    use super::*;

    const REQUIRED_DENY_LINTS: &[&str] = &[
        "unwrap_used",
        "expect_used",
        "panic",
        "todo",
        "unimplemented",
        "indexing_slicing",
    ];

    #[test]
    fn cargo_toml_has_all_panic_free_lints() {
        let cargo = read_project_file("Cargo.toml");
        assert!(
            cargo.contains("[lints.clippy]"),
            "Cargo.toml is missing [lints.clippy] section."
        );
        for lint in REQUIRED_DENY_LINTS {
            let pattern = format!("{lint} = \"deny\"");
            assert!(
                cargo.contains(&pattern),
                "Cargo.toml is missing `{pattern}` in [lints.clippy]. \
                 All panic-prone lints must be set to deny level."
            );
        }
    }

    #[test]
    fn library_code_does_not_unwrap() {
        for (path, body) in library_sources() {
            for needle in [".unwrap()", ".expect(", "panic!(", "todo!("] {
                assert!(
                    !body.contains(needle),
                    "{} uses `{needle}` outside of tests",
                    path.display()
                );
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Module: configuration_policy
// ─────────────────────────────────────────────────────────────────────────────

mod configuration_policy {
    use super::*;

    #[test]
    fn environment_is_read_only_by_config() {
        for (path, body) in library_sources() {
            if path.ends_with("config.rs") {
                assert!(body.contains("std::env::var"));
                continue;
            }
            assert!(
                !body.contains("std::env::var"),
                "{} reads the process environment; use ClientConfig instead",
                path.display()
            );
        }
    }

    #[test]
    fn msrv_is_declared() {
        let cargo = read_project_file("Cargo.toml");
        assert!(cargo.contains("rust-version = \"1.85.0\""));
        let readme = read_project_file("README.md");
        assert!(
            readme.contains("1.85"),
            "README.md must state the minimum supported Rust version"
        );
    }
}
