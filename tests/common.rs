#![allow(dead_code)]
use assert_cmd::{cargo_bin_cmd, Command};
use std::env;
use std::fs;
use std::path::PathBuf;

pub const NOW: &str = "2025-06-01T12:00:00";

pub fn evaluator() -> Command {
    let mut cmd = cargo_bin_cmd!("performance-evaluator");
    cmd.env_remove("EVALUATOR_POLICY").env_remove("EVALUATOR_NOW");
    cmd
}

/// Temp path for a test artifact, removed if a previous run left it behind
pub fn temp_path(name: &str, ext: &str) -> String {
    let mut path: PathBuf = env::temp_dir();
    path.push(format!("{}_performance.{}", name, ext));
    let p = path.to_string_lossy().to_string();
    fs::remove_file(&p).ok();
    p
}

/// Write the sample snapshot via the CLI and return its path
pub fn seeded_snapshot(name: &str) -> String {
    let path = temp_path(name, "json");
    evaluator().args(["seed", "--out", &path]).assert().success();
    path
}
