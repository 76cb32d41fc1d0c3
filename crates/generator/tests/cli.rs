//! End-to-end runs of the `xbench-generate` binary.

use std::path::Path;
use std::process::{Command, Output};
use xbench_types::{Payload, Transaction};

fn generate(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_xbench-generate"))
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to run xbench-generate")
}

fn read_shard(dir: &Path, name: &str) -> Vec<Transaction> {
    std::fs::read_to_string(dir.join(name))
        .unwrap_or_else(|e| panic!("missing shard {}: {}", name, e))
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn shard_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn test_contract_fans_out_across_processes() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().to_str().unwrap();

    let result = generate(&[
        "contract",
        "--total",
        "40",
        "--concurrency",
        "2",
        "--process",
        "2",
        "--length",
        "16",
        "--output",
        output,
    ]);
    assert!(
        result.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&result.stderr)
    );

    assert_eq!(
        shard_names(dir.path()),
        vec![
            "short_content.dat.0000",
            "short_content.dat.0001",
            "short_content.dat.0002",
            "short_content.dat.0003",
        ]
    );

    // Each child gets 20; 20 / 2 = 10 per worker, 10 * 1.1 = 11
    for name in shard_names(dir.path()) {
        let txs = read_shard(dir.path(), &name);
        assert_eq!(txs.len(), 11);
        assert!(txs.iter().all(Transaction::verify));
    }
}

#[test]
fn test_tx_single_process() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().to_str().unwrap();

    let result = generate(&[
        "tx",
        "--total",
        "30",
        "--concurrency",
        "3",
        "--amount",
        "1000",
        "--output",
        output,
    ]);
    assert!(result.status.success());

    assert_eq!(shard_names(dir.path()).len(), 3);
    let txs = read_shard(dir.path(), "transaction.dat.0002");
    assert_eq!(txs.len(), 11);
    assert!(txs
        .iter()
        .all(|tx| matches!(tx.payload, Payload::Transfer { amount: 10, .. })));
}

#[test]
fn test_out_of_range_length_uses_default() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().to_str().unwrap();

    let result = generate(&[
        "contract", "--total", "10", "--concurrency", "1", "--length", "0", "--output", output,
    ]);
    assert!(result.status.success());

    let txs = read_shard(dir.path(), "short_content.dat.0000");
    assert_eq!(txs.len(), 11);
    match &txs[0].payload {
        Payload::InvokeContract { args, .. } => assert_eq!(args["content"].len(), 64),
        other => panic!("unexpected payload {:?}", other),
    }
}

#[test]
fn test_unparsable_length_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().to_str().unwrap();

    let result = generate(&["contract", "--length", "abc", "--output", output]);
    assert!(!result.status.success());
    assert!(shard_names(dir.path()).is_empty());
}

#[test]
fn test_failing_child_fails_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().to_str().unwrap();

    // Deployment needs bytecode that does not exist, so setup fails before any child starts
    let result = generate(&[
        "contract",
        "--total",
        "10",
        "--concurrency",
        "1",
        "--process",
        "2",
        "--deploy",
        "true",
        "--code-path",
        "/nonexistent/short_content.wasm",
        "--output",
        output,
    ]);
    assert!(!result.status.success());
}
