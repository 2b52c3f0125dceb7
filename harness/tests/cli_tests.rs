use std::process::{Command, Output};

fn harness(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_harness"))
        .args(args)
        .output()
        .unwrap()
}

#[test]
fn test_tasks_for_mock_domain() {
    let output = harness(&["tasks", "--domain", "mock"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("mock-0"));
    assert!(stdout.contains("mock-2"));
}

#[test]
fn test_tools_for_mock_domain() {
    let output = harness(&["tools", "--domain", "mock"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("calculate"));
    assert!(stdout.contains("echo"));
}

#[test]
fn test_tasks_for_unavailable_domain_fail() {
    let output = harness(&["tasks", "--domain", "airline"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Rejected"));
}

#[test]
fn test_tools_for_unavailable_domain_fail() {
    let output = harness(&["tools", "--domain", "telecom"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Rejected"));
}
