use std::process::Command;

fn simdrive(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_simdrive"))
        .args(args)
        .env("RUST_LOG", "off")
        .output()
        .expect("failed to launch simdrive")
}

#[test]
fn test_dates_expands_across_leap_day() {
    let output = simdrive(&["dates", "--start", "2024-02-28", "--end", "2024-03-01"]);

    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "28-02-2024\n29-02-2024\n01-03-2024\n"
    );
}

#[test]
fn test_dates_rejects_reversed_range() {
    let output = simdrive(&["dates", "--start", "2024-03-02", "--end", "2024-03-01"]);

    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn test_run_requires_credentials() {
    let output = Command::new(env!("CARGO_BIN_EXE_simdrive"))
        .args(["run", "--start", "2024-01-01", "--end", "2024-01-02"])
        .env_remove("SIMDRIVE_PHONE")
        .env_remove("SIMDRIVE_PASSWORD")
        .output()
        .expect("failed to launch simdrive");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("--phone"));
}
