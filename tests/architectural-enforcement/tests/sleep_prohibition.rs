//! Integration Test: Sleep Prohibition
//!
//! **Policy**: Production code waits on I/O, channels or timers tied to an
//! event. It MUST NOT sleep to wait for something to happen.
//! **Exceptions**: exponential retry backoff, test code

use architectural_enforcement::{production_sources, sleep_violations, PRODUCTION_DIRS};

#[test]
fn test_no_sleep_in_production_code() {
    let violations: Vec<String> = PRODUCTION_DIRS
        .iter()
        .flat_map(|dir| production_sources(dir))
        .flat_map(|file| sleep_violations(&file))
        .collect();

    if !violations.is_empty() {
        eprintln!("\nSleep calls found in production code:\n");
        for violation in &violations {
            eprintln!("  {violation}");
        }
        eprintln!("\nAcceptable sleep uses:");
        eprintln!("  - Exponential backoff between failed retries");
        eprintln!("  - Test code (after #[cfg(test)])");
        eprintln!("\nForbidden:");
        eprintln!("  - Fixed-delay polling loops");
        eprintln!("  - Sleep as synchronization (await the event instead)");

        panic!(
            "\nFound {} sleep violation(s) in production code.",
            violations.len()
        );
    }
}

#[test]
fn test_production_sources_are_found() {
    for dir in PRODUCTION_DIRS {
        assert!(
            !production_sources(dir).is_empty(),
            "no Rust sources found under {dir}"
        );
    }
}
