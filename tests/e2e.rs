use std::process::Command;

fn run(fixture: &str, report: Option<&str>) -> (String, String, bool) {
    let path = format!("tests/fixtures/{fixture}");
    let mut command = Command::new(env!("CARGO_BIN_EXE_credit-exchange"));
    command.arg(&path).env("RUST_LOG", "warn");
    if let Some(report) = report {
        command.arg(report);
    }
    let output = command.output().expect("failed to run binary");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn valid_commands() {
    let (stdout, stderr, success) = run("valid.csv", None);

    assert!(success);
    assert!(stderr.is_empty());

    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(
        lines,
        vec![
            "user,name,role,credits",
            "faculty1,Dr. Evelyn Reed,Faculty,0",
            "student1,Alice Johnson,Student,30",
            "student2,Ben Carter,Student,30",
            "student3,Chloe Kim,Student,40",
        ]
    );
}

#[test]
fn errors_warn_but_do_not_block() {
    let (stdout, stderr, success) = run("with_errors.csv", None);

    assert!(success);
    assert!(stderr.contains("unrecognized operation"));
    assert!(stderr.contains("missing target"));

    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines[0], "user,name,role,credits");
    // denial without comments and re-approval of p-101 are rejected; one redemption fits
    assert_eq!(lines[2], "student1,Alice Johnson,Student,25");
    assert_eq!(lines[3], "student2,Ben Carter,Student,0");
}

#[test]
fn project_export() {
    let (stdout, _, success) = run("valid.csv", Some("projects"));

    assert!(success);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(
        lines[0],
        "Project ID,Submission Date,Student Name,Project Title,Status,Credits Awarded,Description,GitHub Link"
    );
    assert_eq!(lines.len(), 7);
    assert!(lines.iter().any(|l| l.starts_with("proj1,")
        && l.contains(",Ben Carter,Compiler,Approved,15,\"A toy compiler, with tests\",")));
    assert!(lines.iter().any(|l| l.starts_with("p-103,")
        && l.contains(",Approved,5,")));
}

#[test]
fn unknown_report_fails() {
    let (stdout, stderr, success) = run("valid.csv", Some("ledger"));

    assert!(!success);
    assert!(stdout.is_empty());
    assert!(stderr.contains("usage"));
}
