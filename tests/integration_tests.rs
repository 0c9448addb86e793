//! Integration tests for the fundr CLI
//!
//! These tests exercise the CLI commands end-to-end using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;
use tempfile::TempDir;

const PASSWORD: &str = "correct-horse-42";
const SECTIONS: &[(&str, &str)] = &[
    ("pitch", "pitch.json"),
    ("team", "team.yaml"),
    ("traction", "traction.json"),
    ("funding", "funding.json"),
    ("founder", "founder.json"),
    ("documents", "documents.json"),
];

/// Helper to get a fundr command that ignores the caller's environment
fn fundr() -> Command {
    let mut cmd = Command::cargo_bin("fundr").unwrap();
    cmd.env_remove("FUNDR_PASSWORD")
        .env_remove("FUNDR_FORMAT")
        .env_remove("RUST_LOG");
    cmd
}

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Helper to create a test project in a temp directory
fn setup_test_project() -> TempDir {
    let tmp = TempDir::new().unwrap();
    fundr().current_dir(tmp.path()).arg("init").assert().success();
    tmp
}

fn register(tmp: &TempDir, email: &str, name: &str, role: &str) {
    fundr()
        .current_dir(tmp.path())
        .args(["auth", "register", email, name, "--role", role, "--password", PASSWORD])
        .assert()
        .success();
}

fn login(tmp: &TempDir, email: &str) {
    fundr()
        .current_dir(tmp.path())
        .args(["auth", "login", email, "--password", PASSWORD])
        .assert()
        .success();
}

fn whoami_id(tmp: &TempDir) -> String {
    let output = fundr()
        .current_dir(tmp.path())
        .args(["auth", "whoami", "-f", "id"])
        .output()
        .unwrap();
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn fill(tmp: &TempDir, section: &str, file: &str) -> assert_cmd::assert::Assert {
    fundr()
        .current_dir(tmp.path())
        .args(["wizard", "fill", section])
        .arg(fixture(file))
        .assert()
}

/// Founder with a submitted profile plus one registered investor.
/// Returns (project, investor id); the founder is signed in afterwards.
fn setup_marketplace() -> (TempDir, String) {
    let tmp = setup_test_project();
    register(&tmp, "vc@capital.example", "Vera Capital", "investor");
    let investor = whoami_id(&tmp);

    register(&tmp, "jane@acmerobotics.com", "Jane Doe", "founder");
    for (section, file) in SECTIONS {
        fill(&tmp, section, file).success();
    }
    (tmp, investor)
}

// ============================================================================
// CLI Basic Tests
// ============================================================================

#[test]
fn test_help_displays() {
    fundr()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("wizard"))
        .stdout(predicate::str::contains("request"));
}

#[test]
fn test_version_displays() {
    fundr()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("fundr"));
}

#[test]
fn test_completions_bash() {
    fundr()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("fundr"));
}

// ============================================================================
// Init Tests
// ============================================================================

#[test]
fn test_init_creates_structure() {
    let tmp = TempDir::new().unwrap();
    fundr()
        .current_dir(tmp.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized fundr project"));

    assert!(tmp.path().join(".fundr/config.yaml").is_file());
    assert!(tmp.path().join(".fundr/drafts").is_dir());
}

#[test]
fn test_init_twice_warns() {
    let tmp = setup_test_project();
    fundr()
        .current_dir(tmp.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("--force"));
}

#[test]
fn test_commands_outside_project_fail() {
    let tmp = TempDir::new().unwrap();
    fundr()
        .current_dir(tmp.path())
        .args(["wizard", "status"])
        .assert()
        .failure();
}

// ============================================================================
// Schema & Validate Tests
// ============================================================================

#[test]
fn test_schema_list_shows_sections_in_order() {
    let tmp = TempDir::new().unwrap();
    let output = fundr()
        .current_dir(tmp.path())
        .args(["schema", "list", "-f", "tsv"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let pitch = stdout.find("pitch").unwrap();
    let documents = stdout.find("documents").unwrap();
    assert!(pitch < documents);
}

#[test]
fn test_schema_show_lists_fields() {
    fundr()
        .args(["schema", "show", "funding"])
        .assert()
        .success()
        .stdout(predicate::str::contains("amountRequired"))
        .stdout(predicate::str::contains("if toggle"));
}

#[test]
fn test_schema_show_unknown_section() {
    fundr().args(["schema", "show", "finances"]).assert().failure();
}

#[test]
fn test_validate_accepts_valid_section() {
    fundr()
        .args(["validate", "founder"])
        .arg(fixture("founder.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid"));
}

#[test]
fn test_validate_reports_allocation_total() {
    fundr()
        .args(["validate", "funding"])
        .arg(fixture("funding_bad_allocation.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("funding"));
}

#[test]
fn test_validate_json_output() {
    fundr()
        .args(["validate", "funding", "-f", "json"])
        .arg(fixture("funding_bad_allocation.json"))
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"valid\": false"));
}

// ============================================================================
// Auth Tests
// ============================================================================

#[test]
fn test_register_and_whoami() {
    let tmp = setup_test_project();
    register(&tmp, "jane@acmerobotics.com", "Jane Doe", "founder");
    fundr()
        .current_dir(tmp.path())
        .args(["auth", "whoami"])
        .assert()
        .success()
        .stdout(predicate::str::contains("jane@acmerobotics.com"))
        .stdout(predicate::str::contains("founder"));
}

#[test]
fn test_register_duplicate_email_fails() {
    let tmp = setup_test_project();
    register(&tmp, "jane@acmerobotics.com", "Jane Doe", "founder");
    fundr()
        .current_dir(tmp.path())
        .args([
            "auth",
            "register",
            "JANE@acmerobotics.com",
            "Jane Again",
            "--role",
            "investor",
            "--password",
            PASSWORD,
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_login_wrong_password_fails() {
    let tmp = setup_test_project();
    register(&tmp, "jane@acmerobotics.com", "Jane Doe", "founder");
    fundr()
        .current_dir(tmp.path())
        .args(["auth", "login", "jane@acmerobotics.com", "--password", "wrong-password"])
        .assert()
        .failure();
}

#[test]
fn test_logout_then_whoami_fails() {
    let tmp = setup_test_project();
    register(&tmp, "jane@acmerobotics.com", "Jane Doe", "founder");
    fundr()
        .current_dir(tmp.path())
        .args(["auth", "logout"])
        .assert()
        .success();
    fundr()
        .current_dir(tmp.path())
        .args(["auth", "whoami"])
        .assert()
        .failure();
}

// ============================================================================
// Wizard Tests
// ============================================================================

#[test]
fn test_wizard_requires_founder() {
    let tmp = setup_test_project();
    register(&tmp, "vc@capital.example", "Vera Capital", "investor");
    fundr()
        .current_dir(tmp.path())
        .args(["wizard", "status"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("founder"));
}

#[test]
fn test_wizard_fill_advances() {
    let tmp = setup_test_project();
    register(&tmp, "jane@acmerobotics.com", "Jane Doe", "founder");
    fill(&tmp, "pitch", "pitch.json")
        .success()
        .stdout(predicate::str::contains("Saved Pitch Information (1/6)"))
        .stdout(predicate::str::contains("Team & Talent"));

    fundr()
        .current_dir(tmp.path())
        .args(["wizard", "status", "-f", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"current_section_index\": 1"));
}

#[test]
fn test_wizard_fill_invalid_section_is_refused() {
    let tmp = setup_test_project();
    register(&tmp, "jane@acmerobotics.com", "Jane Doe", "founder");
    fill(&tmp, "pitch", "pitch.json").success();
    fill(&tmp, "team", "team.yaml").success();
    fill(&tmp, "traction", "traction.json").success();
    fill(&tmp, "funding", "funding_bad_allocation.json").failure();

    // the refused section stays current and uncommitted
    fundr()
        .current_dir(tmp.path())
        .args(["wizard", "status", "-f", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"current_section_index\": 3"));
}

#[test]
fn test_wizard_cannot_skip_ahead() {
    let tmp = setup_test_project();
    register(&tmp, "jane@acmerobotics.com", "Jane Doe", "founder");
    fill(&tmp, "funding", "funding.json").failure();
}

#[test]
fn test_wizard_draft_survives_between_runs() {
    let tmp = setup_test_project();
    register(&tmp, "jane@acmerobotics.com", "Jane Doe", "founder");
    fill(&tmp, "pitch", "pitch.json").success();
    fill(&tmp, "team", "team.yaml").success();

    fundr()
        .current_dir(tmp.path())
        .args(["wizard", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 of 6 sections complete"));
}

#[test]
fn test_wizard_preview_renders_markdown() {
    let tmp = setup_test_project();
    register(&tmp, "jane@acmerobotics.com", "Jane Doe", "founder");
    fill(&tmp, "pitch", "pitch.json").success();
    fundr()
        .current_dir(tmp.path())
        .args(["wizard", "preview"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Acme Robotics"));
}

#[test]
fn test_wizard_submit_incomplete_draft() {
    let tmp = setup_test_project();
    register(&tmp, "jane@acmerobotics.com", "Jane Doe", "founder");
    fill(&tmp, "pitch", "pitch.json").success();
    fundr()
        .current_dir(tmp.path())
        .args(["wizard", "submit"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("team"));
}

#[test]
fn test_wizard_reset_discards_draft() {
    let tmp = setup_test_project();
    register(&tmp, "jane@acmerobotics.com", "Jane Doe", "founder");
    fill(&tmp, "pitch", "pitch.json").success();
    fundr()
        .current_dir(tmp.path())
        .args(["wizard", "reset", "--yes"])
        .assert()
        .success();
    fundr()
        .current_dir(tmp.path())
        .args(["wizard", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 of 6 sections complete"));
}

#[test]
fn test_wizard_full_flow_submits_profile() {
    let tmp = setup_test_project();
    register(&tmp, "jane@acmerobotics.com", "Jane Doe", "founder");
    for (section, file) in &SECTIONS[..SECTIONS.len() - 1] {
        fill(&tmp, section, file).success();
    }
    fill(&tmp, "documents", "documents.json")
        .success()
        .stdout(predicate::str::contains("Profile submitted: STU-"))
        .stdout(predicate::str::contains("Acme Robotics"));
}

// ============================================================================
// Marketplace Tests
// ============================================================================

#[test]
fn test_investor_sees_submitted_startup() {
    let (tmp, _) = setup_marketplace();
    login(&tmp, "vc@capital.example");
    fundr()
        .current_dir(tmp.path())
        .args(["startup", "list", "-f", "csv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Acme Robotics"))
        .stdout(predicate::str::contains("$2,000,000"));
}

#[test]
fn test_founder_cannot_list_startups() {
    let (tmp, _) = setup_marketplace();
    fundr()
        .current_dir(tmp.path())
        .args(["startup", "list"])
        .assert()
        .failure();
}

#[test]
fn test_founder_lists_investors() {
    let (tmp, investor) = setup_marketplace();
    fundr()
        .current_dir(tmp.path())
        .args(["investor", "list", "-f", "id"])
        .assert()
        .success()
        .stdout(predicate::str::contains(investor));
}

#[test]
fn test_request_lifecycle() {
    let (tmp, investor) = setup_marketplace();

    let output = fundr()
        .current_dir(tmp.path())
        .args(["request", "new", &investor, "-f", "id"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let request = String::from_utf8_lossy(&output.stdout).trim().to_string();
    assert!(request.starts_with("FRQ-"));

    login(&tmp, "vc@capital.example");
    fundr()
        .current_dir(tmp.path())
        .args(["request", "list", "--status", "pending", "-f", "id"])
        .assert()
        .success()
        .stdout(predicate::str::contains(request.as_str()));

    fundr()
        .current_dir(tmp.path())
        .args(["request", "status", &request, "in_meeting"])
        .args(["--notes", "Strong team", "--meeting", "2026-03-01T15:30:00Z"])
        .assert()
        .success()
        .stdout(predicate::str::contains("in_meeting"));

    fundr()
        .current_dir(tmp.path())
        .args(["request", "show", &request, "-f", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Strong team"))
        .stdout(predicate::str::contains("Acme Robotics"));

    fundr()
        .current_dir(tmp.path())
        .args(["request", "status", &request, "funded"])
        .assert()
        .success();

    fundr()
        .current_dir(tmp.path())
        .args(["request", "status", &request, "pending"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cannot change status"));

    fundr()
        .current_dir(tmp.path())
        .args(["request", "stats", "-f", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"funded\": 1"))
        .stdout(predicate::str::contains("\"pending\": 0"));
}

#[test]
fn test_request_to_non_investor_fails() {
    let (tmp, _) = setup_marketplace();
    let founder = whoami_id(&tmp);
    fundr()
        .current_dir(tmp.path())
        .args(["request", "new", &founder])
        .assert()
        .failure();
}

#[test]
fn test_request_new_rejects_wrong_id_prefix() {
    let (tmp, _) = setup_marketplace();
    fundr()
        .current_dir(tmp.path())
        .args(["request", "new", "STU-01HZZZZZZZZZZZZZZZZZZZZZZZ"])
        .assert()
        .failure();
}
