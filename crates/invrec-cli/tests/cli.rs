//! End-to-end CLI tests.

use assert_cmd::Command;
use predicates::prelude::*;

fn invrec() -> Command {
    Command::cargo_bin("invrec").unwrap()
}

fn write_fixtures(dir: &std::path::Path) -> (std::path::PathBuf, std::path::PathBuf) {
    let invoices = dir.join("invoices.json");
    std::fs::write(
        &invoices,
        r#"[
            {
                "id": "7c9e6679-7425-40de-944b-e07fc1f90ae7",
                "document_id": "16fd2706-8baf-433b-82eb-8c7fada847da",
                "invoice_number": "A100",
                "vendor_name": "Acme Supply",
                "total_amount": "3000",
                "line_items": [
                    {
                        "description": "Steel beams",
                        "quantity": "1",
                        "unit_price": "3000",
                        "total": "3000"
                    }
                ],
                "confidence": 0.9,
                "needs_review": false,
                "page_group": { "index": 0, "pages": [1] },
                "status": "approved"
            }
        ]"#,
    )
    .unwrap();

    let estimate = dir.join("estimate.json");
    std::fs::write(
        &estimate,
        r#"{
            "project_id": "site-7",
            "categories": [
                { "name": "Structural Steel", "budgeted_amount": "5000" },
                { "name": "Labor", "budgeted_amount": "3000" }
            ]
        }"#,
    )
    .unwrap();

    (invoices, estimate)
}

#[test]
fn config_path_prints_location() {
    invrec()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.json"));
}

#[test]
fn process_fails_for_missing_input() {
    invrec()
        .args(["process", "/nonexistent/input.pdf"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn reconcile_prints_variance_table() {
    let dir = tempfile::tempdir().unwrap();
    let (invoices, estimate) = write_fixtures(dir.path());

    invrec()
        .args([
            "reconcile",
            "--invoices",
            invoices.to_str().unwrap(),
            "--estimate",
            estimate.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("site-7")
                .and(predicate::str::contains("Structural Steel"))
                .and(predicate::str::contains("Total")),
        );
}

#[test]
fn reconcile_writes_json_result() {
    let dir = tempfile::tempdir().unwrap();
    let (invoices, estimate) = write_fixtures(dir.path());
    let output = dir.path().join("result.json");

    invrec()
        .args([
            "reconcile",
            "--invoices",
            invoices.to_str().unwrap(),
            "--estimate",
            estimate.to_str().unwrap(),
            "--output",
            output.to_str().unwrap(),
        ])
        .assert()
        .success();

    let result: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(result["project_id"], "site-7");
    assert_eq!(result["items"][0]["category"], "Structural Steel");
}

#[test]
fn reconcile_rejects_malformed_estimate() {
    let dir = tempfile::tempdir().unwrap();
    let (invoices, _) = write_fixtures(dir.path());
    let bad = dir.path().join("bad.json");
    std::fs::write(&bad, "{ not json").unwrap();

    invrec()
        .args([
            "reconcile",
            "--invoices",
            invoices.to_str().unwrap(),
            "--estimate",
            bad.to_str().unwrap(),
        ])
        .assert()
        .failure();
}
