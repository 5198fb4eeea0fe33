//! End-to-end tests for the inspection pipeline.
//!
//! The runner is driven with substitute collaborators: an in-memory tabular
//! source, a recording announcer, real files under a temp content root, and
//! a wiremock server standing in for the vulnerability API.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use std::fs;
use std::path::Path;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use wp_inspect::table::row;
use wp_inspect::{
    Announcer, Context, Invocation, Result, Row, Runner, Status, TabularResult, TabularSource,
    Value, VulnerabilityClient, export_csv, render_table,
};

// =============================================================================
// Helpers
// =============================================================================

#[derive(Debug, Default)]
struct Recorder {
    events: Vec<(&'static str, String)>,
}

impl Recorder {
    fn of(&self, kind: &str) -> Vec<&str> {
        self.events
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, m)| m.as_str())
            .collect()
    }
}

impl Announcer for Recorder {
    fn success(&mut self, message: &str) {
        self.events.push(("success", message.to_string()));
    }
    fn empty(&mut self, message: &str) {
        self.events.push(("empty", message.to_string()));
    }
    fn warning(&mut self, message: &str) {
        self.events.push(("warning", message.to_string()));
    }
    fn error(&mut self, message: &str) {
        self.events.push(("error", message.to_string()));
    }
    fn print(&mut self, text: &str) {
        self.events.push(("print", text.to_string()));
    }
}

/// Answers by the first matching SQL fragment
struct Canned(Vec<(&'static str, Vec<Row>)>);

impl TabularSource for Canned {
    fn query(&self, sql: &str) -> Result<Vec<Row>> {
        Ok(self
            .0
            .iter()
            .find(|(fragment, _)| sql.contains(fragment))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default())
    }
}

fn now() -> DateTime<Local> {
    let naive = NaiveDateTime::parse_from_str("2024-06-10 00:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
    Local.from_local_datetime(&naive).earliest().unwrap()
}

fn invocation(command: &str, args: &[&str]) -> Invocation {
    Invocation {
        command: command.to_string(),
        args: args.iter().map(|a| a.to_string()).collect(),
        export: None,
    }
}

fn woocommerce_active() -> Canned {
    Canned(vec![(
        "active_plugins",
        vec![row([(
            "option_value",
            r#"a:1:{i:0;s:27:"woocommerce/woocommerce.php";}"#,
        )])],
    )])
}

fn options() -> Canned {
    Canned(vec![(
        "autoload",
        vec![
            row([("name", Value::from("rewrite_rules")), ("bytes", Value::from(48213i64))]),
            row([("name", Value::from("widget, \"text\"\nblock")), ("bytes", Value::from(912i64))]),
        ],
    )])
}

/// Run one invocation against `root` and return status plus announcements
fn run(root: &Path, db: &dyn TabularSource, vulns: &VulnerabilityClient, inv: &Invocation) -> (Status, Recorder) {
    let ctx = Context {
        root: root.to_path_buf(),
        db,
        table_prefix: "wp_".to_string(),
        vulns,
        now: now(),
    };
    let mut runner = Runner::new(ctx, Recorder::default());
    let status = tokio_test::block_on(runner.run(inv));
    (status, runner.into_announcer())
}

fn write_debug_log(root: &Path, contents: &str) {
    let dir = root.join("wp-content");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("debug.log"), contents).unwrap();
}

// =============================================================================
// Runner routing
// =============================================================================

#[test]
fn non_numeric_days_falls_back_to_default() {
    let site = tempfile::tempdir().unwrap();
    write_debug_log(
        site.path(),
        "[2024-06-07 09:00:00] PHP Notice: recent\n[2024-05-25 09:00:00] PHP Notice: old\n",
    );
    let vulns = VulnerabilityClient::new().unwrap();

    let (status, rec) = run(site.path(), &Canned(vec![]), &vulns, &invocation("debug-log", &["abc"]));

    assert_eq!(status, Status::Success);
    assert_eq!(rec.of("warning").len(), 1);
    assert!(rec.of("error").is_empty());
    let printed = rec.of("print");
    assert_eq!(printed.len(), 1);
    assert!(printed[0].contains("PHP Notice: recent"));
    assert!(!printed[0].contains("PHP Notice: old"));
}

#[test]
fn explicit_days_widen_the_window() {
    let site = tempfile::tempdir().unwrap();
    write_debug_log(
        site.path(),
        "[2024-06-07 09:00:00] recent\n[2024-05-25 09:00:00] old\nstack trace line\n",
    );
    let vulns = VulnerabilityClient::new().unwrap();

    let (_, rec) = run(site.path(), &Canned(vec![]), &vulns, &invocation("debug-log", &["30"]));

    assert!(rec.of("warning").is_empty());
    let table = rec.of("print")[0];
    assert_eq!(table.lines().count(), 3);
    assert!(!table.contains("stack trace line"));
}

#[test]
fn enormous_days_keep_every_stamped_line() {
    let site = tempfile::tempdir().unwrap();
    write_debug_log(
        site.path(),
        "[1970-01-01 00:00:00] epoch\n[2024-06-07 09:00:00] recent\n",
    );
    let vulns = VulnerabilityClient::new().unwrap();

    for days in ["100000000", "4294967295"] {
        let (status, rec) = run(site.path(), &Canned(vec![]), &vulns, &invocation("debug-log", &[days]));

        assert_eq!(status, Status::Success, "days = {days}");
        assert!(rec.of("warning").is_empty());
        assert!(rec.of("error").is_empty());
        let table = rec.of("print")[0];
        assert!(table.contains("epoch"));
        assert!(table.contains("recent"));
    }
}

#[test]
fn missing_debug_log_is_empty_not_failure() {
    let site = tempfile::tempdir().unwrap();
    let vulns = VulnerabilityClient::new().unwrap();

    let (status, rec) = run(site.path(), &Canned(vec![]), &vulns, &invocation("debug-log", &[]));

    assert_eq!(status, Status::Success);
    assert_eq!(rec.of("empty").len(), 1);
    assert!(rec.of("print").is_empty());
    assert!(rec.of("error").is_empty());
}

#[test]
fn missing_log_directory_fails_only_that_command() {
    let site = tempfile::tempdir().unwrap();
    let vulns = VulnerabilityClient::new().unwrap();
    let db = woocommerce_active();

    let (status, rec) = run(site.path(), &db, &vulns, &invocation("wc-logs", &[]));
    assert_eq!(status, Status::Failure);
    assert_eq!(rec.of("error"), vec!["log directory not found"]);

    // The next command is unaffected
    let logs = site.path().join("wp-content/uploads/wc-logs");
    fs::create_dir_all(&logs).unwrap();
    let (status, rec) = run(site.path(), &db, &vulns, &invocation("wc-logs", &[]));
    assert_eq!(status, Status::Success);
    assert_eq!(rec.of("empty").len(), 1);
}

#[test]
fn wc_logs_scan_every_log_file() {
    let site = tempfile::tempdir().unwrap();
    let logs = site.path().join("wp-content/uploads/wc-logs");
    fs::create_dir_all(&logs).unwrap();
    fs::write(logs.join("a-2024-06-08.log"), "[2024-06-08 10:00:00] CRITICAL payment failed\n").unwrap();
    fs::write(logs.join("b-2024-06-09.log"), "[2024-06-09 11:00:00] ERROR webhook timeout\n").unwrap();
    let vulns = VulnerabilityClient::new().unwrap();

    let (status, rec) = run(site.path(), &woocommerce_active(), &vulns, &invocation("wc-logs", &["7"]));

    assert_eq!(status, Status::Success);
    let table = rec.of("print")[0];
    let lines: Vec<_> = table.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[1].contains("payment failed"));
    assert!(lines[2].contains("webhook timeout"));
}

#[test]
fn unknown_command_is_failure() {
    let site = tempfile::tempdir().unwrap();
    let vulns = VulnerabilityClient::new().unwrap();

    let (status, rec) = run(site.path(), &Canned(vec![]), &vulns, &invocation("drop-tables", &[]));

    assert_eq!(status, Status::Failure);
    assert!(rec.of("error")[0].contains("drop-tables"));
}

#[test]
fn list_prints_catalogue() {
    let site = tempfile::tempdir().unwrap();
    let vulns = VulnerabilityClient::new().unwrap();

    let (status, rec) = run(site.path(), &Canned(vec![]), &vulns, &invocation("list", &[]));

    assert_eq!(status, Status::Success);
    let table = rec.of("print")[0];
    assert_eq!(table.lines().count(), wp_inspect::CATALOGUE.len() + 1);
    assert!(table.contains("core-vulnerabilities"));
}

// =============================================================================
// CSV export
// =============================================================================

#[test]
fn export_overwrites_existing_file() {
    let site = tempfile::tempdir().unwrap();
    let target = site.path().join("report.csv");
    fs::write(&target, "old,header\nleftover,row\nanother,row\nand,more\n").unwrap();
    let vulns = VulnerabilityClient::new().unwrap();

    let mut inv = invocation("autoload-options", &[]);
    inv.export = Some("report.csv".into());
    let (status, rec) = run(site.path(), &options(), &vulns, &inv);

    assert_eq!(status, Status::Success);
    assert!(rec.of("print").is_empty());
    let success = rec.of("success")[0];
    assert!(success.contains("Exported 2 rows"));
    assert!(success.contains("report.csv"));

    let written = fs::read_to_string(&target).unwrap();
    assert!(written.starts_with("name,bytes\n"));
    assert!(!written.contains("leftover"));
    assert!(!written.contains("and,more"));
}

#[test]
fn export_round_trips_through_csv_reader() {
    let site = tempfile::tempdir().unwrap();
    let target = site.path().join("roundtrip.csv");
    let mut result = TabularResult::new(["name", "bytes", "note"]);
    result
        .push_row(row([("name", Value::from("a,b \"quoted\"\nnext")), ("bytes", Value::from(1i64))]))
        .unwrap();
    result
        .push_row(row([("name", Value::from("plain")), ("note", Value::from("x"))]))
        .unwrap();

    export_csv(&result, &target).unwrap();

    let mut reader = csv::Reader::from_path(&target).unwrap();
    let header: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
    assert_eq!(header, result.columns());
    let records: Vec<Vec<String>> = reader
        .records()
        .map(|r| r.unwrap().iter().map(String::from).collect())
        .collect();
    let expected: Vec<Vec<String>> = result.rows().iter().map(|r| result.row_cells(r)).collect();
    assert_eq!(records, expected);
    assert_eq!(records[0][0], "a,b \"quoted\"\nnext");
}

#[test]
fn export_into_missing_directory_is_failure() {
    let site = tempfile::tempdir().unwrap();
    let vulns = VulnerabilityClient::new().unwrap();

    let mut inv = invocation("autoload-options", &[]);
    inv.export = Some("no/such/dir/report.csv".into());
    let (status, rec) = run(site.path(), &options(), &vulns, &inv);

    assert_eq!(status, Status::Failure);
    assert_eq!(rec.of("error").len(), 1);
    assert!(!site.path().join("no").exists());
}

// =============================================================================
// Table rendering
// =============================================================================

#[test]
fn table_has_one_line_per_row_plus_header() {
    for rows in [0usize, 1, 5] {
        let mut result = TabularResult::new(["table", "rows", "size_mb"]);
        for i in 0..rows {
            result
                .push_row(row([
                    ("table", Value::from(format!("wp_table_{i}"))),
                    ("size_mb", Value::from(i as f64 + 0.5)),
                ]))
                .unwrap();
        }
        let text = render_table(&result);
        assert_eq!(text.lines().count(), rows + 1, "rows = {rows}");
    }
}

// =============================================================================
// Vulnerability lookup
// =============================================================================

const CORE_RESPONSE: &str = r#"{
  "error": 0,
  "message": null,
  "data": {
    "name": "WordPress 6.4.2",
    "vulnerability": [
      {
        "name": "WordPress < 6.4.3 - Deserialization of Untrusted Data",
        "source": [{"id": "CVE-2024-31210", "link": "https://www.cve.org/CVERecord?id=CVE-2024-31210"}],
        "impact": {"cvss": {"score": "7.2", "severity": "h"}}
      },
      {
        "name": "WordPress < 6.4.3 - Admin+ PHP File Upload",
        "source": [],
        "impact": []
      }
    ]
  }
}"#;

async fn run_async(root: &Path, vulns: &VulnerabilityClient, inv: &Invocation) -> (Status, Recorder) {
    let db = Canned(vec![]);
    let ctx = Context {
        root: root.to_path_buf(),
        db: &db,
        table_prefix: "wp_".to_string(),
        vulns,
        now: now(),
    };
    let mut runner = Runner::new(ctx, Recorder::default());
    let status = runner.run(inv).await;
    (status, runner.into_announcer())
}

#[tokio::test]
async fn core_vulnerabilities_from_version_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/core/6.4.2/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CORE_RESPONSE))
        .mount(&server)
        .await;

    let site = tempfile::tempdir().unwrap();
    fs::create_dir_all(site.path().join("wp-includes")).unwrap();
    fs::write(
        site.path().join("wp-includes/version.php"),
        "<?php\n$wp_version = '6.4.2';\n",
    )
    .unwrap();
    let vulns = VulnerabilityClient::builder().base_url(&server.uri()).build().unwrap();

    let (status, rec) = run_async(site.path(), &vulns, &invocation("core-vulnerabilities", &[])).await;

    assert_eq!(status, Status::Success);
    let table = rec.of("print")[0];
    assert_eq!(table.lines().count(), 3);
    assert!(table.contains("CVE-2024-31210"));
    assert!(table.contains("Admin+ PHP File Upload"));
}

#[tokio::test]
async fn core_vulnerabilities_none_known_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/core/6.6.1/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"error":0,"data":{"name":"WordPress 6.6.1","vulnerability":[]}}"#),
        )
        .mount(&server)
        .await;

    let site = tempfile::tempdir().unwrap();
    let vulns = VulnerabilityClient::builder().base_url(&server.uri()).build().unwrap();

    let (status, rec) =
        run_async(site.path(), &vulns, &invocation("core-vulnerabilities", &["6.6.1"])).await;

    assert_eq!(status, Status::Success);
    assert!(rec.of("empty")[0].contains("6.6.1"));
}

#[tokio::test]
async fn core_vulnerabilities_http_error_is_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let site = tempfile::tempdir().unwrap();
    let vulns = VulnerabilityClient::builder().base_url(&server.uri()).build().unwrap();

    let (status, rec) =
        run_async(site.path(), &vulns, &invocation("core-vulnerabilities", &["6.4.2"])).await;

    assert_eq!(status, Status::Failure);
    assert!(rec.of("error")[0].contains("503"));
}

#[tokio::test]
async fn core_vulnerabilities_api_error_is_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(r#"{"error":1,"message":"Unknown version"}"#),
        )
        .mount(&server)
        .await;

    let site = tempfile::tempdir().unwrap();
    let vulns = VulnerabilityClient::builder().base_url(&server.uri()).build().unwrap();

    let (status, rec) =
        run_async(site.path(), &vulns, &invocation("core-vulnerabilities", &["0.0.0"])).await;

    assert_eq!(status, Status::Failure);
    assert!(rec.of("error")[0].contains("Unknown version"));
}
