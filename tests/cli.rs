mod common;

use std::fs;

use common::{TestWorkspace, fixture_str, run_json, sheetlens};
use predicates::str::contains;

fn approx(value: &serde_json::Value, expected: f64) -> bool {
    value
        .as_f64()
        .is_some_and(|actual| (actual - expected).abs() < 1e-9)
}

#[test]
fn probe_reports_roles_kind_and_colour() {
    sheetlens()
        .args(["probe", "-i", &fixture_str("fom_sales.csv")])
        .assert()
        .success()
        .stdout(contains(
            "Fom Sales (fom_sales.csv) kind=sales type=fom color=#ea580c rows=6",
        ))
        .stdout(contains("unknown"))
        .stdout(contains("categorical"));
}

#[test]
fn probe_json_covers_every_input() {
    let report = run_json(&[
        "probe",
        "-i",
        &fixture_str("fom_sales.csv"),
        "-i",
        &fixture_str("stock.json"),
        "-i",
        &fixture_str("production.tsv"),
        "--format",
        "json",
    ]);
    let datasets = report.as_array().expect("array");
    assert_eq!(datasets.len(), 3);

    let roles = datasets[0]["columns"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| {
            (
                c["name"].as_str().unwrap().to_string(),
                c["role"].as_str().unwrap().to_string(),
            )
        })
        .collect::<Vec<_>>();
    assert_eq!(roles[0], ("Order Date".to_string(), "date".to_string()));
    assert_eq!(roles[3], ("Customer Address".to_string(), "unknown".to_string()));
    assert_eq!(roles[5], ("Price".to_string(), "numeric".to_string()));

    assert_eq!(datasets[1]["kind"], "stock");
    assert_eq!(datasets[1]["dataset_type"], "stock");
    assert_eq!(datasets[2]["kind"], "production");
    assert_eq!(datasets[2]["color"], "#ca8a04");
    assert_eq!(datasets[2]["row_count"], 2);
}

#[test]
fn kpi_summarizes_combined_rows() {
    let report = run_json(&["kpi", "-i", &fixture_str("fom_sales.csv"), "--format", "json"]);
    let summary = &report["summary"];
    assert_eq!(summary["total_records"], 6);
    assert!(approx(&summary["total_value"], 37.0));
    assert!(approx(&summary["average_value"], 37.0 / 6.0));
    assert_eq!(summary["unique_categories"], 3);
    assert_eq!(summary["primary_value_column"], "Price");
    assert_eq!(summary["primary_category_column"], "Product");
    assert_eq!(report["filters"]["columns"], false);
}

#[test]
fn kpi_table_lists_sections() {
    sheetlens()
        .args(["kpi", "-i", &fixture_str("fom_sales.csv")])
        .assert()
        .success()
        .stdout(contains("Summary"))
        .stdout(contains("average value"))
        .stdout(contains("6.17"))
        .stdout(contains("Numeric columns"));
}

#[test]
fn select_filter_is_case_insensitive() {
    let report = run_json(&[
        "kpi",
        "-i",
        &fixture_str("fom_sales.csv"),
        "--select",
        "Region=south",
        "--format",
        "json",
    ]);
    assert_eq!(report["summary"]["total_records"], 2);
    assert!(approx(&report["summary"]["total_value"], 17.5));
    assert_eq!(report["filters"]["columns"], true);
}

#[test]
fn date_bounds_drop_unparseable_dates() {
    let report = run_json(&[
        "kpi",
        "-i",
        &fixture_str("fom_sales.csv"),
        "--from",
        "2024-02-01",
        "--format",
        "json",
    ]);
    assert_eq!(report["summary"]["total_records"], 3);
    assert!(approx(&report["summary"]["total_value"], 20.0));
}

#[test]
fn drill_down_matches_exactly() {
    let report = run_json(&[
        "kpi",
        "-i",
        &fixture_str("fom_sales.csv"),
        "--drill",
        "Region=south",
        "--format",
        "json",
    ]);
    assert_eq!(report["summary"]["total_records"], 1);
}

#[test]
fn categories_fold_tail_into_other() {
    let report = run_json(&[
        "categories",
        "-i",
        &fixture_str("fom_sales.csv"),
        "--top",
        "2",
        "--format",
        "json",
    ]);
    assert_eq!(report["category_column"], "Product");
    assert_eq!(report["value_column"], "Price");
    let categories = report["categories"].as_array().unwrap();
    assert_eq!(categories.len(), 3);
    assert_eq!(categories[0]["name"], "Widget");
    assert!(approx(&categories[0]["total"], 19.5));
    assert_eq!(categories[1]["name"], "Gadget");
    assert_eq!(categories[2]["name"], "Other");
    assert_eq!(categories[2]["count"], 1);
}

#[test]
fn categories_accept_column_overrides() {
    let report = run_json(&[
        "categories",
        "-i",
        &fixture_str("fom_sales.csv"),
        "--category",
        "Region",
        "--value",
        "Quantity",
        "--format",
        "json",
    ]);
    let categories = report["categories"].as_array().unwrap();
    assert_eq!(categories[0]["name"], "North");
    assert!(approx(&categories[0]["total"], 5.0));
}

#[test]
fn unknown_override_column_fails() {
    sheetlens()
        .args([
            "categories",
            "-i",
            &fixture_str("fom_sales.csv"),
            "--category",
            "Nope",
        ])
        .assert()
        .failure()
        .stderr(contains("Column 'Nope' not found"));
}

#[test]
fn monthly_timeline_is_chronological() {
    let report = run_json(&[
        "timeline",
        "-i",
        &fixture_str("fom_sales.csv"),
        "--format",
        "json",
    ]);
    assert_eq!(report["date_column"], "Order Date");
    let points = report["points"].as_array().unwrap();
    let periods = points
        .iter()
        .map(|p| p["period"].as_str().unwrap())
        .collect::<Vec<_>>();
    assert_eq!(periods, vec!["2024-01", "2024-02", "2024-03"]);
    assert!(approx(&points[0]["value"], 15.0));
    assert_eq!(points[1]["count"], 2);
}

#[test]
fn weekly_timeline_starts_on_sunday() {
    sheetlens()
        .args([
            "timeline",
            "-i",
            &fixture_str("fom_sales.csv"),
            "--granularity",
            "week",
        ])
        .assert()
        .success()
        .stdout(contains("2023-12-31"));
}

#[test]
fn timeline_by_dataset_keeps_each_series_separate() {
    let report = run_json(&[
        "timeline",
        "-i",
        &fixture_str("fom_sales.csv"),
        "-i",
        &fixture_str("stock.json"),
        "--by-dataset",
        "--format",
        "json",
    ]);
    let series = report.as_array().unwrap();
    assert_eq!(series.len(), 2);
    assert_eq!(series[1]["dataset"], "Stock");
    assert_eq!(series[1]["value_column"], "Quantity");
    assert!(approx(&series[1]["points"][0]["value"], 40.0));
}

#[test]
fn two_digit_year_rule_is_selectable() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("legacy.csv", "Date,Amount\n05-06-75,3\n");
    let path = path.to_str().unwrap();

    let pivot = run_json(&["timeline", "-i", path, "--format", "json"]);
    assert_eq!(pivot["points"][0]["period"], "1975-06");

    let current = run_json(&[
        "timeline",
        "-i",
        path,
        "--two-digit-years",
        "current",
        "--format",
        "json",
    ]);
    assert_eq!(current["points"][0]["period"], "2075-06");
}

#[test]
fn two_digit_bounds_use_the_selected_century() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("legacy.csv", "Date,Amount\n05-06-75,3\n05-06-24,4\n");
    let path = path.to_str().unwrap();

    let current = run_json(&[
        "timeline",
        "-i",
        path,
        "--two-digit-years",
        "current",
        "--from",
        "01-01-75",
        "--to",
        "31-12-75",
        "--format",
        "json",
    ]);
    let points = current["points"].as_array().expect("points");
    assert_eq!(points.len(), 1);
    assert_eq!(points[0]["period"], "2075-06");

    workspace.write(
        "session.yaml",
        "datasets:\n  - path: legacy.csv\nfilters:\n  from: 01-01-75\n  to: 31-12-75\ncentury: always_current\n",
    );
    let session = workspace.path().join("session.yaml");
    let from_session = run_json(&[
        "timeline",
        "--session",
        session.to_str().unwrap(),
        "--format",
        "json",
    ]);
    assert_eq!(from_session["points"][0]["period"], "2075-06");
    assert_eq!(from_session["points"].as_array().map(Vec::len), Some(1));
}

#[test]
fn serial_dates_in_csv_feed_the_timeline() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("serial.csv", "Order Date,Amount\n45366,5\n45397,7\n");
    let report = run_json(&[
        "timeline",
        "-i",
        path.to_str().unwrap(),
        "--format",
        "json",
    ]);
    let points = report["points"].as_array().expect("points");
    assert_eq!(points.len(), 2);
    assert_eq!(points[0]["period"], "2024-03");
    assert_eq!(points[1]["period"], "2024-04");
}

#[test]
fn months_follow_calendar_order() {
    let output = sheetlens()
        .args(["months", "-i", &fixture_str("fom_sales.csv")])
        .output()
        .expect("run months");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let january = stdout.find("January").unwrap();
    let february = stdout.find("February").unwrap();
    let march = stdout.find("March").unwrap();
    assert!(january < february && february < march);
}

#[test]
fn facets_exclude_address_columns() {
    let report = run_json(&["facets", "-i", &fixture_str("fom_sales.csv"), "--format", "json"]);
    let facets = report.as_array().unwrap();
    let columns = facets
        .iter()
        .map(|f| f["column"].as_str().unwrap())
        .collect::<Vec<_>>();
    assert_eq!(columns, vec!["Product", "Region"]);
    assert_eq!(
        facets[0]["values"],
        serde_json::json!(["Gadget", "Gizmo", "Widget"])
    );
}

#[test]
fn merge_concatenates_by_default() {
    let workspace = TestWorkspace::new();
    let output = workspace.path().join("merged.csv");
    sheetlens()
        .args([
            "merge",
            "--left",
            &fixture_str("fom_sales.csv"),
            "--right",
            &fixture_str("stock.json"),
            "-o",
            output.to_str().unwrap(),
        ])
        .assert()
        .success();
    let contents = fs::read_to_string(&output).expect("read merged");
    let lines = contents.lines().collect::<Vec<_>>();
    assert_eq!(
        lines[0],
        "Order Date,Product,Region,Customer Address,Quantity,Price,Date,Warehouse"
    );
    assert_eq!(lines.len(), 10);
    assert_eq!(lines[9], ",Widget,,,25,,2024-03-31,A");
}

#[test]
fn merge_with_key_left_joins_and_prefixes_clashes() {
    let output = sheetlens()
        .args([
            "merge",
            "--left",
            &fixture_str("fom_sales.csv"),
            "--right",
            &fixture_str("stock.json"),
            "--key",
            "Product",
        ])
        .output()
        .expect("run merge");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines = stdout.lines().collect::<Vec<_>>();
    assert_eq!(
        lines[0],
        "Order Date,Product,Region,Customer Address,Quantity,Price,Date,Warehouse,right_Quantity"
    );
    assert_eq!(lines.len(), 10);
    assert!(lines.contains(&"2024-02-10,Gizmo,East,9 Side Rd,1,abc,,,"));
}

#[test]
fn session_file_sets_active_datasets_and_filters() {
    let report = run_json(&[
        "kpi",
        "--session",
        &fixture_str("session.yaml"),
        "--format",
        "json",
    ]);
    assert_eq!(report["datasets"].as_array().unwrap().len(), 1);
    assert_eq!(report["datasets"][0]["dataset"], "FOM Sales");
    assert_eq!(report["summary"]["total_records"], 2);
    assert!(approx(&report["summary"]["total_value"], 17.5));
}

#[test]
fn missing_inputs_are_reported() {
    sheetlens()
        .args(["kpi"])
        .assert()
        .failure()
        .stderr(contains("Provide at least one --input"));
}

#[test]
fn malformed_select_is_reported() {
    sheetlens()
        .args(["kpi", "-i", &fixture_str("fom_sales.csv"), "--select", "Region"])
        .assert()
        .failure()
        .stderr(contains("must look like column=value"));
}

#[test]
fn missing_file_is_reported_with_path() {
    sheetlens()
        .args(["probe", "-i", "does/not/exist.csv"])
        .assert()
        .failure()
        .stderr(contains("exist.csv"));
}
