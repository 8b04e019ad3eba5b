use std::hint::black_box;

use chrono::NaiveDate;
use criterion::{Criterion, criterion_group, criterion_main};
use sheetlens::aggregate::{aggregate_by_category, monthly_profile, time_series};
use sheetlens::classify::ColumnProfile;
use sheetlens::dates::Granularity;
use sheetlens::filter::FilterState;
use sheetlens::kpi::calculate_kpis;
use sheetlens::value::{Row, Value};

fn generate_orders(rows: usize) -> Vec<Row> {
    (0..rows)
        .map(|i| {
            let product = match i % 5 {
                0 => "Widget",
                1 => "Gadget",
                2 => "Gizmo",
                3 => "Doohickey",
                _ => "Sprocket",
            };
            let region = if i % 2 == 0 { "North" } else { "South" };
            let date = if i % 3 == 0 {
                format!("{:02}/{:02}/2024", (i % 28) + 1, (i % 12) + 1)
            } else {
                format!("2024-{:02}-{:02}", (i % 12) + 1, (i % 28) + 1)
            };
            [
                ("Order Date", Value::from(date)),
                ("Product", Value::from(product)),
                ("Region", Value::from(region)),
                ("Quantity", Value::from((i % 9) as f64 + 1.0)),
                ("Price", Value::from(format!("{}.{:02}", i % 500, i % 100))),
            ]
            .into_iter()
            .collect()
        })
        .collect()
}

fn bench_aggregation(c: &mut Criterion) {
    let rows = generate_orders(50_000);

    c.bench_function("classify_columns", |b| {
        b.iter(|| ColumnProfile::detect(black_box(&rows)))
    });
    c.bench_function("aggregate_by_category", |b| {
        b.iter(|| aggregate_by_category(black_box(&rows), "Product", "Price"))
    });
    c.bench_function("time_series_month", |b| {
        b.iter(|| time_series(black_box(&rows), Granularity::Month))
    });
    c.bench_function("time_series_week", |b| {
        b.iter(|| time_series(black_box(&rows), Granularity::Week))
    });
    c.bench_function("monthly_profile", |b| {
        b.iter(|| monthly_profile(black_box(&rows)))
    });
    c.bench_function("calculate_kpis", |b| {
        b.iter(|| calculate_kpis(black_box(&rows)))
    });

    let mut filters = FilterState::new();
    filters.set_date_range(
        NaiveDate::from_ymd_opt(2024, 3, 1),
        NaiveDate::from_ymd_opt(2024, 9, 30),
    );
    filters.select_values("Region", ["north"]);
    c.bench_function("filter_then_aggregate", |b| {
        b.iter(|| {
            let filtered = filters.apply(black_box(&rows));
            aggregate_by_category(&filtered, "Product", "Price")
        })
    });
}

criterion_group!(benches, bench_aggregation);
criterion_main!(benches);
