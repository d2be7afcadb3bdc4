//! Runs against a live database configured through `DB_*` variables.
//! `cargo test -- --ignored` after creating a scratch database.

use covid_ingest::{
    load::{self, BatchOutcome, PgTarget},
    process::{RecordSet, Value},
    settings::DbSettings,
    source::Strategy,
};
use sqlx::{Connection, PgConnection};

const COLUMNS: &str = "country_region text NOT NULL, confirmed integer, day date, \
                       iso3 varchar(3), fatality numeric(5,2), last_update timestamp";

type Dumped = (
    String,
    Option<i32>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
);

fn columns() -> Vec<String> {
    ["country_region", "confirmed", "day", "iso3", "fatality", "last_update"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn row(country: &str, iso3: &str, fatality: f64) -> Vec<Value> {
    vec![
        country.into(),
        Value::Number(100.0),
        "2020-07-27".into(),
        iso3.into(),
        Value::Number(fatality),
        "2020-07-27 04:24:00".into(),
    ]
}

fn sample() -> RecordSet {
    RecordSet {
        columns: columns(),
        rows: vec![
            row("X", "USA", 1.234),
            vec![
                "Y".into(),
                Value::Null,
                Value::Null,
                Value::Null,
                Value::Null,
                Value::Null,
            ],
        ],
    }
}

async fn reset(admin: &mut PgConnection) {
    let ddl = format!(
        "DROP TABLE IF EXISTS ingest_check_bulk, ingest_check_row;
         CREATE TABLE ingest_check_bulk ({cols});
         CREATE TABLE ingest_check_row ({cols});",
        cols = COLUMNS
    );
    sqlx::raw_sql(&ddl).execute(admin).await.unwrap();
}

async fn dump(conn: &mut PgConnection, table: &str) -> Vec<Dumped> {
    sqlx::query_as(&format!(
        "SELECT country_region, confirmed, day::text, iso3, fatality::text, last_update::text \
         FROM {} ORDER BY country_region",
        table
    ))
    .fetch_all(conn)
    .await
    .unwrap()
}

/// Load `set` with both strategies and return both outcomes.
async fn load_both(target: &mut PgTarget, set: &RecordSet) -> (BatchOutcome, BatchOutcome) {
    let bulk = load::load(target, set, "ingest_check_bulk", Strategy::Bulk).await;
    let rows = load::load(target, set, "ingest_check_row", Strategy::Row).await;
    (bulk, rows)
}

#[tokio::test]
#[ignore = "needs a PostgreSQL database from DB_* variables"]
async fn strategies_agree_and_failures_roll_back() {
    let _ = dotenvy::dotenv();
    let opts = DbSettings::from_env().unwrap().connect_options();

    let mut admin = PgConnection::connect_with(&opts).await.unwrap();
    reset(&mut admin).await;
    let mut target = PgTarget::connect(&opts).await.unwrap();

    // typed columns, with numeric(5,2) rounding 1.234 the same way on both paths
    let (bulk, row_out) = load_both(&mut target, &sample()).await;
    assert!(bulk.is_committed(), "{:?}", bulk);
    assert!(row_out.is_committed(), "{:?}", row_out);
    let stored = dump(&mut admin, "ingest_check_bulk").await;
    assert_eq!(stored, dump(&mut admin, "ingest_check_row").await);
    assert_eq!(stored[0].3.as_deref(), Some("USA"));
    assert_eq!(stored[0].4.as_deref(), Some("1.23"));
    assert_eq!(stored[0].5.as_deref(), Some("2020-07-27 04:24:00"));

    // too long for varchar(3): rejected by both, never truncated
    let mut long = sample();
    long.rows.push(row("Z", "USAX", 1.0));
    let (bulk, row_out) = load_both(&mut target, &long).await;
    assert!(!bulk.is_committed());
    assert!(!row_out.is_committed());
    assert_eq!(row_out.failure.as_ref().unwrap().row, Some(2));

    // out of range for numeric(5,2)
    let mut wide = sample();
    wide.rows.push(row("Z", "PER", 12345.6));
    let (bulk, row_out) = load_both(&mut target, &wide).await;
    assert!(!bulk.is_committed());
    assert!(!row_out.is_committed());

    // not-null violation on the row path
    let mut missing = sample();
    missing.rows.push(vec![
        Value::Null,
        Value::Number(1.0),
        Value::Null,
        Value::Null,
        Value::Null,
        Value::Null,
    ]);
    let (bulk, row_out) = load_both(&mut target, &missing).await;
    assert!(!bulk.is_committed());
    assert_eq!(row_out.failure.unwrap().row, Some(2));

    // every failed attempt rolled back; only the first load persisted
    let bulk_rows = dump(&mut admin, "ingest_check_bulk").await;
    assert_eq!(bulk_rows.len(), 2);
    assert_eq!(bulk_rows, dump(&mut admin, "ingest_check_row").await);

    target.close().await.unwrap();
}
