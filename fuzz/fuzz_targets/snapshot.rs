//! Fuzz target for snapshot loading and the report catalog.
//!
//! Any document that parses as a snapshot must run through every report
//! and the validator without panicking; failures must surface as errors.

#![no_main]

use arbitrary::Arbitrary;
use chrono::NaiveDate;
use libfuzzer_sys::fuzz_target;

use smart_bi_engine::analytics::{
    Param, ReportKind, ReportParams, ValidateConfig, run, run_validation,
};
use smart_bi_engine::model::Snapshot;
use smart_bi_engine::store::SnapshotStore;

#[derive(Arbitrary, Debug)]
struct SnapshotInput {
    /// Raw JSON content
    json_content: String,
    /// Days after 2000-01-01 used as the reference date
    as_of_offset: u16,
}

fuzz_target!(|input: SnapshotInput| {
    let snapshot = match Snapshot::from_json(&input.json_content) {
        Ok(s) => s,
        Err(_) => return,
    };

    let _ = run_validation(&snapshot, "fuzz", &ValidateConfig::default());

    let as_of = NaiveDate::from_ymd_opt(2000, 1, 1)
        .and_then(|d| d.checked_add_days(chrono::Days::new(input.as_of_offset as u64)));
    let store = SnapshotStore::new(snapshot);
    for kind in ReportKind::ALL {
        let mut params = ReportParams::default();
        if kind.accepts(Param::AsOf) {
            params.as_of = as_of;
        }
        let _ = run(&store, kind, &params);
    }
});
