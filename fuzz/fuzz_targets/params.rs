//! Fuzz target for report parameter parsing.
//!
//! Arbitrary report names and key/value pairs must be rejected with a
//! configuration error, never a panic.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use smart_bi_engine::analytics::{ReportParams, run_report};
use smart_bi_engine::store::SnapshotStore;

#[derive(Arbitrary, Debug)]
struct ParamsInput {
    report: String,
    pairs: Vec<(String, String)>,
}

fuzz_target!(|input: ParamsInput| {
    let Ok(params) = ReportParams::from_pairs(
        input.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())),
    ) else {
        return;
    };
    let store = SnapshotStore::default();
    let _ = run_report(&store, &input.report, &params);
});
