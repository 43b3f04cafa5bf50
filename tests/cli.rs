//! Crate-level integration tests driven entirely through the compiled binary
//! over synthetic fixtures (no real pcap files ship with this crate). Covers
//! schema stability and the `--file` / `--timeseries_csv` round-trip
//! property.
use std::fs;
use std::path::PathBuf;
use std::process::Command;

fn bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_flow_timeseries_miner"))
}

/// A scratch path under the system temp dir, unique per test run via pid and
/// a caller-supplied tag (no `tempfile` dependency in this crate's stack).
fn scratch_path(tag: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!("flow_timeseries_miner_test_{}_{}", std::process::id(), tag));
    path
}

/// A small single-flow, all-forward-direction tcpdump-style dump: one TCP
/// conversation, ten packets, one second apart, well inside both timeouts,
/// so the whole thing emits once at the terminal drain.
const FIXTURE_CSV: &str = "\
0.0 IP 10.0.0.1.5555 > 10.0.0.2.80: tcp 100
1.0 IP 10.0.0.1.5555 > 10.0.0.2.80: tcp 150
2.0 IP 10.0.0.1.5555 > 10.0.0.2.80: tcp 200
3.0 IP 10.0.0.1.5555 > 10.0.0.2.80: tcp 100
4.0 IP 10.0.0.1.5555 > 10.0.0.2.80: tcp 150
5.0 IP 10.0.0.1.5555 > 10.0.0.2.80: tcp 200
6.0 IP 10.0.0.1.5555 > 10.0.0.2.80: tcp 100
7.0 IP 10.0.0.1.5555 > 10.0.0.2.80: tcp 150
8.0 IP 10.0.0.1.5555 > 10.0.0.2.80: tcp 200
9.0 IP 10.0.0.1.5555 > 10.0.0.2.80: tcp 100
";

/// Schema stability: the header row and the one data row this fixture
/// produces must have equal arity.
#[test]
fn flows_header_and_row_have_equal_arity() {
    let csv_in = scratch_path("schema_in.csv");
    let flows_out = scratch_path("schema_flows.csv");
    fs::write(&csv_in, FIXTURE_CSV).unwrap();

    let status = bin()
        .arg("--csv")
        .arg(&csv_in)
        .arg("--flows")
        .arg(&flows_out)
        .status()
        .unwrap();
    assert!(status.success());

    let contents = fs::read_to_string(&flows_out).unwrap();
    let mut lines = contents.lines();
    let header = lines.next().expect("header row");
    let row = lines.next().expect("data row");
    assert_eq!(header.split(',').count(), row.split(',').count());
    assert!(lines.next().is_none(), "fixture emits exactly one flow");

    fs::remove_file(&csv_in).ok();
    fs::remove_file(&flows_out).ok();
}

/// Round-trip: writing the intermediate time series via `--file` and
/// reading it back via `--timeseries_csv` yields an identical
/// feature row to running `--csv` straight through to `--flows`. The fixture
/// is single-direction so the synthetic-flow `DIRECTIONS=1.0`/zero reverse
/// counters the bypass path assumes (main.rs `synthetic_flow`) agree with
/// what flow assembly itself would have counted.
#[test]
fn file_then_timeseries_csv_round_trips_to_direct_flows() {
    let csv_in = scratch_path("roundtrip_in.csv");
    let direct_flows = scratch_path("roundtrip_direct.csv");
    let intermediate = scratch_path("roundtrip_intermediate.csv");
    let roundtrip_flows = scratch_path("roundtrip_via_timeseries.csv");
    fs::write(&csv_in, FIXTURE_CSV).unwrap();

    let status = bin()
        .arg("--csv")
        .arg(&csv_in)
        .arg("--flows")
        .arg(&direct_flows)
        .status()
        .unwrap();
    assert!(status.success());

    let status = bin()
        .arg("--csv")
        .arg(&csv_in)
        .arg("--file")
        .arg(&intermediate)
        .status()
        .unwrap();
    assert!(status.success());

    let status = bin()
        .arg("--timeseries_csv")
        .arg(&intermediate)
        .arg("--flows")
        .arg(&roundtrip_flows)
        .status()
        .unwrap();
    assert!(status.success());

    let direct = fs::read_to_string(&direct_flows).unwrap();
    let roundtrip = fs::read_to_string(&roundtrip_flows).unwrap();
    assert_eq!(direct, roundtrip);

    fs::remove_file(&csv_in).ok();
    fs::remove_file(&direct_flows).ok();
    fs::remove_file(&intermediate).ok();
    fs::remove_file(&roundtrip_flows).ok();
}

/// Fatal conditions surface at startup with exit code 1: no input mode
/// selected.
#[test]
fn no_input_selected_exits_with_failure() {
    let flows_out = scratch_path("no_input_flows.csv");
    let status = bin().arg("--flows").arg(&flows_out).status().unwrap();
    assert!(!status.success());
    assert_eq!(status.code(), Some(1));
}

/// `--timeseries_csv` combined with `--file` is rejected: the input is
/// already a time series, there is nothing to assemble into one.
#[test]
fn timeseries_csv_with_file_exits_with_failure() {
    let timeseries_in = scratch_path("conflict_in.csv");
    let file_out = scratch_path("conflict_file.csv");
    fs::write(&timeseries_in, "SRC_IP;SRC_PORT;DST_IP;DST_PORT;bytes;time\n").unwrap();

    let status = bin()
        .arg("--timeseries_csv")
        .arg(&timeseries_in)
        .arg("--file")
        .arg(&file_out)
        .status()
        .unwrap();
    assert!(!status.success());
    assert_eq!(status.code(), Some(1));

    fs::remove_file(&timeseries_in).ok();
}
