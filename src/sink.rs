// Copyright 2018 Steven Sheffey
// This file is part of packet_captor_sakura.
//
// packet_captor_sakura is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// packet_captor_sakura is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with packet_captor_sakura.  If not, see <https:// www.gnu.org/licenses/>.
//! CSV sinks for the two output modes: `--file` writes the
//! intermediate per-flow time series, `--flows` writes feature vectors.
use std::path::Path;

use failure::Error;

use crate::features::{FeatureVector, SIZE_BIAS, FEATURE_HEADER};
use crate::flow::EmittedFlow;
use crate::sentinel::Sentinel;

/// The ten flow-identity columns that precede the feature block. Note
/// the column order: `DST_IP` before `SRC_IP`.
pub const FLOW_IDENTITY_HEADER: &[&str] = &[
    "DST_IP",
    "SRC_IP",
    "PACKETS",
    "PACKETS_REV",
    "BYTES",
    "BYTES_REV",
    "TIME_FIRST",
    "TIME_LAST",
    "DST_PORT",
    "SRC_PORT",
];

/// Writes one flow's identity columns, `PACKETS`/`BYTES` biased by
/// [`SIZE_BIAS`] per packet to account for the header bytes stripped before
/// capture, matching the raw (never head-stripped) per-direction counters.
fn flow_identity_row(flow: &EmittedFlow) -> Vec<String> {
    let bytes = flow.bytes + flow.packets * SIZE_BIAS;
    let bytes_rev = flow.bytes_rev + flow.packets_rev * SIZE_BIAS;
    let time_first = flow.times.first().copied().unwrap_or(0.0);
    let time_last = flow.times.last().copied().unwrap_or(0.0);
    vec![
        flow.dst_ip.clone(),
        flow.src_ip.clone(),
        flow.packets.to_string(),
        flow.packets_rev.to_string(),
        bytes.to_string(),
        bytes_rev.to_string(),
        time_first.to_string(),
        time_last.to_string(),
        flow.dst_port.to_string(),
        flow.src_port.to_string(),
    ]
}

/// Writes feature vectors, one row per flow (`--flows`).
pub struct FlowSink {
    writer: csv::Writer<std::fs::File>,
}

impl FlowSink {
    pub fn create(path: &Path) -> Result<Self, Error> {
        let mut writer = csv::WriterBuilder::new().from_path(path)?;
        let mut header: Vec<&str> = FLOW_IDENTITY_HEADER.to_vec();
        header.extend_from_slice(FEATURE_HEADER);
        writer.write_record(&header)?;
        Ok(FlowSink { writer })
    }

    /// Writes one flow's row: identity columns, then the feature block with
    /// `DIRECTIONS` (sourced from the flow's own forward/reverse split)
    /// inserted at its fixed position.
    pub fn write(&mut self, flow: &EmittedFlow, fv: &FeatureVector) -> Result<(), Error> {
        let mut row = flow_identity_row(flow);
        row.extend(fv.to_row(Sentinel::set(flow.directions)));
        self.writer.write_record(&row)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), Error> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Writes the intermediate per-flow time series (`--file`): `;`-delimited,
/// `bytes`/`time` as JSON arrays so `--timeseries_csv` can
/// read them back exactly.
pub struct TimeSeriesSink {
    writer: csv::Writer<std::fs::File>,
}

impl TimeSeriesSink {
    pub fn create(path: &Path) -> Result<Self, Error> {
        let mut writer = csv::WriterBuilder::new().delimiter(b';').from_path(path)?;
        writer.write_record(&["SRC_IP", "SRC_PORT", "DST_IP", "DST_PORT", "bytes", "time"])?;
        Ok(TimeSeriesSink { writer })
    }

    pub fn write(&mut self, flow: &EmittedFlow) -> Result<(), Error> {
        let bytes_json = serde_json::to_string(&flow.sizes)?;
        let time_json = serde_json::to_string(&flow.times)?;
        self.writer.write_record(&[
            flow.src_ip.clone(),
            flow.src_port.to_string(),
            flow.dst_ip.clone(),
            flow.dst_port.to_string(),
            bytes_json,
            time_json,
        ])?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), Error> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_flow() -> EmittedFlow {
        EmittedFlow {
            src_ip: "10.0.0.1".to_string(),
            src_port: 1,
            dst_ip: "10.0.0.2".to_string(),
            dst_port: 2,
            sizes: vec![160, 260],
            times: vec![0.0, 1.0],
            packets: 2,
            packets_rev: 0,
            bytes: 320,
            bytes_rev: 0,
            directions: 1.0,
            first: true,
        }
    }

    #[test]
    fn test_flow_identity_row_applies_size_bias_to_bytes_not_packets() {
        let flow = sample_flow();
        let row = flow_identity_row(&flow);
        assert_eq!(row[0], "10.0.0.2");
        assert_eq!(row[1], "10.0.0.1");
        assert_eq!(row[2], "2");
        assert_eq!(row[4], (320 + 2 * SIZE_BIAS).to_string());
        assert_eq!(row[6], "0");
        assert_eq!(row[7], "1");
    }
}
