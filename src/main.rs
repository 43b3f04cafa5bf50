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

mod behavior;
mod distribution;
mod entropy;
mod features;
mod flow;
mod packet;
mod pcap;
mod sentinel;
mod sink;
mod spectral;
mod stats;
mod time_features;

use std::path::PathBuf;
use std::process::exit;
use std::time::Instant;

use clap::Parser;
use failure::{Error, Fail};
use log::{error, info};

use crate::features::SIZE_BIAS;
use crate::flow::{EmittedFlow, FlowTable};
use crate::sink::{FlowSink, TimeSeriesSink};

/// Assembles packet traces into bidirectional flows and mines a fixed
/// time-series feature vector per flow.
#[derive(Parser, Debug)]
#[command(name = "flow_timeseries_miner", about, version)]
struct Args {
    /// Read packets from a pcap capture (TCP only).
    #[arg(long, value_name = "PATH")]
    pcap: Option<PathBuf>,
    /// Read packets from a textual tcpdump-style dump (TCP and UDP).
    #[arg(long, value_name = "PATH")]
    csv: Option<PathBuf>,
    /// Read pre-assembled per-flow time series, bypassing flow assembly.
    #[arg(long, value_name = "PATH")]
    timeseries_csv: Option<PathBuf>,
    /// Write the intermediate per-flow time series.
    #[arg(long, value_name = "PATH")]
    file: Option<PathBuf>,
    /// Write the mined feature vectors.
    #[arg(long, value_name = "PATH")]
    flows: Option<PathBuf>,
    /// Number of leading packets to strip from each flow's first emission.
    #[arg(short = 'H', long = "strip", default_value_t = 0)]
    head_strip: usize,
    /// Drop flows with this many packets or fewer.
    #[arg(short = 'I', long = "ignore-leq", default_value_t = 0)]
    ignore_short_flows: usize,
}

#[derive(Debug, Fail)]
enum FlowMinerError {
    #[fail(display = "specify exactly one of --pcap, --csv, --timeseries_csv")]
    NoInputSpecified,
    #[fail(display = "--timeseries_csv cannot be combined with --file, it is already a time series")]
    TimeseriesCsvWithFile,
    #[fail(display = "specify at least one of --file, --flows")]
    NoOutputSpecified,
}

/// Builds the feature-vector row for one emitted flow and writes it, if a
/// `--flows` sink was requested. The bias from [`SIZE_BIAS`] is applied
/// here, once, right before extraction.
fn mine_flow(flow: &EmittedFlow, flow_sink: &mut Option<FlowSink>) -> Result<(), Error> {
    let sink = match flow_sink {
        Some(sink) => sink,
        None => return Ok(()),
    };
    let biased_sizes: Vec<u64> = flow.sizes.iter().map(|s| s + SIZE_BIAS).collect();
    if let Some(fv) = features::extract(&biased_sizes, &flow.times) {
        sink.write(flow, &fv)?;
    }
    Ok(())
}

fn process_emitted(
    flow: &EmittedFlow,
    file_sink: &mut Option<TimeSeriesSink>,
    flow_sink: &mut Option<FlowSink>,
) -> Result<(), Error> {
    if let Some(sink) = file_sink {
        sink.write(flow)?;
    }
    mine_flow(flow, flow_sink)?;
    Ok(())
}

/// Wraps a bare time-series row (`--timeseries_csv` mode) in an
/// [`EmittedFlow`] so it can go through the same sinks as flows assembled
/// from packets. There is no per-direction split recorded in that input, so
/// every packet counts forward and `DIRECTIONS` is fixed at `1.0`.
fn synthetic_flow(row: packet::TimeSeriesRow) -> EmittedFlow {
    let packets = row.sizes.len() as u64;
    let bytes = row.sizes.iter().sum();
    EmittedFlow {
        src_ip: row.src_ip,
        src_port: row.src_port,
        dst_ip: row.dst_ip,
        dst_port: row.dst_port,
        sizes: row.sizes,
        times: row.times,
        packets,
        packets_rev: 0,
        bytes,
        bytes_rev: 0,
        directions: 1.0,
        first: false,
    }
}

fn run_packet_driver(
    packets: impl Iterator<Item = flow::FlowPacket>,
    head_strip: usize,
    ignore_short_flows: usize,
    mut file_sink: Option<TimeSeriesSink>,
    mut flow_sink: Option<FlowSink>,
) -> Result<(), Error> {
    let mut table = FlowTable::new(head_strip, ignore_short_flows);
    let started = Instant::now();
    let mut n_packets = 0u64;
    let mut n_flows = 0u64;
    for packet in packets {
        n_packets += 1;
        if n_packets % 100_000 == 0 {
            info!("processed {} packets, {} flows so far", n_packets, n_flows);
        }
        if let Some(flow) = table.ingest(&packet) {
            n_flows += 1;
            process_emitted(&flow, &mut file_sink, &mut flow_sink)?;
        }
    }
    for flow in table.drain() {
        n_flows += 1;
        process_emitted(&flow, &mut file_sink, &mut flow_sink)?;
    }
    if let Some(sink) = &mut file_sink {
        sink.flush()?;
    }
    if let Some(sink) = &mut flow_sink {
        sink.flush()?;
    }
    let elapsed = started.elapsed().as_secs_f64().max(f64::EPSILON);
    info!(
        "finished: {} packets, {} flows in {:.2}s ({:.0} packets/s, {:.0} flows/s)",
        n_packets,
        n_flows,
        elapsed,
        n_packets as f64 / elapsed,
        n_flows as f64 / elapsed
    );
    Ok(())
}

fn run() -> Result<(), Error> {
    drop(env_logger::init());
    let args = Args::parse();

    let input_count =
        args.pcap.is_some() as u8 + args.csv.is_some() as u8 + args.timeseries_csv.is_some() as u8;
    if input_count != 1 {
        return Err(FlowMinerError::NoInputSpecified.into());
    }
    if args.timeseries_csv.is_some() && args.file.is_some() {
        return Err(FlowMinerError::TimeseriesCsvWithFile.into());
    }
    if args.file.is_none() && args.flows.is_none() {
        return Err(FlowMinerError::NoOutputSpecified.into());
    }

    let file_sink = args.file.as_deref().map(TimeSeriesSink::create).transpose()?;
    let flow_sink = args.flows.as_deref().map(FlowSink::create).transpose()?;

    if let Some(path) = &args.pcap {
        info!("reading pcap capture from {:?}", path);
        run_packet_driver(
            packet::decode_pcap(path)?,
            args.head_strip,
            args.ignore_short_flows,
            file_sink,
            flow_sink,
        )?;
    } else if let Some(path) = &args.csv {
        info!("reading textual packet dump from {:?}", path);
        run_packet_driver(
            packet::decode_csv_file(path)?,
            args.head_strip,
            args.ignore_short_flows,
            file_sink,
            flow_sink,
        )?;
    } else if let Some(path) = &args.timeseries_csv {
        info!("reading pre-assembled time series from {:?}", path);
        let mut file_sink = file_sink;
        let mut flow_sink = flow_sink;
        let mut n_flows = 0u64;
        for row in packet::decode_timeseries_csv_file(path)? {
            n_flows += 1;
            process_emitted(&synthetic_flow(row), &mut file_sink, &mut flow_sink)?;
        }
        if let Some(sink) = &mut file_sink {
            sink.flush()?;
        }
        if let Some(sink) = &mut flow_sink {
            sink.flush()?;
        }
        info!("finished: {} flows", n_flows);
    }
    Ok(())
}

fn main() {
    if let Err(error) = run() {
        error!("Error: {:?}", error);
        exit(1);
    }
}
