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
use std::collections::HashMap;

/// Active-timeout: maximum allowed span between a flow's first and current packet.
pub const ACTIVE_TIMEOUT: f64 = 300.0;
/// Inactive-timeout: maximum allowed span between two consecutive packets of a flow.
pub const INACTIVE_TIMEOUT: f64 = 65.0;

/// A decoded packet record, source-independent
#[derive(Debug, Clone)]
pub struct FlowPacket {
    pub src_ip: String,
    pub src_port: u16,
    pub dst_ip: String,
    pub dst_port: u16,
    pub length: u64,
    pub t_seconds: f64,
}

/// Per-flow buffers and direction counters, emitted as one row when the
/// timeout/eviction controller fires
pub struct EmittedFlow {
    pub src_ip: String,
    pub src_port: u16,
    pub dst_ip: String,
    pub dst_port: u16,
    pub sizes: Vec<u64>,
    pub times: Vec<f64>,
    pub packets: u64,
    pub packets_rev: u64,
    pub bytes: u64,
    pub bytes_rev: u64,
    pub directions: f64,
    pub first: bool,
}

struct FlowState {
    sizes: Vec<u64>,
    times: Vec<f64>,
    direction_0: u64,
    direction_1: u64,
    packets: u64,
    packets_rev: u64,
    bytes: u64,
    bytes_rev: u64,
    first: bool,
}

impl FlowState {
    fn new(length: u64, t: f64) -> Self {
        FlowState {
            sizes: vec![length],
            times: vec![t],
            direction_0: 0,
            direction_1: 1,
            packets: 1,
            packets_rev: 0,
            bytes: length,
            bytes_rev: 0,
            first: true,
        }
    }

    fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    /// Checked before appending the current packet's timestamp
    fn needs_emission(&self, t: f64) -> bool {
        if self.times.is_empty() {
            return false;
        }
        self.times[0] + ACTIVE_TIMEOUT < t || t - self.times[self.times.len() - 1] >= INACTIVE_TIMEOUT
    }

    fn reset(&mut self) {
        self.sizes.clear();
        self.times.clear();
        self.direction_0 = 0;
        self.direction_1 = 0;
        self.packets = 0;
        self.packets_rev = 0;
        self.bytes = 0;
        self.bytes_rev = 0;
        self.first = false;
    }

    fn append(&mut self, length: u64, t: f64, forward: bool) {
        self.sizes.push(length);
        self.times.push(t);
        if forward {
            self.direction_1 += 1;
            self.packets += 1;
            self.bytes += length;
        } else {
            self.direction_0 += 1;
            self.packets_rev += 1;
            self.bytes_rev += length;
        }
    }
}

/// Canonical flow key resolution: first-seen orientation of the address pair
/// wins, port pair is matched in either order. Returns the key used to index
/// the flow table plus whether this packet travels in the forward direction
/// relative to that key's established orientation.
fn canonicalize<'a>(
    flows: &HashMap<String, HashMap<String, FlowState>>,
    src_ip: &str,
    src_port: u16,
    dst_ip: &str,
    dst_port: u16,
) -> (String, String, bool) {
    let fwd_dev = format!("{}-{}", src_ip, dst_ip);
    let rev_dev = format!("{}-{}", dst_ip, src_ip);
    let (dev, forward) = if flows.contains_key(&fwd_dev) {
        (fwd_dev, true)
    } else if flows.contains_key(&rev_dev) {
        (rev_dev, false)
    } else {
        (fwd_dev, true)
    };
    let fwd_ports = format!("{}-{}", src_port, dst_port);
    let rev_ports = format!("{}-{}", dst_port, src_port);
    let ports = match flows.get(&dev) {
        Some(port_map) => {
            if port_map.contains_key(&fwd_ports) {
                fwd_ports
            } else if port_map.contains_key(&rev_ports) {
                rev_ports
            } else {
                fwd_ports
            }
        }
        None => fwd_ports,
    };
    (dev, ports, forward)
}

/// Mapping from canonicalized flow key to flow-state record, plus the
/// timeout/eviction controller that decides when to emit
pub struct FlowTable {
    flows: HashMap<String, HashMap<String, FlowState>>,
    strip: usize,
    ignore_leq: usize,
}

impl FlowTable {
    pub fn new(strip: usize, ignore_leq: usize) -> Self {
        FlowTable {
            flows: HashMap::new(),
            strip,
            ignore_leq,
        }
    }

    /// Ingests one packet. Returns an emitted flow if the timeout controller
    /// fired on this packet's arrival (and the flow survives the `-I` filter).
    pub fn ingest(&mut self, packet: &FlowPacket) -> Option<EmittedFlow> {
        let (dev, ports, forward) = canonicalize(
            &self.flows,
            &packet.src_ip,
            packet.src_port,
            &packet.dst_ip,
            packet.dst_port,
        );
        let port_map = self.flows.entry(dev.clone()).or_default();
        let mut emitted = None;
        let is_new = !port_map.contains_key(&ports);
        if !is_new {
            let state = port_map.get_mut(&ports).unwrap();
            if !state.is_empty() && state.needs_emission(packet.t_seconds) {
                emitted = emit(state, self.ignore_leq, self.strip, &dev, &ports);
            }
            state.append(packet.length, packet.t_seconds, forward);
        } else {
            port_map.insert(ports, FlowState::new(packet.length, packet.t_seconds));
        }
        emitted
    }

    /// Flushes every non-empty flow remaining in the table, e.g. at end-of-input
    pub fn drain(&mut self) -> Vec<EmittedFlow> {
        let mut out = Vec::new();
        for (dev, port_map) in self.flows.iter_mut() {
            for (ports, state) in port_map.iter_mut() {
                if state.is_empty() {
                    continue;
                }
                if let Some(flow) = emit(state, self.ignore_leq, self.strip, dev, ports) {
                    out.push(flow);
                }
            }
        }
        out
    }
}

/// Shared emission logic for both the per-packet timeout check and the
/// terminal drain: applies `-I`/`-H`, clears the buffers, and builds the
/// emitted-row record.
fn emit(
    state: &mut FlowState,
    ignore_leq: usize,
    strip: usize,
    dev: &str,
    ports: &str,
) -> Option<EmittedFlow> {
    let skip = state.sizes.len() <= ignore_leq;
    let head = if state.first { strip } else { 0 };
    let (sizes, times) = if skip {
        (Vec::new(), Vec::new())
    } else {
        (
            state.sizes.get(head..).unwrap_or(&[]).to_vec(),
            state.times.get(head..).unwrap_or(&[]).to_vec(),
        )
    };
    let directions = if state.direction_0 + state.direction_1 == 0 {
        0.0
    } else {
        state.direction_1 as f64 / (state.direction_0 + state.direction_1) as f64
    };
    let result = if skip || sizes.is_empty() {
        None
    } else {
        let mut parts = dev.splitn(2, '-');
        let src_ip = parts.next().unwrap_or_default().to_string();
        let dst_ip = parts.next().unwrap_or_default().to_string();
        let mut port_parts = ports.splitn(2, '-');
        let src_port: u16 = port_parts.next().unwrap_or_default().parse().unwrap_or(0);
        let dst_port: u16 = port_parts.next().unwrap_or_default().parse().unwrap_or(0);
        Some(EmittedFlow {
            src_ip,
            src_port,
            dst_ip,
            dst_port,
            sizes,
            times,
            packets: state.packets,
            packets_rev: state.packets_rev,
            bytes: state.bytes,
            bytes_rev: state.bytes_rev,
            directions,
            first: state.first,
        })
    };
    state.reset();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pkt(src_ip: &str, src_port: u16, dst_ip: &str, dst_port: u16, length: u64, t: f64) -> FlowPacket {
        FlowPacket {
            src_ip: src_ip.to_string(),
            src_port,
            dst_ip: dst_ip.to_string(),
            dst_port,
            length,
            t_seconds: t,
        }
    }

    #[test]
    fn test_active_timeout_boundary() {
        let mut table = FlowTable::new(0, 0);
        assert!(table.ingest(&pkt("a", 1, "b", 2, 100, 0.0)).is_none());
        let emitted = table.ingest(&pkt("a", 1, "b", 2, 100, 301.0));
        assert!(emitted.is_some());
        let flow = emitted.unwrap();
        assert_eq!(flow.sizes, vec![100]);
    }

    #[test]
    fn test_inactive_timeout_boundary() {
        let mut table = FlowTable::new(0, 0);
        assert!(table.ingest(&pkt("a", 1, "b", 2, 100, 0.0)).is_none());
        assert!(table.ingest(&pkt("a", 1, "b", 2, 100, 64.0)).is_none());
        let emitted = table.ingest(&pkt("a", 1, "b", 2, 100, 130.0));
        assert!(emitted.is_some());
        assert_eq!(emitted.unwrap().sizes, vec![100, 100]);
    }

    #[test]
    fn test_reverse_orientation_shares_state() {
        let mut table = FlowTable::new(0, 0);
        table.ingest(&pkt("a", 1, "b", 2, 50, 0.0));
        let emitted = table.ingest(&pkt("b", 2, "a", 1, 60, 1.0));
        assert!(emitted.is_none());
        let drained = table.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].packets, 1);
        assert_eq!(drained[0].packets_rev, 1);
    }

    #[test]
    fn test_ignore_leq_filters_short_flow_but_clears_buffer() {
        let mut table = FlowTable::new(0, 1);
        table.ingest(&pkt("a", 1, "b", 2, 10, 0.0));
        let emitted = table.ingest(&pkt("a", 1, "b", 2, 10, 301.0));
        assert!(emitted.is_none());
    }

    #[test]
    fn test_head_strip_applies_only_to_first_emission() {
        let mut table = FlowTable::new(2, 0);
        for t in 0..5 {
            table.ingest(&pkt("a", 1, "b", 2, 10, t as f64));
        }
        let emitted = table.ingest(&pkt("a", 1, "b", 2, 10, 301.0)).unwrap();
        assert_eq!(emitted.sizes.len(), 3);
        assert!(emitted.first);
    }
}
