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
//! Packet source adapters: decodes one of the three input formats into
//! [`crate::flow::FlowPacket`] records (or, for the pre-assembled
//! time-series input, directly into per-flow sequences).
use failure::Error;
use pnet_packet::ethernet::{EtherTypes, EthernetPacket};
use pnet_packet::ip::IpNextHeaderProtocols;
use pnet_packet::ipv4::Ipv4Packet;
use pnet_packet::ipv6::Ipv6Packet;
use pnet_packet::tcp::TcpPacket;
use pnet_packet::FromPacket;

use std::io::{BufRead, BufReader};
use std::fs::File;
use std::net::IpAddr;
use std::path::Path;

use crate::flow::FlowPacket;
use crate::pcap::{PcapReader2, PcapRecord};

#[derive(Debug, Fail)]
pub enum ParsePacketError {
    #[fail(display = "Failed to parse ethernet header")]
    InvalidEthernetHeader,
    #[fail(display = "Failed to parse IPV4 header")]
    InvalidIpv4Header,
    #[fail(display = "Failed to parse IPV6 header")]
    InvalidIpv6Header,
    #[fail(display = "Unsupported ethertype")]
    InvalidInternetLayer,
    #[fail(display = "Failed to parse TCP header")]
    InvalidTcpHeader,
    #[fail(display = "Packet is not TCP")]
    NotTcp,
}

/// Decodes one Ethernet/IP/TCP record into a [`FlowPacket`]. Only TCP is
/// kept in `--pcap` mode; every other transport protocol is
/// a per-packet parse failure, counted and skipped by the caller.
fn decode_ethernet_record(record: PcapRecord, is_nanosecond_res: bool) -> Result<FlowPacket, ParsePacketError> {
    let t_seconds = record.header.get_time_as_secs(is_nanosecond_res);
    let length = record.header.orig_len();

    let ethernet_header = match EthernetPacket::owned(record.data) {
        Some(ethernet_header) => ethernet_header.from_packet(),
        None => return Err(ParsePacketError::InvalidEthernetHeader),
    };
    let (src_ip, dst_ip, payload, trans_protocol) = match ethernet_header.ethertype {
        EtherTypes::Ipv4 => match Ipv4Packet::owned(ethernet_header.payload) {
            Some(ipv4_header) => {
                let ipv4_header = ipv4_header.from_packet();
                (
                    IpAddr::V4(ipv4_header.source),
                    IpAddr::V4(ipv4_header.destination),
                    ipv4_header.payload,
                    ipv4_header.next_level_protocol,
                )
            }
            None => return Err(ParsePacketError::InvalidIpv4Header),
        },
        EtherTypes::Ipv6 => match Ipv6Packet::owned(ethernet_header.payload) {
            Some(ipv6_header) => {
                let ipv6_header = ipv6_header.from_packet();
                (
                    IpAddr::V6(ipv6_header.source),
                    IpAddr::V6(ipv6_header.destination),
                    ipv6_header.payload,
                    ipv6_header.next_header,
                )
            }
            None => return Err(ParsePacketError::InvalidIpv6Header),
        },
        _ => return Err(ParsePacketError::InvalidInternetLayer),
    };
    if trans_protocol != IpNextHeaderProtocols::Tcp {
        return Err(ParsePacketError::NotTcp);
    }
    let tcp_header = match TcpPacket::owned(payload) {
        Some(tcp_header) => tcp_header.from_packet(),
        None => return Err(ParsePacketError::InvalidTcpHeader),
    };
    Ok(FlowPacket {
        src_ip: src_ip.to_string(),
        src_port: tcp_header.source,
        dst_ip: dst_ip.to_string(),
        dst_port: tcp_header.destination,
        length,
        t_seconds,
    })
}

/// Opens a pcap file and yields decoded TCP packets, timestamped in
/// seconds. Per-packet parse failures (non-TCP, malformed headers) are
/// skipped and logged, never fatal.
pub fn decode_pcap(path: &Path) -> Result<impl Iterator<Item = FlowPacket>, Error> {
    let reader = PcapReader2::open(path)?;
    let is_nanosecond_res = reader.is_nanosecond_res;
    Ok(reader.filter_map(move |record| match decode_ethernet_record(record, is_nanosecond_res) {
        Ok(packet) => Some(packet),
        Err(ParsePacketError::NotTcp) => None,
        Err(e) => {
            log::debug!("skipping unparseable packet: {}", e);
            None
        }
    }))
}

/// Splits a `"addr.port"` (optionally `:`-suffixed) token into its address
/// and port parts, matching the textual-dump row layout.
fn split_addr_port(token: &str) -> Option<(String, u16)> {
    let token = token.trim_end_matches(':');
    let dot = token.rfind('.')?;
    let port: u16 = token[dot + 1..].parse().ok()?;
    Some((token[..dot].to_string(), port))
}

/// Decodes one space-delimited tcpdump-style row into a [`FlowPacket`].
/// Both TCP and UDP rows are kept (unlike `--pcap` mode).
/// Returns `None` for rows with fewer than 6 tokens, unrecognized protocol
/// markers, or malformed numeric fields.
pub fn decode_csv_row(row: &str, t_seconds: f64) -> Option<FlowPacket> {
    let tokens: Vec<&str> = row.split_whitespace().collect();
    if tokens.len() < 6 {
        return None;
    }
    let length: u64 = if tokens[5] == "tcp" {
        tokens.get(6)?.parse().ok()?
    } else if tokens[5] == "UDP," {
        tokens.get(7)?.parse().ok()?
    } else {
        return None;
    };
    let (src_ip, src_port) = split_addr_port(tokens[2])?;
    let (dst_ip, dst_port) = split_addr_port(tokens[4])?;
    Some(FlowPacket {
        src_ip,
        src_port,
        dst_ip,
        dst_port,
        length,
        t_seconds,
    })
}

/// Parses the leading timestamp token and dispatches to [`decode_csv_row`].
pub fn decode_csv_line(line: &str) -> Option<FlowPacket> {
    let t_seconds: f64 = line.split_whitespace().next()?.parse().ok()?;
    decode_csv_row(line, t_seconds)
}

/// Opens a textual tcpdump-style dump and yields decoded packets.
pub fn decode_csv_file(path: &Path) -> Result<impl Iterator<Item = FlowPacket>, Error> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    Ok(reader.lines().filter_map(|line| decode_csv_row_owned(line.ok()?)))
}

fn decode_csv_row_owned(line: String) -> Option<FlowPacket> {
    decode_csv_line(&line)
}

/// A single row of a pre-assembled per-flow time-series CSV: the flow
/// engine is bypassed entirely and this is handed straight to feature
/// extraction.
pub struct TimeSeriesRow {
    pub src_ip: String,
    pub src_port: u16,
    pub dst_ip: String,
    pub dst_port: u16,
    pub sizes: Vec<u64>,
    pub times: Vec<f64>,
}

/// Decodes one `;`-delimited row (`SRC_IP;SRC_PORT;DST_IP;DST_PORT;bytes;time`,
/// `bytes`/`time` as JSON arrays). Returns `None` for the header row or any
/// malformed row.
pub fn decode_timeseries_csv_row(record: &csv::StringRecord) -> Option<TimeSeriesRow> {
    if record.get(0) == Some("SRC_IP") {
        return None;
    }
    let src_ip = record.get(0)?.to_string();
    let src_port: u16 = record.get(1)?.parse().ok()?;
    let dst_ip = record.get(2)?.to_string();
    let dst_port: u16 = record.get(3)?.parse().ok()?;
    let sizes: Vec<u64> = serde_json::from_str(record.get(4)?).ok()?;
    let times: Vec<f64> = serde_json::from_str(record.get(5)?).ok()?;
    Some(TimeSeriesRow {
        src_ip,
        src_port,
        dst_ip,
        dst_port,
        sizes,
        times,
    })
}

/// Opens a pre-assembled per-flow time-series CSV and yields its rows.
pub fn decode_timeseries_csv_file(path: &Path) -> Result<impl Iterator<Item = TimeSeriesRow>, Error> {
    let reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .from_path(path)?;
    Ok(reader.into_records().filter_map(|record| decode_timeseries_csv_row(&record.ok()?)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_csv_row_tcp() {
        let row = "1662638393.520198 IP 192.168.1.104.8085 > 192.168.1.245.45820: tcp 78";
        let packet = decode_csv_line(row).unwrap();
        assert_eq!(packet.src_ip, "192.168.1.104");
        assert_eq!(packet.src_port, 8085);
        assert_eq!(packet.dst_ip, "192.168.1.245");
        assert_eq!(packet.dst_port, 45820);
        assert_eq!(packet.length, 78);
        assert_eq!(packet.t_seconds, 1662638393.520198);
    }

    #[test]
    fn test_decode_csv_row_udp() {
        let row = "100.0 IP 10.0.0.1.53 > 10.0.0.2.9999 UDP, length 512";
        let packet = decode_csv_line(row).unwrap();
        assert_eq!(packet.src_port, 53);
        assert_eq!(packet.dst_port, 9999);
        assert_eq!(packet.length, 512);
    }

    #[test]
    fn test_decode_csv_row_rejects_short_and_unknown() {
        assert!(decode_csv_line("1.0 IP a.1 > b.2").is_none());
        assert!(decode_csv_line("1.0 IP a.1.1 > b.2 ICMP 64").is_none());
    }

    #[test]
    fn test_decode_timeseries_csv_row_skips_header() {
        let record = csv::StringRecord::from(vec!["SRC_IP", "SRC_PORT", "DST_IP", "DST_PORT", "bytes", "time"]);
        assert!(decode_timeseries_csv_row(&record).is_none());
    }

    #[test]
    fn test_decode_timeseries_csv_row_parses_json_arrays() {
        let record = csv::StringRecord::from(vec!["10.0.0.1", "1", "10.0.0.2", "2", "[100, 200]", "[0.0, 1.5]"]);
        let row = decode_timeseries_csv_row(&record).unwrap();
        assert_eq!(row.sizes, vec![100, 200]);
        assert_eq!(row.times, vec![0.0, 1.5]);
    }
}
