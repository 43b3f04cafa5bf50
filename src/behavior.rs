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
//! Significant-spaces detection, transient detection, switching metric, and
//! clear-periodicity detection.
use std::collections::HashMap;

fn mean(data: &[f64]) -> f64 {
    data.iter().sum::<f64>() / data.len() as f64
}

fn population_stdev(data: &[f64], m: f64) -> f64 {
    (data.iter().map(|d| (d - m).powi(2)).sum::<f64>() / data.len() as f64).sqrt()
}

fn mean_detection(flow_times: &[f64], spaces: &[f64], sig_level: i32, results_mean: f64) -> (Vec<f64>, Vec<f64>) {
    let mut times = Vec::new();
    let mut sp = Vec::new();
    for i in 0..spaces.len() {
        if spaces[i] > results_mean * (1.0 + sig_level as f64) {
            times.push(flow_times[i]);
            sp.push(spaces[i]);
        }
    }
    (times, sp)
}

fn stdev_detection(flow_times: &[f64], spaces: &[f64], sig_level: i32, stdev: f64) -> Vec<f64> {
    let mut times = Vec::new();
    for i in 0..spaces.len() {
        if spaces[i] > stdev * (1.0 + sig_level as f64) {
            times.push(flow_times[i]);
        }
    }
    times
}

/// Adaptive-significance-level iterative gap detection.
/// Returns the surviving timestamps; `SIG_SPACES` is true iff non-empty.
pub fn significant_spaces(times: &[f64]) -> Vec<f64> {
    let n = times.len();
    if n <= 1 {
        return Vec::new();
    }
    let all_spaces: Vec<f64> = times.windows(2).map(|w| (w[1] - w[0]).abs()).collect();
    if all_spaces.is_empty() {
        return Vec::new();
    }
    let max_space = all_spaces.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max_space == 0.0 {
        return Vec::new();
    }
    let results_mean = mean(&all_spaces);
    if max_space / results_mean < 10.0 {
        return Vec::new();
    }
    let stdev = population_stdev(&all_spaces, results_mean);

    let mut sig_level: i32 = if results_mean < 0.1 {
        100
    } else if results_mean < 0.5 {
        30
    } else if results_mean < 0.75 {
        10
    } else if results_mean < 1.0 {
        5
    } else {
        1
    };

    let mut sig_times = times.to_vec();
    let mut sig_spaces = all_spaces;
    let space_min_length = 0.05;
    while sig_times.len() as f64 / n as f64 > space_min_length {
        let (m_times, m_spaces) = mean_detection(&sig_times, &sig_spaces, sig_level, results_mean);
        let s_times = stdev_detection(&sig_times, &sig_spaces, sig_level, stdev);
        let mut next_times = Vec::new();
        let mut next_spaces = Vec::new();
        for i in 0..m_times.len() {
            if s_times.contains(&m_times[i]) {
                next_times.push(m_times[i]);
                next_spaces.push(m_spaces[i]);
            }
        }
        sig_times = next_times;
        sig_spaces = next_spaces;
        sig_level += 1;
        if sig_times.is_empty() {
            break;
        }
    }
    sig_times
}

/// Sliding 0.2s-window transient detection with a 5-test cascade. Returns
/// true/false once resolved.
pub fn has_transient(data: &[u64], times: &[f64], mean_all: f64, sig_spaces: &[f64]) -> bool {
    const TIME_THRESHOLD: f64 = 0.2;
    const MEAN_THRESHOLD: f64 = 0.15;
    const NUMBER_THRESHOLD: usize = 3;
    const FALSE_TRANSIENT_THRESHOLD: u32 = 5;

    let n = data.len();
    let mut start: Option<f64> = None;
    let mut transient: Vec<u64> = Vec::new();
    let mut false_transients = 0u32;

    let evaluate = |transient: &[u64]| -> Option<bool> {
        if transient.len() <= NUMBER_THRESHOLD {
            return None;
        }
        let tmax = *transient.iter().max().unwrap();
        let tmin = *transient.iter().min().unwrap();
        let tmean = transient.iter().sum::<u64>() as f64 / transient.len() as f64;
        let mut spaces_threshold = (n as f64 / transient.len() as f64) - 1.0;
        if spaces_threshold < 1.0 {
            spaces_threshold = 1.0;
        }
        if (tmax as f64 - tmin as f64 - 1.0) < tmean {
            Some(false)
        } else if tmean > mean_all * (1.0 + MEAN_THRESHOLD) {
            Some(true)
        } else if (n as f64) * 0.9 < transient.len() as f64 {
            Some(true)
        } else if sig_spaces.len() as f64 > spaces_threshold {
            Some(true)
        } else {
            Some(false)
        }
    };

    for (d, t) in data.iter().zip(times) {
        if start.is_none() {
            start = Some(*t);
        }
        if t - start.unwrap() < TIME_THRESHOLD {
            transient.push(*d);
        } else {
            match evaluate(&transient) {
                Some(true) => return true,
                Some(false) | None => false_transients += 1,
            }
            if false_transients >= FALSE_TRANSIENT_THRESHOLD {
                return false;
            }
            transient = vec![*d];
            start = Some(*t);
        }
    }
    if transient.len() > 3 {
        matches!(evaluate(&transient), Some(true))
    } else {
        false
    }
}

/// Switching metric: fraction of adjacent differing pairs over the max
/// possible switches.
pub fn switching_metric(data: &[u64]) -> f64 {
    let mut cnt = 0u64;
    let mut prev: Option<u64> = None;
    for d in data {
        match prev {
            None => prev = Some(*d),
            Some(p) if p != *d => {
                cnt += 1;
                prev = Some(*d);
            }
            _ => {}
        }
    }
    let max_possible = (data.len() as f64 - 1.0) / 2.0;
    if max_possible == 0.0 {
        0.0
    } else {
        cnt as f64 / max_possible
    }
}

pub struct Periodicity {
    pub periodicity: bool,
    pub val: u64,
    pub time: f64,
}

/// Clear periodicity: dominant histogram value + dominant delta between its
/// occurrences. Buckets are visited in first-occurrence
/// order (a plain `HashMap` does not preserve insertion order, so counts
/// are tracked separately from that order).
pub fn clear_periodicity(data: &[u64], times: &[f64]) -> Periodicity {
    const THRESHOLD: f64 = 0.95;
    const NUMBER_THRESHOLD: usize = 3;
    if data.len() < NUMBER_THRESHOLD {
        return Periodicity {
            periodicity: false,
            val: 0,
            time: 0.0,
        };
    }
    let mut order: Vec<u64> = Vec::new();
    let mut counts: HashMap<u64, usize> = HashMap::new();
    for d in data {
        if !counts.contains_key(d) {
            order.push(*d);
        }
        *counts.entry(*d).or_insert(0) += 1;
    }
    let mut sum_prob = 0.0;
    let mut dominant_value: Option<u64> = None;
    for value in &order {
        let count = counts[value];
        let prob = count as f64 / data.len() as f64;
        if prob >= THRESHOLD {
            dominant_value = Some(*value);
            break;
        }
        sum_prob += prob;
        if 1.0 - sum_prob < THRESHOLD {
            return Periodicity {
                periodicity: false,
                val: 0,
                time: 0.0,
            };
        }
    }
    let mut per_times: HashMap<ordered_float_bits, usize> = HashMap::new();
    let mut before_time: Option<f64> = None;
    if let Some(v) = dominant_value {
        for (d, t) in data.iter().zip(times) {
            if *d == v {
                match before_time {
                    None => before_time = Some(*t),
                    Some(bt) => {
                        let delta = t - bt;
                        *per_times.entry(delta.to_bits()).or_insert(0) += 1;
                    }
                }
            }
        }
    }
    let mut per_time: Option<f64> = None;
    let mut per_time_count = 0usize;
    for (bits, count) in &per_times {
        if per_time.is_none() || count > &per_time_count {
            per_time = Some(f64::from_bits(*bits));
            per_time_count = *count;
        }
    }
    Periodicity {
        periodicity: true,
        val: dominant_value.unwrap_or(0),
        time: per_time.unwrap_or(0.0),
    }
}

// marker type alias to document the HashMap key is a f64 bit-pattern, not a
// float compared by value
#[allow(non_camel_case_types)]
type ordered_float_bits = u64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_switching_metric_alternating() {
        let data: Vec<u64> = (0..10).map(|i| if i % 2 == 0 { 160 } else { 260 }).collect();
        assert_eq!(switching_metric(&data), 9.0 / 4.5);
    }

    #[test]
    fn test_switching_metric_constant() {
        let data = vec![160u64; 10];
        assert_eq!(switching_metric(&data), 0.0);
    }

    #[test]
    fn test_clear_periodicity_single_packet() {
        let data = vec![160u64];
        let times = vec![0.0];
        let p = clear_periodicity(&data, &times);
        assert!(!p.periodicity);
    }

    #[test]
    fn test_clear_periodicity_constant_sequence() {
        let data = vec![160u64; 10];
        let times: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let p = clear_periodicity(&data, &times);
        assert!(p.periodicity);
        assert_eq!(p.val, 160);
        assert_eq!(p.time, 1.0);
    }

    #[test]
    fn test_significant_spaces_empty_for_uniform() {
        let times: Vec<f64> = (0..10).map(|i| i as f64).collect();
        assert!(significant_spaces(&times).is_empty());
    }
}
