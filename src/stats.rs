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
//! Basic statistics, skewness family, and kurtosis over a flow's (biased)
//! packet-size sequence.
use std::collections::HashMap;

pub struct BasicStats {
    pub mean: f64,
    pub median: f64,
    pub stdev: f64,
    pub var: f64,
    pub burstiness: f64,
    pub mode: u64,
    pub q1: f64,
    pub q3: f64,
    pub min: u64,
    pub max: u64,
    pub min_minus_max: i64,
    pub coefficient_of_variation: f64,
    pub average_dispersion: f64,
    pub percent_deviation: f64,
    pub root_mean_square: f64,
    pub percent_below_mean: f64,
    pub percent_above_mean: f64,
}

fn mean(data: &[u64]) -> f64 {
    data.iter().sum::<u64>() as f64 / data.len() as f64
}

fn sample_stdev(data: &[u64], m: f64) -> f64 {
    let n = data.len() as f64;
    let sum_sq: f64 = data.iter().map(|d| (*d as f64 - m).powi(2)).sum();
    (sum_sq / (n - 1.0)).sqrt()
}

fn percentile(sorted: &[u64], pct: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0] as f64;
    }
    let rank = pct / 100.0 * (n as f64 - 1.0);
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo] as f64
    } else {
        let frac = rank - lo as f64;
        sorted[lo] as f64 + frac * (sorted[hi] as f64 - sorted[lo] as f64)
    }
}

/// Computes the basic statistics family.
pub fn basic_stats(data: &[u64]) -> BasicStats {
    let n = data.len();
    let m = mean(data);
    let mut sorted = data.to_vec();
    sorted.sort_unstable();
    let median = if n % 2 == 1 {
        sorted[n / 2] as f64
    } else {
        (sorted[n / 2 - 1] as f64 + sorted[n / 2] as f64) / 2.0
    };
    let stdev = if n == 1 {
        data[0] as f64
    } else if n == 0 {
        0.0
    } else {
        let s = sample_stdev(data, m);
        if s.is_finite() {
            s
        } else {
            sample_stdev(&data[..data.len().min(1000)], m)
        }
    };
    let var = if n < 2 {
        0.0
    } else {
        let sum_sq: f64 = data.iter().map(|d| (*d as f64 - m).powi(2)).sum();
        sum_sq / (n as f64 - 1.0)
    };
    let burstiness = (stdev - m) / (stdev + m);
    let mut counts: HashMap<u64, usize> = HashMap::new();
    for d in data {
        *counts.entry(*d).or_insert(0) += 1;
    }
    let mode = mode_of(data, &counts);
    let q1 = percentile(&sorted, 25.0);
    let q3 = percentile(&sorted, 75.0);
    let min = *sorted.first().unwrap_or(&0);
    let max = *sorted.last().unwrap_or(&0);
    let coefficient_of_variation = if m == 0.0 { 0.0 } else { (stdev / m) * 100.0 };
    let average_dispersion = data.iter().map(|d| (*d as f64 - m).abs()).sum::<f64>() / n as f64;
    let percent_deviation = if m == 0.0 {
        0.0
    } else {
        (average_dispersion / m) * 100.0
    };
    let root_mean_square = if n == 0 {
        0.0
    } else {
        (data.iter().map(|d| (*d as f64).powi(2)).sum::<f64>() / n as f64).sqrt()
    };
    let percent_below_mean = data.iter().filter(|d| (**d as f64) < m).count() as f64 / n as f64;
    let percent_above_mean = data.iter().filter(|d| (**d as f64) > m).count() as f64 / n as f64;
    BasicStats {
        mean: m,
        median,
        stdev,
        var,
        burstiness,
        mode,
        q1,
        q3,
        min,
        max,
        min_minus_max: max as i64 - min as i64,
        coefficient_of_variation,
        average_dispersion,
        percent_deviation,
        root_mean_square,
        percent_below_mean,
        percent_above_mean,
    }
}

/// Mode as arg-max of a non-negative-integer bincount: ties break toward the
/// smallest value (mirrors `np.bincount(data).argmax()`).
fn mode_of(data: &[u64], counts: &HashMap<u64, usize>) -> u64 {
    if data.is_empty() {
        return 0;
    }
    let max_value = *data.iter().max().unwrap();
    let mut best_value = 0u64;
    let mut best_count = 0usize;
    for value in 0..=max_value {
        let count = counts.get(&value).copied().unwrap_or(0);
        if count > best_count {
            best_count = count;
            best_value = value;
        }
    }
    best_value
}

pub struct SkewnessFamily {
    pub pearson_sk1: f64,
    pub pearson_sk2: f64,
    pub fisher_mi_3: f64,
    pub fisher_pearson_g1: f64,
    pub fisher_pearson_g1_adjusted: f64,
    pub galton: f64,
}

/// Skewness family. All zero when `STDEV=0`.
pub fn skewness(data: &[u64], basic: &BasicStats) -> SkewnessFamily {
    if basic.stdev == 0.0 {
        return SkewnessFamily {
            pearson_sk1: 0.0,
            pearson_sk2: 0.0,
            fisher_mi_3: 0.0,
            fisher_pearson_g1: 0.0,
            fisher_pearson_g1_adjusted: 0.0,
            galton: 0.0,
        };
    }
    let n = data.len() as f64;
    let pearson_sk1 = (basic.mean - basic.mode as f64) / basic.stdev;
    let pearson_sk2 = (3.0 * basic.mean - basic.median) / basic.stdev;

    let mut counts: HashMap<u64, usize> = HashMap::new();
    for d in data {
        *counts.entry(*d).or_insert(0) += 1;
    }
    let mut ex = 0.0;
    for (value, count) in &counts {
        ex += (*value as f64).powi(3) * (*count as f64) / n;
    }
    let fisher_mi_3 =
        (ex - 3.0 * basic.mean * basic.stdev.powi(2) - basic.mean.powi(3)) / basic.stdev.powi(3);

    let sum_g1: f64 = data.iter().map(|d| (*d as f64 - basic.mean).powi(3) / n).sum();
    let fisher_pearson_g1 = sum_g1 / basic.stdev.powi(3);

    let fisher_pearson_g1_adjusted = if n - 2.0 == 0.0 {
        0.0
    } else {
        let sum_g1_1: f64 = data
            .iter()
            .map(|d| (*d as f64 - basic.mean).powi(3) / ((n - 1.0) * (n - 2.0)))
            .sum();
        5.0 / (n * basic.stdev) * sum_g1_1
            - ((3.0 * (n - 1.0)) / (n - 2.0)) * (n * basic.stdev.powi(2)).powf(1.5)
    };

    let galton = if basic.q3 - basic.q1 == 0.0 {
        0.0
    } else {
        (basic.q1 + basic.q3 - 2.0 * basic.mean) / (basic.q3 - basic.q1)
    };

    SkewnessFamily {
        pearson_sk1,
        pearson_sk2,
        fisher_mi_3,
        fisher_pearson_g1,
        fisher_pearson_g1_adjusted,
        galton,
    }
}

/// Kurtosis.
pub fn kurtosis(data: &[u64], basic: &BasicStats) -> f64 {
    let numerator: f64 = data.iter().map(|d| (*d as f64 - basic.mean).powi(4)).sum();
    let denominator = data.len() as f64 * basic.stdev.powi(4);
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_packet() {
        let data = vec![160u64];
        let basic = basic_stats(&data);
        assert_eq!(basic.mean, 160.0);
        assert_eq!(basic.stdev, 160.0);
        assert_eq!(basic.var, 0.0);
        assert_eq!(basic.burstiness, 0.0);
        assert_eq!(basic.min, 160);
        assert_eq!(basic.max, 160);
    }

    #[test]
    fn test_constant_sequence_zero_skew_and_kurtosis() {
        let data = vec![160u64; 10];
        let basic = basic_stats(&data);
        assert_eq!(basic.stdev, 0.0);
        let skew = skewness(&data, &basic);
        assert_eq!(skew.pearson_sk1, 0.0);
        assert_eq!(skew.fisher_pearson_g1_adjusted, 0.0);
        assert_eq!(kurtosis(&data, &basic), 0.0);
    }

    #[test]
    fn test_mode_tie_break_smallest_index() {
        // Strictly alternating [100,200,...] biased +60 => [160,260,...]
        let data: Vec<u64> = (0..10)
            .map(|i| if i % 2 == 0 { 160 } else { 260 })
            .collect();
        let basic = basic_stats(&data);
        assert_eq!(basic.mode, 160);
    }
}
