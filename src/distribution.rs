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
//! Hurst exponent, Benford's law, value-distribution area, and the
//! 60-second bucket aggregation features.
use std::collections::HashMap;
use std::f64::consts::PI;

/// Lanczos approximation of the Gamma function, used by the Hurst exponent's
/// small-n expected-R/S correction (no gamma-function crate is in the
/// dependency stack, and this is core specified numeric content).
fn gamma(x: f64) -> f64 {
    const G: f64 = 7.0;
    const COEFFICIENTS: [f64; 9] = [
        0.999_999_999_999_809_9,
        676.520_368_121_885_1,
        -1259.139_216_722_402_8,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];
    if x < 0.5 {
        PI / ((PI * x).sin() * gamma(1.0 - x))
    } else {
        let x = x - 1.0;
        let mut a = COEFFICIENTS[0];
        let t = x + G + 0.5;
        for (i, c) in COEFFICIENTS.iter().enumerate().skip(1) {
            a += c / (x + i as f64);
        }
        (2.0 * PI).sqrt() * t.powf(x + 0.5) * (-t).exp() * a
    }
}

/// Partitions `data` into `floor(N/k)`-length contiguous sub-sequences for
/// `k = 1..4` (loop limit 5), keyed by sub-sequence length `n`.
fn partial_ts(data: &[u64]) -> HashMap<usize, Vec<Vec<f64>>> {
    let mut out = HashMap::new();
    for k in 1..5usize {
        let n = data.len() / k;
        if n == 0 {
            break;
        }
        let subs: Vec<Vec<f64>> = (0..(data.len() / n))
            .map(|j| data[j * n..(j + 1) * n].iter().map(|v| *v as f64).collect())
            .collect();
        out.insert(n, subs);
    }
    out
}

fn rescaled_range(sub: &[f64]) -> f64 {
    let m = sub.iter().sum::<f64>() / sub.len() as f64;
    let mut cumsum = 0.0;
    let mut max_z = f64::MIN;
    let mut min_z = f64::MAX;
    for v in sub {
        cumsum += v - m;
        if cumsum > max_z {
            max_z = cumsum;
        }
        if cumsum < min_z {
            min_z = cumsum;
        }
    }
    let r = max_z - min_z;
    let variance = sub.iter().map(|v| (v - m).powi(2)).sum::<f64>() / sub.len() as f64;
    let s = variance.sqrt();
    if r == 0.0 || s == 0.0 {
        0.0
    } else {
        r / s
    }
}

fn average_rescaled_range(subs: &[Vec<f64>]) -> f64 {
    subs.iter().map(|s| rescaled_range(s)).sum::<f64>() / subs.len() as f64
}

/// Anis-Lloyd corrected R/S Hurst exponent.
pub fn hurst_exponent(data: &[u64]) -> f64 {
    let groups = partial_ts(data);
    let mut ns = Vec::new();
    let mut deviations = Vec::new();
    for (n, subs) in &groups {
        let n = *n;
        let avg_rs = average_rescaled_range(subs);
        if avg_rs == 0.0 {
            continue;
        }
        let mut expected = 0.0;
        for i in 1..n {
            expected += (n - i) as f64 / i as f64;
        }
        if n > 340 {
            expected *= 1.0 / (n as f64 * PI / 2.0).sqrt();
        } else {
            expected *= gamma((n as f64 - 1.0) / 2.0) / ((n as f64).sqrt() * gamma(n as f64 / 2.0));
        }
        ns.push(n as f64);
        deviations.push((avg_rs - expected).abs());
    }
    if ns.is_empty() {
        return 1.0;
    }
    let slope = linear_fit_slope(&ns, &deviations);
    0.5 + slope
}

/// Least-squares slope of a line fit to `(xs, ys)`
pub fn linear_fit_slope(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;
    let mut num = 0.0;
    let mut den = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        num += (x - mean_x) * (y - mean_y);
        den += (x - mean_x).powi(2);
    }
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

/// Histogram counts sorted by descending frequency
fn sorted_desc_counts(histogram: &HashMap<u64, usize>) -> Vec<usize> {
    let mut vals: Vec<usize> = histogram.values().copied().collect();
    vals.sort_unstable_by(|a, b| b.cmp(a));
    vals
}

pub struct Benford {
    pub presented: bool,
    pub probability: f64,
}

/// Benford's law presence + probability. Ranks 1..=9,
/// missing ranks (fewer than 9 distinct values) padded with zero counts.
pub fn benford(n: usize, histogram: &HashMap<u64, usize>) -> Benford {
    let mut padded = sorted_desc_counts(histogram);
    while padded.len() < 9 {
        padded.push(0);
    }

    let mut presented = false;
    for (d, val) in (1..=9u32).zip(padded.iter().copied()) {
        let p_d = ((d + 1) as f64 / d as f64).log10();
        let emp = val as f64 / n as f64;
        if (p_d - emp).abs() < 0.05 {
            presented = true;
        } else {
            presented = false;
            break;
        }
    }

    let mut p_benford = 0.0;
    for (d, val) in (1..=9u32).zip(padded.iter().take(9)) {
        let p_d = ((d + 1) as f64 / d as f64).log10();
        let emp = *val as f64 / n as f64;
        p_benford += (p_d - emp).abs();
    }
    let probability = 1.0 - p_benford / 2.0;
    Benford {
        presented,
        probability,
    }
}

/// Triangle/rectangle area between two points on the step function `y` and
/// the interpolating line `p`, case: both endpoints above/at the line.
#[allow(clippy::too_many_arguments)]
fn area_under_p_above_f(x: f64, x_next: f64, y: f64, y_next: f64, p: f64, p_next: f64, y_n: f64, n: f64) -> f64 {
    let mut s = 0.0;
    s += (y - y_next) * (x_next - x) / 2.0;
    s += (y - y_next) * (n - x_next);
    s += (p - p_next).abs() * (x_next - x) / 2.0;
    s += (x_next - x) * (p_next - y_n);
    s
}

#[allow(clippy::too_many_arguments)]
fn area_above_p_under_f(x: f64, x_next: f64, y: f64, y_next: f64, p: f64, p_next: f64, y_n: f64, n: f64) -> f64 {
    let mut s = 0.0;
    s += (y - y_next).abs() * (x_next - x) / 2.0;
    s += (x_next - x) * (y_next - y_n);
    s += (p - p_next).abs() * (x_next - x) / 2.0;
    s += (p - p_next) * (n - x_next);
    s
}

fn find_intersection(i: f64, y: f64, y_next: f64, y_1: f64, y_n: f64, n: f64) -> (f64, f64) {
    let i_1 = (y_n - n * y_1 + (i + 1.0) * (n - 1.0) * y - i * (n - 1.0) * y_next)
        / ((y_n - y_1) - (n - 1.0) * (y_next - y));
    let i_2 = ((y_n - y_1) * i_1 - y_n + n * y_1) / (n - 1.0);
    (i_1, i_2)
}

/// Value-distribution area feature.
pub fn area_of_value_distribution(histogram: &HashMap<u64, usize>) -> f64 {
    let mut sorted: Vec<f64> = histogram.values().map(|v| *v as f64).collect();
    sorted.sort_by(|a, b| b.partial_cmp(a).unwrap());
    let n = sorted.len() as f64;
    let y_1 = sorted[0];
    let y_n = sorted[sorted.len() - 1];

    let mut p_line = vec![y_1];
    for i in 2..sorted.len() {
        let i = i as f64;
        let p_i = ((i - 1.0) * y_n + (n - i) * y_1) / (n - 1.0);
        p_line.push(p_i);
    }
    p_line.push(y_n);

    let mut s = (n - 1.0) * (y_1 - y_n);
    let s_all = s;

    for idx in 0..sorted.len() - 1 {
        let i = (idx + 1) as f64;
        let i_next = (idx + 2) as f64;
        let y = sorted[idx];
        let y_next = sorted[idx + 1];
        let p = p_line[idx];
        let p_next = p_line[idx + 1];
        if y >= p && y_next >= p_next {
            s -= area_under_p_above_f(i, i_next, y, y_next, p, p_next, y_n, n);
        } else if y <= p && y_next <= p_next {
            s -= area_above_p_under_f(i, i_next, y, y_next, p, p_next, y_n, n);
        } else if y >= p && y_next <= p_next {
            let (i_1, i_2) = find_intersection(i, y, y_next, y_1, y_n, n);
            s -= area_under_p_above_f(i, i_1, y, i_2, p, i_2, y_n, n);
            s -= area_above_p_under_f(i_1, i_next, i_2, y_next, i_2, p_next, y_n, n);
        } else {
            let (i_1, i_2) = find_intersection(i, y, y_next, y_1, y_n, n);
            s -= area_above_p_under_f(i, i_1, y, i_2, p, i_2, y_n, n);
            s -= area_under_p_above_f(i_1, i + 1.0, i_2, y_next, i_2, p_next, y_n, n);
        }
    }
    s / (s_all / 2.0)
}

/// Buckets `sizes` into 60-second windows aligned to `floor(times[0]/60)*60`,
/// zero-filling empty buckets.
pub fn aggregate_60s(sizes: &[u64], times: &[f64]) -> Vec<u64> {
    const INTERVAL: f64 = 60.0;
    let mut out = Vec::new();
    let mut start_time = times[0] - (times[0] % INTERVAL);
    let mut agg: u64 = 0;
    for (d, t) in sizes.iter().zip(times) {
        if *t < start_time + INTERVAL {
            agg += d;
        } else {
            out.push(agg);
            start_time += INTERVAL;
            while *t > start_time + INTERVAL {
                start_time += INTERVAL;
                out.push(0);
            }
            agg = *d;
        }
    }
    if agg > 0 {
        out.push(agg);
    }
    out
}

pub struct CntDistribution {
    pub cnt_distribution: f64,
    pub cnt_zeros: f64,
    pub biggest_cnt_1_sec: u64,
    pub cnt_nz_distribution: f64,
}

/// `CNT_DISTRIBUTION`, `CNT_ZEROS`, `BIGGEST_CNT_1_SEC`, `CNT_NZ_DISTRIBUTION`
pub fn cnt_distribution(agg: &[u64]) -> Option<CntDistribution> {
    if agg.is_empty() {
        return None;
    }
    let mean_agg = agg.iter().sum::<u64>() as f64 / agg.len() as f64;
    let dispersion: f64 = agg.iter().map(|d| (mean_agg - *d as f64).abs()).sum();
    let max = *agg.iter().max().unwrap();
    let min = *agg.iter().min().unwrap();
    let scale = max as f64 - min as f64;
    let cnt_distribution = if scale == 0.0 {
        dispersion / agg.len() as f64
    } else {
        (dispersion / agg.len() as f64) / (scale / 2.0)
    };

    let cnt_zeros = agg.iter().filter(|d| **d == 0).count() as f64 / agg.len() as f64;
    let biggest_cnt_1_sec = max;

    let nz: Vec<u64> = agg.iter().copied().filter(|d| *d != 0).collect();
    let cnt_nz_distribution = if nz.is_empty() {
        0.0
    } else {
        let mean_nz = nz.iter().sum::<u64>() as f64 / nz.len() as f64;
        let dispersion_nz: f64 = nz.iter().map(|d| (mean_nz - *d as f64).abs()).sum();
        let nz_max = *nz.iter().max().unwrap();
        let nz_min = *nz.iter().min().unwrap();
        let nz_scale = nz_max as f64 - nz_min as f64;
        if nz_scale == 0.0 {
            dispersion_nz / nz.len() as f64
        } else {
            (dispersion_nz / nz.len() as f64) / (nz_scale / 2.0)
        }
    };

    Some(CntDistribution {
        cnt_distribution,
        cnt_zeros,
        biggest_cnt_1_sec,
        cnt_nz_distribution,
    })
}

/// Lilliefors test for normality against an unspecified-parameter normal
/// distribution, via Monte-Carlo-free Dallal-Wilkinson-style p-value
/// approximation over the Kolmogorov-Smirnov statistic against the
/// standardized empirical CDF. Returns `(D, p_value)`.
pub fn lilliefors(data: &[u64]) -> (f64, f64) {
    let n = data.len() as f64;
    let mean = data.iter().map(|d| *d as f64).sum::<f64>() / n;
    let variance = data.iter().map(|d| (*d as f64 - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let sd = variance.sqrt();
    let mut standardized: Vec<f64> = data
        .iter()
        .map(|d| if sd == 0.0 { 0.0 } else { (*d as f64 - mean) / sd })
        .collect();
    standardized.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mut d_stat: f64 = 0.0;
    for (i, z) in standardized.iter().enumerate() {
        let cdf = standard_normal_cdf(*z);
        let ecdf_upper = (i + 1) as f64 / n;
        let ecdf_lower = i as f64 / n;
        d_stat = d_stat.max((ecdf_upper - cdf).abs()).max((cdf - ecdf_lower).abs());
    }
    // Dallal & Wilkinson (1986) approximation of the Lilliefors p-value
    let nd = (n.sqrt() - 0.01 + 0.85 / n.sqrt()) * d_stat;
    let p = if nd < 0.2 {
        1.0
    } else if nd < 0.75 {
        1.0 - 2.0 * (-7.01256 * nd.powi(2) + 2.79019 * nd - 0.64163).exp()
    } else if nd < 2.0 {
        2.0 * (-7.01256 * nd.powi(2) + 2.79019 * nd - 0.64163).exp()
    } else {
        0.0
    }
    .clamp(0.0, 1.0);
    (d_stat, p)
}

fn standard_normal_cdf(z: f64) -> f64 {
    0.5 * (1.0 + erf(z / std::f64::consts::SQRT_2))
}

/// Abramowitz & Stegun 7.1.26 rational approximation of the error function
fn erf(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;
    let t = 1.0 / (1.0 + p * x);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-x * x).exp();
    sign * y
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hurst_constant_sequence_returns_one() {
        // Under a constant sequence every sub-average R/S is 0, so no n
        // contributes and the fallback of 1.0 applies.
        let data = vec![160u64; 10];
        assert_eq!(hurst_exponent(&data), 1.0);
    }

    #[test]
    fn test_aggregate_60s_zero_fills_gaps() {
        let sizes = vec![10, 20, 30];
        let times = vec![0.0, 10.0, 130.0];
        let agg = aggregate_60s(&sizes, &times);
        assert_eq!(agg, vec![30, 0, 30]);
    }

    #[test]
    fn test_lilliefors_needs_at_least_four() {
        let data = vec![1u64, 2, 3, 100];
        let (d, p) = lilliefors(&data);
        assert!(d >= 0.0);
        assert!((0.0..=1.0).contains(&p));
    }
}
