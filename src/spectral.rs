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
//! Lomb-Scargle periodogram and the spectral feature battery. No
//! periodogram crate is in the dependency stack, so the
//! classical (Press & Rybicki) formulation is computed directly, matching
//! the variance-normalized "standard" normalization used by the source's
//! Lomb-Scargle library call.
use std::collections::HashMap;
use std::f64::consts::PI;

use crate::distribution::linear_fit_slope;
use crate::sentinel::Sentinel;

/// Spectral analysis window, seconds.
const T: f64 = 300.0;
const N_FREQ: usize = 5000;

fn frequency_grid() -> Vec<f64> {
    let f_min = 2.0 / T;
    let f_max = 1.0;
    let step = (f_max - f_min) / N_FREQ as f64;
    (0..N_FREQ).map(|i| f_min + i as f64 * step).collect()
}

/// Classical Lomb-Scargle periodogram, normalized by the data's variance
/// (equivalent to the "standard" normalization of the usual periodogram
/// libraries). Returns `(frequencies, power)`, frequency-grid-aligned.
pub fn lomb_scargle(times: &[f64], values: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let freqs = frequency_grid();
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let yy: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();

    let power: Vec<f64> = freqs
        .iter()
        .map(|f| {
            let w = 2.0 * PI * f;
            let mut sum_sin2wt = 0.0;
            let mut sum_cos2wt = 0.0;
            for t in times {
                sum_sin2wt += (2.0 * w * t).sin();
                sum_cos2wt += (2.0 * w * t).cos();
            }
            let tau = sum_sin2wt.atan2(sum_cos2wt) / (2.0 * w);

            let mut xc = 0.0;
            let mut xs = 0.0;
            let mut cc = 0.0;
            let mut ss = 0.0;
            for (t, v) in times.iter().zip(values) {
                let wt = w * (t - tau);
                let c = wt.cos();
                let s = wt.sin();
                xc += (v - mean) * c;
                xs += (v - mean) * s;
                cc += c * c;
                ss += s * s;
            }
            0.5 * (xc * xc / cc + xs * xs / ss) / yy
        })
        .collect();
    (freqs, power)
}

fn argmax(data: &[f64]) -> Option<(usize, f64)> {
    data.iter().enumerate().fold(None, |acc, (i, v)| match acc {
        None => Some((i, *v)),
        Some((_, best)) if *v > best => Some((i, *v)),
        _ => acc,
    })
}

fn argmin(data: &[f64]) -> Option<(usize, f64)> {
    data.iter().enumerate().fold(None, |acc, (i, v)| match acc {
        None => Some((i, *v)),
        Some((_, best)) if *v < best => Some((i, *v)),
        _ => acc,
    })
}

/// Mode of `power` quantized to 5 decimal places, scaled back: deterministic
/// but sensitive to the quantization scale. Ties favor the smallest
/// quantized value.
fn power_mode(power: &[f64]) -> f64 {
    let mut counts: HashMap<i64, usize> = HashMap::new();
    for p in power {
        let q = (p * 100_000.0).floor() as i64;
        *counts.entry(q).or_insert(0) += 1;
    }
    let mut best_key = i64::MAX;
    let mut best_count = 0usize;
    for (key, count) in &counts {
        if *count > best_count || (*count == best_count && *key < best_key) {
            best_count = *count;
            best_key = *key;
        }
    }
    best_key as f64 / 100_000.0
}

#[derive(Default)]
pub struct SpectralFeatures {
    pub max_power: Sentinel,
    pub min_power: Sentinel,
    pub max_power_freq: Sentinel,
    pub min_power_freq: Sentinel,
    pub power_mean: Sentinel,
    pub power_std: Sentinel,
    pub power_mode: Sentinel,
    pub spectral_energy: Sentinel,
    pub spectral_entropy: Sentinel,
    pub spectral_kurtosis: Sentinel,
    pub spectral_skewness: Sentinel,
    pub spectral_rolloff: Sentinel,
    pub spectral_centroid: Sentinel,
    pub spectral_spread: Sentinel,
    pub spectral_slope: Sentinel,
    pub spectral_crest: Sentinel,
    pub spectral_flux: Sentinel,
    pub spectral_bandwidth: Sentinel,
    pub periodicity_scdf: Sentinel,
}

/// Computes the full spectral battery over `(times, sizes)`. Every field
/// starts unset; each sub-feature is computed independently so one failure
/// (NaN, division by zero) never blanks the others.
pub fn spectral_features(times: &[f64], sizes: &[u64]) -> SpectralFeatures {
    let mut out = SpectralFeatures::default();
    let values: Vec<f64> = sizes.iter().map(|s| *s as f64).collect();
    let (freqs, power_raw) = lomb_scargle(times, &values);

    let mut freqs_f = Vec::with_capacity(power_raw.len());
    let mut power = Vec::with_capacity(power_raw.len());
    for (f, p) in freqs.iter().zip(power_raw.iter()) {
        if p.is_finite() {
            freqs_f.push(*f);
            power.push(*p);
        }
    }
    if power.is_empty() {
        return out;
    }

    let (max_idx, max_power) = argmax(&power).unwrap();
    let (min_idx, min_power) = argmin(&power).unwrap();
    out.max_power = Sentinel::set(max_power);
    out.max_power_freq = Sentinel::set(freqs_f[max_idx]);
    out.min_power = Sentinel::set(min_power);
    out.min_power_freq = Sentinel::set(freqs_f[min_idx]);

    let n = power.len() as f64;
    let mean_p = power.iter().sum::<f64>() / n;
    let var_p = power.iter().map(|p| (p - mean_p).powi(2)).sum::<f64>() / n;
    let std_p = var_p.sqrt();
    out.power_mean = Sentinel::set(mean_p);
    out.power_std = Sentinel::set(std_p);
    out.power_mode = Sentinel::set(power_mode(&power));

    let energy: f64 = power.iter().sum();
    out.spectral_energy = Sentinel::set(energy);

    let entropy: f64 = -power.iter().filter(|p| **p > 0.0).map(|p| p * p.log2()).sum::<f64>();
    out.spectral_entropy = Sentinel::set(entropy);

    out.spectral_kurtosis = Sentinel::set(power.iter().map(|p| (p - mean_p).powi(4)).sum::<f64>() / std_p.powi(4));
    out.spectral_skewness = Sentinel::set(power.iter().map(|p| (p - mean_p).powi(3)).sum::<f64>() / std_p.powi(3));

    let threshold = 0.85 * max_power;
    if let Some(idx) = power.iter().position(|p| *p > threshold) {
        out.spectral_rolloff = Sentinel::set(freqs_f[idx]);
    }

    let centroid = freqs_f.iter().zip(&power).map(|(f, p)| f * p).sum::<f64>() / energy;
    out.spectral_centroid = Sentinel::set(centroid);
    out.spectral_spread = Sentinel::set(
        (freqs_f.iter().zip(&power).map(|(f, p)| (f - centroid).powi(2) * p).sum::<f64>() / energy).sqrt(),
    );

    let log_pairs: Vec<(f64, f64)> = freqs_f
        .iter()
        .zip(&power)
        .filter(|(f, p)| **f > 0.0 && **p > 0.0)
        .map(|(f, p)| (f.ln(), p.ln()))
        .collect();
    if log_pairs.len() >= 2 {
        let xs: Vec<f64> = log_pairs.iter().map(|(x, _)| *x).collect();
        let ys: Vec<f64> = log_pairs.iter().map(|(_, y)| *y).collect();
        out.spectral_slope = Sentinel::set(linear_fit_slope(&xs, &ys));
    }

    out.spectral_crest = Sentinel::set(max_power / mean_p);
    out.spectral_flux = Sentinel::set(power.windows(2).map(|w| (w[1] - w[0]).abs()).sum());
    out.spectral_bandwidth = Sentinel::set(freqs_f[max_idx] - freqs_f[min_idx]);

    let abs_power: Vec<f64> = power.iter().map(|p| p.abs()).collect();
    let max_abs_raw = abs_power.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let max_abs = if max_abs_raw.is_finite() { max_abs_raw } else { f64::MAX } * 0.001;
    let mean_abs = abs_power.iter().sum::<f64>() / abs_power.len() as f64;
    let var_abs = abs_power.iter().map(|p| (p - mean_abs).powi(2)).sum::<f64>() / abs_power.len() as f64;
    out.periodicity_scdf = Sentinel::set(1.0 - (-max_abs / var_abs).exp());

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_series_yields_finite_or_unset_fields_only() {
        let times: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let sizes = vec![160u64; 20];
        let features = spectral_features(&times, &sizes);
        // A perfectly flat series has zero variance; every sentinel field
        // must end up either unset or finite, never NaN/infinite leaking out.
        assert!(features.max_power.value().map(|v| v.is_finite()).unwrap_or(true));
        assert!(features.spectral_slope.value().map(|v| v.is_finite()).unwrap_or(true));
    }

    #[test]
    fn test_power_mode_quantizes_and_rescales() {
        let power = vec![0.123456, 0.123451, 0.5];
        let mode = power_mode(&power);
        assert!((mode - 0.12345).abs() < 1e-9);
    }

    #[test]
    fn test_frequency_grid_bounds() {
        let freqs = frequency_grid();
        assert_eq!(freqs.len(), N_FREQ);
        assert!((freqs[0] - 2.0 / T).abs() < 1e-12);
        assert!(freqs[N_FREQ - 1] < 1.0);
    }
}
