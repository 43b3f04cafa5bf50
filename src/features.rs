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
//! The feature vector and the `extract` orchestration that builds one
//! from a flow's `(sizes, times)` sequence.
use std::collections::HashMap;

use crate::behavior;
use crate::distribution;
use crate::entropy::ShannonEntropy;
use crate::sentinel::Sentinel;
use crate::spectral;
use crate::stats;
use crate::time_features;

/// Packet-length bias applied once at extraction time.
pub const SIZE_BIAS: u64 = 60;

/// Flat feature record with an "unset" tag per field. Column order here
/// matches the CSV schema from `MEAN` through `PERIODICITY_SCDF`;
/// the ten flow-identity columns and `DIRECTIONS` are supplied by the sink
/// from the emitted flow, not by this type.
#[derive(Default)]
pub struct FeatureVector {
    pub mean: Sentinel,
    pub median: Sentinel,
    pub stdev: Sentinel,
    pub var: Sentinel,
    pub burstiness: Sentinel,
    pub q1: Sentinel,
    pub q3: Sentinel,
    pub min: Sentinel,
    pub max: Sentinel,
    pub min_minus_max: Sentinel,
    pub mode: Sentinel,
    pub coefficient_of_variation: Sentinel,
    pub average_dispersion: Sentinel,
    pub percent_deviation: Sentinel,
    pub root_mean_square: Sentinel,
    pub percent_below_mean: Sentinel,
    pub percent_above_mean: Sentinel,

    pub pearson_sk1_skewness: Sentinel,
    pub pearson_sk2_skewness: Sentinel,
    pub fisher_mi_3_skewness: Sentinel,
    pub fisher_pearson_g1_skewness: Sentinel,
    pub fisher_pearson_g1_adjusted_skewness: Sentinel,
    pub galton_skewness: Sentinel,

    pub kurtosis: Sentinel,

    pub entropy: Sentinel,
    pub scaled_entropy: Sentinel,

    pub hurst_exponent: Sentinel,

    pub benford_law_presented: bool,
    pub p_benford: Sentinel,

    pub normal_distribution: Sentinel,
    pub cnt_distribution: Sentinel,

    pub time_distribution: Sentinel,
    pub area_values_distribution: Sentinel,

    pub mean_scaled_time: Sentinel,
    pub median_scaled_time: Sentinel,
    pub q1_scaled_time: Sentinel,
    pub q3_scaled_time: Sentinel,
    pub duration: Sentinel,

    pub mean_difftimes: Sentinel,
    pub median_difftimes: Sentinel,
    pub min_difftimes: Sentinel,
    pub max_difftimes: Sentinel,
    pub mean_scaled_difftimes: Sentinel,

    pub sig_spaces: bool,
    pub switching_metric: Sentinel,
    pub transients: bool,
    pub cnt_zeros: Sentinel,
    pub cnt_nz_distribution: Sentinel,
    pub biggest_cnt_1_sec: Sentinel,

    pub periodicity: bool,
    pub val: u64,
    pub time: f64,

    pub min_power: Sentinel,
    pub max_power: Sentinel,
    pub min_power_freq: Sentinel,
    pub max_power_freq: Sentinel,
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

impl FeatureVector {
    /// Renders every field (except `DIRECTIONS`, supplied by the caller at
    /// the right position) in CSV column order.
    pub fn to_row(&self, directions: Sentinel) -> Vec<String> {
        vec![
            self.mean.to_string(),
            self.median.to_string(),
            self.stdev.to_string(),
            self.var.to_string(),
            self.burstiness.to_string(),
            self.q1.to_string(),
            self.q3.to_string(),
            self.min.to_string(),
            self.max.to_string(),
            self.min_minus_max.to_string(),
            self.mode.to_string(),
            self.coefficient_of_variation.to_string(),
            self.average_dispersion.to_string(),
            self.percent_deviation.to_string(),
            self.root_mean_square.to_string(),
            self.percent_below_mean.to_string(),
            self.percent_above_mean.to_string(),
            self.pearson_sk1_skewness.to_string(),
            self.pearson_sk2_skewness.to_string(),
            self.fisher_mi_3_skewness.to_string(),
            self.fisher_pearson_g1_skewness.to_string(),
            self.fisher_pearson_g1_adjusted_skewness.to_string(),
            self.galton_skewness.to_string(),
            self.kurtosis.to_string(),
            self.entropy.to_string(),
            self.scaled_entropy.to_string(),
            self.hurst_exponent.to_string(),
            self.benford_law_presented.to_string(),
            self.p_benford.to_string(),
            self.normal_distribution.to_string(),
            self.cnt_distribution.to_string(),
            self.time_distribution.to_string(),
            self.area_values_distribution.to_string(),
            self.mean_scaled_time.to_string(),
            self.median_scaled_time.to_string(),
            self.q1_scaled_time.to_string(),
            self.q3_scaled_time.to_string(),
            self.duration.to_string(),
            self.mean_difftimes.to_string(),
            self.median_difftimes.to_string(),
            self.min_difftimes.to_string(),
            self.max_difftimes.to_string(),
            self.mean_scaled_difftimes.to_string(),
            self.sig_spaces.to_string(),
            self.switching_metric.to_string(),
            self.transients.to_string(),
            self.cnt_zeros.to_string(),
            self.cnt_nz_distribution.to_string(),
            self.biggest_cnt_1_sec.to_string(),
            directions.to_string(),
            self.periodicity.to_string(),
            self.val.to_string(),
            self.time.to_string(),
            self.min_power.to_string(),
            self.max_power.to_string(),
            self.min_power_freq.to_string(),
            self.max_power_freq.to_string(),
            self.power_mean.to_string(),
            self.power_std.to_string(),
            self.power_mode.to_string(),
            self.spectral_energy.to_string(),
            self.spectral_entropy.to_string(),
            self.spectral_kurtosis.to_string(),
            self.spectral_skewness.to_string(),
            self.spectral_rolloff.to_string(),
            self.spectral_centroid.to_string(),
            self.spectral_spread.to_string(),
            self.spectral_slope.to_string(),
            self.spectral_crest.to_string(),
            self.spectral_flux.to_string(),
            self.spectral_bandwidth.to_string(),
            self.periodicity_scdf.to_string(),
        ]
    }
}

/// The CSV header matching [`FeatureVector::to_row`]'s layout, `DIRECTIONS`
/// included at its fixed position.
pub const FEATURE_HEADER: &[&str] = &[
    "MEAN",
    "MEDIAN",
    "STDEV",
    "VAR",
    "BURSTINESS",
    "Q1",
    "Q3",
    "MIN",
    "MAX",
    "MIN_MINUS_MAX",
    "MODE",
    "COEFFICIENT_OF_VARIATION",
    "AVERAGE_DISPERSION",
    "PERCENT_DEVIATION",
    "ROOT_MEAN_SQUARE",
    "PERCENT_BELOW_MEAN",
    "PERCENT_ABOVE_MEAN",
    "PEARSON_SK1_SKEWNESS",
    "PEARSON_SK2_SKEWNESS",
    "FISHER_MI_3_SKEWNESS",
    "FISHER_PEARSON_g1_SKEWNESS",
    "FISHER_PEARSON_G1_SKEWNESS",
    "GALTON_SKEWNESS",
    "KURTOSIS",
    "ENTROPY",
    "SCALED_ENTROPY",
    "HURST_EXPONENT",
    "BENFORD_LAW_PRESENTED",
    "P_BENFORD",
    "NORMAL_DISTRIBUTION",
    "CNT_DISTRIBUTION",
    "TIME_DISTRIBUTION",
    "AREA_VALUES_DISTRIBUTION",
    "MEAN_SCALED_TIME",
    "MEDIAN_SCALED_TIME",
    "Q1_SCALED_TIME",
    "Q3_SCALED_TIME",
    "DURATION",
    "MEAN_DIFFTIMES",
    "MEDIAN_DIFFTIMES",
    "MIN_DIFFTIMES",
    "MAX_DIFFTIMES",
    "MEAN_SCALED_DIFFTIMES",
    "SIG_SPACES",
    "SWITCHING_METRIC",
    "TRANSIENTS",
    "CNT_ZEROS",
    "CNT_NZ_DISTRIBUTION",
    "BIGGEST_CNT_1_SEC",
    "DIRECTIONS",
    "PERIODICITY",
    "VAL",
    "TIME",
    "MIN_POWER",
    "MAX_POWER",
    "MIN_POWER_FREQ",
    "MAX_POWER_FREQ",
    "POWER_MEAN",
    "POWER_STD",
    "POWER_MODE",
    "SPECTRAL_ENERGY",
    "SPECTRAL_ENTROPY",
    "SPECTRAL_KURTOSIS",
    "SPECTRAL_SKEWNESS",
    "SPECTRAL_ROLLOFF",
    "SPECTRAL_CENTROID",
    "SPECTRAL_SPREAD",
    "SPECTRAL_SLOPE",
    "SPECTRAL_CREST",
    "SPECTRAL_FLUX",
    "SPECTRAL_BANDWIDTH",
    "PERIODICITY_SCDF",
];

fn histogram_of(data: &[u64]) -> HashMap<u64, usize> {
    let mut counts = HashMap::new();
    for d in data {
        *counts.entry(*d).or_insert(0) += 1;
    }
    counts
}

/// Builds the full feature vector from a flow's (already biased) packet
/// sizes and arrival times. Returns `None` when `sizes` is empty; every
/// individual family failure leaves its own field unset
/// rather than aborting the whole vector.
pub fn extract(sizes: &[u64], times: &[f64]) -> Option<FeatureVector> {
    if sizes.is_empty() {
        return None;
    }
    let histogram = histogram_of(sizes);
    let mut fv = FeatureVector::default();

    let basic = stats::basic_stats(sizes);
    fv.mean = Sentinel::set(basic.mean);
    fv.median = Sentinel::set(basic.median);
    fv.stdev = Sentinel::set(basic.stdev);
    fv.var = Sentinel::set(basic.var);
    fv.burstiness = Sentinel::set(basic.burstiness);
    fv.q1 = Sentinel::set(basic.q1);
    fv.q3 = Sentinel::set(basic.q3);
    fv.min = Sentinel::set(basic.min as f64);
    fv.max = Sentinel::set(basic.max as f64);
    fv.min_minus_max = Sentinel::set(basic.min_minus_max as f64);
    fv.mode = Sentinel::set(basic.mode as f64);
    fv.coefficient_of_variation = Sentinel::set(basic.coefficient_of_variation);
    fv.average_dispersion = Sentinel::set(basic.average_dispersion);
    fv.percent_deviation = Sentinel::set(basic.percent_deviation);
    fv.root_mean_square = Sentinel::set(basic.root_mean_square);
    fv.percent_below_mean = Sentinel::set(basic.percent_below_mean);
    fv.percent_above_mean = Sentinel::set(basic.percent_above_mean);

    let skew = stats::skewness(sizes, &basic);
    fv.pearson_sk1_skewness = Sentinel::set(skew.pearson_sk1);
    fv.pearson_sk2_skewness = Sentinel::set(skew.pearson_sk2);
    fv.fisher_mi_3_skewness = Sentinel::set(skew.fisher_mi_3);
    fv.fisher_pearson_g1_skewness = Sentinel::set(skew.fisher_pearson_g1);
    fv.fisher_pearson_g1_adjusted_skewness = Sentinel::set(skew.fisher_pearson_g1_adjusted);
    fv.galton_skewness = Sentinel::set(skew.galton);

    fv.kurtosis = Sentinel::set(stats::kurtosis(sizes, &basic));

    let entropy = sizes.shannon_entropy();
    fv.entropy = Sentinel::set(entropy);
    fv.scaled_entropy = Sentinel::set(if sizes.len() == 1 {
        0.0
    } else {
        entropy / (sizes.len() as f64).log2()
    });

    fv.hurst_exponent = Sentinel::set(distribution::hurst_exponent(sizes));

    let benford = distribution::benford(sizes.len(), &histogram);
    fv.benford_law_presented = benford.presented;
    fv.p_benford = Sentinel::set(benford.probability);

    fv.area_values_distribution = Sentinel::set(distribution::area_of_value_distribution(&histogram));

    let agg = distribution::aggregate_60s(sizes, times);
    fv.normal_distribution = Sentinel::set(if agg.len() >= 4 {
        distribution::lilliefors(&agg).1
    } else {
        0.0
    });
    if let Some(cnt) = distribution::cnt_distribution(&agg) {
        fv.cnt_distribution = Sentinel::set(cnt.cnt_distribution);
        fv.cnt_zeros = Sentinel::set(cnt.cnt_zeros);
        fv.cnt_nz_distribution = Sentinel::set(cnt.cnt_nz_distribution);
        fv.biggest_cnt_1_sec = Sentinel::set(cnt.biggest_cnt_1_sec as f64);
    }

    let time_basic = time_features::time_basic(times);
    fv.duration = Sentinel::set(time_basic.duration);
    fv.time_distribution = Sentinel::set(time_basic.time_distribution);
    fv.mean_scaled_time = Sentinel::set(time_basic.mean_scaled_time);
    fv.median_scaled_time = Sentinel::set(time_basic.median_scaled_time);
    fv.q1_scaled_time = Sentinel::set(time_basic.q1_scaled_time);
    fv.q3_scaled_time = Sentinel::set(time_basic.q3_scaled_time);

    if let Some(dt) = time_features::difftimes(times) {
        fv.mean_difftimes = Sentinel::set(dt.mean_difftimes);
        fv.median_difftimes = Sentinel::set(dt.median_difftimes);
        fv.min_difftimes = Sentinel::set(dt.min_difftimes);
        fv.max_difftimes = Sentinel::set(dt.max_difftimes);
        fv.mean_scaled_difftimes = Sentinel::set(dt.mean_scaled_difftimes);
    }

    let spaces = behavior::significant_spaces(times);
    fv.sig_spaces = !spaces.is_empty();
    fv.switching_metric = Sentinel::set(behavior::switching_metric(sizes));
    fv.transients = behavior::has_transient(sizes, times, basic.mean, &spaces);

    let periodicity = behavior::clear_periodicity(sizes, times);
    fv.periodicity = periodicity.periodicity;
    fv.val = periodicity.val;
    fv.time = periodicity.time;

    let spectral = spectral::spectral_features(times, sizes);
    fv.min_power = spectral.min_power;
    fv.max_power = spectral.max_power;
    fv.min_power_freq = spectral.min_power_freq;
    fv.max_power_freq = spectral.max_power_freq;
    fv.power_mean = spectral.power_mean;
    fv.power_std = spectral.power_std;
    fv.power_mode = spectral.power_mode;
    fv.spectral_energy = spectral.spectral_energy;
    fv.spectral_entropy = spectral.spectral_entropy;
    fv.spectral_kurtosis = spectral.spectral_kurtosis;
    fv.spectral_skewness = spectral.spectral_skewness;
    fv.spectral_rolloff = spectral.spectral_rolloff;
    fv.spectral_centroid = spectral.spectral_centroid;
    fv.spectral_spread = spectral.spectral_spread;
    fv.spectral_slope = spectral.spectral_slope;
    fv.spectral_crest = spectral.spectral_crest;
    fv.spectral_flux = spectral.spectral_flux;
    fv.spectral_bandwidth = spectral.spectral_bandwidth;
    fv.periodicity_scdf = spectral.periodicity_scdf;

    Some(fv)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_sizes_returns_none() {
        assert!(extract(&[], &[]).is_none());
    }

    #[test]
    fn test_single_packet_fields() {
        let sizes = vec![100u64 + SIZE_BIAS];
        let times = vec![0.0];
        let fv = extract(&sizes, &times).unwrap();
        assert_eq!(fv.mean.value(), Some(160.0));
        assert_eq!(fv.stdev.value(), Some(160.0));
        assert_eq!(fv.var.value(), Some(0.0));
        assert_eq!(fv.burstiness.value(), Some(0.0));
        assert_eq!(fv.min.value(), Some(160.0));
        assert_eq!(fv.max.value(), Some(160.0));
        assert_eq!(fv.duration.value(), Some(0.0));
        assert_eq!(fv.time_distribution.value(), Some(0.5));
        assert_eq!(fv.switching_metric.value(), Some(0.0));
        // N=1 is below clear_periodicity's NUMBER_THRESHOLD of 3, so it
        // reports no periodicity rather than a trivial one-sample "period".
        assert!(!fv.periodicity);
        assert_eq!(fv.val, 0);
        assert_eq!(fv.time, 0.0);
        assert!(!fv.sig_spaces);
    }

    #[test]
    fn test_constant_sequence_fields() {
        let sizes = vec![100u64 + SIZE_BIAS; 10];
        let times: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let fv = extract(&sizes, &times).unwrap();
        assert_eq!(fv.stdev.value(), Some(0.0));
        assert_eq!(fv.pearson_sk1_skewness.value(), Some(0.0));
        assert_eq!(fv.kurtosis.value(), Some(0.0));
        assert_eq!(fv.switching_metric.value(), Some(0.0));
        assert!(fv.periodicity);
        assert_eq!(fv.val, 160);
        assert_eq!(fv.time, 1.0);
        assert_eq!(fv.mean_difftimes.value(), Some(1.0));
        assert_eq!(fv.max_difftimes.value(), Some(1.0));
    }

    #[test]
    fn test_row_arity_matches_header() {
        let sizes = vec![160u64, 260, 160, 260];
        let times: Vec<f64> = (0..4).map(|i| i as f64).collect();
        let fv = extract(&sizes, &times).unwrap();
        assert_eq!(fv.to_row(Sentinel::set(1.0)).len(), FEATURE_HEADER.len());
    }
}
