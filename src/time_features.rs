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
//! Time-based features over a flow's timestamp sequence.
use statistical_helpers::{mean, median};

mod statistical_helpers {
    pub fn mean(data: &[f64]) -> f64 {
        data.iter().sum::<f64>() / data.len() as f64
    }
    pub fn median(data: &[f64]) -> f64 {
        let mut sorted = data.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let n = sorted.len();
        if n % 2 == 1 {
            sorted[n / 2]
        } else {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        }
    }
}

pub struct TimeBasic {
    pub duration: f64,
    pub time_distribution: f64,
    pub mean_scaled_time: f64,
    pub median_scaled_time: f64,
    pub q1_scaled_time: f64,
    pub q3_scaled_time: f64,
}

/// `DURATION`, `TIME_DISTRIBUTION`, and the positional scaled-time picks.
/// `MEDIAN_SCALED_TIME`/`Q1_SCALED_TIME`/`Q3_SCALED_TIME` are index picks at
/// `N/2`, `N/4`, `3N/4` of `t-t0`, not true quantiles. Preserved verbatim.
pub fn time_basic(times: &[f64]) -> TimeBasic {
    let t0 = times[0];
    let t_n = times[times.len() - 1];
    let p = times.len();
    let time_distribution = if p < 2 {
        0.5
    } else {
        let norm_mi_t: f64 = times.iter().map(|t| t - t0).sum::<f64>() / p as f64;
        let d_t = t_n - t0;
        if d_t == 0.0 {
            norm_mi_t
        } else {
            norm_mi_t / d_t
        }
    };
    let scaled: Vec<f64> = times.iter().map(|t| t - t0).collect();
    TimeBasic {
        duration: t_n - t0,
        time_distribution,
        mean_scaled_time: mean(&scaled),
        median_scaled_time: scaled[scaled.len() / 2],
        q1_scaled_time: scaled[scaled.len() / 4],
        q3_scaled_time: scaled[3 * scaled.len() / 4],
    }
}

pub struct DiffTimes {
    pub mean_difftimes: f64,
    pub median_difftimes: f64,
    pub min_difftimes: f64,
    pub max_difftimes: f64,
    pub mean_scaled_difftimes: f64,
}

/// Difftime statistics over inter-arrival gaps. `None` when fewer than 2
/// timestamps (no gaps to measure).
pub fn difftimes(times: &[f64]) -> Option<DiffTimes> {
    if times.len() < 2 {
        return None;
    }
    let gaps: Vec<f64> = times.windows(2).map(|w| w[1] - w[0]).collect();
    let mean_difftimes = mean(&gaps);
    let median_difftimes = median(&gaps);
    let min_difftimes = gaps.iter().cloned().fold(f64::INFINITY, f64::min);
    let max_difftimes = gaps.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    Some(DiffTimes {
        mean_difftimes,
        median_difftimes,
        min_difftimes,
        max_difftimes,
        mean_scaled_difftimes: mean_difftimes / max_difftimes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_packet_time_distribution_default() {
        let times = vec![0.0];
        let basic = time_basic(&times);
        assert_eq!(basic.duration, 0.0);
        assert_eq!(basic.time_distribution, 0.5);
    }

    #[test]
    fn test_constant_interval_difftimes() {
        let times: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let dt = difftimes(&times).unwrap();
        assert_eq!(dt.mean_difftimes, 1.0);
        assert_eq!(dt.max_difftimes, 1.0);
        assert_eq!(dt.mean_scaled_difftimes, 1.0);
    }
}
