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

/// Shannon entropy in bits over the value histogram of a sequence.
/// Generalized from a byte-histogram to any hashable value so it backs
/// both the packet-size entropy feature and the spectral entropy feature.
pub trait ShannonEntropy {
    fn shannon_entropy(&self) -> f64;
}

impl ShannonEntropy for [u64] {
    fn shannon_entropy(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let mut frequencies: HashMap<u64, usize> = HashMap::new();
        for value in self {
            *frequencies.entry(*value).or_insert(0) += 1;
        }
        entropy_from_counts(frequencies.values().copied(), self.len())
    }
}

impl ShannonEntropy for [u8] {
    fn shannon_entropy(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let mut frequencies: [usize; 256] = [0; 256];
        for byte in self {
            frequencies[*byte as usize] += 1;
        }
        entropy_from_counts(frequencies.iter().copied().filter(|c| *c > 0), self.len())
    }
}

/// Shared reduction: -sum(p*log2(p)) over a set of bucket counts and a total
fn entropy_from_counts<I: Iterator<Item = usize>>(counts: I, n: usize) -> f64 {
    let mut entropy = 0.0;
    for count in counts {
        let p = count as f64 / n as f64;
        entropy += p * p.log2();
    }
    if entropy != 0.0 {
        entropy = -entropy;
    }
    entropy
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::iter;
    /// Tests the shannon entropy function
    #[test]
    fn test_shannon_entropy() {
        // Empty slice
        assert_eq!([].shannon_entropy(), 0.0);
        // Single value
        assert_eq!([0].shannon_entropy(), 0.0);
        assert_eq!([1].shannon_entropy(), 0.0);
        // Many single values
        for exponent in 1..10 {
            // Build a slice
            let data: Vec<u8> = iter::repeat(1).take(2_usize.pow(exponent)).collect();
            // Evaluate entropy
            assert_eq!(data.shannon_entropy(), 0.0);
        }
        // Uniform distribution
        for exponent in 1..8 {
            // Build a slice
            let data: Vec<u8> = (0..2_u8.pow(exponent)).collect();
            // Evaluate entropy
            assert_eq!(data.shannon_entropy(), exponent as f64);
        }
    }

    #[test]
    fn test_shannon_entropy_u64() {
        let data: Vec<u64> = vec![];
        assert_eq!(data.shannon_entropy(), 0.0);
        let data: Vec<u64> = vec![160];
        assert_eq!(data.shannon_entropy(), 0.0);
        let data: Vec<u64> = (0..8u64).collect();
        assert_eq!(data.shannon_entropy(), 3.0);
    }
}
