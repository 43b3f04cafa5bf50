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
//! Unset-able numeric field: a feature that failed to compute
//! (NaN, division by zero, infinite intermediate) is left unset rather than
//! aborting the flow, and renders as an empty CSV cell.
use std::fmt;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Sentinel(Option<f64>);

impl Sentinel {
    /// Sets the value, but only if finite; a NaN/infinite result collapses
    /// to "unset" rather than propagating into the output.
    pub fn set(value: f64) -> Self {
        if value.is_finite() {
            Sentinel(Some(value))
        } else {
            Sentinel(None)
        }
    }

    pub fn unset() -> Self {
        Sentinel(None)
    }

    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }

    pub fn value(&self) -> Option<f64> {
        self.0
    }
}

impl From<f64> for Sentinel {
    fn from(value: f64) -> Self {
        Sentinel::set(value)
    }
}

impl fmt::Display for Sentinel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.0 {
            Some(v) => write!(f, "{}", v),
            None => write!(f, ""),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nan_and_infinite_collapse_to_unset() {
        assert_eq!(Sentinel::set(f64::NAN).to_string(), "");
        assert_eq!(Sentinel::set(f64::INFINITY).to_string(), "");
        assert_eq!(Sentinel::set(1.0 / 0.0).to_string(), "");
    }

    #[test]
    fn test_finite_value_displays_plain() {
        assert_eq!(Sentinel::set(1.5).to_string(), "1.5");
    }
}
