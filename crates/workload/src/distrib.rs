// SPDX-License-Identifier: Apache-2.0

//! Offset distribution descriptors and their string grammar.

use crate::error::Error;
use std::fmt;
use std::str::FromStr;

/// Which distribution a workload draws key offsets from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Distrib {
    /// Monotone counter modulo the working set.
    Seq,
    /// Uniform over the working set.
    Unif,
    /// Zipfian with skew `theta`.
    Zipf {
        /// Skew parameter; 0.99 is the common YCSB default.
        theta: f64,
    },
    /// Zipf-located scans of up to `max_range` keys (YCSB-E style).
    Scan {
        /// Skew of the scan start offset.
        theta: f64,
        /// Scan length is drawn uniformly from `1..=max_range`.
        max_range: u64,
    },
}

impl FromStr for Distrib {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let unknown = || Error::UnknownDistrib {
            input: s.to_string(),
        };
        match s {
            "seq" => Ok(Distrib::Seq),
            "unif" => Ok(Distrib::Unif),
            _ => {
                if let Some(theta) = s.strip_prefix("zipf:") {
                    let theta = theta.parse().map_err(|_| unknown())?;
                    Ok(Distrib::Zipf { theta })
                } else if let Some(rest) = s.strip_prefix("scan:") {
                    let (theta, max_range) = rest.split_once(':').ok_or_else(unknown)?;
                    Ok(Distrib::Scan {
                        theta: theta.parse().map_err(|_| unknown())?,
                        max_range: max_range.parse().map_err(|_| unknown())?,
                    })
                } else {
                    Err(unknown())
                }
            }
        }
    }
}

impl fmt::Display for Distrib {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Distrib::Seq => write!(f, "seq"),
            Distrib::Unif => write!(f, "unif"),
            Distrib::Zipf { theta } => write!(f, "zipf:{theta}"),
            Distrib::Scan { theta, max_range } => write!(f, "scan:{theta}:{max_range}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grammar_round_trips() {
        for s in ["seq", "unif", "zipf:0.99", "scan:0.5:100"] {
            let d: Distrib = s.parse().unwrap();
            assert_eq!(d.to_string(), s);
        }
    }

    #[test]
    fn rejects_unknown_forms() {
        assert!("zipf".parse::<Distrib>().is_err());
        assert!("scan:0.5".parse::<Distrib>().is_err());
        assert!("pareto:1".parse::<Distrib>().is_err());
    }
}
