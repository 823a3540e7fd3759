// SPDX-License-Identifier: Apache-2.0

//! Parsing and formatting of scalars with `K/M/G/Ki/Mi/Gi` unit suffixes.
//!
//! Resource strings distinguish two scalings: byte-denominated fields
//! (cache size) are *binary*-scaled, where `K`, `M`, `G` are shorthand for
//! `Ki`, `Mi`, `Gi` (multiples of 1024), while rate fields (RCU/WCU) are
//! *decimal*-scaled and reject the `i` suffixes outright.

use crate::error::Error;

/// Which multiplier family a field uses for its unit suffixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitScale {
    /// 1024-based; `K` and `Ki` both mean 1024.
    Binary,
    /// 1000-based; `Ki/Mi/Gi` are rejected.
    Decimal,
}

impl UnitScale {
    fn degree(self) -> f64 {
        match self {
            UnitScale::Binary => 1024.0,
            UnitScale::Decimal => 1000.0,
        }
    }
}

/// Parse a scalar with an optional `K/M/G/Ki/Mi/Gi` suffix.
///
/// Bare numbers are accepted as-is. Suffix letters are case-insensitive in
/// their first character (`k`, `m`, `g`), matching the workload-string
/// grammar.
pub fn parse_human(input: &str, scale: UnitScale) -> Result<f64, Error> {
    let s = input.trim();
    let (digits, exponent, suffix) = if let Some(rest) = strip_suffix_ci(s, "Gi") {
        (rest, 3, "Gi")
    } else if let Some(rest) = strip_suffix_ci(s, "Mi") {
        (rest, 2, "Mi")
    } else if let Some(rest) = strip_suffix_ci(s, "Ki") {
        (rest, 1, "Ki")
    } else if let Some(rest) = strip_suffix_ci(s, "G") {
        (rest, 3, "G")
    } else if let Some(rest) = strip_suffix_ci(s, "M") {
        (rest, 2, "M")
    } else if let Some(rest) = strip_suffix_ci(s, "K") {
        (rest, 1, "K")
    } else {
        (s, 0, "")
    };

    if suffix.len() == 2 && scale == UnitScale::Decimal {
        return Err(Error::BinaryUnitOnDecimalField {
            input: input.to_string(),
            suffix: suffix.to_string(),
        });
    }

    let base: f64 = digits.parse().map_err(|e| Error::InvalidScalar {
        input: input.to_string(),
        reason: format!("{e}"),
    })?;
    if !base.is_finite() {
        return Err(Error::InvalidScalar {
            input: input.to_string(),
            reason: "not a finite number".to_string(),
        });
    }
    Ok(base * scale.degree().powi(exponent))
}

/// Parse a scalar and truncate it to an integer byte count.
pub fn parse_human_u64(input: &str, scale: UnitScale) -> Result<u64, Error> {
    let v = parse_human(input, scale)?;
    if v < 0.0 {
        return Err(Error::InvalidScalar {
            input: input.to_string(),
            reason: "negative value".to_string(),
        });
    }
    Ok(v as u64)
}

/// Format a scalar with the largest suffix that represents it exactly.
///
/// Values that are not an exact multiple of any unit are printed bare, so
/// `parse_human(&to_human(v, s), s) == v` always holds.
pub fn to_human(value: f64, scale: UnitScale) -> String {
    let degree = scale.degree();
    for (exp, suffix) in [(3, "G"), (2, "M"), (1, "K")] {
        let unit = degree.powi(exp);
        let scaled = value / unit;
        if scaled != 0.0 && scaled.fract() == 0.0 {
            return format!("{scaled}{suffix}");
        }
    }
    format!("{value}")
}

/// Lossy human-readable rendering used in log lines (two decimals, 1024
/// steps), mirroring how allocation decisions are reported.
pub fn to_human_approx(value: f64) -> String {
    if value >= 1024.0 * 1024.0 {
        format!("{:.2}M", value / 1024.0 / 1024.0)
    } else if value >= 1024.0 {
        format!("{:.2}K", value / 1024.0)
    } else {
        format!("{value}")
    }
}

fn strip_suffix_ci<'a>(s: &'a str, suffix: &str) -> Option<&'a str> {
    if s.len() < suffix.len() {
        return None;
    }
    let (head, tail) = s.split_at(s.len() - suffix.len());
    if tail.eq_ignore_ascii_case(suffix) {
        Some(head)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_numbers_parse() {
        assert_eq!(parse_human("1234", UnitScale::Binary).unwrap(), 1234.0);
        assert_eq!(parse_human("0.5", UnitScale::Decimal).unwrap(), 0.5);
    }

    #[test]
    fn binary_scale_treats_k_as_ki() {
        assert_eq!(parse_human("1K", UnitScale::Binary).unwrap(), 1024.0);
        assert_eq!(parse_human("1Ki", UnitScale::Binary).unwrap(), 1024.0);
        assert_eq!(
            parse_human("2G", UnitScale::Binary).unwrap(),
            2.0 * 1024.0 * 1024.0 * 1024.0
        );
    }

    #[test]
    fn decimal_scale_uses_powers_of_ten() {
        assert_eq!(parse_human("3K", UnitScale::Decimal).unwrap(), 3000.0);
        assert_eq!(parse_human("1M", UnitScale::Decimal).unwrap(), 1_000_000.0);
    }

    #[test]
    fn binary_suffix_rejected_on_decimal_field() {
        let err = parse_human("1Ki", UnitScale::Decimal).unwrap_err();
        assert!(matches!(err, Error::BinaryUnitOnDecimalField { .. }));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_human("12x4", UnitScale::Binary).is_err());
        assert!(parse_human("", UnitScale::Decimal).is_err());
    }

    #[test]
    fn to_human_round_trips() {
        for v in [1.0, 17.0, 1024.0, 1536.0, 10.0 * 1024.0 * 1024.0, 3.5] {
            let s = to_human(v, UnitScale::Binary);
            assert_eq!(parse_human(&s, UnitScale::Binary).unwrap(), v, "via {s}");
        }
        for v in [1.0, 1000.0, 2_500_000.0, 123.0] {
            let s = to_human(v, UnitScale::Decimal);
            assert_eq!(parse_human(&s, UnitScale::Decimal).unwrap(), v, "via {s}");
        }
    }

    #[test]
    fn exact_multiples_use_suffix() {
        assert_eq!(to_human(2048.0, UnitScale::Binary), "2K");
        assert_eq!(to_human(1_000_000.0, UnitScale::Decimal), "1M");
        assert_eq!(to_human(1500.0, UnitScale::Binary), "1500");
    }
}
