//! Piecewise sensitivity curves of the current transformer front end.
//!
//! Each curve maps an RMS voltage seen on the current channel (in volts,
//! before conversion) to the sensor sensitivity in V/A. Dividing the channel
//! voltage by that factor gives amperes.
//!
//! Several curves exist because the meter variants were tuned separately.
//! They differ at a handful of breakpoints and are kept as distinct tables.

use self::UpperBound::{AtMost, Below};

/// Upper edge of a band. Bands are checked in order, so each band's lower
/// edge is the complement of the previous band's upper edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UpperBound {
    /// `x < limit`
    Below(f64),
    /// `x <= limit`
    AtMost(f64),
}

impl UpperBound {
    fn contains(&self, x: f64) -> bool {
        match *self {
            UpperBound::Below(limit) => x < limit,
            UpperBound::AtMost(limit) => x <= limit,
        }
    }

    pub fn limit(&self) -> f64 {
        match *self {
            UpperBound::Below(limit) | UpperBound::AtMost(limit) => limit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub upper: UpperBound,
    pub factor: f64,
}

const fn band(upper: UpperBound, factor: f64) -> Band {
    Band { upper, factor }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensitivityTable {
    pub name: &'static str,
    pub bands: &'static [Band],
    /// Factor for anything above the last band (and for NaN input).
    pub fallback: f64,
}

/// Curve used for the running per-sample estimate in every two-channel meter.
pub const TABLE_A: SensitivityTable = SensitivityTable {
    name: "A",
    bands: &[
        band(AtMost(0.06), 1.0),
        band(Below(0.19), 0.352),
        band(Below(0.21), 0.1584),
        band(Below(0.25), 0.1491),
        band(Below(0.29), 0.1393),
        band(AtMost(0.39), 0.1953),
        band(AtMost(0.5), 0.1255),
        band(AtMost(0.61), 0.1121),
        band(AtMost(0.79), 0.101),
    ],
    fallback: 0.0907,
};

/// Window-final curve of the telemetry meter. Same as [`TABLE_A`] except the
/// 0.1393/0.1953 edge sits at 0.288 and the 0.1953/0.1255 edge at 0.4.
pub const TABLE_B: SensitivityTable = SensitivityTable {
    name: "B",
    bands: &[
        band(AtMost(0.06), 1.0),
        band(Below(0.19), 0.352),
        band(Below(0.21), 0.1584),
        band(Below(0.25), 0.1491),
        band(Below(0.288), 0.1393),
        band(AtMost(0.4), 0.1953),
        band(AtMost(0.5), 0.1255),
        band(AtMost(0.61), 0.1121),
        band(AtMost(0.79), 0.101),
    ],
    fallback: 0.0907,
};

/// Coarse three-step curve of the single-channel current meter.
pub const TABLE_C: SensitivityTable = SensitivityTable {
    name: "C",
    bands: &[band(Below(0.2), 0.27), band(AtMost(0.4), 0.14)],
    fallback: 0.132,
};

impl SensitivityTable {
    pub fn sensitivity(&self, vrms: f64) -> f64 {
        self.bands
            .iter()
            .find(|b| b.upper.contains(vrms))
            .map_or(self.fallback, |b| b.factor)
    }

    /// Converts an RMS channel voltage to amperes.
    pub fn to_amps(&self, vrms: f64) -> f64 {
        vrms / self.sensitivity(vrms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn all_factors(table: &SensitivityTable) -> Vec<f64> {
        let mut factors: Vec<f64> = table.bands.iter().map(|b| b.factor).collect();
        factors.push(table.fallback);
        factors
    }

    #[test]
    fn test_table_a_every_band() {
        let cases = [
            (0.0, 1.0),
            (0.06, 1.0),
            (0.06 + EPS, 0.352),
            (0.19 - EPS, 0.352),
            (0.19, 0.1584),
            (0.21 - EPS, 0.1584),
            (0.21, 0.1491),
            (0.25 - EPS, 0.1491),
            (0.25, 0.1393),
            (0.29 - EPS, 0.1393),
            (0.29, 0.1953),
            (0.39, 0.1953),
            (0.39 + EPS, 0.1255),
            (0.5, 0.1255),
            (0.5 + EPS, 0.1121),
            (0.61, 0.1121),
            (0.61 + EPS, 0.101),
            (0.79, 0.101),
            (0.79 + EPS, 0.0907),
            (5.0, 0.0907),
        ];
        for (x, expected) in cases {
            assert_eq!(TABLE_A.sensitivity(x), expected, "table A at {x}");
        }
    }

    #[test]
    fn test_table_b_every_band() {
        let cases = [
            (0.06, 1.0),
            (0.06 + EPS, 0.352),
            (0.19, 0.1584),
            (0.21, 0.1491),
            (0.25, 0.1393),
            (0.288 - EPS, 0.1393),
            (0.288, 0.1953),
            (0.4, 0.1953),
            (0.4 + EPS, 0.1255),
            (0.5, 0.1255),
            (0.5 + EPS, 0.1121),
            (0.61, 0.1121),
            (0.61 + EPS, 0.101),
            (0.79, 0.101),
            (0.79 + EPS, 0.0907),
        ];
        for (x, expected) in cases {
            assert_eq!(TABLE_B.sensitivity(x), expected, "table B at {x}");
        }
    }

    #[test]
    fn test_tables_a_and_b_diverge_only_at_drifted_edges() {
        // Between 0.288 and 0.29 and between 0.39 and 0.4 the tables disagree
        assert_eq!(TABLE_A.sensitivity(0.289), 0.1393);
        assert_eq!(TABLE_B.sensitivity(0.289), 0.1953);
        assert_eq!(TABLE_A.sensitivity(0.395), 0.1255);
        assert_eq!(TABLE_B.sensitivity(0.395), 0.1953);

        for x in [0.05, 0.1, 0.2, 0.22, 0.27, 0.3, 0.45, 0.55, 0.7, 1.0] {
            assert_eq!(TABLE_A.sensitivity(x), TABLE_B.sensitivity(x), "at {x}");
        }
    }

    #[test]
    fn test_table_c_bands() {
        assert_eq!(TABLE_C.sensitivity(0.0), 0.27);
        assert_eq!(TABLE_C.sensitivity(0.2 - EPS), 0.27);
        assert_eq!(TABLE_C.sensitivity(0.2), 0.14);
        assert_eq!(TABLE_C.sensitivity(0.4), 0.14);
        assert_eq!(TABLE_C.sensitivity(0.4 + EPS), 0.132);
        assert_eq!(TABLE_C.sensitivity(3.0), 0.132);
    }

    #[test]
    fn test_boundary_019_selects_01584() {
        assert_eq!(TABLE_A.sensitivity(0.19), 0.1584);
        assert_eq!(TABLE_B.sensitivity(0.19), 0.1584);
    }

    #[test]
    fn test_output_always_from_table() {
        for table in [TABLE_A, TABLE_B, TABLE_C] {
            let factors = all_factors(&table);
            let mut x = -0.1;
            while x < 1.5 {
                let s = table.sensitivity(x);
                assert!(factors.contains(&s), "table {} gave {s} at {x}", table.name);
                x += 0.0007;
            }
            assert!(factors.contains(&table.sensitivity(f64::NAN)));
            assert!(factors.contains(&table.sensitivity(f64::INFINITY)));
        }
    }

    #[test]
    fn test_band_limits_increase() {
        for table in [TABLE_A, TABLE_B, TABLE_C] {
            let limits: Vec<f64> = table.bands.iter().map(|b| b.upper.limit()).collect();
            assert!(limits.windows(2).all(|w| w[0] < w[1]), "table {}", table.name);
        }
    }

    #[test]
    fn test_to_amps() {
        let amps = TABLE_A.to_amps(0.2);
        assert!((amps - 0.2 / 0.1584).abs() < 1e-12);
    }
}
