//! Rule-based comfort and air-quality labels.
//!
//! Both classifiers are total: every input maps to exactly one label. The
//! comfort rules are evaluated in a fixed priority order, so overlapping
//! conditions never compete. Air-quality thresholds are data, not code,
//! because two tables are in use (see [`AirQualityRules`]).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---

/// Habitability of a temperature/humidity combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComfortLabel {
    Kering,
    Lembab,
    TerlaluDingin,
    TerlaluPanas,
    Nyaman,
    NyamanLembab,
    NyamanPanas,
    Gerah,
    TidakDiketahui,
}

impl ComfortLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComfortLabel::Kering => "kering",
            ComfortLabel::Lembab => "lembab",
            ComfortLabel::TerlaluDingin => "terlalu_dingin",
            ComfortLabel::TerlaluPanas => "terlalu_panas",
            ComfortLabel::Nyaman => "nyaman",
            ComfortLabel::NyamanLembab => "nyaman_lembab",
            ComfortLabel::NyamanPanas => "nyaman_panas",
            ComfortLabel::Gerah => "gerah",
            ComfortLabel::TidakDiketahui => "tidak_diketahui",
        }
    }
}

impl fmt::Display for ComfortLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of an air-quality index reading, mildest first.
///
/// The derived ordering follows declaration order, so `a < b` means `a` is
/// the less severe tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AirQualityLabel {
    SangatBaik,
    Baik,
    CukupBuruk,
    Buruk,
    Berbahaya,
}

impl AirQualityLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AirQualityLabel::SangatBaik => "sangat_baik",
            AirQualityLabel::Baik => "baik",
            AirQualityLabel::CukupBuruk => "cukup_buruk",
            AirQualityLabel::Buruk => "buruk",
            AirQualityLabel::Berbahaya => "berbahaya",
        }
    }
}

impl fmt::Display for AirQualityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a temperature (°C) and relative humidity (%) pair.
///
/// First matching rule wins:
/// 1. humidity < 30 → `kering`
/// 2. humidity > 80 → `lembab`
/// 3. temperature < 20 → `terlalu_dingin`
/// 4. temperature > 32 → `terlalu_panas`
/// 5. 20..=27 °C, 30..=60 % → `nyaman`
/// 6. 20..=27 °C, (60, 80] % → `nyaman_lembab`
/// 7. (27, 32] °C, 30..=60 % → `nyaman_panas`
/// 8. (27, 32] °C, (60, 80] % → `gerah`
///
/// Anything else (only reachable with NaN inputs) is `tidak_diketahui`.
pub fn classify_comfort(temperature: f64, humidity: f64) -> ComfortLabel {
    // ---
    let mild = (20.0..=27.0).contains(&temperature);
    let warm = temperature > 27.0 && temperature <= 32.0;
    let moderate = (30.0..=60.0).contains(&humidity);
    let damp = humidity > 60.0 && humidity <= 80.0;

    if humidity < 30.0 {
        ComfortLabel::Kering
    } else if humidity > 80.0 {
        ComfortLabel::Lembab
    } else if temperature < 20.0 {
        ComfortLabel::TerlaluDingin
    } else if temperature > 32.0 {
        ComfortLabel::TerlaluPanas
    } else if mild && moderate {
        ComfortLabel::Nyaman
    } else if mild && damp {
        ComfortLabel::NyamanLembab
    } else if warm && moderate {
        ComfortLabel::NyamanPanas
    } else if warm && damp {
        ComfortLabel::Gerah
    } else {
        ComfortLabel::TidakDiketahui
    }
}

/// An ascending threshold table for air-quality labels.
///
/// Each tier covers `aqi <= upper` for the first matching tier; anything
/// above the last bound is `berbahaya`. Bounds must be strictly ascending and
/// labels strictly increasing in severity, which the named tables satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AirQualityRules {
    name: &'static str,
    tiers: &'static [(u32, AirQualityLabel)],
}

impl AirQualityRules {
    /// Table applied by the telemetry receiver when storing readings.
    pub const INGESTION: AirQualityRules = AirQualityRules {
        name: "ingestion",
        tiers: &[
            (500, AirQualityLabel::SangatBaik),
            (650, AirQualityLabel::Baik),
            (800, AirQualityLabel::CukupBuruk),
            (1300, AirQualityLabel::Buruk),
        ],
    };

    /// Table applied to forecast points. It has no `baik` tier: everything
    /// up to 650 is `sangat_baik`.
    pub const TRAINING: AirQualityRules = AirQualityRules {
        name: "training",
        tiers: &[
            (650, AirQualityLabel::SangatBaik),
            (800, AirQualityLabel::CukupBuruk),
            (1300, AirQualityLabel::Buruk),
        ],
    };

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn classify(&self, aqi: u32) -> AirQualityLabel {
        // ---
        self.tiers
            .iter()
            .find(|(upper, _)| aqi <= *upper)
            .map(|(_, label)| *label)
            .unwrap_or(AirQualityLabel::Berbahaya)
    }
}

impl FromStr for AirQualityRules {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ingestion" => Ok(AirQualityRules::INGESTION),
            "training" => Ok(AirQualityRules::TRAINING),
            other => Err(format!(
                "unknown air-quality rule set '{other}' (expected 'ingestion' or 'training')"
            )),
        }
    }
}

/// Classify an air-quality index with the given threshold table.
pub fn classify_air_quality(aqi: u32, rules: &AirQualityRules) -> AirQualityLabel {
    rules.classify(aqi)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_humidity_rules_take_priority() {
        // ---
        // Dry/humid wins even when the temperature is extreme
        assert_eq!(classify_comfort(10.0, 20.0), ComfortLabel::Kering);
        assert_eq!(classify_comfort(40.0, 29.99), ComfortLabel::Kering);
        assert_eq!(classify_comfort(10.0, 90.0), ComfortLabel::Lembab);
        assert_eq!(classify_comfort(40.0, 80.01), ComfortLabel::Lembab);
    }

    #[test]
    fn test_humidity_boundaries() {
        // ---
        // Exactly 30 is not dry, exactly 80 is not humid
        assert_eq!(classify_comfort(25.0, 30.0), ComfortLabel::Nyaman);
        assert_eq!(classify_comfort(25.0, 80.0), ComfortLabel::NyamanLembab);
        assert_eq!(classify_comfort(25.0, 60.0), ComfortLabel::Nyaman);
        assert_eq!(classify_comfort(25.0, 60.5), ComfortLabel::NyamanLembab);
    }

    #[test]
    fn test_temperature_boundaries() {
        // ---
        assert_eq!(classify_comfort(19.99, 50.0), ComfortLabel::TerlaluDingin);
        assert_eq!(classify_comfort(20.0, 50.0), ComfortLabel::Nyaman);
        assert_eq!(classify_comfort(27.0, 50.0), ComfortLabel::Nyaman);
        assert_eq!(classify_comfort(27.01, 50.0), ComfortLabel::NyamanPanas);
        assert_eq!(classify_comfort(32.0, 50.0), ComfortLabel::NyamanPanas);
        assert_eq!(classify_comfort(32.01, 50.0), ComfortLabel::TerlaluPanas);
        assert_eq!(classify_comfort(30.0, 70.0), ComfortLabel::Gerah);
        assert_eq!(classify_comfort(32.0, 80.0), ComfortLabel::Gerah);
    }

    #[test]
    fn test_nan_is_unknown() {
        // ---
        assert_eq!(classify_comfort(f64::NAN, 50.0), ComfortLabel::TidakDiketahui);
        assert_eq!(classify_comfort(25.0, f64::NAN), ComfortLabel::TidakDiketahui);
    }

    #[test]
    fn test_comfort_is_total_over_grid() {
        // ---
        // Every finite pair lands on a concrete label, never the fallback
        for t in (0..=450).map(|t| t as f64 / 10.0) {
            for h in (0..=1000).step_by(5).map(|h| h as f64 / 10.0) {
                assert_ne!(
                    classify_comfort(t, h),
                    ComfortLabel::TidakDiketahui,
                    "({t}, {h}) fell through every rule"
                );
            }
        }
    }

    #[test]
    fn test_ingestion_table() {
        // ---
        let rules = AirQualityRules::INGESTION;
        assert_eq!(rules.classify(0), AirQualityLabel::SangatBaik);
        assert_eq!(rules.classify(500), AirQualityLabel::SangatBaik);
        assert_eq!(rules.classify(501), AirQualityLabel::Baik);
        assert_eq!(rules.classify(650), AirQualityLabel::Baik);
        assert_eq!(rules.classify(651), AirQualityLabel::CukupBuruk);
        assert_eq!(rules.classify(800), AirQualityLabel::CukupBuruk);
        assert_eq!(rules.classify(1300), AirQualityLabel::Buruk);
        assert_eq!(rules.classify(1301), AirQualityLabel::Berbahaya);
        assert_eq!(rules.classify(u32::MAX), AirQualityLabel::Berbahaya);
    }

    #[test]
    fn test_training_table_has_no_baik_tier() {
        // ---
        let rules = AirQualityRules::TRAINING;
        assert_eq!(rules.classify(501), AirQualityLabel::SangatBaik);
        assert_eq!(rules.classify(650), AirQualityLabel::SangatBaik);
        assert_eq!(rules.classify(651), AirQualityLabel::CukupBuruk);
        assert!((0..5000).all(|aqi| rules.classify(aqi) != AirQualityLabel::Baik));
    }

    #[test]
    fn test_severity_is_monotonic() {
        // ---
        for rules in [AirQualityRules::INGESTION, AirQualityRules::TRAINING] {
            let mut previous = rules.classify(0);
            for aqi in 1..3000 {
                let current = classify_air_quality(aqi, &rules);
                assert!(
                    current >= previous,
                    "{} table: severity dropped at {aqi}",
                    rules.name()
                );
                previous = current;
            }
        }
    }

    #[test]
    fn test_rules_from_str() {
        // ---
        assert_eq!("ingestion".parse::<AirQualityRules>(), Ok(AirQualityRules::INGESTION));
        assert_eq!(" Training ".parse::<AirQualityRules>(), Ok(AirQualityRules::TRAINING));
        assert!("strict".parse::<AirQualityRules>().is_err());
    }

    #[test]
    fn test_label_tags() {
        // ---
        assert_eq!(ComfortLabel::TerlaluDingin.to_string(), "terlalu_dingin");
        assert_eq!(AirQualityLabel::CukupBuruk.to_string(), "cukup_buruk");
        assert_eq!(
            serde_json::to_string(&ComfortLabel::NyamanLembab).unwrap(),
            "\"nyaman_lembab\""
        );
        assert_eq!(
            serde_json::to_string(&AirQualityLabel::SangatBaik).unwrap(),
            "\"sangat_baik\""
        );
    }
}
