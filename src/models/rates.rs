use serde::{Deserialize, Serialize};

/// Rate card for one hourly phase
///
/// Hours for the phase are `base_hours + hours_per_object * object_count`;
/// the survey phase adds the category allowances on top.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
pub struct PhaseRate {
    pub hourly_rate: f64,
    #[serde(default)]
    pub base_hours: f64,
    #[serde(default)]
    pub hours_per_object: f64,
}

impl PhaseRate {
    pub fn hours_for(&self, object_count: u64) -> f64 {
        self.base_hours + self.hours_per_object * object_count as f64
    }
}

/// Rates snapshot used for one calculation pass
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BaseRates {
    /// Grundlagen
    pub basics: PhaseRate,
    /// Termin
    pub scheduling: PhaseRate,
    /// Aufnahme (on-site survey)
    pub survey: PhaseRate,
    /// Bericht
    pub report: PhaseRate,
    /// Kontrolle
    pub control: PhaseRate,
    /// Abschluss
    pub closing: PhaseRate,

    pub usb_flat_fee: f64,
    pub binding_unit_price: f64,

    pub travel_per_km: f64,
    pub travel_hourly_rate: f64,
    pub meal_unit_price: f64,
    pub overnight_unit_price: f64,
    /// Flat fee charged once per site engagement
    #[serde(default)]
    pub engagement_flat_fee: f64,
}

impl BaseRates {
    /// All named rate values, used for validation and display
    pub fn named_values(&self) -> Vec<(&'static str, f64)> {
        let mut values = Vec::with_capacity(26);
        for (name, phase) in self.phases() {
            values.push((name, phase.hourly_rate));
            values.push((name, phase.base_hours));
            values.push((name, phase.hours_per_object));
        }
        values.extend([
            ("usb_flat_fee", self.usb_flat_fee),
            ("binding_unit_price", self.binding_unit_price),
            ("travel_per_km", self.travel_per_km),
            ("travel_hourly_rate", self.travel_hourly_rate),
            ("meal_unit_price", self.meal_unit_price),
            ("overnight_unit_price", self.overnight_unit_price),
            ("engagement_flat_fee", self.engagement_flat_fee),
        ]);
        values
    }

    pub fn phases(&self) -> [(&'static str, &PhaseRate); 6] {
        [
            ("basics", &self.basics),
            ("scheduling", &self.scheduling),
            ("survey", &self.survey),
            ("report", &self.report),
            ("control", &self.control),
            ("closing", &self.closing),
        ]
    }

    /// Reject negative or non-finite rates
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in self.named_values() {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("rate '{}' must be a non-negative number, got {}", name, value));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_rates;

    #[test]
    fn test_phase_hours() {
        let rate = PhaseRate { hourly_rate: 100.0, base_hours: 1.0, hours_per_object: 0.5 };
        assert_eq!(rate.hours_for(0), 1.0);
        assert_eq!(rate.hours_for(4), 3.0);
    }

    #[test]
    fn test_validate_rejects_negative_rate() {
        let mut rates = sample_rates();
        assert!(rates.validate().is_ok());

        rates.control.hourly_rate = -1.0;
        let err = rates.validate().unwrap_err();
        assert!(err.contains("control"));
    }

    #[test]
    fn test_validate_rejects_nan() {
        let mut rates = sample_rates();
        rates.meal_unit_price = f64::NAN;
        assert!(rates.validate().unwrap_err().contains("meal_unit_price"));
    }
}
