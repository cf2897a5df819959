use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::money::{differs, round5, sanitize};

/// Manual quantity overrides; `None` means "use the computed value"
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
pub struct Overrides {
    #[serde(default)]
    pub hours_override: Option<f64>,
    #[serde(default)]
    pub binding_quantity_override: Option<f64>,
}

impl Overrides {
    /// Survey hours override, if set to a usable value
    ///
    /// Negative or non-finite overrides count as absent.
    pub fn hours(&self) -> Option<f64> {
        usable_override(self.hours_override)
    }

    /// Binding quantity override, if set to a usable value
    pub fn binding_quantity(&self) -> Option<f64> {
        usable_override(self.binding_quantity_override)
    }

    /// Drop unusable values so that stored overrides are always meaningful
    pub fn normalized(self) -> Self {
        Self {
            hours_override: self.hours(),
            binding_quantity_override: self.binding_quantity(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hours().is_none() && self.binding_quantity().is_none()
    }
}

fn usable_override(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v >= 0.0)
}

/// Travel and subsistence inputs for the Spesen line
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct ExpenseInputs {
    #[serde(default)]
    pub kilometers: f64,
    #[serde(default)]
    pub travel_time_hours: f64,
    #[serde(default)]
    pub meal_count: u32,
    #[serde(default)]
    pub overnight_count: u32,
    /// Number of site engagements, 1 to 4
    #[serde(default = "default_engagements")]
    pub engagements: u8,
}

pub const MIN_ENGAGEMENTS: u8 = 1;
pub const MAX_ENGAGEMENTS: u8 = 4;

fn default_engagements() -> u8 {
    MIN_ENGAGEMENTS
}

impl Default for ExpenseInputs {
    fn default() -> Self {
        Self {
            kilometers: 0.0,
            travel_time_hours: 0.0,
            meal_count: 0,
            overnight_count: 0,
            engagements: default_engagements(),
        }
    }
}

impl ExpenseInputs {
    /// Clamp every field into its valid range
    pub fn normalized(self) -> Self {
        Self {
            kilometers: sanitize(self.kilometers),
            travel_time_hours: sanitize(self.travel_time_hours),
            meal_count: self.meal_count,
            overnight_count: self.overnight_count,
            engagements: self.engagements.clamp(MIN_ENGAGEMENTS, MAX_ENGAGEMENTS),
        }
    }

    /// True when nothing travel-related was entered
    pub fn has_travel(&self) -> bool {
        self.kilometers > 0.0
            || self.travel_time_hours > 0.0
            || self.meal_count > 0
            || self.overnight_count > 0
    }
}

/// One priced phase: quantity before and after override, and the rounded amount
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
pub struct PhaseResult {
    pub raw_quantity: f64,
    pub effective_quantity: f64,
    pub amount: f64,
}

impl PhaseResult {
    pub fn is_overridden(&self) -> bool {
        (self.raw_quantity - self.effective_quantity).abs() > f64::EPSILON
    }
}

/// Fully itemized output of one calculation pass
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct ComputedResult {
    pub total_object_count: u64,
    pub basics: PhaseResult,
    pub scheduling: PhaseResult,
    /// Quantities are survey hours
    pub survey: PhaseResult,
    pub report: PhaseResult,
    pub control: PhaseResult,
    pub closing: PhaseResult,
    /// Quantities are binding units
    pub material: PhaseResult,
    pub expenses: PhaseResult,
    pub subtotal: f64,
}

impl ComputedResult {
    pub fn amount(&self, field: PriceField) -> f64 {
        match field {
            PriceField::Grundlagen => self.basics.amount,
            PriceField::Termin => self.scheduling.amount,
            PriceField::Aufnahme => self.survey.amount,
            PriceField::Bericht => self.report.amount,
            PriceField::Kontrolle => self.control.amount,
            PriceField::Abschluss => self.closing.amount,
            PriceField::Material => self.material.amount,
            PriceField::Spesen => self.expenses.amount,
            PriceField::Subtotal => self.subtotal,
        }
    }

    /// Proposal price set with the given discount
    pub fn price_set(&self, discount_percent: f64) -> EditablePriceSet {
        let mut prices = EditablePriceSet {
            discount_percent: clamp_discount(discount_percent),
            ..EditablePriceSet::default()
        };
        for field in PriceField::ALL {
            prices.set(field, self.amount(field));
        }
        prices
    }
}

/// Keys of the nine user-facing price lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceField {
    Grundlagen,
    Termin,
    Aufnahme,
    Bericht,
    Kontrolle,
    Abschluss,
    Material,
    Spesen,
    Subtotal,
}

impl PriceField {
    pub const ALL: [PriceField; 9] = [
        PriceField::Grundlagen,
        PriceField::Termin,
        PriceField::Aufnahme,
        PriceField::Bericht,
        PriceField::Kontrolle,
        PriceField::Abschluss,
        PriceField::Material,
        PriceField::Spesen,
        PriceField::Subtotal,
    ];

    /// Every field that contributes to the subtotal
    pub const LINE_ITEMS: [PriceField; 8] = [
        PriceField::Grundlagen,
        PriceField::Termin,
        PriceField::Aufnahme,
        PriceField::Bericht,
        PriceField::Kontrolle,
        PriceField::Abschluss,
        PriceField::Material,
        PriceField::Spesen,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PriceField::Grundlagen => "grundlagen",
            PriceField::Termin => "termin",
            PriceField::Aufnahme => "aufnahme",
            PriceField::Bericht => "bericht",
            PriceField::Kontrolle => "kontrolle",
            PriceField::Abschluss => "abschluss",
            PriceField::Material => "material",
            PriceField::Spesen => "spesen",
            PriceField::Subtotal => "subtotal",
        }
    }

    /// Line label as printed on the Offerte
    pub fn label(&self) -> &'static str {
        match self {
            PriceField::Grundlagen => "Grundlagen",
            PriceField::Termin => "Terminierung",
            PriceField::Aufnahme => "Aufnahme vor Ort",
            PriceField::Bericht => "Bericht",
            PriceField::Kontrolle => "Kontrolle",
            PriceField::Abschluss => "Abschluss",
            PriceField::Material => "Material (USB, Bindung)",
            PriceField::Spesen => "Spesen",
            PriceField::Subtotal => "Zwischentotal",
        }
    }
}

impl fmt::Display for PriceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PriceField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PriceField::ALL
            .into_iter()
            .find(|field| field.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown price field: {}", s))
    }
}

/// The authoritative, persisted pricing of a quote
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
pub struct EditablePriceSet {
    pub grundlagen: f64,
    pub termin: f64,
    pub aufnahme: f64,
    pub bericht: f64,
    pub kontrolle: f64,
    pub abschluss: f64,
    pub material: f64,
    pub spesen: f64,
    pub subtotal: f64,
    #[serde(default)]
    pub discount_percent: f64,
}

impl EditablePriceSet {
    pub fn get(&self, field: PriceField) -> f64 {
        match field {
            PriceField::Grundlagen => self.grundlagen,
            PriceField::Termin => self.termin,
            PriceField::Aufnahme => self.aufnahme,
            PriceField::Bericht => self.bericht,
            PriceField::Kontrolle => self.kontrolle,
            PriceField::Abschluss => self.abschluss,
            PriceField::Material => self.material,
            PriceField::Spesen => self.spesen,
            PriceField::Subtotal => self.subtotal,
        }
    }

    pub fn set(&mut self, field: PriceField, value: f64) {
        let slot = match field {
            PriceField::Grundlagen => &mut self.grundlagen,
            PriceField::Termin => &mut self.termin,
            PriceField::Aufnahme => &mut self.aufnahme,
            PriceField::Bericht => &mut self.bericht,
            PriceField::Kontrolle => &mut self.kontrolle,
            PriceField::Abschluss => &mut self.abschluss,
            PriceField::Material => &mut self.material,
            PriceField::Spesen => &mut self.spesen,
            PriceField::Subtotal => &mut self.subtotal,
        };
        *slot = value;
    }

    /// round5 sum of the eight line items
    pub fn line_items_total(&self) -> f64 {
        round5(PriceField::LINE_ITEMS.iter().map(|f| self.get(*f)).sum())
    }
}

/// Discount percentage clamped to 0..=100
pub fn clamp_discount(percent: f64) -> f64 {
    sanitize(percent).min(100.0)
}

/// Price lines currently holding a human-entered value
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ManualOverrideSet(BTreeSet<PriceField>);

impl ManualOverrideSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark every field whose stored value differs from the computed one
    pub fn derive(stored: &EditablePriceSet, computed: &ComputedResult) -> Self {
        PriceField::ALL
            .into_iter()
            .filter(|field| differs(stored.get(*field), computed.amount(*field)))
            .collect()
    }

    pub fn mark(&mut self, field: PriceField) {
        self.0.insert(field);
    }

    pub fn contains(&self, field: PriceField) -> bool {
        self.0.contains(&field)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn extend(&mut self, other: &ManualOverrideSet) {
        self.0.extend(other.0.iter().copied());
    }

    pub fn iter(&self) -> impl Iterator<Item = PriceField> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<PriceField> for ManualOverrideSet {
    fn from_iter<I: IntoIterator<Item = PriceField>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
