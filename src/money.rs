//! Swiss franc arithmetic helpers
//!
//! Every printed line of an Offerte must be a multiple of 0.05 CHF on its own,
//! so rounding is applied wherever an amount is finalized, never only on the
//! grand total.

/// Fixed VAT rate applied to the post-discount subtotal
pub const TAX_RATE: f64 = 0.081;

/// Minimum difference between a stored and a computed amount that counts as
/// a manual change
pub const MANUAL_CHANGE_TOLERANCE: f64 = 0.01;

/// Largest amount any price line or total can take
///
/// Far below the range where `f64` stops representing 0.05 steps exactly.
pub const MAX_AMOUNT: f64 = 1e12;

/// Number of 0.05 steps per franc
const STEPS_PER_UNIT: f64 = 20.0;

/// Absorbs binary representation error (12.475 is stored as 12.47499...)
const HALF_UP_EPSILON: f64 = 1e-7;

/// Round to the nearest 0.05, half-up
///
/// Total over every `f64`: NaN yields 0, everything else saturates at
/// ±[`MAX_AMOUNT`] so that overflowing products stay finite.
///
/// # Example
///
/// ```
/// use offerte_engine::money::round5;
///
/// assert_eq!(round5(12.475), 12.50);
/// assert_eq!(round5(12.424), 12.40);
/// ```
pub fn round5(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    let value = value.clamp(-MAX_AMOUNT, MAX_AMOUNT);
    // floor(x + 0.5) rounds .5 upwards
    let steps = (value * STEPS_PER_UNIT + 0.5 + HALF_UP_EPSILON).floor();
    let rounded = steps / STEPS_PER_UNIT;
    // Avoid printing "-0.00"
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Clamp user-provided numbers into the engine's domain
///
/// Negative and non-finite values become 0.
pub fn sanitize(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Whether two amounts differ by at least [`MANUAL_CHANGE_TOLERANCE`]
pub fn differs(stored: f64, computed: f64) -> bool {
    // Amounts are multiples of 0.05 but may carry float noise; compare in
    // hundredths so that exactly 0.01 is on the "differs" side
    let diff_cents = ((stored - computed).abs() * 100.0 * 1e6).round() / 1e6;
    diff_cents >= MANUAL_CHANGE_TOLERANCE * 100.0
}

/// Format an amount as Swiss francs with apostrophe grouping, e.g. `CHF 1'945.80`
pub fn format_chf(amount: f64) -> String {
    let amount = if amount.is_finite() { amount } else { 0.0 };
    let cents = (amount * 100.0).round() as i64;
    let negative = cents < 0;
    let cents = cents.abs();
    let francs = cents / 100;
    let rappen = cents % 100;

    let digits = francs.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push('\'');
        }
        grouped.push(ch);
    }

    format!(
        "CHF {}{}.{:02}",
        if negative { "-" } else { "" },
        grouped,
        rappen
    )
}
