pub mod calculator;
pub mod request;

pub use calculator::{compute, CostCalculator};
pub use request::{Calculation, CalculationRequest};
