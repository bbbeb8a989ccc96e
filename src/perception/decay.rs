//! Pheromone-style relevance decay.

use serde::{Deserialize, Serialize};

/// Relevance of a freshly observed entity
pub const MAX_PHEROMONE: f64 = 1.0;

/// Amount deposited by one repeat observation
pub const UNIT_QUANTITY: f64 = 1.0;

/// Decaying relevance value.
///
/// Each [`decay`](Self::decay) applies `d = (1 - rho) * d + delta` and clears
/// the pending deposit `delta`. Without deposits the value only ever shrinks.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PheromoneDensity {
    rho: f64,
    value: f64,
    delta: f64,
}

impl PheromoneDensity {
    /// Zero density
    pub fn new(rho: f64) -> Self {
        Self {
            rho,
            value: 0.0,
            delta: 0.0,
        }
    }

    /// Density of something just seen for the first time
    pub fn fresh(rho: f64) -> Self {
        Self {
            rho,
            value: MAX_PHEROMONE,
            delta: 0.0,
        }
    }

    #[inline]
    pub fn value(&self) -> f64 {
        self.value
    }

    #[inline]
    pub fn rho(&self) -> f64 {
        self.rho
    }

    /// Overwrite the current value, dropping any pending deposit
    pub fn set(&mut self, value: f64) {
        self.value = value.max(0.0);
        self.delta = 0.0;
    }

    /// Queue a deposit, applied on the next decay
    pub fn add(&mut self, quantity: f64) {
        self.delta += quantity;
    }

    pub fn reset(&mut self) {
        self.value = 0.0;
        self.delta = 0.0;
    }

    /// One time unit of decay
    pub fn decay(&mut self) -> f64 {
        self.value = ((1.0 - self.rho) * self.value + self.delta).max(0.0);
        self.delta = 0.0;
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decay_is_monotone_without_deposits() {
        let mut d = PheromoneDensity::fresh(0.1);
        let mut prev = d.value();
        for _ in 0..200 {
            let v = d.decay();
            assert!(v <= prev);
            assert!(v >= 0.0);
            prev = v;
        }
        assert!(prev < 0.01);
    }

    #[test]
    fn test_zero_rho_holds() {
        let mut d = PheromoneDensity::fresh(0.0);
        d.decay();
        d.decay();
        assert_eq!(d.value(), 1.0);
    }

    #[test]
    fn test_deposit_applied_on_next_decay() {
        let mut d = PheromoneDensity::fresh(0.5);
        d.add(UNIT_QUANTITY);
        assert_eq!(d.value(), 1.0);
        assert_eq!(d.decay(), 1.5);
        assert_eq!(d.decay(), 0.75);
    }

    #[test]
    fn test_set_clears_pending_deposit() {
        let mut d = PheromoneDensity::new(0.2);
        d.add(3.0);
        d.set(MAX_PHEROMONE);
        assert!((d.decay() - 0.8).abs() < 1e-12);
    }
}
