//! Black-Scholes pricing and implied-volatility inversion.
//!
//! Dividend-adjusted European pricing plus a bounded, deterministic IV
//! solver: Newton-Raphson on the price error with a vega step, falling back
//! to bisection over the configured volatility domain when the Newton step
//! leaves the domain or vega collapses. Both phases run a fixed maximum
//! number of iterations with an explicit price tolerance, so the solver
//! never loops unboundedly.

use std::f64::consts::PI;

use statrs::distribution::{ContinuousCDF, Normal};

use crate::config::SolverConfig;
use crate::data::OptionType;

/// Black-Scholes calculator.
#[derive(Debug, Clone, Copy)]
pub struct BlackScholes {
    /// Annualized risk-free interest rate.
    pub rate: f64,
    /// Annualized dividend yield.
    pub dividend: f64,
}

impl Default for BlackScholes {
    fn default() -> Self {
        Self {
            rate: 0.05,
            dividend: 0.0,
        }
    }
}

impl BlackScholes {
    pub fn new(rate: f64, dividend: f64) -> Self {
        Self { rate, dividend }
    }

    /// Calculate d1 parameter.
    fn d1(&self, spot: f64, strike: f64, time: f64, vol: f64) -> f64 {
        let numerator =
            (spot / strike).ln() + (self.rate - self.dividend + 0.5 * vol * vol) * time;
        numerator / (vol * time.sqrt())
    }

    /// Calculate d2 parameter.
    fn d2(&self, spot: f64, strike: f64, time: f64, vol: f64) -> f64 {
        self.d1(spot, strike, time, vol) - vol * time.sqrt()
    }

    /// Standard normal CDF.
    fn norm_cdf(x: f64) -> f64 {
        // Normal::new only fails for non-finite parameters
        let normal = Normal::new(0.0, 1.0).unwrap();
        normal.cdf(x)
    }

    /// Standard normal PDF.
    fn norm_pdf(x: f64) -> f64 {
        (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
    }

    /// Calculate call option price.
    pub fn call_price(&self, spot: f64, strike: f64, time: f64, vol: f64) -> f64 {
        if time <= 0.0 {
            return (spot - strike).max(0.0);
        }

        let d1 = self.d1(spot, strike, time, vol);
        let d2 = self.d2(spot, strike, time, vol);

        spot * (-self.dividend * time).exp() * Self::norm_cdf(d1)
            - strike * (-self.rate * time).exp() * Self::norm_cdf(d2)
    }

    /// Calculate put option price.
    pub fn put_price(&self, spot: f64, strike: f64, time: f64, vol: f64) -> f64 {
        if time <= 0.0 {
            return (strike - spot).max(0.0);
        }

        let d1 = self.d1(spot, strike, time, vol);
        let d2 = self.d2(spot, strike, time, vol);

        strike * (-self.rate * time).exp() * Self::norm_cdf(-d2)
            - spot * (-self.dividend * time).exp() * Self::norm_cdf(-d1)
    }

    /// Calculate option price based on type.
    pub fn price(&self, spot: f64, strike: f64, time: f64, vol: f64, opt_type: OptionType) -> f64 {
        match opt_type {
            OptionType::Call => self.call_price(spot, strike, time, vol),
            OptionType::Put => self.put_price(spot, strike, time, vol),
        }
    }

    /// Vega, unscaled (per unit vol move). Used as the Newton derivative.
    fn vega(&self, spot: f64, strike: f64, time: f64, vol: f64) -> f64 {
        spot * (-self.dividend * time).exp()
            * Self::norm_pdf(self.d1(spot, strike, time, vol))
            * time.sqrt()
    }

    /// Solve for the implied volatility that reprices the observed option
    /// value.
    ///
    /// Returns `None` rather than erroring when no volatility in the search
    /// domain can explain the price: expired or same-day contracts
    /// (`time <= 0`), non-positive prices, prices below the discounted
    /// intrinsic value, or failure to converge within the iteration budget.
    /// The caller surfaces these as null fields for the quality layer.
    pub fn implied_vol(
        &self,
        spot: f64,
        strike: f64,
        time: f64,
        price: f64,
        opt_type: OptionType,
        solver: &SolverConfig,
    ) -> Option<f64> {
        if time <= 0.0 || price <= 0.0 || spot <= 0.0 || strike <= 0.0 {
            return None;
        }

        // No-arbitrage floor: below the discounted intrinsic value no
        // volatility can reach the observed price.
        let fwd_intrinsic = opt_type.intrinsic(
            spot * ((self.rate - self.dividend) * time).exp(),
            strike,
        );
        if price < fwd_intrinsic * (-self.rate * time).exp() * 0.99 {
            return None;
        }

        // Initial guess using Brenner-Subrahmanyam approximation
        let mut vol = (price / spot) * (2.0 * PI / time).sqrt();
        vol = vol.clamp(0.01, solver.max_vol);

        for _ in 0..solver.max_iterations {
            let calc_price = self.price(spot, strike, time, vol, opt_type);
            let diff = calc_price - price;

            if diff.abs() < solver.price_tolerance {
                return Some(vol);
            }

            let vega = self.vega(spot, strike, time, vol);
            if vega.abs() < 1e-10 {
                break;
            }

            let next = vol - diff / vega;
            if next <= 0.0 || next > solver.max_vol {
                break;
            }
            vol = next;
        }

        self.bisection_vol(spot, strike, time, price, opt_type, solver)
    }

    /// Bisection fallback over (0, max_vol]. Slower than Newton but immune
    /// to flat-vega regions deep in or out of the money.
    fn bisection_vol(
        &self,
        spot: f64,
        strike: f64,
        time: f64,
        price: f64,
        opt_type: OptionType,
        solver: &SolverConfig,
    ) -> Option<f64> {
        let mut low = 1e-4;
        let mut high = solver.max_vol;

        // Price must be bracketed by the domain endpoints
        if self.price(spot, strike, time, high, opt_type) < price
            || self.price(spot, strike, time, low, opt_type) > price
        {
            return None;
        }

        for _ in 0..solver.max_iterations {
            let mid = (low + high) / 2.0;
            let diff = self.price(spot, strike, time, mid, opt_type) - price;

            if diff.abs() < solver.price_tolerance || (high - low) < 1e-10 {
                return Some(mid);
            }

            if diff > 0.0 {
                high = mid;
            } else {
                low = mid;
            }
        }

        None
    }
}
