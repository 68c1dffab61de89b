//! Per-contract metric derivation.
//!
//! Every function here is pure: it reads raw fields only, holds no
//! cross-record state, and degrades to `None` instead of erroring on
//! malformed numerics (zero spot, zero open interest, missing quotes).
//! Partial records must still reach the quality report, so nothing in this
//! module filters rows.

use chrono::NaiveDate;
use rayon::prelude::*;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::debug;

use crate::config::PipelineConfig;
use crate::data::OptionContractRecord;

use super::black_scholes::BlackScholes;

/// Days to expiration from the valuation date. Negative for expired
/// contracts; callers surface the sign rather than clamping it.
pub fn compute_dte(expiration: NaiveDate, as_of: NaiveDate) -> i32 {
    (expiration - as_of).num_days() as i32
}

/// Moneyness = strike / spot. `None` when spot is non-positive.
///
/// The normalized form (rather than raw dollar distance) keeps moneyness
/// comparable across tickers with very different price levels.
pub fn compute_moneyness(strike: Decimal, spot: Decimal) -> Option<f64> {
    if spot <= Decimal::ZERO {
        return None;
    }
    (strike / spot).to_f64()
}

/// Mid price = (bid + ask) / 2, exact.
///
/// Computed even when one side is zero: a zero bid is a quality finding,
/// not a computation error.
pub fn compute_mid(bid: Option<Decimal>, ask: Option<Decimal>) -> Option<Decimal> {
    match (bid, ask) {
        (Some(b), Some(a)) => Some((b + a) / Decimal::TWO),
        _ => None,
    }
}

/// Relative bid-ask spread = (ask - bid) / mid. `None` when mid is zero.
///
/// Standard liquidity measure: a $0.20 spread is 20% of a $1.00 mid but
/// only 0.4% of a $50.00 mid.
pub fn compute_spread_pct(
    bid: Option<Decimal>,
    ask: Option<Decimal>,
    mid: Option<Decimal>,
) -> Option<f64> {
    match (bid, ask, mid) {
        (Some(b), Some(a), Some(m)) if m != Decimal::ZERO => ((a - b) / m).to_f64(),
        _ => None,
    }
}

/// Volume / open interest. `None` when open interest is zero.
pub fn compute_volume_oi_ratio(volume: i64, open_interest: i64) -> Option<f64> {
    if open_interest == 0 {
        return None;
    }
    Some(volume as f64 / open_interest as f64)
}

/// Derive all per-contract metrics, returning an augmented copy.
///
/// Raw fields pass through untouched; derived fields are recomputed from
/// raw inputs only, so re-running the engine on its own output yields
/// identical values. The IV inversion uses the mid price, never
/// `last_price`, which can be stale for illiquid contracts and would bias
/// the solve.
pub fn compute_metrics(
    mut record: OptionContractRecord,
    as_of: NaiveDate,
    cfg: &PipelineConfig,
) -> OptionContractRecord {
    let dte = compute_dte(record.expiration, as_of);
    record.dte = Some(dte);

    record.moneyness = compute_moneyness(record.strike, record.spot_price);
    record.mid_price = compute_mid(record.bid, record.ask);
    record.bid_ask_spread_pct = compute_spread_pct(record.bid, record.ask, record.mid_price);
    record.volume_oi_ratio = compute_volume_oi_ratio(record.volume, record.open_interest);

    record.implied_volatility = solve_iv(&record, dte, cfg);

    record
}

/// Invert Black-Scholes at the mid price. `None` when the contract is
/// expired, the mid is non-positive, or the solver cannot converge.
fn solve_iv(record: &OptionContractRecord, dte: i32, cfg: &PipelineConfig) -> Option<f64> {
    if dte <= 0 {
        return None;
    }

    let mid = record.mid_price?.to_f64()?;
    let spot = record.spot_price.to_f64()?;
    let strike = record.strike.to_f64()?;
    if mid <= 0.0 {
        return None;
    }

    let time = f64::from(dte) / 365.0;
    let bs = BlackScholes::new(cfg.risk_free_rate, cfg.dividend_yield);
    bs.implied_vol(spot, strike, time, mid, record.option_type, &cfg.solver)
}

/// Enrich a whole batch. Records are independent, so the map runs across
/// the rayon pool; output order matches input order but nothing downstream
/// depends on it.
pub fn enrich_batch(
    records: Vec<OptionContractRecord>,
    as_of: NaiveDate,
    cfg: &PipelineConfig,
) -> Vec<OptionContractRecord> {
    let total = records.len();
    let enriched: Vec<_> = records
        .into_par_iter()
        .map(|r| compute_metrics(r, as_of, cfg))
        .collect();

    let solved = enriched
        .iter()
        .filter(|r| r.implied_volatility.is_some())
        .count();
    debug!(total, solved, "batch enrichment complete");

    enriched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::OptionType;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
    }

    fn record(bid: Option<Decimal>, ask: Option<Decimal>) -> OptionContractRecord {
        let mut r = OptionContractRecord::new(
            "SPY250702C00500000",
            "SPY",
            NaiveDate::from_ymd_opt(2025, 7, 2).unwrap(),
            OptionType::Call,
            dec!(500),
            dec!(490),
            Utc::now(),
        );
        r.bid = bid;
        r.ask = ask;
        r.volume = 120;
        r.open_interest = 400;
        r
    }

    #[test]
    fn test_dte_signs() {
        let exp = NaiveDate::from_ymd_opt(2025, 7, 2).unwrap();
        assert_eq!(compute_dte(exp, as_of()), 30);
        assert_eq!(compute_dte(exp, exp), 0);
        // Expired contracts surface a negative DTE, never a clamp to zero
        assert_eq!(
            compute_dte(exp, NaiveDate::from_ymd_opt(2025, 7, 5).unwrap()),
            -3
        );
    }

    #[test]
    fn test_moneyness() {
        assert_eq!(compute_moneyness(dec!(100), dec!(100)), Some(1.0));
        assert_eq!(compute_moneyness(dec!(110), dec!(100)), Some(1.1));
        assert_eq!(compute_moneyness(dec!(100), dec!(0)), None);
        assert_eq!(compute_moneyness(dec!(100), dec!(-5)), None);
    }

    #[test]
    fn test_mid_is_exact_including_zero_sides() {
        assert_eq!(
            compute_mid(Some(dec!(0.90)), Some(dec!(1.10))),
            Some(dec!(1.00))
        );
        // One-sided markets still get a mid; the zero side is a quality
        // finding, not a computation error
        assert_eq!(compute_mid(Some(dec!(0)), Some(dec!(3))), Some(dec!(1.5)));
        assert_eq!(compute_mid(None, Some(dec!(1))), None);
    }

    #[test]
    fn test_spread_pct() {
        let mid = compute_mid(Some(dec!(0.90)), Some(dec!(1.10)));
        let spread = compute_spread_pct(Some(dec!(0.90)), Some(dec!(1.10)), mid).unwrap();
        assert!((spread - 0.20).abs() < 1e-12);

        // Zero mid: undefined, not an error
        assert_eq!(
            compute_spread_pct(Some(dec!(0)), Some(dec!(0)), Some(dec!(0))),
            None
        );
    }

    #[test]
    fn test_volume_oi_ratio_zero_oi() {
        assert_eq!(compute_volume_oi_ratio(500, 100), Some(5.0));
        assert_eq!(compute_volume_oi_ratio(500, 0), None);
    }

    #[test]
    fn test_iv_null_for_expired_or_priceless() {
        let cfg = PipelineConfig::default();

        let mut expired = record(Some(dec!(5)), Some(dec!(6)));
        expired.expiration = NaiveDate::from_ymd_opt(2025, 5, 1).unwrap();
        let expired = compute_metrics(expired, as_of(), &cfg);
        assert!(expired.dte.unwrap() < 0);
        assert!(expired.implied_volatility.is_none());

        // Expiration day itself counts as no time value left, even with a
        // live two-sided quote
        let mut same_day = record(Some(dec!(5)), Some(dec!(6)));
        same_day.expiration = as_of();
        let same_day = compute_metrics(same_day, as_of(), &cfg);
        assert_eq!(same_day.dte, Some(0));
        assert!(same_day.implied_volatility.is_none());

        let zero_mid = compute_metrics(record(Some(dec!(0)), Some(dec!(0))), as_of(), &cfg);
        assert_eq!(zero_mid.mid_price, Some(dec!(0)));
        assert!(zero_mid.implied_volatility.is_none());

        let no_quote = compute_metrics(record(None, Some(dec!(2))), as_of(), &cfg);
        assert!(no_quote.mid_price.is_none());
        assert!(no_quote.implied_volatility.is_none());
    }

    #[test]
    fn test_engine_recovers_known_vol() {
        let cfg = PipelineConfig::default();
        let bs = BlackScholes::new(cfg.risk_free_rate, cfg.dividend_yield);

        // Price the contract at a known vol, quote it symmetrically around
        // that value, and check the engine's inversion lands on the vol
        let fair = bs.call_price(490.0, 500.0, 30.0 / 365.0, 0.22);
        let mut r = record(None, None);
        r.bid = Decimal::from_f64_retain(fair).map(|d| d.round_dp(10));
        r.ask = r.bid;

        let out = compute_metrics(r, as_of(), &cfg);
        let iv = out.implied_volatility.expect("solver should converge");
        assert!((iv - 0.22).abs() < 1e-3, "recovered {}", iv);
    }

    #[test]
    fn test_raw_fields_untouched_and_idempotent() {
        let cfg = PipelineConfig::default();
        let input = record(Some(dec!(4.80)), Some(dec!(5.20)));
        let (bid, ask, strike) = (input.bid, input.ask, input.strike);

        let once = compute_metrics(input, as_of(), &cfg);
        assert_eq!(once.bid, bid);
        assert_eq!(once.ask, ask);
        assert_eq!(once.strike, strike);

        let twice = compute_metrics(once.clone(), as_of(), &cfg);
        assert_eq!(once.dte, twice.dte);
        assert_eq!(once.moneyness, twice.moneyness);
        assert_eq!(once.mid_price, twice.mid_price);
        assert_eq!(once.bid_ask_spread_pct, twice.bid_ask_spread_pct);
        assert_eq!(once.volume_oi_ratio, twice.volume_oi_ratio);
        assert_eq!(once.implied_volatility, twice.implied_volatility);
    }

    #[test]
    fn test_enrich_batch_matches_single_records() {
        let cfg = PipelineConfig::default();
        let records = vec![
            record(Some(dec!(4.80)), Some(dec!(5.20))),
            record(Some(dec!(0)), Some(dec!(1))),
            record(None, None),
        ];

        let expected: Vec<_> = records
            .iter()
            .cloned()
            .map(|r| compute_metrics(r, as_of(), &cfg))
            .collect();
        let batch = enrich_batch(records, as_of(), &cfg);

        assert_eq!(batch.len(), expected.len());
        for (a, b) in batch.iter().zip(expected.iter()) {
            assert_eq!(a.implied_volatility, b.implied_volatility);
            assert_eq!(a.mid_price, b.mid_price);
        }
    }
}
