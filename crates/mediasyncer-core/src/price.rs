//! Pluggable, pure price formulas: `(file, stats, free_space) -> Price`.
//!
//! Formulas never read a process-wide clock or RNG directly — both are injected — so
//! they stay deterministic and unit-testable (Random excepted, by design).

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

use crate::ids::{ByteSize, FileId, Price, PRICE_NOT_INTERESTED};
use crate::stats::FileStats;

/// A function telling a formula "what time is it". Inject `Arc::new(Utc::now)` in
/// production, a fixed closure in tests.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub trait PriceFormula: Send + Sync {
    fn price(&self, file: &FileId, stats: &FileStats, free_space: ByteSize) -> Price;
}

/// Always returns the same price, regardless of input.
pub struct StaticPrice(pub Price);

impl PriceFormula for StaticPrice {
    fn price(&self, _file: &FileId, _stats: &FileStats, _free_space: ByteSize) -> Price {
        self.0
    }
}

/// Returns a uniform random price in `[0, 2)`.
pub struct RandomPrice;

impl PriceFormula for RandomPrice {
    fn price(&self, _file: &FileId, _stats: &FileStats, _free_space: ByteSize) -> Price {
        rand::rng().random_range(0.0..2.0)
    }
}

/// Bids `age_price` once a file crosses an age boundary (older or younger, depending on
/// `prefer_older`), `default_price` otherwise, and `-1` (no bid) if `mod_time` is absent.
pub struct AgePrice {
    pub prefer_older: bool,
    pub age_threshold: Duration,
    pub age_price: Price,
    pub default_price: Price,
    pub clock: Clock,
}

impl PriceFormula for AgePrice {
    fn price(&self, _file: &FileId, stats: &FileStats, _free_space: ByteSize) -> Price {
        let Some(mod_time) = stats.mod_time else {
            return PRICE_NOT_INTERESTED;
        };

        let boundary = (self.clock)() - self.age_threshold;
        if self.prefer_older && mod_time < boundary {
            return self.age_price;
        }
        if !self.prefer_older && mod_time > boundary {
            return self.age_price;
        }
        self.default_price
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_clock(t: DateTime<Utc>) -> Clock {
        Arc::new(move || t)
    }

    fn file() -> FileId {
        FileId::new("vol1", "/testing.txt")
    }

    #[test]
    fn static_price_always_returns_configured_value() {
        let formula = StaticPrice(0.75);
        let stats = FileStats::new(10, None);
        for free in [0u64, 1024, u64::MAX] {
            assert_eq!(formula.price(&file(), &stats, free), 0.75);
        }
    }

    #[test]
    fn age_price_without_mod_time_is_not_interested() {
        let now = Utc.with_ymd_and_hms(2016, 1, 1, 0, 0, 0).unwrap();
        let formula = AgePrice {
            prefer_older: true,
            age_threshold: Duration::days(60),
            age_price: 1.0,
            default_price: 0.5,
            clock: fixed_clock(now),
        };
        let stats = FileStats::new(10, None);
        assert_eq!(formula.price(&file(), &stats, 1024), PRICE_NOT_INTERESTED);
    }

    #[test]
    fn age_price_prefer_older_bids_age_price_past_boundary() {
        let now = Utc.with_ymd_and_hms(2016, 1, 1, 0, 0, 0).unwrap();
        let formula = AgePrice {
            prefer_older: true,
            age_threshold: Duration::days(60),
            age_price: 1.0,
            default_price: 0.5,
            clock: fixed_clock(now),
        };
        let old_mod_time = now - Duration::days(90);
        let stats = FileStats::new(10, Some(old_mod_time));
        assert_eq!(formula.price(&file(), &stats, 1024), 1.0);
    }

    #[test]
    fn age_price_prefer_older_bids_default_before_boundary() {
        let now = Utc.with_ymd_and_hms(2016, 1, 1, 0, 0, 0).unwrap();
        let formula = AgePrice {
            prefer_older: true,
            age_threshold: Duration::days(60),
            age_price: 1.0,
            default_price: 0.5,
            clock: fixed_clock(now),
        };
        let fresh_mod_time = now - Duration::days(10);
        let stats = FileStats::new(10, Some(fresh_mod_time));
        assert_eq!(formula.price(&file(), &stats, 1024), 0.5);
    }

    #[test]
    fn age_price_prefer_younger_bids_age_price_before_boundary() {
        let now = Utc.with_ymd_and_hms(2016, 1, 1, 0, 0, 0).unwrap();
        let formula = AgePrice {
            prefer_older: false,
            age_threshold: Duration::days(60),
            age_price: 1.0,
            default_price: 0.5,
            clock: fixed_clock(now),
        };
        let fresh_mod_time = now - Duration::days(1);
        let stats = FileStats::new(10, Some(fresh_mod_time));
        assert_eq!(formula.price(&file(), &stats, 1024), 1.0);
    }

    #[test]
    fn age_price_prefer_younger_bids_default_past_boundary() {
        let now = Utc.with_ymd_and_hms(2016, 1, 1, 0, 0, 0).unwrap();
        let formula = AgePrice {
            prefer_older: false,
            age_threshold: Duration::days(60),
            age_price: 1.0,
            default_price: 0.5,
            clock: fixed_clock(now),
        };
        let old_mod_time = now - Duration::days(90);
        let stats = FileStats::new(10, Some(old_mod_time));
        assert_eq!(formula.price(&file(), &stats, 1024), 0.5);
    }

    #[test]
    fn random_price_stays_in_declared_range() {
        let formula = RandomPrice;
        let stats = FileStats::new(10, None);
        for _ in 0..100 {
            let p = formula.price(&file(), &stats, 1024);
            assert!((0.0..2.0).contains(&p));
        }
    }
}
