use std::collections::{HashMap, VecDeque};

use crate::types::Symbol;

/// Default number of prices kept per symbol.
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

// ---------------------------------------------------------------------------
// PriceStore -- bounded FIFO ring per tracked symbol
// ---------------------------------------------------------------------------

/// Rolling window of the most recent prices for each tracked symbol.
///
/// The set of symbols is fixed at construction. Pushes for any other symbol
/// are ignored. Each ring holds at most `capacity` prices; the oldest price is
/// evicted first once the ring is full.
#[derive(Debug, Clone)]
pub struct PriceStore {
    rings: HashMap<Symbol, VecDeque<f64>>,
    capacity: usize,
}

impl PriceStore {
    pub fn new<I, S>(symbols: I, capacity: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Symbol>,
    {
        let capacity = capacity.max(1);
        let rings = symbols
            .into_iter()
            .map(|s| (s.into(), VecDeque::with_capacity(capacity + 1)))
            .collect();
        Self { rings, capacity }
    }

    /// Append `price` to the tail of the symbol's ring. Returns `false` when
    /// the symbol is not tracked.
    pub fn push(&mut self, symbol: &str, price: f64) -> bool {
        let Some(ring) = self.rings.get_mut(symbol) else {
            return false;
        };
        ring.push_back(price);
        while ring.len() > self.capacity {
            ring.pop_front();
        }
        true
    }

    /// Prices oldest-first. Empty for unknown symbols.
    pub fn history(&self, symbol: &str) -> Vec<f64> {
        self.rings
            .get(symbol)
            .map(|ring| ring.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn latest(&self, symbol: &str) -> Option<f64> {
        self.rings.get(symbol).and_then(|ring| ring.back().copied())
    }

    /// `(min, max)` over the current window.
    pub fn range(&self, symbol: &str) -> Option<(f64, f64)> {
        price_range(self.rings.get(symbol)?.iter().copied())
    }

    pub fn len(&self, symbol: &str) -> usize {
        self.rings.get(symbol).map_or(0, VecDeque::len)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.rings.contains_key(symbol)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Tracked symbols in no particular order.
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.rings.keys().map(String::as_str)
    }
}

/// `(min, max)` of `prices`, or `None` when there are none.
pub fn price_range(prices: impl IntoIterator<Item = f64>) -> Option<(f64, f64)> {
    let mut prices = prices.into_iter();
    let first = prices.next()?;
    Some(prices.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> PriceStore {
        PriceStore::new(["BTCUSDT", "ETHUSDT"], DEFAULT_HISTORY_CAPACITY)
    }

    #[test]
    fn never_exceeds_capacity_and_keeps_newest() {
        let mut s = store();
        for i in 0..120 {
            s.push("BTCUSDT", 100.0 + i as f64);
            assert!(s.len("BTCUSDT") <= DEFAULT_HISTORY_CAPACITY);
        }
        let history = s.history("BTCUSDT");
        assert_eq!(history.len(), 50);
        assert_eq!(history.first().copied(), Some(170.0));
        assert_eq!(history.last().copied(), Some(219.0));
        assert!(history.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn short_history_is_in_arrival_order() {
        let mut s = store();
        s.push("ETHUSDT", 3.0);
        s.push("ETHUSDT", 1.0);
        s.push("ETHUSDT", 2.0);
        assert_eq!(s.history("ETHUSDT"), vec![3.0, 1.0, 2.0]);
        assert_eq!(s.latest("ETHUSDT"), Some(2.0));
        assert_eq!(s.range("ETHUSDT"), Some((1.0, 3.0)));
    }

    #[test]
    fn unknown_symbol_is_ignored() {
        let mut s = store();
        assert!(!s.push("DOGEUSDT", 1.0));
        assert!(s.history("DOGEUSDT").is_empty());
        assert_eq!(s.latest("DOGEUSDT"), None);
        assert!(!s.contains("DOGEUSDT"));
    }

    #[test]
    fn empty_symbol_has_no_data() {
        let s = store();
        assert_eq!(s.latest("BTCUSDT"), None);
        assert_eq!(s.range("BTCUSDT"), None);
        assert_eq!(s.len("BTCUSDT"), 0);
    }

    #[test]
    fn reports_tracked_symbols_and_capacity() {
        let s = store();
        let mut symbols: Vec<&str> = s.symbols().collect();
        symbols.sort_unstable();
        assert_eq!(symbols, vec!["BTCUSDT", "ETHUSDT"]);
        assert_eq!(s.capacity(), DEFAULT_HISTORY_CAPACITY);
        assert_eq!(PriceStore::new(["A"], 0).capacity(), 1);
    }

    #[test]
    fn range_of_prices() {
        assert_eq!(price_range([]), None);
        assert_eq!(price_range([4.0]), Some((4.0, 4.0)));
        assert_eq!(price_range([3.0, 9.5, 1.25, 7.0]), Some((1.25, 9.5)));
    }

    #[test]
    fn symbols_are_independent() {
        let mut s = PriceStore::new(["A", "B"], 2);
        s.push("A", 1.0);
        s.push("A", 2.0);
        s.push("A", 3.0);
        s.push("B", 9.0);
        assert_eq!(s.history("A"), vec![2.0, 3.0]);
        assert_eq!(s.history("B"), vec![9.0]);
    }
}
