/// Identifies one simulated stream: upper-cased symbol plus verbatim interval.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SimKey {
    pub symbol: String,
    pub interval: String,
}

impl SimKey {
    pub fn new(symbol: &str, interval: &str) -> Self {
        Self {
            symbol: symbol.trim().to_ascii_uppercase(),
            interval: interval.trim().to_string(),
        }
    }

    /// Key used in the persisted progress map, e.g. `AVAXUSDT_1h`.
    pub fn storage_key(&self) -> String {
        format!("{}_{}", self.symbol, self.interval)
    }
}
