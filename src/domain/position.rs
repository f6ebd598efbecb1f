//! Holdings of a single instrument.

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub amount: f64,
    /// Price at the most recent fill or mark, used when no fresh quote exists.
    pub last_price: f64,
}

impl Position {
    pub fn new(amount: f64, price: f64) -> Self {
        Position {
            amount,
            last_price: price,
        }
    }

    pub fn market_value(&self) -> f64 {
        self.amount * self.last_price
    }
}
