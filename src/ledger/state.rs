//! Unit-of-work lifecycle
//!
//! ```text
//! OPEN ──commit──▶ COMMITTED
//!   │
//!   └──rollback / drop──▶ ABORTED
//! ```

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitOfWorkState {
    /// Writes are pending and invisible to other units of work
    Open,
    /// Terminal: all writes became visible together
    Committed,
    /// Terminal: no write became visible
    Aborted,
}

impl UnitOfWorkState {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, UnitOfWorkState::Open)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UnitOfWorkState::Open => "OPEN",
            UnitOfWorkState::Committed => "COMMITTED",
            UnitOfWorkState::Aborted => "ABORTED",
        }
    }
}

impl fmt::Display for UnitOfWorkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
