use chrono::{DateTime, Local};

/// Time source for transaction timestamps and window checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

/// Append-only store for the per-minute revenue lines.
///
/// Implementations are called while the ledger lock is held and must not
/// keep a long-lived handle between calls.
pub trait RevenueLog: Send + Sync {
    fn append_line(&self, line: &str) -> std::io::Result<()>;
    fn read_all(&self) -> std::io::Result<String>;
}
