use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use crate::execution::types::Portfolio;

/// Single fixed key the whole portfolio document lives under.
const STORAGE_KEY: &str = "weatheredge_portfolio_v2";

/// Whole-state portfolio store. The portfolio is one JSON document in a
/// key/value table: read fully at startup, rewritten in full after every
/// mutation, so a trade open or close is atomic with respect to persistence.
pub struct PortfolioStore {
    conn: Connection,
}

impl PortfolioStore {
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("failed to open portfolio store at {}", db_path))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS bot_state (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;
        Ok(Self { conn })
    }

    /// Load the saved portfolio; absence of saved state yields the defaults
    /// (empty history, default settings, ids starting at 1).
    pub fn load(&self) -> Result<Portfolio> {
        let row: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM bot_state WHERE key = ?1",
                params![STORAGE_KEY],
                |row| row.get(0),
            )
            .optional()?;

        match row {
            Some(json) => serde_json::from_str(&json).context("corrupt portfolio state"),
            None => Ok(Portfolio::default()),
        }
    }

    /// Rewrite the full portfolio document.
    pub fn save(&self, portfolio: &Portfolio) -> Result<()> {
        let json = serde_json::to_string(portfolio).context("failed to serialize portfolio")?;
        self.conn.execute(
            "INSERT OR REPLACE INTO bot_state (key, value) VALUES (?1, ?2)",
            params![STORAGE_KEY, json],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::types::Settings;

    #[test]
    fn test_load_without_saved_state_yields_defaults() {
        let store = PortfolioStore::open_in_memory().unwrap();
        let portfolio = store.load().unwrap();
        assert!(portfolio.trades.is_empty());
        assert_eq!(portfolio.next_trade_id, 1);
        assert_eq!(portfolio.settings.bankroll, Settings::default().bankroll);
    }

    #[test]
    fn test_save_and_reload_round_trip() {
        let store = PortfolioStore::open_in_memory().unwrap();
        let mut portfolio = Portfolio::default();
        portfolio.settings.min_edge = 7.5;
        portfolio.next_trade_id = 42;
        store.save(&portfolio).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.next_trade_id, 42);
        assert_eq!(loaded.settings.min_edge, 7.5);
    }

    #[test]
    fn test_save_overwrites_previous_state() {
        let store = PortfolioStore::open_in_memory().unwrap();
        let mut portfolio = Portfolio::default();
        portfolio.next_trade_id = 2;
        store.save(&portfolio).unwrap();
        portfolio.next_trade_id = 3;
        store.save(&portfolio).unwrap();

        assert_eq!(store.load().unwrap().next_trade_id, 3);
    }

    #[test]
    fn test_corrupt_state_is_an_error_not_a_panic() {
        let store = PortfolioStore::open_in_memory().unwrap();
        store
            .conn
            .execute(
                "INSERT INTO bot_state (key, value) VALUES (?1, ?2)",
                params![STORAGE_KEY, "{not json"],
            )
            .unwrap();
        assert!(store.load().is_err());
    }
}
