use std::fs::OpenOptions;
use std::io::Write;

use anyhow::Result;

use crate::execution::types::Trade;

pub struct CsvLogger {
    log_path: String,
}

impl CsvLogger {
    pub fn new(log_path: String) -> Result<Self> {
        // Create CSV file with headers if it doesn't exist
        if !std::path::Path::new(&log_path).exists() {
            let mut file = OpenOptions::new().create(true).write(true).open(&log_path)?;
            writeln!(
                file,
                "timestamp,city,target_date,bucket,side,entry_price,shares,cost,status,exit_reason,pnl"
            )?;
        }

        Ok(Self { log_path })
    }

    /// Append one trade row; called on open and again on close.
    pub fn log_trade(&self, trade: &Trade) -> Result<()> {
        let mut file = OpenOptions::new().append(true).open(&self.log_path)?;

        let target_date =
            trade.target_date.map(|d| d.to_string()).unwrap_or_default();
        let exit_reason = trade
            .exit_reason
            .map(|r| format!("{:?}", r))
            .unwrap_or_default();
        let pnl = trade.pnl.map(|p| format!("{:.2}", p)).unwrap_or_default();

        writeln!(
            file,
            "{},{},{},{},{},{:.3},{:.2},{:.2},{:?},{},{}",
            trade.timestamp.to_rfc3339(),
            trade.city,
            target_date,
            trade.bucket_label,
            trade.side,
            trade.entry_price,
            trade.shares,
            trade.cost,
            trade.status,
            exit_reason,
            pnl
        )?;

        Ok(())
    }
}
