//! Read-only rendering of the ticker table.

use std::io::Write;
use std::str::FromStr;

use mexcbot_core::{TableName, TickerRow};

/// Errors while writing a dump.
#[derive(Debug, thiserror::Error)]
pub enum DumpError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Output format of a dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Csv,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "table" => Ok(OutputFormat::Text),
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

const HEADERS: [&str; 7] = [
    "symbol",
    "last_price",
    "price_change_percent",
    "high_price",
    "low_price",
    "volume",
    "timestamp",
];

fn cells(row: &TickerRow) -> [String; 7] {
    [
        row.symbol.clone(),
        row.last_price.to_string(),
        row.price_change_percent.to_string(),
        row.high_price.to_string(),
        row.low_price.to_string(),
        row.volume.to_string(),
        row.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
    ]
}

/// Write `rows` to `out` in the requested format.
///
/// An empty table prints a notice in text mode, an empty array in JSON mode,
/// and nothing at all in CSV mode.
pub fn write_rows<W: Write>(
    mut out: W,
    rows: &[TickerRow],
    format: OutputFormat,
    table: &TableName,
) -> Result<(), DumpError> {
    match format {
        OutputFormat::Text => {
            if rows.is_empty() {
                writeln!(out, "No data found in table '{}'.", table)?;
                return Ok(());
            }

            let rendered: Vec<[String; 7]> = rows.iter().map(cells).collect();
            let mut widths = HEADERS.map(str::len);
            for r in &rendered {
                for (w, cell) in widths.iter_mut().zip(r.iter()) {
                    *w = (*w).max(cell.len());
                }
            }

            let line = |cols: Vec<&str>| {
                cols.iter()
                    .zip(widths.iter())
                    .map(|(c, w)| format!("{:<width$}", c, width = *w))
                    .collect::<Vec<_>>()
                    .join("  ")
                    .trim_end()
                    .to_string()
            };

            writeln!(out, "{}", line(HEADERS.to_vec()))?;
            for r in &rendered {
                writeln!(out, "{}", line(r.iter().map(String::as_str).collect()))?;
            }
            writeln!(out, "({} rows)", rows.len())?;
        }
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(out);
            for row in rows {
                writer.serialize(row)?;
            }
            writer.flush()?;
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut out, rows)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn rows() -> Vec<TickerRow> {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap();
        vec![
            TickerRow {
                symbol: "BTCUSDT".into(),
                last_price: dec!(30000.5),
                price_change_percent: dec!(0.012),
                high_price: dec!(30500),
                low_price: dec!(29000),
                volume: dec!(1520.5),
                timestamp: ts,
            },
            TickerRow {
                symbol: "ETHUSDT".into(),
                last_price: dec!(2000),
                price_change_percent: dec!(-0.003),
                high_price: dec!(2100),
                low_price: dec!(1950),
                volume: dec!(80211),
                timestamp: ts,
            },
        ]
    }

    fn render(rows: &[TickerRow], format: OutputFormat) -> String {
        let mut buf = Vec::new();
        write_rows(&mut buf, rows, format, &TableName::default()).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_text_empty_table() {
        assert_eq!(
            render(&[], OutputFormat::Text),
            "No data found in table 'spot_market_data'.\n"
        );
    }

    #[test]
    fn test_text_rows() {
        let out = render(&rows(), OutputFormat::Text);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("symbol   last_price"));
        assert!(lines[1].starts_with("BTCUSDT  30000.5"));
        assert!(lines[1].ends_with("2024-03-01 12:30:00"));
        assert!(lines[2].contains("-0.003"));
        assert_eq!(lines[3], "(2 rows)");
    }

    #[test]
    fn test_csv_rows() {
        let out = render(&rows(), OutputFormat::Csv);
        let mut lines = out.lines();
        assert_eq!(
            lines.next().unwrap(),
            "symbol,last_price,price_change_percent,high_price,low_price,volume,timestamp"
        );
        assert!(lines.next().unwrap().starts_with("BTCUSDT,30000.5,0.012,30500,29000,1520.5,"));
        assert!(render(&[], OutputFormat::Csv).is_empty());
    }

    #[test]
    fn test_json_rows() {
        let out = render(&rows(), OutputFormat::Json);
        let parsed: Vec<TickerRow> = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed, rows());
        assert_eq!(render(&[], OutputFormat::Json).trim(), "[]");
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("CSV".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
        assert_eq!("table".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert!("xml".parse::<OutputFormat>().is_err());
    }
}
