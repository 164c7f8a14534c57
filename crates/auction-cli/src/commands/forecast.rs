//! 어종별 월간 가격 예측 출력.

use crate::commands::output::{format_won, OutputFormat};
use anyhow::{Context, Result};
use auction_analytics::ml::{key_month_summary, ForecastTable, PriceService};
use std::io::Write;
use tracing::info;

/// 예측 명령 설정.
#[derive(Debug, Clone)]
pub struct ForecastCommand {
    /// 엔티티 (어종)
    pub entity: String,
    /// 예측 개월 수
    pub horizon: usize,
    /// 출력 형식
    pub format: OutputFormat,
    /// 주요 월 요약 (None이면 전체 테이블만)
    pub key_months: Option<Vec<u32>>,
}

/// 예측을 실행하고 결과를 출력합니다.
pub fn run_forecast<W: Write>(
    service: &PriceService,
    command: &ForecastCommand,
    out: &mut W,
) -> Result<ForecastTable> {
    let table = service
        .forecast_entity(&command.entity, command.horizon)
        .with_context(|| format!("Forecast failed for '{}'", command.entity))?;

    info!(
        entity = %table.entity_id,
        status = %table.status,
        rows = table.rows.len(),
        "예측 완료"
    );

    match command.format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &table)?;
            writeln!(out)?;
        }
        OutputFormat::Csv => write_csv(&table, out)?,
        OutputFormat::Table => write_table(&table, out)?,
    }

    if let Some(months) = &command.key_months {
        write_key_months(&table, months, out)?;
    }

    Ok(table)
}

fn write_csv<W: Write>(table: &ForecastTable, out: &mut W) -> Result<()> {
    writeln!(out, "month,yhat,yhat_lower,yhat_upper")?;
    for row in &table.rows {
        writeln!(
            out,
            "{},{:.2},{:.2},{:.2}",
            row.month.format("%Y-%m"),
            row.yhat,
            row.yhat_lower,
            row.yhat_upper
        )?;
    }
    Ok(())
}

fn write_table<W: Write>(table: &ForecastTable, out: &mut W) -> Result<()> {
    writeln!(
        out,
        "\n📈 {} 가격 예측 (모델: {}, 마지막 관측: {})",
        table.entity_id,
        table.status,
        table.last_observed.format("%Y-%m")
    )?;
    writeln!(out, "{}", "=".repeat(52))?;
    writeln!(out, "{:<10} {:>12} {:>12} {:>12}", "월", "예측가", "하한", "상한")?;
    writeln!(out, "{}", "-".repeat(52))?;
    for row in &table.rows {
        writeln!(
            out,
            "{:<10} {:>12} {:>12} {:>12}",
            row.month.format("%Y-%m").to_string(),
            format_won(row.yhat),
            format_won(row.yhat_lower),
            format_won(row.yhat_upper)
        )?;
    }
    Ok(())
}

fn write_key_months<W: Write>(table: &ForecastTable, months: &[u32], out: &mut W) -> Result<()> {
    let summary = key_month_summary(&table.rows, months);
    for (year, rows) in &summary {
        writeln!(out, "\n📅 {}년 주요 월", year)?;
        for row in rows {
            let change = row
                .change_pct
                .map(|pct| format!("{:+.1}%", pct))
                .unwrap_or_else(|| "-".to_string());
            writeln!(
                out,
                "  {}: {}원 [{} ~ {}] 전월 대비 {}",
                row.month.format("%m월"),
                format_won(row.yhat),
                format_won(row.yhat_lower),
                format_won(row.yhat_upper),
                change
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use auction_core::{AppConfig, TransactionRecord};
    use chrono::{Months, NaiveDate};

    fn service(dir: &std::path::Path) -> PriceService {
        let mut config = AppConfig::default();
        config.cache.dir = dir.to_path_buf();
        let start = NaiveDate::from_ymd_opt(2023, 1, 10).unwrap();
        let records = (0..18)
            .map(|i| {
                let date = start.checked_add_months(Months::new(i)).unwrap();
                TransactionRecord::new("광어", date, 12_000.0 + (i % 4) as f64 * 100.0)
            })
            .collect();
        PriceService::new(&config, records)
    }

    #[test]
    fn test_forecast_csv_output() {
        let dir = tempfile::tempdir().unwrap();
        let command = ForecastCommand {
            entity: "광어".to_string(),
            horizon: 3,
            format: OutputFormat::Csv,
            key_months: None,
        };
        let mut out = Vec::new();
        let table = run_forecast(&service(dir.path()), &command, &mut out).unwrap();
        assert_eq!(table.rows.len(), 3);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "month,yhat,yhat_lower,yhat_upper");
        assert!(lines[1].starts_with("2024-07,"));
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_forecast_key_months() {
        let dir = tempfile::tempdir().unwrap();
        let command = ForecastCommand {
            entity: "광어".to_string(),
            horizon: 12,
            format: OutputFormat::Table,
            key_months: Some(vec![3, 6, 9, 12]),
        };
        let mut out = Vec::new();
        run_forecast(&service(dir.path()), &command, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("2024년 주요 월"));
        assert!(text.contains("2025년 주요 월"));
    }

    #[test]
    fn test_forecast_unknown_entity() {
        let dir = tempfile::tempdir().unwrap();
        let command = ForecastCommand {
            entity: "참돔".to_string(),
            horizon: 3,
            format: OutputFormat::Table,
            key_months: None,
        };
        let err = run_forecast(&service(dir.path()), &command, &mut Vec::new()).unwrap_err();
        assert!(format!("{:#}", err).contains("Insufficient data"));
    }
}
