//! 데이터셋의 엔티티 목록과 최근 월평균 가격.

use crate::commands::output::{format_won, OutputFormat};
use anyhow::Result;
use auction_analytics::ml::PriceService;
use chrono::NaiveDate;
use serde::Serialize;
use std::io::Write;

/// 엔티티 요약.
#[derive(Debug, Clone, Serialize)]
pub struct EntitySummary {
    pub entity_id: String,
    pub observations: usize,
    pub recent: Vec<(NaiveDate, f64)>,
}

/// 엔티티별 관측 수와 최근 `months`개월 월평균을 출력합니다.
pub fn list_entities<W: Write>(
    service: &PriceService,
    months: usize,
    format: OutputFormat,
    out: &mut W,
) -> Result<Vec<EntitySummary>> {
    let summaries: Vec<EntitySummary> = service
        .entities()
        .into_iter()
        .map(|entity_id| EntitySummary {
            observations: service.history(&entity_id).len(),
            recent: service.recent_history(&entity_id, months),
            entity_id,
        })
        .collect();

    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &summaries)?;
            writeln!(out)?;
        }
        OutputFormat::Csv => {
            writeln!(out, "entity_id,month,mean_price")?;
            for summary in &summaries {
                for (month, price) in &summary.recent {
                    writeln!(out, "{},{},{:.2}", summary.entity_id, month.format("%Y-%m"), price)?;
                }
            }
        }
        OutputFormat::Table => {
            writeln!(out, "\n{:<16} {:>8}  최근 월평균", "엔티티", "관측 수")?;
            writeln!(out, "{}", "-".repeat(60))?;
            for summary in &summaries {
                let recent: Vec<String> = summary
                    .recent
                    .iter()
                    .map(|(month, price)| format!("{} {}", month.format("%y.%m"), format_won(*price)))
                    .collect();
                writeln!(
                    out,
                    "{:<16} {:>8}  {}",
                    summary.entity_id,
                    summary.observations,
                    recent.join(" | ")
                )?;
            }
            writeln!(out, "\n총 {}개 엔티티", summaries.len())?;
        }
    }

    Ok(summaries)
}
