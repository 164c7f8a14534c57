//! 속성 기반 가격 추정 출력.

use crate::commands::output::{format_won, OutputFormat};
use anyhow::{Context, Result};
use auction_analytics::ml::{PricePrediction, PriceService};
use auction_core::AttributeTuple;
use std::io::Write;

/// 가격 추정 명령 설정.
#[derive(Debug, Clone)]
pub struct PredictCommand {
    /// `name=value` 속성 목록
    pub attributes: Vec<(String, String)>,
    /// 출력 형식
    pub format: OutputFormat,
    /// 함께 출력할 중요 피처 수 (0이면 생략)
    pub top_features: usize,
}

/// `name=value` 형식의 인자를 파싱합니다.
pub fn parse_attribute(s: &str) -> Result<(String, String)> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("Invalid attribute '{}'. Use name=value", s))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(anyhow::anyhow!("Attribute name is empty in '{}'", s));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

/// 속성 목록으로 튜플을 만듭니다. `numeric`에 있는 이름은 숫자로 파싱합니다.
pub fn build_tuple(attributes: &[(String, String)], numeric: &[String]) -> Result<AttributeTuple> {
    attributes
        .iter()
        .try_fold(AttributeTuple::new(), |tuple, (name, value)| {
            if numeric.iter().any(|n| n == name) {
                let parsed: f64 = value
                    .parse()
                    .with_context(|| format!("Attribute '{}' must be numeric, got '{}'", name, value))?;
                Ok(tuple.with_numeric(name.clone(), parsed))
            } else {
                Ok(tuple.with_category(name.clone(), value.clone()))
            }
        })
}

/// 가격 추정을 실행하고 결과를 출력합니다.
pub fn run_predict<W: Write>(
    service: &PriceService,
    command: &PredictCommand,
    numeric: &[String],
    out: &mut W,
) -> Result<PricePrediction> {
    let tuple = build_tuple(&command.attributes, numeric)?;
    let prediction = service
        .predict_price(&tuple)
        .context("Price estimation failed")?;

    match command.format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &prediction)?;
            writeln!(out)?;
        }
        OutputFormat::Csv => {
            let r = prediction.result;
            writeln!(out, "point,lower,median,upper")?;
            writeln!(out, "{:.2},{:.2},{:.2},{:.2}", r.point, r.lower, r.median, r.upper)?;
        }
        OutputFormat::Table => {
            let r = prediction.result;
            writeln!(out, "\n💰 예상 경락가 (모델: {})", prediction.status)?;
            writeln!(out, "  점 추정 : {}원", format_won(r.point))?;
            writeln!(out, "  중앙값  : {}원", format_won(r.median))?;
            writeln!(
                out,
                "  90% 구간: {}원 ~ {}원",
                format_won(r.lower),
                format_won(r.upper)
            )?;
        }
    }

    if command.top_features > 0 {
        let features = service.feature_importances(command.top_features)?;
        writeln!(out, "\n🔎 주요 피처")?;
        for (rank, feature) in features.iter().enumerate() {
            writeln!(out, "  {:>2}. {:<24} {:.3}", rank + 1, feature.name, feature.importance)?;
        }
    }

    Ok(prediction)
}
