//! 모델 캐시 무효화.

use anyhow::{Context, Result};
use auction_analytics::ml::PriceService;
use std::io::Write;

/// 무효화 대상.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidateTarget {
    /// 엔티티 시계열 모델
    Entity(String),
    /// 공유 가격 추정 파이프라인
    Pipeline,
}

/// 대상 캐시 슬롯을 삭제하고 실제로 삭제된 슬롯 수를 반환합니다.
pub fn invalidate<W: Write>(
    service: &mut PriceService,
    targets: &[InvalidateTarget],
    out: &mut W,
) -> Result<usize> {
    let mut removed = 0;
    for target in targets {
        let deleted = match target {
            InvalidateTarget::Entity(entity) => service
                .invalidate_entity(entity)
                .with_context(|| format!("Failed to invalidate model for '{}'", entity))?,
            InvalidateTarget::Pipeline => service
                .invalidate_point_model()
                .context("Failed to invalidate pipeline")?,
        };
        if deleted {
            removed += 1;
        }
        writeln!(
            out,
            "{} {:?}",
            if deleted { "🗑️  삭제:" } else { "ℹ️  없음:" },
            target
        )?;
    }
    writeln!(out, "\n{}개 캐시 파일 삭제", removed)?;
    Ok(removed)
}
