//! 거래 데이터셋 로드.
//!
//! 수집 계층이 정제한 거래 기록을 JSON 배열로 읽습니다.
//!
//! ```json
//! [
//!   {
//!     "entity_id": "광어",
//!     "timestamp": "2024-03-02",
//!     "price": 15200.0,
//!     "attributes": { "species": "광어", "origin": "제주", "grade": "대", "package": "kg" },
//!     "numeric_attributes": { "quantity": 12.0, "weight": 1.4 }
//!   }
//! ]
//! ```

use anyhow::{Context, Result};
use auction_core::TransactionRecord;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::info;

/// JSON 파일에서 거래 기록을 읽습니다.
pub fn load_records(path: &Path) -> Result<Vec<TransactionRecord>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open dataset: {}", path.display()))?;

    let records: Vec<TransactionRecord> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse dataset: {}", path.display()))?;

    let invalid = records.iter().filter(|r| !r.has_valid_price()).count();
    info!(
        path = %path.display(),
        records = records.len(),
        invalid_price = invalid,
        "데이터셋 로드 완료"
    );

    Ok(records)
}
