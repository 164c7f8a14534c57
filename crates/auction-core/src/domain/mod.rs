//! 도메인 모델.
//!
//! 외부 수집 계층이 정제해서 넘겨주는 경매 거래 데이터를 표현합니다.

mod attributes;
mod record;

pub use attributes::AttributeTuple;
pub use record::{Observation, TransactionRecord};
