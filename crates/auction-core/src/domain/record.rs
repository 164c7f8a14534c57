//! 경매 거래 기록.
//!
//! 이 모듈은 예측 코어의 원천 데이터를 정의합니다:
//! - `TransactionRecord` - 수집 이후 변경되지 않는 거래 한 건
//! - `Observation` - 시계열 예측용 (날짜, 가격) 관측치

use crate::domain::AttributeTuple;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 경매 거래 기록.
///
/// 수집 계층이 정제한 한 행을 나타냅니다. 생성 이후에는 변경하지 않습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// 엔티티 식별자 (예: 어종)
    pub entity_id: String,
    /// 범주형 속성 (산지, 규격, 포장 등)
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// 수치형 속성 (수량, 중량 등)
    #[serde(default)]
    pub numeric_attributes: BTreeMap<String, f64>,
    /// 거래 일자
    pub timestamp: NaiveDate,
    /// 낙찰 평균가 (원)
    pub price: f64,
}

impl TransactionRecord {
    /// 속성이 비어 있는 새 거래 기록을 생성합니다.
    pub fn new(entity_id: impl Into<String>, timestamp: NaiveDate, price: f64) -> Self {
        Self {
            entity_id: entity_id.into(),
            attributes: BTreeMap::new(),
            numeric_attributes: BTreeMap::new(),
            timestamp,
            price,
        }
    }

    /// 범주형 속성을 추가합니다.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// 수치형 속성을 추가합니다.
    pub fn with_numeric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.numeric_attributes.insert(name.into(), value);
        self
    }

    /// 가격이 학습/집계에 쓸 수 있는 유한한 값인지 확인합니다.
    pub fn has_valid_price(&self) -> bool {
        self.price.is_finite()
    }

    /// 이 기록의 속성 튜플을 만듭니다.
    pub fn attribute_tuple(&self) -> AttributeTuple {
        AttributeTuple {
            categorical: self.attributes.clone(),
            numeric: self.numeric_attributes.clone(),
        }
    }

    /// 이 기록을 (날짜, 가격) 관측치로 변환합니다.
    pub fn observation(&self) -> Observation {
        Observation::new(self.timestamp, self.price)
    }

    /// 특정 엔티티의 관측치만 골라 시간 순으로 정렬해 반환합니다.
    pub fn observations_for(records: &[TransactionRecord], entity_id: &str) -> Vec<Observation> {
        let mut history: Vec<Observation> = records
            .iter()
            .filter(|r| r.entity_id == entity_id && r.has_valid_price())
            .map(TransactionRecord::observation)
            .collect();
        history.sort_by_key(|o| o.date);
        history
    }
}

/// 시계열 예측 입력으로 쓰이는 (날짜, 가격) 관측치.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// 관측 일자
    pub date: NaiveDate,
    /// 관측 가격
    pub price: f64,
}

impl Observation {
    /// 새 관측치를 생성합니다.
    pub fn new(date: NaiveDate, price: f64) -> Self {
        Self { date, price }
    }
}

impl From<(NaiveDate, f64)> for Observation {
    fn from((date, price): (NaiveDate, f64)) -> Self {
        Self::new(date, price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_attribute_tuple_from_record() {
        let record = TransactionRecord::new("광어", date(2024, 3, 2), 12_000.0)
            .with_attribute("origin", "국산")
            .with_numeric("weight", 2.0);

        let tuple = record.attribute_tuple();
        assert_eq!(tuple.category("origin"), Some("국산"));
        assert_eq!(tuple.numeric("weight"), Some(2.0));
    }

    #[test]
    fn test_observations_for_filters_and_sorts() {
        let records = vec![
            TransactionRecord::new("광어", date(2024, 5, 1), 11_000.0),
            TransactionRecord::new("우럭", date(2024, 1, 1), 9_000.0),
            TransactionRecord::new("광어", date(2024, 1, 1), 10_000.0),
            TransactionRecord::new("광어", date(2024, 2, 1), f64::NAN),
        ];

        let history = TransactionRecord::observations_for(&records, "광어");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].date, date(2024, 1, 1));
        assert_eq!(history[1].price, 11_000.0);
    }

    #[test]
    fn test_record_serde_roundtrip_defaults() {
        let json = r#"{"entity_id":"광어","timestamp":"2024-03-02","price":12000.0}"#;
        let record: TransactionRecord = serde_json::from_str(json).unwrap();
        assert!(record.attributes.is_empty());
        assert!(record.has_valid_price());
    }
}
