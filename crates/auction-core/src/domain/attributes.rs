//! 예측 입력 속성 튜플.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 한 건의 거래(또는 예측 질의)를 설명하는 속성 묶음.
///
/// 범주형 속성(어종, 산지, 규격, 포장)과 수치형 속성(수량, 중량)을
/// 이름으로 조회합니다. 순서가 안정적인 `BTreeMap`을 사용하므로
/// 같은 내용의 튜플은 항상 같은 방식으로 직렬화됩니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeTuple {
    /// 범주형 속성 (이름 → 값)
    #[serde(default)]
    pub categorical: BTreeMap<String, String>,
    /// 수치형 속성 (이름 → 값)
    #[serde(default)]
    pub numeric: BTreeMap<String, f64>,
}

impl AttributeTuple {
    /// 빈 속성 튜플을 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 범주형 속성을 추가합니다.
    pub fn with_category(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.categorical.insert(name.into(), value.into());
        self
    }

    /// 수치형 속성을 추가합니다.
    pub fn with_numeric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.numeric.insert(name.into(), value);
        self
    }

    /// 범주형 속성 값을 반환합니다.
    pub fn category(&self, name: &str) -> Option<&str> {
        self.categorical.get(name).map(String::as_str)
    }

    /// 수치형 속성 값을 반환합니다.
    pub fn numeric(&self, name: &str) -> Option<f64> {
        self.numeric.get(name).copied()
    }

    /// 주어진 속성 이름이 모두 존재하고 수치형 값이 유한한지 확인합니다.
    pub fn is_complete(&self, categorical: &[String], numeric: &[String]) -> bool {
        categorical.iter().all(|name| self.categorical.contains_key(name))
            && numeric
                .iter()
                .all(|name| self.numeric(name).is_some_and(f64::is_finite))
    }
}
