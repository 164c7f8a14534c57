//! 속성 튜플 인코딩.
//!
//! 범주형 속성(어종, 산지, 규격, 포장)과 수치형 속성(수량, 중량)을
//! 가격 추정 모델 입력용 고정 길이 벡터로 변환합니다.
//!
//! ```text
//! [species 원-핫 | origin 원-핫 | grade 원-핫 | package 원-핫 | quantity | weight]
//! ```
//!
//! 범주 목록은 학습 시점에 관측된 값을 정렬해 [`EncoderState`]에 기록하고,
//! 추론 시에는 그 목록을 그대로 재사용합니다. 학습 때 보지 못한 범주는
//! 해당 블록이 모두 0인 "unknown" 버킷으로 처리됩니다.
//!
//! 수치형 속성은 학습 시점의 min/max로 `[0, 1]`에 선형 스케일링합니다.
//! 학습 범위를 벗어난 값은 잘라내지 않고 같은 직선으로 외삽합니다
//! (예: max의 두 배는 2.0 근처).

use crate::ml::{FeatureVector, MlError, MlResult};
use auction_core::{AttributeTuple, EstimatorConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// 인코딩할 속성 이름 목록.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    /// 원-핫 인코딩할 범주형 속성 (블록 순서 = 목록 순서)
    pub categorical: Vec<String>,
    /// min-max 스케일링할 수치형 속성
    pub numeric: Vec<String>,
}

impl FeatureSchema {
    /// 새 스키마 생성.
    pub fn new(categorical: Vec<String>, numeric: Vec<String>) -> Self {
        Self {
            categorical,
            numeric,
        }
    }

    /// 튜플에 스키마의 모든 속성이 (유한한 값으로) 존재하는지 확인.
    pub fn is_satisfied_by(&self, tuple: &AttributeTuple) -> bool {
        tuple.is_complete(&self.categorical, &self.numeric)
    }
}

impl From<&EstimatorConfig> for FeatureSchema {
    fn from(config: &EstimatorConfig) -> Self {
        Self::new(config.categorical.clone(), config.numeric.clone())
    }
}

/// 학습 시점에 확정된 범주형 컬럼 정보.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalColumn {
    /// 속성 이름
    pub name: String,
    /// 정렬된 범주 목록 (원-핫 열 순서)
    pub categories: Vec<String>,
}

/// 학습 시점에 확정된 수치형 컬럼 정보.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericColumn {
    /// 속성 이름
    pub name: String,
    /// 학습 데이터 최솟값
    pub min: f64,
    /// 학습 데이터 최댓값
    pub max: f64,
}

impl NumericColumn {
    fn scale(&self, value: f64) -> f64 {
        let range = self.max - self.min;
        if range > f64::EPSILON {
            (value - self.min) / range
        } else {
            0.0
        }
    }
}

/// 인코더 상태.
///
/// 학습된 가격 추정 모델과 함께 저장되며, 추론 시 동일하게 재사용됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderState {
    categorical: Vec<CategoricalColumn>,
    numeric: Vec<NumericColumn>,
}

impl EncoderState {
    /// 범주형 컬럼 정보 반환.
    pub fn categorical(&self) -> &[CategoricalColumn] {
        &self.categorical
    }

    /// 수치형 컬럼 정보 반환.
    pub fn numeric(&self) -> &[NumericColumn] {
        &self.numeric
    }

    /// 출력 벡터 길이 반환.
    pub fn feature_count(&self) -> usize {
        self.categorical
            .iter()
            .map(|c| c.categories.len())
            .sum::<usize>()
            + self.numeric.len()
    }

    /// 출력 벡터의 각 위치에 대응하는 피처 이름 반환.
    pub fn feature_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.feature_count());
        for column in &self.categorical {
            for category in &column.categories {
                names.push(format!("{}={}", column.name, category));
            }
        }
        names.extend(self.numeric.iter().map(|c| c.name.clone()));
        names
    }

    /// 속성 튜플을 feature vector로 변환.
    ///
    /// 부수 효과가 없으며 같은 입력에 대해 항상 비트 단위로 같은 결과를 반환합니다.
    pub fn transform(&self, tuple: &AttributeTuple) -> MlResult<FeatureVector> {
        let mut values = Vec::with_capacity(self.feature_count());

        for column in &self.categorical {
            let value = tuple.category(&column.name).ok_or_else(|| {
                MlError::Schema(format!("missing categorical attribute '{}'", column.name))
            })?;

            let hot = column
                .categories
                .binary_search_by(|c| c.as_str().cmp(value))
                .ok();
            values.extend((0..column.categories.len()).map(|i| {
                if Some(i) == hot {
                    1.0
                } else {
                    0.0
                }
            }));
        }

        for column in &self.numeric {
            let value = numeric_value(tuple, &column.name)?;
            values.push(column.scale(value));
        }

        Ok(FeatureVector::with_names(values, self.feature_names()))
    }
}

/// 속성 튜플 인코더.
#[derive(Debug, Clone)]
pub struct FeatureEncoder {
    schema: FeatureSchema,
}

impl FeatureEncoder {
    /// 주어진 스키마로 새 인코더 생성.
    pub fn new(schema: FeatureSchema) -> Self {
        Self { schema }
    }

    /// 스키마 반환.
    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// 학습 행에서 범주 목록과 수치 범위를 수집해 인코더 상태를 만듭니다.
    pub fn fit<'a, I>(&self, rows: I) -> MlResult<EncoderState>
    where
        I: IntoIterator<Item = &'a AttributeTuple>,
    {
        let mut categories: Vec<BTreeSet<String>> =
            vec![BTreeSet::new(); self.schema.categorical.len()];
        let mut ranges: Vec<(f64, f64)> =
            vec![(f64::INFINITY, f64::NEG_INFINITY); self.schema.numeric.len()];
        let mut count = 0usize;

        for tuple in rows {
            for (name, seen) in self.schema.categorical.iter().zip(categories.iter_mut()) {
                let value = tuple.category(name).ok_or_else(|| {
                    MlError::Schema(format!("missing categorical attribute '{}'", name))
                })?;
                if !seen.contains(value) {
                    seen.insert(value.to_string());
                }
            }
            for (name, range) in self.schema.numeric.iter().zip(ranges.iter_mut()) {
                let value = numeric_value(tuple, name)?;
                range.0 = range.0.min(value);
                range.1 = range.1.max(value);
            }
            count += 1;
        }

        if count == 0 {
            return Err(MlError::InsufficientData {
                required: 1,
                actual: 0,
            });
        }

        let categorical = self
            .schema
            .categorical
            .iter()
            .zip(categories)
            .map(|(name, seen)| CategoricalColumn {
                name: name.clone(),
                categories: seen.into_iter().collect(),
            })
            .collect();

        let numeric = self
            .schema
            .numeric
            .iter()
            .zip(ranges)
            .map(|(name, (min, max))| NumericColumn {
                name: name.clone(),
                min,
                max,
            })
            .collect();

        Ok(EncoderState {
            categorical,
            numeric,
        })
    }
}

fn numeric_value(tuple: &AttributeTuple, name: &str) -> MlResult<f64> {
    match tuple.numeric(name) {
        Some(value) if value.is_finite() => Ok(value),
        Some(value) => Err(MlError::Schema(format!(
            "numeric attribute '{}' is not finite: {}",
            name, value
        ))),
        None => Err(MlError::Schema(format!(
            "missing numeric attribute '{}'",
            name
        ))),
    }
}
