//! 경락가 예측 코어.
//!
//! - **시계열 예측**: 어종별 월평균 가격의 추세 + 연간 계절성 모델
//! - **가격 추정**: 거래 속성(어종, 산지, 규격, 포장, 수량, 중량) 기반 회귀 트리 앙상블
//! - **불확실성**: 앙상블 개별 예측의 백분위수 구간
//! - **모델 캐시**: 학습된 모델을 디스크에 저장하고 재사용
//!
//! # 아키텍처
//!
//! ```text
//!   TransactionRecord[]
//!          │
//!          ▼
//!  ┌──────────────────┐
//!  │   PriceService   │ ← 호출자가 만드는 컨텍스트
//!  └────────┬─────────┘
//!           │
//!     ┌─────┴──────────────────────┐
//!     ▼                            ▼
//! ┌──────────────────────┐   ┌──────────────────┐
//! │ TimeSeriesForecaster │   │  PointEstimator  │
//! │ (추세 + 계절성)      │   │  FeatureEncoder  │
//! └──────────┬───────────┘   │  RandomForest    │
//!            │               └────────┬─────────┘
//!            │                        │
//!            └──────────┬─────────────┘
//!                       ▼
//!               ┌───────────────┐
//!               │  ModelCache   │ ← load_or_train
//!               └───────────────┘
//! ```

pub mod cache;
pub mod error;
pub mod features;
pub mod forecaster;
mod linalg;
pub mod predictor;
pub mod service;
pub mod tree;
pub mod types;
pub mod uncertainty;

// 자주 사용되는 타입 재내보내기
pub use cache::{CachedModel, LoadStatus, ModelCache, CACHE_FORMAT_VERSION};
pub use error::{MlError, MlResult};
pub use features::{CategoricalColumn, EncoderState, FeatureEncoder, FeatureSchema, NumericColumn};
pub use forecaster::{ForecastTable, MonthlySeries, TimeSeriesForecaster, TrendSeasonalModel};
pub use predictor::{
    PointEstimator, PriceRegressor, RandomForest, Regressor, TrainedPointModel,
};
pub use tree::{RegressionTree, TreeParams};
pub use types::{FeatureImportance, FeatureVector, ForecastPoint, PredictionResult};
pub use uncertainty::{percentile, UncertaintyEstimator};

// 서비스 타입 재내보내기
pub use service::{key_month_summary, KeyMonthRow, PricePrediction, PriceService, DEFAULT_KEY_MONTHS};
