//! # Auction Analytics
//!
//! 수산물 경락가 예측 코어.
//!
//! - 엔티티(어종)별 월간 시계열 예측 (추세 + 연간 계절성)
//! - 범주형/수치형 속성 기반 가격 추정 (트리 앙상블)
//! - 앙상블 구성원 예측으로부터의 경험적 신뢰구간
//! - 학습된 모델의 디스크 캐시

pub mod ml;

pub use ml::*;
