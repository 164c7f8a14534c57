//! CLI 도구 모음.
//!
//! 이 crate는 다음 기능을 제공합니다:
//! - JSON 거래 데이터셋 로드
//! - 어종별 월간 가격 예측 출력
//! - 속성 기반 가격 추정 출력
//! - 모델 캐시 관리

pub mod commands;
