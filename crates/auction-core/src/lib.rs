//! # Auction Core
//!
//! 수산물 경락가 예측 시스템의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 예측 코어 전반에서 사용되는 기본 타입을 제공합니다:
//! - 경매 거래 기록 ([`TransactionRecord`])
//! - 예측 입력 속성 튜플 ([`AttributeTuple`])
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod logging;

pub use config::*;
pub use domain::*;
pub use logging::*;
