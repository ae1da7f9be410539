#![doc = include_str!("../README.md")]

pub mod config;
pub mod error;
pub mod metrics;
pub mod registry;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, CredentialError, RegistryError, VpngwError};

// 설정
pub use config::HarnessConfig;

// 영구 리소스
pub use registry::PermanentResources;

// 도메인 타입
pub use types::{OutputValues, Region, TerraformVars};
