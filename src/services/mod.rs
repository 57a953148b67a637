pub mod error_classifier;
pub mod form_detection;
pub mod llm_service;
pub mod retry_strategy;

pub use error_classifier::{classify, ClassificationContext, ErrorClassification};
pub use form_detection::{DetectedFields, FieldDetector, LlmFormDetector};
pub use llm_service::LlmService;
pub use retry_strategy::{decide, RetryDecision};
