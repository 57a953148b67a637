pub mod directory;
pub mod loaders;
mod nullable;
pub mod submission;
pub mod website;

pub use directory::{AdapterConfig, Directory, SubmissionType};
pub use loaders::{load_queue_seed, parse_queue_seed};
pub use submission::{
    ErrorCategory, Submission, SubmissionContent, SubmissionStatus, SubmissionUpdate,
};
pub use website::Website;
