pub mod config;
pub mod error;
pub mod types;
pub mod video_id;

pub use config::DigestConfig;
pub use error::{DigestError, Result};
pub use types::*;
pub use video_id::extract_video_id;
