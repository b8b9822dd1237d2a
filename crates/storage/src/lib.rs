pub mod backend;
pub mod error;
mod models;
mod name;

pub use crate::backend::{Content, ContentReader, ContentStore};
pub use crate::models::ContentInfo;
pub use crate::name::validate as validate_name;
use std::sync::Arc;

pub type ContentHandle = Arc<dyn ContentStore + Send + Sync>;
