//! Statement builders for both search paths

mod payload;
mod single;
mod template;

pub use payload::QueryPayload;
pub use single::{SingleVectorQuery, normalize_filter, vector_literal};
pub use template::QueryTemplate;
