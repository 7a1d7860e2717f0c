pub mod errors;
pub mod service;
pub mod share;

pub use errors::AppError;
pub use service::{LinkCounts, LinkQuery, LinkSave, LinkService, ReadFilter, SortBy};
pub use share::SharePayload;
