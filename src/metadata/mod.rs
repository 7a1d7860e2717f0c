pub mod extract;
pub mod fallback;
pub mod fetcher;
pub mod normalize;
pub mod platform;
pub mod resolver;
pub mod types;
pub mod url_info;

pub use extract::extract;
pub use fallback::fallback;
pub use fetcher::{HttpFetcher, PageFetcher};
pub use platform::{classify, shared_from, Platform, PlatformInfo};
pub use resolver::Resolver;
pub use types::{FetchError, FetchOptions, LinkMetadata};
pub use url_info::{url_info, UrlInfo};
