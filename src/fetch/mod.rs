//! Fetch Module
//!
//! Request interception: route policy, cache strategies, and the network
//! transport they sit in front of.

mod control;
mod fetcher;
mod hooks;
mod key;
mod message;
mod policy;
mod transport;

pub use control::{is_storable, parse_cache_control, CacheControl};
pub use fetcher::{CachingFetcher, DEFAULT_NETWORK_TIMEOUT};
pub use hooks::{FetchHooks, NoopHooks, TracingHooks};
pub use key::cache_key;
pub use message::{header_values, Headers, Request, Response, ServedFrom};
pub use policy::{
    url_path, PatternKind, PolicyError, RoutePattern, RoutePolicy, RouteRule, RouteRuleConfig,
    Strategy,
};
pub use transport::{HttpTransport, Transport};
