pub mod verify_internal;

use http::request::Parts as ReqParts;
use http::{HeaderValue, Method};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

/// Read-only routes are open to any listed origin; `None` allows every origin.
pub fn cors(origins: Option<Vec<String>>) -> CorsLayer {
    let allowed = match origins {
        None => AllowOrigin::any(),
        Some(origins) => AllowOrigin::predicate(move |org: &HeaderValue, _: &ReqParts| {
            origins.iter().any(|o| org.as_bytes() == o.as_bytes())
        }),
    };

    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any)
        .allow_origin(allowed)
}
