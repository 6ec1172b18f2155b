pub mod http;
pub mod range;
pub mod signing;

pub use http::JsonPoster;
pub use range::{hosts, ip_range, Ipv4Range};
pub use signing::hmac_sha256_base64;
