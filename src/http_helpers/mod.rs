#[path = "body.enum.rs"]
mod body;
pub use self::body::{Body, BodyStream};

#[path = "headers.struct.rs"]
mod headers;
pub use self::headers::Headers;

#[path = "request.struct.rs"]
mod request;
pub use self::request::Request;

#[path = "response.struct.rs"]
mod response;
pub use self::response::Response;

#[path = "into_response.rs"]
mod into_response;
pub use self::into_response::IntoResponse;
