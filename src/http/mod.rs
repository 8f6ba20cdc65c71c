pub mod client;
pub mod method;
pub mod request;
pub mod response;

pub use client::ApiClient;
pub use method::HttpMethod;
pub use request::{Endpoint, RequestInput};
pub use response::CapturedResponse;
