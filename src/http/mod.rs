//! Transport-independent request and response model.
//!
//! # Data Flow
//! ```text
//! raw transport request
//!     → request.rs (RequestContext: id, normalized path, headers, body)
//!     → response.rs (ResponseContext: status, headers, buffer, codecs)
//!     → handlers mutate both
//!     → exception.rs (HttpException) when anything faults
//! ```

pub mod cookie;
pub mod exception;
pub mod request;
pub mod response;

pub use cookie::Cookie;
pub use exception::{BoxError, HttpException, InputError};
pub use request::{normalize_path, RequestContext, RequestId, X_REQUEST_ID};
pub use response::{BodyStream, CodecMap, ResponseContext, ResponseError};
