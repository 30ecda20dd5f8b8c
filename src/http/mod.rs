//! HTTP protocol layer module
//!
//! Response builders shared by the proxy routes, static assets and the
//! top-level request handler.

pub mod response;

// Re-export commonly used builders
pub use response::{
    apply_cors, build_304_response, build_api_404_response, build_json_response,
    build_options_response, build_page_404_response, build_static_response, build_text_response,
    strip_body,
};
