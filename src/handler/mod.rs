//! Request handler module
//!
//! Responsible for request dispatch: static assets first, then the
//! collection API, then the 404 fallback.

pub mod router;
pub mod static_files;

// Re-export main entry point
pub use router::handle_request;
