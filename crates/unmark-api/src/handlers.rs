//! Request handlers.

pub mod cleanup;
pub mod health;
pub mod jobs;
pub mod process;
pub mod processed;

pub use cleanup::*;
pub use health::*;
pub use jobs::*;
pub use process::*;
pub use processed::*;

use std::path::Path;

use axum::body::Body;
use axum::extract::Request;
use axum::http::{header, HeaderValue};
use axum::response::Response;
use tower::ServiceExt;
use tower_http::services::ServeFile;

/// Serve a file with range support, optionally as a named attachment.
pub(crate) async fn serve_file(path: &Path, request: Request, attachment: Option<&str>) -> Response {
    let response = match ServeFile::new(path).oneshot(request).await {
        Ok(response) => response.map(Body::new),
        Err(never) => match never {},
    };

    match attachment {
        Some(name) => with_attachment(response, name),
        None => response,
    }
}

fn with_attachment(mut response: Response, name: &str) -> Response {
    if response.status().is_success() {
        if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", name)) {
            response.headers_mut().insert(header::CONTENT_DISPOSITION, value);
        }
    }
    response
}
