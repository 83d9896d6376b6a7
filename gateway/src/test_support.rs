//! Shared test fixtures for the route-handler tests in `routes/*.rs`.
//! Not compiled outside `#[cfg(test)]`.

use crate::config::Config;
use crate::state::AppState;
use std::sync::Arc;

pub fn test_state() -> (Arc<AppState>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::from_env();
    config.base_dir = dir.path().join("jobs");
    config.output_parent = dir.path().join("outputs");
    (AppState::new(config), dir)
}

pub fn tiny_png_bytes() -> Vec<u8> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tiny.png");
    let img = image::RgbImage::from_pixel(8, 8, image::Rgb([12, 34, 56]));
    img.save(&path).unwrap();
    std::fs::read(&path).unwrap()
}

/// Builds a `multipart/form-data` body from `(name, filename, content)` triples.
/// A `None` filename produces a plain form field instead of a file part.
pub fn build_multipart_body(boundary: &str, fields: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, filename, content) in fields {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        match filename {
            Some(fname) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"; filename=\"{fname}\"\r\n")
                        .as_bytes(),
                );
                body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
            }
            None => {
                body.extend_from_slice(format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes());
            }
        }
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}

pub fn multipart_request(boundary: &str, body: Vec<u8>) -> axum::extract::Request {
    axum::http::Request::builder()
        .method("POST")
        .uri("/")
        .header(
            axum::http::header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(axum::body::Body::from(body))
        .unwrap()
}

pub fn json_request(body: serde_json::Value) -> axum::extract::Request {
    axum::http::Request::builder()
        .method("POST")
        .uri("/")
        .header(axum::http::header::CONTENT_TYPE, "application/json")
        .body(axum::body::Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}
