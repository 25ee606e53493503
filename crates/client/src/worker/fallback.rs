//! Offline substitutes for requests the network couldn't serve.

use std::sync::LazyLock;

use bytes::Bytes;
use regex::Regex;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{StatusCode, Url};

use crate::fetch::{Response, ResponseSource, ResponseType};

/// Shown in place of images that are unavailable offline.
pub const PLACEHOLDER_SVG: &str = r##"<svg width="400" height="300" xmlns="http://www.w3.org/2000/svg">
  <rect width="100%" height="100%" fill="#1a1a1a"/>
  <text x="50%" y="50%" text-anchor="middle" dy=".3em" fill="#666" font-family="Arial">
    Image unavailable offline
  </text>
</svg>"##;

static IMAGE_EXTENSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(jpg|jpeg|png|gif|webp|svg)$").expect("image extension pattern is valid"));

/// Whether the URL path names an image by extension. The query is ignored.
pub fn is_image_request(url: &Url) -> bool {
    IMAGE_EXTENSION.is_match(url.path())
}

/// Synthesized `image/svg+xml` placeholder for `url`.
pub fn placeholder_image(url: &Url) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/svg+xml"));
    Response {
        url: url.clone(),
        status: StatusCode::OK,
        response_type: ResponseType::Basic,
        headers,
        body: Bytes::from_static(PLACEHOLDER_SVG.as_bytes()),
        source: ResponseSource::Fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_image_extensions() {
        for path in ["a.jpg", "a.JPEG", "billz%20png.png", "a.gif", "dancing.webp", "logo.Svg"] {
            assert!(is_image_request(&url(&format!("https://folio.example/{path}"))), "{path}");
        }
    }

    #[test]
    fn test_non_image_extensions() {
        for path in ["", "video%20bg.webm", "favicon.ico", "app.js", "png"] {
            assert!(!is_image_request(&url(&format!("https://folio.example/{path}"))), "{path}");
        }
    }

    #[test]
    fn test_query_does_not_hide_extension() {
        assert!(is_image_request(&url("https://folio.example/comp.webp?w=640")));
    }

    #[test]
    fn test_placeholder_response() {
        let response = placeholder_image(&url("https://folio.example/vgen-logo.png"));
        assert_eq!(response.content_type(), Some("image/svg+xml"));
        assert_eq!(response.source, ResponseSource::Fallback);
        assert!(std::str::from_utf8(&response.body).unwrap().contains("Image unavailable offline"));
    }
}
