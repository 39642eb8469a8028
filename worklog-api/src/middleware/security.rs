//! Security response headers
//!
//! Every response gets the usual hardening headers plus a content security
//! policy for the worklog pages: scripts only from `/assets`, no framing, and
//! fetch/SSE only back to this server. Attachment thumbnails are public
//! storage URLs, so the storage host is the one extra `img-src` origin.
//!
//! HSTS is sent only when `PRODUCTION=true`.
//!
//! # Example
//!
//! ```no_run
//! use axum::Router;
//! use worklog_api::middleware::security::SecurityHeadersLayer;
//!
//! let app: Router = Router::new().layer(SecurityHeadersLayer::with_image_origin(
//!     true,
//!     Some("https://project.storage.example.com"),
//! ));
//! ```

use axum::{
    extract::Request,
    http::{header, HeaderValue, Uri},
    response::Response,
};
use std::task::{Context, Poll};
use tower::{Layer, Service};

const BASE_POLICY: &str = "default-src 'self'; script-src 'self'; style-src 'self' 'unsafe-inline'; font-src 'self'; connect-src 'self'; form-action 'self'; frame-ancestors 'none'";

const HSTS: &str = "max-age=31536000; includeSubDomains";

/// Adds the worklog's security headers to every response
#[derive(Clone)]
pub struct SecurityHeadersLayer {
    enable_hsts: bool,
    csp: HeaderValue,
}

impl SecurityHeadersLayer {
    /// Layer whose images may only come from this server
    pub fn new(enable_hsts: bool) -> Self {
        Self::with_image_origin(enable_hsts, None)
    }

    /// Layer that also allows images from the storage service at `storage_url`
    ///
    /// Only the scheme and authority of `storage_url` are used. A URL that
    /// does not parse is ignored with a warning.
    pub fn with_image_origin(enable_hsts: bool, storage_url: Option<&str>) -> Self {
        let origin = storage_url.and_then(|url| {
            let origin = storage_origin(url);
            if origin.is_none() {
                tracing::warn!(url, "Storage URL has no usable origin; images limited to self");
            }
            origin
        });

        Self {
            enable_hsts,
            csp: content_security_policy(origin.as_deref()),
        }
    }
}

fn storage_origin(url: &str) -> Option<String> {
    let uri: Uri = url.parse().ok()?;
    let scheme = uri.scheme_str()?;
    let authority = uri.authority()?;
    Some(format!("{}://{}", scheme, authority))
}

fn content_security_policy(image_origin: Option<&str>) -> HeaderValue {
    let img_src = match image_origin {
        Some(origin) => format!("img-src 'self' data: {}", origin),
        None => "img-src 'self' data:".to_string(),
    };

    HeaderValue::from_str(&format!("{}; {}", BASE_POLICY, img_src))
        .unwrap_or_else(|_| HeaderValue::from_static(BASE_POLICY))
}

impl<S> Layer<S> for SecurityHeadersLayer {
    type Service = SecurityHeadersMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SecurityHeadersMiddleware {
            inner,
            enable_hsts: self.enable_hsts,
            csp: self.csp.clone(),
        }
    }
}

#[derive(Clone)]
pub struct SecurityHeadersMiddleware<S> {
    inner: S,
    enable_hsts: bool,
    csp: HeaderValue,
}

impl<S> Service<Request> for SecurityHeadersMiddleware<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let future = self.inner.call(request);
        let enable_hsts = self.enable_hsts;
        let csp = self.csp.clone();

        Box::pin(async move {
            let mut response = future.await?;
            let headers = response.headers_mut();

            headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
            headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
            headers.insert(header::REFERRER_POLICY, HeaderValue::from_static("same-origin"));
            headers.insert(
                "Permissions-Policy",
                HeaderValue::from_static("camera=(), microphone=(), geolocation=()"),
            );
            headers.insert(header::CONTENT_SECURITY_POLICY, csp);
            if enable_hsts {
                headers.insert(header::STRICT_TRANSPORT_SECURITY, HeaderValue::from_static(HSTS));
            }

            Ok(response)
        })
    }
}
