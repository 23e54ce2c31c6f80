//! Inertia-style page responses.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every page is a `(component, props)` pair the client-side router mounts.
//! A first visit gets an HTML shell with the page JSON embedded in the
//! `data-page` attribute of the mount node. Subsequent client navigations
//! send `X-Inertia: true` and receive the page object as JSON.
//!
//! PROTOCOL
//! ========
//! - JSON responses carry `X-Inertia: true` and `Vary: X-Inertia`.
//! - An Inertia `GET` from a client on another asset version receives
//!   `409 Conflict` + `X-Inertia-Location`, forcing a full reload.
//! - `X-Inertia-Partial-Component` + `X-Inertia-Partial-Data` restrict the
//!   returned props when the component matches.
//! - Redirects are `302`, except Inertia `PUT`/`PATCH`/`DELETE` which get
//!   `303` so the client follows with a `GET`.

pub mod registry;

use std::convert::Infallible;

use axum::Json;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use serde::Serialize;
use serde_json::{Map, Value};

pub use registry::ComponentRegistry;

pub const X_INERTIA: &str = "x-inertia";
pub const X_INERTIA_VERSION: &str = "x-inertia-version";
pub const X_INERTIA_LOCATION: &str = "x-inertia-location";
pub const X_INERTIA_PARTIAL_COMPONENT: &str = "x-inertia-partial-component";
pub const X_INERTIA_PARTIAL_DATA: &str = "x-inertia-partial-data";

pub type Props = Map<String, Value>;

#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error("component name is empty")]
    EmptyComponent,
    #[error("component not registered: {0}")]
    UnknownComponent(String),
    #[error("page serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

// =============================================================================
// PAGE TYPES
// =============================================================================

/// The page object consumed by the client-side renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub component: String,
    pub props: Props,
    pub url: String,
    pub version: String,
}

/// Outcome of a page request: go somewhere else, or render a component.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageResponse {
    Redirect { location: String },
    View(Page),
}

impl PageResponse {
    #[must_use]
    pub fn redirect(location: impl Into<String>) -> Self {
        Self::Redirect { location: location.into() }
    }
}

// =============================================================================
// REQUEST EXTRACTOR
// =============================================================================

/// The Inertia-relevant view of an incoming request.
#[derive(Debug, Clone, Default)]
pub struct InertiaRequest {
    pub is_inertia: bool,
    pub method: Method,
    /// Path and query of the request.
    pub url: String,
    pub version: Option<String>,
    pub partial_component: Option<String>,
    pub partial_data: Option<Vec<String>>,
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

impl InertiaRequest {
    #[must_use]
    pub fn from_parts(parts: &Parts) -> Self {
        let headers = &parts.headers;
        Self {
            is_inertia: header_str(headers, X_INERTIA).is_some_and(|v| v.eq_ignore_ascii_case("true")),
            method: parts.method.clone(),
            url: parts.uri.path_and_query().map_or_else(|| "/".to_owned(), |pq| pq.as_str().to_owned()),
            version: header_str(headers, X_INERTIA_VERSION).map(str::to_owned),
            partial_component: header_str(headers, X_INERTIA_PARTIAL_COMPONENT).map(str::to_owned),
            partial_data: header_str(headers, X_INERTIA_PARTIAL_DATA).map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|key| !key.is_empty())
                    .map(str::to_owned)
                    .collect()
            }),
        }
    }

    fn redirect_status(&self) -> StatusCode {
        if self.is_inertia && matches!(self.method, Method::PUT | Method::PATCH | Method::DELETE) {
            StatusCode::SEE_OTHER
        } else {
            StatusCode::FOUND
        }
    }
}

impl<S> FromRequestParts<S> for InertiaRequest
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_parts(parts))
    }
}

// =============================================================================
// RESPONDER
// =============================================================================

/// Builds pages and encodes them as HTTP responses.
#[derive(Debug, Clone)]
pub struct Inertia {
    version: String,
    title: String,
    registry: ComponentRegistry,
}

impl Inertia {
    #[must_use]
    pub fn new(version: impl Into<String>, title: impl Into<String>, registry: ComponentRegistry) -> Self {
        Self { version: version.into(), title: title.into(), registry }
    }

    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Build the page for `component`, applying any partial-reload filter.
    ///
    /// # Errors
    ///
    /// Returns an error if the component is empty or not registered.
    pub fn page(&self, request: &InertiaRequest, component: &str, mut props: Props) -> Result<Page, PageError> {
        self.registry.resolve(component)?;

        if request.partial_component.as_deref() == Some(component) {
            if let Some(only) = &request.partial_data {
                props.retain(|key, _| only.iter().any(|k| k == key));
            }
        }

        Ok(Page { component: component.to_owned(), props, url: request.url.clone(), version: self.version.clone() })
    }

    /// Shorthand for `PageResponse::View(self.page(..)?)`.
    ///
    /// # Errors
    ///
    /// Same as [`Inertia::page`].
    pub fn render(&self, request: &InertiaRequest, component: &str, props: Props) -> Result<PageResponse, PageError> {
        Ok(PageResponse::View(self.page(request, component, props)?))
    }

    /// Encode a page response for the transport the client asked for.
    #[must_use]
    pub fn respond(&self, request: &InertiaRequest, response: PageResponse) -> Response {
        match response {
            PageResponse::Redirect { location } => {
                (request.redirect_status(), [(header::LOCATION, location)]).into_response()
            }
            PageResponse::View(page) if request.is_inertia => {
                if request.method == Method::GET && request.version.as_deref().is_some_and(|v| v != self.version) {
                    return version_conflict(&request.url);
                }
                let mut response = Json(page).into_response();
                let headers = response.headers_mut();
                headers.insert(HeaderName::from_static(X_INERTIA), HeaderValue::from_static("true"));
                headers.insert(header::VARY, HeaderValue::from_static(X_INERTIA));
                response
            }
            PageResponse::View(page) => match self.shell(&page) {
                Ok(html) => Html(html).into_response(),
                Err(e) => {
                    tracing::error!(error = %e, component = %page.component, "page shell render failed");
                    StatusCode::INTERNAL_SERVER_ERROR.into_response()
                }
            },
        }
    }

    /// HTML document for a first (non-Inertia) visit.
    ///
    /// # Errors
    ///
    /// Returns an error if the page cannot be serialized.
    pub fn shell(&self, page: &Page) -> Result<String, PageError> {
        let data = serde_json::to_string(page)?;
        Ok(format!(
            "<!DOCTYPE html>\n\
             <html lang=\"en\">\n\
             <head>\n\
             <meta charset=\"utf-8\">\n\
             <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
             <title>{title}</title>\n\
             <script type=\"module\" src=\"/build/app.js?v={version}\" defer></script>\n\
             </head>\n\
             <body>\n\
             <div id=\"app\" data-page=\"{data}\"></div>\n\
             </body>\n\
             </html>\n",
            title = escape_html(&self.title),
            version = escape_html(&self.version),
            data = escape_html(&data),
        ))
    }
}

fn version_conflict(url: &str) -> Response {
    match HeaderValue::from_str(url) {
        Ok(location) => {
            let headers = [(HeaderName::from_static(X_INERTIA_LOCATION), location)];
            (StatusCode::CONFLICT, headers).into_response()
        }
        Err(_) => StatusCode::CONFLICT.into_response(),
    }
}

/// Escape text for HTML element content and double- or single-quoted attributes.
pub(crate) fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
