use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, StatusCode},
};

use crate::model::{Locale, RequestContext};

/// Axum extractor for RequestContext from request headers.
///
/// - X-Scope-Id: organizational scope the request operates in
/// - X-Locale: locale name for number parsing/rendering (defaults en_US)
///
/// For development/testing, a missing scope header falls back to the
/// "default" scope.
#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let headers = &parts.headers;

        let scope_id =
            extract_header_value(headers, "x-scope-id").unwrap_or_else(|| "default".to_string());
        let locale = match extract_header_value(headers, "x-locale") {
            Some(name) => Locale::named(&name),
            None => Locale::default(),
        };

        Ok(RequestContext::new(scope_id, locale))
    }
}

fn extract_header_value(headers: &HeaderMap, header_name: &str) -> Option<String> {
    headers
        .get(header_name)
        .and_then(|value| value.to_str().ok())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderName, HeaderValue};

    #[test]
    fn header_values_are_extracted() {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("x-scope-id"),
            HeaderValue::from_static("acme"),
        );
        headers.insert(
            HeaderName::from_static("x-locale"),
            HeaderValue::from_static("es_ES"),
        );

        assert_eq!(
            extract_header_value(&headers, "x-scope-id"),
            Some("acme".to_string())
        );
        let locale = Locale::named(&extract_header_value(&headers, "x-locale").unwrap());
        assert_eq!(locale.decimal_point, ',');
    }
}
