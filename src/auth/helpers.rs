use axum::extract::Query;
use axum::http::{HeaderMap, Uri, header::AUTHORIZATION};
use serde::Deserialize;

#[derive(Deserialize)]
struct TokenQuery {
    access_token: Option<String>,
}

/// Reads the bearer token from the Authorization header, falling back to the
/// `access_token` query parameter.
/// Returns None when neither carries a token.
pub fn extract_token(headers: &HeaderMap, uri: &Uri) -> Option<String> {
    let from_header = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    match from_header {
        Some(token) => Some(token.to_string()),
        None => token_from_query(uri),
    }
}

fn token_from_query(uri: &Uri) -> Option<String> {
    let Query(query) = Query::<TokenQuery>::try_from_uri(uri)
        .inspect_err(|e| tracing::debug!("Unreadable query string: {e}"))
        .ok()?;
    query.access_token.filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn uri(s: &str) -> Uri {
        s.parse().unwrap()
    }

    #[test]
    fn test_bearer_header() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(
            extract_token(&headers, &uri("/x?access_token=other")),
            Some("abc.def.ghi".to_string())
        );
    }

    #[test]
    fn test_query_fallback() {
        let headers = HeaderMap::new();
        assert_eq!(
            extract_token(&headers, &uri("/x?a=1&access_token=tok")),
            Some("tok".to_string())
        );
        assert_eq!(extract_token(&headers, &uri("/x?access_token=")), None);
        assert_eq!(extract_token(&headers, &uri("/x")), None);
    }

    #[test]
    fn test_query_token_is_percent_decoded() {
        let headers = HeaderMap::new();
        assert_eq!(
            extract_token(&headers, &uri("/x?access_token=a%2Eb%2Dc&x=%20")),
            Some("a.b-c".to_string())
        );
        assert_eq!(
            extract_token(&headers, &uri("/x?access_token=a+b")),
            Some("a b".to_string())
        );
    }

    #[test]
    fn test_other_schemes_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic Zm9vOmJhcg=="));
        assert_eq!(extract_token(&headers, &uri("/x")), None);
    }
}
