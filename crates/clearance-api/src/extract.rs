//! Request extractors reporting failures in the API error envelope
//!
//! Body and query parsing go through `serde_path_to_error` so a failure
//! names the offending field (`purl`, `purls[1]`, `data.state.status`).

use axum::{
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Request},
    http::request::Parts,
};
use serde::{de::DeserializeOwned, Deserialize, Deserializer};

use crate::error::{ApiError, ApiResult};

/// JSON body extractor
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        parse_json(&bytes).map(ValidatedJson)
    }
}

/// Query string extractor
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ValidatedQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parse_query(parts.uri.query().unwrap_or_default()).map(ValidatedQuery)
    }
}

pub fn parse_json<T: DeserializeOwned>(bytes: &[u8]) -> ApiResult<T> {
    let deserializer = &mut serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize(deserializer).map_err(|err| {
        let path = err.path().to_string();
        reject(path, err.into_inner().to_string())
    })
}

pub fn parse_query<T: DeserializeOwned>(query: &str) -> ApiResult<T> {
    let deserializer =
        serde_urlencoded::Deserializer::new(form_urlencoded::parse(query.as_bytes()));
    serde_path_to_error::deserialize(deserializer).map_err(|err| {
        let path = err.path().to_string();
        reject(path, err.into_inner().to_string())
    })
}

fn reject(path: String, message: String) -> ApiError {
    let path = field_path(&path, &message);
    ApiError::Validation {
        message,
        path: Some(path).filter(|p| !p.is_empty()),
    }
}

/// Missing fields are reported at their parent; point at the field itself
fn field_path(path: &str, message: &str) -> String {
    // Syntax errors leave an unknown `?` segment where no field was read
    let known = path
        .split('.')
        .filter(|segment| *segment != "?" && !segment.is_empty())
        .collect::<Vec<_>>()
        .join(".");
    let parent = known.as_str();
    let missing = message
        .strip_prefix("missing field `")
        .and_then(|rest| rest.split('`').next());
    match missing {
        Some(field) if parent.is_empty() => field.to_string(),
        Some(field) => format!("{}.{}", parent, field),
        None => parent.to_string(),
    }
}

/// Path parameter holding a numeric id
pub fn parse_id(raw: &str) -> ApiResult<i64> {
    raw.parse()
        .map_err(|_| ApiError::validation("id", format!("'{}' is not a valid id", raw)))
}

/// Optional field that may be omitted but not set to `null`.
///
/// Use with `#[serde(default, deserialize_with = "non_null")]`.
pub fn non_null<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Nullable field of a partial update: omitted is `None`, `null` is
/// `Some(None)`.
///
/// Use with `#[serde(default, deserialize_with = "double_option")]`.
pub fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    #[allow(dead_code)]
    struct Body {
        purl: String,
        #[serde(default, deserialize_with = "non_null")]
        local: Option<bool>,
        #[serde(default, deserialize_with = "double_option")]
        comment: Option<Option<String>>,
        #[serde(default)]
        purls: Vec<String>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Query {
        page_index: Option<u32>,
        has_bulk_conclusion: Option<bool>,
    }

    fn path_of(err: ApiError) -> Option<String> {
        match err {
            ApiError::Validation { path, .. } => path,
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_missing_field_points_at_field() {
        let err = parse_json::<Body>(b"{}").unwrap_err();
        assert_eq!(path_of(err).as_deref(), Some("purl"));
    }

    #[test]
    fn test_wrong_type_in_list_has_index() {
        let err = parse_json::<Body>(br#"{"purl":"p","purls":["a",2]}"#).unwrap_err();
        assert_eq!(path_of(err).as_deref(), Some("purls[1]"));
    }

    #[test]
    fn test_null_handling() {
        let err = parse_json::<Body>(br#"{"purl":"p","local":null}"#).unwrap_err();
        assert_eq!(path_of(err).as_deref(), Some("local"));

        let body: Body = parse_json(br#"{"purl":"p","comment":null}"#).unwrap();
        assert_eq!(body.comment, Some(None));
        let body: Body = parse_json(br#"{"purl":"p"}"#).unwrap();
        assert_eq!(body.comment, None);
        assert_eq!(body.local, None);
    }

    #[test]
    fn test_malformed_json_has_no_path() {
        let err = parse_json::<Body>(b"{not json").unwrap_err();
        assert_eq!(path_of(err), None);

        let truncated: [&[u8]; 3] = [b"[", b"{\"purl\":\"p\",", b"{\"purl\":\"p\",\"purls\":[\"a\",}"];
        for body in truncated {
            let path = path_of(parse_json::<Body>(body).unwrap_err());
            assert!(!path.unwrap_or_default().contains('?'));
        }
    }

    #[test]
    fn test_query_parsing() {
        let query: Query = parse_query("pageIndex=2&hasBulkConclusion=true").unwrap();
        assert_eq!(query.page_index, Some(2));
        assert_eq!(query.has_bulk_conclusion, Some(true));

        let err = parse_query::<Query>("pageIndex=x").unwrap_err();
        assert_eq!(path_of(err).as_deref(), Some("pageIndex"));
        let err = parse_query::<Query>("hasBulkConclusion=maybe").unwrap_err();
        assert_eq!(path_of(err).as_deref(), Some("hasBulkConclusion"));
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("42").unwrap(), 42);
        assert_eq!(path_of(parse_id("abc").unwrap_err()).as_deref(), Some("id"));
    }
}
