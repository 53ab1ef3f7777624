use ntex::{http::Payload, web};
use serde::Deserialize;
use subtle::ConstantTimeEq;

use super::{AppState, errors::ApiError};
use crate::consts;

/// Guard for `/api` routes. Passes when no key is configured, otherwise the
/// request must carry it in `x-api-key` or the `api_key` query parameter.
pub struct ApiKey;

#[derive(Deserialize)]
struct ApiKeyQuery {
    api_key: Option<String>,
}

fn provided_key(req: &web::HttpRequest) -> Option<String> {
    let from_header = req
        .headers()
        .get(consts::API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    from_header.or_else(|| {
        web::types::Query::<ApiKeyQuery>::from_query(req.query_string())
            .ok()
            .and_then(|query| query.into_inner().api_key)
    })
}

fn is_authorized(req: &web::HttpRequest) -> bool {
    let Some(app_state) = req.app_state::<AppState>() else {
        return false;
    };
    let Some(expected) = app_state.api_key.as_deref() else {
        return true;
    };

    provided_key(req).is_some_and(|provided| provided.as_bytes().ct_eq(expected.as_bytes()).into())
}

impl<Err> web::FromRequest<Err> for ApiKey {
    type Error = web::Error;

    fn from_request(
        req: &web::HttpRequest,
        _: &mut Payload,
    ) -> impl std::future::Future<Output = Result<Self, Self::Error>> {
        if !is_authorized(req) {
            log::warn!(
                "rejected {method} {path}: missing or invalid api key",
                method = req.method(),
                path = req.path()
            );
            return futures::future::ready(Err(ApiError::Unauthorized.into()));
        }

        futures::future::ready(Ok(Self))
    }
}
