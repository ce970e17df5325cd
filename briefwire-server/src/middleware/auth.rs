use axum::{
    body::Body,
    extract::Request,
    http::{self, header},
    middleware::Next,
    response::Response,
};
use http::StatusCode;
use tracing::debug;
use uuid::Uuid;

use crate::middleware::request_context::RequestContext;

// Session issuance and validation belong to the platform's auth layer; by the
// time a request reaches this service the gateway has already verified the
// session and the bearer token carries the subject id. Missing or malformed
// tokens are rejected here.
pub async fn auth_middleware(mut req: Request<Body>, next: Next) -> Result<Response, StatusCode> {
    let user_id = extract_bearer_subject(req.headers()).ok_or(StatusCode::UNAUTHORIZED)?;

    if let Some(context) = req.extensions_mut().get_mut::<RequestContext>() {
        context.user_id = Some(user_id);
    } else {
        req.extensions_mut().insert(RequestContext {
            request_id: String::new(),
            user_id: Some(user_id),
        });
    }

    tracing::Span::current().record("user", tracing::field::display(user_id));
    debug!("Authenticated request to {} for {}", req.uri().path(), user_id);
    Ok(next.run(req).await)
}

fn extract_bearer_subject(headers: &http::HeaderMap) -> Option<Uuid> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    Uuid::parse_str(token).ok()
}
