//! Bearer-token authentication for the HTTP surface.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    error::ErrorUnauthorized,
    web, Error,
};
use futures_util::future::{ready, Ready};

/// Requires `Authorization: Bearer <api_key>` on every route except the
/// liveness probe. Absent and mismatched credentials get the same response
/// so the two cases cannot be told apart. When no key is configured the
/// middleware passes everything through (development / test mode).
pub struct ApiKeyAuth;

impl<S, B> Transform<S, ServiceRequest> for ApiKeyAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = ApiKeyAuthService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ApiKeyAuthService { service }))
    }
}

pub struct ApiKeyAuthService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for ApiKeyAuthService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future =
        futures_util::future::LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let path = req.path().to_string();

        if path == "/health" {
            return Box::pin(self.service.call(req));
        }

        let expected = req
            .app_data::<web::Data<crate::handlers::AppState>>()
            .and_then(|state| state.config.bearer_key());

        let Some(expected) = expected else {
            return Box::pin(self.service.call(req));
        };

        let provided = req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::to_string);

        match provided {
            Some(token) if token == expected => Box::pin(self.service.call(req)),
            _ => {
                tracing::warn!(path = %path, "rejected request with invalid or missing API key");
                Box::pin(async { Err(ErrorUnauthorized("Invalid or missing API key")) })
            }
        }
    }
}
