use actix_web::{
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http::{Method, StatusCode},
    Error,
};
use futures::future::{ok, Ready};
use futures::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

/// Rewrites CORS preflight responses to `204 No Content` (§6). `actix-cors`
/// answers `OPTIONS` itself with `200 OK`; the original router writes
/// `204` explicitly (`internal/transport/http/router.go`), so this sits
/// outside the `Cors` wrap and corrects the status on the way out.
pub struct PreflightNoContent;

impl<S, B> Transform<S, ServiceRequest> for PreflightNoContent
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = PreflightNoContentMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(PreflightNoContentMiddleware {
            service: Rc::new(service),
        })
    }
}

pub struct PreflightNoContentMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for PreflightNoContentMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let srv = self.service.clone();
        let is_preflight = req.method() == Method::OPTIONS;

        Box::pin(async move {
            let mut res = srv.call(req).await?;
            if is_preflight {
                *res.response_mut().status_mut() = StatusCode::NO_CONTENT;
            }
            Ok(res)
        })
    }
}
