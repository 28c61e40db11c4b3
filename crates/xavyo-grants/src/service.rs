//! Tower Service for the grants refresh middleware.

use std::future::Future;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use http::Request;
use pin_project_lite::pin_project;
use tower_service::Service;

use crate::principal::Principal;
use crate::refresh::RefreshGate;

/// Refreshes the caller's packets, then calls the inner service.
///
/// The [`RefreshOutcome`](crate::RefreshOutcome) is inserted into the
/// request extensions for handlers that want to inspect it. The inner
/// service is always called, whatever the outcome.
#[derive(Debug, Clone)]
pub struct GrantsService<S> {
    inner: S,
    gate: RefreshGate,
}

impl<S> GrantsService<S> {
    pub fn new(inner: S, gate: RefreshGate) -> Self {
        Self { inner, gate }
    }
}

type RefreshFuture<S, ReqBody> = Pin<Box<dyn Future<Output = (S, Request<ReqBody>)> + Send>>;

impl<S, ReqBody> Service<Request<ReqBody>> for GrantsService<S>
where
    S: Service<Request<ReqBody>> + Clone + Send + 'static,
    ReqBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = GrantsServiceFuture<S, ReqBody>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<ReqBody>) -> Self::Future {
        let clone = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, clone);
        let gate = self.gate.clone();

        let refresh: RefreshFuture<S, ReqBody> = Box::pin(async move {
            let principal = request.extensions().get::<Principal>().cloned();
            let outcome = gate.refresh(principal.as_ref(), request.headers()).await;
            request.extensions_mut().insert(outcome);
            (inner, request)
        });

        GrantsServiceFuture::Refreshing { refresh }
    }
}

pin_project! {
    /// Future for [`GrantsService`].
    #[project = GrantsServiceFutureProj]
    pub enum GrantsServiceFuture<S, ReqBody>
    where
        S: Service<Request<ReqBody>>,
    {
        /// Waiting on the refresh gate.
        Refreshing {
            refresh: RefreshFuture<S, ReqBody>,
        },
        /// Inner service future.
        Inner {
            #[pin]
            future: S::Future,
        },
    }
}

impl<S, ReqBody> Future for GrantsServiceFuture<S, ReqBody>
where
    S: Service<Request<ReqBody>>,
{
    type Output = Result<S::Response, S::Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        loop {
            match self.as_mut().project() {
                GrantsServiceFutureProj::Refreshing { refresh } => {
                    let (mut inner, request) = ready!(refresh.as_mut().poll(cx));
                    let future = inner.call(request);
                    self.set(GrantsServiceFuture::Inner { future });
                }
                GrantsServiceFutureProj::Inner { future } => return future.poll(cx),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheKey;
    use crate::client::HttpGrantsClient;
    use crate::config::GrantsConfig;
    use crate::ids::UserId;
    use crate::principal::{CLIENT_ID_CLAIM, SYSTEM_CLIENT_ID};
    use crate::refresh::{PassThroughReason, RefreshOutcome};
    use axum::body::Body;
    use http::Response;
    use std::convert::Infallible;
    use std::sync::Arc;
    use tower::{service_fn, ServiceExt};

    fn gate() -> RefreshGate {
        // Unroutable address; only pass-through paths are exercised here.
        let config = GrantsConfig::builder()
            .base_uri("http://127.0.0.1:9")
            .build()
            .unwrap();
        let client = Arc::new(HttpGrantsClient::new(&config).unwrap());
        RefreshGate::from_config(client, config)
    }

    async fn echo_outcome(request: Request<Body>) -> Result<Response<String>, Infallible> {
        let outcome = request.extensions().get::<RefreshOutcome>().copied();
        Ok(Response::new(format!("{outcome:?}")))
    }

    #[tokio::test]
    async fn test_service_passes_system_user_through() {
        let gate = gate();
        let service = GrantsService::new(service_fn(echo_outcome), gate.clone());

        let mut request = Request::new(Body::empty());
        request
            .extensions_mut()
            .insert(Principal::new().with_claim(CLIENT_ID_CLAIM, SYSTEM_CLIENT_ID));

        let response = service.oneshot(request).await.unwrap();
        assert_eq!(
            response.into_body(),
            format!(
                "{:?}",
                Some(RefreshOutcome::PassThrough(PassThroughReason::SystemUser))
            )
        );
        assert!(gate.cache().is_empty());
    }

    #[tokio::test]
    async fn test_service_without_principal_passes_through() {
        let service = GrantsService::new(service_fn(echo_outcome), gate());

        let response = service.oneshot(Request::new(Body::empty())).await.unwrap();
        assert_eq!(
            response.into_body(),
            format!(
                "{:?}",
                Some(RefreshOutcome::PassThrough(
                    PassThroughReason::UnknownSubject
                ))
            )
        );
    }

    #[tokio::test]
    async fn test_service_fails_open_when_server_unreachable() {
        let gate = gate();
        let service = GrantsService::new(service_fn(echo_outcome), gate.clone());

        let mut request = Request::new(Body::empty());
        request
            .extensions_mut()
            .insert(Principal::new().with_claim("sub", "42"));

        let response = service.oneshot(request).await.unwrap();
        assert_eq!(
            response.into_body(),
            format!("{:?}", Some(RefreshOutcome::FetchFailed))
        );
        assert!(gate.cache().get(&CacheKey::new(UserId::new(42))).is_empty());
    }
}
