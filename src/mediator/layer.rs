use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::future::{self, BoxFuture};
use http::{Request, Response};
use tower::layer::util::{Identity, Stack};
use tower::ServiceBuilder;
use tower_layer::Layer;
use tower_service::Service;

use super::{internal_error_response, Mediator, PreAuth};

/// Tower layer running Negotiate authentication around a service.
///
/// The layer must be the outermost authentication stage so that the account
/// is logged in before any inner authorization check runs, and so that the
/// challenge is applied to the final status of the inner stack.
/// [`NegotiateLayer::into_builder`] guarantees that by construction.
#[derive(Clone, Debug)]
pub struct NegotiateLayer {
    mediator: Arc<Mediator>,
}

impl NegotiateLayer {
    pub fn new(mediator: Mediator) -> Self {
        log::info!("Negotiate authentication enabled");
        Self {
            mediator: Arc::new(mediator),
        }
    }

    /// Start a [`ServiceBuilder`] with this layer outermost.
    ///
    /// Layers added afterwards run inside it:
    ///
    /// ```ignore
    /// let svc = NegotiateLayer::new(mediator)
    ///     .into_builder()
    ///     .layer(authorization_layer)
    ///     .service(app);
    /// ```
    pub fn into_builder(self) -> ServiceBuilder<Stack<NegotiateLayer, Identity>> {
        ServiceBuilder::new().layer(self)
    }
}

impl<S> Layer<S> for NegotiateLayer {
    type Service = NegotiateService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        NegotiateService {
            inner,
            mediator: self.mediator.clone(),
        }
    }
}

/// Service produced by [`NegotiateLayer`].
#[derive(Clone, Debug)]
pub struct NegotiateService<S> {
    inner: S,
    mediator: Arc<Mediator>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for NegotiateService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    ReqBody: Send + 'static,
    ResBody: From<String> + Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        // take the service that was driven to readiness
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let mediator = self.mediator.clone();

        let (mut parts, body) = req.into_parts();

        // the continuation token lives in this request's future only
        let out_token = match mediator.authenticate(&parts.headers, &mut parts.extensions) {
            Ok(PreAuth::NoCredentials) => None,
            Ok(PreAuth::Authenticated { out_token, .. }) => Some(out_token),
            Ok(rejected @ PreAuth::Rejected(_)) => {
                let mut response = rejected.decision().response();
                mediator.finish(None, false, &mut response);
                return Box::pin(future::ready(Ok(response)));
            }
            Err(err) => {
                log::warn!("Negotiate authentication aborted: {err}");
                return Box::pin(future::ready(Ok(internal_error_response())));
            }
        };

        let caller_authenticated = mediator.is_authenticated(&parts.extensions);
        let req = Request::from_parts(parts, body);

        Box::pin(async move {
            let mut response = inner.call(req).await?;
            let authenticated =
                caller_authenticated || mediator.is_authenticated(response.extensions());
            mediator.finish(out_token.as_deref(), authenticated, &mut response);
            Ok(response)
        })
    }
}
