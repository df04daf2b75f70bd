//! End-to-end tests of the Negotiate layer around a tower service.

mod support;

use std::convert::Infallible;
use std::future::{self, Ready};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use http::{header, Request, Response, StatusCode};
use krb_negotiate::{AuthenticatedUser, NegotiateLayer};
use tower::{service_fn, ServiceExt};

fn request(authorization: Option<String>) -> Request<String> {
    let mut builder = Request::builder().uri("/records");
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(String::new()).unwrap()
}

fn reply(status: StatusCode, body: &str) -> Response<String> {
    let mut res = Response::new(body.to_owned());
    *res.status_mut() = status;
    res
}

/// Inner service that requires a logged-in user, counting its calls.
#[derive(Clone)]
struct Protected {
    calls: Arc<AtomicUsize>,
}

impl tower::Service<Request<String>> for Protected {
    type Response = Response<String>;
    type Error = Infallible;
    type Future = Ready<Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<String>) -> Self::Future {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let res = match req.extensions().get::<AuthenticatedUser>() {
            Some(user) => reply(StatusCode::CREATED, &user.email),
            None => reply(StatusCode::FORBIDDEN, "forbidden"),
        };
        future::ready(Ok(res))
    }
}

fn protected(calls: Arc<AtomicUsize>) -> Protected {
    Protected { calls }
}

#[tokio::test]
async fn test_no_auth_needed() {
    let _ = env_logger::try_init();
    let (mediator, acceptor) = support::mediator();
    let svc = NegotiateLayer::new(mediator).into_builder().service(service_fn(
        |_req: Request<String>| async { Ok::<_, Infallible>(reply(StatusCode::OK, "success")) },
    ));

    let res = svc.oneshot(request(None)).await.unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.body(), "success");
    assert!(res.headers().get(header::WWW_AUTHENTICATE).is_none());
    assert_eq!(acceptor.contexts(), 0);
}

#[tokio::test]
async fn test_forbidden_without_credentials_becomes_challenge() {
    let (mediator, acceptor) = support::mediator();
    let calls = Arc::new(AtomicUsize::new(0));
    let svc = NegotiateLayer::new(mediator)
        .into_builder()
        .service(protected(calls.clone()));

    let res = svc.oneshot(request(None)).await.unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(res.headers()[header::WWW_AUTHENTICATE], "Negotiate");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(acceptor.contexts(), 0);
}

#[tokio::test]
async fn test_unauthorized_without_credentials_gets_challenge() {
    let (mediator, _) = support::mediator();
    let svc = NegotiateLayer::new(mediator).into_builder().service(service_fn(
        |_req: Request<String>| async {
            Ok::<_, Infallible>(reply(StatusCode::UNAUTHORIZED, "login"))
        },
    ));

    let res = svc.oneshot(request(None)).await.unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(res.headers()[header::WWW_AUTHENTICATE], "Negotiate");
    assert_eq!(res.body(), "login");
}

#[tokio::test]
async fn test_mapped_principal_logs_in_and_relays_token() {
    let (mediator, acceptor) = support::mediator();
    let calls = Arc::new(AtomicUsize::new(0));
    let svc = NegotiateLayer::new(mediator)
        .into_builder()
        .service(protected(calls.clone()));

    let res = svc
        .oneshot(request(Some(support::negotiate("ok:alice@EXAMPLE.COM"))))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::CREATED);
    assert_eq!(res.body(), "alice@example.com");
    assert_eq!(
        res.headers()[header::WWW_AUTHENTICATE],
        "Negotiate bXV0dWFs"
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(acceptor.contexts(), 1);
}

#[tokio::test]
async fn test_unmapped_principal_is_rejected_before_inner() {
    let (mediator, _) = support::mediator();
    let calls = Arc::new(AtomicUsize::new(0));
    let svc = NegotiateLayer::new(mediator)
        .into_builder()
        .service(protected(calls.clone()));

    let res = svc
        .oneshot(request(Some(support::negotiate("ok:carol@EXAMPLE.COM"))))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(res.headers()[header::WWW_AUTHENTICATE], "Negotiate");
    assert_eq!(
        res.headers()[header::CONTENT_TYPE],
        "application/json"
    );
    let body: serde_json::Value = serde_json::from_str(res.body()).unwrap();
    assert_eq!(body["status"], 401);
    assert_eq!(
        body["message"],
        "Authentication is required to access this resource."
    );
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_inactive_account_is_rejected() {
    let (mediator, _) = support::mediator();
    let calls = Arc::new(AtomicUsize::new(0));
    let svc = NegotiateLayer::new(mediator)
        .into_builder()
        .service(protected(calls.clone()));

    let res = svc
        .oneshot(request(Some(support::negotiate("ok:bob@EXAMPLE.COM"))))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unrecognized_token_proceeds_anonymously() {
    let (mediator, acceptor) = support::mediator();
    let calls = Arc::new(AtomicUsize::new(0));
    let svc = NegotiateLayer::new(mediator)
        .into_builder()
        .service(protected(calls.clone()));

    let res = svc
        .oneshot(request(Some(support::negotiate("continue"))))
        .await
        .unwrap();

    // the incomplete context's token is not relayed
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(res.headers()[header::WWW_AUTHENTICATE], "Negotiate");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(acceptor.contexts(), 1);
}

#[tokio::test]
async fn test_other_scheme_is_ignored() {
    let (mediator, acceptor) = support::mediator();
    let calls = Arc::new(AtomicUsize::new(0));
    let svc = NegotiateLayer::new(mediator)
        .into_builder()
        .service(protected(calls.clone()));

    let res = svc
        .oneshot(request(Some("Basic YWxpY2U6c2VjcmV0".to_owned())))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(res.headers()[header::WWW_AUTHENTICATE], "Negotiate");
    assert_eq!(acceptor.contexts(), 0);
}

#[tokio::test]
async fn test_authenticated_forbidden_is_kept() {
    let (mediator, _) = support::mediator();
    // a session established by the application itself
    let svc = NegotiateLayer::new(mediator).into_builder().service(service_fn(
        |_req: Request<String>| async {
            let mut res = reply(StatusCode::FORBIDDEN, "not yours");
            res.extensions_mut().insert(AuthenticatedUser {
                account_id: krb_negotiate::mapping::AccountId(1),
                email: "alice@example.com".into(),
                principal: None,
            });
            Ok::<_, Infallible>(res)
        },
    ));

    let res = svc.oneshot(request(None)).await.unwrap();

    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert!(res.headers().get(header::WWW_AUTHENTICATE).is_none());
}

#[tokio::test]
async fn test_layers_added_later_run_inside() {
    let (mediator, _) = support::mediator();
    let seen = Arc::new(AtomicUsize::new(0));
    let seen_in_layer = seen.clone();

    // an authorization stage placed after the Negotiate layer
    let svc = NegotiateLayer::new(mediator)
        .into_builder()
        .map_request(move |req: Request<String>| {
            if req.extensions().get::<AuthenticatedUser>().is_some() {
                seen_in_layer.fetch_add(1, Ordering::SeqCst);
            }
            req
        })
        .service(service_fn(|_req: Request<String>| async {
            Ok::<_, Infallible>(reply(StatusCode::OK, "ok"))
        }));

    let res = svc
        .oneshot(request(Some(support::negotiate("ok:alice@EXAMPLE.COM"))))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_concurrent_requests_keep_their_own_tokens() {
    let (mediator, _) = support::mediator();
    let calls = Arc::new(AtomicUsize::new(0));
    let svc = NegotiateLayer::new(mediator)
        .into_builder()
        .service(protected(calls.clone()));

    let alice = svc
        .clone()
        .oneshot(request(Some(support::negotiate("ok:alice@EXAMPLE.COM"))));
    let anonymous = svc.oneshot(request(None));
    let (alice, anonymous) = tokio::join!(alice, anonymous);

    let alice = alice.unwrap();
    let anonymous = anonymous.unwrap();
    assert_eq!(alice.headers()[header::WWW_AUTHENTICATE], "Negotiate bXV0dWFs");
    assert_eq!(anonymous.headers()[header::WWW_AUTHENTICATE], "Negotiate");
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
}

/// Session binder of an application that has locked every account.
struct Locked;

impl krb_negotiate::SessionBinder for Locked {
    fn login(
        &self,
        account: &krb_negotiate::mapping::Account,
        _principal: &str,
        _extensions: &mut http::Extensions,
    ) -> krb_negotiate::Result<()> {
        Err(krb_negotiate::Error::login_refused(format!(
            "{} is locked",
            account.email
        )))
    }

    fn is_authenticated(&self, extensions: &http::Extensions) -> bool {
        extensions.get::<AuthenticatedUser>().is_some()
    }
}

#[tokio::test]
async fn test_refused_login_is_rejected() {
    let (mediator, _) = support::mediator();
    let calls = Arc::new(AtomicUsize::new(0));
    let svc = NegotiateLayer::new(mediator.with_sessions(Locked))
        .into_builder()
        .service(protected(calls.clone()));

    let res = svc
        .oneshot(request(Some(support::negotiate("ok:alice@EXAMPLE.COM"))))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(res.headers()[header::WWW_AUTHENTICATE], "Negotiate");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}
