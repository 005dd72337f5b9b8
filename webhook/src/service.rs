use crate::errors::WebhookError;
use crate::metrics_defs::REQUESTS;
use crate::payload::{BuildNotification, ConfigResponse};
use crate::registry::Registry;
use crate::source::Sources;
use http::header::{CONTENT_TYPE, HeaderValue};
use http::{Method, Request, Response, StatusCode, Uri};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Bytes};
use hyper::service::Service;
use shared::http::{PeerAddr, make_empty_response};
use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Extension method some clients use to check whether they are talking to a teapot.
const BREW: &str = "BREW";

/// How a request was resolved. Decides the log level of the access log line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum OutcomeKind {
    /// The external config was returned
    Served,
    /// No external config is registered for the repository
    Fallback,
    /// An external config is registered but could not be retrieved
    Degraded,
    /// The request itself was not acceptable
    Rejected,
    /// The server could not produce a response
    Failed,
}

#[derive(Debug)]
struct Outcome {
    kind: OutcomeKind,
    status: StatusCode,
    body: Option<Bytes>,
    reason: String,
}

impl Outcome {
    fn served(body: Bytes, reason: String) -> Self {
        Outcome {
            kind: OutcomeKind::Served,
            status: StatusCode::OK,
            body: Some(body),
            reason,
        }
    }

    fn fallback(reason: String) -> Self {
        Outcome {
            kind: OutcomeKind::Fallback,
            status: StatusCode::NO_CONTENT,
            body: None,
            reason,
        }
    }

    fn degraded(reason: String) -> Self {
        Outcome {
            kind: OutcomeKind::Degraded,
            status: StatusCode::NO_CONTENT,
            body: None,
            reason,
        }
    }

    fn log(&self, method: &Method, path: &str, remote_addr: &str) {
        let status = self.status.as_u16();
        let reason = &self.reason;

        macro_rules! access_log {
            ($level:ident) => {
                tracing::$level!(
                    status,
                    method = %method,
                    path = %path,
                    remote_addr = %remote_addr,
                    reason = %reason,
                    "Handled webhook request"
                )
            };
        }

        match self.kind {
            OutcomeKind::Served | OutcomeKind::Fallback | OutcomeKind::Rejected => {
                access_log!(info)
            }
            OutcomeKind::Degraded => access_log!(warn),
            OutcomeKind::Failed => access_log!(error),
        }
    }

    fn into_response(self) -> Response<BoxBody<Bytes, WebhookError>> {
        match self.body {
            Some(body) => {
                let mut response =
                    Response::new(Full::new(body).map_err(|e| match e {}).boxed());
                *response.status_mut() = self.status;
                response
                    .headers_mut()
                    .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                response
            }
            None => make_empty_response(self.status),
        }
    }
}

impl From<WebhookError> for Outcome {
    fn from(error: WebhookError) -> Self {
        let status = error.status();
        let kind = if status.is_server_error() {
            OutcomeKind::Failed
        } else {
            OutcomeKind::Rejected
        };

        Outcome {
            kind,
            status,
            body: None,
            reason: error.to_string(),
        }
    }
}

/// Path and query as sent by the client, for the access log.
fn request_target(uri: &Uri) -> String {
    uri.path_and_query()
        .map_or_else(|| uri.path().to_owned(), ToString::to_string)
}

/// Answers config extension requests from the CI server.
///
/// Each request is independent: the only shared state is the read-only
/// [`Registry`] and the HTTP client pool inside [`Sources`].
#[derive(Clone)]
pub struct WebhookService {
    registry: Arc<Registry>,
    sources: Arc<Sources>,
}

impl WebhookService {
    pub fn new(registry: Arc<Registry>, sources: Sources) -> Self {
        Self {
            registry,
            sources: Arc::new(sources),
        }
    }

    /// Resolves one request into a response and writes the access log line for it.
    pub async fn handle<B>(&self, req: Request<B>) -> Response<BoxBody<Bytes, WebhookError>>
    where
        B: Body,
        B::Error: Display,
    {
        let method = req.method().clone();
        let path = request_target(req.uri());
        let remote_addr = req
            .extensions()
            .get::<PeerAddr>()
            .map(|peer| peer.0.to_string())
            .unwrap_or_else(|| "-".to_owned());

        let outcome = self.resolve(req).await.unwrap_or_else(Outcome::from);

        outcome.log(&method, &path, &remote_addr);
        shared::counter!(REQUESTS, "status" => outcome.status.as_str().to_owned()).increment(1);

        outcome.into_response()
    }

    async fn resolve<B>(&self, req: Request<B>) -> Result<Outcome, WebhookError>
    where
        B: Body,
        B::Error: Display,
    {
        if req.method() != Method::POST {
            if req.method().as_str() == BREW {
                return Err(WebhookError::Teapot);
            }
            return Err(WebhookError::MethodNotAllowed(req.method().clone()));
        }

        let body = req
            .into_body()
            .collect()
            .await
            .map_err(|e| WebhookError::RequestBodyError(e.to_string()))?
            .to_bytes();

        let notification =
            BuildNotification::from_slice(&body).map_err(WebhookError::InvalidPayload)?;
        let slug = notification.repo.slug;

        let Some(location) = self.registry.lookup(&slug) else {
            return Ok(Outcome::fallback(format!(
                "no matching config found for repo {slug}"
            )));
        };

        let config = match self.sources.fetch(location).await {
            Ok(config) => config,
            Err(e) => {
                return Ok(Outcome::degraded(format!(
                    "{e}; falling back to config in repo {slug} ({location})"
                )));
            }
        };

        let response = ConfigResponse::from_bytes(config)
            .map_err(|e| WebhookError::ResponseSerializationError(e.to_string()))?;
        let body = serde_json::to_vec(&response)
            .map_err(|e| WebhookError::ResponseSerializationError(e.to_string()))?;

        Ok(Outcome::served(
            Bytes::from(body),
            format!("successfully sent config for repo {slug} ({location})"),
        ))
    }
}

impl<B> Service<Request<B>> for WebhookService
where
    B: Body + Send + 'static,
    B::Data: Send,
    B::Error: Display,
{
    type Response = Response<BoxBody<Bytes, WebhookError>>;
    type Error = WebhookError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<B>) -> Self::Future {
        let service = self.clone();
        Box::pin(async move { Ok(service.handle(req).await) })
    }
}
