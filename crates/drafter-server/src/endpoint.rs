//! Background generation endpoint
//!
//! `POST /api/disclosure/background-generation` accepts
//! `{ inventionName, technicalField, existingProblems? }` and streams the
//! generated text as `text/plain; charset=utf-8`, one body chunk per model
//! chunk. Errors detected before the first chunk are JSON `{ error }`
//! responses. A failure after output has started aborts the connection, so
//! clients see a truncated body rather than a clean end of stream.

use bytes::Bytes;
use drafter_core::{GenerationClient, GenerationError, GenerationPayload, GenerationRequest};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use tracing::{debug, error, info, warn};
use warp::http::header::{HeaderValue, CONTENT_TYPE};
use warp::http::StatusCode;
use warp::hyper::Body;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

/// Route of the background generation endpoint
pub const BACKGROUND_PATH: &str = "/api/disclosure/background-generation";

/// Largest accepted request body, in bytes
pub const MAX_BODY_BYTES: u64 = 64 * 1024;

pub const MISSING_FIELDS_MESSAGE: &str = "发明名称和技术领域是必需的";
pub const INTERNAL_ERROR_MESSAGE: &str = "服务器内部错误";

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// JSON error body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    fn reply(status: StatusCode, message: &str) -> Response {
        let body = Self {
            error: message.to_string(),
        };
        warp::reply::with_status(warp::reply::json(&body), status).into_response()
    }
}

/// HTTP boundary of the generation pipeline
#[derive(Debug, Clone)]
pub struct GenerationEndpoint {
    client: GenerationClient,
}

impl GenerationEndpoint {
    /// Create endpoint
    #[inline]
    #[must_use]
    pub fn new(client: GenerationClient) -> Self {
        Self { client }
    }

    /// Generation client
    #[inline]
    #[must_use]
    pub fn client(&self) -> &GenerationClient {
        &self.client
    }

    /// Handle one request body
    ///
    /// Resolves once the first chunk is available or the request has failed;
    /// the rest of the output streams through the returned body.
    pub async fn handle(&self, body: &[u8]) -> Response {
        let payload: GenerationPayload = match serde_json::from_slice(body) {
            Ok(payload) => payload,
            Err(err) => {
                error!(error = %err, "Unparseable generation payload");
                return ErrorBody::reply(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE);
            }
        };

        let request = match GenerationRequest::from_payload(payload) {
            Ok(request) => request,
            Err(err) => {
                debug!(error = %err, "Rejected generation request");
                return ErrorBody::reply(StatusCode::BAD_REQUEST, MISSING_FIELDS_MESSAGE);
            }
        };

        info!(
            invention = request.invention_name(),
            field = request.technical_field(),
            "Accepted background generation request"
        );

        let chunks = match self.client.stream(&request).await {
            Ok(chunks) => chunks,
            Err(err) => {
                error!(error = %err, "Background generation failed before output");
                return ErrorBody::reply(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE);
            }
        };

        let mut sent = 0usize;
        let body = chunks.map(move |chunk| match chunk {
            Ok(text) => {
                sent += 1;
                Ok(Bytes::from(text))
            }
            Err(err) => {
                error!(chunks = sent, error = %err, "Background generation stream failed");
                Err::<Bytes, GenerationError>(err)
            }
        });

        let mut response = Response::new(Body::wrap_stream(body));
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN));
        response
    }

    /// Warp routes: the generation endpoint and `GET /health`
    pub fn routes(&self) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
        let endpoint = self.clone();
        let background = warp::path!("api" / "disclosure" / "background-generation")
            .and(warp::post())
            .and(warp::body::content_length_limit(MAX_BODY_BYTES))
            .and(warp::body::bytes())
            .and_then(move |body: Bytes| {
                let endpoint = endpoint.clone();
                async move { Ok::<_, Rejection>(endpoint.handle(&body).await) }
            });

        let health = warp::path!("health")
            .and(warp::get())
            .map(|| warp::reply::json(&serde_json::json!({ "status": "ok" })));

        background
            .or(health)
            .recover(recover)
            .with(warp::trace::request())
    }

    /// Bind and return the bound address with the server future
    ///
    /// The server stops accepting connections once `shutdown` resolves.
    ///
    /// # Errors
    /// - `warp::Error` if the address cannot be bound
    pub fn bind(
        &self,
        addr: SocketAddr,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(SocketAddr, impl Future<Output = ()>), warp::Error> {
        warp::serve(self.routes()).try_bind_with_graceful_shutdown(addr, shutdown)
    }
}

async fn recover(rejection: Rejection) -> Result<Response, Infallible> {
    let (status, message) = if rejection.is_not_found() {
        (StatusCode::NOT_FOUND, "not found")
    } else if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "method not allowed")
    } else if rejection.find::<warp::reject::LengthRequired>().is_some() {
        (StatusCode::LENGTH_REQUIRED, "length required")
    } else if rejection.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "payload too large")
    } else {
        warn!(?rejection, "Unhandled rejection");
        (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE)
    };
    Ok(ErrorBody::reply(status, message))
}
