use axum::{
    extract::MatchedPath,
    http::{header, Request, Response},
};
use tower_http::trace::{MakeSpan, OnResponse};
use tracing::Level;

#[derive(Debug, Clone, Copy)]
pub(crate) struct Tracer;

impl<Body> MakeSpan<Body> for Tracer {
    fn make_span(&mut self, request: &Request<Body>) -> tracing::Span {
        let route = http_route(request);
        let span_name = format!("{} {}", request.method(), route);

        tracing::span!(
            Level::INFO,
            "server.request",
            otel.name = span_name,
            kind = "server",
            uri = %request.uri(),
            url.path = %request.uri().path(),
            url.query = request.uri().query(),
            http.route = route,
            http.request.method = %request.method(),
            http.request.header.host = header_str(request.headers(), header::HOST),
            user_agent.original = header_str(request.headers(), header::USER_AGENT),
            user.id = tracing::field::Empty,
            http.response.status_code = tracing::field::Empty,
            http.response.header.content_type = tracing::field::Empty,
        )
    }
}

impl<Body> OnResponse<Body> for Tracer {
    fn on_response(
        self,
        response: &Response<Body>,
        latency: std::time::Duration,
        span: &tracing::Span,
    ) {
        let status_code = response.status().as_u16();
        tracing::event!(
            Level::INFO,
            status = status_code,
            latency = format_args!("{} ms", latency.as_millis()),
            "finished processing request"
        );

        span.record("http.response.status_code", status_code);
        span.record(
            "http.response.header.content_type",
            header_str(response.headers(), header::CONTENT_TYPE),
        );
    }
}

fn header_str(headers: &axum::http::HeaderMap, name: header::HeaderName) -> Option<&str> {
    headers.get(name).and_then(|h| h.to_str().ok())
}

#[inline]
fn http_route<B>(req: &Request<B>) -> &str {
    req.extensions()
        .get::<MatchedPath>()
        .map_or_else(|| "", |mp| mp.as_str())
}
