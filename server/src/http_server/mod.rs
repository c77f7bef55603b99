use std::net::SocketAddr;

use axum::response::Response;
use color_eyre::eyre::WrapErr;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::AppState;

pub(crate) mod api {
    pub mod auth;
    pub mod ingredients;
    pub mod recipes;
    pub mod tags;
    pub mod users;
}

pub(crate) mod current_user;
pub mod errors;
pub(crate) mod extract;
pub(crate) mod pagination;
pub(crate) mod representations;
pub(crate) mod routes;
mod trace;
pub(crate) mod validation;

#[cfg(test)]
pub(crate) mod test_helpers;

pub(crate) type ResponseResult<T = Response> = Result<T, errors::ServerError>;

pub(crate) async fn run_server(state: AppState) -> color_eyre::Result<()> {
    let tracer = trace::Tracer;
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(tracer)
        .on_response(tracer);

    let app = routes::make_router(&state.app)
        .with_state(state.clone())
        .layer(trace_layer);

    let addr = SocketAddr::from(([0, 0, 0, 0], state.app.port));
    tracing::info!("Starting server on port {}", state.app.port);
    let listener = TcpListener::bind(&addr)
        .await
        .wrap_err("Failed to open port")?;

    let addr = listener.local_addr()?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .await
        .wrap_err("Failed to run server")
}
