use std::{net::SocketAddr, sync::Arc};

use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::Method,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::{
    directory::TickerDirectory,
    error::ApiError,
    marketplace::MarketDataApi,
    quote::{effective_days, get_detail, get_quote, Detail, Quote},
};

/// Shared by every request. The directory is built on first use and then only read.
pub struct ServerState<M> {
    market: M,
    directory: OnceCell<TickerDirectory>,
}

pub type SharedServerState<M> = Arc<ServerState<M>>;

impl<M: MarketDataApi> ServerState<M> {
    pub fn new(market: M) -> Self {
        Self {
            market,
            directory: OnceCell::new(),
        }
    }

    /// Uses an already built directory, e.g. a test fixture.
    pub fn with_directory(market: M, directory: TickerDirectory) -> Self {
        Self {
            market,
            directory: OnceCell::new_with(Some(directory)),
        }
    }

    pub fn market(&self) -> &M {
        &self.market
    }

    /// Concurrent first callers share one load; a failed load is retried by the next caller.
    pub async fn directory(&self) -> Result<&TickerDirectory> {
        self.directory
            .get_or_try_init(|| TickerDirectory::load(&self.market))
            .await
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct DetailParams {
    days: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct Health {
    pub status: String,
    pub tickers: usize,
}

pub fn router<M>(state: SharedServerState<M>) -> Router
where
    M: MarketDataApi + 'static,
{
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/api/stock/{term}", get(stock_handler::<M>))
        .route("/api/stock_details/{term}", get(stock_details_handler::<M>))
        .route("/health", get(health_handler::<M>))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start<M>(address: String, state: SharedServerState<M>) -> Result<()>
where
    M: MarketDataApi + 'static,
{
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

async fn stock_handler<M: MarketDataApi>(
    State(state): State<SharedServerState<M>>,
    Path(term): Path<String>,
) -> Result<Json<Quote>, ApiError> {
    let directory = state.directory().await?;
    let quote = get_quote(directory, state.market(), &term).await?;
    Ok(Json(quote))
}

async fn stock_details_handler<M: MarketDataApi>(
    State(state): State<SharedServerState<M>>,
    Path(term): Path<String>,
    Query(params): Query<DetailParams>,
) -> Result<Json<Detail>, ApiError> {
    let days = effective_days(params.days.as_deref());
    let directory = state.directory().await?;
    let today = state.market().today();
    let detail = get_detail(directory, state.market(), &term, days, today).await?;
    Ok(Json(detail))
}

async fn health_handler<M: MarketDataApi>(
    State(state): State<SharedServerState<M>>,
) -> Result<Json<Health>, ApiError> {
    let directory = state.directory().await?;
    Ok(Json(Health {
        status: "ok".to_string(),
        tickers: directory.len(),
    }))
}
