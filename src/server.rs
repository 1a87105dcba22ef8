//! Local HTTP server for the dashboard.
//!
//! Serves the rendered dashboard page, the styled GeoJSON and a JSON
//! summary endpoint. Dashboards are joined once per stored year at
//! startup and shared read-only across requests, so the store is not
//! touched on the request path.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use serde::Deserialize;
use tracing::info;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use crate::config::Config;
use crate::dashboard::Dashboard;
use crate::error::{Error, Result};
use crate::indicator::Indicator;
use crate::storage::Storage;

/// Shared read-only state behind the request handlers.
#[derive(Debug)]
struct ServerState {
    config: Config,
    dashboards: HashMap<i32, Dashboard>,
    default_year: i32,
}

/// Query parameters accepted by every route.
#[derive(Debug, Default, Deserialize)]
struct PageQuery {
    year: Option<i32>,
    indicator: Option<String>,
}

/// A request for a year or indicator the store doesn't have.
#[derive(Debug)]
struct NotFound(String);
impl warp::reject::Reject for NotFound {}

/// A render failure while answering a request.
#[derive(Debug)]
struct RenderFailed(String);
impl warp::reject::Reject for RenderFailed {}

/// Serve the dashboard until the process is stopped.
///
/// The optional year overrides the default year shown when a request
/// has no `year` parameter.
///
/// # Errors
///
/// Returns an error if the store has nothing to serve, the requested
/// default year has no observations, the listen address is invalid, or
/// the port cannot be bound.
pub async fn serve(
    config: &Config,
    storage: &Storage,
    host: &str,
    port: u16,
    year: Option<i32>,
) -> Result<()> {
    let state = build_state(config, storage, year)?;

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|e: std::net::AddrParseError| Error::ServerBind {
            addr: format!("{host}:{port}"),
            message: e.to_string(),
        })?;

    let routes = routes(state).recover(handle_rejection);
    let (bound, server) =
        warp::serve(routes)
            .try_bind_ephemeral(addr)
            .map_err(|e| Error::ServerBind {
                addr: addr.to_string(),
                message: e.to_string(),
            })?;

    info!("Dashboard listening on http://{bound}");
    server.await;
    Ok(())
}

/// Join a dashboard for every stored year.
fn build_state(
    config: &Config,
    storage: &Storage,
    default_year: Option<i32>,
) -> Result<Arc<ServerState>> {
    let years = storage.years()?;
    let default_year = match default_year {
        Some(year) if years.contains(&year) => year,
        Some(year) => {
            return Err(Error::no_data(format!("observations for year {year}")));
        }
        None => *years.last().ok_or_else(|| Error::no_data("observations"))?,
    };

    let mut dashboards = HashMap::with_capacity(years.len());
    for year in years {
        dashboards.insert(year, Dashboard::build(storage, config, Some(year), None)?);
    }
    info!("Prepared dashboards for {} years", dashboards.len());

    Ok(Arc::new(ServerState {
        config: config.clone(),
        dashboards,
        default_year,
    }))
}

/// The route table: the page, the styled GeoJSON and the JSON summary.
fn routes(
    state: Arc<ServerState>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let with_state = warp::any().map(move || Arc::clone(&state));

    let index = warp::path::end()
        .and(warp::get())
        .and(warp::query::<PageQuery>())
        .and(with_state.clone())
        .and_then(handle_index);

    let geojson = warp::path!("data" / "regions.geojson")
        .and(warp::get())
        .and(warp::query::<PageQuery>())
        .and(with_state.clone())
        .and_then(handle_geojson);

    let summary = warp::path!("api" / "summary")
        .and(warp::get())
        .and(warp::query::<PageQuery>())
        .and(with_state)
        .and_then(handle_summary);

    index
        .or(geojson)
        .or(summary)
        .with(warp::trace::request())
}

/// Pick the dashboard for the requested year.
fn dashboard_for<'a>(
    state: &'a ServerState,
    query: &PageQuery,
) -> std::result::Result<&'a Dashboard, Rejection> {
    let year = query.year.unwrap_or(state.default_year);
    state
        .dashboards
        .get(&year)
        .ok_or_else(|| warp::reject::custom(NotFound(format!("no observations for year {year}"))))
}

/// Parse the requested indicator, defaulting from config.
fn indicator_for(
    state: &ServerState,
    query: &PageQuery,
) -> std::result::Result<Indicator, Rejection> {
    match &query.indicator {
        Some(raw) => raw.parse::<Indicator>().map_err(|_| {
            warp::reject::custom(NotFound(format!("unknown indicator '{raw}'")))
        }),
        None => Ok(state.config.default_indicator()),
    }
}

async fn handle_index(
    query: PageQuery,
    state: Arc<ServerState>,
) -> std::result::Result<impl Reply, Rejection> {
    let dashboard = dashboard_for(&state, &query)?;
    let indicator = indicator_for(&state, &query)?;
    let html = dashboard
        .render(&state.config, indicator)
        .map_err(|e| warp::reject::custom(RenderFailed(e.to_string())))?;
    Ok(warp::reply::html(html))
}

async fn handle_geojson(
    query: PageQuery,
    state: Arc<ServerState>,
) -> std::result::Result<impl Reply, Rejection> {
    let dashboard = dashboard_for(&state, &query)?;
    let body = dashboard.feature_collection_json();
    Ok(warp::reply::with_header(
        body,
        "content-type",
        "application/geo+json",
    ))
}

async fn handle_summary(
    query: PageQuery,
    state: Arc<ServerState>,
) -> std::result::Result<impl Reply, Rejection> {
    let dashboard = dashboard_for(&state, &query)?;
    Ok(warp::reply::json(&dashboard.summary_json()))
}

/// Turn rejections into JSON error responses.
async fn handle_rejection(
    rejection: Rejection,
) -> std::result::Result<impl Reply, std::convert::Infallible> {
    let (status, message) = if rejection.is_not_found() {
        (StatusCode::NOT_FOUND, "not found".to_string())
    } else if let Some(NotFound(message)) = rejection.find() {
        (StatusCode::NOT_FOUND, message.clone())
    } else if let Some(RenderFailed(message)) = rejection.find() {
        (StatusCode::INTERNAL_SERVER_ERROR, message.clone())
    } else {
        (StatusCode::BAD_REQUEST, "bad request".to_string())
    };

    let body = warp::reply::json(&serde_json::json!({ "error": message }));
    Ok(warp::reply::with_status(body, status))
}
