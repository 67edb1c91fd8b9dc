use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{Path as UrlPath, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tracing::{info, warn};

use pathtm::archive::browse;
use pathtm::decoder::Decoder;
use pathtm::filter::WithApid;

use crate::list::write_listing;

/// Serve `GET /list/<archive-sub-path>?apid=<int>`: a plain-text listing of
/// the decoded packet headers under the archive subtree. Each request gets
/// its own browser and decoder; only the read-only archive root is shared.
pub fn serve(addr: &str, datadir: PathBuf) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("starting runtime")?;
    runtime.block_on(run(addr, datadir))
}

async fn run(addr: &str, datadir: PathBuf) -> Result<()> {
    let app = Router::new()
        .route("/list/*subtree", get(list_handler))
        .with_state(Arc::new(datadir));

    info!(%addr, "archive listing server listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    axum::serve(listener, app).await.context("serving")?;
    Ok(())
}

async fn list_handler(
    State(datadir): State<Arc<PathBuf>>,
    UrlPath(subtree): UrlPath<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let apid = match params.get("apid").map(|raw| raw.parse::<u16>()).transpose() {
        Ok(apid) => apid,
        Err(_) => {
            return (StatusCode::BAD_REQUEST, "apid parameter: invalid").into_response();
        }
    };

    let root = datadir.join(subtree);
    let listing = tokio::task::spawn_blocking(move || render_listing(&root, apid)).await;
    match listing {
        Ok(Ok(body)) => (StatusCode::OK, body).into_response(),
        Ok(Err(err)) => {
            warn!(%err, "browse failed");
            (StatusCode::NOT_FOUND, "not found").into_response()
        }
        Err(err) => {
            warn!(%err, "listing task failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn render_listing(root: &Path, apid: Option<u16>) -> Result<String> {
    let reader = browse(&[root], true)?;
    let mut decoder = Decoder::with_filter(reader, WithApid(apid));
    let mut out = Vec::new();
    if let Err(err) = write_listing(&mut decoder, &mut out, false) {
        // listing is best effort over possibly damaged archives
        warn!(%err, "listing ended early");
    }
    Ok(String::from_utf8_lossy(&out).into_owned())
}
