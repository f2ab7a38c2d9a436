use axum::{body::Bytes, extract::State, Json};
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::AppResult;
use crate::index::Scored;
use crate::service::RebuildOutcome;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SimilarResponse {
    pub items: Vec<Scored>,
}

#[derive(Debug, Serialize)]
pub struct ReindexResponse {
    pub status: &'static str,
    #[serde(flatten)]
    pub outcome: RebuildOutcome,
}

/// Parse the request body as JSON whatever the content type says. An empty
/// or unparseable body reads as `{}` and ends up as a missing-query error.
fn body_json(body: &Bytes) -> Value {
    serde_json::from_slice(body).unwrap_or_else(|_| json!({}))
}

/// `query`, falling back to `q`. Empty and non-string values count as absent.
fn query_from_json(body: &Value) -> Option<String> {
    ["query", "q"]
        .iter()
        .filter_map(|key| body.get(*key).and_then(Value::as_str))
        .find(|q| !q.is_empty())
        .map(str::to_string)
}

/// Integers are taken as-is; floats and numeric strings truncate toward
/// zero. Anything else is treated as not given.
fn k_from_json(k: Option<&Value>) -> Option<i64> {
    match k? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(truncate)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(truncate))
        }
        _ => None,
    }
}

fn truncate(f: f64) -> Option<i64> {
    f.is_finite().then(|| f.trunc() as i64)
}

/// `POST /similar {"query": "...", "k": 5}`
pub async fn similar(State(state): State<AppState>, body: Bytes) -> AppResult<Json<SimilarResponse>> {
    let body = body_json(&body);
    let query = query_from_json(&body);
    let k = k_from_json(body.get("k"));

    // Embedding is blocking model inference.
    let service = state.service.clone();
    let items = tokio::task::spawn_blocking(move || service.search(query.as_deref(), k)).await??;

    Ok(Json(SimilarResponse { items }))
}

/// `POST /reindex`: reload the catalog and swap in a freshly built index.
pub async fn reindex(State(state): State<AppState>) -> AppResult<Json<ReindexResponse>> {
    let service = state.service.clone();
    let outcome = tokio::task::spawn_blocking(move || service.rebuild()).await??;

    Ok(Json(ReindexResponse {
        status: "ok",
        outcome,
    }))
}
