use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::grid::Workbook;
use crate::ipc::error::{err, fail, ok};
use crate::ipc::types::{AnalysisSession, AppState, Request};
use crate::report;

fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

fn handle_analyze(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(raw) = req.params.get("workbook") else {
        return err(&req.id, "bad_params", "missing params.workbook", None);
    };
    let workbook: Workbook = match serde_json::from_value(raw.clone()) {
        Ok(v) => v,
        Err(e) => {
            return err(
                &req.id,
                "bad_params",
                format!("workbook is not a sheet grid: {}", e),
                None,
            );
        }
    };

    match report::analyze_workbook(&workbook) {
        Ok(data) => {
            let session_id = Uuid::new_v4().to_string();
            let analyzed_at = Utc::now();
            let resp = ok(
                &req.id,
                json!({
                    "sessionId": &session_id,
                    "analyzedAt": analyzed_at.to_rfc3339(),
                    "data": &data,
                }),
            );
            state.sessions.insert(
                session_id,
                AnalysisSession {
                    analyzed_at,
                    report: data,
                },
            );
            resp
        }
        Err(e) => fail(&req.id, e),
    }
}

fn handle_release(state: &mut AppState, req: &Request) -> serde_json::Value {
    let session_id = match required_str(req, "sessionId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let released = state.sessions.remove(&session_id).is_some();
    ok(&req.id, json!({ "released": released }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "workbook.analyze" => Some(handle_analyze(state, req)),
        "workbook.release" => Some(handle_release(state, req)),
        _ => None,
    }
}
