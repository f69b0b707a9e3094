use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::report::WorkbookReport;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// One analyzed workbook, held for the report-generation calls that follow.
/// Created by `workbook.analyze`, dropped by `workbook.release`.
pub struct AnalysisSession {
    pub analyzed_at: DateTime<Utc>,
    pub report: WorkbookReport,
}

pub struct AppState {
    pub sessions: HashMap<String, AnalysisSession>,
}

impl AppState {
    pub fn new() -> Self {
        AppState {
            sessions: HashMap::new(),
        }
    }
}
