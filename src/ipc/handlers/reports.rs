use serde_json::json;

use crate::grid::OrderedMap;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::report::paginate_zero_scores;

fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

/// Everything the renderer needs for one student's report: the cross-exam
/// profile, the per-exam series, and the paginated zero-score breakdown.
fn handle_report_student(state: &mut AppState, req: &Request) -> serde_json::Value {
    let session_id = match required_str(req, "sessionId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let student_name = match required_str(req, "studentName") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let Some(session) = state.sessions.get(&session_id) else {
        return err(
            &req.id,
            "not_found",
            "unknown session",
            Some(json!({ "sessionId": session_id })),
        );
    };
    let data = &session.report;

    let Some(entries) = data.students_data.get(&student_name) else {
        return err(
            &req.id,
            "not_found",
            format!("student '{}' not present in this workbook", student_name),
            None,
        );
    };

    let exam_names: Vec<&str> = entries
        .iter()
        .map(|e| e.overall_data.exam_name.as_str())
        .collect();
    let total_scores: Vec<f64> = entries.iter().map(|e| e.student_score.total_score).collect();
    let average_scores: Vec<f64> = entries.iter().map(|e| e.overall_data.average_score).collect();
    let standard_scores: Vec<f64> = entries
        .iter()
        .map(|e| e.student_score.standard_score)
        .collect();

    let empty = OrderedMap::new();
    let tally = data
        .accumulated_zero_score_types
        .get(&student_name)
        .unwrap_or(&empty);
    let pages = paginate_zero_scores(tally);

    ok(
        &req.id,
        json!({
            "studentName": student_name,
            "analyzedAt": session.analyzed_at.to_rfc3339(),
            "exams": entries,
            "examNames": exam_names,
            "totalScores": total_scores,
            "averageScores": average_scores,
            "standardScores": standard_scores,
            "totalAverageRate": &data.total_average_rate,
            "zeroScorePages": pages,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "report.student" => Some(handle_report_student(state, req)),
        _ => None,
    }
}
