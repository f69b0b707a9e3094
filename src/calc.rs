use serde::Serialize;
use serde_json::json;

use crate::grid::{Cell, OrderedMap, SheetTable};

/// The fixed set of subject-matter categories that get a correctness rate,
/// in publication order.
pub const CANONICAL_CATEGORIES: [&str; 7] = [
    "Calculation",
    "Number Theory",
    "Application",
    "Combinatorics",
    "Counting",
    "Travel",
    "Geometry",
];

/// Rate shown when a sheet's category definition has no total for a
/// canonical category.
pub const RATE_NOT_APPLICABLE: &str = "-";

/// toFixed(2)-compatible rounding (half away from zero) used throughout
/// the published statistics.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Renders an already-rounded rate the way the report templates expect:
/// trailing zeros trimmed, percent sign appended ("75%", "66.67%").
pub fn format_rate(rate: f64) -> String {
    let fixed = format!("{:.2}", rate);
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    format!("{}%", trimmed)
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl AnalyzeError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    pub student_name: String,
    pub teacher: String,
    pub campus: String,
    /// Category name -> summed score, one entry per labeled category in
    /// column order.
    pub scores: OrderedMap<f64>,
    /// Canonical category -> rate string or the not-applicable marker.
    pub correct_rates: OrderedMap<String>,
    /// Detail subtype -> count of zero-coerced question cells.
    pub zero_score_types: OrderedMap<u32>,
    pub total_score: f64,
    pub rank: i64,
    pub standard_score: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetSummary {
    pub exam_name: String,
    pub student_count: usize,
    /// Declared paper maximum, copied through untouched from the fixed
    /// reference cell.
    pub paper_full_score: Cell,
    pub average_score: f64,
    pub median_score: f64,
    pub highest_score: f64,
    pub lowest_score: f64,
    pub standard_deviation: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryScoreSummary {
    pub question_type: String,
    pub full_score: f64,
    pub total_score: f64,
    pub student_count: usize,
    pub average_score: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetReport {
    pub sheet_name: String,
    /// Rank-ascending; rank 1 first.
    pub student_scores: Vec<StudentRecord>,
    pub question_type_scores: Vec<CategoryScoreSummary>,
    pub student_count: usize,
    pub overall_data: SheetSummary,
}

#[derive(Debug, Clone)]
pub struct SheetAnalysis {
    pub report: SheetReport,
    /// Canonical category -> 2-decimal average of the students' rounded
    /// rates ("0" when no student produced a numeric rate).
    pub average_rates: OrderedMap<String>,
}

/// Runs the category aggregation and descriptive statistics for one parsed
/// worksheet.
pub fn analyze_sheet(table: &SheetTable) -> Result<SheetAnalysis, AnalyzeError> {
    let mut records = build_records(table);
    let average_rates = apply_correct_rates(table, &mut records);

    // Ranks are trusted input: rank 1 is definitionally the best result
    // and the ordering is never recomputed from scores.
    records.sort_by_key(|r| r.rank);

    if records.is_empty() {
        return Err(
            AnalyzeError::new(
                "empty_sheet",
                format!("worksheet '{}' has no student rows", table.name),
            )
            .with_details(json!({ "sheetName": table.name })),
        );
    }

    let n = records.len();
    let average = round2(records.iter().map(|r| r.total_score).sum::<f64>() / n as f64);
    let median = if n % 2 == 0 {
        round2((records[n / 2 - 1].total_score + records[n / 2].total_score) / 2.0)
    } else {
        round2(records[n / 2].total_score)
    };
    let highest = round2(records[0].total_score);
    let lowest = round2(records[n - 1].total_score);

    // Population variance, with deviations measured from the published
    // (already rounded) average.
    let sum_sq: f64 = records
        .iter()
        .map(|r| (r.total_score - average).powi(2))
        .sum();
    let standard_deviation = round2((sum_sq / n as f64).sqrt());

    for record in &mut records {
        record.standard_score = if standard_deviation != 0.0 {
            round2((record.total_score - average) / standard_deviation)
        } else {
            0.0
        };
    }

    let question_type_scores = summarize_categories(table, &records);

    let summary = SheetSummary {
        exam_name: table.name.clone(),
        student_count: n,
        paper_full_score: table.paper_full_score.clone(),
        average_score: average,
        median_score: median,
        highest_score: highest,
        lowest_score: lowest,
        standard_deviation,
    };

    Ok(SheetAnalysis {
        report: SheetReport {
            sheet_name: table.name.clone(),
            student_scores: records,
            question_type_scores,
            student_count: n,
            overall_data: summary,
        },
        average_rates,
    })
}

fn build_records(table: &SheetTable) -> Vec<StudentRecord> {
    let mut records = Vec::with_capacity(table.students.len());
    for row in &table.students {
        let mut scores: OrderedMap<f64> = OrderedMap::new();
        for label in table.category_labels.iter().flatten() {
            scores.or_insert(label, 0.0);
        }

        let mut zero_score_types: OrderedMap<u32> = OrderedMap::new();
        for i in row.question_range() {
            let value = row.cells[i].score();
            if let Some(label) = table.category_labels.get(i).and_then(|l| l.as_deref()) {
                *scores.or_insert(label, 0.0) += value;
            }
            if value == 0.0 {
                if let Some(detail) = table.detail_labels.get(i).and_then(|l| l.as_deref()) {
                    *zero_score_types.or_insert(detail, 0) += 1;
                }
            }
        }

        records.push(StudentRecord {
            student_name: row.name.clone(),
            teacher: row.teacher.clone(),
            campus: row.campus.clone(),
            scores,
            correct_rates: OrderedMap::new(),
            zero_score_types,
            total_score: row.total,
            rank: row.rank,
            standard_score: 0.0,
        });
    }
    records
}

/// Fills in each record's canonical-category rates and returns the
/// sheet-wide averages of the numeric ones.
fn apply_correct_rates(table: &SheetTable, records: &mut [StudentRecord]) -> OrderedMap<String> {
    let mut samples: Vec<Vec<f64>> = vec![Vec::new(); CANONICAL_CATEGORIES.len()];

    for record in records.iter_mut() {
        for (ci, category) in CANONICAL_CATEGORIES.iter().enumerate() {
            match table.categories.get(category) {
                None => {
                    record
                        .correct_rates
                        .insert(category, RATE_NOT_APPLICABLE.to_string());
                }
                Some(full) => {
                    let scored = record.scores.get(category).copied().unwrap_or(0.0);
                    let rate = round2(scored / full * 100.0);
                    record.correct_rates.insert(category, format_rate(rate));
                    samples[ci].push(rate);
                }
            }
        }
    }

    let mut averages: OrderedMap<String> = OrderedMap::new();
    for (ci, category) in CANONICAL_CATEGORIES.iter().enumerate() {
        let collected = &samples[ci];
        let value = if collected.is_empty() {
            "0".to_string()
        } else {
            let mean = collected.iter().sum::<f64>() / collected.len() as f64;
            format!("{:.2}", round2(mean))
        };
        averages.insert(category, value);
    }
    averages
}

fn summarize_categories(table: &SheetTable, records: &[StudentRecord]) -> Vec<CategoryScoreSummary> {
    table
        .categories
        .iter()
        .map(|(name, full)| {
            let total: f64 = records
                .iter()
                .map(|r| r.scores.get(name).copied().unwrap_or(0.0))
                .sum();
            CategoryScoreSummary {
                question_type: name.clone(),
                full_score: *full,
                total_score: total,
                student_count: records.len(),
                average_score: round2(total / records.len() as f64),
            }
        })
        .collect()
}
