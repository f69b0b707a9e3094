use std::collections::HashSet;

use serde::Serialize;

use crate::calc::{self, AnalyzeError, SheetReport, SheetSummary, StudentRecord};
use crate::grid::{OrderedMap, SheetTable, Workbook};

/// Worksheet name that ends the score data: this sheet and everything
/// after it in workbook order is excluded from the results.
pub const QUESTION_TYPE_INDEX_SHEET: &str = "Question Types";

/// A student's accumulated zero-score tally fits on one chart page up to
/// this many distinct subtypes; past it the tally splits into two pages.
pub const ZERO_SCORE_PAGE_LIMIT: usize = 40;

/// One exam's worth of a student's cross-exam profile.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamEntry {
    pub sheet_name: String,
    pub student_score: StudentRecord,
    pub overall_data: SheetSummary,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkbookReport {
    pub sheets: Vec<SheetReport>,
    pub total_sheets: usize,
    /// Sorted, unique. Blank names stay in the per-sheet records but never
    /// enter the cross-sheet structures.
    pub student_names: Vec<String>,
    /// Student name -> profile entries, one per sheet the student appears
    /// in, in processing order. Keyed in first-seen order.
    pub students_data: OrderedMap<Vec<ExamEntry>>,
    /// Student name -> detail subtype -> zero-score count summed across
    /// every sheet containing the student.
    pub accumulated_zero_score_types: OrderedMap<OrderedMap<u32>>,
    /// Canonical-category average rates of the last processed sheet.
    pub total_average_rate: OrderedMap<String>,
}

/// Page of the zero-score breakdown: parallel label/count arrays, the
/// shape the chart templates consume.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZeroScorePage {
    pub question_types: Vec<String>,
    pub counts: Vec<u32>,
}

/// Splits an accumulated tally for presentation: one page up to the
/// limit, otherwise a front-loaded two-way split at ceil(n/2). Never more
/// than two pages.
pub fn paginate_zero_scores(tally: &OrderedMap<u32>) -> Vec<ZeroScorePage> {
    let labels: Vec<String> = tally.keys().map(str::to_string).collect();
    let counts: Vec<u32> = tally.iter().map(|(_, c)| *c).collect();
    if tally.len() <= ZERO_SCORE_PAGE_LIMIT {
        return vec![ZeroScorePage {
            question_types: labels,
            counts,
        }];
    }
    let middle = labels.len().div_ceil(2);
    vec![
        ZeroScorePage {
            question_types: labels[..middle].to_vec(),
            counts: counts[..middle].to_vec(),
        },
        ZeroScorePage {
            question_types: labels[middle..].to_vec(),
            counts: counts[middle..].to_vec(),
        },
    ]
}

/// Processes a whole workbook: per-sheet analytics in workbook order up
/// to the sentinel sheet, then the cross-sheet roll-ups.
pub fn analyze_workbook(workbook: &Workbook) -> Result<WorkbookReport, AnalyzeError> {
    let mut sheets: Vec<SheetReport> = Vec::new();
    let mut total_average_rate: OrderedMap<String> = OrderedMap::new();

    for sheet in &workbook.sheets {
        if sheet.name == QUESTION_TYPE_INDEX_SHEET {
            break;
        }
        let Some(table) = SheetTable::parse(sheet) else {
            continue;
        };
        let analysis = calc::analyze_sheet(&table)?;
        // Last processed sheet wins; published as the overall snapshot.
        total_average_rate = analysis.average_rates;
        sheets.push(analysis.report);
    }

    if sheets.is_empty() {
        return Err(AnalyzeError::new(
            "no_qualifying_sheets",
            "workbook has no qualifying worksheet (each worksheet needs at least 4 data rows)",
        ));
    }

    let mut seen: HashSet<String> = HashSet::new();
    let mut student_names: Vec<String> = Vec::new();
    let mut students_data: OrderedMap<Vec<ExamEntry>> = OrderedMap::new();
    let mut accumulated: OrderedMap<OrderedMap<u32>> = OrderedMap::new();

    for sheet in &sheets {
        for record in &sheet.student_scores {
            let name = record.student_name.as_str();
            if name.trim().is_empty() {
                continue;
            }
            if seen.insert(name.to_string()) {
                student_names.push(name.to_string());
            }
            students_data
                .or_insert(name, Vec::new())
                .push(ExamEntry {
                    sheet_name: sheet.sheet_name.clone(),
                    student_score: record.clone(),
                    overall_data: sheet.overall_data.clone(),
                });
            let tally = accumulated.or_insert(name, OrderedMap::new());
            for (subtype, count) in record.zero_score_types.iter() {
                *tally.or_insert(subtype, 0) += count;
            }
        }
    }
    student_names.sort();

    Ok(WorkbookReport {
        total_sheets: sheets.len(),
        sheets,
        student_names,
        students_data,
        accumulated_zero_score_types: accumulated,
        total_average_rate,
    })
}
