use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Worksheets with fewer rows than this carry no student data and are
/// skipped wholesale.
pub const MIN_SHEET_ROWS: usize = 5;

/// Fixed cell holding the worksheet's declared paper maximum (row 3,
/// column AD in the authoring convention). Copied through untouched.
pub const PAPER_FULL_SCORE_ROW: usize = 2;
pub const PAPER_FULL_SCORE_COL: usize = 29;

const NAME_COL: usize = 0;
const TEACHER_COL: usize = 1;
const CAMPUS_COL: usize = 2;

/// First question column; the last two columns of each row are total and
/// rank.
pub const QUESTION_START_COL: usize = 3;
pub const TRAILING_COLS: usize = 2;

/// One workbook cell as handed over by the decoding collaborator.
/// Blank cells arrive as `""` or JSON null.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Number(f64),
    Text(String),
    Empty,
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Cell::Number(v) => serializer.serialize_f64(*v),
            Cell::Text(t) => serializer.serialize_str(t),
            Cell::Empty => serializer.serialize_str(""),
        }
    }
}

impl Cell {
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(t) => t.is_empty(),
            Cell::Number(_) => false,
        }
    }

    /// Lenient score coercion: numbers pass through, text parses by its
    /// longest numeric prefix, everything else counts as 0.
    pub fn score(&self) -> f64 {
        match self {
            Cell::Number(v) => *v,
            Cell::Text(t) => parse_float_prefix(t).unwrap_or(0.0),
            Cell::Empty => 0.0,
        }
    }

    /// Lenient rank coercion: decimal-integer prefix for text, truncation
    /// toward zero for numbers, 0 otherwise.
    pub fn rank(&self) -> i64 {
        match self {
            Cell::Number(v) => *v as i64,
            Cell::Text(t) => parse_int_prefix(t).unwrap_or(0),
            Cell::Empty => 0,
        }
    }

    /// The cell as label/identity text. Integral numbers print without a
    /// trailing `.0`.
    pub fn display(&self) -> String {
        match self {
            Cell::Number(v) => v.to_string(),
            Cell::Text(t) => t.clone(),
            Cell::Empty => String::new(),
        }
    }
}

/// Longest-numeric-prefix float parse: `"12.5pts"` is 12.5, `"pts"` is
/// nothing. Leading whitespace is ignored; a bare sign or dot does not
/// parse.
pub fn parse_float_prefix(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let b = s.as_bytes();
    let mut i = 0;
    if i < b.len() && (b[i] == b'+' || b[i] == b'-') {
        i += 1;
    }
    let mut int_digits = 0;
    while i < b.len() && b[i].is_ascii_digit() {
        i += 1;
        int_digits += 1;
    }
    let mut frac_digits = 0;
    if i < b.len() && b[i] == b'.' {
        i += 1;
        while i < b.len() && b[i].is_ascii_digit() {
            i += 1;
            frac_digits += 1;
        }
    }
    if int_digits == 0 && frac_digits == 0 {
        return None;
    }
    // Exponent only counts when it has digits; otherwise the mantissa
    // alone is the number ("1e" is 1).
    let mut end = i;
    if i < b.len() && (b[i] == b'e' || b[i] == b'E') {
        let mut j = i + 1;
        if j < b.len() && (b[j] == b'+' || b[j] == b'-') {
            j += 1;
        }
        let mut exp_digits = 0;
        while j < b.len() && b[j].is_ascii_digit() {
            j += 1;
            exp_digits += 1;
        }
        if exp_digits > 0 {
            end = j;
        }
    }
    s[..end].parse::<f64>().ok()
}

/// Decimal-integer-prefix parse: `"3.9"` is 3, `"-4x"` is -4.
pub fn parse_int_prefix(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let b = s.as_bytes();
    let mut i = 0;
    if i < b.len() && (b[i] == b'+' || b[i] == b'-') {
        i += 1;
    }
    let digits_start = i;
    while i < b.len() && b[i].is_ascii_digit() {
        i += 1;
    }
    if i == digits_start {
        return None;
    }
    s[..i].parse::<i64>().ok()
}

/// Insertion-ordered string-keyed pairs, serialized as a JSON object.
/// Sheet columns define publication order, so the usual hash map would
/// scramble the output objects.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<V>(Vec<(String, V)>);

impl<V> OrderedMap<V> {
    pub fn new() -> Self {
        OrderedMap(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Overwrites in place, appends when the key is new.
    pub fn insert(&mut self, key: &str, value: V) {
        if let Some(idx) = self.0.iter().position(|(k, _)| k == key) {
            self.0[idx].1 = value;
        } else {
            self.0.push((key.to_string(), value));
        }
    }

    pub fn or_insert(&mut self, key: &str, default: V) -> &mut V {
        let idx = match self.0.iter().position(|(k, _)| k == key) {
            Some(idx) => idx,
            None => {
                self.0.push((key.to_string(), default));
                self.0.len() - 1
            }
        };
        &mut self.0[idx].1
    }

    pub fn iter(&self) -> std::slice::Iter<'_, (String, V)> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }
}

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        OrderedMap::new()
    }
}

impl<V: Serialize> Serialize for OrderedMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// The workbook as handed over by the decoding collaborator: named
/// worksheets, each a grid of cells.
#[derive(Debug, Clone, Deserialize)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Sheet {
    pub name: String,
    #[serde(default)]
    pub rows: Vec<Vec<Cell>>,
}

/// One worksheet after header interpretation.
///
/// Layout: row 0 is the sheet title, row 1 category labels, row 2
/// detail-subtype labels, row 3 per-column full scores, rows 4+ students.
#[derive(Debug, Clone)]
pub struct SheetTable {
    pub name: String,
    /// Trimmed row-1 labels per column; blank labels are never keys.
    pub category_labels: Vec<Option<String>>,
    /// Trimmed row-2 labels per column, used only for zero-score tallies.
    pub detail_labels: Vec<Option<String>>,
    /// Category name -> full-score total, summed over every column whose
    /// trimmed label matches, in column order.
    pub categories: OrderedMap<f64>,
    pub paper_full_score: Cell,
    pub students: Vec<StudentRow>,
}

#[derive(Debug, Clone)]
pub struct StudentRow {
    pub name: String,
    pub teacher: String,
    pub campus: String,
    pub total: f64,
    pub rank: i64,
    /// The full raw row; question cells sit at
    /// `QUESTION_START_COL..len - TRAILING_COLS` of this row.
    pub cells: Vec<Cell>,
}

impl StudentRow {
    fn from_cells(cells: &[Cell]) -> Self {
        let text_at = |i: usize| cells.get(i).map(Cell::display).unwrap_or_default();
        let n = cells.len();
        let total = if n >= TRAILING_COLS {
            cells[n - 2].score()
        } else {
            0.0
        };
        let rank = cells.last().map(Cell::rank).unwrap_or(0);
        StudentRow {
            name: text_at(NAME_COL),
            teacher: text_at(TEACHER_COL),
            campus: text_at(CAMPUS_COL),
            total,
            rank,
            cells: cells.to_vec(),
        }
    }

    pub fn question_range(&self) -> std::ops::Range<usize> {
        QUESTION_START_COL..self.cells.len().saturating_sub(TRAILING_COLS)
    }
}

fn label_row(cells: &[Cell]) -> Vec<Option<String>> {
    cells
        .iter()
        .map(|c| {
            let text = c.display();
            let trimmed = text.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
        .collect()
}

impl SheetTable {
    /// Interprets one worksheet. `None` means the sheet is below the row
    /// floor and contributes nothing.
    pub fn parse(sheet: &Sheet) -> Option<SheetTable> {
        if sheet.rows.len() < MIN_SHEET_ROWS {
            return None;
        }

        let category_labels = label_row(&sheet.rows[1]);
        let detail_labels = label_row(&sheet.rows[2]);
        let full_scores: Vec<f64> = sheet.rows[3].iter().map(Cell::score).collect();

        let mut categories: OrderedMap<f64> = OrderedMap::new();
        for (i, score) in full_scores.iter().enumerate() {
            if let Some(label) = category_labels.get(i).and_then(|l| l.as_deref()) {
                *categories.or_insert(label, 0.0) += score;
            }
        }

        let paper_full_score = sheet
            .rows
            .get(PAPER_FULL_SCORE_ROW)
            .and_then(|r| r.get(PAPER_FULL_SCORE_COL))
            .cloned()
            .unwrap_or(Cell::Empty);

        let mut students = Vec::new();
        for row in &sheet.rows[4..] {
            if row.iter().all(Cell::is_blank) {
                continue;
            }
            students.push(StudentRow::from_cells(row));
        }

        Some(SheetTable {
            name: sheet.name.clone(),
            category_labels,
            detail_labels,
            categories,
            paper_full_score,
            students,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(v: f64) -> Cell {
        Cell::Number(v)
    }

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    #[test]
    fn float_prefix_is_lenient() {
        assert_eq!(parse_float_prefix("12.5"), Some(12.5));
        assert_eq!(parse_float_prefix("12abc"), Some(12.0));
        assert_eq!(parse_float_prefix("  3.5 "), Some(3.5));
        assert_eq!(parse_float_prefix("+.5"), Some(0.5));
        assert_eq!(parse_float_prefix("-2.5e-1"), Some(-0.25));
        assert_eq!(parse_float_prefix("1e3"), Some(1000.0));
        assert_eq!(parse_float_prefix("1e"), Some(1.0));
        assert_eq!(parse_float_prefix("abc"), None);
        assert_eq!(parse_float_prefix(""), None);
        assert_eq!(parse_float_prefix("-"), None);
        assert_eq!(parse_float_prefix("."), None);
    }

    #[test]
    fn int_prefix_truncates() {
        assert_eq!(parse_int_prefix("3"), Some(3));
        assert_eq!(parse_int_prefix("3.9"), Some(3));
        assert_eq!(parse_int_prefix("-4x"), Some(-4));
        assert_eq!(parse_int_prefix(" 12 "), Some(12));
        assert_eq!(parse_int_prefix(""), None);
        assert_eq!(parse_int_prefix("x"), None);
    }

    #[test]
    fn cell_coercions_default_to_zero() {
        assert_eq!(text("oops").score(), 0.0);
        assert_eq!(Cell::Empty.score(), 0.0);
        assert_eq!(num(7.25).score(), 7.25);
        assert_eq!(text("n/a").rank(), 0);
        assert_eq!(num(3.7).rank(), 3);
        assert_eq!(num(-3.7).rank(), -3);
        assert_eq!(num(95.0).display(), "95");
        assert_eq!(num(95.5).display(), "95.5");
    }

    #[test]
    fn ordered_map_keeps_insertion_order() {
        let mut m: OrderedMap<f64> = OrderedMap::new();
        *m.or_insert("b", 0.0) += 1.0;
        *m.or_insert("a", 0.0) += 2.0;
        *m.or_insert("b", 0.0) += 3.0;
        assert_eq!(m.keys().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(m.get("b"), Some(&4.0));
        let json = serde_json::to_string(&m).expect("serialize");
        assert_eq!(json, r#"{"b":4.0,"a":2.0}"#);
    }

    fn five_row_sheet(rows: Vec<Vec<Cell>>) -> Sheet {
        Sheet {
            name: "Mock Exam 1".to_string(),
            rows,
        }
    }

    #[test]
    fn short_sheets_are_skipped() {
        let sheet = five_row_sheet(vec![vec![], vec![], vec![], vec![]]);
        assert!(SheetTable::parse(&sheet).is_none());
    }

    #[test]
    fn category_full_scores_sum_by_trimmed_label() {
        let sheet = five_row_sheet(vec![
            vec![text("Mock Exam 1")],
            vec![
                Cell::Empty,
                Cell::Empty,
                Cell::Empty,
                text(" Geometry "),
                text("Geometry"),
                text("Counting"),
                text("   "),
            ],
            vec![],
            vec![num(0.0), num(0.0), num(0.0), num(10.0), num(15.0), num(20.0), num(5.0)],
            vec![text("Avery"), text("Lee"), text("North"), num(8.0), num(15.0), num(12.0), num(35.0), num(1.0)],
        ]);
        let table = SheetTable::parse(&sheet).expect("parse");
        assert_eq!(table.categories.get("Geometry"), Some(&25.0));
        assert_eq!(table.categories.get("Counting"), Some(&20.0));
        // Blank and whitespace-only labels never become keys.
        assert_eq!(table.categories.len(), 2);
    }

    #[test]
    fn empty_rows_are_dropped_and_identity_extracted() {
        let sheet = five_row_sheet(vec![
            vec![],
            vec![Cell::Empty, Cell::Empty, Cell::Empty, text("Counting")],
            vec![Cell::Empty, Cell::Empty, Cell::Empty, text("tables")],
            vec![num(0.0), num(0.0), num(0.0), num(10.0)],
            vec![Cell::Empty, text(""), Cell::Empty],
            vec![text("Avery"), text("Lee"), text("North"), num(6.0), text("86"), text("2nd")],
            vec![num(0.0), Cell::Empty, Cell::Empty],
        ]);
        let table = SheetTable::parse(&sheet).expect("parse");
        // The all-blank row vanishes; the all-numeric-zero row does not.
        assert_eq!(table.students.len(), 2);
        let avery = &table.students[0];
        assert_eq!(avery.name, "Avery");
        assert_eq!(avery.teacher, "Lee");
        assert_eq!(avery.campus, "North");
        assert_eq!(avery.total, 86.0);
        assert_eq!(avery.rank, 2);
        assert_eq!(avery.question_range(), 3..4);
    }

    #[test]
    fn paper_full_score_passes_through() {
        let mut detail_row = vec![Cell::Empty; PAPER_FULL_SCORE_COL + 1];
        detail_row[PAPER_FULL_SCORE_COL] = num(150.0);
        let sheet = five_row_sheet(vec![
            vec![],
            vec![],
            detail_row,
            vec![],
            vec![text("Avery"), Cell::Empty, Cell::Empty, num(1.0), num(1.0)],
        ]);
        let table = SheetTable::parse(&sheet).expect("parse");
        assert_eq!(table.paper_full_score, num(150.0));

        let bare = five_row_sheet(vec![vec![], vec![], vec![], vec![], vec![text("A"), num(1.0)]]);
        let table = SheetTable::parse(&bare).expect("parse");
        assert_eq!(table.paper_full_score, Cell::Empty);
        assert_eq!(serde_json::to_string(&table.paper_full_score).expect("json"), "\"\"");
    }
}
