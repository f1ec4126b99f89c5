//! What a cell holds

use std::fmt;

static EMPTY: CellValue = CellValue::Empty;

/// Content of one worksheet cell as stored in the workbook part
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Boolean(bool),
    /// Every number, dates included
    Number(f64),
    String(String),
    /// Error literal such as `#REF!`
    Error(String),
    /// `text` has no leading `=`. `cached_value` is what the spreadsheet
    /// application computed on its last save; files that were never opened
    /// there carry none.
    Formula {
        text: String,
        cached_value: Option<Box<CellValue>>,
    },
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Nothing a manager would call a value: no content, only whitespace,
    /// or a formula without a computed result.
    pub fn is_blank(&self) -> bool {
        match self.resolved() {
            CellValue::Empty => true,
            CellValue::String(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// The computed value. A formula gives its cached result and an
    /// uncached one reads as `Empty`.
    pub fn resolved(&self) -> &CellValue {
        match self {
            CellValue::Formula {
                cached_value: Some(inner),
                ..
            } => inner.resolved(),
            CellValue::Formula { .. } => &EMPTY,
            plain => plain,
        }
    }

    /// Numeric reading of the cell.
    ///
    /// Text such as `"27900,50"` counts: managers type prices by hand and
    /// use either decimal separator. Non-finite values give `None`.
    pub fn as_number(&self) -> Option<f64> {
        let n = match self.resolved() {
            CellValue::Number(n) => Some(*n),
            CellValue::Boolean(b) => Some(f64::from(u8::from(*b))),
            CellValue::String(s) => {
                let text = s.trim();
                match text.parse::<f64>() {
                    Ok(n) => Some(n),
                    Err(_) => text.replacen(',', ".", 1).parse().ok(),
                }
            }
            _ => None,
        };
        // "NaN" and "inf" parse but are not quantities or prices
        n.filter(|n| n.is_finite())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self.resolved() {
            CellValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn formula_text(&self) -> Option<&str> {
        match self {
            CellValue::Formula { text, .. } => Some(text),
            _ => None,
        }
    }

    /// Text shown in the cell; `1036.0` shows as `1036`
    pub fn to_display_string(&self) -> String {
        match self.resolved() {
            CellValue::Boolean(true) => "TRUE".into(),
            CellValue::Boolean(false) => "FALSE".into(),
            CellValue::Number(n) => format_number(*n),
            CellValue::String(s) | CellValue::Error(s) => s.clone(),
            CellValue::Empty | CellValue::Formula { .. } => String::new(),
        }
    }
}

/// Shortest text for a number, used for `<v>` elements too.
///
/// Whole numbers lose the fractional part (`1036`), others keep Rust's
/// shortest round-trip form (`0.25`).
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        (n as i64).to_string()
    } else {
        n.to_string()
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Formula {
                text,
                cached_value: None,
            } => write!(f, "={}", text),
            computed => f.write_str(&computed.to_display_string()),
        }
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Boolean(b)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<u64> for CellValue {
    fn from(n: u64) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::String(s)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::String(s.to_owned())
    }
}

/// `None` is an empty cell
impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(CellValue::Empty, Into::into)
    }
}
