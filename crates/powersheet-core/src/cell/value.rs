//! Cell value types

use crate::FORMULA_MARKER;
use std::fmt;

/// A single computed or literal cell value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Scalar {
    /// Empty cell (explicit marker, never a hole)
    #[default]
    Empty,
    /// Numeric value (all numbers are f64 like Excel)
    Number(f64),
    /// Text value
    Text(String),
    /// Boolean value
    Boolean(bool),
    /// Error value (#DIV/0!, #N/A, ...)
    Error(CellError),
}

impl Scalar {
    /// Create a new text value
    pub fn text<S: Into<String>>(s: S) -> Self {
        Scalar::Text(s.into())
    }

    /// Check if the value is empty
    pub fn is_empty(&self) -> bool {
        matches!(self, Scalar::Empty)
    }

    /// Check if the value is an error
    pub fn is_error(&self) -> bool {
        matches!(self, Scalar::Error(_))
    }

    /// Get the error if this is one
    pub fn as_error(&self) -> Option<CellError> {
        match self {
            Scalar::Error(e) => Some(*e),
            _ => None,
        }
    }

    /// Get as number if this is a number or boolean
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) => Some(*n),
            Scalar::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Get as text if this is a text value
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Detect the literal type of user input
    ///
    /// Empty text stays empty, numbers and `TRUE`/`FALSE` are recognized,
    /// everything else is kept as text.
    pub fn from_input(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Scalar::Empty;
        }
        if let Ok(n) = trimmed.parse::<f64>() {
            if n.is_finite() {
                return Scalar::Number(n);
            }
        }
        if trimmed.eq_ignore_ascii_case("TRUE") {
            return Scalar::Boolean(true);
        }
        if trimmed.eq_ignore_ascii_case("FALSE") {
            return Scalar::Boolean(false);
        }
        Scalar::Text(text.to_string())
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Empty => Ok(()),
            Scalar::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Scalar::Text(s) => write!(f, "{}", s),
            Scalar::Boolean(true) => write!(f, "TRUE"),
            Scalar::Boolean(false) => write!(f, "FALSE"),
            Scalar::Error(e) => write!(f, "{}", e),
        }
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Boolean(b)
    }
}

impl From<i32> for Scalar {
    fn from(n: i32) -> Self {
        Scalar::Number(n as f64)
    }
}

impl From<i64> for Scalar {
    fn from(n: i64) -> Self {
        Scalar::Number(n as f64)
    }
}

impl From<f64> for Scalar {
    fn from(n: f64) -> Self {
        Scalar::Number(n)
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::text(s)
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Text(s)
    }
}

impl From<CellError> for Scalar {
    fn from(e: CellError) -> Self {
        Scalar::Error(e)
    }
}

/// What a cell holds as typed by the user: a literal value or a formula
#[derive(Debug, Clone, PartialEq)]
pub enum CellContent {
    /// Literal value written as-is
    Literal(Scalar),
    /// Raw formula text, including the leading `=`
    Formula(String),
}

impl CellContent {
    /// Classify raw input text
    ///
    /// # Examples
    /// ```
    /// use powersheet_core::{CellContent, Scalar};
    ///
    /// assert_eq!(CellContent::parse("=A1*2"), CellContent::Formula("=A1*2".into()));
    /// assert_eq!(CellContent::parse("42"), CellContent::Literal(Scalar::Number(42.0)));
    /// assert_eq!(CellContent::parse(""), CellContent::Literal(Scalar::Empty));
    /// ```
    pub fn parse(text: &str) -> Self {
        if text.starts_with(FORMULA_MARKER) {
            CellContent::Formula(text.to_string())
        } else {
            CellContent::Literal(Scalar::from_input(text))
        }
    }

    /// Check if this is a formula
    pub fn is_formula(&self) -> bool {
        matches!(self, CellContent::Formula(_))
    }

    /// Get the raw formula text if this is a formula
    pub fn formula(&self) -> Option<&str> {
        match self {
            CellContent::Formula(text) => Some(text),
            CellContent::Literal(_) => None,
        }
    }
}

impl From<Scalar> for CellContent {
    fn from(value: Scalar) -> Self {
        CellContent::Literal(value)
    }
}

/// Excel error values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellError {
    /// #NULL! - Incorrect range operator
    Null,
    /// #DIV/0! - Division by zero
    Div0,
    /// #VALUE! - Wrong type of argument or operand
    Value,
    /// #REF! - Invalid cell reference
    Ref,
    /// #NAME? - Unrecognized formula name
    Name,
    /// #NUM! - Invalid numeric value
    Num,
    /// #N/A - Value not available
    Na,
    /// #CALC! - Calculation error (also used for circular references)
    Calc,
}

impl CellError {
    /// Get the display string for this error
    pub fn as_str(&self) -> &'static str {
        match self {
            CellError::Null => "#NULL!",
            CellError::Div0 => "#DIV/0!",
            CellError::Value => "#VALUE!",
            CellError::Ref => "#REF!",
            CellError::Name => "#NAME?",
            CellError::Num => "#NUM!",
            CellError::Na => "#N/A",
            CellError::Calc => "#CALC!",
        }
    }

    /// Parse an error string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "#NULL!" => Some(CellError::Null),
            "#DIV/0!" => Some(CellError::Div0),
            "#VALUE!" => Some(CellError::Value),
            "#REF!" => Some(CellError::Ref),
            "#NAME?" => Some(CellError::Name),
            "#NUM!" => Some(CellError::Num),
            "#N/A" => Some(CellError::Na),
            "#CALC!" => Some(CellError::Calc),
            _ => None,
        }
    }
}

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_conversions() {
        assert_eq!(Scalar::from(42), Scalar::Number(42.0));
        assert_eq!(Scalar::from(3.5), Scalar::Number(3.5));
        assert_eq!(Scalar::from(true), Scalar::Boolean(true));
        assert_eq!(Scalar::from("hello").as_text(), Some("hello"));
        assert_eq!(Scalar::from(CellError::Na).as_error(), Some(CellError::Na));
    }

    #[test]
    fn test_scalar_from_input() {
        assert_eq!(Scalar::from_input(""), Scalar::Empty);
        assert_eq!(Scalar::from_input("   "), Scalar::Empty);
        assert_eq!(Scalar::from_input("10"), Scalar::Number(10.0));
        assert_eq!(Scalar::from_input(" -2.5 "), Scalar::Number(-2.5));
        assert_eq!(Scalar::from_input("true"), Scalar::Boolean(true));
        assert_eq!(Scalar::from_input("FALSE"), Scalar::Boolean(false));
        assert_eq!(Scalar::from_input("inf"), Scalar::text("inf"));
        assert_eq!(Scalar::from_input("Milan"), Scalar::text("Milan"));
    }

    #[test]
    fn test_scalar_display() {
        assert_eq!(Scalar::Number(30.0).to_string(), "30");
        assert_eq!(Scalar::Number(-0.25).to_string(), "-0.25");
        assert_eq!(Scalar::Boolean(true).to_string(), "TRUE");
        assert_eq!(Scalar::Empty.to_string(), "");
        assert_eq!(Scalar::Error(CellError::Div0).to_string(), "#DIV/0!");
    }

    #[test]
    fn test_cell_content_parse() {
        assert!(CellContent::parse("=SUM(A1:A3)").is_formula());
        assert_eq!(CellContent::parse("=Price*Qty").formula(), Some("=Price*Qty"));
        // Leading whitespace means literal text, like spreadsheets do
        assert_eq!(
            CellContent::parse(" =1"),
            CellContent::Literal(Scalar::text(" =1"))
        );
    }

    #[test]
    fn test_cell_error_parse() {
        assert_eq!(CellError::from_str("#DIV/0!"), Some(CellError::Div0));
        assert_eq!(CellError::from_str("#n/a"), Some(CellError::Na));
        assert_eq!(CellError::from_str("invalid"), None);
        assert_eq!(CellError::Calc.to_string(), "#CALC!");
    }
}
