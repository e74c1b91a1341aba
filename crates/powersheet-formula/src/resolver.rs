//! Column name resolution
//!
//! Formulas may refer to data either by spreadsheet letter (`C1`, position based) or
//! by the backing table's column name (`unit_price`). The engine only understands
//! letters, so names are rewritten before submission, and letters on the host row can
//! be shown back as names.
//!
//! Names are matched longest-first so that a short name never eats into a longer one,
//! and the outcome never depends on the order the columns are listed in.

use powersheet_core::{column_index_to_letters, FORMULA_MARKER};
use thiserror::Error;
use tracing::debug;

/// An identifier in a formula that is not a known column, function or letter reference
///
/// The formula is still submitted unchanged; the engine reports the error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown column reference '{name}' at offset {position}")]
pub struct UnknownColumnReference {
    /// The identifier as written
    pub name: String,
    /// Byte offset in the formula text
    pub position: usize,
}

/// Result of rewriting a formula
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// The rewritten formula text
    pub formula: String,
    /// Identifiers that could not be mapped
    pub unknown: Vec<UnknownColumnReference>,
}

impl Resolution {
    fn unchanged(formula: &str) -> Self {
        Self {
            formula: formula.to_string(),
            unknown: Vec::new(),
        }
    }

    /// Check if every identifier was understood
    pub fn is_clean(&self) -> bool {
        self.unknown.is_empty()
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '$' | '.')
}

/// Length of a number literal (`12`, `2.5`, `.5`, `1E+3`) at the start of `s`, or 0
fn number_literal_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let digits = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };
    let mut i = digits(0);
    if bytes.get(i) == Some(&b'.') {
        i = digits(i + 1);
    }
    if i == 0 || (i == 1 && bytes[0] == b'.') {
        return 0;
    }
    if matches!(bytes.get(i), Some(b'e' | b'E')) {
        let mut j = i + 1;
        if matches!(bytes.get(j), Some(b'+' | b'-')) {
            j += 1;
        }
        let end = digits(j);
        if end > j {
            i = end;
        }
    }
    i
}

/// A number literal standing alone as a token, not the start of a longer identifier
fn standalone_number_len(s: &str) -> Option<usize> {
    let len = number_literal_len(s);
    let boundary = !s[len..].chars().next().map_or(false, is_ident_char);
    (len > 0 && boundary).then_some(len)
}

/// A letter reference found in formula text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LetterRef<'a> {
    /// Full text, e.g. `$B$2`
    text: &'a str,
    /// Column letters without `$`, any case
    letters: &'a str,
    /// 1-based row number
    row_number: u64,
    absolute: bool,
}

/// Parse a `[$]LETTERS[$]DIGITS` reference at the start of `s`, boundary included
fn letter_ref_at(s: &str) -> Option<LetterRef<'_>> {
    let bytes = s.as_bytes();
    let mut i = 0;
    let mut absolute = false;
    if bytes.first() == Some(&b'$') {
        absolute = true;
        i += 1;
    }
    let letters_start = i;
    while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
        i += 1;
    }
    let letters = &s[letters_start..i];
    if letters.is_empty() {
        return None;
    }
    if bytes.get(i) == Some(&b'$') {
        absolute = true;
        i += 1;
    }
    let digits_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let digits = &s[digits_start..i];
    if digits.is_empty() || digits.starts_with('0') {
        return None;
    }
    let rest = &s[i..];
    if rest.chars().next().map_or(false, is_ident_char) || followed_by_paren(rest) {
        return None;
    }
    Some(LetterRef {
        text: &s[..i],
        letters,
        row_number: digits.parse().ok()?,
        absolute,
    })
}

fn followed_by_paren(rest: &str) -> bool {
    rest.trim_start().starts_with('(')
}

/// Length of a string literal starting at the opening quote, `""` escapes included
fn string_literal_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut i = 1;
    while i < bytes.len() {
        if bytes[i] == b'"' {
            if bytes.get(i + 1) == Some(&b'"') {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    // Unterminated: the rest is literal text
    bytes.len()
}

/// Length of an error literal like `#DIV/0!` starting at `#`
fn error_literal_len(s: &str) -> usize {
    1 + s[1..]
        .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '/' | '!' | '?')))
        .unwrap_or(s.len() - 1)
}

fn is_boolean(word: &str) -> bool {
    word.eq_ignore_ascii_case("TRUE") || word.eq_ignore_ascii_case("FALSE")
}

/// Length of the identifier-character run at the start of `s`
fn ident_len(s: &str) -> usize {
    s.find(|c: char| !is_ident_char(c)).unwrap_or(s.len())
}

/// Column names in matching order: longest first, then schema order
fn candidates<S: AsRef<str>>(columns: &[S]) -> Vec<(usize, &str)> {
    let mut names: Vec<(usize, &str)> = columns
        .iter()
        .map(|c| c.as_ref())
        .enumerate()
        .filter(|(_, name)| !name.is_empty())
        .collect();
    names.sort_by(|(ia, a), (ib, b)| b.len().cmp(&a.len()).then(ia.cmp(ib)));
    names
}

/// Rewrite column-name tokens into letter references on `row`
///
/// `row` is the 0-based host row. Letter references, function names, string
/// literals and `TRUE`/`FALSE` are left alone. Text that does not start with `=`
/// is returned unchanged.
///
/// # Example
/// ```rust
/// use powersheet_formula::resolve_for_storage;
///
/// let r = resolve_for_storage("=SUM(Price, Qty*2)", &["Price", "Qty"], 4);
/// assert_eq!(r.formula, "=SUM(A5, B5*2)");
/// assert!(r.is_clean());
/// ```
pub fn resolve_for_storage<S: AsRef<str>>(formula: &str, columns: &[S], row: u32) -> Resolution {
    if !formula.starts_with(FORMULA_MARKER) {
        return Resolution::unchanged(formula);
    }

    let names = candidates(columns);
    let row_number = u64::from(row) + 1;
    let mut out = String::with_capacity(formula.len());
    let mut unknown = Vec::new();
    let mut pos = FORMULA_MARKER.len_utf8();
    out.push(FORMULA_MARKER);

    // Every token is consumed whole, so `pos` is always on a token boundary
    while pos < formula.len() {
        let rest = &formula[pos..];
        let Some(c) = rest.chars().next() else { break };

        if c == '"' {
            let len = string_literal_len(rest);
            out.push_str(&rest[..len]);
            pos += len;
            continue;
        }
        if c == '#' {
            let len = error_literal_len(rest);
            out.push_str(&rest[..len]);
            pos += len;
            continue;
        }

        // Letter references win over column names
        if let Some(letter_ref) = letter_ref_at(rest) {
            out.push_str(letter_ref.text);
            pos += letter_ref.text.len();
            continue;
        }

        // Numbers stay numbers, even when a column is named like one
        if let Some(len) = standalone_number_len(rest) {
            out.push_str(&rest[..len]);
            pos += len;
            continue;
        }

        let word_len = ident_len(rest);
        if is_boolean(&rest[..word_len]) && !followed_by_paren(&rest[word_len..]) {
            out.push_str(&rest[..word_len]);
            pos += word_len;
            continue;
        }

        let matched = names.iter().find(|(_, name)| {
            rest.starts_with(name) && {
                let after = &rest[name.len()..];
                !after.chars().next().map_or(false, is_ident_char) && !followed_by_paren(after)
            }
        });
        if let Some((index, name)) = matched {
            out.push_str(&column_index_to_letters(*index as u32));
            out.push_str(&row_number.to_string());
            pos += name.len();
            continue;
        }

        if is_ident_char(c) {
            let len = ident_len(rest);
            let word = &rest[..len];
            let after = &rest[len..];
            let starts_like_name = word.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_');
            if starts_like_name && !followed_by_paren(after) {
                debug!(name = word, position = pos, "unknown column reference");
                unknown.push(UnknownColumnReference {
                    name: word.to_string(),
                    position: pos,
                });
            }
            out.push_str(word);
            pos += len;
            continue;
        }

        out.push(c);
        pos += c.len_utf8();
    }

    Resolution {
        formula: out,
        unknown,
    }
}

/// Show relative letter references on `row` as column names
///
/// Only references without `$`, on the host row, and whose column has a name are
/// rewritten. Names that would not resolve back to the same column (a duplicate, or
/// a name that reads as a letter reference or boolean) are left as letters.
///
/// # Example
/// ```rust
/// use powersheet_formula::resolve_for_display;
///
/// let r = resolve_for_display("=A5*B5+A6+$B$5", &["Price", "Qty"], 4);
/// assert_eq!(r.formula, "=Price*Qty+A6+$B$5");
/// ```
pub fn resolve_for_display<S: AsRef<str>>(formula: &str, columns: &[S], row: u32) -> Resolution {
    if !formula.starts_with(FORMULA_MARKER) {
        return Resolution::unchanged(formula);
    }

    let columns: Vec<&str> = columns.iter().map(|c| c.as_ref()).collect();
    let row_number = u64::from(row) + 1;
    let mut out = String::with_capacity(formula.len());
    let mut pos = FORMULA_MARKER.len_utf8();
    out.push(FORMULA_MARKER);

    while pos < formula.len() {
        let rest = &formula[pos..];
        let Some(c) = rest.chars().next() else { break };

        if c == '"' {
            let len = string_literal_len(rest);
            out.push_str(&rest[..len]);
            pos += len;
            continue;
        }
        if c == '#' {
            let len = error_literal_len(rest);
            out.push_str(&rest[..len]);
            pos += len;
            continue;
        }

        if let Some(letter_ref) = letter_ref_at(rest) {
            let name = if letter_ref.absolute || letter_ref.row_number != row_number {
                None
            } else {
                display_name(&columns, letter_ref.letters)
            };
            out.push_str(name.unwrap_or(letter_ref.text));
            pos += letter_ref.text.len();
            continue;
        }

        if is_ident_char(c) {
            let len = ident_len(rest);
            out.push_str(&rest[..len]);
            pos += len;
            continue;
        }

        out.push(c);
        pos += c.len_utf8();
    }

    Resolution {
        formula: out,
        unknown: Vec::new(),
    }
}

/// The name for a column, if it would resolve back to that same column
fn display_name<'a>(columns: &[&'a str], letters: &str) -> Option<&'a str> {
    let index = powersheet_core::letters_to_column_index(&letters.to_ascii_uppercase()).ok()?;
    let name = *columns.get(index as usize)?;
    let first_with_name = columns.iter().position(|c| *c == name)?;
    let reads_as_literal = letter_ref_at(name).map_or(false, |r| r.text.len() == name.len())
        || is_boolean(name)
        || standalone_number_len(name) == Some(name.len());
    if name.is_empty() || first_with_name != index as usize || reads_as_literal {
        return None;
    }
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn storage(formula: &str, columns: &[&str], row: u32) -> String {
        resolve_for_storage(formula, columns, row).formula
    }

    fn permutations(items: &[&'static str]) -> Vec<Vec<&'static str>> {
        if items.len() <= 1 {
            return vec![items.to_vec()];
        }
        let mut result = Vec::new();
        for i in 0..items.len() {
            let mut rest = items.to_vec();
            let head = rest.remove(i);
            for mut tail in permutations(&rest) {
                tail.insert(0, head);
                result.push(tail);
            }
        }
        result
    }

    #[test]
    fn test_names_become_letters_on_host_row() {
        assert_eq!(storage("=Price*Qty", &["Price", "Qty"], 0), "=A1*B1");
        assert_eq!(storage("=Price*Qty", &["Price", "Qty"], 9), "=A10*B10");
        assert_eq!(storage("=Price * 2", &["id", "Price"], 2), "=B3 * 2");
    }

    #[test]
    fn test_letter_references_untouched() {
        let cols = ["Price", "Qty"];
        assert_eq!(storage("=A1+$BB$12+b3", &cols, 0), "=A1+$BB$12+b3");
        assert_eq!(storage("=SUM(A1:A10)", &cols, 0), "=SUM(A1:A10)");
    }

    #[test]
    fn test_letter_reference_wins_over_same_named_column() {
        // A column literally called "B2" is shadowed by the cell B2
        let r = resolve_for_storage("=B2+x", &["B2", "x"], 0);
        assert_eq!(r.formula, "=B2+B1");
        assert!(r.is_clean());
    }

    #[test]
    fn test_overlapping_names_every_order() {
        for cols in permutations(&["A", "BB", "CCC"]) {
            let letter = |name: &str| {
                column_index_to_letters(cols.iter().position(|c| *c == name).unwrap() as u32)
            };
            let expected = format!("={}1-{}1", letter("A"), letter("CCC"));
            assert_eq!(storage("=A-CCC", &cols, 0), expected, "columns {:?}", cols);
        }
    }

    #[test]
    fn test_prefix_names_every_order() {
        for cols in permutations(&["unit", "unit price", "price"]) {
            let letter = |name: &str| {
                column_index_to_letters(cols.iter().position(|c| *c == name).unwrap() as u32)
            };
            let expected = format!(
                "={}1*{}1+{}1",
                letter("unit price"),
                letter("unit"),
                letter("price")
            );
            assert_eq!(
                storage("=unit price*unit+price", &cols, 0),
                expected,
                "columns {:?}",
                cols
            );
        }
    }

    #[test]
    fn test_name_needs_token_boundary() {
        let r = resolve_for_storage("=Qty2*Qty", &["Qty", "Qty2"], 0);
        assert_eq!(r.formula, "=B1*A1");

        // "Qty" inside "Qtyx" is not a match
        let r = resolve_for_storage("=Qtyx", &["Qty"], 0);
        assert_eq!(r.formula, "=Qtyx");
        assert_eq!(
            r.unknown,
            vec![UnknownColumnReference {
                name: "Qtyx".into(),
                position: 1
            }]
        );
    }

    #[test]
    fn test_function_names_and_strings_are_skipped() {
        let cols = ["SUM", "name", "TRUE"];
        let r = resolve_for_storage("=SUM(name) & \"name\" & IF(TRUE, 1, 0)", &cols, 0);
        assert_eq!(r.formula, "=SUM(B1) & \"name\" & IF(TRUE, 1, 0)");
        assert!(r.is_clean());

        let r = resolve_for_storage("=\"say \"\"name\"\"\"&name", &cols, 0);
        assert_eq!(r.formula, "=\"say \"\"name\"\"\"&B1");
    }

    #[test]
    fn test_error_literals_are_not_names() {
        let r = resolve_for_storage("=IFERROR(x, #N/A)", &["x"], 0);
        assert_eq!(r.formula, "=IFERROR(A1, #N/A)");
        assert!(r.is_clean());
    }

    #[test]
    fn test_unknown_names_are_reported() {
        let r = resolve_for_storage("=Price*Discount+1.5e3", &["Price"], 0);
        assert_eq!(r.formula, "=A1*Discount+1.5e3");
        assert_eq!(
            r.unknown,
            vec![UnknownColumnReference {
                name: "Discount".into(),
                position: 7
            }]
        );
        assert_eq!(
            r.unknown[0].to_string(),
            "unknown column reference 'Discount' at offset 7"
        );
    }

    #[test]
    fn test_duplicate_names_first_wins() {
        assert_eq!(storage("=v", &["v", "v"], 0), "=A1");
    }

    #[test]
    fn test_non_formula_is_unchanged() {
        let r = resolve_for_storage("Price*Qty", &["Price", "Qty"], 0);
        assert_eq!(r.formula, "Price*Qty");
        assert!(r.is_clean());
    }

    #[test]
    fn test_display_only_rewrites_relative_host_row() {
        let cols = ["Price", "Qty"];
        assert_eq!(
            resolve_for_display("=A1*B1", &cols, 0).formula,
            "=Price*Qty"
        );
        assert_eq!(
            resolve_for_display("=A2*$B$1*B$1+C1", &cols, 0).formula,
            "=A2*$B$1*B$1+C1"
        );
        assert_eq!(
            resolve_for_display("=SUM(a1:b1)", &cols, 0).formula,
            "=SUM(Price:Qty)"
        );
    }

    #[test]
    fn test_display_keeps_letters_for_unsafe_names() {
        assert_eq!(
            resolve_for_display("=A1+B1+C1", &["x", "x", "C9"], 0).formula,
            "=x+B1+C1"
        );
    }

    #[test]
    fn test_display_then_storage_round_trip() {
        let cols = ["unit", "unit price", "qty"];
        let stored = "=B3*C3-A3+A4";
        let shown = resolve_for_display(stored, &cols, 2).formula;
        assert_eq!(shown, "=unit price*qty-unit+A4");
        assert_eq!(storage(&shown, &cols, 2), stored);
    }

    #[test]
    fn test_numbers_are_never_columns() {
        let r = resolve_for_storage("=Price*2", &["Price", "2"], 0);
        assert_eq!(r.formula, "=A1*2");
        assert!(r.is_clean());

        let years = ["2023", "2024"];
        assert_eq!(
            storage("=SUM(2023, 2024)+2024", &years, 0),
            "=SUM(2023, 2024)+2024"
        );
        assert_eq!(storage("=2.5E+3-.5", &["2.5E", "5"], 0), "=2.5E+3-.5");
    }

    #[test]
    fn test_digit_led_names_still_resolve() {
        let r = resolve_for_storage("=2nd_qty*2", &["2nd_qty"], 3);
        assert_eq!(r.formula, "=A4*2");
    }

    #[test]
    fn test_display_keeps_letters_for_numeric_names() {
        assert_eq!(
            resolve_for_display("=A1+B1", &["2023", "Qty"], 0).formula,
            "=A1+Qty"
        );
    }

    #[test]
    fn test_accented_letters_belong_to_the_token() {
        // "A1é" is one identifier, not A1 followed by the column "é"
        let r = resolve_for_storage("=A1é", &["é"], 0);
        assert_eq!(r.formula, "=A1é");
        assert_eq!(r.unknown.len(), 1);

        assert_eq!(storage("=quantità*prezzo", &["prezzo", "quantità"], 1), "=B2*A2");
        // A shorter name does not match inside an accented one
        assert_eq!(storage("=qualità+qualit", &["qualit"], 0), "=qualità+A1");
    }
}
