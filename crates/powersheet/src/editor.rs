//! Selection and edit state machine of one sheet
//!
//! ```text
//! Idle --select--> CellSelected --type/F2--> Editing --commit/cancel--> CellSelected
//! ```
//!
//! Every transition runs to completion against the registry. Commits return the
//! [`SetOutcome`] so the caller can persist it.

use crate::error::Result;
use crate::registry::{FormulaRegistry, SetOutcome};
use crate::selection::{Direction, Selection};
use powersheet_core::{CellAddress, CellContent, CellRange};
use powersheet_formula::EvaluationEngine;
use tracing::trace;

/// Keyboard input understood by the editor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Arrow(Direction),
    Enter,
    Tab,
    Escape,
    /// Explicit edit (F2 / double activation)
    Edit,
    Delete,
    Backspace,
}

/// Modifier keys held with a [`Key`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
        alt: false,
        meta: false,
    };

    pub const SHIFT: Modifiers = Modifiers {
        shift: true,
        ctrl: false,
        alt: false,
        meta: false,
    };

    /// Control, alt or command held; such keystrokes never type text
    pub fn is_command(&self) -> bool {
        self.ctrl || self.alt || self.meta
    }
}

/// Editor behavior switches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorOptions {
    /// Enter and Tab move the selection after committing
    pub move_after_commit: bool,
    /// Tab past the last column continues on the next row
    pub wrap_tab: bool,
}

impl Default for EditorOptions {
    fn default() -> Self {
        Self {
            move_after_commit: true,
            wrap_tab: true,
        }
    }
}

/// An in-progress edit of one cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSession {
    pub target: CellAddress,
    pub buffer: String,
}

/// Where the editor is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorState {
    Idle,
    CellSelected(CellAddress),
    Editing(CellAddress),
}

/// How the selection moves after a commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitMove {
    /// Focus loss: stay on the cell
    Stay,
    /// Enter
    Down,
    /// Shift+Enter
    Up,
    /// Tab
    Right,
    /// Shift+Tab
    Left,
}

/// Selection and edit state for one sheet
#[derive(Debug, Clone)]
pub struct GridEditor {
    sheet_id: String,
    selection: Selection,
    session: Option<EditSession>,
    formula_bar: String,
    options: EditorOptions,
}

impl GridEditor {
    pub fn new(sheet_id: impl Into<String>, options: EditorOptions) -> Self {
        Self {
            sheet_id: sheet_id.into(),
            selection: Selection::default(),
            session: None,
            formula_bar: String::new(),
            options,
        }
    }

    pub fn sheet_id(&self) -> &str {
        &self.sheet_id
    }

    pub fn state(&self) -> EditorState {
        match (&self.session, self.selection.active()) {
            (Some(session), _) => EditorState::Editing(session.target),
            (None, Some(active)) => EditorState::CellSelected(active),
            (None, None) => EditorState::Idle,
        }
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn active_cell(&self) -> Option<CellAddress> {
        self.selection.active()
    }

    pub fn active_range(&self) -> Option<CellRange> {
        self.selection.range()
    }

    pub fn session(&self) -> Option<&EditSession> {
        self.session.as_ref()
    }

    /// Text of the formula bar: the edit buffer while editing
    pub fn formula_bar(&self) -> &str {
        match &self.session {
            Some(session) => &session.buffer,
            None => &self.formula_bar,
        }
    }

    pub fn is_editing(&self) -> bool {
        self.session.is_some()
    }

    /// Follow the sheet's extent after content or schema changes
    pub fn sync_extent<E: EvaluationEngine>(&mut self, registry: &FormulaRegistry<E>) {
        let (rows, cols) = registry.dimensions(&self.sheet_id).unwrap_or((0, 0));
        self.selection.resize(saturate(rows), saturate(cols));
    }

    fn show_cell<E: EvaluationEngine>(&mut self, registry: &FormulaRegistry<E>) {
        self.formula_bar = match self.selection.active() {
            Some(addr) => registry.edit_text(&self.sheet_id, addr.row, addr.col),
            None => String::new(),
        };
    }

    /// Dispatch one keystroke
    ///
    /// Returns the outcome of a commit when the keystroke caused one.
    pub fn handle_key<E: EvaluationEngine>(
        &mut self,
        registry: &mut FormulaRegistry<E>,
        key: Key,
        modifiers: Modifiers,
    ) -> Result<Option<SetOutcome>> {
        trace!(sheet_id = %self.sheet_id, ?key, state = ?self.state(), "key");
        if self.session.is_some() {
            return self.handle_editing_key(registry, key, modifiers);
        }
        match key {
            Key::Arrow(direction) => {
                self.navigate(registry, direction, modifiers.shift);
                Ok(None)
            }
            Key::Char(c) if !modifiers.is_command() => {
                self.start_edit_with(registry, c.to_string());
                Ok(None)
            }
            Key::Edit => {
                self.begin_edit(registry);
                Ok(None)
            }
            Key::Delete => self.clear_cell(registry),
            Key::Backspace => {
                self.start_edit_with(registry, String::new());
                Ok(None)
            }
            Key::Enter => {
                let direction = if modifiers.shift { Direction::Up } else { Direction::Down };
                self.navigate(registry, direction, false);
                Ok(None)
            }
            Key::Tab => {
                self.tab(registry, modifiers.shift);
                Ok(None)
            }
            Key::Escape => {
                if let Some(active) = self.selection.active() {
                    self.selection.select(active);
                }
                Ok(None)
            }
            Key::Char(_) => Ok(None),
        }
    }

    fn handle_editing_key<E: EvaluationEngine>(
        &mut self,
        registry: &mut FormulaRegistry<E>,
        key: Key,
        modifiers: Modifiers,
    ) -> Result<Option<SetOutcome>> {
        match key {
            Key::Char(c) if !modifiers.is_command() => {
                self.type_char(c);
                Ok(None)
            }
            Key::Backspace => {
                self.backspace();
                Ok(None)
            }
            Key::Enter => {
                let movement = if modifiers.shift { CommitMove::Up } else { CommitMove::Down };
                self.commit(registry, movement)
            }
            Key::Tab => {
                let movement = if modifiers.shift { CommitMove::Left } else { CommitMove::Right };
                self.commit(registry, movement)
            }
            Key::Escape => {
                self.cancel(registry);
                Ok(None)
            }
            Key::Arrow(direction) => {
                let outcome = self.commit(registry, CommitMove::Stay)?;
                self.navigate(registry, direction, modifiers.shift);
                Ok(outcome)
            }
            Key::Char(_) | Key::Edit | Key::Delete => Ok(None),
        }
    }

    /// Select a cell (click); an open edit is committed first
    pub fn click<E: EvaluationEngine>(
        &mut self,
        registry: &mut FormulaRegistry<E>,
        addr: CellAddress,
    ) -> Result<Option<SetOutcome>> {
        let editing = self.session.as_ref().map(|s| s.target);
        let outcome = match editing {
            Some(target) if target != addr => self.commit(registry, CommitMove::Stay)?,
            Some(_) => return Ok(None),
            None => None,
        };
        self.sync_extent(registry);
        self.selection.select(addr);
        self.show_cell(registry);
        Ok(outcome)
    }

    /// Extend the active range to `addr` (drag or shift+click)
    pub fn drag_to<E: EvaluationEngine>(&mut self, registry: &FormulaRegistry<E>, addr: CellAddress) {
        if self.session.is_some() {
            return;
        }
        self.sync_extent(registry);
        self.selection.extend_to(addr);
    }

    fn navigate<E: EvaluationEngine>(&mut self, registry: &FormulaRegistry<E>, direction: Direction, extend: bool) {
        self.sync_extent(registry);
        if extend {
            self.selection.extend(direction);
        } else {
            self.selection.move_by(direction);
        }
        self.show_cell(registry);
    }

    fn tab<E: EvaluationEngine>(&mut self, registry: &FormulaRegistry<E>, backwards: bool) {
        self.sync_extent(registry);
        if backwards {
            self.selection.move_by(Direction::Left);
        } else if self.options.wrap_tab {
            self.selection.advance_wrapping();
        } else {
            self.selection.move_by(Direction::Right);
        }
        self.show_cell(registry);
    }

    fn start_edit_with<E: EvaluationEngine>(&mut self, registry: &FormulaRegistry<E>, buffer: String) {
        self.sync_extent(registry);
        if let Some(target) = self.selection.active() {
            self.selection.select(target);
            self.session = Some(EditSession { target, buffer });
        }
    }

    /// Start editing seeded with the cell's raw formula or literal value
    pub fn begin_edit<E: EvaluationEngine>(&mut self, registry: &FormulaRegistry<E>) {
        if self.session.is_some() {
            return;
        }
        if let Some(target) = self.selection.active() {
            let buffer = registry.edit_text(&self.sheet_id, target.row, target.col);
            self.start_edit_with(registry, buffer);
        }
    }

    /// Append a character to the edit buffer
    pub fn type_char(&mut self, c: char) {
        if let Some(session) = &mut self.session {
            session.buffer.push(c);
        }
    }

    /// Remove the last character of the edit buffer
    pub fn backspace(&mut self) {
        if let Some(session) = &mut self.session {
            session.buffer.pop();
        }
    }

    /// Replace the whole edit buffer (formula bar typing)
    pub fn set_buffer(&mut self, text: &str) {
        if let Some(session) = &mut self.session {
            session.buffer = text.to_string();
        }
    }

    /// Write the edit buffer through the registry and leave editing
    pub fn commit<E: EvaluationEngine>(
        &mut self,
        registry: &mut FormulaRegistry<E>,
        movement: CommitMove,
    ) -> Result<Option<SetOutcome>> {
        let Some(session) = self.session.take() else {
            return Ok(None);
        };
        let target = session.target;
        let written = registry.set_cell(
            &self.sheet_id,
            target.row,
            target.col,
            CellContent::parse(&session.buffer),
        );
        let outcome = match written {
            Ok(outcome) => outcome,
            Err(e) => {
                // Still editing; the buffer can be committed again or cancelled
                self.session = Some(session);
                return Err(e);
            }
        };
        trace!(sheet_id = %self.sheet_id, %target, value = %outcome.value, "committed edit");

        self.sync_extent(registry);
        self.selection.select(target);
        self.formula_bar = outcome.value.to_string();

        if self.options.move_after_commit {
            match movement {
                CommitMove::Stay => {}
                CommitMove::Down => self.navigate(registry, Direction::Down, false),
                CommitMove::Up => self.navigate(registry, Direction::Up, false),
                CommitMove::Right => self.tab(registry, false),
                CommitMove::Left => self.tab(registry, true),
            }
        }
        Ok(Some(outcome))
    }

    /// Commit because the grid lost focus; the selection stays
    pub fn focus_lost<E: EvaluationEngine>(&mut self, registry: &mut FormulaRegistry<E>) -> Result<Option<SetOutcome>> {
        self.commit(registry, CommitMove::Stay)
    }

    /// Drop the edit buffer without touching the cell
    pub fn cancel<E: EvaluationEngine>(&mut self, registry: &FormulaRegistry<E>) {
        if self.session.take().is_some() {
            self.show_cell(registry);
        }
    }

    /// Clear the active cell: a zero-length edit committed immediately
    pub fn clear_cell<E: EvaluationEngine>(&mut self, registry: &mut FormulaRegistry<E>) -> Result<Option<SetOutcome>> {
        if self.session.is_some() {
            return Ok(None);
        }
        self.start_edit_with(registry, String::new());
        let cleared = self.commit(registry, CommitMove::Stay);
        if cleared.is_err() {
            self.cancel(registry);
        }
        cleared
    }
}

fn saturate(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use powersheet_core::Scalar;
    use pretty_assertions::assert_eq;

    fn setup() -> (FormulaRegistry, GridEditor) {
        let mut registry = FormulaRegistry::new();
        registry.open_sheet("s", "S", vec!["Price".into(), "Qty".into(), "Total".into()]);
        registry
            .initialize_sheet(
                "s",
                vec![
                    vec![Scalar::Number(10.0), Scalar::Number(3.0), Scalar::Empty],
                    vec![Scalar::Number(4.0), Scalar::Number(5.0), Scalar::Empty],
                ],
            )
            .unwrap();
        (registry, GridEditor::new("s", EditorOptions::default()))
    }

    fn at(a1: &str) -> CellAddress {
        CellAddress::parse(a1).unwrap()
    }

    fn type_text(editor: &mut GridEditor, registry: &mut FormulaRegistry, text: &str) {
        for c in text.chars() {
            editor
                .handle_key(registry, Key::Char(c), Modifiers::NONE)
                .unwrap();
        }
    }

    #[test]
    fn test_idle_until_selection() {
        let (mut registry, mut editor) = setup();
        assert_eq!(editor.state(), EditorState::Idle);
        editor
            .handle_key(&mut registry, Key::Arrow(Direction::Right), Modifiers::NONE)
            .unwrap();
        assert_eq!(editor.state(), EditorState::CellSelected(at("A1")));
        assert_eq!(editor.formula_bar(), "10");
    }

    #[test]
    fn test_typing_starts_edit_with_overwrite() {
        let (mut registry, mut editor) = setup();
        editor.click(&mut registry, at("A1")).unwrap();
        type_text(&mut editor, &mut registry, "42");
        assert_eq!(editor.state(), EditorState::Editing(at("A1")));
        assert_eq!(editor.formula_bar(), "42");

        let outcome = editor
            .handle_key(&mut registry, Key::Enter, Modifiers::NONE)
            .unwrap()
            .unwrap();
        assert_eq!(outcome.value, Scalar::Number(42.0));
        assert_eq!(editor.state(), EditorState::CellSelected(at("A2")));
        assert_eq!(editor.formula_bar(), "4");
    }

    #[test]
    fn test_commit_formula_on_focus_loss() {
        let (mut registry, mut editor) = setup();
        editor.click(&mut registry, at("C1")).unwrap();
        type_text(&mut editor, &mut registry, "=Price*Qty");
        let outcome = editor.focus_lost(&mut registry).unwrap().unwrap();

        assert_eq!(outcome.value, Scalar::Number(30.0));
        assert_eq!(outcome.write().formula.as_deref(), Some("=Price*Qty"));
        assert_eq!(editor.state(), EditorState::CellSelected(at("C1")));
        assert_eq!(editor.formula_bar(), "30");
    }

    #[test]
    fn test_rejected_commit_keeps_buffer() {
        let (mut registry, mut editor) = setup();
        editor.click(&mut registry, at("C1")).unwrap();
        type_text(&mut editor, &mut registry, "=Price*Qty");

        registry.close_sheet("s");
        assert!(editor.focus_lost(&mut registry).is_err());
        assert_eq!(editor.state(), EditorState::Editing(at("C1")));
        assert_eq!(editor.session().unwrap().buffer, "=Price*Qty");

        registry.open_sheet("s", "S", vec!["Price".into(), "Qty".into(), "Total".into()]);
        registry
            .initialize_sheet("s", vec![vec![Scalar::Number(2.0), Scalar::Number(3.0), Scalar::Empty]])
            .unwrap();
        let outcome = editor.focus_lost(&mut registry).unwrap().unwrap();
        assert_eq!(outcome.value, Scalar::Number(6.0));
        assert!(!editor.is_editing());
    }

    #[test]
    fn test_rejected_delete_leaves_no_edit_open() {
        let (mut registry, mut editor) = setup();
        editor.click(&mut registry, at("A1")).unwrap();
        registry.close_sheet("s");
        assert!(editor
            .handle_key(&mut registry, Key::Delete, Modifiers::NONE)
            .is_err());
        assert!(!editor.is_editing());
    }

    #[test]
    fn test_explicit_edit_seeds_raw_formula() {
        let (mut registry, mut editor) = setup();
        registry
            .set_cell("s", 0, 2, CellContent::parse("=Price*Qty"))
            .unwrap();
        editor.click(&mut registry, at("C1")).unwrap();
        assert_eq!(editor.formula_bar(), "=Price*Qty");

        editor
            .handle_key(&mut registry, Key::Edit, Modifiers::NONE)
            .unwrap();
        assert_eq!(editor.session().unwrap().buffer, "=Price*Qty");
    }

    #[test]
    fn test_cancel_is_noop() {
        let (mut registry, mut editor) = setup();
        registry
            .set_cell("s", 0, 2, CellContent::parse("=A1+B1"))
            .unwrap();
        let before = (
            registry.get_cell_value("s", 0, 2),
            registry.get_formula("s", 0, 2),
        );

        editor.click(&mut registry, at("C1")).unwrap();
        editor.begin_edit(&registry);
        type_text(&mut editor, &mut registry, "*100");
        editor
            .handle_key(&mut registry, Key::Backspace, Modifiers::NONE)
            .unwrap();
        editor
            .handle_key(&mut registry, Key::Escape, Modifiers::NONE)
            .unwrap();

        assert_eq!(editor.state(), EditorState::CellSelected(at("C1")));
        assert_eq!(
            (
                registry.get_cell_value("s", 0, 2),
                registry.get_formula("s", 0, 2)
            ),
            before
        );
        assert_eq!(editor.formula_bar(), "=A1+B1");
    }

    #[test]
    fn test_tab_wraps_to_next_row() {
        let (mut registry, mut editor) = setup();
        editor.click(&mut registry, at("C1")).unwrap();
        type_text(&mut editor, &mut registry, "x");
        editor
            .handle_key(&mut registry, Key::Tab, Modifiers::NONE)
            .unwrap();
        assert_eq!(editor.active_cell(), Some(at("A2")));

        let mut no_wrap = GridEditor::new(
            "s",
            EditorOptions {
                wrap_tab: false,
                ..EditorOptions::default()
            },
        );
        no_wrap.click(&mut registry, at("C1")).unwrap();
        no_wrap
            .handle_key(&mut registry, Key::Tab, Modifiers::NONE)
            .unwrap();
        assert_eq!(no_wrap.active_cell(), Some(at("C1")));
    }

    #[test]
    fn test_arrow_while_editing_commits_then_moves() {
        let (mut registry, mut editor) = setup();
        editor.click(&mut registry, at("B1")).unwrap();
        type_text(&mut editor, &mut registry, "7");
        let outcome = editor
            .handle_key(&mut registry, Key::Arrow(Direction::Down), Modifiers::NONE)
            .unwrap();
        assert!(outcome.is_some());
        assert_eq!(registry.get_cell_value("s", 0, 1), Some(Scalar::Number(7.0)));
        assert_eq!(editor.state(), EditorState::CellSelected(at("B2")));
    }

    #[test]
    fn test_click_elsewhere_commits_first() {
        let (mut registry, mut editor) = setup();
        editor.click(&mut registry, at("A1")).unwrap();
        type_text(&mut editor, &mut registry, "1");
        let outcome = editor.click(&mut registry, at("B2")).unwrap();
        assert_eq!(outcome.map(|o| o.address), Some(at("A1")));
        assert_eq!(editor.state(), EditorState::CellSelected(at("B2")));
        assert_eq!(editor.formula_bar(), "5");
    }

    #[test]
    fn test_delete_clears_cell_and_formula() {
        let (mut registry, mut editor) = setup();
        registry
            .set_cell("s", 0, 2, CellContent::parse("=A1"))
            .unwrap();
        editor.click(&mut registry, at("C1")).unwrap();
        let outcome = editor
            .handle_key(&mut registry, Key::Delete, Modifiers::NONE)
            .unwrap()
            .unwrap();
        assert_eq!(outcome.value, Scalar::Empty);
        assert!(registry.get_all_formulas("s").is_empty());
        assert_eq!(editor.state(), EditorState::CellSelected(at("C1")));
    }

    #[test]
    fn test_command_chars_do_not_type() {
        let (mut registry, mut editor) = setup();
        editor.click(&mut registry, at("A1")).unwrap();
        let ctrl = Modifiers {
            ctrl: true,
            ..Modifiers::NONE
        };
        editor
            .handle_key(&mut registry, Key::Char('c'), ctrl)
            .unwrap();
        assert!(!editor.is_editing());
    }

    #[test]
    fn test_shift_arrows_extend_range() {
        let (mut registry, mut editor) = setup();
        editor.click(&mut registry, at("A1")).unwrap();
        editor
            .handle_key(&mut registry, Key::Arrow(Direction::Right), Modifiers::SHIFT)
            .unwrap();
        editor
            .handle_key(&mut registry, Key::Arrow(Direction::Down), Modifiers::SHIFT)
            .unwrap();
        assert_eq!(editor.active_range().unwrap().to_string(), "A1:B2");

        editor.drag_to(&registry, at("C1"));
        assert_eq!(editor.active_range().unwrap().to_string(), "A1:C1");
    }
}
