//! Dependency tracking for formula recalculation

use crate::ast::Reference;
use ahash::{AHashMap, AHashSet};
use powersheet_core::{CellAddress, CellRange};

/// Dependency graph for the formula cells of one context
///
/// Single-cell precedents are indexed both ways. Range precedents are kept per
/// formula and matched on lookup, so a formula over `A1:A100000` costs one entry.
#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    /// Cell → formulas that read it directly
    dependents: AHashMap<CellAddress, AHashSet<CellAddress>>,
    /// Formula → cells it reads directly
    precedents: AHashMap<CellAddress, AHashSet<CellAddress>>,
    /// Formula → ranges it reads
    ranges: AHashMap<CellAddress, Vec<CellRange>>,
    /// Every formula cell, with or without references
    formulas: AHashSet<CellAddress>,
}

impl DependencyGraph {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace everything `formula` reads
    pub fn set_precedents(&mut self, formula: CellAddress, refs: &[Reference]) {
        self.clear_precedents(formula);
        self.formulas.insert(formula);
        for reference in refs {
            match *reference {
                Reference::Cell(cell) => {
                    self.dependents.entry(cell).or_default().insert(formula);
                    self.precedents.entry(formula).or_default().insert(cell);
                }
                Reference::Range(range) => {
                    self.ranges.entry(formula).or_default().push(range);
                }
            }
        }
    }

    /// Forget that `formula` is a formula
    ///
    /// Other formulas that read it keep their edges; only its own outgoing
    /// references are dropped.
    pub fn clear_precedents(&mut self, formula: CellAddress) {
        if let Some(precedents) = self.precedents.remove(&formula) {
            for precedent in precedents {
                if let Some(deps) = self.dependents.get_mut(&precedent) {
                    deps.remove(&formula);
                    if deps.is_empty() {
                        self.dependents.remove(&precedent);
                    }
                }
            }
        }
        self.ranges.remove(&formula);
        self.formulas.remove(&formula);
    }

    /// Check if a cell holds a tracked formula
    pub fn is_formula(&self, cell: CellAddress) -> bool {
        self.formulas.contains(&cell)
    }

    /// Number of tracked formulas
    pub fn formula_count(&self) -> usize {
        self.formulas.len()
    }

    /// Formulas that read the given cell, directly or through a range
    pub fn get_dependents(&self, cell: CellAddress) -> Vec<CellAddress> {
        let mut result: Vec<CellAddress> = self
            .dependents
            .get(&cell)
            .into_iter()
            .flat_map(|set| set.iter().copied())
            .collect();
        for (formula, ranges) in &self.ranges {
            if ranges.iter().any(|r| r.contains(&cell)) && !result.contains(formula) {
                result.push(*formula);
            }
        }
        // Stable order keeps recalculation deterministic
        result.sort_unstable();
        result
    }

    /// Formula cells the given formula reads
    fn formula_precedents(&self, formula: CellAddress) -> Vec<CellAddress> {
        let mut result: Vec<CellAddress> = self
            .precedents
            .get(&formula)
            .into_iter()
            .flat_map(|set| set.iter().copied())
            .filter(|cell| self.formulas.contains(cell))
            .collect();
        if let Some(ranges) = self.ranges.get(&formula) {
            result.extend(
                self.formulas
                    .iter()
                    .copied()
                    .filter(|cell| ranges.iter().any(|r| r.contains(cell))),
            );
        }
        result
    }

    /// Formulas to recalculate after the given cells changed, in evaluation order
    ///
    /// The changed cells themselves lead the list when they are formulas.
    /// Cells on a cycle are still listed once; callers detect cycles with
    /// [`DependencyGraph::has_circular_reference`].
    pub fn get_recalc_order(&self, changed: &[CellAddress]) -> Vec<CellAddress> {
        let mut post_order = Vec::new();
        let mut visited = AHashSet::new();
        let mut in_stack = AHashSet::new();

        for &cell in changed {
            self.visit_dependents(cell, &mut post_order, &mut visited, &mut in_stack);
        }

        post_order.reverse();
        post_order.retain(|cell| self.formulas.contains(cell));
        post_order
    }

    /// Every formula in evaluation order
    pub fn full_recalc_order(&self) -> Vec<CellAddress> {
        let mut roots: Vec<CellAddress> = self.formulas.iter().copied().collect();
        roots.sort_unstable();
        self.get_recalc_order(&roots)
    }

    fn visit_dependents(
        &self,
        cell: CellAddress,
        post_order: &mut Vec<CellAddress>,
        visited: &mut AHashSet<CellAddress>,
        in_stack: &mut AHashSet<CellAddress>,
    ) {
        if visited.contains(&cell) || !in_stack.insert(cell) {
            return;
        }
        for dependent in self.get_dependents(cell) {
            self.visit_dependents(dependent, post_order, visited, in_stack);
        }
        in_stack.remove(&cell);
        visited.insert(cell);
        post_order.push(cell);
    }

    /// Detect a cycle through the given formula
    pub fn has_circular_reference(&self, cell: CellAddress) -> bool {
        let mut visited = AHashSet::new();
        let mut stack = self.formula_precedents(cell);
        while let Some(next) = stack.pop() {
            if next == cell {
                return true;
            }
            if visited.insert(next) {
                stack.extend(self.formula_precedents(next));
            }
        }
        false
    }

    /// Clear the entire graph
    pub fn clear(&mut self) {
        self.dependents.clear();
        self.precedents.clear();
        self.ranges.clear();
        self.formulas.clear();
    }
}
