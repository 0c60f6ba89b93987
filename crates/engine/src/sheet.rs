use std::time::Instant;

use rustc_hash::FxHashMap;

use crate::cell::{Cell, CellContents, CellValue, EMPTY_CONTENTS, EMPTY_VALUE};
use crate::cell_name::{self, NameValidator};
use crate::dep_graph::DepGraph;
use crate::error::SheetError;
use crate::recalc::{recalc_order, RecalcReport};

/// A sparse grid of named cells with automatic recalculation.
///
/// Every successful edit leaves all formula values consistent with the
/// current contents. A rejected edit leaves the sheet exactly as it was.
#[derive(Debug, Clone, Default)]
pub struct Spreadsheet {
    /// Non-empty cells by canonical name.
    cells: FxHashMap<String, Cell>,
    deps: DepGraph,
    validator: NameValidator,
    changed: bool,
    last_recalc: Option<RecalcReport>,
}

impl Spreadsheet {
    /// Empty sheet accepting every structurally valid cell name.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty sheet that also requires names to satisfy `validator`.
    pub fn with_validator(validator: NameValidator) -> Self {
        Self {
            validator,
            ..Self::default()
        }
    }

    pub fn validator(&self) -> &NameValidator {
        &self.validator
    }

    /// True if `name` is structurally valid and its canonical form passes
    /// the sheet's validator.
    pub fn is_valid_name(&self, name: &str) -> bool {
        cell_name::is_structurally_valid(name)
            && self.validator.accepts(&cell_name::canonicalize(name))
    }

    fn canonical_name(&self, name: &str) -> Result<String, SheetError> {
        if self.is_valid_name(name) {
            Ok(cell_name::canonicalize(name))
        } else {
            Err(SheetError::InvalidName(name.to_string()))
        }
    }

    /// Set a cell from raw input and recompute everything that depends on it.
    ///
    /// Returns the recalculation order: `name` first, then every cell that
    /// directly or transitively reads it, each after the cells it reads.
    ///
    /// Empty input clears the cell. On any error the sheet is unchanged.
    pub fn set_contents_of_cell(&mut self, name: &str, raw: &str) -> Result<Vec<String>, SheetError> {
        let name = self.canonical_name(name)?;
        let contents = CellContents::from_input(raw, |v| self.is_valid_name(v))?;

        let snapshot = self.deps.clone();
        let references = contents.references();
        self.deps.replace_depends_on(&name, &references);

        let prior = if contents.is_empty() {
            self.cells.remove(&name)
        } else {
            self.cells.insert(name.clone(), Cell::new(contents))
        };

        let order = match recalc_order(&self.deps, &name) {
            Ok(order) => order,
            Err(cycle) => {
                self.deps = snapshot;
                match prior {
                    Some(cell) => {
                        self.cells.insert(name, cell);
                    }
                    None => {
                        self.cells.remove(&name);
                    }
                }
                log::warn!("Rejected edit: {}", cycle);
                return Err(SheetError::CircularDependency(cycle));
            }
        };

        let report = self.recompute(&order);
        log::debug!("{} <- {:?}: {}", name, raw, report.log_line());
        self.last_recalc = Some(report);
        self.changed = true;

        Ok(order)
    }

    /// Re-evaluate every formula cell in `order`, in sequence.
    fn recompute(&mut self, order: &[String]) -> RecalcReport {
        let start = Instant::now();
        let mut report = RecalcReport {
            cells_visited: order.len(),
            ..RecalcReport::default()
        };

        for name in order {
            let value = match self.cells.get(name) {
                Some(Cell {
                    contents: CellContents::Formula(formula),
                    ..
                }) => match formula.evaluate(|v| self.number_value(v)) {
                    Ok(n) => CellValue::Number(n),
                    Err(e) => CellValue::Error(e),
                },
                _ => continue,
            };

            report.cells_recomputed += 1;
            if value.is_error() {
                report.formula_errors += 1;
            }
            if let Some(cell) = self.cells.get_mut(name) {
                cell.value = value;
            }
        }

        report.duration_us = start.elapsed().as_micros() as u64;
        report
    }

    /// Numeric value of a cell, or `None` if it is absent, text or an error.
    fn number_value(&self, name: &str) -> Option<f64> {
        self.cells.get(name).and_then(|cell| cell.value.as_number())
    }

    /// Contents of a cell. A valid name that was never set reads as empty text.
    pub fn cell_contents(&self, name: &str) -> Result<&CellContents, SheetError> {
        let name = self.canonical_name(name)?;
        Ok(self
            .cells
            .get(&name)
            .map_or(&EMPTY_CONTENTS, |cell| &cell.contents))
    }

    /// Current value of a cell. A valid name that was never set reads as
    /// empty text.
    pub fn cell_value(&self, name: &str) -> Result<&CellValue, SheetError> {
        let name = self.canonical_name(name)?;
        Ok(self
            .cells
            .get(&name)
            .map_or(&EMPTY_VALUE, |cell| &cell.value))
    }

    /// Names of all cells whose contents are not empty text, in no
    /// particular order.
    pub fn non_empty_cell_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.cells.keys().map(String::as_str)
    }

    /// Non-empty cells sorted by position (column, then row).
    pub fn cells_by_position(&self) -> Vec<(&str, &Cell)> {
        let mut cells: Vec<(&str, &Cell)> =
            self.cells.iter().map(|(n, c)| (n.as_str(), c)).collect();
        cells.sort_by(|a, b| cell_name::position_cmp(a.0, b.0));
        cells
    }

    /// Number of non-empty cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cells whose formulas read `name` directly, sorted by position.
    pub fn direct_dependents(&self, name: &str) -> Result<Vec<String>, SheetError> {
        let name = self.canonical_name(name)?;
        Ok(sorted_by_position(self.deps.depended_on_by(&name)))
    }

    /// Cells that the formula in `name` reads, sorted by position.
    pub fn direct_precedents(&self, name: &str) -> Result<Vec<String>, SheetError> {
        let name = self.canonical_name(name)?;
        Ok(sorted_by_position(self.deps.depends_on(&name)))
    }

    pub fn dep_graph(&self) -> &DepGraph {
        &self.deps
    }

    /// True if an edit succeeded since creation, load or the last save.
    pub fn changed(&self) -> bool {
        self.changed
    }

    /// Clear the `changed` flag after the sheet was persisted or loaded.
    pub fn mark_saved(&mut self) {
        self.changed = false;
    }

    /// Report from the most recent successful edit.
    pub fn last_recalc(&self) -> Option<&RecalcReport> {
        self.last_recalc.as_ref()
    }
}

fn sorted_by_position<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut names: Vec<String> = names.map(str::to_string).collect();
    names.sort_by(|a, b| cell_name::position_cmp(a, b));
    names
}
