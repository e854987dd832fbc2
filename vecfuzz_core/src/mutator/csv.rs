//! Row, column and cell mutators for CSV text.

use super::{Mutator, bounded, expanded_len, extremize, stretch_text};
use crate::format::is_csv;
use crate::params::Params;

/// Upper bound on how many copies of a row or column one mutation makes.
const MAX_REPEAT: usize = 2000;

type Table = Vec<Vec<String>>;

/// Reads `input` as a table, or `None` when the CSV guard rejects it.
fn parse(input: &[u8]) -> Option<Table> {
    if !is_csv(input) {
        tracing::trace!("csv guard rejected input");
        return None;
    }
    let mut reader = ::csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(input);
    reader
        .records()
        .map(|record| record.map(|r| r.iter().map(str::to_string).collect()))
        .collect::<Result<Table, _>>()
        .ok()
}

fn render(table: &Table) -> Option<Vec<u8>> {
    let mut writer = ::csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());
    for row in table {
        writer.write_record(row).ok()?;
    }
    writer.into_inner().ok()
}

/// Parses, edits and re-serializes. `edit` returns `false` to leave the input untouched.
fn rewrite<F>(input: &[u8], edit: F) -> Vec<u8>
where
    F: FnOnce(&mut Table) -> bool,
{
    let Some(mut table) = parse(input) else {
        return input.to_vec();
    };
    if !edit(&mut table) {
        return input.to_vec();
    }
    match render(&table) {
        Some(out) => bounded(input, out),
        None => input.to_vec(),
    }
}

fn index(params: Params<'_>, i: usize) -> usize {
    params.le(i, 2..4) as usize
}

/// Copy count from `le(i)`, capped, or `None` if the expansion would not fit.
fn repeat_count(input: &[u8], params: Params<'_>, i: usize) -> Option<usize> {
    let count = index(params, i).min(MAX_REPEAT);
    expanded_len(input.len(), count).map(|_| count)
}

fn column_count(table: &Table) -> usize {
    table.iter().map(Vec::len).max().unwrap_or(0)
}

/// Replaces row `le(0)` by `le(1)` copies of itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct CsvRepeatRowMutator;

impl Mutator for CsvRepeatRowMutator {
    fn name(&self) -> &'static str {
        "Repeated row in csv"
    }

    fn dimension(&self) -> usize {
        2
    }

    fn mutate(&self, input: &[u8], params: Params<'_>) -> Vec<u8> {
        let Some(count) = repeat_count(input, params, 1) else {
            return input.to_vec();
        };
        let row = index(params, 0);
        rewrite(input, |table| {
            if row >= table.len() {
                return false;
            }
            let copies = vec![table[row].clone(); count];
            table.splice(row..=row, copies);
            true
        })
    }
}

/// Blanks every field of row `le(0)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct CsvEmptyRowMutator;

impl Mutator for CsvEmptyRowMutator {
    fn name(&self) -> &'static str {
        "Random row made empty in csv"
    }

    fn dimension(&self) -> usize {
        1
    }

    fn mutate(&self, input: &[u8], params: Params<'_>) -> Vec<u8> {
        let row = index(params, 0);
        rewrite(input, |table| match table.get_mut(row) {
            Some(fields) => {
                fields.iter_mut().for_each(String::clear);
                true
            }
            None => false,
        })
    }
}

/// Replaces column `le(0)` by `le(1)` copies of itself in every row that has it.
#[derive(Debug, Default, Clone, Copy)]
pub struct CsvRepeatColMutator;

impl Mutator for CsvRepeatColMutator {
    fn name(&self) -> &'static str {
        "Repeated column in csv"
    }

    fn dimension(&self) -> usize {
        2
    }

    fn mutate(&self, input: &[u8], params: Params<'_>) -> Vec<u8> {
        let Some(count) = repeat_count(input, params, 1) else {
            return input.to_vec();
        };
        let col = index(params, 0);
        rewrite(input, |table| {
            if col >= column_count(table) {
                return false;
            }
            for row in table.iter_mut().filter(|row| col < row.len()) {
                let copies = vec![row[col].clone(); count];
                row.splice(col..=col, copies);
            }
            true
        })
    }
}

fn empty_column(input: &[u8], col: usize, skip_rows: usize) -> Vec<u8> {
    rewrite(input, |table| {
        if col >= column_count(table) {
            return false;
        }
        for row in table.iter_mut().skip(skip_rows) {
            if let Some(field) = row.get_mut(col) {
                field.clear();
            }
        }
        true
    })
}

/// Blanks column `le(0)` in every row.
#[derive(Debug, Default, Clone, Copy)]
pub struct CsvEmptyColMutator;

impl Mutator for CsvEmptyColMutator {
    fn name(&self) -> &'static str {
        "Empty column in csv"
    }

    fn dimension(&self) -> usize {
        1
    }

    fn mutate(&self, input: &[u8], params: Params<'_>) -> Vec<u8> {
        empty_column(input, index(params, 0), 0)
    }
}

/// Blanks column `le(0)` below the header row.
#[derive(Debug, Default, Clone, Copy)]
pub struct CsvEmptyColKeepHeaderMutator;

impl Mutator for CsvEmptyColKeepHeaderMutator {
    fn name(&self) -> &'static str {
        "Empty column with header in csv"
    }

    fn dimension(&self) -> usize {
        1
    }

    fn mutate(&self, input: &[u8], params: Params<'_>) -> Vec<u8> {
        empty_column(input, index(params, 0), 1)
    }
}

/// Scales the cell at row `le(0)`, column `le(1)` by a multiplier read from coordinate 2.
///
/// Integers are multiplied by `signed(2) * le(2)`. Floats are multiplied by
/// `signed(2)`, or by `-inf`, `0` or `+inf` at the extremes. Anything else is
/// stretched or cut to `signed(2) * le(2)` characters.
#[derive(Debug, Default, Clone, Copy)]
pub struct CsvMultiplyCellMutator;

impl CsvMultiplyCellMutator {
    fn scale(cell: &str, params: Params<'_>) -> String {
        let signed = params.signed(2);
        let factor = signed * params.le(2, 2..4) as f64;
        if let Ok(int) = cell.trim().parse::<i64>() {
            ((int as f64 * factor) as i64).to_string()
        } else if let Ok(float) = cell.trim().parse::<f64>() {
            let factor = extremize(signed, f64::NEG_INFINITY, 0.0, f64::INFINITY).unwrap_or(signed);
            format!("{:?}", float * factor)
        } else {
            stretch_text(cell, factor as i64)
        }
    }
}

impl Mutator for CsvMultiplyCellMutator {
    fn name(&self) -> &'static str {
        "Multiply a cell in csv"
    }

    fn dimension(&self) -> usize {
        3
    }

    fn mutate(&self, input: &[u8], params: Params<'_>) -> Vec<u8> {
        let (row, col) = (index(params, 0), index(params, 1));
        rewrite(input, |table| {
            match table.get_mut(row).and_then(|fields| fields.get_mut(col)) {
                Some(cell) => {
                    *cell = Self::scale(cell, params);
                    true
                }
                None => false,
            }
        })
    }
}

/// Blanks the cell at row `le(0)`, column `le(1)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct CsvEmptyCellMutator;

impl Mutator for CsvEmptyCellMutator {
    fn name(&self) -> &'static str {
        "Empty cell in csv"
    }

    fn dimension(&self) -> usize {
        2
    }

    fn mutate(&self, input: &[u8], params: Params<'_>) -> Vec<u8> {
        let (row, col) = (index(params, 0), index(params, 1));
        rewrite(input, |table| {
            match table.get_mut(row).and_then(|fields| fields.get_mut(col)) {
                Some(cell) => {
                    cell.clear();
                    true
                }
                None => false,
            }
        })
    }
}
