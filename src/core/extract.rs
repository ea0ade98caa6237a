//! Tree cover loss extraction from Global Forest Watch subnational workbooks.
//!
//! The export has one sheet per breakdown. The subnational loss sheet has a
//! label row where a single merged cell marks the start of the annual loss
//! block, a second row with the year of each column, then one row per region
//! with the region name in the first column.

use calamine::{open_workbook_auto, Data, Range, Reader};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;

pub const SHEET_NAME: &str = "Loss (2001-2017) by Subnat1";
pub const LOSS_LABEL: &str = "TREE COVER LOSS (>30% CANOPY COVER)";
pub const FIRST_YEAR: u16 = 2001;
pub const LAST_YEAR: u16 = 2017;
pub const YEAR_COUNT: usize = (LAST_YEAR - FIRST_YEAR + 1) as usize;

/// Text a spreadsheet export uses for a missing number
const MISSING_MARKERS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN", "<NA>",
    "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("failed to open workbook: {0}")]
    Open(#[from] calamine::Error),
    #[error("sheet not found: '{0}'")]
    SheetNotFound(String),
    #[error("column not found: '{0}'")]
    ColumnNotFound(String),
    #[error("column '{label}' appears {count} times in the header row")]
    AmbiguousColumn { label: String, count: usize },
    #[error("format mismatch: {0}")]
    FormatMismatch(String),
    #[error("invalid loss value '{value}' for region '{region}' in {year}")]
    InvalidValue {
        region: String,
        year: u16,
        value: String,
    },
}

/// A worksheet cell, reduced to what extraction cares about
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
}

impl Cell {
    fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Number(_) => false,
            Cell::Text(s) => s.trim().is_empty(),
        }
    }

    fn label(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Number(n) => n.to_string(),
            Cell::Text(s) => s.clone(),
        }
    }
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty => Cell::Empty,
            Data::Int(v) => Cell::Number(*v as f64),
            Data::Float(v) => Cell::Number(*v),
            Data::String(s) => Cell::Text(s.clone()),
            // #N/A, #DIV/0! and friends carry no value
            Data::Error(_) => Cell::Empty,
            other => Cell::Text(other.to_string()),
        }
    }
}

/// Annual tree cover loss (hectares) for one region, 2001-2017
#[derive(Debug, Clone, PartialEq)]
pub struct LossRow {
    pub region: String,
    pub losses: [Option<Decimal>; YEAR_COUNT],
}

impl LossRow {
    /// Loss for `year`, `None` when the cell was blank or the year is outside the export
    pub fn loss(&self, year: u16) -> Option<Decimal> {
        if !(FIRST_YEAR..=LAST_YEAR).contains(&year) {
            return None;
        }
        self.losses[(year - FIRST_YEAR) as usize]
    }
}

/// Read the subnational loss rows from a workbook on disk
pub fn read_workbook(path: &Path) -> Result<Vec<LossRow>, ExtractError> {
    let mut workbook = open_workbook_auto(path)?;
    if !workbook.sheet_names().iter().any(|name| name == SHEET_NAME) {
        return Err(ExtractError::SheetNotFound(SHEET_NAME.to_string()));
    }
    let range = workbook.worksheet_range(SHEET_NAME)?;
    let rows = extract_losses(&grid_from_range(&range))?;
    log::debug!("{}: {} regions", path.display(), rows.len());
    Ok(rows)
}

/// calamine trims leading empty columns from the range; pad them back so
/// column 0 is always the sheet's first column.
fn grid_from_range(range: &Range<Data>) -> Vec<Vec<Cell>> {
    let offset = range.start().map_or(0, |(_, col)| col as usize);
    range
        .rows()
        .map(|row| {
            std::iter::repeat(Cell::Empty)
                .take(offset)
                .chain(row.iter().map(Cell::from))
                .collect()
        })
        .collect()
}

/// Extract loss rows from a sheet grid (first row = labels, second row = years)
pub fn extract_losses(grid: &[Vec<Cell>]) -> Result<Vec<LossRow>, ExtractError> {
    let labels = grid
        .first()
        .ok_or_else(|| ExtractError::FormatMismatch("sheet is empty".to_string()))?;

    let matches: Vec<usize> = labels
        .iter()
        .enumerate()
        .filter(|(_, cell)| matches!(cell, Cell::Text(s) if s == LOSS_LABEL))
        .map(|(i, _)| i)
        .collect();
    let start = match matches.as_slice() {
        [] => return Err(ExtractError::ColumnNotFound(LOSS_LABEL.to_string())),
        [i] => *i,
        _ => {
            return Err(ExtractError::AmbiguousColumn {
                label: LOSS_LABEL.to_string(),
                count: matches.len(),
            })
        }
    };

    let year_row = grid
        .get(1)
        .ok_or_else(|| ExtractError::FormatMismatch("missing year row".to_string()))?;
    let years = (0..YEAR_COUNT)
        .map(|offset| year_label(year_row.get(start + offset)))
        .collect::<Result<Vec<_>, _>>()?;
    if !years.iter().copied().eq(FIRST_YEAR..=LAST_YEAR) {
        return Err(ExtractError::FormatMismatch(format!(
            "expected year columns {}-{}, found {:?}",
            FIRST_YEAR, LAST_YEAR, years
        )));
    }

    let mut rows = Vec::new();
    for row in grid.iter().skip(2) {
        if row.iter().all(Cell::is_blank) {
            continue;
        }
        let region = row.first().map(Cell::label).unwrap_or_default();
        let mut losses = [None; YEAR_COUNT];
        for (offset, loss) in losses.iter_mut().enumerate() {
            let year = FIRST_YEAR + offset as u16;
            *loss = loss_value(row.get(start + offset), &region, year)?;
        }
        rows.push(LossRow { region, losses });
    }
    Ok(rows)
}

fn year_label(cell: Option<&Cell>) -> Result<u16, ExtractError> {
    let year = match cell {
        Some(Cell::Number(n)) if n.fract() == 0.0 => u16::from_f64(*n),
        Some(Cell::Text(s)) => s.trim().parse::<u16>().ok(),
        _ => None,
    };
    year.ok_or_else(|| {
        ExtractError::FormatMismatch(format!(
            "year header '{}' is not a year",
            cell.map(Cell::label).unwrap_or_default()
        ))
    })
}

fn loss_value(
    cell: Option<&Cell>,
    region: &str,
    year: u16,
) -> Result<Option<Decimal>, ExtractError> {
    let invalid = |value: String| ExtractError::InvalidValue {
        region: region.to_string(),
        year,
        value,
    };
    match cell {
        None | Some(Cell::Empty) => Ok(None),
        Some(Cell::Number(n)) => Decimal::from_f64(*n)
            .map(Some)
            .ok_or_else(|| invalid(n.to_string())),
        Some(Cell::Text(s)) if s.trim().is_empty() || MISSING_MARKERS.contains(&s.trim()) => {
            Ok(None)
        }
        Some(Cell::Text(s)) => {
            let s = s.trim();
            Decimal::from_str(s)
                .or_else(|_| Decimal::from_scientific(s))
                .map(Some)
                .map_err(|_| invalid(s.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    fn num(n: f64) -> Cell {
        Cell::Number(n)
    }

    /// Sheet with a name column, an area column, then the loss block
    fn sheet(regions: &[(&str, [f64; YEAR_COUNT])]) -> Vec<Vec<Cell>> {
        let mut labels = vec![text("All areas are in hectares"), text("AREA"), text(LOSS_LABEL)];
        labels.extend(std::iter::repeat(Cell::Empty).take(YEAR_COUNT - 1));
        let mut years = vec![Cell::Empty, Cell::Empty];
        years.extend((FIRST_YEAR..=LAST_YEAR).map(|y| num(y as f64)));

        let mut grid = vec![labels, years];
        for (name, values) in regions {
            let mut row = vec![text(name), num(1_000_000.0)];
            row.extend(values.iter().map(|v| num(*v)));
            grid.push(row);
        }
        grid
    }

    #[test]
    fn extracts_one_row_per_region() {
        let grid = sheet(&[("Acre", [1.0; YEAR_COUNT]), ("Amapa", [2.0; YEAR_COUNT])]);
        let rows = extract_losses(&grid).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].region, "Acre");
        assert_eq!(rows[1].region, "Amapa");
        assert_eq!(rows[1].losses.len(), 17);
        assert!(rows[1].losses.iter().all(|l| *l == Some(dec!(2))));
    }

    #[test]
    fn columns_follow_year_order() {
        let mut values = [0.0; YEAR_COUNT];
        for (i, v) in values.iter_mut().enumerate() {
            *v = (FIRST_YEAR as usize + i) as f64;
        }
        let rows = extract_losses(&sheet(&[("Para", values)])).unwrap();
        for year in FIRST_YEAR..=LAST_YEAR {
            assert_eq!(rows[0].loss(year), Some(Decimal::from(year)));
        }
        assert_eq!(rows[0].loss(2000), None);
        assert_eq!(rows[0].loss(2018), None);
    }

    #[test]
    fn columns_after_block_ignored() {
        let mut grid = sheet(&[("Acre", [1.0; YEAR_COUNT])]);
        grid[0].push(text("GAIN"));
        grid[1].push(num(2012.0));
        grid[2].push(num(999.0));
        let rows = extract_losses(&grid).unwrap();
        assert_eq!(rows[0].loss(LAST_YEAR), Some(dec!(1)));
    }

    #[test]
    fn missing_label_is_column_not_found() {
        let mut grid = sheet(&[("Acre", [1.0; YEAR_COUNT])]);
        grid[0][2] = text("TREE COVER LOSS");
        let err = extract_losses(&grid).unwrap_err();
        assert!(matches!(err, ExtractError::ColumnNotFound(_)));
    }

    #[test]
    fn repeated_label_is_ambiguous() {
        let mut grid = sheet(&[("Acre", [1.0; YEAR_COUNT])]);
        grid[0][1] = text(LOSS_LABEL);
        let err = extract_losses(&grid).unwrap_err();
        assert!(matches!(err, ExtractError::AmbiguousColumn { count: 2, .. }));
    }

    #[test]
    fn unexpected_years_are_format_mismatch() {
        let mut grid = sheet(&[("Acre", [1.0; YEAR_COUNT])]);
        grid[1][2] = num(2000.0);
        let err = extract_losses(&grid).unwrap_err();
        assert!(matches!(err, ExtractError::FormatMismatch(_)));
    }

    #[test]
    fn narrow_block_is_format_mismatch() {
        let mut grid = sheet(&[("Acre", [1.0; YEAR_COUNT])]);
        for row in grid.iter_mut() {
            row.pop();
        }
        let err = extract_losses(&grid).unwrap_err();
        assert!(matches!(err, ExtractError::FormatMismatch(_)));
    }

    #[test]
    fn text_years_accepted() {
        let mut grid = sheet(&[("Acre", [1.0; YEAR_COUNT])]);
        grid[1][2] = text("2001");
        assert_eq!(extract_losses(&grid).unwrap().len(), 1);
    }

    #[test]
    fn blank_cells_are_missing() {
        let mut grid = sheet(&[("Acre", [1.0; YEAR_COUNT])]);
        grid[2][2] = Cell::Empty;
        grid[2][3] = text(" ");
        grid[2][4] = text("12.5");
        let rows = extract_losses(&grid).unwrap();
        assert_eq!(rows[0].loss(2001), None);
        assert_eq!(rows[0].loss(2002), None);
        assert_eq!(rows[0].loss(2003), Some(dec!(12.5)));
    }

    #[test]
    fn non_numeric_loss_rejected() {
        let mut grid = sheet(&[("Acre", [1.0; YEAR_COUNT])]);
        grid[2][5] = text("twelve");
        let err = extract_losses(&grid).unwrap_err();
        assert!(matches!(
            err,
            ExtractError::InvalidValue { year: 2004, ref region, .. } if region == "Acre"
        ));
    }

    #[test]
    fn missing_markers_are_blank() {
        let mut grid = sheet(&[("Acre", [1.0; YEAR_COUNT])]);
        grid[2][2] = text("#N/A");
        grid[2][3] = text(" n/a ");
        grid[2][4] = Cell::from(&Data::Error(calamine::CellErrorType::NA));
        let rows = extract_losses(&grid).unwrap();
        assert_eq!(rows[0].loss(2001), None);
        assert_eq!(rows[0].loss(2002), None);
        assert_eq!(rows[0].loss(2003), None);
        assert_eq!(rows[0].loss(2004), Some(dec!(1)));
    }

    #[test]
    fn blank_rows_skipped() {
        let mut grid = sheet(&[("Acre", [1.0; YEAR_COUNT])]);
        grid.push(vec![Cell::Empty; YEAR_COUNT + 2]);
        assert_eq!(extract_losses(&grid).unwrap().len(), 1);
    }

    #[test]
    fn empty_sheet_rejected() {
        let err = extract_losses(&[]).unwrap_err();
        assert!(matches!(err, ExtractError::FormatMismatch(_)));
    }
}
