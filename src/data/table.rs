//! Column-oriented table shared by every pipeline stage

use crate::{Result, ShelterError};

/// A single named column of values
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Text(Vec<String>),
    Flag(Vec<bool>),
    /// `None` marks a missing value
    Number(Vec<Option<f64>>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Text(values) => values.len(),
            Column::Flag(values) => values.len(),
            Column::Number(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Render a cell as a category level
    pub fn category_at(&self, row: usize) -> Option<String> {
        match self {
            Column::Text(values) => values.get(row).cloned(),
            Column::Flag(values) => values.get(row).map(|v| v.to_string()),
            Column::Number(values) => values.get(row).map(|v| match v {
                Some(x) => x.to_string(),
                None => "nan".to_string(),
            }),
        }
    }

    /// Read a cell as a number; unparseable or non-finite values are missing
    pub fn number_at(&self, row: usize) -> Option<f64> {
        let value = match self {
            Column::Text(values) => values.get(row).and_then(|v| v.trim().parse().ok()),
            Column::Flag(values) => values.get(row).map(|v| if *v { 1.0 } else { 0.0 }),
            Column::Number(values) => values.get(row).copied().flatten(),
        };
        value.filter(|x: &f64| x.is_finite())
    }
}

/// Ordered collection of equally long named columns
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    names: Vec<String>,
    columns: Vec<Column>,
    n_rows: usize,
}

impl Table {
    /// Create an empty table with a fixed row count
    pub fn with_rows(n_rows: usize) -> Self {
        Table {
            names: Vec::new(),
            columns: Vec::new(),
            n_rows,
        }
    }

    /// Build a table of text columns from a header and row-major records
    pub fn from_text_rows(names: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        let mut columns: Vec<Vec<String>> = vec![Vec::with_capacity(rows.len()); names.len()];
        for row in &rows {
            for (i, column) in columns.iter_mut().enumerate() {
                column.push(row.get(i).cloned().unwrap_or_default());
            }
        }

        let mut table = Table::with_rows(rows.len());
        for (name, values) in names.into_iter().zip(columns) {
            if table.column(&name).is_some() {
                return Err(ShelterError::DuplicateColumn(name));
            }
            table.assign(name, Column::Text(values))?;
        }
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.n_rows
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| &self.columns[i])
    }

    /// Look up a column, failing if it is absent
    pub fn require(&self, name: &str) -> Result<&Column> {
        self.column(name)
            .ok_or_else(|| ShelterError::MissingColumn(name.to_string()))
    }

    /// Text values of a column; flags and numbers are rendered as strings
    pub fn text(&self, name: &str) -> Result<Vec<String>> {
        let column = self.require(name)?;
        Ok((0..self.n_rows)
            .map(|row| column.category_at(row).unwrap_or_default())
            .collect())
    }

    /// Add a column, replacing any column with the same name
    pub fn assign(&mut self, name: impl Into<String>, column: Column) -> Result<()> {
        let name = name.into();
        if column.len() != self.n_rows {
            return Err(ShelterError::ColumnLength {
                column: name,
                expected: self.n_rows,
                found: column.len(),
            });
        }

        match self.names.iter().position(|n| *n == name) {
            Some(i) => self.columns[i] = column,
            None => {
                self.names.push(name);
                self.columns.push(column);
            }
        }
        Ok(())
    }

    /// Keep only the named columns, in the given order
    pub fn select(&self, names: &[String]) -> Result<Table> {
        let mut selected = Table::with_rows(self.n_rows);
        for name in names {
            selected.assign(name.clone(), self.require(name)?.clone())?;
        }
        Ok(selected)
    }
}
