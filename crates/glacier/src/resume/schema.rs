//! Close-time column discovery within dataset schemas.
//!
//! Column naming is not guaranteed stable across writer versions: newer
//! files carry a named `close_time` column, while legacy files preserve
//! only the kline column order. Resolution is modeled as an ordered list
//! of strategies tried in sequence, first success winning, so the policy
//! stays explicit and testable without any I/O.

use parquet::basic::Type as PhysicalType;
use parquet::schema::types::SchemaDescriptor;
use snafu::ensure;

use crate::bar::{CLOSE_TIME_COLUMN, CLOSE_TIME_ORDINAL};
use crate::error::{
    NoCloseTimeColumnSnafu, SchemaResolutionError, UnsupportedColumnTypeSnafu,
};

/// A close-time column resolved within a dataset schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedColumn {
    /// Physical name of the column in the file.
    pub name: String,
    /// Leaf index of the column.
    pub index: usize,
}

/// A single resolution strategy.
enum Strategy {
    /// Exact field-name match.
    ByName(&'static str),
    /// Fixed ordinal position, for legacy files that preserve column order.
    ByOrdinal(usize),
}

impl Strategy {
    fn resolve(&self, schema: &SchemaDescriptor) -> Option<ResolvedColumn> {
        match self {
            Strategy::ByName(name) => schema
                .columns()
                .iter()
                .position(|c| c.path().string() == *name)
                .map(|index| ResolvedColumn {
                    name: name.to_string(),
                    index,
                }),
            Strategy::ByOrdinal(index) => (*index < schema.num_columns()).then(|| ResolvedColumn {
                name: schema.column(*index).path().string(),
                index: *index,
            }),
        }
    }
}

/// Resolve the close-time column for a dataset schema.
///
/// Strategies are tried in order: the canonical name wins over the legacy
/// ordinal. The resolved column must be physical INT64 (millisecond
/// timestamps); anything else is a schema resolution failure.
pub fn resolve_close_time(
    schema: &SchemaDescriptor,
) -> Result<ResolvedColumn, SchemaResolutionError> {
    let strategies = [
        Strategy::ByName(CLOSE_TIME_COLUMN),
        Strategy::ByOrdinal(CLOSE_TIME_ORDINAL),
    ];

    for strategy in strategies {
        if let Some(column) = strategy.resolve(schema) {
            let physical = schema.column(column.index).physical_type();
            ensure!(
                physical == PhysicalType::INT64,
                UnsupportedColumnTypeSnafu {
                    column: column.name.clone(),
                    physical: format!("{physical:?}"),
                }
            );
            return Ok(column);
        }
    }

    NoCloseTimeColumnSnafu {
        columns: schema.num_columns(),
    }
    .fail()
}
