//! Query planning (§4.4 step 1–4): resolve the table, decide whether a
//! `WHERE` predicate can drive a B-tree lookup, and otherwise fall back
//! to a full table scan.

use crate::error::{Error, ErrorCode, Result};
use crate::schema::DatabaseSchema;

use super::ast::{Op, Projection, SelectStmt};

/// The chosen access strategy for one query. Exposes `Debug` (§4.7) so a
/// host can trace planning decisions without the coordinator logging
/// every query by default.
#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    FullScan {
        table: String,
    },
    IndexEqual {
        table: String,
        column: String,
    },
    IndexRange {
        table: String,
        column: String,
    },
    CountStar {
        table: String,
    },
}

pub fn plan(schema: &DatabaseSchema, stmt: &SelectStmt) -> Result<Plan> {
    let table = schema
        .table(&stmt.table)
        .ok_or_else(|| Error::with_message(ErrorCode::UnknownTable, stmt.table.clone()))?;

    match &stmt.projection {
        Projection::Columns(cols) => {
            for c in cols {
                if table.column(c).is_none() {
                    return Err(Error::with_message(ErrorCode::UnknownColumn, c.clone()));
                }
            }
        }
        Projection::Star | Projection::CountStar => {}
    }
    for p in &stmt.predicates {
        let column = table
            .column(&p.column)
            .ok_or_else(|| Error::with_message(ErrorCode::UnknownColumn, p.column.clone()))?;
        // check_key_type treats NULL as valid against any column type
        // (§7 TypeMismatch applies to every other literal/type mismatch).
        p.literal.check_key_type(column.ty.value_tag())?;
    }

    if matches!(stmt.projection, Projection::CountStar) {
        return Ok(Plan::CountStar {
            table: stmt.table.clone(),
        });
    }

    let indexable: Vec<_> = stmt
        .predicates
        .iter()
        .filter(|p| table.indexed_columns.contains(&p.column) && p.op.is_indexable())
        .collect();

    if indexable.is_empty() {
        return Ok(Plan::FullScan {
            table: stmt.table.clone(),
        });
    }

    if let Some(eq) = indexable.iter().find(|p| p.op == Op::Eq) {
        return Ok(Plan::IndexEqual {
            table: stmt.table.clone(),
            column: eq.column.clone(),
        });
    }

    Ok(Plan::IndexRange {
        table: stmt.table.clone(),
        column: indexable[0].column.clone(),
    })
}
