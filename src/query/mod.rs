//! The query coordinator (§4.4): parses the narrow SQL dialect, plans an
//! index lookup or full scan, and projects rows via the payload
//! accessor.

pub mod ast;
mod lexer;
mod parser;
mod plan;

use std::collections::HashMap;

use crate::accessor::PayloadAccessor;
use crate::btree::BTree;
use crate::error::Result;
use crate::schema::DatabaseSchema;
use crate::store::StackedRecordStore;
use crate::value::Value;

pub use ast::{Op, Predicate, Projection, SelectStmt};
pub use plan::Plan;

/// Indexes owned by the façade, keyed by `(table_name, column_name)`.
pub type IndexMap = HashMap<(String, String), BTree>;

/// The result of executing a query: a column list plus the matching
/// rows, each a value per projected column.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub row_count: usize,
}

/// Parse and run one SQL statement against `store`/`indexes`, per the
/// plan-and-project loop of §4.4 step 5–6.
pub fn execute(
    schema: &DatabaseSchema,
    store: &StackedRecordStore,
    indexes: &IndexMap,
    accessor: &dyn PayloadAccessor,
    sql: &str,
) -> Result<QueryResult> {
    let stmt = parser::parse(sql)?;
    let chosen_plan = plan::plan(schema, &stmt)?;
    log::debug!("query plan: {:?}", chosen_plan);

    let table = schema.table(&stmt.table).expect("plan validated table exists");

    if let Plan::CountStar { table: table_name } = &chosen_plan {
        let count = count_matches(store, accessor, table_name, &stmt.predicates)?;
        return Ok(QueryResult {
            columns: vec!["count".to_string()],
            rows: vec![vec![Value::Int(count as i64)]],
            row_count: 1,
        });
    }

    let offsets = candidate_offsets(store, indexes, &chosen_plan, &stmt)?;

    let columns: Vec<String> = match &stmt.projection {
        Projection::Star => table.columns.iter().map(|c| c.name.clone()).collect(),
        Projection::Columns(cols) => cols.clone(),
        Projection::CountStar => unreachable!("handled above"),
    };

    let mut needed: Vec<&str> = columns.iter().map(String::as_str).collect();
    for p in &stmt.predicates {
        if !needed.contains(&p.column.as_str()) {
            needed.push(&p.column);
        }
    }

    let mut rows = Vec::new();
    for offset in offsets {
        let record = match store.read_record(offset) {
            Ok(r) => r,
            Err(_) => continue, // best-effort: a corrupt candidate is skipped, not fatal
        };
        let mut field_values: HashMap<&str, Value> = HashMap::new();
        for &col in &needed {
            let value = accessor.get_field(&record.payload, &[col])?;
            field_values.insert(col, value);
        }
        if !stmt
            .predicates
            .iter()
            .all(|p| p.op.matches(&field_values[p.column.as_str()], &p.literal))
        {
            continue;
        }
        let row: Vec<Value> = columns
            .iter()
            .map(|c| field_values[c.as_str()].clone())
            .collect();
        rows.push(row);
        if let Some(limit) = stmt.limit {
            if rows.len() >= limit {
                break;
            }
        }
    }

    let row_count = rows.len();
    Ok(QueryResult {
        columns,
        rows,
        row_count,
    })
}

fn count_matches(
    store: &StackedRecordStore,
    accessor: &dyn PayloadAccessor,
    table_name: &str,
    predicates: &[Predicate],
) -> Result<usize> {
    if predicates.is_empty() {
        return Ok(store.iterate_table_records(table_name).count());
    }
    let mut count = 0;
    for record in store.iterate_table_records(table_name) {
        let mut ok = true;
        for p in predicates {
            let value = accessor.get_field(&record.payload, &[p.column.as_str()])?;
            if !p.op.matches(&value, &p.literal) {
                ok = false;
                break;
            }
        }
        if ok {
            count += 1;
        }
    }
    Ok(count)
}

/// Resolve the candidate set of record offsets for `chosen_plan`.
fn candidate_offsets(
    store: &StackedRecordStore,
    indexes: &IndexMap,
    chosen_plan: &Plan,
    stmt: &SelectStmt,
) -> Result<Vec<u64>> {
    match chosen_plan {
        Plan::FullScan { table } => Ok(store
            .iterate_table_records(table)
            .map(|r| r.offset)
            .collect()),
        Plan::IndexEqual { table, column } => {
            let tree = indexes
                .get(&(table.clone(), column.clone()))
                .expect("planner only selects columns with an index");
            let predicate = stmt
                .predicates
                .iter()
                .find(|p| &p.column == column && p.op == Op::Eq)
                .expect("IndexEqual plan implies a matching equality predicate");
            Ok(tree
                .search(&predicate.literal)?
                .into_iter()
                .map(|e| e.data_offset)
                .collect())
        }
        Plan::IndexRange { table, column } => {
            let tree = indexes
                .get(&(table.clone(), column.clone()))
                .expect("planner only selects columns with an index");
            let (min, max) = range_bounds(stmt, column);
            Ok(tree
                .range_open(min.as_ref(), max.as_ref())?
                .into_iter()
                .map(|e| e.data_offset)
                .collect())
        }
        Plan::CountStar { .. } => unreachable!("handled by caller before reaching candidates"),
    }
}

/// Coalesce every predicate on `column` into a single `(min, max)` pair
/// (§4.4 step 3: `>=a AND <=b` on the same indexed column becomes one
/// `range` call). A side with no bound stays open; [`BTree::range_open`]
/// treats `None` as unbounded.
fn range_bounds(stmt: &SelectStmt, column: &str) -> (Option<Value>, Option<Value>) {
    let mut min = None;
    let mut max = None;
    for p in stmt.predicates.iter().filter(|p| p.column == column) {
        match p.op {
            Op::Ge | Op::Gt => min = Some(p.literal.clone()),
            Op::Le | Op::Lt => max = Some(p.literal.clone()),
            _ => {}
        }
    }
    (min, max)
}
