//! Direct-dispatch statement execution: no cost-based planner, no query
//! plan cache. Each statement is matched to the table(s) and index(es) it
//! names and carried out immediately against `Database`/`Table`.
//!
//! SELECT gets one optimization: a WHERE clause that is a single equality
//! test against an indexed column is answered through that index
//! (`IndexEntry::lookup`) instead of a full table scan.

use crate::ast::*;
use crate::database::Database;
use crate::storage;
use std::cmp::Ordering;
use std::sync::{Mutex, MutexGuard, OnceLock};

static DATABASE: OnceLock<Mutex<Database>> = OnceLock::new();

fn get_database() -> MutexGuard<'static, Database> {
    DATABASE
        .get_or_init(|| {
            let url = std::env::var("VERTEXDB_STORAGE_URL").unwrap_or_else(|_| "memory:".to_string());
            let store = storage::open_store(&url).expect("invalid VERTEXDB_STORAGE_URL");
            Mutex::new(Database::new(store))
        })
        .lock()
        .unwrap()
}

pub fn execute(statement: Statement) -> Result<String, String> {
    let mut db = get_database();
    execute_on(&mut db, statement)
}

pub fn reset_database_state() {
    let mut db = get_database();
    db.reset();
}

/// Runs one statement against an already-opened `Database`. Split out
/// from `execute` so the SQL surface is testable without going through
/// the process-wide global.
pub fn execute_on(db: &mut Database, statement: Statement) -> Result<String, String> {
    match statement {
        Statement::CreateTable(stmt) => execute_create_table(db, stmt),
        Statement::DropTable(stmt) => execute_drop_table(db, stmt),
        Statement::AlterTable(stmt) => execute_alter_table(db, stmt),
        Statement::CreateIndex(stmt) => execute_create_index(db, stmt),
        Statement::DropIndex(stmt) => execute_drop_index(db, stmt),
        Statement::Insert(stmt) => execute_insert(db, stmt),
        Statement::Update(stmt) => execute_update(db, stmt),
        Statement::Delete(stmt) => execute_delete(db, stmt),
        Statement::Select(stmt) => execute_select(db, stmt),
        Statement::Begin => {
            db.begin()?;
            Ok("Transaction started".to_string())
        }
        Statement::Commit => {
            db.commit()?;
            Ok("Transaction committed".to_string())
        }
        Statement::Rollback => {
            db.rollback()?;
            Ok("Transaction rolled back".to_string())
        }
    }
}

fn execute_create_table(db: &mut Database, stmt: CreateTableStatement) -> Result<String, String> {
    db.create_table(stmt.name.clone(), stmt.columns)?;
    Ok(format!("Table '{}' created", stmt.name))
}

fn execute_drop_table(db: &mut Database, stmt: DropTableStatement) -> Result<String, String> {
    db.drop_table(&stmt.name)?;
    Ok(format!("Table '{}' dropped", stmt.name))
}

fn execute_alter_table(db: &mut Database, stmt: AlterTableStatement) -> Result<String, String> {
    let table = db.table_mut(&stmt.table)?;
    match stmt.action {
        AlterAction::AddColumn(def) => {
            if table.column_index(&def.name).is_some() {
                return Err(format!("Column '{}' already exists", def.name));
            }
            for row in table.rows.iter_mut().flatten() {
                row.push(Value::Null);
            }
            table.columns.push(def.clone());
            Ok(format!("Column '{}' added to '{}'", def.name, stmt.table))
        }
        AlterAction::DropColumn(name) => {
            let idx = table
                .column_index(&name)
                .ok_or_else(|| format!("Column '{}' does not exist", name))?;
            if table.index_on_column(&name).is_some() {
                return Err(format!("Column '{}' still has an index; drop it first", name));
            }
            table.columns.remove(idx);
            for row in table.rows.iter_mut().flatten() {
                row.remove(idx);
            }
            Ok(format!("Column '{}' dropped from '{}'", name, stmt.table))
        }
        AlterAction::RenameColumn { from, to } => {
            let idx = table
                .column_index(&from)
                .ok_or_else(|| format!("Column '{}' does not exist", from))?;
            table.columns[idx].name = to.clone();
            for index in table.indexes.iter_mut() {
                if index.column == from {
                    index.column = to.clone();
                }
            }
            Ok(format!("Column '{}' renamed to '{}'", from, to))
        }
    }
}

fn execute_create_index(db: &mut Database, stmt: CreateIndexStatement) -> Result<String, String> {
    db.create_index(stmt.name.clone(), &stmt.table, &stmt.column, stmt.kind)?;
    Ok(format!("Index '{}' created on '{}'({})", stmt.name, stmt.table, stmt.column))
}

fn execute_drop_index(db: &mut Database, stmt: DropIndexStatement) -> Result<String, String> {
    db.drop_index(&stmt.name)?;
    Ok(format!("Index '{}' dropped", stmt.name))
}

fn execute_insert(db: &mut Database, stmt: InsertStatement) -> Result<String, String> {
    let table_name = stmt.table.clone();
    let table = db.table_mut(&stmt.table)?;

    let row = if let Some(ref columns) = stmt.columns {
        if columns.len() != stmt.values.len() {
            return Err(format!(
                "Column count mismatch: expected {}, got {}",
                columns.len(),
                stmt.values.len()
            ));
        }
        let mut row = vec![Value::Null; table.columns.len()];
        for (name, value) in columns.iter().zip(stmt.values.into_iter()) {
            let idx = table
                .column_index(name)
                .ok_or_else(|| format!("Column '{}' does not exist", name))?;
            row[idx] = value;
        }
        row
    } else {
        if stmt.values.len() != table.columns.len() {
            return Err(format!(
                "Column count mismatch: expected {}, got {}",
                table.columns.len(),
                stmt.values.len()
            ));
        }
        stmt.values
    };

    let position = table.rows.len();
    let rid = table.row_rid(position);
    for index in &table.indexes {
        let col_idx = table.column_index(&index.column).unwrap();
        index.put(&row[col_idx], rid).map_err(|e| e.to_string())?;
    }
    table.rows.push(Some(row));

    db.autocommit(&table_name);
    Ok("1 row(s) inserted".to_string())
}

fn execute_update(db: &mut Database, stmt: UpdateStatement) -> Result<String, String> {
    let table_name = stmt.table.clone();
    let table = db.table_mut(&stmt.table)?;

    let assignment_indices: Vec<(usize, Value)> = stmt
        .assignments
        .into_iter()
        .map(|a| {
            table
                .column_index(&a.column)
                .map(|idx| (idx, a.value))
                .ok_or_else(|| format!("Column '{}' does not exist", a.column))
        })
        .collect::<Result<_, _>>()?;

    let mut updated = 0usize;
    for position in 0..table.rows.len() {
        let matches = match &table.rows[position] {
            Some(row) => match &stmt.where_clause {
                Some(expr) => evaluate_where(expr, &table.columns, row)?,
                None => true,
            },
            None => false,
        };
        if !matches {
            continue;
        }

        let rid = table.row_rid(position);
        let old_row = table.rows[position].clone().unwrap();
        let mut new_row = old_row.clone();
        for (idx, value) in &assignment_indices {
            new_row[*idx] = value.clone();
        }

        // Post the new value before dropping the old one: if the new value
        // collides with another row under a unique index, the row and its
        // existing index entries must be left untouched.
        for index in &table.indexes {
            let col_idx = table.column_index(&index.column).unwrap();
            if old_row[col_idx] != new_row[col_idx] {
                index.put(&new_row[col_idx], rid).map_err(|e| e.to_string())?;
            }
        }
        for index in &table.indexes {
            let col_idx = table.column_index(&index.column).unwrap();
            if old_row[col_idx] != new_row[col_idx] {
                index.remove(&old_row[col_idx], rid).map_err(|e| e.to_string())?;
            }
        }

        table.rows[position] = Some(new_row);
        updated += 1;
    }

    db.autocommit(&table_name);
    Ok(format!("{} row(s) updated", updated))
}

fn execute_delete(db: &mut Database, stmt: DeleteStatement) -> Result<String, String> {
    let table_name = stmt.table.clone();
    let table = db.table_mut(&stmt.table)?;

    let mut deleted = 0usize;
    for position in 0..table.rows.len() {
        let matches = match &table.rows[position] {
            Some(row) => match &stmt.where_clause {
                Some(expr) => evaluate_where(expr, &table.columns, row)?,
                None => true,
            },
            None => false,
        };
        if !matches {
            continue;
        }

        let rid = table.row_rid(position);
        let row = table.rows[position].take().unwrap();
        for index in &table.indexes {
            let col_idx = table.column_index(&index.column).unwrap();
            index.remove(&row[col_idx], rid).map_err(|e| e.to_string())?;
        }
        deleted += 1;
    }

    db.autocommit(&table_name);
    Ok(format!("{} row(s) deleted", deleted))
}

fn execute_select(db: &Database, stmt: SelectStatement) -> Result<String, String> {
    let table = db.table(&stmt.from)?;

    let mut rows: Vec<&Vec<Value>> = match indexed_equality_lookup(table, &stmt.where_clause)? {
        Some(rids) => rids
            .into_iter()
            .filter_map(|rid| table.rows.get(rid.cluster_position as usize).and_then(|r| r.as_ref()))
            .collect(),
        None => {
            let mut rows = Vec::new();
            for row in table.rows.iter().flatten() {
                let include = match &stmt.where_clause {
                    Some(expr) => evaluate_where(expr, &table.columns, row)?,
                    None => true,
                };
                if include {
                    rows.push(row);
                }
            }
            rows
        }
    };

    let column_indices: Vec<usize> = match stmt.columns.as_slice() {
        [Column::All] => (0..table.columns.len()).collect(),
        columns => columns
            .iter()
            .map(|col| match col {
                Column::Named(name) => table
                    .column_index(name)
                    .ok_or_else(|| format!("Column '{}' does not exist", name)),
                Column::All => Err("'*' cannot be combined with other columns".to_string()),
            })
            .collect::<Result<_, _>>()?,
    };

    if let Some(ref order_by) = stmt.order_by {
        let idx = table
            .column_index(&order_by.column)
            .ok_or_else(|| format!("Column '{}' does not exist", order_by.column))?;
        rows.sort_by(|a, b| {
            let cmp = a[idx].cmp(&b[idx]);
            if order_by.asc { cmp } else { cmp.reverse() }
        });
    }

    let offset = stmt.offset.unwrap_or(0);
    let limit = stmt.limit.unwrap_or(rows.len());

    let mut result = String::new();
    for idx in &column_indices {
        result.push_str(&table.columns[*idx].name);
        result.push('\t');
    }
    result.push('\n');
    result.push_str(&"-".repeat(40));
    result.push('\n');

    for row in rows.into_iter().skip(offset).take(limit) {
        for idx in &column_indices {
            result.push_str(&format_value(&row[*idx]));
            result.push('\t');
        }
        result.push('\n');
    }

    Ok(result)
}

/// Recognizes `column = value` / `value = column`, where `column` is the
/// one column of an existing index, and answers it through that index.
/// Anything else (no WHERE, a different operator, an un-indexed column,
/// `AND`/`OR`) falls back to a full scan.
fn indexed_equality_lookup(
    table: &crate::database::Table,
    where_clause: &Option<Expression>,
) -> Result<Option<Vec<crate::rid::Rid>>, String> {
    let Some(Expression::BinaryOp { left, op: BinaryOperator::Equal, right }) = where_clause else {
        return Ok(None);
    };
    let (column, value) = match (left.as_ref(), right.as_ref()) {
        (Expression::Column(name), Expression::Value(v)) => (name, v),
        (Expression::Value(v), Expression::Column(name)) => (name, v),
        _ => return Ok(None),
    };
    let Some(index) = table.index_on_column(column) else {
        return Ok(None);
    };
    Ok(Some(index.lookup(value).map_err(|e| e.to_string())?))
}

fn evaluate_where(expr: &Expression, columns: &[ColumnDefinition], row: &[Value]) -> Result<bool, String> {
    match evaluate_expression(expr, columns, row)? {
        Value::Boolean(b) => Ok(b),
        other => Err(format!("WHERE clause did not evaluate to a boolean: {:?}", other)),
    }
}

fn evaluate_expression(expr: &Expression, columns: &[ColumnDefinition], row: &[Value]) -> Result<Value, String> {
    match expr {
        Expression::Value(v) => Ok(v.clone()),
        Expression::Column(name) => {
            let idx = columns
                .iter()
                .position(|c| &c.name == name)
                .ok_or_else(|| format!("Column '{}' does not exist", name))?;
            Ok(row[idx].clone())
        }
        Expression::BinaryOp { left, op, right } => match op {
            BinaryOperator::And => {
                let l = evaluate_bool(left, columns, row)?;
                let r = evaluate_bool(right, columns, row)?;
                Ok(Value::Boolean(l && r))
            }
            BinaryOperator::Or => {
                let l = evaluate_bool(left, columns, row)?;
                let r = evaluate_bool(right, columns, row)?;
                Ok(Value::Boolean(l || r))
            }
            _ => {
                let l = evaluate_expression(left, columns, row)?;
                let r = evaluate_expression(right, columns, row)?;
                let cmp = l.cmp(&r);
                let result = match op {
                    BinaryOperator::Equal => cmp == Ordering::Equal,
                    BinaryOperator::NotEqual => cmp != Ordering::Equal,
                    BinaryOperator::LessThan => cmp == Ordering::Less,
                    BinaryOperator::LessThanOrEqual => cmp != Ordering::Greater,
                    BinaryOperator::GreaterThan => cmp == Ordering::Greater,
                    BinaryOperator::GreaterThanOrEqual => cmp != Ordering::Less,
                    BinaryOperator::And | BinaryOperator::Or => unreachable!(),
                };
                Ok(Value::Boolean(result))
            }
        },
    }
}

fn evaluate_bool(expr: &Expression, columns: &[ColumnDefinition], row: &[Value]) -> Result<bool, String> {
    evaluate_where(expr, columns, row)
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(n) => n.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Text(s) => s.clone(),
        Value::Boolean(b) => b.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::parse;
    use std::sync::Arc;

    fn run(db: &mut Database, sql: &str) -> Result<String, String> {
        let tokens = tokenize(sql).map_err(|e| e)?;
        let statement = parse(tokens).map_err(|e| e)?;
        execute_on(db, statement)
    }

    fn test_db() -> Database {
        Database::new(Arc::new(crate::store::MemoryRecordStore::new()))
    }

    #[test]
    fn create_insert_select_round_trip() {
        let mut db = test_db();
        run(&mut db, "CREATE TABLE users (id INTEGER, name TEXT)").unwrap();
        run(&mut db, "INSERT INTO users VALUES (1, 'Ada')").unwrap();
        run(&mut db, "INSERT INTO users VALUES (2, 'Grace')").unwrap();
        let out = run(&mut db, "SELECT * FROM users").unwrap();
        assert!(out.contains("Ada"));
        assert!(out.contains("Grace"));
    }

    #[test]
    fn where_clause_filters_rows() {
        let mut db = test_db();
        run(&mut db, "CREATE TABLE users (id INTEGER, name TEXT)").unwrap();
        run(&mut db, "INSERT INTO users VALUES (1, 'Ada')").unwrap();
        run(&mut db, "INSERT INTO users VALUES (2, 'Grace')").unwrap();
        let out = run(&mut db, "SELECT name FROM users WHERE id = 2").unwrap();
        assert!(out.contains("Grace"));
        assert!(!out.contains("Ada"));
    }

    #[test]
    fn order_by_limit_offset() {
        let mut db = test_db();
        run(&mut db, "CREATE TABLE nums (n INTEGER)").unwrap();
        for n in [3, 1, 2] {
            run(&mut db, &format!("INSERT INTO nums VALUES ({})", n)).unwrap();
        }
        let out = run(&mut db, "SELECT n FROM nums ORDER BY n LIMIT 1 OFFSET 1").unwrap();
        let data_line = out.lines().nth(2).unwrap();
        assert_eq!(data_line.trim(), "2");
    }

    #[test]
    fn unique_index_rejects_duplicate_values() {
        let mut db = test_db();
        run(&mut db, "CREATE TABLE users (id INTEGER, name TEXT)").unwrap();
        run(&mut db, "CREATE UNIQUE INDEX idx_id ON users (id)").unwrap();
        run(&mut db, "INSERT INTO users VALUES (1, 'Ada')").unwrap();
        let err = run(&mut db, "INSERT INTO users VALUES (1, 'Grace')").unwrap_err();
        assert!(err.contains("already has key mapped"));
    }

    #[test]
    fn delete_removes_row_and_index_entry() {
        let mut db = test_db();
        run(&mut db, "CREATE TABLE users (id INTEGER, name TEXT)").unwrap();
        run(&mut db, "CREATE UNIQUE INDEX idx_id ON users (id)").unwrap();
        run(&mut db, "INSERT INTO users VALUES (1, 'Ada')").unwrap();
        run(&mut db, "DELETE FROM users WHERE id = 1").unwrap();
        let out = run(&mut db, "SELECT * FROM users").unwrap();
        assert!(!out.contains("Ada"));
        run(&mut db, "INSERT INTO users VALUES (1, 'Grace')").unwrap();
        let out = run(&mut db, "SELECT name FROM users WHERE id = 1").unwrap();
        assert!(out.contains("Grace"));
    }

    #[test]
    fn update_moves_index_entry() {
        let mut db = test_db();
        run(&mut db, "CREATE TABLE users (id INTEGER, name TEXT)").unwrap();
        run(&mut db, "CREATE UNIQUE INDEX idx_id ON users (id)").unwrap();
        run(&mut db, "INSERT INTO users VALUES (1, 'Ada')").unwrap();
        run(&mut db, "UPDATE users SET id = 2 WHERE name = 'Ada'").unwrap();
        let out = run(&mut db, "SELECT name FROM users WHERE id = 2").unwrap();
        assert!(out.contains("Ada"));
        let out = run(&mut db, "SELECT name FROM users WHERE id = 1").unwrap();
        assert!(!out.contains("Ada"));
    }

    #[test]
    fn transaction_rollback_discards_changes() {
        let mut db = test_db();
        run(&mut db, "CREATE TABLE users (id INTEGER, name TEXT)").unwrap();
        run(&mut db, "INSERT INTO users VALUES (1, 'Ada')").unwrap();
        run(&mut db, "BEGIN").unwrap();
        run(&mut db, "INSERT INTO users VALUES (2, 'Grace')").unwrap();
        run(&mut db, "ROLLBACK").unwrap();
        let out = run(&mut db, "SELECT * FROM users").unwrap();
        assert!(out.contains("Ada"));
        assert!(!out.contains("Grace"));
    }

    #[test]
    fn transaction_commit_keeps_changes() {
        let mut db = test_db();
        run(&mut db, "CREATE TABLE users (id INTEGER, name TEXT)").unwrap();
        run(&mut db, "BEGIN").unwrap();
        run(&mut db, "INSERT INTO users VALUES (1, 'Ada')").unwrap();
        run(&mut db, "COMMIT").unwrap();
        let out = run(&mut db, "SELECT * FROM users").unwrap();
        assert!(out.contains("Ada"));
    }

    #[test]
    fn alter_table_add_and_drop_column() {
        let mut db = test_db();
        run(&mut db, "CREATE TABLE users (id INTEGER)").unwrap();
        run(&mut db, "INSERT INTO users VALUES (1)").unwrap();
        run(&mut db, "ALTER TABLE users ADD COLUMN name TEXT").unwrap();
        let out = run(&mut db, "SELECT * FROM users").unwrap();
        assert!(out.contains("NULL"));
        run(&mut db, "ALTER TABLE users DROP COLUMN name").unwrap();
        let out = run(&mut db, "SELECT * FROM users").unwrap();
        assert!(!out.contains("NULL"));
    }

    #[test]
    fn full_text_index_search_via_like_column() {
        let mut db = test_db();
        run(&mut db, "CREATE TABLE posts (id INTEGER, body TEXT)").unwrap();
        run(&mut db, "CREATE FULLTEXT INDEX idx_body ON posts (body)").unwrap();
        run(&mut db, "INSERT INTO posts VALUES (1, 'the quick brown fox')").unwrap();
        run(&mut db, "INSERT INTO posts VALUES (2, 'lazy dogs bark')").unwrap();
        let table = db.table("posts").unwrap();
        let index = table.index_on_column("body").unwrap();
        let rids = index.lookup(&Value::Text("quick".to_string())).unwrap();
        assert_eq!(rids.len(), 1);
    }
}
