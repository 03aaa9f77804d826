//! Expense and budget records, and template execution

use chrono::NaiveDate;
use rusqlite::types::{Null, ToSqlOutput, ValueRef};
use rusqlite::{params, ToSql};
use serde_json::Value;

use super::Database;
use crate::error::{Error, Result};
use crate::models::{Budget, CategoryLabel, Expense, NewExpense};
use crate::query::{RecordStore, ResultRow, SqlParam};

impl ToSql for SqlParam {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlParam::Text(s) => ToSqlOutput::from(s.as_str()),
            SqlParam::Integer(n) => ToSqlOutput::from(*n),
            SqlParam::Null => ToSqlOutput::from(Null),
        })
    }
}

fn json_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(n) => Value::from(n),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(hex::encode(b)),
    }
}

fn parse_category(raw: &str, column: usize) -> rusqlite::Result<CategoryLabel> {
    CategoryLabel::parse(raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            column,
            rusqlite::types::Type::Text,
            Box::new(Error::InvalidData(format!("unknown category '{}'", raw))),
        )
    })
}

impl Database {
    /// Record an expense
    pub fn insert_expense(&self, expense: &NewExpense) -> Result<i64> {
        if !expense.amount.is_finite() || expense.amount < 0.0 {
            return Err(Error::Validation(format!(
                "amount must be a non-negative number (got {})",
                expense.amount
            )));
        }
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO expenses (date, description, amount, category) VALUES (?, ?, ?, ?)",
            params![
                expense.date.format("%Y-%m-%d").to_string(),
                expense.description.trim(),
                expense.amount,
                expense.category.as_str(),
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// Most recent expenses first
    pub fn list_expenses(&self, limit: usize) -> Result<Vec<Expense>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, date, description, amount, category FROM expenses
             ORDER BY date DESC, id DESC LIMIT ?",
        )?;

        let expenses = stmt
            .query_map(params![limit as i64], |row| {
                let date_str: String = row.get(1)?;
                let category_str: String = row.get(4)?;
                Ok(Expense {
                    id: row.get(0)?,
                    date: NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            1,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?,
                    description: row.get(2)?,
                    amount: row.get(3)?,
                    category: parse_category(&category_str, 4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(expenses)
    }

    pub fn count_expenses(&self) -> Result<i64> {
        let conn = self.conn()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM expenses", [], |row| row.get(0))?)
    }

    /// Set (or replace) the monthly limit for a category
    pub fn upsert_budget(&self, category: CategoryLabel, monthly_limit: f64) -> Result<()> {
        if !monthly_limit.is_finite() || monthly_limit < 0.0 {
            return Err(Error::Validation(format!(
                "monthly limit must be a non-negative number (got {})",
                monthly_limit
            )));
        }
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO budgets (category, monthly_limit) VALUES (?, ?)
            ON CONFLICT(category) DO UPDATE SET
                monthly_limit = excluded.monthly_limit,
                updated_at = CURRENT_TIMESTAMP
            "#,
            params![category.as_str(), monthly_limit],
        )?;
        Ok(())
    }

    pub fn list_budgets(&self) -> Result<Vec<Budget>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT category, monthly_limit FROM budgets ORDER BY category")?;

        let budgets = stmt
            .query_map([], |row| {
                let category_str: String = row.get(0)?;
                Ok(Budget {
                    category: parse_category(&category_str, 0)?,
                    monthly_limit: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(budgets)
    }
}

impl RecordStore for Database {
    fn run_template(&self, sql: &'static str, params: &[(&str, SqlParam)]) -> Result<Vec<ResultRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let named: Vec<(&str, &dyn ToSql)> = params
            .iter()
            .map(|(name, value)| (*name, value as &dyn ToSql))
            .collect();

        let rows = stmt
            .query_map(named.as_slice(), |row| {
                let mut out = ResultRow::new();
                for (i, column) in columns.iter().enumerate() {
                    out.push(column.as_str(), json_value(row.get_ref(i)?));
                }
                Ok(out)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }
}
