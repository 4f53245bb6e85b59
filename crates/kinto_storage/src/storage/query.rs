//! Filter/sort translation into SQL fragments.
//!
//! # Responsibility
//! - Map abstract filters, pagination rules and sorts to SQL with bound
//!   parameters, for one collection table.
//!
//! # Invariants
//! - Pure: no I/O, no transaction knowledge.
//! - Field names are resolved against the table; values are always bound,
//!   never interpolated.
//! - Malformed queries fail with `InvalidQuery`; nothing defaults silently.

use super::error::{StorageError, StorageResult};
use crate::model::query::{Comparison, Filter, PaginationRule, Sort};
use crate::schema::table::{quote, ColumnType, TableDef};
use rusqlite::types::Value as SqlValue;
use serde_json::Value;

/// SQL predicate text with its positional (`?`) parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlFragment {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl SqlFragment {
    fn new(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    fn constant(matches: bool) -> Self {
        Self::new(if matches { "1 = 1" } else { "1 = 0" }, Vec::new())
    }

    fn join(parts: Vec<SqlFragment>, separator: &str) -> Self {
        let mut params = Vec::new();
        let mut clauses = Vec::with_capacity(parts.len());
        for part in parts {
            clauses.push(format!("({})", part.sql));
            params.extend(part.params);
        }
        Self::new(clauses.join(separator), params)
    }
}

/// Translator bound to one table layout.
#[derive(Debug, Clone, Copy)]
pub struct Translator<'a> {
    table: &'a TableDef,
    id_type: ColumnType,
}

impl<'a> Translator<'a> {
    pub fn new(table: &'a TableDef, id_type: ColumnType) -> Self {
        Self { table, id_type }
    }

    /// Translates one filter.
    pub fn filter(&self, filter: &Filter) -> StorageResult<SqlFragment> {
        let kind = self.resolve(&filter.field)?;
        let column = quote(&filter.field);

        match filter.operator {
            Comparison::Has => match filter.value {
                Value::Bool(true) => Ok(SqlFragment::new(format!("{column} IS NOT NULL"), vec![])),
                Value::Bool(false) => Ok(SqlFragment::new(format!("{column} IS NULL"), vec![])),
                _ => Err(invalid_value(filter, "expects a boolean")),
            },
            list if list.is_list() => {
                let Value::Array(items) = &filter.value else {
                    return Err(invalid_value(filter, "expects a list"));
                };
                let negated = filter.operator == Comparison::Exclude;
                if items.is_empty() {
                    return Ok(SqlFragment::constant(negated));
                }
                let params = items
                    .iter()
                    .map(|item| coerce(kind, item).ok_or_else(|| invalid_value(filter, kind.as_str())))
                    .collect::<StorageResult<Vec<_>>>()?;
                let placeholders = vec!["?"; params.len()].join(", ");
                let keyword = if negated { "NOT IN" } else { "IN" };
                Ok(SqlFragment::new(
                    format!("{column} {keyword} ({placeholders})"),
                    params,
                ))
            }
            Comparison::Eq | Comparison::Neq if filter.value.is_null() => {
                let test = if filter.operator == Comparison::Eq {
                    "IS NULL"
                } else {
                    "IS NOT NULL"
                };
                Ok(SqlFragment::new(format!("{column} {test}"), vec![]))
            }
            Comparison::Like => match &filter.value {
                Value::String(pattern) => Ok(SqlFragment::new(
                    format!("{column} LIKE ?"),
                    vec![SqlValue::Text(pattern.clone())],
                )),
                _ => Err(invalid_value(filter, "expects a text pattern")),
            },
            scalar => {
                let operator = sql_operator(scalar);
                if filter.value.is_array() || filter.value.is_object() || filter.value.is_null() {
                    return Err(invalid_value(filter, "expects a scalar"));
                }
                let bound = coerce(kind, &filter.value)
                    .ok_or_else(|| invalid_value(filter, kind.as_str()))?;
                Ok(SqlFragment::new(format!("{column} {operator} ?"), vec![bound]))
            }
        }
    }

    /// AND of all filters, `None` when there are none.
    pub fn conjunction(&self, filters: &[Filter]) -> StorageResult<Option<SqlFragment>> {
        if filters.is_empty() {
            return Ok(None);
        }
        let parts = filters
            .iter()
            .map(|filter| self.filter(filter))
            .collect::<StorageResult<Vec<_>>>()?;
        Ok(Some(SqlFragment::join(parts, " AND ")))
    }

    /// OR of pagination rules, `None` when there are none.
    pub fn pagination(&self, rules: &[PaginationRule]) -> StorageResult<Option<SqlFragment>> {
        if rules.is_empty() {
            return Ok(None);
        }
        let mut parts = Vec::with_capacity(rules.len());
        for rule in rules {
            parts.push(self.conjunction(rule)?.unwrap_or_else(|| SqlFragment::constant(true)));
        }
        Ok(Some(SqlFragment::join(parts, " OR ")))
    }

    /// `ORDER BY` clause for the requested sorts.
    ///
    /// Defaults to newest first; always ends on the id so equal keys keep a
    /// stable order.
    pub fn ordering(&self, sorting: &[Sort]) -> StorageResult<String> {
        let meta = self.table.meta();
        let mut terms = Vec::with_capacity(sorting.len() + 1);
        if sorting.is_empty() {
            terms.push(format!("{} DESC", quote(&meta.last_modified)));
        }
        for sort in sorting {
            self.resolve(&sort.field)?;
            terms.push(format!("{} {}", quote(&sort.field), sort.direction.as_sql()));
        }
        if !sorting.iter().any(|sort| sort.field == meta.id) {
            terms.push(format!("{} ASC", quote(&meta.id)));
        }
        Ok(format!("ORDER BY {}", terms.join(", ")))
    }

    fn resolve(&self, field: &str) -> StorageResult<ColumnType> {
        self.table.field_type(field, self.id_type).ok_or_else(|| {
            StorageError::InvalidQuery(format!(
                "unknown field `{field}` for table `{}`",
                self.table.name()
            ))
        })
    }
}

fn sql_operator(operator: Comparison) -> &'static str {
    match operator {
        Comparison::Eq => "=",
        Comparison::Neq => "<>",
        Comparison::Lt => "<",
        Comparison::Lte => "<=",
        Comparison::Gt => ">",
        Comparison::Gte => ">=",
        Comparison::In | Comparison::Exclude => "IN",
        Comparison::Like => "LIKE",
        Comparison::Has => "IS NOT NULL",
    }
}

/// Binds a filter value for a column, accepting numeric strings for
/// integer columns (identifiers arrive as strings).
fn coerce(kind: ColumnType, value: &Value) -> Option<SqlValue> {
    if value.is_null() {
        return None;
    }
    kind.to_sql(value).or_else(|| match (kind, value) {
        (ColumnType::Integer, Value::String(text)) => text.parse().ok().map(SqlValue::Integer),
        _ => None,
    })
}

fn invalid_value(filter: &Filter, expected: &str) -> StorageError {
    StorageError::InvalidQuery(format!(
        "filter `{}` {} on `{}`: {expected}",
        filter.operator.as_str(),
        filter.value,
        filter.field
    ))
}

#[cfg(test)]
mod tests {
    use super::{SqlFragment, Translator};
    use crate::model::query::{Comparison, Filter, Sort};
    use crate::schema::table::{ColumnDef, ColumnType, TableDef};
    use crate::storage::error::StorageError;
    use rusqlite::types::Value as SqlValue;
    use serde_json::json;

    fn table() -> TableDef {
        TableDef::new("articles")
            .column(ColumnDef::new("title", ColumnType::Text))
            .column(ColumnDef::new("rank", ColumnType::Integer))
            .column(ColumnDef::new("published", ColumnType::Boolean))
    }

    fn translate(filter: Filter) -> Result<SqlFragment, StorageError> {
        let table = table();
        Translator::new(&table, ColumnType::Integer).filter(&filter)
    }

    #[test]
    fn sql_operators_compare_directly() {
        let cases = [
            (Comparison::Eq, "\"rank\" = ?"),
            (Comparison::Neq, "\"rank\" <> ?"),
            (Comparison::Lt, "\"rank\" < ?"),
            (Comparison::Lte, "\"rank\" <= ?"),
            (Comparison::Gt, "\"rank\" > ?"),
            (Comparison::Gte, "\"rank\" >= ?"),
        ];
        for (operator, sql) in cases {
            let fragment = translate(Filter::new("rank", operator, 3)).unwrap();
            assert_eq!(fragment.sql, sql);
            assert_eq!(fragment.params, vec![SqlValue::Integer(3)]);
        }
    }

    #[test]
    fn membership_operators_bind_every_item() {
        let fragment = translate(Filter::new("title", Comparison::In, json!(["a", "b"]))).unwrap();
        assert_eq!(fragment.sql, "\"title\" IN (?, ?)");
        assert_eq!(fragment.params.len(), 2);

        let fragment = translate(Filter::new("rank", Comparison::Exclude, json!([1]))).unwrap();
        assert_eq!(fragment.sql, "\"rank\" NOT IN (?)");

        let empty_in = translate(Filter::new("rank", Comparison::In, json!([]))).unwrap();
        assert_eq!(empty_in.sql, "1 = 0");
        let empty_exclude = translate(Filter::new("rank", Comparison::Exclude, json!([]))).unwrap();
        assert_eq!(empty_exclude.sql, "1 = 1");
    }

    #[test]
    fn null_and_presence_checks_use_is_null() {
        let eq_null = translate(Filter::new("title", Comparison::Eq, json!(null))).unwrap();
        assert_eq!(eq_null.sql, "\"title\" IS NULL");
        let has = translate(Filter::new("title", Comparison::Has, true)).unwrap();
        assert_eq!(has.sql, "\"title\" IS NOT NULL");
    }

    #[test]
    fn values_are_coerced_to_column_types() {
        let fragment = translate(Filter::new("published", Comparison::Eq, true)).unwrap();
        assert_eq!(fragment.params, vec![SqlValue::Integer(1)]);

        let fragment = translate(Filter::new("id", Comparison::Eq, "12")).unwrap();
        assert_eq!(fragment.params, vec![SqlValue::Integer(12)]);
    }

    #[test]
    fn malformed_filters_fail_fast() {
        let unknown = translate(Filter::new("colour", Comparison::Eq, "red"));
        assert!(matches!(unknown, Err(StorageError::InvalidQuery(_))));

        let scalar_in = translate(Filter::new("rank", Comparison::In, 1));
        assert!(matches!(scalar_in, Err(StorageError::InvalidQuery(_))));

        let list_eq = translate(Filter::new("rank", Comparison::Eq, json!([1])));
        assert!(matches!(list_eq, Err(StorageError::InvalidQuery(_))));

        let mistyped = translate(Filter::new("rank", Comparison::Gt, "high"));
        assert!(matches!(mistyped, Err(StorageError::InvalidQuery(_))));

        let null_lt = translate(Filter::new("rank", Comparison::Lt, json!(null)));
        assert!(matches!(null_lt, Err(StorageError::InvalidQuery(_))));
    }

    #[test]
    fn filters_and_rules_compose() {
        let table = table();
        let translator = Translator::new(&table, ColumnType::Integer);

        let and = translator
            .conjunction(&[
                Filter::new("rank", Comparison::Gte, 1),
                Filter::new("title", Comparison::Like, "a%"),
            ])
            .unwrap()
            .unwrap();
        assert_eq!(and.sql, "(\"rank\" >= ?) AND (\"title\" LIKE ?)");
        assert_eq!(and.params.len(), 2);

        let or = translator
            .pagination(&[
                vec![Filter::new("rank", Comparison::Gt, 5)],
                vec![
                    Filter::new("rank", Comparison::Eq, 5),
                    Filter::new("id", Comparison::Gt, 10),
                ],
            ])
            .unwrap()
            .unwrap();
        assert_eq!(
            or.sql,
            "((\"rank\" > ?)) OR ((\"rank\" = ?) AND (\"id\" > ?))"
        );
        assert_eq!(or.params.len(), 3);

        assert!(translator.conjunction(&[]).unwrap().is_none());
        assert!(translator.pagination(&[]).unwrap().is_none());
    }

    #[test]
    fn ordering_keeps_sort_order_and_adds_id_tiebreaker() {
        let table = table();
        let translator = Translator::new(&table, ColumnType::Integer);

        assert_eq!(
            translator
                .ordering(&[Sort::asc("rank"), Sort::desc("title")])
                .unwrap(),
            "ORDER BY \"rank\" ASC, \"title\" DESC, \"id\" ASC"
        );
        assert_eq!(
            translator.ordering(&[]).unwrap(),
            "ORDER BY \"last_modified\" DESC, \"id\" ASC"
        );
        assert_eq!(
            translator.ordering(&[Sort::desc("id")]).unwrap(),
            "ORDER BY \"id\" DESC"
        );
        assert!(matches!(
            translator.ordering(&[Sort::asc("colour")]),
            Err(StorageError::InvalidQuery(_))
        ));
    }
}
