// SPDX-License-Identifier: PMPL-1.0-or-later
//! SQL front end.
//!
//! Accepts the subset the cost model understands:
//!
//! ```text
//! SELECT <columns | aggregates | *>
//! FROM C [alias] [JOIN D [alias] ON C.x = D.y]
//! [WHERE a = 'v' AND b = 3 ...]
//! [GROUP BY g1, g2 ...]
//! ```
//!
//! Column qualifiers naming a table or its alias are resolved to the
//! collection name; every other dotted prefix is kept as a field path.

use serde_json::Value as JsonValue;
use sqlparser::ast::{
    BinaryOperator, Expr, FunctionArg, FunctionArgExpr, FunctionArguments, GroupByExpr, JoinConstraint,
    JoinOperator, SelectItem, SetExpr, Statement, TableFactor, Value,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use std::fmt;

use crate::error::{EstimationError, Result};
use crate::plan::AggregateFunction;

/// Column reference. `collection` is set when the SQL qualified the column
/// with a table name or alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    pub collection: Option<String>,
    pub path: String,
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.collection {
            Some(collection) => write!(f, "{}.{}", collection, self.path),
            None => write!(f, "{}", self.path),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    Column(ColumnRef),
    Aggregate {
        function: AggregateFunction,
        column: Option<ColumnRef>,
    },
    Wildcard,
}

/// `column = value`.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: ColumnRef,
    pub value: JsonValue,
}

/// `JOIN collection ON from_key = join_key`, keys oriented so that
/// `from_key` belongs to the FROM table.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    pub collection: String,
    pub from_key: ColumnRef,
    pub join_key: ColumnRef,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedQuery {
    pub projection: Vec<Projection>,
    pub from: String,
    pub join: Option<JoinClause>,
    pub conditions: Vec<Condition>,
    pub group_by: Vec<ColumnRef>,
}

impl ParsedQuery {
    pub fn has_aggregates(&self) -> bool {
        self.projection
            .iter()
            .any(|p| matches!(p, Projection::Aggregate { .. }))
    }

    /// Every column the query mentions, in order of appearance.
    pub fn columns(&self) -> Vec<&ColumnRef> {
        let mut columns = Vec::new();
        for item in &self.projection {
            match item {
                Projection::Column(column) => columns.push(column),
                Projection::Aggregate {
                    column: Some(column),
                    ..
                } => columns.push(column),
                _ => {}
            }
        }
        if let Some(join) = &self.join {
            columns.push(&join.from_key);
            columns.push(&join.join_key);
        }
        columns.extend(self.conditions.iter().map(|c| &c.column));
        columns.extend(self.group_by.iter());
        columns
    }
}

fn parse_error(message: impl Into<String>) -> EstimationError {
    EstimationError::Parse(message.into())
}

/// Known tables of the statement: (alias or name, collection).
struct Tables(Vec<(String, String)>);

impl Tables {
    fn collection_of(&self, qualifier: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(name, _)| name == qualifier)
            .map(|(_, collection)| collection.as_str())
    }

    fn column(&self, expr: &Expr) -> Result<ColumnRef> {
        let parts: Vec<String> = match expr {
            Expr::Identifier(ident) => vec![ident.value.clone()],
            Expr::CompoundIdentifier(idents) => idents.iter().map(|i| i.value.clone()).collect(),
            Expr::Nested(inner) => return self.column(inner),
            other => return Err(parse_error(format!("expected a column, found `{other}`"))),
        };
        if parts.len() > 1 {
            if let Some(collection) = self.collection_of(&parts[0]) {
                return Ok(ColumnRef {
                    collection: Some(collection.to_string()),
                    path: parts[1..].join("."),
                });
            }
        }
        Ok(ColumnRef {
            collection: None,
            path: parts.join("."),
        })
    }
}

fn table_name(factor: &TableFactor) -> Result<(String, Option<String>)> {
    match factor {
        TableFactor::Table { name, alias, .. } => Ok((
            name.to_string(),
            alias.as_ref().map(|a| a.name.value.clone()),
        )),
        other => Err(parse_error(format!("unsupported table expression `{other}`"))),
    }
}

fn literal(value: &Value) -> JsonValue {
    match value {
        Value::Number(n, _) => n
            .parse::<i64>()
            .map(JsonValue::from)
            .or_else(|_| n.parse::<f64>().map(JsonValue::from))
            .unwrap_or_else(|_| JsonValue::String(n.clone())),
        Value::SingleQuotedString(s) | Value::DoubleQuotedString(s) => JsonValue::String(s.clone()),
        Value::Boolean(b) => JsonValue::Bool(*b),
        Value::Null => JsonValue::Null,
        other => JsonValue::String(other.to_string()),
    }
}

/// Split a WHERE clause into AND-ed equality conditions.
fn conditions(tables: &Tables, expr: &Expr, out: &mut Vec<Condition>) -> Result<()> {
    match expr {
        Expr::Nested(inner) => conditions(tables, inner, out),
        Expr::BinaryOp {
            left,
            op: BinaryOperator::And,
            right,
        } => {
            conditions(tables, left, out)?;
            conditions(tables, right, out)
        }
        Expr::BinaryOp {
            left,
            op: BinaryOperator::Eq,
            right,
        } => {
            let (column, value) = match (left.as_ref(), right.as_ref()) {
                (Expr::Value(value), column) | (column, Expr::Value(value)) => {
                    (tables.column(column)?, literal(value))
                }
                _ => {
                    return Err(parse_error(format!(
                        "predicate `{expr}` must compare a column with a constant"
                    )))
                }
            };
            out.push(Condition { column, value });
            Ok(())
        }
        other => Err(parse_error(format!(
            "unsupported predicate `{other}`: only AND-ed equalities are costed"
        ))),
    }
}

fn projection(tables: &Tables, item: &SelectItem) -> Result<Projection> {
    let expr = match item {
        SelectItem::UnnamedExpr(expr) => expr,
        SelectItem::ExprWithAlias { expr, .. } => expr,
        _ => return Ok(Projection::Wildcard),
    };
    let Expr::Function(function) = expr else {
        return tables.column(expr).map(Projection::Column);
    };
    let name = function.name.to_string();
    let aggregate: AggregateFunction = name.parse()?;
    let args = match &function.args {
        FunctionArguments::List(list) => list.args.as_slice(),
        FunctionArguments::None => &[],
        FunctionArguments::Subquery(_) => {
            return Err(parse_error(format!("subquery argument to {name}")))
        }
    };
    let column = match args {
        [] | [FunctionArg::Unnamed(FunctionArgExpr::Wildcard)] => None,
        [FunctionArg::Unnamed(FunctionArgExpr::Expr(arg))] => Some(tables.column(arg)?),
        _ => {
            return Err(parse_error(format!(
                "{name} takes exactly one column argument"
            )))
        }
    };
    Ok(Projection::Aggregate {
        function: aggregate,
        column,
    })
}

/// Parse one SELECT statement.
pub fn parse_query(sql: &str) -> Result<ParsedQuery> {
    let statements = Parser::parse_sql(&GenericDialect {}, sql)?;
    let [statement] = statements.as_slice() else {
        return Err(parse_error(format!(
            "expected exactly one statement, found {}",
            statements.len()
        )));
    };
    let Statement::Query(query) = statement else {
        return Err(parse_error("only SELECT statements are supported"));
    };
    let SetExpr::Select(select) = query.body.as_ref() else {
        return Err(parse_error("only plain SELECT bodies are supported"));
    };
    let [from] = select.from.as_slice() else {
        return Err(parse_error("exactly one FROM table is required"));
    };

    let (from_name, from_alias) = table_name(&from.relation)?;
    let mut tables = vec![(from_name.clone(), from_name.clone())];
    if let Some(alias) = from_alias {
        tables.push((alias, from_name.clone()));
    }

    let join_source = match from.joins.as_slice() {
        [] => None,
        [join] => {
            let (name, alias) = table_name(&join.relation)?;
            tables.push((name.clone(), name.clone()));
            if let Some(alias) = alias {
                tables.push((alias, name.clone()));
            }
            let JoinOperator::Inner(JoinConstraint::On(on)) = &join.join_operator else {
                return Err(parse_error("only INNER JOIN ... ON is supported"));
            };
            Some((name, on))
        }
        _ => return Err(parse_error("at most one JOIN is supported")),
    };
    let tables = Tables(tables);

    let join = match join_source {
        None => None,
        Some((collection, on)) => {
            let Expr::BinaryOp {
                left,
                op: BinaryOperator::Eq,
                right,
            } = on
            else {
                return Err(parse_error(format!("join condition `{on}` must be an equality")));
            };
            let left = tables.column(left)?;
            let right = tables.column(right)?;
            let (from_key, join_key) = if left.collection.as_deref() == Some(collection.as_str())
                && right.collection.as_deref() != Some(collection.as_str())
            {
                (right, left)
            } else {
                (left, right)
            };
            Some(JoinClause {
                collection,
                from_key,
                join_key,
            })
        }
    };

    let mut parsed_conditions = Vec::new();
    if let Some(selection) = &select.selection {
        conditions(&tables, selection, &mut parsed_conditions)?;
    }

    let group_by = match &select.group_by {
        GroupByExpr::Expressions(exprs, _) => exprs
            .iter()
            .map(|e| tables.column(e))
            .collect::<Result<Vec<_>>>()?,
        GroupByExpr::All(_) => return Err(parse_error("GROUP BY ALL is not supported")),
    };

    let projection = select
        .projection
        .iter()
        .map(|item| projection(&tables, item))
        .collect::<Result<Vec<_>>>()?;

    Ok(ParsedQuery {
        projection,
        from: from_name,
        join,
        conditions: parsed_conditions,
        group_by,
    })
}
