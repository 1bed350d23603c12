// SPDX-License-Identifier: PMPL-1.0-or-later
//! Query planner: turns a query into an operator chain for one signature.
//!
//! 1. A collection the signature does not store is read through the stored
//!    collection that embeds it, with field paths prefixed by the embed path.
//! 2. A join whose other side is embedded into the base side is removed and
//!    the query becomes a filter on the base collection.
//! 3. Otherwise conditions are pushed into per-side filters feeding a join.
//! 4. GROUP BY or aggregate functions add a trailing aggregate.

use tracing::debug;

use crate::config::check_fraction;
use crate::context::EvalContext;
use crate::error::{EstimationError, Result};
use crate::plan::{AggregateCall, PlanOperator, Predicate, Query, QueryPlan, StepInput};
use crate::sql::{parse_query, ColumnRef, JoinClause, ParsedQuery, Projection};

/// A logical collection of the query and where it is read from.
#[derive(Debug, Clone, PartialEq)]
struct Side {
    collection: String,
    host: String,
    /// Embed path prefix (with trailing '.') under which the collection's
    /// fields appear in `host`; empty when stored directly.
    prefix: String,
}

impl Side {
    fn field(&self, path: &str) -> String {
        format!("{}{}", self.prefix, path)
    }

    /// The collection's whole document as stored in its host: no field list
    /// for a stored collection, the embedded sub-document otherwise.
    fn whole(&self) -> Vec<String> {
        if self.prefix.is_empty() {
            Vec::new()
        } else {
            vec![self.prefix.trim_end_matches('.').to_string()]
        }
    }
}

fn push_unique(fields: &mut Vec<String>, field: String) {
    if !fields.contains(&field) {
        fields.push(field);
    }
}

pub struct QueryPlanner<'c, 'a> {
    ctx: &'c EvalContext<'a>,
}

impl<'c, 'a> QueryPlanner<'c, 'a> {
    pub fn new(ctx: &'c EvalContext<'a>) -> Self {
        Self { ctx }
    }

    /// Build the operator chain of `query` under the context's signature.
    pub fn plan(&self, query: &Query) -> Result<QueryPlan> {
        let mut notes = Vec::new();
        let operators = match (&query.sql, &query.plan) {
            (Some(_), Some(_)) => {
                return Err(EstimationError::Parse(format!(
                    "query {} has both sql and an explicit plan",
                    query.id
                )))
            }
            (None, None) => {
                return Err(EstimationError::Parse(format!(
                    "query {} has neither sql nor an explicit plan",
                    query.id
                )))
            }
            (None, Some(plan)) => plan.clone(),
            (Some(sql), None) => {
                let parsed = parse_query(sql)?;
                self.plan_parsed(query, &parsed, &mut notes)?
            }
        };
        if operators.is_empty() {
            return Err(EstimationError::EmptyPlan(query.id.clone()));
        }

        let mut collections = Vec::new();
        for op in &operators {
            for input in op.inputs() {
                if let StepInput::Collection(name) = input {
                    push_unique(&mut collections, name.clone());
                }
            }
        }
        debug!(
            query = %query.id,
            signature = %self.ctx.signature.id,
            operators = operators.len(),
            "plan built"
        );
        Ok(QueryPlan {
            query_id: query.id.clone(),
            signature_id: self.ctx.signature.id.clone(),
            operators,
            collections,
            notes,
        })
    }

    fn plan_parsed(
        &self,
        query: &Query,
        parsed: &ParsedQuery,
        notes: &mut Vec<String>,
    ) -> Result<Vec<PlanOperator>> {
        let from = self.host(&parsed.from)?;
        let Some(join) = &parsed.join else {
            return self.single(&[from], parsed);
        };

        if let Some((sides, note)) = self.eliminate_join(parsed, join)? {
            debug!(
                query = %query.id,
                signature = %self.ctx.signature.id,
                "{}",
                note
            );
            notes.push(note);
            return self.single(&sides, parsed);
        }

        let other = self.host(&join.collection)?;
        self.joined(query, parsed, join, from, other)
    }

    /// Find the stored collection holding `collection`, directly or through
    /// a chain of embeds.
    fn host(&self, collection: &str) -> Result<Side> {
        self.host_guarded(collection, &mut Vec::new())?
            .ok_or_else(|| {
                EstimationError::config(format!(
                    "collection `{collection}` is neither stored nor embedded in a stored collection under signature {}",
                    self.ctx.signature.id
                ))
            })
    }

    fn host_guarded(&self, collection: &str, trail: &mut Vec<String>) -> Result<Option<Side>> {
        let signature = self.ctx.signature;
        if signature.is_materialized(collection) {
            return Ok(Some(Side {
                collection: collection.to_string(),
                host: collection.to_string(),
                prefix: String::new(),
            }));
        }
        if trail.iter().any(|c| c == collection) {
            return Ok(None);
        }
        trail.push(collection.to_string());
        for embed in signature.embeds_of(collection) {
            if self.ctx.resolver.sizer().is_shadowed(embed)? {
                continue;
            }
            if let Some(target) = self.host_guarded(&embed.target, trail)? {
                trail.pop();
                return Ok(Some(Side {
                    collection: collection.to_string(),
                    host: target.host,
                    prefix: format!("{}{}.", target.prefix, embed.path),
                }));
            }
        }
        trail.pop();
        Ok(None)
    }

    /// Prefix under which `source` appears inside `target` documents via
    /// an embed chain.
    fn embed_prefix(&self, source: &str, target: &str, depth: usize) -> Result<Option<String>> {
        if depth > self.ctx.signature.embeds.len() {
            return Ok(None);
        }
        for embed in self.ctx.signature.embeds_of(source) {
            if self.ctx.resolver.sizer().is_shadowed(embed)? {
                continue;
            }
            if embed.target == target {
                return Ok(Some(format!("{}.", embed.path)));
            }
            if let Some(outer) = self.embed_prefix(&embed.target, target, depth + 1)? {
                return Ok(Some(format!("{}{}.", outer, embed.path)));
            }
        }
        Ok(None)
    }

    /// Try both orientations: the joined side embedded into the FROM side,
    /// then the reverse. Succeeds only when every column the query uses
    /// resolves on the base collection.
    fn eliminate_join(
        &self,
        parsed: &ParsedQuery,
        join: &JoinClause,
    ) -> Result<Option<(Vec<Side>, String)>> {
        for (base, other) in [
            (parsed.from.as_str(), join.collection.as_str()),
            (join.collection.as_str(), parsed.from.as_str()),
        ] {
            let Some(inner) = self.embed_prefix(other, base, 0)? else {
                continue;
            };
            let base_side = self.host(base)?;
            let other_side = Side {
                collection: other.to_string(),
                host: base_side.host.clone(),
                prefix: format!("{}{}", base_side.prefix, inner),
            };
            let mut sides = vec![base_side, other_side];
            if base != parsed.from {
                sides.swap(0, 1);
            }
            let resolves = parsed
                .columns()
                .into_iter()
                .all(|column| self.bind(&sides, column).is_ok());
            if resolves {
                let note = format!(
                    "join of {} and {} eliminated: {} is embedded in {} at `{}`",
                    parsed.from,
                    join.collection,
                    other,
                    base,
                    inner.trim_end_matches('.')
                );
                return Ok(Some((sides, note)));
            }
        }
        Ok(None)
    }

    /// Bind a column to the side supplying it, returning the side index and
    /// the path within that side's host.
    fn bind(&self, sides: &[Side], column: &ColumnRef) -> Result<(usize, String)> {
        let resolves = |side: &Side| -> Result<bool> {
            Ok(!self
                .ctx
                .resolver
                .resolve(&side.host, &side.field(&column.path))?
                .is_missing())
        };
        match &column.collection {
            Some(collection) => {
                let index = sides
                    .iter()
                    .position(|s| &s.collection == collection)
                    .ok_or_else(|| EstimationError::unresolvable(collection, &column.path))?;
                if resolves(&sides[index])? {
                    Ok((index, sides[index].field(&column.path)))
                } else {
                    Err(EstimationError::unresolvable(collection, &column.path))
                }
            }
            None => {
                for (index, side) in sides.iter().enumerate() {
                    if resolves(side)? {
                        return Ok((index, side.field(&column.path)));
                    }
                }
                let collection = sides.first().map(|s| s.collection.as_str()).unwrap_or("");
                Err(EstimationError::unresolvable(collection, &column.path))
            }
        }
    }

    fn aggregate_mode(parsed: &ParsedQuery) -> bool {
        parsed.has_aggregates() || !parsed.group_by.is_empty()
    }

    /// Aggregate inputs: grouping keys and aggregated columns, bound.
    fn aggregate_columns(
        &self,
        sides: &[Side],
        parsed: &ParsedQuery,
    ) -> Result<(Vec<(usize, String)>, Vec<(AggregateCall, Option<(usize, String)>)>)> {
        let mut keys = Vec::with_capacity(parsed.group_by.len());
        for column in &parsed.group_by {
            keys.push(self.bind(sides, column)?);
        }
        let mut calls = Vec::new();
        for item in &parsed.projection {
            if let Projection::Aggregate { function, column } = item {
                let bound = match column {
                    Some(column) => Some(self.bind(sides, column)?),
                    None => None,
                };
                calls.push((
                    AggregateCall {
                        function: *function,
                        field: None,
                    },
                    bound,
                ));
            }
        }
        Ok((keys, calls))
    }

    /// Every side shares one host: a filter, then an optional aggregate.
    fn single(&self, sides: &[Side], parsed: &ParsedQuery) -> Result<Vec<PlanOperator>> {
        let host = sides
            .first()
            .map(|s| s.host.clone())
            .ok_or_else(|| EstimationError::config("query reads no collection"))?;

        let mut predicates = Vec::with_capacity(parsed.conditions.len());
        for condition in &parsed.conditions {
            let (_, field) = self.bind(sides, &condition.column)?;
            predicates.push(Predicate {
                field,
                value: condition.value.clone(),
            });
        }

        let mut output_fields = Vec::new();
        let mut aggregate = None;
        if Self::aggregate_mode(parsed) {
            let (keys, calls) = self.aggregate_columns(sides, parsed)?;
            for (_, field) in &keys {
                push_unique(&mut output_fields, field.clone());
            }
            let functions = calls
                .into_iter()
                .map(|(mut call, bound)| {
                    if let Some((_, field)) = bound {
                        push_unique(&mut output_fields, field.clone());
                        call.field = Some(field);
                    }
                    call
                })
                .collect();
            aggregate = Some(PlanOperator::Aggregate {
                input: StepInput::Step(0),
                group_by: keys.into_iter().map(|(_, field)| field).collect(),
                functions,
            });
        } else if parsed.projection.contains(&Projection::Wildcard) {
            output_fields = sides[0].whole();
        } else {
            for item in &parsed.projection {
                if let Projection::Column(column) = item {
                    push_unique(&mut output_fields, self.bind(sides, column)?.1);
                }
            }
        }

        let mut operators = vec![PlanOperator::Filter {
            input: StepInput::Collection(host),
            predicates,
            output_fields,
        }];
        operators.extend(aggregate);
        Ok(operators)
    }

    /// Two hosts: per-side filters for pushed-down conditions, a join, then
    /// an optional aggregate.
    fn joined(
        &self,
        query: &Query,
        parsed: &ParsedQuery,
        join: &JoinClause,
        from: Side,
        other: Side,
    ) -> Result<Vec<PlanOperator>> {
        if let Some(sel) = query.join_selectivity {
            check_fraction("join_selectivity", sel)?;
        }
        let sides = [from, other];
        let (_, left_key) = self.bind(&sides[..1], &join.from_key)?;
        let (_, right_key) = self.bind(&sides[1..], &join.join_key)?;

        // Per-side fields the join must see, and the join's own output.
        let mut side_fields = [vec![left_key.clone()], vec![right_key.clone()]];
        let mut join_output = Vec::new();
        let mut aggregate = None;

        if Self::aggregate_mode(parsed) {
            let (keys, calls) = self.aggregate_columns(&sides, parsed)?;
            for (index, field) in &keys {
                push_unique(&mut side_fields[*index], field.clone());
                push_unique(&mut join_output, format!("{}.{}", sides[*index].host, field));
            }
            let functions = calls
                .into_iter()
                .map(|(mut call, bound)| {
                    if let Some((index, field)) = bound {
                        let qualified = format!("{}.{}", sides[index].host, field);
                        push_unique(&mut side_fields[index], field);
                        push_unique(&mut join_output, qualified.clone());
                        call.field = Some(qualified);
                    }
                    call
                })
                .collect();
            aggregate = Some((keys, functions));
        } else if parsed.projection.contains(&Projection::Wildcard) {
            for (index, side) in sides.iter().enumerate() {
                let whole = side.whole();
                if whole.is_empty() {
                    side_fields[index].clear();
                } else {
                    for field in whole {
                        push_unique(&mut side_fields[index], field);
                    }
                }
            }
        } else {
            for item in &parsed.projection {
                if let Projection::Column(column) = item {
                    let (index, field) = self.bind(&sides, column)?;
                    push_unique(&mut join_output, format!("{}.{}", sides[index].host, field));
                    push_unique(&mut side_fields[index], field);
                }
            }
        }

        let mut side_predicates: [Vec<Predicate>; 2] = [Vec::new(), Vec::new()];
        for condition in &parsed.conditions {
            let (index, field) = self.bind(&sides, &condition.column)?;
            side_predicates[index].push(Predicate {
                field,
                value: condition.value.clone(),
            });
        }

        let mut operators = Vec::new();
        let mut inputs = Vec::with_capacity(2);
        for (index, side) in sides.iter().enumerate() {
            if side_predicates[index].is_empty() {
                inputs.push(StepInput::Collection(side.host.clone()));
            } else {
                inputs.push(StepInput::Step(operators.len()));
                operators.push(PlanOperator::Filter {
                    input: StepInput::Collection(side.host.clone()),
                    predicates: std::mem::take(&mut side_predicates[index]),
                    output_fields: std::mem::take(&mut side_fields[index]),
                });
            }
        }
        let right = inputs.pop();
        let left = inputs.pop();
        let (Some(left), Some(right)) = (left, right) else {
            return Err(EstimationError::config("join needs two inputs"));
        };
        let join_index = operators.len();
        operators.push(PlanOperator::Join {
            left,
            right,
            left_key: format!("{}.{}", sides[0].host, left_key),
            right_key: format!("{}.{}", sides[1].host, right_key),
            output_fields: join_output,
            selectivity: query.join_selectivity,
        });

        if let Some((keys, functions)) = aggregate {
            operators.push(PlanOperator::Aggregate {
                input: StepInput::Step(join_index),
                group_by: keys
                    .into_iter()
                    .map(|(index, field)| format!("{}.{}", sides[index].host, field))
                    .collect(),
                functions,
            });
        }
        Ok(operators)
    }
}
