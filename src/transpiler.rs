//! EdgeQL clause builder.
//!
//! Turns filter conditions, payloads and selections into EdgeQL fragments.
//! Every fragment comes with a parameter map whose keys match the `$name`
//! placeholders embedded in the text. Filter placeholders are prefixed
//! `filter_`, payload placeholders `params_`, so both can share a statement.

use std::collections::HashSet;

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use crate::ast::*;
use crate::error::{GelError, GelResult};
use crate::schema::*;

pub const FILTER_PREFIX: &str = "filter_";
pub const PARAMS_PREFIX: &str = "params_";

/// Trait for converting request tokens to EdgeQL keywords.
pub trait ToEdgeql {
    fn to_edgeql(&self) -> &'static str;
}

impl ToEdgeql for Operator {
    fn to_edgeql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::In => "in",
            // Disambiguated by the wildcards on the bound value.
            Operator::Contains | Operator::StartsWith | Operator::EndsWith => "like",
        }
    }
}

impl ToEdgeql for Connector {
    fn to_edgeql(&self) -> &'static str {
        match self {
            Connector::And => "and",
            Connector::Or => "or",
        }
    }
}

impl ToEdgeql for Direction {
    fn to_edgeql(&self) -> &'static str {
        match self {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        }
    }
}

/// How malformed identity values bound for `uuid` placeholders are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IdentityPolicy {
    /// Replace them with the nil UUID.
    #[default]
    Sentinel,
    /// Reject them with [`GelError::InvalidIdentity`].
    Strict,
}

impl IdentityPolicy {
    fn apply(self, field: &str, value: Value) -> GelResult<Value> {
        match value {
            Value::String(s) if !is_uuid(&s) => match self {
                IdentityPolicy::Sentinel => Ok(Value::String(Uuid::nil().to_string())),
                IdentityPolicy::Strict => Err(GelError::InvalidIdentity {
                    field: field.to_string(),
                    value: s,
                }),
            },
            Value::Array(items) => items
                .into_iter()
                .map(|item| self.apply(field, item))
                .collect::<GelResult<Vec<_>>>()
                .map(Value::Array),
            other => Ok(other),
        }
    }
}

/// Hyphenated 8-4-4-4-12 hex form only.
fn is_uuid(s: &str) -> bool {
    s.len() == 36 && Uuid::try_parse(s).is_ok()
}

/// RFC 3339 strings are rewritten in UTC; anything else is left alone.
fn normalize_date(value: Value) -> Value {
    match value {
        Value::String(s) => match DateTime::parse_from_rfc3339(&s) {
            Ok(dt) => Value::String(
                dt.with_timezone(&Utc)
                    .to_rfc3339_opts(SecondsFormat::AutoSi, true),
            ),
            Err(_) => Value::String(s),
        },
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_date).collect()),
        other => other,
    }
}

fn coerce(field: FieldRef<'_>, value: Value, policy: IdentityPolicy) -> GelResult<Value> {
    if field.is_identity() || field.reference().is_some() {
        return policy.apply(field.physical_name(), value);
    }
    match field.attr.field_type {
        FieldType::Date => Ok(normalize_date(value)),
        _ => Ok(value),
    }
}

/// A filter condition with its field resolved and placeholder allocated.
struct BoundCondition<'a> {
    cond: &'a Where,
    field: FieldRef<'a>,
    placeholder: String,
}

/// Resolve every condition and give each a unique placeholder.
///
/// A field filtered more than once gets the first free `_1`, `_2`, ...
/// suffix, skipping names already issued to other fields.
fn bind_conditions<'a>(
    conditions: &'a [Where],
    mapping: &FieldMapping<'a>,
) -> GelResult<Vec<BoundCondition<'a>>> {
    let mut issued: HashSet<String> = HashSet::new();

    conditions
        .iter()
        .map(|cond| {
            let field = mapping.resolve(&cond.field)?;
            let base = format!("{FILTER_PREFIX}{}", field.physical_name());
            let mut placeholder = base.clone();
            let mut n = 0;
            while issued.contains(&placeholder) {
                n += 1;
                placeholder = format!("{base}_{n}");
            }
            issued.insert(placeholder.clone());
            Ok(BoundCondition {
                cond,
                field,
                placeholder,
            })
        })
        .collect()
}

fn predicate(bound: &BoundCondition<'_>) -> GelResult<String> {
    let BoundCondition {
        cond,
        field,
        placeholder,
    } = bound;
    let path = field.filter_path();
    let operator = cond.operator;

    if cond.value.is_null() {
        return match operator {
            Operator::Eq => Ok(format!("not exists {path}")),
            Operator::Ne => Ok(format!("exists {path}")),
            other => Err(GelError::Unsupported(format!(
                "operator '{other}' against null on '{}'",
                cond.field
            ))),
        };
    }

    if operator.is_pattern()
        && (field.is_identity()
            || field.reference().is_some()
            || field.attr.field_type != FieldType::String)
    {
        return Err(GelError::Unsupported(format!(
            "operator '{operator}' on non-text field '{}'",
            cond.field
        )));
    }

    let cast = if field.reference().is_some() {
        match operator {
            Operator::In => GelType::Uuid.array(),
            _ => GelType::Uuid,
        }
    } else {
        gel_type(
            field.key,
            &field.attr.field_type,
            Some(field.physical_name()),
            Some(operator),
        )
    };

    let token = operator.to_edgeql();
    match operator {
        Operator::In => Ok(format!("{path} {token} array_unpack(<{cast}>${placeholder})")),
        _ => Ok(format!("{path} {token} <{cast}>${placeholder}")),
    }
}

/// Build the body of a `filter` clause.
///
/// Each condition after the first is prefixed with its own connector.
pub fn where_clause(conditions: &[Where], model: &str, schema: &Schema) -> GelResult<String> {
    let mapping = field_mapping(model, schema)?;
    let bound = bind_conditions(conditions, &mapping)?;

    let mut parts = Vec::with_capacity(bound.len());
    for (index, b) in bound.iter().enumerate() {
        let pred = predicate(b)?;
        if index == 0 {
            parts.push(pred);
        } else {
            parts.push(format!("{} {}", b.cond.connector.to_edgeql(), pred));
        }
    }

    Ok(parts.join(" "))
}

/// Parameters for [`where_clause`].
///
/// Pattern operators get `%` wildcards, membership values are always sent
/// as arrays, and malformed identities are handled per `policy`.
pub fn filter_params(
    conditions: &[Where],
    model: &str,
    schema: &Schema,
    policy: IdentityPolicy,
) -> GelResult<Params> {
    let mapping = field_mapping(model, schema)?;
    let mut params = Params::new();

    for b in bind_conditions(conditions, &mapping)? {
        if b.cond.value.is_null() {
            continue;
        }

        let operand = match &b.cond.value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let value = match b.cond.operator.wildcard(&operand) {
            Some(pattern) => Value::String(pattern),
            None if b.cond.operator == Operator::In => match &b.cond.value {
                Value::Array(_) => coerce(b.field, b.cond.value.clone(), policy)?,
                scalar => coerce(b.field, Value::Array(vec![scalar.clone()]), policy)?,
            },
            None => coerce(b.field, b.cond.value.clone(), policy)?,
        };

        params.insert(b.placeholder, value);
    }

    Ok(params)
}

/// Build the shape of a read: `id` plus the requested (or all) fields.
///
/// Fields whose framework name differs from their key are aliased
/// `fieldName := .key` so results carry the name the framework expects.
pub fn select_clause(model: &str, schema: &Schema, select: Option<&[String]>) -> GelResult<String> {
    let mapping = field_mapping(model, schema)?;

    let wanted = match select {
        Some(names) if !names.is_empty() => Some(
            names
                .iter()
                .map(|name| mapping.resolve(name).map(|f| f.key))
                .collect::<GelResult<Vec<_>>>()?,
        ),
        _ => None,
    };
    let included = |key: &str| {
        wanted
            .as_ref()
            .is_none_or(|keys| keys.iter().any(|k| *k == key))
    };

    let mut items = Vec::new();
    if included(IDENTITY_FIELD) {
        items.push(IDENTITY_FIELD.to_string());
    }
    for field in mapping.fields() {
        if field.is_identity() || !included(field.key) {
            continue;
        }
        let name = field.physical_name();
        if name != field.key {
            items.push(format!("{name} := .{}", field.key));
        } else {
            items.push(field.key.to_string());
        }
    }

    Ok(items.join(", "))
}

/// A payload entry matched to a schema field.
struct Assignment<'a> {
    field: FieldRef<'a>,
    value: &'a Value,
    placeholder: String,
}

/// Payload entries in schema order, looked up by framework name then key.
///
/// The identity is never assigned and unknown payload keys are ignored.
fn assignments<'a>(payload: &'a Record, mapping: &FieldMapping<'a>) -> Vec<Assignment<'a>> {
    mapping
        .fields()
        .filter(|field| !field.is_identity())
        .filter_map(|field| {
            let name = field.physical_name();
            let value = payload.get(name).or_else(|| payload.get(field.key))?;
            Some(Assignment {
                field,
                value,
                placeholder: format!("{PARAMS_PREFIX}{name}"),
            })
        })
        .collect()
}

/// Build the assignment list of an `insert` or `update ... set`.
///
/// Reference fields assign their link by identity; `null` clears a field.
pub fn update_clause(
    payload: &Record,
    model: &str,
    schema: &Schema,
    use_plural: bool,
) -> GelResult<String> {
    let mapping = field_mapping(model, schema)?;

    let mut parts = Vec::new();
    for a in assignments(payload, &mapping) {
        let part = match a.field.reference() {
            Some(r) if a.value.is_null() => format!("{} := {{}}", r.model),
            Some(r) => format!(
                "{} := (select {} filter .{IDENTITY_FIELD} = <{}>${})",
                r.model,
                schema.type_name(&r.model, use_plural)?,
                GelType::Uuid,
                a.placeholder
            ),
            None if a.value.is_null() => format!("{} := {{}}", a.field.key),
            None => format!(
                "{} := <{}>${}",
                a.field.key,
                gel_type(
                    a.field.key,
                    &a.field.attr.field_type,
                    Some(a.field.physical_name()),
                    None
                ),
                a.placeholder
            ),
        };
        parts.push(part);
    }

    Ok(parts.join(", "))
}

/// Parameters for [`update_clause`], one per non-null assignment.
pub fn update_params(
    payload: &Record,
    model: &str,
    schema: &Schema,
    policy: IdentityPolicy,
) -> GelResult<Params> {
    let mapping = field_mapping(model, schema)?;
    let mut params = Params::new();

    for a in assignments(payload, &mapping) {
        if a.value.is_null() {
            continue;
        }
        params.insert(a.placeholder, coerce(a.field, a.value.clone(), policy)?);
    }

    Ok(params)
}

/// Build an `order by` target for a sort field.
pub fn order_clause(sort: &SortBy, model: &str, schema: &Schema) -> GelResult<String> {
    let mapping = field_mapping(model, schema)?;
    let field = mapping.resolve(&sort.field)?;
    Ok(format!(
        "{} {}",
        field.filter_path(),
        sort.direction.to_edgeql()
    ))
}
