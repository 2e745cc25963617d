//! Planned-state computation for resource changes.

use serde::Serialize;
use serde_json::{Map, Value};

use super::schema::{PlanModifier, Schema};
use super::value::UNKNOWN_VALUE;

/// Result of planning a resource change.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct PlannedChange {
    /// State the resource is expected to have after apply.
    pub planned_state: Value,
    /// Attributes whose change forces replacement.
    pub requires_replace: Vec<String>,
}

/// Computes the planned state from the prior state, the proposed state and
/// the configuration.
///
/// `proposed` is the host's merge of configuration over prior state, and
/// `config` holds the configured values only. A `null` proposal plans a
/// destroy and a `null` prior state plans a create. Computed attributes the
/// configuration leaves unset become unknown whenever anything changes,
/// unless they carry [`PlanModifier::UseStateForUnknown`].
#[must_use]
pub fn plan_resource_change(
    schema: &Schema,
    prior: &Value,
    proposed: &Value,
    config: &Value,
) -> PlannedChange {
    let Value::Object(proposed_attrs) = proposed else {
        return PlannedChange {
            planned_state: Value::Null,
            requires_replace: Vec::new(),
        };
    };
    let config_attrs = match config {
        Value::Object(attrs) => attrs,
        _ => proposed_attrs,
    };

    let Value::Object(prior_attrs) = prior else {
        return PlannedChange {
            planned_state: Value::Object(plan_create(schema, proposed_attrs, config_attrs)),
            requires_replace: Vec::new(),
        };
    };

    plan_update(schema, prior_attrs, proposed_attrs, config_attrs)
}

static NULL: Value = Value::Null;

fn unknown() -> Value {
    Value::String(UNKNOWN_VALUE.to_owned())
}

fn attr<'a>(attrs: &'a Map<String, Value>, name: &str) -> &'a Value {
    attrs.get(name).unwrap_or(&NULL)
}

fn plan_create(
    schema: &Schema,
    proposed: &Map<String, Value>,
    config: &Map<String, Value>,
) -> Map<String, Value> {
    let mut planned = proposed.clone();
    for attribute in schema.attributes.iter().filter(|a| a.computed) {
        if attr(config, attribute.name).is_null() {
            planned.insert(attribute.name.to_owned(), unknown());
        }
    }
    planned
}

fn plan_update(
    schema: &Schema,
    prior: &Map<String, Value>,
    proposed: &Map<String, Value>,
    config: &Map<String, Value>,
) -> PlannedChange {
    let mut planned = proposed.clone();
    for attribute in schema.attributes.iter().filter(|a| a.computed) {
        if attr(proposed, attribute.name).is_null() {
            planned.insert(
                attribute.name.to_owned(),
                attr(prior, attribute.name).clone(),
            );
        }
    }

    let unchanged = schema
        .attributes
        .iter()
        .all(|a| attr(prior, a.name) == attr(&planned, a.name));
    if unchanged {
        return PlannedChange {
            planned_state: Value::Object(planned),
            requires_replace: Vec::new(),
        };
    }

    for attribute in schema.attributes.iter().filter(|a| a.computed) {
        if !attr(config, attribute.name).is_null() {
            continue;
        }
        let prior_value = attr(prior, attribute.name);
        let value = if attribute.has_modifier(PlanModifier::UseStateForUnknown)
            && !prior_value.is_null()
        {
            prior_value.clone()
        } else {
            unknown()
        };
        planned.insert(attribute.name.to_owned(), value);
    }

    let requires_replace = schema
        .attributes
        .iter()
        .filter(|a| a.has_modifier(PlanModifier::RequiresReplace))
        .filter(|a| attr(prior, a.name) != attr(&planned, a.name))
        .map(|a| a.name.to_owned())
        .collect();

    PlannedChange {
        planned_state: Value::Object(planned),
        requires_replace,
    }
}
