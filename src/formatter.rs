//! Value Formatter - turns a requested value into a schema-valid one.
//!
//! Dispatch is by field type. Enumerated types fuzzy-match requested values
//! against the schema's allowed set; multi-select fields apply a
//! deterministic merge algebra (add = union, remove = discard, replace =
//! exactly this call's matched set) and always emit sorted output. The call
//! is atomic: one unmatched element aborts the whole thing, so a partial
//! write can never be produced.

use std::collections::BTreeSet;

use serde_json::Value;
use tracing::debug;

use crate::dates::normalize_date;
use crate::error::{CoreError, Result};
use crate::similarity::{shortlist, SimilarityScorer, OPTION_MATCH_THRESHOLD};
use crate::types::{FieldSchema, FieldType, FormattedValue, IntentValue, UpdateAction};

/// Fuzzy-match one requested value against the allowed set.
///
/// Comparison is lower-cased with a fixed acceptance threshold; the best
/// match at or above it wins and the *canonical* allowed value is returned.
fn match_allowed_value(
    scorer: &dyn SimilarityScorer,
    value: &str,
    allowed: &[String],
) -> Option<String> {
    shortlist(
        scorer,
        value.trim(),
        allowed.iter(),
        |v| v.as_str(),
        OPTION_MATCH_THRESHOLD,
        1,
    )
    .into_iter()
    .next()
    .map(|c| c.item.clone())
}

fn invalid_option(value: &str, allowed: &[String]) -> CoreError {
    CoreError::validation(format!(
        "invalid option value '{}'. Allowed: [{}]",
        value,
        allowed.join(", ")
    ))
}

/// Produce a schema-valid value for `schema`, or fail without side effects.
///
/// `current_values` is the field's present value set; it only participates
/// for multi-select fields with action add/remove. A null `value` clears
/// the field.
pub fn format_value(
    scorer: &dyn SimilarityScorer,
    schema: &FieldSchema,
    value: &IntentValue,
    current_values: &[String],
    action: UpdateAction,
) -> Result<FormattedValue> {
    if value.is_null() {
        return Ok(FormattedValue::Raw(Value::Null));
    }

    match &schema.field_type {
        FieldType::Option | FieldType::OptionWithChild => {
            let requested = single_value(schema, value)?;
            let matched = match_allowed_value(scorer, &requested, &schema.allowed_values)
                .ok_or_else(|| invalid_option(&requested, &schema.allowed_values))?;
            debug!(field_id = %schema.field_id, %requested, %matched, "matched option value");
            Ok(FormattedValue::Option(matched))
        }

        FieldType::ArrayOfOption => {
            format_option_set(scorer, schema, &value.as_list(), current_values, action)
        }

        FieldType::Date => {
            let requested = single_value(schema, value)?;
            Ok(FormattedValue::Date(normalize_date(&requested)))
        }

        FieldType::String => Ok(FormattedValue::Raw(Value::String(single_value(
            schema, value,
        )?))),

        FieldType::Number => {
            let requested = single_value(schema, value)?;
            Ok(FormattedValue::Raw(parse_number(&requested)))
        }

        FieldType::Other(_) => Ok(FormattedValue::Raw(intent_to_json(value))),
    }
}

/// Set algebra for multi-select fields. Every element of this call must
/// match the allowed set before any of it is applied.
fn format_option_set(
    scorer: &dyn SimilarityScorer,
    schema: &FieldSchema,
    values: &[String],
    current_values: &[String],
    action: UpdateAction,
) -> Result<FormattedValue> {
    let mut matched = Vec::with_capacity(values.len());
    for v in values {
        let m = match_allowed_value(scorer, v, &schema.allowed_values)
            .ok_or_else(|| invalid_option(v, &schema.allowed_values))?;
        matched.push(m);
    }

    let mut working: BTreeSet<String> = match action {
        UpdateAction::Replace => BTreeSet::new(),
        UpdateAction::Add | UpdateAction::Remove => current_values.iter().cloned().collect(),
    };

    for m in matched {
        match action {
            UpdateAction::Add | UpdateAction::Replace => {
                working.insert(m);
            }
            UpdateAction::Remove => {
                // Absent element is a no-op, not an error
                working.remove(&m);
            }
        }
    }

    debug!(
        field_id = %schema.field_id,
        %action,
        result = ?working,
        "applied option-set action"
    );
    Ok(FormattedValue::from_option_set(working))
}

fn single_value(schema: &FieldSchema, value: &IntentValue) -> Result<String> {
    match value {
        IntentValue::One(v) => Ok(v.clone()),
        IntentValue::Many(vs) if vs.len() == 1 => Ok(vs[0].clone()),
        IntentValue::Many(_) => Err(CoreError::validation(format!(
            "field {} takes a single value, got a list",
            schema.field_id
        ))),
        IntentValue::Null => Err(CoreError::validation(format!(
            "field {} requires a value",
            schema.field_id
        ))),
    }
}

/// Numeric strings become JSON numbers; anything else passes through.
fn parse_number(raw: &str) -> Value {
    if let Ok(i) = raw.trim().parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = raw.trim().parse::<f64>() {
        return Value::from(f);
    }
    Value::String(raw.to_string())
}

fn intent_to_json(value: &IntentValue) -> Value {
    match value {
        IntentValue::Null => Value::Null,
        IntentValue::One(v) => Value::String(v.clone()),
        IntentValue::Many(vs) => Value::Array(vs.iter().cloned().map(Value::String).collect()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
