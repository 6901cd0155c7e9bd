//! Date override table.
//!
//! Each setter reports the matching getter's value as `wasValue` and its sole
//! argument as `value`. The multi-argument full-year setters change several
//! fields at once and report whole-date snapshots instead.

use crate::date::{DateField, DateValue, Zone};
use crate::error::ProxyError;
use crate::events::Change;
use crate::object::{Container, Object};
use crate::proxy::ListeningProxy;
use crate::value::Value;

use super::{action, wrong_kind, Method};

pub(super) fn method(name: &str) -> Option<Method> {
    let method: Method = match name {
        "setTime" | "setYear" => setter,
        _ if name.starts_with("set") && field_of(name).is_some() => setter,
        _ if read(&DateValue::invalid(), name).is_some() => query,
        _ => return None,
    };
    Some(method)
}

fn current(target: &Object) -> Option<DateValue> {
    match &*target.borrow() {
        Container::Date(date) => Some(*date),
        _ => None,
    }
}

/// `getUTCHours` / `setUTCHours` → (`Hours`, `Utc`).
fn field_of(name: &str) -> Option<(DateField, Zone)> {
    let rest = name.strip_prefix("get").or_else(|| name.strip_prefix("set"))?;
    let (zone, field) = match rest.strip_prefix("UTC") {
        Some(field) => (Zone::Utc, field),
        None => (Zone::Local, rest),
    };
    let field = match field {
        "FullYear" => DateField::FullYear,
        "Month" => DateField::Month,
        "Date" => DateField::Date,
        "Hours" => DateField::Hours,
        "Minutes" => DateField::Minutes,
        "Seconds" => DateField::Seconds,
        "Milliseconds" => DateField::Milliseconds,
        _ => return None,
    };
    Some((field, zone))
}

fn read(date: &DateValue, name: &str) -> Option<Value> {
    let value = match name {
        "getTime" | "valueOf" => Value::Number(date.time()),
        "getDay" => Value::Number(date.day(Zone::Local)),
        "getUTCDay" => Value::Number(date.day(Zone::Utc)),
        "getTimezoneOffset" => Value::Number(date.timezone_offset()),
        "getYear" => Value::Number(date.year()),
        "toISOString" | "toJSON" => date.to_iso_string().map_or(Value::Null, Value::String),
        "toUTCString" | "toGMTString" => Value::String(date.to_utc_string()),
        "toString" => Value::String(date.to_date_time_string()),
        "toDateString" => Value::String(date.to_date_string()),
        "toTimeString" => Value::String(date.to_time_string()),
        _ if name.starts_with("get") => {
            let (field, zone) = field_of(name)?;
            Value::Number(date.get(field, zone))
        }
        _ => return None,
    };
    Some(value)
}

fn query(proxy: &ListeningProxy, name: &str, _args: &[Value]) -> Result<Value, ProxyError> {
    let date = current(&proxy.target()).ok_or_else(|| wrong_kind(proxy, name))?;
    if name == "toISOString" && !date.is_valid() {
        return Err(ProxyError::invalid_argument(name, "invalid time value"));
    }
    read(&date, name).ok_or_else(|| wrong_kind(proxy, name))
}

fn apply(date: &mut DateValue, name: &str, numbers: &[f64]) -> f64 {
    let first = numbers.first().copied().unwrap_or(f64::NAN);
    match name {
        "setTime" => date.set_time(first),
        "setYear" => date.set_year(first),
        _ => match field_of(name) {
            Some((field, zone)) if numbers.is_empty() => date.set(field, &[f64::NAN], zone),
            Some((field, zone)) => date.set(field, numbers, zone),
            None => date.time(),
        },
    }
}

fn setter(proxy: &ListeningProxy, name: &str, args: &[Value]) -> Result<Value, ProxyError> {
    let target = proxy.target();
    let date = current(&target).ok_or_else(|| wrong_kind(proxy, name))?;
    let numbers: Vec<f64> = args.iter().map(Value::to_number).collect();

    let whole_date = matches!(name, "setFullYear" | "setUTCFullYear") && args.len() > 1;
    let (was_value, value) = if whole_date {
        let mut next = date;
        apply(&mut next, name, &numbers);
        (
            Value::Object(Object::date(date)),
            Value::Object(Object::date(next)),
        )
    } else {
        let getter = name.replacen("set", "get", 1);
        let was_value = read(&date, &getter).unwrap_or_default();
        let value = match args {
            [only] => only.clone(),
            _ => Value::Undefined,
        };
        (was_value, value)
    };
    let change = Change::new(action(name))
        .value(value)
        .was_value(was_value)
        .arguments(args.to_vec());

    let op = name.to_string();
    let op_target = target.clone();
    let outcome = proxy.change(change, move || {
        let mut data = op_target.borrow_mut();
        let Container::Date(date) = &mut *data else {
            return Ok(Value::Undefined);
        };
        Ok(Value::Number(apply(date, &op, &numbers)))
    })?;
    Ok(outcome.result.unwrap_or_default())
}
