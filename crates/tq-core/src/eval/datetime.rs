//! Date and time operators. Inputs are Unix epoch seconds; broken-down
//! time is the 8-element array `[year, month(0-11), day, hour, min, sec,
//! wday, yday]` with Sunday as weekday 0.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike, Utc};

use crate::error::{EvalError, EvalResult};
use crate::value::Value;

const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Dispatch a date operator, or `None` when `name` is not in this registry.
pub(super) fn call(
    name: &str,
    input: &Value,
    args: &[Vec<Value>],
) -> Option<EvalResult<Vec<Value>>> {
    let result = match name {
        "now" => Ok(vec![Value::Number(
            Utc::now().timestamp_millis() as f64 / 1000.0,
        )]),
        "gmtime" => gmtime(target(input, args)),
        "mktime" => mktime(target(input, args)),
        "strftime" => strftime(input, args),
        "strptime" => strptime(input, args),
        "todate" | "todateiso8601" => todate(input),
        "fromdate" | "fromdateiso8601" => fromdate(input),
        _ => return None,
    };
    Some(result)
}

/// Operators in this family accept their operand either as an explicit
/// argument or as the piped input.
fn target<'a>(input: &'a Value, args: &'a [Vec<Value>]) -> &'a Value {
    args.first().and_then(|stream| stream.first()).unwrap_or(input)
}

fn epoch_to_datetime(seconds: f64) -> EvalResult<DateTime<Utc>> {
    let secs = seconds.floor() as i64;
    let nanos = ((seconds - seconds.floor()) * 1e9) as u32;
    DateTime::from_timestamp(secs, nanos)
        .ok_or_else(|| EvalError::new("Timestamp out of representable range"))
}

fn gmtime(value: &Value) -> EvalResult<Vec<Value>> {
    let Value::Number(seconds) = value else {
        return Err(EvalError::new(format!(
            "gmtime expects epoch seconds, got {}",
            value.type_name()
        )));
    };
    let dt = epoch_to_datetime(*seconds)?;
    Ok(vec![broken_down(&dt)])
}

fn broken_down(dt: &DateTime<Utc>) -> Value {
    Value::Array(vec![
        Value::Number(dt.year() as f64),
        Value::Number(dt.month0() as f64),
        Value::Number(dt.day() as f64),
        Value::Number(dt.hour() as f64),
        Value::Number(dt.minute() as f64),
        Value::Number(dt.second() as f64),
        Value::Number(dt.weekday().num_days_from_sunday() as f64),
        Value::Number(dt.ordinal0() as f64),
    ])
}

/// Read a broken-down time array back into a UTC datetime. Fields past the
/// first six (wday, yday) are derived, so they are ignored here.
fn datetime_from_parts(value: &Value) -> EvalResult<DateTime<Utc>> {
    let Value::Array(parts) = value else {
        return Err(EvalError::new(format!(
            "Expected a broken-down time array, got {}",
            value.type_name()
        )));
    };
    if parts.len() < 6 {
        return Err(EvalError::new(
            "Broken-down time array needs at least 6 fields",
        ));
    }
    let mut fields = [0i64; 6];
    for (i, slot) in fields.iter_mut().enumerate() {
        match &parts[i] {
            Value::Number(n) => *slot = *n as i64,
            other => {
                return Err(EvalError::new(format!(
                    "Broken-down time field must be a number, got {}",
                    other.type_name()
                )))
            }
        }
    }
    let [year, month0, day, hour, min, sec] = fields;
    let date = NaiveDate::from_ymd_opt(year as i32, month0 as u32 + 1, day as u32)
        .ok_or_else(|| EvalError::new("Invalid calendar date"))?;
    let time = date
        .and_hms_opt(hour as u32, min as u32, sec as u32)
        .ok_or_else(|| EvalError::new("Invalid time of day"))?;
    Ok(DateTime::from_naive_utc_and_offset(time, Utc))
}

fn mktime(value: &Value) -> EvalResult<Vec<Value>> {
    let dt = datetime_from_parts(value)?;
    Ok(vec![Value::Number(dt.timestamp() as f64)])
}

/// `strftime(fmt)` formats the piped input (a broken-down array or epoch
/// seconds); `strftime(fmt; arr)` takes the broken-down array explicitly.
fn strftime(input: &Value, args: &[Vec<Value>]) -> EvalResult<Vec<Value>> {
    let fmt = match args.first().and_then(|stream| stream.first()) {
        Some(Value::String(fmt)) => fmt,
        Some(other) => {
            return Err(EvalError::new(format!(
                "strftime format must be a string, got {}",
                other.type_name()
            )))
        }
        None => return Err(EvalError::new("strftime is missing its format argument")),
    };
    let source = match args.get(1).and_then(|stream| stream.first()) {
        Some(value) => value,
        None => input,
    };
    let dt = match source {
        Value::Number(seconds) => epoch_to_datetime(*seconds)?,
        other => datetime_from_parts(other)?,
    };
    // Validate up front: a bad specifier panics inside DelayedFormat's
    // Display impl otherwise.
    let items: Vec<Item<'_>> = StrftimeItems::new(fmt).collect();
    if items.contains(&Item::Error) {
        return Err(EvalError::new(format!("strftime: invalid format '{}'", fmt)));
    }
    Ok(vec![Value::String(
        dt.format_with_items(items.into_iter()).to_string(),
    )])
}

/// `strptime(s; fmt)` parses a datetime string into a broken-down array;
/// with a single argument the piped input is the string.
fn strptime(input: &Value, args: &[Vec<Value>]) -> EvalResult<Vec<Value>> {
    let (text, fmt) = match args.len() {
        1 => {
            let Value::String(text) = input else {
                return Err(EvalError::new(format!(
                    "strptime expects a string input, got {}",
                    input.type_name()
                )));
            };
            (text.as_str(), expect_string(args, 0, "strptime")?)
        }
        2 => (
            expect_string(args, 0, "strptime")?,
            expect_string(args, 1, "strptime")?,
        ),
        n => {
            return Err(EvalError::new(format!(
                "strptime expects 1 or 2 arguments, got {}",
                n
            )))
        }
    };
    let parsed = NaiveDateTime::parse_from_str(text, fmt)
        .map_err(|e| EvalError::new(format!("strptime: cannot parse '{}': {}", text, e)))?;
    let dt = DateTime::<Utc>::from_naive_utc_and_offset(parsed, Utc);
    Ok(vec![broken_down(&dt)])
}

fn expect_string<'a>(args: &'a [Vec<Value>], index: usize, name: &str) -> EvalResult<&'a str> {
    match args.get(index).and_then(|stream| stream.first()) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(EvalError::new(format!(
            "{} expects a string argument, got {}",
            name,
            other.type_name()
        ))),
        None => Err(EvalError::new(format!(
            "{} is missing argument {}",
            name,
            index + 1
        ))),
    }
}

fn todate(input: &Value) -> EvalResult<Vec<Value>> {
    let Value::Number(seconds) = input else {
        return Err(EvalError::new(format!(
            "todate expects epoch seconds, got {}",
            input.type_name()
        )));
    };
    let dt = epoch_to_datetime(*seconds)?;
    Ok(vec![Value::String(dt.format(ISO_FORMAT).to_string())])
}

fn fromdate(input: &Value) -> EvalResult<Vec<Value>> {
    let Value::String(text) = input else {
        return Err(EvalError::new(format!(
            "fromdate expects an ISO 8601 string, got {}",
            input.type_name()
        )));
    };
    let parsed = NaiveDateTime::parse_from_str(text, ISO_FORMAT)
        .map_err(|e| EvalError::new(format!("fromdate: cannot parse '{}': {}", text, e)))?;
    let dt = DateTime::<Utc>::from_naive_utc_and_offset(parsed, Utc);
    Ok(vec![Value::Number(dt.timestamp() as f64)])
}
