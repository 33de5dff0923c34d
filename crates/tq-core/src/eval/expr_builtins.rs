//! Expression-parameterised operators.
//!
//! These builtins receive their argument ASTs unevaluated and re-run them —
//! usually once per element of the input array. The per-element key is the
//! *first* value of the argument's stream (an empty stream keys as null for
//! the sorting family and counts as falsey for the predicate family).

use std::collections::BTreeMap;

use crate::ast::Expr;
use crate::error::{EvalError, EvalResult};
use crate::value::Value;

use super::Evaluator;

impl Evaluator {
    /// Dispatch an expression-parameterised operator. Returns `None` when
    /// `name` is not in this registry so the caller can fall through to the
    /// value-parameterised table.
    pub(super) fn eval_expr_builtin(
        &mut self,
        name: &str,
        args: &[Expr],
        input: &Value,
    ) -> Option<EvalResult<Vec<Value>>> {
        let result = match name {
            "map" => self.builtin_map(args, input),
            "select" => self.builtin_select(args, input),
            "sort_by" => self.builtin_sort_by(args, input),
            "unique_by" => self.builtin_unique_by(args, input),
            "group_by" => self.builtin_group_by(args, input),
            "min_by" => self.builtin_extreme_by(args, input, true),
            "max_by" => self.builtin_extreme_by(args, input, false),
            "any" => self.builtin_any_all(args, input, false),
            "all" => self.builtin_any_all(args, input, true),
            "walk" => self.builtin_walk(args, input),
            "limit" => self.builtin_limit(args, input),
            "INDEX" => self.builtin_index_table(args, input),
            _ => return None,
        };
        Some(result)
    }

    fn one_arg<'a>(&self, name: &str, args: &'a [Expr]) -> EvalResult<&'a Expr> {
        match args {
            [arg] => Ok(arg),
            _ => Err(EvalError::new(format!(
                "{} expects 1 argument, got {}",
                name,
                args.len()
            ))),
        }
    }

    fn array_input<'a>(&self, name: &str, input: &'a Value) -> EvalResult<&'a Vec<Value>> {
        input.as_array().ok_or_else(|| {
            EvalError::new(format!("{} requires an array, got {}", name, input.type_name()))
        })
    }

    /// First value of `expr` on `element`, null when the stream is empty.
    fn key_of(&mut self, expr: &Expr, element: &Value) -> EvalResult<Value> {
        let mut values = self.eval(expr, element)?;
        if values.is_empty() {
            Ok(Value::Null)
        } else {
            Ok(values.swap_remove(0))
        }
    }

    fn builtin_map(&mut self, args: &[Expr], input: &Value) -> EvalResult<Vec<Value>> {
        let expr = self.one_arg("map", args)?;
        let arr = self.array_input("map", input)?.clone();
        let mut out = Vec::with_capacity(arr.len());
        for element in &arr {
            out.extend(self.eval(expr, element)?);
        }
        Ok(vec![Value::Array(out)])
    }

    fn builtin_select(&mut self, args: &[Expr], input: &Value) -> EvalResult<Vec<Value>> {
        let expr = self.one_arg("select", args)?;
        let values = self.eval(expr, input)?;
        if values.first().is_some_and(Value::is_truthy) {
            Ok(vec![input.clone()])
        } else {
            Ok(vec![])
        }
    }

    fn builtin_sort_by(&mut self, args: &[Expr], input: &Value) -> EvalResult<Vec<Value>> {
        let expr = self.one_arg("sort_by", args)?;
        let arr = self.array_input("sort_by", input)?.clone();
        let mut keyed = Vec::with_capacity(arr.len());
        for element in arr {
            let key = self.key_of(expr, &element)?;
            keyed.push((key, element));
        }
        keyed.sort_by(|(a, _), (b, _)| a.compare(b));
        Ok(vec![Value::Array(
            keyed.into_iter().map(|(_, v)| v).collect(),
        )])
    }

    fn builtin_unique_by(&mut self, args: &[Expr], input: &Value) -> EvalResult<Vec<Value>> {
        let expr = self.one_arg("unique_by", args)?;
        let arr = self.array_input("unique_by", input)?.clone();
        let mut keyed = Vec::with_capacity(arr.len());
        for element in arr {
            let key = self.key_of(expr, &element)?;
            keyed.push((key, element));
        }
        keyed.sort_by(|(a, _), (b, _)| a.compare(b));
        keyed.dedup_by(|(a, _), (b, _)| a == b);
        Ok(vec![Value::Array(
            keyed.into_iter().map(|(_, v)| v).collect(),
        )])
    }

    /// Stable grouping; the groups are keyed — and ordered — by the
    /// canonical TOON serialization of each key value.
    fn builtin_group_by(&mut self, args: &[Expr], input: &Value) -> EvalResult<Vec<Value>> {
        let expr = self.one_arg("group_by", args)?;
        let arr = self.array_input("group_by", input)?.clone();
        let mut groups: BTreeMap<String, Vec<Value>> = BTreeMap::new();
        for element in arr {
            let key = self.key_of(expr, &element)?;
            groups.entry(key.to_toon()).or_default().push(element);
        }
        Ok(vec![Value::Array(
            groups.into_values().map(Value::Array).collect(),
        )])
    }

    fn builtin_extreme_by(
        &mut self,
        args: &[Expr],
        input: &Value,
        minimum: bool,
    ) -> EvalResult<Vec<Value>> {
        let name = if minimum { "min_by" } else { "max_by" };
        let expr = self.one_arg(name, args)?;
        let arr = self.array_input(name, input)?.clone();

        let mut best: Option<(Value, Value)> = None;
        for element in arr {
            let key = self.key_of(expr, &element)?;
            let better = match &best {
                None => true,
                Some((best_key, _)) => {
                    if minimum {
                        key.compare(best_key).is_lt()
                    } else {
                        key.compare(best_key).is_gt()
                    }
                }
            };
            if better {
                best = Some((key, element));
            }
        }
        Ok(vec![best.map(|(_, v)| v).unwrap_or(Value::Null)])
    }

    fn builtin_any_all(
        &mut self,
        args: &[Expr],
        input: &Value,
        all: bool,
    ) -> EvalResult<Vec<Value>> {
        let name = if all { "all" } else { "any" };
        let expr = self.one_arg(name, args)?;
        let arr = self.array_input(name, input)?.clone();
        for element in &arr {
            let values = self.eval(expr, element)?;
            let truthy = values.first().is_some_and(Value::is_truthy);
            if truthy != all {
                return Ok(vec![Value::Bool(!all)]);
            }
        }
        Ok(vec![Value::Bool(all)])
    }

    /// Post-order: children are transformed first, the container rebuilt,
    /// then the expression applied to the rebuilt value.
    fn builtin_walk(&mut self, args: &[Expr], input: &Value) -> EvalResult<Vec<Value>> {
        let expr = self.one_arg("walk", args)?;
        Ok(vec![self.walk_value(expr, input)?])
    }

    fn walk_value(&mut self, expr: &Expr, value: &Value) -> EvalResult<Value> {
        let rebuilt = match value {
            Value::Array(arr) => {
                let mut out = Vec::with_capacity(arr.len());
                for element in arr {
                    out.push(self.walk_value(expr, element)?);
                }
                Value::Array(out)
            }
            Value::Object(map) => {
                let mut out = BTreeMap::new();
                for (key, child) in map {
                    out.insert(key.clone(), self.walk_value(expr, child)?);
                }
                Value::Object(out)
            }
            other => other.clone(),
        };
        let mut values = self.eval(expr, &rebuilt)?;
        if values.is_empty() {
            return Err(EvalError::new("walk expression produced no values"));
        }
        Ok(values.swap_remove(0))
    }

    /// First `n` outputs of the generator expression.
    fn builtin_limit(&mut self, args: &[Expr], input: &Value) -> EvalResult<Vec<Value>> {
        let [count_expr, generator] = args else {
            return Err(EvalError::new(format!(
                "limit expects 2 arguments, got {}",
                args.len()
            )));
        };
        let count = self.key_of(count_expr, input)?;
        let Value::Number(n) = count else {
            return Err(EvalError::new("limit count must be a number"));
        };
        if n < 0.0 {
            return Err(EvalError::new("limit count must be non-negative"));
        }
        let mut values = self.eval(generator, input)?;
        values.truncate(n as usize);
        Ok(values)
    }

    /// Builds an object keyed by element position. The key expression is
    /// accepted for surface compatibility but not consulted.
    fn builtin_index_table(&mut self, args: &[Expr], input: &Value) -> EvalResult<Vec<Value>> {
        let _ = self.one_arg("INDEX", args)?;
        let arr = self.array_input("INDEX", input)?;
        let map: BTreeMap<String, Value> = arr
            .iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v.clone()))
            .collect();
        Ok(vec![Value::Object(map)])
    }
}
