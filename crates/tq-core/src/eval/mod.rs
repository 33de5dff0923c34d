//! Streaming evaluator — AST plus input value to a stream of output values.
//!
//! `eval` returns the full result list for one expression on one input: a
//! possibly-empty, possibly-multi-element `Vec<Value>`. Streams flow only
//! through `|`; every other combinator materialises its operand lists.
//!
//! Runtime failures are [`EvalError`] values propagated with `?`. They
//! unwind to the nearest enclosing `try`, which converts them into the
//! empty stream or runs its `catch` branch on the original input. The only
//! mutable state is the input queue consumed by `input`/`inputs`.

mod builtins;
mod datetime;
mod expr_builtins;
mod format;

use std::collections::{BTreeMap, VecDeque};

use crate::ast::{BinaryOp, Expr, ObjectKey, UnaryOp};
use crate::error::{EvalError, EvalResult};
use crate::value::Value;

pub struct Evaluator {
    inputs: VecDeque<Value>,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    pub fn new() -> Self {
        Evaluator {
            inputs: VecDeque::new(),
        }
    }

    /// Queue values for the `input`/`inputs` operators. The public `query`
    /// API leaves this empty.
    pub fn set_inputs(&mut self, values: Vec<Value>) {
        self.inputs = values.into();
    }

    /// Evaluate `expr` against `input`, producing the output stream.
    pub fn eval(&mut self, expr: &Expr, input: &Value) -> EvalResult<Vec<Value>> {
        match expr {
            Expr::Null => Ok(vec![Value::Null]),
            Expr::Bool(b) => Ok(vec![Value::Bool(*b)]),
            Expr::Number(n) => Ok(vec![Value::Number(*n)]),
            Expr::String(s) => Ok(vec![Value::String(s.clone())]),

            Expr::Identity => Ok(vec![input.clone()]),
            Expr::Field { name, optional } => self.eval_field(name, *optional, input),
            Expr::Index(i) => Ok(eval_index(*i, input)),
            Expr::Slice { start, end } => Ok(eval_slice(*start, *end, input)),
            Expr::Iterator => Ok(eval_iterator(input)),
            Expr::RecursiveDescent => Ok(eval_recursive_descent(input)),

            Expr::Pipe(left, right) => {
                let mut out = Vec::new();
                for value in self.eval(left, input)? {
                    out.extend(self.eval(right, &value)?);
                }
                Ok(out)
            }
            Expr::Comma(left, right) => {
                let mut out = self.eval(left, input)?;
                out.extend(self.eval(right, input)?);
                Ok(out)
            }

            Expr::Binary { op, left, right } => self.eval_binary(*op, left, right, input),
            Expr::Unary { op, operand } => self.eval_unary(*op, operand, input),

            Expr::If {
                cond,
                then_branch,
                elif_branches,
                else_branch,
            } => self.eval_if(cond, then_branch, elif_branches, else_branch.as_deref(), input),

            Expr::Try { body, catch } => match self.eval(body, input) {
                Ok(values) => Ok(values),
                Err(_) => match catch {
                    Some(handler) => self.eval(handler, input),
                    None => Ok(vec![]),
                },
            },

            Expr::ArrayLiteral(elements) => self.eval_array_literal(elements, input),
            Expr::ObjectLiteral(fields) => self.eval_object_literal(fields, input),

            Expr::FunctionCall { name, args } => self.eval_function_call(name, args, input),

            Expr::Format(name) => Ok(vec![format::apply(name, input)?]),

            Expr::Assignment { .. } => Err(EvalError::new(
                "assignment operators are not supported",
            )),
        }
    }

    fn eval_field(&mut self, name: &str, optional: bool, input: &Value) -> EvalResult<Vec<Value>> {
        match input {
            Value::Object(map) => Ok(vec![map.get(name).cloned().unwrap_or(Value::Null)]),
            Value::Null => Ok(vec![Value::Null]),
            other => {
                if optional {
                    Ok(vec![Value::Null])
                } else {
                    Err(EvalError::new(format!(
                        "Cannot access field '{}' of {}",
                        name,
                        other.type_name()
                    )))
                }
            }
        }
    }

    fn eval_binary(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        input: &Value,
    ) -> EvalResult<Vec<Value>> {
        // and/or inspect only the first element of the left stream and
        // short-circuit without touching the right side.
        match op {
            BinaryOp::And => {
                let lhs = self.eval(left, input)?;
                let Some(first) = lhs.first() else {
                    return Ok(vec![]);
                };
                if !first.is_truthy() {
                    return Ok(vec![Value::Bool(false)]);
                }
                let rhs = self.eval(right, input)?;
                let Some(first) = rhs.first() else {
                    return Ok(vec![]);
                };
                return Ok(vec![Value::Bool(first.is_truthy())]);
            }
            BinaryOp::Or => {
                let lhs = self.eval(left, input)?;
                let Some(first) = lhs.first() else {
                    return Ok(vec![]);
                };
                if first.is_truthy() {
                    return Ok(vec![Value::Bool(true)]);
                }
                let rhs = self.eval(right, input)?;
                let Some(first) = rhs.first() else {
                    return Ok(vec![]);
                };
                return Ok(vec![Value::Bool(first.is_truthy())]);
            }
            _ => {}
        }

        let lhs = self.eval(left, input)?;
        let rhs = self.eval(right, input)?;
        let (Some(l), Some(r)) = (lhs.first(), rhs.first()) else {
            // An empty operand stream empties the whole expression.
            return Ok(vec![]);
        };

        let result = match op {
            BinaryOp::Alt => {
                if l.is_truthy() {
                    l.clone()
                } else {
                    r.clone()
                }
            }
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                apply_arithmetic(op, l, r)?
            }
            BinaryOp::Eq => Value::Bool(l == r),
            BinaryOp::NotEq => Value::Bool(l != r),
            BinaryOp::Less => Value::Bool(l.compare(r).is_lt()),
            BinaryOp::LessEq => Value::Bool(l.compare(r).is_le()),
            BinaryOp::Greater => Value::Bool(l.compare(r).is_gt()),
            BinaryOp::GreaterEq => Value::Bool(l.compare(r).is_ge()),
            BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
        };
        Ok(vec![result])
    }

    fn eval_unary(&mut self, op: UnaryOp, operand: &Expr, input: &Value) -> EvalResult<Vec<Value>> {
        let values = self.eval(operand, input)?;
        let Some(first) = values.first() else {
            return Ok(vec![]);
        };
        match op {
            UnaryOp::Not => Ok(vec![Value::Bool(!first.is_truthy())]),
            UnaryOp::Neg => match first {
                Value::Number(n) => Ok(vec![Value::Number(-n)]),
                other => Err(EvalError::new(format!(
                    "Cannot negate {}",
                    other.type_name()
                ))),
            },
        }
    }

    fn eval_if(
        &mut self,
        cond: &Expr,
        then_branch: &Expr,
        elif_branches: &[(Expr, Expr)],
        else_branch: Option<&Expr>,
        input: &Value,
    ) -> EvalResult<Vec<Value>> {
        // An empty condition stream counts as false.
        if self.condition_holds(cond, input)? {
            return self.eval(then_branch, input);
        }
        for (elif_cond, elif_body) in elif_branches {
            if self.condition_holds(elif_cond, input)? {
                return self.eval(elif_body, input);
            }
        }
        match else_branch {
            Some(branch) => self.eval(branch, input),
            None => Ok(vec![]),
        }
    }

    fn condition_holds(&mut self, cond: &Expr, input: &Value) -> EvalResult<bool> {
        let values = self.eval(cond, input)?;
        Ok(values.first().is_some_and(Value::is_truthy))
    }

    /// Array literals take the first value of each element's stream;
    /// elements whose stream is empty are skipped.
    fn eval_array_literal(&mut self, elements: &[Expr], input: &Value) -> EvalResult<Vec<Value>> {
        let mut out = Vec::with_capacity(elements.len());
        for element in elements {
            let mut values = self.eval(element, input)?;
            if !values.is_empty() {
                out.push(values.swap_remove(0));
            }
        }
        Ok(vec![Value::Array(out)])
    }

    fn eval_object_literal(
        &mut self,
        fields: &[(ObjectKey, Expr)],
        input: &Value,
    ) -> EvalResult<Vec<Value>> {
        let mut map = BTreeMap::new();
        for (key, value_expr) in fields {
            let key = match key {
                ObjectKey::Literal(name) => name.clone(),
                ObjectKey::Computed => {
                    return Err(EvalError::new("computed object keys are not supported"))
                }
            };
            let mut values = self.eval(value_expr, input)?;
            if !values.is_empty() {
                // Duplicate keys resolve to the later assignment.
                map.insert(key, values.swap_remove(0));
            }
        }
        Ok(vec![Value::Object(map)])
    }

    fn eval_function_call(
        &mut self,
        name: &str,
        args: &[Expr],
        input: &Value,
    ) -> EvalResult<Vec<Value>> {
        // The frozen input queue contract.
        match name {
            "input" => {
                require_arity(name, args, 0)?;
                return match self.inputs.pop_front() {
                    Some(value) => Ok(vec![value]),
                    None => Err(EvalError::new("No more inputs available")),
                };
            }
            "inputs" => {
                require_arity(name, args, 0)?;
                return Ok(self.inputs.drain(..).collect());
            }
            _ => {}
        }

        // Expression-parameterised operators receive their argument ASTs
        // unevaluated and re-run them per element.
        if let Some(result) = self.eval_expr_builtin(name, args, input) {
            return result;
        }

        // Value-parameterised operators: arguments are evaluated on the
        // current input first; the input itself is the implicit first
        // argument.
        let mut arg_values = Vec::with_capacity(args.len());
        for arg in args {
            arg_values.push(self.eval(arg, input)?);
        }

        if let Some(result) = builtins::call(name, input, &arg_values) {
            return result;
        }
        if let Some(result) = datetime::call(name, input, &arg_values) {
            return result;
        }

        Err(EvalError::new(format!("Unknown function: {}", name)))
    }
}

fn require_arity(name: &str, args: &[Expr], expected: usize) -> EvalResult<()> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(EvalError::new(format!(
            "{} expects {} argument(s), got {}",
            name,
            expected,
            args.len()
        )))
    }
}

fn eval_index(index: i64, input: &Value) -> Vec<Value> {
    let Value::Array(arr) = input else {
        return vec![];
    };
    let len = arr.len() as i64;
    let idx = if index < 0 { len + index } else { index };
    if (0..len).contains(&idx) {
        vec![arr[idx as usize].clone()]
    } else {
        vec![Value::Null]
    }
}

fn eval_slice(start: i64, end: Option<i64>, input: &Value) -> Vec<Value> {
    let Value::Array(arr) = input else {
        return vec![];
    };
    let len = arr.len() as i64;
    let clamp = |bound: i64| -> usize {
        let wrapped = if bound < 0 { len + bound } else { bound };
        wrapped.clamp(0, len) as usize
    };
    let start = clamp(start);
    let end = clamp(end.unwrap_or(len)).max(start);
    vec![Value::Array(arr[start..end].to_vec())]
}

fn eval_iterator(input: &Value) -> Vec<Value> {
    match input {
        Value::Array(arr) => arr.clone(),
        Value::Object(map) => map.values().cloned().collect(),
        _ => vec![],
    }
}

fn eval_recursive_descent(input: &Value) -> Vec<Value> {
    fn recurse(value: &Value, out: &mut Vec<Value>) {
        match value {
            Value::Array(arr) => {
                for element in arr {
                    out.push(element.clone());
                    recurse(element, out);
                }
            }
            Value::Object(map) => {
                for child in map.values() {
                    out.push(child.clone());
                    recurse(child, out);
                }
            }
            _ => {}
        }
    }

    let mut out = vec![input.clone()];
    recurse(input, &mut out);
    out
}

fn apply_arithmetic(op: BinaryOp, left: &Value, right: &Value) -> EvalResult<Value> {
    if op == BinaryOp::Add {
        match (left, right) {
            (Value::String(a), Value::String(b)) => {
                return Ok(Value::String(format!("{}{}", a, b)));
            }
            (Value::Array(a), Value::Array(b)) => {
                let mut out = a.clone();
                out.extend(b.iter().cloned());
                return Ok(Value::Array(out));
            }
            _ => {}
        }
    }

    let (Value::Number(l), Value::Number(r)) = (left, right) else {
        return Err(EvalError::new(format!(
            "Cannot apply arithmetic to {} and {}",
            left.type_name(),
            right.type_name()
        )));
    };

    let result = match op {
        BinaryOp::Add => l + r,
        BinaryOp::Sub => l - r,
        BinaryOp::Mul => l * r,
        BinaryOp::Div => {
            if *r == 0.0 {
                return Err(EvalError::new("Division by zero"));
            }
            l / r
        }
        BinaryOp::Mod => {
            if *r == 0.0 {
                return Err(EvalError::new("Modulo by zero"));
            }
            // Floating remainder keeps the dividend's sign.
            l % r
        }
        _ => unreachable!("non-arithmetic op"),
    };
    Ok(Value::Number(result))
}
