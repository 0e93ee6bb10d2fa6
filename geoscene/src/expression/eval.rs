use super::functions;
use super::parser::{BinaryOp, Expr, UnaryOp};
use super::value::Value;
use crate::error::ExpressionError;

pub(super) fn eval(expr: &Expr) -> Result<Value, ExpressionError> {
    Ok(match expr {
        Expr::Literal(value) => value.clone(),
        Expr::Array(items) => {
            let items = items
                .iter()
                .map(|item| eval(item).map(|v| v.to_json().unwrap_or(serde_json::Value::Null)))
                .collect::<Result<Vec<_>, _>>()?;
            Value::Json(serde_json::Value::Array(items))
        }
        Expr::Object(members) => {
            let mut object = serde_json::Map::new();
            for (key, member) in members {
                if let Some(value) = eval(member)?.to_json() {
                    object.insert(key.clone(), value);
                }
            }
            Value::Json(serde_json::Value::Object(object))
        }
        Expr::Unary(op, operand) => {
            let operand = eval(operand)?;
            match op {
                UnaryOp::Not => Value::Bool(!operand.is_truthy()),
                UnaryOp::Neg => Value::Number(-operand.to_number()),
                UnaryOp::Plus => Value::Number(operand.to_number()),
            }
        }
        Expr::Binary(op, left, right) => binary(*op, &eval(left)?, &eval(right)?),
        Expr::And(left, right) => {
            let left = eval(left)?;
            if left.is_truthy() {
                eval(right)?
            } else {
                left
            }
        }
        Expr::Or(left, right) => {
            let left = eval(left)?;
            if left.is_truthy() {
                left
            } else {
                eval(right)?
            }
        }
        Expr::Conditional(condition, then, otherwise) => {
            if eval(condition)?.is_truthy() {
                eval(then)?
            } else {
                eval(otherwise)?
            }
        }
        Expr::Call(name, args) => {
            let args = args.iter().map(eval).collect::<Result<Vec<_>, _>>()?;
            functions::call(name, args)?
        }
        Expr::Member(target, key) => member(&eval(target)?, &eval(key)?),
    })
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    match op {
        BinaryOp::Add => {
            if left.is_string_like() || right.is_string_like() {
                Value::String(format!("{left}{right}"))
            } else {
                Value::Number(left.to_number() + right.to_number())
            }
        }
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Rem => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::StrictEq => Value::Bool(left.strict_equals(right)),
        BinaryOp::StrictNe => Value::Bool(!left.strict_equals(right)),
        BinaryOp::Eq => Value::Bool(left.loose_equals(right)),
        BinaryOp::Ne => Value::Bool(!left.loose_equals(right)),
        BinaryOp::Lt => compare(left, right, |o| o.is_lt()),
        BinaryOp::Le => compare(left, right, |o| o.is_le()),
        BinaryOp::Gt => compare(left, right, |o| o.is_gt()),
        BinaryOp::Ge => compare(left, right, |o| o.is_ge()),
    }
}

/// Strings compare lexicographically, anything else numerically. Comparisons with `NaN` are false.
fn compare(left: &Value, right: &Value, test: fn(std::cmp::Ordering) -> bool) -> Value {
    let ordering = match (left, right) {
        (Value::String(_) | Value::Color(_), Value::String(_) | Value::Color(_)) => {
            Some(left.to_string().cmp(&right.to_string()))
        }
        _ => left.to_number().partial_cmp(&right.to_number()),
    };

    Value::Bool(ordering.is_some_and(test))
}

fn member(target: &Value, key: &Value) -> Value {
    let key_text = key.to_string();
    match target {
        Value::Json(serde_json::Value::Object(object)) => object
            .get(&key_text)
            .map(Value::from_json)
            .unwrap_or_default(),
        Value::Json(serde_json::Value::Array(items)) => {
            if key_text == "length" {
                return Value::Number(items.len() as f64);
            }
            index(key)
                .and_then(|i| items.get(i))
                .map(Value::from_json)
                .unwrap_or_default()
        }
        Value::String(s) => {
            if key_text == "length" {
                return Value::Number(s.chars().count() as f64);
            }
            index(key)
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::String(c.to_string()))
                .unwrap_or_default()
        }
        _ => Value::Undefined,
    }
}

fn index(key: &Value) -> Option<usize> {
    let n = key.to_number();
    (n.fract() == 0.0 && n >= 0.0).then_some(n as usize)
}

#[cfg(test)]
mod tests {
    use super::super::parser::parse;
    use super::*;

    fn run(source: &str) -> Value {
        eval(&parse(source).unwrap()).unwrap()
    }

    #[test]
    fn arithmetic_follows_float_semantics() {
        assert_eq!(run("1 + 2 * 3"), Value::Number(7.0));
        assert_eq!(run("7 % 4"), Value::Number(3.0));
        assert_eq!(run("1 / 0"), Value::Number(f64::INFINITY));
        assert!(matches!(run("0 / 0"), Value::Number(n) if n.is_nan()));
        assert!(matches!(run("'a' * 2"), Value::Number(n) if n.is_nan()));
    }

    #[test]
    fn plus_concatenates_strings() {
        assert_eq!(run("'a' + 1"), Value::from("a1"));
        assert_eq!(run("1 + 2 + 'px'"), Value::from("3px"));
        assert_eq!(run("'#' + true"), Value::from("#true"));
    }

    #[test]
    fn comparisons() {
        assert_eq!(run("'x' === 'x'"), Value::Bool(true));
        assert_eq!(run("1 === '1'"), Value::Bool(false));
        assert_eq!(run("1 == '1'"), Value::Bool(true));
        assert_eq!(run("'10' < '9'"), Value::Bool(true));
        assert_eq!(run("10 < '9'"), Value::Bool(false));
        assert_eq!(run("NaN >= NaN"), Value::Bool(false));
    }

    #[test]
    fn logical_operators_short_circuit() {
        assert_eq!(run("0 || 'fallback'"), Value::from("fallback"));
        assert_eq!(run("'' && unknownFn()"), Value::from(""));
        assert_eq!(run("!undefined"), Value::Bool(true));
        assert_eq!(run("null ? 1 : 2"), Value::Number(2.0));
    }

    #[test]
    fn member_access() {
        assert_eq!(run("[10, 20][1]"), Value::Number(20.0));
        assert_eq!(run("{a: {b: 'c'}}.a.b"), Value::from("c"));
        assert_eq!(run("'abc'.length"), Value::Number(3.0));
        assert_eq!(run("[1][4]"), Value::Undefined);
    }
}
