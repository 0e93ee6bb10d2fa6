//! Built-in functions of the expression language.

use super::value::Value;
use crate::error::ExpressionError;
use crate::Color;

pub(super) fn call(name: &str, args: Vec<Value>) -> Result<Value, ExpressionError> {
    let value = match name {
        "atan2" => {
            let [y, x] = numbers::<2>(name, &args)?;
            Value::Number(y.atan2(x))
        }
        "Number" => match args.first() {
            None => Value::Number(0.0),
            Some(Value::String(s)) => Value::Number(leading_number(s)),
            Some(other) => Value::Number(other.to_number()),
        },
        "String" => Value::String(args.first().map(Value::to_string).unwrap_or_default()),
        "Boolean" => Value::Bool(args.first().is_some_and(Value::is_truthy)),
        "isNaN" => Value::Bool(args.first().map_or(f64::NAN, Value::to_number).is_nan()),
        "color" => {
            arity(name, &args, 1, 2)?;
            match &args[0] {
                Value::Color(color) => Value::Color(*color),
                other => Color::parse(&other.to_string())
                    .map(Value::Color)
                    .unwrap_or_else(|| {
                        log::debug!("`{other}` is not a color");
                        Value::Undefined
                    }),
            }
        }
        "rgb" => {
            let [r, g, b] = numbers::<3>(name, &args)?;
            Value::Color(Color::from_rgba(r, g, b, 1.0))
        }
        "rgba" => {
            let [r, g, b, a] = numbers::<4>(name, &args)?;
            Value::Color(Color::from_rgba(r, g, b, a))
        }
        "hsl" => {
            let [h, s, l] = numbers::<3>(name, &args)?;
            Value::Color(Color::from_hsl(h, s, l))
        }
        "hsla" => {
            let [h, s, l, _alpha] = numbers::<4>(name, &args)?;
            Value::Color(Color::from_hsl(h, s, l))
        }
        "abs" => unary(name, &args, f64::abs)?,
        "floor" => unary(name, &args, f64::floor)?,
        "ceil" => unary(name, &args, f64::ceil)?,
        "round" => unary(name, &args, |v| (v + 0.5).floor())?,
        "sqrt" => unary(name, &args, f64::sqrt)?,
        "pow" => {
            let [base, exponent] = numbers::<2>(name, &args)?;
            Value::Number(base.powf(exponent))
        }
        "min" => Value::Number(fold(&args, f64::INFINITY, f64::min)),
        "max" => Value::Number(fold(&args, f64::NEG_INFINITY, f64::max)),
        "clamp" => {
            let [value, low, high] = numbers::<3>(name, &args)?;
            if value.is_nan() || low.is_nan() || high.is_nan() {
                Value::Number(f64::NAN)
            } else {
                Value::Number(value.max(low).min(high))
            }
        }
        _ => return Err(ExpressionError::UnknownFunction(name.to_string())),
    };

    Ok(value)
}

fn arity(name: &str, args: &[Value], min: usize, max: usize) -> Result<(), ExpressionError> {
    if (min..=max).contains(&args.len()) {
        return Ok(());
    }

    Err(ExpressionError::Arity {
        name: name.to_string(),
        expected: if min == max {
            min.to_string()
        } else {
            format!("{min} to {max}")
        },
        found: args.len(),
    })
}

fn numbers<const N: usize>(name: &str, args: &[Value]) -> Result<[f64; N], ExpressionError> {
    arity(name, args, N, N)?;
    let mut values = [0.0; N];
    for (slot, arg) in values.iter_mut().zip(args) {
        *slot = arg.to_number();
    }
    Ok(values)
}

fn unary(name: &str, args: &[Value], f: fn(f64) -> f64) -> Result<Value, ExpressionError> {
    let [value] = numbers::<1>(name, args)?;
    Ok(Value::Number(f(value)))
}

/// `NaN` in any argument makes the result `NaN`.
fn fold(args: &[Value], init: f64, f: fn(f64, f64) -> f64) -> f64 {
    args.iter().map(Value::to_number).fold(init, |acc, v| {
        if acc.is_nan() || v.is_nan() {
            f64::NAN
        } else {
            f(acc, v)
        }
    })
}

/// Parses the longest numeric prefix of the string, ignoring leading whitespace: `"50%"` is 50,
/// `"12.5px"` is 12.5. A string without a numeric prefix is `NaN`.
fn leading_number(s: &str) -> f64 {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    if s[end..].starts_with("Infinity") {
        return if s.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }

    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }
    if s[digits_start..end].trim_start_matches('.').is_empty() {
        return if s.trim().is_empty() { 0.0 } else { f64::NAN };
    }

    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exponent_end = end + 1;
        if exponent_end < bytes.len() && matches!(bytes[exponent_end], b'+' | b'-') {
            exponent_end += 1;
        }
        if exponent_end < bytes.len() && bytes[exponent_end].is_ascii_digit() {
            while exponent_end < bytes.len() && bytes[exponent_end].is_ascii_digit() {
                exponent_end += 1;
            }
            end = exponent_end;
        }
    }

    s[..end].parse().unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use assert_matches::assert_matches;

    fn number(name: &str, args: &[f64]) -> f64 {
        let args = args.iter().copied().map(Value::Number).collect();
        match call(name, args).unwrap() {
            Value::Number(n) => n,
            other => panic!("expected number, got {other:?}"),
        }
    }

    #[test]
    fn number_parses_leading_prefix() {
        assert_eq!(leading_number("50%"), 50.0);
        assert_eq!(leading_number("  -12.5px"), -12.5);
        assert_eq!(leading_number("1e3m"), 1000.0);
        assert_eq!(leading_number("2e"), 2.0);
        assert_eq!(leading_number(".5"), 0.5);
        assert_eq!(leading_number(""), 0.0);
        assert!(leading_number("px").is_nan());
        assert!(leading_number(".").is_nan());
        assert_eq!(leading_number("-Infinity and beyond"), f64::NEG_INFINITY);
    }

    #[test]
    fn math() {
        assert_relative_eq!(number("atan2", &[1.0, 1.0]), std::f64::consts::FRAC_PI_4);
        assert_eq!(number("round", &[2.5]), 3.0);
        assert_eq!(number("round", &[-2.5]), -2.0);
        assert_eq!(number("min", &[3.0, 1.0, 2.0]), 1.0);
        assert_eq!(number("max", &[]), f64::NEG_INFINITY);
        assert!(number("max", &[1.0, f64::NAN]).is_nan());
        assert_eq!(number("clamp", &[15.0, 0.0, 10.0]), 10.0);
        assert!(number("sqrt", &[-1.0]).is_nan());
    }

    #[test]
    fn colors_are_normalized() {
        assert_eq!(
            call("color", vec![Value::from("red")]).unwrap(),
            Value::Color(Color::RED)
        );
        assert_eq!(
            call("rgba", vec![255.0.into(), 0.0.into(), 0.0.into(), 1.0.into()]).unwrap(),
            Value::Color(Color::RED)
        );
        assert_eq!(
            call("color", vec![Value::from("nope")]).unwrap(),
            Value::Undefined
        );
    }

    #[test]
    fn call_errors() {
        assert_matches!(
            call("rgb", vec![Value::Number(1.0)]),
            Err(ExpressionError::Arity { found: 1, .. })
        );
        assert_matches!(
            call("eval", vec![]),
            Err(ExpressionError::UnknownFunction(name)) if name == "eval"
        );
    }
}
