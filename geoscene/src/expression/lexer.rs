use crate::error::ExpressionError;

#[derive(Debug, Clone, PartialEq)]
pub(super) enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    Punct(&'static str),
}

/// Longest operators first so that `===` is not read as `==` followed by `=`.
const PUNCTUATION: [&str; 26] = [
    "===", "!==", "==", "!=", "<=", ">=", "&&", "||", "(", ")", "[", "]", "{", "}", ",", "?", ":",
    "!", "+", "-", "*", "/", "%", "<", ">", ".",
];

pub(super) fn tokenize(source: &str) -> Result<Vec<Token>, ExpressionError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = vec![];
    let mut pos = 0;

    while pos < chars.len() {
        let c = chars[pos];
        if c.is_whitespace() {
            pos += 1;
            continue;
        }

        if c.is_ascii_digit() || (c == '.' && chars.get(pos + 1).is_some_and(char::is_ascii_digit))
        {
            tokens.push(Token::Number(read_number(&chars, &mut pos)?));
            continue;
        }

        if c == '\'' || c == '"' {
            tokens.push(Token::Str(read_string(&chars, &mut pos)?));
            continue;
        }

        if c.is_alphabetic() || c == '_' || c == '$' {
            let start = pos;
            while pos < chars.len()
                && (chars[pos].is_alphanumeric() || chars[pos] == '_' || chars[pos] == '$')
            {
                pos += 1;
            }
            tokens.push(Token::Ident(chars[start..pos].iter().collect()));
            continue;
        }

        let punct = PUNCTUATION.iter().find(|p| {
            p.chars()
                .enumerate()
                .all(|(i, pc)| chars.get(pos + i) == Some(&pc))
        });
        match punct {
            Some(&p) => {
                pos += p.len();
                tokens.push(Token::Punct(p));
            }
            None => {
                return Err(ExpressionError::Syntax(format!(
                    "unexpected character `{c}` at {pos}"
                )))
            }
        }
    }

    Ok(tokens)
}

fn read_number(chars: &[char], pos: &mut usize) -> Result<f64, ExpressionError> {
    let start = *pos;
    while *pos < chars.len() && (chars[*pos].is_ascii_digit() || chars[*pos] == '.') {
        *pos += 1;
    }
    if *pos < chars.len() && (chars[*pos] == 'e' || chars[*pos] == 'E') {
        let mut lookahead = *pos + 1;
        if lookahead < chars.len() && (chars[lookahead] == '+' || chars[lookahead] == '-') {
            lookahead += 1;
        }
        if chars.get(lookahead).is_some_and(char::is_ascii_digit) {
            *pos = lookahead;
            while *pos < chars.len() && chars[*pos].is_ascii_digit() {
                *pos += 1;
            }
        }
    }

    let text: String = chars[start..*pos].iter().collect();
    text.parse()
        .map_err(|_| ExpressionError::Syntax(format!("invalid number `{text}`")))
}

fn read_string(chars: &[char], pos: &mut usize) -> Result<String, ExpressionError> {
    let quote = chars[*pos];
    *pos += 1;
    let mut value = String::new();

    while *pos < chars.len() {
        let c = chars[*pos];
        *pos += 1;
        match c {
            c if c == quote => return Ok(value),
            '\\' => {
                let escaped = *chars
                    .get(*pos)
                    .ok_or_else(|| ExpressionError::Syntax("unterminated string".into()))?;
                *pos += 1;
                match escaped {
                    'n' => value.push('\n'),
                    't' => value.push('\t'),
                    'r' => value.push('\r'),
                    'b' => value.push('\u{8}'),
                    'f' => value.push('\u{c}'),
                    'u' => {
                        let code: String =
                            chars.get(*pos..*pos + 4).unwrap_or_default().iter().collect();
                        let decoded = u32::from_str_radix(&code, 16)
                            .ok()
                            .and_then(char::from_u32)
                            .ok_or_else(|| {
                                ExpressionError::Syntax(format!("invalid escape `\\u{code}`"))
                            })?;
                        *pos += 4;
                        value.push(decoded);
                    }
                    other => value.push(other),
                }
            }
            other => value.push(other),
        }
    }

    Err(ExpressionError::Syntax("unterminated string".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn operators_are_greedy() {
        let tokens = tokenize("a===b!=c<=1").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Ident("a".into()),
                Token::Punct("==="),
                Token::Ident("b".into()),
                Token::Punct("!="),
                Token::Ident("c".into()),
                Token::Punct("<="),
                Token::Number(1.0),
            ]
        );
    }

    #[test]
    fn numbers() {
        assert_eq!(
            tokenize(".5 1e3 2E-2").unwrap(),
            vec![Token::Number(0.5), Token::Number(1000.0), Token::Number(0.02)]
        );
        assert_matches!(tokenize("1.2.3"), Err(ExpressionError::Syntax(_)));
    }

    #[test]
    fn strings_with_escapes() {
        assert_eq!(
            tokenize(r#"'it\'s' "a\"bA""#).unwrap(),
            vec![Token::Str("it's".into()), Token::Str("a\"bA".into())]
        );
        assert_matches!(tokenize("'open"), Err(ExpressionError::Syntax(_)));
        assert_matches!(tokenize("a # b"), Err(ExpressionError::Syntax(_)));
    }
}
