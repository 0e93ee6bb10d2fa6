use super::lexer::{tokenize, Token};
use super::value::Value;
use crate::error::ExpressionError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) enum UnaryOp {
    Not,
    Neg,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    StrictEq,
    StrictNe,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub(super) enum Expr {
    Literal(Value),
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
    Member(Box<Expr>, Box<Expr>),
}

pub(super) fn parse(source: &str) -> Result<Expr, ExpressionError> {
    let mut parser = Parser {
        tokens: tokenize(source)?,
        pos: 0,
    };

    let expr = parser.conditional()?;
    match parser.peek() {
        None => Ok(expr),
        Some(token) => Err(ExpressionError::Syntax(format!(
            "unexpected {} in `{source}`",
            describe(token)
        ))),
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Number(n) => format!("number {n}"),
        Token::Str(s) => format!("string {s:?}"),
        Token::Ident(name) => format!("identifier `{name}`"),
        Token::Punct(p) => format!("`{p}`"),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat(&mut self, punct: &str) -> bool {
        if matches!(self.peek(), Some(Token::Punct(p)) if *p == punct) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, punct: &str) -> Result<(), ExpressionError> {
        if self.eat(punct) {
            return Ok(());
        }

        Err(ExpressionError::Syntax(match self.peek() {
            Some(token) => format!("expected `{punct}`, found {}", describe(token)),
            None => format!("expected `{punct}`, found end of expression"),
        }))
    }

    fn conditional(&mut self) -> Result<Expr, ExpressionError> {
        let condition = self.or()?;
        if !self.eat("?") {
            return Ok(condition);
        }

        let then = self.conditional()?;
        self.expect(":")?;
        let otherwise = self.conditional()?;
        Ok(Expr::Conditional(
            Box::new(condition),
            Box::new(then),
            Box::new(otherwise),
        ))
    }

    fn or(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.and()?;
        while self.eat("||") {
            left = Expr::Or(Box::new(left), Box::new(self.and()?));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.binary(0)?;
        while self.eat("&&") {
            left = Expr::And(Box::new(left), Box::new(self.binary(0)?));
        }
        Ok(left)
    }

    /// Left-associative binary operators, loosest level first.
    fn binary(&mut self, level: usize) -> Result<Expr, ExpressionError> {
        const LEVELS: [&[(&str, BinaryOp)]; 4] = [
            &[
                ("===", BinaryOp::StrictEq),
                ("!==", BinaryOp::StrictNe),
                ("==", BinaryOp::Eq),
                ("!=", BinaryOp::Ne),
            ],
            &[
                ("<=", BinaryOp::Le),
                (">=", BinaryOp::Ge),
                ("<", BinaryOp::Lt),
                (">", BinaryOp::Gt),
            ],
            &[("+", BinaryOp::Add), ("-", BinaryOp::Sub)],
            &[
                ("*", BinaryOp::Mul),
                ("/", BinaryOp::Div),
                ("%", BinaryOp::Rem),
            ],
        ];

        let Some(operators) = LEVELS.get(level) else {
            return self.unary();
        };

        let mut left = self.binary(level + 1)?;
        'outer: loop {
            for (punct, op) in operators.iter() {
                if self.eat(punct) {
                    let right = self.binary(level + 1)?;
                    left = Expr::Binary(*op, Box::new(left), Box::new(right));
                    continue 'outer;
                }
            }
            return Ok(left);
        }
    }

    fn unary(&mut self) -> Result<Expr, ExpressionError> {
        let op = if self.eat("!") {
            UnaryOp::Not
        } else if self.eat("-") {
            UnaryOp::Neg
        } else if self.eat("+") {
            UnaryOp::Plus
        } else {
            return self.postfix();
        };

        Ok(Expr::Unary(op, Box::new(self.unary()?)))
    }

    fn postfix(&mut self) -> Result<Expr, ExpressionError> {
        let mut expr = self.primary()?;
        loop {
            if self.eat("[") {
                let key = self.conditional()?;
                self.expect("]")?;
                expr = Expr::Member(Box::new(expr), Box::new(key));
            } else if self.eat(".") {
                let Some(Token::Ident(name)) = self.next() else {
                    return Err(ExpressionError::Syntax(
                        "expected a property name after `.`".into(),
                    ));
                };
                expr = Expr::Member(Box::new(expr), Box::new(Expr::Literal(Value::String(name))));
            } else {
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, ExpressionError> {
        let token = self
            .next()
            .ok_or_else(|| ExpressionError::Syntax("unexpected end of expression".into()))?;

        match token {
            Token::Number(n) => Ok(Expr::Literal(Value::Number(n))),
            Token::Str(s) => Ok(Expr::Literal(Value::String(s))),
            Token::Punct("(") => {
                let expr = self.conditional()?;
                self.expect(")")?;
                Ok(expr)
            }
            Token::Punct("[") => {
                let items = self.list("]")?;
                Ok(Expr::Array(items))
            }
            Token::Punct("{") => self.object(),
            Token::Ident(name) => self.identifier(name),
            other => Err(ExpressionError::Syntax(format!(
                "unexpected {}",
                describe(&other)
            ))),
        }
    }

    fn identifier(&mut self, name: String) -> Result<Expr, ExpressionError> {
        if self.eat("(") {
            let args = self.list(")")?;
            return Ok(Expr::Call(name, args));
        }

        let value = match name.as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            "null" => Value::Null,
            "undefined" => Value::Undefined,
            "NaN" => Value::Number(f64::NAN),
            "Infinity" => Value::Number(f64::INFINITY),
            _ => {
                return Err(ExpressionError::Syntax(format!(
                    "unknown identifier `{name}`"
                )))
            }
        };

        Ok(Expr::Literal(value))
    }

    /// Comma separated expressions up to the closing punctuation. A trailing comma is allowed.
    fn list(&mut self, close: &str) -> Result<Vec<Expr>, ExpressionError> {
        let mut items = vec![];
        while !self.eat(close) {
            items.push(self.conditional()?);
            if !self.eat(",") {
                self.expect(close)?;
                break;
            }
        }
        Ok(items)
    }

    fn object(&mut self) -> Result<Expr, ExpressionError> {
        let mut members = vec![];
        while !self.eat("}") {
            let key = match self.next() {
                Some(Token::Str(key)) | Some(Token::Ident(key)) => key,
                Some(other) => {
                    return Err(ExpressionError::Syntax(format!(
                        "unexpected {} in object literal",
                        describe(&other)
                    )))
                }
                None => return Err(ExpressionError::Syntax("unclosed object literal".into())),
            };
            self.expect(":")?;
            members.push((key, self.conditional()?));
            if !self.eat(",") {
                self.expect("}")?;
                break;
            }
        }
        Ok(Expr::Object(members))
    }
}
