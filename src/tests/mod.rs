use crate::language::ast::Expr;
use crate::language::span::Span;
use crate::language::types::TypeExpr;
use crate::runtime::environment::Env;
use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::interpreter::Interpreter;
use crate::runtime::value::Value;

mod channels;
mod construction;

fn sp() -> Span {
    Span::new(0, 0)
}

fn num(text: &str) -> Expr {
    Expr::Number {
        text: text.to_string(),
        span: sp(),
    }
}

fn int(value: i64) -> Expr {
    num(&value.to_string())
}

fn string(value: &str) -> Expr {
    Expr::Str {
        value: value.to_string(),
        span: sp(),
    }
}

fn konst(text: &str) -> Expr {
    Expr::Const {
        text: text.to_string(),
        span: sp(),
    }
}

fn ident(name: &str) -> Expr {
    Expr::Ident {
        name: name.to_string(),
        span: sp(),
    }
}

fn array(items: Vec<Expr>) -> Expr {
    Expr::Array { items, span: sp() }
}

fn map_lit(entries: Vec<(&str, Expr)>) -> Expr {
    Expr::MapLit {
        entries: entries
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect(),
        span: sp(),
    }
}

fn unary(op: &str, expr: Expr) -> Expr {
    Expr::Unary {
        op: op.to_string(),
        expr: Box::new(expr),
        span: sp(),
    }
}

fn bin(op: &str, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op: op.to_string(),
        left: Box::new(left),
        right: Box::new(right),
        span: sp(),
    }
}

fn paren(expr: Expr) -> Expr {
    Expr::Paren {
        expr: Box::new(expr),
        span: sp(),
    }
}

fn ternary(cond: Expr, then: Expr, otherwise: Expr) -> Expr {
    Expr::Ternary {
        cond: Box::new(cond),
        then: Box::new(then),
        otherwise: Box::new(otherwise),
        span: sp(),
    }
}

fn member(base: Expr, name: &str) -> Expr {
    Expr::Member {
        base: Box::new(base),
        name: name.to_string(),
        span: sp(),
    }
}

fn index(base: Expr, idx: Expr) -> Expr {
    Expr::Index {
        base: Box::new(base),
        index: Box::new(idx),
        span: sp(),
    }
}

fn slice_expr(base: Expr, begin: Option<Expr>, end: Option<Expr>) -> Expr {
    Expr::Slice {
        base: Box::new(base),
        begin: begin.map(Box::new),
        end: end.map(Box::new),
        span: sp(),
    }
}

fn assoc(lhs: Expr, op: &str, rhs: Option<Expr>) -> Expr {
    Expr::Assoc {
        lhs: Box::new(lhs),
        op: op.to_string(),
        rhs: rhs.map(Box::new),
        span: sp(),
    }
}

fn let_(lhs: Expr, rhs: Expr) -> Expr {
    Expr::Let {
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
        span: sp(),
    }
}

fn lets(lhss: Vec<Expr>, rhss: Vec<Expr>) -> Expr {
    Expr::Lets {
        lhss,
        rhss,
        span: sp(),
    }
}

fn addr(expr: Expr) -> Expr {
    Expr::Addr {
        expr: Box::new(expr),
        span: sp(),
    }
}

fn deref(expr: Expr) -> Expr {
    Expr::Deref {
        expr: Box::new(expr),
        span: sp(),
    }
}

fn func(name: Option<&str>, params: &[&str], body: Expr) -> Expr {
    Expr::Func {
        name: name.map(|n| n.to_string()),
        params: params.iter().map(|p| p.to_string()).collect(),
        body: Box::new(body),
        span: sp(),
    }
}

fn call(name: &str, args: Vec<Expr>) -> Expr {
    Expr::Call {
        name: name.to_string(),
        args,
        span: sp(),
    }
}

fn anon_call(callee: Expr, args: Vec<Expr>) -> Expr {
    Expr::AnonCall {
        callee: Box::new(callee),
        args,
        span: sp(),
    }
}

fn chan_expr(lhs: Option<Expr>, rhs: Expr) -> Expr {
    Expr::Chan {
        lhs: lhs.map(Box::new),
        rhs: Box::new(rhs),
        span: sp(),
    }
}

fn new_expr(ty: TypeExpr) -> Expr {
    Expr::New { ty, span: sp() }
}

fn make_expr(ty: TypeExpr, dimensions: usize, len: Option<Expr>, cap: Option<Expr>) -> Expr {
    Expr::Make {
        ty,
        dimensions,
        len: len.map(Box::new),
        cap: cap.map(Box::new),
        span: sp(),
    }
}

fn make_type_expr(name: Expr, ty: Expr) -> Expr {
    Expr::MakeType {
        name: Box::new(name),
        ty: Box::new(ty),
        span: sp(),
    }
}

fn make_chan_expr(ty: TypeExpr, size: Option<Expr>) -> Expr {
    Expr::MakeChan {
        ty,
        size: size.map(Box::new),
        span: sp(),
    }
}

fn eval_in(env: &Env, expr: Expr) -> RuntimeResult<Value> {
    Interpreter::new().eval(&expr, env)
}

fn eval_expr(expr: Expr) -> RuntimeResult<Value> {
    eval_in(&Env::root(), expr)
}

fn eval_ok(expr: Expr) -> Value {
    eval_expr(expr).expect("evaluation failed")
}

fn eval_err(expr: Expr) -> RuntimeError {
    eval_expr(expr).expect_err("expected evaluation to fail")
}

fn as_int(value: &Value) -> i64 {
    match value {
        Value::Int(i) => *i,
        other => panic!("expected int, got {other:?}"),
    }
}

fn as_float(value: &Value) -> f64 {
    match value {
        Value::Float(f) => *f,
        other => panic!("expected float, got {other:?}"),
    }
}

fn as_str(value: &Value) -> String {
    match value {
        Value::Str(s) => s.clone(),
        other => panic!("expected string, got {other:?}"),
    }
}

fn as_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        other => panic!("expected bool, got {other:?}"),
    }
}
