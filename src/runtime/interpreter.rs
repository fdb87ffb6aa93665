use crate::language::ast::Expr;
use crate::language::span::Span;
use crate::language::types::TypeExpr;
use crate::runtime::coerce::{to_bool, to_float, to_int, to_text, try_index};
use crate::runtime::environment::Env;
use crate::runtime::error::{ErrorKind, RuntimeResult};
use crate::runtime::types::{resolve_type, wrap_dims, TypeDesc};
use crate::runtime::value::{
    ChanValue, FuncKind, FuncValue, MapKey, MapValue, PtrValue, SeqValue, Value,
};
use std::any::Any;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};

/// Expressions nested deeper than this are rejected instead of letting
/// recursion overflow the stack.
const NESTING_LIMIT: usize = 1000;

/// When `DRIFT_DEBUG` is set (non-empty), construction-time faults
/// propagate as raw panics instead of being converted into errors.
/// Read once for the whole process.
fn raw_faults_enabled() -> bool {
    static FLAG: OnceLock<bool> = OnceLock::new();
    *FLAG.get_or_init(|| {
        std::env::var("DRIFT_DEBUG")
            .map(|v| !v.is_empty())
            .unwrap_or(false)
    })
}

pub struct Interpreter {
    raw_faults: bool,
    depth: Cell<usize>,
}

struct DepthGuard<'a>(&'a Cell<usize>);

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get() - 1);
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self {
            raw_faults: raw_faults_enabled(),
            depth: Cell::new(0),
        }
    }

    pub fn eval(&self, expr: &Expr, env: &Env) -> RuntimeResult<Value> {
        self.eval_expression(expr, env)
    }

    fn eval_expression(&self, expr: &Expr, env: &Env) -> RuntimeResult<Value> {
        let depth = self.depth.get() + 1;
        if depth > NESTING_LIMIT {
            return Err(ErrorKind::TooDeep {
                limit: NESTING_LIMIT,
            }
            .at(expr.span()));
        }
        self.depth.set(depth);
        let _guard = DepthGuard(&self.depth);

        match expr {
            Expr::Number { text, span } => parse_number(text, *span),
            Expr::Str { value, .. } => Ok(Value::Str(value.clone())),
            Expr::Const { text, .. } => Ok(match text.as_str() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => Value::Nil,
            }),
            Expr::Ident { name, span } => {
                env.get(name).ok_or_else(|| {
                    ErrorKind::UndefinedSymbol { name: name.clone() }.at(*span)
                })
            }
            Expr::Array { items, .. } => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval_expression(item, env)?);
                }
                Ok(Value::Seq(SeqValue::from_vec(values, None)))
            }
            Expr::MapLit { entries, .. } => {
                let mut pairs = Vec::with_capacity(entries.len());
                for (key, value_expr) in entries {
                    let value = self.eval_expression(value_expr, env)?;
                    pairs.push((MapKey::str(key.clone()), value));
                }
                Ok(Value::Map(MapValue::from_entries(pairs)))
            }
            Expr::Deref { expr, span } => {
                let located = self.resolve_location(expr, env)?;
                match located {
                    Value::Ptr(ptr) => Ok(ptr.get()),
                    _ => Err(ErrorKind::DerefNonPointer.at(*span)),
                }
            }
            Expr::Addr { expr, span } => match expr.as_ref() {
                Expr::Ident { name, span: ident_span } => match env.get_cell(name) {
                    Some(cell) => Ok(Value::Ptr(PtrValue::from_cell(cell))),
                    None => Err(ErrorKind::UndefinedSymbol { name: name.clone() }.at(*ident_span)),
                },
                Expr::Member { .. } => {
                    // member locations are copies; the address points at a
                    // fresh box, so writes through it do not reach the original
                    let located = self.resolve_location(expr, env)?;
                    Ok(Value::Ptr(PtrValue::new(located)))
                }
                _ => Err(ErrorKind::InvalidOperand.at(*span)),
            },
            Expr::Unary { op, expr, span } => {
                let value = self.eval_expression(expr, env)?;
                match op.as_str() {
                    "-" => Ok(match value {
                        Value::Int(i) => Value::Int(i.wrapping_neg()),
                        Value::Float(f) => Value::Float(-f),
                        other => Value::Float(-to_float(&other)),
                    }),
                    "^" => Ok(Value::Int(!to_int(&value))),
                    "!" => Ok(Value::Bool(!to_bool(&value))),
                    _ => Err(ErrorKind::UnknownOperator { op: op.clone() }.at(*span)),
                }
            }
            Expr::Paren { expr, .. } => self.eval_expression(expr, env),
            Expr::Member { base, name, span } => {
                let value = self.eval_expression(base, env)?;
                self.resolve_member(&value, name, *span)
            }
            Expr::Index { base, index, span } => {
                let value = self.eval_expression(base, env)?;
                let idx = self.eval_expression(index, env)?;
                self.eval_index(&value, &idx, *span)
            }
            Expr::Slice {
                base, begin, end, span,
            } => self.eval_slice(base, begin.as_deref(), end.as_deref(), env, *span),
            Expr::Assoc { lhs, op, rhs, span } => {
                self.eval_assoc(lhs, op, rhs.as_deref(), env, *span)
            }
            Expr::Let { lhs, rhs, .. } => {
                let value = self.eval_expression(rhs, env)?;
                self.assign(lhs, value, env)
            }
            Expr::Lets { lhss, rhss, .. } => {
                let mut values = Vec::with_capacity(rhss.len());
                for rhs in rhss {
                    values.push(self.eval_expression(rhs, env)?);
                }
                let result = values.last().cloned().unwrap_or(Value::Nil);
                for (lhs, value) in lhss.iter().zip(values.into_iter()) {
                    self.assign(lhs, value, env)?;
                }
                Ok(result)
            }
            Expr::Binary {
                op, left, right, span,
            } => self.eval_binary(op, left, right, env, *span),
            Expr::Ternary {
                cond, then, otherwise, ..
            } => {
                let condition = self.eval_expression(cond, env)?;
                if to_bool(&condition) {
                    self.eval_expression(then, env)
                } else {
                    self.eval_expression(otherwise, env)
                }
            }
            Expr::New { ty, span } => {
                let (desc, _) = resolve_type(env, ty).map_err(|k| k.at(*span))?;
                if matches!(desc, TypeDesc::Any) {
                    return Err(ErrorKind::NilType { what: "new" }.at(*span));
                }
                let zero = desc.zero_value().map_err(|k| k.at(*span))?;
                Ok(Value::Ptr(PtrValue::new(zero)))
            }
            Expr::Make {
                ty, dimensions, len, cap, span,
            } => self.eval_make(ty, *dimensions, len.as_deref(), cap.as_deref(), env, *span),
            Expr::MakeType { name, ty, span } => {
                let name_value = self.eval_expression(name, env)?;
                let path = to_text(&name_value);
                let (owner, leaf) = env.resolve_dotted(&path).map_err(|k| k.at(*span))?;
                let type_value = self.eval_expression(ty, &owner)?;
                let desc = TypeDesc::of(&type_value);
                owner.define_type(&leaf, desc.clone());
                Ok(Value::Type(desc))
            }
            Expr::MakeChan { ty, size, span } => {
                let (desc, dims) = resolve_type(env, ty).map_err(|k| k.at(*span))?;
                if matches!(desc, TypeDesc::Any) {
                    return Err(ErrorKind::NilType { what: "make chan" }.at(*span));
                }
                let elem = wrap_dims(desc, dims);
                let size = match size {
                    Some(expr) => to_int(&self.eval_expression(expr, env)?),
                    None => 0,
                };
                self.build_chan(elem, size, *span)
            }
            Expr::Chan { lhs, rhs, span } => self.eval_chan(lhs.as_deref(), rhs, env, *span),
            Expr::Func {
                name, params, body, ..
            } => {
                let func = FuncValue::script(
                    name.clone(),
                    params.clone(),
                    Arc::new((**body).clone()),
                    env.clone(),
                );
                let value = Value::Func(func);
                if let Some(func_name) = name {
                    env.define(func_name, value.clone());
                }
                Ok(value)
            }
            Expr::AnonCall { callee, args, span } => {
                let func = self.eval_expression(callee, env)?;
                let argv = self.eval_arguments(args, env)?;
                self.invoke(func, argv, *span)
            }
            Expr::Call { name, args, span } => {
                let func = env.get(name).ok_or_else(|| {
                    ErrorKind::UndefinedSymbol { name: name.clone() }.at(*span)
                })?;
                let argv = self.eval_arguments(args, env)?;
                self.invoke(func, argv, *span)
            }
        }
    }

    fn eval_arguments(&self, args: &[Expr], env: &Env) -> RuntimeResult<Vec<Value>> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval_expression(arg, env)?);
        }
        Ok(values)
    }

    pub fn invoke(&self, callee: Value, mut args: Vec<Value>, span: Span) -> RuntimeResult<Value> {
        let func = match callee {
            Value::Func(func) => func,
            other => {
                return Err(ErrorKind::NotCallable {
                    kind: other.kind_name(),
                }
                .at(span))
            }
        };
        if let Some(recv) = &func.recv {
            args.insert(0, (**recv).clone());
        }
        match &func.kind {
            FuncKind::Native(f) => f(&args).map_err(|err| {
                if err.span == Span::default() {
                    err.kind.at(span)
                } else {
                    err
                }
            }),
            FuncKind::Script {
                params,
                body,
                env: captured,
            } => {
                if params.len() != args.len() {
                    return Err(ErrorKind::ArityMismatch {
                        name: func.display_name().to_string(),
                        expected: params.len(),
                        received: args.len(),
                    }
                    .at(span));
                }
                let frame = captured.child();
                for (param, value) in params.iter().zip(args.into_iter()) {
                    frame.define(param, value);
                }
                self.eval_expression(body, &frame)
            }
        }
    }

    /// Resolution order: scope embedding, then bound methods, then
    /// (through one pointer indirection) struct fields, then map entries.
    fn resolve_member(&self, base: &Value, name: &str, span: Span) -> RuntimeResult<Value> {
        let base = match base {
            Value::Seq(seq) if !seq.is_empty() => match seq.get(0) {
                Some(Value::Module(scope)) => Value::Module(scope),
                _ => base.clone(),
            },
            other => other.clone(),
        };
        if let Value::Module(scope) = &base {
            return scope.get(name).ok_or_else(|| {
                ErrorKind::InvalidMember {
                    name: name.to_string(),
                }
                .at(span)
            });
        }
        if let Value::Hosted(host) = &base {
            if let Some(method) = host.0.method(name) {
                return Ok(Value::Func(FuncValue::bound(name, method, base.clone())));
            }
        }
        let target = match &base {
            Value::Ptr(ptr) => ptr.get(),
            other => other.clone(),
        };
        match &target {
            Value::Struct(instance) => instance.get_field(name).ok_or_else(|| {
                ErrorKind::NoField {
                    name: name.to_string(),
                }
                .at(span)
            }),
            Value::Map(map) => Ok(map.get(&MapKey::str(name)).unwrap_or(Value::Nil)),
            Value::Hosted(host) => {
                if let Some(value) = host.0.field(name) {
                    return Ok(value);
                }
                if let Some(map) = host.0.as_map() {
                    return Ok(map.get(&MapKey::str(name)).unwrap_or(Value::Nil));
                }
                Err(ErrorKind::UnsupportedOperation {
                    kind: host.0.kind(),
                    op: "member",
                }
                .at(span))
            }
            other => Err(ErrorKind::UnsupportedOperation {
                kind: other.kind_name(),
                op: "member",
            }
            .at(span)),
        }
    }

    // address-of and dereference accept only identifier and member targets
    fn resolve_location(&self, expr: &Expr, env: &Env) -> RuntimeResult<Value> {
        match expr {
            Expr::Ident { name, span } => env.get(name).ok_or_else(|| {
                ErrorKind::UndefinedSymbol { name: name.clone() }.at(*span)
            }),
            Expr::Member { base, name, span } => {
                let value = self.eval_expression(base, env)?;
                self.resolve_member(&value, name, *span)
            }
            other => Err(ErrorKind::InvalidOperand.at(other.span())),
        }
    }

    fn eval_index(&self, value: &Value, index: &Value, span: Span) -> RuntimeResult<Value> {
        match value {
            Value::Str(s) => {
                let i = try_index(index).map_err(|k| k.at(span))?;
                let chars: Vec<char> = s.chars().collect();
                if i < 0 || i as usize >= chars.len() {
                    return Err(ErrorKind::IndexOutOfRange.at(span));
                }
                Ok(Value::Str(chars[i as usize].to_string()))
            }
            Value::Seq(seq) => {
                let i = try_index(index).map_err(|k| k.at(span))?;
                if i < 0 || i as usize >= seq.len() {
                    return Err(ErrorKind::IndexOutOfRange.at(span));
                }
                Ok(seq.get(i as usize).unwrap_or(Value::Nil))
            }
            Value::Map(map) => {
                let key = MapKey::from_value(index).map_err(|k| k.at(span))?;
                Ok(map.get(&key).unwrap_or(Value::Nil))
            }
            Value::Hosted(host) => {
                if let Some(seq) = host.0.as_seq() {
                    return self.eval_index(&Value::Seq(seq), index, span);
                }
                if let Some(map) = host.0.as_map() {
                    return self.eval_index(&Value::Map(map), index, span);
                }
                Err(ErrorKind::UnsupportedOperation {
                    kind: host.0.kind(),
                    op: "index",
                }
                .at(span))
            }
            other => Err(ErrorKind::UnsupportedOperation {
                kind: other.kind_name(),
                op: "index",
            }
            .at(span)),
        }
    }

    fn eval_slice(
        &self,
        base: &Expr,
        begin: Option<&Expr>,
        end: Option<&Expr>,
        env: &Env,
        span: Span,
    ) -> RuntimeResult<Value> {
        let value = self.eval_expression(base, env)?;
        let value = match value {
            Value::Hosted(host) => match host.0.as_seq() {
                Some(seq) => Value::Seq(seq),
                None => {
                    return Err(ErrorKind::UnsupportedOperation {
                        kind: host.0.kind(),
                        op: "slice",
                    }
                    .at(span))
                }
            },
            other => other,
        };
        match &value {
            Value::Str(s) => {
                let chars: Vec<char> = s.chars().collect();
                let (b, e) = self.slice_bounds(begin, end, chars.len(), env, span)?;
                Ok(Value::Str(chars[b..e].iter().collect()))
            }
            Value::Seq(seq) => {
                let (b, e) = self.slice_bounds(begin, end, seq.len(), env, span)?;
                Ok(Value::Seq(seq.view(b, e)))
            }
            other => Err(ErrorKind::UnsupportedOperation {
                kind: other.kind_name(),
                op: "slice",
            }
            .at(span)),
        }
    }

    fn slice_bounds(
        &self,
        begin: Option<&Expr>,
        end: Option<&Expr>,
        len: usize,
        env: &Env,
        span: Span,
    ) -> RuntimeResult<(usize, usize)> {
        let begin_i = match begin {
            Some(expr) => {
                let value = self.eval_expression(expr, env)?;
                try_index(&value).map_err(|k| k.at(span))?
            }
            None => 0,
        };
        if begin_i < 0 || begin_i as usize > len {
            return Err(ErrorKind::IndexOutOfRange.at(span));
        }
        let end_i = match end {
            Some(expr) => {
                let value = self.eval_expression(expr, env)?;
                try_index(&value).map_err(|k| k.at(span))?
            }
            None => len as i64,
        };
        if end_i < 0 || end_i as usize > len {
            return Err(ErrorKind::IndexOutOfRange.at(span));
        }
        if begin_i > end_i {
            return Err(ErrorKind::InvalidSliceRange.at(span));
        }
        Ok((begin_i as usize, end_i as usize))
    }

    fn eval_assoc(
        &self,
        lhs: &Expr,
        op: &str,
        rhs: Option<&Expr>,
        env: &Env,
        span: Span,
    ) -> RuntimeResult<Value> {
        if let Expr::Ident { name, span: ident_span } = lhs {
            if op == "++" || op == "--" {
                let current = env.get(name).ok_or_else(|| {
                    ErrorKind::UndefinedSymbol { name: name.clone() }.at(*ident_span)
                })?;
                let step: i64 = if op == "++" { 1 } else { -1 };
                let next = match current {
                    Value::Float(f) => Value::Float(f + step as f64),
                    Value::Int(i) => Value::Int(i.wrapping_add(step)),
                    // booleans step through their numeric reading: false/true
                    // become 1/2 on ++ and -1/0 on --
                    Value::Bool(b) => Value::Int((if b { 1 } else { 0 }) + step),
                    other => Value::Int(to_int(&other).wrapping_add(step)),
                };
                env.set_value(name, next.clone());
                return Ok(next);
            }
        }
        // a missing right operand is a front-end artifact; it reads as
        // the literal 1 without touching the tree
        let one = Expr::Number {
            text: "1".to_string(),
            span,
        };
        let rhs_expr = rhs.unwrap_or(&one);
        let result = self.eval_binary(&op[..1], lhs, rhs_expr, env, span)?;
        self.assign(lhs, result, env)
    }

    fn assign(&self, lhs: &Expr, value: Value, env: &Env) -> RuntimeResult<Value> {
        match lhs {
            Expr::Ident { name, .. } => {
                env.set_value(name, value.clone());
                Ok(value)
            }
            Expr::Member { base, name, span } => {
                let target = self.eval_expression(base, env)?;
                match target {
                    Value::Ptr(ptr) => {
                        ptr.update(|pointee| match pointee {
                            Value::Struct(instance) => {
                                if instance.set_field(name, value.clone()) {
                                    Ok(())
                                } else {
                                    Err(ErrorKind::NoField { name: name.clone() }.at(*span))
                                }
                            }
                            Value::Map(map) => {
                                map.insert(MapKey::str(name.clone()), value.clone());
                                Ok(())
                            }
                            _ => Err(ErrorKind::NotAssignable { name: name.clone() }.at(*span)),
                        })?;
                        Ok(value)
                    }
                    Value::Map(map) => {
                        map.insert(MapKey::str(name.clone()), value.clone());
                        Ok(value)
                    }
                    Value::Module(scope) => {
                        scope.set_value(name, value.clone());
                        Ok(value)
                    }
                    // records reached by value are copies; writing a field
                    // of one would be silently lost
                    Value::Struct(_) => {
                        Err(ErrorKind::NotAssignable { name: name.clone() }.at(*span))
                    }
                    other => Err(ErrorKind::UnsupportedOperation {
                        kind: other.kind_name(),
                        op: "member",
                    }
                    .at(*span)),
                }
            }
            Expr::Index { base, index, span } => {
                let target = self.eval_expression(base, env)?;
                let idx = self.eval_expression(index, env)?;
                match target {
                    Value::Seq(seq) => {
                        let i = try_index(&idx).map_err(|k| k.at(*span))?;
                        if i < 0 || i as usize >= seq.len() {
                            return Err(ErrorKind::IndexOutOfRange.at(*span));
                        }
                        seq.set(i as usize, value.clone());
                        Ok(value)
                    }
                    Value::Map(map) => {
                        let key = MapKey::from_value(&idx).map_err(|k| k.at(*span))?;
                        map.insert(key, value.clone());
                        Ok(value)
                    }
                    other => Err(ErrorKind::UnsupportedOperation {
                        kind: other.kind_name(),
                        op: "index",
                    }
                    .at(*span)),
                }
            }
            Expr::Deref { expr, span } => {
                let located = self.resolve_location(expr, env)?;
                match located {
                    Value::Ptr(ptr) => {
                        ptr.set(value.clone());
                        Ok(value)
                    }
                    _ => Err(ErrorKind::DerefNonPointer.at(*span)),
                }
            }
            other => Err(ErrorKind::InvalidAssignTarget.at(other.span())),
        }
    }

    fn eval_binary(
        &self,
        op: &str,
        left: &Expr,
        right: &Expr,
        env: &Env,
        span: Span,
    ) -> RuntimeResult<Value> {
        match op {
            "&&" => {
                let lhs = self.eval_expression(left, env)?;
                if to_bool(&lhs) {
                    self.eval_expression(right, env)
                } else {
                    Ok(lhs)
                }
            }
            "||" => {
                let lhs = self.eval_expression(left, env)?;
                if to_bool(&lhs) {
                    Ok(lhs)
                } else {
                    self.eval_expression(right, env)
                }
            }
            _ => {
                let lhs = self.eval_expression(left, env)?;
                let rhs = self.eval_expression(right, env)?;
                self.binary_values(op, lhs, rhs, span)
            }
        }
    }

    fn binary_values(&self, op: &str, lhs: Value, rhs: Value, span: Span) -> RuntimeResult<Value> {
        match op {
            "+" => {
                if let Value::Seq(seq) = &lhs {
                    let mut items = seq.snapshot();
                    match &rhs {
                        Value::Seq(other) => {
                            for item in other.snapshot() {
                                items.push(
                                    convert_for_seq(seq.elem(), item).map_err(|k| k.at(span))?,
                                );
                            }
                        }
                        scalar => items.push(
                            convert_for_seq(seq.elem(), scalar.clone()).map_err(|k| k.at(span))?,
                        ),
                    }
                    return Ok(Value::Seq(SeqValue::from_vec(items, seq.elem().cloned())));
                }
                if matches!(lhs, Value::Str(_)) || matches!(rhs, Value::Str(_)) {
                    return Ok(Value::Str(to_text(&lhs) + &to_text(&rhs)));
                }
                if matches!(lhs, Value::Float(_)) || matches!(rhs, Value::Float(_)) {
                    return Ok(Value::Float(to_float(&lhs) + to_float(&rhs)));
                }
                Ok(Value::Int(to_int(&lhs).wrapping_add(to_int(&rhs))))
            }
            "-" => {
                if matches!(lhs, Value::Float(_)) || matches!(rhs, Value::Float(_)) {
                    return Ok(Value::Float(to_float(&lhs) - to_float(&rhs)));
                }
                Ok(Value::Int(to_int(&lhs).wrapping_sub(to_int(&rhs))))
            }
            "*" => {
                if let (Value::Str(s), Value::Int(n)) = (&lhs, &rhs) {
                    return Ok(Value::Str(s.repeat((*n).max(0) as usize)));
                }
                if matches!(lhs, Value::Float(_)) || matches!(rhs, Value::Float(_)) {
                    return Ok(Value::Float(to_float(&lhs) * to_float(&rhs)));
                }
                Ok(Value::Int(to_int(&lhs).wrapping_mul(to_int(&rhs))))
            }
            "/" => Ok(Value::Float(to_float(&lhs) / to_float(&rhs))),
            "%" => {
                let divisor = to_int(&rhs);
                if divisor == 0 {
                    return Err(ErrorKind::DivisionByZero.at(span));
                }
                Ok(Value::Int(to_int(&lhs).wrapping_rem(divisor)))
            }
            "==" => Ok(Value::Bool(lhs.equals(&rhs))),
            "!=" => Ok(Value::Bool(!lhs.equals(&rhs))),
            ">" => Ok(Value::Bool(to_float(&lhs) > to_float(&rhs))),
            ">=" => Ok(Value::Bool(to_float(&lhs) >= to_float(&rhs))),
            "<" => Ok(Value::Bool(to_float(&lhs) < to_float(&rhs))),
            "<=" => Ok(Value::Bool(to_float(&lhs) <= to_float(&rhs))),
            "|" => Ok(Value::Int(to_int(&lhs) | to_int(&rhs))),
            "&" => Ok(Value::Int(to_int(&lhs) & to_int(&rhs))),
            ">>" => Ok(Value::Int(shift_right(to_int(&lhs), to_int(&rhs) as u64))),
            "<<" => Ok(Value::Int(shift_left(to_int(&lhs), to_int(&rhs) as u64))),
            "**" => {
                if matches!(lhs, Value::Float(_)) || matches!(rhs, Value::Float(_)) {
                    return Ok(Value::Float(to_float(&lhs).powf(to_float(&rhs))));
                }
                Ok(Value::Int(to_float(&lhs).powf(to_float(&rhs)) as i64))
            }
            _ => Err(ErrorKind::UnknownOperator { op: op.to_string() }.at(span)),
        }
    }

    fn eval_make(
        &self,
        ty: &TypeExpr,
        extra_dimensions: usize,
        len: Option<&Expr>,
        cap: Option<&Expr>,
        env: &Env,
        span: Span,
    ) -> RuntimeResult<Value> {
        let (desc, dims) = resolve_type(env, ty).map_err(|k| k.at(span))?;
        if matches!(desc, TypeDesc::Any) {
            return Err(ErrorKind::NilType { what: "make" }.at(span));
        }
        let dimensions = dims + extra_dimensions;
        // every dimension beyond the first nests the element type one
        // level deeper; the outermost level is the sequence built below
        let elem = wrap_dims(desc, dimensions.saturating_sub(1));
        if dimensions < 1 {
            return elem.zero_value().map_err(|k| k.at(span));
        }
        let length = match len {
            Some(expr) => {
                let value = self.eval_expression(expr, env)?;
                usize::try_from(to_int(&value)).unwrap_or(0)
            }
            None => 0,
        };
        let capacity = match cap {
            Some(expr) => {
                let value = self.eval_expression(expr, env)?;
                usize::try_from(to_int(&value)).unwrap_or(0)
            }
            None => length,
        };
        let mut items = Vec::with_capacity(length);
        for _ in 0..length {
            items.push(elem.zero_value().map_err(|k| k.at(span))?);
        }
        Ok(Value::Seq(SeqValue::with_capacity(
            items,
            capacity,
            Some(elem),
        )))
    }

    /// Channel construction runs behind the fault boundary: an underlying
    /// panic is converted into an error unless the debug override is set.
    fn build_chan(&self, elem: TypeDesc, size: i64, span: Span) -> RuntimeResult<Value> {
        if self.raw_faults {
            return Ok(Value::Chan(ChanValue::new(size, elem)));
        }
        match panic::catch_unwind(AssertUnwindSafe(|| ChanValue::new(size, elem))) {
            Ok(chan) => Ok(Value::Chan(chan)),
            Err(payload) => Err(ErrorKind::ChanConstruction {
                message: panic_text(payload),
            }
            .at(span)),
        }
    }

    fn eval_chan(
        &self,
        lhs: Option<&Expr>,
        rhs: &Expr,
        env: &Env,
        span: Span,
    ) -> RuntimeResult<Value> {
        let rhs_value = self.eval_expression(rhs, env)?;
        match lhs {
            None => {
                if let Value::Chan(chan) = rhs_value {
                    // a closed or failed channel reads as the element
                    // type's zero value here
                    return Ok(match chan.recv() {
                        Ok(received) => received,
                        Err(_) => chan.elem().zero_value().unwrap_or(Value::Nil),
                    });
                }
                Err(ErrorKind::InvalidChanOperation.at(span))
            }
            Some(lhs_expr) => {
                let lhs_value = self.eval_expression(lhs_expr, env)?;
                if let Value::Chan(chan) = lhs_value {
                    chan.send(rhs_value)
                        .map_err(|_| ErrorKind::ChanSendFailed.at(span))?;
                    return Ok(Value::Nil);
                }
                if let Value::Chan(chan) = rhs_value {
                    return match chan.recv() {
                        Ok(received) => self.assign(lhs_expr, received, env),
                        Err(_) => Err(ErrorKind::ChanSendFailed.at(span)),
                    };
                }
                Err(ErrorKind::InvalidChanOperation.at(span))
            }
        }
    }
}

fn parse_number(text: &str, span: Span) -> RuntimeResult<Value> {
    if text.contains('.') || text.contains('e') {
        return text
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| {
                ErrorKind::MalformedNumber {
                    text: text.to_string(),
                }
                .at(span)
            });
    }
    let parsed = if let Some(hex) = text.strip_prefix("0x") {
        i64::from_str_radix(hex, 16)
    } else {
        text.parse::<i64>()
    };
    parsed.map(Value::Int).map_err(|_| {
        ErrorKind::MalformedNumber {
            text: text.to_string(),
        }
        .at(span)
    })
}

fn convert_for_seq(elem: Option<&TypeDesc>, value: Value) -> Result<Value, ErrorKind> {
    match elem {
        Some(desc) => convert_value(desc, value),
        None => Ok(value),
    }
}

fn convert_value(desc: &TypeDesc, value: Value) -> Result<Value, ErrorKind> {
    let matching = match (desc, &value) {
        (TypeDesc::Any, _) => true,
        (TypeDesc::Bool, Value::Bool(_)) => true,
        (TypeDesc::Int, Value::Int(_)) => true,
        (TypeDesc::Float, Value::Float(_)) => true,
        (TypeDesc::Str, Value::Str(_)) => true,
        (TypeDesc::Seq(_), Value::Seq(_)) => true,
        (TypeDesc::Map(_), Value::Map(_)) => true,
        (TypeDesc::Chan(_), Value::Chan(_)) => true,
        (TypeDesc::Ptr(_), Value::Ptr(_)) => true,
        (TypeDesc::Struct(_), Value::Struct(_)) => true,
        _ => false,
    };
    if matching {
        return Ok(value);
    }
    match (desc, &value) {
        (TypeDesc::Int, Value::Float(f)) => Ok(Value::Int(*f as i64)),
        (TypeDesc::Float, Value::Int(i)) => Ok(Value::Float(*i as f64)),
        _ => Err(ErrorKind::InvalidTypeConversion),
    }
}

// shift amounts of 64 or more shift every bit out instead of wrapping
fn shift_left(value: i64, amount: u64) -> i64 {
    if amount >= 64 {
        0
    } else {
        ((value as u64) << amount) as i64
    }
}

fn shift_right(value: i64, amount: u64) -> i64 {
    if amount >= 64 {
        if value < 0 {
            -1
        } else {
            0
        }
    } else {
        value >> amount
    }
}

fn panic_text(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "construction fault".to_string()
    }
}
