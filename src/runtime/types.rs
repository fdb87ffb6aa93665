use crate::language::types::TypeExpr;
use crate::runtime::environment::Env;
use crate::runtime::error::ErrorKind;
use crate::runtime::value::{ChanValue, MapValue, PtrValue, SeqValue, StructValue, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A resolved type descriptor. `Any` is the descriptor of nil values;
/// construction forms reject it.
#[derive(Clone, Debug, PartialEq)]
pub enum TypeDesc {
    Bool,
    Int,
    Float,
    Str,
    Seq(Box<TypeDesc>),
    Map(Box<TypeDesc>),
    Chan(Box<TypeDesc>),
    Ptr(Box<TypeDesc>),
    Struct(Arc<StructType>),
    Any,
}

#[derive(Debug, PartialEq)]
pub struct StructType {
    pub name: String,
    pub fields: Vec<(String, TypeDesc)>,
}

impl TypeDesc {
    pub fn of(value: &Value) -> TypeDesc {
        match value {
            Value::Nil => TypeDesc::Any,
            Value::Bool(_) => TypeDesc::Bool,
            Value::Int(_) => TypeDesc::Int,
            Value::Float(_) => TypeDesc::Float,
            Value::Str(_) => TypeDesc::Str,
            Value::Seq(seq) => TypeDesc::Seq(Box::new(
                seq.elem().cloned().unwrap_or(TypeDesc::Any),
            )),
            Value::Map(_) => TypeDesc::Map(Box::new(TypeDesc::Any)),
            Value::Chan(chan) => TypeDesc::Chan(Box::new(chan.elem().clone())),
            Value::Ptr(ptr) => TypeDesc::Ptr(Box::new(TypeDesc::of(&ptr.get()))),
            Value::Struct(instance) => TypeDesc::Struct(Arc::new(StructType {
                name: instance.name.clone(),
                fields: instance
                    .fields
                    .iter()
                    .map(|(name, field)| (name.clone(), TypeDesc::of(field)))
                    .collect(),
            })),
            Value::Type(desc) => desc.clone(),
            Value::Func(_) | Value::Module(_) | Value::Hosted(_) => TypeDesc::Any,
        }
    }

    pub fn zero_value(&self) -> Result<Value, ErrorKind> {
        Ok(match self {
            TypeDesc::Bool => Value::Bool(false),
            TypeDesc::Int => Value::Int(0),
            TypeDesc::Float => Value::Float(0.0),
            TypeDesc::Str => Value::Str(String::new()),
            TypeDesc::Seq(elem) => Value::Seq(SeqValue::new(Some((**elem).clone()))),
            TypeDesc::Map(_) => Value::Map(MapValue::new()),
            TypeDesc::Chan(elem) => Value::Chan(ChanValue::new(0, (**elem).clone())),
            TypeDesc::Ptr(pointee) => Value::Ptr(PtrValue::new(pointee.zero_value()?)),
            TypeDesc::Struct(def) => {
                let mut fields = BTreeMap::new();
                for (name, field_ty) in &def.fields {
                    fields.insert(name.clone(), field_ty.zero_value()?);
                }
                Value::Struct(StructValue::new(def.name.clone(), fields))
            }
            TypeDesc::Any => Value::Nil,
        })
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDesc::Bool => write!(f, "bool"),
            TypeDesc::Int => write!(f, "int"),
            TypeDesc::Float => write!(f, "float"),
            TypeDesc::Str => write!(f, "string"),
            TypeDesc::Seq(elem) => write!(f, "[]{elem}"),
            TypeDesc::Map(value) => write!(f, "map[{value}]"),
            TypeDesc::Chan(elem) => write!(f, "chan {elem}"),
            TypeDesc::Ptr(pointee) => write!(f, "*{pointee}"),
            TypeDesc::Struct(def) => write!(f, "{}", def.name),
            TypeDesc::Any => write!(f, "any"),
        }
    }
}

/// Resolves a written type against the scope's type registry. The
/// second result counts sequence wrappers in the written form; `make`
/// adds its own extra dimensions on top of these.
pub fn resolve_type(env: &Env, ty: &TypeExpr) -> Result<(TypeDesc, usize), ErrorKind> {
    match ty {
        TypeExpr::Named(path) => {
            let desc = match path.as_slice() {
                [single] => env.lookup_type(single),
                _ => {
                    let joined = path.join(".");
                    let (scope, leaf) = env.resolve_dotted(&joined)?;
                    scope.lookup_type(&leaf)
                }
            };
            match desc {
                Some(desc) => Ok((desc, 0)),
                None => Err(ErrorKind::UndefinedType {
                    name: path.join("."),
                }),
            }
        }
        TypeExpr::Seq(inner) => {
            let (desc, dims) = resolve_type(env, inner)?;
            Ok((desc, dims + 1))
        }
        TypeExpr::Map(inner) => {
            let (desc, dims) = resolve_type(env, inner)?;
            Ok((TypeDesc::Map(Box::new(wrap_dims(desc, dims))), 0))
        }
        TypeExpr::Chan(inner) => {
            let (desc, dims) = resolve_type(env, inner)?;
            Ok((TypeDesc::Chan(Box::new(wrap_dims(desc, dims))), 0))
        }
    }
}

pub fn wrap_dims(mut desc: TypeDesc, dims: usize) -> TypeDesc {
    for _ in 0..dims {
        desc = TypeDesc::Seq(Box::new(desc));
    }
    desc
}
