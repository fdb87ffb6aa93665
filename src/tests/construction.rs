use super::*;
use crate::language::types::TypeExpr;
use crate::runtime::error::ErrorKind;
use crate::runtime::types::TypeDesc;
use crate::runtime::value::{StructValue, Value};
use std::collections::BTreeMap;

#[test]
fn new_returns_a_pointer_to_a_zero_value() {
    let value = eval_ok(new_expr(TypeExpr::named("int")));
    let ptr = match value {
        Value::Ptr(ptr) => ptr,
        other => panic!("expected ptr, got {other:?}"),
    };
    assert!(matches!(ptr.get(), Value::Int(0)));
}

#[test]
fn new_with_an_unknown_type_fails() {
    let err = eval_err(new_expr(TypeExpr::named("nothing")));
    assert!(matches!(err.kind, ErrorKind::UndefinedType { .. }));
}

#[test]
fn make_builds_a_zeroed_sequence_with_the_requested_length() {
    let value = eval_ok(make_expr(TypeExpr::named("int"), 1, Some(int(3)), None));
    let seq = match value {
        Value::Seq(seq) => seq,
        other => panic!("expected seq, got {other:?}"),
    };
    assert_eq!(seq.len(), 3);
    assert!(matches!(seq.get(0).unwrap(), Value::Int(0)));
    assert_eq!(seq.elem(), Some(&TypeDesc::Int));
}

#[test]
fn make_length_defaults_to_zero() {
    let value = eval_ok(make_expr(TypeExpr::named("string"), 1, None, None));
    let seq = match value {
        Value::Seq(seq) => seq,
        other => panic!("expected seq, got {other:?}"),
    };
    assert!(seq.is_empty());
}

#[test]
fn make_extra_dimensions_nest_the_element_type() {
    let value = eval_ok(make_expr(TypeExpr::named("int"), 2, Some(int(2)), None));
    let seq = match value {
        Value::Seq(seq) => seq,
        other => panic!("expected seq, got {other:?}"),
    };
    assert_eq!(seq.len(), 2);
    match seq.get(0).unwrap() {
        Value::Seq(inner) => {
            assert!(inner.is_empty());
            assert_eq!(inner.elem(), Some(&TypeDesc::Int));
        }
        other => panic!("expected nested seq, got {other:?}"),
    }
}

#[test]
fn make_below_one_dimension_falls_back_to_the_zero_value() {
    let value = eval_ok(make_expr(
        TypeExpr::Map(Box::new(TypeExpr::named("int"))),
        0,
        None,
        None,
    ));
    assert!(matches!(value, Value::Map(_)));

    let value = eval_ok(make_expr(
        TypeExpr::Chan(Box::new(TypeExpr::named("int"))),
        0,
        None,
        None,
    ));
    let chan = match value {
        Value::Chan(chan) => chan,
        other => panic!("expected chan, got {other:?}"),
    };
    assert_eq!(chan.capacity(), 0);
}

#[test]
fn typed_sequences_convert_appended_scalars() {
    let env = Env::root();
    eval_in(
        &env,
        let_(ident("a"), make_expr(TypeExpr::named("int"), 1, None, None)),
    )
    .unwrap();
    let value = eval_in(&env, bin("+", ident("a"), num("2.9"))).unwrap();
    let seq = match value {
        Value::Seq(seq) => seq,
        other => panic!("expected seq, got {other:?}"),
    };
    assert!(matches!(seq.get(0).unwrap(), Value::Int(2)));

    let err = eval_in(&env, bin("+", ident("a"), string("x"))).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::InvalidTypeConversion));
}

#[test]
fn make_type_registers_an_alias_for_the_value_type() {
    let env = Env::root();
    eval_in(&env, make_type_expr(string("myint"), int(7))).unwrap();
    let value = eval_in(&env, new_expr(TypeExpr::named("myint"))).unwrap();
    let ptr = match value {
        Value::Ptr(ptr) => ptr,
        other => panic!("expected ptr, got {other:?}"),
    };
    assert!(matches!(ptr.get(), Value::Int(0)));
}

#[test]
fn make_type_resolves_dotted_names_into_modules() {
    let module = Env::root();
    let env = Env::root();
    env.define("util", Value::Module(module.clone()));
    eval_in(&env, make_type_expr(string("util.id"), string("x"))).unwrap();
    assert_eq!(module.lookup_type("id"), Some(TypeDesc::Str));
    // the alias lives in the module, not the outer scope
    assert_eq!(env.lookup_type("id"), None);
}

#[test]
fn new_on_a_registered_struct_type_zeroes_its_fields() {
    let env = Env::root();
    let fields = BTreeMap::from([("x".to_string(), Value::Int(7))]);
    env.define("proto", Value::Struct(StructValue::new("Point", fields)));
    eval_in(&env, make_type_expr(string("Point"), ident("proto"))).unwrap();
    eval_in(&env, let_(ident("p"), new_expr(TypeExpr::named("Point")))).unwrap();
    assert_eq!(as_int(&eval_in(&env, member(ident("p"), "x")).unwrap()), 0);
    eval_in(&env, let_(member(ident("p"), "x"), int(5))).unwrap();
    assert_eq!(as_int(&eval_in(&env, member(ident("p"), "x")).unwrap()), 5);
}

#[test]
fn make_type_of_nil_produces_an_unconstructible_alias() {
    let env = Env::root();
    eval_in(&env, make_type_expr(string("void"), konst("nil"))).unwrap();
    let err = eval_in(&env, new_expr(TypeExpr::named("void"))).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::NilType { what: "new" }));
}

#[test]
fn make_chan_defaults_to_an_unbuffered_channel() {
    let value = eval_ok(make_chan_expr(TypeExpr::named("int"), None));
    let chan = match value {
        Value::Chan(chan) => chan,
        other => panic!("expected chan, got {other:?}"),
    };
    assert_eq!(chan.capacity(), 0);
    assert_eq!(chan.elem(), &TypeDesc::Int);
}

#[test]
fn make_chan_construction_faults_surface_as_errors() {
    let err = eval_err(make_chan_expr(TypeExpr::named("int"), Some(int(-1))));
    assert!(matches!(err.kind, ErrorKind::ChanConstruction { .. }));
}
