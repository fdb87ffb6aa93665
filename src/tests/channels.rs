use super::*;
use crate::language::types::TypeExpr;
use crate::runtime::error::ErrorKind;
use crate::runtime::types::TypeDesc;
use crate::runtime::value::{ChanValue, Value};
use std::thread;
use std::time::Duration;

#[test]
fn send_then_receive_round_trips_on_a_buffered_channel() {
    let env = Env::root();
    eval_in(
        &env,
        let_(ident("ch"), make_chan_expr(TypeExpr::named("int"), Some(int(1)))),
    )
    .unwrap();
    let sent = eval_in(&env, chan_expr(Some(ident("ch")), int(42))).unwrap();
    assert!(matches!(sent, Value::Nil));
    let received = eval_in(&env, chan_expr(None, ident("ch"))).unwrap();
    assert_eq!(as_int(&received), 42);
}

#[test]
fn receive_blocks_until_a_send_arrives() {
    let chan = ChanValue::new(0, TypeDesc::Int);
    let sender = chan.clone();
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        sender.send(Value::Int(7)).unwrap();
    });
    let env = Env::root();
    env.define("ch", Value::Chan(chan));
    let received = eval_in(&env, chan_expr(None, ident("ch"))).unwrap();
    assert_eq!(as_int(&received), 7);
    handle.join().unwrap();
}

#[test]
fn unbuffered_send_blocks_until_a_receiver_arrives() {
    let chan = ChanValue::new(0, TypeDesc::Int);
    let receiver = chan.clone();
    let handle = thread::spawn(move || receiver.recv().unwrap());
    let env = Env::root();
    env.define("ch", Value::Chan(chan));
    eval_in(&env, chan_expr(Some(ident("ch")), int(9))).unwrap();
    assert_eq!(as_int(&handle.join().unwrap()), 9);
}

#[test]
fn receive_into_a_target_binds_through_the_assignment_path() {
    let env = Env::root();
    env.define("x", Value::Int(0));
    eval_in(
        &env,
        let_(ident("ch"), make_chan_expr(TypeExpr::named("int"), Some(int(1)))),
    )
    .unwrap();
    eval_in(&env, chan_expr(Some(ident("ch")), int(5))).unwrap();
    let result = eval_in(&env, chan_expr(Some(ident("x")), ident("ch"))).unwrap();
    assert_eq!(as_int(&result), 5);
    assert_eq!(as_int(&env.get("x").unwrap()), 5);
}

#[test]
fn channel_values_share_one_queue() {
    let env = Env::root();
    eval_in(
        &env,
        let_(ident("ch"), make_chan_expr(TypeExpr::named("int"), Some(int(1)))),
    )
    .unwrap();
    eval_in(&env, let_(ident("alias"), ident("ch"))).unwrap();
    eval_in(&env, chan_expr(Some(ident("alias")), int(3))).unwrap();
    let received = eval_in(&env, chan_expr(None, ident("ch"))).unwrap();
    assert_eq!(as_int(&received), 3);
}

#[test]
fn chan_operations_without_a_channel_are_invalid() {
    let env = Env::root();
    env.define("x", Value::Int(0));
    let err = eval_in(&env, chan_expr(None, int(1))).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::InvalidChanOperation));
    let err = eval_in(&env, chan_expr(Some(ident("x")), int(1))).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::InvalidChanOperation));
}
