use rebound::{EvalError, Value, Vm};

fn eval(vm: &mut Vm, source: &str) -> Value {
    vm.eval_str(source).expect("evaluation succeeds")
}

#[test]
fn stale_break_raises_instead_of_breaking_a_later_loop() {
    let mut vm = Vm::new();
    eval(&mut vm, "saved: _ repeat 1 [saved: :break]");

    let err = vm
        .eval_str("n: 0 repeat 3 [n: n + 1 saved]")
        .expect_err("stale break has no target");
    assert!(err.is_no_matching_target());
    assert_eq!(eval(&mut vm, "n").as_int(), Some(1));

    // The same later loop runs normally without the stale break.
    assert_eq!(eval(&mut vm, "n: 0 repeat 3 [n: n + 1] n").as_int(), Some(3));
}

#[test]
fn stale_continue_from_a_finished_activation_is_rejected() {
    let mut vm = Vm::new();
    let err = vm
        .eval_str(
            "saved: _
             for-each x [1 2] [if x = 2 [saved: :continue]]
             for-each x [1 2] [saved]",
        )
        .expect_err("stale continue has no target");
    assert!(matches!(err, EvalError::NoMatchingTarget { .. }));
}

#[test]
fn control_outside_any_loop_has_no_target() {
    let mut vm = Vm::new();
    for source in ["break", "continue", "continue/with 1", "stop", "return 1"] {
        let err = vm.eval_str(source).expect_err("no enclosing target");
        assert!(err.is_no_matching_target(), "{} gave {:?}", source, err);
    }
}

#[test]
fn break_is_bound_lexically_not_dynamically() {
    let mut vm = Vm::new();
    eval(&mut vm, "f: func [] [break]");
    let err = vm.eval_str("repeat 3 [f]").expect_err("f's break is unbound");
    assert!(err.is_no_matching_target());

    // Defined inside the loop body, the function sees that loop's BREAK.
    assert!(eval(&mut vm, "n: 0 repeat 3 [g: func [] [break] n: n + 1 g]").is_null());
    assert_eq!(eval(&mut vm, "n").as_int(), Some(1));
}

#[test]
fn return_unwinds_through_loops() {
    let mut vm = Vm::new();
    let value = eval(
        &mut vm,
        "find-first: func [data] [for-each x data [if even? x [return x]] null]
         find-first [1 3 6 8]",
    );
    assert_eq!(value.as_int(), Some(6));
    assert!(eval(&mut vm, "find-first [1 3]").is_null());
}

#[test]
fn named_throw_reaches_matching_catch() {
    let mut vm = Vm::new();
    let value = eval(
        &mut vm,
        "catch/name [repeat 10 [catch [throw/name 5 'outer] 1]] 'outer",
    );
    assert_eq!(value.as_int(), Some(5));
    assert_eq!(eval(&mut vm, "catch [repeat 10 [throw 3]]").as_int(), Some(3));
}

#[test]
fn errors_pass_through_loops_to_trap() {
    let mut vm = Vm::new();
    let value = eval(&mut vm, "e: trap [repeat 5 [fail \"boom\"]] error? e");
    assert_eq!(value.to_string(), "true");
    assert!(eval(&mut vm, "trap [repeat 2 [1]]").is_null());

    // A loop never intercepts an error as if it were BREAK.
    let err = vm.eval_str("cycle [1 / 0]").expect_err("error escapes cycle");
    assert!(matches!(err, EvalError::DivideByZero));
}

#[test]
fn evaluator_state_is_clean_after_unwinds() {
    let mut vm = Vm::new();
    let _ = vm.eval_str("repeat 3 [repeat 3 [fail \"x\"]]");
    let _ = vm.eval_str("break");
    assert_eq!(vm.levels.len(), 0);
    assert_eq!(vm.depth(), 0);
    assert_eq!(eval(&mut vm, "1 + 1").as_int(), Some(2));
}
