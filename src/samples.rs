//! Small functions for the command line driver and the tests.

use std::sync::Arc;

use crate::{
    ir::{Context, Function, FunctionBuilder, Instruction, Value},
    target::{generic::GenericOpcode, Target},
};

/// `1 - (2 - (3 - ... (depth + 1)))`, with every constant materialized before
/// the first subtraction so that all of them are live at once.
pub fn nested_sub<T: Target>(ctx: Arc<Context>, class: T::Class, depth: usize) -> Function<T> {
    let mut b = FunctionBuilder::<T>::new("nested_sub", ctx);

    let leaves: Vec<_> = (1..=depth as i64 + 1)
        .map(|n| b.emit(GenericOpcode::Copy, class, [Value::Immediate(n)]))
        .collect();

    let mut acc = leaves[depth];
    for &leaf in leaves[..depth].iter().rev() {
        acc = b.emit(GenericOpcode::Sub, class, [leaf.into(), acc.into()]);
    }

    b.push(Instruction::<T>::new(GenericOpcode::Ret).arg(acc));
    b.finish()
}

pub fn nested_sub_result(depth: usize) -> i64 {
    (1..=depth as i64 + 1).rev().fold(None, |acc, n| match acc {
        None => Some(n),
        Some(acc) => Some(n - acc),
    })
    .unwrap_or_default()
}

/// `n + (n - 1) + ... + 1`, as a loop carrying the sum and the counter through
/// block inputs.
pub fn sum<T: Target>(ctx: Arc<Context>, class: T::Class, n: i64) -> Function<T> {
    let mut b = FunctionBuilder::<T>::new("sum", ctx);
    let body = b.block();
    let exit = b.block();

    let count = b.emit(GenericOpcode::Copy, class, [Value::Immediate(n)]);
    let zero = b.emit(GenericOpcode::Copy, class, [Value::Immediate(0)]);
    b.push(
        Instruction::<T>::new(GenericOpcode::Jmp)
            .arg(body)
            .arg(zero)
            .arg(count),
    );

    let acc = b.input(body, class);
    let i = b.input(body, class);
    b.switch_to(body);
    let next_acc = b.emit(GenericOpcode::Add, class, [acc.into(), i.into()]);
    let next_i = b.emit(GenericOpcode::Sub, class, [i.into(), Value::Immediate(1)]);
    b.push(
        Instruction::<T>::new(GenericOpcode::Jnz)
            .arg(next_i)
            .arg(body)
            .arg(next_acc)
            .arg(next_i),
    );
    b.push(Instruction::<T>::new(GenericOpcode::Jmp).arg(exit).arg(next_acc));

    let result = b.input(exit, class);
    b.switch_to(exit);
    b.push(Instruction::<T>::new(GenericOpcode::Ret).arg(result));
    b.finish()
}

pub fn sum_result(n: i64) -> i64 {
    n * (n + 1) / 2
}

/// `(cond != 0 ? cond + 10 : 20) * 2`
pub fn diamond<T: Target>(ctx: Arc<Context>, class: T::Class, cond: i64) -> Function<T> {
    let mut b = FunctionBuilder::<T>::new("diamond", ctx);
    let then = b.block();
    let els = b.block();
    let join = b.block();

    let x = b.emit(GenericOpcode::Copy, class, [Value::Immediate(cond)]);
    b.push(
        Instruction::<T>::new(GenericOpcode::Jnz)
            .arg(x)
            .arg(then)
            .arg(els),
    );

    b.switch_to(then);
    let y = b.emit(GenericOpcode::Add, class, [x.into(), Value::Immediate(10)]);
    b.push(Instruction::<T>::new(GenericOpcode::Jmp).arg(join).arg(y));

    b.switch_to(els);
    b.push(Instruction::<T>::new(GenericOpcode::Jmp).arg(join).arg(20i64));

    let p = b.input(join, class);
    b.switch_to(join);
    let doubled = b.emit(GenericOpcode::Mul, class, [p.into(), Value::Immediate(2)]);
    b.push(Instruction::<T>::new(GenericOpcode::Ret).arg(doubled));
    b.finish()
}

pub fn diamond_result(cond: i64) -> i64 {
    if cond != 0 {
        (cond + 10) * 2
    } else {
        40
    }
}
