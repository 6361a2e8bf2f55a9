use std::{str::FromStr, sync::Arc};

use anyhow::{Context as _, Result};
use clap::Parser;
use eralloc::{
    ir::{Context, Function},
    samples,
    target::{
        generic::{Generic, GenericClass},
        x86::{self, X86Class},
        Target,
    },
    Allocator, AllocatorOptions, GENERIC, X86,
};
use itertools::Itertools;
use log::warn;

#[derive(Parser)]
struct Args {
    #[arg(short, long, default_value = "nested-sub")]
    program: Program,
    #[arg(short, long, default_value = "generic")]
    target: Arch,
    /// Registers available to the generic target.
    #[arg(short, long, default_value_t = 2)]
    registers: u8,
    /// Nesting depth, loop count or branch condition, depending on the program.
    #[arg(short, long, default_value_t = 3)]
    depth: usize,
    #[arg(long)]
    no_validate: bool,
    #[arg(long)]
    trace_ir: bool,
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum Program {
    NestedSub,
    Sum,
    Diamond,
}

impl FromStr for Program {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nested-sub" => Ok(Program::NestedSub),
            "sum" => Ok(Program::Sum),
            "diamond" => Ok(Program::Diamond),
            _ => Err(format!("unknown program {}", s)),
        }
    }
}

impl Program {
    fn build<T: Target>(self, ctx: Arc<Context>, class: T::Class, depth: usize) -> Function<T> {
        match self {
            Program::NestedSub => samples::nested_sub(ctx, class, depth),
            Program::Sum => samples::sum(ctx, class, depth as i64),
            Program::Diamond => samples::diamond(ctx, class, depth as i64),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum Arch {
    Generic,
    X86,
}

impl FromStr for Arch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generic" => Ok(Arch::Generic),
            "x86" => Ok(Arch::X86),
            _ => Err(format!("unknown target {}", s)),
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let options = AllocatorOptions::new()
        .validate(!args.no_validate)
        .trace_ir(args.trace_ir);
    let ctx = Arc::new(Context::new());

    match args.target {
        Arch::Generic => {
            let class = GenericClass::Gpr(args.registers);
            let func = args.program.build::<Generic>(ctx, class, args.depth);
            run(Allocator::new(GENERIC).with_options(options), func)
        }
        Arch::X86 => {
            if args.registers != 2 {
                warn!("--registers is ignored for x86");
            }
            let func = args.program.build::<x86::X86>(ctx, X86Class::Gr32, args.depth);
            run(Allocator::new(X86).with_options(options), func)
        }
    }
}

fn run<T: Target>(allocator: Allocator<T>, mut func: Function<T>) -> Result<()> {
    println!("{}\n", func);

    let summary = allocator
        .run(&mut func)
        .with_context(|| format!("failed to allocate {}", func.name))?;

    println!("{}\n", func);
    println!("rounds: {}", summary.rounds);
    println!("spilled: [{}]", summary.spilled.iter().join(", "));
    println!("frame slots: [{}]", summary.frame_slots.iter().join(", "));
    Ok(())
}
