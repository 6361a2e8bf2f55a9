pub mod codegen;
pub mod ir;
pub mod samples;
pub mod target;

mod error;

use std::marker::PhantomData;

use log::{debug, trace};
use thiserror::Error;

use crate::{
    codegen::{phi, reg_alloc, validate::validate},
    ir::Function,
    target::{generic::Generic, x86::X86 as X86Target, Target},
};

pub use crate::{
    codegen::reg_alloc::AllocationSummary,
    error::{AllocationImpossible, MalformedIr, UnsupportedConstruct},
};

pub const GENERIC: PhantomData<Generic> = PhantomData;
pub const X86: PhantomData<X86Target> = PhantomData;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocatorOptions {
    validate: bool,
    eliminate_phis: bool,
    trace_ir: bool,
}

impl Default for AllocatorOptions {
    fn default() -> Self {
        Self {
            validate: true,
            eliminate_phis: true,
            trace_ir: false,
        }
    }
}

impl AllocatorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check the input before touching it. Skipping this on malformed IR gives
    /// unspecified results.
    pub fn validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    /// Phi elimination can be left to the caller. Allocation then fails with
    /// `RemainingPhiInput` on any function whose blocks still take inputs.
    pub fn eliminate_phis(mut self, eliminate_phis: bool) -> Self {
        self.eliminate_phis = eliminate_phis;
        self
    }

    /// Dump the function at `trace` level between passes.
    pub fn trace_ir(mut self, trace_ir: bool) -> Self {
        self.trace_ir = trace_ir;
        self
    }
}

/// Runs validation, phi elimination and register allocation on functions of one
/// target.
#[derive(Debug, Clone)]
pub struct Allocator<T: Target> {
    options: AllocatorOptions,
    _target: PhantomData<T>,
}

impl<T: Target> Allocator<T> {
    pub fn new(#[allow(unused)] target: PhantomData<T>) -> Self {
        Self {
            options: AllocatorOptions::default(),
            _target: PhantomData,
        }
    }

    pub fn with_options(mut self, options: AllocatorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &AllocatorOptions {
        &self.options
    }

    /// Allocate `func` in place.
    ///
    /// The passes work on a copy that replaces `func` only once allocation has
    /// succeeded, so on error `func` is unchanged. Ids handed out by its context
    /// in the meantime are not given back.
    pub fn run(&self, func: &mut Function<T>) -> Result<AllocationSummary, Error> {
        debug!("{}: allocating for {}", func.name, T::NAME);
        self.dump("input", func);

        if self.options.validate {
            validate(func)?;
        }

        let mut work = func.clone();
        if self.options.eliminate_phis {
            phi::eliminate(&mut work)?;
            self.dump("after phi elimination", &work);
        }

        let summary = reg_alloc::allocate(&mut work)?;
        self.dump("allocated", &work);
        *func = work;
        Ok(summary)
    }

    fn dump(&self, stage: &str, func: &Function<T>) {
        if self.options.trace_ir {
            trace!("{}:\n{}", stage, func);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("malformed IR: {0}")]
    MalformedIr(#[from] MalformedIr),

    #[error("unsupported: {0}")]
    UnsupportedConstruct(#[from] UnsupportedConstruct),

    #[error("{0}")]
    AllocationImpossible(#[from] AllocationImpossible),
}
