//! Scan, parse, type-check and pretty-print the small embedded DSL that
//! model-code fragments (sim code, threshold conditions, reset code,
//! postsynaptic current-injection code, …) are written in.
//!
//! This crate has no dependency on the rest of the workspace: it knows
//! nothing about neuron groups, synapse groups, or merged groups, only
//! about tokens, expressions, statements, types, and named environments.
//! Higher layers (`nirg_ir`, `nirg_codegen`) drive this pipeline by
//! constructing an [`env::Environment`] that exposes the names a
//! particular fragment is allowed to reference and feeding its source
//! through [`scan::scan`] → [`parse::parse`] → [`typecheck::typecheck`] →
//! [`print::print_fragment`].

pub mod env;
pub mod error;
pub mod parse;
pub mod print;
pub mod scan;
pub mod typecheck;
pub mod types;

pub use env::{Binding, Environment, LocalVarCache};
pub use error::{ErrorHandler, Result, TranspileError};
pub use parse::{parse, AssignOp, BinOp, Expr, Stmt, UnaryOp};
pub use print::print_fragment;
pub use scan::{scan, Span, Token, TokenKind};
pub use typecheck::{typecheck, FunctionSignature, FunctionTable};
pub use types::{NumericType, ResolvedType, TypeContext};

/// Run the full scan → parse → type-check pipeline over one fragment,
/// returning its checked statements. Diagnostics from type-checking are
/// accumulated on `errors` rather than failing immediately; scan and
/// parse errors are returned directly since a fragment that doesn't even
/// parse can't be type-checked at all.
pub fn compile_fragment(
    source: &str,
    context: &str,
    env: &mut Environment,
    functions: &typecheck::FunctionTable,
    ctx: &TypeContext,
    errors: &mut ErrorHandler,
) -> Result<Vec<Stmt>> {
    let tokens = scan::scan(source, context)?;
    let stmts = parse::parse(&tokens, context)?;
    typecheck::typecheck(&stmts, env, functions, ctx, context, errors);
    Ok(stmts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_fragment_runs_the_full_pipeline() {
        let mut env = Environment::new();
        env.bind("V", Binding::writable_alias(ResolvedType::Scalar(NumericType::F32), "lV"));
        let functions = FunctionTable::with_builtin_math(NumericType::F32);
        let ctx = TypeContext::default();
        let mut errors = ErrorHandler::new();
        let stmts = compile_fragment("V = 0.0;", "test", &mut env, &functions, &ctx, &mut errors).unwrap();
        assert_eq!(stmts.len(), 1);
        assert!(!errors.has_errors());
    }
}
