//! Type-checker: walks a parsed statement list, resolving every
//! identifier against an [`Environment`] and rejecting ill-typed or
//! ill-formed fragments (`spec.md` §4.4).
//!
//! Diagnostics are pushed onto an [`ErrorHandler`] rather than returned
//! directly: per the accumulate-then-fail policy, a fragment with errors
//! is abandoned (the caller skips code generation for it) but the pass
//! keeps checking every other fragment before failing overall.

use std::collections::HashMap;

use crate::env::Environment;
use crate::error::ErrorHandler;
use crate::parse::{AssignOp, BinOp, Expr, Stmt, UnaryOp};
use crate::scan::Span;
use crate::types::{NumericType, ResolvedType, TypeContext};
use crate::TranspileError;

/// Signature of one callable function substitution (e.g. `exp`, `min`,
/// `clip`, or a model-supplied support-code function).
#[derive(Debug, Clone)]
pub struct FunctionSignature {
    /// Exact number of positional arguments required.
    pub arity: usize,
    /// Type the call expression resolves to.
    pub return_type: ResolvedType,
}

/// The set of callable functions visible while checking one fragment:
/// backend math intrinsics plus whatever support code the owning model
/// exposes.
#[derive(Debug, Clone, Default)]
pub struct FunctionTable {
    signatures: HashMap<String, FunctionSignature>,
}

impl FunctionTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard math intrinsics every backend is expected to provide,
    /// at the given scalar precision.
    pub fn with_builtin_math(precision: NumericType) -> Self {
        let scalar = ResolvedType::Scalar(precision);
        let mut table = Self::new();
        for name in ["exp", "log", "sqrt", "fabs", "floor", "ceil", "sin", "cos", "tanh"] {
            table.register(name, 1, scalar.clone());
        }
        for name in ["pow", "fmod", "fmin", "fmax"] {
            table.register(name, 2, scalar.clone());
        }
        table.register("clip", 3, scalar.clone());
        table.register("gennrand_uniform", 0, scalar.clone());
        table.register("gennrand_normal", 0, scalar.clone());
        table.register("gennrand_exponential", 0, scalar);
        table.register("addToPost", 1, ResolvedType::Void);
        table.register("addToPre", 1, ResolvedType::Void);
        table.register("addToPostDelay", 2, ResolvedType::Void);
        table.register("injectCurrent", 1, ResolvedType::Void);
        table
    }

    /// Register (or overwrite) one function signature, e.g. a model's
    /// own support-code function.
    pub fn register(&mut self, name: impl Into<String>, arity: usize, return_type: ResolvedType) {
        self.signatures.insert(name.into(), FunctionSignature { arity, return_type });
    }

    /// Look up a function by name.
    pub fn lookup(&self, name: &str) -> Option<&FunctionSignature> {
        self.signatures.get(name)
    }
}

/// Type-check every statement in `stmts` against `env`, recording
/// diagnostics on `errors`. Always returns normally: callers decide
/// whether to abandon the fragment by consulting `errors.has_errors()`
/// afterwards.
pub fn typecheck(
    stmts: &[Stmt],
    env: &mut Environment,
    functions: &FunctionTable,
    ctx: &TypeContext,
    context: &str,
    errors: &mut ErrorHandler,
) {
    for stmt in stmts {
        check_stmt(stmt, env, functions, ctx, context, errors);
    }
}

fn check_stmt(
    stmt: &Stmt,
    env: &mut Environment,
    functions: &FunctionTable,
    ctx: &TypeContext,
    context: &str,
    errors: &mut ErrorHandler,
) {
    match stmt {
        Stmt::Assign(name, op, rhs, span) => {
            let rhs_ty = infer_expr(rhs, env, functions, ctx, context, errors);
            match env.lookup(name) {
                None => errors.push(TranspileError::UnknownIdentifier {
                    context: context.to_string(),
                    span: *span,
                    name: name.clone(),
                }),
                Some(binding) => {
                    if !binding.writable {
                        errors.push(TranspileError::WriteToReadOnly {
                            context: context.to_string(),
                            span: *span,
                            name: name.clone(),
                        });
                    } else if !matches!(op, AssignOp::Assign) && !binding.ty.is_writable() {
                        errors.push(TranspileError::TypeError {
                            context: context.to_string(),
                            span: *span,
                            reason: format!("'{name}' does not support compound assignment"),
                        });
                    } else if !rhs_ty.numerically_compatible_with(&binding.ty) {
                        errors.push(TranspileError::TypeError {
                            context: context.to_string(),
                            span: *span,
                            reason: format!(
                                "cannot assign {rhs_ty} to '{name}' of type {}",
                                binding.ty
                            ),
                        });
                    }
                }
            }
        }
        Stmt::Expr(expr) => {
            infer_expr(expr, env, functions, ctx, context, errors);
        }
        Stmt::If(cond, then_body, else_body) => {
            let cond_ty = infer_expr(cond, env, functions, ctx, context, errors);
            if !matches!(cond_ty, ResolvedType::Bool | ResolvedType::Scalar(_)) {
                errors.push(TranspileError::TypeError {
                    context: context.to_string(),
                    span: expr_span(cond),
                    reason: format!("condition must be boolean or numeric, found {cond_ty}"),
                });
            }
            env.push_scope();
            for stmt in then_body {
                check_stmt(stmt, env, functions, ctx, context, errors);
            }
            env.pop_scope();
            env.push_scope();
            for stmt in else_body {
                check_stmt(stmt, env, functions, ctx, context, errors);
            }
            env.pop_scope();
        }
    }
}

fn infer_expr(
    expr: &Expr,
    env: &Environment,
    functions: &FunctionTable,
    ctx: &TypeContext,
    context: &str,
    errors: &mut ErrorHandler,
) -> ResolvedType {
    match expr {
        Expr::Int(_) => ResolvedType::Scalar(NumericType::I64),
        Expr::Float(_, _) => ctx.scalar_type(),
        Expr::Str(_) => ResolvedType::Void,
        Expr::Ident(name, span) => match env.resolve(name, context, *span) {
            Ok(binding) => binding.ty.clone(),
            Err(err) => {
                errors.push(err);
                ResolvedType::Void
            }
        },
        Expr::Unary(op, inner) => {
            let inner_ty = infer_expr(inner, env, functions, ctx, context, errors);
            match op {
                UnaryOp::Neg => inner_ty,
                UnaryOp::Not => ResolvedType::Bool,
            }
        }
        Expr::Binary(op, lhs, rhs) => {
            let lhs_ty = infer_expr(lhs, env, functions, ctx, context, errors);
            let _rhs_ty = infer_expr(rhs, env, functions, ctx, context, errors);
            match op {
                BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge | BinOp::And | BinOp::Or => {
                    ResolvedType::Bool
                }
                _ => lhs_ty,
            }
        }
        Expr::Ternary(cond, then_val, else_val) => {
            infer_expr(cond, env, functions, ctx, context, errors);
            let then_ty = infer_expr(then_val, env, functions, ctx, context, errors);
            infer_expr(else_val, env, functions, ctx, context, errors);
            then_ty
        }
        Expr::Call(name, args, span) => match functions.lookup(name) {
            None => {
                errors.push(TranspileError::FunctionCall {
                    context: context.to_string(),
                    span: *span,
                    reason: format!("call to unknown function '{name}'"),
                });
                ResolvedType::Void
            }
            Some(sig) => {
                if sig.arity != args.len() {
                    errors.push(TranspileError::FunctionCall {
                        context: context.to_string(),
                        span: *span,
                        reason: format!(
                            "'{name}' expects {} argument(s), found {}",
                            sig.arity,
                            args.len()
                        ),
                    });
                }
                for arg in args {
                    infer_expr(arg, env, functions, ctx, context, errors);
                }
                sig.return_type.clone()
            }
        },
    }
}

fn expr_span(expr: &Expr) -> Span {
    match expr {
        Expr::Ident(_, span) | Expr::Call(_, _, span) => *span,
        Expr::Unary(_, inner) => expr_span(inner),
        Expr::Binary(_, lhs, _) => expr_span(lhs),
        Expr::Ternary(cond, _, _) => expr_span(cond),
        _ => Span::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Binding;
    use crate::parse::parse;
    use crate::scan::scan;

    fn check(src: &str, env: &mut Environment) -> ErrorHandler {
        let toks = scan(src, "test").unwrap();
        let stmts = parse(&toks, "test").unwrap();
        let functions = FunctionTable::with_builtin_math(NumericType::F32);
        let ctx = TypeContext::default();
        let mut errors = ErrorHandler::new();
        typecheck(&stmts, env, &functions, &ctx, "test", &mut errors);
        errors
    }

    #[test]
    fn writing_an_unbound_name_is_unknown_identifier() {
        let mut env = Environment::new();
        let errors = check("V = 0;", &mut env);
        assert!(matches!(errors.diagnostics()[0], TranspileError::UnknownIdentifier { .. }));
    }

    #[test]
    fn writing_a_readonly_capture_is_rejected() {
        let mut env = Environment::new();
        env.bind("V", Binding::alias(ResolvedType::Scalar(NumericType::F32), "group.V[idx]"));
        let errors = check("V = 0.0;", &mut env);
        assert!(matches!(errors.diagnostics()[0], TranspileError::WriteToReadOnly { .. }));
    }

    #[test]
    fn well_typed_assignment_reports_no_errors() {
        let mut env = Environment::new();
        env.bind("V", Binding::writable_alias(ResolvedType::Scalar(NumericType::F32), "lV"));
        env.bind("Isyn", Binding::alias(ResolvedType::Scalar(NumericType::F32), "linSyn"));
        env.bind("tau_m", Binding::alias(ResolvedType::Scalar(NumericType::F32), "group.tau_m"));
        let errors = check("V += (Isyn - V) / tau_m;", &mut env);
        assert!(!errors.has_errors());
    }

    #[test]
    fn unknown_function_call_is_reported() {
        let mut env = Environment::new();
        let errors = check("notAFunction(1, 2);", &mut env);
        assert!(matches!(errors.diagnostics()[0], TranspileError::FunctionCall { .. }));
    }

    #[test]
    fn wrong_arity_call_is_reported() {
        let mut env = Environment::new();
        let errors = check("exp(1, 2);", &mut env);
        assert!(matches!(errors.diagnostics()[0], TranspileError::FunctionCall { .. }));
    }
}
