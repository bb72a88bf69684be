//! Kernel emitter (`spec.md` §4.6): stitches merged groups, fused
//! consumers, and code fragments into backend-target source text.

pub mod init;
pub mod neuron;
pub mod synapse;

use nirg_ir::{CodeTokens, Model};
use nirg_transpile::{print_fragment, typecheck, Environment, ErrorHandler, FunctionTable, LocalVarCache, NumericType, TypeContext};

pub use init::emit_init_kernel;
pub use neuron::emit_neuron_update_kernel;
pub use synapse::emit_presynaptic_update_kernel;

/// Shared per-pass state: the scalar/time precision policy and the
/// function table every fragment in this model is checked against.
pub(crate) struct EmitContext {
    pub precision: NumericType,
    pub type_context: TypeContext,
    pub functions: FunctionTable,
}

impl EmitContext {
    pub fn new(model: &Model) -> Self {
        let type_context = TypeContext::new(model.config.precision, Some(model.config.time_precision));
        let functions = FunctionTable::with_builtin_math(model.config.precision);
        Self { precision: model.config.precision, type_context, functions }
    }

    /// The suffix a literal constant of this model's scalar precision
    /// must carry (`"f"` for `float`, none for `double`).
    pub fn literal_suffix(&self) -> &'static str {
        match self.precision {
            NumericType::F32 => "f",
            _ => "",
        }
    }

    /// Parse, type-check, and print one fragment. Parse failures and
    /// type-check diagnostics are both pushed onto `errors` rather than
    /// failing immediately (`spec.md` §4.4 accumulate-then-fail); a
    /// fragment that fails prints as an empty string so the surrounding
    /// kernel text stays structurally well-formed for the other
    /// fragments still being collected.
    pub fn emit(
        &self,
        code: &CodeTokens,
        context: &str,
        env: &mut Environment,
        cache: &mut LocalVarCache,
        indent: usize,
        errors: &mut ErrorHandler,
    ) -> String {
        let stmts = match nirg_transpile::parse(&code.tokens, context) {
            Ok(stmts) => stmts,
            Err(err) => {
                errors.push(err);
                return String::new();
            }
        };
        typecheck(&stmts, env, &self.functions, &self.type_context, context, errors);
        print_fragment(&stmts, env, cache, indent)
    }
}
