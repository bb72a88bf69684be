//! Environments: stack-scoped name tables consulted while type-checking
//! and pretty-printing one code fragment (`spec.md` §4.5).
//!
//! An `Environment` is a stack of scopes (innermost last). Resolution
//! walks from the innermost scope outward and fails with
//! `UnknownIdentifier` if no scope binds the name. Adding a binding can
//! also attach an *initialiser list*: source lines that must be emitted
//! before the binding's first use, letting a binding added late in Rust
//! call order still appear textually before the statements that use it.

use std::collections::HashMap;

use crate::types::ResolvedType;
use crate::TranspileError;

/// One name binding: its resolved type, the text it expands to when
/// referenced in printed source, and any initialiser lines that must
/// precede its first use.
#[derive(Debug, Clone)]
pub struct Binding {
    /// Resolved type of the bound name.
    pub ty: ResolvedType,
    /// Text substituted for the identifier in pretty-printed source.
    pub expansion: String,
    /// Source lines to emit once, before this binding's first use.
    pub initializers: Vec<String>,
    /// Whether this name may appear as an assignment target.
    pub writable: bool,
}

impl Binding {
    /// A simple, non-writable alias binding with no initialiser.
    pub fn alias(ty: ResolvedType, expansion: impl Into<String>) -> Self {
        Self { ty, expansion: expansion.into(), initializers: Vec::new(), writable: false }
    }

    /// A writable alias binding (e.g. a field or local-var cache slot).
    pub fn writable_alias(ty: ResolvedType, expansion: impl Into<String>) -> Self {
        Self { ty, expansion: expansion.into(), initializers: Vec::new(), writable: true }
    }

    /// Attach initialiser lines, returning `self` for chaining.
    pub fn with_initializers(mut self, lines: Vec<String>) -> Self {
        self.initializers = lines;
        self
    }
}

/// One scope level: a flat name table.
#[derive(Debug, Default)]
struct Scope {
    bindings: HashMap<String, Binding>,
}

/// A stack of scopes, innermost last. The root scope (index 0) typically
/// holds the names every kernel always exposes (`t`, `dt`, `batch`, …);
/// each nested scope corresponds to one more-specific emission context
/// (a merged group's fields, a local-var cache layer, …).
///
/// This plays the role `spec.md` calls `EnvironmentExternalBase`: the
/// abstract name-resolution surface every concrete layer
/// (`EnvironmentGroupMergedField`, `EnvironmentLocalVarCache`) is built on
/// top of.
#[derive(Debug, Default)]
pub struct Environment {
    scopes: Vec<Scope>,
}

impl Environment {
    /// A fresh environment with one empty root scope.
    pub fn new() -> Self {
        Self { scopes: vec![Scope::default()] }
    }

    /// Push a new, empty inner scope.
    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    /// Pop the innermost scope, returning the bindings it held (callers
    /// use this to know which local-var-cache slots need flushing on
    /// scope exit).
    pub fn pop_scope(&mut self) -> Vec<(String, Binding)> {
        let scope = self.scopes.pop().expect("root scope must never be popped");
        scope.bindings.into_iter().collect()
    }

    /// Bind `name` in the innermost scope. Returns the initialiser lines
    /// attached to the binding, so a caller emitting source in lexical
    /// order can place them correctly even though the binding itself may
    /// be registered after code that will reference it.
    pub fn bind(&mut self, name: impl Into<String>, binding: Binding) -> Vec<String> {
        let initializers = binding.initializers.clone();
        self.scopes
            .last_mut()
            .expect("at least the root scope always exists")
            .bindings
            .insert(name.into(), binding);
        initializers
    }

    /// Resolve `name`, walking from the innermost scope outward.
    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        self.scopes.iter().rev().find_map(|scope| scope.bindings.get(name))
    }

    /// Resolve `name` or fail with `UnknownIdentifier`.
    pub fn resolve(&self, name: &str, context: &str, span: crate::scan::Span) -> Result<&Binding, TranspileError> {
        self.lookup(name).ok_or_else(|| TranspileError::UnknownIdentifier {
            context: context.to_string(),
            span,
            name: name.to_string(),
        })
    }
}

/// One slot in a local-var cache: the first read of a backing field emits
/// a typed local declaration seeded from the array; subsequent reads and
/// writes target the local; on scope exit, if the slot was ever written,
/// its value is flushed back to the backing array (`spec.md` §4.4/§4.6).
#[derive(Debug, Clone)]
pub struct CachedVar {
    /// Local register name (e.g. `lV`).
    pub local_name: String,
    /// Expansion to read the backing array at declaration time and, if
    /// the slot is delay-aware, to read from the *read* delay slot.
    pub read_backing_expansion: String,
    /// Expansion to write the backing array at flush time; for a
    /// delay-aware variable this targets the *write* slot offset, which
    /// may differ from the read offset (`spec.md` §4.1 delay semantics).
    pub write_backing_expansion: String,
    /// Resolved scalar type of the variable.
    pub ty: ResolvedType,
    /// Set once the local has been read or written at least once.
    pub declared: bool,
    /// Set once the local has been assigned to (gates the flush).
    pub written: bool,
}

/// Tracks the "local-var cache" layer described in `spec.md` §4.4/§4.5:
/// register-level aliases for backing-array variables, flushed once per
/// enclosing scope.
#[derive(Debug, Default)]
pub struct LocalVarCache {
    vars: HashMap<String, CachedVar>,
}

impl LocalVarCache {
    /// A fresh, empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a cacheable variable without declaring it yet; the
    /// declaration is emitted lazily on first touch.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        local_name: impl Into<String>,
        read_backing_expansion: impl Into<String>,
        write_backing_expansion: impl Into<String>,
        ty: ResolvedType,
    ) {
        self.vars.insert(
            name.into(),
            CachedVar {
                local_name: local_name.into(),
                read_backing_expansion: read_backing_expansion.into(),
                write_backing_expansion: write_backing_expansion.into(),
                ty,
                declared: false,
                written: false,
            },
        );
    }

    /// Touch `name` for a read or write, returning the declaration line
    /// to emit first (only on the very first touch) and the expansion
    /// text the reference itself should print as.
    pub fn touch(&mut self, name: &str, is_write: bool) -> Option<(Option<String>, String)> {
        let var = self.vars.get_mut(name)?;
        let decl = if !var.declared {
            var.declared = true;
            Some(format!("{} {} = {};", var.ty.spelling(), var.local_name, var.read_backing_expansion))
        } else {
            None
        };
        if is_write {
            var.written = true;
        }
        Some((decl, var.local_name.clone()))
    }

    /// Flush every variable that was written, in registration-stable
    /// (alphabetical) order, emitting `backing = local;` lines that
    /// target the write-slot expansion.
    pub fn flush(&self) -> Vec<String> {
        let mut names: Vec<&String> = self.vars.keys().collect();
        names.sort();
        names
            .into_iter()
            .filter_map(|name| {
                let var = &self.vars[name];
                var.written.then(|| format!("{} = {};", var.write_backing_expansion, var.local_name))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NumericType;

    #[test]
    fn inner_scope_shadows_outer() {
        let mut env = Environment::new();
        env.bind("V", Binding::alias(ResolvedType::Scalar(NumericType::F32), "group.V[idx]"));
        env.push_scope();
        env.bind("V", Binding::alias(ResolvedType::Scalar(NumericType::F32), "lV"));
        assert_eq!(env.lookup("V").unwrap().expansion, "lV");
        env.pop_scope();
        assert_eq!(env.lookup("V").unwrap().expansion, "group.V[idx]");
    }

    #[test]
    fn unresolved_name_is_an_error() {
        let env = Environment::new();
        assert!(env.resolve("nope", "ctx", Default::default()).is_err());
    }

    #[test]
    fn binding_returns_its_initializer_list() {
        let mut env = Environment::new();
        let lines = env.bind(
            "Isyn",
            Binding::alias(ResolvedType::Scalar(NumericType::F32), "linSyn")
                .with_initializers(vec!["float linSyn = inSyn[idx];".into()]),
        );
        assert_eq!(lines, vec!["float linSyn = inSyn[idx];".to_string()]);
    }

    #[test]
    fn local_var_cache_declares_once_and_flushes_only_if_written() {
        let mut cache = LocalVarCache::new();
        cache.register("V", "lV", "group.V[readIdx]", "group.V[writeIdx]", ResolvedType::Scalar(NumericType::F32));

        let (decl, name) = cache.touch("V", false).unwrap();
        assert!(decl.is_some());
        assert_eq!(name, "lV");

        let (decl2, _) = cache.touch("V", true).unwrap();
        assert!(decl2.is_none(), "second touch must not redeclare");

        let flush = cache.flush();
        assert_eq!(flush, vec!["group.V[writeIdx] = lV;".to_string()]);
    }

    #[test]
    fn unwritten_cached_var_does_not_flush() {
        let mut cache = LocalVarCache::new();
        cache.register("V", "lV", "group.V[readIdx]", "group.V[writeIdx]", ResolvedType::Scalar(NumericType::F32));
        cache.touch("V", false);
        assert!(cache.flush().is_empty());
    }
}
