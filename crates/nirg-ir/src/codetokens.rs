//! `CodeTokens`: a user code fragment, scanned exactly once at IR
//! construction time (`spec.md` §3). Downstream components (fusion,
//! hashing, the kernel emitter) consult `tokens`/`references`, never the
//! raw string, except that the original source is retained for the
//! pretty-printer to re-parse into an AST when it is this fragment's turn
//! to be emitted.

use nirg_transpile::{Token, TokenKind};

use crate::error::{IrError, Result};

/// One scanned code fragment.
#[derive(Debug, Clone)]
pub struct CodeTokens {
    /// Original source text, exactly as supplied.
    pub source: String,
    /// Token stream produced by [`nirg_transpile::scan`].
    pub tokens: Vec<Token>,
}

impl CodeTokens {
    /// Scan `source`, failing with [`IrError::Syntax`] carrying `context`
    /// if the fragment does not even lex.
    pub fn scan(source: impl Into<String>, context: &str) -> Result<Self> {
        let source = source.into();
        let tokens = nirg_transpile::scan(&source, context).map_err(|e| IrError::syntax(context, e))?;
        Ok(Self { source, tokens })
    }

    /// True if any identifier token in this fragment is exactly `name`.
    pub fn references(&self, name: &str) -> bool {
        self.tokens.iter().any(|t| matches!(&t.kind, TokenKind::Ident(n) if n == name))
    }

    /// True if any identifier token in this fragment ends with `suffix`
    /// (used to detect `<var>_pre` / `<var>_post` delayed-access forms).
    pub fn has_identifier_with_suffix(&self, suffix: &str) -> bool {
        self.tokens
            .iter()
            .any(|t| matches!(&t.kind, TokenKind::Ident(n) if n.ends_with(suffix) && n.len() > suffix.len()))
    }

    /// Every identifier token's name ending with `suffix`, with the
    /// suffix stripped, deduplicated.
    pub fn identifiers_with_suffix_stripped(&self, suffix: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .tokens
            .iter()
            .filter_map(|t| match &t.kind {
                TokenKind::Ident(n) if n.ends_with(suffix) && n.len() > suffix.len() => {
                    Some(n[..n.len() - suffix.len()].to_string())
                }
                _ => None,
            })
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_failure_carries_context() {
        let err = CodeTokens::scan("\"unterminated", "neuron group 'N' sim code").unwrap_err();
        assert!(matches!(err, IrError::Syntax { context, .. } if context == "neuron group 'N' sim code"));
    }

    #[test]
    fn detects_delayed_pre_suffixed_identifiers() {
        let code = CodeTokens::scan("addToPost(g * V_pre);", "ctx").unwrap();
        assert!(code.has_identifier_with_suffix("_pre"));
        assert_eq!(code.identifiers_with_suffix_stripped("_pre"), vec!["V".to_string()]);
    }
}
