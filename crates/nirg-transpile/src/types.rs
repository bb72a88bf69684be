//! Resolved type system used by the transpiler's type-checker and printer.
//!
//! This is deliberately small: the embedded model-code DSL only ever talks
//! about a handful of numeric kinds, pointers into backing arrays, and
//! `void`. There is no user-defined type declaration syntax.

use std::fmt;

/// A numeric scalar kind, independent of the model's configured precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NumericType {
    /// 32-bit signed integer.
    I32,
    /// 32-bit unsigned integer.
    U32,
    /// 64-bit signed integer.
    I64,
    /// 64-bit unsigned integer.
    U64,
    /// 32-bit IEEE-754 float.
    F32,
    /// 64-bit IEEE-754 float.
    F64,
}

impl NumericType {
    /// Backend-target source spelling of this numeric kind.
    pub fn spelling(self) -> &'static str {
        match self {
            NumericType::I32 => "int",
            NumericType::U32 => "unsigned int",
            NumericType::I64 => "long long",
            NumericType::U64 => "unsigned long long",
            NumericType::F32 => "float",
            NumericType::F64 => "double",
        }
    }

    /// True if this is one of the floating-point kinds.
    pub fn is_float(self) -> bool {
        matches!(self, NumericType::F32 | NumericType::F64)
    }

    /// True if this is one of the integer kinds.
    pub fn is_integer(self) -> bool {
        !self.is_float()
    }

    /// The narrowest unsigned integer kind able to index `max_value`
    /// distinct elements (used for `narrowSparseInd`: `uint8` when
    /// `numPost <= 255`, `uint16` when `<= 65535`, `uint32` otherwise).
    ///
    /// `nirg-transpile` only expresses this as one of its own numeric
    /// kinds; narrower-than-32-bit storage kinds used for sparse indices
    /// are represented by callers as a distinct `NarrowIndexType` (see
    /// `nirg_ir::connectivity`) because they never appear in emitted
    /// arithmetic expressions, only in array element declarations.
    pub fn widest_safe_for(max_value: u64) -> NumericType {
        if max_value <= u32::MAX as u64 {
            NumericType::U32
        } else {
            NumericType::U64
        }
    }
}

impl fmt::Display for NumericType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.spelling())
    }
}

/// Pointer/const qualification wrapping a scalar type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResolvedType {
    /// `void`: the type of a statement-only code fragment.
    Void,
    /// Plain boolean (used for threshold/event-condition expressions).
    Bool,
    /// A numeric scalar.
    Scalar(NumericType),
    /// A read-only pointer into a backing array (`const T*`).
    ConstPointer(NumericType),
    /// A mutable pointer into a backing array (`T*`).
    MutPointer(NumericType),
}

impl ResolvedType {
    /// The model's configured `scalar` type, per `spec.md` §6 `precision`.
    pub fn scalar(precision: NumericType) -> Self {
        ResolvedType::Scalar(precision)
    }

    /// True if a value of `self` may be used where `expected` is required
    /// under the DSL's numeric-compatibility rule: integer literals widen
    /// to any numeric scalar, float kinds widen float-to-float, and
    /// pointer kinds never implicitly convert.
    pub fn numerically_compatible_with(&self, expected: &ResolvedType) -> bool {
        use ResolvedType::*;
        match (self, expected) {
            (Scalar(a), Scalar(b)) => a.is_float() == b.is_float() || !a.is_float(),
            (Bool, Bool) => true,
            (a, b) if a == b => true,
            _ => false,
        }
    }

    /// True if this type may appear on the left-hand side of an assignment.
    pub fn is_writable(&self) -> bool {
        matches!(self, ResolvedType::Scalar(_) | ResolvedType::MutPointer(_))
    }

    /// Backend-target source spelling.
    pub fn spelling(&self) -> String {
        match self {
            ResolvedType::Void => "void".to_string(),
            ResolvedType::Bool => "bool".to_string(),
            ResolvedType::Scalar(n) => n.spelling().to_string(),
            ResolvedType::ConstPointer(n) => format!("const {}*", n.spelling()),
            ResolvedType::MutPointer(n) => format!("{}*", n.spelling()),
        }
    }
}

impl fmt::Display for ResolvedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.spelling())
    }
}

/// Precision policy in force while type-checking and printing one model:
/// the `scalar` type (`spec.md` `precision`) and the `t`/`sT`/… type
/// (`timePrecision`, defaulting to `scalar` when unset).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeContext {
    /// Numeric kind backing `scalar`.
    pub precision: NumericType,
    /// Numeric kind backing `t`, `sT`, `prevST`, `seT`, `prevSET`.
    pub time_precision: NumericType,
}

impl TypeContext {
    /// Build a type context, defaulting `timePrecision` to `precision`
    /// when `time_precision` is `None` (`spec.md` §6: `timePrecision =
    /// default|float|double`).
    pub fn new(precision: NumericType, time_precision: Option<NumericType>) -> Self {
        Self {
            precision,
            time_precision: time_precision.unwrap_or(precision),
        }
    }

    /// The resolved `scalar` type.
    pub fn scalar_type(&self) -> ResolvedType {
        ResolvedType::Scalar(self.precision)
    }

    /// The resolved time-variable type.
    pub fn time_type(&self) -> ResolvedType {
        ResolvedType::Scalar(self.time_precision)
    }
}

impl Default for TypeContext {
    fn default() -> Self {
        Self::new(NumericType::F32, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_precision_defaults_to_scalar_precision() {
        let ctx = TypeContext::new(NumericType::F64, None);
        assert_eq!(ctx.time_type(), ResolvedType::Scalar(NumericType::F64));
    }

    #[test]
    fn narrow_index_picks_u32_up_to_u32_max() {
        assert_eq!(NumericType::widest_safe_for(255), NumericType::U32);
        assert_eq!(NumericType::widest_safe_for(u32::MAX as u64), NumericType::U32);
        assert_eq!(
            NumericType::widest_safe_for(u32::MAX as u64 + 1),
            NumericType::U64
        );
    }

    #[test]
    fn integer_widens_to_float_scalar() {
        let int_ty = ResolvedType::Scalar(NumericType::I32);
        let float_ty = ResolvedType::Scalar(NumericType::F32);
        assert!(int_ty.numerically_compatible_with(&float_ty));
    }

    #[test]
    fn pointer_kinds_are_writable_only_when_mutable() {
        assert!(ResolvedType::MutPointer(NumericType::F32).is_writable());
        assert!(!ResolvedType::ConstPointer(NumericType::F32).is_writable());
    }
}
