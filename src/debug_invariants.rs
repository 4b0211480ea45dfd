//! Self-checks for the composition data structures.
//!
//! `validate_invariants` is always available and returns the first violation
//! found. `debug_assert_invariants` turns that into a panic, but only in
//! builds that check invariants: `debug_assertions`, or the
//! `check-invariants` / `strict-invariants` features.

use crate::mesh_error::MeshMaterialError;

pub trait DebugInvariants {
    /// First broken invariant, if any.
    fn validate_invariants(&self) -> Result<(), MeshMaterialError>;

    /// Panic with the type name on a broken invariant, in checking builds only.
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(
            self.validate_invariants(),
            "{} invalid",
            std::any::type_name::<Self>()
        );
    }
}

/// Evaluate a `Result`-returning check and panic on `Err` when invariant
/// checking is compiled in. The check is not evaluated otherwise.
#[macro_export]
macro_rules! debug_invariants {
    ($check:expr, $($ctx:tt)+) => {
        #[cfg(any(debug_assertions, feature = "strict-invariants", feature = "check-invariants"))]
        if let Err(err) = $check {
            panic!("[invariants] {}: {}", format_args!($($ctx)+), err);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysBroken;

    impl DebugInvariants for AlwaysBroken {
        fn validate_invariants(&self) -> Result<(), MeshMaterialError> {
            Err(MeshMaterialError::Poisoned)
        }
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "AlwaysBroken invalid")]
    fn default_assertion_names_the_type() {
        AlwaysBroken.debug_assert_invariants();
    }
}
