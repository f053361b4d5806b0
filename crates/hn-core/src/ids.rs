use core::fmt;
use core::num::NonZeroU32;

/// Declares a compact, stable identifier type.
///
/// - `u32` keeps memory small
/// - `NonZero` lets `Option<Id>` stay the size of `Id`
/// - one type per object kind, so a parameter id can never index the variables
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $tag:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(NonZeroU32);

        impl $name {
            /// Create an id from a 0-based index by storing index+1.
            pub fn from_index(index: u32) -> Self {
                match NonZeroU32::new(index.wrapping_add(1)) {
                    Some(v) => Self(v),
                    None => Self(NonZeroU32::MAX),
                }
            }

            /// Recover the 0-based index.
            pub fn index(self) -> u32 {
                self.0.get() - 1
            }

            /// The 0-based index as a `usize`, for slice access.
            pub fn slot(self) -> usize {
                self.index() as usize
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", $tag, self.index())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.index())
            }
        }
    };
}

define_id!(
    /// Algebraic model parameter.
    ParamId,
    "ParamId"
);
define_id!(
    /// Algebraic model decision variable.
    VarId,
    "VarId"
);
define_id!(
    /// Algebraic model equality constraint.
    ConId,
    "ConId"
);
define_id!(
    /// Named, shared sub-expression of an algebraic model.
    ExprId,
    "ExprId"
);
define_id!(
    /// Network node (junction, reservoir or tank).
    NodeId,
    "NodeId"
);
define_id!(
    /// Network link (pipe).
    LinkId,
    "LinkId"
);
