//! Typed handle wrappers over arena indices.

/// Declares a `Copy` handle type wrapping an arena index.
///
/// The raw index stays crate-private so callers can only obtain handles
/// from the owning set.
macro_rules! entity_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub(crate) impulse_arena::Index);

        impl $name {
            /// A handle that never refers to a live entity.
            pub fn invalid() -> Self {
                Self(impulse_arena::Index::invalid())
            }
        }
    };
}

pub(crate) use entity_handle;
