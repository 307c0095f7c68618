//! Proptest generators for property-based testing.

use proptest::prelude::*;

/// Package names used by [`op`]. Kept small so operations collide.
pub const PACKAGES: &[&str] = &["left-pad", "pkg-a", "pkg-b"];

/// Identities used by [`op`].
pub const IDENTITIES: &[&str] = &["dev@example.com", "alice@x.com", "bob@x.com"];

/// Generate a valid package name.
pub fn package_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9._-]{0,63}".prop_map(String::from)
}

/// Generate a valid identity.
pub fn identity() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9.]{0,15}@[a-z]{1,12}\\.(com|org|dev)".prop_map(String::from)
}

/// Generate a TTL in seconds, including zero.
pub fn ttl_seconds() -> impl Strategy<Value = i64> {
    prop_oneof![
        1 => Just(0i64),
        4 => 1i64..=600,
        1 => 600i64..=30 * 24 * 3600,
    ]
}

/// One registry operation over the fixed name pools.
#[derive(Debug, Clone)]
pub enum Op {
    Grant {
        package: usize,
        identity: usize,
        ttl_seconds: i64,
    },
    Revoke {
        package: usize,
        identity: usize,
    },
    Check {
        package: usize,
        identity: usize,
    },
    Advance {
        secs: i64,
    },
    Reset,
}

impl Op {
    /// The (package, identity) pair the op touches, if any.
    pub fn pair(&self) -> Option<(&'static str, &'static str)> {
        match *self {
            Op::Grant { package, identity, .. }
            | Op::Revoke { package, identity }
            | Op::Check { package, identity } => Some((PACKAGES[package], IDENTITIES[identity])),
            Op::Advance { .. } | Op::Reset => None,
        }
    }
}

/// Generate a single operation.
pub fn op() -> impl Strategy<Value = Op> {
    let package = 0..PACKAGES.len();
    let identity = 0..IDENTITIES.len();
    prop_oneof![
        3 => (package.clone(), identity.clone(), ttl_seconds()).prop_map(
            |(package, identity, ttl_seconds)| Op::Grant { package, identity, ttl_seconds }
        ),
        2 => (package.clone(), identity.clone())
            .prop_map(|(package, identity)| Op::Revoke { package, identity }),
        3 => (package, identity).prop_map(|(package, identity)| Op::Check { package, identity }),
        2 => (0i64..=900).prop_map(|secs| Op::Advance { secs }),
        1 => Just(Op::Reset),
    ]
}

/// Generate a sequence of up to `max_len` operations.
pub fn op_sequence(max_len: usize) -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(op(), 1..=max_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kam_core::{Identity, PackageName};

    proptest! {
        #[test]
        fn test_generated_package_names_are_valid(name in package_name()) {
            prop_assert!(PackageName::new(name).is_ok());
        }

        #[test]
        fn test_generated_identities_are_valid(identity in identity()) {
            prop_assert!(Identity::new(identity).is_ok());
        }

        #[test]
        fn test_generated_ttls_are_non_negative(ttl in ttl_seconds()) {
            prop_assert!(ttl >= 0);
        }

        #[test]
        fn test_ops_index_into_pools(op in op()) {
            match op.pair() {
                Some((package, identity)) => {
                    prop_assert!(PACKAGES.contains(&package));
                    prop_assert!(IDENTITIES.contains(&identity));
                }
                None => prop_assert!(matches!(op, Op::Advance { .. } | Op::Reset), "op without pair must be Advance or Reset"),
            }
        }
    }
}
