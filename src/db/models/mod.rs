use serde::{Deserialize, Serialize};

pub mod event;
pub mod game;
pub mod group;
pub mod score;

/// Declares a `u64`-backed identifier newtype that serializes as a bare integer.
macro_rules! id_type {
    ($($name:ident),* $(,)?) => {
        $(
            #[derive(
                Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
            )]
            #[serde(transparent)]
            pub struct $name(pub u64);

            impl From<u64> for $name {
                fn from(value: u64) -> Self {
                    $name(value)
                }
            }

            impl core::fmt::Display for $name {
                fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                    write!(f, "{}", self.0)
                }
            }
        )*
    };
}

id_type!(EventId, GroupId, GameId, ScoreId, UserId);

impl UserId {
    /// Creator recorded for score records written through the internal producer routes, which
    /// authenticate a deployment token rather than an individual user.
    pub const OPERATOR: UserId = UserId(0);
}
