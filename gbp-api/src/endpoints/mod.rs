pub mod accounts;
pub mod reviews;

use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Declares a path-segment id that accepts either the bare id (`123`) or Google's resource name
/// (`accounts/123`) and always renders the bare id.
macro_rules! resource_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Default, Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                let id = s.rsplit_once($prefix).map_or(s, |(_, id)| id);
                Self(id.trim_matches('/').to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::from(s.as_str())
            }
        }

        impl From<&String> for $name {
            fn from(s: &String) -> Self {
                Self::from(s.as_str())
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }
    };
}

resource_id!(AccountId, "accounts/");
resource_id!(LocationId, "locations/");
resource_id!(ReviewId, "reviews/");

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StarRating {
    StarRatingUnspecified,
    One,
    Two,
    Three,
    Four,
    Five,
}

impl StarRating {
    /// Numeric value of the rating, `None` when Google did not report one.
    pub fn stars(&self) -> Option<u8> {
        match self {
            Self::StarRatingUnspecified => None,
            Self::One => Some(1),
            Self::Two => Some(2),
            Self::Three => Some(3),
            Self::Four => Some(4),
            Self::Five => Some(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_ids_accept_resource_names() {
        assert_eq!(AccountId::from("accounts/1234"), "1234");
        assert_eq!(AccountId::from("1234"), "1234");
        assert_eq!(LocationId::from("accounts/1/locations/987"), "987");
        assert_eq!(ReviewId::from("accounts/1/locations/2/reviews/AbC-9"), "AbC-9");
    }

    #[test]
    fn star_rating_uses_google_names() {
        let rating: StarRating = serde_json::from_str("\"FOUR\"").unwrap();
        assert_eq!(rating, StarRating::Four);
        assert_eq!(rating.stars(), Some(4));
        assert_eq!(
            serde_json::from_str::<StarRating>("\"STAR_RATING_UNSPECIFIED\"")
                .unwrap()
                .stars(),
            None
        );
    }
}
