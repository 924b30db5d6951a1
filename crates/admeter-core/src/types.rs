//! Core types for the ad engine
//!
//! Defines identifiers and the records this engine reads:
//! - Client, advertiser and campaign identifiers
//! - Clients and advertisers (owned by the directory)
//! - ML affinity scores
//! - The ad handed back to a client

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Virtual day number
pub type Day = u64;

/// Oldest age a client or targeting bound may carry
pub const MAX_AGE: u32 = 120;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a random identifier
            #[inline]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

uuid_id!(
    /// Unique client identifier
    ClientId
);
uuid_id!(
    /// Unique advertiser identifier
    AdvertiserId
);
uuid_id!(
    /// Unique campaign identifier (also the served ad's id)
    CampaignId
);

/// Client gender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Gender {
    Male,
    Female,
}

/// End user an ad is served to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub client_id: ClientId,
    pub login: String,
    pub age: u32,
    pub location: String,
    pub gender: Gender,
}

impl Client {
    /// Check field constraints
    ///
    /// # Errors
    /// Returns the first violated constraint
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.login.trim().is_empty() {
            return Err(ValidationError::Empty("login"));
        }
        if self.location.trim().is_empty() {
            return Err(ValidationError::Empty("location"));
        }
        if self.age > MAX_AGE {
            return Err(ValidationError::AgeOutOfRange {
                field: "age",
                value: self.age,
            });
        }
        Ok(())
    }
}

/// Owner of campaigns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advertiser {
    pub advertiser_id: AdvertiserId,
    pub name: String,
}

impl Advertiser {
    /// Check field constraints
    ///
    /// # Errors
    /// Returns `Empty` for a blank name
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::Empty("name"));
        }
        Ok(())
    }
}

/// Predicted relevance of an advertiser to a client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MlScore {
    pub client_id: ClientId,
    pub advertiser_id: AdvertiserId,
    pub score: u64,
}

/// Ad handed to a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ad {
    pub ad_id: CampaignId,
    pub ad_title: String,
    pub ad_text: String,
    pub advertiser_id: AdvertiserId,
    pub image_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> Client {
        Client {
            client_id: ClientId::new(),
            login: "alice".into(),
            age: 30,
            location: "Moscow".into(),
            gender: Gender::Female,
        }
    }

    #[test]
    fn ids_round_trip_through_strings() {
        let id = CampaignId::new();
        let parsed: CampaignId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-uuid".parse::<ClientId>().is_err());
    }

    #[test]
    fn gender_uses_uppercase_wire_names() {
        assert_eq!(serde_json::to_string(&Gender::Male).unwrap(), "\"MALE\"");
        let g: Gender = serde_json::from_str("\"FEMALE\"").unwrap();
        assert_eq!(g, Gender::Female);
    }

    #[test]
    fn client_validation() {
        assert!(client().validate().is_ok());

        let mut old = client();
        old.age = 121;
        assert!(matches!(
            old.validate(),
            Err(ValidationError::AgeOutOfRange { value: 121, .. })
        ));

        let mut blank = client();
        blank.login = "  ".into();
        assert_eq!(blank.validate(), Err(ValidationError::Empty("login")));
    }
}
