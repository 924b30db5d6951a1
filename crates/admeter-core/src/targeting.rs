//! Campaign targeting
//!
//! A [`Targeting`] is a set of optional constraints on client attributes.
//! An absent field places no constraint on that dimension, and an absent
//! targeting block matches every client.

use crate::error::ValidationError;
use crate::types::{Client, Gender, MAX_AGE};
use serde::{Deserialize, Serialize};

/// Gender constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TargetGender {
    Male,
    Female,
    /// Any client gender
    All,
}

impl TargetGender {
    /// Check whether a client gender satisfies this constraint
    #[inline]
    #[must_use]
    pub fn admits(self, gender: Gender) -> bool {
        matches!(
            (self, gender),
            (TargetGender::All, _)
                | (TargetGender::Male, Gender::Male)
                | (TargetGender::Female, Gender::Female)
        )
    }
}

/// Per-field optional constraints on client attributes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Targeting {
    #[serde(default)]
    pub gender: Option<TargetGender>,
    #[serde(default)]
    pub age_from: Option<u32>,
    #[serde(default)]
    pub age_to: Option<u32>,
    #[serde(default)]
    pub location: Option<String>,
}

impl Targeting {
    /// Build a validated targeting block
    ///
    /// # Errors
    /// See [`Targeting::validate`]
    pub fn new(
        gender: Option<TargetGender>,
        age_from: Option<u32>,
        age_to: Option<u32>,
        location: Option<String>,
    ) -> Result<Self, ValidationError> {
        let targeting = Self {
            gender,
            age_from,
            age_to,
            location,
        };
        targeting.validate()?;
        Ok(targeting)
    }

    /// Check age bounds
    ///
    /// # Errors
    /// - `AgeOutOfRange` if a bound exceeds 120
    /// - `AgeBoundsInverted` if `age_to < age_from`
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [("age_from", self.age_from), ("age_to", self.age_to)] {
            if let Some(value) = value.filter(|v| *v > MAX_AGE) {
                return Err(ValidationError::AgeOutOfRange { field, value });
            }
        }
        if let (Some(age_from), Some(age_to)) = (self.age_from, self.age_to) {
            if age_to < age_from {
                return Err(ValidationError::AgeBoundsInverted { age_from, age_to });
            }
        }
        Ok(())
    }

    /// Check whether every present constraint admits the client
    #[must_use]
    pub fn admits(&self, client: &Client) -> bool {
        self.gender.map_or(true, |g| g.admits(client.gender))
            && self.age_from.map_or(true, |from| client.age >= from)
            && self.age_to.map_or(true, |to| client.age <= to)
            && self
                .location
                .as_deref()
                .map_or(true, |loc| loc == client.location)
    }
}

/// Match a campaign's (possibly absent) targeting against a client
#[inline]
#[must_use]
pub fn matches(targeting: Option<&Targeting>, client: &Client) -> bool {
    targeting.map_or(true, |t| t.admits(client))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClientId;

    fn client(age: u32, gender: Gender, location: &str) -> Client {
        Client {
            client_id: ClientId::new(),
            login: "user".into(),
            age,
            location: location.into(),
            gender,
        }
    }

    #[test]
    fn absent_targeting_matches_everyone() {
        assert!(matches(None, &client(18, Gender::Male, "Moscow")));
        assert!(matches(
            Some(&Targeting::default()),
            &client(99, Gender::Female, "Kazan")
        ));
    }

    #[test]
    fn gender_constraint() {
        let male_only = Targeting {
            gender: Some(TargetGender::Male),
            ..Targeting::default()
        };
        assert!(male_only.admits(&client(20, Gender::Male, "x")));
        assert!(!male_only.admits(&client(20, Gender::Female, "x")));

        let all = Targeting {
            gender: Some(TargetGender::All),
            ..Targeting::default()
        };
        assert!(all.admits(&client(20, Gender::Female, "x")));
    }

    #[test]
    fn age_bounds_are_inclusive() {
        let t = Targeting::new(None, Some(18), Some(25), None).unwrap();
        assert!(!t.admits(&client(17, Gender::Male, "x")));
        assert!(t.admits(&client(18, Gender::Male, "x")));
        assert!(t.admits(&client(25, Gender::Male, "x")));
        assert!(!t.admits(&client(26, Gender::Male, "x")));
    }

    #[test]
    fn location_is_exact_match() {
        let t = Targeting {
            location: Some("Moscow".into()),
            ..Targeting::default()
        };
        assert!(t.admits(&client(30, Gender::Male, "Moscow")));
        assert!(!t.admits(&client(30, Gender::Male, "moscow")));
    }

    #[test]
    fn inverted_bounds_rejected_at_construction() {
        assert_eq!(
            Targeting::new(None, Some(30), Some(20), None),
            Err(ValidationError::AgeBoundsInverted {
                age_from: 30,
                age_to: 20
            })
        );
        assert!(Targeting::new(None, Some(121), None, None).is_err());
    }

    #[test]
    fn missing_fields_deserialize_as_unconstrained() {
        let t: Targeting = serde_json::from_str(r#"{"gender":"ALL"}"#).unwrap();
        assert_eq!(t.gender, Some(TargetGender::All));
        assert_eq!(t.age_from, None);
        assert_eq!(t.location, None);
    }
}
