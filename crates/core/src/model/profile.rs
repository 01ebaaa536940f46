use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const MAX_NICKNAME_CHARS: usize = 64;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProfileError {
    #[error("nickname must not be empty")]
    EmptyNickname,

    #[error("nickname is too long ({len} characters, max {MAX_NICKNAME_CHARS})")]
    NicknameTooLong { len: usize },

    #[error("birthday {0} is in the future")]
    BirthdayInFuture(NaiveDate),

    #[error("unknown gender: {0}")]
    UnknownGender(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "m" | "male" => Ok(Gender::Male),
            "f" | "female" => Ok(Gender::Female),
            "o" | "other" => Ok(Gender::Other),
            _ => Err(ProfileError::UnknownGender(s.to_owned())),
        }
    }
}

/// Respondent details captured on the start form and carried with the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    nickname: String,
    birthday: NaiveDate,
    gender: Gender,
    derived_age: u32,
}

impl Profile {
    /// Validate the form input and derive the age as of `today`.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError` if the nickname is blank or too long, or the
    /// birthday lies after `today`.
    pub fn new(
        nickname: impl Into<String>,
        birthday: NaiveDate,
        gender: Gender,
        today: NaiveDate,
    ) -> Result<Self, ProfileError> {
        let nickname = nickname.into().trim().to_owned();
        if nickname.is_empty() {
            return Err(ProfileError::EmptyNickname);
        }
        let len = nickname.chars().count();
        if len > MAX_NICKNAME_CHARS {
            return Err(ProfileError::NicknameTooLong { len });
        }
        if birthday > today {
            return Err(ProfileError::BirthdayInFuture(birthday));
        }

        Ok(Self {
            nickname,
            birthday,
            gender,
            derived_age: age_on(birthday, today),
        })
    }

    #[must_use]
    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    #[must_use]
    pub fn birthday(&self) -> NaiveDate {
        self.birthday
    }

    #[must_use]
    pub fn gender(&self) -> Gender {
        self.gender
    }

    #[must_use]
    pub fn derived_age(&self) -> u32 {
        self.derived_age
    }
}

/// Whole years between `birthday` and `today`; zero if `today` precedes it.
#[must_use]
pub fn age_on(birthday: NaiveDate, today: NaiveDate) -> u32 {
    let mut years = today.year() - birthday.year();
    if (today.month(), today.day()) < (birthday.month(), birthday.day()) {
        years -= 1;
    }
    u32::try_from(years).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn age_counts_only_completed_years() {
        assert_eq!(age_on(date(2000, 6, 15), date(2024, 6, 14)), 23);
        assert_eq!(age_on(date(2000, 6, 15), date(2024, 6, 15)), 24);
        assert_eq!(age_on(date(2000, 2, 29), date(2023, 2, 28)), 22);
    }

    #[test]
    fn profile_trims_and_derives_age() {
        let profile =
            Profile::new("  Ada ", date(1990, 1, 1), Gender::Female, date(2024, 1, 1)).unwrap();
        assert_eq!(profile.nickname(), "Ada");
        assert_eq!(profile.derived_age(), 34);
    }

    #[test]
    fn profile_rejects_blank_nickname_and_future_birthday() {
        let today = date(2024, 1, 1);
        assert_eq!(
            Profile::new(" ", date(1990, 1, 1), Gender::Male, today),
            Err(ProfileError::EmptyNickname)
        );
        assert_eq!(
            Profile::new("x", date(2025, 1, 1), Gender::Male, today),
            Err(ProfileError::BirthdayInFuture(date(2025, 1, 1)))
        );
    }

    #[test]
    fn profile_serializes_in_snapshot_shape() {
        let profile =
            Profile::new("Ada", date(1990, 1, 1), Gender::Other, date(2024, 1, 1)).unwrap();
        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["birthday"], "1990-01-01");
        assert_eq!(json["gender"], "other");
        assert_eq!(json["derivedAge"], 34);
    }

    #[test]
    fn gender_parses_short_forms() {
        assert_eq!("F".parse::<Gender>().unwrap(), Gender::Female);
        assert!("x".parse::<Gender>().is_err());
    }
}
