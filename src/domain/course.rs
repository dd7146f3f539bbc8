use super::money::Money;
use crate::error::{RegistryError, Result};
use serde::{Deserialize, Serialize};

pub type CourseId = i64;

/// Longest course the catalog accepts, in months.
pub const MAX_DURATION_MONTHS: u32 = 120;

/// A catalog entry as supplied by the seed file or the admin route.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct NewCourse {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub level: Option<String>,
    pub price: Money,
    pub duration_months: u32,
    #[serde(default)]
    pub credits: u32,
}

impl NewCourse {
    pub fn validate(mut self) -> Result<Self> {
        self.title = self.title.trim().to_string();
        if self.title.is_empty() {
            return Err(RegistryError::ValidationError(
                "Course title must not be empty".to_string(),
            ));
        }
        if self.duration_months == 0 {
            return Err(RegistryError::ValidationError(format!(
                "Course '{}' must last at least one month",
                self.title
            )));
        }
        if self.duration_months > MAX_DURATION_MONTHS {
            return Err(RegistryError::ValidationError(format!(
                "Course '{}' cannot last more than {} months",
                self.title, MAX_DURATION_MONTHS
            )));
        }
        self.level = self
            .level
            .map(|level| level.trim().to_string())
            .filter(|level| !level.is_empty());
        Ok(self)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Course {
    pub id: CourseId,
    pub title: String,
    pub description: String,
    pub level: Option<String>,
    pub price: Money,
    pub duration_months: u32,
    pub credits: u32,
}

impl Course {
    pub fn from_new(id: CourseId, new: NewCourse) -> Self {
        Self {
            id,
            title: new.title,
            description: new.description,
            level: new.level,
            price: new.price,
            duration_months: new.duration_months,
            credits: new.credits,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn course(title: &str, months: u32) -> NewCourse {
        NewCourse {
            title: title.to_string(),
            description: String::new(),
            level: Some("  ".to_string()),
            price: Money::new(dec!(200)).unwrap(),
            duration_months: months,
            credits: 3,
        }
    }

    #[test]
    fn test_validate_trims_and_drops_blank_level() {
        let course = course("  Intro to Rust ", 6).validate().unwrap();
        assert_eq!(course.title, "Intro to Rust");
        assert_eq!(course.level, None);
    }

    #[test]
    fn test_validate_rejects_empty_title_and_zero_duration() {
        assert!(matches!(
            course(" ", 6).validate(),
            Err(RegistryError::ValidationError(_))
        ));
        assert!(matches!(
            course("Algebra", 0).validate(),
            Err(RegistryError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validate_bounds_duration() {
        assert!(course("Decade", MAX_DURATION_MONTHS).validate().is_ok());
        assert!(matches!(
            course("Forever", MAX_DURATION_MONTHS + 1).validate(),
            Err(RegistryError::ValidationError(_))
        ));
        assert!(matches!(
            course("Forever", u32::MAX).validate(),
            Err(RegistryError::ValidationError(_))
        ));
    }

    #[test]
    fn test_new_course_deserialization_defaults() {
        let json = r#"{"title":"Algebra","price":"120.50","duration_months":3}"#;
        let course: NewCourse = serde_json::from_str(json).unwrap();
        assert_eq!(course.price, Money::new(dec!(120.5)).unwrap());
        assert_eq!(course.credits, 0);
        assert!(course.description.is_empty());
    }
}
