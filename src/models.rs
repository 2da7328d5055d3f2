use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::err::Error;
use crate::validation::{validate_name, NameField};

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Student {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub image_path: String,
    pub marked_today: bool,
    pub registration_date: DateTime<Utc>,
    pub last_seen_date: Option<DateTime<Utc>>,
}

/// A student as clients see it: no image path, id as a plain string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentView {
    #[serde(rename = "_id")]
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub marked_today: bool,
    pub registration_date: DateTime<Utc>,
    pub last_seen_date: Option<DateTime<Utc>>,
}

impl From<Student> for StudentView {
    fn from(student: Student) -> Self {
        Self {
            id: student.id.to_string(),
            first_name: student.first_name,
            last_name: student.last_name,
            marked_today: student.marked_today,
            registration_date: student.registration_date,
            last_seen_date: student.last_seen_date,
        }
    }
}

/// A registration that has passed name validation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewStudent {
    pub first_name: String,
    pub last_name: String,
    pub image_path: String,
    pub registration_date: DateTime<Utc>,
}

impl NewStudent {
    pub fn new(
        first_name: &str,
        last_name: &str,
        image_path: String,
        registration_date: DateTime<Utc>,
    ) -> Result<Self, Error> {
        validate_name(NameField::First, first_name)?;
        validate_name(NameField::Last, last_name)?;
        Ok(Self {
            first_name: first_name.trim().to_string(),
            last_name: last_name.trim().to_string(),
            image_path,
            registration_date,
        })
    }
}

/// Partial update as sent by clients. Absent fields stay untouched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StudentUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub marked_today: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttendanceToggle {
    pub marked_today: bool,
}

impl From<AttendanceToggle> for StudentUpdate {
    fn from(toggle: AttendanceToggle) -> Self {
        Self {
            marked_today: Some(toggle.marked_today),
            ..Self::default()
        }
    }
}

impl StudentUpdate {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none() && self.last_name.is_none() && self.marked_today.is_none()
    }

    /// Validates the set fields and stamps `last_seen_date` when the student is marked present.
    pub fn into_changes(self, now: DateTime<Utc>) -> Result<FieldChanges, Error> {
        if self.is_empty() {
            return Err(Error::invalid("No update data provided"));
        }
        if let Some(first_name) = &self.first_name {
            validate_name(NameField::First, first_name)?;
        }
        if let Some(last_name) = &self.last_name {
            validate_name(NameField::Last, last_name)?;
        }
        Ok(FieldChanges {
            first_name: self.first_name,
            last_name: self.last_name,
            marked_today: self.marked_today,
            last_seen_date: match self.marked_today {
                Some(true) => Some(now),
                _ => None,
            },
        })
    }
}

/// Column-level changes applied by the repository in a single write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub marked_today: Option<bool>,
    pub last_seen_date: Option<DateTime<Utc>>,
}

impl FieldChanges {
    pub fn marked_present(at: DateTime<Utc>) -> Self {
        Self {
            marked_today: Some(true),
            last_seen_date: Some(at),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 2, hour, 0, 0).unwrap()
    }

    fn student() -> Student {
        Student {
            id: Uuid::new_v4(),
            first_name: "Jonas".into(),
            last_name: "Petraitis".into(),
            image_path: "images/a.jpg".into(),
            marked_today: false,
            registration_date: at(8),
            last_seen_date: Some(at(9)),
        }
    }

    #[test]
    fn view_hides_the_image_path() {
        let s = student();
        let json = serde_json::to_value(StudentView::from(s.clone())).unwrap();
        assert_eq!(json["_id"], s.id.to_string());
        assert!(json.get("image_path").is_none());
        assert_eq!(json["marked_today"], false);
    }

    #[test]
    fn new_student_validates_both_names() {
        assert!(NewStudent::new("Jonas", "Petraitis", "p".into(), at(8)).is_ok());
        assert!(NewStudent::new("jonas", "Petraitis", "p".into(), at(8)).is_err());
        assert!(NewStudent::new("Jonas", "petraitis", "p".into(), at(8)).is_err());
    }

    #[test]
    fn empty_update_is_rejected() {
        let err = StudentUpdate::default().into_changes(at(10)).unwrap_err();
        assert_eq!(err.detail(), "No update data provided");
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let parsed = serde_json::from_str::<StudentUpdate>(r#"{"image_path": "/etc/passwd"}"#);
        assert!(parsed.is_err());
        let parsed: StudentUpdate = serde_json::from_str(r#"{"last_name": "Jonaitis"}"#).unwrap();
        assert_eq!(parsed.last_name.as_deref(), Some("Jonaitis"));
        assert!(parsed.first_name.is_none());
    }

    #[test]
    fn partial_update_validates_only_set_names() {
        let update = StudentUpdate {
            last_name: Some("bad".into()),
            ..StudentUpdate::default()
        };
        assert!(update.into_changes(at(10)).is_err());
    }

    #[test]
    fn marking_present_stamps_last_seen() {
        let update = StudentUpdate {
            marked_today: Some(true),
            ..StudentUpdate::default()
        };
        let changes = update.into_changes(at(11)).unwrap();
        assert_eq!(changes, FieldChanges::marked_present(at(11)));
    }

    #[test]
    fn unmarking_leaves_last_seen_alone() {
        let changes = StudentUpdate::from(AttendanceToggle {
            marked_today: false,
        })
        .into_changes(at(12))
        .unwrap();
        assert_eq!(changes.marked_today, Some(false));
        assert_eq!(changes.last_seen_date, None);
        assert!(changes.first_name.is_none());
    }
}
