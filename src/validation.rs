use lazy_static::lazy_static;
use regex::Regex;

use crate::err::Error;

lazy_static! {
    /// Title case over the Latin alphabet extended with the Lithuanian letters.
    static ref TITLE_CASE_NAME: Regex =
        Regex::new(r"^[A-ZĄČĘĖĮŠŲŪŽ][a-ząčęėįšųūž]*$").expect("name pattern compiles");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameField {
    First,
    Last,
}

impl NameField {
    fn rejection(self) -> &'static str {
        match self {
            NameField::First => {
                "First name must be in Title Case and can include Lithuanian characters (e.g., 'John', 'Ąžuolas')."
            }
            NameField::Last => {
                "Last name must be in Title Case and can include Lithuanian characters (e.g., 'Doe', 'Kazlauskas')."
            }
        }
    }
}

pub fn is_title_case_name(candidate: &str) -> bool {
    TITLE_CASE_NAME.is_match(candidate)
}

pub fn validate_name(field: NameField, candidate: &str) -> Result<(), Error> {
    if is_title_case_name(candidate) {
        Ok(())
    } else {
        Err(Error::invalid(field.rejection()))
    }
}
