use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::domain::{ApplicantProfile, JobGroup, JobRecord};

/// School years in the order the filter compares them: compulsory school years 1-9,
/// then upper-secondary years 1-4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Grade {
    Year1,
    Year2,
    Year3,
    Year4,
    Year5,
    Year6,
    Year7,
    Year8,
    Year9,
    Gym1,
    Gym2,
    Gym3,
    Gym4,
}

impl Grade {
    pub const fn ordered() -> [Self; 13] {
        [
            Self::Year1,
            Self::Year2,
            Self::Year3,
            Self::Year4,
            Self::Year5,
            Self::Year6,
            Self::Year7,
            Self::Year8,
            Self::Year9,
            Self::Gym1,
            Self::Gym2,
            Self::Gym3,
            Self::Gym4,
        ]
    }

    pub const fn code(self) -> &'static str {
        match self {
            Self::Year1 => "YEAR_1",
            Self::Year2 => "YEAR_2",
            Self::Year3 => "YEAR_3",
            Self::Year4 => "YEAR_4",
            Self::Year5 => "YEAR_5",
            Self::Year6 => "YEAR_6",
            Self::Year7 => "YEAR_7",
            Self::Year8 => "YEAR_8",
            Self::Year9 => "YEAR_9",
            Self::Gym1 => "GYM_1",
            Self::Gym2 => "GYM_2",
            Self::Gym3 => "GYM_3",
            Self::Gym4 => "GYM_4",
        }
    }

    /// Look up a stored grade code. Unknown codes yield `None` rather than an error.
    pub fn parse(code: &str) -> Option<Self> {
        let code = code.trim();
        Self::ordered()
            .into_iter()
            .find(|grade| grade.code().eq_ignore_ascii_case(code))
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Why an applicant cannot take a particular job. The `Display` text is what lands in
/// the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ineligibility {
    TooYoung { age: i32, min_age: u32 },
    TooOld { age: i32, max_age: u32 },
    GradeBelowMinimum { grade: Grade, min_grade: Grade },
    GradeAboveMaximum { grade: Grade, max_grade: Grade },
}

impl fmt::Display for Ineligibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooYoung { age, min_age } => write!(f, "Too young (age {age}, min {min_age})"),
            Self::TooOld { age, max_age } => write!(f, "Too old (age {age}, max {max_age})"),
            Self::GradeBelowMinimum { grade, min_grade } => {
                write!(f, "Grade {grade} below job minimum {min_grade}")
            }
            Self::GradeAboveMaximum { grade, max_grade } => {
                write!(f, "Grade {grade} above job maximum {max_grade}")
            }
        }
    }
}

/// Outcome of checking one (applicant, job, group) triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    Ineligible(Ineligibility),
}

impl Eligibility {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Self::Eligible)
    }

    pub fn reason(&self) -> String {
        match self {
            Self::Eligible => "Eligible".to_string(),
            Self::Ineligible(cause) => cause.to_string(),
        }
    }
}

/// Age in whole years on `today`.
pub fn age_on(birth_date: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - birth_date.year();
    if (today.month(), today.day()) < (birth_date.month(), birth_date.day()) {
        age -= 1;
    }
    age
}

/// Decide whether the applicant may take the job. Missing or unrecognized data never
/// rejects: an unknown birth date passes the age axis and an unknown grade passes the
/// grade axis.
pub fn check(
    applicant: &ApplicantProfile,
    job: &JobRecord,
    group: &JobGroup,
    today: NaiveDate,
) -> Eligibility {
    if let Some(cause) = age_violation(applicant, group, today) {
        return Eligibility::Ineligible(cause);
    }
    if let Some(cause) = grade_violation(applicant, job) {
        return Eligibility::Ineligible(cause);
    }
    Eligibility::Eligible
}

fn age_violation(
    applicant: &ApplicantProfile,
    group: &JobGroup,
    today: NaiveDate,
) -> Option<Ineligibility> {
    let age = age_on(applicant.birth_date?, today);
    if i64::from(age) < i64::from(group.min_age) {
        return Some(Ineligibility::TooYoung {
            age,
            min_age: group.min_age,
        });
    }
    if i64::from(age) > i64::from(group.max_age) {
        return Some(Ineligibility::TooOld {
            age,
            max_age: group.max_age,
        });
    }
    None
}

fn grade_violation(applicant: &ApplicantProfile, job: &JobRecord) -> Option<Ineligibility> {
    let grade = applicant.grade.as_deref().and_then(Grade::parse)?;

    if let Some(min_grade) = job.min_grade.as_deref().and_then(Grade::parse) {
        if grade < min_grade {
            return Some(Ineligibility::GradeBelowMinimum { grade, min_grade });
        }
    }
    if let Some(max_grade) = job.max_grade.as_deref().and_then(Grade::parse) {
        if grade > max_grade {
            return Some(Ineligibility::GradeAboveMaximum { grade, max_grade });
        }
    }
    None
}
