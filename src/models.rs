use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewType {
    Compliment,
    Complaint,
}

impl ReviewType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "compliment" => Some(Self::Compliment),
            "complaint" => Some(Self::Complaint),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compliment => "compliment",
            Self::Complaint => "complaint",
        }
    }
}

/// Review category. Keys the app does not know about are kept verbatim in
/// `Other` so they still get their own bucket in the breakdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewCategory {
    Punctuality,
    ClassroomManagement,
    LessonPlanFollowThrough,
    Professionalism,
    Communication,
    StudentEngagement,
    Other(String),
}

const CATEGORY_TABLE: &[(ReviewCategory, &str, &str)] = &[
    (ReviewCategory::Punctuality, "punctuality", "Punctuality"),
    (
        ReviewCategory::ClassroomManagement,
        "classroom_management",
        "Classroom Management",
    ),
    (
        ReviewCategory::LessonPlanFollowThrough,
        "lesson_plan",
        "Lesson Plan Follow-Through",
    ),
    (
        ReviewCategory::Professionalism,
        "professionalism",
        "Professionalism",
    ),
    (ReviewCategory::Communication, "communication", "Communication"),
    (
        ReviewCategory::StudentEngagement,
        "student_engagement",
        "Student Engagement",
    ),
];

impl ReviewCategory {
    pub fn from_key(raw: &str) -> Self {
        CATEGORY_TABLE
            .iter()
            .find(|(_, key, _)| *key == raw)
            .map(|(category, _, _)| category.clone())
            .unwrap_or_else(|| Self::Other(raw.to_string()))
    }

    pub fn key(&self) -> &str {
        match self {
            Self::Other(raw) => raw,
            known => CATEGORY_TABLE
                .iter()
                .find(|(category, _, _)| category == known)
                .map(|(_, key, _)| *key)
                .unwrap_or_default(),
        }
    }

    pub fn label(&self) -> &str {
        label_for_key(self.key())
    }
}

/// Display label for a raw category key, falling back to the key itself.
pub fn label_for_key(key: &str) -> &str {
    CATEGORY_TABLE
        .iter()
        .find(|(_, raw, _)| *raw == key)
        .map(|(_, _, label)| *label)
        .unwrap_or(key)
}

impl fmt::Display for ReviewCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for ReviewCategory {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.key())
    }
}

impl<'de> Deserialize<'de> for ReviewCategory {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_key(&raw))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub review_id: Uuid,
    pub sub_id: String,
    pub sub_user_id: String,
    pub sub_name: String,
    pub school_id: String,
    pub school_name: String,
    pub school_city: String,
    pub review_type: ReviewType,
    pub category: ReviewCategory,
    pub value_score: f64,
    pub comment: Option<String>,
    pub created_on: NaiveDate,
}

impl Review {
    /// City bucket for this review; schools without a city are bucketed by name.
    pub fn city(&self) -> &str {
        if self.school_city.is_empty() {
            &self.school_name
        } else {
            &self.school_city
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingItem {
    pub sub_id: String,
    pub sub_user_id: String,
    pub sub_name: String,
    pub city: String,
    pub overall_value: f64,
    pub category_breakdown: BTreeMap<String, f64>,
    pub compliment_count: usize,
    pub complaint_count: usize,
    pub review_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Rankings {
    pub overall: Vec<RankingItem>,
    pub by_city: BTreeMap<String, Vec<RankingItem>>,
}

/// Reviews gathered for a scope, plus the schools whose fetch did not succeed.
#[derive(Debug, Clone, Default)]
pub struct ScopeReviews {
    pub reviews: Vec<Review>,
    pub failed_schools: Vec<String>,
}

impl ScopeReviews {
    pub fn is_incomplete(&self) -> bool {
        !self.failed_schools.is_empty()
    }
}
