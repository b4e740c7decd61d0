//! Student directory models (read-only from the loan workflow)

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::id::RecordId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Section {
    pub id: RecordId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Subsection {
    pub id: RecordId,
    pub name: String,
    pub section_id: RecordId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Student {
    pub id: RecordId,
    pub first_name: String,
    pub second_name: Option<String>,
    pub third_name: Option<String>,
    pub first_surname: String,
    pub second_surname: Option<String>,
    pub number_phone: String,
    pub subsection_id: RecordId,
}

impl Student {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.first_surname)
    }
}

/// Subsection with its section joined in
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SubsectionDetails {
    pub id: RecordId,
    pub name: String,
    pub section_id: RecordId,
    pub section: Option<Section>,
}

/// Student as embedded in loan views.
///
/// `subsection` is only joined for the dashboard lists.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StudentDetails {
    pub id: RecordId,
    pub first_name: String,
    pub second_name: Option<String>,
    pub third_name: Option<String>,
    pub first_surname: String,
    pub second_surname: Option<String>,
    pub number_phone: String,
    pub subsection_id: RecordId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subsection: Option<SubsectionDetails>,
}

impl From<Student> for StudentDetails {
    fn from(s: Student) -> Self {
        Self {
            id: s.id,
            first_name: s.first_name,
            second_name: s.second_name,
            third_name: s.third_name,
            first_surname: s.first_surname,
            second_surname: s.second_surname,
            number_phone: s.number_phone,
            subsection_id: s.subsection_id,
            subsection: None,
        }
    }
}

/// Directory head counts for the library dashboard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct DirectoryCounts {
    pub students: i64,
    pub sections: i64,
    pub subsections: i64,
}
