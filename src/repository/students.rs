//! Student directory repository (read-only)

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        id::RecordId,
        student::{DirectoryCounts, Section, Student, Subsection},
    },
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StudentsStore: Send + Sync {
    async fn get(&self, id: RecordId) -> AppResult<Option<Student>>;
    async fn get_many(&self, ids: &[RecordId]) -> AppResult<Vec<Student>>;
    async fn subsections(&self, ids: &[RecordId]) -> AppResult<Vec<Subsection>>;
    async fn sections(&self, ids: &[RecordId]) -> AppResult<Vec<Section>>;
    async fn counts(&self) -> AppResult<DirectoryCounts>;
}

#[derive(Clone)]
pub struct PgStudentsStore {
    pool: Pool<Postgres>,
}

impl PgStudentsStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn uuids(ids: &[RecordId]) -> Vec<Uuid> {
    ids.iter().map(RecordId::as_uuid).collect()
}

const STUDENT_COLUMNS: &str = "id, first_name, second_name, third_name, first_surname, \
                               second_surname, number_phone, subsection_id";

#[async_trait]
impl StudentsStore for PgStudentsStore {
    async fn get(&self, id: RecordId) -> AppResult<Option<Student>> {
        let query = format!("SELECT {} FROM students WHERE id = $1", STUDENT_COLUMNS);
        let student = sqlx::query_as::<_, Student>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(student)
    }

    async fn get_many(&self, ids: &[RecordId]) -> AppResult<Vec<Student>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = format!("SELECT {} FROM students WHERE id = ANY($1)", STUDENT_COLUMNS);
        let students = sqlx::query_as::<_, Student>(&query)
            .bind(uuids(ids))
            .fetch_all(&self.pool)
            .await?;
        Ok(students)
    }

    async fn subsections(&self, ids: &[RecordId]) -> AppResult<Vec<Subsection>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, Subsection>(
            "SELECT id, name, section_id FROM subsections WHERE id = ANY($1)",
        )
        .bind(uuids(ids))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn sections(&self, ids: &[RecordId]) -> AppResult<Vec<Section>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, Section>("SELECT id, name FROM sections WHERE id = ANY($1)")
            .bind(uuids(ids))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn counts(&self) -> AppResult<DirectoryCounts> {
        let (students, sections, subsections): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT (SELECT COUNT(*) FROM students),
                   (SELECT COUNT(*) FROM sections),
                   (SELECT COUNT(*) FROM subsections)
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(DirectoryCounts {
            students,
            sections,
            subsections,
        })
    }
}
