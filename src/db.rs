use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{FromRow, PgPool};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{Review, ReviewCategory, ReviewType};
use crate::store::ReviewStore;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[derive(Debug, FromRow)]
struct ReviewRow {
    id: Uuid,
    sub_id: String,
    sub_user_id: String,
    sub_name: String,
    school_id: String,
    school_name: String,
    school_city: Option<String>,
    review_type: String,
    category: String,
    value_score: f64,
    comment: Option<String>,
    created_on: NaiveDate,
}

impl TryFrom<ReviewRow> for Review {
    type Error = String;

    fn try_from(row: ReviewRow) -> Result<Self, Self::Error> {
        if row.sub_id.trim().is_empty() {
            return Err(format!("review {} has no substitute id", row.id));
        }
        if row.school_id.trim().is_empty() {
            return Err(format!("review {} has no school id", row.id));
        }
        if !row.value_score.is_finite() {
            return Err(format!("review {} has a non-finite score", row.id));
        }
        let review_type = ReviewType::parse(&row.review_type).ok_or_else(|| {
            format!("review {} has unknown type '{}'", row.id, row.review_type)
        })?;

        Ok(Review {
            review_id: row.id,
            sub_id: row.sub_id,
            sub_user_id: row.sub_user_id,
            sub_name: row.sub_name,
            school_id: row.school_id,
            school_name: row.school_name,
            school_city: row.school_city.unwrap_or_default(),
            review_type,
            category: ReviewCategory::from_key(&row.category),
            value_score: row.value_score,
            comment: row.comment.filter(|text| !text.trim().is_empty()),
            created_on: row.created_on,
        })
    }
}

/// Drops rows that cannot become a [`Review`] instead of failing the batch.
fn parse_rows(rows: Vec<ReviewRow>) -> Vec<Review> {
    rows.into_iter()
        .filter_map(|row| match Review::try_from(row) {
            Ok(review) => Some(review),
            Err(reason) => {
                warn!("skipping malformed review: {reason}");
                None
            }
        })
        .collect()
}

pub struct PgReviewStore {
    pool: PgPool,
}

impl PgReviewStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReviewStore for PgReviewStore {
    async fn fetch_reviews(&self, school_id: &str) -> Result<Vec<Review>, StoreError> {
        let rows: Vec<ReviewRow> = sqlx::query_as(
            r#"
            SELECT r.id, r.sub_id, r.sub_user_id, r.sub_name, r.school_id,
                   s.name AS school_name, s.city AS school_city,
                   r.review_type, r.category, r.value_score, r.comment, r.created_on
            FROM substitute_rankings.sub_reviews r
            JOIN substitute_rankings.schools s ON s.id = r.school_id
            WHERE r.school_id = $1
            "#,
        )
        .bind(school_id)
        .fetch_all(&self.pool)
        .await?;

        debug!(school_id, rows = rows.len(), "fetched review rows");
        Ok(parse_rows(rows))
    }

    async fn district_school_ids(&self, district_id: &str) -> Result<Vec<String>, StoreError> {
        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT id FROM substitute_rankings.schools WHERE district_id = $1 ORDER BY id",
        )
        .bind(district_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}

pub async fn upsert_school(
    pool: &PgPool,
    id: &str,
    name: &str,
    city: &str,
    district_id: Option<&str>,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO substitute_rankings.schools (id, name, city, district_id)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (id) DO UPDATE
        SET name = EXCLUDED.name,
            city = EXCLUDED.city,
            district_id = COALESCE(EXCLUDED.district_id, substitute_rankings.schools.district_id)
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(city)
    .bind(district_id)
    .execute(pool)
    .await
    .with_context(|| format!("failed to upsert school {id}"))?;
    Ok(())
}

/// Inserts a review keyed by `source_key`; returns false if it already existed.
pub async fn insert_review(pool: &PgPool, review: &Review, source_key: &str) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO substitute_rankings.sub_reviews
        (id, sub_id, sub_user_id, sub_name, school_id, review_type, category,
         value_score, comment, created_on, source_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(review.review_id)
    .bind(&review.sub_id)
    .bind(&review.sub_user_id)
    .bind(&review.sub_name)
    .bind(&review.school_id)
    .bind(review.review_type.as_str())
    .bind(review.category.key())
    .bind(review.value_score)
    .bind(&review.comment)
    .bind(review.created_on)
    .bind(source_key)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let schools = vec![
        ("lincoln-elem", "Lincoln Elementary", "Austin", "austin-isd"),
        ("travis-high", "Travis High School", "Austin", "austin-isd"),
        ("oak-hill-middle", "Oak Hill Middle", "", "austin-isd"),
    ];

    for (id, name, city, district) in &schools {
        upsert_school(pool, id, name, city, Some(*district)).await?;
    }

    let reviews = vec![
        (
            "seed-001",
            "lincoln-elem",
            ("sub-avery", "uid-avery", "Avery Lee"),
            ReviewType::Compliment,
            "punctuality",
            9.0,
            "Arrived early and reviewed the plan",
            NaiveDate::from_ymd_opt(2026, 2, 2).context("invalid date")?,
        ),
        (
            "seed-002",
            "travis-high",
            ("sub-avery", "uid-avery", "Avery Lee"),
            ReviewType::Complaint,
            "communication",
            4.0,
            "Did not leave notes for the homeroom teacher",
            NaiveDate::from_ymd_opt(2026, 2, 5).context("invalid date")?,
        ),
        (
            "seed-003",
            "travis-high",
            ("sub-jules", "uid-jules", "Jules Moreno"),
            ReviewType::Compliment,
            "classroom_management",
            8.5,
            "Kept sixth period on task",
            NaiveDate::from_ymd_opt(2026, 1, 30).context("invalid date")?,
        ),
        (
            "seed-004",
            "oak-hill-middle",
            ("sub-kiara", "uid-kiara", "Kiara Patel"),
            ReviewType::Compliment,
            "student_engagement",
            9.5,
            "Students asked to have this sub again",
            NaiveDate::from_ymd_opt(2026, 1, 28).context("invalid date")?,
        ),
        (
            "seed-005",
            "oak-hill-middle",
            ("sub-jules", "uid-jules", "Jules Moreno"),
            ReviewType::Complaint,
            "lesson_plan",
            5.0,
            "Skipped the assigned lab",
            NaiveDate::from_ymd_opt(2026, 2, 9).context("invalid date")?,
        ),
    ];

    for (source_key, school_id, (sub_id, sub_user_id, sub_name), review_type, category, score, note, created_on) in
        reviews
    {
        let (_, school_name, school_city, _) = schools
            .iter()
            .find(|(id, ..)| *id == school_id)
            .context("seed review references unknown school")?;
        let review = Review {
            review_id: Uuid::new_v4(),
            sub_id: sub_id.to_string(),
            sub_user_id: sub_user_id.to_string(),
            sub_name: sub_name.to_string(),
            school_id: school_id.to_string(),
            school_name: school_name.to_string(),
            school_city: school_city.to_string(),
            review_type,
            category: ReviewCategory::from_key(category),
            value_score: score,
            comment: Some(note.to_string()),
            created_on,
        };
        insert_review(pool, &review, source_key).await?;
    }

    Ok(())
}
