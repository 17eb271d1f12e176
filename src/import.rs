use std::path::Path;

use anyhow::Context;
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db;
use crate::models::{Review, ReviewCategory, ReviewType};
use crate::store::MemoryStore;

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(default)]
    source_key: Option<String>,
    sub_id: String,
    sub_user_id: String,
    sub_name: String,
    school_id: String,
    school_name: String,
    #[serde(default)]
    school_city: Option<String>,
    #[serde(default)]
    district_id: Option<String>,
    review_type: String,
    category: String,
    value_score: f64,
    #[serde(default)]
    comment: Option<String>,
    created_on: NaiveDate,
}

/// One review read from CSV, with the bookkeeping columns the store needs.
#[derive(Debug, Clone)]
pub struct ImportedReview {
    pub review: Review,
    pub source_key: String,
    pub district_id: Option<String>,
}

// Namespace for review ids derived from CSV rows, so re-reading a file yields
// the same ids and the same merge order.
const IMPORT_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2b9e_54a3_4d0c_9a7e_3c51_d2e8_40b7);

fn row_fingerprint(row_number: usize, row: &CsvRow) -> String {
    format!(
        "{}|{}|{}|{}|{}|{}|{}|{}",
        row_number,
        row.sub_id,
        row.school_id,
        row.review_type,
        row.category,
        row.value_score,
        row.created_on,
        row.comment.as_deref().unwrap_or_default()
    )
}

fn convert(row_number: usize, row: CsvRow) -> Result<ImportedReview, String> {
    if row.sub_id.trim().is_empty() || row.school_id.trim().is_empty() {
        return Err("row is missing sub_id or school_id".to_string());
    }
    if !row.value_score.is_finite() {
        return Err(format!("row for {} has a non-finite score", row.sub_id));
    }
    let review_type = ReviewType::parse(&row.review_type)
        .ok_or_else(|| format!("row for {} has unknown type '{}'", row.sub_id, row.review_type))?;

    let fingerprint = row_fingerprint(row_number, &row);
    let source_key = row
        .source_key
        .filter(|key| !key.trim().is_empty())
        .unwrap_or_else(|| {
            format!("import-{}", Uuid::new_v5(&IMPORT_NAMESPACE, fingerprint.as_bytes()))
        });
    let review_id = Uuid::new_v5(&IMPORT_NAMESPACE, source_key.as_bytes());

    Ok(ImportedReview {
        review: Review {
            review_id,
            sub_id: row.sub_id,
            sub_user_id: row.sub_user_id,
            sub_name: row.sub_name,
            school_id: row.school_id,
            school_name: row.school_name,
            school_city: row.school_city.unwrap_or_default(),
            review_type,
            category: ReviewCategory::from_key(row.category.trim()),
            value_score: row.value_score,
            comment: row.comment.filter(|text| !text.trim().is_empty()),
            created_on: row.created_on,
        },
        source_key,
        district_id: row.district_id.filter(|id| !id.trim().is_empty()),
    })
}

/// Reads reviews from CSV. Rows that fail to parse or validate are logged and
/// skipped; an unreadable file is an error.
pub fn read_reviews<R: std::io::Read>(reader: R) -> anyhow::Result<Vec<ImportedReview>> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut imported = Vec::new();

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let outcome = result
            .map_err(|err| err.to_string())
            .and_then(|row| convert(line + 1, row));
        match outcome {
            Ok(review) => imported.push(review),
            Err(reason) => warn!(row = line + 1, "skipping review row: {reason}"),
        }
    }

    Ok(imported)
}

pub fn read_reviews_from_path(path: &Path) -> anyhow::Result<Vec<ImportedReview>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    read_reviews(file)
}

/// Builds an in-memory store so a CSV export can be ranked without Postgres.
pub fn memory_store(imported: Vec<ImportedReview>) -> MemoryStore {
    let mut districts: Vec<(String, String)> = Vec::new();
    for item in &imported {
        if let Some(district) = &item.district_id {
            let pair = (district.clone(), item.review.school_id.clone());
            if !districts.contains(&pair) {
                districts.push(pair);
            }
        }
    }

    let mut store = MemoryStore::from_reviews(imported.into_iter().map(|item| item.review));
    for (district, school_id) in districts {
        store.districts.entry(district).or_default().push(school_id);
    }
    store
}

pub async fn import_csv(pool: &PgPool, csv_path: &Path) -> anyhow::Result<usize> {
    let imported = read_reviews_from_path(csv_path)?;
    let mut inserted = 0usize;

    for item in &imported {
        let review = &item.review;
        db::upsert_school(
            pool,
            &review.school_id,
            &review.school_name,
            &review.school_city,
            item.district_id.as_deref(),
        )
        .await?;

        if db::insert_review(pool, review, &item.source_key).await? {
            inserted += 1;
        }
    }

    info!(
        read = imported.len(),
        inserted,
        path = %csv_path.display(),
        "csv import finished"
    );
    Ok(inserted)
}
