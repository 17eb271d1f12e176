use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::{RankingError, RankingResult, StoreError};
use crate::models::{Review, ScopeReviews};
use crate::store::ReviewStore;

/// Ordered, de-duplicated list of schools to rank across.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    school_ids: Vec<String>,
}

impl Scope {
    pub fn new<I, T>(school_ids: I) -> RankingResult<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for id in school_ids {
            let id = id.into();
            if !id.is_empty() && !unique.contains(&id) {
                unique.push(id);
            }
        }

        if unique.is_empty() {
            return Err(RankingError::InvalidScope(
                "at least one school id is required".to_string(),
            ));
        }

        Ok(Self { school_ids: unique })
    }

    pub fn school_ids(&self) -> &[String] {
        &self.school_ids
    }
}

/// Builds a scope from explicit school ids or, when given, a district id.
pub async fn resolve_scope<S>(
    store: &S,
    school_ids: &[String],
    district_id: Option<&str>,
) -> RankingResult<Scope>
where
    S: ReviewStore + ?Sized,
{
    match district_id {
        Some(district) => {
            let ids = store.district_school_ids(district).await?;
            debug!(district, schools = ids.len(), "resolved district scope");
            Scope::new(ids).map_err(|_| {
                RankingError::InvalidScope(format!("district {district} has no schools"))
            })
        }
        None => Scope::new(school_ids.iter().cloned()),
    }
}

/// Fetches every school in `scope` concurrently and merges the results.
///
/// A school whose fetch errors or exceeds `fetch_timeout` contributes no
/// reviews and is listed in `failed_schools`. The merged list follows scope
/// order, then `(created_on, review_id)` within a school, so completion
/// order never affects ranking. Dropping the returned future aborts any
/// fetch still in flight.
pub async fn fetch_scope<S>(store: Arc<S>, scope: &Scope, fetch_timeout: Duration) -> ScopeReviews
where
    S: ReviewStore + ?Sized,
{
    let mut tasks = JoinSet::new();
    for (index, school_id) in scope.school_ids().iter().enumerate() {
        let store = Arc::clone(&store);
        let school_id = school_id.clone();
        tasks.spawn(async move {
            let result = match tokio::time::timeout(fetch_timeout, store.fetch_reviews(&school_id))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(StoreError::Timeout {
                    school_id: school_id.clone(),
                    timeout: fetch_timeout,
                }),
            };
            (index, school_id, result)
        });
    }

    let mut settled: Vec<Option<Vec<Review>>> = vec![None; scope.school_ids().len()];
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, school_id, Ok(reviews))) => {
                debug!(school_id = %school_id, reviews = reviews.len(), "school fetch complete");
                settled[index] = Some(reviews);
            }
            Ok((_, school_id, Err(err))) => {
                warn!(school_id = %school_id, "school fetch failed, counting zero reviews: {err}");
            }
            Err(err) => {
                warn!("school fetch task did not finish: {err}");
            }
        }
    }

    let mut merged = ScopeReviews::default();
    for (school_id, outcome) in scope.school_ids().iter().zip(settled) {
        match outcome {
            Some(mut reviews) => {
                reviews.sort_by(|a, b| {
                    a.created_on
                        .cmp(&b.created_on)
                        .then_with(|| a.review_id.cmp(&b.review_id))
                });
                merged.reviews.extend(reviews);
            }
            None => merged.failed_schools.push(school_id.clone()),
        }
    }

    info!(
        schools = scope.school_ids().len(),
        failed = merged.failed_schools.len(),
        reviews = merged.reviews.len(),
        "scope fetch finished"
    );
    merged
}
