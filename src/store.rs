use std::collections::HashMap;
#[cfg(test)]
use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::Review;

/// Read side of the review store. Implementations filter server-side by
/// exact school id and make no promise about row order.
#[async_trait]
pub trait ReviewStore: Send + Sync + 'static {
    async fn fetch_reviews(&self, school_id: &str) -> Result<Vec<Review>, StoreError>;

    async fn district_school_ids(&self, district_id: &str) -> Result<Vec<String>, StoreError>;
}

/// Store backed by plain maps. Used for tests and for ranking reviews loaded
/// from a CSV file without a database.
#[derive(Default)]
pub struct MemoryStore {
    pub reviews: HashMap<String, Vec<Review>>,
    pub districts: HashMap<String, Vec<String>>,
}

impl MemoryStore {
    pub fn from_reviews(reviews: impl IntoIterator<Item = Review>) -> Self {
        let mut store = Self::default();
        for review in reviews {
            store
                .reviews
                .entry(review.school_id.clone())
                .or_default()
                .push(review);
        }
        store
    }

    #[cfg(test)]
    pub fn with_district(mut self, district_id: &str, school_ids: &[&str]) -> Self {
        self.districts.insert(
            district_id.to_string(),
            school_ids.iter().map(|id| id.to_string()).collect(),
        );
        self
    }
}

#[async_trait]
impl ReviewStore for MemoryStore {
    async fn fetch_reviews(&self, school_id: &str) -> Result<Vec<Review>, StoreError> {
        Ok(self.reviews.get(school_id).cloned().unwrap_or_default())
    }

    async fn district_school_ids(&self, district_id: &str) -> Result<Vec<String>, StoreError> {
        Ok(self.districts.get(district_id).cloned().unwrap_or_default())
    }
}

/// Wraps a [`MemoryStore`] and injects failures and delays per school.
#[cfg(test)]
#[derive(Default)]
pub struct FaultyStore {
    pub inner: MemoryStore,
    pub failing_schools: Vec<String>,
    pub slow_schools: Vec<String>,
    pub slow_delay: Duration,
}

#[cfg(test)]
impl FaultyStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }
}

#[cfg(test)]
#[async_trait]
impl ReviewStore for FaultyStore {
    async fn fetch_reviews(&self, school_id: &str) -> Result<Vec<Review>, StoreError> {
        if self.slow_schools.iter().any(|id| id == school_id) {
            tokio::time::sleep(self.slow_delay).await;
        }
        if self.failing_schools.iter().any(|id| id == school_id) {
            return Err(StoreError::Unavailable(format!(
                "school {school_id} is offline"
            )));
        }
        self.inner.fetch_reviews(school_id).await
    }

    async fn district_school_ids(&self, district_id: &str) -> Result<Vec<String>, StoreError> {
        self.inner.district_school_ids(district_id).await
    }
}
