use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use crate::models::{RankingItem, Rankings, Review, ReviewType};

pub const DEFAULT_LIMIT: usize = 100;

/// Builds the overall and per-city leaderboards from a flat review list.
///
/// Substitutes are grouped in first-seen order, and that order breaks ties
/// between equal overall values in both views.
pub fn rank(reviews: &[Review], limit: usize) -> Rankings {
    let items: Vec<RankingItem> = group_by_substitute(reviews)
        .into_iter()
        .map(summarize_group)
        .collect();

    let mut overall = items.clone();
    sort_by_value(&mut overall);
    overall.truncate(limit);

    let mut by_city: BTreeMap<String, Vec<RankingItem>> = BTreeMap::new();
    for item in items {
        by_city.entry(item.city.clone()).or_default().push(item);
    }
    for city_items in by_city.values_mut() {
        sort_by_value(city_items);
        city_items.truncate(limit);
    }

    Rankings { overall, by_city }
}

/// Every review for `sub_id`, in the order they were fetched.
pub fn reviews_for(sub_id: &str, all_reviews: &[Review]) -> Vec<Review> {
    all_reviews
        .iter()
        .filter(|review| review.sub_id == sub_id)
        .cloned()
        .collect()
}

fn group_by_substitute(reviews: &[Review]) -> Vec<Vec<&Review>> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<Vec<&Review>> = Vec::new();

    for review in reviews {
        let slot = *index.entry(review.sub_id.as_str()).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(review);
    }

    groups
}

fn summarize_group(group: Vec<&Review>) -> RankingItem {
    let first = group[0];
    let mut category_totals: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    let mut total = 0.0;
    let mut compliment_count = 0usize;
    let mut complaint_count = 0usize;

    for review in &group {
        total += review.value_score;
        match review.review_type {
            ReviewType::Compliment => compliment_count += 1,
            ReviewType::Complaint => complaint_count += 1,
        }
        let entry = category_totals
            .entry(review.category.key().to_string())
            .or_insert((0.0, 0));
        entry.0 += review.value_score;
        entry.1 += 1;
    }

    let category_breakdown = category_totals
        .into_iter()
        .map(|(key, (sum, count))| (key, sum / count as f64))
        .collect();

    RankingItem {
        sub_id: first.sub_id.clone(),
        sub_user_id: first.sub_user_id.clone(),
        sub_name: first.sub_name.clone(),
        city: first.city().to_string(),
        overall_value: total / group.len() as f64,
        category_breakdown,
        compliment_count,
        complaint_count,
        review_count: group.len(),
    }
}

// Vec::sort_by is stable, so equal values keep discovery order.
fn sort_by_value(items: &mut [RankingItem]) {
    items.sort_by(|a, b| {
        b.overall_value
            .partial_cmp(&a.overall_value)
            .unwrap_or(Ordering::Equal)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReviewCategory;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn review(sub_id: &str, category: &str, review_type: ReviewType, score: f64) -> Review {
        Review {
            review_id: Uuid::new_v4(),
            sub_id: sub_id.to_string(),
            sub_user_id: format!("user-{sub_id}"),
            sub_name: format!("Sub {sub_id}"),
            school_id: "school-a".to_string(),
            school_name: "Lincoln Elementary".to_string(),
            school_city: "Austin".to_string(),
            review_type,
            category: ReviewCategory::from_key(category),
            value_score: score,
            comment: None,
            created_on: NaiveDate::from_ymd_opt(2026, 2, 2).unwrap(),
        }
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn empty_input_yields_empty_rankings() {
        let rankings = rank(&[], DEFAULT_LIMIT);
        assert!(rankings.overall.is_empty());
        assert!(rankings.by_city.is_empty());
    }

    #[test]
    fn means_use_per_category_denominators() {
        let reviews = vec![
            review("s1", "A", ReviewType::Compliment, 2.0),
            review("s1", "A", ReviewType::Complaint, 4.0),
            review("s1", "B", ReviewType::Compliment, 10.0),
        ];

        let rankings = rank(&reviews, DEFAULT_LIMIT);
        let item = &rankings.overall[0];
        assert_close(item.overall_value, 16.0 / 3.0);
        assert_close(item.category_breakdown["A"], 3.0);
        assert_close(item.category_breakdown["B"], 10.0);
        assert_eq!(item.category_breakdown.len(), 2);
    }

    #[test]
    fn every_review_lands_in_exactly_one_group() {
        let reviews = vec![
            review("s1", "punctuality", ReviewType::Compliment, 8.0),
            review("s2", "punctuality", ReviewType::Complaint, 3.0),
            review("s1", "communication", ReviewType::Complaint, 4.0),
            review("s3", "professionalism", ReviewType::Compliment, 7.0),
            review("s2", "hall_duty", ReviewType::Compliment, 6.0),
        ];

        let rankings = rank(&reviews, DEFAULT_LIMIT);
        let total: usize = rankings.overall.iter().map(|item| item.review_count).sum();
        assert_eq!(total, reviews.len());
        assert_eq!(rankings.overall.len(), 3);

        for item in &rankings.overall {
            assert_eq!(item.compliment_count + item.complaint_count, item.review_count);
        }

        let s2 = rankings.overall.iter().find(|item| item.sub_id == "s2").unwrap();
        assert_close(s2.category_breakdown["hall_duty"], 6.0);
    }

    #[test]
    fn overall_is_sorted_descending_and_bounded() {
        let reviews = vec![
            review("low", "punctuality", ReviewType::Complaint, 1.0),
            review("high", "punctuality", ReviewType::Compliment, 9.0),
            review("mid", "punctuality", ReviewType::Compliment, 5.0),
        ];

        let rankings = rank(&reviews, 2);
        assert_eq!(rankings.overall.len(), 2);
        assert_eq!(rankings.overall[0].sub_id, "high");
        assert_eq!(rankings.overall[1].sub_id, "mid");
        assert!(rankings
            .overall
            .windows(2)
            .all(|pair| pair[0].overall_value >= pair[1].overall_value));
        assert_eq!(rankings.by_city["Austin"].len(), 2);
    }

    #[test]
    fn ties_keep_discovery_order() {
        let reviews = vec![
            review("first", "punctuality", ReviewType::Compliment, 7.0),
            review("second", "punctuality", ReviewType::Compliment, 7.0),
            review("third", "punctuality", ReviewType::Compliment, 7.0),
        ];

        let rankings = rank(&reviews, DEFAULT_LIMIT);
        let order: Vec<&str> = rankings
            .overall
            .iter()
            .map(|item| item.sub_id.as_str())
            .collect();
        assert_eq!(order, vec!["first", "second", "third"]);
    }

    #[test]
    fn empty_city_falls_back_to_school_name() {
        let mut first = review("s1", "punctuality", ReviewType::Compliment, 8.0);
        first.school_city = String::new();
        let second = review("s1", "punctuality", ReviewType::Compliment, 6.0);

        let rankings = rank(&[first, second], DEFAULT_LIMIT);
        assert_eq!(rankings.overall[0].city, "Lincoln Elementary");
        assert!(rankings.by_city.contains_key("Lincoln Elementary"));
        assert!(!rankings.by_city.contains_key("Austin"));
    }

    #[test]
    fn identity_comes_from_first_review() {
        let first = review("s1", "punctuality", ReviewType::Compliment, 8.0);
        let mut renamed = review("s1", "punctuality", ReviewType::Compliment, 6.0);
        renamed.sub_name = "Renamed Sub".to_string();
        renamed.school_city = "Dallas".to_string();

        let rankings = rank(&[first, renamed], DEFAULT_LIMIT);
        assert_eq!(rankings.overall[0].sub_name, "Sub s1");
        assert_eq!(rankings.overall[0].city, "Austin");
    }

    #[test]
    fn ranking_twice_gives_identical_output() {
        let reviews = vec![
            review("s1", "punctuality", ReviewType::Compliment, 8.0),
            review("s2", "communication", ReviewType::Complaint, 2.0),
        ];

        assert_eq!(rank(&reviews, DEFAULT_LIMIT), rank(&reviews, DEFAULT_LIMIT));
    }

    #[test]
    fn truncates_to_default_limit() {
        let reviews: Vec<Review> = (0..150)
            .map(|i| {
                review(
                    &format!("s{i}"),
                    "punctuality",
                    ReviewType::Compliment,
                    i as f64,
                )
            })
            .collect();

        let rankings = rank(&reviews, DEFAULT_LIMIT);
        assert_eq!(rankings.overall.len(), 100);
        assert_close(rankings.overall[0].overall_value, 149.0);
        assert_close(rankings.overall[99].overall_value, 50.0);
        assert_eq!(rankings.by_city["Austin"].len(), 100);
    }

    #[test]
    fn city_lists_are_sorted_with_stable_ties_then_truncated() {
        let mut dallas = review("d1", "punctuality", ReviewType::Compliment, 10.0);
        dallas.school_city = "Dallas".to_string();
        let reviews = vec![
            review("a", "punctuality", ReviewType::Compliment, 4.0),
            review("b", "punctuality", ReviewType::Compliment, 8.0),
            dallas,
            review("c", "punctuality", ReviewType::Compliment, 6.0),
            review("d", "punctuality", ReviewType::Compliment, 8.0),
            review("e", "punctuality", ReviewType::Complaint, 2.0),
        ];

        let city_order = |rankings: &Rankings, city: &str| -> Vec<String> {
            rankings.by_city[city]
                .iter()
                .map(|item| item.sub_id.clone())
                .collect()
        };

        let full = rank(&reviews, DEFAULT_LIMIT);
        assert_eq!(city_order(&full, "Austin"), vec!["b", "d", "c", "a", "e"]);
        assert_eq!(city_order(&full, "Dallas"), vec!["d1"]);

        let truncated = rank(&reviews, 3);
        assert_eq!(city_order(&truncated, "Austin"), vec!["b", "d", "c"]);
        assert_eq!(city_order(&truncated, "Dallas"), vec!["d1"]);
    }

    #[test]
    fn city_view_includes_substitutes_already_in_overall() {
        let mut dallas = review("s2", "punctuality", ReviewType::Compliment, 4.0);
        dallas.school_city = "Dallas".to_string();
        let reviews = vec![
            review("s1", "punctuality", ReviewType::Compliment, 9.0),
            dallas,
        ];

        let rankings = rank(&reviews, 1);
        assert_eq!(rankings.overall.len(), 1);
        assert_eq!(rankings.overall[0].sub_id, "s1");
        assert_eq!(rankings.by_city["Austin"][0].sub_id, "s1");
        assert_eq!(rankings.by_city["Dallas"][0].sub_id, "s2");
    }

    #[test]
    fn reviews_for_filters_in_fetch_order() {
        let reviews = vec![
            review("s1", "punctuality", ReviewType::Compliment, 8.0),
            review("s2", "punctuality", ReviewType::Complaint, 3.0),
            review("s1", "communication", ReviewType::Complaint, 4.0),
        ];

        let detail = reviews_for("s1", &reviews);
        assert_eq!(detail.len(), 2);
        assert_eq!(detail[0].review_id, reviews[0].review_id);
        assert_eq!(detail[1].review_id, reviews[2].review_id);
        assert!(reviews_for("missing", &reviews).is_empty());
    }
}
