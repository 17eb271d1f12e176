use std::fmt::Write;

use crate::models::{label_for_key, RankingItem, Rankings, Review, ScopeReviews};
use crate::ranking::{self, reviews_for};

pub const DETAIL_LIMIT: usize = 5;

/// One-line summary of a ranked substitute, as printed by the CLI.
pub fn format_row(position: usize, item: &RankingItem) -> String {
    format!(
        "{}. {} ({}) overall {:.1} across {} reviews, {} compliments / {} complaints",
        position,
        item.sub_name,
        item.city,
        item.overall_value,
        item.review_count,
        item.compliment_count,
        item.complaint_count
    )
}

pub fn format_breakdown(item: &RankingItem) -> String {
    item.category_breakdown
        .iter()
        .map(|(key, value)| format!("{} {:.1}", label_for_key(key), value))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn format_review(review: &Review) -> String {
    let mut line = format!(
        "{} {} at {} ({}): {:.1}",
        review.created_on,
        review.review_type.as_str(),
        review.school_name,
        review.category,
        review.value_score
    );
    if let Some(comment) = &review.comment {
        let _ = write!(line, " \"{comment}\"");
    }
    line
}

/// Plain-text leaderboard grouped by city, as printed by `rank --by-city`.
pub fn format_city_leaderboard(rankings: &Rankings) -> String {
    let mut output = String::new();
    for (city, items) in &rankings.by_city {
        let _ = writeln!(output, "{city}:");
        for (index, item) in items.iter().enumerate() {
            let _ = writeln!(output, "  {}", format_row(index + 1, item));
            let _ = writeln!(output, "     {}", format_breakdown(item));
        }
    }
    output
}

fn write_leaderboard(output: &mut String, items: &[RankingItem], all_reviews: &[Review]) {
    for (index, item) in items.iter().enumerate() {
        let _ = writeln!(output, "{}", format_row(index + 1, item));
        let _ = writeln!(output, "   - Categories: {}", format_breakdown(item));
        for review in reviews_for(&item.sub_id, all_reviews)
            .iter()
            .take(DETAIL_LIMIT)
        {
            let _ = writeln!(output, "   - {}", format_review(review));
        }
    }
}

pub fn build_report(scope_label: &str, fetched: &ScopeReviews, limit: usize) -> String {
    let Rankings { overall, by_city } = ranking::rank(&fetched.reviews, limit);

    let mut output = String::new();
    let _ = writeln!(output, "# Substitute Rankings Report");
    let _ = writeln!(
        output,
        "Generated for {} ({} reviews, top {})",
        scope_label,
        fetched.reviews.len(),
        limit
    );

    if fetched.is_incomplete() {
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "> Results may be incomplete: no reviews could be loaded for {}.",
            fetched.failed_schools.join(", ")
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Overall");

    if overall.is_empty() {
        let _ = writeln!(output, "No substitute reviews recorded for this scope.");
    } else {
        write_leaderboard(&mut output, &overall, &fetched.reviews);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## By City");

    if by_city.is_empty() {
        let _ = writeln!(output, "No substitute reviews recorded for this scope.");
    } else {
        for (city, items) in &by_city {
            let _ = writeln!(output);
            let _ = writeln!(output, "### {city}");
            write_leaderboard(&mut output, items, &fetched.reviews);
        }
    }

    output
}
