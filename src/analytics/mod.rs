//! Analytics aggregator
//!
//! Read-only derivations over the issue store: counts, breakdowns, the
//! monthly solved series, and the most-upvoted category. No invariants of
//! its own. The grouping logic is plain folds over fetched documents so
//! it stays unit-testable; counts go through the store's counting query.

use bson::doc;
use chrono::Datelike;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::db::mongo::{MongoClient, MongoCollection};
use crate::db::schemas::{Category, IssueDoc, Priority, Status, ISSUE_COLLECTION};
use crate::types::Result;

/// Overall issue counts
#[derive(Debug, Serialize)]
pub struct Counts {
    pub total: u64,
    pub pending: u64,
    pub solved: u64,
}

/// Issues per category
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub category: Category,
    pub count: u64,
}

/// Issues per priority
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct PriorityCount {
    pub priority: Priority,
    pub count: u64,
}

/// Issues solved in one calendar month
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct MonthCount {
    /// Label like "Jan 2026"
    pub month: String,
    pub count: u64,
}

/// One issue flattened for map rendering
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapPoint {
    /// GeoJSON order: [lng, lat]
    pub coordinates: [f64; 2],
    pub category: Category,
    pub priority: Priority,
    pub status: Status,
}

/// Reduced issue view safe for any authenticated reader
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueDigest {
    pub id: String,
    pub category: Category,
    pub status: Status,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// Read-side aggregation service
#[derive(Clone)]
pub struct AnalyticsService {
    issues: MongoCollection<IssueDoc>,
}

impl AnalyticsService {
    pub async fn new(mongo: &MongoClient) -> Result<Self> {
        Ok(Self {
            issues: mongo.collection::<IssueDoc>(ISSUE_COLLECTION).await?,
        })
    }

    pub async fn counts(&self) -> Result<Counts> {
        let total = self.issues.count(doc! {}).await?;
        let pending = self
            .issues
            .count(doc! { "status": Status::Pending.to_string() })
            .await?;
        let solved = self
            .issues
            .count(doc! { "status": Status::Solved.to_string() })
            .await?;

        Ok(Counts {
            total,
            pending,
            solved,
        })
    }

    pub async fn category_breakdown(&self) -> Result<Vec<CategoryCount>> {
        let issues = self.issues.find_many(doc! {}).await?;
        Ok(fold_categories(&issues))
    }

    pub async fn priority_breakdown(&self) -> Result<Vec<PriorityCount>> {
        let issues = self.issues.find_many(doc! {}).await?;
        Ok(fold_priorities(&issues))
    }

    pub async fn solved_by_month(&self) -> Result<Vec<MonthCount>> {
        let solved = self
            .issues
            .find_many(doc! { "status": Status::Solved.to_string() })
            .await?;
        Ok(fold_solved_by_month(&solved))
    }

    pub async fn most_upvoted_category(&self) -> Result<Option<Category>> {
        let issues = self.issues.find_many(doc! {}).await?;
        Ok(fold_most_upvoted(&issues))
    }

    pub async fn heatmap(&self) -> Result<Vec<HeatmapPoint>> {
        let issues = self.issues.find_many(doc! {}).await?;
        Ok(heatmap_points(&issues))
    }

    pub async fn issue_digest(&self) -> Result<Vec<IssueDigest>> {
        let issues = self.issues.find_many(doc! {}).await?;
        Ok(issues.iter().map(digest).collect())
    }
}

/// Issues per category, descending by count. Categories with no issues
/// are omitted; ties order arbitrarily.
fn fold_categories(issues: &[IssueDoc]) -> Vec<CategoryCount> {
    let mut counts: HashMap<Category, u64> = HashMap::new();
    for issue in issues {
        *counts.entry(issue.category).or_default() += 1;
    }

    let mut breakdown: Vec<CategoryCount> = counts
        .into_iter()
        .map(|(category, count)| CategoryCount { category, count })
        .collect();
    breakdown.sort_by(|a, b| b.count.cmp(&a.count));
    breakdown
}

/// Issues per priority, descending by count
fn fold_priorities(issues: &[IssueDoc]) -> Vec<PriorityCount> {
    let mut counts: HashMap<Priority, u64> = HashMap::new();
    for issue in issues {
        *counts.entry(issue.priority).or_default() += 1;
    }

    let mut breakdown: Vec<PriorityCount> = counts
        .into_iter()
        .map(|(priority, count)| PriorityCount { priority, count })
        .collect();
    breakdown.sort_by(|a, b| b.count.cmp(&a.count));
    breakdown
}

/// Solved issues grouped by the calendar month of their last update,
/// ascending chronological. Issues that have never been stamped with an
/// update time are skipped.
fn fold_solved_by_month(solved: &[IssueDoc]) -> Vec<MonthCount> {
    let mut by_month: BTreeMap<(i32, u32), u64> = BTreeMap::new();

    for issue in solved {
        if issue.status != Status::Solved {
            continue;
        }
        let Some(updated_at) = issue.metadata.updated_at else {
            continue;
        };
        let when = updated_at.to_chrono();
        *by_month.entry((when.year(), when.month())).or_default() += 1;
    }

    by_month
        .into_iter()
        .map(|((year, month), count)| MonthCount {
            month: month_label(year, month),
            count,
        })
        .collect()
}

/// The category whose issues have the highest total upvote count, over
/// issues that have at least one upvote. None when nothing has been
/// upvoted. Ties break arbitrarily; the tie-break rule is deliberately
/// unspecified.
fn fold_most_upvoted(issues: &[IssueDoc]) -> Option<Category> {
    let mut votes: HashMap<Category, usize> = HashMap::new();
    for issue in issues {
        if !issue.upvotes.is_empty() {
            *votes.entry(issue.category).or_default() += issue.upvotes.len();
        }
    }

    votes
        .into_iter()
        .max_by_key(|(_, count)| *count)
        .map(|(category, _)| category)
}

fn heatmap_points(issues: &[IssueDoc]) -> Vec<HeatmapPoint> {
    issues
        .iter()
        .map(|issue| HeatmapPoint {
            coordinates: issue.location.coordinates,
            category: issue.category,
            priority: issue.priority,
            status: issue.status,
        })
        .collect()
}

fn digest(issue: &IssueDoc) -> IssueDigest {
    IssueDigest {
        id: issue.id_hex(),
        category: issue.category,
        status: issue.status,
        created_at: issue
            .metadata
            .created_at
            .map(|at| at.to_chrono().to_rfc3339()),
        updated_at: issue
            .metadata
            .updated_at
            .map(|at| at.to_chrono().to_rfc3339()),
    }
}

fn month_label(year: i32, month: u32) -> String {
    const MONTHS: [&str; 12] = [
        "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
    ];
    let name = MONTHS
        .get((month as usize).saturating_sub(1))
        .unwrap_or(&"???");
    format!("{name} {year}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::oid::ObjectId;
    use chrono::{TimeZone, Utc};
    use crate::db::schemas::GeoPoint;

    fn issue(category: Category, status: Status, upvote_count: usize) -> IssueDoc {
        let mut doc = IssueDoc::new(
            "title".into(),
            "description".into(),
            category,
            Priority::Medium,
            String::new(),
            GeoPoint::default(),
            ObjectId::new(),
        );
        doc.status = status;
        doc.upvotes = (0..upvote_count).map(|_| ObjectId::new()).collect();
        doc
    }

    fn solved_in(year: i32, month: u32) -> IssueDoc {
        let mut doc = issue(Category::Potholes, Status::Solved, 0);
        let when = Utc.with_ymd_and_hms(year, month, 15, 12, 0, 0).unwrap();
        doc.metadata.updated_at = Some(bson::DateTime::from_chrono(when));
        doc
    }

    #[test]
    fn categories_sort_descending_by_count() {
        let issues = vec![
            issue(Category::Potholes, Status::Pending, 0),
            issue(Category::Potholes, Status::Pending, 0),
            issue(Category::Potholes, Status::Solved, 0),
            issue(Category::StreetLights, Status::Pending, 0),
        ];

        let breakdown = fold_categories(&issues);
        assert_eq!(breakdown.len(), 2);
        assert_eq!(breakdown[0].category, Category::Potholes);
        assert_eq!(breakdown[0].count, 3);
        assert_eq!(breakdown[1].category, Category::StreetLights);
        assert_eq!(breakdown[1].count, 1);
    }

    #[test]
    fn empty_store_has_empty_breakdowns() {
        assert!(fold_categories(&[]).is_empty());
        assert!(fold_priorities(&[]).is_empty());
        assert!(fold_solved_by_month(&[]).is_empty());
    }

    #[test]
    fn solved_months_are_labelled_and_chronological() {
        let issues = vec![
            solved_in(2026, 3),
            solved_in(2025, 11),
            solved_in(2026, 3),
            solved_in(2026, 1),
        ];

        let monthly = fold_solved_by_month(&issues);
        assert_eq!(
            monthly,
            vec![
                MonthCount {
                    month: "Nov 2025".into(),
                    count: 1
                },
                MonthCount {
                    month: "Jan 2026".into(),
                    count: 1
                },
                MonthCount {
                    month: "Mar 2026".into(),
                    count: 2
                },
            ]
        );
    }

    #[test]
    fn unsolved_issues_never_enter_the_monthly_series() {
        let mut pending = solved_in(2026, 2);
        pending.status = Status::Pending;
        assert!(fold_solved_by_month(&[pending]).is_empty());
    }

    #[test]
    fn most_upvoted_sums_votes_per_category() {
        let issues = vec![
            issue(Category::Potholes, Status::Pending, 2),
            issue(Category::Potholes, Status::Pending, 2),
            issue(Category::WaterProblems, Status::Pending, 3),
        ];

        assert_eq!(fold_most_upvoted(&issues), Some(Category::Potholes));
    }

    #[test]
    fn most_upvoted_is_none_without_any_votes() {
        let issues = vec![
            issue(Category::Potholes, Status::Pending, 0),
            issue(Category::Others, Status::Solved, 0),
        ];
        assert_eq!(fold_most_upvoted(&issues), None);
        assert_eq!(fold_most_upvoted(&[]), None);
    }

    #[test]
    fn heatmap_carries_position_and_labels() {
        let mut doc = issue(Category::StreetLights, Status::InProgress, 1);
        doc.location = GeoPoint::new(77.59, 12.97);

        let points = heatmap_points(&[doc]);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].coordinates, [77.59, 12.97]);
        assert_eq!(points[0].category, Category::StreetLights);
        assert_eq!(points[0].status, Status::InProgress);
    }

    #[test]
    fn month_labels_use_short_month_names() {
        assert_eq!(month_label(2026, 1), "Jan 2026");
        assert_eq!(month_label(2025, 12), "Dec 2025");
    }
}
