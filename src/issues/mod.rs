//! Issue lifecycle engine
//!
//! Business rules over the issue store: creation defaults, the flat
//! status set, the idempotent upvote toggle, staff assignment, and
//! admin-gated mutation. Correctness under concurrency comes from
//! single-document atomic updates, not application locks: the upvote
//! flip is a guarded `$addToSet` / `$pull` whose guard encodes the
//! membership state it was decided from, and a guard miss re-reads and
//! retries.

use bson::{doc, oid::ObjectId};
use serde_json::Value;
use tracing::info;

use crate::auth::gate::require_admin;
use crate::db::mongo::{MongoClient, MongoCollection};
use crate::db::schemas::{
    Category, GeoPoint, IssueDoc, Priority, Status, UserDoc, ISSUE_COLLECTION, USER_COLLECTION,
};
use crate::types::{Result, TownhallError};

/// Retries for a contended upvote toggle before giving up
const TOGGLE_RETRY_LIMIT: usize = 3;

/// A new issue submission, before validation
#[derive(Debug, Clone, Default)]
pub struct NewIssue {
    pub title: String,
    pub description: String,
    pub category: String,
    pub priority: Option<String>,
    pub image_url: Option<String>,
    pub lat: Option<Value>,
    pub lng: Option<Value>,
}

/// Validated issue fields, ready to persist
struct ValidatedIssue {
    title: String,
    description: String,
    category: Category,
    priority: Priority,
    image_url: String,
    location: GeoPoint,
}

/// Which way an upvote toggle goes, decided from the observed member set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ToggleDirection {
    Add,
    Remove,
}

/// The issue lifecycle engine
#[derive(Clone)]
pub struct IssueService {
    issues: MongoCollection<IssueDoc>,
    users: MongoCollection<UserDoc>,
}

impl IssueService {
    pub async fn new(mongo: &MongoClient) -> Result<Self> {
        Ok(Self {
            issues: mongo.collection::<IssueDoc>(ISSUE_COLLECTION).await?,
            users: mongo.collection::<UserDoc>(USER_COLLECTION).await?,
        })
    }

    /// Create an issue owned by the caller, in its initial state.
    pub async fn create(&self, creator: &UserDoc, input: NewIssue) -> Result<IssueDoc> {
        let fields = validate_new_issue(&input)?;
        let created_by = creator
            ._id
            .ok_or_else(|| TownhallError::Internal("creator has no id".into()))?;

        let issue = IssueDoc::new(
            fields.title,
            fields.description,
            fields.category,
            fields.priority,
            fields.image_url,
            fields.location,
            created_by,
        );

        let id = self.issues.insert_one(issue).await?;
        info!("issue {} created by {}", id.to_hex(), creator.email);

        self.issues
            .find_by_id(&id)
            .await?
            .ok_or_else(|| TownhallError::Database("inserted issue not found".into()))
    }

    /// All issues, public read
    pub async fn list_all(&self) -> Result<Vec<IssueDoc>> {
        self.issues.find_many(doc! {}).await
    }

    /// Issues in one category, public read
    pub async fn list_by_category(&self, category: Category) -> Result<Vec<IssueDoc>> {
        self.issues
            .find_many(doc! { "category": category.to_string() })
            .await
    }

    pub async fn find_by_id(&self, id: &ObjectId) -> Result<Option<IssueDoc>> {
        self.issues.find_by_id(id).await
    }

    /// Flip the caller's upvote on an issue.
    ///
    /// The direction is decided from the observed set, and the update is
    /// guarded by that observation: `$pull` only matches while the vote
    /// is present, `$addToSet` only while it is absent. A concurrent flip
    /// that invalidates the guard makes the update match nothing, in
    /// which case the state is re-read and the toggle retried.
    pub async fn toggle_upvote(&self, user_id: ObjectId, issue_id: &ObjectId) -> Result<IssueDoc> {
        for _ in 0..TOGGLE_RETRY_LIMIT {
            let issue = self
                .issues
                .find_by_id(issue_id)
                .await?
                .ok_or_else(|| TownhallError::NotFound("issue not found".into()))?;

            let (filter, update) = match toggle_direction(&issue.upvotes, &user_id) {
                ToggleDirection::Add => (
                    doc! { "_id": *issue_id, "upvotes": { "$ne": user_id } },
                    doc! { "$addToSet": { "upvotes": user_id } },
                ),
                ToggleDirection::Remove => (
                    doc! { "_id": *issue_id, "upvotes": user_id },
                    doc! { "$pull": { "upvotes": user_id } },
                ),
            };

            let result = self.issues.update_one(filter, update).await?;
            if result.matched_count > 0 {
                return self
                    .issues
                    .find_by_id(issue_id)
                    .await?
                    .ok_or_else(|| TownhallError::NotFound("issue not found".into()));
            }
            // guard miss: somebody flipped concurrently, or the issue was
            // deleted; the next read settles which
        }

        Err(TownhallError::Database(
            "upvote toggle contended beyond retry limit".into(),
        ))
    }

    /// Set an issue's status. Admin-only; the status value is already a
    /// member of the valid set by the time it is typed.
    pub async fn set_status(
        &self,
        actor: &UserDoc,
        issue_id: &ObjectId,
        status: Status,
    ) -> Result<IssueDoc> {
        require_admin(actor)?;

        let result = self
            .issues
            .update_one(
                doc! { "_id": *issue_id },
                doc! { "$set": { "status": status.to_string() } },
            )
            .await?;

        if result.matched_count == 0 {
            return Err(TownhallError::NotFound("issue not found".into()));
        }

        info!("issue {} status set to {}", issue_id.to_hex(), status);

        self.issues
            .find_by_id(issue_id)
            .await?
            .ok_or_else(|| TownhallError::NotFound("issue not found".into()))
    }

    /// Assign an issue to a staff member. Admin-only; the staff id must
    /// resolve to an existing account (any role).
    pub async fn assign(
        &self,
        actor: &UserDoc,
        issue_id: &ObjectId,
        staff_id: &ObjectId,
    ) -> Result<IssueDoc> {
        require_admin(actor)?;

        if self.users.find_by_id(staff_id).await?.is_none() {
            return Err(TownhallError::NotFound("staff not found".into()));
        }

        let result = self
            .issues
            .update_one(
                doc! { "_id": *issue_id },
                doc! { "$set": { "assigned_to": *staff_id } },
            )
            .await?;

        if result.matched_count == 0 {
            return Err(TownhallError::NotFound("issue not found".into()));
        }

        self.issues
            .find_by_id(issue_id)
            .await?
            .ok_or_else(|| TownhallError::NotFound("issue not found".into()))
    }

    /// Delete an issue. Admin-only.
    pub async fn remove(&self, actor: &UserDoc, issue_id: &ObjectId) -> Result<()> {
        require_admin(actor)?;

        let deleted = self.issues.delete_one(doc! { "_id": *issue_id }).await?;
        if deleted == 0 {
            return Err(TownhallError::NotFound("issue not found".into()));
        }

        info!("issue {} deleted by {}", issue_id.to_hex(), actor.email);
        Ok(())
    }
}

/// Validate a submission and fill in defaults.
fn validate_new_issue(input: &NewIssue) -> Result<ValidatedIssue> {
    let title = input.title.trim();
    let description = input.description.trim();

    if title.is_empty() || description.is_empty() {
        return Err(TownhallError::InvalidArgument(
            "title and description are required".into(),
        ));
    }

    let category: Category = input.category.parse()?;
    let priority = match input.priority.as_deref() {
        Some(p) => p.parse()?,
        None => Priority::default(),
    };

    // GeoJSON order: [lng, lat]
    let location = GeoPoint::new(
        coord_or_zero(input.lng.as_ref()),
        coord_or_zero(input.lat.as_ref()),
    );

    Ok(ValidatedIssue {
        title: title.to_string(),
        description: description.to_string(),
        category,
        priority,
        image_url: input.image_url.clone().unwrap_or_default(),
        location,
    })
}

/// Coordinates are parse-or-default by contract: absent or non-numeric
/// input normalizes to 0.0 and is never rejected.
fn coord_or_zero(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn toggle_direction(upvotes: &[ObjectId], user_id: &ObjectId) -> ToggleDirection {
    if upvotes.contains(user_id) {
        ToggleDirection::Remove
    } else {
        ToggleDirection::Add
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn submission() -> NewIssue {
        NewIssue {
            title: "Pothole on 5th".into(),
            description: "Deep pothole near the crosswalk".into(),
            category: "Potholes".into(),
            priority: None,
            image_url: None,
            lat: None,
            lng: None,
        }
    }

    #[test]
    fn valid_submission_gets_defaults() {
        let fields = validate_new_issue(&submission()).unwrap();
        assert_eq!(fields.category, Category::Potholes);
        assert_eq!(fields.priority, Priority::Medium);
        assert_eq!(fields.image_url, "");
        assert_eq!(fields.location.coordinates, [0.0, 0.0]);
    }

    #[test]
    fn blank_title_is_rejected() {
        let mut input = submission();
        input.title = "   ".into();
        assert!(matches!(
            validate_new_issue(&input),
            Err(TownhallError::InvalidArgument(_))
        ));
    }

    #[test]
    fn unknown_category_is_rejected() {
        let mut input = submission();
        input.category = "Sinkholes".into();
        assert!(validate_new_issue(&input).is_err());
    }

    #[test]
    fn unknown_priority_is_rejected() {
        let mut input = submission();
        input.priority = Some("Critical".into());
        assert!(validate_new_issue(&input).is_err());
    }

    #[test]
    fn coordinates_parse_or_default_to_zero() {
        assert_eq!(coord_or_zero(None), 0.0);
        assert_eq!(coord_or_zero(Some(&json!(12.97))), 12.97);
        assert_eq!(coord_or_zero(Some(&json!("77.59"))), 77.59);
        assert_eq!(coord_or_zero(Some(&json!("not-a-number"))), 0.0);
        assert_eq!(coord_or_zero(Some(&json!(null))), 0.0);
        assert_eq!(coord_or_zero(Some(&json!(true))), 0.0);
    }

    #[test]
    fn coordinates_land_in_geojson_order() {
        let mut input = submission();
        input.lat = Some(json!(12.97));
        input.lng = Some(json!(77.59));
        let fields = validate_new_issue(&input).unwrap();
        assert_eq!(fields.location.coordinates, [77.59, 12.97]);
    }

    #[test]
    fn toggle_alternates_direction() {
        let user = ObjectId::new();
        let mut upvotes: Vec<ObjectId> = Vec::new();

        assert_eq!(toggle_direction(&upvotes, &user), ToggleDirection::Add);
        upvotes.push(user);
        assert_eq!(toggle_direction(&upvotes, &user), ToggleDirection::Remove);
    }

    #[test]
    fn double_toggle_restores_the_original_set() {
        let user = ObjectId::new();
        let other = ObjectId::new();
        let original = vec![other];

        // apply the decided direction the way $addToSet/$pull do
        let mut set = original.clone();
        match toggle_direction(&set, &user) {
            ToggleDirection::Add => set.push(user),
            ToggleDirection::Remove => set.retain(|id| id != &user),
        }
        assert!(set.contains(&user));

        match toggle_direction(&set, &user) {
            ToggleDirection::Add => set.push(user),
            ToggleDirection::Remove => set.retain(|id| id != &user),
        }
        assert_eq!(set, original);
    }

    #[test]
    fn toggle_is_independent_per_user() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        let upvotes = vec![a];

        assert_eq!(toggle_direction(&upvotes, &a), ToggleDirection::Remove);
        assert_eq!(toggle_direction(&upvotes, &b), ToggleDirection::Add);
    }
}
