//! Issue document schema
//!
//! The civic issue record and its enumerated value sets. The enums parse
//! exactly their wire strings; anything else is rejected before a write
//! ever happens.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::types::TownhallError;

/// Collection name for issues
pub const ISSUE_COLLECTION: &str = "issues";

/// Issue category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Potholes,
    #[serde(rename = "Water Problems")]
    WaterProblems,
    #[serde(rename = "Street Lights")]
    StreetLights,
    #[serde(rename = "Waste Management")]
    WasteManagement,
    Others,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Category::Potholes => "Potholes",
            Category::WaterProblems => "Water Problems",
            Category::StreetLights => "Street Lights",
            Category::WasteManagement => "Waste Management",
            Category::Others => "Others",
        };
        write!(f, "{label}")
    }
}

impl FromStr for Category {
    type Err = TownhallError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Potholes" => Ok(Category::Potholes),
            "Water Problems" => Ok(Category::WaterProblems),
            "Street Lights" => Ok(Category::StreetLights),
            "Waste Management" => Ok(Category::WasteManagement),
            "Others" => Ok(Category::Others),
            other => Err(TownhallError::InvalidArgument(format!(
                "unknown category: {other}"
            ))),
        }
    }
}

/// Issue priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Priority::High => "High",
            Priority::Medium => "Medium",
            Priority::Low => "Low",
        };
        write!(f, "{label}")
    }
}

impl FromStr for Priority {
    type Err = TownhallError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "High" => Ok(Priority::High),
            "Medium" => Ok(Priority::Medium),
            "Low" => Ok(Priority::Low),
            other => Err(TownhallError::InvalidArgument(format!(
                "unknown priority: {other}"
            ))),
        }
    }
}

/// Issue lifecycle status.
///
/// A flat set, not a DAG: an admin may move an issue to any member, and
/// Solved is not terminal (a solved issue can be reopened).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Status {
    #[default]
    Pending,
    #[serde(rename = "In Progress")]
    InProgress,
    Solved,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Status::Pending => "Pending",
            Status::InProgress => "In Progress",
            Status::Solved => "Solved",
        };
        write!(f, "{label}")
    }
}

impl FromStr for Status {
    type Err = TownhallError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Status::Pending),
            "In Progress" => Ok(Status::InProgress),
            "Solved" => Ok(Status::Solved),
            other => Err(TownhallError::InvalidArgument(format!(
                "invalid status: {other}"
            ))),
        }
    }
}

/// GeoJSON point, coordinates ordered [lng, lat]
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct GeoPoint {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: [f64; 2],
}

impl GeoPoint {
    pub fn new(lng: f64, lat: f64) -> Self {
        Self {
            kind: "Point".to_string(),
            coordinates: [lng, lat],
        }
    }

    pub fn lng(&self) -> f64 {
        self.coordinates[0]
    }

    pub fn lat(&self) -> f64 {
        self.coordinates[1]
    }
}

impl Default for GeoPoint {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Issue document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct IssueDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at)
    #[serde(default)]
    pub metadata: Metadata,

    pub title: String,

    pub description: String,

    pub category: Category,

    #[serde(default)]
    pub priority: Priority,

    /// Opaque reference to an uploaded image; storage is external
    #[serde(default)]
    pub image_url: String,

    #[serde(default)]
    pub location: GeoPoint,

    /// Upvoting user ids; kept duplicate-free by $addToSet
    #[serde(default)]
    pub upvotes: Vec<ObjectId>,

    /// Immutable owner reference
    pub created_by: ObjectId,

    /// Staff member handling the issue, if assigned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<ObjectId>,

    #[serde(default)]
    pub status: Status,
}

impl IssueDoc {
    /// Create a new issue document in its initial state
    pub fn new(
        title: String,
        description: String,
        category: Category,
        priority: Priority,
        image_url: String,
        location: GeoPoint,
        created_by: ObjectId,
    ) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            title,
            description,
            category,
            priority,
            image_url,
            location,
            upvotes: Vec::new(),
            created_by,
            assigned_to: None,
            status: Status::Pending,
        }
    }

    /// Document id as hex, empty for unsaved documents
    pub fn id_hex(&self) -> String {
        self._id.map(|id| id.to_hex()).unwrap_or_default()
    }
}

impl IntoIndexes for IssueDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "category": 1 },
                Some(
                    IndexOptions::builder()
                        .name("category_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "status": 1 },
                Some(
                    IndexOptions::builder()
                        .name("status_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "created_by": 1 },
                Some(
                    IndexOptions::builder()
                        .name("created_by_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "location": "2dsphere" },
                Some(
                    IndexOptions::builder()
                        .name("location_2dsphere".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for IssueDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_roundtrip() {
        for category in [
            Category::Potholes,
            Category::WaterProblems,
            Category::StreetLights,
            Category::WasteManagement,
            Category::Others,
        ] {
            assert_eq!(category.to_string().parse::<Category>().unwrap(), category);
        }
    }

    #[test]
    fn unknown_category_is_rejected() {
        assert!("Sinkholes".parse::<Category>().is_err());
        assert!("potholes".parse::<Category>().is_err()); // case-sensitive wire form
    }

    #[test]
    fn status_roundtrip_includes_spaced_label() {
        assert_eq!("In Progress".parse::<Status>().unwrap(), Status::InProgress);
        assert_eq!(Status::InProgress.to_string(), "In Progress");
        for status in [Status::Pending, Status::InProgress, Status::Solved] {
            assert_eq!(status.to_string().parse::<Status>().unwrap(), status);
        }
    }

    #[test]
    fn invalid_status_is_rejected() {
        assert!("Closed".parse::<Status>().is_err());
        assert!("InProgress".parse::<Status>().is_err());
    }

    #[test]
    fn priority_defaults_to_medium() {
        assert_eq!(Priority::default(), Priority::Medium);
        assert!("Urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn new_issue_starts_pending_with_no_upvotes() {
        let issue = IssueDoc::new(
            "Broken lamp".into(),
            "Lamp at 5th and Main is out".into(),
            Category::StreetLights,
            Priority::default(),
            String::new(),
            GeoPoint::default(),
            ObjectId::new(),
        );
        assert_eq!(issue.status, Status::Pending);
        assert_eq!(issue.priority, Priority::Medium);
        assert!(issue.upvotes.is_empty());
        assert!(issue.assigned_to.is_none());
        assert_eq!(issue.location.coordinates, [0.0, 0.0]);
    }

    #[test]
    fn geo_point_orders_lng_then_lat() {
        let point = GeoPoint::new(77.59, 12.97);
        assert_eq!(point.lng(), 77.59);
        assert_eq!(point.lat(), 12.97);
        assert_eq!(point.kind, "Point");
    }
}
