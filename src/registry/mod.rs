//! Account registry
//!
//! Identity creation, credential checks, and the bounded admin pool.
//!
//! Admin admission is the one place where a read-then-write race could
//! violate an invariant (two concurrent signups both observing
//! `count < MAX_ADMINS`), so the ceiling check and the increment are a
//! single atomic `findOneAndUpdate` on a slot counter document: the
//! filter matches only while a slot is free, and the matched document is
//! incremented in the same operation. A reserved slot whose user insert
//! fails is released again, so admission is all-or-nothing.

use bson::{doc, oid::ObjectId, Document};
use mongodb::Collection;
use tracing::{info, warn};

use crate::auth::password::{hash_password, validate_password, verify_password};
use crate::auth::roles::Role;
use crate::db::mongo::{MongoClient, MongoCollection};
use crate::db::schemas::{UserDoc, USER_COLLECTION};
use crate::types::{Result, TownhallError};

/// Collection name for counters
pub const COUNTER_COLLECTION: &str = "counters";

/// Counter document id for the admin slot pool
const ADMIN_SLOTS_ID: &str = "admin_slots";

/// A signup request, before any validation
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password: String,
    pub requested_role: Option<Role>,
}

/// Creates and looks up accounts; enforces email uniqueness and the
/// admin pool ceiling.
#[derive(Clone)]
pub struct AccountRegistry {
    users: MongoCollection<UserDoc>,
    counters: Collection<Document>,
    max_admins: u32,
    admin_allowlist: Vec<String>,
}

impl AccountRegistry {
    /// Open the collections and make sure the admin slot counter exists.
    pub async fn new(
        mongo: &MongoClient,
        max_admins: u32,
        admin_allowlist: Vec<String>,
    ) -> Result<Self> {
        let users = mongo.collection::<UserDoc>(USER_COLLECTION).await?;
        let counters = mongo
            .inner()
            .database(mongo.db_name())
            .collection::<Document>(COUNTER_COLLECTION);

        let registry = Self {
            users,
            counters,
            max_admins,
            admin_allowlist: admin_allowlist
                .into_iter()
                .map(|email| email.trim().to_lowercase())
                .collect(),
        };

        registry.ensure_admin_counter().await?;
        Ok(registry)
    }

    /// Create the slot counter if missing, seeded with the current number
    /// of admin accounts so a fresh counter agrees with pre-existing data.
    async fn ensure_admin_counter(&self) -> Result<()> {
        let admin_count = self.users.count(doc! { "role": "admin" }).await? as i64;

        self.counters
            .update_one(
                doc! { "_id": ADMIN_SLOTS_ID },
                doc! { "$setOnInsert": { "count": admin_count } },
            )
            .upsert(true)
            .await
            .map_err(|e| {
                TownhallError::Database(format!("admin counter init failed: {e}"))
            })?;

        Ok(())
    }

    /// Register a new account.
    ///
    /// Admin signups must be allow-listed and must win a slot under the
    /// pool ceiling; either failure leaves no trace in the datastore.
    pub async fn register(&self, account: NewAccount) -> Result<UserDoc> {
        let name = account.name.trim().to_string();
        let email = normalize_email(&account.email);

        if name.is_empty() || email.is_empty() {
            return Err(TownhallError::InvalidArgument(
                "name and email are required".into(),
            ));
        }
        validate_password(&account.password)?;

        // Friendly pre-check; the unique index is the backstop under races
        if self.users.find_one(doc! { "email": &email }).await?.is_some() {
            return Err(TownhallError::Conflict(
                "an account with this email already exists".into(),
            ));
        }

        let role = resolve_role(account.requested_role, &email, &self.admin_allowlist)?;
        let password_hash = hash_password(&account.password)?;

        let slot_reserved = if role.is_admin() {
            self.reserve_admin_slot().await?;
            true
        } else {
            false
        };

        let user = UserDoc::new(name, email.clone(), password_hash, role);

        match self.users.insert_one(user).await {
            Ok(id) => {
                info!("registered {} account: {}", role, email);
                self.users
                    .find_by_id(&id)
                    .await?
                    .ok_or_else(|| TownhallError::Database("inserted user not found".into()))
            }
            Err(e) => {
                if slot_reserved {
                    self.release_admin_slot().await;
                }
                if is_duplicate_key(&e) {
                    Err(TownhallError::Conflict(
                        "an account with this email already exists".into(),
                    ))
                } else {
                    Err(e)
                }
            }
        }
    }

    /// Check credentials, optionally asserting an expected role.
    ///
    /// Unknown email, wrong password, and role mismatch all return the
    /// same generic error so the API cannot be used to enumerate accounts.
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
        expected_role: Option<Role>,
    ) -> Result<UserDoc> {
        let email = normalize_email(email);

        let user = match self.users.find_one(doc! { "email": &email }).await? {
            Some(user) => user,
            None => {
                warn!("login failed - unknown email: {}", email);
                return Err(TownhallError::Unauthorized);
            }
        };

        if !verify_password(password, &user.password_hash)? {
            warn!("login failed - wrong password: {}", email);
            return Err(TownhallError::Unauthorized);
        }

        if let Some(role) = expected_role {
            if role != user.role {
                warn!("login failed - role mismatch: {}", email);
                return Err(TownhallError::Unauthorized);
            }
        }

        Ok(user)
    }

    /// Look up an account by id
    pub async fn find_by_id(&self, id: &ObjectId) -> Result<Option<UserDoc>> {
        self.users.find_by_id(id).await
    }

    /// Look up an account by email (normalized)
    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserDoc>> {
        self.users
            .find_one(doc! { "email": normalize_email(email) })
            .await
    }

    /// All accounts; callers must strip credential hashes before serving
    pub async fn list(&self) -> Result<Vec<UserDoc>> {
        self.users.find_many(doc! {}).await
    }

    async fn reserve_admin_slot(&self) -> Result<()> {
        let (filter, update) = admin_slot_reservation(self.max_admins);

        let reserved = self
            .counters
            .find_one_and_update(filter, update)
            .await
            .map_err(|e| {
                TownhallError::Database(format!("admin slot reservation failed: {e}"))
            })?;

        match reserved {
            Some(_) => Ok(()),
            None => Err(TownhallError::Forbidden("admin limit reached".into())),
        }
    }

    /// Return a reserved slot after a failed insert. Best effort: a missed
    /// release under-counts free slots, which is the safe direction.
    async fn release_admin_slot(&self) {
        let result = self
            .counters
            .update_one(
                doc! { "_id": ADMIN_SLOTS_ID, "count": { "$gt": 0 } },
                doc! { "$inc": { "count": -1 } },
            )
            .await;

        if let Err(e) = result {
            warn!("failed to release admin slot: {}", e);
        }
    }
}

/// The admission query pair. The ceiling lives in the filter: it matches
/// the counter document only while `count < max_admins`, and the matched
/// document is incremented in the same atomic operation, so concurrent
/// reservations can never overshoot the pool.
fn admin_slot_reservation(max_admins: u32) -> (Document, Document) {
    (
        doc! { "_id": ADMIN_SLOTS_ID, "count": { "$lt": max_admins as i64 } },
        doc! { "$inc": { "count": 1 } },
    )
}

/// Decide the admitted role for a signup. Admin requests must be
/// allow-listed; everything else is a citizen.
fn resolve_role(requested: Option<Role>, email: &str, allowlist: &[String]) -> Result<Role> {
    match requested {
        Some(Role::Admin) => {
            if allowlist.iter().any(|allowed| allowed == email) {
                Ok(Role::Admin)
            } else {
                Err(TownhallError::Forbidden(
                    "this email is not allowed as admin".into(),
                ))
            }
        }
        Some(Role::Citizen) | None => Ok(Role::Citizen),
    }
}

/// Emails compare and store lowercased
fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Duplicate-key detection on the stringified driver error, the same way
/// the insert path reports it (code E11000).
fn is_duplicate_key(err: &TownhallError) -> bool {
    let text = err.to_string();
    text.contains("duplicate key") || text.contains("E11000")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_is_normalized() {
        assert_eq!(normalize_email("  Mayor@City.GOV "), "mayor@city.gov");
    }

    #[test]
    fn default_signup_is_citizen() {
        assert_eq!(
            resolve_role(None, "anyone@example.com", &[]).unwrap(),
            Role::Citizen
        );
        assert_eq!(
            resolve_role(Some(Role::Citizen), "anyone@example.com", &[]).unwrap(),
            Role::Citizen
        );
    }

    #[test]
    fn admin_signup_requires_allowlist() {
        let allowlist = vec!["mayor@city.gov".to_string()];

        assert_eq!(
            resolve_role(Some(Role::Admin), "mayor@city.gov", &allowlist).unwrap(),
            Role::Admin
        );

        let err = resolve_role(Some(Role::Admin), "intruder@city.gov", &allowlist).unwrap_err();
        assert!(matches!(err, TownhallError::Forbidden(_)));
    }

    #[test]
    fn allowlist_alone_does_not_bypass_the_ceiling() {
        // Role resolution only answers the allow-list question; the slot
        // reservation below is what bounds the pool.
        let allowlist = vec!["mayor@city.gov".to_string()];
        assert!(resolve_role(Some(Role::Admin), "mayor@city.gov", &allowlist).is_ok());

        let (filter, update) = admin_slot_reservation(2);
        let ceiling = filter.get_document("count").unwrap();
        assert_eq!(ceiling.get_i64("$lt").unwrap(), 2);
        assert_eq!(
            update.get_document("$inc").unwrap().get_i32("count").unwrap(),
            1
        );
    }

    #[test]
    fn reservation_filter_embeds_the_ceiling() {
        // The check and the increment are one operation: the filter
        // refuses to match once count reaches the ceiling, so two racing
        // reservations cannot both succeed on the last slot.
        let (filter, _) = admin_slot_reservation(5);
        assert_eq!(filter.get_str("_id").unwrap(), ADMIN_SLOTS_ID);
        assert_eq!(
            filter.get_document("count").unwrap().get_i64("$lt").unwrap(),
            5
        );
    }

    #[test]
    fn duplicate_key_is_detected_from_driver_text() {
        let err = TownhallError::Database(
            "insert failed: E11000 duplicate key error collection: townhall.users".into(),
        );
        assert!(is_duplicate_key(&err));

        let other = TownhallError::Database("insert failed: connection reset".into());
        assert!(!is_duplicate_key(&other));
    }
}
