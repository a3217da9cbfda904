//! Firestore-backed usage ledger.
//!
//! Layout:
//! - `users/{uid}`: plan, upload count, registration IP and timestamps
//! - `ip_registrations/{ip}/accounts/{uid}`: one document per account
//!   registered from an address
//!
//! Both registration documents are written in one atomic commit guarded by
//! an `exists=false` precondition on the user document, so a redelivered
//! event can never add a second IP association.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use docgate_models::{ClientIp, IpRegistration, PlanTier, RegistrationOutcome, RegistrationReceipt, UserAccount};
use docgate_quota::{LedgerError, LedgerResult, UsageLedger};

use crate::client::{FirestoreClient, MAX_BATCH_GET};
use crate::error::{FirestoreError, FirestoreResult};
use crate::types::{Document, DocumentMask, FromFirestoreValue, Precondition, ToFirestoreValue, Value, Write};

const USERS_COLLECTION: &str = "users";
const IP_REGISTRATIONS_COLLECTION: &str = "ip_registrations";
const ACCOUNTS_SUBCOLLECTION: &str = "accounts";

/// Page size when listing the accounts registered from one address.
const LIST_PAGE_SIZE: u32 = 300;

/// Optimistic-concurrency attempts for counter updates.
const MAX_UPDATE_RETRIES: u32 = 5;

mod field {
    pub const PLAN_TYPE: &str = "planType";
    pub const UPLOAD_COUNT: &str = "uploadCount";
    pub const REGISTRATION_IP: &str = "registrationIP";
    pub const REGISTERED_AT: &str = "registeredAt";
    pub const CREATED_AT: &str = "createdAt";
    pub const UPDATED_AT: &str = "updatedAt";
    pub const USER_ID: &str = "userId";
    pub const IP: &str = "ip";
}

/// Usage ledger stored in Firestore.
#[derive(Clone)]
pub struct FirestoreLedger {
    client: FirestoreClient,
}

impl FirestoreLedger {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    fn accounts_collection(ip: &ClientIp) -> String {
        format!(
            "{}/{}/{}",
            IP_REGISTRATIONS_COLLECTION,
            ip.storage_key(),
            ACCOUNTS_SUBCOLLECTION
        )
    }

    async fn fetch_user(&self, user_id: &str) -> FirestoreResult<Option<Document>> {
        self.client
            .with_retry("get_user", || self.client.get_document(USERS_COLLECTION, user_id))
            .await
    }

    async fn read_account(&self, user_id: &str) -> LedgerResult<(UserAccount, Option<String>)> {
        let doc = self
            .fetch_user(user_id)
            .await?
            .ok_or_else(|| LedgerError::not_found(user_id))?;
        let account = document_to_account(user_id, &doc)?;
        Ok((account, doc.update_time))
    }
}

#[async_trait]
impl UsageLedger for FirestoreLedger {
    fn backend_name(&self) -> &'static str {
        "firestore"
    }

    async fn record_registration(&self, user_id: &str, ip: &ClientIp) -> LedgerResult<RegistrationReceipt> {
        let account = UserAccount::registered(user_id, ip.clone(), Utc::now());

        let user_doc = Document::named(
            self.client.full_document_name(USERS_COLLECTION, user_id),
            account_to_fields(&account),
        );
        let association_doc = Document::named(
            self.client
                .full_document_name(&Self::accounts_collection(ip), user_id),
            association_fields(user_id, ip, account.created_at),
        );

        let committed = self
            .client
            .with_retry("record_registration", || {
                self.client.commit(vec![
                    Write::create(user_doc.clone()),
                    Write::upsert(association_doc.clone()),
                ])
            })
            .await;

        match committed {
            Ok(_) => {
                info!(user_id = %user_id, ip = %ip, "Recorded registration");
                Ok(RegistrationReceipt {
                    user_id: user_id.to_string(),
                    registration_ip: ip.clone(),
                    outcome: RegistrationOutcome::Created,
                })
            }
            Err(e @ (FirestoreError::AlreadyExists(_) | FirestoreError::PreconditionFailed(_))) => {
                debug!(user_id = %user_id, error = %e, "User already registered, reading stored record");
                let (existing, _) = self.read_account(user_id).await?;
                let stored_ip = existing.registration_ip.unwrap_or_else(|| ip.clone());
                if &stored_ip != ip {
                    warn!(
                        user_id = %user_id,
                        stored_ip = %stored_ip,
                        replayed_ip = %ip,
                        "Registration replay with a different IP, keeping original"
                    );
                }
                Ok(RegistrationReceipt {
                    user_id: user_id.to_string(),
                    registration_ip: stored_ip,
                    outcome: RegistrationOutcome::Replayed,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_usage(&self, user_id: &str) -> LedgerResult<UserAccount> {
        let (account, _) = self.read_account(user_id).await?;
        debug!(user_id = %user_id, plan = %account.plan, upload_count = account.upload_count, "Read usage");
        Ok(account)
    }

    async fn get_accounts_for_ip(&self, ip: &ClientIp) -> LedgerResult<Vec<IpRegistration>> {
        let collection = Self::accounts_collection(ip);
        let mut registrations = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self
                .client
                .with_retry("list_ip_accounts", || {
                    self.client
                        .list_documents(&collection, Some(LIST_PAGE_SIZE), page_token.as_deref())
                })
                .await?;

            for doc in page.documents.unwrap_or_default() {
                let Some(user_id) = doc.get::<String>(field::USER_ID).or_else(|| doc.id().map(str::to_string)) else {
                    warn!(ip = %ip, "Skipping IP association without a user id");
                    continue;
                };
                let registered_at = doc
                    .get::<DateTime<Utc>>(field::REGISTERED_AT)
                    .or_else(|| doc.create_time.as_deref().and_then(parse_timestamp))
                    .unwrap_or_else(Utc::now);
                registrations.push(IpRegistration {
                    user_id,
                    ip: ip.clone(),
                    registered_at,
                });
            }

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(ip = %ip, accounts = registrations.len(), "Listed IP registrations");
        Ok(registrations)
    }

    async fn get_plan_tiers(&self, user_ids: &[String]) -> LedgerResult<HashMap<String, PlanTier>> {
        let mut tiers = HashMap::with_capacity(user_ids.len());

        for chunk in user_ids.chunks(MAX_BATCH_GET) {
            let names: Vec<String> = chunk
                .iter()
                .map(|id| self.client.full_document_name(USERS_COLLECTION, id))
                .collect();

            let docs = self
                .client
                .with_retry("get_plan_tiers", || {
                    self.client
                        .batch_get_documents(names.clone(), Some(DocumentMask::new([field::PLAN_TYPE])))
                })
                .await?;

            for doc in docs {
                if let Some(id) = doc.id() {
                    let plan = doc
                        .get::<String>(field::PLAN_TYPE)
                        .map(|p| PlanTier::parse_or_free(&p))
                        .unwrap_or_default();
                    tiers.insert(id.to_string(), plan);
                }
            }
        }

        Ok(tiers)
    }

    async fn set_plan(&self, user_id: &str, plan: PlanTier) -> LedgerResult<UserAccount> {
        let mut update = HashMap::new();
        update.insert(field::PLAN_TYPE.to_string(), plan.as_str().to_firestore_value());
        update.insert(field::UPDATED_AT.to_string(), Utc::now().to_firestore_value());

        let precondition = Precondition::must_exist();
        let doc = self
            .client
            .with_retry("set_plan", || {
                self.client.update_document(
                    USERS_COLLECTION,
                    user_id,
                    update.clone(),
                    Some(&[field::PLAN_TYPE, field::UPDATED_AT]),
                    Some(&precondition),
                )
            })
            .await
            .map_err(|e| match e {
                FirestoreError::NotFound(_) => LedgerError::not_found(user_id),
                other => other.into(),
            })?;

        info!(user_id = %user_id, plan = %plan, "Updated plan");
        document_to_account(user_id, &doc)
    }

    async fn increment_upload_count(&self, user_id: &str, by: u32) -> LedgerResult<u32> {
        for attempt in 0..MAX_UPDATE_RETRIES {
            let (account, update_time) = self.read_account(user_id).await?;
            let next = account.upload_count.saturating_add(by);

            let mut update = HashMap::new();
            update.insert(field::UPLOAD_COUNT.to_string(), next.to_firestore_value());
            update.insert(field::UPDATED_AT.to_string(), Utc::now().to_firestore_value());

            let precondition = match update_time {
                Some(ts) => Precondition::updated_at(ts),
                None => Precondition::must_exist(),
            };

            match self
                .client
                .update_document(
                    USERS_COLLECTION,
                    user_id,
                    update,
                    Some(&[field::UPLOAD_COUNT, field::UPDATED_AT]),
                    Some(&precondition),
                )
                .await
            {
                Ok(_) => return Ok(next),
                Err(e) if e.is_precondition_failed() => {
                    debug!(
                        user_id = %user_id,
                        attempt = attempt + 1,
                        "Upload count changed concurrently, retrying"
                    );
                    tokio::time::sleep(std::time::Duration::from_millis(50 * (u64::from(attempt) + 1))).await;
                }
                Err(FirestoreError::NotFound(_)) => return Err(LedgerError::not_found(user_id)),
                Err(e) => return Err(e.into()),
            }
        }

        warn!(user_id = %user_id, retries = MAX_UPDATE_RETRIES, "Upload count update kept conflicting");
        Err(LedgerError::unavailable(format!(
            "upload count update for {} failed after {} attempts",
            user_id, MAX_UPDATE_RETRIES
        )))
    }

    async fn health_check(&self) -> LedgerResult<()> {
        self.client
            .list_documents(USERS_COLLECTION, Some(1), None)
            .await
            .map(|_| ())
            .map_err(Into::into)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.with_timezone(&Utc))
}

fn account_to_fields(account: &UserAccount) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert(field::PLAN_TYPE.to_string(), account.plan.as_str().to_firestore_value());
    fields.insert(field::UPLOAD_COUNT.to_string(), account.upload_count.to_firestore_value());
    fields.insert(
        field::REGISTRATION_IP.to_string(),
        account
            .registration_ip
            .as_ref()
            .map(|ip| ip.as_str().to_string())
            .to_firestore_value(),
    );
    fields.insert(field::REGISTERED_AT.to_string(), account.registered_at.to_firestore_value());
    fields.insert(field::CREATED_AT.to_string(), account.created_at.to_firestore_value());
    fields.insert(field::UPDATED_AT.to_string(), account.updated_at.to_firestore_value());
    fields
}

fn association_fields(user_id: &str, ip: &ClientIp, at: DateTime<Utc>) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert(field::USER_ID.to_string(), user_id.to_firestore_value());
    fields.insert(field::IP.to_string(), ip.as_str().to_firestore_value());
    fields.insert(field::REGISTERED_AT.to_string(), at.to_firestore_value());
    fields
}

fn document_to_account(user_id: &str, doc: &Document) -> LedgerResult<UserAccount> {
    let values = doc
        .fields
        .as_ref()
        .ok_or_else(|| LedgerError::InvalidRecord(format!("user {} has no fields", user_id)))?;
    let get = |key: &str| values.get(key);

    let created_at = get(field::CREATED_AT)
        .and_then(DateTime::<Utc>::from_firestore_value)
        .or_else(|| doc.create_time.as_deref().and_then(parse_timestamp))
        .unwrap_or_else(Utc::now);

    Ok(UserAccount {
        user_id: user_id.to_string(),
        plan: get(field::PLAN_TYPE)
            .and_then(String::from_firestore_value)
            .map(|p| PlanTier::parse_or_free(&p))
            .unwrap_or_default(),
        upload_count: get(field::UPLOAD_COUNT)
            .and_then(u32::from_firestore_value)
            .unwrap_or(0),
        registration_ip: get(field::REGISTRATION_IP)
            .and_then(String::from_firestore_value)
            .filter(|s| !s.is_empty())
            .map(ClientIp::from_stored),
        registered_at: get(field::REGISTERED_AT).and_then(DateTime::<Utc>::from_firestore_value),
        created_at,
        updated_at: get(field::UPDATED_AT)
            .and_then(DateTime::<Utc>::from_firestore_value)
            .unwrap_or(created_at),
    })
}
