// libs/progress-cell/src/services/progress.rs
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use prehab_cell::models::{Prehab, ScheduledItem, ScheduledItemStatus};
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::{Role, User};

use crate::models::{
    MarkDoneRequest, MarkSeenBulkRequest, MarkSeenRequest, ProgressError, ScheduleSearchQuery,
};

/// Lifecycle of scheduled items: patient completion reports and doctor
/// review flags. Every write is a single guarded PATCH so the
/// Pending-to-terminal transition stays check-then-act atomic.
pub struct ProgressService {
    supabase: SupabaseClient,
}

impl ProgressService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// List scheduled items visible to the caller, most recent first
    /// (descending insertion sequence).
    pub async fn list_schedule(
        &self,
        user: &User,
        query: ScheduleSearchQuery,
        auth_token: &str,
    ) -> Result<Vec<ScheduledItem>, ProgressError> {
        let mut query_parts = Vec::new();

        let visible_prehabs = self.visible_prehab_ids(user, &query, auth_token).await?;
        match visible_prehabs {
            Some(ids) if ids.is_empty() => return Ok(Vec::new()),
            Some(ids) => {
                let id_list = ids.iter().map(Uuid::to_string).collect::<Vec<_>>().join(",");
                query_parts.push(format!("prehab_id=in.({})", id_list));
            }
            None => {
                if let Some(prehab_id) = query.prehab_id {
                    query_parts.push(format!("prehab_id=eq.{}", prehab_id));
                }
            }
        }

        if let Some(status) = query.status {
            query_parts.push(format!("status=eq.{}", status));
        }
        query_parts.push("order=created_at.desc,sequence.desc".to_string());

        let mut path = format!("/rest/v1/scheduled_items?{}", query_parts.join("&"));
        if let Some(limit) = query.limit {
            path.push_str(&format!("&limit={}", limit));
        }
        if let Some(offset) = query.offset {
            path.push_str(&format!("&offset={}", offset));
        }

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ProgressError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(|value| {
                serde_json::from_value(value).map_err(|e| {
                    ProgressError::DatabaseError(format!("Failed to parse scheduled item: {}", e))
                })
            })
            .collect()
    }

    /// Get one scheduled item, enforcing ownership through its prehab.
    pub async fn get_item(
        &self,
        user: &User,
        item_id: Uuid,
        auth_token: &str,
    ) -> Result<ScheduledItem, ProgressError> {
        let item = self.fetch_item(item_id, auth_token).await?;
        let prehab = self.fetch_prehab(item.prehab_id, auth_token).await?;

        match user.role {
            Role::Admin => {}
            Role::Doctor => {
                if prehab.created_by != user.id {
                    return Err(ProgressError::Unauthorized);
                }
            }
            Role::Patient => {
                if prehab.patient_id != user.id {
                    return Err(ProgressError::Unauthorized);
                }
            }
        }

        Ok(item)
    }

    /// Patient reports an item as done (or failed). One-shot: only a Pending
    /// item can be reported, and the guarded write keeps the transition
    /// atomic under concurrent reports.
    ///
    /// Review routing: the item surfaces to the doctor only when the patient
    /// reported difficulties, so `seen_by_doctor` is set to the inverse of
    /// the difficulties flag.
    pub async fn mark_done(
        &self,
        user: &User,
        item_id: Uuid,
        request: MarkDoneRequest,
        auth_token: &str,
    ) -> Result<ScheduledItem, ProgressError> {
        let item = self.fetch_item(item_id, auth_token).await?;
        let prehab = self.fetch_prehab(item.prehab_id, auth_token).await?;

        if prehab.patient_id != user.id {
            return Err(ProgressError::Unauthorized);
        }

        if item.status.is_terminal() {
            return Err(ProgressError::AlreadyDone);
        }

        let new_status = if request.completed {
            ScheduledItemStatus::Completed
        } else {
            ScheduledItemStatus::NotCompleted
        };

        let mut update_data = Map::new();
        update_data.insert("status".to_string(), json!(new_status.to_string()));
        update_data.insert("finished_date".to_string(), json!(Utc::now().to_rfc3339()));
        update_data.insert("was_difficult".to_string(), json!(request.difficulties));
        update_data.insert("patient_notes".to_string(), json!(request.notes));
        update_data.insert("actual_repetitions".to_string(), json!(request.actual_repetitions));
        update_data.insert("seen_by_doctor".to_string(), json!(!request.difficulties));

        let updated = self
            .guarded_item_update(item_id, Value::Object(update_data), auth_token)
            .await?;

        info!(
            "Scheduled item {} marked {} by patient {}",
            item_id, new_status, user.id
        );
        Ok(updated)
    }

    /// Doctor reviews a single item. Allowed only while the item has not
    /// been reported yet; the guard mirrors `mark_done`.
    pub async fn mark_seen(
        &self,
        user: &User,
        item_id: Uuid,
        request: MarkSeenRequest,
        auth_token: &str,
    ) -> Result<ScheduledItem, ProgressError> {
        let item = self.fetch_item(item_id, auth_token).await?;
        let prehab = self.fetch_prehab(item.prehab_id, auth_token).await?;

        if prehab.created_by != user.id {
            return Err(ProgressError::Unauthorized);
        }

        if item.status.is_terminal() {
            return Err(ProgressError::AlreadyDone);
        }

        let mut update_data = Map::new();
        update_data.insert("seen_by_doctor".to_string(), json!(request.seen));
        update_data.insert("doctor_notes".to_string(), json!(request.doctor_notes));

        let updated = self
            .guarded_item_update(item_id, Value::Object(update_data), auth_token)
            .await?;

        debug!("Scheduled item {} review set to {} by doctor {}", item_id, request.seen, user.id);
        Ok(updated)
    }

    /// Administrative bulk review: flags every item of the prehab as seen in
    /// one unguarded statement, terminal items included, whatever the
    /// request's `seen` flag says. Deliberately NOT the single-item path:
    /// that one refuses terminal items, this one does not. The asymmetry is
    /// inherited behavior and pinned by tests.
    pub async fn mark_seen_bulk(
        &self,
        request: MarkSeenBulkRequest,
        auth_token: &str,
    ) -> Result<usize, ProgressError> {
        // Existence check so an unknown prehab is a 404, not a silent no-op
        self.fetch_prehab(request.prehab_id, auth_token).await?;

        let path = format!("/rest/v1/scheduled_items?prehab_id=eq.{}", request.prehab_id);
        let update_data = json!({ "seen_by_doctor": true });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(Method::PATCH, &path, Some(auth_token), Some(update_data), Some(headers))
            .await
            .map_err(|e| ProgressError::DatabaseError(e.to_string()))?;

        info!(
            "Bulk review: {} scheduled items of prehab {} marked seen",
            result.len(),
            request.prehab_id
        );
        Ok(result.len())
    }

    /// Resolve which prehabs the caller may see. `None` means unrestricted
    /// (admin without a patient filter).
    async fn visible_prehab_ids(
        &self,
        user: &User,
        query: &ScheduleSearchQuery,
        auth_token: &str,
    ) -> Result<Option<Vec<Uuid>>, ProgressError> {
        let filter = match user.role {
            Role::Admin => match query.patient_id {
                Some(patient_id) => format!("patient_id=eq.{}", patient_id),
                None => return Ok(None),
            },
            Role::Doctor => match query.patient_id {
                Some(patient_id) => {
                    format!("created_by=eq.{}&patient_id=eq.{}", user.id, patient_id)
                }
                None => format!("created_by=eq.{}", user.id),
            },
            Role::Patient => format!("patient_id=eq.{}", user.id),
        };

        let path = format!("/rest/v1/prehabs?{}&select=id", filter);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ProgressError::DatabaseError(e.to_string()))?;

        let mut ids = Vec::with_capacity(result.len());
        for row in result {
            let id = row
                .get("id")
                .and_then(Value::as_str)
                .and_then(|raw| Uuid::parse_str(raw).ok())
                .ok_or_else(|| ProgressError::DatabaseError("Malformed prehab id".to_string()))?;
            ids.push(id);
        }

        // A requested prehab filter narrows the visible set, never widens it
        if let Some(prehab_id) = query.prehab_id {
            ids.retain(|id| *id == prehab_id);
        }

        Ok(Some(ids))
    }

    /// PATCH restricted to rows still in Pending. An empty result after the
    /// item was read as Pending means another writer won the race.
    async fn guarded_item_update(
        &self,
        item_id: Uuid,
        update_data: Value,
        auth_token: &str,
    ) -> Result<ScheduledItem, ProgressError> {
        let path = format!(
            "/rest/v1/scheduled_items?id=eq.{}&status=eq.{}",
            item_id,
            ScheduledItemStatus::Pending
        );

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(Method::PATCH, &path, Some(auth_token), Some(update_data), Some(headers))
            .await
            .map_err(|e| ProgressError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            warn!("Guarded update of scheduled item {} matched no rows", item_id);
            return Err(ProgressError::Conflict(
                "Scheduled item was updated concurrently".to_string(),
            ));
        }

        serde_json::from_value(result[0].clone()).map_err(|e| {
            ProgressError::DatabaseError(format!("Failed to parse updated item: {}", e))
        })
    }

    async fn fetch_item(
        &self,
        item_id: Uuid,
        auth_token: &str,
    ) -> Result<ScheduledItem, ProgressError> {
        debug!("Fetching scheduled item: {}", item_id);

        let path = format!("/rest/v1/scheduled_items?id=eq.{}", item_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ProgressError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(ProgressError::NotFound);
        }

        serde_json::from_value(result[0].clone()).map_err(|e| {
            ProgressError::DatabaseError(format!("Failed to parse scheduled item: {}", e))
        })
    }

    async fn fetch_prehab(&self, prehab_id: Uuid, auth_token: &str) -> Result<Prehab, ProgressError> {
        let path = format!("/rest/v1/prehabs?id=eq.{}", prehab_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| ProgressError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(ProgressError::PrehabNotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| ProgressError::DatabaseError(format!("Failed to parse prehab: {}", e)))
    }
}
