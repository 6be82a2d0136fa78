// libs/prehab-cell/src/services/prehab.rs
use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::{Role, User};
use template_cell::models::TemplateError;
use template_cell::services::template::TemplateService;

use crate::models::{
    CreatePrehabRequest, Prehab, PrehabError, PrehabSearchQuery, PrehabStatus, ScheduledItem,
    ScheduledItemDraft, ScheduledItemStatus, UpdatePrehabStatusRequest,
};
use crate::services::expansion::ScheduleExpander;

pub struct PrehabService {
    supabase: SupabaseClient,
    template_service: TemplateService,
}

impl PrehabService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            template_service: TemplateService::new(config),
        }
    }

    /// Enroll a patient: expand the template against the init date and write
    /// the prehab plus its entire calendar. The calendar is one bulk insert;
    /// if it fails the prehab row is deleted so the patient never sees a
    /// partial schedule.
    pub async fn create_prehab(
        &self,
        created_by: Uuid,
        request: CreatePrehabRequest,
        auth_token: &str,
    ) -> Result<Prehab, PrehabError> {
        info!(
            "Creating prehab for patient {} from template {}",
            request.patient_id, request.template_id
        );

        if request.surgery_date <= request.init_date {
            return Err(PrehabError::ValidationError(
                "Surgery date must be after the initiation date".to_string(),
            ));
        }

        self.verify_patient_exists(request.patient_id, auth_token).await?;

        let template = self
            .template_service
            .get_template(request.template_id, auth_token)
            .await
            .map_err(|e| match e {
                TemplateError::NotFound => PrehabError::TemplateNotFound,
                TemplateError::ItemNotFound(_) => PrehabError::TemplateNotFound,
                TemplateError::ValidationError(msg) => PrehabError::ValidationError(msg),
                TemplateError::Unauthorized => PrehabError::Unauthorized,
                TemplateError::DatabaseError(msg) => PrehabError::DatabaseError(msg),
            })?;

        let drafts = ScheduleExpander::expand(&template, request.init_date)?;

        let prehab = self
            .insert_prehab_record(created_by, &request, template.number_of_weeks, auth_token)
            .await?;

        if let Err(e) = self.insert_scheduled_items(&prehab, &drafts, auth_token).await {
            warn!(
                "Calendar insert failed for prehab {}, rolling back enrollment",
                prehab.id
            );
            self.delete_prehab_record(prehab.id, auth_token).await;
            return Err(e);
        }

        info!(
            "Prehab {} created with {} scheduled items",
            prehab.id,
            drafts.len()
        );
        Ok(prehab)
    }

    /// Get a prehab by id, enforcing ownership.
    pub async fn get_prehab(
        &self,
        user: &User,
        prehab_id: Uuid,
        auth_token: &str,
    ) -> Result<Prehab, PrehabError> {
        let prehab = self.fetch_prehab(prehab_id, auth_token).await?;
        Self::check_access(user, &prehab)?;
        Ok(prehab)
    }

    /// List prehabs visible to the caller, most recent first. Admins see
    /// everything, doctors the enrollments they created, patients their own.
    pub async fn list_prehabs(
        &self,
        user: &User,
        query: PrehabSearchQuery,
        auth_token: &str,
    ) -> Result<Vec<Prehab>, PrehabError> {
        let mut query_parts = Vec::new();

        match user.role {
            Role::Admin => {
                if let Some(patient_id) = query.patient_id {
                    query_parts.push(format!("patient_id=eq.{}", patient_id));
                }
            }
            Role::Doctor => {
                query_parts.push(format!("created_by=eq.{}", user.id));
                if let Some(patient_id) = query.patient_id {
                    query_parts.push(format!("patient_id=eq.{}", patient_id));
                }
            }
            Role::Patient => {
                query_parts.push(format!("patient_id=eq.{}", user.id));
            }
        }

        if let Some(status) = query.status {
            query_parts.push(format!("status=eq.{}", status));
        }
        query_parts.push("order=created_at.desc".to_string());

        let mut path = format!("/rest/v1/prehabs?{}", query_parts.join("&"));
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
            .map_err(|e| PrehabError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(|value| {
                serde_json::from_value(value)
                    .map_err(|e| PrehabError::DatabaseError(format!("Failed to parse prehab: {}", e)))
            })
            .collect()
    }

    /// Date-keyed calendar of a prehab's scheduled items.
    pub async fn get_prehab_calendar(
        &self,
        user: &User,
        prehab_id: Uuid,
        auth_token: &str,
    ) -> Result<BTreeMap<NaiveDate, Vec<ScheduledItem>>, PrehabError> {
        let prehab = self.get_prehab(user, prehab_id, auth_token).await?;

        let path = format!(
            "/rest/v1/scheduled_items?prehab_id=eq.{}&order=sequence.asc",
            prehab.id
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| PrehabError::DatabaseError(e.to_string()))?;

        let mut calendar: BTreeMap<NaiveDate, Vec<ScheduledItem>> = BTreeMap::new();
        for value in result {
            let item: ScheduledItem = serde_json::from_value(value).map_err(|e| {
                PrehabError::DatabaseError(format!("Failed to parse scheduled item: {}", e))
            })?;
            calendar.entry(item.scheduled_date).or_default().push(item);
        }

        Ok(calendar)
    }

    /// Apply a status transition. Only the enrolling doctor or an admin may
    /// move a prehab through its lifecycle; the write is guarded against the
    /// status read here so concurrent transitions cannot double-apply.
    pub async fn update_status(
        &self,
        user: &User,
        prehab_id: Uuid,
        request: UpdatePrehabStatusRequest,
        auth_token: &str,
    ) -> Result<Prehab, PrehabError> {
        let prehab = self.fetch_prehab(prehab_id, auth_token).await?;

        match user.role {
            Role::Admin => {}
            Role::Doctor => {
                if prehab.created_by != user.id {
                    return Err(PrehabError::Unauthorized);
                }
            }
            Role::Patient => return Err(PrehabError::Unauthorized),
        }

        if !prehab.status.valid_transitions().contains(&request.status) {
            return Err(PrehabError::InvalidStatusTransition(prehab.status));
        }

        let path = format!(
            "/rest/v1/prehabs?id=eq.{}&status=eq.{}",
            prehab.id, prehab.status
        );
        let update_data = json!({
            "status": request.status.to_string(),
            "updated_at": Utc::now().to_rfc3339(),
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(Method::PATCH, &path, Some(auth_token), Some(update_data), Some(headers))
            .await
            .map_err(|e| PrehabError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(PrehabError::Conflict(
                "Prehab status changed concurrently".to_string(),
            ));
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| PrehabError::DatabaseError(format!("Failed to parse updated prehab: {}", e)))
    }

    fn check_access(user: &User, prehab: &Prehab) -> Result<(), PrehabError> {
        match user.role {
            Role::Admin => Ok(()),
            Role::Doctor => {
                if prehab.created_by == user.id {
                    Ok(())
                } else {
                    Err(PrehabError::Unauthorized)
                }
            }
            Role::Patient => {
                if prehab.patient_id == user.id {
                    Ok(())
                } else {
                    Err(PrehabError::Unauthorized)
                }
            }
        }
    }

    async fn verify_patient_exists(
        &self,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<(), PrehabError> {
        let path = format!("/rest/v1/patients?id=eq.{}&select=id", patient_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| PrehabError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(PrehabError::PatientNotFound);
        }

        Ok(())
    }

    async fn fetch_prehab(&self, prehab_id: Uuid, auth_token: &str) -> Result<Prehab, PrehabError> {
        debug!("Fetching prehab: {}", prehab_id);

        let path = format!("/rest/v1/prehabs?id=eq.{}", prehab_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| PrehabError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(PrehabError::NotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| PrehabError::DatabaseError(format!("Failed to parse prehab: {}", e)))
    }

    async fn insert_prehab_record(
        &self,
        created_by: Uuid,
        request: &CreatePrehabRequest,
        number_of_weeks: i32,
        auth_token: &str,
    ) -> Result<Prehab, PrehabError> {
        let now = Utc::now();
        let prehab_data = json!({
            "patient_id": request.patient_id,
            "created_by": created_by,
            "template_id": request.template_id,
            "init_date": request.init_date,
            "surgery_date": request.surgery_date,
            "number_of_weeks": number_of_weeks,
            "status": PrehabStatus::Pending.to_string(),
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339(),
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/prehabs",
                Some(auth_token),
                Some(prehab_data),
                Some(headers),
            )
            .await
            .map_err(|e| PrehabError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(PrehabError::DatabaseError("Failed to create prehab".to_string()));
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| PrehabError::DatabaseError(format!("Failed to parse created prehab: {}", e)))
    }

    async fn insert_scheduled_items(
        &self,
        prehab: &Prehab,
        drafts: &[ScheduledItemDraft],
        auth_token: &str,
    ) -> Result<(), PrehabError> {
        let now = Utc::now();
        let rows: Vec<Value> = drafts
            .iter()
            .map(|draft| {
                json!({
                    "prehab_id": prehab.id,
                    "week_number": draft.week_number,
                    "day_number": draft.day_number,
                    "item_id": draft.item_id,
                    "item_kind": draft.item_kind.to_string(),
                    "sequence": draft.sequence,
                    "expected_repetitions": draft.expected_repetitions,
                    "actual_repetitions": null,
                    "status": ScheduledItemStatus::Pending.to_string(),
                    "finished_date": null,
                    "was_difficult": false,
                    "patient_notes": null,
                    "seen_by_doctor": false,
                    "doctor_notes": null,
                    "scheduled_date": draft.scheduled_date,
                    "created_at": now.to_rfc3339(),
                })
            })
            .collect();

        self.supabase
            .execute(
                Method::POST,
                "/rest/v1/scheduled_items",
                Some(auth_token),
                Some(Value::Array(rows)),
            )
            .await
            .map_err(|e| PrehabError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    async fn delete_prehab_record(&self, prehab_id: Uuid, auth_token: &str) {
        let path = format!("/rest/v1/prehabs?id=eq.{}", prehab_id);
        if let Err(e) = self
            .supabase
            .execute(Method::DELETE, &path, Some(auth_token), None)
            .await
        {
            warn!("Rollback delete of prehab {} failed: {}", prehab_id, e);
        }
    }
}
