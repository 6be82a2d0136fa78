// libs/template-cell/src/services/template.rs
use std::collections::HashSet;

use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    CreateTemplateRequest, ItemKind, PlanItem, ScheduleTemplate, TemplateEntry,
    TemplateEntryRecord, TemplateError, TemplateRecord, TemplateWeek,
};

pub struct TemplateService {
    supabase: SupabaseClient,
}

impl TemplateService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Create a template and its weekly entries. The entries are written in a
    /// single bulk insert; if that insert fails the header row is deleted so
    /// no half-built template is left behind.
    pub async fn create_template(
        &self,
        created_by: Uuid,
        request: CreateTemplateRequest,
        auth_token: &str,
    ) -> Result<ScheduleTemplate, TemplateError> {
        info!("Creating schedule template '{}' ({} weeks)", request.title, request.number_of_weeks);

        Self::validate_template(&request)?;

        let items = self.fetch_referenced_items(&request, auth_token).await?;

        let record = self.insert_template_record(created_by, &request, auth_token).await?;

        let entry_rows: Vec<Value> = request
            .weeks
            .iter()
            .flat_map(|week| {
                let template_id = record.id;
                let items = &items;
                week.entries.iter().map(move |entry| {
                    let kind = items
                        .iter()
                        .find(|item| item.id == entry.item_id)
                        .map(|item| item.kind)
                        .unwrap_or(ItemKind::Task);
                    json!({
                        "template_id": template_id,
                        "week_number": week.week_number,
                        "item_id": entry.item_id,
                        "item_kind": kind.to_string(),
                        "times_per_week": entry.times_per_week,
                        "repetition_count": entry.repetition_count,
                    })
                })
            })
            .collect();

        let inserted = self
            .supabase
            .execute(
                Method::POST,
                "/rest/v1/template_entries",
                Some(auth_token),
                Some(Value::Array(entry_rows)),
            )
            .await;

        if let Err(e) = inserted {
            warn!("Entry insert failed for template {}, rolling back header row", record.id);
            self.delete_template_record(record.id, auth_token).await;
            return Err(TemplateError::DatabaseError(e.to_string()));
        }

        self.get_template(record.id, auth_token).await
    }

    /// Fetch a template with its entries grouped into weeks.
    pub async fn get_template(
        &self,
        template_id: Uuid,
        auth_token: &str,
    ) -> Result<ScheduleTemplate, TemplateError> {
        debug!("Fetching template: {}", template_id);

        let path = format!("/rest/v1/schedule_templates?id=eq.{}", template_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| TemplateError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(TemplateError::NotFound);
        }

        let record: TemplateRecord = serde_json::from_value(result[0].clone())
            .map_err(|e| TemplateError::DatabaseError(format!("Failed to parse template: {}", e)))?;

        let path = format!(
            "/rest/v1/template_entries?template_id=eq.{}&order=week_number.asc",
            template_id
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| TemplateError::DatabaseError(e.to_string()))?;

        let entries: Vec<TemplateEntryRecord> = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<_, _>>()
            .map_err(|e| TemplateError::DatabaseError(format!("Failed to parse entries: {}", e)))?;

        Ok(Self::assemble(record, entries))
    }

    /// List template headers, most recently created first.
    pub async fn list_templates(
        &self,
        auth_token: &str,
    ) -> Result<Vec<TemplateRecord>, TemplateError> {
        let path = "/rest/v1/schedule_templates?order=created_at.desc";
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, path, Some(auth_token), None)
            .await
            .map_err(|e| TemplateError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(|value| {
                serde_json::from_value(value)
                    .map_err(|e| TemplateError::DatabaseError(format!("Failed to parse template: {}", e)))
            })
            .collect()
    }

    /// Structural validation of a new template. Unknown item references are
    /// caught separately against the catalog.
    pub fn validate_template(request: &CreateTemplateRequest) -> Result<(), TemplateError> {
        if request.title.trim().is_empty() {
            return Err(TemplateError::ValidationError("Template title is required".to_string()));
        }

        if request.number_of_weeks < 1 {
            return Err(TemplateError::ValidationError(
                "Template must cover at least one week".to_string(),
            ));
        }

        let mut seen_weeks = HashSet::new();
        for week in &request.weeks {
            if week.week_number < 1 || week.week_number > request.number_of_weeks {
                return Err(TemplateError::ValidationError(format!(
                    "Week number {} outside 1..={}",
                    week.week_number, request.number_of_weeks
                )));
            }
            if !seen_weeks.insert(week.week_number) {
                return Err(TemplateError::ValidationError(format!(
                    "Week number {} appears more than once",
                    week.week_number
                )));
            }
            for entry in &week.entries {
                if entry.times_per_week < 1 || entry.times_per_week > 7 {
                    return Err(TemplateError::ValidationError(format!(
                        "times_per_week must be within 1..=7, got {}",
                        entry.times_per_week
                    )));
                }
                if let Some(repetitions) = entry.repetition_count {
                    if repetitions < 1 {
                        return Err(TemplateError::ValidationError(
                            "repetition_count must be positive".to_string(),
                        ));
                    }
                }
            }
        }

        Ok(())
    }

    async fn fetch_referenced_items(
        &self,
        request: &CreateTemplateRequest,
        auth_token: &str,
    ) -> Result<Vec<PlanItem>, TemplateError> {
        let referenced: HashSet<Uuid> = request
            .weeks
            .iter()
            .flat_map(|week| week.entries.iter().map(|entry| entry.item_id))
            .collect();

        if referenced.is_empty() {
            return Ok(Vec::new());
        }

        let id_list = referenced
            .iter()
            .map(Uuid::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let path = format!("/rest/v1/plan_items?id=in.({})", id_list);

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| TemplateError::DatabaseError(e.to_string()))?;

        let items: Vec<PlanItem> = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<_, _>>()
            .map_err(|e| TemplateError::DatabaseError(format!("Failed to parse catalog items: {}", e)))?;

        let found: HashSet<Uuid> = items.iter().map(|item| item.id).collect();
        if let Some(missing) = referenced.difference(&found).next() {
            return Err(TemplateError::ItemNotFound(*missing));
        }

        Ok(items)
    }

    async fn insert_template_record(
        &self,
        created_by: Uuid,
        request: &CreateTemplateRequest,
        auth_token: &str,
    ) -> Result<TemplateRecord, TemplateError> {
        let template_data = json!({
            "title": request.title,
            "number_of_weeks": request.number_of_weeks,
            "created_by": created_by,
            "created_at": chrono::Utc::now().to_rfc3339(),
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/schedule_templates",
                Some(auth_token),
                Some(template_data),
                Some(headers),
            )
            .await
            .map_err(|e| TemplateError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(TemplateError::DatabaseError("Failed to create template".to_string()));
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| TemplateError::DatabaseError(format!("Failed to parse created template: {}", e)))
    }

    async fn delete_template_record(&self, template_id: Uuid, auth_token: &str) {
        let path = format!("/rest/v1/schedule_templates?id=eq.{}", template_id);
        if let Err(e) = self
            .supabase
            .execute(Method::DELETE, &path, Some(auth_token), None)
            .await
        {
            warn!("Rollback delete of template {} failed: {}", template_id, e);
        }
    }

    fn assemble(record: TemplateRecord, entries: Vec<TemplateEntryRecord>) -> ScheduleTemplate {
        let mut weeks: Vec<TemplateWeek> = Vec::new();
        for entry in entries {
            let converted = TemplateEntry {
                item_id: entry.item_id,
                item_kind: entry.item_kind,
                times_per_week: entry.times_per_week,
                repetition_count: entry.repetition_count,
            };
            match weeks.iter_mut().find(|week| week.week_number == entry.week_number) {
                Some(week) => week.entries.push(converted),
                None => weeks.push(TemplateWeek {
                    week_number: entry.week_number,
                    entries: vec![converted],
                }),
            }
        }

        ScheduleTemplate {
            id: record.id,
            title: record.title,
            number_of_weeks: record.number_of_weeks,
            created_by: record.created_by,
            created_at: record.created_at,
            weeks,
        }
    }
}
