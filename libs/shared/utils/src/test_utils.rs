use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{Role, User};

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
        }
    }
}

impl TestConfig {
    pub fn with_supabase_url(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

impl TestUser {
    pub fn new(email: &str, role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.to_string(),
            role,
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, Role::Doctor)
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, Role::Patient)
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, Role::Admin)
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id,
            email: Some(self.email.clone()),
            role: self.role,
            platform: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn patient_response(patient_id: Uuid) -> serde_json::Value {
        json!({
            "id": patient_id,
            "patient_tag": "HSJ20260001",
            "age": 64,
            "height": 172.0,
            "weight": 80.5,
            "sex": "M",
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z"
        })
    }

    pub fn plan_item_response(item_id: Uuid, title: &str, kind: &str) -> serde_json::Value {
        json!({
            "id": item_id,
            "title": title,
            "description": "Reference catalog entry",
            "multimedia_link": null,
            "kind": kind
        })
    }

    pub fn template_response(template_id: Uuid, created_by: Uuid, weeks: i32) -> serde_json::Value {
        json!({
            "id": template_id,
            "title": "Standard knee prehab",
            "number_of_weeks": weeks,
            "created_by": created_by,
            "created_at": "2026-01-01T00:00:00Z"
        })
    }

    pub fn template_entry_response(
        template_id: Uuid,
        item_id: Uuid,
        week_number: i32,
        times_per_week: i32,
    ) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "template_id": template_id,
            "week_number": week_number,
            "item_id": item_id,
            "item_kind": "task",
            "times_per_week": times_per_week,
            "repetition_count": 10
        })
    }

    pub fn prehab_response(
        prehab_id: Uuid,
        patient_id: Uuid,
        created_by: Uuid,
        status: &str,
    ) -> serde_json::Value {
        json!({
            "id": prehab_id,
            "patient_id": patient_id,
            "created_by": created_by,
            "template_id": Uuid::new_v4(),
            "init_date": "2026-05-04",
            "surgery_date": "2026-06-15",
            "number_of_weeks": 4,
            "status": status,
            "created_at": "2026-05-01T00:00:00Z",
            "updated_at": "2026-05-01T00:00:00Z"
        })
    }

    pub fn scheduled_item_response(
        item_id: Uuid,
        prehab_id: Uuid,
        week_number: i32,
        day_number: i32,
        status: &str,
    ) -> serde_json::Value {
        json!({
            "id": item_id,
            "prehab_id": prehab_id,
            "week_number": week_number,
            "day_number": day_number,
            "item_id": Uuid::new_v4(),
            "item_kind": "task",
            "sequence": (week_number - 1) * 7 + day_number - 1,
            "expected_repetitions": 10,
            "actual_repetitions": null,
            "status": status,
            "finished_date": null,
            "was_difficult": false,
            "patient_notes": null,
            "seen_by_doctor": false,
            "doctor_notes": null,
            "scheduled_date": "2026-05-04",
            "created_at": "2026-05-01T00:00:00Z"
        })
    }

    pub fn error_response(message: &str, code: &str) -> serde_json::Value {
        json!({
            "error": {
                "message": message,
                "code": code
            }
        })
    }
}
