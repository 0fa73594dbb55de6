use actix_web::{web, HttpResponse};
use lettre::message::Mailbox;
use std::time::{Duration, SystemTime};

use tasknest_common::directory::{DirectoryClient, LookupOutcome, UserDirectory};
use tasknest_common::email::templates::ResetCodeMessage;
use tasknest_common::email::{EmailMessage, EmailSender, SendEmail};
use tasknest_common::messages::{AckResponse, InputEmail, InputResetConfirmation};
use tasknest_common::models::reset_code::ResetCode;
use tasknest_common::otp::{Otp, CODE_LENGTH};
use tasknest_common::store::{ResetCodeRepo, ResetCodeStore};
use tasknest_common::validators::{self, Validity};

use crate::handlers::error::HandlerError;

pub const MIN_NEW_PASSWORD_CHARS: usize = 6;

const MAX_EMAIL_LENGTH: usize = 255;

/// Startup-time knobs for the reset flow, injected alongside the store,
/// directory, and email clients.
#[derive(Clone)]
pub struct ResetPolicy {
    pub code_lifetime: Duration,
    pub email_from: Mailbox,
    pub email_reply_to: Mailbox,
    pub directory_page_size: u32,
    pub directory_max_pages: u32,
}

pub async fn issue_reset_code(
    store: web::Data<ResetCodeRepo>,
    smtp_sender: web::Data<EmailSender>,
    policy: web::Data<ResetPolicy>,
    body: web::Json<InputEmail>,
) -> Result<HttpResponse, HandlerError> {
    if body.email.is_empty() {
        return Err(HandlerError::MissingInput("email required"));
    }

    if let Validity::Invalid(_) = validators::validate_email_address(&body.email) {
        return Err(HandlerError::InvalidInput("invalid email address"));
    }

    let code = Otp::generate();
    let created_timestamp = SystemTime::now();
    let expiration = created_timestamp + policy.code_lifetime;

    if let Err(e) = store
        .save_code(&body.email, &code, created_timestamp, expiration)
        .await
    {
        log::error!("{e}");
        return Err(HandlerError::UpstreamFailure("code generation failed"));
    }

    let message = EmailMessage {
        body: ResetCodeMessage::generate(&code, policy.code_lifetime),
        subject: "Your password reset code",
        from: policy.email_from.clone(),
        reply_to: policy.email_reply_to.clone(),
        destination: &body.email,
        is_html: true,
    };

    if let Err(e) = smtp_sender.send(message).await {
        log::error!("{e}");
        // The inserted row survives a failed dispatch. A retried request
        // issues a second, independently valid code.
        return Err(HandlerError::UpstreamFailure("send failed"));
    }

    Ok(HttpResponse::Ok().json(AckResponse::ok()))
}

pub async fn confirm_reset_code(
    store: web::Data<ResetCodeRepo>,
    directory: web::Data<DirectoryClient>,
    policy: web::Data<ResetPolicy>,
    body: web::Json<InputResetConfirmation>,
) -> Result<HttpResponse, HandlerError> {
    if body.email.is_empty() || body.code.is_empty() || body.new_password.is_empty() {
        return Err(HandlerError::MissingInput(
            "email, code, and newPassword are required",
        ));
    }

    // The UI enforces this too, but this handler is reachable without the UI.
    if body.new_password.chars().count() < MIN_NEW_PASSWORD_CHARS {
        return Err(HandlerError::InvalidInput(
            "password must be at least 6 characters",
        ));
    }

    if body.email.len() > MAX_EMAIL_LENGTH || body.code.len() != CODE_LENGTH {
        return Err(HandlerError::InvalidOrExpiredCode);
    }

    let candidate_codes = match store.find_consumable_codes(&body.email).await {
        Ok(rows) => rows,
        Err(e) => {
            log::error!("{e}");
            return Err(HandlerError::UpstreamFailure("failed to check reset code"));
        }
    };

    // Rows arrive newest-first, so the first match is the authoritative code
    // for this email.
    let Some(matched) = candidate_codes
        .into_iter()
        .find(|row| Otp::are_equal(&body.code, &row.code))
    else {
        return Err(HandlerError::InvalidOrExpiredCode);
    };

    // Claim the code before rotating so two concurrent confirmations can
    // never both reach the directory with the same code.
    match store.consume_code(matched.id).await {
        Ok(true) => (),
        Ok(false) => return Err(HandlerError::InvalidOrExpiredCode),
        Err(e) => {
            log::error!("{e}");
            return Err(HandlerError::UpstreamFailure("failed to check reset code"));
        }
    }

    let lookup = match directory
        .find_by_email(
            &body.email,
            policy.directory_page_size,
            policy.directory_max_pages,
        )
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            log::error!("{e}");
            release_claim(store.get_ref(), &matched).await;
            return Err(HandlerError::UpstreamFailure("failed to list users"));
        }
    };

    let user = match lookup {
        LookupOutcome::Found(user) => user,
        LookupOutcome::NotFound => {
            release_claim(store.get_ref(), &matched).await;
            return Err(HandlerError::AccountNotFound);
        }
        LookupOutcome::CapExceeded => {
            log::warn!(
                "Reset confirmation for a code issued to an email that was not found within \
                 the first {} directory pages; the account may exist beyond the scan cap",
                policy.directory_max_pages,
            );
            release_claim(store.get_ref(), &matched).await;
            return Err(HandlerError::AccountNotFound);
        }
    };

    if let Err(e) = directory.update_password(user.id, &body.new_password).await {
        log::error!("{e}");
        release_claim(store.get_ref(), &matched).await;
        return Err(HandlerError::CredentialUpdateFailed);
    }

    Ok(HttpResponse::Ok().json(AckResponse::ok()))
}

/// Reverts a claimed code so it can be retried. If the revert itself fails
/// the code stays consumed and the user must request a new one.
async fn release_claim(store: &ResetCodeRepo, code: &ResetCode) {
    if let Err(e) = store.release_code(code.id).await {
        log::error!("Failed to release claim on reset code {}: {e}", code.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use actix_web::http::StatusCode;
    use actix_web::test::{self, TestRequest};
    use actix_web::web::Data;
    use actix_web::App;
    use serde_json::json;
    use std::sync::Arc;
    use uuid::Uuid;

    use tasknest_common::directory::{DirectoryUser, UserDirectory};
    use tasknest_common::email::SendEmail;
    use tasknest_common::store::ResetCodeStore;
    use tasknest_common::threadrand::SecureRng;

    use crate::handlers::test_utils::{
        FailingSender, MemoryStore, MockDirectory, RecordingSender,
    };

    const ISSUE_URI: &str = "/api/auth/issue-reset-code";
    const CONFIRM_URI: &str = "/api/auth/confirm-reset-code";

    fn test_policy() -> ResetPolicy {
        ResetPolicy {
            code_lifetime: Duration::from_secs(600),
            email_from: "Tasknest <no-reply@tasknest.app>".parse().unwrap(),
            email_reply_to: "Tasknest Support <support@tasknest.app>".parse().unwrap(),
            directory_page_size: 1000,
            directory_max_pages: 10,
        }
    }

    fn store_data(store: &MemoryStore) -> Data<ResetCodeRepo> {
        Data::new(Arc::new(
            Box::new(store.clone()) as Box<dyn ResetCodeStore>
        ))
    }

    fn sender_data(sender: impl SendEmail + 'static) -> Data<EmailSender> {
        Data::new(Arc::new(Box::new(sender) as Box<dyn SendEmail>))
    }

    fn directory_data(directory: &MockDirectory) -> Data<DirectoryClient> {
        Data::new(Arc::new(
            Box::new(directory.clone()) as Box<dyn UserDirectory>
        ))
    }

    fn unique_email() -> String {
        format!("reset-test-{}@tasknest.test", SecureRng::next_u128())
    }

    fn directory_user(email: &str) -> DirectoryUser {
        DirectoryUser {
            id: Uuid::now_v7(),
            email: Some(String::from(email)),
        }
    }

    fn seed_code(store: &MemoryStore, email: &str) -> String {
        let code = Otp::generate();
        let now = SystemTime::now();
        store.insert_row(email, &code, now, now + Duration::from_secs(600), false);
        code
    }

    async fn read_ack(resp: actix_web::dev::ServiceResponse) -> AckResponse {
        assert_eq!(resp.status(), StatusCode::OK);
        test::read_body_json(resp).await
    }

    #[actix_web::test]
    async fn test_issue_persists_row_and_emails_code() {
        let store = MemoryStore::new();
        let sender = RecordingSender::new();
        let email = unique_email();

        let app = test::init_service(
            App::new()
                .app_data(store_data(&store))
                .app_data(sender_data(sender.clone()))
                .app_data(directory_data(&MockDirectory::with_users(Vec::new())))
                .app_data(Data::new(test_policy()))
                .configure(crate::services::api::configure),
        )
        .await;

        let req = TestRequest::post()
            .uri(ISSUE_URI)
            .set_json(InputEmail {
                email: email.clone(),
            })
            .to_request();
        let ack = read_ack(test::call_service(&app, req).await).await;

        assert!(ack.ok);
        assert!(ack.error.is_none());

        let rows = store.rows();
        assert_eq!(rows.len(), 1);

        let row = &rows[0];
        assert_eq!(row.email, email);
        assert!(!row.used);
        assert_eq!(row.code.len(), CODE_LENGTH);
        assert!(row.code.bytes().all(|b| b.is_ascii_digit()));
        assert!((100_000..=999_999).contains(&row.code.parse::<u32>().unwrap()));
        assert_eq!(
            row.expiration,
            row.created_timestamp + Duration::from_secs(600)
        );

        let sent = sender.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, email);
        assert!(sent[0].1.contains(&row.code));
    }

    #[actix_web::test]
    async fn test_issue_rejects_missing_email_without_side_effects() {
        let store = MemoryStore::new();
        let sender = RecordingSender::new();

        let app = test::init_service(
            App::new()
                .app_data(store_data(&store))
                .app_data(sender_data(sender.clone()))
                .app_data(directory_data(&MockDirectory::with_users(Vec::new())))
                .app_data(Data::new(test_policy()))
                .configure(crate::services::api::configure),
        )
        .await;

        let req = TestRequest::post()
            .uri(ISSUE_URI)
            .set_json(json!({ "email": "" }))
            .to_request();
        let ack = read_ack(test::call_service(&app, req).await).await;

        assert!(!ack.ok);
        assert_eq!(ack.error.as_deref(), Some("email required"));
        assert!(store.rows().is_empty());
        assert!(sender.sent().is_empty());
    }

    #[actix_web::test]
    async fn test_issue_rejects_malformed_email() {
        let store = MemoryStore::new();

        let app = test::init_service(
            App::new()
                .app_data(store_data(&store))
                .app_data(sender_data(RecordingSender::new()))
                .app_data(directory_data(&MockDirectory::with_users(Vec::new())))
                .app_data(Data::new(test_policy()))
                .configure(crate::services::api::configure),
        )
        .await;

        let req = TestRequest::post()
            .uri(ISSUE_URI)
            .set_json(json!({ "email": "not-an-email" }))
            .to_request();
        let ack = read_ack(test::call_service(&app, req).await).await;

        assert!(!ack.ok);
        assert_eq!(ack.error.as_deref(), Some("invalid email address"));
        assert!(store.rows().is_empty());
    }

    #[actix_web::test]
    async fn test_issue_dispatch_failure_keeps_row_usable() {
        let store = MemoryStore::new();
        let email = unique_email();
        let user = directory_user(&email);
        let directory = MockDirectory::with_users(vec![user.clone()]);

        let app = test::init_service(
            App::new()
                .app_data(store_data(&store))
                .app_data(sender_data(FailingSender))
                .app_data(directory_data(&directory))
                .app_data(Data::new(test_policy()))
                .configure(crate::services::api::configure),
        )
        .await;

        let req = TestRequest::post()
            .uri(ISSUE_URI)
            .set_json(InputEmail {
                email: email.clone(),
            })
            .to_request();
        let ack = read_ack(test::call_service(&app, req).await).await;

        assert!(!ack.ok);
        assert_eq!(ack.error.as_deref(), Some("send failed"));

        // The row was not rolled back and can still complete a reset.
        let rows = store.rows();
        assert_eq!(rows.len(), 1);
        assert!(!rows[0].used);

        let req = TestRequest::post()
            .uri(CONFIRM_URI)
            .set_json(json!({
                "email": email,
                "code": rows[0].code,
                "newPassword": "secret123",
            }))
            .to_request();
        let ack = read_ack(test::call_service(&app, req).await).await;

        assert!(ack.ok);
        assert_eq!(directory.rotations().len(), 1);
    }

    #[actix_web::test]
    async fn test_confirm_rejects_missing_fields_before_touching_the_store() {
        let store = MemoryStore::new();
        let email = unique_email();
        let code = seed_code(&store, &email);
        let directory = MockDirectory::with_users(vec![directory_user(&email)]);

        let app = test::init_service(
            App::new()
                .app_data(store_data(&store))
                .app_data(sender_data(RecordingSender::new()))
                .app_data(directory_data(&directory))
                .app_data(Data::new(test_policy()))
                .configure(crate::services::api::configure),
        )
        .await;

        let incomplete_bodies = [
            json!({ "email": "", "code": code, "newPassword": "secret123" }),
            json!({ "email": email, "code": "", "newPassword": "secret123" }),
            json!({ "email": email, "code": code, "newPassword": "" }),
        ];

        for body in incomplete_bodies {
            let req = TestRequest::post()
                .uri(CONFIRM_URI)
                .set_json(body)
                .to_request();
            let ack = read_ack(test::call_service(&app, req).await).await;

            assert!(!ack.ok);
            assert_eq!(
                ack.error.as_deref(),
                Some("email, code, and newPassword are required")
            );
        }

        assert!(!store.rows()[0].used);
        assert!(directory.rotations().is_empty());
    }

    #[actix_web::test]
    async fn test_confirm_rejects_short_password_before_touching_the_code() {
        let store = MemoryStore::new();
        let email = unique_email();
        let code = seed_code(&store, &email);
        let directory = MockDirectory::with_users(vec![directory_user(&email)]);

        let app = test::init_service(
            App::new()
                .app_data(store_data(&store))
                .app_data(sender_data(RecordingSender::new()))
                .app_data(directory_data(&directory))
                .app_data(Data::new(test_policy()))
                .configure(crate::services::api::configure),
        )
        .await;

        let req = TestRequest::post()
            .uri(CONFIRM_URI)
            .set_json(json!({
                "email": email,
                "code": code,
                "newPassword": "short",
            }))
            .to_request();
        let ack = read_ack(test::call_service(&app, req).await).await;

        assert!(!ack.ok);
        assert_eq!(
            ack.error.as_deref(),
            Some("password must be at least 6 characters")
        );
        assert!(!store.rows()[0].used);
        assert!(directory.rotations().is_empty());
    }

    #[actix_web::test]
    async fn test_confirm_rejects_wrong_code() {
        let store = MemoryStore::new();
        let email = unique_email();
        let code = seed_code(&store, &email);
        let directory = MockDirectory::with_users(vec![directory_user(&email)]);

        let wrong_code = if code == "100000" { "100001" } else { "100000" };

        let app = test::init_service(
            App::new()
                .app_data(store_data(&store))
                .app_data(sender_data(RecordingSender::new()))
                .app_data(directory_data(&directory))
                .app_data(Data::new(test_policy()))
                .configure(crate::services::api::configure),
        )
        .await;

        let req = TestRequest::post()
            .uri(CONFIRM_URI)
            .set_json(json!({
                "email": email,
                "code": wrong_code,
                "newPassword": "secret123",
            }))
            .to_request();
        let ack = read_ack(test::call_service(&app, req).await).await;

        assert!(!ack.ok);
        assert_eq!(ack.error.as_deref(), Some("invalid_or_expired_code"));
        assert!(!store.rows()[0].used);
        assert!(directory.rotations().is_empty());
    }

    #[actix_web::test]
    async fn test_confirm_never_matches_expired_code() {
        let store = MemoryStore::new();
        let email = unique_email();
        let directory = MockDirectory::with_users(vec![directory_user(&email)]);

        let code = Otp::generate();
        let created = SystemTime::now() - Duration::from_secs(601);
        store.insert_row(
            &email,
            &code,
            created,
            created + Duration::from_secs(600),
            false,
        );

        let app = test::init_service(
            App::new()
                .app_data(store_data(&store))
                .app_data(sender_data(RecordingSender::new()))
                .app_data(directory_data(&directory))
                .app_data(Data::new(test_policy()))
                .configure(crate::services::api::configure),
        )
        .await;

        let req = TestRequest::post()
            .uri(CONFIRM_URI)
            .set_json(json!({
                "email": email,
                "code": code,
                "newPassword": "secret123",
            }))
            .to_request();
        let ack = read_ack(test::call_service(&app, req).await).await;

        assert!(!ack.ok);
        assert_eq!(ack.error.as_deref(), Some("invalid_or_expired_code"));
        assert!(directory.rotations().is_empty());
    }

    #[actix_web::test]
    async fn test_confirm_rotates_credential_and_consumes_code_once() {
        let store = MemoryStore::new();
        let email = unique_email();
        let code = seed_code(&store, &email);
        let user = directory_user(&email);
        let directory = MockDirectory::with_users(vec![user.clone()]);

        let app = test::init_service(
            App::new()
                .app_data(store_data(&store))
                .app_data(sender_data(RecordingSender::new()))
                .app_data(directory_data(&directory))
                .app_data(Data::new(test_policy()))
                .configure(crate::services::api::configure),
        )
        .await;

        let body = json!({
            "email": email,
            "code": code,
            "newPassword": "secret123",
        });

        let req = TestRequest::post()
            .uri(CONFIRM_URI)
            .set_json(&body)
            .to_request();
        let ack = read_ack(test::call_service(&app, req).await).await;

        assert!(ack.ok);
        assert!(store.rows()[0].used);
        assert_eq!(
            directory.rotations(),
            vec![(user.id, String::from("secret123"))]
        );

        // The identical request again must fail: the code is single-use.
        let req = TestRequest::post()
            .uri(CONFIRM_URI)
            .set_json(&body)
            .to_request();
        let ack = read_ack(test::call_service(&app, req).await).await;

        assert!(!ack.ok);
        assert_eq!(ack.error.as_deref(), Some("invalid_or_expired_code"));
        assert_eq!(directory.rotations().len(), 1);
    }

    #[actix_web::test]
    async fn test_confirm_prefers_most_recent_code_for_email() {
        let store = MemoryStore::new();
        let email = unique_email();
        let user = directory_user(&email);
        let directory = MockDirectory::with_users(vec![user.clone()]);

        let now = SystemTime::now();
        store.insert_row(
            &email,
            "111111",
            now - Duration::from_secs(60),
            now + Duration::from_secs(540),
            false,
        );
        store.insert_row(&email, "222222", now, now + Duration::from_secs(600), false);

        let app = test::init_service(
            App::new()
                .app_data(store_data(&store))
                .app_data(sender_data(RecordingSender::new()))
                .app_data(directory_data(&directory))
                .app_data(Data::new(test_policy()))
                .configure(crate::services::api::configure),
        )
        .await;

        // Both codes are valid; the newer one wins, and the older one remains
        // usable afterward.
        let req = TestRequest::post()
            .uri(CONFIRM_URI)
            .set_json(json!({
                "email": email,
                "code": "222222",
                "newPassword": "secret123",
            }))
            .to_request();
        let ack = read_ack(test::call_service(&app, req).await).await;

        assert!(ack.ok);

        let rows = store.rows();
        let newer = rows.iter().find(|row| row.code == "222222").unwrap();
        let older = rows.iter().find(|row| row.code == "111111").unwrap();
        assert!(newer.used);
        assert!(!older.used);
    }

    #[actix_web::test]
    async fn test_confirm_matches_account_email_case_insensitively() {
        let store = MemoryStore::new();
        let email = "User@Example.com";
        let code = seed_code(&store, email);
        let user = directory_user("user@example.com");
        let directory = MockDirectory::with_users(vec![user.clone()]);

        let app = test::init_service(
            App::new()
                .app_data(store_data(&store))
                .app_data(sender_data(RecordingSender::new()))
                .app_data(directory_data(&directory))
                .app_data(Data::new(test_policy()))
                .configure(crate::services::api::configure),
        )
        .await;

        let req = TestRequest::post()
            .uri(CONFIRM_URI)
            .set_json(json!({
                "email": email,
                "code": code,
                "newPassword": "secret123",
            }))
            .to_request();
        let ack = read_ack(test::call_service(&app, req).await).await;

        assert!(ack.ok);
        assert_eq!(directory.rotations()[0].0, user.id);
    }

    #[actix_web::test]
    async fn test_confirm_reports_unknown_account_and_releases_code() {
        let store = MemoryStore::new();
        let email = unique_email();
        let code = seed_code(&store, &email);
        let directory = MockDirectory::with_users(vec![directory_user("someone-else@tasknest.test")]);

        let app = test::init_service(
            App::new()
                .app_data(store_data(&store))
                .app_data(sender_data(RecordingSender::new()))
                .app_data(directory_data(&directory))
                .app_data(Data::new(test_policy()))
                .configure(crate::services::api::configure),
        )
        .await;

        let req = TestRequest::post()
            .uri(CONFIRM_URI)
            .set_json(json!({
                "email": email,
                "code": code,
                "newPassword": "secret123",
            }))
            .to_request();
        let ack = read_ack(test::call_service(&app, req).await).await;

        assert!(!ack.ok);
        assert_eq!(ack.error.as_deref(), Some("account_not_found"));
        assert!(!store.rows()[0].used);
    }

    #[actix_web::test]
    async fn test_confirm_treats_truncated_directory_scan_as_not_found() {
        let store = MemoryStore::new();
        let email = unique_email();
        let code = seed_code(&store, &email);

        let filler_users: Vec<DirectoryUser> = (0..10)
            .map(|n| directory_user(&format!("filler{n}@tasknest.test")))
            .collect();
        let directory = MockDirectory::with_users(filler_users);

        let mut policy = test_policy();
        policy.directory_page_size = 2;
        policy.directory_max_pages = 2;

        let app = test::init_service(
            App::new()
                .app_data(store_data(&store))
                .app_data(sender_data(RecordingSender::new()))
                .app_data(directory_data(&directory))
                .app_data(Data::new(policy))
                .configure(crate::services::api::configure),
        )
        .await;

        let req = TestRequest::post()
            .uri(CONFIRM_URI)
            .set_json(json!({
                "email": email,
                "code": code,
                "newPassword": "secret123",
            }))
            .to_request();
        let ack = read_ack(test::call_service(&app, req).await).await;

        assert!(!ack.ok);
        assert_eq!(ack.error.as_deref(), Some("account_not_found"));
        assert!(!store.rows()[0].used);
    }

    #[actix_web::test]
    async fn test_confirm_rotation_failure_leaves_code_retriable() {
        let store = MemoryStore::new();
        let email = unique_email();
        let code = seed_code(&store, &email);
        let user = directory_user(&email);
        let failing_directory = MockDirectory::with_failing_rotation(vec![user.clone()]);

        let app = test::init_service(
            App::new()
                .app_data(store_data(&store))
                .app_data(sender_data(RecordingSender::new()))
                .app_data(directory_data(&failing_directory))
                .app_data(Data::new(test_policy()))
                .configure(crate::services::api::configure),
        )
        .await;

        let body = json!({
            "email": email,
            "code": code,
            "newPassword": "secret123",
        });

        let req = TestRequest::post()
            .uri(CONFIRM_URI)
            .set_json(&body)
            .to_request();
        let ack = read_ack(test::call_service(&app, req).await).await;

        assert!(!ack.ok);
        assert_eq!(ack.error.as_deref(), Some("credential_update_failed"));
        assert!(!store.rows()[0].used);

        // Same code, healthy directory: the retry completes the reset.
        let healthy_directory = MockDirectory::with_users(vec![user.clone()]);
        let app = test::init_service(
            App::new()
                .app_data(store_data(&store))
                .app_data(sender_data(RecordingSender::new()))
                .app_data(directory_data(&healthy_directory))
                .app_data(Data::new(test_policy()))
                .configure(crate::services::api::configure),
        )
        .await;

        let req = TestRequest::post()
            .uri(CONFIRM_URI)
            .set_json(&body)
            .to_request();
        let ack = read_ack(test::call_service(&app, req).await).await;

        assert!(ack.ok);
        assert!(store.rows()[0].used);
        assert_eq!(healthy_directory.rotations().len(), 1);
    }

    #[actix_web::test]
    async fn test_concurrent_confirms_rotate_at_most_once() {
        let store = MemoryStore::new();
        let email = unique_email();
        let code = seed_code(&store, &email);
        let user = directory_user(&email);
        let directory = MockDirectory::with_users(vec![user.clone()]);

        let app = test::init_service(
            App::new()
                .app_data(store_data(&store))
                .app_data(sender_data(RecordingSender::new()))
                .app_data(directory_data(&directory))
                .app_data(Data::new(test_policy()))
                .configure(crate::services::api::configure),
        )
        .await;

        let body = json!({
            "email": email,
            "code": code,
            "newPassword": "secret123",
        });

        let req_a = TestRequest::post()
            .uri(CONFIRM_URI)
            .set_json(&body)
            .to_request();
        let req_b = TestRequest::post()
            .uri(CONFIRM_URI)
            .set_json(&body)
            .to_request();

        let (resp_a, resp_b) = tokio::join!(
            test::call_service(&app, req_a),
            test::call_service(&app, req_b)
        );

        let ack_a = read_ack(resp_a).await;
        let ack_b = read_ack(resp_b).await;

        assert!(ack_a.ok != ack_b.ok, "Exactly one confirmation must win");
        assert_eq!(directory.rotations().len(), 1);
        assert!(store.rows()[0].used);
    }

    #[actix_web::test]
    async fn test_unparseable_body_still_gets_the_envelope() {
        let store = MemoryStore::new();

        let app = test::init_service(
            App::new()
                .app_data(store_data(&store))
                .app_data(sender_data(RecordingSender::new()))
                .app_data(directory_data(&MockDirectory::with_users(Vec::new())))
                .app_data(Data::new(test_policy()))
                .configure(crate::services::api::configure),
        )
        .await;

        let req = TestRequest::post()
            .uri(ISSUE_URI)
            .insert_header(("Content-Type", "application/json"))
            .set_payload("{not json")
            .to_request();
        let ack = read_ack(test::call_service(&app, req).await).await;

        assert!(!ack.ok);
        assert_eq!(ack.error.as_deref(), Some("email required"));

        // A body with the fields absent behaves like one with empty fields.
        let req = TestRequest::post()
            .uri(CONFIRM_URI)
            .set_json(json!({}))
            .to_request();
        let ack = read_ack(test::call_service(&app, req).await).await;

        assert!(!ack.ok);
        assert_eq!(
            ack.error.as_deref(),
            Some("email, code, and newPassword are required")
        );
        assert!(store.rows().is_empty());
    }

    #[actix_web::test]
    async fn test_claim_is_a_compare_and_swap() {
        let store = MemoryStore::new();
        let email = unique_email();
        seed_code(&store, &email);
        let id = store.rows()[0].id;

        let (first, second) = tokio::join!(store.consume_code(id), store.consume_code(id));

        assert!(first.unwrap() != second.unwrap());
    }

    #[actix_web::test]
    async fn test_full_reset_scenario() {
        let store = MemoryStore::new();
        let sender = RecordingSender::new();
        let user = directory_user("a@b.com");
        let directory = MockDirectory::with_users(vec![user.clone()]);

        let app = test::init_service(
            App::new()
                .app_data(store_data(&store))
                .app_data(sender_data(sender.clone()))
                .app_data(directory_data(&directory))
                .app_data(Data::new(test_policy()))
                .configure(crate::services::api::configure),
        )
        .await;

        let req = TestRequest::post()
            .uri(ISSUE_URI)
            .set_json(json!({ "email": "a@b.com" }))
            .to_request();
        let ack = read_ack(test::call_service(&app, req).await).await;
        assert!(ack.ok);

        let rows = store.rows();
        assert_eq!(rows.len(), 1);
        assert!(!rows[0].used);
        let code = rows[0].code.clone();
        let wrong_code = if code == "100000" { "100001" } else { "100000" };

        let req = TestRequest::post()
            .uri(CONFIRM_URI)
            .set_json(json!({
                "email": "a@b.com",
                "code": wrong_code,
                "newPassword": "secret1",
            }))
            .to_request();
        let ack = read_ack(test::call_service(&app, req).await).await;
        assert!(!ack.ok);
        assert_eq!(ack.error.as_deref(), Some("invalid_or_expired_code"));
        assert!(directory.rotations().is_empty());

        let req = TestRequest::post()
            .uri(CONFIRM_URI)
            .set_json(json!({
                "email": "a@b.com",
                "code": code,
                "newPassword": "short",
            }))
            .to_request();
        let ack = read_ack(test::call_service(&app, req).await).await;
        assert!(!ack.ok);
        assert!(!store.rows()[0].used);

        let req = TestRequest::post()
            .uri(CONFIRM_URI)
            .set_json(json!({
                "email": "a@b.com",
                "code": code,
                "newPassword": "secret123",
            }))
            .to_request();
        let ack = read_ack(test::call_service(&app, req).await).await;
        assert!(ack.ok);
        assert!(store.rows()[0].used);
        assert_eq!(
            directory.rotations(),
            vec![(user.id, String::from("secret123"))]
        );
    }
}
