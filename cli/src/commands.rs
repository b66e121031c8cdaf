//! Subcommand handlers.
//!
//! Each handler returns the JSON document to print and the process exit
//! code.

use serde_json::{json, Value};

use common::{SyncError, SyncResult};
use domain::{ChangeRequest, ChangeResult, Requester, Secret, SystemKind};
use sync_service_lib::SyncService;

pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_REJECTED: i32 = 2;
pub const EXIT_RECONCILE: i32 = 3;

pub const NEW_PASSWORD_VAR: &str = "CREDSYNC_NEW_PASSWORD";
pub const CONFIRM_PASSWORD_VAR: &str = "CREDSYNC_CONFIRM_PASSWORD";
pub const PREVIOUS_PASSWORD_VAR: &str = "CREDSYNC_PREVIOUS_PASSWORD";

/// Arguments of `credsync change`.
#[derive(Debug, Clone)]
pub struct ChangeArgs {
    pub requester: String,
    pub admin: bool,
    pub target: String,
    pub systems: Option<String>,
}

pub async fn status(service: &dyn SyncService) -> (Value, i32) {
    let report = service.connectivity().await;
    let code = if report.all_ok() { EXIT_OK } else { EXIT_FAILED };
    (json!(report), code)
}

pub async fn change<F>(service: &dyn SyncService, args: ChangeArgs, env: F) -> (Value, i32)
where
    F: Fn(&str) -> Option<String>,
{
    let request = match build_request(args, env) {
        Ok(request) => request,
        Err(e) => return (error_json(&e), exit_code(&Err(e))),
    };

    let result = service.change_password(request).await;
    let code = exit_code(&result);
    let output = match &result {
        Ok(result) => json!({
            "summary": result.summary(),
            "result": result,
        }),
        Err(e) => error_json(e),
    };
    (output, code)
}

/// Assemble a request from arguments plus password variables.
pub fn build_request<F>(args: ChangeArgs, env: F) -> SyncResult<ChangeRequest>
where
    F: Fn(&str) -> Option<String>,
{
    let secret = |key: &str| env(key).filter(|v| !v.is_empty()).map(Secret::new);

    let new_password = secret(NEW_PASSWORD_VAR)
        .ok_or_else(|| SyncError::validation(format!("{} must be set", NEW_PASSWORD_VAR)))?;

    let requester = if args.admin {
        Requester::admin(args.requester)
    } else {
        Requester::user(args.requester)
    };

    let mut request = ChangeRequest::new(requester, args.target, new_password);
    if let Some(systems) = args.systems {
        request = request.with_systems(SystemKind::parse_list(&systems)?);
    }
    if let Some(confirm) = secret(CONFIRM_PASSWORD_VAR) {
        request = request.with_confirmation(confirm);
    }
    if let Some(previous) = secret(PREVIOUS_PASSWORD_VAR) {
        request = request.with_previous_password(previous);
    }
    Ok(request)
}

pub fn exit_code(result: &SyncResult<ChangeResult>) -> i32 {
    match result {
        Ok(r) if r.overall_success => EXIT_OK,
        Ok(r) if r.requires_reconciliation() => EXIT_RECONCILE,
        Ok(_) => EXIT_FAILED,
        Err(e) if e.is_rejection() => EXIT_REJECTED,
        Err(_) => EXIT_FAILED,
    }
}

fn error_json(err: &SyncError) -> Value {
    json!({
        "error": {
            "code": err.code(),
            "message": err.user_message(),
        }
    })
}
