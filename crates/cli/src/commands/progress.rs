use crate::commands::{prepare, CommandResult};
use docusphere_core::domain::validation::ValidationRequestId;
use docusphere_db::repositories::{SqlValidationRequestRepository, ValidationRequestRepository};
use docusphere_db::connect_with_config;
use serde_json::json;

/// Reads progress straight from the store. Operators are not workflow
/// actors, so no access check applies.
pub fn run(request_id: &str) -> CommandResult {
    let (config, runtime) = match prepare("progress") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        let repository = SqlValidationRequestRepository::new(pool.clone());
        let found = repository
            .find_by_id(&ValidationRequestId(request_id.to_owned()))
            .await
            .map_err(|error| ("persistence", error.to_string(), 5u8));
        pool.close().await;

        found?.ok_or_else(|| {
            ("not_found", format!("validation request `{request_id}` was not found"), 7u8)
        })
    });

    match result {
        Ok(request) => {
            let progress = request.validation_progress();
            let message = format!(
                "{}: {} of {} validators decided ({}%), {} approvals of {} required",
                request.status,
                progress.approved + progress.rejected,
                progress.total_validators,
                progress.percentage,
                progress.approved,
                progress.min_required
            );
            let data = json!({
                "validation_request_id": request.id,
                "document_id": request.document_id,
                "status": request.status,
                "completed_at": request.completed_at,
                "progress": progress,
            });
            CommandResult::success_with_data("progress", message, Some(data))
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("progress", error_class, message, exit_code)
        }
    }
}
