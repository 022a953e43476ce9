use phonebook_core::sync::DeleteOutcome;

use crate::commands::common::{parse_contact_id, AppContext};
use crate::error::CliError;

pub async fn run_delete(context: &AppContext, id: &str) -> Result<(), CliError> {
    let id = parse_contact_id(id)?;
    let view_model = context.open().await?;

    match view_model.delete(&id).await? {
        DeleteOutcome::Deleted => println!("Deleted {id}"),
        DeleteOutcome::Discarded => println!("Discarded unsynced contact {id}"),
        DeleteOutcome::Queued => {
            println!("Backend unreachable; delete of {id} queued. Run `phonebook sync` later.");
        }
    }
    Ok(())
}
