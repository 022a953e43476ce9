use phonebook_core::models::ContactEntry;

use crate::commands::common::{contact_to_list_item, format_contact_lines, AppContext, ContactListItem};
use crate::error::CliError;

pub async fn run_pending(context: &AppContext, as_json: bool) -> Result<(), CliError> {
    let view_model = context.open().await?;
    let entries = view_model
        .pending()
        .await?
        .into_iter()
        .map(ContactEntry::Pending)
        .collect::<Vec<_>>();

    if as_json {
        let json_items = entries
            .iter()
            .map(contact_to_list_item)
            .collect::<Vec<ContactListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No pending changes.");
        return Ok(());
    }
    for line in format_contact_lines(&entries) {
        println!("{line}");
    }
    Ok(())
}
