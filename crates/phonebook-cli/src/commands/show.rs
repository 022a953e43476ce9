use phonebook_core::models::ContactEntry;

use crate::commands::common::{contact_to_list_item, entry_status, parse_contact_id, AppContext};
use crate::error::CliError;

pub async fn run_show(context: &AppContext, id: &str, as_json: bool) -> Result<(), CliError> {
    let id = parse_contact_id(id)?;
    let view_model = context.open().await?;
    let entry = view_model.find(&id).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&contact_to_list_item(&entry))?);
        return Ok(());
    }

    println!("ID:      {}", entry.id());
    println!("Name:    {}", entry.name());
    println!("Phone:   {}", entry.phone());
    let photo = match &entry {
        ContactEntry::Synced(contact) => contact.photo_or_placeholder().to_string(),
        ContactEntry::Pending(pending) => pending
            .photo
            .clone()
            .unwrap_or_else(|| phonebook_core::models::PLACEHOLDER_PHOTO.to_string()),
    };
    println!("Photo:   {photo}");
    println!("Status:  {}", entry_status(&entry));
    if view_model.state().is_offline {
        println!("(offline, showing local data)");
    }
    Ok(())
}
