use std::path::Path;

use phonebook_core::models::ContactDraft;

use crate::commands::common::{print_entry, read_avatar, AppContext};
use crate::error::CliError;

pub async fn run_add(
    context: &AppContext,
    name: &str,
    phone: &str,
    avatar: Option<&Path>,
) -> Result<(), CliError> {
    let avatar = avatar.map(read_avatar).transpose()?;
    let view_model = context.open().await?;
    let mut entry = view_model.add(ContactDraft::new(name, phone)).await?;

    if let Some(avatar) = avatar {
        match view_model.update_avatar(&entry.id(), avatar).await {
            Ok(updated) => entry = updated,
            Err(error) => eprintln!("Warning: contact saved, but the avatar was not: {error}"),
        }
    }

    print_entry(&entry, view_model.state().is_offline);
    Ok(())
}
