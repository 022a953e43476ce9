use std::path::Path;

use phonebook_core::models::ContactPatch;

use crate::commands::common::{parse_contact_id, print_entry, read_avatar, AppContext};
use crate::error::CliError;

pub async fn run_edit(
    context: &AppContext,
    id: &str,
    name: Option<String>,
    phone: Option<String>,
    avatar: Option<&Path>,
    clear_photo: bool,
) -> Result<(), CliError> {
    let id = parse_contact_id(id)?;
    let patch = ContactPatch {
        name,
        phone,
        photo: None,
        clear_photo,
    };
    let avatar = avatar.map(read_avatar).transpose()?;
    if patch.is_empty() && avatar.is_none() {
        return Err(CliError::EmptyEdit);
    }

    let view_model = context.open().await?;
    let entry = if patch.is_empty() {
        match avatar {
            Some(avatar) => view_model.update_avatar(&id, avatar).await?,
            None => return Err(CliError::EmptyEdit),
        }
    } else {
        view_model.edit(&id, patch, avatar).await?
    };

    let state = view_model.state();
    print_entry(&entry, state.is_offline);
    if let Some(error) = state.error {
        eprintln!("Warning: {error}");
    }
    Ok(())
}
