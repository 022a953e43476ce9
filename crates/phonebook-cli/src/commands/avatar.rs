use std::path::Path;

use crate::commands::common::{parse_contact_id, print_entry, read_avatar, AppContext};
use crate::error::CliError;

pub async fn run_avatar(context: &AppContext, id: &str, file: &Path) -> Result<(), CliError> {
    let id = parse_contact_id(id)?;
    let avatar = read_avatar(file)?;
    let view_model = context.open().await?;

    let entry = view_model.update_avatar(&id, avatar).await?;
    print_entry(&entry, view_model.state().is_offline);
    if let Some(photo) = entry.photo() {
        println!("{photo}");
    }
    Ok(())
}
