use phonebook_core::models::ContactRef;

use crate::commands::common::{parse_contact_id, AppContext};
use crate::error::CliError;

pub async fn run_resend(context: &AppContext, id: &str) -> Result<(), CliError> {
    let id = parse_contact_id(id)?;
    let view_model = context.open().await?;
    let resent = view_model.resend(&id).await?;

    match resent.contact {
        Some(contact) if ContactRef::Server(contact.id.clone()) == resent.previous => {
            println!("Synced {}", contact.id);
        }
        Some(contact) => println!("Synced {} as {}", resent.previous, contact.id),
        None => println!("Synced delete of {}", resent.previous),
    }
    Ok(())
}
