use phonebook_core::models::{SortField, SortOrder};

use crate::commands::common::{print_list, AppContext};
use crate::error::CliError;

pub async fn run_search(
    context: &AppContext,
    term: Option<&str>,
    as_json: bool,
) -> Result<(), CliError> {
    let view_model = context.open().await?;
    view_model.set_search(term.unwrap_or_default()).await?;
    print_list(&view_model.state(), as_json)
}

pub async fn run_sort(
    context: &AppContext,
    field: SortField,
    order: SortOrder,
    as_json: bool,
) -> Result<(), CliError> {
    let view_model = context.open().await?;
    view_model.set_sort(field, order).await?;
    print_list(&view_model.state(), as_json)
}
