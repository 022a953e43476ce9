use crate::commands::common::{print_list, AppContext};
use crate::error::CliError;

pub async fn run_list(
    context: &AppContext,
    page: u32,
    limit: Option<u32>,
    all: bool,
    as_json: bool,
) -> Result<(), CliError> {
    let mut context = context.clone();
    if let Some(limit) = limit {
        context.config.page_size = limit;
        context.config = context.config.normalized()?;
    }

    let view_model = context.open().await?;
    view_model.refresh().await?;
    while all || view_model.state().page < page {
        if !view_model.load_more().await? {
            break;
        }
    }

    print_list(&view_model.state(), as_json)
}
