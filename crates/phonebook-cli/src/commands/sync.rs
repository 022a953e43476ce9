use crate::commands::common::{print_list, AppContext};
use crate::error::CliError;

pub async fn run_sync(context: &AppContext, as_json: bool) -> Result<(), CliError> {
    let view_model = context.open().await?;
    let report = view_model.sync().await?;

    if !as_json {
        println!(
            "Synced {} change(s); {} still pending",
            report.synced.len(),
            report.still_pending
        );
        for (id, error) in &report.failed {
            eprintln!("{id}: {error}");
        }
    }
    print_list(&view_model.state(), as_json)
}
