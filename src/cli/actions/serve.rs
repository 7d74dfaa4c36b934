use crate::{api, auth::Backend, cli::globals::GlobalArgs};
use anyhow::Result;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub globals: GlobalArgs,
}

/// Execute the serve action.
/// # Errors
/// Returns an error if the backend cannot be configured or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    debug!("Global args: {:?}", args.globals);

    let backend = Arc::new(Backend::select(&args.globals)?);

    api::serve(args.port, backend).await
}
