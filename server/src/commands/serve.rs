use color_eyre::Result;
use tracing::info;

use crate::{http_server::run_server, AppState};

pub(crate) async fn serve() -> Result<()> {
    let app_state = AppState::from_env().await?;

    tokio::fs::create_dir_all(&app_state.app.media_root).await?;

    info!(
        base_url = %app_state.app.base_url,
        media_root = %app_state.app.media_root.display(),
        "Starting Foodgram"
    );
    run_server(app_state).await?;

    info!("Main Returning");

    Ok(())
}
