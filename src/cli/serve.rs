use crate::{cli, error, info, server};

pub async fn serve() {
    let settings = cli::settings();
    let state = cli::app_state(&settings);

    info!("Serving on http://{}", settings.server_addr);
    if let Err(e) = server::start_api_server(state, &settings.server_addr).await {
        error!("Server stopped: {}", e);
    }
}
