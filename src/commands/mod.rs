//! Message gateway: one handler per action, each delegating to the library
//! or the synchronizer.

mod data;
mod preferences;
mod sync;
mod types;

pub use data::*;
pub use preferences::*;
pub use sync::*;
pub use types::{Request, Response, TabInfo, TabProvider};

use crate::AppState;

/// Run one request to completion. Never fails; errors become
/// `{success: false, error}`.
pub async fn handle(state: &AppState, request: Request) -> Response {
    let action = request.action();
    tracing::debug!("Handling {}", action);

    let response = match request {
        Request::ShareLink { link } => share_link(state, link).await.map(Response::Share),
        Request::ForceSync | Request::ManualSync => Ok(Response::Sync(force_sync(state).await)),
        Request::ResetToDefaults => Ok(Response::Sync(reset_to_defaults(state).await)),
        Request::RefreshLinks => Ok(Response::Sync(refresh_links(state).await)),
        Request::GetApiUrl => Ok(Response::ApiUrl {
            success: true,
            url: get_api_url(state),
        }),
        Request::GetCurrentTab => get_current_tab(state)
            .await
            .map(|tab| Response::Tab { success: true, tab }),
        Request::AddLink { link } => add_link(state, link)
            .await
            .map(|link| Response::Link { success: true, link }),
        Request::UpdateLink { id, link } => update_link(state, &id, link)
            .await
            .map(|link| Response::Link { success: true, link }),
        Request::DeleteLink { id } => delete_link(state, &id).await.map(|_| Response::ack()),
        Request::AddCategory { name } => add_category(state, &name)
            .await
            .map(|categories| Response::Categories {
                success: true,
                categories,
            }),
        Request::ClearLinks => clear_links(state).await.map(|_| Response::ack()),
        Request::ExportData => export_data(state)
            .await
            .map(|data| Response::Export { success: true, data }),
        Request::ImportData { data } => import_data(state, data).await.map(|_| Response::ack()),
        Request::GetLibrary => get_library(state)
            .await
            .map(|view| Response::Library { success: true, view }),
        Request::Search { term, category } => search(state, &term, category.as_deref())
            .await
            .map(|results| Response::Search {
                success: true,
                results,
            }),
        Request::GetSettings => Ok(Response::Settings {
            success: true,
            settings: get_settings(state).await,
        }),
        Request::SaveSettings { settings } => save_settings(state, settings)
            .await
            .map(|settings| Response::Settings {
                success: true,
                settings,
            }),
    };

    match response {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!("{} failed: {}", action, e);
            Response::failure(e)
        }
    }
}
