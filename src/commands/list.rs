use crate::commands::build_http_client;
use crate::models::settings::Settings;
use crate::models::stream::StreamRecord;
use crate::services::aggregation_service::{AggregationPipeline, FilterScope, SortOrder};
use crate::services::directory_service::{DirectoryService, DirectoryStatus};
use crate::services::proxy_client::ProxyClient;
use anyhow::{bail, Result};
use log::info;
use std::sync::Arc;

pub struct ListOptions {
    pub game_id: String,
    pub proxy_url: Option<String>,
    pub query: String,
    pub scope: FilterScope,
    pub order: SortOrder,
    pub limit: Option<usize>,
}

/// Load every live stream for a category through the proxy and print the
/// filtered, sorted listing.
pub async fn run_list(settings: &Settings, options: ListOptions) -> Result<()> {
    let proxy_url = options
        .proxy_url
        .unwrap_or_else(|| format!("http://{}", settings.server.bind_address));

    let http = build_http_client(&settings.upstream)?;
    let source = Arc::new(ProxyClient::new(http, proxy_url));
    let directory = DirectoryService::new(AggregationPipeline::new(source));

    directory.select_category(&options.game_id).await;
    directory.wait().await;

    match directory.status() {
        DirectoryStatus::Ready { records, .. } => {
            let visible = directory.visible(&options.query, options.scope, options.order);
            info!(
                "[List] {} live streams, {} match '{}'",
                records.len(),
                visible.len(),
                options.query
            );
            for record in visible.iter().take(options.limit.unwrap_or(usize::MAX)) {
                println!("{}", format_row(record));
            }
            Ok(())
        }
        DirectoryStatus::Failed { kind, message, .. } => bail!("{} ({})", message, kind),
        other => bail!("Load did not finish: {:?}", other),
    }
}

fn format_row(record: &StreamRecord) -> String {
    let title: String = record.title.chars().take(60).collect();
    format!(
        "{:>8}  {:<25} {:<6} {}",
        record.viewer_count, record.user_name, record.language, title
    )
}
