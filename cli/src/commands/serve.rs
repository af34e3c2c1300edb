use std::sync::Arc;

use fanout_common::config::TransportKind;
use fanout_core::server::Server;
use fanout_core::service::GrepExecutor;
use tracing::{info, warn};

use super::ServeArgs;

pub async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    match &args.log {
        Some(path) if !path.exists() => {
            warn!("default log {} does not exist yet; requests without a path will fail", path.display())
        }
        None => info!("no default log configured; requests must name a file"),
        _ => {}
    }

    let executor = GrepExecutor::new(args.log.clone()).with_binary(args.grep_bin.clone());
    let transport = if args.http { TransportKind::Http } else { TransportKind::Tcp };

    Server::bind((args.bind.as_str(), args.port), Arc::new(executor))
        .await?
        .with_transport(transport)
        .with_max_connections(args.max_connections)
        .run()
        .await
}
