use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use ops_console::{
    api::OpsApiClient,
    cli_args::{CliArgs, Command, RsyncMode},
    client_update::{ClientUpdateState, ClientUpdater, TerminalSink},
    operation::{
        OperationController, OperationParams, OperationRegion, OperationState, OperationType,
        Regions, TerminalRegion,
    },
    selector::{GameRange, Selection, ServerTypeSource},
    stream::HttpConnector,
};

fn init_tracing() -> anyhow::Result<()> {
    tracing::subscriber::set_global_default(
        tracing_subscriber::fmt::Subscriber::builder()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .finish(),
    )
    .context("Failed to set global tracing subscriber")?;

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "ops_console=info");
    }

    init_tracing()?;

    let cli_args = CliArgs::parse();
    let base_url = cli_args.base_url;
    let session_cookie = cli_args.session_cookie;

    match cli_args.command {
        Command::Operate {
            types,
            script,
            params,
            rsync_mode,
        } => {
            operate(
                base_url,
                session_cookie,
                types,
                script,
                params,
                rsync_mode,
            )
            .await
        }
        Command::UpdateClient { channel } => update_client(base_url, session_cookie, channel).await,
        Command::Channels => {
            let client = OpsApiClient::new(&base_url, session_cookie)?;
            let channels = client
                .channel_names()
                .await
                .context("Failed to load channels")?;

            channels.iter().for_each(|channel| println!("{channel}"));

            Ok(())
        }
        Command::ServerTypes { channels, all } => {
            let client = OpsApiClient::new(&base_url, session_cookie)?;

            let selection = if all {
                Selection::All
            } else if channels.is_empty() {
                Selection::None
            } else {
                Selection::Some(channels)
            };

            let source = ops_console::selector::server_type_source(&selection);
            if source == ServerTypeSource::Disabled {
                anyhow::bail!("Select at least one --channel, or use --all");
            }

            let server_types = client
                .server_types(&source)
                .await
                .context("Failed to load server types")?;

            server_types.iter().for_each(|ty| println!("{ty}"));

            Ok(())
        }
        Command::GameNumbers {
            channel,
            server_type,
        } => {
            let client = OpsApiClient::new(&base_url, session_cookie)?;
            let numbers = client
                .game_numbers(&channel, &server_type)
                .await
                .context("Failed to load server numbers")?;

            numbers.iter().for_each(|number| println!("{number}"));
            println!("{}", GameRange::summarize(&numbers));

            Ok(())
        }
    }
}

async fn operate(
    base_url: String,
    session_cookie: Option<String>,
    mut types: Vec<OperationType>,
    script: Option<String>,
    params: Vec<(String, String)>,
    rsync_mode: Option<RsyncMode>,
) -> anyhow::Result<()> {
    types.sort();
    types.dedup();

    if script.is_some() && types.len() > 1 {
        anyhow::bail!("--script can only be used with a single operation type");
    }

    // Validate everything before the first stream is opened.
    let mut plans = Vec::with_capacity(types.len());
    for ty in &types {
        let mut op_params = params.iter().cloned().collect::<OperationParams>();

        if *ty == OperationType::Rsync {
            let mode = rsync_mode.context("rsync requires --rsync-mode (update or reload)")?;
            op_params.insert("rsync_mode", mode.as_str());
        }

        let script = script.clone().unwrap_or_else(|| ty.default_script());

        plans.push((*ty, script, op_params));
    }

    let connector = HttpConnector::new(session_cookie).context("Failed to build http client")?;
    let regions =
        Regions::from_fn(|ty| Arc::new(TerminalRegion::stdout(ty)) as Arc<dyn OperationRegion>);
    let controller = OperationController::new(base_url, Arc::new(connector), regions);

    for (ty, script, op_params) in &plans {
        controller.start(*ty, script, op_params).await;
    }

    let finished = futures::future::join_all(types.iter().map(|ty| {
        let ty = *ty;
        let mut rx = controller.subscribe(ty);

        async move {
            let state = rx
                .wait_for(OperationState::is_terminal)
                .await
                .map(|state| *state)
                .unwrap_or(OperationState::Errored);

            (ty, state)
        }
    }));

    let results = tokio::select! {
        results = finished => Some(results),
        _ = shutdown_signal() => None,
    };

    controller.close_all().await;

    let Some(results) = results else {
        anyhow::bail!("Interrupted");
    };

    let failed = results
        .iter()
        .filter(|(_, state)| *state != OperationState::Completed)
        .map(|(ty, _)| ty.to_string())
        .collect::<Vec<_>>();

    if !failed.is_empty() {
        anyhow::bail!("Operations did not complete: {}", failed.join(", "));
    }

    Ok(())
}

async fn update_client(
    base_url: String,
    session_cookie: Option<String>,
    channel: String,
) -> anyhow::Result<()> {
    let connector = HttpConnector::new(session_cookie).context("Failed to build http client")?;
    let updater = ClientUpdater::new(base_url, Arc::new(connector));
    let mut sink = TerminalSink::new(std::io::stdout());

    let state = tokio::select! {
        state = updater.run(&channel, &mut sink) => state,
        _ = shutdown_signal() => anyhow::bail!("Interrupted"),
    };

    if state != ClientUpdateState::Completed {
        anyhow::bail!("Client update of channel {channel} did not complete");
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C signal handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutting down");
}
