/*!
 * listing-radar
 *
 * Observa depósitos em carteiras quentes de exchanges e alerta sobre
 * tokens que ainda não estão listados
 */

mod config;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use config::{ChainSettings, RadarConfig};
use radar_core::traits::{AlertNotifier, ListedTokenFilter};
use radar_core::types::{Chain, ChainFamily};
use radar_detector::{ChainWatcher, JsonSnapshotStore, Orchestrator, SnapshotStore, SummaryReport, WatcherOptions};
use radar_listing::{ListingIndex, ListingOptions};
use radar_notify::WebhookNotifier;
use radar_rpc::{EvmRpcClient, RpcConfig, SolanaRpcClient};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "listing-radar")]
#[command(about = "Detecta tokens não listados recebidos por carteiras de exchanges")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// Arquivo de configuração JSON
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Inicia os watchers até Ctrl-C
    Run {
        /// Chains a observar (eth,bsc,sol); padrão: todas as habilitadas
        #[arg(long, value_delimiter = ',')]
        chains: Vec<Chain>,
        /// Desativa o filtro de tokens já listados
        #[arg(long)]
        no_filter: bool,
    },
    /// Imprime o relatório a partir dos snapshots salvos
    Report,
    /// Envia um cartão de teste para o webhook configurado
    TestWebhook,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init_logging()?;

    let config = RadarConfig::load(args.config.as_deref())?;
    match args.command.unwrap_or(Commands::Run { chains: Vec::new(), no_filter: false }) {
        Commands::Run { chains, no_filter } => run(config, &chains, no_filter).await,
        Commands::Report => report(&config),
        Commands::TestWebhook => test_webhook(&config).await,
    }
}

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,hyper=warn,reqwest=warn"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

async fn run(config: RadarConfig, only: &[Chain], no_filter: bool) -> Result<()> {
    info!("Iniciando listing-radar v{}", env!("CARGO_PKG_VERSION"));

    let filter: Option<Arc<dyn ListedTokenFilter>> = if no_filter || !config.listing.enabled {
        warn!("Filtro de tokens listados desativado");
        None
    } else {
        let index = ListingIndex::open(ListingOptions {
            cache_path: config.listing.cache_path.clone(),
            ttl: chrono::Duration::hours(config.listing.ttl_hours as i64),
            ..Default::default()
        })
        .await;
        let stats = index.stats();
        info!(tokens = stats.total_tokens, eth = stats.eth_contracts, bsc = stats.bsc_contracts, "Filtro de listagens pronto");
        Some(Arc::new(index))
    };

    let notifier: Option<Arc<dyn AlertNotifier>> = match &config.webhook_url {
        Some(url) => {
            let webhook = WebhookNotifier::new(url.clone());
            if !webhook.send_test_message().await {
                warn!("Webhook não confirmou a mensagem de teste; alertas podem não ser entregues");
            }
            Some(Arc::new(webhook))
        }
        None => {
            warn!("WEBHOOK_URL ausente: alertas apenas no log");
            None
        }
    };

    let store: Option<Arc<dyn SnapshotStore>> = match &config.state_dir {
        Some(dir) => Some(Arc::new(JsonSnapshotStore::open(dir).context("falha ao abrir diretório de estado")?)),
        None => None,
    };

    let options = WatcherOptions {
        heuristics: config.heuristics.clone(),
        policy: config.policy.clone(),
        filter,
        notifier,
        store,
        ..Default::default()
    };

    let mut orchestrator = Orchestrator::new();
    for settings in config.active_chains(only) {
        match build_watcher(settings, options.clone()).await {
            Ok(mut watcher) => {
                if let Err(e) = watcher.restore_from_store() {
                    warn!(chain = %settings.chain, error = %e, "Snapshot ignorado");
                }
                orchestrator.add_watcher(watcher, settings.poll_interval());
            }
            Err(e) => error!(chain = %settings.chain, error = %e, "Chain desativada: falha ao conectar"),
        }
    }
    if orchestrator.chains().is_empty() {
        bail!("nenhuma chain pôde ser iniciada");
    }

    tokio::spawn(cancel_on_signal(tokio::signal::ctrl_c(), orchestrator.cancellation_token()));

    let report = orchestrator.run().await;
    println!("{}", report.render());
    Ok(())
}

/// Cancela os watchers quando o sinal chega; sem o handler eles seguem rodando
async fn cancel_on_signal<F>(signal: F, cancel: CancellationToken)
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => {
            info!("Ctrl-C recebido, encerrando watchers");
            cancel.cancel();
        }
        Err(e) => error!(error = %e, "Falha ao registrar handler de Ctrl-C; watchers seguem ativos"),
    }
}

async fn build_watcher(settings: &ChainSettings, options: WatcherOptions) -> Result<ChainWatcher> {
    let rpc = RpcConfig::new(settings.rpc_url.clone());
    let options = WatcherOptions { start_height: settings.start_height, ..options };
    let wallets = settings.wallet_addresses();
    let watcher = match settings.chain.family() {
        ChainFamily::LogModel => {
            let client = Arc::new(EvmRpcClient::connect(rpc).await?);
            ChainWatcher::log_model(settings.chain, wallets, client, options)
        }
        ChainFamily::SignatureScan => {
            let client = Arc::new(SolanaRpcClient::connect(rpc).await?);
            ChainWatcher::signature_scan(settings.chain, wallets, client, options)
        }
    };
    info!(chain = %settings.chain, wallets = settings.wallets.len(), "Watcher configurado");
    Ok(watcher)
}

fn report(config: &RadarConfig) -> Result<()> {
    let dir = config.state_dir.as_ref().context("state_dir não configurado")?;
    let store = JsonSnapshotStore::open(dir)?;
    let mut snapshots = Vec::new();
    for settings in &config.chains {
        if let Some(snapshot) = store.load(settings.chain)? {
            snapshots.push(snapshot);
        }
    }
    if snapshots.is_empty() {
        bail!("nenhum snapshot encontrado em {}", dir.display());
    }
    println!("{}", SummaryReport::from_snapshots(snapshots.iter()).render());
    Ok(())
}

async fn test_webhook(config: &RadarConfig) -> Result<()> {
    let url = config.webhook_url.as_ref().context("WEBHOOK_URL não configurado")?;
    let notifier = WebhookNotifier::new(url.clone());
    if !notifier.send_test_message().await {
        bail!("webhook não confirmou a mensagem de teste");
    }
    info!("Mensagem de teste entregue");
    Ok(())
}
