use std::{path::PathBuf, time::Duration};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    format_amount, parse_amount_input, split_record, ApiClient, ClientDirectory, ClientError,
    SectionTrigger, TransferDesk, UserAction, WizardSession,
};
use shared::{
    domain::{ClientId, Role, TellerId, TransferId},
    protocol::ClientRecord,
};
use tracing::{error, info, warn};

mod config;

#[derive(Parser, Debug)]
#[command(name = "backoffice", about = "Branch back-office client")]
struct Cli {
    /// Overrides the configured API base URL.
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// Token from a previous `login`.
    #[arg(long, global = true, env = "BACKOFFICE_TOKEN", hide_env_values = true)]
    token: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Signs in and prints the session token.
    Login {
        email: String,
        #[arg(long, env = "BACKOFFICE_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long, default_value = "asesor")]
        role: String,
    },
    #[command(subcommand)]
    Transfer(TransferCommand),
    #[command(subcommand)]
    Client(ClientCommand),
}

#[derive(Subcommand, Debug)]
enum TransferCommand {
    /// Sends cash from this till to another one.
    Send { destination: String, amount: String },
    /// Lists transfers waiting for this till.
    Pending,
    Accept { transfer_id: i64 },
}

#[derive(Subcommand, Debug)]
enum ClientCommand {
    Show {
        client_id: i64,
    },
    /// Registers the client in a JSON file, or updates `--client-id`.
    Submit {
        file: PathBuf,
        #[arg(long)]
        client_id: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = config::load_settings();
    tracing_subscriber::fmt()
        .with_env_filter(settings.log_filter.as_str())
        .with_writer(std::io::stderr)
        .init();

    let api_url = config::normalize_api_url(cli.api_url.as_deref().unwrap_or(&settings.api_url))?;
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.request_timeout_secs))
        .build()?;
    let api = ApiClient::with_http_client(api_url, http);
    info!(api_url = api.base_url(), "backoffice: starting");

    match cli.command {
        Command::Login {
            email,
            password,
            role,
        } => {
            let role = Role::parse(&role).ok_or_else(|| anyhow!("unknown role '{role}'"))?;
            let session = api
                .login(&email, &password, role)
                .await
                .map_err(|err| user_facing(err, UserAction::Login))?;
            println!("{}", session.token());
        }
        Command::Transfer(command) => {
            restore(&api, cli.token.as_deref()).await?;
            run_transfer(api, command).await?;
        }
        Command::Client(command) => {
            restore(&api, cli.token.as_deref()).await?;
            run_client(&api, command).await?;
        }
    }

    Ok(())
}

async fn restore(api: &ApiClient, token: Option<&str>) -> Result<()> {
    let token = token.context("no session token; run `login` and set BACKOFFICE_TOKEN")?;
    api.restore_session(token).await?;
    Ok(())
}

async fn run_transfer(api: ApiClient, command: TransferCommand) -> Result<()> {
    let teller = api.require_session().await?.teller();
    let desk = TransferDesk::new(api);

    match command {
        TransferCommand::Send {
            destination,
            amount,
        } => {
            let receipt = desk
                .send(&teller, &TellerId::new(destination), parse_amount_input(&amount))
                .await
                .map_err(|err| user_facing(err, UserAction::SendTransfer))?;
            println!(
                "transfer {} sent: {} -> {} ${}",
                receipt.id,
                receipt.origin_teller,
                receipt.destination_teller,
                format_amount(receipt.amount)
            );
        }
        TransferCommand::Pending => {
            let pending = desk
                .list_pending(&teller)
                .await
                .map_err(|err| user_facing(err, UserAction::ListPendingTransfers))?;
            if pending.is_empty() {
                println!("no pending transfers for {teller}");
            }
            for transfer in pending {
                println!(
                    "{}\tfrom {}\t${}\t{}",
                    transfer.id,
                    transfer.origin_teller,
                    format_amount(transfer.amount),
                    transfer.sent_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        TransferCommand::Accept { transfer_id } => {
            let transfer = desk
                .accept(TransferId(transfer_id), &teller)
                .await
                .map_err(|err| user_facing(err, UserAction::AcceptTransfer))?;
            println!(
                "transfer {} accepted: ${} from {}",
                transfer.id,
                format_amount(transfer.amount),
                transfer.origin_teller
            );
        }
    }
    Ok(())
}

async fn run_client(api: &ApiClient, command: ClientCommand) -> Result<()> {
    match command {
        ClientCommand::Show { client_id } => {
            let record = api
                .fetch_client(ClientId(client_id))
                .await
                .map_err(|err| user_facing(err, UserAction::LoadClient))?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        ClientCommand::Submit { file, client_id } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read '{}'", file.display()))?;
            let record: ClientRecord = serde_json::from_str(&raw)
                .with_context(|| format!("'{}' is not a client record", file.display()))?;

            let mut wizard = WizardSession::new();
            let action = match client_id {
                Some(client_id) => {
                    wizard
                        .load_for_edit(api, ClientId(client_id))
                        .await
                        .map_err(|err| user_facing(err, UserAction::LoadClient))?;
                    UserAction::UpdateClient
                }
                None => UserAction::RegisterClient,
            };
            for section in split_record(record) {
                wizard
                    .report(SectionTrigger::Saved, section)
                    .map_err(|err| user_facing(err, action))?;
            }
            wizard
                .reconcile_geography(api)
                .await
                .map_err(|err| user_facing(err, action))?;
            let message = wizard
                .submit(api)
                .await
                .map_err(|err| user_facing(err, action))?;
            println!("{message}");
        }
    }
    Ok(())
}

fn user_facing(err: ClientError, action: UserAction) -> anyhow::Error {
    if err.is_local() {
        warn!(?action, error = %err, "backoffice: rejected before sending");
    } else {
        error!(?action, error = %err, "backoffice: request failed");
    }
    anyhow!(err.user_message(action))
}
