use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{debug, error};

use quoteline::client::HttpQuotationClient;
use quoteline::config::{self, AppConfig};
use quoteline::errors::ServiceError;
use quoteline::events;
use quoteline::pdf::{PdfExporter, PdfOptions};
use quoteline::projector::LineGroup;
use quoteline::session::QuotationSession;

#[derive(Parser)]
#[command(name = "quoteline", version, about = "Quotation line composition client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List quotations known to the service.
    List,
    /// Show a quotation's lines as the hierarchical table.
    Show {
        quotation_id: i64,
        /// Include soft-removed raw material rows.
        #[arg(long)]
        show_removed: bool,
    },
    /// Export a quotation to PDF.
    ExportPdf {
        quotation_id: i64,
        /// Omit rates on raw material rows.
        #[arg(long)]
        hide_raw_prices: bool,
        /// Output directory; defaults to the configured one.
        #[arg(long)]
        out: Option<String>,
    },
    /// Reconcile local state against the server and save as finalized.
    Finalize { quotation_id: i64 },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {}", e);
            std::process::exit(2);
        }
    };
    config::init_tracing(&config.log_level, config.log_json);

    if let Err(e) = run(cli, config).await {
        error!(error = %e, "Command failed");
        eprintln!("{}", e.user_message());
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: AppConfig) -> Result<(), ServiceError> {
    let api = Arc::new(HttpQuotationClient::new(&config)?);
    let (events, mut event_rx) = events::channel(64);
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            debug!(?event, "Session event");
        }
    });

    let mut session = QuotationSession::new(api, events);

    match cli.command {
        Command::List => {
            for summary in session.list_quotations().await? {
                let status = summary.status.map(|s| s.to_string()).unwrap_or_default();
                println!("{:>6}  {:<30} {}", summary.id, summary.name, status);
            }
        }
        Command::Show {
            quotation_id,
            show_removed,
        } => {
            session.load_catalogs().await?;
            session.open(quotation_id).await?;
            print_table(&session, show_removed);
        }
        Command::ExportPdf {
            quotation_id,
            hide_raw_prices,
            out,
        } => {
            session.load_catalogs().await?;
            session.open(quotation_id).await?;
            let header = session
                .header()
                .ok_or_else(|| ServiceError::InvalidOperation("No quotation is open".into()))?;
            let exporter = PdfExporter::new(out.unwrap_or(config.pdf_output_dir));
            let options = PdfOptions {
                show_raw_prices: !hide_raw_prices,
            };
            let path = exporter.export(header, &session.project(false), options)?;
            println!("wrote {}", path.display());
        }
        Command::Finalize { quotation_id } => {
            session.load_catalogs().await?;
            session.open(quotation_id).await?;
            session.finalize_and_save().await?;
            println!("quotation {} finalized", quotation_id);
        }
    }
    Ok(())
}

fn print_table(session: &QuotationSession, show_removed: bool) {
    if let Some(header) = session.header() {
        println!(
            "{} [{}]  {} / valid until {}",
            header.name, header.status, header.date, header.expiry_date
        );
    }
    let groups = session.project(show_removed);
    print_groups(&groups);
    println!("{:>68} {}", "grand total:", session.grand_total());
}

fn print_groups(groups: &[LineGroup]) {
    for group in groups {
        println!(
            "{:>3}. {:<40} {:>5} x {:>8} = {:>10}",
            group.number,
            group.item.description,
            group.item.quantity,
            group.item.unit_price,
            group.item.total
        );
        for child in &group.children {
            let marker = if child.removed { " [removed]" } else { "" };
            // Raw totals never display; their cost is folded into the item.
            println!(
                "   {:>3}) {:<38} {:>5} x {:>8} = {:>10}{}",
                child.label,
                child.line.description,
                child.line.quantity,
                child.line.unit_price,
                "-",
                marker
            );
        }
    }
}
