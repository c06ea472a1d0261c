use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgGroup, Parser, Subcommand};
use log::{error, info};

use clerk::{AccessScope, Desk, DeskConfig, DeskError, Roster};

/// Compile a sales desk report and print it as JSON.
#[derive(Debug, Parser)]
#[command(version, group(ArgGroup::new("identity").required(true).args(["user", "role"])))]
struct Args {
    /// TOML file overriding the default desk settings
    #[arg(long, env = "DESK_CONFIG")]
    config: Option<PathBuf>,
    /// Directory holding the sales order, quarterly and roster files
    #[arg(long, env = "DESK_DATA_DIR")]
    data_dir: Option<PathBuf>,
    /// Look the caller up in the roster
    #[arg(long)]
    user: Option<String>,
    /// Act as this role directly
    #[arg(long)]
    role: Option<String>,
    /// Owner name matched against report rows
    #[arg(long, requires = "role")]
    filter_name: Option<String>,
    #[command(subcommand)]
    report: Report,
}

#[derive(Debug, Subcommand)]
enum Report {
    /// Recent open sales orders per customer
    SalesOrders,
    /// Recent billing rows per customer
    BillingDetails,
    /// Every visible row of one invoice
    InvoiceSearch {
        #[arg(long, value_parser = invoice_number)]
        invoice_no: String,
    },
}

fn invoice_number(value: &str) -> Result<String, String> {
    let value = value.trim();
    if value.is_empty() {
        Err("invoice number must not be blank".to_string())
    } else {
        Ok(value.to_string())
    }
}

fn load_config(args: &Args) -> Result<DeskConfig, DeskError> {
    let config = match &args.config {
        Some(path) => DeskConfig::load(path)?,
        None => DeskConfig::default(),
    };
    Ok(match &args.data_dir {
        Some(dir) => config.with_data_dir(dir),
        None => config,
    })
}

fn resolve_scope(args: &Args, config: &DeskConfig) -> Result<AccessScope, DeskError> {
    let roles = config.role_book();
    match &args.user {
        Some(user) => Roster::load(&config.roster_path())?.scope_for(user, &roles),
        // without a user clap guarantees a role
        None => Ok(AccessScope::new(
            roles.resolve(args.role.as_deref().unwrap_or_default()),
            args.filter_name.clone().unwrap_or_default(),
        )),
    }
}

fn run(args: &Args) -> Result<String, DeskError> {
    let config = load_config(args)?;
    let scope = resolve_scope(args, &config)?;
    let desk = Desk::new(config);
    info!("running {:?} as role '{}'", args.report, scope.role.name);

    let json = match &args.report {
        Report::SalesOrders => serde_json::to_string(&desk.open_sales_orders(&scope)?)?,
        Report::BillingDetails => serde_json::to_string(&desk.billing_details(&scope)?)?,
        Report::InvoiceSearch { invoice_no } => {
            serde_json::to_string(&desk.search_invoices(&scope, invoice_no)?)?
        }
    };
    Ok(json)
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    match run(&args) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{}", err);
            eprintln!("Error reading data");
            ExitCode::FAILURE
        }
    }
}

#[test]
fn blank_invoice_number_is_a_usage_error() {
    let blank = ["desk", "--role", "admin", "invoice-search", "--invoice-no", "  "];
    assert!(Args::try_parse_from(blank).is_err());

    let args = Args::try_parse_from([
        "desk",
        "--role",
        "admin",
        "invoice-search",
        "--invoice-no",
        " INV-1 ",
    ])
    .unwrap();
    assert!(matches!(args.report, Report::InvoiceSearch { invoice_no } if invoice_no == "INV-1"));
}
