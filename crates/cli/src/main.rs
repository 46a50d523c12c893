mod log;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use directories::ProjectDirs;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use finance_tracker_core::config::{Settings, ALPHA_VANTAGE_KEY, NEWS_API_KEY};
use finance_tracker_core::identity::local::LocalIdentityProvider;
use finance_tracker_core::identity::IdentityProvider;
use finance_tracker_core::models::entry::{IncomeCategory, NewExpense, NewIncome};
use finance_tracker_core::models::event::User;
use finance_tracker_core::models::holding::NewHolding;
use finance_tracker_core::providers::alphavantage::AlphaVantageProvider;
use finance_tracker_core::providers::newsapi::NewsApiProvider;
use finance_tracker_core::providers::proxy_client::ProxyClient;
use finance_tracker_core::providers::registry::QuoteProviderRegistry;
use finance_tracker_core::providers::traits::{HeadlineSource, QuoteProvider, SymbolSearch};
use finance_tracker_core::proxy::{NewsProxy, ProxyHandler, ProxyRequest, QuoteProxy, SearchProxy};
use finance_tracker_core::services::investment_ledger::RefreshOutcome;
use finance_tracker_core::storage::file::FileStorage;
use finance_tracker_core::FinanceTracker;

use crate::log::init_logging;

#[derive(Parser)]
#[command(name = "finance-tracker", version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory for local state (defaults to FINANCE_DATA_DIR, then the platform data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account and sign in
    Signup {
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Sign in to an existing account
    Login {
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Sign out
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Manage investment holdings
    Holdings {
        #[command(subcommand)]
        action: HoldingsCommand,
    },
    /// Manage expenses
    Expenses {
        #[command(subcommand)]
        action: ExpensesCommand,
    },
    /// Manage income
    Income {
        #[command(subcommand)]
        action: IncomeCommand,
    },
    /// Portfolio valuation and this month's cash flow
    Summary,
    /// Top business headlines
    News,
    /// Look up ticker symbols
    Search { keyword: String },
    /// Fetch a single quote
    Quote { symbol: String },
    /// Run a proxy handler locally and print its response
    Proxy {
        endpoint: ProxyEndpoint,
        /// Query parameters as key=value
        params: Vec<String>,
    },
}

#[derive(Subcommand)]
enum HoldingsCommand {
    /// List holdings, newest first
    List,
    /// Add a holding and fetch its quote
    Add {
        ticker: String,
        shares: f64,
        /// Purchase price per share
        price: f64,
        /// Display name (defaults to the ticker)
        #[arg(long)]
        name: Option<String>,
    },
    /// Change share count and purchase price
    Update { ticker: String, shares: f64, price: f64 },
    Delete { ticker: String },
    /// Refresh every holding's quote
    Refresh,
    /// Delete every holding
    Clear,
}

#[derive(Subcommand)]
enum ExpensesCommand {
    List,
    Add {
        title: String,
        amount: f64,
        category: String,
        /// Defaults to today (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    Delete { id: Uuid },
}

#[derive(Subcommand)]
enum IncomeCommand {
    List,
    Add {
        title: String,
        amount: f64,
        /// Salary, Freelance, Investment, Gift or Other
        #[arg(long, default_value = "Other")]
        category: IncomeCategory,
        /// Defaults to today (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    Delete { id: Uuid },
}

#[derive(Clone, Copy, ValueEnum)]
enum ProxyEndpoint {
    Quote,
    Search,
    News,
}

/// Everything a command needs, built once per invocation.
struct App {
    settings: Settings,
    identity: Arc<LocalIdentityProvider>,
    tracker: FinanceTracker,
    quotes: Arc<dyn QuoteProvider>,
    search: Arc<dyn SymbolSearch>,
}

impl App {
    fn open(data_dir: Option<PathBuf>) -> Result<Self> {
        let settings = Settings::from_env();
        let root = resolve_data_dir(data_dir, &settings)?;
        tracing::debug!("Using data directory {}", root.display());

        if settings.identity.is_configured() {
            tracing::debug!(
                project = ?settings.identity.project_id,
                "Hosted identity credentials are set but unused by the local provider"
            );
        }

        let storage = Arc::new(FileStorage::new(root));
        let identity = Arc::new(
            LocalIdentityProvider::open(storage.clone()).context("Failed to open identity store")?,
        );

        let quotes: Arc<dyn QuoteProvider>;
        let news: Arc<dyn HeadlineSource>;
        let search: Arc<dyn SymbolSearch>;
        match &settings.proxy_url {
            Some(url) => {
                let client = Arc::new(ProxyClient::new(url.clone()));
                quotes = client.clone();
                news = client.clone();
                search = client;
            }
            None => {
                quotes = Arc::new(QuoteProviderRegistry::new_with_defaults(&settings));
                news = Arc::new(NewsApiProvider::new(
                    settings.endpoints.news_api.clone(),
                    settings.api_key(NEWS_API_KEY).map(str::to_string),
                ));
                search = Arc::new(AlphaVantageProvider::new(
                    settings.endpoints.alpha_vantage.clone(),
                    settings.api_key(ALPHA_VANTAGE_KEY).map(str::to_string),
                ));
            }
        }

        let tracker = FinanceTracker::new(
            settings.clone(),
            storage,
            identity.clone(),
            quotes.clone(),
            news,
        );
        tracker.session().apply(identity.current_user());

        Ok(Self {
            settings,
            identity,
            tracker,
            quotes,
            search,
        })
    }

    /// The signed-in user, with every ledger loaded for them.
    fn signed_in(&self) -> Result<User> {
        let user = self
            .tracker
            .session()
            .user()
            .context("Not signed in. Run `finance-tracker login <email> --password <password>` first")?;
        self.tracker.load_for(&user.uid)?;
        Ok(user)
    }
}

fn resolve_data_dir(flag: Option<PathBuf>, settings: &Settings) -> Result<PathBuf> {
    if let Some(dir) = flag.or_else(|| settings.data_dir.clone()) {
        return Ok(dir);
    }
    let dirs = ProjectDirs::from("io", "finance-tracker", "finance-tracker")
        .context("Could not determine project directories")?;
    Ok(dirs.data_dir().to_path_buf())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(cmd) => run(cmd, cli.data_dir).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Command failed");
    }
    result
}

async fn run(command: Commands, data_dir: Option<PathBuf>) -> Result<()> {
    let app = App::open(data_dir)?;

    match command {
        Commands::Signup { email, password } => {
            let user = app.tracker.session().sign_up(&email, &password).await?;
            println!("Account created. Signed in as {} ({})", user.email, user.uid);
        }
        Commands::Login { email, password } => {
            let user = app.tracker.session().log_in(&email, &password).await?;
            println!("Signed in as {}", user.email);
        }
        Commands::Logout => {
            app.tracker.session().log_out().await?;
            println!("Signed out");
        }
        Commands::Whoami => match app.identity.current_user() {
            Some(user) => println!("{} ({})", user.email, user.uid),
            None => println!("Not signed in"),
        },
        Commands::Holdings { action } => holdings(&app, action).await?,
        Commands::Expenses { action } => expenses(&app, action)?,
        Commands::Income { action } => income(&app, action)?,
        Commands::Summary => summary(&app)?,
        Commands::News => {
            let articles = app.tracker.news().fetch_top_headlines().await?;
            for article in articles {
                println!("• {} ({})", article.title, article.source_name);
                println!("  {}", article.url);
            }
        }
        Commands::Search { keyword } => {
            let matches = app.search.search(&keyword).await?;
            if matches.is_empty() {
                println!("No matches for '{keyword}'");
            }
            for m in matches {
                println!("{:<12} {}", m.symbol, m.name);
            }
        }
        Commands::Quote { symbol } => {
            let quote = app.quotes.fetch_quote(&symbol.to_uppercase()).await?;
            println!(
                "{}  {:.2}  {:+.2} ({:+.2}%)",
                quote.symbol, quote.price, quote.change, quote.changes_percentage
            );
        }
        Commands::Proxy { endpoint, params } => {
            let handler: Box<dyn ProxyHandler> = match endpoint {
                ProxyEndpoint::Quote => Box::new(QuoteProxy::from_settings(&app.settings)),
                ProxyEndpoint::Search => Box::new(SearchProxy::from_settings(&app.settings)),
                ProxyEndpoint::News => Box::new(NewsProxy::from_settings(&app.settings)),
            };
            let response = handler.handle(&ProxyRequest::from_pairs(params)).await;
            println!("{} {}", response.status, handler.path());
            println!("{}", serde_json::to_string_pretty(&response.body)?);
        }
    }
    Ok(())
}

async fn holdings(app: &App, action: HoldingsCommand) -> Result<()> {
    app.signed_in()?;
    let ledger = app.tracker.investments();

    match action {
        HoldingsCommand::List => {
            let holdings = ledger.holdings();
            if holdings.is_empty() {
                println!("No holdings yet");
            }
            for h in holdings {
                let price = h
                    .current_price
                    .map(|p| format!("{p:.2}"))
                    .unwrap_or_else(|| "-".into());
                println!(
                    "{:<10} {:>10.4} @ {:>10.2}  now {:>10}  value {:>12.2}  added {}",
                    h.id,
                    h.shares,
                    h.purchase_price,
                    price,
                    h.market_value(),
                    h.date_added
                );
                if let Some(err) = &h.error {
                    println!("           ! {err}");
                }
            }
        }
        HoldingsCommand::Add { ticker, shares, price, name } => {
            let name = name.unwrap_or_else(|| ticker.to_uppercase());
            let outcome = ledger.add_holding(NewHolding::new(ticker, name, shares, price)).await?;
            print_outcome("added", &outcome);
        }
        HoldingsCommand::Update { ticker, shares, price } => {
            if ledger.update_holding(&ticker, shares, price)? {
                println!("Updated {}", ticker.to_uppercase());
            } else {
                println!("No holding {}", ticker.to_uppercase());
            }
        }
        HoldingsCommand::Delete { ticker } => {
            if ledger.delete_holding(&ticker)? {
                println!("Deleted {}", ticker.to_uppercase());
            } else {
                println!("No holding {}", ticker.to_uppercase());
            }
        }
        HoldingsCommand::Refresh => {
            let report = ledger.refresh_all().await;
            for (id, outcome) in &report.outcomes {
                print_outcome(id, outcome);
            }
            println!(
                "{} updated, {} failed, {} still fresh",
                report.updated(),
                report.failed(),
                report.fresh()
            );
        }
        HoldingsCommand::Clear => {
            let removed = ledger.clear_portfolio()?;
            println!("Removed {removed} holdings");
        }
    }
    Ok(())
}

fn print_outcome(label: &str, outcome: &RefreshOutcome) {
    match outcome {
        RefreshOutcome::Updated(q) => println!("{label}: {} {:.2} ({:+.2}%)", q.symbol, q.price, q.changes_percentage),
        RefreshOutcome::Fresh => println!("{label}: quote still fresh"),
        RefreshOutcome::Failed(msg) => println!("{label}: quote unavailable: {msg}"),
        RefreshOutcome::NotFound => println!("{label}: not found"),
        RefreshOutcome::Discarded => println!("{label}: signed out before the quote arrived"),
    }
}

fn expenses(app: &App, action: ExpensesCommand) -> Result<()> {
    app.signed_in()?;
    let ledger = app.tracker.expenses();

    match action {
        ExpensesCommand::List => {
            for e in ledger.entries() {
                println!("{}  {}  {:>10.2}  {:<14} {}", e.id, e.date, e.amount, e.category, e.title);
            }
            for (month, total) in ledger.amount_by_month() {
                println!("{month}: {total:.2}");
            }
        }
        ExpensesCommand::Add { title, amount, category, date } => {
            let date = date.unwrap_or_else(|| app.tracker.today());
            let entry = ledger.add(NewExpense::new(title, amount, category, date))?;
            println!("Added expense {}", entry.id);
        }
        ExpensesCommand::Delete { id } => {
            if ledger.delete(id)? {
                println!("Deleted {id}");
            } else {
                println!("No expense {id}");
            }
        }
    }
    Ok(())
}

fn income(app: &App, action: IncomeCommand) -> Result<()> {
    app.signed_in()?;
    let ledger = app.tracker.income();

    match action {
        IncomeCommand::List => {
            for e in ledger.entries() {
                println!("{}  {}  {:>10.2}  {:<10} {}", e.id, e.date, e.amount, e.category, e.title);
            }
            for (month, total) in ledger.amount_by_month() {
                println!("{month}: {total:.2}");
            }
        }
        IncomeCommand::Add { title, amount, category, date } => {
            let date = date.unwrap_or_else(|| app.tracker.today());
            let entry = ledger.add(NewIncome::new(title, amount, category, date))?;
            println!("Added income {}", entry.id);
        }
        IncomeCommand::Delete { id } => {
            if ledger.delete(id)? {
                println!("Deleted {id}");
            } else {
                println!("No income {id}");
            }
        }
    }
    Ok(())
}

fn summary(app: &App) -> Result<()> {
    app.signed_in()?;
    let d = app.tracker.dashboard();
    let p = &d.portfolio;

    println!("As of {}", d.as_of_date);
    println!("Total cost       {:>14.2}", p.total_cost);
    println!("Current value    {:>14.2}", p.current_value);
    println!("Gain / loss      {:>14.2} ({:+.2}%)", p.total_gain_loss, p.total_return_pct);
    println!("Today            {:>14.2}", p.today_gain_loss);
    if p.holdings_with_errors > 0 {
        println!("{} holdings without a quote", p.holdings_with_errors);
    }
    println!("Expenses (month) {:>14.2}", d.expenses_this_month);
    println!("Income (month)   {:>14.2}", d.income_this_month);
    println!("Net cash flow    {:>14.2}", d.net_cash_flow_this_month);
    Ok(())
}
