use std::error::Error;

use clap::{Args, Parser, Subcommand};
use engine::{Engine, EngineError, ErrorClass, NewAccount, PageRequest, TransferCmd};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};

#[derive(Parser, Debug)]
#[command(name = "points_admin")]
#[command(about = "Admin utilities for the points ledger (members, transfers, ledger)")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite:./data.db?mode=rwc")]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Member(Member),
    /// Move points between two members.
    Transfer(TransferArgs),
    /// Print a member's ledger, newest first.
    Ledger(LedgerArgs),
}

#[derive(Args, Debug)]
struct Member {
    #[command(subcommand)]
    command: MemberCommand,
}

#[derive(Subcommand, Debug)]
enum MemberCommand {
    Create(MemberCreateArgs),
    List,
}

#[derive(Args, Debug)]
struct MemberCreateArgs {
    #[arg(long)]
    code: String,
    #[arg(long, default_value_t = 0)]
    points: i64,
    #[arg(long, default_value = "")]
    name: String,
    #[arg(long, default_value = "")]
    surname: String,
    #[arg(long, default_value = "")]
    level: String,
    #[arg(long, default_value = "")]
    email: String,
    #[arg(long, default_value = "")]
    phone: String,
}

#[derive(Args, Debug)]
struct TransferArgs {
    #[arg(long)]
    from: i64,
    #[arg(long)]
    to: i64,
    #[arg(long)]
    amount: i64,
    #[arg(long)]
    note: Option<String>,
    /// Reuse a key to retry safely; a new one is generated when absent.
    #[arg(long)]
    key: Option<String>,
}

#[derive(Args, Debug)]
struct LedgerArgs {
    #[arg(long)]
    user: i64,
    #[arg(long, default_value_t = 1)]
    page: u64,
    #[arg(long, default_value_t = engine::DEFAULT_PAGE_SIZE)]
    page_size: u64,
}

fn exit_code(err: &EngineError) -> i32 {
    match err.class() {
        ErrorClass::Validation => 2,
        ErrorClass::NotFound => 3,
        ErrorClass::Conflict => 4,
        ErrorClass::Internal => 1,
    }
}

async fn connect_db(
    database_url: &str,
) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

async fn run(engine: &Engine, command: Command) -> Result<(), EngineError> {
    match command {
        Command::Member(Member {
            command: MemberCommand::Create(args),
        }) => {
            let new = NewAccount::new(args.code, args.points)
                .name(args.name, args.surname)
                .membership_level(args.level)
                .email(args.email)
                .phone(args.phone);
            let account = engine.create_account(new).await?;
            println!(
                "created member: {} (id {}, {} points)",
                account.member_code, account.id, account.remaining_points
            );
        }
        Command::Member(Member {
            command: MemberCommand::List,
        }) => {
            for account in engine.list_accounts().await? {
                println!(
                    "{:>6}  {:<12} {:<10} {} {}  {} points",
                    account.id,
                    account.member_code,
                    account.membership_level,
                    account.name,
                    account.surname,
                    account.remaining_points
                );
            }
        }
        Command::Transfer(args) => {
            let mut cmd = TransferCmd::new(args.from, args.to, args.amount);
            if let Some(note) = args.note {
                cmd = cmd.note(note);
            }
            if let Some(key) = args.key {
                cmd = cmd.idempotency_key(key);
            }
            let outcome = engine.execute_transfer(cmd).await?;
            let replay = outcome.is_replay();
            let receipt = outcome.into_receipt();
            let verb = if replay { "already completed" } else { "completed" };
            println!(
                "transfer {verb}: id {} key {}",
                receipt.transfer.id, receipt.transfer.idempotency_key
            );
            for entry in receipt.ledger_entries {
                println!(
                    "  user {:>6}  {:+}  -> {}",
                    entry.user_id, entry.change, entry.balance_after
                );
            }
        }
        Command::Ledger(args) => {
            let page = engine
                .ledger_for_account(args.user, PageRequest::new(args.page, args.page_size))
                .await?;
            println!(
                "page {} ({} per page), {} entries",
                page.page, page.page_size, page.total
            );
            for entry in page.items {
                println!(
                    "{}  {:<15} {:+}  -> {}  {}",
                    entry.created_at.format("%Y-%m-%d %H:%M:%S"),
                    entry.event_type.as_str(),
                    entry.change,
                    entry.balance_after,
                    entry.reference.as_deref().unwrap_or("-")
                );
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();

    let db = connect_db(&cli.database_url).await?;
    let engine = Engine::builder().database(db).build().await?;

    if let Err(err) = run(&engine, cli.command).await {
        eprintln!("{err}");
        std::process::exit(exit_code(&err));
    }

    Ok(())
}
