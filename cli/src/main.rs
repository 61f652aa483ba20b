use clap::{Parser, Subcommand, ValueEnum};
use dialoguer::Confirm;
use purse::pcsc::{Context, PcscCard};
use purse::{Card, CardLayout, CardRecord, CardSession, Cryptogram};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum Error {
    #[error("Error occurred on communicating with PC/SC device: {0}")]
    Pcsc(#[from] purse::pcsc::Error),

    #[error("The transaction failed: {0}")]
    Session(#[from] purse::Failure),

    #[error("The cryptogram is not a hex string: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("The cryptogram is invalid: {0}")]
    Cryptogram(#[from] purse::Error),

    #[error("Could not read the answer: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not print the record: {0}")]
    Json(#[from] serde_json::Error),
}

type Result<T> = std::result::Result<T, Error>;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Layout {
    /// Current card generation.
    Standard,

    /// Cards whose balance is two octets wide.
    Legacy,
}

impl From<Layout> for CardLayout {
    fn from(layout: Layout) -> Self {
        match layout {
            Layout::Standard => CardLayout::standard(),
            Layout::Legacy => CardLayout::legacy(),
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Lists the PC/SC readers attached.
    Readers,

    /// Reads the balance and the card number.
    Read,

    /// Reads the purse, then credits it with the cryptogram.
    Credit {
        /// 32-octet cryptogram issued by the authorization service, in hex.
        #[arg(long)]
        cryptogram: String,

        /// Credits without asking for confirmation.
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Name of the PC/SC reader, or a part of it. Defaults to the first reader.
    #[arg(short, long, global = true)]
    reader: Option<String>,

    /// Offset table of the card.
    #[arg(long, value_enum, default_value_t = Layout::Standard, global = true)]
    layout: Layout,

    /// Prints the record as JSON.
    #[arg(long, global = true)]
    json: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let ctx = Context::try_new()?;

    match cli.command {
        Command::Readers => {
            for reader in ctx.readers()? {
                println!("{}", reader);
            }
        }
        Command::Read => {
            let card = connect(&ctx, cli.reader.as_deref())?;
            let mut session = CardSession::with_layout(cli.layout.into());

            session.read(&card)?;
            print_record(session.finish()?, cli.json)?;
        }
        Command::Credit { cryptogram, yes } => {
            let cryptogram = Cryptogram::try_from(hex::decode(cryptogram.trim())?.as_slice())?;

            let card = connect(&ctx, cli.reader.as_deref())?;
            let mut session = CardSession::with_layout(cli.layout.into());

            print_record(session.read(&card)?, cli.json)?;

            let confirmed = yes
                || Confirm::new()
                    .with_prompt("Credit this card?")
                    .default(false)
                    .interact()?;

            match confirmed {
                true => {
                    session.continue_credit_update(&card, &cryptogram)?;
                    info!("Credit update accepted by the card");
                }
                _ => {
                    session.finish()?;
                    info!("Cancelled, the card was not credited");
                }
            }
        }
    }

    Ok(())
}

fn connect(ctx: &Context, reader: Option<&str>) -> Result<Card<PcscCard>> {
    let device = ctx.open(reader)?;
    let pcsc_card = device.connect(ctx)?;

    Ok(Card::new(Box::new(pcsc_card)))
}

fn print_record(record: &CardRecord, json: bool) -> Result<()> {
    match json {
        true => println!("{}", serde_json::to_string_pretty(record)?),
        _ => {
            println!("Card number:  {}", record.card_number_hex());
            println!("Balance:      {}", record.balance);
            println!("Max balance:  {}", record.max_balance);
        }
    }

    Ok(())
}
