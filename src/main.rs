use clap::{
    CommandFactory, Parser, Subcommand,
    builder::{
        Styles,
        styling::{AnsiColor, Effects},
    },
};
use clap_complete::{Shell, generate};
use tracing_subscriber::EnvFilter;

use listenlink::{Res, cli, config, error};

fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::White.on_default() | Effects::BOLD)
        .usage(AnsiColor::White.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightBlue.on_default())
        .placeholder(AnsiColor::BrightGreen.on_default())
}

#[derive(Parser, Debug, Clone)]
#[clap(
  version = env!("CARGO_PKG_VERSION"),
  name=env!("CARGO_PKG_NAME"),
  bin_name=env!("CARGO_PKG_NAME"),
  author=env!("CARGO_PKG_AUTHORS"),
  about=env!("CARGO_PKG_DESCRIPTION"),
  styles=styles(),
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the backend HTTP server
    Serve,

    /// Connect a user's Spotify account
    Auth(UserOption),

    /// Print a valid access token, refreshing it if needed
    Token(UserOption),

    /// Move playback to a device
    Transfer(TransferOptions),

    /// Start a track on a device
    Play(PlayOptions),

    /// List the devices of a user
    Devices(UserOption),

    /// List connected accounts
    Sessions,

    /// Forget a user's Spotify session
    Logout(UserOption),

    /// Get shell completions
    Completions(CompletionsOption),
}

#[derive(Parser, Debug, Clone)]
pub struct UserOption {
    /// Application user id
    #[clap(long)]
    pub user: String,
}

#[derive(Parser, Debug, Clone)]
pub struct TransferOptions {
    /// Application user id
    #[clap(long)]
    pub user: String,

    /// Target device id, see `devices`
    #[clap(long)]
    pub device: String,
}

#[derive(Parser, Debug, Clone)]
pub struct PlayOptions {
    /// Application user id
    #[clap(long)]
    pub user: String,

    /// Target device id, see `devices`
    #[clap(long)]
    pub device: String,

    /// Track URI (spotify:track:...)
    #[clap(long)]
    pub track: String,
}

#[derive(Parser, Debug, Clone)]
pub struct CompletionsOption {
    shell: Shell,
}

fn init_tracing() -> Res<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("listenlink=info")),
        )
        .with_writer(std::io::stderr)
        .try_init()?;
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(e) = init_tracing() {
        error!("Cannot set up logging. Err: {}", e);
    }

    if let Err(e) = config::load_env().await {
        error!("Cannot load environment. Err: {}", e);
    }

    let cli = Cli::parse();

    match cli.command {
        Command::Serve => cli::serve().await,
        Command::Auth(opt) => cli::auth(&opt.user).await,
        Command::Token(opt) => cli::token(&opt.user).await,
        Command::Transfer(opt) => cli::transfer(&opt.user, &opt.device).await,
        Command::Play(opt) => cli::play(&opt.user, &opt.device, &opt.track).await,
        Command::Devices(opt) => cli::devices(&opt.user).await,
        Command::Sessions => cli::sessions().await,
        Command::Logout(opt) => cli::logout(&opt.user).await,
        Command::Completions(opt) => {
            let mut cmd = Cli::command_for_update();
            let name = cmd.get_name().to_string();
            generate(opt.shell, &mut cmd, name, &mut std::io::stdout())
        }
    }
}
