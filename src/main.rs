use clap::Parser;
use lockbox::cli::{commands, output, Cli, Commands};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lockbox=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init => commands::init::execute(&cli),
        Commands::Set {
            ref name,
            ref value,
        } => commands::set::execute(&cli, name, value.as_deref()),
        Commands::Get { ref name } => commands::get::execute(&cli, name),
        Commands::List => commands::list::execute(&cli),
        Commands::Delete { ref name, force } => commands::delete::execute(&cli, name, force),
        Commands::Passwd => commands::passwd::execute(&cli),
        Commands::Sync => commands::sync::pull(&cli),
        Commands::Push => commands::sync::push(&cli),
    };

    if let Err(e) = result {
        output::error(&e.to_string());
        std::process::exit(1);
    }
}
