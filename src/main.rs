use clap::Parser;
use postit::cli::{
    handle_delete, handle_init, handle_list, handle_page, handle_settings, handle_stats,
    handle_visit, Cli, Commands,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    // stdout carries command output; logs go to stderr
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("postit=info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let root = cli.root;

    let result = match cli.command {
        Commands::Init => handle_init(root).await,
        Commands::Page(page) => handle_page(root, page).await,
        Commands::List {
            search,
            sort,
            filter,
            json,
        } => handle_list(root, search, sort, filter, json).await,
        Commands::Stats { json } => handle_stats(root, json).await,
        Commands::Visit { id } => handle_visit(root, id).await,
        Commands::Delete { id, force } => handle_delete(root, id, force).await,
        Commands::Settings {
            font_size,
            show_first_line_as_title,
            json,
        } => handle_settings(root, font_size, show_first_line_as_title, json).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
