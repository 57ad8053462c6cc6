use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use focuslog::config::Config;
use focuslog::{build_app, cli, db};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.log_filter))
        .init();

    let pool = db::init_pool(&config.database_url).await?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        [] | ["serve"] => {}
        ["create-user", name] => return cli::create_user(&pool, *name, None).await,
        ["create-user", name, email] => return cli::create_user(&pool, *name, Some(*email)).await,
        _ => {
            eprintln!("usage: focuslog [serve | create-user <name> [email]]");
            std::process::exit(2);
        }
    }

    let app = build_app(pool, config.secure_cookies).await?;
    let listener = TcpListener::bind(config.bind_address).await?;

    tracing::info!("listening on {}", config.bind_address);
    axum::serve(listener, app).await?;
    Ok(())
}
