use anyhow::anyhow;
use chat_cli::config::Config;
use chat_cli::console::Console;
use chat_cli::interactive::{ChatSession, SHUTDOWN_GRACE};
use chat_p2p::{start_server, HttpRegistry, TransportFactory};
use clap::Parser;
use libchat::{MessageListener, PeerAddress, Registry, UserInfo};
use log::*;
use std::sync::Arc;
use tokio::io::BufReader;

#[tokio::main]
async fn main() {
    env_logger::init();
    let config: Config = Config::parse();

    match run(config).await {
        Ok(()) => {
            println!("Bye :)")
        }
        Err(err) => {
            eprintln!("** Error ** \n {err}");
            std::process::exit(1);
        }
    }
}

async fn run(config: Config) -> Result<(), anyhow::Error> {
    let options = config.resolve()?;
    let factory = Arc::new(TransportFactory::new()?);
    let console = Console::stdout();
    let listener: Arc<dyn MessageListener> = Arc::new(console.clone());
    let server = start_server(options.protocol, &options.host, options.port, listener).await?;

    let registry = Arc::new(HttpRegistry::new(&options.registry_url)?);
    let address = PeerAddress::new(options.protocol, options.host.clone(), server.local_addr().port());
    let me = UserInfo::new(options.name.clone(), address);
    if let Err(err) = registry.register(&me).await {
        if let Err(shutdown_err) = server.shutdown().await {
            warn!("Error stopping the chat server: {shutdown_err}");
        }
        return Err(anyhow!("Could not register {} with the registry at {}. {err}", me.name, options.registry_url));
    }

    let input = BufReader::new(tokio::io::stdin());
    let mut session = ChatSession::new(&options.name, registry.clone(), factory, console, input)
        .with_send_timeout(options.send_timeout);
    let result = session.run().await;
    debug!("Session ended. Waiting for outstanding sends");
    session.wait_for_sends(SHUTDOWN_GRACE).await;

    if let Err(err) = registry.unregister(&options.name).await {
        warn!("Could not unregister {} from the registry: {err}", options.name);
    }
    if let Err(err) = server.shutdown().await {
        warn!("Error stopping the chat server: {err}");
    }
    result?;
    Ok(())
}
