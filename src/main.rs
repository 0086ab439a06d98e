use log::{debug, error, info, warn};
use poll_sync::clock::SystemClock;
use poll_sync::config::Config;
use poll_sync::feed::{self, FeedError};
use poll_sync::session::Session;
use poll_sync::tasks::reload_worker::{reload_channel, run_reload_worker};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::time::{interval, MissedTickBehavior};

async fn open_feed(config: &Config) -> Result<Box<dyn AsyncBufRead + Unpin>, FeedError> {
    match &config.feed_path {
        Some(path) => {
            info!("Replaying feed from {}", path.display());
            let file = tokio::fs::File::open(path).await?;
            Ok(Box::new(BufReader::new(file)))
        }
        None => {
            info!("Reading feed from stdin");
            Ok(Box::new(BufReader::new(tokio::io::stdin())))
        }
    }
}

async fn run(config: Config) -> Result<(), FeedError> {
    let (reloader, receiver) = reload_channel();
    let worker = tokio::spawn(run_reload_worker(receiver));

    let mut session = Session::new(SystemClock, reloader, &config);
    let mut lines = open_feed(&config).await?.lines();
    let mut sweep = interval(config.sweep_interval);
    sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut line_number = 0;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                line_number += 1;
                let event = match feed::parse_line(line_number, &line) {
                    Ok(Some(event)) => event,
                    Ok(None) => continue,
                    Err(e) => {
                        warn!("Skipping malformed feed entry: {}", e);
                        continue;
                    }
                };
                match session.handle(event) {
                    Ok(true) => debug!("Line {} changed poll state", line_number),
                    Ok(false) => {}
                    Err(e) => warn!("Line {}: {}", line_number, e),
                }
            }
            _ = sweep.tick() => {
                let requested = session.sweep_reloads();
                if requested > 0 {
                    info!("Requested {} results reload(s)", requested);
                }
            }
        }
    }

    for poll in session.polls() {
        info!(
            "Poll {} \"{}\": version {}, {} voters, closed: {}, voted: {}",
            poll.id(),
            poll.question(),
            poll.version(),
            poll.total_voters(),
            poll.closed(),
            poll.voted()
        );
    }

    // Dropping the session drops the last reload sender and lets the worker finish.
    drop(session);
    if let Err(e) = worker.await {
        error!("Reload worker failed: {}", e);
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    // Initialize logging
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return;
        }
    };

    if let Err(e) = run(config).await {
        error!("Feed error: {}", e);
    }
}
