use std::path::PathBuf;
use std::sync::Arc;
use anyhow::Context;
use clap::Parser;
use owncloud_filelink::{local_environment, Provider, Settings, Status, UploadObserver};
use tokio::sync::mpsc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Upload files to an ownCloud account and print their share links.
#[derive(Parser)]
#[command(name = "owncloud-filelink", version)]
struct Cli {
    /// Settings file with `[accounts.<key>]` tables
    #[arg(short, long, default_value = "owncloud.toml")]
    config: PathBuf,

    /// Account key to upload with
    #[arg(short, long)]
    account: String,

    /// Files to upload, in order
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

struct ChannelObserver {
    file: PathBuf,
    tx: mpsc::UnboundedSender<(PathBuf, Status)>,
}

impl UploadObserver for ChannelObserver {
    fn on_stop(&self, status: Status) {
        let _ = self.tx.send((self.file.clone(), status));
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "owncloud_filelink=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let settings = Settings::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    let account = settings.account(&cli.account)?;
    let env = local_environment(account)?;
    let handle = Provider::init(&cli.account, &settings, env)?;
    let provider = handle.provider.clone();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut pending = 0usize;

    for file in &cli.files {
        let observer = Arc::new(ChannelObserver {
            file: file.clone(),
            tx: tx.clone(),
        });

        match provider.upload_file(file.clone(), observer).await {
            Ok(_) => pending += 1,
            Err(err) => eprintln!("{}: {}", file.display(), err),
        }
    }
    drop(tx);

    let mut failed = false;
    while pending > 0 {
        let Some((file, status)) = rx.recv().await else { break };
        pending -= 1;

        match status {
            Ok(()) => match provider.url_for_file(&file).await {
                Some(url) => println!("{}: {}", file.display(), url),
                None => println!("{}: uploaded", file.display()),
            },
            Err(err) => {
                failed = true;
                eprintln!("{}: {}", file.display(), err);
            }
        }
    }

    drop(provider);
    handle.shutdown().await?;

    if failed {
        anyhow::bail!("some uploads failed");
    }

    Ok(())
}
