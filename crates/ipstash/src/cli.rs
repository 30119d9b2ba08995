use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "ipstash", version)]
#[command(about = "Find your public IP address and send it to a Redis channel.")]
#[command(
    long_about = "Store your public IP address in Redis, to be consumed later, for \
    example to update an AWS security group. Each invocation runs one \
    detect-and-publish cycle; schedule it with cron or a systemd timer."
)]
pub struct CommandLine {
    /// Resolve the IP but do not store it in Redis
    #[arg(short = 'd', long = "dry-run", global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Propagate a supplied IP instead of fetching one
    #[command(alias = "t")]
    Test {
        /// IP literal to use
        #[arg(short = 'i', long = "ip")]
        ip: String,
    },
    /// Print the stored history set as JSON lines
    History,
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
