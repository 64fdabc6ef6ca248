use clap::Parser;
use imsim::Opts;
use imsim::cli::SubCommandExtend;
use imsim::config::SubCommand;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let opts = Opts::parse();

    match &opts.subcmd {
        SubCommand::Add(config) => config.run(&opts).await,
        SubCommand::Search(config) => config.run(&opts).await,
        SubCommand::Show(config) => config.run(&opts).await,
        SubCommand::History(config) => config.run(&opts).await,
        SubCommand::Server(config) => config.run(&opts).await,
    }
}
