use clap::Parser;

/// Entry point flags (spec.md §6): a config file path and an optional
/// restart. No subcommands — unlike a multi-feature tool, this crawler has
/// exactly one job.
#[derive(Parser, Debug)]
#[command(name = "crawler", about = "Polite single-site university-domain crawler")]
pub struct Cli {
    /// Path to the INI configuration file.
    #[arg(long = "config_file", default_value = "config.ini")]
    pub config_file: String,

    /// Wipe the frontier's durable store and start over from the seed URLs.
    #[arg(long, default_value_t = false)]
    pub restart: bool,
}
