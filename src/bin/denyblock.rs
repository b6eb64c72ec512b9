//! denyblock: check CIDRs and crawler ranges against nginx deny rules.

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use denyblock::{
    Bot, BotListCache, DenyIndex, FetchConfig, Finding, DEFAULT_TIMEOUT,
};
use std::collections::HashSet;
use std::fs;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "denyblock")]
#[command(version)]
#[command(about = "Check whether CIDRs are already covered by nginx deny rules", long_about = None)]
#[command(after_help = "\
Special values for CIDRS:
  google  check published GoogleBot ranges (the default when no CIDRS are given)
  bing    check published BingBot ranges
  ddg     check published DuckDuckBot addresses
  -       read CIDRs from stdin

Examples:
  denyblock /etc/nginx/blockips.inc 66.249.66.96/27
  echo '66.249.66.96/27' | denyblock /etc/nginx/blockips.inc -")]
struct Cli {
    /// File of deny rules, one `deny <cidr>;` per line
    rules: PathBuf,

    /// CIDRs to check, or google / bing / ddg / -
    cidrs: Vec<String>,

    /// Directory for downloaded bot lists
    #[arg(long, default_value = ".")]
    cache_dir: PathBuf,

    /// Re-download bot lists older than this many seconds
    #[arg(long, value_name = "SECS")]
    max_age: Option<u64>,

    /// HTTP timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = DEFAULT_TIMEOUT.as_secs())]
    timeout: u64,

    /// Fail on deny rules whose CIDR does not parse
    #[arg(long)]
    strict: bool,

    /// Verbose output, including CIDRs that are not blocked
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = check_rules_file(&cli) {
        e.exit();
    }

    let filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Reject a missing rules file the way clap rejects bad arguments, with usage.
fn check_rules_file(cli: &Cli) -> Result<(), clap::Error> {
    if cli.rules.is_file() {
        return Ok(());
    }
    Err(Cli::command().error(
        ErrorKind::ValueValidation,
        format!("{:?} is not a readable deny rules file", cli.rules),
    ))
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut index = DenyIndex::new();
    let stats = index.index_reader(fs::File::open(&cli.rules)?, cli.strict)?;
    log::info!(
        "Indexed {} deny rules from {:?} ({} malformed skipped)",
        stats.indexed,
        cli.rules,
        stats.malformed
    );

    let config = FetchConfig::new(&cli.cache_dir)
        .with_max_age(cli.max_age.map(Duration::from_secs))
        .with_timeout(Duration::from_secs(cli.timeout));
    let cache = BotListCache::new(config)?;

    let targets = if cli.cidrs.is_empty() {
        vec![Bot::Google.to_string()]
    } else {
        cli.cidrs
    };

    let mut checked_bots = HashSet::new();
    for target in &targets {
        if let Some(bot) = Bot::parse(target) {
            if checked_bots.insert(bot) {
                check_bot(&index, &cache, bot, cli.verbose);
            }
        } else if target == "-" {
            for line in io::stdin().lock().lines() {
                let line = line?;
                let cidr = line.trim();
                if !cidr.is_empty() {
                    check_cidr(&index, cidr, "stdin", cli.verbose);
                }
            }
        } else {
            check_cidr(&index, target, "argument", cli.verbose);
        }
    }

    Ok(())
}

fn check_bot(index: &DenyIndex, cache: &BotListCache, bot: Bot, verbose: bool) {
    for source in bot.sources() {
        match cache.load(source) {
            Ok(doc) => {
                if verbose {
                    println!(
                        "Checking {} prefixes from {}",
                        doc.ipv4_prefixes().count(),
                        source.file
                    );
                }
                for cidr in doc.ipv4_prefixes() {
                    check_cidr(index, cidr, source.file, verbose);
                }
            }
            Err(e) => {
                eprintln!("  Warning: Failed to load {}: {}", source.file, e);
            }
        }
    }
}

fn check_cidr(index: &DenyIndex, cidr: &str, label: &str, verbose: bool) {
    match index.check(cidr) {
        Ok(verdict) => {
            let finding = Finding::new(label, cidr, verdict);
            if verbose || finding.verdict.is_blocked() {
                println!("{}", finding);
            }
        }
        Err(e) => eprintln!("{} CIDR {}: {}", label, cidr, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["denyblock", "blockips.inc"]).unwrap();
        assert!(cli.cidrs.is_empty());
        assert_eq!(cli.timeout, 60);
        assert_eq!(cli.max_age, None);
        assert!(!cli.strict);
    }

    #[test]
    fn test_missing_rules_file_is_usage_error() {
        let cli = Cli::try_parse_from(["denyblock", "/nonexistent/blockips.inc", "bing"]).unwrap();
        let err = check_rules_file(&cli).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
        assert!(err.to_string().contains("/nonexistent/blockips.inc"));
    }

    #[test]
    fn test_existing_rules_file_is_accepted() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap();
        let cli = Cli::try_parse_from(["denyblock", path]).unwrap();
        assert!(check_rules_file(&cli).is_ok());
    }
}
