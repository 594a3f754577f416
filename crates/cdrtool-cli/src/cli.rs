//! Command-line arguments.

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;

use cdrtool_core::Credentials;
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "cdrtool",
    version,
    about = "Automation for the CDR envelope repositories",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Repository login
    #[arg(long, global = true, env = "CDRTOOL_USER")]
    pub user: Option<String>,

    /// Repository password
    #[arg(long, global = true, env = "CDRTOOL_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// JSON file overriding the built-in repository, obligation and namespace tables
    #[arg(long, global = true, env = "CDRTOOL_SETTINGS", value_name = "PATH")]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn credentials(&self) -> Option<Credentials> {
        match (&self.user, &self.password) {
            (Some(u), Some(p)) => Some(Credentials::new(u.as_str(), p.as_str())),
            _ => None,
        }
    }

    /// Credentials for commands that change remote state. Whatever is missing
    /// is asked for on the terminal, the password without echo.
    pub fn require_credentials(&self) -> anyhow::Result<Credentials> {
        let interactive = io::stdin().is_terminal() && io::stderr().is_terminal();
        self.complete_credentials(interactive, |field| match field {
            Prompt::User => prompt_line("User: "),
            Prompt::Password => rpassword::prompt_password("Password: "),
        })
    }

    fn complete_credentials(
        &self,
        interactive: bool,
        mut ask: impl FnMut(Prompt) -> io::Result<String>,
    ) -> anyhow::Result<Credentials> {
        if let Some(c) = self.credentials() {
            return Ok(c);
        }
        if !interactive {
            anyhow::bail!(
                "this command needs credentials: pass --user and --password \
                 or set CDRTOOL_USER and CDRTOOL_PASSWORD"
            );
        }
        let user = match &self.user {
            Some(u) => u.clone(),
            None => ask(Prompt::User)?.trim().to_string(),
        };
        let password = match &self.password {
            Some(p) => p.clone(),
            None => ask(Prompt::Password)?,
        };
        Ok(Credentials::new(user, password))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prompt {
    User,
    Password,
}

fn prompt_line(label: &str) -> io::Result<String> {
    eprint!("{label}");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line)
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the files of the envelopes reported for an obligation and year
    ListFiles(ListFilesArgs),
    /// Copy CDR envelopes, with their files, to CDRTEST
    CloneCdrtest(CloneArgs),
    /// Delete the CDRTEST envelopes listed in a CSV column
    DeleteEnvelopes(DeleteArgs),
    /// Delete CDRTEST envelopes matching an obligation, year and countries
    BatchDeleteEnvelopes(BatchDeleteArgs),
    /// Extract QA feedback errors for the envelopes listed in a CSV column
    EnvelopeQa(EnvelopeQaArgs),
    /// Start automatic QA for the envelopes listed in a CSV column
    ActivateQa(ActivateQaArgs),
    /// Compare feature identifiers between two XML documents
    DiffIds(DiffIdsArgs),
}

/// Envelope selection shared by the listing commands.
#[derive(Args, Debug)]
pub struct Selection {
    /// ROD obligation number
    pub obligation: u32,

    /// Reporting year (period start year)
    pub year: i32,

    /// Country codes to include (repeatable); all countries when omitted
    #[arg(short = 'c', long = "country", value_name = "CC")]
    pub countries: Vec<String>,

    /// Keep every envelope instead of the latest per country
    #[arg(long)]
    pub all: bool,

    /// Select draft envelopes instead of released ones
    #[arg(long)]
    pub draft: bool,
}

#[derive(Args, Debug)]
pub struct ListFilesArgs {
    #[command(flatten)]
    pub selection: Selection,

    /// Output CSV ("-" for stdout)
    pub out: Option<String>,

    /// Repository instance to query
    #[arg(long, default_value = "CDR")]
    pub repo: String,
}

#[derive(Args, Debug)]
pub struct CloneArgs {
    #[command(flatten)]
    pub selection: Selection,

    /// Output CSV ("-" for stdout)
    pub out: Option<String>,
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// CSV file listing envelope URLs
    pub file: PathBuf,

    /// Column holding the envelope URLs
    #[arg(default_value = "CDRTESTEnvelope")]
    pub field: String,

    /// Do not ask for confirmation
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(Args, Debug)]
pub struct BatchDeleteArgs {
    /// ROD obligation number
    pub obligation: u32,

    /// Reporting year (period start year)
    pub year: i32,

    /// Country codes to include (repeatable)
    #[arg(short = 'c', long = "country", value_name = "CC")]
    pub countries: Vec<String>,

    /// Only delete envelopes whose status changed after this date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE", value_parser = parse_day)]
    pub modified_after: Option<DateTime<Utc>>,

    /// Do not ask for confirmation
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(Args, Debug)]
pub struct EnvelopeQaArgs {
    /// CSV file listing envelope URLs
    pub file: PathBuf,

    /// Column holding the envelope URLs
    #[arg(default_value = "CDRTESTEnvelope")]
    pub field: String,

    /// Output CSV, semicolon separated ("-" for stdout)
    pub out: Option<String>,
}

#[derive(Args, Debug)]
pub struct ActivateQaArgs {
    /// CSV file listing envelope URLs
    pub file: PathBuf,

    /// Column holding the envelope URLs
    pub field: String,

    /// Maximum number of envelopes in QA at once
    #[arg(short = 'm', long, default_value_t = 3)]
    pub max_activations: usize,

    /// Skip envelopes whose last QA completed on or after this date (YYYY-MM-DD)
    #[arg(short = 'a', long, value_name = "DATE", value_parser = parse_day)]
    pub qa_after: Option<DateTime<Utc>>,
}

#[derive(Args, Debug)]
pub struct DiffIdsArgs {
    /// First XML document
    pub left: PathBuf,

    /// Second XML document
    pub right: PathBuf,

    /// Optional CSV of differing identifiers ("-" for stdout)
    pub out: Option<String>,

    /// JSON object mapping feature type names to selection paths
    #[arg(long, value_name = "PATH")]
    pub features: Option<PathBuf>,
}

/// `YYYY-MM-DD` as midnight UTC.
pub fn parse_day(raw: &str) -> Result<DateTime<Utc>, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|d| d.and_time(chrono::NaiveTime::MIN).and_utc())
        .map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn missing_password_is_prompted_for() {
        let cli = Cli::try_parse_from(["cdrtool", "--user", "u", "activate-qa", "envs.csv", "CDRTESTEnvelope"])
            .unwrap();
        let mut asked = Vec::new();
        let creds = cli
            .complete_credentials(true, |field| {
                asked.push(field);
                Ok("secret".to_string())
            })
            .unwrap();
        assert_eq!(asked, vec![Prompt::Password]);
        assert_eq!(creds.user(), "u");
        assert_eq!(creds.password(), "secret");
    }

    #[test]
    fn missing_credentials_fail_without_a_terminal() {
        let cli = Cli::try_parse_from(["cdrtool", "activate-qa", "envs.csv", "CDRTESTEnvelope"]).unwrap();
        let result = cli.complete_credentials(false, |_| Ok("never".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn given_credentials_are_not_prompted_for() {
        let cli = Cli::try_parse_from([
            "cdrtool", "--user", "u", "--password", "p", "activate-qa", "envs.csv", "CDRTESTEnvelope",
        ])
        .unwrap();
        let creds = cli
            .complete_credentials(true, |_| panic!("no prompt expected"))
            .unwrap();
        assert_eq!(creds.password(), "p");
    }

    #[test]
    fn day_is_midnight_utc() {
        assert_eq!(
            parse_day("2021-07-23").unwrap(),
            Utc.with_ymd_and_hms(2021, 7, 23, 0, 0, 0).unwrap()
        );
        assert!(parse_day("23/07/2021").is_err());
    }

    #[test]
    fn parses_clone_selection() {
        let cli = Cli::try_parse_from([
            "cdrtool", "clone-cdrtest", "680", "2019", "out.csv", "-c", "it", "-c", "es", "--all",
            "--user", "u", "--password", "p",
        ])
        .unwrap();
        let Command::CloneCdrtest(args) = &cli.command else {
            panic!("expected clone-cdrtest");
        };
        assert_eq!(args.selection.obligation, 680);
        assert_eq!(args.selection.countries, vec!["it", "es"]);
        assert!(args.selection.all);
        assert!(!args.selection.draft);
        assert_eq!(args.out.as_deref(), Some("out.csv"));
        assert_eq!(cli.credentials().unwrap().user(), "u");
    }

    #[test]
    fn activate_qa_defaults() {
        let cli = Cli::try_parse_from(["cdrtool", "activate-qa", "envs.csv", "CDRTESTEnvelope"]).unwrap();
        let Command::ActivateQa(args) = cli.command else {
            panic!("expected activate-qa");
        };
        assert_eq!(args.max_activations, 3);
        assert!(args.qa_after.is_none());
    }
}
