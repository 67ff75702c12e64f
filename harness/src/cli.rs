use clap::Parser;

const HELP_TEMPLATE: &str = r#"
{before-help}{name} {version}
{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
"#;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, help_template = HELP_TEMPLATE)]
pub struct Cli {
    /// Run a single named or numbered scenario (see `--list`) instead of the
    /// full suite.
    #[arg(short, long, value_name = "ID_OR_NAME")]
    pub scenario: Option<String>,

    /// List the available scenarios and exit.
    #[arg(short, long, default_value_t = false)]
    pub list: bool,
}
