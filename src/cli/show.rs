//! Show and get subcommands for layered-config CLI

use crate::format::OutputFormat;
use clap::Args;

/// Arguments for the show subcommand
#[derive(Args, Debug, Default)]
pub struct ShowArgs {
    /// Layer to print: global (default), default, or user
    #[arg(short = 'L', long, default_value = "global", value_name = "LAYER")]
    pub layer: Layer,

    /// Output format: json (default) or flat
    #[arg(short, long, default_value = "json", value_name = "FORMAT")]
    pub format: FormatArg,
}

/// Arguments for the get subcommand
#[derive(Args, Debug)]
pub struct GetArgs {
    /// Dotted path, e.g. `server.hosts[0]`
    #[arg(value_name = "PATH")]
    pub path: String,

    /// Output format: json (default) or flat
    #[arg(short, long, default_value = "json", value_name = "FORMAT")]
    pub format: FormatArg,
}

/// Which configuration layer to print
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Layer {
    #[default]
    Global,
    Default,
    User,
}

impl std::str::FromStr for Layer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "global" => Ok(Layer::Global),
            "default" | "defaults" => Ok(Layer::Default),
            "user" => Ok(Layer::User),
            _ => Err(format!(
                "Invalid layer '{}'. Valid options: global, default, user",
                s
            )),
        }
    }
}

/// Clap wrapper for [`OutputFormat`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormatArg(pub OutputFormat);

impl std::str::FromStr for FormatArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OutputFormat::from_str(s)
            .map(FormatArg)
            .ok_or_else(|| format!("Invalid format '{}'. Valid options: json, flat", s))
    }
}
