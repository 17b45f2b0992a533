//! CLI (command line interface).

use std::{fmt, net::IpAddr, path::PathBuf, str::FromStr as _};

use anyhow::anyhow;
use chrono::FixedOffset;
use kinescope_log::slog;
use structopt::StructOpt;

/// CLI (command line interface) of the server.
#[derive(Clone, Debug, StructOpt)]
#[structopt(about = "Retro-TV broadcast appliance server")]
pub struct Opts {
    /// IP address for the server to listen HTTP requests on.
    #[structopt(
        long,
        env = "KINESCOPE_HTTP_IP",
        default_value = "0.0.0.0",
        help = "IP to listen HTTP on",
        long_help = "IP address for the server to listen HTTP requests on"
    )]
    pub http_ip: IpAddr,

    /// Port for the server to listen HTTP requests on.
    #[structopt(
        long,
        env = "KINESCOPE_HTTP_PORT",
        default_value = "8080",
        help = "Port to listen HTTP on",
        long_help = "Port for the server to listen HTTP requests on"
    )]
    pub http_port: u16,

    /// Path to the content root directory holding every persisted JSON
    /// document (see [`crate::store`]) and the `videos/`/`thumbnails/`
    /// directory tree.
    #[structopt(
        short,
        long,
        env = "KINESCOPE_CONTENT_ROOT",
        default_value = "./content",
        help = "Path to the content root directory",
        long_help = "Path to the directory holding the metadata documents \
                     and the served video files"
    )]
    pub content_root: PathBuf,

    /// Verbosity level of the server logs.
    #[structopt(
        short,
        long,
        parse(try_from_str = Self::parse_log_level),
        help = "Logs verbosity level: \
                OFF | CRIT | ERRO | WARN | INFO | DEBG | TRCE"
    )]
    pub verbose: Option<slog::Level>,

    /// UTC offset the appliance treats as "local time" when computing the
    /// 03:00 broadcast-day boundary and the weekly schedule's Sunday
    /// midnight (§4.D, §4.E, §4.F all key off this).
    #[structopt(
        long,
        env = "KINESCOPE_LOCAL_TZ",
        default_value = "+00:00",
        parse(try_from_str = Self::parse_timezone),
        help = "UTC offset used as local time, e.g. +04:00 or -05:30"
    )]
    pub local_tz: FixedOffset,
}

impl Opts {
    /// Parses CLI [`Opts`] from command line arguments.
    ///
    /// Prints the error message and quits the program in case of failure.
    #[inline]
    #[must_use]
    pub fn from_args() -> Self {
        <Self as StructOpt>::from_args()
    }

    /// Parses [`slog::Level`] from the given string.
    ///
    /// This function is required, because [`slog::Level`]'s [`FromStr`]
    /// implementation returns `()`, which is not [`Display`] as [`StructOpt`]
    /// requires.
    ///
    /// # Errors
    ///
    /// If [`slog::Level`] failed to parse from the string.
    ///
    /// [`Display`]: std::fmt::Display
    /// [`FromStr`]: std::str::FromStr
    pub fn parse_log_level(lvl: &str) -> Result<slog::Level, anyhow::Error> {
        #[allow(clippy::map_err_ignore)]
        slog::Level::from_str(lvl).map_err(|_| {
            anyhow!(
                "'{}' is invalid verbosity level, allowed levels are: \
                 OFF | CRIT | ERRO | WARN | INFO | DEBG | TRCE",
                lvl,
            )
        })
    }

    /// Parses a `+HH:MM`/`-HH:MM` UTC offset into a [`FixedOffset`].
    ///
    /// # Errors
    ///
    /// If `s` isn't sign-prefixed `HH:MM`, or the offset is out of range.
    pub fn parse_timezone(s: &str) -> Result<FixedOffset, anyhow::Error> {
        let (sign, rest) = match s.chars().next() {
            Some('+') => (1, &s[1..]),
            Some('-') => (-1, &s[1..]),
            _ => {
                return Err(anyhow!(
                    "'{}' is not a valid UTC offset, expected +HH:MM or -HH:MM",
                    s,
                ))
            }
        };
        let mut parts = rest.split(':');
        let hours: i32 = parts
            .next()
            .ok_or_else(|| anyhow!("'{}' is missing hours", s))?
            .parse()
            .map_err(|e| anyhow!("'{}' has invalid hours: {}", s, e))?;
        let minutes: i32 = parts
            .next()
            .unwrap_or("0")
            .parse()
            .map_err(|e| anyhow!("'{}' has invalid minutes: {}", s, e))?;

        let total_seconds = sign * (hours * 3600 + minutes * 60);
        FixedOffset::east_opt(total_seconds)
            .ok_or_else(|| anyhow!("'{}' is out of range for a UTC offset", s))
    }
}

/// Error type indicating non-zero process exit code.
pub struct Failure;

impl fmt::Debug for Failure {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "")
    }
}

impl From<()> for Failure {
    #[inline]
    fn from(_: ()) -> Self {
        Self
    }
}
