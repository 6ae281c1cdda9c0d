//! Clap derive structures for the `haremote` CLI.
//!
//! Defines the command tree, global flags, and shared value enums.
//! Also compiled by `build.rs` for man page generation, so it may only
//! depend on clap and clap_complete.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// haremote -- drive a home-automation hub through its WebSocket relay
#[derive(Debug, Parser)]
#[command(
    name = "haremote",
    version,
    about = "Control home-automation entities through a WebSocket relay",
    long_about = "Connects to a hub relay, authenticates, and renders entity cards\n\
        for lights, switches, and climate devices. Card controls issue\n\
        service calls; displayed state only changes when the hub says so.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Relay profile to use
    #[arg(long, short = 'p', env = "HAREMOTE_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Relay WebSocket URL (overrides profile)
    #[arg(long, short = 'u', env = "HAREMOTE_URL", global = true)]
    pub url: Option<String>,

    /// Site identifier sent with the login handshake
    #[arg(long, short = 's', env = "HAREMOTE_SITE", global = true)]
    pub site: Option<String>,

    /// Login email (overrides profile)
    #[arg(long, short = 'e', env = "HAREMOTE_EMAIL", global = true)]
    pub email: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "HAREMOTE_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Seconds to wait for the relay to authenticate
    #[arg(long, env = "HAREMOTE_TIMEOUT", default_value = "30", global = true)]
    pub timeout: u64,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List entity states
    #[command(alias = "ls")]
    States(DomainFilter),

    /// Render one entity's card
    Card {
        /// Entity id, e.g. light.kitchen
        entity_id: String,
    },

    /// Render cards for every entity
    Cards(DomainFilter),

    /// Call a hub service directly
    Call(CallArgs),

    /// Activate a control on an entity's card
    Set(SetArgs),

    /// Re-render cards as state changes arrive (Ctrl-C to stop)
    Watch(DomainFilter),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Shared Arguments ─────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DomainFilter {
    /// Only entities in this domain (light, switch, climate, ...)
    #[arg(long, short = 'd')]
    pub domain: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CALL / SET
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CallArgs {
    /// Service domain, e.g. light
    pub domain: String,

    /// Service name, e.g. turn_on
    pub service: String,

    /// Target entity (added to the service data as entity_id)
    #[arg(long)]
    pub entity: Option<String>,

    /// Service data as a JSON object
    #[arg(long)]
    pub data: Option<String>,
}

#[derive(Debug, Args)]
pub struct SetArgs {
    /// Entity id, e.g. switch.fan
    pub entity_id: String,

    #[command(subcommand)]
    pub action: SetAction,
}

#[derive(Debug, Clone, Subcommand)]
pub enum SetAction {
    /// Flip the toggle on
    On,
    /// Flip the toggle off
    Off,
    /// Move the brightness slider (0-255)
    Brightness { value: f64 },
    /// Pick an HVAC mode
    Mode { mode: String },
    /// Move the target temperature slider
    Temperature { value: f64 },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create initial config file with guided setup
    Init,

    /// Display current resolved configuration
    Show,

    /// Store a password in the system keyring
    SetPassword {
        /// Profile name
        #[arg(long)]
        profile: Option<String>,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
