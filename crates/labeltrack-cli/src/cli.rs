//! Command-line surface.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use labeltrack::store::Priority;
use labeltrack::{ColorType, PrintUnit, Stage};

/// Production tracker for label-printing plants.
#[derive(Debug, Parser)]
#[command(name = "labeltrack", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Config file (defaults to ~/.labeltrack/config.json).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// SQLite database, overriding the config.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Log filter such as `debug` or `labeltrack=trace`. Wins over RUST_LOG.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Print results as JSON.
    #[arg(long, global = true, default_value_t = false)]
    pub json: bool,

    /// Name recorded as the operator of transitions. Defaults to $USER.
    #[arg(long, global = true)]
    pub actor: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PriorityArg {
    Normal,
    High,
    Urgent,
}

impl From<PriorityArg> for Priority {
    fn from(arg: PriorityArg) -> Self {
        match arg {
            PriorityArg::Normal => Priority::Normal,
            PriorityArg::High => Priority::High,
            PriorityArg::Urgent => Priority::Urgent,
        }
    }
}

/// Geometry of one print layout.
#[derive(Debug, Clone, Args)]
pub struct LayoutArgs {
    /// Label width across the web, mm.
    #[arg(long)]
    pub width: f64,

    /// Gap between cavities, mm.
    #[arg(long, default_value_t = 0.0)]
    pub cavity_gap: f64,

    /// Labels across the web.
    #[arg(long, default_value_t = 1)]
    pub cavities: u32,

    /// Label length along the web, mm.
    #[arg(long)]
    pub repeat: f64,

    /// Repeats around the cylinder.
    #[arg(long, default_value_t = 1)]
    pub repeats: u32,

    /// Z unit; the best fitting unit is used when omitted.
    #[arg(long)]
    pub unit: Option<u16>,

    #[arg(long, default_value_t = 1)]
    pub colors: u32,

    /// Labels ordered.
    #[arg(long)]
    pub quantity: u64,

    /// Also list every placed rectangle.
    #[arg(long, default_value_t = false)]
    pub rects: bool,
}

/// Optional layout captured when a job is registered.
#[derive(Debug, Clone, Default, Args)]
pub struct JobLayoutArgs {
    /// Label width, mm. Turns on layout capture.
    #[arg(long)]
    pub width: Option<f64>,

    #[arg(long)]
    pub cavity_gap: Option<f64>,

    #[arg(long)]
    pub cavities: Option<u32>,

    /// Label length, mm. Required with --width.
    #[arg(long)]
    pub repeat: Option<f64>,

    #[arg(long)]
    pub repeats: Option<u32>,

    #[arg(long)]
    pub unit: Option<u16>,

    #[arg(long)]
    pub colors: Option<u32>,
}

#[derive(Debug, Args)]
pub struct CreateArgs {
    #[arg(long)]
    pub customer: String,

    #[arg(long)]
    pub name: String,

    #[arg(long, value_enum, default_value_t = PriorityArg::Normal)]
    pub priority: PriorityArg,

    /// Initial stage.
    #[arg(long, default_value = "Pending-Approval")]
    pub stage: Stage,

    #[arg(long)]
    pub order_number: Option<String>,

    #[arg(long)]
    pub production_order: Option<String>,

    /// Due date, YYYY-MM-DD.
    #[arg(long)]
    pub due: Option<NaiveDate>,

    /// Labels ordered.
    #[arg(long, default_value_t = 0)]
    pub quantity: u64,

    #[arg(long)]
    pub material: Option<String>,

    #[arg(long)]
    pub finish: Option<String>,

    #[arg(long)]
    pub label_position: Option<String>,

    #[arg(long)]
    pub core: Option<String>,

    /// Labels per core.
    #[arg(long)]
    pub per_core: Option<u32>,

    #[arg(long)]
    pub die_number: Option<String>,

    #[arg(long)]
    pub plate_number: Option<String>,

    #[command(flatten)]
    pub layout: JobLayoutArgs,
}

/// Figures reported for the stage being closed.
#[derive(Debug, Clone, Default, Args)]
pub struct ClosureArgs {
    /// Person responsible for the closed stage.
    #[arg(long)]
    pub operator: Option<String>,

    #[arg(long)]
    pub notes: Option<String>,

    /// Prepress supplier (closing Design).
    #[arg(long)]
    pub supplier: Option<String>,

    /// Spool code (closing Printing).
    #[arg(long)]
    pub spool: Option<String>,

    /// Meters printed (closing Printing).
    #[arg(long)]
    pub printed_meters: Option<f64>,

    /// Meters scrapped (closing Printing).
    #[arg(long)]
    pub scrap_meters: Option<f64>,

    /// Cores used (closing Quality-Control).
    #[arg(long)]
    pub cores: Option<u32>,

    /// Boxes packed (closing Dispatch).
    #[arg(long)]
    pub boxes: Option<u32>,
}

/// Parses `ANILOX[:TYPE[:CODE]]`, e.g. `440:pantone:P-185C`. Empty parts are
/// left unset and the type defaults to process color.
pub fn parse_print_unit(input: &str) -> Result<PrintUnit, String> {
    let mut parts = input.splitn(3, ':').map(str::trim);
    let non_empty = |part: Option<&str>| part.filter(|p| !p.is_empty()).map(String::from);
    let anilox = non_empty(parts.next());
    let color_type = match parts.next().filter(|p| !p.is_empty()) {
        Some(name) => ColorType::parse(name)
            .ok_or_else(|| format!("unknown color type '{}'; use process or pantone", name))?,
        None => ColorType::default(),
    };
    let color_code = non_empty(parts.next());
    Ok(PrintUnit {
        anilox,
        color_type,
        color_code,
    })
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Recommends a cylinder and derives material and plate figures.
    Layout(LayoutArgs),

    /// Registers a job.
    Create(CreateArgs),

    /// Lists jobs.
    List {
        /// Only jobs in this state.
        #[arg(long)]
        state: Option<String>,
    },

    /// Shows one job, its next stages and any data drift.
    Show { id: i64 },

    /// Moves a job to a later stage.
    Advance {
        id: i64,

        stage: Stage,

        /// Machine for the new stage.
        #[arg(long)]
        machine: Option<String>,

        #[command(flatten)]
        closure: ClosureArgs,
    },

    /// Puts a job on hold.
    Pause {
        id: i64,

        /// Breakfast, lunch, dinner, end of shift, maintenance or free text.
        #[arg(long)]
        reason: String,
    },

    /// Returns a paused job to its previous stage.
    Resume { id: i64 },

    /// Sets the anilox and ink of each color unit, in station order.
    Colors {
        id: i64,

        /// ANILOX:TYPE:CODE, e.g. 440:pantone:P-185C. Repeat per unit.
        #[arg(long = "unit", value_parser = parse_print_unit)]
        units: Vec<PrintUnit>,
    },

    /// Interval log of a job with time per stage.
    History { id: i64 },

    /// Job count per state.
    Stats,

    /// Deletes a job and its history.
    Delete {
        id: i64,

        /// Confirms the deletion.
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn cli_parses_advance_with_closure() {
        let cli = Cli::parse_from([
            "labeltrack",
            "advance",
            "7",
            "quality-control",
            "--machine",
            "QC Station 3",
            "--spool",
            "B-204",
            "--printed-meters",
            "2790",
            "--scrap-meters",
            "35.5",
        ]);
        match cli.command {
            Command::Advance {
                id,
                stage,
                machine,
                closure,
            } => {
                assert_eq!(id, 7);
                assert_eq!(stage, Stage::QualityControl);
                assert_eq!(machine.as_deref(), Some("QC Station 3"));
                assert_eq!(closure.printed_meters, Some(2790.0));
                assert_eq!(closure.scrap_meters, Some(35.5));
            }
            _ => panic!("expected Advance command"),
        }
    }

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::parse_from([
            "labeltrack",
            "stats",
            "--json",
            "--db",
            "/tmp/plant.db",
            "--log-level",
            "debug",
        ]);
        assert!(cli.json);
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/plant.db")));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn cli_parses_create_with_legacy_stage() {
        let cli = Cli::parse_from([
            "labeltrack",
            "create",
            "--customer",
            "Viña Santa Rita",
            "--name",
            "Reserva 750ml",
            "--stage",
            "Diseño",
            "--due",
            "2026-04-15",
            "--width",
            "50",
            "--repeat",
            "80",
        ]);
        match cli.command {
            Command::Create(args) => {
                assert_eq!(args.stage, Stage::Design);
                assert_eq!(args.due, NaiveDate::from_ymd_opt(2026, 4, 15));
                assert_eq!(args.layout.width, Some(50.0));
                assert_eq!(args.layout.unit, None);
            }
            _ => panic!("expected Create command"),
        }
    }

    #[test]
    fn cli_parses_print_units() {
        let cli = Cli::parse_from([
            "labeltrack",
            "colors",
            "3",
            "--unit",
            "440:Policromía:Cyan",
            "--unit",
            "M::",
        ]);
        match cli.command {
            Command::Colors { id, units } => {
                assert_eq!(id, 3);
                assert_eq!(units[0].color_type, ColorType::Process);
                assert_eq!(units[0].color_code.as_deref(), Some("Cyan"));
                assert_eq!(units[1].anilox.as_deref(), Some("M"));
                assert_eq!(units[1].color_code, None);
            }
            _ => panic!("expected Colors command"),
        }
        assert!(parse_print_unit("440:metallic:Gold").is_err());
    }

    #[test]
    fn cli_rejects_unknown_stage() {
        let result = Cli::try_parse_from(["labeltrack", "advance", "1", "Lamination"]);
        assert!(result.is_err());
    }
}
