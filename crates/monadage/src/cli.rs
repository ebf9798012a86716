use std::path::PathBuf;

use clap::{Parser, Subcommand};
use effects::{Category, ParamValue};
use renderer::{ExportFormat, GpuPowerPreference};

#[derive(Parser, Debug)]
#[command(
    name = "monadage",
    author,
    version,
    about = "Apply GPU effect pipelines to a folder of images",
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Image file or folder of images to process.
    #[arg(value_name = "INPUT")]
    pub input: Option<PathBuf>,

    /// Folder that receives the processed images (created if missing).
    #[arg(value_name = "OUTPUT")]
    pub output: Option<PathBuf>,

    /// Effects to chain, comma separated (e.g. `channel_shift,vaporwave`).
    #[arg(short, long, value_name = "EFFECTS", conflicts_with = "recipe")]
    pub pipeline: Option<String>,

    /// Recipe TOML file, or the name of one in the recipe directories.
    #[arg(short, long, value_name = "FILE|NAME")]
    pub recipe: Option<String>,

    /// Override a parameter for every stage running an effect
    /// (`effect.param=value`; vectors as `x,y[,z[,w]]`). Repeatable.
    #[arg(short, long = "set", value_name = "EFFECT.PARAM=VALUE", value_parser = parse_assignment)]
    pub set: Vec<Assignment>,

    /// Output format: `png`, `jpeg`/`jpg` or `bmp`.
    #[arg(long, value_name = "FORMAT", value_parser = parse_export_format)]
    pub format: Option<ExportFormat>,

    /// JPEG quality (1-100).
    #[arg(long, value_name = "QUALITY", value_parser = clap::value_parser!(u8).range(1..=100))]
    pub quality: Option<u8>,

    /// Extra folder of `<effect>.glsl` shaders; overrides built-in and user shaders.
    #[arg(long, value_name = "DIR", env = "MONADAGE_SHADER_DIR")]
    pub shader_dir: Option<PathBuf>,

    /// Adapter power preference: `low` or `high`.
    #[arg(long, value_name = "POWER", value_parser = parse_gpu_power)]
    pub gpu_power: Option<GpuPowerPreference>,

    /// Refuse software (CPU) adapters.
    #[arg(long)]
    pub no_software: bool,

    /// Fail instead of running an effect whose shader does not build as pass-through.
    #[arg(long)]
    pub strict_shaders: bool,

    /// Reject images wider or taller than this many pixels.
    #[arg(long, value_name = "PIXELS")]
    pub max_texture_size: Option<u32>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List available effects and their parameters.
    Effects(EffectsArgs),
    /// Probe the GPU and print engine diagnostics.
    Info(InfoArgs),
}

#[derive(Parser, Debug)]
pub struct EffectsArgs {
    /// Only list effects in this category.
    #[arg(long, value_name = "CATEGORY")]
    pub category: Option<Category>,

    /// Print JSON instead of a table.
    #[arg(long)]
    pub json: bool,

    /// Extra folder of `<effect>.glsl` shaders to include.
    #[arg(long, value_name = "DIR", env = "MONADAGE_SHADER_DIR")]
    pub shader_dir: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Print JSON instead of text.
    #[arg(long)]
    pub json: bool,

    /// Refuse software (CPU) adapters while probing.
    #[arg(long)]
    pub no_software: bool,

    /// Extra folder of `<effect>.glsl` shaders to include in the counts.
    #[arg(long, value_name = "DIR", env = "MONADAGE_SHADER_DIR")]
    pub shader_dir: Option<PathBuf>,
}

/// A `--set effect.param=value` override.
#[derive(Clone, Debug, PartialEq)]
pub struct Assignment {
    pub effect: String,
    pub param: String,
    pub value: ParamValue,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_assignment(value: &str) -> Result<Assignment, String> {
    let (target, raw) = value
        .split_once('=')
        .ok_or_else(|| format!("expected EFFECT.PARAM=VALUE, got '{value}'"))?;
    let (effect, param) = target
        .trim()
        .split_once('.')
        .ok_or_else(|| format!("expected EFFECT.PARAM before '=', got '{target}'"))?;
    if effect.is_empty() || param.is_empty() {
        return Err(format!("effect and parameter names must not be empty in '{value}'"));
    }
    Ok(Assignment {
        effect: effect.to_string(),
        param: param.to_string(),
        value: parse_param_value(raw)?,
    })
}

fn parse_param_value(raw: &str) -> Result<ParamValue, String> {
    let trimmed = raw.trim();
    match trimmed.to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" => return Ok(ParamValue::Bool(true)),
        "false" | "off" | "no" => return Ok(ParamValue::Bool(false)),
        _ => {}
    }

    let components = trimmed
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f32>()
                .map_err(|_| format!("invalid number '{}' in '{trimmed}'", part.trim()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    match components.as_slice() {
        [single] => Ok(ParamValue::Scalar(*single)),
        many => ParamValue::from_components(many).map_err(|err| err.to_string()),
    }
}

pub fn parse_export_format(value: &str) -> Result<ExportFormat, String> {
    value.parse()
}

pub fn parse_gpu_power(value: &str) -> Result<GpuPowerPreference, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "low" | "low-power" | "integrated" => Ok(GpuPowerPreference::Low),
        "high" | "high-performance" | "discrete" => Ok(GpuPowerPreference::High),
        other => Err(format!("unknown gpu power '{other}'; expected low or high")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_assignments() {
        assert_eq!(
            parse_assignment("vaporwave.grid=false").unwrap(),
            Assignment {
                effect: "vaporwave".into(),
                param: "grid".into(),
                value: ParamValue::Bool(false),
            }
        );
        assert_eq!(
            parse_assignment("channel_shift.offset=6, -2").unwrap().value,
            ParamValue::Vec2([6.0, -2.0])
        );
        assert_eq!(
            parse_assignment("posterize.levels=4").unwrap().value,
            ParamValue::Scalar(4.0)
        );
        assert!(parse_assignment("posterize=4").is_err());
        assert!(parse_assignment("posterize.levels").is_err());
        assert!(parse_assignment("posterize.levels=lots").is_err());
        assert!(parse_assignment("tint.tint=1,2,3,4,5").is_err());
    }

    #[test]
    fn parses_run_flags() {
        let cli = Cli::try_parse_from([
            "monadage",
            "in",
            "out",
            "-p",
            "grayscale,invert",
            "--format",
            "jpg",
            "--quality",
            "80",
            "--set",
            "grayscale.amount=0.5",
            "--strict-shaders",
        ])
        .unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.run.pipeline.as_deref(), Some("grayscale,invert"));
        assert_eq!(cli.run.format, Some(ExportFormat::Jpeg));
        assert_eq!(cli.run.quality, Some(80));
        assert_eq!(cli.run.set.len(), 1);
        assert!(cli.run.strict_shaders);
    }

    #[test]
    fn rejects_out_of_range_quality() {
        assert!(Cli::try_parse_from(["monadage", "in", "out", "-p", "invert", "--quality", "0"]).is_err());
    }

    #[test]
    fn parses_effects_subcommand() {
        let cli = Cli::try_parse_from(["monadage", "effects", "--category", "glitch", "--json"]).unwrap();
        match cli.command {
            Some(Command::Effects(args)) => {
                assert_eq!(args.category, Some(Category::Glitch));
                assert!(args.json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
