//! Command line parsing.
//!
//! Hand-rolled (no clap dependency) to keep the binary small and boot
//! fast. Flags accept `--flag=value`, `--flag value`, and single-dash
//! forms; booleans may stand alone or take `=true`/`=false`.
//!
//! # Grammar
//!
//! ```text
//! goscan [options] <scanfile>
//! ```

use std::env;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process;
use std::str::FromStr;

use crate::error::Error;
use crate::output::OutputFormat;

/// Parsed, validated invocation options.
#[derive(Clone, Debug)]
pub struct Options {
    pub input: PathBuf,
    pub basedir: PathBuf,
    pub words: PathBuf,
    pub context: usize,
    pub hits_only: bool,
    /// `None` means "all": no policy filtering.
    pub policies: Option<Vec<String>>,
    /// `None` means stdout.
    pub output_file: Option<PathBuf>,
    pub output_format: OutputFormat,
    pub parallelism: usize,
    pub ramdisk_enable: bool,
    pub ramdisk_size_mb: u64,
}

/// Parse `std::env::args_os()`, printing usage and exiting 2 on invalid
/// arguments.
pub fn parse_args() -> Options {
    let mut args = env::args_os();
    let exe = args.next().unwrap_or_else(|| "goscan".into());
    match parse_from(args) {
        Ok(options) => options,
        Err(err) => {
            eprintln!("{err}");
            eprintln!();
            print_usage(&exe.to_string_lossy());
            process::exit(2);
        }
    }
}

/// Parse an argument iterator. Separated from [`parse_args`] so tests can
/// drive it without process plumbing.
pub fn parse_from<I>(args: I) -> Result<Options, Error>
where
    I: IntoIterator<Item = OsString>,
{
    let mut input: Option<PathBuf> = None;
    let mut basedir = env::temp_dir();
    let mut words: Option<PathBuf> = None;
    let mut context: usize = 10;
    let mut hits_only = false;
    let mut policies_raw = "all".to_string();
    let mut output_file = "-".to_string();
    let mut output_format = OutputFormat::Json;
    let mut parallelism = num_cpus::get().max(1);
    let mut ramdisk_enable = false;
    let mut ramdisk_size_mb: u64 = 4096;

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        let Some(text) = arg.to_str() else {
            // Non-UTF-8 can only be the positional input path.
            set_input(&mut input, PathBuf::from(arg))?;
            continue;
        };
        let Some(flag) = strip_dashes(text) else {
            set_input(&mut input, PathBuf::from(text))?;
            continue;
        };

        let (name, inline_value) = match flag.split_once('=') {
            Some((n, v)) => (n, Some(v.to_string())),
            None => (flag, None),
        };

        match name {
            "basedir" => basedir = PathBuf::from(take_value(name, inline_value, &mut iter)?),
            "words" => words = Some(PathBuf::from(take_value(name, inline_value, &mut iter)?)),
            "context" => {
                context = parse_number(name, &take_value(name, inline_value, &mut iter)?)?
            }
            "hitsonly" => hits_only = parse_bool(name, inline_value)?,
            "policies" => policies_raw = take_value(name, inline_value, &mut iter)?,
            "output.file" => output_file = take_value(name, inline_value, &mut iter)?,
            "output.format" => {
                output_format =
                    OutputFormat::from_str(&take_value(name, inline_value, &mut iter)?)?
            }
            "parallelism" => {
                parallelism = parse_number(name, &take_value(name, inline_value, &mut iter)?)?
            }
            "ramdisk.enable" => ramdisk_enable = parse_bool(name, inline_value)?,
            "ramdisk.size" => {
                ramdisk_size_mb =
                    parse_number(name, &take_value(name, inline_value, &mut iter)?)? as u64
            }
            other => return Err(Error::Config(format!("unknown flag: --{other}"))),
        }
    }

    let Some(words) = words else {
        return Err(Error::Config("words file must be defined".to_string()));
    };
    let Some(input) = input else {
        return Err(Error::Config(
            "must define a file to scan".to_string(),
        ));
    };
    if parallelism < 1 {
        return Err(Error::Config("parallelism must be positive".to_string()));
    }

    let policies = if policies_raw == "all" {
        None
    } else {
        Some(
            policies_raw
                .split(',')
                .map(str::to_string)
                .collect::<Vec<_>>(),
        )
    };
    let output_file = if output_file == "-" {
        None
    } else {
        Some(PathBuf::from(output_file))
    };

    Ok(Options {
        input,
        basedir,
        words,
        context,
        hits_only,
        policies,
        output_file,
        output_format,
        parallelism,
        ramdisk_enable,
        ramdisk_size_mb,
    })
}

fn strip_dashes(text: &str) -> Option<&str> {
    if let Some(rest) = text.strip_prefix("--") {
        return (!rest.is_empty()).then_some(rest);
    }
    if let Some(rest) = text.strip_prefix('-') {
        return (!rest.is_empty()).then_some(rest);
    }
    None
}

fn set_input(slot: &mut Option<PathBuf>, value: PathBuf) -> Result<(), Error> {
    if slot.is_some() {
        return Err(Error::Config(
            "expected exactly one file to scan".to_string(),
        ));
    }
    *slot = Some(value);
    Ok(())
}

fn take_value<I>(name: &str, inline: Option<String>, iter: &mut I) -> Result<String, Error>
where
    I: Iterator<Item = OsString>,
{
    if let Some(value) = inline {
        return Ok(value);
    }
    match iter.next() {
        Some(next) => Ok(next.to_string_lossy().into_owned()),
        None => Err(Error::Config(format!("flag --{name} requires a value"))),
    }
}

fn parse_number(name: &str, value: &str) -> Result<usize, Error> {
    value
        .parse::<usize>()
        .map_err(|_| Error::Config(format!("flag --{name} expects a non-negative integer")))
}

fn parse_bool(name: &str, inline: Option<String>) -> Result<bool, Error> {
    match inline.as_deref() {
        None => Ok(true),
        Some("true") => Ok(true),
        Some("false") => Ok(false),
        Some(other) => Err(Error::Config(format!(
            "flag --{name} expects true or false, got {other:?}"
        ))),
    }
}

fn print_usage(exe: &str) {
    eprintln!("Usage: {exe} [options] <scanfile>");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --basedir <dir>         Scratch directory parent (default: system temp)");
    eprintln!("  --words <file>          YAML keywords file (required)");
    eprintln!("  --context <n>           Bytes of context around each hit (default: 10)");
    eprintln!("  --hitsonly              Only output results containing hits");
    eprintln!("  --policies <csv|all>    Keyword policy filter (default: all)");
    eprintln!("  --output.file <path|->  Results file, - for stdout (default: -)");
    eprintln!("  --output.format <fmt>   json or yaml (default: json)");
    eprintln!("  --parallelism <n>       Scan worker count (default: CPU count)");
    eprintln!("  --ramdisk.enable        Back scratch space with a ramdisk");
    eprintln!("  --ramdisk.size <mb>     Ramdisk capacity in MiB (default: 4096)");
}
