//! Top-level driver: wires signals, dictionary, output, scratch, and the
//! pipeline together.

use std::fs::File;
use std::io::{self, Write};
use std::sync::Arc;

use crate::archive::UnarExtractor;
use crate::cancel::CancelSource;
use crate::cli::Options;
use crate::error::Error;
use crate::keywords::Keywords;
use crate::output::summary_writer;
use crate::pipeline::{self, ScanOptions};
use crate::scratch::{PlainDirectory, Scratch, ScratchBackend};
use crate::signal;

/// Run one scan per the parsed options.
///
/// Signal-triggered cancellation is a clean exit: whatever was aggregated
/// before the signal is still written and `Ok` is returned.
pub fn run(options: &Options) -> Result<(), Error> {
    let cancel = CancelSource::new();
    signal::install(cancel.clone());

    let keywords = Arc::new(Keywords::load_file(
        &options.words,
        options.policies.as_deref(),
    )?);

    let sink: Box<dyn Write> = match &options.output_file {
        None => Box::new(io::stdout()),
        Some(path) => Box::new(File::create(path)?),
    };
    let mut writer = summary_writer(options.output_format, sink);

    let mut scratch = Scratch::new(&options.basedir, scratch_backend(options)?)?;

    let scan_opts = ScanOptions {
        context: options.context,
        hits_only: options.hits_only,
        parallelism: options.parallelism,
    };
    let result = pipeline::scan(
        &options.input,
        keywords,
        &scratch,
        Arc::new(UnarExtractor),
        &scan_opts,
        &cancel,
    );

    // Teardown on every path; a teardown failure on the success path is
    // still a real failure (a ramdisk may be left mounted otherwise).
    match result {
        Ok(summary) => {
            writer.write_summary(&summary)?;
            scratch.teardown()
        }
        Err(err) => {
            let _ = scratch.teardown();
            Err(err)
        }
    }
}

fn scratch_backend(options: &Options) -> Result<Box<dyn ScratchBackend>, Error> {
    if !options.ramdisk_enable {
        return Ok(Box::new(PlainDirectory));
    }
    #[cfg(target_os = "linux")]
    {
        Ok(Box::new(crate::scratch::TmpfsLinux::new(
            options.ramdisk_size_mb,
        )))
    }
    #[cfg(target_os = "macos")]
    {
        Ok(Box::new(crate::scratch::HfsRamdiskDarwin::new(
            options.ramdisk_size_mb,
        )))
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        Err(Error::Config(
            "ramdisk scratch is only supported on Linux and macOS".to_string(),
        ))
    }
}
