use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use log::{error, info, Level};
use std::{
    fs::File,
    io::Read,
    path::{Path, PathBuf},
    process::ExitCode,
};
use walkdir::WalkDir;
use xcfire::{DecoderOptions, Directory, Loader, Result};

const EXTENSIONS: [&str; 3] = [".xcf", ".xcf.bz2", ".xcf.gz"];

#[rustfmt::skip]
fn create_cmd_args() -> Command {
    Command::new("xcfire")
        .about("Flattens GIMP xcf files into png images")
        .arg(Arg::new("in")
            .short('i')
            .long("input")
            .help("Input file, or a directory to search for xcf files")
            .action(ArgAction::Append)
            .value_parser(value_parser!(PathBuf))
            .required(true))
        .arg(Arg::new("out")
            .short('o')
            .long("output")
            .help("Output file, or directory when there are many inputs")
            .long_help("Where to write the png files.\nDefaults to the input path with a .png extension.")
            .value_parser(value_parser!(PathBuf)))
        .arg(Arg::new("list")
            .long("list")
            .action(ArgAction::SetTrue)
            .help("Print the layer stack instead of rendering"))
        .arg(Arg::new("seed")
            .long("seed")
            .help("Seed for dissolve layers")
            .value_parser(value_parser!(u64))
            .default_value("0"))
        .arg(Arg::new("max-width")
            .long("max-width")
            .help_heading("ADVANCED")
            .help("Refuse canvases wider than this")
            .value_parser(value_parser!(u32))
            .default_value("16384"))
        .arg(Arg::new("max-height")
            .long("max-height")
            .help_heading("ADVANCED")
            .help("Refuse canvases taller than this")
            .value_parser(value_parser!(u32))
            .default_value("16384"))
        .arg(Arg::new("debug")
            .long("debug")
            .action(ArgAction::SetTrue)
            .help_heading("LOGGING")
            .help("Display debug information and higher"))
        .arg(Arg::new("trace")
            .long("trace")
            .action(ArgAction::SetTrue)
            .help_heading("LOGGING")
            .help("Display very verbose information"))
        .arg(Arg::new("info")
            .long("info")
            .action(ArgAction::SetTrue)
            .help_heading("LOGGING")
            .help("Display information about what is being decoded"))
}

/// The most verbose level asked for; warnings and errors by default.
fn log_level(args: &ArgMatches) -> Level {
    if args.get_flag("trace") {
        Level::Trace
    } else if args.get_flag("debug") {
        Level::Debug
    } else if args.get_flag("info") {
        Level::Info
    } else {
        Level::Warn
    }
}

fn setup_logger(args: &ArgMatches) {
    if let Err(err) = simple_logger::init_with_level(log_level(args)) {
        eprintln!("could not set up logging: {err}");
    }
}

fn is_xcf(path: &Path) -> bool {
    let name = path.to_string_lossy().to_ascii_lowercase();
    EXTENSIONS.iter().any(|ext| name.ends_with(ext))
}

/// Expands directories into the xcf files below them.
fn collect_inputs(args: &ArgMatches) -> Vec<PathBuf> {
    let mut inputs = Vec::new();

    for path in args.get_many::<PathBuf>("in").into_iter().flatten() {
        if path.is_dir() {
            inputs.extend(
                WalkDir::new(path)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_map(|entry| match entry {
                        Ok(entry) => Some(entry),
                        Err(err) => {
                            error!("{err}");
                            None
                        }
                    })
                    .filter(|entry| entry.file_type().is_file() && is_xcf(entry.path()))
                    .map(walkdir::DirEntry::into_path),
            );
        } else {
            inputs.push(path.clone());
        }
    }

    inputs
}

/// `art.xcf.bz2` -> `art.png`
fn output_name(input: &Path) -> PathBuf {
    let name = input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let lower = name.to_ascii_lowercase();

    let stem = EXTENSIONS
        .iter()
        .rev()
        .find(|ext| lower.ends_with(*ext))
        .map_or(name.as_str(), |ext| &name[..name.len() - ext.len()]);

    PathBuf::from(format!("{stem}.png"))
}

fn load(path: &Path, options: DecoderOptions) -> Result<Loader> {
    let mut file = File::open(path)?;
    let mut loader = Loader::new().with_options(options);
    let mut buf = vec![0; 64 * 1024];

    loop {
        let read = file.read(&mut buf)?;
        if read == 0 {
            break;
        }
        loader.push(&buf[..read])?;
    }

    Ok(loader)
}

fn print_layers(path: &Path, directory: &Directory) {
    let canvas = &directory.canvas;
    println!(
        "{}: {}x{} {:?}, {:?} tiles",
        path.display(),
        canvas.width,
        canvas.height,
        canvas.color_mode,
        canvas.compression
    );

    // top of the stack first, like GIMP shows it.
    for layer in directory.layers.iter().rev() {
        println!(
            "  {:<24} {:>5}x{:<5} at {:>5},{:<5} {:<14} {:>3}%{}",
            layer.name,
            layer.width,
            layer.height,
            layer.x,
            layer.y,
            layer.blending.to_string(),
            u32::from(layer.opacity) * 100 / 255,
            if layer.mask.is_some() { " masked" } else { "" },
        );
    }
}

fn run(input: &Path, output: &Path, list: bool, options: DecoderOptions) -> Result<()> {
    let mut loader = load(input, options)?;

    if list {
        print_layers(input, &loader.finish_headers()?);
        return Ok(());
    }

    let image = loader.finish()?;
    image.save_png(output)?;
    info!("{} -> {}", input.display(), output.display());

    Ok(())
}

fn main() -> ExitCode {
    let args = create_cmd_args().get_matches();
    setup_logger(&args);

    let options = DecoderOptions::default()
        .set_dissolve_seed(*args.get_one::<u64>("seed").unwrap_or(&0))
        .set_max_width(*args.get_one::<u32>("max-width").unwrap_or(&16384))
        .set_max_height(*args.get_one::<u32>("max-height").unwrap_or(&16384));

    let inputs = collect_inputs(&args);
    if inputs.is_empty() {
        error!("no xcf files found");
        return ExitCode::FAILURE;
    }

    let out = args.get_one::<PathBuf>("out");
    let into_dir = inputs.len() > 1 || out.is_some_and(|out| out.is_dir());

    let mut failed = false;
    for input in &inputs {
        let output = match out {
            Some(out) if into_dir => out.join(output_name(input)),
            Some(out) => out.clone(),
            None => input.with_file_name(output_name(input)),
        };

        if let Err(err) = run(input, &output, args.get_flag("list"), options) {
            error!("{}: {err}", input.display());
            failed = true;
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(flags: &[&str]) -> std::result::Result<Level, clap::Error> {
        let args = ["xcfire", "-i", "art.xcf"].iter().chain(flags).copied();
        create_cmd_args()
            .try_get_matches_from(args)
            .map(|args| log_level(&args))
    }

    #[test]
    fn most_verbose_flag_wins() -> eyre::Result<()> {
        assert_eq!(level(&[])?, Level::Warn);
        assert_eq!(level(&["--info"])?, Level::Info);
        assert_eq!(level(&["--debug", "--info"])?, Level::Debug);
        assert_eq!(level(&["--debug", "--trace"])?, Level::Trace);
        assert_eq!(level(&["--trace", "--debug"])?, Level::Trace);

        Ok(())
    }

    #[test]
    fn warn_is_the_default_not_a_flag() {
        assert!(level(&["--warn"]).is_err());
    }

    #[test]
    fn output_names_drop_xcf_suffixes() {
        assert_eq!(output_name(Path::new("dir/art.xcf")), PathBuf::from("art.png"));
        assert_eq!(output_name(Path::new("art.XCF.bz2")), PathBuf::from("art.png"));
        assert_eq!(output_name(Path::new("art.xcf.gz")), PathBuf::from("art.png"));
        assert_eq!(output_name(Path::new("notes.txt")), PathBuf::from("notes.txt.png"));
    }
}
