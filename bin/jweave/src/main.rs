use jweave::jvm::class_file::ClassFile;
use jweave::jvm::class_graph::{ClassGraph, ClassGraphArenas, JavaLibrary};
use jweave::jvm::model::read_types;
use jweave::jvm::{BinaryName, Name};
use jweave::weaver::{weave, Aspect, Diagnostic, Outcome, Settings, Severity, SourceLocation};
use jweave::*;

use clap::{value_parser, Arg, ArgAction, Command};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::exit;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};
use walkdir::WalkDir;

fn main() -> Result<(), jvm::Error> {
    env_logger::init();

    let matches = Command::new("JVM aspect weaver")
        .version("0.1.0")
        .author("Alec Theriault <alec.theriault@gmail.com>")
        .about("Weave aspects into JVM class files")
        .arg(
            Arg::new("aspect")
                .long("aspect")
                .value_name("CLASS_FILE")
                .action(ArgAction::Append)
                .value_parser(value_parser!(PathBuf))
                .help("Class file of an `@Aspect` annotated class (can be repeated)"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("DIRECTORY")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("Directory woven classes are written into (by package)"),
        )
        .arg(
            Arg::new("cflow-counter")
                .long("cflow-counter")
                .value_name("CLASS_NAME")
                .value_parser(|name: &str| BinaryName::from_string(name.replace('.', "/")))
                .help("Runtime class backing `cflow` pointcuts (eg. `my/runtime/Counter`)"),
        )
        .arg(
            Arg::new("no-lint")
                .long("no-lint")
                .action(ArgAction::SetTrue)
                .help("Don't report advice that never applied"),
        )
        .arg(
            Arg::new("INPUT")
                .help("Class files to weave, or directories to search for them")
                .required(true)
                .num_args(1..)
                .value_parser(value_parser!(PathBuf)),
        )
        .get_matches();

    let mut settings = Settings::default();
    if let Some(counter) = matches.get_one::<BinaryName>("cflow-counter") {
        settings.cflow_counter_class = counter.clone();
    }
    settings.lint = !matches.get_flag("no-lint");
    let output = matches
        .get_one::<PathBuf>("output")
        .cloned()
        .unwrap_or_default();

    let aspect_paths: Vec<PathBuf> = matches
        .get_many::<PathBuf>("aspect")
        .map(|paths| paths.cloned().collect())
        .unwrap_or_default();
    let mut input_paths = vec![];
    for input in matches.get_many::<PathBuf>("INPUT").into_iter().flatten() {
        input_paths.extend(class_files(input));
    }

    let mut diagnostics: Vec<Diagnostic> = vec![];
    let mut files = vec![];
    let mut is_aspect = vec![];
    for (path, aspect) in aspect_paths
        .iter()
        .map(|path| (path, true))
        .chain(input_paths.iter().map(|path| (path, false)))
    {
        log::info!("Reading '{}'", path.display());
        let parsed = fs::read(path)
            .map_err(jvm::Error::IoError)
            .and_then(|bytes| ClassFile::parse(&bytes));
        match parsed {
            Ok(file) => {
                files.push(file);
                is_aspect.push(aspect);
            }
            Err(err) => diagnostics.push(file_error(path, err)),
        }
    }

    let class_graph_arenas = ClassGraphArenas::new();
    let class_graph = ClassGraph::new(&class_graph_arenas);
    let java =
        JavaLibrary::add_to_graph_with_runtime(&class_graph, settings.cflow_counter_class.clone());

    let mut types = vec![];
    let mut aspects = vec![];
    for (read, aspect) in read_types(&class_graph, files).into_iter().zip(is_aspect) {
        let class = match read {
            Ok(class) => class,
            Err(err) => {
                diagnostics.push(Diagnostic::error(err.to_string(), SourceLocation::default()));
                continue;
            }
        };
        if aspect {
            match Aspect::from_annotations(&class_graph, class.id, &mut diagnostics) {
                Some(aspect) => aspects.push(aspect),
                None => diagnostics.push(Diagnostic::error(
                    "class is not annotated with `@Aspect`",
                    SourceLocation::class(class.id.name.as_str()),
                )),
            }
        }
        types.push(class);
    }
    log::info!(
        "Weaving {} types with {} aspects",
        types.len(),
        aspects.len()
    );

    let result = weave(&class_graph, &java, &settings, types, &aspects, None);
    diagnostics.extend(result.diagnostics);

    let mut woven = 0;
    for woven_type in result.types {
        if woven_type.outcome == Outcome::Woven {
            woven += 1;
        }
        let class_name = woven_type.class.id.name.as_str().to_owned();
        let class_file = output.join(format!("{}.class", class_name));

        // Types left alone go back out at the version they came in with
        let version = if woven_type.outcome == Outcome::Woven {
            settings.output_version
        } else {
            woven_type.class.original_version()
        };
        log::info!(
            "Writing '{}' (version {}.{})",
            class_file.display(),
            version.major_version,
            version.minor_version
        );
        let bytes = woven_type
            .class
            .serialize(version)
            .and_then(|file| file.to_bytes());
        match bytes {
            Ok(bytes) => {
                if let Some(parent) = class_file.parent() {
                    fs::create_dir_all(parent).map_err(jvm::Error::IoError)?;
                }
                fs::write(&class_file, bytes).map_err(jvm::Error::IoError)?;
            }
            Err(err) => diagnostics.push(file_error(&class_file, err)),
        }
    }
    log::info!("Wove advice into {} types", woven);

    let errors = report(&diagnostics).map_err(jvm::Error::IoError)?;
    if errors > 0 {
        exit(1);
    }
    Ok(())
}

/// Class files at a path, searching directories recursively
fn class_files(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        vec![path.to_path_buf()]
    } else {
        WalkDir::new(path)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .filter(|e| e.is_file() && e.extension().map_or(false, |ex| ex == "class"))
            .collect()
    }
}

fn file_error(path: &Path, err: jvm::Error) -> Diagnostic {
    let location = SourceLocation {
        source_file: Some(path.display().to_string()),
        ..SourceLocation::default()
    };
    Diagnostic::error(err.to_string(), location)
}

/// Print diagnostics to stderr, returning how many were errors
fn report(diagnostics: &[Diagnostic]) -> io::Result<usize> {
    let mut s = StandardStream::stderr(ColorChoice::Auto);
    let mut errors = 0;
    for diagnostic in diagnostics {
        let (label, color) = match diagnostic.severity {
            Severity::Error => {
                errors += 1;
                ("error", Color::Red)
            }
            Severity::Warning => ("warning", Color::Yellow),
            Severity::Lint => ("lint", Color::Cyan),
        };
        if !diagnostic.location.is_unknown() {
            s.set_color(ColorSpec::new().set_bold(true))?;
            write!(s, "{}: ", diagnostic.location)?;
        }
        s.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true))?;
        s.write_all(label.as_bytes())?;
        s.reset()?;
        writeln!(s, ": {}", diagnostic.message)?;
    }
    Ok(errors)
}
