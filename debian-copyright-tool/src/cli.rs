// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    clap::{Arg, ArgMatches, Command},
    debian_copyright::{
        changelog,
        copyright::{CopyrightFile, ValidationSettings},
        error::CopyrightError,
        license::{License, LicenseExpr},
    },
    log::{debug, info, LevelFilter},
    serde::Deserialize,
    std::{
        ffi::OsString,
        io::Write,
        path::{Path, PathBuf},
    },
    thiserror::Error,
};

const CHECK_ABOUT: &str = "\
Check a debian/copyright file.

The file is parsed and validated against the machine-readable copyright
format (DEP-5). Structural problems and licenses referenced without any full
text are errors. Legal but questionable constructs are printed as warnings.

Unless --no-rewrite is given, the parsed file is serialized to a sibling file
with a `.re` suffix. Parsing is lossless, so this file should be identical to
the input.

Each additional PATH argument is resolved against the `Files` paragraphs and
the matching paragraph is printed.

# Package Version

Some checks depend on whether the package is native. The version is read from
the first entry of a changelog file. By default a `changelog` file next to the
copyright file is used when present.

# YAML Configuration

A YAML file can be given with --config. It can have the following keys:

packaging-prefix (optional) (string)
   Path prefix of files maintained by the packager. Defaults to `debian/`.

strict (optional) (bool)
   Whether warnings cause the command to fail.
";

const COVERS_ABOUT: &str = "\
Evaluate license coverage.

Parses a license synopsis such as `GPL-2+ or Artistic-2.0, and BSD-3-clause`
and determines whether the given declared licenses cover it. Exits with an
error if they do not.
";

#[derive(Debug, Error)]
pub enum DctError {
    #[error("argument parsing error: {0:?}")]
    Clap(#[from] clap::Error),

    #[error("{0}")]
    Copyright(#[from] CopyrightError),

    #[error("I/O error: {0:?}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0:?}")]
    SerdeYaml(#[from] serde_yaml::Error),

    #[error("invalid sub-command: {0}")]
    InvalidSubCommand(String),

    #[error("{0} warning(s) in strict mode")]
    StrictAdvisories(usize),

    #[error("{0} is not covered by the declared licenses")]
    NotCovered(String),
}

pub type Result<T> = std::result::Result<T, DctError>;

/// Configuration of the `check` command loaded from YAML.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
struct ToolConfig {
    #[serde(flatten)]
    validation: ValidationSettings,
    strict: bool,
}

fn command() -> Command<'static> {
    let app = Command::new("Debian Copyright Tool")
        .version("0.1")
        .about("Check machine-readable Debian copyright files")
        .arg_required_else_help(true);

    let app = app.arg(
        Arg::new("verbose")
            .long("verbose")
            .short('v')
            .global(true)
            .multiple_occurrences(true)
            .help("Increase logging verbosity. Can be specified multiple times."),
    );

    let app = app.subcommand(
        Command::new("check")
            .about("Parse and validate a debian/copyright file")
            .long_about(CHECK_ABOUT)
            .arg(
                Arg::new("changelog")
                    .long("changelog")
                    .takes_value(true)
                    .allow_invalid_utf8(true)
                    .help("Path to the debian/changelog providing the package version"),
            )
            .arg(
                Arg::new("config")
                    .long("config")
                    .takes_value(true)
                    .allow_invalid_utf8(true)
                    .help("Path to a YAML file defining validation settings"),
            )
            .arg(
                Arg::new("strict")
                    .long("strict")
                    .help("Treat warnings as errors"),
            )
            .arg(
                Arg::new("no-rewrite")
                    .long("no-rewrite")
                    .help("Do not write the re-serialized file"),
            )
            .arg(
                Arg::new("copyright")
                    .required(true)
                    .allow_invalid_utf8(true)
                    .help("Path to the copyright file"),
            )
            .arg(
                Arg::new("path")
                    .multiple_values(true)
                    .help("Paths to resolve against Files paragraphs"),
            ),
    );

    app.subcommand(
        Command::new("covers")
            .about("Check whether declared licenses cover a license synopsis")
            .long_about(COVERS_ABOUT)
            .arg(
                Arg::new("expression")
                    .required(true)
                    .help("License synopsis to evaluate"),
            )
            .arg(
                Arg::new("license")
                    .multiple_values(true)
                    .help("Declared licenses"),
            ),
    )
}

fn init_logging(matches: &ArgMatches) {
    let log_level = match matches.occurrences_of("verbose") {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_level.as_str()),
    );

    // Disable log context except at higher log levels.
    if log_level <= LevelFilter::Info {
        builder
            .format_timestamp(None)
            .format_level(false)
            .format_target(false);
    }

    builder.init();
}

pub fn run_cli() -> Result<()> {
    let mut app = command();
    let matches = app.clone().get_matches();

    init_logging(&matches);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match matches.subcommand() {
        Some((command, args)) => dispatch(command, args, &mut out),
        None => {
            app.print_help()?;
            Ok(())
        }
    }
}

fn dispatch(command: &str, args: &ArgMatches, out: &mut impl Write) -> Result<()> {
    match command {
        "check" => command_check(args, out),
        "covers" => command_covers(args, out),
        _ => Err(DctError::InvalidSubCommand(command.to_string())),
    }
}

fn load_config(args: &ArgMatches) -> Result<ToolConfig> {
    match args.value_of_os("config") {
        Some(path) => {
            let f = std::fs::File::open(path)?;
            Ok(serde_yaml::from_reader(f)?)
        }
        None => Ok(ToolConfig::default()),
    }
}

fn changelog_path(args: &ArgMatches, copyright: &Path) -> Option<PathBuf> {
    if let Some(path) = args.value_of_os("changelog") {
        return Some(PathBuf::from(path));
    }

    let sibling = copyright.with_file_name("changelog");
    if sibling.is_file() {
        Some(sibling)
    } else {
        None
    }
}

fn rewrite_path(copyright: &Path) -> PathBuf {
    let mut path = OsString::from(copyright.as_os_str());
    path.push(".re");
    PathBuf::from(path)
}

fn command_check(args: &ArgMatches, out: &mut impl Write) -> Result<()> {
    let copyright_path = PathBuf::from(
        args.value_of_os("copyright")
            .expect("copyright argument is required"),
    );

    let config = load_config(args)?;
    let strict = config.strict || args.is_present("strict");
    let mut settings = config.validation;

    if let Some(path) = changelog_path(args, &copyright_path) {
        let version = changelog::latest_version(&std::fs::read_to_string(&path)?)?;
        debug!("package version {} from {}", version, path.display());
        settings.package_version = Some(version);
    }

    let text = std::fs::read_to_string(&copyright_path)?;
    let file = CopyrightFile::parse_str_with_settings(&text, &settings)?;

    if !args.is_present("no-rewrite") {
        let path = rewrite_path(&copyright_path);
        let mut fh = std::fs::File::create(&path)?;
        file.write(&mut fh)?;
        info!("wrote {}", path.display());
    }

    for advisory in file.advisories() {
        writeln!(out, "{}", advisory)?;
    }

    for path in args.values_of("path").into_iter().flatten() {
        match file.files_for_path(path)? {
            Some(paragraph) => {
                let license = paragraph
                    .license()
                    .transpose()?
                    .map(|field| field.expression().to_string())
                    .unwrap_or_default();

                writeln!(
                    out,
                    "{}: Files: {} License: {}",
                    path,
                    paragraph.patterns().join(" "),
                    license
                )?;
            }
            None => writeln!(out, "{}: no matching Files paragraph", path)?,
        }
    }

    if strict && !file.advisories().is_empty() {
        return Err(DctError::StrictAdvisories(file.advisories().len()));
    }

    Ok(())
}

fn command_covers(args: &ArgMatches, out: &mut impl Write) -> Result<()> {
    let expression = LicenseExpr::parse(
        args.value_of("expression")
            .expect("expression argument is required"),
    );
    let declared = args
        .values_of("license")
        .into_iter()
        .flatten()
        .map(License::parse)
        .collect::<Vec<_>>();

    debug!("covering sets of {}: {}", expression, expression.combo().len());

    if expression.covered_by(&declared) {
        writeln!(out, "{} is covered", expression)?;
        Ok(())
    } else {
        Err(DctError::NotCovered(expression.to_string()))
    }
}

#[cfg(test)]
mod test {
    use {super::*, indoc::indoc};

    const COPYRIGHT: &str = indoc! {"
        Format: https://www.debian.org/doc/packaging-manuals/copyright-format/1.0/
        Upstream-Name: hello

        Files: *
        Copyright: 2020 Jane Doe
        License: Expat

        # Packaging
        Files: debian/*
        Copyright: 2023 John Roe
        License: GPL-2+

        License: Expat
         Permission is hereby granted.

        License: GPL-2+
         This program is free software.
    "};

    fn run(argv: &[&str]) -> Result<String> {
        let matches = command().try_get_matches_from(argv.iter().copied())?;
        let (name, args) = matches
            .subcommand()
            .expect("tests always pass a sub-command");

        let mut out = vec![];
        dispatch(name, args, &mut out)?;

        Ok(String::from_utf8(out).expect("output is UTF-8"))
    }

    #[test]
    fn check_rewrites_and_resolves() -> Result<()> {
        let td = tempfile::TempDir::new()?;
        let copyright = td.path().join("copyright");
        std::fs::write(&copyright, COPYRIGHT)?;
        std::fs::write(
            td.path().join("changelog"),
            "hello (2.10-3) unstable; urgency=medium\n",
        )?;
        let copyright_arg = copyright.to_string_lossy().to_string();

        let output = run(&["dct", "check", &copyright_arg, "src/hello.c", "debian/rules"])?;
        assert_eq!(
            output,
            "src/hello.c: Files: * License: Expat\ndebian/rules: Files: debian/* License: GPL-2+\n"
        );
        assert_eq!(
            std::fs::read_to_string(td.path().join("copyright.re"))?,
            COPYRIGHT
        );

        Ok(())
    }

    #[test]
    fn check_strict_and_config() -> Result<()> {
        let td = tempfile::TempDir::new()?;
        let copyright = td.path().join("copyright");
        std::fs::write(&copyright, COPYRIGHT)?;
        let changelog = td.path().join("other-changelog");
        std::fs::write(&changelog, "hello (2.10-3) unstable; urgency=medium\n")?;
        let config = td.path().join("dct.yaml");
        std::fs::write(&config, "packaging-prefix: packaging/\nstrict: true\n")?;

        let copyright_arg = copyright.to_string_lossy().to_string();
        let changelog_arg = changelog.to_string_lossy().to_string();
        let config_arg = config.to_string_lossy().to_string();

        let res = run(&[
            "dct",
            "check",
            "--no-rewrite",
            "--changelog",
            &changelog_arg,
            "--config",
            &config_arg,
            &copyright_arg,
        ]);
        assert!(matches!(res, Err(DctError::StrictAdvisories(1))));
        assert!(!td.path().join("copyright.re").exists());

        // No changelog means the package is not known to be non-native.
        run(&["dct", "check", "--strict", "--no-rewrite", &copyright_arg])?;

        Ok(())
    }

    #[test]
    fn check_reports_validation_errors() -> Result<()> {
        let td = tempfile::TempDir::new()?;
        let copyright = td.path().join("copyright");
        std::fs::write(
            &copyright,
            "Format: x\n\nFiles: *\nCopyright: me\nLicense: FOO\n",
        )?;

        let copyright_arg = copyright.to_string_lossy().to_string();

        let res = run(&["dct", "check", &copyright_arg]);
        assert!(matches!(
            res,
            Err(DctError::Copyright(
                CopyrightError::CopyrightUndocumentedLicense(_)
            ))
        ));

        Ok(())
    }

    #[test]
    fn covers() -> Result<()> {
        assert_eq!(
            run(&["dct", "covers", "GPL-2+ or Artistic-2.0, and BSD", "GPL-2", "BSD"])?,
            "((GPL-2+ or Artistic-2) and BSD) is covered\n"
        );
        assert_eq!(
            run(&["dct", "covers", "GPL-2+", "GPL-3"])?,
            "GPL-2+ is covered\n"
        );
        assert!(matches!(
            run(&["dct", "covers", "GPL-2+ and BSD", "GPL-2"]),
            Err(DctError::NotCovered(_))
        ));

        Ok(())
    }
}
