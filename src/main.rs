use anyhow::{anyhow, Context, Result};
use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use serde::Serialize;
use std::path::Path;

use quire::build::build_index;
use quire::config::Config;
use quire::filter::{tag_counts, FilterState};
use quire::preferences::{Preferences, ThemeSetting};
use quire::site::Site;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn app() -> App<'static, 'static> {
    App::new("quire")
        .about("Indexes, renders and searches the posts of a personal blog")
        .version(env!("CARGO_PKG_VERSION"))
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("project")
                .long("project")
                .takes_value(true)
                .default_value(".")
                .global(true)
                .help("The directory holding quire.yaml (or one of its subdirectories)"),
        )
        .arg(
            Arg::with_name("threads")
                .long("threads")
                .takes_value(true)
                .global(true)
                .help("The number of threads used to index posts"),
        )
        .subcommand(SubCommand::with_name("index").about("Builds and writes the post index"))
        .subcommand(
            SubCommand::with_name("render")
                .about("Prints a rendered post as JSON")
                .arg(Arg::with_name("slug").required(true)),
        )
        .subcommand(SubCommand::with_name("home").about("Prints the homepage cards as JSON"))
        .subcommand(
            SubCommand::with_name("search")
                .about("Prints the posts matching a filter as JSON")
                .arg(
                    Arg::with_name("tag")
                        .long("tag")
                        .takes_value(true)
                        .multiple(true)
                        .number_of_values(1)
                        .help("Only posts carrying this tag (repeatable)"),
                )
                .arg(
                    Arg::with_name("query")
                        .long("query")
                        .short("q")
                        .takes_value(true)
                        .help("Free text matched against post tags"),
                )
                .arg(
                    Arg::with_name("url-query")
                        .long("url-query")
                        .takes_value(true)
                        .help("A URL query string such as '?tags=a,b&q=x'"),
                ),
        )
        .subcommand(SubCommand::with_name("tags").about("Prints every tag with its post count"))
        .subcommand(
            SubCommand::with_name("theme")
                .about("Prints or sets the theme preference")
                .arg(Arg::with_name("setting").possible_values(&["light", "dark", "system"]))
                .arg(
                    Arg::with_name("system-dark")
                        .long("system-dark")
                        .help("Resolve `system` as if the OS prefers a dark theme"),
                ),
        )
}

fn run() -> Result<()> {
    let matches = app().get_matches();
    let threads = match matches.value_of("threads") {
        Some(threads) => Some(
            threads
                .parse::<usize>()
                .with_context(|| format!("Invalid thread count `{}`", threads))?,
        ),
        None => None,
    };
    let project = matches.value_of("project").unwrap_or(".");
    let config = Config::from_directory(Path::new(project), threads)?;

    match matches.subcommand() {
        ("index", Some(_)) => {
            let posts = build_index(&config)?;
            println!(
                "indexed {} posts into {}",
                posts.len(),
                config.index_file.display()
            );
            Ok(())
        }
        ("render", Some(m)) => {
            let slug = m.value_of("slug").unwrap_or_default();
            print_json(&load_site(&config)?.post(slug)?)
        }
        ("home", Some(_)) => print_json(&load_site(&config)?.home()),
        ("search", Some(m)) => {
            let site = load_site(&config)?;
            print_json(&site.search(&filter_state(m)))
        }
        ("tags", Some(_)) => {
            let site = load_site(&config)?;
            for (tag, count) in tag_counts(site.posts()) {
                println!("{}\t{}", count, tag);
            }
            Ok(())
        }
        ("theme", Some(m)) => theme(&config, m),
        (name, _) => Err(anyhow!("Unknown subcommand `{}`", name)),
    }
}

fn load_site(config: &Config) -> Result<Site> {
    Site::load(config).with_context(|| {
        format!(
            "Loading site (run `quire index` to create `{}`)",
            config.index_file.display()
        )
    })
}

/// Builds the filter from `--url-query`, then adds any `--tag` and `--query`.
fn filter_state(m: &ArgMatches) -> FilterState {
    let mut state = FilterState::from_query(m.value_of("url-query").unwrap_or_default());
    if let Some(tags) = m.values_of("tag") {
        state = state.with_tags(tags.map(String::from));
    }
    if let Some(query) = m.value_of("query") {
        state = state.with_query(query);
    }
    state
}

fn theme(config: &Config, m: &ArgMatches) -> Result<()> {
    let preferences = match m.value_of("setting") {
        Some(setting) => {
            let setting: ThemeSetting = setting.parse()?;
            Preferences::set_theme(&config.preferences_file, setting).with_context(|| {
                format!(
                    "Saving preferences `{}`",
                    config.preferences_file.display()
                )
            })?
        }
        None => Preferences::load(&config.preferences_file),
    };
    let effective = preferences.theme.resolve(m.is_present("system-dark"));
    println!("{} ({})", preferences.theme, effective);
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
