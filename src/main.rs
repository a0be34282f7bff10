use anyhow::{bail, Context, Result};
use clap::Parser;
use colassign::{
    config::{Cli, Command, Settings},
    display::render,
    expr::{Bindings, ScalarValue},
    recipe::Recipe,
    table::{read_csv, Table},
    walkthrough,
};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();

    // ─── 2) settings ─────────────────────────────────────────────────
    let settings = Settings::from_cli(Cli::parse())?;
    info!(
        data = %settings.data_path.display(),
        command = ?settings.command,
        "startup"
    );

    // ─── 3) load ─────────────────────────────────────────────────────
    let games = read_csv(&settings.data_path, &settings.csv_options())
        .with_context(|| format!("loading {:?}", settings.data_path))?;

    // ─── 4) dispatch ─────────────────────────────────────────────────
    match &settings.command {
        Command::Demo => run_demo(&games, &settings),
        Command::Show => print_table(&games, &settings),
        Command::Eval { expr, bind } => {
            let bindings = bindings_from(bind);
            let out = games
                .eval_with(expr, &bindings)
                .with_context(|| format!("evaluating {expr:?}"))?;
            print_table(&out, &settings)
        }
        Command::Apply { recipe } => {
            let out = Recipe::load(recipe)?.apply(&games, &Bindings::standard())?;
            print_table(&out, &settings)
        }
    }
}

fn bindings_from(bind: &[(String, ScalarValue)]) -> Bindings {
    bind.iter().fold(Bindings::standard(), |b, (name, value)| {
        b.with_value(name.clone(), value.clone())
    })
}

fn print_table(table: &Table, settings: &Settings) -> Result<()> {
    print!("{}", render(table, settings.format, settings.display_rows)?);
    Ok(())
}

fn run_demo(games: &Table, settings: &Settings) -> Result<()> {
    let demos = walkthrough::run(games);
    let mut unexpected = 0;
    for (i, demo) in demos.iter().enumerate() {
        println!("── {}. {} ──", i + 1, demo.title);
        println!("{}", demo.source);
        match &demo.outcome {
            Ok(table) => print!("{}", render(table, settings.format, settings.display_rows)?),
            Err(e) if demo.expects_error => println!("error (expected): {e}"),
            Err(e) => println!("error: {e}"),
        }
        if !demo.went_as_expected() {
            error!(step = i + 1, expects_error = demo.expects_error, "demo step went wrong");
            unexpected += 1;
        }
        println!();
    }
    if unexpected > 0 {
        bail!("{unexpected} demo step(s) did not go as expected");
    }
    info!(steps = demos.len(), "walkthrough finished");
    Ok(())
}
