//! Interactive driver: reads SQL, runs it through an [`Engine`], prints
//! result tables. Exit codes: 0 ok, 1 parse/translation error, 2 runtime
//! error, 3 transaction aborted.

use clap::Parser;
use granite_error::{ErrorKind, GraniteError};
use granite_execution::engine::{Engine, EngineConfig, StatementResult};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::process::ExitCode;
use tracing::{subscriber, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "granite", version, about = "Main-memory column-oriented SQL engine")]
struct Args {
    /// Execute the given SQL and exit instead of starting a shell.
    #[arg(short = 'c', long = "command")]
    command: Option<String>,

    /// Number of NUMA nodes to spread the worker pool over.
    #[arg(long, default_value_t = 1)]
    numa_nodes: usize,

    /// Target rows per storage chunk.
    #[arg(long, default_value_t = 65_535)]
    chunk_size: usize,

    /// Skip MVCC validation when translating queries.
    #[arg(long)]
    no_validate: bool,

    /// Log verbosity; repeat for more (-v debug, -vv trace).
    #[arg(short, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let fmt = FmtSubscriber::builder()
        .with_max_level(level)
        .with_thread_names(true)
        .finish();
    let _ = subscriber::set_global_default(fmt);
}

fn exit_code_for(error: &GraniteError) -> ExitCode {
    match error.kind() {
        ErrorKind::Parse | ErrorKind::Translation(_) => ExitCode::from(1),
        ErrorKind::TransactionAborted | ErrorKind::TransactionConflict => ExitCode::from(3),
        _ => ExitCode::from(2),
    }
}

fn print_results(results: &[StatementResult]) {
    for result in results {
        print_table(result);
    }
}

fn print_table(result: &StatementResult) {
    let table = &result.table;
    let definitions = table.column_definitions();
    if definitions.is_empty() {
        return;
    }

    let mut widths: Vec<usize> = definitions.iter().map(|d| d.name.len()).collect();
    let rows: Vec<Vec<String>> = (0..table.row_count())
        .map(|row| {
            (0..table.column_count())
                .map(|column| {
                    let rendered = table.value(column, row).to_string();
                    widths[column] = widths[column].max(rendered.len());
                    rendered
                })
                .collect()
        })
        .collect();

    let header: Vec<String> = definitions
        .iter()
        .zip(&widths)
        .map(|(d, w)| format!("{:<width$}", d.name, width = *w))
        .collect();
    println!("{}", header.join(" | "));
    println!(
        "{}",
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-")
    );
    for row in rows {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!("{:<width$}", v, width = *w))
            .collect();
        println!("{}", line.join(" | "));
    }
    println!("({} rows)", table.row_count());
}

fn run_shell(engine: &Engine) -> ExitCode {
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(err) => {
            eprintln!("could not start shell: {err}");
            return ExitCode::from(2);
        }
    };

    loop {
        match editor.readline("granite> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
                    break;
                }
                let _ = editor.add_history_entry(line);
                match engine.session().execute_sql(line) {
                    Ok(results) => print_results(&results),
                    Err(err) => eprintln!("error: {err}"),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("input error: {err}");
                return ExitCode::from(2);
            }
        }
    }
    ExitCode::SUCCESS
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = EngineConfig {
        num_numa_nodes: args.numa_nodes,
        topology: None,
        target_chunk_size: args.chunk_size,
        validate_queries: !args.no_validate,
    };
    let engine = match Engine::try_new(config) {
        Ok(engine) => engine,
        Err(err) => {
            eprintln!("failed to start engine: {err}");
            return ExitCode::from(2);
        }
    };

    let code = match &args.command {
        Some(sql) => match engine.session().execute_sql(sql) {
            Ok(results) => {
                print_results(&results);
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("error: {err}");
                exit_code_for(&err)
            }
        },
        None => run_shell(&engine),
    };

    engine.shutdown();
    code
}
